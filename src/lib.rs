pub mod alignment;
pub mod api;
pub mod app;
pub mod config;
pub mod discovery;
pub mod extrema;
pub mod format;
pub mod grades;
pub mod models;
pub mod services;
pub mod source;
pub mod store;
