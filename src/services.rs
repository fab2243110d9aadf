pub mod report_service;

pub use report_service::{ReportQuery, ReportRun, ReportService, ReportSettings};
