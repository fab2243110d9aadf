use chrono::DateTime;
use clap::{Parser, ValueEnum};
use hydro_report_engine::config::MAX_EXTREMA_PADDING_HOURS;
use hydro_report_engine::models::{ExtremaMode, Interval, Timestamp, WaterYearStart};
use hydro_report_engine::services::{ReportQuery, ReportService, ReportSettings};
use hydro_report_engine::store::MemorySeriesStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReportKind {
    Range,
    Period,
    Table,
    Extrema,
    Points,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Min,
    Max,
}

impl From<ModeArg> for ExtremaMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Min => ExtremaMode::Min,
            ModeArg::Max => ExtremaMode::Max,
        }
    }
}

#[derive(Parser)]
#[command(name = "hydro-report")]
#[command(about = "Run one report against a series file and print the rows", long_about = None)]
struct Cli {
    /// Series file (JSON)
    file: PathBuf,

    /// Report to run
    #[arg(long, value_enum, default_value = "table")]
    report: ReportKind,

    /// Period start (RFC 3339, e.g. 2020-01-01T00:00:00-07:00)
    #[arg(long)]
    from: Option<DateTime<chrono::FixedOffset>>,

    /// Period end (RFC 3339)
    #[arg(long)]
    to: Option<DateTime<chrono::FixedOffset>>,

    /// Bucket unit: Day, Week, Month, Year or WaterYear
    #[arg(long)]
    group_by: Option<String>,

    /// Extrema mode
    #[arg(long, value_enum, default_value = "max")]
    mode: ModeArg,

    /// First month of the water year (1-12)
    #[arg(long, env, default_value = "10")]
    water_year_start_month: u32,

    /// Hours of points fetched either side of the period for extrema
    #[arg(
        long,
        env,
        default_value = "12",
        value_parser = clap::value_parser!(i64).range(0..=MAX_EXTREMA_PADDING_HOURS)
    )]
    extrema_padding_hours: i64,

    /// Decimal places for values
    #[arg(long, env, default_value = "2")]
    display_decimals: usize,

    /// Show values to this many significant figures instead of fixed decimals
    #[arg(long, env)]
    significant_figures: Option<u32>,

    /// Text shown for missing values
    #[arg(long, env, default_value = "***")]
    missing_text: String,

    /// Print the report as JSON instead of rows
    #[arg(long)]
    json: bool,
}

fn side(t: Option<Timestamp>) -> String {
    t.map(|t| t.to_rfc3339()).unwrap_or_else(|| "unknown".to_string())
}

fn print_interval(label: &str, interval: &Interval) {
    println!("{}\t{}\t{}", label, side(interval.start), side(interval.end));
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout stays clean for the rows
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let record = MemorySeriesStore::load_file(&cli.file)?;
    let series_id = record.id.clone();
    let store = MemorySeriesStore::from_records(vec![record])?;
    info!("Loaded series {} from {}", series_id, cli.file.display());

    let settings = ReportSettings {
        water_year_start: WaterYearStart::new(cli.water_year_start_month)?,
        extrema_padding_hours: cli.extrema_padding_hours,
        display_decimals: cli.display_decimals,
        significant_figures: cli.significant_figures,
        missing_text: cli.missing_text.clone(),
    };
    let service = ReportService::new(Arc::new(store), settings);
    let mut run = service.start_run();

    let query = ReportQuery {
        from: cli.from,
        to: cli.to,
        group_by: cli.group_by.clone(),
        mode: Some(cli.mode.into()),
    };
    let selected = query.selected();
    let unit = query.unit();

    match cli.report {
        ReportKind::Range => {
            let range = run.series_range(&series_id)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&range)?);
            } else {
                print_interval("range", &range);
            }
        }
        ReportKind::Period => {
            let period = run.report_period(&series_id, &selected, unit)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&period)?);
            } else {
                print_interval("data", &period.data_range);
                print_interval("period", &period.period);
            }
        }
        ReportKind::Table => {
            let table = run.bucket_table(&series_id, &selected, unit)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&table)?);
            } else {
                println!("start\tend\tcount\tgaps\tmin\tmax\tmean\ttotal\tgrades");
                for row in &table.rows {
                    let grades: Vec<String> =
                        row.grade_codes.iter().map(|g| g.to_string()).collect();
                    println!(
                        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                        row.start.to_rfc3339(),
                        row.end.to_rfc3339(),
                        row.point_count,
                        row.gap_count,
                        row.min,
                        row.max,
                        row.mean,
                        row.total,
                        grades.join(",")
                    );
                }
            }
        }
        ReportKind::Extrema => {
            let report = run.extrema(&series_id, &selected, unit, query.mode())?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("bucket_start\tbucket_end\ttimestamp\tvalue\tgrade");
                for row in &report.rows {
                    println!(
                        "{}\t{}\t{}\t{}\t{}",
                        row.bucket_start.to_rfc3339(),
                        row.bucket_end.to_rfc3339(),
                        side(row.timestamp),
                        row.value,
                        row.grade_code.map(|g| g.to_string()).unwrap_or_default()
                    );
                }
            }
        }
        ReportKind::Points => {
            let report = run.graded_points(&series_id, &selected, unit)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("timestamp\tvalue\tgrade");
                for row in &report.rows {
                    println!("{}\t{}\t{}", row.timestamp.to_rfc3339(), row.value, row.grade_code);
                }
            }
        }
    }

    Ok(())
}
