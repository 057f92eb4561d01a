//! Spot price ingestion CLI.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin spot-ingest -- --region us-east-1,us-west-2 --duration 1
//! ```
//!
//! # Options
//!
//! - `--start <datetime>` / `--end <datetime>`: explicit window endpoints
//!   (both or neither); accepts `2024-01-01T00:00:00Z`,
//!   `2024-01-01 00:00:00`, or `2024-01-01`
//! - `--duration <days>`: window length ending at the last UTC midnight
//! - `--region <code>[,<code>...]`: target regions; the value `noregion`
//!   auto-detects the local region from `AWS_DEFAULT_REGION`
//! - `--profile <name>`: credential profile, recorded in the run log
//!
//! Configuration not given on the command line is read from the
//! environment (see `config`). Exits 0 on success, 2 on a bad argument,
//! 1 on a runtime failure.

use chrono::{DateTime, Utc};
use spot_ingest::config::{local_region, parse_region_list};
use spot_ingest::{Pipeline, RunReport, Settings, TimeWindow, telemetry};
use tracing::error;

const EXIT_BAD_ARGUMENT: i32 = 2;
const EXIT_FAILURE: i32 = 1;

const USAGE: &str = "usage: spot-ingest [--start <datetime> --end <datetime>] \
[--duration <days>] [--region <code>[,<code>...]] [--profile <name>]";

#[derive(Debug, Default)]
struct CliArgs {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    duration: Option<i64>,
    regions: Option<Vec<String>>,
    profile: Option<String>,
    help: bool,
}

#[tokio::main]
async fn main() {
    // A missing .env is fine; the environment may be fully set already.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let code = run(std::env::args().skip(1)).await;
    std::process::exit(code);
}

async fn run(args: impl Iterator<Item = String>) -> i32 {
    let cli = match parse_args(args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("{USAGE}");
            return EXIT_BAD_ARGUMENT;
        }
    };
    if cli.help {
        println!("{USAGE}");
        return 0;
    }

    let mut settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            return EXIT_BAD_ARGUMENT;
        }
    };
    if let Some(profile) = cli.profile {
        settings.profile = profile;
    }

    let target_regions = match cli.regions {
        Some(regions) if regions.iter().any(|r| r == "noregion") => {
            vec![local_region(&settings.region)]
        }
        Some(regions) => regions,
        None => settings.target_regions.clone(),
    };

    tracing::info!(
        profile = %settings.profile,
        table = %settings.table_name,
        pool_size = settings.pool_size,
        regions = ?target_regions,
        "configuration loaded"
    );

    let window = match TimeWindow::resolve(
        cli.start,
        cli.end,
        cli.duration.or(Some(settings.default_duration_days)),
    ) {
        Ok(window) => window,
        Err(e) => {
            eprintln!("{e}");
            return EXIT_BAD_ARGUMENT;
        }
    };

    let pipeline = match Pipeline::from_settings(&settings).await {
        Ok(pipeline) => pipeline.with_artifact_dir("."),
        Err(e) => {
            error!(error = %e, "pipeline assembly failed");
            return EXIT_FAILURE;
        }
    };

    match pipeline.run(&target_regions, window).await {
        Ok(report) => {
            print_ending_summary(&report);
            0
        }
        Err(e) => {
            error!(error = %e, "ingestion run failed");
            EXIT_FAILURE
        }
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<CliArgs, String> {
    let mut cli = CliArgs::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => cli.help = true,
            "--start" => cli.start = Some(datetime_value(&mut args, "--start")?),
            "--end" => cli.end = Some(datetime_value(&mut args, "--end")?),
            "--duration" => {
                let raw = flag_value(&mut args, "--duration")?;
                let days: i64 = raw
                    .parse()
                    .map_err(|_| format!("--duration expects a whole number of days, got '{raw}'"))?;
                if days <= 0 {
                    return Err(format!("--duration must be positive, got {days}"));
                }
                cli.duration = Some(days);
            }
            "--region" => {
                let raw = flag_value(&mut args, "--region")?;
                let regions = parse_region_list(&raw);
                if regions.is_empty() {
                    return Err("--region expects at least one region code".to_string());
                }
                cli.regions = Some(regions);
            }
            "--profile" => cli.profile = Some(flag_value(&mut args, "--profile")?),
            other => return Err(format!("unrecognized argument '{other}'")),
        }
    }

    if cli.start.is_some() != cli.end.is_some() {
        return Err("--start and --end must be given together".to_string());
    }
    Ok(cli)
}

fn flag_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, String> {
    args.next().ok_or_else(|| format!("{flag} expects a value"))
}

fn datetime_value(
    args: &mut impl Iterator<Item = String>,
    flag: &str,
) -> Result<DateTime<Utc>, String> {
    let raw = flag_value(args, flag)?;
    spot_ingest::window::parse_datetime_arg(&raw)
        .ok_or_else(|| format!("{flag} expects a datetime like 2024-01-01T00:00:00Z, got '{raw}'"))
}

fn print_ending_summary(report: &RunReport) {
    println!("Run complete in {:.2}s", report.elapsed.as_secs_f64());
    println!("Window: {}", report.window);
    println!("Regions fetched: {}", report.regions_fetched.join(", "));
    if !report.regions_failed.is_empty() {
        println!("Regions failed: {}", report.regions_failed.join(", "));
    }
    println!(
        "Records: {} fetched, {} written, {} skipped",
        report.records_fetched, report.records_written, report.records_skipped
    );
    println!(
        "Instance types ({}):",
        report.aggregation.unique_instance_types.len()
    );
    for summary in &report.aggregation.summaries {
        println!("  {:<16} avg {}", summary.instance_type, summary.avg_price);
    }
    println!(
        "Artifacts: {} written, {} failed",
        report.artifacts_written, report.artifacts_failed
    );
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs, String> {
        parse_args(args.iter().map(ToString::to_string))
    }

    #[test]
    fn full_argument_set() {
        let cli = parse(&[
            "--start",
            "2024-01-01",
            "--end",
            "2024-01-02",
            "--region",
            "us-east-1,us-west-2",
            "--profile",
            "research",
        ])
        .unwrap();

        assert_eq!(
            cli.start,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap())
        );
        assert_eq!(
            cli.regions,
            Some(vec!["us-east-1".to_string(), "us-west-2".to_string()])
        );
        assert_eq!(cli.profile.as_deref(), Some("research"));
    }

    #[test]
    fn start_without_end_is_rejected() {
        let err = parse(&["--start", "2024-01-01"]).unwrap_err();
        assert!(err.contains("together"));
    }

    #[test]
    fn duration_must_be_positive_integer() {
        assert!(parse(&["--duration", "0"]).is_err());
        assert!(parse(&["--duration", "one"]).is_err());
        assert_eq!(parse(&["--duration", "7"]).unwrap().duration, Some(7));
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(parse(&["--frobnicate"]).is_err());
    }

    #[test]
    fn missing_value_is_rejected() {
        assert!(parse(&["--region"]).is_err());
    }

    #[test]
    fn bad_datetime_is_rejected() {
        let err = parse(&["--start", "yesterday", "--end", "2024-01-02"]).unwrap_err();
        assert!(err.contains("--start"));
    }
}
