//! backup-census CLI
//!
//! The `backup-census` command walks a tenancy's compartments and writes a
//! report of every database backup that completed inside a time window, or
//! (`--profile maintenance`) of the Exadata maintenance scheduled in the
//! coming week.
//!
//! ## Commands
//!
//! - `run`: enumerate backups or maintenance runs and write the report
//! - `window`: print the window a run would use

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use census_core::{
    cancel_pair, deliver_report, report_file_name, CensusConfig, CsvReportSink, JsonReportSink,
    Orchestrator, ReportProfile, ReportSink, ResourceNode, RunReport, TimeWindow,
};
use census_upstream::fakes::{Fixture, FixtureUpstream};
use census_upstream::{HttpUpstream, HttpUpstreamConfig, UpstreamApi};

#[derive(Parser)]
#[command(name = "backup-census")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Rate-limited census of cloud database backups", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enumerate backups under a root compartment and write the report
    Run(RunArgs),

    /// Print the time window a run would report on
    Window {
        /// Report day (UTC, YYYY-MM-DD); defaults to yesterday, or today for maintenance
        #[arg(long)]
        date: Option<NaiveDate>,

        /// oracle, mysql or maintenance
        #[arg(long, default_value = "oracle")]
        profile: ReportProfile,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Csv,
    Json,
}

impl ReportFormat {
    fn extension(self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Json => "json",
        }
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    /// TOML configuration file
    #[arg(short, long, env = "CENSUS_CONFIG")]
    config: Option<PathBuf>,

    /// Root compartment (tenancy) id
    #[arg(long, env = "CENSUS_ROOT_ID")]
    root_id: String,

    /// Display name of the root, used when it is walked as a branch
    #[arg(long, env = "CENSUS_ROOT_NAME", default_value = "root")]
    root_name: String,

    /// Serve the hierarchy from a JSON fixture instead of a live endpoint
    #[arg(long, env = "CENSUS_FIXTURE", conflicts_with = "endpoint")]
    fixture: Option<PathBuf>,

    /// REST gateway base URL
    #[arg(long, env = "CENSUS_ENDPOINT")]
    endpoint: Option<String>,

    /// Bearer token for the gateway
    #[arg(long, env = "CENSUS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Report day (UTC, YYYY-MM-DD); defaults to yesterday, or today for maintenance
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Hierarchy to walk: oracle, mysql or maintenance
    #[arg(long, env = "CENSUS_PROFILE")]
    profile: Option<ReportProfile>,

    /// Directory the report is written to
    #[arg(short, long, env = "CENSUS_REPORTS_DIR", default_value = ".")]
    output_dir: PathBuf,

    #[arg(long, value_enum, default_value = "csv")]
    format: ReportFormat,

    /// Keep only the latest backup per database
    #[arg(long)]
    latest_only: bool,

    /// Walk the root itself as a branch too
    #[arg(long)]
    include_root: bool,

    /// Maximum compartments walked at once
    #[arg(long, env = "CENSUS_MAX_CONCURRENT")]
    max_concurrent: Option<usize>,

    /// Minimum spacing between upstream calls (milliseconds)
    #[arg(long, env = "CENSUS_MIN_INTERVAL_MS")]
    min_interval_ms: Option<u64>,

    /// Offset for report timestamps, minutes east of UTC (e.g. -360)
    #[arg(long, allow_hyphen_values = true)]
    display_offset_minutes: Option<i32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    census_core::init_tracing(cli.json, census_core::telemetry::level_for(cli.verbose));

    match cli.command {
        Commands::Run(args) => cmd_run(args).await.map(|_| ()),
        Commands::Window { date, profile } => {
            println!("{}", resolve_window(profile, date));
            Ok(())
        }
    }
}

/// Load the config file (if any) and apply command-line overrides.
fn load_config(args: &RunArgs) -> Result<CensusConfig> {
    let mut config = match &args.config {
        Some(path) => CensusConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CensusConfig::default(),
    };

    if let Some(profile) = args.profile {
        config.profile = profile;
    }
    if let Some(n) = args.max_concurrent {
        config.max_concurrent_branches = n;
    }
    if let Some(ms) = args.min_interval_ms {
        config.invoker.min_request_interval_ms = ms;
    }
    if let Some(minutes) = args.display_offset_minutes {
        config.display_offset_minutes = minutes;
    }
    if args.latest_only {
        config.keep_all_matches_per_leaf = false;
    }
    if args.include_root {
        config.include_root_compartment = true;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Backups look back over one UTC day; maintenance looks a week ahead.
fn resolve_window(profile: ReportProfile, date: Option<NaiveDate>) -> TimeWindow {
    match (profile, date) {
        (ReportProfile::Maintenance, date) => {
            TimeWindow::maintenance_week(date.unwrap_or_else(|| Utc::now().date_naive()))
        }
        (_, Some(date)) => TimeWindow::utc_day(date),
        (_, None) => TimeWindow::previous_utc_day(Utc::now()),
    }
}

fn build_upstream(args: &RunArgs) -> Result<Arc<dyn UpstreamApi>> {
    if let Some(path) = &args.fixture {
        let fixture = Fixture::from_json_file(path)
            .with_context(|| format!("Failed to load fixture {}", path.display()))?;
        return Ok(Arc::new(FixtureUpstream::new(fixture)));
    }
    let Some(endpoint) = &args.endpoint else {
        bail!("either --fixture or --endpoint is required");
    };

    let mut http = HttpUpstreamConfig::new(endpoint);
    if let Some(token) = &args.token {
        http = http.with_token(token);
    }
    let upstream = HttpUpstream::new(http).context("Failed to build HTTP client")?;
    Ok(Arc::new(upstream))
}

fn build_sink(
    config: &CensusConfig,
    dir: &Path,
    format: ReportFormat,
    window: &TimeWindow,
) -> Result<Box<dyn ReportSink>> {
    let path = dir.join(report_file_name(config.profile, window, format.extension()));
    Ok(match format {
        ReportFormat::Csv => Box::new(CsvReportSink::new(path, config.display_offset()?)),
        ReportFormat::Json => Box::new(JsonReportSink::new(path)),
    })
}

/// Run one census and deliver the report.
///
/// Branch errors are printed but do not fail the command; an aborted
/// enumeration, bad configuration or a failed report write does.
async fn cmd_run(args: RunArgs) -> Result<RunReport> {
    let config = load_config(&args)?;
    let window = resolve_window(config.profile, args.date);
    let upstream = build_upstream(&args)?;

    std::fs::create_dir_all(&args.output_dir).with_context(|| {
        format!("Failed to create output dir {}", args.output_dir.display())
    })?;
    let sink = build_sink(&config, &args.output_dir, args.format, &window)?;

    let (cancel, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight calls");
            cancel.cancel();
        }
    });

    info!(profile = config.profile.slug(), window = %window, "starting census");
    let orchestrator = Orchestrator::new(upstream, config, window)?.with_cancel(signal);
    let root = ResourceNode::root(&args.root_id, &args.root_name);
    let report = orchestrator
        .run(&root)
        .await
        .context("Backup census aborted")?;

    print_summary(&report);

    if !deliver_report(sink.as_ref(), report.body()) {
        bail!("Failed to write report to {}", sink.target());
    }
    println!("Report written to {}", sink.target());

    Ok(report)
}

fn print_summary(report: &RunReport) {
    let s = &report.summary;
    println!(
        "Run {} ({}, window {})",
        report.run_id,
        report.profile.slug(),
        report.window
    );
    println!(
        "  branches: {} total, {} ok, {} errored, {} cancelled",
        s.branches_total, s.branches_succeeded, s.branches_errored, s.branches_cancelled
    );
    let noun = match report.profile {
        ReportProfile::Maintenance => "maintenance runs",
        ReportProfile::Oracle | ReportProfile::Mysql => "backups",
    };
    println!("  {noun}: {}", s.records);
    println!(
        "  upstream: {} attempts, {} retries, {} circuit rejections",
        report.stats.attempts, report.stats.retries, report.stats.circuit_rejections
    );
    for err in &report.branch_errors {
        println!("  ! {err}");
    }
    if report.cancelled {
        println!("  (cancelled before completion; report is partial)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use census_upstream::RawBackup;
    use chrono::DateTime;

    fn parse(argv: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Run(args) => args,
            Commands::Window { .. } => panic!("expected run"),
        }
    }

    fn write_fixture(dir: &Path) -> PathBuf {
        let ended = DateTime::parse_from_rfc3339("2026-10-18T04:00:00Z").unwrap();
        let fixture = Fixture::new()
            .compartment("c1", "finance")
            .db_home("c1", "h1", "home-1")
            .database("h1", "c1", "d1", "ORCL")
            .backup(
                "d1",
                RawBackup {
                    id: "b1".to_string(),
                    display_name: "nightly".to_string(),
                    database_size_in_gbs: Some(3.0),
                    backup_type: Some("FULL".to_string()),
                    lifecycle_state: "ACTIVE".to_string(),
                    time_started: ended - chrono::Duration::minutes(10),
                    time_ended: Some(ended),
                },
            );
        let path = dir.join("fixture.json");
        std::fs::write(&path, serde_json::to_string(&fixture).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("census.toml");
        std::fs::write(
            &config_path,
            "max_concurrent_branches = 8\nprofile = \"mysql\"\n[invoker]\nmax_retries = 1\n",
        )
        .unwrap();

        let args = parse(&[
            "backup-census",
            "run",
            "--root-id",
            "tenancy",
            "--config",
            config_path.to_str().unwrap(),
            "--max-concurrent",
            "2",
            "--latest-only",
            "--display-offset-minutes",
            "-360",
        ]);
        let config = load_config(&args).unwrap();

        assert_eq!(config.profile, ReportProfile::Mysql);
        assert_eq!(config.max_concurrent_branches, 2);
        assert_eq!(config.invoker.max_retries, 1);
        assert!(!config.keep_all_matches_per_leaf);
        assert_eq!(config.display_offset_minutes, -360);
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let args = parse(&["backup-census", "run", "--root-id", "t", "--max-concurrent", "0"]);
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn test_fixture_and_endpoint_conflict() {
        let parsed = Cli::try_parse_from([
            "backup-census",
            "run",
            "--root-id",
            "t",
            "--fixture",
            "f.json",
            "--endpoint",
            "http://localhost",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_missing_upstream_is_an_error() {
        let args = parse(&["backup-census", "run", "--root-id", "t"]);
        assert!(build_upstream(&args).is_err());
    }

    #[test]
    fn test_explicit_date_sets_window() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 18);
        let window = resolve_window(ReportProfile::Oracle, date);
        assert_eq!(window.start().to_rfc3339(), "2026-10-18T00:00:00+00:00");
        assert_eq!(window.end().to_rfc3339(), "2026-10-19T00:00:00+00:00");

        let week = resolve_window(ReportProfile::Maintenance, date);
        assert_eq!(week.start().to_rfc3339(), "2026-10-18T19:00:00+00:00");
        assert_eq!(week.end().to_rfc3339(), "2026-10-25T19:00:00+00:00");
    }

    #[tokio::test]
    async fn test_run_against_fixture_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = write_fixture(dir.path());
        let out = dir.path().join("reports");

        let args = parse(&[
            "backup-census",
            "run",
            "--root-id",
            "tenancy",
            "--fixture",
            fixture.to_str().unwrap(),
            "--date",
            "2026-10-18",
            "--min-interval-ms",
            "0",
            "--output-dir",
            out.to_str().unwrap(),
        ]);
        let report = cmd_run(args).await.unwrap();

        assert_eq!(report.summary.records, 1);
        let body = std::fs::read_to_string(out.join("backups-db-oracle-2026-10-18.csv")).unwrap();
        assert!(body.contains("finance,ORCL,nightly,3,FULL,ACTIVE"));
    }

    fn demo(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../demos")
            .join(name)
    }

    #[tokio::test]
    async fn test_demo_fixture_for_both_profiles() {
        let out = tempfile::tempdir().unwrap();
        let config = demo("census.toml");
        let fixture = demo("fixture.json");
        let base = [
            "backup-census",
            "run",
            "--root-id",
            "ocid1.tenancy.oc1..acme",
            "--config",
            config.to_str().unwrap(),
            "--fixture",
            fixture.to_str().unwrap(),
            "--date",
            "2026-10-18",
            "--min-interval-ms",
            "0",
            "--output-dir",
            out.path().to_str().unwrap(),
        ];

        let oracle = cmd_run(parse(&base)).await.unwrap();
        let ocids: Vec<_> = oracle.records.iter().map(|r| r.ocid.as_str()).collect();
        assert_eq!(
            ocids,
            vec![
                "ocid1.dbbackup.oc1..l1",
                "ocid1.dbbackup.oc1..l2",
                "ocid1.dbbackup.oc1..m1"
            ]
        );
        assert_eq!(oracle.summary.branches_total, 2);

        let mut mysql_argv = base.to_vec();
        mysql_argv.extend(["--profile", "mysql", "--format", "json"]);
        let mysql = cmd_run(parse(&mysql_argv)).await.unwrap();
        assert_eq!(mysql.records.len(), 1);
        assert_eq!(mysql.records[0].database_name, "web-mysql");
        assert!(out.path().join("backups-db-mysql-2026-10-18.json").exists());
    }

    #[tokio::test]
    async fn test_demo_fixture_maintenance_report() {
        let out = tempfile::tempdir().unwrap();
        let config = demo("census.toml");
        let fixture = demo("fixture.json");
        let args = parse(&[
            "backup-census",
            "run",
            "--root-id",
            "ocid1.tenancy.oc1..acme",
            "--root-name",
            "acme",
            "--config",
            config.to_str().unwrap(),
            "--fixture",
            fixture.to_str().unwrap(),
            "--date",
            "2026-10-18",
            "--min-interval-ms",
            "0",
            "--profile",
            "maintenance",
            "--output-dir",
            out.path().to_str().unwrap(),
        ]);

        let report = cmd_run(args).await.unwrap();

        let names: Vec<_> = report
            .maintenance_runs
            .iter()
            .map(|r| r.infrastructure_name.as_str())
            .collect();
        assert_eq!(names, vec!["exa-ops", "exa-shared"]);
        assert_eq!(report.summary.branches_total, 3);

        let body =
            std::fs::read_to_string(out.path().join("maintenance-exadata-2026-10-18.csv")).unwrap();
        assert!(body.starts_with("EXADATA-NAME,MAINTENANCE-TYPE,"));
        assert!(body.contains(
            "exa-ops,QUARTERLY,2026-10-20 08:00:00 +00:00,2026-10-20 02:00:00 -06:00,2h 30m"
        ));
    }
}
