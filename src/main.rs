use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

use retail_report::config::Config;
use retail_report::logging;
use retail_report::metrics;
use retail_report::pipeline::ingestion;
use retail_report::pipeline::{Pipeline, ReportOutput};

#[derive(Parser)]
#[command(name = "retail_report")]
#[command(about = "Load a retail transaction spreadsheet into SQLite and report revenue")]
#[command(version = "0.1.0")]
struct Cli {
    /// Config file (defaults to ./config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load, clean and persist the source, then print reports and render charts
    Run {
        /// Source spreadsheet (xlsx, xls, ods or csv)
        #[arg(long)]
        source: Option<PathBuf>,
        #[command(flatten)]
        report: ReportArgs,
    },
    /// Report and chart from the existing database without reloading
    Report {
        #[command(flatten)]
        report: ReportArgs,
    },
    /// Print the header row of the source
    Columns {
        #[arg(long)]
        source: Option<PathBuf>,
        /// Worksheet name for workbook sources
        #[arg(long)]
        sheet: Option<String>,
    },
}

#[derive(Args)]
struct ReportArgs {
    /// SQLite database file
    #[arg(long)]
    db: Option<PathBuf>,
    /// Country the trend and product reports are restricted to
    #[arg(long)]
    country: Option<String>,
    /// Number of rows in the top-N reports
    #[arg(long)]
    top_n: Option<usize>,
    /// Directory for charts and JSON output
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

impl ReportArgs {
    fn apply(self, config: &mut Config) {
        if let Some(db) = self.db {
            config.store.db_path = db;
        }
        if let Some(country) = self.country {
            // A display name configured for the old filter would mislabel the charts
            if country != config.report.country_filter {
                config.report.country_display_name = None;
            }
            config.report.country_filter = country;
        }
        if let Some(top_n) = self.top_n {
            config.report.top_n = top_n;
        }
        if let Some(dir) = self.output_dir {
            config.charts.output_dir = dir;
        }
    }
}

fn print_reports(output: &ReportOutput) {
    for table in output.reports.tables() {
        println!("\n{}", table);
    }
    if !output.charts.is_empty() {
        println!("📈 Charts:");
        for chart in &output.charts {
            println!("   {}", chart.display());
        }
    }
}

fn execute(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { source, report } => {
            if let Some(source) = source {
                config.source.path = source;
            }
            report.apply(&mut config);
            config.validate()?;

            println!("🚀 Running retail pipeline...");
            let result = Pipeline::run(&config)?;

            println!("\n📊 Pipeline Results:");
            println!("   Source: {}", result.source);
            println!("   Rows loaded: {}", result.rows_loaded);
            println!("   Unparsed dates: {}", result.date_parse_failures);
            println!("   Rows dropped: {}", result.cleaning.dropped_rows());
            println!(
                "   Rows persisted: {} ({} in {})",
                result.rows_persisted, result.table, result.database
            );
            print_reports(&result.output);
        }
        Commands::Report { report } => {
            report.apply(&mut config);
            config.validate()?;

            let output = Pipeline::report(&config)?;
            print_reports(&output);
        }
        Commands::Columns { source, sheet } => {
            let path = source.unwrap_or_else(|| config.source.path.clone());
            let sheet = sheet.or_else(|| config.source.sheet.clone());
            let columns = ingestion::columns(&path, sheet.as_deref())?;
            println!("Columns in dataset: {:?}", columns);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();
    metrics::register_all_metrics();

    let cli = Cli::parse();
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}
