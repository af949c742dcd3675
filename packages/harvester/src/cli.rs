//! Command-line interface for the harvester.
//!
//! Positional arguments are parsed as optional so that a missing one exits
//! with its own code (1 for the first, 2 for the second) instead of clap's
//! usage error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::HarvesterConfig;
use crate::error::{HarvesterError, Result};
use crate::fetcher::BatchFetcher;
use crate::geocode::YandexGeocoder;
use crate::harvester::{
    harvest_banks, harvest_cash_points, harvest_towns, postprocess, read_raw_towns, Progress,
};
use crate::http::HttpTransport;
use crate::rpc::RpcClient;

/// Cash Points Harvester - Download towns, cash points and banks from the banki.ru API.
#[derive(Parser)]
#[command(name = "cashpoints-harvester")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve the town list and write towns and regions.
    Towns {
        /// Town list JSON (`{"data": [...]}`)
        towns_json: Option<PathBuf>,

        /// Output towns database
        towns_db: Option<PathBuf>,
    },

    /// Fetch cash points for every town.
    Cashpoints {
        /// Towns database written by `towns`
        towns_db: Option<PathBuf>,

        /// Output cash points database
        cashpoints_db: Option<PathBuf>,

        /// Resume from this town id, appending to the existing output
        resume_from: Option<i64>,
    },

    /// Normalize annotations and derive currency and cash-in flags.
    Postprocess {
        /// Cash points database written by `cashpoints`
        cashpoints_db: Option<PathBuf>,

        /// Output processed database
        processed_db: Option<PathBuf>,
    },

    /// Fetch the bank list.
    Banks {
        /// Output banks database
        banks_db: Option<PathBuf>,
    },
}

/// Unwrap a positional argument or fail with its exit code.
fn required(arg: Option<PathBuf>, position: u8, name: &'static str) -> Result<PathBuf> {
    arg.ok_or(HarvesterError::MissingArgument { position, name })
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Towns {
            towns_json,
            towns_db,
        } => {
            let input = required(towns_json, 1, "towns.json")?;
            let output = required(towns_db, 2, "towns.db")?;
            towns_command(&input, &output, config_path)
        }
        Commands::Cashpoints {
            towns_db,
            cashpoints_db,
            resume_from,
        } => {
            let input = required(towns_db, 1, "towns.db")?;
            let output = required(cashpoints_db, 2, "cashpoints.db")?;
            cashpoints_command(&input, &output, resume_from, config_path)
        }
        Commands::Postprocess {
            cashpoints_db,
            processed_db,
        } => {
            let input = required(cashpoints_db, 1, "cashpoints.db")?;
            let output = required(processed_db, 2, "processed.db")?;
            postprocess_command(&input, &output)
        }
        Commands::Banks { banks_db } => {
            let output = required(banks_db, 1, "banks.db")?;
            banks_command(&output, config_path)
        }
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn rpc_client(config: &HarvesterConfig) -> Result<RpcClient<HttpTransport>> {
    Ok(RpcClient::new(
        HttpTransport::new(config.http_timeout)?,
        config.api_url.clone(),
        config.retry,
    ))
}

fn towns_command(input: &Path, output: &Path, config_path: Option<&Path>) -> Result<()> {
    let raw = read_raw_towns(input)?;
    let config = HarvesterConfig::load(config_path)?;
    let client = rpc_client(&config)?;
    let geocoder = YandexGeocoder::new(
        HttpTransport::new(config.http_timeout)?,
        config.geocoder_url.clone(),
        config.geocoder_api_key.clone(),
    );

    println!(
        "{} {} towns from {}",
        style("Resolving").bold(),
        style(raw.len()).cyan(),
        input.display()
    );

    let pb = spinner("Resolving regions...");
    let summary = harvest_towns(&client, &geocoder, &raw, output);
    pb.finish_and_clear();
    let summary = summary?;

    println!("  Towns: {}", summary.towns);
    println!("  Regions: {}", summary.regions);
    println!(
        "{} {}",
        style("Saved to:").green().bold(),
        output.display()
    );
    Ok(())
}

fn cashpoints_command(
    input: &Path,
    output: &Path,
    resume_from: Option<i64>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = HarvesterConfig::load(config_path)?;
    let client = rpc_client(&config)?;
    let fetcher = BatchFetcher::new(&client, config.page_size);

    if let Some(start) = resume_from {
        println!(
            "{} from town {}",
            style("Resuming").bold(),
            style(start).cyan()
        );
    }

    let pb = ProgressBar::new(100);
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{pos:>3}%] {bar:40.green} {msg}")
            .expect("valid template"),
    );

    let summary = harvest_cash_points(&fetcher, input, output, resume_from, |event| {
        match event {
            Progress::Page { town_id, page } => {
                pb.set_message(format!("town {town_id}: {}/{}", page.done, page.total));
            }
            Progress::Scope {
                town_id,
                last_town_id,
            } => {
                if let Some(percent) = event.percent() {
                    pb.set_position(u64::from(percent));
                }
                pb.set_message(format!("{town_id}/{last_town_id}"));
            }
            Progress::Skipped { town_id } => {
                pb.set_message(format!("skipping town {town_id}"));
            }
        }
    });
    pb.finish_and_clear();
    let summary = summary?;

    println!("  Towns fetched: {}", summary.towns);
    if summary.skipped > 0 {
        println!("  Towns skipped: {}", style(summary.skipped).yellow());
    }
    println!("  Cash points: {}", summary.cash_points);
    println!(
        "{} {}",
        style("Saved to:").green().bold(),
        output.display()
    );
    Ok(())
}

fn postprocess_command(input: &Path, output: &Path) -> Result<()> {
    let pb = spinner("Normalizing annotations...");
    let written = postprocess(input, output);
    pb.finish_and_clear();
    let written = written?;

    println!("  Cash points: {written}");
    println!(
        "{} {}",
        style("Saved to:").green().bold(),
        output.display()
    );
    Ok(())
}

fn banks_command(output: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = HarvesterConfig::load(config_path)?;
    let client = rpc_client(&config)?;

    let pb = spinner("Fetching bank list...");
    let summary = harvest_banks(&client, output);
    pb.finish_and_clear();
    let summary = summary?;

    println!("  Banks: {}", summary.banks);
    println!("  Branches: {}", summary.branches);
    println!(
        "{} {}",
        style("Saved to:").green().bold(),
        output.display()
    );
    Ok(())
}
