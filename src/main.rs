use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

mod advisory;
mod errors;
mod forecast;
mod indices;
mod models;
mod report;
mod store;

use advisory::{AdvisoryComposer, GeminiTextGenerator};
use errors::PulseError;
use models::UpdateRecord;
use store::TableStore;

#[derive(Parser)]
#[command(name = "district-governance-pulse")]
#[command(
    about = "Governance health indices and update-volume forecasts for district administrative data",
    long_about = None
)]
struct Cli {
    /// CSV file the live table is loaded from
    #[arg(long, global = true, default_value = "data/district_summary.csv")]
    data: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a sample dataset and model artifacts for local runs
    Seed {
        #[arg(long, default_value = "models")]
        models: PathBuf,
    },
    /// Validate a CSV payload and promote it to the live table
    Ingest {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print the most recent records in the live table
    Summary {
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Compute the five governance indices
    Indices {
        #[arg(long)]
        json: bool,
    },
    /// Compare update-volume forecasts across the loaded models
    Forecast {
        #[arg(long, default_value = "models")]
        models: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Compose an operational advisory for one model's prediction
    Advise {
        #[arg(long)]
        model: String,
        #[arg(long)]
        volume: String,
        #[arg(long)]
        confidence: String,
    },
    /// Generate a markdown operations briefing
    Report {
        #[arg(long, default_value = "models")]
        models: PathBuf,
        #[arg(long, default_value = "briefing.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Seed { models } => {
            seed_workspace(&cli.data, &models)?;
            println!("Sample table written to {}.", cli.data.display());
            println!("Model artifacts written to {}.", models.display());
        }
        Commands::Ingest { csv } => {
            let raw = std::fs::read(&csv)
                .with_context(|| format!("failed to read {}", csv.display()))?;
            let store = TableStore::new();
            let count = store
                .replace(&raw)
                .with_context(|| format!("rejected payload {}", csv.display()))?;

            if let Some(parent) = cli.data.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("failed to create {}", parent.display()))?;
                }
            }
            std::fs::write(&cli.data, &raw)
                .with_context(|| format!("failed to write {}", cli.data.display()))?;
            println!(
                "Ingested {count} records into the live table at {}.",
                cli.data.display()
            );
        }
        Commands::Summary { limit, json } => {
            let store = TableStore::new();
            let table = load_table(&store, &cli.data)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&*table)?);
                return Ok(());
            }

            if table.is_empty() {
                println!("No administrative data loaded. Run `seed` or `ingest` first.");
                return Ok(());
            }

            let mut recent: Vec<UpdateRecord> = table.iter().cloned().collect();
            recent.sort_by(|a, b| b.date.cmp(&a.date));

            println!("Live table: {} records.", table.len());
            for record in recent.iter().take(limit) {
                println!(
                    "- {} {}: {} updates, {} enrolments",
                    record.date, record.district, record.total_updates, record.total_enrolment
                );
            }
        }
        Commands::Indices { json } => {
            let store = TableStore::new();
            let table = load_table(&store, &cli.data)?;
            let indices = indices::compute_indices(&table);

            if json {
                println!("{}", serde_json::to_string_pretty(&indices)?);
                return Ok(());
            }

            if indices.is_empty() {
                println!("No administrative data loaded. Run `seed` or `ingest` first.");
                return Ok(());
            }

            println!("Governance indices:");
            for index in indices.iter() {
                println!("- {}: {:.2}", index.subject, index.value);
            }
        }
        Commands::Forecast { models, json } => {
            let store = TableStore::new();
            let table = load_table(&store, &cli.data)?;
            let loaded = forecast::load_models(&models);

            let features = match forecast::build_features(&table) {
                Ok(features) => features,
                Err(err @ PulseError::NoData) => {
                    if json {
                        println!("{}", err.to_json());
                    } else {
                        println!("No administrative data loaded. Run `seed` or `ingest` first.");
                    }
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            };

            match forecast::compare_models(&features, &loaded) {
                Ok(results) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&results)?);
                        return Ok(());
                    }
                    println!(
                        "Forecast comparison ({} elapsed days, month {}, last cycle {} updates):",
                        features.days_since_start, features.month, features.lag_1
                    );
                    for (name, result) in results.iter() {
                        println!(
                            "- {}: {} updates next cycle (confidence {:.3}, {})",
                            name, result.magnitude, result.confidence, result.sensitivity
                        );
                    }
                }
                Err(err @ PulseError::ModelUnavailable) => {
                    if json {
                        println!("{}", err.to_json());
                    } else {
                        println!(
                            "Forecast models are offline. Run `seed` to write sample artifacts."
                        );
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Advise {
            model,
            volume,
            confidence,
        } => {
            let composer = composer_from_env();
            let advisory = composer.compose(&model, &volume, &confidence).await;
            println!("{advisory}");
        }
        Commands::Report { models, out } => {
            let store = TableStore::new();
            let table = load_table(&store, &cli.data)?;
            let indices = indices::compute_indices(&table);
            let loaded = forecast::load_models(&models);
            let comparison = forecast::build_features(&table)
                .and_then(|features| forecast::compare_models(&features, &loaded))
                .ok();

            let briefing = report::build_briefing(&table, &indices, comparison.as_ref());
            std::fs::write(&out, briefing)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Briefing written to {}.", out.display());
        }
    }

    Ok(())
}

/// Load the live table from the data file if it exists. A missing file is
/// an empty table, not an error; a malformed file is rejected.
fn load_table(store: &TableStore, data: &Path) -> anyhow::Result<Arc<Vec<UpdateRecord>>> {
    if data.exists() {
        let raw = std::fs::read(data)
            .with_context(|| format!("failed to read {}", data.display()))?;
        let count = store
            .replace(&raw)
            .with_context(|| format!("failed to load {}", data.display()))?;
        tracing::debug!("loaded {count} records from {}", data.display());
    }
    Ok(store.current().unwrap_or_default())
}

fn composer_from_env() -> AdvisoryComposer {
    match std::env::var("GEMINI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => {
            AdvisoryComposer::new(Box::new(GeminiTextGenerator::new(key)))
        }
        _ => {
            tracing::warn!("GEMINI_API_KEY not set, advisories come from the fallback pool");
            AdvisoryComposer::offline()
        }
    }
}

fn seed_workspace(data: &Path, models: &Path) -> anyhow::Result<()> {
    if let Some(parent) = data.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    std::fs::write(data, SEED_CSV)
        .with_context(|| format!("failed to write {}", data.display()))?;

    std::fs::create_dir_all(models)
        .with_context(|| format!("failed to create {}", models.display()))?;

    let challenger = forecast::ModelWeights {
        bias: 91_000.0,
        weights: vec![210.0, 5_400.0, 0.92],
    };
    let champion = forecast::ModelWeights {
        bias: 64_000.0,
        weights: vec![185.0, 4_800.0, 0.88],
    };
    std::fs::write(
        models.join("challenger_xgb.json"),
        serde_json::to_string_pretty(&challenger)?,
    )
    .context("failed to write challenger artifact")?;
    std::fs::write(
        models.join("champion_rf.json"),
        serde_json::to_string_pretty(&champion)?,
    )
    .context("failed to write champion artifact")?;

    Ok(())
}

const SEED_CSV: &str = "\
district,date,total_updates,total_enrolment,age_0_5,age_5_17,bio_age_5_17,bio_age_17_,demo_age_5_17,demo_age_17_
North Block,2024-01-01,512000,64000,21000,38000,146000,92000,61000,43000
South Block,2024-01-01,468000,59000,18500,35500,132000,88000,57000,39000
East Block,2024-01-01,455000,57500,17800,34200,128000,84000,54000,37500
North Block,2024-02-01,538000,66500,22400,39800,152000,96000,63000,45000
South Block,2024-02-01,474000,60200,19100,36100,134000,89000,58000,40000
East Block,2024-02-01,462000,58400,18200,34900,130000,86000,55000,38000
North Block,2024-03-01,561000,69000,23500,41200,159000,101000,66000,47000
South Block,2024-03-01,489000,61800,19800,37000,138000,91000,59500,41000
East Block,2024-03-01,471000,59600,18700,35600,132000,88000,56000,39000
";
