use clap::{Parser, Subcommand};
use image::ImageReader;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use wastesort::core::db::{HistoryDb, HistoryRepository};
use wastesort::{
    ClassificationSession, Classifier, DisposalAdvice, ModelAssets, Prediction, Settings, assistant,
};

#[derive(Parser)]
#[command(name = "wastesort")]
#[command(about = "Classify waste from photos and get disposal advice")]
struct Cli {
    /// Settings file (JSON)
    #[arg(long, value_name = "FILE", global = true, default_value = "wastesort.json")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify an image
    Classify {
        /// Path to input image file
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        /// Directory holding model.rten and labels.txt
        #[arg(long, value_name = "DIR")]
        assets: Option<PathBuf>,

        /// Save the result to this history database
        #[arg(long, value_name = "DB")]
        history: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List stored classifications, most recent first
    History {
        #[arg(long, value_name = "DB")]
        history: Option<PathBuf>,

        /// Only records with this waste type
        #[arg(long, value_name = "TYPE")]
        waste_type: Option<String>,
    },
    /// Ask the waste management assistant
    Ask {
        #[arg(value_name = "MESSAGE")]
        message: String,
    },
}

#[derive(Serialize)]
struct ClassifyOutput<'a> {
    prediction: &'a Prediction,
    advice: &'a DisposalAdvice,
    model_info: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    history_error: Option<&'a str>,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "wastesort=debug" } else { "wastesort=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let mut settings = Settings::load(&args.config)?;

    match args.command {
        Command::Classify {
            image_path,
            assets,
            history,
            json,
        } => {
            if let Some(dir) = assets {
                settings.classifier.assets_dir = dir;
            }

            tracing::debug!(path = %image_path.display(), "loading image");
            let img = ImageReader::open(&image_path)?
                .with_guessed_format()?
                .decode()
                .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?;
            tracing::debug!(width = img.width(), height = img.height(), "image loaded");

            let classifier = Arc::new(Classifier::new(
                ModelAssets::from_dir(&settings.classifier.assets_dir),
                &settings.classifier,
            ));
            let history = match history {
                Some(path) => Some(HistoryDb::open(path).await?),
                None => None,
            };

            let session = ClassificationSession::new(Arc::clone(&classifier), history.clone());
            let image_uri = image_path.canonicalize().unwrap_or(image_path).display().to_string();
            session.classify(img, Some(image_uri)).await?;
            let state = session.state();
            let model_info = classifier.model_info();
            session.close();
            if let Some(db) = history {
                db.close().await?;
            }

            let (Some(prediction), Some(advice)) = (&state.prediction, &state.advice) else {
                anyhow::bail!("classification produced no result");
            };
            if json {
                let output = ClassifyOutput {
                    prediction,
                    advice,
                    model_info,
                    history_error: state.error.as_deref(),
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("=== Classification Result ===");
                println!("{} ({:.1}%)", prediction.label, prediction.confidence * 100.0);
                println!("\n{} {}", advice.icon, advice.category);
                println!("{}", advice.advice);
                println!("\n{}", model_info);
                if let Some(err) = &state.error {
                    eprintln!("Warning: {}", err);
                }
            }
        }
        Command::History { history, waste_type } => {
            let path = history.unwrap_or(settings.history.database_path);
            let db = HistoryDb::open(&path).await?;
            let records = match waste_type {
                Some(t) => db.get_records_by_waste_type(&t).await?,
                None => db.get_all_records().await?,
            };
            db.close().await?;

            if records.is_empty() {
                println!("No classifications recorded.");
            }
            for record in &records {
                println!(
                    "{}  {:<20} {:>5.1}%  {}",
                    record.created_at.date(),
                    record.waste_type,
                    record.confidence * 100.0,
                    record.image_uri.as_deref().unwrap_or("-"),
                );
            }
        }
        Command::Ask { message } => {
            println!("{}", assistant::reply(&message));
        }
    }

    Ok(())
}
