use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facegate_core::verdict::{
    self, Thresholds, DEFAULT_DETECTION_THRESHOLD, DEFAULT_VERIFICATION_THRESHOLD,
};
use facegate_core::{gallery, preprocess, SiameseScorer};
use facegate_hw::Camera;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "facegate", about = "Facegate verification CLI")]
struct Cli {
    /// Base URL of the facegated HTTP interface
    #[arg(long, default_value = "http://127.0.0.1:5000", global = true)]
    daemon: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fire a manual verification cycle via the daemon
    Trigger,
    /// Show daemon status
    Status,
    /// Run the verification pipeline offline, without the daemon
    Verify {
        /// Probe image file
        #[arg(long)]
        probe: PathBuf,
        /// Gallery directory of reference images
        #[arg(long)]
        gallery: PathBuf,
        /// Similarity model artifact
        #[arg(long)]
        model: Option<PathBuf>,
        /// Per-pair detection cutoff
        #[arg(long, default_value_t = DEFAULT_DETECTION_THRESHOLD)]
        detection_threshold: f32,
        /// Cycle-level verification cutoff
        #[arg(long, default_value_t = DEFAULT_VERIFICATION_THRESHOLD)]
        verification_threshold: f32,
    },
    /// Run camera diagnostics
    Test {
        /// V4L2 device path
        #[arg(long, default_value = "/dev/video0")]
        device: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Trigger => {
            let url = format!("{}/trigger", cli.daemon);
            let response = reqwest::Client::new()
                .post(&url)
                .send()
                .await
                .with_context(|| format!("cannot reach facegated at {url}"))?;
            let body: serde_json::Value = response.json().await?;
            if body
                .get("accepted")
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
            {
                println!("Verification cycle started");
            } else {
                println!("Rejected: a verification cycle is already in flight");
            }
        }
        Commands::Status => {
            let url = format!("{}/status", cli.daemon);
            let response = reqwest::Client::new()
                .get(&url)
                .send()
                .await
                .with_context(|| format!("cannot reach facegated at {url}"))?;
            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Commands::Verify {
            probe,
            gallery,
            model,
            detection_threshold,
            verification_threshold,
        } => {
            let model_path = model
                .unwrap_or_else(|| facegate_core::default_model_dir().join("siamese_l1.onnx"));
            let mut scorer = SiameseScorer::load(&model_path.to_string_lossy())?;

            let probe_tensor = preprocess::from_file(&probe)?;
            let references = gallery::scan(&gallery)?;
            let thresholds = Thresholds {
                detection: detection_threshold,
                verification: verification_threshold,
            };

            let result =
                verdict::verify_probe(&mut scorer, &probe_tensor, &references, &thresholds)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Test { device } => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            } else {
                for info in &devices {
                    println!("{}  {} ({})", info.path, info.name, info.driver);
                }
            }

            let camera = Camera::open(&device)?;
            let frame = camera.capture_frame()?;
            println!(
                "Captured {}x{} frame (sequence {}, brightness {:.1})",
                frame.width,
                frame.height,
                frame.sequence,
                frame.avg_brightness()
            );
        }
    }

    Ok(())
}
