use anyhow::Context;
use cifar_client::{classify_dir, ClassificationClient, RetryConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_IMAGE_DIR: &str = "./image/";

#[derive(Parser, Debug)]
#[command(author, version, about = "Streams text or images to the CIFAR-10 classification service", long_about = None)]
struct Args {
    /// Remote address as host:port
    #[arg(long, default_value = "127.0.0.1:6010")]
    remote: String,
    /// Text sent to GetTextResult
    #[arg(long)]
    text: Option<String>,
    /// Directory whose files are each sent to GetResult
    #[arg(long = "img_root_dir")]
    img_root_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .init();

    let args = Args::parse();
    let mut client = ClassificationClient::connect(&args.remote, RetryConfig::default())
        .await
        .with_context(|| format!("failed to connect to {}", args.remote))?;

    if let Some(text) = &args.text {
        match client.get_text_result(text).await {
            Ok(length) => println!("{}", length),
            Err(e) => tracing::error!("GetTextResult failed: {}", e),
        }
    }

    let img_root_dir = match (args.img_root_dir, &args.text) {
        (Some(dir), _) => dir,
        (None, None) => PathBuf::from(DEFAULT_IMAGE_DIR),
        (None, Some(_)) => return Ok(()),
    };

    let results = classify_dir(&mut client, &img_root_dir)
        .await
        .with_context(|| format!("failed to list images in {}", img_root_dir.display()))?;
    for (_, result) in results {
        if let Ok(label) = result {
            println!("{}", label.as_str_name());
        }
    }

    Ok(())
}
