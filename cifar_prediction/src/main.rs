use cifar_prediction::{config, start_server};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "CIFAR-10 chunked-streaming classification service", long_about = None)]
struct Args {
    /// Port to listen on, overrides the configured one
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    let mut config = config::get_configuration()?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let log_level = &format!("{},ort=info", config.log_level.as_str());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(false)
                .with_level(true)
                .with_thread_names(true),
        )
        .init();

    start_server(config).await
}
