//! Binary entry point that wires environment bootstrap, logging, and
//! launches the conversational tutor loop.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voxtutor::assistant;

#[tokio::main]
/// Bootstraps environment variables and logging, then runs the assistant.
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voxtutor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    assistant::run_assistant().await
}
