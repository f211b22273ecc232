//! ScholarSynth server binary.

use scholarsynth::{api, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pick up a local .env before reading configuration.
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scholarsynth=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    api::serve(config).await
}
