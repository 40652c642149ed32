use anyhow::Context;
use snapkeeper_orchestrator::provider_manager::ProviderManager;
use snapkeeper_orchestrator::{run, Settings};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // The scheduler may hand us an event payload; nothing in it affects the run.
    if let Some(event) = std::env::args().nth(1) {
        tracing::debug!("ignoring trigger payload ({} bytes)", event.len());
    }

    let settings = Settings::from_env().context("invalid configuration")?;
    tracing::info!(
        "🚀 snapkeeper starting: provider={} region={} retention={}d ({})",
        settings.provider,
        settings.region,
        settings.retention.threshold_days,
        settings.retention.mode.as_str()
    );

    let (provider, publisher) = ProviderManager::get_provider(&settings).await?;
    let report = run(provider.as_ref(), publisher.as_ref(), &settings, chrono::Utc::now()).await;

    tracing::info!(
        "✅ snapkeeper finished: {}",
        serde_json::to_string(&report).unwrap_or_default()
    );
    Ok(())
}
