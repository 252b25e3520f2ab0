use anyhow::Context;
use scalabel_dashboard::{
    load_bootstrap, load_config, logging::init_logging, report::render_text, CredentialSource,
    DashboardStore, EnvCredential, HttpMetadataFetcher, NoCredential, SyncEngine,
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_logging(&config);

    let bootstrap = load_bootstrap(&config.bootstrap_path)?;
    let mut store = DashboardStore::initialize(bootstrap).context("invalid bootstrap")?;
    info!(
        event = "dashboard_start",
        project = %store.snapshot().project_metadata.name,
        tasks = store.snapshot().len(),
        polling = store.snapshot().is_polling(),
        endpoint = %config.endpoint
    );

    if store.snapshot().is_polling() {
        let credentials: Arc<dyn CredentialSource> = match config.credential_env.as_deref() {
            Some(var) => Arc::new(EnvCredential::new(var)),
            None => Arc::new(NoCredential),
        };
        let fetcher = HttpMetadataFetcher::new(config.endpoint.clone(), credentials);
        let engine = SyncEngine::new(fetcher, config.sync.clone());
        let interrupted = tokio::select! {
            result = engine.run(&mut store) => {
                let report = result?;
                info!(
                    event = "dashboard_synced",
                    resolved = report.resolved,
                    failed = report.failed,
                    pending = report.pending
                );
                false
            }
            _ = tokio::signal::ctrl_c() => true,
        };
        if interrupted {
            warn!(
                event = "sync_interrupted",
                applied = store.applied(),
                pending = store.snapshot().pending_indices().len()
            );
        }
    }

    print!("{}", render_text(store.snapshot(), config.vendor));
    Ok(())
}
