use std::sync::Arc;

use secretspin::{
    cluster::{ClusterApi, DockerClusterApi},
    detector::SecretWatcher,
    observability::init_tracing,
    queue::UpdateQueue,
    rotation::RotationOrchestrator,
    Config, Result, APP_NAME, VERSION,
};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (optional - won't fail if missing)
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let config = Config::load()?;
    init_tracing(&config.log_level, config.log_format.parse()?)?;

    info!(app_name = APP_NAME, version = VERSION, "Launching Swarm secret rotation daemon");
    info!(
        namespaces = config.namespaces.len(),
        update_interval_ms = config.update_interval_ms,
        detection_interval_ms = config.update_detection_interval_ms,
        max_versions = config.max_versions,
        docker_endpoint = %config.docker.endpoint,
        "Loaded configuration"
    );

    let api: Arc<dyn ClusterApi> = Arc::new(DockerClusterApi::new(&config.docker_config())?);
    let queue = UpdateQueue::new();

    // One long-lived watch loop per namespace. Failure to open a watched
    // directory is the only fatal path past this point, and it is checked
    // here, before anything is spawned.
    let mut watchers = Vec::new();
    for (namespace, directory) in &config.namespaces {
        watchers.push(SecretWatcher::new(
            namespace.clone(),
            directory.clone(),
            queue.clone(),
            config.watcher_config(),
        )?);
    }

    let mut tasks = Vec::new();
    for watcher in watchers {
        tasks.push(tokio::spawn(watcher.run(shutdown_signal())));
    }

    let orchestrator = RotationOrchestrator::new(api, queue, config.rotation_config());
    orchestrator.run(shutdown_signal()).await;

    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "Watch task terminated abnormally");
        }
    }

    info!("Shutdown completed");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to install CTRL+C signal handler");
        std::future::pending::<()>().await;
    }
}
