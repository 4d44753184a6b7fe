use dotenvy::dotenv;
use job_pipeline::config::init_config;
use job_pipeline::routes::setup_server;
use job_pipeline::worker::Worker;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Start the gateway server and the worker loop
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    // initial config setup; a missing queue URL or unreachable store is
    // fatal here, before anything starts
    let config = init_config().await?;

    let cancellation_token = CancellationToken::new();

    let address = setup_server(config.clone(), cancellation_token.clone()).await;
    tracing::info!("Listening on http://{}", address);

    let worker = Worker::new(config, cancellation_token.clone());
    let worker_handle = tokio::spawn(async move { worker.run().await });

    wait_for_shutdown_signal().await;
    tracing::info!("Stop requested, letting the in-flight job finish");
    cancellation_token.cancel();

    worker_handle.await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("Failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
