//! Headless diagram bridge over stdin/stdout.
//!
//! Reads host envelopes as newline-delimited JSON from stdin and writes
//! requests and render events to stdout. All tracing output goes to stderr
//! so that stdout remains a clean JSON protocol channel.

use inkstream::InkConfig;
use inkstream::host::stdio::run_stdio_bridge;

fn load_config() -> anyhow::Result<InkConfig> {
    let path = std::env::var_os("INKSTREAM_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(InkConfig::default_config_path);
    let mut config = if path.exists() {
        tracing::info!(path = %path.display(), "loading config");
        InkConfig::from_file(&path)?
    } else {
        InkConfig::default()
    };
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    tracing::info!(
        backend = ?config.checkpoint.backend,
        "inkstream-host starting"
    );

    run_stdio_bridge(&config).await.map_err(|e| {
        tracing::error!(error = %e, "inkstream-host exited with error");
        anyhow::anyhow!("inkstream-host failed: {e}")
    })?;

    tracing::info!("inkstream-host shut down cleanly");
    Ok(())
}
