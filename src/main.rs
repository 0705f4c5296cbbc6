use anyhow::Context;
use smpp_hlr_gateway::config::{LogFormat, Settings};
use smpp_hlr_gateway::server;
use tracing_subscriber::EnvFilter;

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone()));

    match settings.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Console => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("configuration error")?;
    init_tracing(&settings);

    // `healthcheck` probes the external collaborators and exits; anything
    // else runs the gateway.
    if std::env::args().nth(1).as_deref() == Some("healthcheck") {
        let code = server::healthcheck(&settings).await;
        std::process::exit(code);
    }

    server::run(settings).await
}
