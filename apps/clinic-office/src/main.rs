use anyhow::{Context, Result};
use clinic_db::{init_db_pool, Repositories};
use clinic_office::api::{self, AppState};
use clinic_office::config::AppConfig;
use clinic_office::notify::Notifier;
use clinic_office::Store;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::load().context("Falha ao carregar configuração")?;
    init_tracing(config.log_json);

    let pool = init_db_pool(&config.db_config()).await?;
    let store = Arc::new(Store::new(
        Repositories::new(pool),
        config.integration_settings(),
    ));
    let notifier = Notifier::new(config.webhook_timeout())?;

    let app = api::router(AppState { store, notifier });

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("Endereço inválido: {}", config.bind_addr))?;
    info!(%addr, "clinic-office iniciado");

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Servidor HTTP encerrado com erro")?;

    info!("clinic-office encerrado");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("sinal de encerramento recebido");
}
