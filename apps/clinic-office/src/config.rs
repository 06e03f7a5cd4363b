//! Configuração do serviço
//!
//! Ordem de precedência: valores padrão, arquivo `clinic.toml` (opcional) e
//! variáveis de ambiente `CLINIC_*`.

use clinic_db::DbConfig;
use config::{Config, ConfigError, Environment, File, Source};
use serde::Deserialize;
use std::time::Duration;

use crate::settings::IntegrationSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_path: String,
    pub database_max_connections: u32,
    pub bind_addr: String,
    pub webhook_confirmation: String,
    pub webhook_reminder: String,
    pub webhook_billing: String,
    pub webhook_timeout_secs: u64,
    pub log_json: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(
            File::with_name("clinic").required(false),
            Environment::with_prefix("CLINIC").try_parsing(true),
        )
    }

    fn build<F, E>(file: F, env: E) -> Result<Self, ConfigError>
    where
        F: Source + Send + Sync + 'static,
        E: Source + Send + Sync + 'static,
    {
        Config::builder()
            .set_default("database_path", "data/clinic.db")?
            .set_default("database_max_connections", 5_i64)?
            .set_default("bind_addr", "127.0.0.1:8080")?
            .set_default("webhook_confirmation", "")?
            .set_default("webhook_reminder", "")?
            .set_default("webhook_billing", "")?
            .set_default("webhook_timeout_secs", 10_i64)?
            .set_default("log_json", false)?
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            db_path: self.database_path.clone(),
            max_connections: self.database_max_connections,
        }
    }

    /// URLs iniciais dos webhooks; podem ser trocadas em tempo de execução
    pub fn integration_settings(&self) -> IntegrationSettings {
        IntegrationSettings {
            webhook_confirmation: self.webhook_confirmation.clone(),
            webhook_reminder: self.webhook_reminder.clone(),
            webhook_billing: self.webhook_billing.clone(),
        }
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }
}
