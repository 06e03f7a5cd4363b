//! Clinic Office - Núcleo de gestão do consultório
//!
//! - Estado em memória com recarga completa após cada escrita
//! - Indicadores do painel e relatórios financeiros
//! - Disparo de notificações para webhooks
//! - API HTTP sobre tudo isso

pub mod aggregation;
pub mod api;
pub mod config;
pub mod error;
pub mod notify;
pub mod session;
pub mod settings;
pub mod store;
pub mod validation;

pub use error::AppError;
pub use store::Store;
