//! URLs dos webhooks de integração

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AppError;

/// Vazio significa "não configurado"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationSettings {
    #[serde(default)]
    pub webhook_confirmation: String,
    #[serde(default)]
    pub webhook_reminder: String,
    #[serde(default)]
    pub webhook_billing: String,
}

impl IntegrationSettings {
    /// Remove espaços e rejeita URLs que não sejam http(s)
    pub fn normalized(self) -> Result<Self, AppError> {
        Ok(Self {
            webhook_confirmation: check_url("webhook_confirmation", &self.webhook_confirmation)?,
            webhook_reminder: check_url("webhook_reminder", &self.webhook_reminder)?,
            webhook_billing: check_url("webhook_billing", &self.webhook_billing)?,
        })
    }
}

fn check_url(field: &str, raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(trimmed.to_string()),
        _ => Err(AppError::Validation(format!(
            "{}: URL inválida '{}'",
            field, trimmed
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_urls_are_allowed_and_others_must_be_http() {
        let ok = IntegrationSettings {
            webhook_billing: "  https://n8n.example.com/webhook/cobranca ".to_string(),
            ..Default::default()
        }
        .normalized()
        .unwrap();
        assert_eq!(ok.webhook_billing, "https://n8n.example.com/webhook/cobranca");
        assert!(ok.webhook_reminder.is_empty());

        let bad = IntegrationSettings {
            webhook_reminder: "ftp://example.com".to_string(),
            ..Default::default()
        }
        .normalized();
        assert!(matches!(bad, Err(AppError::Validation(_))));
    }
}
