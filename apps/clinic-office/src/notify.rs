//! Disparo de notificações para webhooks externos (n8n, Zapier...)
//!
//! Uma única tentativa por disparo, sem fila nem retentativa. URL vazia é
//! erro de configuração e não chega a abrir conexão.

use chrono::NaiveDate;
use clinic_db::models::{Appointment, TIME_FORMAT};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};
use url::Url;

use crate::aggregation::format_currency;
use crate::error::AppError;
use crate::settings::IntegrationSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookKind {
    Confirmation,
    Reminder,
    Billing,
}

impl WebhookKind {
    pub fn url(self, settings: &IntegrationSettings) -> &str {
        match self {
            WebhookKind::Confirmation => &settings.webhook_confirmation,
            WebhookKind::Reminder => &settings.webhook_reminder,
            WebhookKind::Billing => &settings.webhook_billing,
        }
    }

    fn label(self) -> &'static str {
        match self {
            WebhookKind::Confirmation => "confirmação",
            WebhookKind::Reminder => "lembrete",
            WebhookKind::Billing => "cobrança",
        }
    }

    fn event(self) -> &'static str {
        match self {
            WebhookKind::Confirmation => "appointment.confirmation",
            WebhookKind::Reminder => "appointment.reminder",
            WebhookKind::Billing => "billing",
        }
    }
}

#[derive(Debug, Serialize)]
struct BillingNotice<'a> {
    event: &'static str,
    patient_name: &'a str,
    amount: Decimal,
    formatted_amount: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct AppointmentNotice<'a> {
    event: &'static str,
    patient_name: &'a str,
    procedure: &'a str,
    date: NaiveDate,
    time: String,
}

#[derive(Debug, Serialize)]
struct ConnectionTest {
    event: &'static str,
}

#[derive(Clone)]
pub struct Notifier {
    client: Client,
}

impl Notifier {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("cliente HTTP: {}", e)))?;
        Ok(Self { client })
    }

    /// Cobrança de saldo pendente para um paciente
    pub async fn notify_billing(
        &self,
        settings: &IntegrationSettings,
        patient_name: &str,
        amount: Decimal,
    ) -> Result<(), AppError> {
        let formatted_amount = format_currency(amount);
        let notice = BillingNotice {
            event: WebhookKind::Billing.event(),
            patient_name,
            amount,
            message: format!(
                "Olá {}, identificamos um saldo em aberto de {} no consultório.",
                patient_name, formatted_amount
            ),
            formatted_amount,
        };
        self.send(WebhookKind::Billing, WebhookKind::Billing.url(settings), &notice)
            .await
    }

    pub async fn notify_confirmation(
        &self,
        settings: &IntegrationSettings,
        appointment: &Appointment,
    ) -> Result<(), AppError> {
        self.appointment_notice(WebhookKind::Confirmation, settings, appointment)
            .await
    }

    pub async fn notify_reminder(
        &self,
        settings: &IntegrationSettings,
        appointment: &Appointment,
    ) -> Result<(), AppError> {
        self.appointment_notice(WebhookKind::Reminder, settings, appointment)
            .await
    }

    /// Sucesso somente com resposta 2xx
    pub async fn test_connection(&self, kind: WebhookKind, url: &str) -> Result<(), AppError> {
        self.send(kind, url, &ConnectionTest { event: "test" }).await
    }

    async fn appointment_notice(
        &self,
        kind: WebhookKind,
        settings: &IntegrationSettings,
        appointment: &Appointment,
    ) -> Result<(), AppError> {
        let notice = AppointmentNotice {
            event: kind.event(),
            patient_name: &appointment.patient_name,
            procedure: &appointment.procedure_name,
            date: appointment.date,
            time: appointment.time.format(TIME_FORMAT).to_string(),
        };
        self.send(kind, kind.url(settings), &notice).await
    }

    async fn send<T: Serialize>(&self, kind: WebhookKind, raw_url: &str, body: &T) -> Result<(), AppError> {
        let url = webhook_url(kind, raw_url)?;

        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(kind = kind.label(), %url, error = %e, "webhook inacessível");
                AppError::Notification(format!("webhook de {} inacessível: {}", kind.label(), e))
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(kind = kind.label(), %url, %status, "webhook recusou a notificação");
            return Err(AppError::Notification(format!(
                "webhook de {} respondeu {}",
                kind.label(),
                status
            )));
        }

        info!(kind = kind.label(), %status, "notificação enviada");
        Ok(())
    }
}

fn webhook_url(kind: WebhookKind, raw: &str) -> Result<Url, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::Configuration(format!(
            "URL do webhook de {} não configurada",
            kind.label()
        )));
    }
    Url::parse(trimmed)
        .map_err(|e| AppError::Configuration(format!("URL do webhook de {} inválida: {}", kind.label(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use clinic_db::models::AppointmentStatus;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier() -> Notifier {
        Notifier::new(Duration::from_secs(5)).unwrap()
    }

    fn billing_at(url: String) -> IntegrationSettings {
        IntegrationSettings {
            webhook_billing: url,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn billing_without_url_is_a_configuration_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = notifier()
            .notify_billing(&IntegrationSettings::default(), "Carla", "800".parse().unwrap())
            .await;
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[tokio::test]
    async fn billing_posts_once_with_patient_and_amount() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook/cobranca"))
            .and(body_partial_json(serde_json::json!({
                "event": "billing",
                "patient_name": "Carla Dias",
                "formatted_amount": "R$ 1.500,00",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let settings = billing_at(format!("{}/webhook/cobranca", server.uri()));
        notifier()
            .notify_billing(&settings, "Carla Dias", "1500".parse().unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_a_notification_error_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let result = notifier()
            .notify_billing(&billing_at(server.uri()), "Carla", "10".parse().unwrap())
            .await;
        assert!(matches!(result, Err(AppError::Notification(_))));
    }

    #[tokio::test]
    async fn reminder_carries_appointment_details() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "event": "appointment.reminder",
                "procedure": "Limpeza",
                "date": "2026-10-20",
                "time": "14:30",
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            patient_name: "Ana Silva".to_string(),
            procedure_id: None,
            procedure_name: "Limpeza".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            time: NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
            status: AppointmentStatus::Confirmed,
            notes: String::new(),
        };
        let settings = IntegrationSettings {
            webhook_reminder: server.uri(),
            ..Default::default()
        };
        notifier().notify_reminder(&settings, &appointment).await.unwrap();
    }

    #[tokio::test]
    async fn connection_test_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let notifier = notifier();
        assert!(notifier
            .test_connection(WebhookKind::Confirmation, &format!("{}/ok", server.uri()))
            .await
            .is_ok());
        assert!(notifier
            .test_connection(WebhookKind::Reminder, &format!("{}/missing", server.uri()))
            .await
            .is_err());
        assert!(matches!(
            notifier.test_connection(WebhookKind::Billing, "").await,
            Err(AppError::Configuration(_))
        ));
    }
}
