use anyhow::Result;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use clinic_db::{init_db_pool, DbConfig, Repositories};
use clinic_office::api::{self, AppState};
use clinic_office::notify::Notifier;
use clinic_office::settings::IntegrationSettings;
use clinic_office::Store;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn app() -> Result<(TempDir, Router)> {
    let dir = tempfile::tempdir()?;
    let pool = init_db_pool(&DbConfig {
        db_path: dir.path().join("api.db").to_string_lossy().into_owned(),
        max_connections: 2,
    })
    .await?;
    let store = Arc::new(Store::new(
        Repositories::new(pool),
        IntegrationSettings::default(),
    ));
    let notifier = Notifier::new(Duration::from_secs(2))?;
    Ok((dir, api::router(AppState { store, notifier })))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&value)?)
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(request.body(body)?).await?;
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await?;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, json))
}

async fn login(app: &Router) -> Result<()> {
    let (status, _) = call(
        app,
        Method::POST,
        "/api/session",
        Some(json!({ "name": "Dra. Helena", "email": "helena@clinica.med.br" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

async fn create_patient(app: &Router, name: &str, cpf: &str) -> Result<String> {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/patients",
        Some(json!({ "name": name, "cpf": cpf })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["outcome"], "created");
    Ok(body["id"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn health_answers_without_session() -> Result<()> {
    let (_dir, app) = app().await?;
    let (status, body) = call(&app, Method::GET, "/health", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn data_routes_require_a_session() -> Result<()> {
    let (_dir, app) = app().await?;

    for uri in ["/api/patients", "/api/dashboard", "/api/balances", "/api/settings"] {
        let (status, body) = call(&app, Method::GET, uri, None).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }
    Ok(())
}

#[tokio::test]
async fn patients_can_be_created_searched_and_deduplicated() -> Result<()> {
    let (_dir, app) = app().await?;
    login(&app).await?;

    create_patient(&app, "Ana Silva", "123.456.789-00").await?;
    create_patient(&app, "Bruno Souza", "23456789011").await?;

    let (_, found) = call(&app, Method::GET, "/api/patients?q=ana", None).await?;
    let found = found.as_array().cloned().unwrap_or_default();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["cpf"], "12345678900");
    assert_eq!(found[0]["status"], "Novo");

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/patients",
        Some(json!({ "name": "Outra Ana", "cpf": "12345678900" })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION");
    Ok(())
}

#[tokio::test]
async fn delete_needs_explicit_confirmation() -> Result<()> {
    let (_dir, app) = app().await?;
    login(&app).await?;
    let id = create_patient(&app, "Carla Dias", "34567890122").await?;

    let uri = format!("/api/patients/{}", id);
    let (status, _) = call(&app, Method::DELETE, &uri, None).await?;
    assert_eq!(status, StatusCode::PRECONDITION_REQUIRED);

    let (_, listed) = call(&app, Method::GET, "/api/patients", None).await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    let (status, body) = call(&app, Method::DELETE, &format!("{}?confirm=true", uri), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "deleted");

    let (_, listed) = call(&app, Method::GET, "/api/patients", None).await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn dashboard_reflects_paid_and_pending_payments() -> Result<()> {
    let (_dir, app) = app().await?;
    login(&app).await?;
    let ana = create_patient(&app, "A", "11111111111").await?;

    for (amount, date, status) in [
        ("100", "2026-10-02", "Pago"),
        ("50", "18/09/2026", "pendente"),
    ] {
        let (code, body) = call(
            &app,
            Method::POST,
            "/api/payments",
            Some(json!({
                "patient_id": ana,
                "amount": amount,
                "date": date,
                "status": status,
                "method": "PIX",
            })),
        )
        .await?;
        assert_eq!(code, StatusCode::CREATED, "{}", body);
    }

    let (status, dashboard) = call(&app, Method::GET, "/api/dashboard?today=2026-10-18", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["monthly_revenue"], "100");
    assert_eq!(dashboard["pending_amount"], "50");
    assert_eq!(dashboard["pending_balances"][0]["name"], "A");
    assert_eq!(dashboard["pending_balances"][0]["amount"], "50");
    assert_eq!(dashboard["revenue_series"].as_array().map(Vec::len), Some(6));
    assert_eq!(dashboard["revenue_series"][5]["month"], "out");

    let (_, balances) = call(&app, Method::GET, "/api/balances", None).await?;
    assert_eq!(balances["paid"][0]["amount"], "100");
    assert_eq!(balances["pending"][0]["amount"], "50");
    Ok(())
}

#[tokio::test]
async fn agenda_lists_a_single_day_in_time_order() -> Result<()> {
    let (_dir, app) = app().await?;
    login(&app).await?;
    let ana = create_patient(&app, "Ana Silva", "12345678900").await?;

    for (date, time) in [("2026-10-20", "14:30"), ("2026-10-20", "08:00"), ("2026-10-21", "09:00")] {
        let (code, body) = call(
            &app,
            Method::POST,
            "/api/appointments",
            Some(json!({ "patient_id": ana, "date": date, "time": time })),
        )
        .await?;
        assert_eq!(code, StatusCode::CREATED, "{}", body);
    }

    let (status, agenda) = call(&app, Method::GET, "/api/appointments/day/2026-10-20", None).await?;
    assert_eq!(status, StatusCode::OK);
    let times: Vec<&str> = agenda
        .as_array()
        .map(|items| items.iter().filter_map(|a| a["time"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(times, vec!["08:00", "14:30"]);
    assert_eq!(agenda[0]["patient_name"], "Ana Silva");
    assert_eq!(agenda[0]["procedure_name"], "Desconhecido");
    Ok(())
}

#[tokio::test]
async fn billing_without_webhook_is_a_configuration_error() -> Result<()> {
    let (_dir, app) = app().await?;
    login(&app).await?;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/notifications/billing",
        Some(json!({ "patient_name": "Carla Dias", "amount": "800" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "CONFIGURATION");
    Ok(())
}

#[tokio::test]
async fn appointment_reminder_goes_to_the_saved_webhook() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/lembrete"))
        .and(body_partial_json(json!({
            "event": "appointment.reminder",
            "patient_name": "Ana Silva",
            "time": "14:30",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, app) = app().await?;
    login(&app).await?;
    let (status, _) = call(
        &app,
        Method::PUT,
        "/api/settings",
        Some(json!({ "webhook_reminder": format!("{}/lembrete", server.uri()) })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let ana = create_patient(&app, "Ana Silva", "12345678900").await?;
    let (_, created) = call(
        &app,
        Method::POST,
        "/api/appointments",
        Some(json!({ "patient_id": ana, "date": "2026-10-20", "time": "14:30" })),
    )
    .await?;
    let id = created["id"].as_str().unwrap_or_default().to_string();

    let uri = format!("/api/appointments/{}/notify", id);
    let (status, body) = call(&app, Method::POST, &uri, Some(json!({ "kind": "reminder" }))).await?;
    assert_eq!(status, StatusCode::ACCEPTED, "{}", body);

    // Confirmação sem URL salva não dispara nada
    let (status, body) = call(&app, Method::POST, &uri, Some(json!({ "kind": "confirmation" }))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "CONFIGURATION");
    Ok(())
}

#[tokio::test]
async fn notifying_an_unknown_appointment_is_not_found() -> Result<()> {
    let (_dir, app) = app().await?;
    login(&app).await?;

    let uri = format!("/api/appointments/{}/notify", uuid::Uuid::new_v4());
    let (status, body) = call(&app, Method::POST, &uri, Some(json!({ "kind": "reminder" }))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = call(&app, Method::POST, &uri, Some(json!({ "kind": "billing" }))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn logout_closes_access_to_data() -> Result<()> {
    let (_dir, app) = app().await?;
    login(&app).await?;
    create_patient(&app, "Ana Silva", "12345678900").await?;

    let (status, _) = call(&app, Method::DELETE, "/api/session", None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(&app, Method::GET, "/api/patients", None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}
