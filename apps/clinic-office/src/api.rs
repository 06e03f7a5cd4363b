//! Rotas HTTP do consultório

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{Local, NaiveDate};
use clinic_db::models::{
    parse_calendar_date, AppointmentPatch, ExpensePatch, NewAppointment, NewExpense, NewPatient,
    NewPayment, NewProcedure, PatientPatch, PaymentPatch, ProcedurePatch,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::aggregation;
use crate::error::AppError;
use crate::notify::{Notifier, WebhookKind};
use crate::session::UserProfile;
use crate::settings::IntegrationSettings;
use crate::store::{Mutation, MutationOutcome, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub notifier: Notifier,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/session",
            get(current_user).post(login).put(update_user).delete(logout),
        )
        .route("/api/dashboard", get(dashboard))
        .route("/api/reports/financial", get(financial_report))
        .route("/api/balances", get(balances))
        .route("/api/patients", get(list_patients).post(create_patient))
        .route("/api/patients/:id", patch(update_patient).delete(delete_patient))
        .route("/api/procedures", get(list_procedures).post(create_procedure))
        .route("/api/procedures/:id", patch(update_procedure).delete(delete_procedure))
        .route("/api/appointments", get(list_appointments).post(create_appointment))
        .route(
            "/api/appointments/:id",
            patch(update_appointment).delete(delete_appointment),
        )
        .route("/api/appointments/day/:date", get(agenda_for_day))
        .route("/api/appointments/:id/notify", post(notify_appointment))
        .route("/api/payments", get(list_payments).post(create_payment))
        .route("/api/payments/:id", patch(update_payment).delete(delete_payment))
        .route("/api/expenses", get(list_expenses).post(create_expense))
        .route("/api/expenses/:id", patch(update_expense).delete(delete_expense))
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/api/settings/test", post(test_webhook))
        .route("/api/notifications/billing", post(send_billing))
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

const MAX_CONCURRENT_REQUESTS: usize = 64;

type ApiResult<T> = Result<T, AppError>;

#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DeleteParams {
    #[serde(default)]
    confirm: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ReportParams {
    today: Option<NaiveDate>,
}

impl ReportParams {
    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "loading": state.store.is_loading(),
    }))
}

// ── Sessão ──────────────────────────────────────────────

async fn current_user(State(state): State<AppState>) -> ApiResult<Json<UserProfile>> {
    state.store.user().await.map(Json).ok_or(AppError::Unauthorized)
}

async fn login(
    State(state): State<AppState>,
    Json(profile): Json<UserProfile>,
) -> ApiResult<Json<UserProfile>> {
    state.store.login(profile.clone()).await?;
    Ok(Json(profile))
}

async fn update_user(
    State(state): State<AppState>,
    Json(profile): Json<UserProfile>,
) -> ApiResult<Json<UserProfile>> {
    state.store.update_user(profile.clone()).await?;
    Ok(Json(profile))
}

async fn logout(State(state): State<AppState>) -> StatusCode {
    state.store.logout().await;
    StatusCode::NO_CONTENT
}

// ── Relatórios ──────────────────────────────────────────

async fn dashboard(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.store.dashboard(params.today()).await?))
}

async fn financial_report(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.store.financial_trend(params.today()).await?))
}

async fn balances(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.store.balances().await?))
}

// ── Escrita genérica ────────────────────────────────────

async fn create(state: &AppState, mutation: Mutation) -> ApiResult<(StatusCode, Json<MutationOutcome>)> {
    let outcome = state.store.mutate(mutation).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn update(state: &AppState, mutation: Mutation) -> ApiResult<Json<MutationOutcome>> {
    Ok(Json(state.store.mutate(mutation).await?))
}

/// Exclusões exigem `?confirm=true`
async fn delete(
    state: &AppState,
    params: DeleteParams,
    mutation: Mutation,
) -> ApiResult<Json<MutationOutcome>> {
    if !params.confirm {
        return Err(AppError::ConfirmationRequired);
    }
    Ok(Json(state.store.mutate(mutation).await?))
}

// ── Pacientes ───────────────────────────────────────────

async fn list_patients(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<impl IntoResponse> {
    let snapshot = state.store.read().await?;
    let term = params.q.unwrap_or_default();
    Ok(Json(aggregation::search_patients(&snapshot.patients, &term)))
}

async fn create_patient(
    State(state): State<AppState>,
    Json(new): Json<NewPatient>,
) -> ApiResult<impl IntoResponse> {
    create(&state, Mutation::CreatePatient(new)).await
}

async fn update_patient(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<PatientPatch>,
) -> ApiResult<impl IntoResponse> {
    update(&state, Mutation::UpdatePatient(id, patch)).await
}

async fn delete_patient(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<DeleteParams>,
) -> ApiResult<impl IntoResponse> {
    delete(&state, params, Mutation::DeletePatient(id)).await
}

// ── Procedimentos ───────────────────────────────────────

async fn list_procedures(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let snapshot = state.store.read().await?;
    Ok(Json(snapshot.procedures.clone()))
}

async fn create_procedure(
    State(state): State<AppState>,
    Json(new): Json<NewProcedure>,
) -> ApiResult<impl IntoResponse> {
    create(&state, Mutation::CreateProcedure(new)).await
}

async fn update_procedure(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ProcedurePatch>,
) -> ApiResult<impl IntoResponse> {
    update(&state, Mutation::UpdateProcedure(id, patch)).await
}

async fn delete_procedure(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<DeleteParams>,
) -> ApiResult<impl IntoResponse> {
    delete(&state, params, Mutation::DeleteProcedure(id)).await
}

// ── Agenda ──────────────────────────────────────────────

async fn list_appointments(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let snapshot = state.store.read().await?;
    Ok(Json(snapshot.appointments.clone()))
}

/// Aceita `2026-10-18` ou `18/10/2026`
async fn agenda_for_day(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let day = parse_calendar_date(&raw)
        .ok_or_else(|| AppError::Validation(format!("date: data inválida '{}'", raw)))?;
    let snapshot = state.store.read().await?;
    Ok(Json(aggregation::appointments_on(&snapshot.appointments, day)))
}

async fn create_appointment(
    State(state): State<AppState>,
    Json(new): Json<NewAppointment>,
) -> ApiResult<impl IntoResponse> {
    create(&state, Mutation::CreateAppointment(new)).await
}

async fn update_appointment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<AppointmentPatch>,
) -> ApiResult<impl IntoResponse> {
    update(&state, Mutation::UpdateAppointment(id, patch)).await
}

async fn delete_appointment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<DeleteParams>,
) -> ApiResult<impl IntoResponse> {
    delete(&state, params, Mutation::DeleteAppointment(id)).await
}

// ── Financeiro ──────────────────────────────────────────

async fn list_payments(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<impl IntoResponse> {
    let snapshot = state.store.read().await?;
    let term = params.q.unwrap_or_default();
    Ok(Json(aggregation::search_payments(&snapshot.payments, &term)))
}

async fn create_payment(
    State(state): State<AppState>,
    Json(new): Json<NewPayment>,
) -> ApiResult<impl IntoResponse> {
    create(&state, Mutation::CreatePayment(new)).await
}

async fn update_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<PaymentPatch>,
) -> ApiResult<impl IntoResponse> {
    update(&state, Mutation::UpdatePayment(id, patch)).await
}

async fn delete_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<DeleteParams>,
) -> ApiResult<impl IntoResponse> {
    delete(&state, params, Mutation::DeletePayment(id)).await
}

async fn list_expenses(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<impl IntoResponse> {
    let snapshot = state.store.read().await?;
    let term = params.q.unwrap_or_default();
    Ok(Json(aggregation::search_expenses(&snapshot.expenses, &term)))
}

async fn create_expense(
    State(state): State<AppState>,
    Json(new): Json<NewExpense>,
) -> ApiResult<impl IntoResponse> {
    create(&state, Mutation::CreateExpense(new)).await
}

async fn update_expense(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ExpensePatch>,
) -> ApiResult<impl IntoResponse> {
    update(&state, Mutation::UpdateExpense(id, patch)).await
}

async fn delete_expense(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<DeleteParams>,
) -> ApiResult<impl IntoResponse> {
    delete(&state, params, Mutation::DeleteExpense(id)).await
}

// ── Configurações e notificações ────────────────────────

async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<IntegrationSettings>> {
    state.store.require_session().await?;
    Ok(Json(state.store.settings().await))
}

async fn put_settings(
    State(state): State<AppState>,
    Json(settings): Json<IntegrationSettings>,
) -> ApiResult<Json<IntegrationSettings>> {
    state.store.require_session().await?;
    Ok(Json(state.store.update_settings(settings).await?))
}

#[derive(Debug, Deserialize)]
struct WebhookTest {
    kind: WebhookKind,
    /// Sem URL, testa a que está salva para o tipo
    #[serde(default)]
    url: Option<String>,
}

async fn test_webhook(
    State(state): State<AppState>,
    Json(request): Json<WebhookTest>,
) -> ApiResult<StatusCode> {
    state.store.require_session().await?;
    let url = match request.url {
        Some(url) => url,
        None => request.kind.url(&state.store.settings().await).to_string(),
    };
    state.notifier.test_connection(request.kind, &url).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct BillingRequest {
    patient_name: String,
    amount: Decimal,
}

async fn send_billing(
    State(state): State<AppState>,
    Json(request): Json<BillingRequest>,
) -> ApiResult<StatusCode> {
    state.store.require_session().await?;
    let settings = state.store.settings().await;
    state
        .notifier
        .notify_billing(&settings, &request.patient_name, request.amount)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
struct AppointmentNotify {
    kind: WebhookKind,
}

/// Confirmação ou lembrete de uma consulta já gravada
async fn notify_appointment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AppointmentNotify>,
) -> ApiResult<StatusCode> {
    let appointment = {
        let snapshot = state.store.read().await?;
        snapshot
            .appointments
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(AppError::NotFound("Agendamento"))?
    };
    let settings = state.store.settings().await;
    match request.kind {
        WebhookKind::Confirmation => {
            state.notifier.notify_confirmation(&settings, &appointment).await?
        }
        WebhookKind::Reminder => state.notifier.notify_reminder(&settings, &appointment).await?,
        WebhookKind::Billing => {
            return Err(AppError::Validation(
                "kind: cobrança não se aplica a agendamentos".to_string(),
            ))
        }
    }
    Ok(StatusCode::ACCEPTED)
}
