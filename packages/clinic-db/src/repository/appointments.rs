use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::{delete_by_id, PartialUpdate};
use crate::error::{Action, DbError, Entity, StorageContext};
use crate::models::{Appointment, AppointmentPatch, NewAppointment, TIME_FORMAT};

/// Agendamento com os nomes de paciente e procedimento resolvidos na leitura
const SELECT_JOINED: &str = r#"
    SELECT a.id, a.patient_id, p.full_name AS patient_name,
           a.procedure_id, pr.name AS procedure_name,
           a.procedure_date, a.start_time, a.status, a.client_notes
    FROM appointments a
    LEFT JOIN patients p ON p.id = a.patient_id
    LEFT JOIN procedures pr ON pr.id = a.procedure_id
"#;

/// Repositório de agendamentos (tabela `appointments`)
#[derive(Clone)]
pub struct AppointmentRepository {
    pool: SqlitePool,
}

impl AppointmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Mais recentes primeiro (data, depois horário)
    pub async fn list(&self) -> Result<Vec<Appointment>, DbError> {
        sqlx::query_as::<_, Appointment>(&format!(
            "{} ORDER BY a.procedure_date DESC, a.start_time DESC",
            SELECT_JOINED
        ))
        .fetch_all(&self.pool)
        .await
        .storage_context(Action::List, Entity::Appointment)
    }

    pub async fn create(&self, new: NewAppointment) -> Result<Appointment, DbError> {
        self.insert(new)
            .await
            .storage_context(Action::Create, Entity::Appointment)
    }

    pub async fn update(&self, id: Uuid, patch: AppointmentPatch) -> Result<(), DbError> {
        let mut update = PartialUpdate::new("appointments");
        update
            .set_some("patient_id", patch.patient_id)
            .set_some("procedure_id", patch.procedure_id)
            .set_some("procedure_date", patch.date)
            .set_some("start_time", patch.time.map(|t| t.format(TIME_FORMAT).to_string()))
            .set_some("status", patch.status.map(|s| s.to_string()))
            .set_some("client_notes", patch.notes);
        update
            .execute(&self.pool, id)
            .await
            .storage_context(Action::Update, Entity::Appointment)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        delete_by_id(&self.pool, "appointments", id)
            .await
            .storage_context(Action::Delete, Entity::Appointment)
    }

    async fn insert(&self, new: NewAppointment) -> Result<Appointment, DbError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO appointments \
             (id, patient_id, procedure_id, procedure_date, start_time, status, client_notes) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(new.patient_id)
        .bind(new.procedure_id)
        .bind(new.date)
        .bind(new.time.format(TIME_FORMAT).to_string())
        .bind(new.status.as_str())
        .bind(&new.notes)
        .execute(&self.pool)
        .await?;

        info!(%id, date = %new.date, "agendamento criado");

        let appointment = sqlx::query_as::<_, Appointment>(&format!("{} WHERE a.id = ?", SELECT_JOINED))
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(appointment)
    }
}
