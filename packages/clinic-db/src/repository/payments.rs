use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::{delete_by_id, PartialUpdate};
use crate::error::{Action, DbError, Entity, StorageContext};
use crate::models::{NewPayment, Payment, PaymentPatch};

const SELECT_JOINED: &str = r#"
    SELECT t.id, t.patient_id, p.full_name AS patient_name,
           t.procedure_id, pr.name AS procedure_name,
           t.amount, t.transaction_date, t.payment_method, t.payment_status, t.notes
    FROM payments t
    LEFT JOIN patients p ON p.id = t.patient_id
    LEFT JOIN procedures pr ON pr.id = t.procedure_id
"#;

/// Repositório de pagamentos (tabela `payments`)
#[derive(Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Mais recentes primeiro
    pub async fn list(&self) -> Result<Vec<Payment>, DbError> {
        sqlx::query_as::<_, Payment>(&format!("{} ORDER BY t.transaction_date DESC", SELECT_JOINED))
            .fetch_all(&self.pool)
            .await
            .storage_context(Action::List, Entity::Payment)
    }

    pub async fn create(&self, new: NewPayment) -> Result<Payment, DbError> {
        self.insert(new)
            .await
            .storage_context(Action::Create, Entity::Payment)
    }

    pub async fn update(&self, id: Uuid, patch: PaymentPatch) -> Result<(), DbError> {
        let mut update = PartialUpdate::new("payments");
        update
            .set_some("patient_id", patch.patient_id)
            .set_some("procedure_id", patch.procedure_id)
            .set_some("amount", patch.amount.map(|a| a.to_string()))
            .set_some("transaction_date", patch.date)
            .set_some("payment_status", patch.status.map(|s| s.to_string()))
            .set_some("payment_method", patch.method.map(|m| m.map(|m| m.to_string())))
            .set_some("notes", patch.notes);
        update
            .execute(&self.pool, id)
            .await
            .storage_context(Action::Update, Entity::Payment)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        delete_by_id(&self.pool, "payments", id)
            .await
            .storage_context(Action::Delete, Entity::Payment)
    }

    async fn insert(&self, new: NewPayment) -> Result<Payment, DbError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO payments \
             (id, patient_id, procedure_id, amount, transaction_date, payment_method, payment_status, notes) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(new.patient_id)
        .bind(new.procedure_id)
        .bind(new.amount.to_string())
        .bind(new.date)
        .bind(new.method.map(|m| m.as_str()))
        .bind(new.status.as_str())
        .bind(&new.notes)
        .execute(&self.pool)
        .await?;

        info!(%id, amount = %new.amount, status = %new.status, "pagamento registrado");

        let payment = sqlx::query_as::<_, Payment>(&format!("{} WHERE t.id = ?", SELECT_JOINED))
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(payment)
    }
}
