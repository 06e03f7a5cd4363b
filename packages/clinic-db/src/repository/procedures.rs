use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::{delete_by_id, PartialUpdate};
use crate::error::{Action, DbError, Entity, StorageContext};
use crate::models::{NewProcedure, Procedure, ProcedurePatch};

const COLUMNS: &str = "id, name, standard_price, description";

/// Catálogo de procedimentos (tabela `procedures`)
#[derive(Clone)]
pub struct ProcedureRepository {
    pool: SqlitePool,
}

impl ProcedureRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Procedure>, DbError> {
        sqlx::query_as::<_, Procedure>(&format!(
            "SELECT {} FROM procedures ORDER BY name COLLATE NOCASE ASC",
            COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .storage_context(Action::List, Entity::Procedure)
    }

    pub async fn create(&self, new: NewProcedure) -> Result<Procedure, DbError> {
        let procedure = sqlx::query_as::<_, Procedure>(&format!(
            "INSERT INTO procedures ({}) VALUES (?, ?, ?, ?) RETURNING {}",
            COLUMNS, COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.name.trim())
        .bind(new.standard_price.to_string())
        .bind(&new.description)
        .fetch_one(&self.pool)
        .await
        .storage_context(Action::Create, Entity::Procedure)?;

        info!(id = %procedure.id, "procedimento cadastrado");
        Ok(procedure)
    }

    pub async fn update(&self, id: Uuid, patch: ProcedurePatch) -> Result<(), DbError> {
        let mut update = PartialUpdate::new("procedures");
        update
            .set_some("name", patch.name.map(|name| name.trim().to_string()))
            .set_some("standard_price", patch.standard_price.map(|p| p.to_string()))
            .set_some("description", patch.description);
        update
            .execute(&self.pool, id)
            .await
            .storage_context(Action::Update, Entity::Procedure)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        delete_by_id(&self.pool, "procedures", id)
            .await
            .storage_context(Action::Delete, Entity::Procedure)
    }
}
