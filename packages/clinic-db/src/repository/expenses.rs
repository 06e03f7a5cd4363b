use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::{delete_by_id, PartialUpdate};
use crate::error::{Action, DbError, Entity, StorageContext};
use crate::models::{Expense, ExpensePatch, NewExpense};

const COLUMNS: &str = "id, description, amount, expense_date, expense_type, notes";

/// Repositório de despesas (tabela `expenses`)
#[derive(Clone)]
pub struct ExpenseRepository {
    pool: SqlitePool,
}

impl ExpenseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Expense>, DbError> {
        sqlx::query_as::<_, Expense>(&format!(
            "SELECT {} FROM expenses ORDER BY expense_date DESC",
            COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .storage_context(Action::List, Entity::Expense)
    }

    pub async fn create(&self, new: NewExpense) -> Result<Expense, DbError> {
        let expense = sqlx::query_as::<_, Expense>(&format!(
            "INSERT INTO expenses ({}) VALUES (?, ?, ?, ?, ?, ?) RETURNING {}",
            COLUMNS, COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.description.trim())
        .bind(new.amount.to_string())
        .bind(new.date)
        .bind(new.expense_type.map(|t| t.as_str()))
        .bind(&new.notes)
        .fetch_one(&self.pool)
        .await
        .storage_context(Action::Create, Entity::Expense)?;

        info!(id = %expense.id, amount = %expense.amount, "despesa registrada");
        Ok(expense)
    }

    pub async fn update(&self, id: Uuid, patch: ExpensePatch) -> Result<(), DbError> {
        let mut update = PartialUpdate::new("expenses");
        update
            .set_some("description", patch.description.map(|d| d.trim().to_string()))
            .set_some("amount", patch.amount.map(|a| a.to_string()))
            .set_some("expense_date", patch.date)
            .set_some("expense_type", patch.expense_type.map(|t| t.map(|t| t.to_string())))
            .set_some("notes", patch.notes);
        update
            .execute(&self.pool, id)
            .await
            .storage_context(Action::Update, Entity::Expense)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        delete_by_id(&self.pool, "expenses", id)
            .await
            .storage_context(Action::Delete, Entity::Expense)
    }
}
