//! Repositórios por entidade
//!
//! Cada repositório traduz entre as colunas do banco e o modelo de domínio
//! e expõe `list`, `create`, `update` (parcial) e `delete`. Não há cache nem
//! retentativa: o estado em memória pertence a quem chama.

use sqlx::sqlite::SqliteQueryResult;
use sqlx::{Encode, QueryBuilder, Sqlite, SqlitePool, Type};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbError;

pub mod appointments;
pub mod expenses;
pub mod patients;
pub mod payments;
pub mod procedures;

pub use appointments::AppointmentRepository;
pub use expenses::ExpenseRepository;
pub use patients::PatientRepository;
pub use payments::PaymentRepository;
pub use procedures::ProcedureRepository;

/// Conjunto dos cinco repositórios, compartilhando o mesmo pool
#[derive(Clone)]
pub struct Repositories {
    pub patients: PatientRepository,
    pub procedures: ProcedureRepository,
    pub appointments: AppointmentRepository,
    pub payments: PaymentRepository,
    pub expenses: ExpenseRepository,
}

impl Repositories {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            patients: PatientRepository::new(pool.clone()),
            procedures: ProcedureRepository::new(pool.clone()),
            appointments: AppointmentRepository::new(pool.clone()),
            payments: PaymentRepository::new(pool.clone()),
            expenses: ExpenseRepository::new(pool),
        }
    }
}

/// `UPDATE` montado apenas com os campos informados
pub(crate) struct PartialUpdate<'args> {
    table: &'static str,
    builder: QueryBuilder<'args, Sqlite>,
    fields: usize,
}

impl<'args> PartialUpdate<'args> {
    pub(crate) fn new(table: &'static str) -> Self {
        Self {
            table,
            builder: QueryBuilder::new(format!("UPDATE {} SET ", table)),
            fields: 0,
        }
    }

    pub(crate) fn set<T>(&mut self, column: &str, value: T) -> &mut Self
    where
        T: 'args + Encode<'args, Sqlite> + Send + Type<Sqlite>,
    {
        if self.fields > 0 {
            self.builder.push(", ");
        }
        self.builder.push(column).push(" = ").push_bind(value);
        self.fields += 1;
        self
    }

    pub(crate) fn set_some<T>(&mut self, column: &str, value: Option<T>) -> &mut Self
    where
        T: 'args + Encode<'args, Sqlite> + Send + Type<Sqlite>,
    {
        if let Some(value) = value {
            self.set(column, value);
        }
        self
    }

    pub(crate) async fn execute(mut self, pool: &SqlitePool, id: Uuid) -> Result<(), DbError> {
        if self.fields == 0 {
            // Nada a alterar, mas o registro precisa existir
            return ensure_exists(pool, self.table, id).await;
        }
        debug!(table = self.table, fields = self.fields, %id, "atualização parcial");
        self.builder.push(" WHERE id = ").push_bind(id);
        let result = self.builder.build().execute(pool).await?;
        expect_affected(result, id)
    }
}

pub(crate) async fn ensure_exists(pool: &SqlitePool, table: &str, id: Uuid) -> Result<(), DbError> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {} WHERE id = ?", table))
        .bind(id)
        .fetch_one(pool)
        .await?;
    if count == 0 {
        return Err(DbError::NotFound(id.to_string()));
    }
    Ok(())
}

pub(crate) async fn delete_by_id(pool: &SqlitePool, table: &str, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", table))
        .bind(id)
        .execute(pool)
        .await?;
    expect_affected(result, id)
}

fn expect_affected(result: SqliteQueryResult, id: Uuid) -> Result<(), DbError> {
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound(id.to_string()));
    }
    Ok(())
}
