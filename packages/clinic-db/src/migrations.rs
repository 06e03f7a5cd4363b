//! Sistema de migrações para banco de dados
//!
//! Este módulo gerencia as migrações do banco de dados SQLite. A versão
//! aplicada fica em `PRAGMA user_version`.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{error, info};

/// Lista de migrações SQL a serem aplicadas
///
/// Não há chaves estrangeiras: excluir um paciente não remove seus
/// agendamentos nem pagamentos, e a leitura exibe "Desconhecido".
const MIGRATIONS: &[&str] = &[
    // 001_initial_schema.sql
    r#"
    CREATE TABLE IF NOT EXISTS patients (
        id BLOB PRIMARY KEY NOT NULL,
        full_name TEXT NOT NULL,
        tax_id TEXT NOT NULL,
        phone TEXT,
        email TEXT,
        address TEXT,
        status TEXT NOT NULL,
        notes TEXT,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS procedures (
        id BLOB PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        standard_price TEXT NOT NULL DEFAULT '0',
        description TEXT
    );

    CREATE TABLE IF NOT EXISTS appointments (
        id BLOB PRIMARY KEY NOT NULL,
        patient_id BLOB NOT NULL,
        procedure_id BLOB,
        procedure_date DATE NOT NULL,
        start_time TEXT NOT NULL,
        status TEXT NOT NULL,
        client_notes TEXT
    );

    -- Valores monetários como TEXT decimal, sem ponto flutuante
    CREATE TABLE IF NOT EXISTS payments (
        id BLOB PRIMARY KEY NOT NULL,
        patient_id BLOB NOT NULL,
        procedure_id BLOB,
        amount TEXT NOT NULL,
        transaction_date DATE NOT NULL,
        payment_method TEXT,
        payment_status TEXT NOT NULL,
        notes TEXT
    );

    CREATE TABLE IF NOT EXISTS expenses (
        id BLOB PRIMARY KEY NOT NULL,
        description TEXT NOT NULL,
        amount TEXT NOT NULL,
        expense_date DATE NOT NULL,
        expense_type TEXT,
        notes TEXT
    );

    -- Índices para otimização
    CREATE UNIQUE INDEX IF NOT EXISTS idx_patients_tax_id ON patients (tax_id);
    CREATE INDEX IF NOT EXISTS idx_patients_full_name ON patients (full_name);
    CREATE INDEX IF NOT EXISTS idx_appointments_patient_id ON appointments (patient_id);
    CREATE INDEX IF NOT EXISTS idx_appointments_date ON appointments (procedure_date);
    CREATE INDEX IF NOT EXISTS idx_payments_patient_id ON payments (patient_id);
    CREATE INDEX IF NOT EXISTS idx_payments_date ON payments (transaction_date);
    CREATE INDEX IF NOT EXISTS idx_expenses_date ON expenses (expense_date);
    "#,
];

/// Executa todas as migrações pendentes no banco de dados
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Aplicando migrações de banco de dados...");

    let mut version: i64 = 0;
    match sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
    {
        Ok(v) => version = v,
        Err(e) => {
            // Pode ser a primeira execução
            error!("Erro ao obter versão do banco: {}", e);
        }
    }

    info!("Versão atual do banco: {}", version);

    for (i, migration_sql) in MIGRATIONS.iter().enumerate() {
        let migration_version = (i + 1) as i64;

        if migration_version <= version {
            info!("Migração {} já aplicada", migration_version);
            continue;
        }

        info!("Aplicando migração {}...", migration_version);

        let mut transaction = pool
            .begin()
            .await
            .with_context(|| format!("Falha ao iniciar transação para migração {}", migration_version))?;

        sqlx::query(migration_sql)
            .execute(&mut *transaction)
            .await
            .with_context(|| format!("Falha ao executar migração {}", migration_version))?;

        sqlx::query(&format!("PRAGMA user_version = {}", migration_version))
            .execute(&mut *transaction)
            .await
            .with_context(|| format!("Falha ao atualizar versão para {}", migration_version))?;

        transaction
            .commit()
            .await
            .with_context(|| format!("Falha ao confirmar transação para migração {}", migration_version))?;

        info!("Migração {} aplicada com sucesso", migration_version);
    }

    info!("Migrações concluídas. Versão atual: {}", MIGRATIONS.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::migrate::MigrateDatabase;
    use sqlx::sqlite::SqliteConnectOptions;
    use sqlx::Sqlite;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_migrations() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("test_migrations.db");
        let db_url = format!("sqlite:{}", db_path.display());

        Sqlite::create_database(&db_url).await?;

        let conn_options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(conn_options).await?;

        run_migrations(&pool).await?;
        // Segunda execução não reaplica nada
        run_migrations(&pool).await?;

        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&pool)
            .await?;

        assert_eq!(version, MIGRATIONS.len() as i64);

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_all(&pool)
        .await?;

        for expected in ["patients", "procedures", "appointments", "payments", "expenses"] {
            assert!(tables.contains(&expected.to_string()), "tabela ausente: {}", expected);
        }

        Ok(())
    }
}
