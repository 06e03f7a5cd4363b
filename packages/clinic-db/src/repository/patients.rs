use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::{delete_by_id, PartialUpdate};
use crate::error::{Action, DbError, Entity, StorageContext};
use crate::models::{normalize_cpf, NewPatient, Patient, PatientPatch};

const COLUMNS: &str = "id, full_name, tax_id, phone, email, address, status, notes, created_at";

/// Repositório de pacientes (tabela `patients`)
#[derive(Clone)]
pub struct PatientRepository {
    pool: SqlitePool,
}

impl PatientRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Todos os pacientes, em ordem alfabética
    pub async fn list(&self) -> Result<Vec<Patient>, DbError> {
        sqlx::query_as::<_, Patient>(&format!(
            "SELECT {} FROM patients ORDER BY full_name COLLATE NOCASE ASC",
            COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .storage_context(Action::List, Entity::Patient)
    }

    /// Cadastra o paciente; o CPF é gravado só com dígitos e não pode repetir
    pub async fn create(&self, new: NewPatient) -> Result<Patient, DbError> {
        self.insert(new)
            .await
            .storage_context(Action::Create, Entity::Patient)
    }

    pub async fn update(&self, id: Uuid, patch: PatientPatch) -> Result<(), DbError> {
        self.apply(id, patch)
            .await
            .storage_context(Action::Update, Entity::Patient)
    }

    /// Exclusão física; agendamentos e pagamentos do paciente permanecem
    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        delete_by_id(&self.pool, "patients", id)
            .await
            .storage_context(Action::Delete, Entity::Patient)
    }

    async fn insert(&self, new: NewPatient) -> Result<Patient, DbError> {
        let cpf = normalize_cpf(&new.cpf);
        self.ensure_unique_cpf(&cpf, None).await?;

        let patient = sqlx::query_as::<_, Patient>(&format!(
            "INSERT INTO patients ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
            COLUMNS, COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.name.trim())
        .bind(&cpf)
        .bind(&new.phone)
        .bind(&new.email)
        .bind(&new.address)
        .bind(new.status.as_str())
        .bind(&new.notes)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        info!(id = %patient.id, "paciente cadastrado");
        Ok(patient)
    }

    async fn apply(&self, id: Uuid, patch: PatientPatch) -> Result<(), DbError> {
        let cpf = patch.cpf.as_deref().map(normalize_cpf);
        if let Some(cpf) = &cpf {
            self.ensure_unique_cpf(cpf, Some(id)).await?;
        }

        let mut update = PartialUpdate::new("patients");
        update
            .set_some("full_name", patch.name.map(|name| name.trim().to_string()))
            .set_some("tax_id", cpf)
            .set_some("phone", patch.phone)
            .set_some("email", patch.email)
            .set_some("address", patch.address)
            .set_some("status", patch.status.map(|s| s.to_string()))
            .set_some("notes", patch.notes);
        update.execute(&self.pool, id).await
    }

    /// Outro paciente (id diferente de `exclude`) já usa este CPF?
    async fn ensure_unique_cpf(&self, cpf: &str, exclude: Option<Uuid>) -> Result<(), DbError> {
        let existing: Option<Uuid> = sqlx::query_scalar("SELECT id FROM patients WHERE tax_id = ?")
            .bind(cpf)
            .fetch_optional(&self.pool)
            .await?;

        match existing {
            Some(other) if Some(other) != exclude => Err(DbError::ConstraintViolation(
                "Este CPF já está cadastrado para outro paciente".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PatientStatus;
    use crate::test_support::temp_pool;
    use anyhow::Result;

    fn new_patient(name: &str, cpf: &str) -> NewPatient {
        NewPatient {
            name: name.to_string(),
            cpf: cpf.to_string(),
            phone: "(11) 99999-1111".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_normalizes_cpf_and_lists_by_name() -> Result<()> {
        let (_dir, pool) = temp_pool().await?;
        let repo = PatientRepository::new(pool);

        repo.create(new_patient("Bruno Souza", "234.567.890-11")).await?;
        let ana = repo.create(new_patient("Ana Silva", "123.456.789-00")).await?;

        assert_eq!(ana.cpf, "12345678900");
        assert_eq!(ana.status, PatientStatus::New);
        assert_eq!(ana.notes, "");

        let names: Vec<String> = repo.list().await?.into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Ana Silva", "Bruno Souza"]);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_cpf_is_rejected() -> Result<()> {
        let (_dir, pool) = temp_pool().await?;
        let repo = PatientRepository::new(pool);

        let ana = repo.create(new_patient("Ana Silva", "12345678900")).await?;
        let err = repo
            .create(new_patient("Outra Ana", "123.456.789-00"))
            .await
            .unwrap_err();
        assert!(err.is_constraint_violation());
        assert!(err.to_string().starts_with("Falha ao criar paciente"));

        // Regravar o próprio CPF não conflita
        repo.update(
            ana.id,
            PatientPatch {
                cpf: Some("123.456.789-00".to_string()),
                ..Default::default()
            },
        )
        .await?;
        Ok(())
    }

    #[tokio::test]
    async fn update_changes_only_supplied_fields() -> Result<()> {
        let (_dir, pool) = temp_pool().await?;
        let repo = PatientRepository::new(pool);

        let before = repo.create(new_patient("Carla Dias", "34567890122")).await?;
        repo.update(
            before.id,
            PatientPatch {
                status: Some(PatientStatus::AwaitingPayment),
                ..Default::default()
            },
        )
        .await?;

        let after = repo.list().await?.remove(0);
        assert_eq!(after.status, PatientStatus::AwaitingPayment);
        assert_eq!(
            Patient {
                status: before.status,
                ..after
            },
            before
        );
        Ok(())
    }

    #[tokio::test]
    async fn update_and_delete_of_missing_patient_fail() -> Result<()> {
        let (_dir, pool) = temp_pool().await?;
        let repo = PatientRepository::new(pool);

        let missing = Uuid::new_v4();
        assert!(repo.update(missing, PatientPatch::default()).await.unwrap_err().is_not_found());
        assert!(repo.delete(missing).await.unwrap_err().is_not_found());
        Ok(())
    }
}
