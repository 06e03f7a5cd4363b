//! Validação das mutações contra o estado em memória
//!
//! Roda antes de qualquer chamada ao banco: uma mutação rejeitada aqui não
//! gera escrita nem recarga.

use clinic_db::models::{normalize_cpf, Patient};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::store::{Mutation, Snapshot};

pub fn check(mutation: &Mutation, snapshot: &Snapshot) -> Result<(), AppError> {
    match mutation {
        Mutation::CreatePatient(new) => {
            new.validate()?;
            ensure_unique_cpf(&snapshot.patients, &new.cpf, None)
        }
        Mutation::UpdatePatient(id, patch) => {
            patch.validate()?;
            match &patch.cpf {
                Some(cpf) => ensure_unique_cpf(&snapshot.patients, cpf, Some(*id)),
                None => Ok(()),
            }
        }
        Mutation::CreateProcedure(new) => Ok(new.validate()?),
        Mutation::UpdateProcedure(_, patch) => Ok(patch.validate()?),
        Mutation::CreateAppointment(new) => Ok(new.validate()?),
        Mutation::UpdateAppointment(_, patch) => Ok(patch.validate()?),
        Mutation::CreatePayment(new) => Ok(new.validate()?),
        Mutation::UpdatePayment(_, patch) => Ok(patch.validate()?),
        Mutation::CreateExpense(new) => Ok(new.validate()?),
        Mutation::UpdateExpense(_, patch) => Ok(patch.validate()?),
        Mutation::DeletePatient(_)
        | Mutation::DeleteProcedure(_)
        | Mutation::DeleteAppointment(_)
        | Mutation::DeletePayment(_)
        | Mutation::DeleteExpense(_) => Ok(()),
    }
}

/// CPF comparado só pelos dígitos
fn ensure_unique_cpf(patients: &[Patient], cpf: &str, except: Option<Uuid>) -> Result<(), AppError> {
    let digits = normalize_cpf(cpf);
    let taken = patients
        .iter()
        .any(|p| Some(p.id) != except && normalize_cpf(&p.cpf) == digits);
    if taken {
        return Err(AppError::Validation(
            "cpf: Este CPF já está cadastrado para outro paciente".to_string(),
        ));
    }
    Ok(())
}
