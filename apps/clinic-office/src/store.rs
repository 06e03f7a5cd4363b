//! Estado em memória do consultório
//!
//! Guarda a última cópia completa das cinco coleções, a sessão ativa e as
//! configurações de integração. Toda escrita segue o mesmo ciclo: validar
//! contra a cópia atual, gravar no banco e recarregar tudo.
//!
//! Cada recarga recebe um número de geração. Só a recarga mais recente pode
//! substituir a cópia; resultados de recargas antigas (ou iniciadas antes de
//! um logout) são descartados.

use chrono::NaiveDate;
use clinic_db::error::{Action, Entity};
use clinic_db::models::{
    Appointment, AppointmentPatch, Expense, ExpensePatch, NewAppointment, NewExpense, NewPatient,
    NewPayment, NewProcedure, Patient, PatientPatch, Payment, PaymentPatch, Procedure,
    ProcedurePatch,
};
use clinic_db::{DbError, Repositories};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::aggregation::{self, BalancesByStatus, Dashboard, TrendPoint, TREND_MONTHS};
use crate::error::AppError;
use crate::session::UserProfile;
use crate::settings::IntegrationSettings;
use crate::validation;

/// Cópia completa das coleções, na ordem devolvida pelos repositórios
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub patients: Vec<Patient>,
    pub procedures: Vec<Procedure>,
    pub appointments: Vec<Appointment>,
    pub payments: Vec<Payment>,
    pub expenses: Vec<Expense>,
}

#[derive(Debug, Clone)]
pub enum Mutation {
    CreatePatient(NewPatient),
    UpdatePatient(Uuid, PatientPatch),
    DeletePatient(Uuid),
    CreateProcedure(NewProcedure),
    UpdateProcedure(Uuid, ProcedurePatch),
    DeleteProcedure(Uuid),
    CreateAppointment(NewAppointment),
    UpdateAppointment(Uuid, AppointmentPatch),
    DeleteAppointment(Uuid),
    CreatePayment(NewPayment),
    UpdatePayment(Uuid, PaymentPatch),
    DeletePayment(Uuid),
    CreateExpense(NewExpense),
    UpdateExpense(Uuid, ExpensePatch),
    DeleteExpense(Uuid),
}

impl Mutation {
    pub fn target(&self) -> (Action, Entity) {
        use Mutation::*;
        match self {
            CreatePatient(_) => (Action::Create, Entity::Patient),
            UpdatePatient(..) => (Action::Update, Entity::Patient),
            DeletePatient(_) => (Action::Delete, Entity::Patient),
            CreateProcedure(_) => (Action::Create, Entity::Procedure),
            UpdateProcedure(..) => (Action::Update, Entity::Procedure),
            DeleteProcedure(_) => (Action::Delete, Entity::Procedure),
            CreateAppointment(_) => (Action::Create, Entity::Appointment),
            UpdateAppointment(..) => (Action::Update, Entity::Appointment),
            DeleteAppointment(_) => (Action::Delete, Entity::Appointment),
            CreatePayment(_) => (Action::Create, Entity::Payment),
            UpdatePayment(..) => (Action::Update, Entity::Payment),
            DeletePayment(_) => (Action::Delete, Entity::Payment),
            CreateExpense(_) => (Action::Create, Entity::Expense),
            UpdateExpense(..) => (Action::Update, Entity::Expense),
            DeleteExpense(_) => (Action::Delete, Entity::Expense),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MutationOutcome {
    Created { id: Uuid },
    Updated { id: Uuid },
    Deleted { id: Uuid },
}

/// Marca uma recarga em andamento; libera o indicador de carga ao sair de escopo
struct LoadTicket<'a> {
    in_flight: &'a AtomicUsize,
    generation: u64,
}

impl Drop for LoadTicket<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct Store {
    repos: Repositories,
    snapshot: RwLock<Snapshot>,
    session: RwLock<Option<UserProfile>>,
    settings: RwLock<IntegrationSettings>,
    generation: AtomicU64,
    in_flight: AtomicUsize,
}

impl Store {
    pub fn new(repos: Repositories, settings: IntegrationSettings) -> Self {
        Self {
            repos,
            snapshot: RwLock::new(Snapshot::default()),
            session: RwLock::new(None),
            settings: RwLock::new(settings),
            generation: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Verdadeiro enquanto alguma recarga não terminou
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    // ── Sessão ──────────────────────────────────────────

    /// Abre a sessão e carrega os dados
    pub async fn login(&self, profile: UserProfile) -> Result<(), AppError> {
        profile.validate()?;
        info!(user = %profile.email, "sessão iniciada");
        *self.session.write().await = Some(profile);
        self.refresh().await
    }

    /// Encerra a sessão e limpa as coleções imediatamente
    pub async fn logout(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.session.write().await = None;
        *self.snapshot.write().await = Snapshot::default();
        info!("sessão encerrada");
    }

    pub async fn user(&self) -> Option<UserProfile> {
        self.session.read().await.clone()
    }

    /// Troca os dados do perfil sem recarregar as coleções
    pub async fn update_user(&self, profile: UserProfile) -> Result<(), AppError> {
        profile.validate()?;
        let mut session = self.session.write().await;
        match session.as_mut() {
            Some(current) => {
                *current = profile;
                Ok(())
            }
            None => Err(AppError::Unauthorized),
        }
    }

    pub async fn require_session(&self) -> Result<(), AppError> {
        match *self.session.read().await {
            Some(_) => Ok(()),
            None => Err(AppError::Unauthorized),
        }
    }

    // ── Leitura ─────────────────────────────────────────

    pub async fn read(&self) -> Result<RwLockReadGuard<'_, Snapshot>, AppError> {
        self.require_session().await?;
        Ok(self.snapshot.read().await)
    }

    pub async fn dashboard(&self, today: NaiveDate) -> Result<Dashboard, AppError> {
        let snapshot = self.read().await?;
        Ok(Dashboard::compute(&snapshot, today))
    }

    pub async fn financial_trend(&self, today: NaiveDate) -> Result<Vec<TrendPoint>, AppError> {
        let snapshot = self.read().await?;
        Ok(aggregation::financial_trend(
            &snapshot.payments,
            &snapshot.expenses,
            today,
            TREND_MONTHS,
        ))
    }

    pub async fn balances(&self) -> Result<BalancesByStatus, AppError> {
        let snapshot = self.read().await?;
        Ok(aggregation::balances_by_status(&snapshot.payments))
    }

    // ── Recarga ─────────────────────────────────────────

    /// Recarrega as cinco coleções em paralelo
    ///
    /// Se qualquer listagem falhar, a cópia anterior fica intacta e o erro
    /// é devolvido.
    pub async fn refresh(&self) -> Result<(), AppError> {
        // Geração reservada antes de olhar a sessão: um logout posterior a invalida
        let ticket = self.begin_load();
        self.require_session().await?;

        let (patients, procedures, appointments, payments, expenses) = tokio::try_join!(
            self.repos.patients.list(),
            self.repos.procedures.list(),
            self.repos.appointments.list(),
            self.repos.payments.list(),
            self.repos.expenses.list(),
        )
        .map_err(|e| {
            warn!(error = %e, "falha ao recarregar dados; mantendo a cópia anterior");
            e
        })?;

        let loaded = Snapshot {
            patients,
            procedures,
            appointments,
            payments,
            expenses,
        };
        self.finish_load(ticket, loaded).await;
        Ok(())
    }

    fn begin_load(&self) -> LoadTicket<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        LoadTicket {
            in_flight: &self.in_flight,
            generation,
        }
    }

    /// Aplica o resultado se nenhuma recarga (ou logout) posterior começou
    /// e se ainda há sessão aberta
    async fn finish_load(&self, ticket: LoadTicket<'_>, loaded: Snapshot) -> bool {
        let mut current = self.snapshot.write().await;
        if self.generation.load(Ordering::SeqCst) != ticket.generation {
            debug!(generation = ticket.generation, "recarga obsoleta descartada");
            return false;
        }
        if self.session.read().await.is_none() {
            debug!(generation = ticket.generation, "recarga descartada: sessão encerrada");
            return false;
        }

        info!(
            patients = loaded.patients.len(),
            procedures = loaded.procedures.len(),
            appointments = loaded.appointments.len(),
            payments = loaded.payments.len(),
            expenses = loaded.expenses.len(),
            "dados recarregados"
        );
        *current = loaded;
        true
    }

    // ── Escrita ─────────────────────────────────────────

    /// Valida, grava e recarrega
    ///
    /// Falha de gravação não dispara recarga. Falha na recarga depois de uma
    /// gravação bem-sucedida só é registrada no log.
    pub async fn mutate(&self, mutation: Mutation) -> Result<MutationOutcome, AppError> {
        self.require_session().await?;
        {
            let snapshot = self.snapshot.read().await;
            validation::check(&mutation, &snapshot)?;
        }

        let (action, entity) = mutation.target();
        let outcome = self.apply(mutation).await.map_err(|e| {
            warn!(%action, %entity, error = %e, "gravação rejeitada");
            e
        })?;
        info!(%action, %entity, ?outcome, "gravação concluída");

        if let Err(e) = self.refresh().await {
            warn!(error = %e, "gravação concluída, mas a recarga falhou");
        }
        Ok(outcome)
    }

    async fn apply(&self, mutation: Mutation) -> Result<MutationOutcome, DbError> {
        use Mutation::*;
        let repos = &self.repos;
        let outcome = match mutation {
            CreatePatient(new) => MutationOutcome::Created {
                id: repos.patients.create(new).await?.id,
            },
            UpdatePatient(id, patch) => {
                repos.patients.update(id, patch).await?;
                MutationOutcome::Updated { id }
            }
            DeletePatient(id) => {
                repos.patients.delete(id).await?;
                MutationOutcome::Deleted { id }
            }
            CreateProcedure(new) => MutationOutcome::Created {
                id: repos.procedures.create(new).await?.id,
            },
            UpdateProcedure(id, patch) => {
                repos.procedures.update(id, patch).await?;
                MutationOutcome::Updated { id }
            }
            DeleteProcedure(id) => {
                repos.procedures.delete(id).await?;
                MutationOutcome::Deleted { id }
            }
            CreateAppointment(new) => MutationOutcome::Created {
                id: repos.appointments.create(new).await?.id,
            },
            UpdateAppointment(id, patch) => {
                repos.appointments.update(id, patch).await?;
                MutationOutcome::Updated { id }
            }
            DeleteAppointment(id) => {
                repos.appointments.delete(id).await?;
                MutationOutcome::Deleted { id }
            }
            CreatePayment(new) => MutationOutcome::Created {
                id: repos.payments.create(new).await?.id,
            },
            UpdatePayment(id, patch) => {
                repos.payments.update(id, patch).await?;
                MutationOutcome::Updated { id }
            }
            DeletePayment(id) => {
                repos.payments.delete(id).await?;
                MutationOutcome::Deleted { id }
            }
            CreateExpense(new) => MutationOutcome::Created {
                id: repos.expenses.create(new).await?.id,
            },
            UpdateExpense(id, patch) => {
                repos.expenses.update(id, patch).await?;
                MutationOutcome::Updated { id }
            }
            DeleteExpense(id) => {
                repos.expenses.delete(id).await?;
                MutationOutcome::Deleted { id }
            }
        };
        Ok(outcome)
    }

    // ── Configurações ───────────────────────────────────

    pub async fn settings(&self) -> IntegrationSettings {
        self.settings.read().await.clone()
    }

    pub async fn update_settings(
        &self,
        settings: IntegrationSettings,
    ) -> Result<IntegrationSettings, AppError> {
        let normalized = settings.normalized()?;
        *self.settings.write().await = normalized.clone();
        info!("configurações de integração atualizadas");
        Ok(normalized)
    }
}
