//! Definições de erro para a biblioteca clinic-db
//!
//! Todo erro que sai de um repositório vem embrulhado em [`DbError::Storage`],
//! que identifica a operação e a entidade envolvidas.

use std::fmt;
use thiserror::Error;

/// Entidades persistidas pelo consultório
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Patient,
    Procedure,
    Appointment,
    Payment,
    Expense,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Entity::Patient => "paciente",
            Entity::Procedure => "procedimento",
            Entity::Appointment => "agendamento",
            Entity::Payment => "pagamento",
            Entity::Expense => "despesa",
        };
        f.write_str(label)
    }
}

/// Operação de repositório que falhou
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::List => "listar",
            Action::Create => "criar",
            Action::Update => "atualizar",
            Action::Delete => "excluir",
        };
        f.write_str(label)
    }
}

/// Erros específicos para operações de banco de dados
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Erro de conexão com banco de dados: {0}")]
    ConnectionError(String),

    #[error("Erro de consulta: {0}")]
    QueryError(String),

    #[error("Entidade não encontrada: {0}")]
    NotFound(String),

    #[error("Violação de restrição: {0}")]
    ConstraintViolation(String),

    #[error("Erro interno: {0}")]
    InternalError(String),

    #[error("Falha ao {action} {entity}: {source}")]
    Storage {
        action: Action,
        entity: Entity,
        #[source]
        source: Box<DbError>,
    },
}

impl DbError {
    /// Erro mais interno, ignorando o contexto de operação/entidade
    pub fn root(&self) -> &DbError {
        match self {
            DbError::Storage { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), DbError::NotFound(_))
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self.root(), DbError::ConstraintViolation(_))
    }
}

/// Conversão de erros específicos do SQLx para nossos tipos de erro
impl From<sqlx::Error> for DbError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DbError::NotFound("Registro não encontrado".to_string()),
            sqlx::Error::Database(dbe) => {
                if let Some(code) = dbe.code() {
                    // 2067 = SQLITE_CONSTRAINT_UNIQUE, 1555 = SQLITE_CONSTRAINT_PRIMARYKEY
                    if matches!(code.as_ref(), "23000" | "2067" | "1555") {
                        return DbError::ConstraintViolation(dbe.message().to_string());
                    }
                }
                DbError::QueryError(dbe.message().to_string())
            }
            sqlx::Error::ColumnNotFound(col) => {
                DbError::QueryError(format!("Coluna não encontrada: {}", col))
            }
            sqlx::Error::TypeNotFound { type_name } => {
                DbError::QueryError(format!("Tipo não encontrado: {}", type_name))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::QueryError(format!("Erro ao decodificar coluna {}: {}", index, source))
            }
            sqlx::Error::Io(io_err) => DbError::ConnectionError(io_err.to_string()),
            sqlx::Error::Configuration(conf_err) => DbError::ConnectionError(conf_err.to_string()),
            sqlx::Error::PoolClosed => {
                DbError::ConnectionError("Pool de conexões fechado".to_string())
            }
            sqlx::Error::PoolTimedOut => {
                DbError::ConnectionError("Timeout no pool de conexões".to_string())
            }
            sqlx::Error::WorkerCrashed => {
                DbError::InternalError("Worker do banco de dados falhou".to_string())
            }
            _ => DbError::InternalError(format!("Erro inesperado: {:?}", error)),
        }
    }
}

/// Anexa operação e entidade a um erro de armazenamento
pub(crate) trait StorageContext<T> {
    fn storage_context(self, action: Action, entity: Entity) -> Result<T, DbError>;
}

impl<T, E> StorageContext<T> for Result<T, E>
where
    E: Into<DbError>,
{
    fn storage_context(self, action: Action, entity: Entity) -> Result<T, DbError> {
        self.map_err(|e| DbError::Storage {
            action,
            entity,
            source: Box::new(e.into()),
        })
    }
}
