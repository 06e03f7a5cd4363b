//! Erros do serviço com mapeamento para respostas HTTP

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use clinic_db::DbError;
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Error, Debug)]
pub enum AppError {
    /// Entrada rejeitada antes de qualquer acesso ao banco
    #[error("Dados inválidos: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(DbError),

    #[error("{0} não encontrado")]
    NotFound(&'static str),

    #[error("Configuração ausente ou inválida: {0}")]
    Configuration(String),

    #[error("Falha ao enviar notificação: {0}")]
    Notification(String),

    #[error("Nenhuma sessão ativa")]
    Unauthorized,

    #[error("A exclusão precisa ser confirmada")]
    ConfirmationRequired,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION",
            AppError::Storage(e) if e.is_not_found() => "NOT_FOUND",
            AppError::Storage(_) => "STORAGE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Configuration(_) => "CONFIGURATION",
            AppError::Notification(_) => "NOTIFICATION",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::ConfirmationRequired => "CONFIRMATION_REQUIRED",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Storage(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Configuration(_) => StatusCode::BAD_REQUEST,
            AppError::Notification(_) => StatusCode::BAD_GATEWAY,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::ConfirmationRequired => StatusCode::PRECONDITION_REQUIRED,
        }
    }
}

/// Restrição violada no banco é regra de negócio: vira erro de validação
impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err.root() {
            DbError::ConstraintViolation(message) => AppError::Validation(message.clone()),
            _ => AppError::Storage(err),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<(&str, String)> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, list)| {
                list.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string());
                    (field, message)
                })
            })
            .collect();
        fields.sort();

        let joined = fields
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect::<Vec<_>>()
            .join("; ");
        AppError::Validation(joined)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "erro interno na requisição");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_db::error::{Action, Entity};

    #[test]
    fn storage_errors_keep_their_prefix_and_map_status() {
        let err = AppError::from(DbError::Storage {
            action: Action::Delete,
            entity: Entity::Patient,
            source: Box::new(DbError::NotFound("registro".to_string())),
        });
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(err.to_string().starts_with("Falha ao excluir paciente"));

        let other = AppError::from(DbError::QueryError("disco cheio".to_string()));
        assert_eq!(other.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(other.code(), "STORAGE");
    }

    #[test]
    fn constraint_violations_surface_as_validation() {
        let direct = AppError::from(DbError::ConstraintViolation(
            "Este CPF já está cadastrado para outro paciente".to_string(),
        ));
        assert!(matches!(direct, AppError::Validation(ref m) if m.contains("CPF")));
        assert_eq!(direct.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(direct.code(), "VALIDATION");

        let wrapped = AppError::from(DbError::Storage {
            action: Action::Create,
            entity: Entity::Patient,
            source: Box::new(DbError::ConstraintViolation("cpf duplicado".to_string())),
        });
        assert!(matches!(wrapped, AppError::Validation(ref m) if m == "cpf duplicado"));
    }

    #[test]
    fn unconfirmed_delete_and_missing_session() {
        assert_eq!(
            AppError::ConfirmationRequired.status(),
            StatusCode::PRECONDITION_REQUIRED
        );
        assert_eq!(AppError::Unauthorized.code(), "UNAUTHORIZED");
    }
}
