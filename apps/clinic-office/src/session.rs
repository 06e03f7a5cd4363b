//! Usuário autenticado
//!
//! A autenticação em si acontece fora do serviço; aqui só guardamos o perfil
//! da sessão ativa, que habilita a carga e a escrita de dados.

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct UserProfile {
    #[validate(length(min = 1, message = "Informe o nome"))]
    pub name: String,
    #[validate(email(message = "E-mail inválido"))]
    pub email: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}
