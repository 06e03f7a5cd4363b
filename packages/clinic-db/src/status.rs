//! Rótulos enumerados do consultório e sua normalização
//!
//! Cada enum tem um rótulo canônico (o que é persistido e exibido) e uma
//! lista de sinônimos aceitos na entrada. Toda string livre passa por
//! `normalize` antes de chegar ao banco.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Rótulo que não corresponde a nenhuma variante conhecida
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Valor inválido para {kind}: {value:?}")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

/// Chave de comparação: minúsculas, sem acentos, separadores colapsados
pub fn normalize_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for ch in raw.trim().chars() {
        if ch.is_whitespace() || ch == '_' || ch == '-' {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(fold_char(ch));
    }
    out
}

fn fold_char(ch: char) -> char {
    match ch.to_lowercase().next().unwrap_or(ch) {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        other => other,
    }
}

macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => $label:literal $(| $alias:literal)*
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Rótulo canônico, persistido no banco
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            /// Converte rótulos soltos ("pagou", "VENCIDO") na variante canônica
            pub fn normalize(raw: &str) -> Option<Self> {
                let key = normalize_key(raw);
                if key.is_empty() {
                    return None;
                }
                $(
                    if normalize_key($label) == key $(|| $alias == key)* {
                        return Some($name::$variant);
                    }
                )+
                None
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownLabel;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::normalize(s).ok_or_else(|| UnknownLabel {
                    kind: stringify!($name),
                    value: s.to_string(),
                })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(de::Error::custom)
            }
        }
    };
}

labelled_enum! {
    /// Etapa do paciente no funil de atendimento
    pub enum PatientStatus {
        New => "Novo" | "new" | "lead",
        InTreatment => "Em Atendimento" | "in treatment" | "em tratamento" | "atendimento",
        AwaitingPayment => "Aguardando Pagamento" | "awaiting payment" | "aguardando",
        Confirmed => "Confirmado" | "confirmed" | "confirmada",
        Completed => "Finalizado" | "completed" | "finalizada" | "concluido" | "concluida",
    }
}

labelled_enum! {
    /// Situação de um agendamento
    pub enum AppointmentStatus {
        Confirmed => "Confirmada" | "confirmed" | "confirmado" | "agendada" | "agendado",
        Completed => "Realizada" | "completed" | "realizado" | "concluida" | "concluido" | "feita",
        Rescheduled => "Reagendada" | "rescheduled" | "reagendado" | "remarcada",
        Cancelled => "Cancelada" | "cancelled" | "canceled" | "cancelado",
    }
}

labelled_enum! {
    /// Situação de um pagamento
    pub enum PaymentStatus {
        Paid => "Pago" | "paid" | "paga" | "pagou" | "quitado" | "recebido",
        Pending => "Pendente" | "pending" | "em aberto" | "aberto" | "a receber",
        Overdue => "Atrasado" | "overdue" | "atrasada" | "vencido" | "vencida",
    }
}

labelled_enum! {
    /// Forma de pagamento
    pub enum PaymentMethod {
        Cash => "Dinheiro" | "cash" | "especie",
        Card => "Cartão" | "card" | "credito" | "debito" | "cartao de credito" | "cartao de debito",
        InstantTransfer => "PIX" | "instant transfer" | "transferencia",
        PaymentLink => "Link" | "payment link" | "link de pagamento",
    }
}

labelled_enum! {
    /// Natureza da despesa
    pub enum ExpenseType {
        Fixed => "Fixa" | "fixed" | "fixo",
        Variable => "Variável" | "variable" | "variavel",
    }
}

impl PaymentStatus {
    /// Pendente ou atrasado: compõe o saldo em aberto do paciente
    pub fn is_outstanding(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Overdue)
    }
}

impl Default for PatientStatus {
    fn default() -> Self {
        PatientStatus::New
    }
}

impl Default for AppointmentStatus {
    fn default() -> Self {
        AppointmentStatus::Confirmed
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Paid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loose_payment_labels_are_canonicalized() {
        assert_eq!(PaymentStatus::normalize("pagou"), Some(PaymentStatus::Paid));
        assert_eq!(PaymentStatus::normalize("  VENCIDO "), Some(PaymentStatus::Overdue));
        assert_eq!(PaymentStatus::normalize("Pendente"), Some(PaymentStatus::Pending));
        assert_eq!(PaymentStatus::normalize("talvez"), None);
        assert_eq!(PaymentStatus::normalize(""), None);
    }

    #[test]
    fn accents_and_separators_are_ignored() {
        assert_eq!(PaymentMethod::normalize("cartao"), Some(PaymentMethod::Card));
        assert_eq!(PaymentMethod::normalize("CARTÃO"), Some(PaymentMethod::Card));
        assert_eq!(ExpenseType::normalize("variavel"), Some(ExpenseType::Variable));
        assert_eq!(
            PatientStatus::normalize("aguardando_pagamento"),
            Some(PatientStatus::AwaitingPayment)
        );
        assert_eq!(
            AppointmentStatus::normalize("Cancelled"),
            Some(AppointmentStatus::Cancelled)
        );
    }

    #[test]
    fn every_canonical_label_round_trips() {
        for status in PatientStatus::ALL {
            assert_eq!(status.as_str().parse::<PatientStatus>().unwrap(), *status);
        }
        for method in PaymentMethod::ALL {
            assert_eq!(method.as_str().parse::<PaymentMethod>().unwrap(), *method);
        }
    }

    #[test]
    fn serde_uses_canonical_label_and_accepts_synonyms() {
        let json = serde_json::to_string(&PaymentStatus::Overdue).unwrap();
        assert_eq!(json, "\"Atrasado\"");

        let parsed: PaymentStatus = serde_json::from_str("\"vencida\"").unwrap();
        assert_eq!(parsed, PaymentStatus::Overdue);

        let err = serde_json::from_str::<PaymentStatus>("\"fiado\"").unwrap_err();
        assert!(err.to_string().contains("PaymentStatus"));
    }
}
