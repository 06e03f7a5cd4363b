//! Modelos de dados do consultório
//!
//! Este módulo define as entidades (como são lidas do banco) e os formatos
//! de entrada para criação (`New*`) e atualização parcial (`*Patch`).
//! Nos patches, `None` significa "manter o valor atual".

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use std::borrow::Cow;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub use crate::status::{
    AppointmentStatus, ExpenseType, PatientStatus, PaymentMethod, PaymentStatus,
};

/// Nome exibido quando a relação (paciente/procedimento) não existe mais
pub const UNKNOWN_LABEL: &str = "Desconhecido";

/// Nome exibido para pagamentos sem procedimento associado
pub const STANDALONE_LABEL: &str = "Avulso";

/// Formato de hora persistido e exibido (HH:MM)
pub const TIME_FORMAT: &str = "%H:%M";

/// Remove tudo que não for dígito do CPF
pub fn normalize_cpf(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Aceita datas ISO (AAAA-MM-DD) e o formato de exibição DD/MM/AAAA
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
}

/// Aceita HH:MM e HH:MM:SS
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

/// Paciente cadastrado
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    /// Somente dígitos
    pub cpf: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub status: PatientStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for Patient {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("full_name")?,
            cpf: row.try_get("tax_id")?,
            phone: text_or_default(row, "phone")?,
            email: text_or_default(row, "email")?,
            address: text_or_default(row, "address")?,
            status: decode_label(row, "status")?,
            notes: text_or_default(row, "notes")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Dados para cadastro de paciente
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewPatient {
    #[validate(custom = "not_blank")]
    pub name: String,
    #[validate(custom = "has_cpf_digits")]
    pub cpf: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    #[validate(custom = "optional_email")]
    pub email: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub status: PatientStatus,
    #[serde(default)]
    pub notes: String,
}

/// Atualização parcial de paciente
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PatientPatch {
    #[validate(custom = "not_blank")]
    pub name: Option<String>,
    #[validate(custom = "has_cpf_digits")]
    pub cpf: Option<String>,
    pub phone: Option<String>,
    #[validate(custom = "optional_email")]
    pub email: Option<String>,
    pub address: Option<String>,
    pub status: Option<PatientStatus>,
    pub notes: Option<String>,
}

/// Procedimento do catálogo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub id: Uuid,
    pub name: String,
    pub standard_price: Decimal,
    pub description: String,
}

impl FromRow<'_, SqliteRow> for Procedure {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            standard_price: decode_decimal(row, "standard_price")?,
            description: text_or_default(row, "description")?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewProcedure {
    #[validate(custom = "not_blank")]
    pub name: String,
    #[validate(custom = "not_negative")]
    pub standard_price: Decimal,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProcedurePatch {
    #[validate(custom = "not_blank")]
    pub name: Option<String>,
    #[validate(custom = "not_negative")]
    pub standard_price: Option<Decimal>,
    pub description: Option<String>,
}

/// Consulta agendada, com os nomes de paciente e procedimento já resolvidos
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub procedure_id: Option<Uuid>,
    pub procedure_name: String,
    pub date: NaiveDate,
    #[serde(with = "time_of_day")]
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub notes: String,
}

impl FromRow<'_, SqliteRow> for Appointment {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            patient_id: row.try_get("patient_id")?,
            patient_name: label_or(row, "patient_name", UNKNOWN_LABEL)?,
            procedure_id: row.try_get("procedure_id")?,
            procedure_name: label_or(row, "procedure_name", UNKNOWN_LABEL)?,
            date: row.try_get("procedure_date")?,
            time: decode_time(row, "start_time")?,
            status: decode_label(row, "status")?,
            notes: text_or_default(row, "client_notes")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    #[serde(default)]
    pub procedure_id: Option<Uuid>,
    #[serde(deserialize_with = "calendar_date")]
    pub date: NaiveDate,
    #[serde(with = "time_of_day")]
    pub time: NaiveTime,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AppointmentPatch {
    pub patient_id: Option<Uuid>,
    #[serde(default, deserialize_with = "double_option")]
    pub procedure_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "optional_calendar_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "optional_time_of_day")]
    pub time: Option<NaiveTime>,
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
}

/// Lançamento de cobrança/recebimento
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub procedure_id: Option<Uuid>,
    pub procedure_name: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub status: PaymentStatus,
    pub method: Option<PaymentMethod>,
    pub notes: String,
}

impl FromRow<'_, SqliteRow> for Payment {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let procedure_id: Option<Uuid> = row.try_get("procedure_id")?;
        let fallback = if procedure_id.is_some() {
            UNKNOWN_LABEL
        } else {
            STANDALONE_LABEL
        };
        Ok(Self {
            id: row.try_get("id")?,
            patient_id: row.try_get("patient_id")?,
            patient_name: label_or(row, "patient_name", UNKNOWN_LABEL)?,
            procedure_id,
            procedure_name: label_or(row, "procedure_name", fallback)?,
            amount: decode_decimal(row, "amount")?,
            date: row.try_get("transaction_date")?,
            status: decode_label(row, "payment_status")?,
            method: decode_optional_label(row, "payment_method")?,
            notes: text_or_default(row, "notes")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPayment {
    pub patient_id: Uuid,
    #[serde(default)]
    pub procedure_id: Option<Uuid>,
    #[validate(custom = "positive_amount")]
    pub amount: Decimal,
    #[serde(deserialize_with = "calendar_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default)]
    pub method: Option<PaymentMethod>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PaymentPatch {
    pub patient_id: Option<Uuid>,
    #[serde(default, deserialize_with = "double_option")]
    pub procedure_id: Option<Option<Uuid>>,
    #[validate(custom = "positive_amount")]
    pub amount: Option<Decimal>,
    #[serde(default, deserialize_with = "optional_calendar_date")]
    pub date: Option<NaiveDate>,
    pub status: Option<PaymentStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub method: Option<Option<PaymentMethod>>,
    pub notes: Option<String>,
}

/// Despesa do consultório
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub expense_type: Option<ExpenseType>,
    pub notes: String,
}

impl FromRow<'_, SqliteRow> for Expense {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            description: row.try_get("description")?,
            amount: decode_decimal(row, "amount")?,
            date: row.try_get("expense_date")?,
            expense_type: decode_optional_label(row, "expense_type")?,
            notes: text_or_default(row, "notes")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewExpense {
    #[validate(custom = "not_blank")]
    pub description: String,
    #[validate(custom = "positive_amount")]
    pub amount: Decimal,
    #[serde(deserialize_with = "calendar_date")]
    pub date: NaiveDate,
    #[serde(default, rename = "type")]
    pub expense_type: Option<ExpenseType>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ExpensePatch {
    #[validate(custom = "not_blank")]
    pub description: Option<String>,
    #[validate(custom = "positive_amount")]
    pub amount: Option<Decimal>,
    #[serde(default, deserialize_with = "optional_calendar_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, rename = "type", deserialize_with = "double_option")]
    pub expense_type: Option<Option<ExpenseType>>,
    pub notes: Option<String>,
}

// ── Validação ───────────────────────────────────────────

fn validation_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(validation_error("blank", "campo obrigatório"));
    }
    Ok(())
}

fn has_cpf_digits(value: &str) -> Result<(), ValidationError> {
    if normalize_cpf(value).is_empty() {
        return Err(validation_error("cpf", "CPF inválido"));
    }
    Ok(())
}

fn optional_email(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || validator::validate_email(value) {
        return Ok(());
    }
    Err(validation_error("email", "e-mail inválido"))
}

fn positive_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() || value.is_zero() {
        return Err(validation_error("amount", "o valor deve ser maior que zero"));
    }
    Ok(())
}

fn not_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(validation_error("amount", "o valor não pode ser negativo"));
    }
    Ok(())
}

// ── Decodificação de linhas ─────────────────────────────

fn column_decode_error(column: &str, message: String) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    }
}

fn text_or_default(row: &SqliteRow, column: &str) -> sqlx::Result<String> {
    Ok(row.try_get::<Option<String>, _>(column)?.unwrap_or_default())
}

fn label_or(row: &SqliteRow, column: &str, fallback: &str) -> sqlx::Result<String> {
    Ok(row
        .try_get::<Option<String>, _>(column)?
        .unwrap_or_else(|| fallback.to_string()))
}

fn decode_decimal(row: &SqliteRow, column: &str) -> sqlx::Result<Decimal> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(raw.trim())
        .map_err(|e| column_decode_error(column, format!("Valor monetário inválido {:?}: {}", raw, e)))
}

fn decode_time(row: &SqliteRow, column: &str) -> sqlx::Result<NaiveTime> {
    let raw: String = row.try_get(column)?;
    parse_time_of_day(&raw)
        .ok_or_else(|| column_decode_error(column, format!("Horário inválido: {}", raw)))
}

fn decode_label<T>(row: &SqliteRow, column: &str) -> sqlx::Result<T>
where
    T: FromStr<Err = crate::status::UnknownLabel>,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|e: crate::status::UnknownLabel| column_decode_error(column, e.to_string()))
}

fn decode_optional_label<T>(row: &SqliteRow, column: &str) -> sqlx::Result<Option<T>>
where
    T: FromStr<Err = crate::status::UnknownLabel>,
{
    match row.try_get::<Option<String>, _>(column)? {
        Some(raw) if !raw.trim().is_empty() => raw
            .parse()
            .map(Some)
            .map_err(|e: crate::status::UnknownLabel| column_decode_error(column, e.to_string())),
        _ => Ok(None),
    }
}

// ── Serde auxiliares ────────────────────────────────────

/// Distingue campo ausente (`None`) de `null` explícito (`Some(None)`)
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn calendar_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_calendar_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("data inválida: {}", raw)))
}

fn optional_calendar_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_calendar_date(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("data inválida: {}", raw))),
        None => Ok(None),
    }
}

fn optional_time_of_day<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_time_of_day(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("horário inválido: {}", raw))),
        None => Ok(None),
    }
}

mod time_of_day {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format(super::TIME_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time_of_day(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("horário inválido: {}", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(raw: &str) -> Decimal {
        raw.parse().expect("decimal literal")
    }

    #[test]
    fn cpf_is_reduced_to_digits() {
        assert_eq!(normalize_cpf("123.456.789-00"), "12345678900");
        assert_eq!(normalize_cpf("abc"), "");
    }

    #[test]
    fn both_date_conventions_are_accepted() {
        let iso = parse_calendar_date("2026-03-07").unwrap();
        let display = parse_calendar_date("07/03/2026").unwrap();
        assert_eq!(iso, display);
        assert!(parse_calendar_date("2026-13-01").is_none());
    }

    #[test]
    fn new_patient_requires_name_and_cpf_digits() {
        let patient = NewPatient {
            name: "   ".to_string(),
            cpf: "---".to_string(),
            ..Default::default()
        };
        let errors = patient.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("cpf"));
        assert!(!fields.contains_key("email"));
    }

    #[test]
    fn payment_amount_must_be_positive() {
        let payment: NewPayment = serde_json::from_value(serde_json::json!({
            "patient_id": Uuid::new_v4(),
            "amount": "0",
            "date": "10/02/2026",
            "status": "pagou",
        }))
        .unwrap();

        assert_eq!(payment.status, PaymentStatus::Paid);
        assert_eq!(payment.date, NaiveDate::from_ymd_opt(2026, 2, 10).unwrap());
        assert!(payment.validate().is_err());

        let payment = NewPayment {
            amount: dec("150.50"),
            ..payment
        };
        assert!(payment.validate().is_ok());
    }

    #[test]
    fn patch_distinguishes_absent_from_null() {
        let patch: PaymentPatch = serde_json::from_str(r#"{"procedure_id": null}"#).unwrap();
        assert_eq!(patch.procedure_id, Some(None));
        assert_eq!(patch.method, None);

        let patch: PaymentPatch = serde_json::from_str(r#"{"amount": "12.30"}"#).unwrap();
        assert_eq!(patch.procedure_id, None);
        assert_eq!(patch.amount, Some(dec("12.30")));
    }

    #[test]
    fn appointment_time_serializes_as_hours_and_minutes() {
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            patient_name: "Ana Silva".to_string(),
            procedure_id: None,
            procedure_name: UNKNOWN_LABEL.to_string(),
            date: NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            status: AppointmentStatus::Confirmed,
            notes: String::new(),
        };
        let json = serde_json::to_value(&appointment).unwrap();
        assert_eq!(json["time"], "09:00");
        assert_eq!(json["status"], "Confirmada");
    }
}
