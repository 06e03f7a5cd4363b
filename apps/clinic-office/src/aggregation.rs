//! Indicadores derivados do painel e dos relatórios
//!
//! Funções puras sobre as coleções em memória. Toda comparação de período
//! é por mês de calendário (mês + ano), nunca por janela de dias corridos.
//! Somatórios usam `Decimal`; arredondamento só na apresentação.

use chrono::{Datelike, NaiveDate};
use clinic_db::models::{
    normalize_cpf, Appointment, AppointmentStatus, Expense, Patient, PatientStatus, Payment,
    PaymentStatus,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::store::Snapshot;

pub const TREND_MONTHS: usize = 6;
pub const TOP_PROCEDURES: usize = 5;
pub const UPCOMING_LIMIT: usize = 5;
pub const RECENT_EXPENSES: usize = 3;

/// Grupo usado para agendamentos sem nome de procedimento
pub const OTHER_PROCEDURES_LABEL: &str = "Outros";

const MONTHS_SHORT: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

const MONTHS_FULL: [&str; 12] = [
    "janeiro", "fevereiro", "março", "abril", "maio", "junho", "julho", "agosto", "setembro",
    "outubro", "novembro", "dezembro",
];

/// Mês de calendário (ano + mês, 1..=12)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
}

impl CalendarMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Recua `months` meses, atravessando anos
    pub fn minus(self, months: u32) -> Self {
        let index = self.year * 12 + (self.month as i32 - 1) - months as i32;
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    /// Os `count` meses terminando no mês de `today`, do mais antigo ao atual
    pub fn trailing(today: NaiveDate, count: usize) -> Vec<Self> {
        let current = Self::of(today);
        (0..count as u32).rev().map(|back| current.minus(back)).collect()
    }

    pub fn short_label(&self) -> &'static str {
        MONTHS_SHORT[(self.month - 1) as usize]
    }

    pub fn full_label(&self) -> String {
        format!("{} {}", MONTHS_FULL[(self.month - 1) as usize], self.year)
    }
}

/// Ponto da série de faturamento
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenuePoint {
    pub month: &'static str,
    pub full_date: String,
    pub revenue: Decimal,
}

/// Ponto da série receita × despesa × lucro
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub month: &'static str,
    pub full_date: String,
    pub revenue: Decimal,
    pub expenses: Decimal,
    pub profit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcedureCount {
    pub name: String,
    pub value: usize,
}

/// Saldo agregado de um paciente
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientBalance {
    pub patient_id: Uuid,
    pub name: String,
    pub amount: Decimal,
    /// Status do último lançamento visto no agrupamento
    pub status: PaymentStatus,
}

/// Saldos por paciente separados por situação do pagamento
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BalancesByStatus {
    pub paid: Vec<PatientBalance>,
    pub overdue: Vec<PatientBalance>,
    pub pending: Vec<PatientBalance>,
}

fn paid_in(payments: &[Payment], month: CalendarMonth) -> Decimal {
    payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Paid && month.contains(p.date))
        .map(|p| p.amount)
        .sum()
}

fn spent_in(expenses: &[Expense], month: CalendarMonth) -> Decimal {
    expenses
        .iter()
        .filter(|e| month.contains(e.date))
        .map(|e| e.amount)
        .sum()
}

/// Soma dos pagamentos pagos no mês corrente
pub fn monthly_revenue(payments: &[Payment], today: NaiveDate) -> Decimal {
    paid_in(payments, CalendarMonth::of(today))
}

/// Soma de tudo que está pendente ou atrasado, sem filtro de data
pub fn pending_amount(payments: &[Payment]) -> Decimal {
    payments
        .iter()
        .filter(|p| p.status.is_outstanding())
        .map(|p| p.amount)
        .sum()
}

pub fn total_revenue(payments: &[Payment]) -> Decimal {
    payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Paid)
        .map(|p| p.amount)
        .sum()
}

/// Total de pacientes cadastrados, sem filtro de status
pub fn active_patient_count(patients: &[Patient]) -> usize {
    patients.len()
}

/// Pacientes ainda em "Novo" cadastrados no mês corrente
pub fn new_patients_this_month(patients: &[Patient], today: NaiveDate) -> usize {
    let month = CalendarMonth::of(today);
    patients
        .iter()
        .filter(|p| p.status == PatientStatus::New && month.contains(p.created_at.date_naive()))
        .count()
}

pub fn monthly_completed_appointments(appointments: &[Appointment], today: NaiveDate) -> usize {
    let month = CalendarMonth::of(today);
    appointments
        .iter()
        .filter(|a| a.status == AppointmentStatus::Completed && month.contains(a.date))
        .count()
}

pub fn revenue_series(payments: &[Payment], today: NaiveDate, months: usize) -> Vec<RevenuePoint> {
    CalendarMonth::trailing(today, months)
        .into_iter()
        .map(|month| RevenuePoint {
            month: month.short_label(),
            full_date: month.full_label(),
            revenue: paid_in(payments, month),
        })
        .collect()
}

pub fn financial_trend(
    payments: &[Payment],
    expenses: &[Expense],
    today: NaiveDate,
    months: usize,
) -> Vec<TrendPoint> {
    CalendarMonth::trailing(today, months)
        .into_iter()
        .map(|month| {
            let revenue = paid_in(payments, month);
            let spent = spent_in(expenses, month);
            TrendPoint {
                month: month.short_label(),
                full_date: month.full_label(),
                revenue,
                expenses: spent,
                profit: revenue - spent,
            }
        })
        .collect()
}

/// Procedimentos mais realizados; empates mantêm a ordem de aparição
pub fn procedure_popularity(appointments: &[Appointment], top_n: usize) -> Vec<ProcedureCount> {
    let mut groups: Vec<ProcedureCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for appointment in appointments {
        let name = match appointment.procedure_name.trim() {
            "" => OTHER_PROCEDURES_LABEL,
            name => name,
        };
        match index.get(name) {
            Some(&at) => groups[at].value += 1,
            None => {
                index.insert(name, groups.len());
                groups.push(ProcedureCount {
                    name: name.to_string(),
                    value: 1,
                });
            }
        }
    }

    // sort_by é estável
    groups.sort_by(|a, b| b.value.cmp(&a.value));
    groups.truncate(top_n);
    groups
}

/// Próximas consultas confirmadas, a partir de hoje (inclusive)
pub fn upcoming_confirmed_appointments(
    appointments: &[Appointment],
    today: NaiveDate,
    limit: usize,
) -> Vec<Appointment> {
    let mut upcoming: Vec<&Appointment> = appointments
        .iter()
        .filter(|a| a.status == AppointmentStatus::Confirmed && a.date >= today)
        .collect();
    upcoming.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.time.cmp(&b.time)));
    upcoming.into_iter().take(limit).cloned().collect()
}

/// Agrupa por paciente na ordem em que cada um aparece pela primeira vez
fn group_by_patient<'a>(payments: impl Iterator<Item = &'a Payment>) -> Vec<PatientBalance> {
    let mut balances: Vec<PatientBalance> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();

    for payment in payments {
        match index.get(&payment.patient_id) {
            Some(&at) => {
                let balance = &mut balances[at];
                balance.amount += payment.amount;
                balance.status = payment.status;
            }
            None => {
                index.insert(payment.patient_id, balances.len());
                balances.push(PatientBalance {
                    patient_id: payment.patient_id,
                    name: payment.patient_name.clone(),
                    amount: payment.amount,
                    status: payment.status,
                });
            }
        }
    }
    balances
}

/// Saldo em aberto (pendente + atrasado) de cada paciente
pub fn pending_balances_by_patient(payments: &[Payment]) -> Vec<PatientBalance> {
    group_by_patient(payments.iter().filter(|p| p.status.is_outstanding()))
}

pub fn balances_by_status(payments: &[Payment]) -> BalancesByStatus {
    let with_status = |status: PaymentStatus| {
        group_by_patient(payments.iter().filter(move |p| p.status == status))
    };
    BalancesByStatus {
        paid: with_status(PaymentStatus::Paid),
        overdue: with_status(PaymentStatus::Overdue),
        pending: with_status(PaymentStatus::Pending),
    }
}

/// Despesas mais recentes
pub fn recent_expenses(expenses: &[Expense], limit: usize) -> Vec<Expense> {
    let mut recent: Vec<&Expense> = expenses.iter().collect();
    recent.sort_by(|a, b| b.date.cmp(&a.date));
    recent.into_iter().take(limit).cloned().collect()
}

/// Agenda de um dia, por horário
pub fn appointments_on(appointments: &[Appointment], day: NaiveDate) -> Vec<Appointment> {
    let mut agenda: Vec<Appointment> = appointments
        .iter()
        .filter(|a| a.date == day)
        .cloned()
        .collect();
    agenda.sort_by(|a, b| a.time.cmp(&b.time));
    agenda
}

/// Busca por nome (sem diferenciar maiúsculas) ou por CPF
pub fn search_patients(patients: &[Patient], term: &str) -> Vec<Patient> {
    let needle = term.trim().to_lowercase();
    let digits = normalize_cpf(&needle);
    patients
        .iter()
        .filter(|p| {
            needle.is_empty()
                || p.name.to_lowercase().contains(&needle)
                || p.cpf.contains(&needle)
                || (!digits.is_empty() && p.cpf.contains(&digits))
        })
        .cloned()
        .collect()
}

/// Busca por nome do paciente ou do procedimento
pub fn search_payments(payments: &[Payment], term: &str) -> Vec<Payment> {
    let needle = term.trim().to_lowercase();
    payments
        .iter()
        .filter(|p| {
            p.patient_name.to_lowercase().contains(&needle)
                || p.procedure_name.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

pub fn search_expenses(expenses: &[Expense], term: &str) -> Vec<Expense> {
    let needle = term.trim().to_lowercase();
    expenses
        .iter()
        .filter(|e| e.description.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Valor em reais com duas casas: `R$ 1.234,50`
pub fn format_currency(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let plain = format!("{:.2}", rounded.abs());
    let (integer, cents) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}R$ {},{}", sign, grouped, cents)
}

/// Todos os números do painel inicial
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub monthly_revenue: Decimal,
    pub pending_amount: Decimal,
    pub total_revenue: Decimal,
    pub active_patients: usize,
    pub new_patients_this_month: usize,
    pub monthly_completed_appointments: usize,
    pub revenue_series: Vec<RevenuePoint>,
    pub procedure_popularity: Vec<ProcedureCount>,
    pub upcoming_appointments: Vec<Appointment>,
    pub pending_balances: Vec<PatientBalance>,
    pub recent_expenses: Vec<Expense>,
}

impl Dashboard {
    pub fn compute(snapshot: &Snapshot, today: NaiveDate) -> Self {
        Self {
            monthly_revenue: monthly_revenue(&snapshot.payments, today),
            pending_amount: pending_amount(&snapshot.payments),
            total_revenue: total_revenue(&snapshot.payments),
            active_patients: active_patient_count(&snapshot.patients),
            new_patients_this_month: new_patients_this_month(&snapshot.patients, today),
            monthly_completed_appointments: monthly_completed_appointments(
                &snapshot.appointments,
                today,
            ),
            revenue_series: revenue_series(&snapshot.payments, today, TREND_MONTHS),
            procedure_popularity: procedure_popularity(&snapshot.appointments, TOP_PROCEDURES),
            upcoming_appointments: upcoming_confirmed_appointments(
                &snapshot.appointments,
                today,
                UPCOMING_LIMIT,
            ),
            pending_balances: pending_balances_by_patient(&snapshot.payments),
            recent_expenses: recent_expenses(&snapshot.expenses, RECENT_EXPENSES),
        }
    }
}
