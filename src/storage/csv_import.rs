//! Schema-on-read reload of a previously exported session table.
//!
//! Columns arrive as untyped text, so every row is validated and coerced
//! against the record schema at load time. Rows that fail coercion are
//! flagged and skipped rather than turned into ambiguous values; derived
//! columns present in the file are ignored and recomputed.

use std::path::Path;

use chrono::NaiveDate;
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;

use crate::{
    config::Config,
    errors::LedgerError,
    ledger::{RecordInput, SessionRecord},
};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A row the reload could not coerce. `line` counts from the top of the
/// file, header included, so issues can be chased in a spreadsheet editor.
#[derive(Debug, Clone)]
pub struct RowIssue {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug)]
pub struct CsvReload {
    pub records: Vec<SessionRecord>,
    pub issues: Vec<RowIssue>,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Clinician", default)]
    clinician: Option<String>,
    // The earliest exports named this column `Client`.
    #[serde(rename = "Client Initials", alias = "Client")]
    client_initials: String,
    #[serde(rename = "Date of Service", alias = "Date of Session")]
    date_of_service: String,
    #[serde(rename = "CPT Code")]
    cpt_code: String,
    #[serde(rename = "Session Fee", default)]
    session_fee: Option<String>,
    #[serde(rename = "Payment Received", default)]
    payment_received: Option<String>,
    #[serde(rename = "Date of Payment", default)]
    date_of_payment: Option<String>,
}

/// Reads records back from a CSV export. Derived fields are recomputed
/// against `today`; fees missing from a row fall back to the fee schedule.
pub fn reload_from_csv(
    path: &Path,
    config: &Config,
    today: NaiveDate,
) -> Result<CsvReload, LedgerError> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)?;
    let mut records = Vec::new();
    let mut issues = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                issues.push(RowIssue {
                    line,
                    reason: format!("unreadable row: {}", err),
                });
                continue;
            }
        };
        match coerce_row(&row, config, today) {
            Ok(record) => records.push(record),
            Err(reason) => issues.push(RowIssue { line, reason }),
        }
    }

    tracing::info!(
        path = %path.display(),
        loaded = records.len(),
        flagged = issues.len(),
        "reloaded session table"
    );
    Ok(CsvReload { records, issues })
}

fn coerce_row(row: &CsvRow, config: &Config, today: NaiveDate) -> Result<SessionRecord, String> {
    let date_of_service = parse_date(&row.date_of_service)
        .ok_or_else(|| format!("bad date of service `{}`", row.date_of_service))?;
    let date_of_payment = match row.date_of_payment.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(parse_date(raw).ok_or_else(|| format!("bad date of payment `{}`", raw))?),
    };
    let payment_received = match row.payment_received.as_deref() {
        None | Some("") => 0.0,
        Some(raw) => parse_amount(raw).ok_or_else(|| format!("bad payment amount `{}`", raw))?,
    };

    // Fee column may be absent in hand-edited files; price from the schedule.
    let session_fee = match row.session_fee.as_deref() {
        None | Some("") => {
            let code = crate::ledger::CptCode::parse(&row.cpt_code).map_err(|err| err.to_string())?;
            config.fee_for(code)
        }
        Some(raw) => parse_amount(raw).ok_or_else(|| format!("bad session fee `{}`", raw))?,
    };

    let input = RecordInput {
        clinician: row.clinician.clone(),
        client_initials: row.client_initials.clone(),
        date_of_service,
        cpt_code: row.cpt_code.clone(),
        session_fee,
        payment_received,
        unpaid: date_of_payment.is_none(),
        date_of_payment,
    };
    SessionRecord::from_input(&input, today).map_err(|err| err.to_string())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok()
}
