//! CSV export of the full session table, derived columns included.

use std::{
    fs,
    path::{Path, PathBuf},
};

use csv::WriterBuilder;
use serde::Serialize;

use crate::{
    errors::LedgerError,
    ledger::{AgingBucket, SessionLedger, SessionRecord},
    utils::paths::ensure_dir,
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TMP_SUFFIX: &str = "tmp";

/// Fill color applied to a record's aging bucket cell. The mapping is fixed:
/// settled and fresh balances render light green, then yellow, orange, and
/// red as the balance ages.
pub fn bucket_color(bucket: AgingBucket) -> &'static str {
    match bucket {
        AgingBucket::Paid | AgingBucket::Days0To30 => "#C6EFCE",
        AgingBucket::Days31To60 => "#FFEB9C",
        AgingBucket::Days61To90 => "#FFA500",
        AgingBucket::Days90Plus => "#FF0000",
    }
}

#[derive(Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Clinician")]
    clinician: &'a str,
    #[serde(rename = "Client Initials")]
    client_initials: &'a str,
    #[serde(rename = "Date of Service")]
    date_of_service: String,
    #[serde(rename = "CPT Code")]
    cpt_code: &'static str,
    #[serde(rename = "Session Fee")]
    session_fee: f64,
    #[serde(rename = "Payment Received")]
    payment_received: f64,
    #[serde(rename = "Date of Payment")]
    date_of_payment: Option<String>,
    #[serde(rename = "Outstanding")]
    outstanding: f64,
    #[serde(rename = "Days Outstanding")]
    days_outstanding: i64,
    #[serde(rename = "Aging Bucket")]
    aging_bucket: &'static str,
}

impl<'a> ExportRow<'a> {
    fn from_record(record: &'a SessionRecord) -> Self {
        Self {
            clinician: record.clinician.as_deref().unwrap_or(""),
            client_initials: &record.client_initials,
            date_of_service: record.date_of_service.format(DATE_FORMAT).to_string(),
            cpt_code: record.cpt_code.as_str(),
            session_fee: record.session_fee,
            payment_received: record.payment_received,
            date_of_payment: record
                .date_of_payment
                .map(|date| date.format(DATE_FORMAT).to_string()),
            outstanding: record.outstanding,
            days_outstanding: record.days_outstanding,
            aging_bucket: record.aging_bucket.label(),
        }
    }
}

/// Writes the whole table to `path` as CSV. The file is written to a tmp
/// sibling and renamed into place, so readers never observe a partial file.
pub fn write_csv(ledger: &SessionLedger, path: &Path) -> Result<(), LedgerError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }
    let tmp = tmp_path(path);
    {
        let mut writer = WriterBuilder::new().from_path(&tmp)?;
        for record in &ledger.records {
            writer.serialize(ExportRow::from_record(record))?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    tracing::info!(path = %path.display(), records = ledger.record_count(), "exported session table");
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_table_is_fixed() {
        assert_eq!(bucket_color(AgingBucket::Paid), "#C6EFCE");
        assert_eq!(bucket_color(AgingBucket::Days0To30), "#C6EFCE");
        assert_eq!(bucket_color(AgingBucket::Days31To60), "#FFEB9C");
        assert_eq!(bucket_color(AgingBucket::Days61To90), "#FFA500");
        assert_eq!(bucket_color(AgingBucket::Days90Plus), "#FF0000");
    }
}
