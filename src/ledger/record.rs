use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::LedgerError;

/// Billing procedure codes the ledger knows how to price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CptCode {
    #[serde(rename = "90791")]
    Intake90791,
    #[serde(rename = "90837")]
    Psychotherapy90837,
}

impl CptCode {
    pub const ALL: [CptCode; 2] = [CptCode::Psychotherapy90837, CptCode::Intake90791];

    pub fn as_str(&self) -> &'static str {
        match self {
            CptCode::Intake90791 => "90791",
            CptCode::Psychotherapy90837 => "90837",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, LedgerError> {
        match raw.trim() {
            "90791" => Ok(CptCode::Intake90791),
            "90837" => Ok(CptCode::Psychotherapy90837),
            other => Err(LedgerError::Validation(format!(
                "unknown CPT code `{}`",
                other
            ))),
        }
    }
}

impl fmt::Display for CptCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How overdue an outstanding balance is. Variant order doubles as display order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AgingBucket {
    Paid,
    Days0To30,
    Days31To60,
    Days61To90,
    Days90Plus,
}

impl AgingBucket {
    /// Bucket for a balance that has been outstanding `days` days. Upper
    /// bounds are inclusive. Callers handle the fully-paid case themselves.
    pub fn for_days(days: i64) -> Self {
        match days {
            d if d <= 30 => AgingBucket::Days0To30,
            d if d <= 60 => AgingBucket::Days31To60,
            d if d <= 90 => AgingBucket::Days61To90,
            _ => AgingBucket::Days90Plus,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgingBucket::Paid => "Paid",
            AgingBucket::Days0To30 => "0-30 days",
            AgingBucket::Days31To60 => "31-60 days",
            AgingBucket::Days61To90 => "61-90 days",
            AgingBucket::Days90Plus => "90+ days",
        }
    }
}

impl fmt::Display for AgingBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raw form fields consumed by add and edit. The CPT code arrives as the
/// operator typed or selected it and is validated during conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinician: Option<String>,
    pub client_initials: String,
    pub date_of_service: NaiveDate,
    pub cpt_code: String,
    pub session_fee: f64,
    pub payment_received: f64,
    #[serde(default)]
    pub unpaid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_payment: Option<NaiveDate>,
}

/// One billable session with its derived aging state.
///
/// The derived fields (`outstanding`, `days_outstanding`, `aging_bucket`) are
/// never set directly; they are recomputed from the input fields whenever the
/// record is created, edited, or refreshed against a new reference day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinician: Option<String>,
    pub client_initials: String,
    pub date_of_service: NaiveDate,
    pub cpt_code: CptCode,
    pub session_fee: f64,
    pub payment_received: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_payment: Option<NaiveDate>,
    pub outstanding: f64,
    pub days_outstanding: i64,
    pub aging_bucket: AgingBucket,
}

impl SessionRecord {
    /// Validates the raw fields and builds a record with derived state
    /// computed against `today`.
    pub fn from_input(input: &RecordInput, today: NaiveDate) -> Result<Self, LedgerError> {
        let cpt_code = CptCode::parse(&input.cpt_code)?;
        if input.session_fee < 0.0 {
            return Err(LedgerError::Validation(
                "session fee must not be negative".into(),
            ));
        }
        if input.payment_received < 0.0 {
            return Err(LedgerError::Validation(
                "payment received must not be negative".into(),
            ));
        }
        // The unpaid flag wins over whatever payment date the form carried.
        let date_of_payment = if input.unpaid {
            None
        } else {
            input.date_of_payment
        };
        let clinician = input
            .clinician
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        let mut record = Self {
            clinician,
            client_initials: input.client_initials.trim().to_string(),
            date_of_service: input.date_of_service,
            cpt_code,
            session_fee: input.session_fee,
            payment_received: input.payment_received,
            date_of_payment,
            outstanding: 0.0,
            days_outstanding: 0,
            aging_bucket: AgingBucket::Paid,
        };
        record.recompute(today);
        Ok(record)
    }

    /// Recomputes the derived fields against a new reference day.
    ///
    /// Anchor rule: unpaid records age from the date of service, partially
    /// paid records age from the date of payment. The anchor is irrelevant
    /// once nothing is outstanding.
    pub fn recompute(&mut self, today: NaiveDate) {
        self.outstanding = (self.session_fee - self.payment_received).max(0.0);
        if self.outstanding > f64::EPSILON {
            let anchor = self.reference_date();
            self.days_outstanding = (today - anchor).num_days().max(0);
            self.aging_bucket = AgingBucket::for_days(self.days_outstanding);
        } else {
            self.outstanding = 0.0;
            self.days_outstanding = 0;
            self.aging_bucket = AgingBucket::Paid;
        }
    }

    /// The date a still-outstanding balance ages from.
    pub fn reference_date(&self) -> NaiveDate {
        self.date_of_payment.unwrap_or(self.date_of_service)
    }

    pub fn is_paid(&self) -> bool {
        self.aging_bucket == AgingBucket::Paid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn input(fee: f64, payment: f64, unpaid: bool, service_days_ago: i64) -> RecordInput {
        RecordInput {
            clinician: Some("Dr. Reyes".into()),
            client_initials: "AB".into(),
            date_of_service: today() - Duration::days(service_days_ago),
            cpt_code: "90837".into(),
            session_fee: fee,
            payment_received: payment,
            unpaid,
            date_of_payment: None,
        }
    }

    #[test]
    fn bucket_boundaries_are_inclusive() {
        assert_eq!(AgingBucket::for_days(0), AgingBucket::Days0To30);
        assert_eq!(AgingBucket::for_days(30), AgingBucket::Days0To30);
        assert_eq!(AgingBucket::for_days(31), AgingBucket::Days31To60);
        assert_eq!(AgingBucket::for_days(60), AgingBucket::Days31To60);
        assert_eq!(AgingBucket::for_days(61), AgingBucket::Days61To90);
        assert_eq!(AgingBucket::for_days(90), AgingBucket::Days61To90);
        assert_eq!(AgingBucket::for_days(91), AgingBucket::Days90Plus);
    }

    #[test]
    fn unpaid_session_ages_from_service_date() {
        let record = SessionRecord::from_input(&input(200.0, 0.0, true, 45), today()).unwrap();
        assert_eq!(record.outstanding, 200.0);
        assert_eq!(record.days_outstanding, 45);
        assert_eq!(record.aging_bucket, AgingBucket::Days31To60);
    }

    #[test]
    fn fully_paid_session_is_paid_with_zero_days() {
        let mut fields = input(150.0, 150.0, false, 10);
        fields.cpt_code = "90791".into();
        fields.date_of_payment = Some(today());
        let record = SessionRecord::from_input(&fields, today()).unwrap();
        assert_eq!(record.outstanding, 0.0);
        assert_eq!(record.days_outstanding, 0);
        assert_eq!(record.aging_bucket, AgingBucket::Paid);
    }

    #[test]
    fn partial_payment_ages_from_payment_date() {
        let mut fields = input(200.0, 50.0, false, 80);
        fields.date_of_payment = Some(today() - Duration::days(20));
        let record = SessionRecord::from_input(&fields, today()).unwrap();
        assert_eq!(record.outstanding, 150.0);
        assert_eq!(record.days_outstanding, 20);
        assert_eq!(record.aging_bucket, AgingBucket::Days0To30);
    }

    #[test]
    fn unpaid_flag_clears_payment_date() {
        let mut fields = input(200.0, 0.0, true, 5);
        fields.date_of_payment = Some(today());
        let record = SessionRecord::from_input(&fields, today()).unwrap();
        assert!(record.date_of_payment.is_none());
        assert_eq!(record.days_outstanding, 5);
    }

    #[test]
    fn future_anchor_never_goes_negative() {
        let mut fields = input(200.0, 0.0, false, 0);
        fields.date_of_payment = Some(today() + Duration::days(7));
        let record = SessionRecord::from_input(&fields, today()).unwrap();
        assert_eq!(record.days_outstanding, 0);
        assert_eq!(record.aging_bucket, AgingBucket::Days0To30);
    }

    #[test]
    fn overpayment_clamps_outstanding_to_zero() {
        let record = SessionRecord::from_input(&input(150.0, 175.0, false, 40), today()).unwrap();
        assert_eq!(record.outstanding, 0.0);
        assert_eq!(record.aging_bucket, AgingBucket::Paid);
        assert_eq!(record.days_outstanding, 0);
    }

    #[test]
    fn unknown_cpt_code_is_rejected() {
        let mut fields = input(200.0, 0.0, true, 1);
        fields.cpt_code = "99999".into();
        let err = SessionRecord::from_input(&fields, today()).expect_err("must reject");
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let fields = input(-1.0, 0.0, true, 1);
        assert!(SessionRecord::from_input(&fields, today()).is_err());
        let fields = input(100.0, -1.0, true, 1);
        assert!(SessionRecord::from_input(&fields, today()).is_err());
    }

    #[test]
    fn paid_iff_nothing_outstanding() {
        for (fee, payment) in [(200.0, 0.0), (200.0, 199.0), (200.0, 200.0), (0.0, 0.0)] {
            let record =
                SessionRecord::from_input(&input(fee, payment, true, 100), today()).unwrap();
            assert_eq!(record.is_paid(), record.outstanding == 0.0);
            assert_eq!(record.is_paid(), record.days_outstanding == 0);
        }
    }
}
