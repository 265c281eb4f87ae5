//! Interactive menu-driven front end over the session ledger.
//!
//! Presentation only: every state transition goes through the ledger
//! operations, and derived fields are refreshed against the wall-clock day
//! before each screen so buckets stay honest across midnight.

use chrono::{Local, NaiveDate};
use colored::{ColoredString, Colorize};
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};

use crate::{
    config::{Config, ConfigManager},
    errors::LedgerError,
    export,
    ledger::{AgingBucket, CptCode, RecordInput, SessionLedger, SessionRecord},
    storage::{csv_import, LedgerStore},
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DEFAULT_EXPORT_FILE: &str = "sessions.csv";

pub fn run_cli() -> Result<(), LedgerError> {
    let config = ConfigManager::new()?.load()?;
    let store = LedgerStore::new_default()?;
    let mut ledger = SessionLedger::new("sessions");
    let theme = ColorfulTheme::default();

    let actions = [
        "Add session",
        "Edit session",
        "List sessions",
        "Aging summary",
        "Export CSV",
        "Import CSV",
        "Save snapshot",
        "Load snapshot",
        "Clear all records",
        "Quit",
    ];

    loop {
        ledger.refresh(today());
        let choice = Select::with_theme(&theme)
            .with_prompt("Session Ledger")
            .items(&actions)
            .default(0)
            .interact()
            .map_err(prompt_error)?;

        let outcome = match choice {
            0 => add_session(&theme, &mut ledger, &config),
            1 => edit_session(&theme, &mut ledger, &config),
            2 => {
                list_sessions(&ledger);
                Ok(())
            }
            3 => {
                print_summary(&ledger);
                Ok(())
            }
            4 => export_csv(&theme, &ledger),
            5 => import_csv(&theme, &mut ledger, &config),
            6 => save_snapshot(&store, &ledger),
            7 => load_snapshot(&theme, &store, &mut ledger),
            8 => clear_records(&theme, &mut ledger),
            _ => return Ok(()),
        };

        if let Err(err) = outcome {
            println!("{}", format!("Error: {err}").red());
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn prompt_error(err: dialoguer::Error) -> LedgerError {
    LedgerError::Prompt(err.to_string())
}

fn add_session(
    theme: &ColorfulTheme,
    ledger: &mut SessionLedger,
    config: &Config,
) -> Result<(), LedgerError> {
    let input = session_form(theme, config, None)?;
    let index = ledger.add(&input, today())?;
    let record = ledger.record(index).cloned();
    if let Some(record) = record {
        println!(
            "{}",
            format!(
                "Added session #{} ({} outstanding, {})",
                index,
                money(record.outstanding),
                record.aging_bucket
            )
            .green()
        );
    }
    Ok(())
}

fn edit_session(
    theme: &ColorfulTheme,
    ledger: &mut SessionLedger,
    config: &Config,
) -> Result<(), LedgerError> {
    if ledger.is_empty() {
        println!("{}", "No sessions to edit yet.".yellow());
        return Ok(());
    }
    list_sessions(ledger);
    let index: usize = Input::with_theme(theme)
        .with_prompt(format!("Session index (0-{})", ledger.record_count() - 1))
        .interact_text()
        .map_err(prompt_error)?;
    let current = ledger
        .record(index)
        .cloned()
        .ok_or(LedgerError::IndexOutOfRange {
            index,
            len: ledger.record_count(),
        })?;
    let input = session_form(theme, config, Some(&current))?;
    ledger.edit(index, &input, today())?;
    println!("{}", format!("Updated session #{index}.").green());
    Ok(())
}

/// Collects the form fields for add and edit. Defaults come from the record
/// being edited, or from the fee schedule on a fresh add.
fn session_form(
    theme: &ColorfulTheme,
    config: &Config,
    current: Option<&SessionRecord>,
) -> Result<RecordInput, LedgerError> {
    let clinician: String = Input::with_theme(theme)
        .with_prompt("Clinician (optional)")
        .allow_empty(true)
        .with_initial_text(
            current
                .and_then(|record| record.clinician.clone())
                .unwrap_or_default(),
        )
        .interact_text()
        .map_err(prompt_error)?;

    let client_initials: String = loop {
        let raw: String = Input::with_theme(theme)
            .with_prompt("Client initials")
            .allow_empty(true)
            .with_initial_text(
                current
                    .map(|record| record.client_initials.clone())
                    .unwrap_or_default(),
            )
            .interact_text()
            .map_err(prompt_error)?;
        if raw.trim().is_empty() {
            println!("{}", "Client initials cannot be empty.".yellow());
        } else {
            break raw;
        }
    };

    let date_of_service = prompt_date(
        theme,
        "Date of service",
        Some(current.map(|record| record.date_of_service).unwrap_or(today())),
        false,
    )?
    .unwrap_or(today());

    let code_labels: Vec<&str> = CptCode::ALL.iter().map(CptCode::as_str).collect();
    let default_code = current
        .and_then(|record| CptCode::ALL.iter().position(|code| *code == record.cpt_code))
        .unwrap_or(0);
    let code_choice = Select::with_theme(theme)
        .with_prompt("CPT code")
        .items(&code_labels)
        .default(default_code)
        .interact()
        .map_err(prompt_error)?;
    let cpt_code = CptCode::ALL[code_choice];

    let default_fee = current
        .map(|record| record.session_fee)
        .unwrap_or_else(|| config.fee_for(cpt_code));
    let session_fee: f64 = Input::with_theme(theme)
        .with_prompt("Session fee")
        .default(default_fee)
        .interact_text()
        .map_err(prompt_error)?;

    let payment_received: f64 = Input::with_theme(theme)
        .with_prompt("Payment received")
        .default(current.map(|record| record.payment_received).unwrap_or(0.0))
        .interact_text()
        .map_err(prompt_error)?;

    let unpaid = Confirm::with_theme(theme)
        .with_prompt("Mark as unpaid?")
        .default(payment_received == 0.0)
        .interact()
        .map_err(prompt_error)?;

    let date_of_payment = if unpaid {
        None
    } else {
        prompt_date(
            theme,
            "Date of payment (blank for none)",
            current.and_then(|record| record.date_of_payment),
            true,
        )?
    };

    Ok(RecordInput {
        clinician: Some(clinician),
        client_initials,
        date_of_service,
        cpt_code: cpt_code.as_str().to_string(),
        session_fee,
        payment_received,
        unpaid,
        date_of_payment,
    })
}

fn prompt_date(
    theme: &ColorfulTheme,
    prompt: &str,
    default: Option<NaiveDate>,
    allow_empty: bool,
) -> Result<Option<NaiveDate>, LedgerError> {
    loop {
        let mut input = Input::<String>::with_theme(theme)
            .with_prompt(prompt)
            .allow_empty(allow_empty);
        if let Some(date) = default {
            input = input.with_initial_text(date.format(DATE_FORMAT).to_string());
        }
        let raw = input.interact_text().map_err(prompt_error)?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            if allow_empty {
                return Ok(None);
            }
            println!("{}", "A date is required.".yellow());
            continue;
        }
        match NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
            Ok(date) => return Ok(Some(date)),
            Err(_) => println!("{}", "Enter dates as YYYY-MM-DD.".yellow()),
        }
    }
}

fn list_sessions(ledger: &SessionLedger) {
    if ledger.is_empty() {
        println!("{}", "No sessions yet.".yellow());
        return;
    }
    println!(
        "{:>3}  {:<12} {:<8} {:<12} {:<5} {:>10} {:>10} {:<12} {:>11} {:>5}  {}",
        "#",
        "Clinician",
        "Client",
        "Service",
        "CPT",
        "Fee",
        "Paid",
        "Payment date",
        "Outstanding",
        "Days",
        "Bucket"
    );
    for (index, record) in ledger.records.iter().enumerate() {
        println!(
            "{:>3}  {:<12} {:<8} {:<12} {:<5} {:>10} {:>10} {:<12} {:>11} {:>5}  {}",
            index,
            record.clinician.as_deref().unwrap_or("-"),
            record.client_initials,
            record.date_of_service.format(DATE_FORMAT),
            record.cpt_code,
            money(record.session_fee),
            money(record.payment_received),
            record
                .date_of_payment
                .map(|date| date.format(DATE_FORMAT).to_string())
                .unwrap_or_else(|| "-".into()),
            money(record.outstanding),
            record.days_outstanding,
            bucket_cell(record.aging_bucket)
        );
    }
}

fn print_summary(ledger: &SessionLedger) {
    let summary = ledger.summarize();
    if summary.is_empty() {
        println!("{}", "Nothing to summarize.".yellow());
        return;
    }
    println!("Aging summary");
    for (bucket, total) in summary {
        println!("  {:<12} {:>11}", bucket_cell(bucket), money(total));
    }
}

/// Terminal rendering of the bucket column, matching the export color table.
fn bucket_cell(bucket: AgingBucket) -> ColoredString {
    let label = bucket.label();
    match export::bucket_color(bucket) {
        "#C6EFCE" => label.green(),
        "#FFEB9C" => label.yellow(),
        "#FFA500" => label.truecolor(255, 165, 0),
        _ => label.red(),
    }
}

fn money(amount: f64) -> String {
    format!("{:.2}", amount)
}

fn export_csv(theme: &ColorfulTheme, ledger: &SessionLedger) -> Result<(), LedgerError> {
    let path: String = Input::with_theme(theme)
        .with_prompt("Export to")
        .default(DEFAULT_EXPORT_FILE.to_string())
        .interact_text()
        .map_err(prompt_error)?;
    export::write_csv(ledger, path.as_ref())?;
    println!(
        "{}",
        format!("Exported {} records to {path}.", ledger.record_count()).green()
    );
    Ok(())
}

fn import_csv(
    theme: &ColorfulTheme,
    ledger: &mut SessionLedger,
    config: &Config,
) -> Result<(), LedgerError> {
    let path: String = Input::with_theme(theme)
        .with_prompt("Import from")
        .default(DEFAULT_EXPORT_FILE.to_string())
        .interact_text()
        .map_err(prompt_error)?;
    if !ledger.is_empty() {
        let replace = Confirm::with_theme(theme)
            .with_prompt(format!(
                "Replace the current {} records?",
                ledger.record_count()
            ))
            .default(false)
            .interact()
            .map_err(prompt_error)?;
        if !replace {
            return Ok(());
        }
    }
    let reload = csv_import::reload_from_csv(path.as_ref(), config, today())?;
    for issue in &reload.issues {
        println!(
            "{}",
            format!("Line {}: {}", issue.line, issue.reason).yellow()
        );
    }
    let loaded = reload.records.len();
    ledger.records = reload.records;
    ledger.touch();
    println!("{}", format!("Loaded {loaded} records from {path}.").green());
    Ok(())
}

fn save_snapshot(store: &LedgerStore, ledger: &SessionLedger) -> Result<(), LedgerError> {
    let path = store.save(ledger)?;
    println!("{}", format!("Snapshot saved to {}.", path.display()).green());
    Ok(())
}

fn load_snapshot(
    theme: &ColorfulTheme,
    store: &LedgerStore,
    ledger: &mut SessionLedger,
) -> Result<(), LedgerError> {
    let names = store.list()?;
    if names.is_empty() {
        println!("{}", "No snapshots saved yet.".yellow());
        return Ok(());
    }
    let choice = Select::with_theme(theme)
        .with_prompt("Snapshot")
        .items(&names)
        .default(0)
        .interact()
        .map_err(prompt_error)?;
    let mut loaded = store.load(&names[choice])?;
    loaded.refresh(today());
    *ledger = loaded;
    println!(
        "{}",
        format!("Loaded {} records.", ledger.record_count()).green()
    );
    Ok(())
}

fn clear_records(theme: &ColorfulTheme, ledger: &mut SessionLedger) -> Result<(), LedgerError> {
    if ledger.is_empty() {
        println!("{}", "Ledger is already empty.".yellow());
        return Ok(());
    }
    let confirmed = Confirm::with_theme(theme)
        .with_prompt(format!("Remove all {} records?", ledger.record_count()))
        .default(false)
        .interact()
        .map_err(prompt_error)?;
    if confirmed {
        ledger.clear();
        println!("{}", "Ledger cleared.".green());
    }
    Ok(())
}
