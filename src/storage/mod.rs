pub mod csv_import;

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use crate::{
    errors::LedgerError,
    ledger::SessionLedger,
    utils::paths::{self, ensure_dir},
};

pub type Result<T> = std::result::Result<T, LedgerError>;

const LEDGER_EXTENSION: &str = "json";
const TMP_SUFFIX: &str = "tmp";

/// JSON-backed store for ledger snapshots under the app data directory.
///
/// Persistence is a collaborator here, not a guarantee: the canonical ledger
/// lives in memory for the session and snapshots exist so an operator can
/// pick up where they left off.
pub struct LedgerStore {
    ledgers_dir: PathBuf,
}

impl LedgerStore {
    pub fn new(root: Option<PathBuf>) -> Result<Self> {
        let base = root.unwrap_or_else(paths::app_data_dir);
        ensure_dir(&base)?;
        let ledgers_dir = base.join("ledgers");
        ensure_dir(&ledgers_dir)?;
        Ok(Self { ledgers_dir })
    }

    pub fn new_default() -> Result<Self> {
        Self::new(None)
    }

    pub fn ledger_path(&self, name: &str) -> PathBuf {
        self.ledgers_dir
            .join(format!("{}.{}", canonical_name(name), LEDGER_EXTENSION))
    }

    pub fn save(&self, ledger: &SessionLedger) -> Result<PathBuf> {
        let path = self.ledger_path(&ledger.name);
        save_ledger_to_path(ledger, &path)?;
        tracing::info!(path = %path.display(), "saved ledger snapshot");
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<SessionLedger> {
        let path = self.ledger_path(name);
        if !path.exists() {
            return Err(LedgerError::Storage(format!(
                "ledger `{}` not found at {}",
                name,
                path.display()
            )));
        }
        load_ledger_from_path(&path)
    }

    pub fn list(&self) -> Result<Vec<String>> {
        if !self.ledgers_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.ledgers_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(LEDGER_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                entries.push(stem.to_string());
            }
        }
        entries.sort();
        Ok(entries)
    }
}

pub fn save_ledger_to_path(ledger: &SessionLedger, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let json = serde_json::to_string_pretty(ledger)?;
    let tmp = tmp_path(path);
    write_atomic(&tmp, &json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn load_ledger_from_path(path: &Path) -> Result<SessionLedger> {
    let data = fs::read_to_string(path)?;
    let ledger: SessionLedger = serde_json::from_str(&data)?;
    Ok(ledger)
}

fn canonical_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' => c,
            _ => '_',
        })
        .collect();
    if sanitized.trim_matches('_').is_empty() {
        "ledger".into()
    } else {
        sanitized
    }
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

fn write_atomic(path: &Path, data: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}
