use dirs::home_dir;
use std::{env, fs, path::Path, path::PathBuf};

use crate::errors::LedgerError;

const DEFAULT_DIR_NAME: &str = ".session_ledger";

/// Returns the application-specific data directory, defaulting to `~/.session_ledger`.
pub fn app_data_dir() -> PathBuf {
    if let Some(custom) = env::var_os("SESSION_LEDGER_HOME") {
        return PathBuf::from(custom);
    }
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DIR_NAME)
}

/// Creates `path` and any missing parents.
pub fn ensure_dir(path: &Path) -> Result<(), LedgerError> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}
