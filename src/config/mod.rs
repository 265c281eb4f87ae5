use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use crate::{
    errors::LedgerError,
    ledger::CptCode,
    utils::paths::{self, ensure_dir},
};

const TMP_SUFFIX: &str = "tmp";

static DEFAULT_FEES: Lazy<BTreeMap<CptCode, f64>> = Lazy::new(|| {
    BTreeMap::from([
        (CptCode::Psychotherapy90837, 200.0),
        (CptCode::Intake90791, 150.0),
    ])
});

/// Fee schedule configuration. Each known CPT code maps to its default
/// session fee; codes missing from a loaded file fall back to the built-in
/// defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub fee_schedule: BTreeMap<CptCode, f64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fee_schedule: DEFAULT_FEES.clone(),
        }
    }
}

impl Config {
    pub fn fee_for(&self, code: CptCode) -> f64 {
        self.fee_schedule
            .get(&code)
            .or_else(|| DEFAULT_FEES.get(&code))
            .copied()
            .unwrap_or(0.0)
    }
}

pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self, LedgerError> {
        Self::from_base(paths::app_data_dir())
    }

    pub fn with_base_dir(base: PathBuf) -> Result<Self, LedgerError> {
        Self::from_base(base)
    }

    fn from_base(base: PathBuf) -> Result<Self, LedgerError> {
        ensure_dir(&base)?;
        Ok(Self {
            path: base.join("config.json"),
        })
    }

    pub fn load(&self) -> Result<Config, LedgerError> {
        if self.path.exists() {
            let data = fs::read_to_string(&self.path)?;
            Ok(serde_json::from_str(&data)?)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self, config: &Config) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        let json = serde_json::to_string_pretty(config)?;
        let tmp = tmp_path(&self.path);
        write_atomic(&tmp, &json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
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

fn write_atomic(path: &Path, data: &str) -> Result<(), LedgerError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_carry_both_known_codes() {
        let config = Config::default();
        assert_eq!(config.fee_for(CptCode::Psychotherapy90837), 200.0);
        assert_eq!(config.fee_for(CptCode::Intake90791), 150.0);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let temp = TempDir::new().expect("temp dir");
        let manager = ConfigManager::with_base_dir(temp.path().to_path_buf()).expect("manager");
        let config = manager.load().expect("load defaults");
        assert_eq!(config.fee_schedule.len(), 2);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let temp = TempDir::new().expect("temp dir");
        let manager = ConfigManager::with_base_dir(temp.path().to_path_buf()).expect("manager");
        let mut config = Config::default();
        config.fee_schedule.insert(CptCode::Psychotherapy90837, 225.0);
        manager.save(&config).expect("save config");
        let loaded = manager.load().expect("load config");
        assert_eq!(loaded.fee_for(CptCode::Psychotherapy90837), 225.0);
        assert_eq!(loaded.fee_for(CptCode::Intake90791), 150.0);
    }
}
