//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con la policy di esecuzione e le opzioni dei worker
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `nice`: Priorità dei processi esterni (-20..=19, default: 10)
//! - `threads`: Numero di file elaborati in parallelo (default: CPU disponibili)
//! - `verbose`: Una riga su stderr per ogni comando eseguito (default: false)
//! - `tools_dir`: Directory extra dove cercare i tool (default: None)
//! - `skip_missing_workers`: Salta i worker il cui tool non è installato (default: true)
//! - `workers`: Opzioni per worker, `false` per disabilitarlo
//!
//! ## Esempio file:
//! ```json
//! {
//!   "nice": 5,
//!   "workers": {
//!     "jpegoptim": { "max_quality": 85, "strip": ["exif", "comments"] },
//!     "gifsicle": false
//!   }
//! }
//! ```

use crate::error::OptimizeError;
use crate::options::Options;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Configuration for the optimizer and its workers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Nice level for external tools
    pub nice: i32,
    /// Number of files optimized concurrently
    pub threads: usize,
    /// Report every executed command on stderr
    pub verbose: bool,
    /// Extra directory searched for tools
    pub tools_dir: Option<PathBuf>,
    /// Skip workers whose binary cannot be found instead of failing
    pub skip_missing_workers: bool,
    /// Per-worker options keyed by worker identifier; `false` disables a worker
    pub workers: BTreeMap<String, Value>,
}

/// What the configuration says about one worker
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerSetting {
    Disabled,
    Enabled(Options),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nice: 10,
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            verbose: false,
            tools_dir: None,
            skip_missing_workers: true,
            workers: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !(-20..=19).contains(&self.nice) {
            return Err(anyhow::anyhow!("Nice level must be between -20 and 19"));
        }

        if self.threads == 0 {
            return Err(anyhow::anyhow!("Number of threads must be greater than 0"));
        }

        if let Some(ref tools_dir) = self.tools_dir {
            if !tools_dir.is_dir() {
                return Err(anyhow::anyhow!("Tools directory does not exist: {}", tools_dir.display()));
            }
        }

        for identifier in self.workers.keys() {
            self.worker_setting(identifier)?;
        }

        Ok(())
    }

    /// Interpret the `workers` entry for one worker identifier.
    ///
    /// A missing entry or `true` means defaults, an object carries options.
    pub fn worker_setting(&self, identifier: &str) -> Result<WorkerSetting> {
        match self.workers.get(identifier) {
            None | Some(Value::Bool(true)) => Ok(WorkerSetting::Enabled(Options::new())),
            Some(Value::Bool(false)) => Ok(WorkerSetting::Disabled),
            Some(Value::Object(options)) => Ok(WorkerSetting::Enabled(options.clone())),
            Some(other) => Err(OptimizeError::InvalidConfig(format!(
                "options for worker {} must be an object or false, got {}",
                identifier, other
            ))
            .into()),
        }
    }

    /// Disable a worker by identifier
    pub fn disable_worker(&mut self, identifier: &str) {
        self.workers.insert(identifier.to_string(), Value::Bool(false));
    }

    /// Default location of the user configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("image_optim").join("config.json"))
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.nice = 20;
        assert!(config.validate().is_err());

        config.nice = -20;
        config.threads = 0;
        assert!(config.validate().is_err());

        config.threads = 2;
        config.workers.insert("jpegoptim".to_string(), json!(42));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.nice, 10);
        assert!(config.threads > 0);
        assert!(!config.verbose);
        assert!(config.skip_missing_workers);
        assert!(config.workers.is_empty());
    }

    #[test]
    fn test_worker_setting() {
        let mut config = Config::default();
        config.workers.insert("jpegoptim".to_string(), json!({"max_quality": 80}));
        config.workers.insert("oxipng".to_string(), json!(true));
        config.disable_worker("gifsicle");

        match config.worker_setting("jpegoptim").unwrap() {
            WorkerSetting::Enabled(options) => assert_eq!(options.get("max_quality"), Some(&json!(80))),
            WorkerSetting::Disabled => panic!("jpegoptim should be enabled"),
        }
        assert_eq!(config.worker_setting("oxipng").unwrap(), WorkerSetting::Enabled(Options::new()));
        assert_eq!(config.worker_setting("jpegtran").unwrap(), WorkerSetting::Enabled(Options::new()));
        assert_eq!(config.worker_setting("gifsicle").unwrap(), WorkerSetting::Disabled);
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let mut original_config = Config {
            nice: 5,
            threads: 3,
            verbose: true,
            ..Default::default()
        };
        original_config.workers.insert("jpegoptim".to_string(), json!({"strip": "exif"}));

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config.nice, 5);
        assert_eq!(loaded_config.threads, 3);
        assert!(loaded_config.verbose);
        assert_eq!(loaded_config.workers.get("jpegoptim"), Some(&json!({"strip": "exif"})));
    }

    #[tokio::test]
    async fn test_missing_file_gives_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::from_file(&temp_dir.path().join("absent.json")).await.unwrap();
        assert_eq!(config.nice, 10);
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        tokio::fs::write(&config_path, r#"{"nice": 3}"#).await.unwrap();

        let config = Config::from_file(&config_path).await.unwrap();
        assert_eq!(config.nice, 3);
        assert!(config.skip_missing_workers);
    }
}
