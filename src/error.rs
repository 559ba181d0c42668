//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom della libreria.
//!
//! ## Responsabilità:
//! - Definisce `OptimizeError` enum per categorizzare tutti gli errori possibili
//! - Separa gli errori fatali (configurazione, segnali) dai semplici fallimenti
//!   di un tool esterno, che non sono errori ma un `Ok(false)`
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `Configuration`: Opzioni sconosciute passate a un worker
//! - `DuplicateWorker` / `UnknownWorker`: Errori del registry
//! - `BinaryNotFound`: Tool esterno non risolvibile (nessun processo avviato)
//! - `ProcessSignaled`: Processo figlio terminato da un segnale
//! - `Io`: Errori di I/O (file non trovati, permessi, spawn fallito)
//! - `InvalidConfig`: File di configurazione non valido
//! - `UnsupportedFormat`: Formato immagine non riconosciuto
//!
//! ## Esempio:
//! ```rust,ignore
//! let path = resolver.resolve("jpegoptim")?; // BinaryNotFound se manca
//! ```

/// Custom error types for worker construction and execution
#[derive(thiserror::Error, Debug)]
pub enum OptimizeError {
    #[error("Unknown options for {worker}: {}", keys.join(", "))]
    Configuration { worker: String, keys: Vec<String> },

    #[error("Worker registered twice: {0}")]
    DuplicateWorker(String),

    #[error("Unknown worker: {0}")]
    UnknownWorker(String),

    #[error("Binary not found: {0}")]
    BinaryNotFound(String),

    #[error("Process terminated by signal {0}")]
    ProcessSignaled(i32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
}

impl OptimizeError {
    /// Errors that must stop the whole run instead of being reported per file
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OptimizeError::ProcessSignaled(_)
                | OptimizeError::Configuration { .. }
                | OptimizeError::DuplicateWorker(_)
                | OptimizeError::UnknownWorker(_)
                | OptimizeError::InvalidConfig(_)
        )
    }
}
