//! # Image Optim Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom
//! - `options`: Schema delle opzioni dei worker e trasformazioni permissive
//! - `bin_resolver`: Ricerca dei tool esterni e directory di risoluzione
//! - `executor`: Esecuzione dei tool con `nice`, PATH isolato e diagnostica
//! - `worker`: Worker per formato (jpegoptim, jpegtran, oxipng, gifsicle) e registry
//! - `format`: Rilevamento del formato immagine
//! - `file_manager`: Discovery delle immagini e sostituzione sicura
//! - `optimizer`: Orchestratore della catena di worker
//! - `progress`: Progress tracking e statistiche
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use image_optim::{Config, ImageOptim};
//!
//! let optimizer = ImageOptim::new(Config::default())?;
//! optimizer.optimize_image_in_place(&path).await?;
//! ```

pub mod bin_resolver;
pub mod config;
pub mod error;
pub mod executor;
pub mod file_manager;
pub mod format;
pub mod optimizer;
pub mod options;
pub mod progress;
pub mod worker;

pub use bin_resolver::{BinResolver, ToolPathResolver};
pub use config::Config;
pub use error::OptimizeError;
pub use executor::ProcessExecutor;
pub use format::ImageFormat;
pub use optimizer::{ImageOptim, OptimizedImage};
pub use worker::{Worker, WorkerDescriptor, WorkerRegistry};
