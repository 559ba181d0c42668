//! # Optimizer Module
//!
//! Driver che collega configurazione, registry dei worker ed esecuzione:
//! - `image_optim`: Orchestratore per singoli file, dati in memoria e batch

pub mod image_optim;

pub use image_optim::{ImageOptim, OptimizedImage};
