//! # Worker Module
//!
//! Un worker incapsula un singolo tool esterno di ottimizzazione per un formato.
//!
//! ## Responsabilità:
//! - `Worker`: trait comune, un tentativo `optimize(src, dst)` per chiamata
//! - `optimized()`: regola di successo basata sulle dimensioni dei file
//! - `identifier_for()`: identificatore underscored derivato dal nome del tipo
//! - `registry`: catalogo dei worker disponibili
//!
//! ## Worker disponibili:
//! - `jpegoptim`: JPEG, lossy opzionale (`max_quality`), strip dei marker
//! - `jpegtran`: JPEG, lossless
//! - `oxipng`: PNG, lossless
//! - `gifsicle`: GIF, lossless
//!
//! ## Regola di successo:
//! `dst` deve esistere, non essere vuoto ed essere strettamente più piccolo di
//! `src`. In caso contrario il chiamante scarta `dst` e tiene l'originale; il
//! worker non cancella mai file.

pub mod gifsicle;
pub mod jpegoptim;
pub mod jpegtran;
pub mod oxipng;
pub mod registry;

pub use registry::{WorkerDescriptor, WorkerRegistry};

use crate::error::OptimizeError;
use crate::format::ImageFormat;
use crate::options::ResolvedOptions;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;

/// One external optimizer bound to validated options
#[async_trait]
pub trait Worker: Send + Sync {
    /// Static description of this worker type
    fn descriptor(&self) -> &'static WorkerDescriptor;

    /// Options resolved at construction
    fn options(&self) -> &ResolvedOptions;

    /// Ordering among workers of the same format, lower runs first
    fn run_order(&self) -> i32 {
        0
    }

    fn identifier(&self) -> String {
        self.descriptor().identifier()
    }

    fn image_formats(&self) -> &'static [ImageFormat] {
        self.descriptor().formats
    }

    /// Write an optimized version of `src` to `dst`.
    ///
    /// `Ok(true)` only when the tool succeeded and `dst` is an improvement.
    async fn optimize(&self, src: &Path, dst: &Path) -> Result<bool, OptimizeError>;
}

/// True iff `dst` exists, is not empty and is strictly smaller than `src`
pub async fn optimized(src: &Path, dst: &Path) -> Result<bool, OptimizeError> {
    let dst_size = match tokio::fs::metadata(dst).await {
        Ok(metadata) => metadata.len(),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    if dst_size == 0 {
        return Ok(false);
    }
    let src_size = tokio::fs::metadata(src).await?.len();
    Ok(dst_size < src_size)
}

/// Underscored identifier of a worker type name: `PngCrush` → `png_crush`
pub fn identifier_for(type_name: &str) -> String {
    let name = type_name.rsplit("::").next().unwrap_or(type_name);
    let mut identifier = String::with_capacity(name.len() + 4);
    let mut previous: Option<char> = None;

    for c in name.chars() {
        if c.is_ascii_uppercase()
            && previous.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit())
        {
            identifier.push('_');
        }
        identifier.extend(c.to_lowercase());
        previous = Some(c);
    }

    identifier
}

/// Path as a command argument
pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
