//! # File Management Module
//!
//! Questo modulo gestisce tutte le operazioni sui file e la discovery delle immagini.
//!
//! ## Responsabilità:
//! - Discovery di immagini da una lista di path (file e directory)
//! - Sostituzione atomica dell'originale (copia temporanea + rename)
//! - Utilità per calcoli dimensioni e percentuali
//!
//! ## Regole di discovery:
//! - I file passati esplicitamente sono sempre inclusi (formato rilevato dopo)
//! - Le directory sono esplorate solo al primo livello, o ricorsivamente con `recursive`
//! - Dentro le directory si considerano solo estensioni JPEG, PNG, GIF
//! - Path inesistenti generano un warning e vengono saltati
//!
//! ## Esempio:
//! ```rust,ignore
//! let files = FileManager::find_images(&[PathBuf::from("photos")], true);
//! ```

use crate::error::OptimizeError;
use crate::format::ImageFormat;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;
use walkdir::WalkDir;

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Expand `paths` into the list of image files to optimize
    pub fn find_images(paths: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut seen = HashSet::new();

        for path in paths {
            if path.is_file() {
                if seen.insert(path.clone()) {
                    files.push(path.clone());
                }
            } else if path.is_dir() {
                let walker = if recursive {
                    WalkDir::new(path)
                } else {
                    WalkDir::new(path).max_depth(1)
                };
                for entry in walker
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                {
                    let entry_path = entry.path();
                    if Self::is_supported_format(entry_path) && seen.insert(entry_path.to_path_buf()) {
                        files.push(entry_path.to_path_buf());
                    }
                }
            } else {
                warn!("{} does not exist", path.display());
            }
        }

        files
    }

    /// Check if a file extension belongs to a supported image format
    pub fn is_supported_format(path: &Path) -> bool {
        ImageFormat::from_extension(path).is_some()
    }

    /// Safely replace a file with its optimized version.
    ///
    /// The new content is staged in a temp file beside `original` and renamed
    /// over it, so `original` is either fully replaced or left as it was.
    pub async fn replace_file(original: &Path, optimized: &Path) -> Result<(), OptimizeError> {
        let dir = match original.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let permissions = fs::metadata(original).await?.permissions();

        // removed on drop unless persisted
        let staged = tempfile::Builder::new()
            .prefix(".image_optim")
            .tempfile_in(dir)?
            .into_temp_path();
        fs::copy(optimized, &staged).await?;
        fs::set_permissions(&staged, permissions).await?;

        staged.persist(original).map_err(|e| OptimizeError::Io(e.error))?;
        Ok(())
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}
