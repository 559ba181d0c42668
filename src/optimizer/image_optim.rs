//! # Main Optimizer Orchestrator Module
//!
//! Questo è il modulo che orchestra i worker su uno o più file.
//!
//! ## Responsabilità:
//! - Istanzia una sola volta tutti i worker abilitati (opzioni validate subito)
//! - Sceglie i worker per formato, ordinati per `run_order`
//! - Esegue la catena di worker su un file usando file temporanei
//! - Gestisce la concorrenza tra file con un limite di `threads`
//!
//! ## Catena per file:
//! 1. Rilevamento formato (contenuto, poi estensione)
//! 2. Ogni worker scrive su un nuovo file temporaneo accanto al sorgente
//! 3. Se il risultato è migliore diventa l'input del worker successivo
//! 4. Alla fine resta il miglior temporaneo, oppure nessuno
//!
//! ## Error handling:
//! - Tool mancante: il worker viene saltato con warning (`skip_missing_workers`)
//! - Processo terminato da segnale: errore fatale, la batch si ferma
//! - Altri errori per singolo file: contati nelle statistiche, la batch continua
//!
//! ## Esempio:
//! ```rust,ignore
//! let optimizer = ImageOptim::new(Config::default())?;
//! if let Some(result) = optimizer.optimize_image_in_place(&path).await? {
//!     println!("saved {} bytes", result.original_size - result.optimized_size);
//! }
//! ```

use crate::{
    bin_resolver::{BinResolver, ToolPathResolver},
    config::{Config, WorkerSetting},
    error::OptimizeError,
    file_manager::FileManager,
    format::ImageFormat,
    progress::{OptimizationStats, ProgressManager},
    worker::{Worker, WorkerRegistry},
    executor::ProcessExecutor,
};
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;
use tracing::{debug, error, info, warn};

/// Best result of a worker chain, held in a temp file removed on drop
#[derive(Debug)]
pub struct OptimizedImage {
    pub original: PathBuf,
    pub path: TempPath,
    pub original_size: u64,
    pub optimized_size: u64,
}

/// Runs the configured workers on images
pub struct ImageOptim {
    config: Config,
    /// Enabled workers in registration order
    workers: Vec<Box<dyn Worker>>,
}

impl ImageOptim {
    /// Create an optimizer using the default tool resolver and the builtin workers
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let resolver = Arc::new(ToolPathResolver::from_config(&config)?);
        Self::with_resolver(config, resolver, WorkerRegistry::global())
    }

    /// Create an optimizer with an explicit resolver and registry
    pub fn with_resolver(
        config: Config,
        resolver: Arc<dyn BinResolver>,
        registry: &WorkerRegistry,
    ) -> Result<Self> {
        if let Some(unknown) = config.workers.keys().find(|id| registry.find(id).is_none()) {
            return Err(OptimizeError::UnknownWorker(unknown.clone()).into());
        }

        let executor = Arc::new(ProcessExecutor::new(resolver));
        let mut workers = Vec::new();
        for descriptor in registry.descriptors() {
            let identifier = descriptor.identifier();
            match config.worker_setting(&identifier)? {
                WorkerSetting::Disabled => debug!("Worker {} disabled", identifier),
                WorkerSetting::Enabled(options) => {
                    let worker = descriptor
                        .create(executor.clone(), options)
                        .with_context(|| format!("Failed to configure worker {}", identifier))?;
                    workers.push(worker);
                }
            }
        }

        Ok(Self { config, workers })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Enabled workers, in registration order
    pub fn workers(&self) -> impl Iterator<Item = &dyn Worker> {
        self.workers.iter().map(|worker| worker.as_ref())
    }

    /// Workers for `format`, lowest run order first
    pub fn workers_for(&self, format: ImageFormat) -> Vec<&dyn Worker> {
        let mut workers: Vec<&dyn Worker> = self
            .workers()
            .filter(|worker| worker.image_formats().contains(&format))
            .collect();
        // stable: registration order within the same run order
        workers.sort_by_key(|worker| worker.run_order());
        workers
    }

    /// Run the worker chain for one file, leaving the original untouched.
    ///
    /// Returns `None` when no worker produced a smaller file.
    pub async fn optimize_image(&self, path: &Path) -> Result<Option<OptimizedImage>, OptimizeError> {
        let format = ImageFormat::detect(path)
            .ok_or_else(|| OptimizeError::UnsupportedFormat(path.display().to_string()))?;
        let workers = self.workers_for(format);
        if workers.is_empty() {
            debug!("No workers for {} ({})", path.display(), format);
            return Ok(None);
        }

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut best: Option<TempPath> = None;
        for worker in workers {
            let dst = tempfile::Builder::new()
                .prefix(".image_optim")
                .suffix(format.extension())
                .tempfile_in(dir)?
                .into_temp_path();
            let src: &Path = best.as_deref().unwrap_or(path);

            match worker.optimize(src, &dst).await {
                Ok(true) => {
                    debug!("{} improved {}", worker.identifier(), path.display());
                    best = Some(dst);
                }
                Ok(false) => debug!("{} did not improve {}", worker.identifier(), path.display()),
                Err(OptimizeError::BinaryNotFound(bin)) if self.config.skip_missing_workers => {
                    warn!("Skipping {}: {} not found", worker.identifier(), bin);
                }
                Err(e) => return Err(e),
            }
        }

        match best {
            Some(optimized) => {
                let original_size = tokio::fs::metadata(path).await?.len();
                let optimized_size = tokio::fs::metadata(&optimized).await?.len();
                Ok(Some(OptimizedImage {
                    original: path.to_path_buf(),
                    path: optimized,
                    original_size,
                    optimized_size,
                }))
            }
            None => Ok(None),
        }
    }

    /// Optimize one file and replace it when the result is smaller
    pub async fn optimize_image_in_place(&self, path: &Path) -> Result<Option<OptimizedImage>, OptimizeError> {
        let optimized = self.optimize_image(path).await?;
        if let Some(ref result) = optimized {
            FileManager::replace_file(path, &result.path).await?;
        }
        Ok(optimized)
    }

    /// Optimize image data held in memory, returning smaller data if any
    pub async fn optimize_image_data(&self, data: &[u8]) -> Result<Option<Vec<u8>>, OptimizeError> {
        let format = ImageFormat::from_bytes(data)
            .ok_or_else(|| OptimizeError::UnsupportedFormat("image data".to_string()))?;
        let input = tempfile::Builder::new()
            .prefix("image_optim")
            .suffix(format.extension())
            .tempfile()?
            .into_temp_path();
        tokio::fs::write(&input, data).await?;

        match self.optimize_image(&input).await? {
            Some(result) => Ok(Some(tokio::fs::read(&result.path).await?)),
            None => Ok(None),
        }
    }

    /// Optimize many files, at most `threads` at a time.
    ///
    /// Per-file failures are logged and counted; a fatal error (such as a tool
    /// killed by a signal) stops the batch and is returned.
    pub async fn optimize_images(
        &self,
        paths: Vec<PathBuf>,
        in_place: bool,
        progress: &ProgressManager,
    ) -> Result<OptimizationStats, OptimizeError> {
        let mut stats = OptimizationStats::new();
        let mut results = stream::iter(paths)
            .map(|path| async move {
                let result = if in_place {
                    self.optimize_image_in_place(&path).await
                } else {
                    self.optimize_image(&path).await
                };
                (path, result)
            })
            .buffer_unordered(self.config.threads);

        while let Some((path, result)) = results.next().await {
            let name = path.file_name().unwrap_or_default().to_string_lossy().to_string();
            match result {
                Ok(Some(optimized)) => {
                    let reduction =
                        FileManager::calculate_reduction(optimized.original_size, optimized.optimized_size);
                    info!(
                        "{}: {} -> {} ({:.1}% saved)",
                        path.display(),
                        FileManager::format_size(optimized.original_size),
                        FileManager::format_size(optimized.optimized_size),
                        reduction
                    );
                    stats.add_optimized(optimized.original_size, optimized.optimized_size);
                    progress.update(&format!("{}: {:.1}% saved", name, reduction));
                }
                Ok(None) => {
                    let size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
                    stats.add_skipped(size);
                    progress.update(&format!("{}: unchanged", name));
                }
                Err(e) if e.is_fatal() => {
                    error!("Aborting on {}: {}", path.display(), e);
                    return Err(e);
                }
                Err(e) => {
                    error!("Failed to optimize {}: {}", path.display(), e);
                    stats.add_error();
                    progress.update(&format!("{}: failed", name));
                }
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::test_support::FakeResolver;
    use serde_json::json;
    use tempfile::TempDir;

    /// Replaces the last argument with its first `size` bytes
    fn shrink_last(size: usize) -> String {
        format!(
            "for last; do :; done\nhead -c {size} \"$last\" > \"$last.part\" && mv \"$last.part\" \"$last\""
        )
    }

    /// jpegtran style: `... -outfile <dst> <src>`
    fn shrink_outfile(size: usize) -> String {
        format!("for a; do dst=$src; src=$a; done\nhead -c {size} \"$src\" > \"$dst\"")
    }

    fn optimizer(config: Config, resolver: FakeResolver) -> Result<ImageOptim> {
        ImageOptim::with_resolver(config, Arc::new(resolver), WorkerRegistry::global())
    }

    async fn jpeg(dir: &TempDir, name: &str, size: usize) -> PathBuf {
        let path = dir.path().join(name);
        let mut data = vec![0xff, 0xd8, 0xff, 0xe0];
        data.resize(size, b'x');
        tokio::fs::write(&path, data).await.unwrap();
        path
    }

    #[test]
    fn test_unknown_worker_in_config() {
        let mut config = Config::default();
        config.workers.insert("pngcrush".to_string(), json!({}));
        let err = optimizer(config, FakeResolver::new(10)).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<OptimizeError>(),
            Some(OptimizeError::UnknownWorker(id)) if id == "pngcrush"
        ));
    }

    #[test]
    fn test_invalid_worker_options_abort_construction() {
        let mut config = Config::default();
        config.workers.insert("jpegoptim".to_string(), json!({"quality": 10}));
        let err = optimizer(config, FakeResolver::new(10)).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<OptimizeError>(),
            Some(OptimizeError::Configuration { keys, .. }) if keys == &["quality"]
        ));
    }

    #[test]
    fn test_workers_for_orders_lossy_first() {
        let lossless = optimizer(Config::default(), FakeResolver::new(10)).unwrap();
        let ids: Vec<String> = lossless.workers_for(ImageFormat::Jpeg).iter().map(|w| w.identifier()).collect();
        assert_eq!(ids, vec!["jpegoptim", "jpegtran"]);
        assert_eq!(lossless.workers_for(ImageFormat::Png).len(), 1);

        let mut config = Config::default();
        config.workers.insert("jpegoptim".to_string(), json!({"max_quality": 80}));
        config.disable_worker("oxipng");
        let lossy = optimizer(config, FakeResolver::new(10)).unwrap();
        let jpeg = lossy.workers_for(ImageFormat::Jpeg);
        assert_eq!(jpeg[0].identifier(), "jpegoptim");
        assert_eq!(jpeg[0].run_order(), -1);
        assert!(lossy.workers_for(ImageFormat::Png).is_empty());
        assert_eq!(lossy.workers().count(), 3);
    }

    #[test]
    fn test_disabled_worker_is_not_built() {
        let mut config = Config::default();
        config.disable_worker("jpegoptim");
        let built = optimizer(config, FakeResolver::new(10)).unwrap();
        let ids: Vec<String> = built.workers_for(ImageFormat::Jpeg).iter().map(|w| w.identifier()).collect();
        assert_eq!(ids, vec!["jpegtran"]);
    }

    #[tokio::test]
    async fn test_chain_keeps_best_and_skips_missing_tools() {
        let dir = TempDir::new().unwrap();
        let src = jpeg(&dir, "photo.jpg", 100).await;

        // jpegtran is not installed
        let resolver = FakeResolver::new(10);
        resolver.install("jpegoptim", &shrink_last(40));
        let optimizer = optimizer(Config::default(), resolver).unwrap();

        let result = optimizer.optimize_image(&src).await.unwrap().unwrap();
        assert_eq!(result.original_size, 100);
        assert_eq!(result.optimized_size, 40);
        assert_eq!(tokio::fs::metadata(&src).await.unwrap().len(), 100);
    }

    #[tokio::test]
    async fn test_chain_feeds_improvements_forward() {
        let dir = TempDir::new().unwrap();
        let src = jpeg(&dir, "photo.jpg", 100).await;

        let resolver = FakeResolver::new(10);
        resolver.install("jpegoptim", &shrink_last(60));
        resolver.install("jpegtran", &shrink_outfile(30));
        let optimizer = optimizer(Config::default(), resolver).unwrap();

        let result = optimizer.optimize_image(&src).await.unwrap().unwrap();
        assert_eq!(result.optimized_size, 30);
    }

    #[tokio::test]
    async fn test_missing_tool_is_fatal_when_not_skipping() {
        let dir = TempDir::new().unwrap();
        let src = jpeg(&dir, "photo.jpg", 100).await;

        let config = Config {
            skip_missing_workers: false,
            ..Default::default()
        };
        let optimizer = optimizer(config, FakeResolver::new(10)).unwrap();
        let err = optimizer.optimize_image(&src).await.unwrap_err();
        assert!(matches!(err, OptimizeError::BinaryNotFound(ref bin) if bin == "jpegoptim"));
    }

    #[tokio::test]
    async fn test_no_improvement_gives_none() {
        let dir = TempDir::new().unwrap();
        let src = jpeg(&dir, "photo.jpg", 100).await;

        let resolver = FakeResolver::new(10);
        resolver.install("jpegoptim", "exit 0");
        resolver.install("jpegtran", "exit 1");
        let optimizer = optimizer(Config::default(), resolver).unwrap();

        assert!(optimizer.optimize_image(&src).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unsupported_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        tokio::fs::write(&path, b"hello").await.unwrap();

        let optimizer = optimizer(Config::default(), FakeResolver::new(10)).unwrap();
        let err = optimizer.optimize_image(&path).await.unwrap_err();
        assert!(matches!(err, OptimizeError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn test_in_place_replaces_original() {
        let dir = TempDir::new().unwrap();
        let src = jpeg(&dir, "photo.jpg", 100).await;

        let resolver = FakeResolver::new(10);
        resolver.install("jpegoptim", &shrink_last(40));
        let optimizer = optimizer(Config::default(), resolver).unwrap();

        let result = optimizer.optimize_image_in_place(&src).await.unwrap().unwrap();
        assert_eq!(result.optimized_size, 40);
        assert_eq!(tokio::fs::metadata(&src).await.unwrap().len(), 40);
    }

    #[tokio::test]
    async fn test_optimize_image_data() {
        let resolver = FakeResolver::new(10);
        resolver.install("jpegoptim", &shrink_last(10));
        let optimizer = optimizer(Config::default(), resolver).unwrap();

        let mut data = vec![0xff, 0xd8, 0xff, 0xe0];
        data.resize(50, b'x');
        let optimized = optimizer.optimize_image_data(&data).await.unwrap().unwrap();
        assert_eq!(optimized, data[..10].to_vec());

        assert!(optimizer.optimize_image_data(b"plain text").await.is_err());
    }

    #[tokio::test]
    async fn test_batch_stats() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            jpeg(&dir, "a.jpg", 100).await,
            jpeg(&dir, "b.jpg", 100).await,
            dir.path().join("c.txt"),
        ];
        tokio::fs::write(&files[2], b"text").await.unwrap();

        let resolver = FakeResolver::new(10);
        resolver.install("jpegoptim", &shrink_last(25));
        let config = Config {
            threads: 2,
            ..Default::default()
        };
        let optimizer = optimizer(config, resolver).unwrap();

        let stats = optimizer
            .optimize_images(files, false, &ProgressManager::hidden())
            .await
            .unwrap();
        assert_eq!(stats.files_processed, 3);
        assert_eq!(stats.files_optimized, 2);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.total_bytes_saved, 150);
    }

    #[tokio::test]
    async fn test_batch_stops_on_signal() {
        let dir = TempDir::new().unwrap();
        let files = vec![jpeg(&dir, "a.jpg", 100).await];

        let resolver = FakeResolver::new(10);
        resolver.install("jpegoptim", "kill -9 $$");
        let optimizer = optimizer(Config::default(), resolver).unwrap();

        let err = optimizer
            .optimize_images(files, true, &ProgressManager::hidden())
            .await
            .unwrap_err();
        assert!(matches!(err, OptimizeError::ProcessSignaled(9)));
        // original untouched
        assert_eq!(tokio::fs::metadata(dir.path().join("a.jpg")).await.unwrap().len(), 100);
    }
}
