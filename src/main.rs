//! # Image Optim - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione e override da CLI
//! - Discovery delle immagini e avvio dell'optimizer
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (path, nice, threads, worker disabilitati, etc.)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose, `RUST_LOG` ha precedenza)
//! 3. Carica il file di configurazione e applica gli override
//! 4. Trova le immagini e le ottimizza in place (o solo misura con `--dry-run`)
//! 5. Mostra il riepilogo finale
//!
//! ## Esempio di utilizzo:
//! ```bash
//! image-optim -r photos/ --threads 4 --disable gifsicle --verbose
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use image_optim::{
    file_manager::FileManager, progress::ProgressManager, Config, ImageOptim, ToolPathResolver,
    WorkerRegistry,
};

#[derive(Parser)]
#[command(name = "image-optim")]
#[command(about = "Optimize JPEG, PNG and GIF images losslessly with external tools")]
struct Args {
    /// Image files or directories to optimize
    #[arg(required_unless_present_any = ["list_workers", "tools_report"])]
    paths: Vec<PathBuf>,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Nice level for external tools (-20..=19)
    #[arg(long, allow_negative_numbers = true)]
    nice: Option<i32>,

    /// Number of images optimized concurrently
    #[arg(long)]
    threads: Option<usize>,

    /// Verbose logging, one line per executed command
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (default: user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable a worker by identifier (repeatable)
    #[arg(long = "disable", value_name = "WORKER")]
    disabled: Vec<String>,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Dry run - measure savings without replacing files
    #[arg(long)]
    dry_run: bool,

    /// List known workers and exit
    #[arg(long)]
    list_workers: bool,

    /// Show which tools can be found and exit
    #[arg(long)]
    tools_report: bool,
}

async fn load_config(args: &Args) -> Result<Config> {
    let mut config = match args.config {
        Some(ref path) => {
            if !path.is_file() {
                return Err(anyhow::anyhow!("Config file does not exist: {}", path.display()));
            }
            Config::from_file(path).await?
        }
        None => match Config::default_path() {
            Some(path) => Config::from_file(&path).await?,
            None => Config::default(),
        },
    };

    if let Some(nice) = args.nice {
        config.nice = nice;
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if args.verbose {
        config.verbose = true;
    }
    for identifier in &args.disabled {
        if WorkerRegistry::global().find(identifier).is_none() {
            return Err(anyhow::anyhow!("Unknown worker: {}", identifier));
        }
        config.disable_worker(identifier);
    }

    config.validate()?;
    Ok(config)
}

fn list_workers() {
    for descriptor in WorkerRegistry::global().descriptors() {
        let formats: Vec<&str> = descriptor.formats.iter().map(|f| f.as_str()).collect();
        let options: Vec<&str> = descriptor.schema.names().collect();
        println!(
            "{:<10} bin: {:<10} formats: {:<10} options: {}",
            descriptor.identifier(),
            descriptor.bin,
            formats.join(","),
            options.join(", ")
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if args.list_workers {
        list_workers();
        return Ok(());
    }

    let config = load_config(&args).await?;

    if args.tools_report {
        let resolver = ToolPathResolver::from_config(&config)?;
        print!("{}", resolver.tools_report(WorkerRegistry::global().binaries()));
        return Ok(());
    }

    let files = FileManager::find_images(&args.paths, args.recursive);
    if files.is_empty() {
        warn!("No images found");
        return Ok(());
    }
    info!("Found {} images", files.len());

    let optimizer = ImageOptim::new(config).context("Failed to set up workers")?;

    let progress = if args.no_progress {
        ProgressManager::hidden()
    } else {
        ProgressManager::new(files.len() as u64)
    };

    let stats = optimizer.optimize_images(files, !args.dry_run, &progress).await?;
    progress.finish("Done");

    if args.dry_run {
        println!("Dry run, no files replaced");
    }
    println!("{}", stats.format_summary());

    Ok(())
}
