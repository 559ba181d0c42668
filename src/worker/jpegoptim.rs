//! jpegoptim: JPEG optimization with optional quality cap and marker stripping.
//!
//! Runs in place on a copy of the source:
//! `jpegoptim [-m<max_quality>] --strip-<marker>... -q -- <dst>`

use super::{optimized, path_arg, Worker, WorkerDescriptor};
use crate::error::OptimizeError;
use crate::executor::ProcessExecutor;
use crate::format::ImageFormat;
use crate::options::{to_integer, to_string_list, OptionSchema, OptionSpec, Options, ResolvedOptions, Warnings};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

/// Markers jpegoptim knows how to strip
const STRIP_MARKERS: [&str; 5] = ["all", "comments", "exif", "iptc", "icc"];

const DEFAULT_MAX_QUALITY: i64 = 100;

pub static SCHEMA: OptionSchema = OptionSchema::new(
    "jpegoptim",
    &[
        OptionSpec {
            name: "strip",
            default: || json!(["all"]),
            transform: Some(strip_markers),
        },
        OptionSpec {
            name: "max_quality",
            default: || json!(DEFAULT_MAX_QUALITY),
            transform: Some(max_quality),
        },
    ],
);

pub static DESCRIPTOR: WorkerDescriptor = WorkerDescriptor {
    name: "Jpegoptim",
    bin: "jpegoptim",
    formats: &[ImageFormat::Jpeg],
    schema: &SCHEMA,
    build,
};

fn build(executor: Arc<ProcessExecutor>, options: Options) -> Result<Box<dyn Worker>, OptimizeError> {
    Ok(Box::new(Jpegoptim::new(executor, options)?))
}

fn strip_markers(value: Value, warnings: &mut Warnings) -> Value {
    let mut markers: Vec<String> = Vec::new();
    let mut unknown: Vec<String> = Vec::new();
    for marker in to_string_list(value) {
        if !STRIP_MARKERS.contains(&marker.as_str()) {
            unknown.push(marker);
        } else if !markers.contains(&marker) {
            markers.push(marker);
        }
    }
    if !unknown.is_empty() {
        warnings.push(format!("Unknown markers for jpegoptim: {}", unknown.join(", ")));
    }
    json!(markers)
}

fn max_quality(value: Value, warnings: &mut Warnings) -> Value {
    json!(to_integer(value, DEFAULT_MAX_QUALITY, "max_quality", warnings))
}

pub struct Jpegoptim {
    executor: Arc<ProcessExecutor>,
    options: ResolvedOptions,
    /// Markers to strip
    strip: Vec<String>,
    /// Maximum image quality factor
    max_quality: i64,
}

impl Jpegoptim {
    pub fn new(executor: Arc<ProcessExecutor>, options: Options) -> Result<Self, OptimizeError> {
        let options = SCHEMA.resolve(options)?;
        Ok(Self {
            executor,
            strip: options.strings("strip")?,
            max_quality: options.int("max_quality")?,
            options,
        })
    }

    pub fn strip(&self) -> &[String] {
        &self.strip
    }

    pub fn max_quality(&self) -> i64 {
        self.max_quality
    }

    fn arguments(&self, dst: &Path) -> Vec<String> {
        let mut args = Vec::new();
        if self.max_quality < 100 {
            args.push(format!("-m{}", self.max_quality));
        }
        for marker in &self.strip {
            args.push(format!("--strip-{}", marker));
        }
        args.extend(["-q".to_string(), "--".to_string(), path_arg(dst)]);
        args
    }
}

#[async_trait]
impl Worker for Jpegoptim {
    fn descriptor(&self) -> &'static WorkerDescriptor {
        &DESCRIPTOR
    }

    fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    /// Lossy runs go first so lossless workers see their output
    fn run_order(&self) -> i32 {
        if self.max_quality < 100 {
            -1
        } else {
            0
        }
    }

    async fn optimize(&self, src: &Path, dst: &Path) -> Result<bool, OptimizeError> {
        tokio::fs::copy(src, dst).await?;
        let success = self.executor.execute(DESCRIPTOR.bin, &self.arguments(dst)).await?;
        Ok(success && optimized(src, dst).await?)
    }
}
