//! oxipng: lossless PNG optimization, in place on a copy of the source.
//!
//! `oxipng -o <level> --quiet [-i 0|1] [--strip all] -- <dst>`

use super::{optimized, path_arg, Worker, WorkerDescriptor};
use crate::error::OptimizeError;
use crate::executor::ProcessExecutor;
use crate::format::ImageFormat;
use crate::options::{to_bool, to_integer, OptionSchema, OptionSpec, Options, ResolvedOptions, Warnings};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

const DEFAULT_LEVEL: i64 = 3;
const MAX_LEVEL: i64 = 6;

pub static SCHEMA: OptionSchema = OptionSchema::new(
    "oxipng",
    &[
        OptionSpec {
            name: "level",
            default: || json!(DEFAULT_LEVEL),
            transform: Some(level),
        },
        OptionSpec {
            name: "interlace",
            default: || Value::Null,
            transform: Some(interlace),
        },
        OptionSpec {
            name: "strip",
            default: || json!(true),
            transform: Some(strip),
        },
    ],
);

pub static DESCRIPTOR: WorkerDescriptor = WorkerDescriptor {
    name: "Oxipng",
    bin: "oxipng",
    formats: &[ImageFormat::Png],
    schema: &SCHEMA,
    build,
};

fn build(executor: Arc<ProcessExecutor>, options: Options) -> Result<Box<dyn Worker>, OptimizeError> {
    Ok(Box::new(Oxipng::new(executor, options)?))
}

fn level(value: Value, warnings: &mut Warnings) -> Value {
    let requested = to_integer(value, DEFAULT_LEVEL, "level", warnings);
    let clamped = requested.clamp(0, MAX_LEVEL);
    if clamped != requested {
        warnings.push(format!(
            "Level for oxipng must be between 0 and {}, using {}",
            MAX_LEVEL, clamped
        ));
    }
    json!(clamped)
}

/// null keeps the input interlacing
fn interlace(value: Value, _warnings: &mut Warnings) -> Value {
    match value {
        Value::Null => Value::Null,
        other => json!(to_bool(other)),
    }
}

fn strip(value: Value, _warnings: &mut Warnings) -> Value {
    json!(to_bool(value))
}

pub struct Oxipng {
    executor: Arc<ProcessExecutor>,
    options: ResolvedOptions,
    level: i64,
    interlace: Option<bool>,
    strip: bool,
}

impl Oxipng {
    pub fn new(executor: Arc<ProcessExecutor>, options: Options) -> Result<Self, OptimizeError> {
        let options = SCHEMA.resolve(options)?;
        Ok(Self {
            executor,
            level: options.int("level")?,
            interlace: options.optional_bool("interlace")?,
            strip: options.boolean("strip")?,
            options,
        })
    }

    fn arguments(&self, dst: &Path) -> Vec<String> {
        let mut args = vec!["-o".to_string(), self.level.to_string(), "--quiet".to_string()];
        if let Some(interlace) = self.interlace {
            args.extend(["-i".to_string(), u8::from(interlace).to_string()]);
        }
        if self.strip {
            args.extend(["--strip".to_string(), "all".to_string()]);
        }
        args.extend(["--".to_string(), path_arg(dst)]);
        args
    }
}

#[async_trait]
impl Worker for Oxipng {
    fn descriptor(&self) -> &'static WorkerDescriptor {
        &DESCRIPTOR
    }

    fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    async fn optimize(&self, src: &Path, dst: &Path) -> Result<bool, OptimizeError> {
        tokio::fs::copy(src, dst).await?;
        let success = self.executor.execute(DESCRIPTOR.bin, &self.arguments(dst)).await?;
        Ok(success && optimized(src, dst).await?)
    }
}
