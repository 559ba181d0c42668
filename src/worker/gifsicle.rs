//! gifsicle: lossless GIF optimization, in place on a copy of the source.

use super::{optimized, path_arg, Worker, WorkerDescriptor};
use crate::error::OptimizeError;
use crate::executor::ProcessExecutor;
use crate::format::ImageFormat;
use crate::options::{to_bool, OptionSchema, OptionSpec, Options, ResolvedOptions, Warnings};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

pub static SCHEMA: OptionSchema = OptionSchema::new(
    "gifsicle",
    &[OptionSpec {
        name: "interlace",
        default: || json!(false),
        transform: Some(interlace),
    }],
);

pub static DESCRIPTOR: WorkerDescriptor = WorkerDescriptor {
    name: "Gifsicle",
    bin: "gifsicle",
    formats: &[ImageFormat::Gif],
    schema: &SCHEMA,
    build,
};

fn build(executor: Arc<ProcessExecutor>, options: Options) -> Result<Box<dyn Worker>, OptimizeError> {
    Ok(Box::new(Gifsicle::new(executor, options)?))
}

fn interlace(value: Value, _warnings: &mut Warnings) -> Value {
    json!(to_bool(value))
}

pub struct Gifsicle {
    executor: Arc<ProcessExecutor>,
    options: ResolvedOptions,
    interlace: bool,
}

impl Gifsicle {
    pub fn new(executor: Arc<ProcessExecutor>, options: Options) -> Result<Self, OptimizeError> {
        let options = SCHEMA.resolve(options)?;
        Ok(Self {
            executor,
            interlace: options.boolean("interlace")?,
            options,
        })
    }

    fn arguments(&self, dst: &Path) -> Vec<String> {
        let mut args: Vec<String> = [
            "-b",
            "-O3",
            "--no-comments",
            "--no-names",
            "--same-delay",
            "--same-loopcount",
            "--no-warnings",
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect();
        if self.interlace {
            args.push("-i".to_string());
        }
        args.extend(["--".to_string(), path_arg(dst)]);
        args
    }
}

#[async_trait]
impl Worker for Gifsicle {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::test_support::FakeResolver;

    fn worker(value: Value) -> Result<Gifsicle, OptimizeError> {
        let executor = ProcessExecutor::new(Arc::new(FakeResolver::new(10)));
        Gifsicle::new(Arc::new(executor), value.as_object().cloned().unwrap())
    }

    #[test]
    fn test_arguments() {
        let plain = worker(json!({})).unwrap();
        let args = plain.arguments(Path::new("a.gif"));
        assert_eq!(args.first().map(String::as_str), Some("-b"));
        assert!(!args.contains(&"-i".to_string()));
        assert_eq!(&args[args.len() - 2..], ["--", "a.gif"]);

        let interlaced = worker(json!({"interlace": "yes"})).unwrap();
        assert!(interlaced.arguments(Path::new("a.gif")).contains(&"-i".to_string()));
    }

    #[test]
    fn test_unknown_option() {
        assert!(worker(json!({"careful": true})).is_err());
    }
}
