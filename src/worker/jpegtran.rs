//! jpegtran: lossless JPEG optimization.
//!
//! `jpegtran -optimize -copy <all|none> [-progressive] -outfile <dst> <src>`

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
    "jpegtran",
    &[
        OptionSpec {
            name: "copy_chunks",
            default: || json!(false),
            transform: Some(truthy),
        },
        OptionSpec {
            name: "progressive",
            default: || json!(true),
            transform: Some(truthy),
        },
    ],
);

pub static DESCRIPTOR: WorkerDescriptor = WorkerDescriptor {
    name: "Jpegtran",
    bin: "jpegtran",
    formats: &[ImageFormat::Jpeg],
    schema: &SCHEMA,
    build,
};

fn build(executor: Arc<ProcessExecutor>, options: Options) -> Result<Box<dyn Worker>, OptimizeError> {
    Ok(Box::new(Jpegtran::new(executor, options)?))
}

fn truthy(value: Value, _warnings: &mut Warnings) -> Value {
    json!(to_bool(value))
}

pub struct Jpegtran {
    executor: Arc<ProcessExecutor>,
    options: ResolvedOptions,
    /// Keep all extra markers
    copy_chunks: bool,
    /// Write a progressive JPEG
    progressive: bool,
}

impl Jpegtran {
    pub fn new(executor: Arc<ProcessExecutor>, options: Options) -> Result<Self, OptimizeError> {
        let options = SCHEMA.resolve(options)?;
        Ok(Self {
            executor,
            copy_chunks: options.boolean("copy_chunks")?,
            progressive: options.boolean("progressive")?,
            options,
        })
    }

    fn arguments(&self, src: &Path, dst: &Path) -> Vec<String> {
        let mut args = vec![
            "-optimize".to_string(),
            "-copy".to_string(),
            if self.copy_chunks { "all" } else { "none" }.to_string(),
        ];
        if self.progressive {
            args.push("-progressive".to_string());
        }
        args.extend(["-outfile".to_string(), path_arg(dst), path_arg(src)]);
        args
    }
}

#[async_trait]
impl Worker for Jpegtran {
    fn descriptor(&self) -> &'static WorkerDescriptor {
        &DESCRIPTOR
    }

    fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    async fn optimize(&self, src: &Path, dst: &Path) -> Result<bool, OptimizeError> {
        let success = self.executor.execute(DESCRIPTOR.bin, &self.arguments(src, dst)).await?;
        Ok(success && optimized(src, dst).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::test_support::FakeResolver;

    fn worker(value: Value) -> Result<Jpegtran, OptimizeError> {
        let executor = ProcessExecutor::new(Arc::new(FakeResolver::new(10)));
        Jpegtran::new(Arc::new(executor), value.as_object().cloned().unwrap())
    }

    #[test]
    fn test_default_arguments() {
        let worker = worker(json!({})).unwrap();
        assert_eq!(worker.run_order(), 0);
        assert_eq!(
            worker.arguments(Path::new("in.jpg"), Path::new("out.jpg")),
            vec!["-optimize", "-copy", "none", "-progressive", "-outfile", "out.jpg", "in.jpg"]
        );
    }

    #[test]
    fn test_options_are_coerced() {
        let worker = worker(json!({"copy_chunks": 1, "progressive": null})).unwrap();
        assert_eq!(
            worker.arguments(Path::new("in.jpg"), Path::new("out.jpg")),
            vec!["-optimize", "-copy", "all", "-outfile", "out.jpg", "in.jpg"]
        );
    }

    #[test]
    fn test_unknown_option() {
        let err = worker(json!({"jpegrescan": true})).err().unwrap();
        assert!(matches!(err, OptimizeError::Configuration { ref keys, .. } if keys == &["jpegrescan"]));
    }
}
