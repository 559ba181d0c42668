//! Catalog of worker types.
//!
//! Every worker type is registered exactly once through an explicit
//! [`WorkerRegistry::register`] call; the builtin set is assembled in
//! [`WorkerRegistry::builtin`] and shared read-only via [`WorkerRegistry::global`].

use super::{gifsicle, identifier_for, jpegoptim, jpegtran, oxipng, Worker};
use crate::error::OptimizeError;
use crate::executor::ProcessExecutor;
use crate::format::ImageFormat;
use crate::options::{OptionSchema, Options};
use std::sync::{Arc, OnceLock};

/// Constructor of a worker from raw caller options
pub type WorkerBuilder =
    fn(Arc<ProcessExecutor>, Options) -> Result<Box<dyn Worker>, OptimizeError>;

/// Static description of one worker type
pub struct WorkerDescriptor {
    /// Type name, e.g. `Jpegoptim`
    pub name: &'static str,
    /// Binary the worker runs
    pub bin: &'static str,
    pub formats: &'static [ImageFormat],
    pub schema: &'static OptionSchema,
    pub build: WorkerBuilder,
}

impl WorkerDescriptor {
    pub fn identifier(&self) -> String {
        identifier_for(self.name)
    }

    pub fn supports(&self, format: ImageFormat) -> bool {
        self.formats.contains(&format)
    }

    /// Build a worker, validating `options` against the schema
    pub fn create(
        &self,
        executor: Arc<ProcessExecutor>,
        options: Options,
    ) -> Result<Box<dyn Worker>, OptimizeError> {
        (self.build)(executor, options)
    }
}

impl std::fmt::Debug for WorkerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerDescriptor")
            .field("name", &self.name)
            .field("bin", &self.bin)
            .field("formats", &self.formats)
            .finish()
    }
}

/// Known worker types, in registration order
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    descriptors: Vec<&'static WorkerDescriptor>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every worker shipped in this crate
    pub fn builtin() -> Result<Self, OptimizeError> {
        let mut registry = Self::new();
        registry.register(&jpegoptim::DESCRIPTOR)?;
        registry.register(&jpegtran::DESCRIPTOR)?;
        registry.register(&oxipng::DESCRIPTOR)?;
        registry.register(&gifsicle::DESCRIPTOR)?;
        Ok(registry)
    }

    /// The process-wide builtin registry, built on first use
    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<WorkerRegistry> = OnceLock::new();
        INSTANCE.get_or_init(|| {
            // builtin descriptors have distinct names
            Self::builtin().unwrap_or_default()
        })
    }

    pub fn register(&mut self, descriptor: &'static WorkerDescriptor) -> Result<(), OptimizeError> {
        let identifier = descriptor.identifier();
        if self.find(&identifier).is_some() {
            return Err(OptimizeError::DuplicateWorker(identifier));
        }
        self.descriptors.push(descriptor);
        Ok(())
    }

    pub fn descriptors(&self) -> &[&'static WorkerDescriptor] {
        &self.descriptors
    }

    pub fn find(&self, identifier: &str) -> Option<&'static WorkerDescriptor> {
        self.descriptors
            .iter()
            .copied()
            .find(|descriptor| descriptor.identifier() == identifier)
    }

    pub fn for_format(&self, format: ImageFormat) -> impl Iterator<Item = &'static WorkerDescriptor> + '_ {
        self.descriptors
            .iter()
            .copied()
            .filter(move |descriptor| descriptor.supports(format))
    }

    /// Distinct binaries needed by the registered workers
    pub fn binaries(&self) -> Vec<&'static str> {
        let mut bins: Vec<&'static str> = Vec::new();
        for descriptor in &self.descriptors {
            if !bins.contains(&descriptor.bin) {
                bins.push(descriptor.bin);
            }
        }
        bins
    }
}
