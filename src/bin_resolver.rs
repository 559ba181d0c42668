//! # Binary Resolver
//!
//! Workers never look up executables themselves. They ask a [`BinResolver`],
//! which also carries the execution policy knobs (nice level, verbosity).
//!
//! [`ToolPathResolver`] is the default implementation. It finds tools in:
//! - An explicit `<NAME>_BIN` environment override
//! - A configured tools directory (or `TOOLS_DIR`)
//! - The system PATH
//!
//! Every resolved binary is symlinked into a private directory returned by
//! `resolve_dir()`, so that the bare tool name finds exactly that binary once the
//! directory is prepended to a child's PATH.

use crate::config::Config;
use crate::error::OptimizeError;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;
use tracing::{debug, warn};

/// Resolves binary names and exposes execution policy
pub trait BinResolver: Send + Sync {
    /// Path of the binary, or `BinaryNotFound`
    fn resolve(&self, name: &str) -> Result<PathBuf, OptimizeError>;

    /// Directory to prepend to a child's PATH
    fn resolve_dir(&self) -> &Path;

    /// Nice level for spawned tools
    fn nice(&self) -> i32;

    /// Whether executions are reported on stderr
    fn verbose(&self) -> bool;
}

/// Tool path resolver backed by env overrides, a tools directory and PATH
pub struct ToolPathResolver {
    /// Extra directory searched before the system PATH
    tools_dir: Option<PathBuf>,
    /// Holds symlinks to every resolved tool
    resolve_dir: TempDir,
    nice: i32,
    verbose: bool,
    /// Resolution results by name, misses included
    resolved: Mutex<HashMap<String, Option<PathBuf>>>,
}

impl ToolPathResolver {
    /// Create a new path resolver
    pub fn new(tools_dir: Option<PathBuf>, nice: i32, verbose: bool) -> Result<Self, OptimizeError> {
        let tools_dir = tools_dir.or_else(|| env::var_os("TOOLS_DIR").map(PathBuf::from));
        let resolve_dir = tempfile::Builder::new().prefix("image_optim").tempdir()?;
        debug!("Tools directory: {:?}, resolve dir: {:?}", tools_dir, resolve_dir.path());

        Ok(Self {
            tools_dir,
            resolve_dir,
            nice,
            verbose,
            resolved: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, OptimizeError> {
        Self::new(config.tools_dir.clone(), config.nice, config.verbose)
    }

    /// Check if a specific tool is available
    pub fn is_tool_available(&self, tool_name: &str) -> bool {
        self.resolve(tool_name).is_ok()
    }

    /// Get a report of tool availability
    pub fn tools_report<'a>(&self, tool_names: impl IntoIterator<Item = &'a str>) -> String {
        let mut report = String::from("Tool availability:\n");
        for tool in tool_names {
            match self.locate(tool) {
                Some(path) => report.push_str(&format!("  ✅ {} -> {:?}\n", tool, path)),
                None => report.push_str(&format!("  ❌ {} (not found)\n", tool)),
            }
        }
        report
    }

    /// Find the real binary without touching the resolve dir
    fn locate(&self, tool_name: &str) -> Option<PathBuf> {
        if let Some(path) = env::var_os(override_var(tool_name)) {
            let path = PathBuf::from(path);
            if path.is_file() {
                debug!("Using {} from {}: {:?}", tool_name, override_var(tool_name), path);
                return Some(path);
            }
            warn!("{} points to a missing file: {:?}", override_var(tool_name), path);
            return None;
        }

        if let Some(ref tools_dir) = self.tools_dir {
            let candidates = [
                tools_dir.join(executable_name(tool_name)),
                tools_dir.join(env::consts::OS).join(executable_name(tool_name)),
            ];
            if let Some(found) = candidates.into_iter().find(|path| path.is_file()) {
                debug!("Using bundled tool: {} -> {:?}", tool_name, found);
                return Some(found);
            }
        }

        find_in_system_path(tool_name)
    }

    /// Symlink `target` as `<resolve_dir>/<name>`
    fn link(&self, tool_name: &str, target: &Path) -> Result<PathBuf, OptimizeError> {
        let link = self.resolve_dir.path().join(executable_name(tool_name));
        if link.symlink_metadata().is_ok() {
            std::fs::remove_file(&link)?;
        }
        #[cfg(unix)]
        std::os::unix::fs::symlink(target, &link)?;
        #[cfg(not(unix))]
        std::fs::copy(target, &link)?;
        Ok(link)
    }
}

impl BinResolver for ToolPathResolver {
    fn resolve(&self, name: &str) -> Result<PathBuf, OptimizeError> {
        let mut resolved = self.resolved.lock().unwrap_or_else(|e| e.into_inner());

        let entry = match resolved.get(name) {
            Some(entry) => entry.clone(),
            None => {
                let entry = match self.locate(name) {
                    Some(target) => Some(self.link(name, &target)?),
                    None => {
                        warn!("Tool not found: {}", name);
                        None
                    }
                };
                resolved.insert(name.to_string(), entry.clone());
                entry
            }
        };

        entry.ok_or_else(|| OptimizeError::BinaryNotFound(name.to_string()))
    }

    fn resolve_dir(&self) -> &Path {
        self.resolve_dir.path()
    }

    fn nice(&self) -> i32 {
        self.nice
    }

    fn verbose(&self) -> bool {
        self.verbose
    }
}

/// Environment variable overriding the location of `tool_name`
fn override_var(tool_name: &str) -> String {
    format!("{}_BIN", tool_name.to_uppercase().replace('-', "_"))
}

fn executable_name(tool_name: &str) -> String {
    let extension = if cfg!(windows) { ".exe" } else { "" };
    format!("{}{}", tool_name, extension)
}

/// Find tool in system PATH
fn find_in_system_path(tool_name: &str) -> Option<PathBuf> {
    let tool_with_ext = executable_name(tool_name);
    env::split_paths(&env::var_os("PATH")?)
        .map(|dir| dir.join(&tool_with_ext))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_tool(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    #[test]
    fn test_override_var() {
        assert_eq!(override_var("jpegoptim"), "JPEGOPTIM_BIN");
        assert_eq!(override_var("png-crush"), "PNG_CRUSH_BIN");
    }

    #[test]
    fn test_resolves_from_tools_dir_into_resolve_dir() {
        let tools = TempDir::new().unwrap();
        let target = fake_tool(tools.path(), "fakeoptim_resolver_test");
        let resolver = ToolPathResolver::new(Some(tools.path().to_path_buf()), 10, false).unwrap();

        let path = resolver.resolve("fakeoptim_resolver_test").unwrap();
        assert_eq!(path.parent().unwrap(), resolver.resolve_dir());
        #[cfg(unix)]
        assert_eq!(std::fs::read_link(&path).unwrap(), target);

        // second lookup is served from the cache
        assert_eq!(resolver.resolve("fakeoptim_resolver_test").unwrap(), path);
    }

    #[test]
    fn test_missing_tool_is_binary_not_found() {
        let resolver = ToolPathResolver::new(None, 0, false).unwrap();
        let err = resolver.resolve("definitely-not-an-installed-tool").unwrap_err();
        assert!(matches!(err, OptimizeError::BinaryNotFound(ref name) if name == "definitely-not-an-installed-tool"));
        assert!(!resolver.is_tool_available("definitely-not-an-installed-tool"));
    }

    #[test]
    fn test_policy_knobs() {
        let resolver = ToolPathResolver::new(None, 7, true).unwrap();
        assert_eq!(resolver.nice(), 7);
        assert!(resolver.verbose());
        assert!(resolver.resolve_dir().is_dir());
    }

    #[test]
    fn test_tools_report() {
        let tools = TempDir::new().unwrap();
        fake_tool(tools.path(), "fakeoptim_report_test");
        let resolver = ToolPathResolver::new(Some(tools.path().to_path_buf()), 10, false).unwrap();
        let report = resolver.tools_report(["fakeoptim_report_test", "definitely-not-an-installed-tool"]);
        assert!(report.contains("✅ fakeoptim_report_test"));
        assert!(report.contains("❌ definitely-not-an-installed-tool"));
    }
}
