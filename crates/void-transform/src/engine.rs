//! Transformation engine lifecycle.
//!
//! The engine is set up once per compile run and then entered around every
//! single transform call. Entering takes an exclusive [`EngineScope`] that is
//! released when it is dropped, whichever way the call ends.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::command::CommandTransform;
use crate::fetch::{FetchError, ModuleFetcher};
use crate::jsx::{JsxOptions, JsxTransform};
use crate::modules::{normalize_module_paths, resolve_module, ModuleBase, ModulePathError};
use crate::traits::{Transform, TransformError};

/// Configuration for initializing the engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Locations searched for the entry module, in order
    pub module_paths: Vec<String>,

    /// Entry module name; `None` binds the built-in JSX transformer
    pub module: Option<String>,

    /// Options for the built-in JSX transformer
    pub jsx: JsxOptions,

    /// Where modules from remote locations are cached; a directory under
    /// the system temp dir when unset
    pub cache_dir: Option<PathBuf>,

    /// Expected SHA-256 digest of a module fetched from a remote location
    pub module_sha256: Option<String>,
}

impl EngineConfig {
    fn fetcher(&self) -> ModuleFetcher {
        let cache_dir = self
            .cache_dir
            .clone()
            .unwrap_or_else(|| env::temp_dir().join("void-modules"));
        ModuleFetcher::new(cache_dir).with_sha256(self.module_sha256.clone())
    }
}

/// Errors that can occur while initializing the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    ModulePath(#[from] ModulePathError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Transform module '{name}' not found in [{searched}]")]
    ModuleNotFound { name: String, searched: String },

    #[error("Failed to load transform module {}: {reason}", path.display())]
    ModuleLoad { path: PathBuf, reason: String },
}

/// Owns the bound transformation capability.
pub struct TransformEngine {
    module: Mutex<Box<dyn Transform>>,
    name: String,
    bases: Vec<ModuleBase>,
}

impl TransformEngine {
    /// Resolve the configured module and bind its transform capability.
    pub fn initialize(config: &EngineConfig) -> Result<Self, EngineError> {
        let bases = normalize_module_paths(&config.module_paths)?;

        let module: Box<dyn Transform> = match &config.module {
            None => Box::new(JsxTransform::new(config.jsx.clone())),
            Some(name) => {
                let path = resolve_module(&bases, name, &config.fetcher())?.ok_or_else(|| {
                    EngineError::ModuleNotFound {
                        name: name.clone(),
                        searched: bases
                            .iter()
                            .map(ModuleBase::uri)
                            .collect::<Vec<_>>()
                            .join(", "),
                    }
                })?;
                check_loadable(&path)?;
                Box::new(CommandTransform::new(path))
            }
        };

        tracing::debug!("Transform engine ready with module {}", module.name());

        Ok(Self {
            name: module.name().to_string(),
            module: Mutex::new(module),
            bases,
        })
    }

    /// Build an engine around an already constructed capability.
    pub fn with_transform(module: impl Transform + 'static) -> Self {
        Self {
            name: module.name().to_string(),
            module: Mutex::new(Box::new(module)),
            bases: Vec::new(),
        }
    }

    /// Name of the bound module.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized module search locations.
    pub fn module_bases(&self) -> &[ModuleBase] {
        &self.bases
    }

    /// Enter the engine for exclusive use.
    pub fn enter(&self) -> EngineScope<'_> {
        EngineScope {
            module: self.module.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Transform one source text inside its own engine scope.
    pub fn transform(&self, source: &str) -> Result<String, TransformError> {
        self.enter().transform(source)
    }
}

impl std::fmt::Debug for TransformEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformEngine")
            .field("name", &self.name)
            .field("bases", &self.bases)
            .finish()
    }
}

/// Exclusive access to the engine, released on drop.
pub struct EngineScope<'e> {
    module: MutexGuard<'e, Box<dyn Transform>>,
}

impl EngineScope<'_> {
    pub fn transform(&mut self, source: &str) -> Result<String, TransformError> {
        self.module.transform(source)
    }
}

fn check_loadable(path: &Path) -> Result<(), EngineError> {
    let metadata = path.metadata().map_err(|e| EngineError::ModuleLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(EngineError::ModuleLoad {
                path: path.to_path_buf(),
                reason: "file is not executable".to_string(),
            });
        }
    }
    #[cfg(not(unix))]
    let _ = metadata;

    Ok(())
}
