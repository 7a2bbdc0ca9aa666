//! Transformation engine for void sources.
//!
//! This crate turns extended-syntax (JSX) sources into plain JavaScript,
//! either with the built-in transformer or with an external transform module
//! resolved from configured search locations.

pub mod command;
pub mod engine;
pub mod fetch;
pub mod jsx;
pub mod modules;
pub mod traits;

pub use command::CommandTransform;
pub use engine::{EngineConfig, EngineError, EngineScope, TransformEngine};
pub use fetch::{FetchError, ModuleFetcher};
pub use jsx::{transform_jsx, JsxOptions, JsxTransform};
pub use modules::{normalize_module_path, normalize_module_paths, resolve_module, ModuleBase, ModulePathError};
pub use traits::{Transform, TransformError};
