//! Compilation pipeline for void projects.
//!
//! Walks a project's components and pages, transforms every source through
//! the transform engine, assembles the results into `public/app.js` and
//! optionally materializes one HTML entry page per route.

pub mod bundle;
pub mod compiler;
pub mod layout;
pub mod template;
pub mod walker;

pub use compiler::{BuildResult, CompileConfig, CompileError, Compiler, Stage};
pub use layout::{ProjectLayout, SourceRole};
pub use template::TemplateRenderer;
pub use walker::{walk, WalkOrder};
