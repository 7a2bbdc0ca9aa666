//! Project compiler.
//!
//! Drives one compile run through its stages:
//!
//! ```text
//! Idle → LayoutValidated → EngineReady → WritingComponents → WritingPages → Done
//! ```
//!
//! Every failure aborts the run and leaves it in `Aborted`. Layout problems are detected before anything
//! is written; later failures leave the bundle as far as it got.

use std::cell::Cell;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Instant;

use void_transform::{EngineConfig, EngineError, TransformEngine, TransformError};

use crate::bundle::BundleWriter;
use crate::layout::{ProjectLayout, SourceRole};
use crate::template::TemplateRenderer;
use crate::walker::{walk, WalkOrder};

/// Configuration for compiling a project.
#[derive(Debug, Clone)]
pub struct CompileConfig {
    /// Project root directory
    pub root: PathBuf,

    /// Generate `target/<page>.html` for every page
    pub generate_html: bool,

    /// Extension of transformable source files
    pub extension: String,

    /// Visit sources in file name order instead of listing order
    pub sorted: bool,

    /// Transform engine setup
    pub engine: EngineConfig,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            generate_html: false,
            extension: "jsx".to_string(),
            sorted: false,
            engine: EngineConfig::default(),
        }
    }
}

/// Summary of a successful compile run.
#[derive(Debug)]
pub struct BuildResult {
    /// Number of components compiled
    pub components: usize,

    /// Number of pages compiled and registered
    pub pages: usize,

    /// HTML pages written during this run
    pub html_created: usize,

    /// HTML pages left alone because they already existed
    pub html_skipped: usize,

    /// Path of the written bundle
    pub bundle_path: PathBuf,

    /// Total build time in milliseconds
    pub duration_ms: u64,
}

/// Errors that abort a compile run.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Missing {} folder from project folder", dir.display())]
    MissingLayout { dir: PathBuf },

    #[error("Missing {} from project folder", path.display())]
    MissingTemplate { path: PathBuf },

    #[error("Failed to initialize transform engine: {0}")]
    EngineInit(#[from] EngineError),

    #[error("Syntax error in {role} source file '{}': {source}", path.display())]
    Syntax {
        role: SourceRole,
        path: PathBuf,
        source: TransformError,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl CompileError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Stages of a compile run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    LayoutValidated,
    EngineReady,
    WritingComponents,
    WritingPages,
    Done,
    Aborted,
}

/// A source file and the role its folder gives it.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub role: SourceRole,
}

impl SourceFile {
    /// File name without directories or extension.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Transformed text of one source file.
#[derive(Debug)]
pub struct CompiledUnit {
    pub name: String,
    pub code: String,
}

/// Compiles one project into a bundle.
pub struct Compiler {
    config: CompileConfig,
    layout: ProjectLayout,
    stage: Cell<Stage>,
}

impl Compiler {
    pub fn new(config: CompileConfig) -> Self {
        let layout = ProjectLayout::new(&config.root);
        Self {
            config,
            layout,
            stage: Cell::new(Stage::Idle),
        }
    }

    /// Stage reached by the most recent run.
    pub fn stage(&self) -> Stage {
        self.stage.get()
    }

    /// Run the whole pipeline, setting up the transform engine from config.
    pub fn compile(&self) -> Result<BuildResult, CompileError> {
        let result = self.validate().and_then(|template| {
            let engine = TransformEngine::initialize(&self.config.engine)?;
            self.enter(Stage::EngineReady);
            self.write(&engine, template.as_ref())
        });
        self.finish(result)
    }

    /// Run the pipeline with an engine that is already initialized.
    pub fn compile_with(&self, engine: &TransformEngine) -> Result<BuildResult, CompileError> {
        let result = self.validate().and_then(|template| {
            self.enter(Stage::EngineReady);
            self.write(engine, template.as_ref())
        });
        self.finish(result)
    }

    fn enter(&self, stage: Stage) {
        tracing::debug!(?stage, "Compile stage");
        self.stage.set(stage);
    }

    fn finish(
        &self,
        result: Result<BuildResult, CompileError>,
    ) -> Result<BuildResult, CompileError> {
        if let Err(e) = &result {
            tracing::debug!(from = ?self.stage(), error = %e, "Compile aborted");
            self.enter(Stage::Aborted);
        }
        result
    }

    /// Check the project layout and load the HTML template when needed.
    fn validate(&self) -> Result<Option<TemplateRenderer>, CompileError> {
        self.enter(Stage::Idle);
        tracing::info!("Using content root {}", self.layout.root().display());

        for role in [SourceRole::Component, SourceRole::Page] {
            let dir = self.layout.source_dir(role);
            if !dir.is_dir() {
                return Err(CompileError::MissingLayout { dir });
            }
        }

        let template = if self.config.generate_html {
            let path = self.layout.template_path();
            if !path.is_file() {
                return Err(CompileError::MissingTemplate { path });
            }
            Some(TemplateRenderer::load(&path).map_err(CompileError::io(&path))?)
        } else {
            None
        };

        self.enter(Stage::LayoutValidated);
        Ok(template)
    }

    fn write(
        &self,
        engine: &TransformEngine,
        template: Option<&TemplateRenderer>,
    ) -> Result<BuildResult, CompileError> {
        let start = Instant::now();
        tracing::info!(
            "Compiling {} with html generation enabled {}",
            self.layout.root().display(),
            self.config.generate_html
        );

        let bundle_path = self.layout.bundle_path();
        let public_dir = self.layout.public_dir();
        fs::create_dir_all(&public_dir).map_err(CompileError::io(&public_dir))?;

        let file = File::create(&bundle_path).map_err(CompileError::io(&bundle_path))?;
        let mut bundle = BundleWriter::new(BufWriter::new(file));
        bundle
            .write_bootstrap()
            .map_err(CompileError::io(&bundle_path))?;

        self.enter(Stage::WritingComponents);
        let components = self.sources(SourceRole::Component);
        for (i, source) in components.iter().enumerate() {
            let unit = self.compile_unit(engine, source)?;
            bundle
                .write_unit(&unit.code)
                .map_err(CompileError::io(&bundle_path))?;
            tracing::info!(
                "Compiled component {} [{}/{}]",
                unit.name,
                i + 1,
                components.len()
            );
        }

        self.enter(Stage::WritingPages);
        let pages = self.sources(SourceRole::Page);
        let mut html_created = 0;
        let mut html_skipped = 0;
        for (i, source) in pages.iter().enumerate() {
            let unit = self.compile_unit(engine, source)?;
            bundle
                .write_unit(&unit.code)
                .map_err(CompileError::io(&bundle_path))?;
            bundle
                .write_registration(&unit.name)
                .map_err(CompileError::io(&bundle_path))?;
            tracing::info!("Compiled page {} [{}/{}]", unit.name, i + 1, pages.len());

            if let Some(template) = template {
                if self.write_html(template, &unit.name)? {
                    html_created += 1;
                } else {
                    html_skipped += 1;
                }
            }
        }

        bundle.finish().map_err(CompileError::io(&bundle_path))?;
        self.enter(Stage::Done);

        Ok(BuildResult {
            components: components.len(),
            pages: pages.len(),
            html_created,
            html_skipped,
            bundle_path,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Transformable files under the folder for `role`, in walk order.
    fn sources(&self, role: SourceRole) -> Vec<SourceFile> {
        let order = if self.config.sorted {
            WalkOrder::Sorted
        } else {
            WalkOrder::Listing
        };

        walk(&self.layout.source_dir(role), order)
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext == self.config.extension.as_str())
            })
            .map(|path| SourceFile { path, role })
            .collect()
    }

    fn compile_unit(
        &self,
        engine: &TransformEngine,
        source: &SourceFile,
    ) -> Result<CompiledUnit, CompileError> {
        let text = fs::read_to_string(&source.path).map_err(CompileError::io(&source.path))?;

        let code = engine.transform(&text).map_err(|e| {
            if e.is_syntax() {
                CompileError::Syntax {
                    role: source.role,
                    path: source.path.clone(),
                    source: e,
                }
            } else {
                CompileError::Io {
                    path: source.path.clone(),
                    source: io::Error::other(e),
                }
            }
        })?;

        Ok(CompiledUnit {
            name: source.name(),
            code,
        })
    }

    /// Write `target/<page>.html` unless it already exists.
    fn write_html(&self, template: &TemplateRenderer, page: &str) -> Result<bool, CompileError> {
        let path = self.layout.html_path(page);
        if path.is_file() {
            tracing::debug!("Page {} already exists, skipping", path.display());
            return Ok(false);
        }

        let target_dir = self.layout.target_dir();
        fs::create_dir_all(&target_dir).map_err(CompileError::io(&target_dir))?;

        let html = template.render_page(page, self.layout.bundle_base_name());
        fs::write(&path, html).map_err(CompileError::io(&path))?;
        tracing::info!("Created page {}", page);

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};
    use void_transform::Transform;

    /// Wraps each source in a marker comment with messy line endings.
    struct Marker;

    impl Transform for Marker {
        fn name(&self) -> &str {
            "marker"
        }

        fn transform(&mut self, source: &str) -> Result<String, TransformError> {
            if source.contains("BROKEN") {
                return Err(TransformError::Rejected("Unexpected token".to_string()));
            }
            Ok(format!("/* unit */\r\n\r\n{}\n\n", source.trim()))
        }
    }

    fn project(files: &[(&str, &str)]) -> TempDir {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("components")).unwrap();
        fs::create_dir_all(temp.path().join("pages")).unwrap();
        for (path, content) in files {
            let path = temp.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        temp
    }

    fn config(root: &Path, generate_html: bool) -> CompileConfig {
        CompileConfig {
            root: root.to_path_buf(),
            generate_html,
            sorted: true,
            ..Default::default()
        }
    }

    const TEMPLATE: &str =
        "<title>$title</title><div id=\"root\" data-page=\"$page\"></div><script src=\"$file.js\"></script>";

    #[test]
    fn compiles_single_component_and_page() {
        let temp = project(&[
            ("components/Hello.jsx", "const Hello = () => <h1>Hello</h1>;\n"),
            ("components/notes.txt", "not a source"),
            ("pages/Index.jsx", "page = () => <Hello />;\n"),
        ]);

        let result = Compiler::new(config(temp.path(), false)).compile().unwrap();

        let bundle = fs::read_to_string(temp.path().join("public/app.js")).unwrap();
        assert_eq!(
            bundle,
            "let app = new App(document.getElementById('root'));\n\
             let page = null;\n\
             const Hello = () => React.createElement(\"h1\", null, \"Hello\");\n\
             page = () => React.createElement(Hello, null);\n\
             app.register('Index', page);\n"
        );
        assert_eq!(result.components, 1);
        assert_eq!(result.pages, 1);
        assert!(!temp.path().join("target").exists());
    }

    #[test]
    fn generates_html_for_pages() {
        let temp = project(&[
            ("template.html", TEMPLATE),
            ("components/Hello.jsx", "const Hello = () => <h1>Hello</h1>;"),
            ("pages/Index.jsx", "page = () => <Hello />;"),
            ("pages/about.jsx", "page = () => <p>About</p>;"),
        ]);

        let result = Compiler::new(config(temp.path(), true)).compile().unwrap();

        assert_eq!(result.html_created, 2);
        assert_eq!(
            fs::read_to_string(temp.path().join("target/Index.html")).unwrap(),
            "<title>Index</title><div id=\"root\" data-page=\"Index\"></div><script src=\"app.js\"></script>"
        );
        assert_eq!(
            fs::read_to_string(temp.path().join("target/about.html")).unwrap(),
            "<title>About</title><div id=\"root\" data-page=\"about\"></div><script src=\"app.js\"></script>"
        );
    }

    #[test]
    fn never_overwrites_existing_html() {
        let temp = project(&[
            ("template.html", TEMPLATE),
            ("pages/index.jsx", "page = () => <p />;"),
            ("target/index.html", "<p>hand edited</p>"),
        ]);
        let compiler = Compiler::new(config(temp.path(), true));

        let first = compiler.compile().unwrap();
        let second = compiler.compile().unwrap();

        assert_eq!(compiler.stage(), Stage::Done);
        assert_eq!(first.html_skipped, 1);
        assert_eq!(second.html_skipped, 1);
        assert_eq!(
            fs::read_to_string(temp.path().join("target/index.html")).unwrap(),
            "<p>hand edited</p>"
        );
    }

    #[test]
    fn missing_folders_write_nothing() {
        for missing in ["components", "pages"] {
            let temp = project(&[]);
            fs::remove_dir(temp.path().join(missing)).unwrap();

            let err = Compiler::new(config(temp.path(), false))
                .compile()
                .unwrap_err();

            assert!(matches!(err, CompileError::MissingLayout { .. }));
            assert!(err.to_string().contains(missing));
            assert!(!temp.path().join("public").exists());
        }
    }

    #[test]
    fn missing_template_writes_nothing() {
        let temp = project(&[("pages/index.jsx", "page = null;")]);

        let err = Compiler::new(config(temp.path(), true)).compile().unwrap_err();

        assert!(matches!(err, CompileError::MissingTemplate { .. }));
        assert!(!temp.path().join("public").exists());
    }

    #[test]
    fn engine_failure_writes_nothing() {
        let temp = project(&[]);
        let mut config = config(temp.path(), false);
        config.engine.module = Some("JSXTransformer.js".to_string());
        config.engine.module_paths = vec![temp.path().join("lib").display().to_string()];

        let compiler = Compiler::new(config);
        let err = compiler.compile().unwrap_err();

        assert!(matches!(err, CompileError::EngineInit(_)));
        assert_eq!(compiler.stage(), Stage::Aborted);
        assert!(!temp.path().join("public/app.js").exists());
    }

    #[test]
    fn syntax_error_aborts_before_pages() {
        let temp = project(&[
            ("template.html", TEMPLATE),
            ("components/Broken.jsx", "const a = <div>"),
            ("pages/index.jsx", "page = () => <p />;"),
        ]);

        let compiler = Compiler::new(config(temp.path(), true));
        let err = compiler.compile().unwrap_err();

        match &err {
            CompileError::Syntax { role, path, .. } => {
                assert_eq!(*role, SourceRole::Component);
                assert!(path.ends_with("components/Broken.jsx"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("Syntax error in component source file"));
        assert_eq!(compiler.stage(), Stage::Aborted);
        assert!(!temp.path().join("target").exists());

        let partial = fs::read_to_string(temp.path().join("public/app.js")).unwrap();
        assert!(partial.starts_with("let app = new App(document.getElementById('root'));\n"));
        assert!(!partial.contains("register"));
    }

    #[test]
    fn appends_units_in_walk_order() {
        let temp = project(&[
            ("components/b.jsx", "b"),
            ("components/a.jsx", "a"),
            ("components/forms/input.jsx", "input"),
            ("components/style.css", "css"),
            ("pages/home.jsx", "home"),
        ]);
        let engine = TransformEngine::with_transform(Marker);

        let result = Compiler::new(config(temp.path(), false))
            .compile_with(&engine)
            .unwrap();

        let bundle = fs::read_to_string(result.bundle_path).unwrap();
        assert_eq!(
            bundle,
            "let app = new App(document.getElementById('root'));\n\
             let page = null;\n\
             /* unit */\na\n\
             /* unit */\nb\n\
             /* unit */\ninput\n\
             /* unit */\nhome\n\
             app.register('home', page);\n"
        );
        assert_eq!(result.components, 3);
    }

    #[test]
    fn rejected_page_reports_page_role() {
        let temp = project(&[("pages/bad.jsx", "BROKEN")]);
        let engine = TransformEngine::with_transform(Marker);

        let err = Compiler::new(config(temp.path(), false))
            .compile_with(&engine)
            .unwrap_err();

        assert!(matches!(
            err,
            CompileError::Syntax {
                role: SourceRole::Page,
                ..
            }
        ));
    }

    #[test]
    fn honours_custom_extension() {
        let temp = project(&[
            ("components/a.jsx", "a"),
            ("components/b.vjs", "b"),
        ]);
        let engine = TransformEngine::with_transform(Marker);
        let mut config = config(temp.path(), false);
        config.extension = "vjs".to_string();

        let result = Compiler::new(config).compile_with(&engine).unwrap();

        assert_eq!(result.components, 1);
        let bundle = fs::read_to_string(result.bundle_path).unwrap();
        assert!(bundle.contains("\nb\n"));
        assert!(!bundle.contains("\na\n"));
    }

    #[test]
    fn keeps_generated_html_when_template_changes() {
        let temp = project(&[
            ("template.html", TEMPLATE),
            ("pages/index.jsx", "page = () => <p />;"),
        ]);
        let compiler = Compiler::new(config(temp.path(), true));
        let html = temp.path().join("target/index.html");

        let first = compiler.compile().unwrap();
        let generated = fs::read(&html).unwrap();
        fs::write(temp.path().join("template.html"), "<h1>$title v2</h1>").unwrap();
        let second = compiler.compile().unwrap();

        assert_eq!(first.html_created, 1);
        assert_eq!(second.html_created, 0);
        assert_eq!(second.html_skipped, 1);
        assert_eq!(fs::read(&html).unwrap(), generated);
    }

    #[test]
    fn listing_order_follows_walker() {
        let temp = project(&[
            ("components/zeta.jsx", "zeta"),
            ("components/forms/input.jsx", "input"),
            ("components/forms/deep/select.jsx", "select"),
            ("components/forms/button.jsx", "button"),
            ("components/alpha.jsx", "alpha"),
            ("components/layout/grid.jsx", "grid"),
            ("components/mid.jsx", "mid"),
        ]);
        let engine = TransformEngine::with_transform(Marker);
        let mut config = config(temp.path(), false);
        config.sorted = false;

        let result = Compiler::new(config).compile_with(&engine).unwrap();

        let walked: Vec<PathBuf> = walk(&temp.path().join("components"), WalkOrder::Listing)
            .filter(|p| p.extension().is_some_and(|ext| ext == "jsx"))
            .collect();
        let mut expected = String::from(
            "let app = new App(document.getElementById('root'));\nlet page = null;\n",
        );
        for path in &walked {
            let name = path.file_stem().unwrap().to_string_lossy();
            expected.push_str(&format!("/* unit */\n{}\n", name));
        }

        assert_eq!(result.components, 7);
        assert_eq!(fs::read_to_string(result.bundle_path).unwrap(), expected);

        // Files of a directory come before anything in its subdirectories
        for (i, path) in walked.iter().enumerate() {
            let dir = path.parent().unwrap();
            for earlier in &walked[..i] {
                assert!(
                    !(earlier.starts_with(dir) && earlier.parent() != Some(dir)),
                    "{} listed before {}",
                    earlier.display(),
                    path.display()
                );
            }
        }
        let stems: Vec<_> = walked[3..]
            .iter()
            .map(|p| p.file_stem().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(stems.contains(&"select".to_string()));
        assert!(stems.contains(&"grid".to_string()));
    }
}
