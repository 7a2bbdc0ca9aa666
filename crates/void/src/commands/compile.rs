//! Project compile command.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use void_compiler::{CompileConfig, Compiler};
use void_transform::{EngineConfig, JsxOptions};

/// Name of the optional configuration file in the project root.
const CONFIG_FILE: &str = "void.toml";

/// Configuration file structure (void.toml).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    build: BuildSettings,
    #[serde(default)]
    transform: TransformSettings,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BuildSettings {
    #[serde(default)]
    generate_html: bool,
    #[serde(default)]
    sorted: bool,
    #[serde(default = "default_extension")]
    extension: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            generate_html: false,
            sorted: false,
            extension: default_extension(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TransformSettings {
    /// Module search locations (paths or URIs)
    #[serde(default)]
    paths: Vec<String>,
    /// External transform module; the built-in JSX transformer when absent
    module: Option<String>,
    pragma: Option<String>,
    pragma_frag: Option<String>,
    /// Cache for modules fetched from remote locations, relative to the project
    cache_dir: Option<PathBuf>,
    /// Expected SHA-256 digest of a remote module
    sha256: Option<String>,
}

fn default_extension() -> String {
    "jsx".to_string()
}

/// Load configuration from void.toml if it exists.
/// Returns an error if the config file exists but is malformed.
fn load_config(root: &Path) -> Result<ConfigFile> {
    let config_path = root.join(CONFIG_FILE);
    if config_path.is_file() {
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config = parse_config(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;
        tracing::info!("Loaded config from {}", config_path.display());
        return Ok(config);
    }
    Ok(ConfigFile::default())
}

fn parse_config(content: &str) -> Result<ConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Merge file settings with command-line flags.
fn compile_config(
    root: PathBuf,
    file: ConfigFile,
    generate_html: bool,
    sorted: bool,
) -> CompileConfig {
    let defaults = JsxOptions::default();
    let cache_dir = file.transform.cache_dir.map(|dir| root.join(dir));

    CompileConfig {
        root,
        generate_html: generate_html || file.build.generate_html,
        extension: file.build.extension,
        sorted: sorted || file.build.sorted,
        engine: EngineConfig {
            module_paths: file.transform.paths,
            module: file.transform.module,
            jsx: JsxOptions {
                pragma: file.transform.pragma.unwrap_or(defaults.pragma),
                pragma_frag: file.transform.pragma_frag.unwrap_or(defaults.pragma_frag),
            },
            cache_dir,
            module_sha256: file.transform.sha256,
        },
    }
}

/// Run the compile command.
pub fn run(path: PathBuf, generate_html: bool, sorted: bool) -> Result<()> {
    let file_config = load_config(&path)?;
    let config = compile_config(path, file_config, generate_html, sorted);

    let result = Compiler::new(config)
        .compile()
        .context("Compilation failed")?;

    tracing::info!(
        "Compiled {} components and {} pages in {}ms",
        result.components,
        result.pages,
        result.duration_ms
    );
    if result.html_created > 0 || result.html_skipped > 0 {
        tracing::info!(
            "Created {} html pages ({} already present)",
            result.html_created,
            result.html_skipped
        );
    }

    tracing::info!("Output: {}", result.bundle_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn defaults_without_config_file() {
        let temp = tempdir().unwrap();

        let file = load_config(temp.path()).unwrap();
        let config = compile_config(temp.path().to_path_buf(), file, false, false);

        assert!(!config.generate_html);
        assert!(!config.sorted);
        assert_eq!(config.extension, "jsx");
        assert!(config.engine.module.is_none());
        assert!(config.engine.cache_dir.is_none());
        assert_eq!(config.engine.jsx, JsxOptions::default());
    }

    #[test]
    fn reads_settings_from_file() {
        let file = parse_config(
            r#"
[build]
sorted = true
extension = "vjsx"

[transform]
paths = ["lib/", "https://cdn.example.com/react/"]
module = "jsx-transform"
pragma = "h"
cache_dir = ".void/modules"
sha256 = "9f86d081884c7d65"
"#,
        )
        .unwrap();

        let config = compile_config(PathBuf::from("site"), file, true, false);

        assert!(config.generate_html);
        assert!(config.sorted);
        assert_eq!(config.extension, "vjsx");
        assert_eq!(config.engine.module.as_deref(), Some("jsx-transform"));
        assert_eq!(config.engine.module_paths.len(), 2);
        assert_eq!(config.engine.jsx.pragma, "h");
        assert_eq!(config.engine.jsx.pragma_frag, "React.Fragment");
        assert_eq!(
            config.engine.cache_dir,
            Some(PathBuf::from("site").join(".void/modules"))
        );
        assert_eq!(config.engine.module_sha256.as_deref(), Some("9f86d081884c7d65"));
    }

    #[test]
    fn rejects_malformed_config() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "[build]\nsorted = \"yes\"\n").unwrap();

        assert!(load_config(temp.path()).is_err());
        assert!(parse_config("[build]\nminify = true\n").is_err());
    }

    #[test]
    fn compiles_project_end_to_end() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("components")).unwrap();
        fs::create_dir_all(root.join("pages")).unwrap();
        fs::write(root.join("pages/index.jsx"), "page = () => <p>Hi</p>;").unwrap();
        fs::write(root.join("void.toml"), "[transform]\npragma = \"h\"\n").unwrap();

        run(root.to_path_buf(), false, false).unwrap();

        let bundle = fs::read_to_string(root.join("public/app.js")).unwrap();
        assert!(bundle.contains("page = () => h(\"p\", null, \"Hi\");\n"));
        assert!(bundle.ends_with("app.register('index', page);\n"));
    }
}
