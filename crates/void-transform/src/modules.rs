//! Module search locations.
//!
//! Search paths from configuration are normalized into absolute,
//! slash-terminated [`ModuleBase`] locations before any lookup happens, so
//! an entry module is never resolved relative to an unintended base.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::{borrow::Cow, env};

use path_clean::PathClean;
use regex::Regex;

use crate::fetch::{FetchError, ModuleFetcher};

/// A normalized module search location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleBase {
    /// Local directory (absolute, lexically cleaned)
    Local(PathBuf),

    /// Remote location such as `https://cdn.example.com/lib/`
    Remote(String),
}

impl ModuleBase {
    /// The location as a URI, always terminated by exactly one `/`.
    pub fn uri(&self) -> String {
        match self {
            ModuleBase::Local(dir) => with_trailing_slash(&file_uri(dir)).into_owned(),
            ModuleBase::Remote(uri) => uri.clone(),
        }
    }
}

impl fmt::Display for ModuleBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

/// Errors that can occur while normalizing a module search path.
#[derive(Debug, thiserror::Error)]
pub enum ModulePathError {
    #[error("Invalid module path '{path}': {reason}")]
    Invalid { path: String, reason: String },

    #[error("Failed to resolve working directory: {0}")]
    WorkingDir(#[from] io::Error),
}

static SCHEME_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Two or more characters so Windows drive letters are not read as schemes
    Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]+):").expect("Invalid scheme regex")
});

/// Normalize one configured search path.
///
/// URIs carrying a scheme are kept as they are (`file:` URIs are decoded back
/// into local directories); anything else is a filesystem path resolved
/// against the current working directory.
pub fn normalize_module_path(path: &str) -> Result<ModuleBase, ModulePathError> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(ModulePathError::Invalid {
            path: path.to_string(),
            reason: "path is empty".to_string(),
        });
    }

    let Some(caps) = SCHEME_RE.captures(trimmed) else {
        return Ok(ModuleBase::Local(absolute_path(trimmed)?));
    };

    let scheme = caps[1].to_ascii_lowercase();
    if scheme != "file" {
        return Ok(ModuleBase::Remote(
            with_trailing_slash(trimmed).into_owned(),
        ));
    }

    let rest = &trimmed[caps[0].len()..];
    // file:///abs, file://localhost/abs and file:/abs all name the same place
    let rest = match rest.strip_prefix("//") {
        Some(authority) => match authority.find('/') {
            Some(0) => authority,
            Some(idx) if &authority[..idx] == "localhost" => &authority[idx..],
            _ => {
                return Err(ModulePathError::Invalid {
                    path: path.to_string(),
                    reason: "file URIs must not name a remote host".to_string(),
                })
            }
        },
        None => rest,
    };

    let decoded = urlencoding::decode(rest).map_err(|e| ModulePathError::Invalid {
        path: path.to_string(),
        reason: e.to_string(),
    })?;

    let local = PathBuf::from(decoded.as_ref());
    if !local.has_root() {
        return Err(ModulePathError::Invalid {
            path: path.to_string(),
            reason: "file URI does not contain an absolute path".to_string(),
        });
    }

    Ok(ModuleBase::Local(local.clean()))
}

/// Normalize every configured search path, preserving order.
pub fn normalize_module_paths<S: AsRef<str>>(
    paths: &[S],
) -> Result<Vec<ModuleBase>, ModulePathError> {
    paths
        .iter()
        .map(|p| normalize_module_path(p.as_ref()))
        .collect()
}

/// Find `name` in the first base that provides it, trying bases in order.
///
/// Local bases must contain it as a regular file; remote bases are asked
/// through `fetcher`, which downloads the module into its cache.
pub fn resolve_module(
    bases: &[ModuleBase],
    name: &str,
    fetcher: &ModuleFetcher,
) -> Result<Option<PathBuf>, FetchError> {
    for base in bases {
        match base {
            ModuleBase::Local(dir) => {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    tracing::debug!("Resolved module {} from {}", name, base);
                    return Ok(Some(candidate));
                }
                tracing::debug!("Module {} not found in {}", name, base);
            }
            ModuleBase::Remote(uri) => {
                if let Some(cached) = fetcher.fetch(uri, name)? {
                    tracing::debug!("Resolved module {} from {}", name, base);
                    return Ok(Some(cached));
                }
            }
        }
    }
    Ok(None)
}

/// Make a path absolute against the working directory and clean it.
pub fn absolute_path(path: impl AsRef<Path>) -> io::Result<PathBuf> {
    let path = path.as_ref();

    let absolute_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()?.join(path)
    }
    .clean();

    Ok(absolute_path)
}

fn file_uri(dir: &Path) -> String {
    let raw = dir.to_string_lossy().replace('\\', "/");
    let encoded = raw
        .split('/')
        .map(|segment| {
            // Keep drive letters (C:) readable
            if segment.len() == 2 && segment.ends_with(':') {
                segment.to_string()
            } else {
                urlencoding::encode(segment).into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("/");

    if encoded.starts_with('/') {
        format!("file://{}", encoded)
    } else {
        format!("file:///{}", encoded)
    }
}

fn with_trailing_slash(s: &str) -> Cow<'_, str> {
    if s.ends_with('/') {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(format!("{}/", s))
    }
}
