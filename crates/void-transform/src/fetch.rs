//! Remote transform modules.
//!
//! Modules found at a remote location are downloaded once into a local cache
//! directory, verified and then run like any local module.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

/// Upper bound on the size of a downloaded module.
const MAX_MODULE_BYTES: u64 = 32 * 1024 * 1024;

/// Errors that can occur while fetching a remote module.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Remote module {url} is empty")]
    Empty { url: String },

    #[error("Checksum mismatch for {url}: expected {expected}, got {actual}")]
    Checksum {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("Failed to cache module at {}: {source}", path.display())]
    Cache { path: PathBuf, source: io::Error },

    #[error("Failed to download {url}: {source}")]
    Download { url: String, source: io::Error },
}

/// Downloads modules from remote locations into a cache directory.
#[derive(Debug, Clone)]
pub struct ModuleFetcher {
    cache_dir: PathBuf,
    sha256: Option<String>,
}

impl ModuleFetcher {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            sha256: None,
        }
    }

    /// Require downloaded modules to have this SHA-256 digest (hex).
    pub fn with_sha256(mut self, digest: Option<String>) -> Self {
        self.sha256 = digest.map(|d| d.trim().trim_start_matches("sha256:").to_ascii_lowercase());
        self
    }

    /// Fetch `<base><name>`.
    ///
    /// Returns `Ok(None)` when the location does not serve the module, so the
    /// caller can move on to the next location.
    pub fn fetch(&self, base: &str, name: &str) -> Result<Option<PathBuf>, FetchError> {
        let url = format!("{}{}", base, name.trim_start_matches('/'));

        let response = match ureq::get(&url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => {
                tracing::debug!("Module {} not found at {}", name, base);
                return Ok(None);
            }
            Err(ureq::Error::Status(code, _)) => {
                tracing::warn!("Fetching {} failed with status {}", url, code);
                return Ok(None);
            }
            Err(e) => {
                tracing::warn!("Fetching {} failed: {}", url, e);
                return Ok(None);
            }
        };

        let mut body = Vec::new();
        response
            .into_reader()
            .take(MAX_MODULE_BYTES)
            .read_to_end(&mut body)
            .map_err(|source| FetchError::Download {
                url: url.clone(),
                source,
            })?;

        let digest = self.verify(&url, &body)?;
        let path = self.store(&url, name, &body)?;
        tracing::info!("Fetched module {} (sha256:{})", url, digest);

        Ok(Some(path))
    }

    fn verify(&self, url: &str, body: &[u8]) -> Result<String, FetchError> {
        if body.is_empty() {
            return Err(FetchError::Empty {
                url: url.to_string(),
            });
        }

        let actual = sha256_hex(body);
        if let Some(expected) = &self.sha256 {
            if *expected != actual {
                return Err(FetchError::Checksum {
                    url: url.to_string(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        Ok(actual)
    }

    /// Write the module to `<cache>/<url digest>/<file name>` atomically.
    fn store(&self, url: &str, name: &str, body: &[u8]) -> Result<PathBuf, FetchError> {
        let dir = self.cache_dir.join(&sha256_hex(url.as_bytes())[..16]);
        let file_name = Path::new(name)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "module".into());
        let path = dir.join(file_name);

        let cache_err = |source| FetchError::Cache {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&dir).map_err(cache_err)?;
        let mut temp = NamedTempFile::new_in(&dir).map_err(cache_err)?;
        temp.write_all(body).map_err(cache_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o755))
                .map_err(cache_err)?;
        }

        temp.persist(&path).map_err(|e| cache_err(e.error))?;
        Ok(path)
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
