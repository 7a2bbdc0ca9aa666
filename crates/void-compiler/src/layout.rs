//! On-disk project layout.

use std::fmt;
use std::path::{Path, PathBuf};

/// File name of the generated bundle inside `public/`.
pub const BUNDLE_FILE_NAME: &str = "app.js";

/// File name of the HTML page template in the project root.
pub const TEMPLATE_FILE_NAME: &str = "template.html";

/// Role of a source file, decided by the folder it was found under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRole {
    Component,
    Page,
}

impl fmt::Display for SourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceRole::Component => f.write_str("component"),
            SourceRole::Page => f.write_str("page"),
        }
    }
}

/// Paths of a void project rooted at one directory.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Source folder for the given role.
    pub fn source_dir(&self, role: SourceRole) -> PathBuf {
        match role {
            SourceRole::Component => self.root.join("components"),
            SourceRole::Page => self.root.join("pages"),
        }
    }

    pub fn template_path(&self) -> PathBuf {
        self.root.join(TEMPLATE_FILE_NAME)
    }

    pub fn public_dir(&self) -> PathBuf {
        self.root.join("public")
    }

    /// `public/app.js`
    pub fn bundle_path(&self) -> PathBuf {
        self.public_dir().join(BUNDLE_FILE_NAME)
    }

    /// Bundle file name without its extension, as referenced by HTML pages.
    pub fn bundle_base_name(&self) -> &'static str {
        BUNDLE_FILE_NAME
            .rsplit_once('.')
            .map_or(BUNDLE_FILE_NAME, |(base, _)| base)
    }

    /// Folder receiving generated HTML pages.
    pub fn target_dir(&self) -> PathBuf {
        self.root.join("target")
    }

    /// `target/<page>.html`
    pub fn html_path(&self, page: &str) -> PathBuf {
        self.target_dir().join(format!("{}.html", page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_output_locations() {
        let layout = ProjectLayout::new("site");

        assert_eq!(layout.source_dir(SourceRole::Component), Path::new("site/components"));
        assert_eq!(layout.source_dir(SourceRole::Page), Path::new("site/pages"));
        assert_eq!(layout.bundle_path(), Path::new("site/public/app.js"));
        assert_eq!(layout.html_path("index"), Path::new("site/target/index.html"));
        assert_eq!(layout.bundle_base_name(), "app");
    }
}
