//! HTML page template rendering.
//!
//! Templates are plain HTML with three placeholders, replaced literally and
//! without any escaping.

use std::fs;
use std::io;
use std::path::Path;

pub const TITLE_PLACEHOLDER: &str = "$title";
pub const PAGE_PLACEHOLDER: &str = "$page";
pub const FILE_PLACEHOLDER: &str = "$file";

/// Renders per-page HTML from the project template.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    template: String,
}

impl TemplateRenderer {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Load the template from disk.
    pub fn load(path: &Path) -> io::Result<Self> {
        fs::read_to_string(path).map(Self::new)
    }

    /// Substitute every placeholder occurrence.
    pub fn render(&self, title: &str, page: &str, file: &str) -> String {
        self.template
            .replace(TITLE_PLACEHOLDER, title)
            .replace(PAGE_PLACEHOLDER, page)
            .replace(FILE_PLACEHOLDER, file)
    }

    /// Render the entry page for `page`, titled after its capitalized name.
    pub fn render_page(&self, page: &str, bundle_base_name: &str) -> String {
        self.render(&capitalize(page), page, bundle_base_name)
    }
}

/// Capitalize first letter of a string.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
