//! Bundle assembly.

use std::io::{self, Write};
use std::sync::LazyLock;

use regex::Regex;

/// Lines opening every bundle.
pub const BOOTSTRAP: [&str; 2] = [
    "let app = new App(document.getElementById('root'));",
    "let page = null;",
];

static LINE_BREAKS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\r\n]+").expect("Invalid line breaks regex"));

/// Collapse every run of line breaks into a single `\n`.
pub fn normalize_line_endings(text: &str) -> String {
    LINE_BREAKS_RE.replace_all(text, "\n").into_owned()
}

/// Statement registering the current `page` under `name`.
pub fn registration_line(name: &str) -> String {
    format!("app.register('{}', page);", name)
}

/// Sequential writer for the bundle stream.
pub struct BundleWriter<W: Write> {
    out: W,
}

impl<W: Write> BundleWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write_bootstrap(&mut self) -> io::Result<()> {
        for line in BOOTSTRAP {
            writeln!(self.out, "{}", line)?;
        }
        Ok(())
    }

    /// Append one compiled unit as a newline-terminated block.
    pub fn write_unit(&mut self, compiled: &str) -> io::Result<()> {
        let normalized = normalize_line_endings(compiled);
        writeln!(self.out, "{}", normalized.trim_end_matches('\n'))
    }

    pub fn write_registration(&mut self, name: &str) -> io::Result<()> {
        writeln!(self.out, "{}", registration_line(name))
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}
