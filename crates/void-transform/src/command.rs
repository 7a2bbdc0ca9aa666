//! Transformation modules backed by an external program.
//!
//! The program receives the raw source on stdin and must print the compiled
//! script on stdout. A non-zero exit status means the source was rejected;
//! whatever the program wrote to stderr becomes the error message.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use crate::traits::{Transform, TransformError};

/// A transformation module loaded from a module search location.
#[derive(Debug)]
pub struct CommandTransform {
    program: PathBuf,
    name: String,
}

impl CommandTransform {
    /// Bind the program at `program` as the transformation capability.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let name = program.display().to_string();
        Self { program, name }
    }
}

impl Transform for CommandTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&mut self, source: &str) -> Result<String, TransformError> {
        let mut child = Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            TransformError::Io(std::io::Error::other("Failed to acquire stdin"))
        })?;

        // Feed stdin from a separate thread so a chatty module cannot
        // deadlock on a full stdout pipe.
        let input = source.to_owned();
        let writer = thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child.wait_with_output()?;

        match writer.join() {
            Ok(result) => {
                // The module may exit without reading all of its input
                if let Err(e) = result {
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        return Err(e.into());
                    }
                }
            }
            Err(_) => {
                return Err(TransformError::Io(std::io::Error::other(
                    "stdin writer thread panicked",
                )))
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("`{}` exited with {}", self.name, output.status)
            } else {
                stderr
            };
            return Err(TransformError::Rejected(message));
        }

        String::from_utf8(output.stdout).map_err(|e| {
            TransformError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }
}
