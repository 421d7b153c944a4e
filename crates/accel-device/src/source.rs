//! Kernel program source
//!
//! Both backends build their program from OpenCL C source text. The source
//! shipped with the crate declares every statistics kernel; a replacement
//! can be loaded from a file. The host device cannot compile OpenCL C, so it
//! reads the declared entry points out of the text and binds each one to its
//! reference implementation.

use std::fmt;
use std::path::Path;

use accel_core::Result;
use tracing::debug;

/// Source bundled with the crate
pub const REFERENCE_SOURCE: &str = include_str!("../kernels/stats.cl");

/// OpenCL C program text and where it came from
#[derive(Clone, PartialEq, Eq)]
pub struct KernelSource {
    origin: String,
    text: String,
}

impl KernelSource {
    pub fn new(origin: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            text: text.into(),
        }
    }

    /// The bundled statistics kernels
    pub fn reference() -> Self {
        Self::new("stats.cl", REFERENCE_SOURCE)
    }

    /// Read program source from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        debug!("Loaded {} bytes of kernel source from {}", text.len(), path.display());
        Ok(Self::new(path.display().to_string(), text))
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Entry points declared with `__kernel` or `kernel`, in source order
    ///
    /// Line and block comments are skipped.
    pub fn kernel_names(&self) -> Vec<String> {
        let code = strip_comments(&self.text);
        let mut names = Vec::new();
        let mut tokens = code
            .split(|c: char| c.is_whitespace() || c == '(')
            .filter(|t| !t.is_empty());

        while let Some(token) = tokens.next() {
            if token != "__kernel" && token != "kernel" {
                continue;
            }
            // Return type, then the entry point name
            if tokens.next().is_none() {
                break;
            }
            if let Some(name) = tokens.next() {
                if is_identifier(name) {
                    names.push(name.to_string());
                }
            }
        }
        names
    }
}

impl fmt::Debug for KernelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelSource")
            .field("origin", &self.origin)
            .field("bytes", &self.text.len())
            .finish()
    }
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("//") {
            rest = after.find('\n').map_or("", |end| &after[end..]);
        } else if let Some(after) = rest.strip_prefix("/*") {
            out.push(' ');
            rest = after.find("*/").map_or("", |end| &after[end + 2..]);
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
    }
    out
}
