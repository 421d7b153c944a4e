//! Reading a numeric series out of a delimited text file
//!
//! Each newline-terminated record contributes its last whitespace-delimited
//! token. A final line without a terminator is not a record and is skipped.

use std::path::Path;
use std::time::Instant;

use tracing::{debug, info};

use crate::{Error, Numeric, Result};

/// Parse the trailing token of every terminated line
pub fn parse_series<T: Numeric>(text: &str) -> Result<Vec<T>> {
    let mut values = Vec::new();
    let mut records = text.split('\n');
    // Whatever follows the last '\n' (or the whole text, if there is none) is
    // unterminated.
    records.next_back();

    for (index, line) in records.enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line).trim_end();
        let Some(token) = line.rsplit(char::is_whitespace).next() else {
            continue;
        };
        if token.is_empty() {
            continue;
        }
        let value = T::parse_token(token).ok_or_else(|| Error::Parse {
            line: index + 1,
            token: token.to_string(),
        })?;
        values.push(value);
    }

    Ok(values)
}

/// Read and parse a whole file, logging how long it took
pub fn read_series<T: Numeric>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let started = Instant::now();

    let text = std::fs::read_to_string(path)?;
    debug!("Read {} bytes from {}", text.len(), path.display());

    let values = parse_series(&text)?;
    info!(
        "File parsed in {:.3}ms ({} values from {})",
        started.elapsed().as_secs_f64() * 1000.0,
        values.len(),
        path.display()
    );
    Ok(values)
}
