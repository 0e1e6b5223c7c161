//! stdout helpers
//!
//! One JSON document per line, flushed immediately.

use std::io::{self, Write};

use serde::Serialize;

use super::errors::CliResult;

/// Write `value` as one pretty-printed JSON document
pub fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

/// Write each item as one compact JSON line
pub fn write_json_lines<I, T>(items: I) -> CliResult<()>
where
    I: IntoIterator<Item = T>,
    T: Serialize,
{
    let mut stdout = io::stdout().lock();
    for item in items {
        serde_json::to_writer(&mut stdout, &item)?;
        writeln!(stdout)?;
    }
    stdout.flush()?;
    Ok(())
}
