use std::path::Path;

use log::{debug, warn};

use super::model::{Table, MISSING};
use crate::error::{CoreError, Result};
use crate::options::SessionOptions;

/// Column that holds lengths in centimetres in exported CSV files.
pub const ARC_LENGTH_COLUMN: &str = "arc_length";

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` – header row plus numeric cells; unreadable cells become [`MISSING`]
/// * `.plt` – `datasets = [ "a" "b" … ]` header followed by a `Data { … }` block
pub fn load_file(path: &Path, options: &SessionOptions) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "csv" => load_csv(path, options)?,
        "plt" => {
            let text = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
            parse_plt(path, &text)?
        }
        other => {
            warn!("rejecting {}: unsupported extension", path.display());
            return Err(CoreError::UnsupportedFormat {
                extension: other.to_string(),
            });
        }
    };

    debug!(
        "loaded {}: {} columns x {} rows",
        path.display(),
        table.columns().len(),
        table.len()
    );
    Ok(table)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Header row with column names, one sample per record.
/// A column named like the provenance column is replaced by it.
fn load_csv(path: &Path, options: &SessionOptions) -> Result<Table> {
    let csv_err = |source: csv::Error| CoreError::Csv {
        path: path.to_path_buf(),
        source,
    };

    // short rows are padded with MISSING below
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let keep: Vec<usize> = (0..headers.len())
        .filter(|&i| headers[i] != options.provenance_column)
        .collect();
    let names: Vec<String> = keep.iter().map(|&i| headers[i].clone()).collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_err)?;
        let row: Vec<f64> = keep
            .iter()
            .map(|&i| coerce_f64(record.get(i).unwrap_or("")))
            .collect();
        rows.push(row);
    }

    let mut table = Table::from_rows(path, names, rows);
    if table.scale_column(ARC_LENGTH_COLUMN, options.arc_length_scale) {
        debug!(
            "{}: scaled `{ARC_LENGTH_COLUMN}` by {}",
            path.display(),
            options.arc_length_scale
        );
    }
    Ok(table)
}

/// Parse a cell, mapping anything unreadable to [`MISSING`].
fn coerce_f64(cell: &str) -> f64 {
    cell.trim().parse::<f64>().unwrap_or(MISSING)
}

// ---------------------------------------------------------------------------
// PLT loader
// ---------------------------------------------------------------------------

/// Parse the text of a plt file.
///
/// ```text
/// Info {
///   datasets = [
///     "time" "voltage"
///     "current" ]
/// }
/// Data {
///   0.0 1.0 2.0
///   0.1 1.1 2.1
/// }
/// ```
///
/// The flat number stream is cut into rows as wide as the dataset list;
/// a trailing partial row is dropped.
pub fn parse_plt(path: &Path, text: &str) -> Result<Table> {
    let mut lines = text.lines();

    if !lines.by_ref().any(|line| line.contains("datasets")) {
        return Err(CoreError::malformed(path, "missing `datasets` marker"));
    }

    let mut fragments: Vec<String> = Vec::new();
    let mut closed = false;
    for line in lines.by_ref() {
        fragments.extend(line.trim_end().split('"').map(|s| s.trim().to_string()));
        if line.contains(']') {
            closed = true;
            break;
        }
    }
    if !closed {
        return Err(CoreError::malformed(path, "dataset list is not closed by `]`"));
    }
    let mut names: Vec<String> = fragments.into_iter().filter(|s| !s.is_empty()).collect();
    // last fragment is the closing bracket
    names.pop();
    if names.is_empty() {
        return Err(CoreError::malformed(path, "no dataset names declared"));
    }

    if !lines.by_ref().any(|line| line.contains("Data")) {
        return Err(CoreError::malformed(path, "missing `Data` marker"));
    }

    let mut tokens: Vec<&str> = Vec::new();
    let mut closed = false;
    for line in lines.by_ref() {
        tokens.extend(line.split_whitespace());
        if line.contains('}') {
            closed = true;
            break;
        }
    }
    if !closed {
        return Err(CoreError::malformed(path, "data block is not closed by `}`"));
    }
    // token before the terminator is a format artifact
    tokens.pop();

    let width = names.len();
    let leftover = tokens.len() % width;
    if leftover != 0 {
        debug!(
            "{}: dropping {leftover} trailing values that do not fill a row of {width}",
            path.display()
        );
    }

    let mut unreadable = 0usize;
    let rows: Vec<Vec<f64>> = tokens
        .chunks_exact(width)
        .map(|chunk| {
            chunk
                .iter()
                .map(|tok| {
                    tok.parse::<f64>().unwrap_or_else(|_| {
                        unreadable += 1;
                        MISSING
                    })
                })
                .collect()
        })
        .collect();
    if unreadable > 0 {
        warn!("{}: {unreadable} non-numeric values stored as missing", path.display());
    }

    Ok(Table::from_rows(path, names, rows))
}
