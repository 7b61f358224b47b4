use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;

use crate::data::model::Table;
use crate::data::sources::SourceRegistry;
use crate::error::{CoreError, Result};

/// Prefix of every curve identifier.
pub const ID_PREFIX: char = 'C';

// ---------------------------------------------------------------------------
// CurveRecord – one saved (x, y) pair
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurveRecord {
    /// `C<n>`, unique within the session until the registry is cleared.
    pub id: String,
    /// `<file key>_<y column>`, the default label. Saving is de-duplicated
    /// on `(source, y_column)`, not on this key.
    pub key: String,
    pub source: PathBuf,
    pub x_column: String,
    pub y_column: String,
    /// Display name, defaults to `key`.
    pub label: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub x_factor: f64,
    pub y_factor: f64,
}

impl CurveRecord {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// x values multiplied by the x factor.
    pub fn scaled_x(&self) -> Vec<f64> {
        self.x.iter().map(|v| v * self.x_factor).collect()
    }

    /// y values multiplied by the y factor.
    pub fn scaled_y(&self) -> Vec<f64> {
        self.y.iter().map(|v| v * self.y_factor).collect()
    }
}

/// Read a factor typed by the user. Blank or non-numeric input means 1.
pub fn parse_factor(input: Option<&str>) -> f64 {
    input
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|f| f.is_finite())
        .unwrap_or(1.0)
}

// ---------------------------------------------------------------------------
// CurveRegistry
// ---------------------------------------------------------------------------

/// Saved curves in insertion order, plus the identifier counter.
///
/// The counter only moves forward; [`CurveRegistry::clear_all`] is the one
/// place it is reset.
#[derive(Debug, Clone)]
pub struct CurveRegistry {
    records: Vec<CurveRecord>,
    next_id: u64,
}

impl Default for CurveRegistry {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            next_id: 1,
        }
    }
}

impl CurveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save the (x, y) columns of every selected file that is not stored yet.
    ///
    /// `load` turns a source path into its table. The batch is all or
    /// nothing: if any new file fails to load or lacks a column, no record
    /// is appended and no identifier is consumed.
    pub fn save_selection<K, F>(
        &mut self,
        sources: &SourceRegistry,
        keys: &[K],
        x_column: &str,
        y_column: &str,
        mut load: F,
    ) -> Result<&[CurveRecord]>
    where
        K: AsRef<str>,
        F: FnMut(&Path) -> Result<Table>,
    {
        let mut pending: Vec<(String, PathBuf, Vec<f64>, Vec<f64>)> = Vec::new();

        for key in keys {
            let entry = sources.resolve(key.as_ref())?;
            let already = self.contains_curve(&entry.path, y_column)
                || pending.iter().any(|p| p.1 == entry.path);
            if already {
                debug!(
                    "`{y_column}` of {} already saved, skipping",
                    entry.path.display()
                );
                continue;
            }
            let dedup_key = format!("{}_{y_column}", sources.key_for(entry));

            let table = load(&entry.path)?;
            let x = table.require_column(x_column)?.to_vec();
            let y = table.require_column(y_column)?.to_vec();
            pending.push((dedup_key, entry.path.clone(), x, y));
        }

        for (key, source, x, y) in pending {
            let id = self.allocate_id();
            info!("saved curve {id} `{key}` ({} points)", y.len());
            self.records.push(CurveRecord {
                id,
                label: key.clone(),
                key,
                source,
                x_column: x_column.to_string(),
                y_column: y_column.to_string(),
                x,
                y,
                x_factor: 1.0,
                y_factor: 1.0,
            });
        }

        Ok(&self.records)
    }

    fn allocate_id(&mut self) -> String {
        let id = format!("{ID_PREFIX}{}", self.next_id);
        self.next_id += 1;
        id
    }

    /// Drop every record and restart numbering at `C1`.
    pub fn clear_all(&mut self) {
        info!("curves: cleared {} records", self.records.len());
        self.records.clear();
        self.next_id = 1;
    }

    pub fn records(&self) -> &[CurveRecord] {
        &self.records
    }

    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether `y_column` of the file at `source` is already saved.
    pub fn contains_curve(&self, source: &Path, y_column: &str) -> bool {
        self.records
            .iter()
            .any(|r| r.source == source && r.y_column == y_column)
    }

    /// Position of a curve in insertion order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&CurveRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut CurveRecord> {
        self.records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| CoreError::UnknownCurveIdentifier(id.to_string()))
    }

    pub fn set_label(&mut self, id: &str, label: impl Into<String>) -> Result<()> {
        self.get_mut(id)?.label = label.into();
        Ok(())
    }

    /// Set the x factor from raw input; returns the value applied.
    pub fn set_x_factor(&mut self, id: &str, input: Option<&str>) -> Result<f64> {
        let factor = parse_factor(input);
        self.get_mut(id)?.x_factor = factor;
        Ok(factor)
    }

    /// Set the y factor from raw input; returns the value applied.
    pub fn set_y_factor(&mut self, id: &str, input: Option<&str>) -> Result<f64> {
        let factor = parse_factor(input);
        self.get_mut(id)?.y_factor = factor;
        Ok(factor)
    }
}
