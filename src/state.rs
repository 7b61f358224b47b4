use std::path::PathBuf;

use log::info;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::curves::{CurveRecord, CurveRegistry};
use crate::data::loader::load_file;
use crate::data::model::{stack_records, Table};
use crate::data::sources::{common_columns, SourceRegistry};
use crate::error::{CoreError, Result};
use crate::formula::{self, DerivedCurve};
use crate::options::SessionOptions;

// ---------------------------------------------------------------------------
// Working selection
// ---------------------------------------------------------------------------

/// The files and columns currently picked, before they are saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub files: Vec<String>,
    pub x_column: String,
    pub y_column: String,
}

/// One selected file drawn straight from its table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    pub name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Everything a user accumulates in one sitting.
///
/// Created once and passed by reference to whoever drives it; the caller
/// serializes access.
#[derive(Debug, Default)]
pub struct Session {
    pub options: SessionOptions,
    sources: SourceRegistry,
    curves: CurveRegistry,
    selection: Option<Selection>,
}

impl Session {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    // -- sources --

    pub fn add_sources<I, P>(&mut self, paths: I) -> (Vec<PathBuf>, Vec<String>)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.sources.add_sources(paths)
    }

    /// Forget every source and the working selection. Saved curves stay.
    pub fn clear_sources(&mut self) {
        self.sources.clear();
        self.selection = None;
    }

    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    /// Parse the file registered under `key`.
    pub fn load_table(&self, key: &str) -> Result<Table> {
        let entry = self.sources.resolve(key)?;
        load_file(&entry.path, &self.options)
    }

    fn load_tables<K: AsRef<str>>(&self, keys: &[K]) -> Result<Vec<Table>> {
        keys.iter().map(|k| self.load_table(k.as_ref())).collect()
    }

    /// Columns shared by all the given files, in the first file's order.
    pub fn common_columns<K: AsRef<str>>(&self, keys: &[K]) -> Result<Vec<String>> {
        Ok(common_columns(&self.load_tables(keys)?))
    }

    /// Rows of all the given files, one object per row, for a data grid.
    pub fn records<K: AsRef<str>>(&self, keys: &[K]) -> Result<Vec<Map<String, JsonValue>>> {
        Ok(stack_records(
            &self.load_tables(keys)?,
            &self.options.provenance_column,
        ))
    }

    // -- selection --

    /// Remember the current pick and return its traces for instant display.
    pub fn select<K: AsRef<str>>(
        &mut self,
        keys: &[K],
        x_column: &str,
        y_column: &str,
    ) -> Result<Vec<Trace>> {
        let traces = self.preview(keys, x_column, y_column)?;
        self.selection = Some(Selection {
            files: keys.iter().map(|k| k.as_ref().to_string()).collect(),
            x_column: x_column.to_string(),
            y_column: y_column.to_string(),
        });
        Ok(traces)
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// One trace per file without touching the curve registry.
    pub fn preview<K: AsRef<str>>(
        &self,
        keys: &[K],
        x_column: &str,
        y_column: &str,
    ) -> Result<Vec<Trace>> {
        keys.iter()
            .map(|key| {
                let entry = self.sources.resolve(key.as_ref())?;
                let table = load_file(&entry.path, &self.options)?;
                Ok(Trace {
                    name: entry.short_name.clone(),
                    x: table.require_column(x_column)?.to_vec(),
                    y: table.require_column(y_column)?.to_vec(),
                })
            })
            .collect()
    }

    // -- curves --

    pub fn save_selection<K: AsRef<str>>(
        &mut self,
        keys: &[K],
        x_column: &str,
        y_column: &str,
    ) -> Result<&[CurveRecord]> {
        let options = &self.options;
        self.curves
            .save_selection(&self.sources, keys, x_column, y_column, |path| {
                load_file(path, options)
            })
    }

    /// Save whatever [`Session::select`] last picked.
    pub fn save_current_selection(&mut self) -> Result<&[CurveRecord]> {
        let Some(selection) = self.selection.clone() else {
            info!("nothing selected, no curve saved");
            return Ok(self.curves.records());
        };
        self.save_selection(
            selection.files.as_slice(),
            &selection.x_column,
            &selection.y_column,
        )
    }

    /// Drop all saved curves and restart numbering at `C1`.
    pub fn clear_curves(&mut self) {
        self.curves.clear_all();
        self.selection = None;
    }

    pub fn curves(&self) -> &CurveRegistry {
        &self.curves
    }

    pub fn curves_mut(&mut self) -> &mut CurveRegistry {
        &mut self.curves
    }

    pub fn curve(&self, id: &str) -> Result<&CurveRecord> {
        self.curves
            .get(id)
            .ok_or_else(|| CoreError::UnknownCurveIdentifier(id.to_string()))
    }

    // -- formulas --

    pub fn evaluate_formula(&self, formula: &str) -> Result<DerivedCurve> {
        formula::evaluate(formula, &self.curves, self.options.x_axis)
    }
}
