//! Load measurement files into tables, keep a list of saved curves, and
//! derive new curves from point-wise formulas over them.
//!
//! ```no_run
//! use rusty_curves::{Session, SessionOptions};
//!
//! let mut session = Session::new(SessionOptions::default());
//! session.add_sources(["/data/run1.plt", "/data/run2.plt"]);
//! session.save_selection(&["run1.plt", "run2.plt"], "time", "current")?;
//! let ratio = session.evaluate_formula("C1 / C2")?;
//! println!("{} points", ratio.len());
//! # Ok::<(), rusty_curves::CoreError>(())
//! ```

pub mod curves;
pub mod data;
pub mod error;
pub mod formula;
pub mod options;
pub mod state;

pub use curves::{CurveRecord, CurveRegistry};
pub use data::model::Table;
pub use data::sources::SourceRegistry;
pub use error::{CoreError, PointError, Result};
pub use formula::DerivedCurve;
pub use options::{SessionOptions, XAxisPolicy};
pub use state::Session;
