/// Data layer: tables, file loading, and the source list.
///
/// Architecture:
/// ```text
///  .csv / .plt
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Table
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Table    │  named f64 columns + provenance
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ sources   │  added files, common columns
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod sources;
