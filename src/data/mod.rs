/// Data layer: core types, loading, writing and splitting.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Dataset  │  columns, rows of CellValue
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  split    │  seeded shuffle → (train, test)
///   └──────────┘
///        │
///        ▼
///   loader::write_csv → raw.csv / train.csv / test.csv
/// ```

pub mod loader;
pub mod model;
pub mod split;
