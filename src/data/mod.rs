/// Data layer: table model, loading, source resolution and filtering.
///
/// Architecture:
/// ```text
///  Dummy_dashboardV2.csv        catalog "dummy_dashboardv2"
///  (.csv / .parquet / .json)    (Parquet over HTTP)
///            │                        │
///            └──────────┬─────────────┘
///                       ▼
///                ┌─────────────┐
///                │   source    │  resolve source, fetch, memoise
///                └─────────────┘
///                       │
///                       ▼
///                ┌─────────────┐
///                │   Dataset   │  typed columns, row-major cells
///                └─────────────┘
///                       │
///                       ▼
///                ┌─────────────┐
///                │   filter    │  numeric columns, distinct values,
///                └─────────────┘  row subset → FilteredView
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod source;
