//! Data layer: core types, loading, filtering and aggregation.
//!
//! Architecture:
//! ```text
//!  .csv / .json / .parquet
//!        │
//!        ▼
//!   ┌──────────┐      ┌──────────────┐
//!   │  loader   │◄─────│ DatasetCache  │  content hash → Arc<Dataset>
//!   └──────────┘      └──────────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  Dataset  │  Vec<FarmRecord>, rejected rows, dimension index
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐     ┌───────────┐
//!   │  filter   │────►│ aggregate  │  KPIs, rollups, chart series
//!   └──────────┘     └───────────┘
//!        │                 │
//!        └──── pipeline ───┘  → ResultBundle ──► export (csv / parquet)
//! ```

pub mod aggregate;
pub mod cache;
pub mod error;
pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
pub mod pipeline;
