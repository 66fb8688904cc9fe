//! Filter-and-aggregate pipeline behind the agricultural analytics dashboard.
//!
//! A source file is parsed once into a typed [`data::model::Dataset`]; every
//! filter change then runs [`data::pipeline::evaluate`] to produce the KPIs,
//! rollups and chart series the presentation layer renders.

pub mod data;
pub mod report;
pub mod state;

pub use data::error::{ExportError, LoadError};
pub use data::filter::{FilterSpec, RangeFilter};
pub use data::model::{Dataset, Dimension, FarmRecord};
pub use data::pipeline::{evaluate, ResultBundle};
