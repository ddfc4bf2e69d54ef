//! Heuristic structure, type, and statistics inference for untyped tabular
//! row streams.
//!
//! Given rows of heterogeneous scalar values — from a spreadsheet or
//! delimited-file parser, with no header or schema declaration — this crate
//! answers three questions:
//!
//! - which leading and trailing rows are comments, blanks, multi-line
//!   headers, or actual data ([`rows::RowIntuiter`]);
//! - what type each column actually holds despite messy mixed
//!   representations ([`types::TypeIntuiter`]);
//! - what distributional statistics describe each column, computed online
//!   over a stream that may be too large to hold in memory
//!   ([`stats::Stats`]).
//!
//! The engines are independently usable, but compose into a pipeline: row
//! intuition locates the data block and coalesces the header, type intuition
//! resolves a schema from the data rows, and the statistics accumulator
//! consumes typed rows against that schema. None of them performs I/O; a
//! caller hands in rows and receives structured results.
//!
//! ```
//! use table_probe::{TypeIntuiter, TypeTag, Value};
//!
//! let rows = vec![
//!     vec![Value::from("id"), Value::from("seen")],
//!     vec![Value::from("1"), Value::from("2024-05-06")],
//!     vec![Value::from("2"), Value::from("2024-05-07")],
//! ];
//! let intuiter = TypeIntuiter::new().run(rows, None);
//! assert_eq!(intuiter.column_named("id").unwrap().resolved_type(), TypeTag::Int);
//! assert_eq!(intuiter.column_named("seen").unwrap().resolved_type(), TypeTag::Date);
//! ```
//!
//! Inference is best-effort by design: a bad cell degrades to a safe
//! fallback instead of failing the stream, and the failure mode of the
//! classifiers is a wrong guess, not a crash.

pub mod cluster;
pub mod data;
pub mod error;
pub mod rows;
pub mod stats;
pub mod table;
pub mod types;

pub use cluster::ClusterHeaders;
pub use data::{TypeTag, Value};
pub use error::ProbeError;
pub use rows::{RowIntuiter, RowSpec, SelectiveRows};
pub use stats::{StatSet, Stats, StatsOptions};
pub use types::TypeIntuiter;
