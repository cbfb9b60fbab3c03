//! Dataflow operators.
//!
//! Each operator is a struct implementing `Operator`, plus a builder method
//! on `Graph` that wires it between streams:
//! - Map / Negate / Filter / Concat / Inspect: stateless per-entry operators
//! - Consolidate: merges a pass's batches into one net batch
//! - Join: incrementally maintained inner, outer and anti joins
//! - Distinct: presence tracking, optionally per group
//! - TopK: ordered windows with fractional indices, optionally per group

mod concat;
mod consolidate;
mod distinct;
mod filter;
mod inspect;
mod join;
mod map;
mod topk;

pub use concat::ConcatOperator;
pub use consolidate::ConsolidateOperator;
pub use distinct::{DistinctOperator, DistinctState};
pub use filter::FilterOperator;
pub use inspect::InspectOperator;
pub use join::{JoinIndex, JoinOperator, JoinType};
pub use map::{MapOperator, NegateOperator};
pub use topk::{Indexed, TopKOperator};
