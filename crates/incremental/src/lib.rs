//! Rivulet Incremental - multiset dataflow engine for incremental view maintenance.
//!
//! Derived results (filtered, mapped, joined, deduplicated, ranked and
//! windowed projections) are kept up to date from signed change batches
//! instead of being recomputed from scratch.
//!
//! # Core Concepts
//!
//! - `Delta<T>`: one datum with a signed multiplicity (+1 insert, -1 delete)
//! - `MultiSet<T>`: one atomic batch of deltas flowing over a channel
//! - `Graph`: an arena of operators connected by typed streams
//! - `TopKState` / `TopKArray` / `TopKTree`: ordered windows that report
//!   minimal move-in/move-out changes with fractional indices
//! - `MaterializedView`: folds output batches into the current result
//!
//! # Operators
//!
//! - `map`, `filter`, `negate`, `concat`, `inspect`, `consolidate`
//! - `join`, `inner_join`, `left_join`, `right_join`, `full_join`, `anti_join`:
//!   incremental joins on keyed streams
//! - `distinct`, `distinct_by`, `grouped_distinct`
//! - `top_k_with_fractional_index`, `grouped_top_k_with_fractional_index`,
//!   `order_by_with_fractional_index`
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rivulet_core::HasherContext;
//! use rivulet_incremental::{Graph, MaterializedView, MultiSet, TopKOptions, WindowUpdate};
//!
//! let context = Arc::new(HasherContext::from_seed(7));
//! let mut graph = Graph::new(Arc::clone(&context));
//!
//! let scores = graph.new_input::<(&'static str, i64)>();
//! let (top, window) = graph
//!     .top_k_with_fractional_index(scores.stream(), |a: &i64, b: &i64| b.cmp(a), TopKOptions::new().with_limit(2))
//!     .unwrap();
//! let output = graph.output(top).unwrap();
//!
//! graph
//!     .send(&scores, MultiSet::from(vec![(("ann", 7), 1), (("bob", 9), 1), (("cy", 3), 1)]))
//!     .unwrap();
//! graph.run().unwrap();
//!
//! let mut view = MaterializedView::new(Arc::clone(&context));
//! view.apply_all(&graph.take_output(&output).unwrap()).unwrap();
//! assert_eq!(view.ordered(), vec![("bob", 9), ("ann", 7)]);
//!
//! graph.move_window(&window, WindowUpdate::new().with_offset(1)).unwrap();
//! graph.run().unwrap();
//! view.apply_all(&graph.take_output(&output).unwrap()).unwrap();
//! assert_eq!(view.ordered(), vec![("ann", 7), ("cy", 3)]);
//! ```

#![no_std]

extern crate alloc;

pub mod collection;
pub mod dataflow;
pub mod delta;
pub mod fractional;
pub mod group;
pub mod materialize;
pub mod multiset;
pub mod operators;
pub mod topk;

pub use collection::ConsolidatedCollection;
pub use dataflow::{Graph, InputHandle, Operator, OutputHandle, Stream, WindowControl, WindowHandle};
pub use delta::{Delta, Multiplicity};
pub use fractional::{generate_key_between, FractionalIndex};
pub use group::{GroupMap, GroupState};
pub use materialize::MaterializedView;
pub use multiset::MultiSet;
pub use operators::{DistinctState, Indexed, JoinIndex, JoinType};
pub use topk::{
    IndexKind, IndexedValue, Limit, Ranked, TopK, TopKArray, TopKChanges, TopKMoveChanges,
    TopKOptions, TopKState, TopKTree, WindowUpdate,
};
