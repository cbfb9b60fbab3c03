//! Rivulet Core - Value model, content hashing and errors for the Rivulet engine.
//!
//! This crate provides the leaf types every other Rivulet crate builds on:
//!
//! - `Value`: the closed set of datum kinds (null, boolean, number, int64,
//!   big integer, string, symbol, array, bytes)
//! - `BigInt` / `Symbol`: arbitrary-precision integers and opaque identifiers
//! - `HasherContext` / `ContentHasher`: seeded content hashing used as the
//!   identity of values inside the dataflow engine
//! - `ContentHash`: the trait host types implement to be hashable
//! - `Error`: error types for hashing and dataflow operations
//!
//! # Example
//!
//! ```rust
//! use rivulet_core::{HasherContext, Value};
//!
//! let ctx = HasherContext::from_seed(1);
//!
//! let a = ctx.hash(&Value::from("5")).unwrap();
//! let b = ctx.hash(&Value::Number(5.0)).unwrap();
//! assert_ne!(a, b);
//!
//! assert_eq!(ctx.hash("5").unwrap(), a);
//! ```

#![no_std]

extern crate alloc;

mod error;
pub mod hash;
mod value;

pub use error::{Error, Result};
pub use hash::{ContentHash, ContentHasher, HasherContext};
pub use value::{BigInt, Symbol, Value};
