//! Error types for the Rivulet dataflow engine.

use alloc::string::String;
use core::fmt;

/// Result type alias for Rivulet operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors raised by the hasher, the dataflow graph and its operators.
///
/// None of these are transient: they signal either a misconfigured graph or an
/// upstream bug, and they propagate out of the call that triggered them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A value kind that has no content identity was handed to the hasher.
    UnsupportedValue {
        kind: &'static str,
    },
    /// The chosen index structure does not implement this operation.
    UnsupportedOperation {
        operation: &'static str,
        index: &'static str,
    },
    /// A running multiplicity would drop below zero (double delete or
    /// delete without a prior insert).
    NegativeMultiplicity {
        hash: u64,
        multiplicity: i64,
    },
    /// A running multiplicity does not fit in an `i64`.
    MultiplicityOverflow {
        hash: u64,
    },
    /// An element expected in an ordered index was not found there.
    MissingElement,
    /// A fractional index key is malformed or the bounds are out of order.
    InvalidOrderKey {
        message: String,
    },
    /// The process entropy source failed while seeding the hasher.
    Entropy {
        message: String,
    },
    /// A channel handle was used with a different batch type than it carries.
    ChannelTypeMismatch {
        channel: usize,
    },
    /// A channel or stream handle does not belong to this graph.
    UnknownChannel {
        channel: usize,
    },
    /// An operator handle does not belong to this graph.
    UnknownOperator {
        operator: usize,
    },
    /// A window operation was requested on an operator without a window.
    NotWindowed {
        operator: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedValue { kind } => {
                write!(f, "Unsupported value for content hashing: {}", kind)
            }
            Error::UnsupportedOperation { operation, index } => {
                write!(f, "Operation {} is not supported by the {} index", operation, index)
            }
            Error::NegativeMultiplicity { hash, multiplicity } => {
                write!(
                    f,
                    "Negative multiplicity {} for content hash {:#x}",
                    multiplicity, hash
                )
            }
            Error::MultiplicityOverflow { hash } => {
                write!(f, "Multiplicity overflow for content hash {:#x}", hash)
            }
            Error::MissingElement => write!(f, "Element not found in ordered index"),
            Error::InvalidOrderKey { message } => {
                write!(f, "Invalid order key: {}", message)
            }
            Error::Entropy { message } => write!(f, "Entropy source failed: {}", message),
            Error::ChannelTypeMismatch { channel } => {
                write!(f, "Channel {} carries a different batch type", channel)
            }
            Error::UnknownChannel { channel } => write!(f, "Unknown channel: {}", channel),
            Error::UnknownOperator { operator } => write!(f, "Unknown operator: {}", operator),
            Error::NotWindowed { operator } => {
                write!(f, "Operator {} does not maintain a window", operator)
            }
        }
    }
}

impl Error {
    /// Creates an unsupported value error.
    pub fn unsupported_value(kind: &'static str) -> Self {
        Error::UnsupportedValue { kind }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported_operation(operation: &'static str, index: &'static str) -> Self {
        Error::UnsupportedOperation { operation, index }
    }

    /// Creates a negative multiplicity error.
    pub fn negative_multiplicity(hash: u64, multiplicity: i64) -> Self {
        Error::NegativeMultiplicity { hash, multiplicity }
    }

    /// Creates a multiplicity overflow error.
    pub fn multiplicity_overflow(hash: u64) -> Self {
        Error::MultiplicityOverflow { hash }
    }

    /// Creates an invalid order key error.
    pub fn invalid_order_key(message: impl Into<String>) -> Self {
        Error::InvalidOrderKey {
            message: message.into(),
        }
    }

    /// Creates an entropy error.
    pub fn entropy(message: impl Into<String>) -> Self {
        Error::Entropy {
            message: message.into(),
        }
    }

    /// Returns true for errors caused by inconsistent upstream input rather
    /// than by graph configuration.
    pub fn is_consistency_violation(&self) -> bool {
        matches!(
            self,
            Error::NegativeMultiplicity { .. }
                | Error::MultiplicityOverflow { .. }
                | Error::MissingElement
        )
    }
}
