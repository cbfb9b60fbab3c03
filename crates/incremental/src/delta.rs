//! Diff entries for the multiset dataflow.
//!
//! A Delta pairs a datum with a signed multiplicity: `+1` for one more
//! occurrence, `-1` for one fewer.

use rivulet_core::{Error, Result};

/// Signed occurrence count carried by every diff entry.
pub type Multiplicity = i64;

/// Adds `diff` to the running multiplicity `current` of `hash`.
///
/// Fails if the sum overflows or drops below zero.
pub fn accumulate(hash: u64, current: Multiplicity, diff: Multiplicity) -> Result<Multiplicity> {
    let next = current
        .checked_add(diff)
        .ok_or_else(|| Error::multiplicity_overflow(hash))?;
    if next < 0 {
        return Err(Error::negative_multiplicity(hash, next));
    }
    Ok(next)
}

/// A differential change to a data item.
///
/// The `diff` field indicates the multiplicity of the change:
/// - `+1` means insertion
/// - `-1` means deletion
/// - Other values can represent multiple insertions/deletions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delta<T> {
    /// The data being changed
    pub data: T,
    /// The differential: +1 for insert, -1 for delete
    pub diff: Multiplicity,
}

impl<T> Delta<T> {
    /// Creates a new delta with the given data and diff.
    #[inline]
    pub fn new(data: T, diff: Multiplicity) -> Self {
        Self { data, diff }
    }

    /// Creates an insertion delta (+1).
    #[inline]
    pub fn insert(data: T) -> Self {
        Self { data, diff: 1 }
    }

    /// Creates a deletion delta (-1).
    #[inline]
    pub fn delete(data: T) -> Self {
        Self { data, diff: -1 }
    }

    /// Returns true if this is an insertion (diff > 0).
    #[inline]
    pub fn is_insert(&self) -> bool {
        self.diff > 0
    }

    /// Returns true if this is a deletion (diff < 0).
    #[inline]
    pub fn is_delete(&self) -> bool {
        self.diff < 0
    }

    /// Returns true if this delta has no effect (diff == 0).
    #[inline]
    pub fn is_noop(&self) -> bool {
        self.diff == 0
    }

    /// Maps the data to a new type.
    #[inline]
    pub fn map<U, F>(self, f: F) -> Delta<U>
    where
        F: FnOnce(T) -> U,
    {
        Delta {
            data: f(self.data),
            diff: self.diff,
        }
    }

    /// Negates the diff (turns insert into delete and vice versa).
    #[inline]
    pub fn negate(self) -> Self {
        Self {
            data: self.data,
            diff: -self.diff,
        }
    }
}

impl<T> From<(T, Multiplicity)> for Delta<T> {
    fn from((data, diff): (T, Multiplicity)) -> Self {
        Self { data, diff }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_insert() {
        let d = Delta::insert(42);
        assert!(d.is_insert());
        assert!(!d.is_delete());
        assert!(!d.is_noop());
        assert_eq!(d.diff, 1);
        assert_eq!(d.data, 42);
    }

    #[test]
    fn test_delta_delete() {
        let d = Delta::delete(42);
        assert!(!d.is_insert());
        assert!(d.is_delete());
        assert_eq!(d.diff, -1);
    }

    #[test]
    fn test_delta_negate() {
        let neg = Delta::new("a", 3).negate();
        assert_eq!(neg.diff, -3);
        assert_eq!(neg.data, "a");
    }

    #[test]
    fn test_accumulate_checks_bounds() {
        assert_eq!(accumulate(1, 2, -2), Ok(0));
        assert_eq!(accumulate(1, 1, -2), Err(Error::negative_multiplicity(1, -1)));
        assert_eq!(
            accumulate(7, Multiplicity::MAX, 1),
            Err(Error::multiplicity_overflow(7))
        );
        assert_eq!(
            accumulate(7, -1, Multiplicity::MIN),
            Err(Error::multiplicity_overflow(7))
        );
    }

    #[test]
    fn test_delta_map_and_from_pair() {
        let mapped = Delta::from((21, -2)).map(|x| x * 2);
        assert_eq!(mapped, Delta::new(42, -2));
    }
}
