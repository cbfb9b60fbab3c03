//! Value type definitions for Rivulet.
//!
//! `Value` is the closed set of datum kinds the engine knows how to identify by
//! content. Host types that are not `Value` take part in hashing through the
//! `ContentHash` trait instead.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cmp::Ordering;

/// Arbitrary-precision signed integer, stored as sign + little-endian magnitude.
///
/// Only identity and ordering are needed by the engine, so no arithmetic is
/// provided. The magnitude never carries trailing zero bytes and zero is never
/// negative.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BigInt {
    negative: bool,
    magnitude: Vec<u8>,
}

impl BigInt {
    /// Builds a big integer from a sign and a little-endian magnitude.
    pub fn from_parts(negative: bool, mut magnitude: Vec<u8>) -> Self {
        while magnitude.last() == Some(&0) {
            magnitude.pop();
        }
        let negative = negative && !magnitude.is_empty();
        Self {
            negative,
            magnitude,
        }
    }

    /// Returns zero.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Returns true if this value is below zero.
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Returns true if this value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.magnitude.is_empty()
    }

    /// Little-endian bytes of the absolute value (empty for zero).
    #[inline]
    pub fn magnitude(&self) -> &[u8] {
        &self.magnitude
    }

    /// Converts to `i128` when the value fits.
    pub fn to_i128(&self) -> Option<i128> {
        if self.magnitude.len() > 16 {
            return None;
        }
        let mut bytes = [0u8; 16];
        bytes[..self.magnitude.len()].copy_from_slice(&self.magnitude);
        let abs = u128::from_le_bytes(bytes);
        if self.negative {
            if abs <= i128::MAX as u128 + 1 {
                Some((abs as i128).wrapping_neg())
            } else {
                None
            }
        } else {
            i128::try_from(abs).ok()
        }
    }

    fn cmp_magnitude(&self, other: &Self) -> Ordering {
        self.magnitude
            .len()
            .cmp(&other.magnitude.len())
            .then_with(|| self.magnitude.iter().rev().cmp(other.magnitude.iter().rev()))
    }
}

impl Ord for BigInt {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => self.cmp_magnitude(other),
            (true, true) => other.cmp_magnitude(self),
        }
    }
}

impl PartialOrd for BigInt {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<i128> for BigInt {
    fn from(v: i128) -> Self {
        Self::from_parts(v < 0, v.unsigned_abs().to_le_bytes().to_vec())
    }
}

impl From<u128> for BigInt {
    fn from(v: u128) -> Self {
        Self::from_parts(false, v.to_le_bytes().to_vec())
    }
}

impl From<i64> for BigInt {
    fn from(v: i64) -> Self {
        Self::from(v as i128)
    }
}

impl From<u64> for BigInt {
    fn from(v: u64) -> Self {
        Self::from(v as u128)
    }
}

impl From<i32> for BigInt {
    fn from(v: i32) -> Self {
        Self::from(v as i128)
    }
}

/// An opaque symbolic identifier, optionally carrying a printable description.
///
/// Two symbols with the same description are indistinguishable to the engine.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    description: Option<String>,
}

impl Symbol {
    /// Creates a symbol with a description.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
        }
    }

    /// Creates a symbol with no printable form.
    pub fn anonymous() -> Self {
        Self { description: None }
    }

    /// Returns the description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// A datum flowing through the dataflow graph.
#[derive(Clone, Debug)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Boolean(bool),
    /// IEEE-754 double
    Number(f64),
    /// 64-bit signed integer
    Int64(i64),
    /// Arbitrary-precision integer
    BigInt(BigInt),
    /// UTF-8 string
    String(String),
    /// Opaque symbolic identifier
    Symbol(Symbol),
    /// Ordered list of values
    Array(Vec<Value>),
    /// Raw binary buffer (no content identity, rejected by the hasher)
    Bytes(Vec<u8>),
}

impl Value {
    /// Short name of this value's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::Int64(_) => "int64",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Array(_) => "array",
            Value::Bytes(_) => "bytes",
        }
    }

    /// Returns true if this value is Null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the boolean value if this is a Boolean, None otherwise.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the i64 value if this is an Int64, None otherwise.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the numeric value as f64 for Number and Int64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            Value::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Returns a reference to the string if this is a String, None otherwise.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Returns the elements if this is an Array, None otherwise.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    fn type_order(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Number(_) | Value::Int64(_) => 2,
            Value::BigInt(_) => 3,
            Value::String(_) => 4,
            Value::Symbol(_) => 5,
            Value::Array(_) => 6,
            Value::Bytes(_) => 7,
        }
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    // NaN sorts after every other number
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => cmp_f64(*a, *b),
            (Value::Int64(a), Value::Number(b)) => cmp_f64(*a as f64, *b),
            (Value::Number(a), Value::Int64(b)) => cmp_f64(*a, *b as f64),
            (Value::BigInt(a), Value::BigInt(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Symbol(a), Value::Symbol(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            _ => self.type_order().cmp(&other.type_order()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int64(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Self {
        Value::BigInt(v)
    }
}

impl From<Symbol> for Value {
    fn from(v: Symbol) -> Self {
        Value::Symbol(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_bigint_normalizes() {
        let a = BigInt::from_parts(true, vec![0, 0]);
        assert!(a.is_zero());
        assert!(!a.is_negative());
        assert_eq!(a, BigInt::zero());

        let b = BigInt::from_parts(false, vec![5, 0, 0]);
        assert_eq!(b.magnitude(), &[5]);
        assert_eq!(b, BigInt::from(5i64));
    }

    #[test]
    fn test_bigint_roundtrip_i128() {
        for v in [0i128, 1, -1, 255, -256, i64::MAX as i128, i128::MIN, i128::MAX] {
            assert_eq!(BigInt::from(v).to_i128(), Some(v));
        }
    }

    #[test]
    fn test_bigint_ordering() {
        assert!(BigInt::from(-10i64) < BigInt::from(-2i64));
        assert!(BigInt::from(-1i64) < BigInt::zero());
        assert!(BigInt::from(255i64) < BigInt::from(256i64));
        assert!(BigInt::from(u128::MAX) > BigInt::from(i64::MAX));
    }

    #[test]
    fn test_symbol() {
        assert_eq!(Symbol::new("a"), Symbol::new("a"));
        assert_ne!(Symbol::new("a"), Symbol::anonymous());
        assert_eq!(Symbol::anonymous().description(), None);
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Boolean(true).as_bool(), Some(true));
        assert_eq!(Value::Int64(100).as_i64(), Some(100));
        assert_eq!(Value::Int64(2).as_f64(), Some(2.0));
        assert_eq!(Value::Number(3.5).as_f64(), Some(3.5));
        assert_eq!(Value::String("hello".into()).as_str(), Some("hello"));
        assert_eq!(Value::Array(vec![Value::Null]).as_array().map(|a| a.len()), Some(1));
        assert_eq!(Value::Bytes(vec![1]).kind(), "bytes");
    }

    #[test]
    fn test_value_ordering() {
        assert!(Value::Int64(1) < Value::Int64(2));
        assert!(Value::Int64(1) < Value::Number(1.5));
        assert!(Value::Number(f64::NAN) > Value::Number(f64::INFINITY));
        assert!(Value::String("a".into()) < Value::String("b".into()));
        assert!(Value::Null < Value::Int64(0));
        assert_eq!(Value::Int64(2), Value::Number(2.0));
    }

    #[test]
    fn test_value_from_impls() {
        let v: Value = 42i64.into();
        assert_eq!(v.as_i64(), Some(42));

        let v: Value = "hello".into();
        assert_eq!(v.as_str(), Some("hello"));

        let v: Value = None::<i64>.into();
        assert!(v.is_null());
    }
}
