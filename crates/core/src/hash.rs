//! Content hashing for deduplication and grouping.
//!
//! Values are identified inside the engine by a 32-bit content hash. The mixer
//! is the MurmurHash3 x86_32 block step fed four bytes at a time from a small
//! carry buffer. Every typed value (apart from plain numbers) is prefixed with a
//! per-kind marker so that values of different kinds sharing a byte pattern
//! never collide by construction.
//!
//! The seed and markers live in a [`HasherContext`] created once per process:
//! identical inputs hash identically for the lifetime of that context, but not
//! across restarts. All derived state is in-memory only, so this trades
//! reproducibility for resistance to precomputed flooding inputs.

use crate::error::{Error, Result};
use crate::value::{BigInt, Symbol, Value};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;
const MARKER_MASK: u32 = 0x7fff_ffff;

/// Per-kind markers mixed in ahead of a value's bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct TypeMarkers {
    string: u32,
    bigint_positive: u32,
    bigint_negative: u32,
    symbol: u32,
    null: u32,
    boolean: u32,
    array: u32,
}

/// Process-wide hashing parameters: the seed and the kind markers.
///
/// Build one at startup and share it (usually behind an `Arc`) with every graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HasherContext {
    seed: u32,
    markers: TypeMarkers,
}

impl HasherContext {
    /// Creates a context seeded from the operating system's entropy source.
    pub fn new() -> Result<Self> {
        let mut bytes = [0u8; 8];
        getrandom::fill(&mut bytes).map_err(|e| Error::entropy(format!("{}", e)))?;
        Ok(Self::from_seed(u64::from_le_bytes(bytes)))
    }

    /// Creates a context whose seed and markers are derived from `seed`.
    ///
    /// Two contexts built from the same seed hash identically.
    pub fn from_seed(seed: u64) -> Self {
        let mut state = seed;
        let mut next = || (splitmix64(&mut state) >> 32) as u32;
        let seed = next();
        let markers = TypeMarkers {
            string: next() & MARKER_MASK,
            bigint_positive: next() & MARKER_MASK,
            bigint_negative: next() & MARKER_MASK,
            symbol: next() & MARKER_MASK,
            null: next() & MARKER_MASK,
            boolean: next() & MARKER_MASK,
            array: next() & MARKER_MASK,
        };
        Self { seed, markers }
    }

    /// Starts a new incremental hash.
    #[inline]
    pub fn hasher(&self) -> ContentHasher<'_> {
        ContentHasher::new(self)
    }

    /// Hashes a single value.
    pub fn hash<T: ContentHash + ?Sized>(&self, value: &T) -> Result<u32> {
        let mut hasher = self.hasher();
        hasher.update(value)?;
        Ok(hasher.digest())
    }
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[inline]
fn scramble(block: u32) -> u32 {
    block.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2)
}

/// Incremental hasher over logical values.
#[derive(Clone, Debug)]
pub struct ContentHasher<'a> {
    context: &'a HasherContext,
    state: u32,
    carry: u32,
    carry_len: u32,
    length: u32,
}

impl<'a> ContentHasher<'a> {
    /// Creates a hasher bound to `context`.
    pub fn new(context: &'a HasherContext) -> Self {
        Self {
            context,
            state: context.seed,
            carry: 0,
            carry_len: 0,
            length: 0,
        }
    }

    /// Mixes one logical value into the hash.
    pub fn update<T: ContentHash + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.content_hash(self)
    }

    /// Mixes a single byte.
    pub fn write_byte(&mut self, byte: u8) {
        self.carry |= (byte as u32) << (8 * self.carry_len);
        self.carry_len += 1;
        self.length = self.length.wrapping_add(1);
        if self.carry_len == 4 {
            self.state ^= scramble(self.carry);
            self.state = self
                .state
                .rotate_left(13)
                .wrapping_mul(5)
                .wrapping_add(0xe654_6b64);
            self.carry = 0;
            self.carry_len = 0;
        }
    }

    /// Mixes a 32-bit word as four little-endian bytes.
    pub fn write_u32(&mut self, word: u32) {
        for byte in word.to_le_bytes() {
            self.write_byte(byte);
        }
    }

    /// Mixes an IEEE-754 double as eight little-endian bytes.
    pub fn write_f64(&mut self, value: f64) {
        for byte in value.to_le_bytes() {
            self.write_byte(byte);
        }
    }

    /// Mixes a string as UTF-16 code units, after the string marker.
    pub fn write_str(&mut self, value: &str) {
        self.write_u32(self.context.markers.string);
        self.write_utf16(value);
    }

    fn write_utf16(&mut self, value: &str) {
        for unit in value.encode_utf16() {
            self.write_byte(unit as u8);
            self.write_byte((unit >> 8) as u8);
        }
    }

    /// Mixes a symbol: its marker, then the description if it has one.
    pub fn write_symbol(&mut self, symbol: &Symbol) {
        self.write_u32(self.context.markers.symbol);
        if let Some(description) = symbol.description() {
            self.write_utf16(description);
        }
    }

    /// Mixes an integer given as sign and absolute value.
    pub fn write_integer(&mut self, negative: bool, mut magnitude: u128) {
        self.write_sign_marker(negative);
        if magnitude == 0 {
            self.write_byte(0);
            return;
        }
        while magnitude != 0 {
            self.write_byte(magnitude as u8);
            magnitude >>= 8;
        }
    }

    /// Mixes a big integer: sign marker, then magnitude bytes low-first.
    pub fn write_bigint(&mut self, value: &BigInt) {
        self.write_sign_marker(value.is_negative());
        if value.is_zero() {
            self.write_byte(0);
            return;
        }
        for &byte in value.magnitude() {
            self.write_byte(byte);
        }
    }

    fn write_sign_marker(&mut self, negative: bool) {
        let marker = if negative {
            self.context.markers.bigint_negative
        } else {
            self.context.markers.bigint_positive
        };
        self.write_u32(marker);
    }

    /// Mixes the null marker.
    pub fn write_null(&mut self) {
        self.write_u32(self.context.markers.null);
    }

    /// Mixes a boolean after the boolean marker.
    pub fn write_bool(&mut self, value: bool) {
        self.write_u32(self.context.markers.boolean);
        self.write_byte(value as u8);
    }

    /// Starts a sequence of `len` values: array marker then the length.
    pub fn write_array_header(&mut self, len: usize) {
        self.write_u32(self.context.markers.array);
        self.write_integer(false, len as u128);
    }

    /// Finalizes the hash.
    pub fn digest(self) -> u32 {
        let mut h = self.state;
        if self.carry_len > 0 {
            h ^= scramble(self.carry);
        }
        h ^= self.length;
        h ^= h >> 16;
        h = h.wrapping_mul(0x85eb_ca6b);
        h ^= h >> 13;
        h = h.wrapping_mul(0xc2b2_ae35);
        h ^= h >> 16;
        h
    }
}

/// A type whose content can be mixed into a [`ContentHasher`].
///
/// Implementations should mix exactly the data that defines the value's
/// identity. Returning an error marks the value as unhashable.
pub trait ContentHash {
    fn content_hash(&self, hasher: &mut ContentHasher<'_>) -> Result<()>;
}

impl<T: ContentHash + ?Sized> ContentHash for &T {
    fn content_hash(&self, hasher: &mut ContentHasher<'_>) -> Result<()> {
        (**self).content_hash(hasher)
    }
}

impl ContentHash for str {
    fn content_hash(&self, hasher: &mut ContentHasher<'_>) -> Result<()> {
        hasher.write_str(self);
        Ok(())
    }
}

impl ContentHash for String {
    fn content_hash(&self, hasher: &mut ContentHasher<'_>) -> Result<()> {
        hasher.write_str(self);
        Ok(())
    }
}

impl ContentHash for f64 {
    fn content_hash(&self, hasher: &mut ContentHasher<'_>) -> Result<()> {
        hasher.write_f64(*self);
        Ok(())
    }
}

impl ContentHash for f32 {
    fn content_hash(&self, hasher: &mut ContentHasher<'_>) -> Result<()> {
        hasher.write_f64(*self as f64);
        Ok(())
    }
}

impl ContentHash for bool {
    fn content_hash(&self, hasher: &mut ContentHasher<'_>) -> Result<()> {
        hasher.write_bool(*self);
        Ok(())
    }
}

impl ContentHash for () {
    fn content_hash(&self, hasher: &mut ContentHasher<'_>) -> Result<()> {
        hasher.write_null();
        Ok(())
    }
}

macro_rules! impl_signed {
    ($($t:ty),*) => {
        $(
            impl ContentHash for $t {
                fn content_hash(&self, hasher: &mut ContentHasher<'_>) -> Result<()> {
                    hasher.write_integer(*self < 0, self.unsigned_abs() as u128);
                    Ok(())
                }
            }
        )*
    };
}

macro_rules! impl_unsigned {
    ($($t:ty),*) => {
        $(
            impl ContentHash for $t {
                fn content_hash(&self, hasher: &mut ContentHasher<'_>) -> Result<()> {
                    hasher.write_integer(false, *self as u128);
                    Ok(())
                }
            }
        )*
    };
}

impl_signed!(i8, i16, i32, i64, i128, isize);
impl_unsigned!(u8, u16, u32, u64, u128, usize);

impl ContentHash for BigInt {
    fn content_hash(&self, hasher: &mut ContentHasher<'_>) -> Result<()> {
        hasher.write_bigint(self);
        Ok(())
    }
}

impl ContentHash for Symbol {
    fn content_hash(&self, hasher: &mut ContentHasher<'_>) -> Result<()> {
        hasher.write_symbol(self);
        Ok(())
    }
}

impl<T: ContentHash> ContentHash for Option<T> {
    fn content_hash(&self, hasher: &mut ContentHasher<'_>) -> Result<()> {
        match self {
            Some(value) => value.content_hash(hasher),
            None => {
                hasher.write_null();
                Ok(())
            }
        }
    }
}

impl<T: ContentHash> ContentHash for [T] {
    fn content_hash(&self, hasher: &mut ContentHasher<'_>) -> Result<()> {
        hasher.write_array_header(self.len());
        for item in self {
            item.content_hash(hasher)?;
        }
        Ok(())
    }
}

impl<T: ContentHash> ContentHash for Vec<T> {
    fn content_hash(&self, hasher: &mut ContentHasher<'_>) -> Result<()> {
        self.as_slice().content_hash(hasher)
    }
}

macro_rules! impl_tuple {
    ($len:expr; $($name:ident),+) => {
        impl<$($name: ContentHash),+> ContentHash for ($($name,)+) {
            #[allow(non_snake_case)]
            fn content_hash(&self, hasher: &mut ContentHasher<'_>) -> Result<()> {
                let ($($name,)+) = self;
                hasher.write_array_header($len);
                $($name.content_hash(hasher)?;)+
                Ok(())
            }
        }
    };
}

impl_tuple!(1; A);
impl_tuple!(2; A, B);
impl_tuple!(3; A, B, C);
impl_tuple!(4; A, B, C, D);

impl ContentHash for Value {
    fn content_hash(&self, hasher: &mut ContentHasher<'_>) -> Result<()> {
        match self {
            Value::Null => hasher.write_null(),
            Value::Boolean(v) => hasher.write_bool(*v),
            Value::Number(v) => hasher.write_f64(*v),
            Value::Int64(v) => hasher.write_integer(*v < 0, v.unsigned_abs() as u128),
            Value::BigInt(v) => hasher.write_bigint(v),
            Value::String(v) => hasher.write_str(v),
            Value::Symbol(v) => hasher.write_symbol(v),
            Value::Array(items) => return items.content_hash(hasher),
            Value::Bytes(_) => return Err(Error::unsupported_value(self.kind())),
        }
        Ok(())
    }
}
