//! Fractional order keys.
//!
//! A key is an "integer part" followed by a fraction, both written with the
//! base-62 digits `0-9A-Za-z`. The head character of the integer part encodes
//! its length: `a`..`z` for 2..27 characters going up, `Z`..`A` for 2..27
//! characters going down. Keys compare as plain byte strings, and a key can
//! always be generated strictly between two others without touching them.

use alloc::format;
use alloc::string::String;
use rivulet_core::{Error, Result};

/// An order key. Sorting keys as strings sorts the elements they label.
pub type FractionalIndex = String;

const DIGITS: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const ZERO: u8 = b'0';
const MAX_DIGIT: u8 = b'z';

/// The integer part below which no key can be generated.
const SMALLEST_INTEGER: &str = "A00000000000000000000000000";

/// Generates a key strictly between `a` and `b`.
///
/// `None` stands for the open end: `(None, None)` yields the first key,
/// `(Some(a), None)` a key after `a` and `(None, Some(b))` a key before `b`.
pub fn generate_key_between(a: Option<&str>, b: Option<&str>) -> Result<FractionalIndex> {
    if let Some(a) = a {
        validate_order_key(a)?;
    }
    if let Some(b) = b {
        validate_order_key(b)?;
    }

    match (a, b) {
        (None, None) => Ok(String::from("a0")),
        (Some(a), Some(b)) if a >= b => Err(Error::invalid_order_key(format!("{a} >= {b}"))),
        (None, Some(b)) => {
            let ib = integer_part(b)?;
            let fb = &b[ib.len()..];
            if ib == SMALLEST_INTEGER {
                return Ok(format!("{ib}{}", midpoint("", Some(fb))?));
            }
            if ib.len() < b.len() {
                return Ok(String::from(ib));
            }
            decrement_integer(ib)?
                .ok_or_else(|| Error::invalid_order_key("cannot decrement any more"))
        }
        (Some(a), None) => {
            let ia = integer_part(a)?;
            let fa = &a[ia.len()..];
            match increment_integer(ia)? {
                Some(next) => Ok(next),
                None => Ok(format!("{ia}{}", midpoint(fa, None)?)),
            }
        }
        (Some(a), Some(b)) => {
            let ia = integer_part(a)?;
            let fa = &a[ia.len()..];
            let ib = integer_part(b)?;
            let fb = &b[ib.len()..];
            if ia == ib {
                return Ok(format!("{ia}{}", midpoint(fa, Some(fb))?));
            }
            let next = increment_integer(ia)?
                .ok_or_else(|| Error::invalid_order_key("cannot increment any more"))?;
            if next.as_str() < b {
                Ok(next)
            } else {
                Ok(format!("{ia}{}", midpoint(fa, None)?))
            }
        }
    }
}

/// Checks that `key` is a well-formed order key.
pub fn validate_order_key(key: &str) -> Result<()> {
    if key == SMALLEST_INTEGER {
        return Err(Error::invalid_order_key(format!("invalid order key: {key}")));
    }
    if let Some(c) = key.bytes().find(|c| digit_value(*c).is_none()) {
        return Err(Error::invalid_order_key(format!(
            "invalid character {:?} in order key: {key}",
            c as char
        )));
    }
    let integer = integer_part(key)?;
    if key.len() > integer.len() && key.as_bytes().last() == Some(&ZERO) {
        return Err(Error::invalid_order_key(format!("invalid order key: {key}")));
    }
    Ok(())
}

/// Returns a fraction strictly between `a` and `b` (`None` meaning 1).
fn midpoint(a: &str, b: Option<&str>) -> Result<String> {
    if let Some(b) = b {
        if a >= b {
            return Err(Error::invalid_order_key(format!("{a} >= {b}")));
        }
    }
    let trailing_zero = |s: &str| s.as_bytes().last() == Some(&ZERO);
    if trailing_zero(a) || b.is_some_and(trailing_zero) {
        return Err(Error::invalid_order_key("trailing zero"));
    }

    if let Some(b) = b {
        // common prefix, with `a` padded by zeros
        let (ab, bb) = (a.as_bytes(), b.as_bytes());
        let n = bb
            .iter()
            .enumerate()
            .take_while(|(i, c)| ab.get(*i).copied().unwrap_or(ZERO) == **c)
            .count();
        if n > 0 {
            let rest = midpoint(a.get(n..).unwrap_or(""), Some(&b[n..]))?;
            return Ok(format!("{}{rest}", &b[..n]));
        }
    }

    let digit_a = match a.as_bytes().first() {
        Some(c) => digit(*c)? as i64,
        None => 0,
    };
    let digit_b = match b.map(|b| b.as_bytes().first()) {
        Some(Some(c)) => digit(*c)? as i64,
        Some(None) => -1,
        None => DIGITS.len() as i64,
    };

    if digit_b - digit_a > 1 {
        // round half up
        let mid = (digit_a + digit_b + 1) / 2;
        return Ok(String::from(DIGITS[mid as usize] as char));
    }
    match b {
        Some(b) if b.len() > 1 => Ok(String::from(&b[..1])),
        _ => {
            let mut out = String::new();
            out.push(DIGITS[digit_a as usize] as char);
            out.push_str(&midpoint(a.get(1..).unwrap_or(""), None)?);
            Ok(out)
        }
    }
}

fn digit_value(c: u8) -> Option<usize> {
    match c {
        b'0'..=b'9' => Some((c - b'0') as usize),
        b'A'..=b'Z' => Some((c - b'A') as usize + 10),
        b'a'..=b'z' => Some((c - b'a') as usize + 36),
        _ => None,
    }
}

fn digit(c: u8) -> Result<usize> {
    digit_value(c).ok_or_else(|| {
        Error::invalid_order_key(format!("invalid digit {:?}", c as char))
    })
}

fn integer_length(head: u8) -> Result<usize> {
    match head {
        b'a'..=b'z' => Ok((head - b'a') as usize + 2),
        b'A'..=b'Z' => Ok((b'Z' - head) as usize + 2),
        _ => Err(Error::invalid_order_key(format!(
            "invalid order key head: {:?}",
            head as char
        ))),
    }
}

fn integer_part(key: &str) -> Result<&str> {
    let head = *key
        .as_bytes()
        .first()
        .ok_or_else(|| Error::invalid_order_key("empty order key"))?;
    let len = integer_length(head)?;
    key.get(..len)
        .ok_or_else(|| Error::invalid_order_key(format!("invalid order key: {key}")))
}

fn validate_integer(int: &str) -> Result<()> {
    let head = *int
        .as_bytes()
        .first()
        .ok_or_else(|| Error::invalid_order_key("empty integer part"))?;
    if int.len() != integer_length(head)? {
        return Err(Error::invalid_order_key(format!(
            "invalid integer part of order key: {int}"
        )));
    }
    Ok(())
}

fn increment_integer(int: &str) -> Result<Option<String>> {
    validate_integer(int)?;
    let bytes = int.as_bytes();
    let head = bytes[0];
    let mut digits = bytes[1..].to_vec();

    let mut carry = true;
    for d in digits.iter_mut().rev() {
        let next = digit(*d)? + 1;
        if next == DIGITS.len() {
            *d = ZERO;
        } else {
            *d = DIGITS[next];
            carry = false;
            break;
        }
    }

    let head = if carry {
        match head {
            b'Z' => return Ok(Some(String::from("a0"))),
            b'z' => return Ok(None),
            _ => {
                let next = head + 1;
                if next > b'a' {
                    digits.push(ZERO);
                } else {
                    digits.pop();
                }
                next
            }
        }
    } else {
        head
    };
    Ok(Some(assemble(head, &digits)))
}

fn decrement_integer(int: &str) -> Result<Option<String>> {
    validate_integer(int)?;
    let bytes = int.as_bytes();
    let head = bytes[0];
    let mut digits = bytes[1..].to_vec();

    let mut borrow = true;
    for d in digits.iter_mut().rev() {
        let value = digit(*d)?;
        if value == 0 {
            *d = MAX_DIGIT;
        } else {
            *d = DIGITS[value - 1];
            borrow = false;
            break;
        }
    }

    let head = if borrow {
        match head {
            b'a' => return Ok(Some(String::from("Zz"))),
            b'A' => return Ok(None),
            _ => {
                let prev = head - 1;
                if prev < b'Z' {
                    digits.push(MAX_DIGIT);
                } else {
                    digits.pop();
                }
                prev
            }
        }
    } else {
        head
    };
    Ok(Some(assemble(head, &digits)))
}

fn assemble(head: u8, digits: &[u8]) -> String {
    let mut out = String::with_capacity(digits.len() + 1);
    out.push(head as char);
    out.extend(digits.iter().map(|d| *d as char));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn between(a: Option<&str>, b: Option<&str>) -> String {
        generate_key_between(a, b).unwrap()
    }

    #[test]
    fn test_first_keys() {
        assert_eq!(between(None, None), "a0");
        assert_eq!(between(Some("a0"), None), "a1");
        assert_eq!(between(None, Some("a0")), "Zz");
        assert_eq!(between(Some("a0"), Some("a1")), "a0V");
    }

    #[test]
    fn test_integer_boundaries() {
        assert_eq!(between(Some("az"), None), "b00");
        assert_eq!(between(Some("Zz"), None), "a0");
        assert_eq!(between(None, Some("b00")), "az");
        assert_eq!(between(Some("a1"), Some("a2")), "a1V");
        assert_eq!(between(None, Some("a0V")), "a0");
    }

    #[test]
    fn test_fractions() {
        assert_eq!(between(Some("a0V"), Some("a1")), "a0l");
        assert_eq!(between(Some("a0"), Some("a0V")), "a0G");
        assert_eq!(between(Some("a0z"), Some("a1")), "a0zV");
    }

    #[test]
    fn test_invalid_keys() {
        assert!(generate_key_between(Some("a1"), Some("a0")).is_err());
        assert!(generate_key_between(Some("a0"), Some("a0")).is_err());
        assert!(generate_key_between(Some("a00"), None).is_err());
        assert!(generate_key_between(Some("b"), None).is_err());
        assert!(generate_key_between(Some("a-"), None).is_err());
        assert!(generate_key_between(Some(""), None).is_err());
        assert!(generate_key_between(None, Some(SMALLEST_INTEGER)).is_err());
    }

    #[test]
    fn test_repeated_append_and_prepend_stay_ordered() {
        let mut keys: Vec<String> = Vec::new();
        let mut last: Option<String> = None;
        for _ in 0..200 {
            let next = between(last.as_deref(), None);
            keys.push(next.clone());
            last = Some(next);
        }
        let mut first: Option<String> = None;
        for _ in 0..200 {
            let prev = between(None, first.as_deref().or(Some("a0")));
            keys.insert(0, prev.clone());
            first = Some(prev);
        }
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_repeated_bisection_stays_between() {
        let low = String::from("a0");
        let mut high = String::from("a1");
        for _ in 0..50 {
            let mid = between(Some(&low), Some(&high));
            assert!(low < mid && mid < high);
            high = mid;
        }
    }
}
