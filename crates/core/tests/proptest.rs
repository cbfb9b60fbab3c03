//! Property-based tests for rivulet-core content hashing.

use rivulet_core::{BigInt, HasherContext, Value};
use proptest::prelude::*;

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Boolean),
        any::<i64>().prop_map(Value::Int64),
        (-1.0e9f64..1.0e9).prop_map(Value::Number),
        "[a-z0-9]{0,12}".prop_map(Value::from),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(Value::Array)
    })
}

proptest! {
    /// Hashing is a pure function of content and seed.
    #[test]
    fn hash_is_deterministic(v in value(), seed in any::<u64>()) {
        let a = HasherContext::from_seed(seed);
        let b = HasherContext::from_seed(seed);
        prop_assert_eq!(a.hash(&v).unwrap(), b.hash(&v).unwrap());
        prop_assert_eq!(a.hash(&v).unwrap(), a.hash(&v.clone()).unwrap());
    }

    /// Native integers and big integers of the same value share an identity.
    #[test]
    fn integer_kinds_hash_alike(n in any::<i64>()) {
        let ctx = HasherContext::from_seed(9);
        let native = ctx.hash(&n).unwrap();
        prop_assert_eq!(native, ctx.hash(&Value::Int64(n)).unwrap());
        prop_assert_eq!(native, ctx.hash(&BigInt::from(n)).unwrap());
        prop_assert_eq!(native, ctx.hash(&Value::BigInt(BigInt::from(n))).unwrap());
    }

    /// A string never hashes like the number it spells.
    #[test]
    fn strings_differ_from_numbers(n in -100_000i64..100_000) {
        let ctx = HasherContext::from_seed(3);
        let text = n.to_string();
        prop_assert_ne!(ctx.hash(text.as_str()).unwrap(), ctx.hash(&n).unwrap());
        prop_assert_ne!(ctx.hash(text.as_str()).unwrap(), ctx.hash(&(n as f64)).unwrap());
    }

    /// Tuples hash like arrays of the same elements.
    #[test]
    fn tuples_hash_as_arrays(a in any::<i64>(), b in "[a-z]{0,8}") {
        let ctx = HasherContext::from_seed(5);
        let tuple = ctx.hash(&(a, b.clone())).unwrap();
        let array = ctx.hash(&Value::Array(vec![Value::Int64(a), Value::from(b.as_str())])).unwrap();
        prop_assert_eq!(tuple, array);
    }

    /// Nesting is part of the identity.
    #[test]
    fn nesting_changes_hash(items in prop::collection::vec(any::<i64>(), 1..6)) {
        let ctx = HasherContext::from_seed(8);
        let flat: Vec<Value> = items.iter().copied().map(Value::Int64).collect();
        let nested = Value::Array(vec![Value::Array(flat.clone())]);
        prop_assert_ne!(ctx.hash(&Value::Array(flat)).unwrap(), ctx.hash(&nested).unwrap());
    }
}
