//! Property-Based Tests for Cache Module
//!
//! Uses proptest to verify the codec and key-normalization invariants the
//! rest of the engine relies on.

use proptest::prelude::*;
use serde_json::Value;

use crate::cache::{codec, key, Compression, COMPRESSION_THRESHOLD, MAX_KEY_LENGTH};

// == Strategies ==
/// Generates cache names within the length limit
fn valid_name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_/:.-]{1,64}"
}

/// Generates namespaces short enough to leave room for names
fn namespace_strategy() -> impl Strategy<Value = Option<String>> {
    proptest::option::of("[a-zA-Z0-9_]{1,16}")
}

/// Generates serializable values across the shapes callers store
fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,2048}".prop_map(Value::from),
        ("[a-z]{1,8}", any::<i64>()).prop_map(|(k, v)| {
            let mut map = serde_json::Map::new();
            map.insert(k, Value::from(v));
            Value::Object(map)
        }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // For any value shape, encoding then decoding with the recorded tag
    // returns the original value, whether or not compression is configured.
    #[test]
    fn prop_codec_round_trip(value in value_strategy(), compressed in any::<bool>()) {
        let scheme = compressed.then_some(Compression::Gzip);
        let (payload, tag) = codec::encode(&value, scheme).unwrap();
        let decoded = codec::decode(&payload, tag.as_deref()).unwrap();
        prop_assert_eq!(decoded, value);
    }

    // A row is tagged exactly when a scheme is configured and the
    // serialized form reaches the threshold, and integers are never tagged.
    #[test]
    fn prop_codec_tagging_policy(value in value_strategy(), compressed in any::<bool>()) {
        let scheme = compressed.then_some(Compression::Gzip);
        let serialized_len = serde_json::to_vec(&value).unwrap().len();
        let numeric = value.is_i64() || value.is_u64();

        let (_, tag) = codec::encode(&value, scheme).unwrap();
        let expect_tag = compressed && !numeric && serialized_len >= COMPRESSION_THRESHOLD;
        prop_assert_eq!(tag.is_some(), expect_tag);
    }

    // Normalized keys are byte-exact: the name survives unchanged behind
    // the namespace prefix, and the bound is enforced.
    #[test]
    fn prop_normalize_round_trip(name in valid_name_strategy(), namespace in namespace_strategy()) {
        let key = key::normalize(&name, namespace.as_deref()).unwrap();
        prop_assert!(key.len() <= MAX_KEY_LENGTH);
        match &namespace {
            Some(ns) => {
                let prefix = key::namespace_prefix(ns);
                prop_assert!(key.starts_with(&prefix));
                prop_assert_eq!(&key[prefix.len()..], name.as_bytes());
            }
            None => prop_assert_eq!(key.as_slice(), name.as_bytes()),
        }
    }

    // Every key in a namespace falls inside the prefix range scan, and no
    // key of a different namespace does.
    #[test]
    fn prop_namespace_range_isolation(name in valid_name_strategy(), ns in "[a-z]{1,8}") {
        let prefix = key::namespace_prefix(&ns);
        let upper = key::prefix_upper_bound(&prefix).unwrap();

        let inside = key::normalize(&name, Some(&ns)).unwrap();
        prop_assert!(inside.as_slice() >= prefix.as_slice());
        prop_assert!(inside.as_slice() < upper.as_slice());

        // A longer namespace sharing the spelling stays outside the range
        let sibling = format!("{ns}x");
        let outside = key::normalize(&name, Some(&sibling)).unwrap();
        prop_assert!(!(outside.as_slice() >= prefix.as_slice()
            && outside.as_slice() < upper.as_slice()));
    }
}
