//! Property-based tests for value formatting and field coercion.
//!
//! Whatever the exporter writes for a typed value must coerce back to the
//! same value when the file is loaded again.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{NaiveDate, NaiveDateTime};
use healthcare_loader::io::validation::{coerce_age, coerce_billing_amount, parse_datetime};
use healthcare_loader::{Document, Value};
use proptest::prelude::*;

fn datetime_strategy() -> impl Strategy<Value = NaiveDateTime> {
    (
        1900i32..2100,
        1u32..=12,
        1u32..=28,
        0u32..24,
        0u32..60,
        0u32..60,
        0u32..1000,
    )
        .prop_map(|(y, mo, d, h, mi, s, ms)| {
            NaiveDate::from_ymd_opt(y, mo, d)
                .unwrap()
                .and_hms_milli_opt(h, mi, s, ms)
                .unwrap()
        })
}

fn finite_float() -> impl Strategy<Value = f64> {
    any::<f64>().prop_filter("finite", |f| f.is_finite())
}

proptest! {
    #[test]
    fn prop_int_field_coerces_back(age in any::<i64>()) {
        let field = Value::Int(age).to_csv_field();
        prop_assert_eq!(coerce_age(&field, 1).unwrap(), age);
    }

    #[test]
    fn prop_float_field_coerces_back(amount in finite_float()) {
        let field = Value::Float(amount).to_csv_field();
        prop_assert!(field.contains('.'));
        prop_assert_eq!(coerce_billing_amount(&field, 1).unwrap(), amount);
    }

    #[test]
    fn prop_datetime_field_parses_back(dt in datetime_strategy()) {
        let field = Value::DateTime(dt).to_csv_field();
        prop_assert_eq!(parse_datetime(&field), Some(dt));
    }

    #[test]
    fn prop_midnight_renders_date_only(dt in datetime_strategy()) {
        let midnight = dt.date().and_time(chrono::NaiveTime::MIN);
        let field = Value::DateTime(midnight).to_csv_field();
        prop_assert_eq!(field.len(), 10);
        prop_assert_eq!(parse_datetime(&field), Some(midnight));
    }

    #[test]
    fn prop_json_preserves_value_kind(
        age in any::<i64>(),
        amount in finite_float(),
        dt in datetime_strategy(),
        name in "[A-Za-z ]{1,24}",
    ) {
        for value in [
            Value::Int(age),
            Value::Float(amount),
            Value::DateTime(dt),
            Value::Text(name.clone()),
        ] {
            let json = value.to_json().unwrap();
            prop_assert_eq!(Value::from_json(&json).unwrap(), value);
        }
    }

    #[test]
    fn prop_stored_document_text_keeps_floats(
        amount in finite_float(),
        midrange in 100.0f64..60_000.0,
    ) {
        let document = Document::new()
            .with("Billing Amount", Value::Float(amount))
            .with("Deposit", Value::Float(midrange));
        let text = document.to_json_string().unwrap();
        let restored = Document::from_json_str(&text).unwrap();
        prop_assert_eq!(restored.get("Billing Amount"), Some(&Value::Float(amount)));
        prop_assert_eq!(restored.get("Deposit"), Some(&Value::Float(midrange)));
    }

    #[test]
    fn prop_document_keeps_key_order(keys in prop::collection::hash_set("[a-z]{1,8}", 1..12)) {
        let keys: Vec<String> = keys.into_iter().collect();
        let mut document = Document::new();
        for (i, key) in keys.iter().enumerate() {
            document.insert(key.as_str(), Value::Int(i64::try_from(i).unwrap()));
        }
        let stored: Vec<&str> = document.keys().collect();
        let expected: Vec<&str> = keys.iter().map(String::as_str).collect();
        prop_assert_eq!(stored, expected);
    }
}
