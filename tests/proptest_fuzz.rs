// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Property-based tests for payload handling and derived counts.
//!
//! Uses proptest to generate random and malformed inputs and verify the model
//! never panics, only returns clean errors.
//!
//! Run with: `cargo test --test proptest_fuzz`

use chrono::Utc;
use proptest::prelude::*;
use serde_json::{json, Value};

use pizza_hunt::{NewComment, NewPizza, NewReply, PizzaSize, PizzaUpdate, PizzaView};

// =============================================================================
// Strategies for generating test data
// =============================================================================

/// Generate arbitrary JSON values (including invalid structures)
fn arbitrary_json_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        ".*".prop_map(Value::String),
    ];

    leaf.prop_recursive(
        4,  // depth
        64, // max nodes
        10, // items per collection
        |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..10).prop_map(Value::Array),
                prop::collection::hash_map(
                    prop_oneof![
                        Just("pizzaName".to_string()),
                        Just("createdBy".to_string()),
                        Just("size".to_string()),
                        Just("toppings".to_string()),
                        ".*",
                    ],
                    inner,
                    0..10
                )
                .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        },
    )
}

fn size_strategy() -> impl Strategy<Value = PizzaSize> {
    prop::sample::select(PizzaSize::ALL.to_vec())
}

/// Whitespace-only strings, empty included
fn blank_strategy() -> impl Strategy<Value = String> {
    "[ \t\n]{0,8}"
}

/// Strings with at least one visible character, padded with whitespace
fn padded_text_strategy() -> impl Strategy<Value = String> {
    ("[ \t]{0,3}", "[a-zA-Z0-9][a-zA-Z0-9 ']{0,20}", "[ \t]{0,3}")
        .prop_map(|(pre, body, post)| format!("{pre}{body}{post}"))
}

// =============================================================================
// Payload fuzzing
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn fuzz_new_pizza_from_arbitrary_json(value in arbitrary_json_strategy()) {
        // Either a clean serde error or a payload that validates cleanly.
        if let Ok(pizza) = serde_json::from_value::<NewPizza>(value) {
            let _ = pizza.validate();
        }
    }

    #[test]
    fn fuzz_update_from_arbitrary_json(value in arbitrary_json_strategy()) {
        if let Ok(update) = serde_json::from_value::<PizzaUpdate>(value) {
            let mut pizza = NewPizza::new("Base", "Owner").into_pizza(Utc::now()).unwrap();
            let before = pizza.clone();
            if update.apply(&mut pizza).is_err() {
                prop_assert_eq!(pizza, before);
            }
        }
    }

    #[test]
    fn fuzz_comment_and_reply_from_arbitrary_json(value in arbitrary_json_strategy()) {
        if let Ok(comment) = serde_json::from_value::<NewComment>(value.clone()) {
            let _ = comment.into_comment(Utc::now());
        }
        if let Ok(reply) = serde_json::from_value::<NewReply>(value) {
            let _ = reply.into_reply(Utc::now());
        }
    }
}

// =============================================================================
// Validation properties
// =============================================================================

proptest! {
    #[test]
    fn prop_blank_name_always_rejected(name in blank_strategy(), by in padded_text_strategy()) {
        let err = NewPizza::new(name, by).validate().unwrap_err();
        prop_assert_eq!(err.field, "pizzaName");
        prop_assert_eq!(err.message, "You need a name for your pizza");
    }

    #[test]
    fn prop_blank_creator_always_rejected(name in padded_text_strategy(), by in blank_strategy()) {
        let err = NewPizza::new(name, by).validate().unwrap_err();
        prop_assert_eq!(err.field, "createdBy");
    }

    #[test]
    fn prop_valid_payload_is_trimmed(
        name in padded_text_strategy(),
        by in padded_text_strategy(),
        size in size_strategy(),
        toppings in prop::collection::vec("[a-z]{1,10}", 0..6),
    ) {
        let pizza = NewPizza::new(name.clone(), by.clone())
            .with_size(size)
            .with_toppings(toppings.clone())
            .into_pizza(Utc::now())
            .unwrap();
        prop_assert_eq!(pizza.pizza_name, name.trim());
        prop_assert_eq!(pizza.created_by, by.trim());
        prop_assert_eq!(pizza.size, size);
        prop_assert_eq!(pizza.toppings, toppings);
        prop_assert!(pizza.comments.is_empty());
    }

    #[test]
    fn prop_size_wire_name_roundtrip(size in size_strategy()) {
        let wire = serde_json::to_value(size).unwrap();
        prop_assert_eq!(&wire, &json!(size.to_string()));
        prop_assert_eq!(size.to_string().to_uppercase().parse::<PizzaSize>().unwrap(), size);
    }
}

// =============================================================================
// Derived counts
// =============================================================================

proptest! {
    #[test]
    fn prop_comment_count_is_comments_plus_replies(
        reply_counts in prop::collection::vec(0usize..6, 0..8),
    ) {
        let now = Utc::now();
        let mut pizza = NewPizza::new("Counted", "Owner").into_pizza(now).unwrap();

        let comments: Vec<_> = reply_counts
            .iter()
            .enumerate()
            .map(|(i, &replies)| {
                let mut comment = NewComment::new("Writer", format!("comment {i}"))
                    .into_comment(now)
                    .unwrap();
                for r in 0..replies {
                    comment.replies.push(
                        NewReply::new("Replier", format!("reply {r}")).into_reply(now).unwrap(),
                    );
                }
                comment
            })
            .collect();
        pizza.comments = comments.iter().map(|c| c.id.clone()).collect();

        let view = PizzaView::assemble(pizza, comments);
        let expected: usize = reply_counts.iter().map(|n| n + 1).sum();
        prop_assert_eq!(view.comment_count, expected);
        for (comment, &replies) in view.comments.iter().zip(reply_counts.iter()) {
            prop_assert_eq!(comment.reply_count, replies);
        }
    }
}
