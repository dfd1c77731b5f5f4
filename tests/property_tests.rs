//! Property-Based Tests for the device wizard
//!
//! Uses proptest for testing invariants over arbitrary input
//!
//! These tests verify:
//! - Reorder laws (permutation, no-op drops)
//! - Migration and ensure idempotence
//! - Validation determinism
//! - Load normalization never fails on arbitrary JSON

use proptest::prelude::*;
use serde_json::{json, Map, Value};

use device_wizard::coerce::parse_int;
use device_wizard::model::Device;
use device_wizard::templates::{ensure_template, Template};
use device_wizard::{
    normalize_loaded_config, normalize_step_for_editing, prepare_config_for_save, reorder,
    validate, TemplateKind,
};

// =============================================================================
// Strategies
// =============================================================================

/// Arbitrary JSON, small enough to keep cases fast
fn json_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        "[a-z0-9 ]{0,6}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>())),
        ]
    })
}

/// Scalars that legacy editors stored in step fields
fn loose_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-5i64..5000).prop_map(Value::from),
        "[a-z/]{0,8}".prop_map(Value::String),
    ]
}

fn step_type() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!("mqtt_publish")),
        Just(json!("audio_play")),
        Just(json!("audio_stop")),
        Just(json!("set_flag")),
        Just(json!("wait_flags")),
        Just(json!("loop")),
        Just(json!("delay")),
        Just(json!("event")),
        Just(json!("nop")),
        Just(json!("unknown")),
        Just(Value::Null),
    ]
}

/// Steps in a mix of legacy flat and nested shapes
fn legacy_step() -> impl Strategy<Value = Value> {
    (
        step_type(),
        loose_scalar(),
        loose_scalar(),
        loose_scalar(),
        prop::collection::vec((loose_scalar(), loose_scalar(), any::<bool>()), 0..3),
        prop::option::of(json_strategy()),
    )
        .prop_map(|(kind, a, b, c, reqs, data)| {
            let requirements: Vec<Value> = reqs
                .into_iter()
                .map(|(flag, state, use_new_key)| {
                    if use_new_key {
                        json!({"flag": flag, "required_state": state})
                    } else {
                        json!({"flag": flag, "state": state})
                    }
                })
                .collect();
            let mut step = json!({
                "type": kind,
                "topic": a.clone(),
                "payload": b.clone(),
                "qos": c.clone(),
                "track": a.clone(),
                "flag": b,
                "event": c.clone(),
                "wait": {"mode": a, "timeout_ms": c.clone(), "requirements": requirements},
                "loop": {"target_step": c.clone(), "max_iterations": c},
            });
            if let Some(data) = data {
                step["data"] = data;
            }
            step
        })
}

fn template_kind() -> impl Strategy<Value = TemplateKind> {
    prop_oneof![
        Just(TemplateKind::UidValidator),
        Just(TemplateKind::SignalHold),
        Just(TemplateKind::OnMqttEvent),
        Just(TemplateKind::OnFlag),
        Just(TemplateKind::IfCondition),
        Just(TemplateKind::IntervalTask),
        Just(TemplateKind::SequenceLock),
    ]
}

// =============================================================================
// Reorder Property Tests
// =============================================================================

proptest! {
    /// Reorder: output is always a permutation of the input
    #[test]
    fn reorder_is_permutation(items in prop::collection::vec(any::<u8>(), 0..12), from in 0usize..16, to in 0usize..16) {
        let out = reorder(&items, from, to);
        let mut expected = items.clone();
        let mut actual = out.clone();
        expected.sort_unstable();
        actual.sort_unstable();
        prop_assert_eq!(expected, actual);
    }

    /// Reorder: dropping on yourself or right after yourself is a no-op
    #[test]
    fn reorder_self_drop_is_noop(items in prop::collection::vec(any::<u8>(), 1..12), seed in any::<usize>()) {
        let i = seed % items.len();
        prop_assert_eq!(reorder(&items, i, i), items.clone());
        prop_assert_eq!(reorder(&items, i, i + 1), items.clone());
    }

    /// Reorder: the moved element ends up where it was dropped
    #[test]
    fn reorder_places_moved_item(len in 2usize..10, from_seed in any::<usize>(), to_seed in any::<usize>()) {
        let items: Vec<usize> = (0..len).collect();
        let from = from_seed % len;
        let to = to_seed % (len + 1);
        let out = reorder(&items, from, to);
        let landed = if from < to { to - 1 } else { to };
        if to != from && to != from + 1 {
            prop_assert_eq!(out[landed], from);
        }
    }
}

// =============================================================================
// Migration / Ensure Property Tests
// =============================================================================

proptest! {
    /// Migration: applying twice equals applying once
    #[test]
    fn migration_is_idempotent(step in legacy_step()) {
        let once = normalize_step_for_editing(&step);
        let twice = normalize_step_for_editing(&once);
        prop_assert_eq!(once, twice);
    }

    /// Migration: arbitrary JSON never panics and stays idempotent
    #[test]
    fn migration_total_on_arbitrary_json(value in json_strategy()) {
        let once = normalize_step_for_editing(&value);
        prop_assert_eq!(normalize_step_for_editing(&once), once);
    }

    /// Ensure: calling twice yields the same device as calling once
    #[test]
    fn ensure_is_idempotent(kind in template_kind(), body in json_strategy()) {
        let raw = json!({"type": kind.to_string(), kind_key(kind): body});
        let template: Template = serde_json::from_value(raw).unwrap();
        let mut device = Device { id: "d".into(), template: Some(template), ..Device::default() };
        ensure_template(&mut device);
        let once = device.clone();
        ensure_template(&mut device);
        prop_assert_eq!(once, device);
    }

    /// parse_int: decimal strings with trailing junk parse to their prefix
    #[test]
    fn parse_int_reads_prefix(n in -1_000_000i64..1_000_000, junk in "[a-z.]{0,4}") {
        prop_assert_eq!(parse_int(&format!("{n}{junk}")), Some(n));
    }
}

fn kind_key(kind: TemplateKind) -> &'static str {
    match kind {
        TemplateKind::UidValidator => "uid",
        TemplateKind::SignalHold => "signal",
        TemplateKind::OnMqttEvent => "mqtt",
        TemplateKind::OnFlag => "flag",
        TemplateKind::IfCondition => "condition",
        TemplateKind::IntervalTask => "interval",
        TemplateKind::SequenceLock => "sequence",
    }
}

// =============================================================================
// Load / Validate Property Tests
// =============================================================================

proptest! {
    /// Load: arbitrary documents normalize and save without failing
    #[test]
    fn load_and_save_are_total(devices in prop::collection::vec(json_strategy(), 0..4)) {
        let config = normalize_loaded_config(json!({"devices": devices}));
        let payload = prepare_config_for_save(&config);
        prop_assert_eq!(payload.devices.len(), config.devices.len());
        prop_assert!(serde_json::to_value(&payload).is_ok());
    }

    /// Validation: same input, same messages in the same order
    #[test]
    fn validation_is_deterministic(devices in prop::collection::vec(json_strategy(), 0..4), steps in prop::collection::vec(legacy_step(), 0..6)) {
        let mut raw = json!({"devices": devices});
        raw["devices"].as_array_mut().unwrap().push(json!({
            "id": "",
            "scenarios": [{"id": "s", "steps": steps}]
        }));
        let config = normalize_loaded_config(raw);
        let first = validate(&config.devices);
        let second = validate(&config.devices);
        prop_assert_eq!(first.messages.len(), first.fields.len());
        prop_assert_eq!(first, second);
    }

    /// Load → save → load keeps the same editing model
    #[test]
    fn save_then_load_is_stable(steps in prop::collection::vec(legacy_step(), 0..6)) {
        let config = normalize_loaded_config(json!({
            "devices": [{"id": "d", "display_name": "D", "scenarios": [{"id": "s", "name": "S", "steps": steps}]}]
        }));
        let saved = serde_json::to_value(prepare_config_for_save(&config)).unwrap();
        let reloaded = normalize_loaded_config(saved.clone());
        let resaved = serde_json::to_value(prepare_config_for_save(&reloaded)).unwrap();
        prop_assert_eq!(saved, resaved);
    }
}
