//! Legacy step migration.
//!
//! Older editors stored step payloads flat on the step (`step.topic`,
//! `step.track`) or under ad-hoc keys (`step.wait`, `step.loop`). The current
//! shape nests every payload under `data.<kind>`. [`normalize_step_for_editing`]
//! moves legacy values into the nested shape at the load boundary, so nothing
//! after load ever looks at the legacy keys.
//!
//! # Design
//!
//! The mapping is a static table: one [`Migration`] per step kind, each
//! listing canonical fields, where the legacy value lives, and how it is
//! coerced. Only fields missing from the nested payload are filled, which
//! makes the pass idempotent.

use serde_json::{Map, Value};

use crate::coerce::{is_truthy, text_of};
use crate::types::StepKind;

/// Where a legacy value was stored on the step
#[derive(Debug, Clone, Copy)]
enum Legacy {
    /// `step.<key>`
    Flat(&'static str),
    /// `step.<outer>.<key>`
    Nested(&'static str, &'static str),
}

/// How a legacy value is coerced into the canonical field
#[derive(Debug, Clone, Copy)]
enum Fill {
    /// Truthy scalars as text, otherwise `""`
    Text,
    /// Truthiness as a boolean
    Truthy,
    /// Numbers kept as-is, anything else 0
    Number,
    /// Truthy values kept as-is, otherwise the given default
    TruthyOr(&'static str),
    /// Truthy values kept as-is, otherwise 0
    TruthyOrZero,
}

struct Field {
    name: &'static str,
    source: Legacy,
    fill: Fill,
}

struct Migration {
    kind: StepKind,
    data_key: &'static str,
    fields: &'static [Field],
}

const fn field(name: &'static str, source: Legacy, fill: Fill) -> Field {
    Field { name, source, fill }
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        kind: StepKind::MqttPublish,
        data_key: "mqtt",
        fields: &[
            field("topic", Legacy::Flat("topic"), Fill::Text),
            field("payload", Legacy::Flat("payload"), Fill::Text),
            field("qos", Legacy::Flat("qos"), Fill::Number),
            field("retain", Legacy::Flat("retain"), Fill::Truthy),
        ],
    },
    Migration {
        kind: StepKind::AudioPlay,
        data_key: "audio",
        fields: &[
            field("track", Legacy::Flat("track"), Fill::Text),
            field("blocking", Legacy::Flat("blocking"), Fill::Truthy),
        ],
    },
    Migration {
        kind: StepKind::SetFlag,
        data_key: "flag",
        fields: &[
            field("flag", Legacy::Flat("flag"), Fill::Text),
            field("value", Legacy::Flat("value"), Fill::Truthy),
        ],
    },
    Migration {
        kind: StepKind::WaitFlags,
        data_key: "wait_flags",
        fields: &[
            field("mode", Legacy::Nested("wait", "mode"), Fill::TruthyOr("all")),
            field("timeout_ms", Legacy::Nested("wait", "timeout_ms"), Fill::TruthyOrZero),
        ],
    },
    Migration {
        kind: StepKind::Loop,
        data_key: "loop",
        fields: &[
            field("target_step", Legacy::Nested("loop", "target_step"), Fill::Number),
            field("max_iterations", Legacy::Nested("loop", "max_iterations"), Fill::Number),
        ],
    },
    Migration {
        kind: StepKind::Event,
        data_key: "event",
        fields: &[
            field("event", Legacy::Flat("event"), Fill::Text),
            field("topic", Legacy::Flat("topic"), Fill::Text),
            field("payload", Legacy::Flat("payload"), Fill::Text),
        ],
    },
];

fn migration_for(kind: StepKind) -> Option<&'static Migration> {
    MIGRATIONS.iter().find(|m| m.kind == kind)
}

fn legacy_value<'a>(step: &'a Map<String, Value>, source: Legacy) -> Option<&'a Value> {
    match source {
        Legacy::Flat(key) => step.get(key),
        Legacy::Nested(outer, key) => step.get(outer).and_then(|o| o.get(key)),
    }
}

fn coerce(value: Option<&Value>, fill: Fill) -> Value {
    let truthy = value.is_some_and(is_truthy);
    match fill {
        Fill::Text => Value::String(value.filter(|_| truthy).map(text_of).unwrap_or_default()),
        Fill::Truthy => Value::Bool(truthy),
        Fill::Number => value.filter(|v| v.is_number()).cloned().unwrap_or(Value::from(0)),
        Fill::TruthyOr(default) => match value {
            Some(v) if truthy => v.clone(),
            _ => Value::from(default),
        },
        Fill::TruthyOrZero => match value {
            Some(v) if truthy => v.clone(),
            _ => Value::from(0),
        },
    }
}

/// Convert a raw step from any historical shape into the nested shape.
///
/// Non-object input is returned unchanged. A non-object `data` (or kind
/// payload) is replaced by an empty object. Legacy keys are left in place;
/// they are ignored once the step is decoded. Applying the function twice
/// yields the same value as applying it once.
pub fn normalize_step_for_editing(step: &Value) -> Value {
    let Value::Object(source) = step else {
        return step.clone();
    };
    let mut out = source.clone();
    let mut data = match out.remove("data") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    let kind = source
        .get("type")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<StepKind>().ok());

    if let Some(migration) = kind.and_then(migration_for) {
        let payload = data
            .entry(migration.data_key)
            .or_insert_with(|| Value::Object(Map::new()));
        if !payload.is_object() {
            *payload = Value::Object(Map::new());
        }
        if let Value::Object(payload) = payload {
            for field in migration.fields {
                if !payload.contains_key(field.name) {
                    let value = coerce(legacy_value(source, field.source), field.fill);
                    payload.insert(field.name.to_string(), value);
                }
            }
            if migration.kind == StepKind::WaitFlags {
                let requirements = migrate_requirements(payload, source);
                payload.insert("requirements".to_string(), requirements);
            }
        }
    }

    out.insert("data".to_string(), Value::Object(data));
    Value::Object(out)
}

/// Requirements come from the nested list if it is an array, else from the
/// legacy `wait.requirements`. Each entry is rewritten to `{flag, required_state}`,
/// where a missing `required_state` falls back to the legacy `state`.
fn migrate_requirements(payload: &Map<String, Value>, step: &Map<String, Value>) -> Value {
    let list = payload
        .get("requirements")
        .filter(|v| v.is_array())
        .or_else(|| step.get("wait").and_then(|w| w.get("requirements")))
        .and_then(Value::as_array);
    let Some(list) = list else {
        return Value::Array(Vec::new());
    };
    list.iter()
        .map(|req| {
            let flag = req.get("flag").filter(|v| is_truthy(v)).map(text_of);
            let state = match req.get("required_state") {
                Some(v) => is_truthy(v),
                None => req.get("state").is_some_and(is_truthy),
            };
            serde_json::json!({
                "flag": flag.unwrap_or_default(),
                "required_state": state,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_mqtt_fields_move_into_data() {
        let raw = json!({"type": "mqtt_publish", "topic": "t", "payload": "p", "qos": 1, "retain": 1});
        let out = normalize_step_for_editing(&raw);
        assert_eq!(
            out["data"]["mqtt"],
            json!({"topic": "t", "payload": "p", "qos": 1, "retain": true})
        );
    }

    #[test]
    fn test_existing_nested_fields_win() {
        let raw = json!({
            "type": "audio_play",
            "track": "legacy.mp3",
            "data": {"audio": {"track": "nested.mp3"}}
        });
        let out = normalize_step_for_editing(&raw);
        assert_eq!(out["data"]["audio"], json!({"track": "nested.mp3", "blocking": false}));
    }

    #[test]
    fn test_non_number_qos_becomes_zero() {
        let raw = json!({"type": "mqtt_publish", "qos": "2"});
        let out = normalize_step_for_editing(&raw);
        assert_eq!(out["data"]["mqtt"]["qos"], json!(0));
    }

    #[test]
    fn test_wait_flags_legacy_state() {
        let raw = json!({
            "type": "wait_flags",
            "wait": {"mode": "any", "timeout_ms": 3000, "requirements": [{"flag": "door", "state": 1}, {"flag": "lamp"}]}
        });
        let out = normalize_step_for_editing(&raw);
        assert_eq!(
            out["data"]["wait_flags"],
            json!({
                "mode": "any",
                "timeout_ms": 3000,
                "requirements": [
                    {"flag": "door", "required_state": true},
                    {"flag": "lamp", "required_state": false}
                ]
            })
        );
    }

    #[test]
    fn test_wait_flags_defaults() {
        let out = normalize_step_for_editing(&json!({"type": "wait_flags"}));
        assert_eq!(
            out["data"]["wait_flags"],
            json!({"mode": "all", "timeout_ms": 0, "requirements": []})
        );
    }

    #[test]
    fn test_loop_numbers_only() {
        let raw = json!({"type": "loop", "loop": {"target_step": 2, "max_iterations": "3"}});
        let out = normalize_step_for_editing(&raw);
        assert_eq!(out["data"]["loop"], json!({"target_step": 2, "max_iterations": 0}));
    }

    #[test]
    fn test_kinds_without_payload_get_empty_data() {
        let out = normalize_step_for_editing(&json!({"type": "audio_stop", "delay_ms": 10}));
        assert_eq!(out, json!({"type": "audio_stop", "delay_ms": 10, "data": {}}));

        let out = normalize_step_for_editing(&json!({"type": "nonsense", "data": 4}));
        assert_eq!(out, json!({"type": "nonsense", "data": {}}));
    }

    #[test]
    fn test_non_object_is_untouched() {
        assert_eq!(normalize_step_for_editing(&json!("step")), json!("step"));
        assert_eq!(normalize_step_for_editing(&json!(null)), json!(null));
    }

    #[test]
    fn test_idempotent_on_legacy_event() {
        let raw = json!({"type": "event", "event": "solved", "topic": 7});
        let once = normalize_step_for_editing(&raw);
        let twice = normalize_step_for_editing(&once);
        assert_eq!(once, twice);
        assert_eq!(once["data"]["event"], json!({"event": "solved", "topic": "7", "payload": ""}));
    }
}
