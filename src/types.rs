//! Type-safe kinds for steps, templates and condition modes
//!
//! The wire format carries these as snake_case strings. Parsing goes through
//! strum so an unrecognised string is an explicit `Err`, never a silent default.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Action performed by a scenario step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepKind {
    MqttPublish,
    AudioPlay,
    AudioStop,
    SetFlag,
    WaitFlags,
    Loop,
    Delay,
    Event,
    Nop,
}

/// Behavioural template a device can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TemplateKind {
    UidValidator,
    SignalHold,
    OnMqttEvent,
    OnFlag,
    IfCondition,
    IntervalTask,
    SequenceLock,
}

impl TemplateKind {
    /// Human-readable label for status lines and messages
    pub fn label(&self) -> &'static str {
        match self {
            Self::UidValidator => "UID validator",
            Self::SignalHold => "Signal hold",
            Self::OnMqttEvent => "MQTT trigger",
            Self::OnFlag => "Flag trigger",
            Self::IfCondition => "Condition",
            Self::IntervalTask => "Interval task",
            Self::SequenceLock => "Sequence lock",
        }
    }
}

/// How a set of flag requirements combines
///
/// Anything other than the exact string `"any"` reads as [`ConditionMode::All`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[derive(Display, EnumString, EnumIter, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConditionMode {
    #[default]
    All,
    Any,
}

impl ConditionMode {
    pub fn from_input(input: &str) -> Self {
        if input == "any" { Self::Any } else { Self::All }
    }
}

impl<'de> Deserialize<'de> for ConditionMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(value.as_str().map_or(Self::All, Self::from_input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_step_kind_wire_names() {
        assert_eq!(StepKind::MqttPublish.to_string(), "mqtt_publish");
        assert_eq!(StepKind::WaitFlags.as_ref(), "wait_flags");
        assert_eq!(StepKind::from_str("audio_stop").unwrap(), StepKind::AudioStop);
        assert!(StepKind::from_str("MQTT_PUBLISH").is_err());
        assert!(StepKind::from_str("").is_err());
    }

    #[test]
    fn test_template_kind_round_trips_through_strings() {
        for kind in TemplateKind::iter() {
            assert_eq!(TemplateKind::from_str(&kind.to_string()).unwrap(), kind);
        }
        assert_eq!(TemplateKind::iter().count(), 7);
        assert_eq!(TemplateKind::OnMqttEvent.to_string(), "on_mqtt_event");
    }

    #[test]
    fn test_serde_names_match_strum_names() {
        for kind in StepKind::iter() {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, Value::String(kind.to_string()));
        }
    }

    #[test]
    fn test_condition_mode_is_lenient() {
        let any: ConditionMode = serde_json::from_str("\"any\"").unwrap();
        let other: ConditionMode = serde_json::from_str("\"ANY\"").unwrap();
        let null: ConditionMode = serde_json::from_str("null").unwrap();
        assert_eq!(any, ConditionMode::Any);
        assert_eq!(other, ConditionMode::All);
        assert_eq!(null, ConditionMode::All);
        assert_eq!(serde_json::to_string(&ConditionMode::Any).unwrap(), "\"any\"");
    }
}
