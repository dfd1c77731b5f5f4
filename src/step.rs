//! Scenario steps.
//!
//! In memory a [`Step`] is a delay plus a [`StepAction`] sum type, so each kind
//! carries exactly its own payload. The editing document shape
//! (`{type, delay_ms, data: {<kind>: {...}}}`) is produced and consumed by
//! the private `StepRecord`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::coerce::{lenient, parse_u32_or};
use crate::error::EditError;
use crate::limits::{push_limited, MAX_WAIT_REQUIREMENTS};
use crate::reorder::remove_at;
use crate::types::{ConditionMode, StepKind};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttPublish {
    #[serde(deserialize_with = "lenient::string")]
    pub topic: String,
    #[serde(deserialize_with = "lenient::string")]
    pub payload: String,
    #[serde(deserialize_with = "lenient::u8")]
    pub qos: u8,
    #[serde(deserialize_with = "lenient::boolean")]
    pub retain: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioPlay {
    #[serde(deserialize_with = "lenient::string")]
    pub track: String,
    #[serde(deserialize_with = "lenient::boolean")]
    pub blocking: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetFlag {
    #[serde(deserialize_with = "lenient::string")]
    pub flag: String,
    #[serde(deserialize_with = "lenient::boolean")]
    pub value: bool,
}

/// One flag a `wait_flags` step waits on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagRequirement {
    #[serde(deserialize_with = "lenient::string")]
    pub flag: String,
    #[serde(deserialize_with = "lenient::boolean")]
    pub required_state: bool,
}

impl Default for FlagRequirement {
    fn default() -> Self {
        Self {
            flag: String::new(),
            required_state: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitFlags {
    pub mode: ConditionMode,
    #[serde(deserialize_with = "lenient::u32")]
    pub timeout_ms: u32,
    #[serde(deserialize_with = "lenient::seq")]
    pub requirements: Vec<FlagRequirement>,
}

impl WaitFlags {
    pub fn add_requirement(&mut self) -> Result<usize, EditError> {
        push_limited(
            &mut self.requirements,
            FlagRequirement::default(),
            MAX_WAIT_REQUIREMENTS,
            "Wait rule",
        )
    }

    pub fn remove_requirement(&mut self, index: usize) -> bool {
        remove_at(&mut self.requirements, index)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopControl {
    #[serde(deserialize_with = "lenient::u32")]
    pub target_step: u32,
    #[serde(deserialize_with = "lenient::u32")]
    pub max_iterations: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventEmit {
    #[serde(deserialize_with = "lenient::string")]
    pub event: String,
    #[serde(deserialize_with = "lenient::string")]
    pub topic: String,
    #[serde(deserialize_with = "lenient::string")]
    pub payload: String,
}

/// What a step does, with the payload that kind needs
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    MqttPublish(MqttPublish),
    AudioPlay(AudioPlay),
    AudioStop,
    SetFlag(SetFlag),
    WaitFlags(WaitFlags),
    Loop(LoopControl),
    Delay,
    Event(EventEmit),
    Nop,
    /// Loaded without a recognisable type; fails validation and saves as `nop`
    Untyped,
}

impl StepAction {
    /// Default payload for `kind`
    pub fn default_for(kind: StepKind) -> Self {
        match kind {
            StepKind::MqttPublish => Self::MqttPublish(MqttPublish::default()),
            StepKind::AudioPlay => Self::AudioPlay(AudioPlay::default()),
            StepKind::AudioStop => Self::AudioStop,
            StepKind::SetFlag => Self::SetFlag(SetFlag::default()),
            StepKind::WaitFlags => Self::WaitFlags(WaitFlags::default()),
            StepKind::Loop => Self::Loop(LoopControl::default()),
            StepKind::Delay => Self::Delay,
            StepKind::Event => Self::Event(EventEmit::default()),
            StepKind::Nop => Self::Nop,
        }
    }

    pub fn kind(&self) -> Option<StepKind> {
        Some(match self {
            Self::MqttPublish(_) => StepKind::MqttPublish,
            Self::AudioPlay(_) => StepKind::AudioPlay,
            Self::AudioStop => StepKind::AudioStop,
            Self::SetFlag(_) => StepKind::SetFlag,
            Self::WaitFlags(_) => StepKind::WaitFlags,
            Self::Loop(_) => StepKind::Loop,
            Self::Delay => StepKind::Delay,
            Self::Event(_) => StepKind::Event,
            Self::Nop => StepKind::Nop,
            Self::Untyped => return None,
        })
    }
}

/// One step of a scenario
///
/// A stored entry that is not a decodable object reads as [`StepAction::Untyped`]
/// so it keeps its slot; loop targets are step indices.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "StepRecord")]
pub struct Step {
    pub delay_ms: u32,
    pub action: StepAction,
}

impl Default for Step {
    /// A fresh step as the editor adds it: an empty MQTT publish.
    fn default() -> Self {
        Self::new(StepKind::MqttPublish)
    }
}

impl Step {
    pub fn new(kind: StepKind) -> Self {
        Self {
            delay_ms: 0,
            action: StepAction::default_for(kind),
        }
    }

    pub fn mqtt(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            action: StepAction::MqttPublish(MqttPublish {
                topic: topic.into(),
                payload: payload.into(),
                ..MqttPublish::default()
            }),
        }
    }

    pub fn audio(track: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            action: StepAction::AudioPlay(AudioPlay {
                track: track.into(),
                blocking: false,
            }),
        }
    }

    pub fn delay(delay_ms: u32) -> Self {
        Self {
            delay_ms,
            action: StepAction::Delay,
        }
    }

    pub fn kind(&self) -> Option<StepKind> {
        self.action.kind()
    }

    /// Change the step's kind. The payload resets to the new kind's defaults;
    /// re-selecting the current kind changes nothing.
    pub fn set_kind(&mut self, kind: StepKind) -> bool {
        if self.kind() == Some(kind) {
            return false;
        }
        self.action = StepAction::default_for(kind);
        true
    }

    /// Delay from a form field; unparsable or negative input stores 0.
    pub fn set_delay_input(&mut self, input: &str) {
        self.delay_ms = parse_u32_or(input, 0);
    }

    pub fn wait_flags_mut(&mut self) -> Option<&mut WaitFlags> {
        match &mut self.action {
            StepAction::WaitFlags(wait) => Some(wait),
            _ => None,
        }
    }
}

/// Editing-document shape of a step
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct StepRecord {
    #[serde(
        rename = "type",
        deserialize_with = "lenient::parsed",
        skip_serializing_if = "Option::is_none"
    )]
    kind: Option<StepKind>,
    #[serde(deserialize_with = "lenient::u32")]
    delay_ms: u32,
    #[serde(deserialize_with = "lenient::object_or_default")]
    data: StepData,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct StepData {
    #[serde(deserialize_with = "lenient::object", skip_serializing_if = "Option::is_none")]
    mqtt: Option<MqttPublish>,
    #[serde(deserialize_with = "lenient::object", skip_serializing_if = "Option::is_none")]
    audio: Option<AudioPlay>,
    #[serde(deserialize_with = "lenient::object", skip_serializing_if = "Option::is_none")]
    flag: Option<SetFlag>,
    #[serde(deserialize_with = "lenient::object", skip_serializing_if = "Option::is_none")]
    wait_flags: Option<WaitFlags>,
    #[serde(
        rename = "loop",
        deserialize_with = "lenient::object",
        skip_serializing_if = "Option::is_none"
    )]
    loop_control: Option<LoopControl>,
    #[serde(deserialize_with = "lenient::object", skip_serializing_if = "Option::is_none")]
    event: Option<EventEmit>,
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let untyped = Self {
            delay_ms: 0,
            action: StepAction::Untyped,
        };
        let value = Value::deserialize(deserializer)?;
        if !value.is_object() {
            return Ok(untyped);
        }
        match serde_json::from_value::<StepRecord>(value) {
            Ok(record) => Ok(Self::from(record)),
            Err(e) => {
                warn!(error = %e, "undecodable step kept as untyped");
                Ok(untyped)
            }
        }
    }
}

impl From<StepRecord> for Step {
    fn from(record: StepRecord) -> Self {
        let data = record.data;
        let action = match record.kind {
            Some(StepKind::MqttPublish) => StepAction::MqttPublish(data.mqtt.unwrap_or_default()),
            Some(StepKind::AudioPlay) => StepAction::AudioPlay(data.audio.unwrap_or_default()),
            Some(StepKind::AudioStop) => StepAction::AudioStop,
            Some(StepKind::SetFlag) => StepAction::SetFlag(data.flag.unwrap_or_default()),
            Some(StepKind::WaitFlags) => {
                StepAction::WaitFlags(data.wait_flags.unwrap_or_default())
            }
            Some(StepKind::Loop) => StepAction::Loop(data.loop_control.unwrap_or_default()),
            Some(StepKind::Delay) => StepAction::Delay,
            Some(StepKind::Event) => StepAction::Event(data.event.unwrap_or_default()),
            Some(StepKind::Nop) => StepAction::Nop,
            None => StepAction::Untyped,
        };
        Self {
            delay_ms: record.delay_ms,
            action,
        }
    }
}

impl From<Step> for StepRecord {
    fn from(step: Step) -> Self {
        let kind = step.kind();
        let mut data = StepData::default();
        match step.action {
            StepAction::MqttPublish(mqtt) => data.mqtt = Some(mqtt),
            StepAction::AudioPlay(audio) => data.audio = Some(audio),
            StepAction::SetFlag(flag) => data.flag = Some(flag),
            StepAction::WaitFlags(wait) => data.wait_flags = Some(wait),
            StepAction::Loop(control) => data.loop_control = Some(control),
            StepAction::Event(event) => data.event = Some(event),
            StepAction::AudioStop | StepAction::Delay | StepAction::Nop | StepAction::Untyped => {}
        }
        Self {
            kind,
            delay_ms: step.delay_ms,
            data,
        }
    }
}
