//! Device templates and their registry of defaults.
//!
//! A [`Template`] names its kind and carries one optional sub-object per
//! kind. Only the sub-object that matches `kind` is meaningful; the others are
//! kept untouched so switching back and forth in the editor loses nothing
//! until the document is saved.
//!
//! # Repair
//!
//! Field-level repair (wrong-typed or missing values) happens during
//! deserialization through the `lenient` helpers, so every decoded template
//! body is already well-typed. The `ensure_*` functions only have to make sure
//! the active sub-object exists, which makes them cheap and idempotent.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::coerce::{clamp_u32, lenient, parse_int, parse_u32_or, uint_of};
use crate::error::EditError;
use crate::limits::{
    push_limited, MAX_CONDITION_RULES, MAX_FLAG_RULES, MAX_MQTT_RULES, MAX_SEQUENCE_STEPS,
    MAX_UID_SLOTS,
};
use crate::model::Device;
use crate::reorder::remove_at;
use crate::types::{ConditionMode, TemplateKind};

pub const DEFAULT_INTERVAL_MS: u32 = 1000;

/// Behavioural template attached to a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "type")]
    pub kind: TemplateKind,
    #[serde(default, deserialize_with = "lenient::object", skip_serializing_if = "Option::is_none")]
    pub uid: Option<UidTemplate>,
    #[serde(default, deserialize_with = "lenient::object", skip_serializing_if = "Option::is_none")]
    pub signal: Option<SignalHoldTemplate>,
    #[serde(default, deserialize_with = "lenient::object", skip_serializing_if = "Option::is_none")]
    pub mqtt: Option<MqttTriggerTemplate>,
    #[serde(default, deserialize_with = "lenient::object", skip_serializing_if = "Option::is_none")]
    pub flag: Option<FlagTriggerTemplate>,
    #[serde(default, deserialize_with = "lenient::object", skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionTemplate>,
    #[serde(default, deserialize_with = "lenient::object", skip_serializing_if = "Option::is_none")]
    pub interval: Option<IntervalTemplate>,
    #[serde(default, deserialize_with = "lenient::object", skip_serializing_if = "Option::is_none")]
    pub sequence: Option<SequenceTemplate>,
}

impl Template {
    /// A fresh template of `kind` with its default body.
    pub fn new(kind: TemplateKind) -> Self {
        let mut template = Self {
            kind,
            uid: None,
            signal: None,
            mqtt: None,
            flag: None,
            condition: None,
            interval: None,
            sequence: None,
        };
        template.ensure_body();
        template
    }

    /// Create the active sub-object if it is missing. Returns true if it was.
    pub fn ensure_body(&mut self) -> bool {
        match self.kind {
            TemplateKind::UidValidator => fill(&mut self.uid),
            TemplateKind::SignalHold => fill(&mut self.signal),
            TemplateKind::OnMqttEvent => fill(&mut self.mqtt),
            TemplateKind::OnFlag => fill(&mut self.flag),
            TemplateKind::IfCondition => fill(&mut self.condition),
            TemplateKind::IntervalTask => fill(&mut self.interval),
            TemplateKind::SequenceLock => fill(&mut self.sequence),
        }
    }
}

fn fill<T: Default>(slot: &mut Option<T>) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(T::default());
    true
}

/// One sub-object of a [`Template`], addressable generically by kind
pub trait TemplateBody: Default {
    const KIND: TemplateKind;
    fn slot(template: &mut Template) -> &mut Option<Self>;
}

macro_rules! template_body {
    ($body:ty, $kind:ident, $field:ident) => {
        impl TemplateBody for $body {
            const KIND: TemplateKind = TemplateKind::$kind;
            fn slot(template: &mut Template) -> &mut Option<Self> {
                &mut template.$field
            }
        }
    };
}

template_body!(UidTemplate, UidValidator, uid);
template_body!(SignalHoldTemplate, SignalHold, signal);
template_body!(MqttTriggerTemplate, OnMqttEvent, mqtt);
template_body!(FlagTriggerTemplate, OnFlag, flag);
template_body!(ConditionTemplate, IfCondition, condition);
template_body!(IntervalTemplate, IntervalTask, interval);
template_body!(SequenceTemplate, SequenceLock, sequence);

// ============================================================================
// Template bodies
// ============================================================================

/// RFID/UID reader slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UidSlot {
    #[serde(deserialize_with = "lenient::string")]
    pub source_id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub label: String,
    #[serde(deserialize_with = "lenient::strings")]
    pub values: Vec<String>,
    /// Last reading reported by the device; never written back
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_value: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UidSlot {
    /// Replace the accepted values from a comma-separated form field.
    pub fn set_values_input(&mut self, input: &str) {
        self.values = input
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
    }

    pub fn values_display(&self) -> String {
        self.values.join(", ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UidTemplate {
    #[serde(deserialize_with = "lenient::seq")]
    pub slots: Vec<UidSlot>,
    #[serde(deserialize_with = "lenient::string")]
    pub start_topic: String,
    #[serde(deserialize_with = "lenient::string")]
    pub start_payload: String,
    #[serde(deserialize_with = "lenient::string")]
    pub broadcast_topic: String,
    #[serde(deserialize_with = "lenient::string")]
    pub broadcast_payload: String,
    #[serde(deserialize_with = "lenient::string")]
    pub success_topic: String,
    #[serde(deserialize_with = "lenient::string")]
    pub success_payload: String,
    #[serde(deserialize_with = "lenient::string")]
    pub success_audio_track: String,
    #[serde(deserialize_with = "lenient::string")]
    pub fail_topic: String,
    #[serde(deserialize_with = "lenient::string")]
    pub fail_payload: String,
    #[serde(deserialize_with = "lenient::string")]
    pub fail_audio_track: String,
}

/// Which duration of a signal-hold template a form input targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDuration {
    SignalOn,
    RequiredHold,
    HeartbeatTimeout,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalHoldTemplate {
    #[serde(deserialize_with = "lenient::string")]
    pub signal_topic: String,
    #[serde(deserialize_with = "lenient::string")]
    pub signal_payload_on: String,
    #[serde(deserialize_with = "lenient::string")]
    pub signal_payload_off: String,
    #[serde(deserialize_with = "lenient::u32")]
    pub signal_on_ms: u32,
    #[serde(deserialize_with = "lenient::string")]
    pub heartbeat_topic: String,
    #[serde(deserialize_with = "lenient::string")]
    pub reset_topic: String,
    #[serde(deserialize_with = "lenient::u32")]
    pub required_hold_ms: u32,
    #[serde(deserialize_with = "lenient::u32")]
    pub heartbeat_timeout_ms: u32,
    #[serde(deserialize_with = "lenient::string")]
    pub hold_track: String,
    #[serde(deserialize_with = "lenient::boolean")]
    pub hold_track_loop: bool,
    #[serde(deserialize_with = "lenient::string")]
    pub complete_track: String,
}

impl SignalHoldTemplate {
    /// Unparsable or negative input stores 0.
    pub fn set_duration_input(&mut self, field: SignalDuration, input: &str) {
        let value = parse_u32_or(input, 0);
        match field {
            SignalDuration::SignalOn => self.signal_on_ms = value,
            SignalDuration::RequiredHold => self.required_hold_ms = value,
            SignalDuration::HeartbeatTimeout => self.heartbeat_timeout_ms = value,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttRule {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub topic: String,
    #[serde(deserialize_with = "lenient::string")]
    pub payload: String,
    #[serde(deserialize_with = "lenient::boolean")]
    pub payload_required: bool,
    #[serde(deserialize_with = "lenient::string")]
    pub scenario: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttTriggerTemplate {
    #[serde(deserialize_with = "lenient::seq")]
    pub rules: Vec<MqttRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagRule {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub flag: String,
    #[serde(deserialize_with = "lenient::string")]
    pub scenario: String,
    #[serde(deserialize_with = "lenient::boolean_or_true")]
    pub required_state: bool,
}

impl Default for FlagRule {
    fn default() -> Self {
        Self {
            name: String::new(),
            flag: String::new(),
            scenario: String::new(),
            required_state: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagTriggerTemplate {
    #[serde(deserialize_with = "lenient::seq")]
    pub rules: Vec<FlagRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionRule {
    #[serde(deserialize_with = "lenient::string")]
    pub flag: String,
    #[serde(deserialize_with = "lenient::boolean_or_true")]
    pub required_state: bool,
}

impl Default for ConditionRule {
    fn default() -> Self {
        Self {
            flag: String::new(),
            required_state: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionTemplate {
    pub mode: ConditionMode,
    #[serde(deserialize_with = "lenient::seq")]
    pub rules: Vec<ConditionRule>,
    #[serde(deserialize_with = "lenient::string")]
    pub true_scenario: String,
    #[serde(deserialize_with = "lenient::string")]
    pub false_scenario: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalTemplate {
    #[serde(deserialize_with = "interval_ms")]
    pub interval_ms: u32,
    #[serde(deserialize_with = "lenient::string")]
    pub scenario: String,
}

impl Default for IntervalTemplate {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            scenario: String::new(),
        }
    }
}

impl IntervalTemplate {
    /// Unparsable input falls back to the default interval; the minimum is 1 ms.
    pub fn set_interval_input(&mut self, input: &str) {
        self.interval_ms = parse_int(input).map_or(DEFAULT_INTERVAL_MS, |v| clamp_u32(v.max(1)));
    }
}

fn interval_ms<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(uint_of(&value).map_or(DEFAULT_INTERVAL_MS, |v| v.min(u64::from(u32::MAX)) as u32))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceStep {
    #[serde(deserialize_with = "lenient::string")]
    pub topic: String,
    #[serde(deserialize_with = "lenient::string")]
    pub payload: String,
    #[serde(deserialize_with = "lenient::boolean")]
    pub payload_required: bool,
    #[serde(deserialize_with = "lenient::string")]
    pub hint_topic: String,
    #[serde(deserialize_with = "lenient::string")]
    pub hint_payload: String,
    #[serde(deserialize_with = "lenient::string")]
    pub hint_audio_track: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceTemplate {
    #[serde(deserialize_with = "lenient::seq")]
    pub steps: Vec<SequenceStep>,
    #[serde(deserialize_with = "lenient::u32")]
    pub timeout_ms: u32,
    #[serde(deserialize_with = "lenient::boolean_or_true")]
    pub reset_on_error: bool,
    #[serde(deserialize_with = "lenient::string")]
    pub success_topic: String,
    #[serde(deserialize_with = "lenient::string")]
    pub success_payload: String,
    #[serde(deserialize_with = "lenient::string")]
    pub success_audio_track: String,
    #[serde(deserialize_with = "lenient::string")]
    pub success_scenario: String,
    #[serde(deserialize_with = "lenient::string")]
    pub fail_topic: String,
    #[serde(deserialize_with = "lenient::string")]
    pub fail_payload: String,
    #[serde(deserialize_with = "lenient::string")]
    pub fail_audio_track: String,
    #[serde(deserialize_with = "lenient::string")]
    pub fail_scenario: String,
}

impl Default for SequenceTemplate {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            timeout_ms: 0,
            reset_on_error: true,
            success_topic: String::new(),
            success_payload: String::new(),
            success_audio_track: String::new(),
            success_scenario: String::new(),
            fail_topic: String::new(),
            fail_payload: String::new(),
            fail_audio_track: String::new(),
            fail_scenario: String::new(),
        }
    }
}

impl SequenceTemplate {
    pub fn set_timeout_input(&mut self, input: &str) {
        self.timeout_ms = parse_u32_or(input, 0);
    }
}

// ============================================================================
// Registry operations on a device
// ============================================================================

/// Default template of the given kind
pub fn default_template(kind: TemplateKind) -> Template {
    Template::new(kind)
}

/// The active body of type `B`, created if missing.
///
/// Fails when the device carries no template or one of another kind.
pub fn template_body_mut<B: TemplateBody>(device: &mut Device) -> Result<&mut B, EditError> {
    match device.template.as_mut() {
        Some(template) if template.kind == B::KIND => {
            Ok(B::slot(template).get_or_insert_with(B::default))
        }
        other => Err(EditError::TemplateMismatch {
            expected: B::KIND,
            found: other.map(|t| t.kind),
        }),
    }
}

/// Make sure the device's active template body exists. No-op without a template.
pub fn ensure_template(device: &mut Device) {
    if let Some(template) = device.template.as_mut() {
        if template.ensure_body() {
            debug!(device = %device.id, kind = %template.kind, "filled missing template body");
        }
    }
}

pub fn ensure_uid_template(device: &mut Device) -> Option<&mut UidTemplate> {
    template_body_mut(device).ok()
}

pub fn ensure_signal_template(device: &mut Device) -> Option<&mut SignalHoldTemplate> {
    template_body_mut(device).ok()
}

pub fn ensure_mqtt_template(device: &mut Device) -> Option<&mut MqttTriggerTemplate> {
    template_body_mut(device).ok()
}

pub fn ensure_flag_template(device: &mut Device) -> Option<&mut FlagTriggerTemplate> {
    template_body_mut(device).ok()
}

pub fn ensure_condition_template(device: &mut Device) -> Option<&mut ConditionTemplate> {
    template_body_mut(device).ok()
}

pub fn ensure_interval_template(device: &mut Device) -> Option<&mut IntervalTemplate> {
    template_body_mut(device).ok()
}

pub fn ensure_sequence_template(device: &mut Device) -> Option<&mut SequenceTemplate> {
    template_body_mut(device).ok()
}

/// Switch the device to the template named `type_name`.
///
/// An empty or unknown name removes the template. Selecting the kind the
/// device already has keeps its contents. Returns true if anything changed.
pub fn set_device_template(device: &mut Device, type_name: &str) -> bool {
    let Ok(kind) = type_name.parse::<TemplateKind>() else {
        let had_template = device.template.is_some();
        device.set_template(None);
        return had_template;
    };
    if device.template.as_ref().is_some_and(|t| t.kind == kind) {
        return device.template.as_mut().is_some_and(Template::ensure_body);
    }
    debug!(device = %device.id, %kind, "switching template");
    device.set_template(Some(Template::new(kind)));
    true
}

/// Bounded lists inside template bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateList {
    UidSlots,
    MqttRules,
    FlagRules,
    ConditionRules,
    SequenceSteps,
}

impl TemplateList {
    pub fn limit(&self) -> usize {
        match self {
            Self::UidSlots => MAX_UID_SLOTS,
            Self::MqttRules => MAX_MQTT_RULES,
            Self::FlagRules => MAX_FLAG_RULES,
            Self::ConditionRules => MAX_CONDITION_RULES,
            Self::SequenceSteps => MAX_SEQUENCE_STEPS,
        }
    }
}

/// Append a default entry to one of the template's lists.
///
/// New MQTT rules require a payload match; new flag and condition rules
/// require the flag to be set.
pub fn add_template_entry(device: &mut Device, list: TemplateList) -> Result<usize, EditError> {
    let limit = list.limit();
    match list {
        TemplateList::UidSlots => {
            let body = template_body_mut::<UidTemplate>(device)?;
            push_limited(&mut body.slots, UidSlot::default(), limit, "UID slot")
        }
        TemplateList::MqttRules => {
            let body = template_body_mut::<MqttTriggerTemplate>(device)?;
            let rule = MqttRule {
                payload_required: true,
                ..MqttRule::default()
            };
            push_limited(&mut body.rules, rule, limit, "MQTT rule")
        }
        TemplateList::FlagRules => {
            let body = template_body_mut::<FlagTriggerTemplate>(device)?;
            push_limited(&mut body.rules, FlagRule::default(), limit, "Flag rule")
        }
        TemplateList::ConditionRules => {
            let body = template_body_mut::<ConditionTemplate>(device)?;
            push_limited(&mut body.rules, ConditionRule::default(), limit, "Condition")
        }
        TemplateList::SequenceSteps => {
            let body = template_body_mut::<SequenceTemplate>(device)?;
            push_limited(&mut body.steps, SequenceStep::default(), limit, "Step")
        }
    }
}

/// Remove entry `index` from one of the template's lists.
///
/// Out-of-range indices and mismatched templates are a no-op.
pub fn remove_template_entry(device: &mut Device, list: TemplateList, index: usize) -> bool {
    match list {
        TemplateList::UidSlots => template_body_mut::<UidTemplate>(device)
            .is_ok_and(|body| remove_at(&mut body.slots, index)),
        TemplateList::MqttRules => template_body_mut::<MqttTriggerTemplate>(device)
            .is_ok_and(|body| remove_at(&mut body.rules, index)),
        TemplateList::FlagRules => template_body_mut::<FlagTriggerTemplate>(device)
            .is_ok_and(|body| remove_at(&mut body.rules, index)),
        TemplateList::ConditionRules => template_body_mut::<ConditionTemplate>(device)
            .is_ok_and(|body| remove_at(&mut body.rules, index)),
        TemplateList::SequenceSteps => template_body_mut::<SequenceTemplate>(device)
            .is_ok_and(|body| remove_at(&mut body.steps, index)),
    }
}
