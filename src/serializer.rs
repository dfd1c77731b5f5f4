//! Load and save transforms between the editing model and the backend shape.
//!
//! Load ([`normalize_loaded_config`]) accepts any historical document and
//! produces a typed [`DeviceConfig`]: legacy steps are migrated, loose fields
//! coerced, names mirrored and template bodies ensured.
//!
//! Save ([`prepare_config_for_save`]) produces a [`SavePayload`] in the flat
//! step shape the firmware reads. It strips runtime-only data (`last_value`,
//! `tabs`, `tab_limit`) and never mutates the editing model.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Result, WizardError};
use crate::migrate::normalize_step_for_editing;
use crate::model::{Device, DeviceConfig, ProfileSet, ProfileSummary, Scenario, Topic};
use crate::step::{Step, StepAction};
use crate::templates::{ensure_template, Template};
use crate::types::{ConditionMode, StepKind};

const STRIPPED_DEVICE_KEYS: &[&str] = &["tabs"];
const STRIPPED_CONFIG_KEYS: &[&str] = &["tab_limit"];
const DEFAULT_DEVICE_NAME: &str = "Device";
const MAX_QOS: u8 = 2;

// ============================================================================
// Load
// ============================================================================

/// Normalize a raw profile document into the editing model.
///
/// Anything that is not an object yields an empty document. Device entries
/// that are not objects are dropped.
pub fn normalize_loaded_config(raw: Value) -> DeviceConfig {
    let Value::Object(mut root) = raw else {
        warn!("profile document is not an object, starting empty");
        return DeviceConfig::default();
    };

    let raw_devices = match root.remove("devices") {
        Some(Value::Array(devices)) => devices,
        Some(other) => {
            warn!(found = %kind_name(&other), "devices is not an array, starting empty");
            Vec::new()
        }
        None => Vec::new(),
    };

    let mut config: DeviceConfig = match serde_json::from_value(Value::Object(root)) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "undecodable document header, using defaults");
            DeviceConfig::default()
        }
    };

    config.devices = raw_devices
        .into_iter()
        .enumerate()
        .filter_map(|(index, raw)| {
            let device = normalize_device(raw);
            if device.is_none() {
                warn!(index, "dropping device entry that is not an object");
            }
            device
        })
        .collect();

    debug!(devices = config.devices.len(), "normalized profile document");
    config
}

fn normalize_device(mut raw: Value) -> Option<Device> {
    if !raw.is_object() {
        return None;
    }
    migrate_steps(&mut raw);
    let raw_template = raw.get("template").cloned();

    let mut device: Device = serde_json::from_value(raw).ok()?;

    if device.display_name.is_empty() {
        device.display_name = first_non_empty(&[&device.name, &device.id]).to_string();
    }
    if device.name.is_empty() && !device.display_name.is_empty() {
        device.name = device.display_name.clone();
    }

    if let Some(template) = raw_template {
        device.preserve_unknown_template(template);
    }
    ensure_template(&mut device);
    Some(device)
}

fn migrate_steps(device: &mut Value) {
    let Some(scenarios) = device.get_mut("scenarios").and_then(Value::as_array_mut) else {
        return;
    };
    for scenario in scenarios {
        if let Some(steps) = scenario.get_mut("steps").and_then(Value::as_array_mut) {
            for step in steps.iter_mut() {
                *step = normalize_step_for_editing(step);
            }
        }
    }
}

fn first_non_empty<'a>(candidates: &[&'a String]) -> &'a str {
    candidates
        .iter()
        .find(|s| !s.is_empty())
        .map_or("", |s| s.as_str())
}

fn non_empty_str(value: &Value) -> bool {
    value.as_str().is_some_and(|s| !s.is_empty())
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl ProfileSet {
    /// Parse a profile response. Unlike [`ProfileSet::from_response`], input
    /// that is not a JSON object is an error.
    pub fn parse(text: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(text)?;
        if !raw.is_object() {
            return Err(WizardError::config(format!(
                "profile document is a JSON {}, expected an object",
                kind_name(&raw)
            )));
        }
        Ok(Self::from_response(raw))
    }

    /// Split a backend response into profile metadata and the device document.
    ///
    /// `activeProfile` is accepted as an alias of `active_profile`. Without
    /// either, the profile flagged `active` (or else the first profile) wins.
    pub fn from_response(raw: Value) -> Self {
        let mut raw = raw;
        let (profiles, explicit_active) = match raw.as_object_mut() {
            Some(root) => {
                let profiles = root.remove("profiles");
                let snake = root.remove("active_profile");
                let camel = root.remove("activeProfile");
                (profiles, snake.filter(non_empty_str).or(camel))
            }
            None => (None, None),
        };

        let profiles: Vec<ProfileSummary> = profiles
            .and_then(|p| serde_json::from_value::<Vec<Value>>(p).ok())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| serde_json::from_value(p).ok())
            .collect();

        let active_profile = explicit_active
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.is_empty())
            .or_else(|| profiles.iter().find(|p| p.active).map(|p| p.id.clone()))
            .or_else(|| profiles.first().map(|p| p.id.clone()))
            .unwrap_or_default();

        Self {
            profiles,
            active_profile,
            config: normalize_loaded_config(raw),
        }
    }
}

// ============================================================================
// Save
// ============================================================================

/// Backend document written on save
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavePayload {
    pub schema: u32,
    pub devices: Vec<WireDevice>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireDevice {
    pub id: String,
    pub display_name: String,
    pub name: String,
    pub topics: Vec<Topic>,
    pub scenarios: Vec<WireScenario>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<Template>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireScenario {
    pub id: String,
    pub name: String,
    pub button_enabled: bool,
    pub button_label: String,
    pub steps: Vec<WireStep>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Step in the flat firmware shape
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireStep {
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub delay_ms: u32,
    #[serde(flatten)]
    pub action: Option<WireAction>,
}

/// Kind-specific fields flattened onto a [`WireStep`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WireAction {
    Mqtt {
        topic: String,
        payload: String,
        qos: u8,
        retain: bool,
    },
    Audio {
        track: String,
        blocking: bool,
    },
    Flag {
        flag: String,
        value: bool,
    },
    Wait {
        wait: WireWait,
    },
    Loop {
        #[serde(rename = "loop")]
        control: WireLoop,
    },
    Event {
        event: String,
        topic: String,
        payload: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireWait {
    pub mode: ConditionMode,
    pub timeout_ms: u32,
    pub requirements: Vec<WireRequirement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireRequirement {
    pub flag: String,
    pub state: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireLoop {
    pub target_step: u32,
    pub max_iterations: u32,
}

/// Convert one step into the firmware shape. Untyped steps save as `nop`.
pub fn serialize_step_for_save(step: &Step) -> WireStep {
    let action = match &step.action {
        StepAction::MqttPublish(mqtt) => Some(WireAction::Mqtt {
            topic: mqtt.topic.clone(),
            payload: mqtt.payload.clone(),
            qos: mqtt.qos.min(MAX_QOS),
            retain: mqtt.retain,
        }),
        StepAction::AudioPlay(audio) => Some(WireAction::Audio {
            track: audio.track.clone(),
            blocking: audio.blocking,
        }),
        StepAction::SetFlag(flag) => Some(WireAction::Flag {
            flag: flag.flag.clone(),
            value: flag.value,
        }),
        StepAction::WaitFlags(wait) => Some(WireAction::Wait {
            wait: WireWait {
                mode: wait.mode,
                timeout_ms: wait.timeout_ms,
                requirements: wait
                    .requirements
                    .iter()
                    .map(|req| WireRequirement {
                        flag: req.flag.clone(),
                        state: req.required_state,
                    })
                    .collect(),
            },
        }),
        StepAction::Loop(control) => Some(WireAction::Loop {
            control: WireLoop {
                target_step: control.target_step,
                max_iterations: control.max_iterations,
            },
        }),
        StepAction::Event(event) => Some(WireAction::Event {
            event: event.event.clone(),
            topic: event.topic.clone(),
            payload: event.payload.clone(),
        }),
        StepAction::AudioStop | StepAction::Delay | StepAction::Nop | StepAction::Untyped => None,
    };
    WireStep {
        kind: step.kind().unwrap_or(StepKind::Nop),
        delay_ms: step.delay_ms,
        action,
    }
}

/// Build the backend document from the editing model.
pub fn prepare_config_for_save(config: &DeviceConfig) -> SavePayload {
    let mut extra = config.extra.clone();
    for key in STRIPPED_CONFIG_KEYS {
        extra.remove(*key);
    }
    SavePayload {
        schema: config.schema,
        devices: config.devices.iter().map(prepare_device).collect(),
        extra,
    }
}

fn prepare_device(device: &Device) -> WireDevice {
    let display_name = match first_non_empty(&[&device.display_name, &device.name, &device.id]) {
        "" => DEFAULT_DEVICE_NAME.to_string(),
        name => name.to_string(),
    };

    let mut extra = device.extra.clone();
    for key in STRIPPED_DEVICE_KEYS {
        extra.remove(*key);
    }
    let template = device.template.clone().map(|mut template| {
        extra.remove("template");
        if let Some(uid) = template.uid.as_mut() {
            for slot in &mut uid.slots {
                slot.last_value = None;
            }
        }
        template
    });

    WireDevice {
        id: device.id.clone(),
        name: display_name.clone(),
        display_name,
        topics: device.topics.clone(),
        scenarios: device.scenarios.iter().map(prepare_scenario).collect(),
        template,
        extra,
    }
}

fn prepare_scenario(scenario: &Scenario) -> WireScenario {
    WireScenario {
        id: scenario.id.clone(),
        name: scenario.name.clone(),
        button_enabled: scenario.button_enabled,
        button_label: scenario.button_label.clone(),
        steps: scenario.steps.iter().map(serialize_step_for_save).collect(),
        extra: scenario.extra.clone(),
    }
}
