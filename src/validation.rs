//! Pure validation of a device list.
//!
//! [`validate`] walks devices, then their topics, template, scenarios and
//! steps, in list order. That walk order is the order of
//! [`ValidationResult::messages`], so identical input always yields identical
//! output. Each failing control is identified by a dotted field path such as
//! `device.0.scenario.1.step.2.data.mqtt.topic`; a path is reported at most
//! once per pass.

use std::collections::BTreeSet;

use crate::limits::{MAX_DEVICES, MAX_SCENARIOS, MAX_STEPS};
use crate::model::{Device, Scenario};
use crate::step::{Step, StepAction};
use crate::templates::{SignalHoldTemplate, Template};
use crate::types::TemplateKind;

/// One human-readable validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationMessage {
    pub text: String,
    pub field: String,
    pub device_idx: usize,
    pub scenario_idx: Option<usize>,
    pub step_idx: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    /// Every failing field path
    pub fields: BTreeSet<String>,
    pub device_errors: BTreeSet<usize>,
    /// `(device, scenario)` pairs with an error at or below the scenario
    pub scenario_errors: BTreeSet<(usize, usize)>,
    /// `(device, scenario, step)` triples
    pub step_errors: BTreeSet<(usize, usize, usize)>,
    pub messages: Vec<ValidationMessage>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.messages.len()
    }

    pub fn has_field(&self, path: &str) -> bool {
        self.fields.contains(path)
    }

    pub fn has_scenario_error(&self, device: usize, scenario: usize) -> bool {
        self.scenario_errors.contains(&(device, scenario))
    }

    pub fn has_step_error(&self, device: usize, scenario: usize, step: usize) -> bool {
        self.step_errors.contains(&(device, scenario, step))
    }
}

/// Location of a reported error
#[derive(Clone, Copy)]
struct At {
    device: usize,
    scenario: Option<usize>,
    step: Option<usize>,
}

impl At {
    fn device(device: usize) -> Self {
        Self {
            device,
            scenario: None,
            step: None,
        }
    }

    fn scenario(device: usize, scenario: usize) -> Self {
        Self {
            device,
            scenario: Some(scenario),
            step: None,
        }
    }

    fn step(device: usize, scenario: usize, step: usize) -> Self {
        Self {
            device,
            scenario: Some(scenario),
            step: Some(step),
        }
    }

    fn prefix(&self) -> String {
        let mut prefix = format!("Device {}", self.device + 1);
        if let Some(s) = self.scenario {
            prefix.push_str(&format!(", scenario {}", s + 1));
        }
        if let Some(k) = self.step {
            prefix.push_str(&format!(", step {}", k + 1));
        }
        prefix
    }
}

struct Collector {
    result: ValidationResult,
}

impl Collector {
    fn report(&mut self, at: At, field: String, problem: &str) {
        if !self.result.fields.insert(field.clone()) {
            return;
        }
        self.result.device_errors.insert(at.device);
        if let Some(s) = at.scenario {
            self.result.scenario_errors.insert((at.device, s));
            if let Some(k) = at.step {
                self.result.step_errors.insert((at.device, s, k));
            }
        }
        self.result.messages.push(ValidationMessage {
            text: format!("{}: {problem}", at.prefix()),
            field,
            device_idx: at.device,
            scenario_idx: at.scenario,
            step_idx: at.step,
        });
    }
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Validate a device list. Pure and deterministic.
pub fn validate(devices: &[Device]) -> ValidationResult {
    let mut collector = Collector {
        result: ValidationResult::default(),
    };
    for (d, device) in devices.iter().enumerate() {
        validate_device(&mut collector, d, device);
    }
    collector.result
}

fn validate_device(c: &mut Collector, d: usize, device: &Device) {
    let at = At::device(d);
    if blank(&device.display_name) && blank(&device.id) {
        c.report(at, format!("device.{d}.display_name"), "name or ID is required");
    }

    for (t, topic) in device.topics.iter().enumerate() {
        if blank(&topic.name) {
            c.report(at, format!("device.{d}.topic.{t}.name"), &format!("topic {} needs a name", t + 1));
        }
        if blank(&topic.topic) {
            c.report(
                at,
                format!("device.{d}.topic.{t}.topic"),
                &format!("topic {} needs an MQTT topic", t + 1),
            );
        }
    }

    if let Some(template) = &device.template {
        validate_template(c, d, template);
    }

    if d >= MAX_DEVICES {
        c.report(
            at,
            format!("device.{d}"),
            &format!("device limit exceeded (max {MAX_DEVICES})"),
        );
    }
    if device.scenarios.len() > MAX_SCENARIOS {
        c.report(
            at,
            format!("device.{d}.scenarios"),
            &format!("too many scenarios (max {MAX_SCENARIOS})"),
        );
    }

    for (s, scenario) in device.scenarios.iter().enumerate() {
        validate_scenario(c, d, s, scenario);
    }
}

fn validate_template(c: &mut Collector, d: usize, template: &Template) {
    let at = At::device(d);
    match template.kind {
        TemplateKind::UidValidator => {
            let start_topic = template.uid.as_ref().map_or("", |u| u.start_topic.as_str());
            if blank(start_topic) {
                c.report(
                    at,
                    format!("device.{d}.template.uid.start_topic"),
                    "UID validator needs a start topic",
                );
            }
        }
        TemplateKind::SignalHold => {
            let default_signal = SignalHoldTemplate::default();
            let signal = template.signal.as_ref().unwrap_or(&default_signal);
            if blank(&signal.signal_topic) {
                c.report(
                    at,
                    format!("device.{d}.template.signal.signal_topic"),
                    "signal hold needs a signal topic",
                );
            }
            if blank(&signal.heartbeat_topic) {
                c.report(
                    at,
                    format!("device.{d}.template.signal.heartbeat_topic"),
                    "signal hold needs a heartbeat topic",
                );
            }
            if signal.required_hold_ms == 0 {
                c.report(
                    at,
                    format!("device.{d}.template.signal.required_hold_ms"),
                    "hold time must be greater than 0",
                );
            }
        }
        TemplateKind::IntervalTask => {
            if template.interval.as_ref().is_some_and(|i| i.interval_ms == 0) {
                c.report(
                    at,
                    format!("device.{d}.template.interval.interval_ms"),
                    "interval must be at least 1 ms",
                );
            }
        }
        _ => {}
    }
}

fn validate_scenario(c: &mut Collector, d: usize, s: usize, scenario: &Scenario) {
    let at = At::scenario(d, s);
    if blank(&scenario.name) && blank(&scenario.id) {
        c.report(at, format!("device.{d}.scenario.{s}.name"), "name or ID is required");
    }
    if scenario.steps.len() > MAX_STEPS {
        c.report(
            at,
            format!("device.{d}.scenario.{s}.steps"),
            &format!("too many steps (max {MAX_STEPS})"),
        );
    }
    for (k, step) in scenario.steps.iter().enumerate() {
        validate_step(c, At::step(d, s, k), step);
    }
}

fn validate_step(c: &mut Collector, at: At, step: &Step) {
    let (Some(s), Some(k)) = (at.scenario, at.step) else {
        return;
    };
    let base = format!("device.{}.scenario.{s}.step.{k}", at.device);
    let missing = match &step.action {
        StepAction::Untyped => Some(("type", "step type is required")),
        StepAction::MqttPublish(mqtt) if blank(&mqtt.topic) => {
            Some(("data.mqtt.topic", "MQTT topic is required"))
        }
        StepAction::AudioPlay(audio) if blank(&audio.track) => {
            Some(("data.audio.track", "audio track is required"))
        }
        StepAction::SetFlag(flag) if blank(&flag.flag) => {
            Some(("data.flag.flag", "flag name is required"))
        }
        StepAction::Event(event) if blank(&event.event) => {
            Some(("data.event.event", "event name is required"))
        }
        _ => None,
    };
    if let Some((field, problem)) = missing {
        c.report(at, format!("{base}.{field}"), problem);
    }
}
