//! Editor session state
//!
//! [`EditorSession`] is the explicit application state of the wizard: the
//! loaded model, the current selection, and the busy/dirty flags that gate
//! saving. Every UI action maps onto one method here. Index arguments arrive
//! as raw form strings and are parsed leniently; anything unparsable or out
//! of range leaves the session untouched.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::coerce::{parse_bool_input, parse_index};
use crate::error::EditError;
use crate::limits::{push_limited, MAX_DEVICES, MAX_SCENARIOS, MAX_STEPS};
use crate::model::{Device, DeviceConfig, ProfileSet, ProfileSummary, Scenario, Topic};
use crate::reorder::{move_by, remove_at, reorder_in_place};
use crate::serializer::{prepare_config_for_save, SavePayload};
use crate::step::Step;
use crate::templates::{add_template_entry, remove_template_entry, set_device_template, TemplateList};
use crate::types::StepKind;
use crate::validation::{validate, ValidationResult};

pub const STATUS_NOT_LOADED: &str = "Not loaded";
pub const STATUS_LOADING: &str = "Loading...";
pub const STATUS_LOADED: &str = "Loaded";
pub const STATUS_SAVING: &str = "Saving...";
pub const STATUS_SAVED: &str = "Saved";

const NEW_DEVICE_NAME: &str = "New device";
const NEW_SCENARIO_NAME: &str = "Scenario";

/// Editable device fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceField {
    Id,
    DisplayName,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicField {
    Name,
    Topic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioField {
    Id,
    Name,
    ButtonEnabled,
    ButtonLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementField {
    Flag,
    RequiredState,
}

/// Main editor state
#[derive(Debug, Clone)]
pub struct EditorSession {
    /// Loaded configuration document
    pub model: DeviceConfig,
    /// Profiles offered by the backend
    pub profiles: Vec<ProfileSummary>,
    /// Profile the model was loaded from and will be saved to
    pub active_profile: String,
    selected_device: Option<usize>,
    selected_scenario: Option<usize>,
    /// A load or save request is outstanding
    busy: bool,
    /// Model has edits not yet saved
    dirty: bool,
    /// Status message for user feedback
    status: String,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSession {
    pub fn new() -> Self {
        Self {
            model: DeviceConfig::default(),
            profiles: Vec::new(),
            active_profile: String::new(),
            selected_device: None,
            selected_scenario: None,
            busy: false,
            dirty: false,
            status: STATUS_NOT_LOADED.to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Load / save lifecycle
    // ------------------------------------------------------------------

    pub fn begin_load(&mut self) -> Result<(), EditError> {
        if self.busy {
            return Err(EditError::Busy);
        }
        self.busy = true;
        self.status = STATUS_LOADING.to_string();
        Ok(())
    }

    /// Replace the session contents with a backend response.
    pub fn load(&mut self, raw: Value) {
        let set = ProfileSet::from_response(raw);
        self.model = set.config;
        self.profiles = set.profiles;
        self.active_profile = set.active_profile;
        self.selected_device = if self.model.devices.is_empty() { None } else { Some(0) };
        self.selected_scenario = None;
        self.busy = false;
        self.dirty = false;
        self.status = STATUS_LOADED.to_string();
        info!(
            profile = %self.active_profile,
            devices = self.model.devices.len(),
            "profile loaded"
        );
    }

    pub fn load_failed(&mut self, reason: &str) {
        self.busy = false;
        self.status = format!("Load failed: {reason}");
        warn!(reason, "profile load failed");
    }

    pub fn validation(&self) -> ValidationResult {
        validate(&self.model.devices)
    }

    pub fn can_save(&self) -> bool {
        self.dirty && !self.busy && self.validation().is_valid()
    }

    /// Start a save: returns the payload to send and raises the busy gate.
    pub fn begin_save(&mut self) -> Result<SavePayload, EditError> {
        if self.busy {
            return Err(EditError::Busy);
        }
        let validation = self.validation();
        if !validation.is_valid() {
            let err = EditError::Invalid(validation.error_count());
            self.status = err.to_string();
            return Err(err);
        }
        self.busy = true;
        self.status = STATUS_SAVING.to_string();
        debug!(profile = %self.active_profile, "save started");
        Ok(prepare_config_for_save(&self.model))
    }

    pub fn finish_save(&mut self, result: Result<(), String>) {
        self.busy = false;
        match result {
            Ok(()) => {
                self.dirty = false;
                self.status = STATUS_SAVED.to_string();
                info!(profile = %self.active_profile, "profile saved");
            }
            Err(reason) => {
                warn!(%reason, "profile save failed");
                self.status = format!("Save failed: {reason}");
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn selected_device(&self) -> Option<usize> {
        self.selected_device
    }

    pub fn selected_scenario(&self) -> Option<usize> {
        self.selected_scenario
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Record a rejected edit in the status line and pass it on.
    fn reject<T>(&mut self, err: EditError) -> Result<T, EditError> {
        if matches!(err, EditError::LimitReached { .. }) {
            self.status = err.to_string();
        }
        Err(err)
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn current_device(&self) -> Option<&Device> {
        self.selected_device.and_then(|d| self.model.devices.get(d))
    }

    pub fn current_device_mut(&mut self) -> Option<&mut Device> {
        self.selected_device.and_then(|d| self.model.devices.get_mut(d))
    }

    pub fn current_scenario(&self) -> Option<&Scenario> {
        let s = self.selected_scenario?;
        self.current_device()?.scenarios.get(s)
    }

    pub fn current_scenario_mut(&mut self) -> Option<&mut Scenario> {
        let s = self.selected_scenario?;
        self.current_device_mut()?.scenarios.get_mut(s)
    }

    pub fn select_device(&mut self, index: &str) -> bool {
        match parse_index(index).filter(|d| *d < self.model.devices.len()) {
            Some(d) => {
                self.selected_device = Some(d);
                self.selected_scenario = None;
                true
            }
            None => false,
        }
    }

    pub fn select_scenario(&mut self, index: &str) -> bool {
        let count = self.current_device().map_or(0, |d| d.scenarios.len());
        match parse_index(index).filter(|s| *s < count) {
            Some(s) => {
                self.selected_scenario = Some(s);
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Devices
    // ------------------------------------------------------------------

    pub fn add_device(&mut self) -> Result<usize, EditError> {
        let id = unique_id("device", |id| self.model.devices.iter().any(|d| d.id == id));
        let device = Device {
            id,
            display_name: NEW_DEVICE_NAME.to_string(),
            name: NEW_DEVICE_NAME.to_string(),
            ..Device::default()
        };
        match push_limited(&mut self.model.devices, device, MAX_DEVICES, "Device") {
            Ok(index) => {
                self.selected_device = Some(index);
                self.selected_scenario = None;
                self.mark_dirty();
                Ok(index)
            }
            Err(err) => self.reject(err),
        }
    }

    /// Duplicate the selected device right after itself and select the copy.
    pub fn clone_device(&mut self) -> Result<usize, EditError> {
        let source = self.selected_device.ok_or(EditError::NoSelection)?;
        if source >= self.model.devices.len() {
            return Err(EditError::NoSelection);
        }
        if self.model.devices.len() >= MAX_DEVICES {
            return self.reject(EditError::LimitReached {
                what: "Device",
                limit: MAX_DEVICES,
            });
        }
        let original = &self.model.devices[source];
        let mut copy = original.clone();
        let base_id = if original.id.is_empty() { "device" } else { &original.id };
        copy.id = format!("{base_id}_copy");
        let base_name = match original.label() {
            "" => "Device",
            label => label,
        };
        copy.rename(format!("{base_name} copy"));

        let index = source + 1;
        self.model.devices.insert(index, copy);
        self.selected_device = Some(index);
        self.selected_scenario = None;
        self.mark_dirty();
        Ok(index)
    }

    pub fn delete_device(&mut self) -> bool {
        let Some(index) = self.selected_device else {
            return false;
        };
        if !remove_at(&mut self.model.devices, index) {
            return false;
        }
        let remaining = self.model.devices.len();
        self.selected_device = remaining.checked_sub(1).map(|last| index.min(last));
        self.selected_scenario = None;
        self.mark_dirty();
        true
    }

    /// Editing the display name rewrites `name`; editing `name` fills an empty
    /// display name.
    pub fn update_device_field(&mut self, field: DeviceField, value: &str) -> bool {
        let Some(device) = self.current_device_mut() else {
            return false;
        };
        match field {
            DeviceField::Id => device.id = value.to_string(),
            DeviceField::DisplayName => device.rename(value),
            DeviceField::Name => {
                device.name = value.to_string();
                if device.display_name.is_empty() {
                    device.display_name = value.to_string();
                }
            }
        }
        self.mark_dirty();
        true
    }

    /// Apply an arbitrary edit to the selected device.
    pub fn edit_device(&mut self, edit: impl FnOnce(&mut Device)) -> bool {
        let Some(device) = self.current_device_mut() else {
            return false;
        };
        edit(device);
        self.mark_dirty();
        true
    }

    // ------------------------------------------------------------------
    // Topics
    // ------------------------------------------------------------------

    pub fn add_topic(&mut self) -> Result<usize, EditError> {
        let device = self.current_device_mut().ok_or(EditError::NoSelection)?;
        device.topics.push(Topic::default());
        let index = device.topics.len() - 1;
        self.mark_dirty();
        Ok(index)
    }

    pub fn remove_topic(&mut self, index: &str) -> bool {
        let Some(index) = parse_index(index) else {
            return false;
        };
        let removed = self
            .current_device_mut()
            .is_some_and(|d| remove_at(&mut d.topics, index));
        if removed {
            self.mark_dirty();
        }
        removed
    }

    pub fn update_topic_field(&mut self, index: &str, field: TopicField, value: &str) -> bool {
        let Some(index) = parse_index(index) else {
            return false;
        };
        let Some(topic) = self.current_device_mut().and_then(|d| d.topics.get_mut(index)) else {
            return false;
        };
        match field {
            TopicField::Name => topic.name = value.to_string(),
            TopicField::Topic => topic.topic = value.to_string(),
        }
        self.mark_dirty();
        true
    }

    // ------------------------------------------------------------------
    // Templates
    // ------------------------------------------------------------------

    pub fn set_template(&mut self, type_name: &str) -> bool {
        let changed = self
            .current_device_mut()
            .is_some_and(|d| set_device_template(d, type_name));
        if changed {
            self.mark_dirty();
        }
        changed
    }

    pub fn add_template_entry(&mut self, list: TemplateList) -> Result<usize, EditError> {
        let device = self.current_device_mut().ok_or(EditError::NoSelection)?;
        match add_template_entry(device, list) {
            Ok(index) => {
                self.mark_dirty();
                Ok(index)
            }
            Err(err) => self.reject(err),
        }
    }

    pub fn remove_template_entry(&mut self, list: TemplateList, index: &str) -> bool {
        let Some(index) = parse_index(index) else {
            return false;
        };
        let removed = self
            .current_device_mut()
            .is_some_and(|d| remove_template_entry(d, list, index));
        if removed {
            self.mark_dirty();
        }
        removed
    }

    // ------------------------------------------------------------------
    // Scenarios
    // ------------------------------------------------------------------

    pub fn add_scenario(&mut self) -> Result<usize, EditError> {
        let device = self.current_device_mut().ok_or(EditError::NoSelection)?;
        let id = unique_id("scenario", |id| device.scenarios.iter().any(|s| s.id == id));
        let scenario = Scenario {
            id,
            name: NEW_SCENARIO_NAME.to_string(),
            ..Scenario::default()
        };
        match push_limited(&mut device.scenarios, scenario, MAX_SCENARIOS, "Scenario") {
            Ok(index) => {
                self.selected_scenario = Some(index);
                self.mark_dirty();
                Ok(index)
            }
            Err(err) => self.reject(err),
        }
    }

    /// Remove scenario `index`, or the selected scenario when `index` does not parse.
    pub fn remove_scenario(&mut self, index: &str) -> bool {
        let Some(target) = parse_index(index).or(self.selected_scenario) else {
            return false;
        };
        let Some(device) = self.current_device_mut() else {
            return false;
        };
        if !remove_at(&mut device.scenarios, target) {
            return false;
        }
        let remaining = device.scenarios.len();
        self.selected_scenario = remaining.checked_sub(1).map(|last| target.min(last));
        self.mark_dirty();
        true
    }

    pub fn update_scenario_field(&mut self, field: ScenarioField, value: &str) -> bool {
        let Some(scenario) = self.current_scenario_mut() else {
            return false;
        };
        match field {
            ScenarioField::Id => scenario.id = value.to_string(),
            ScenarioField::Name => scenario.name = value.to_string(),
            ScenarioField::ButtonEnabled => scenario.set_button_enabled(parse_bool_input(value)),
            ScenarioField::ButtonLabel => scenario.button_label = value.to_string(),
        }
        self.mark_dirty();
        true
    }

    // ------------------------------------------------------------------
    // Steps
    // ------------------------------------------------------------------

    pub fn add_step(&mut self) -> Result<usize, EditError> {
        let scenario = self.current_scenario_mut().ok_or(EditError::NoSelection)?;
        match push_limited(&mut scenario.steps, Step::default(), MAX_STEPS, "Step") {
            Ok(index) => {
                self.mark_dirty();
                Ok(index)
            }
            Err(err) => self.reject(err),
        }
    }

    pub fn remove_step(&mut self, index: &str) -> bool {
        let Some(index) = parse_index(index) else {
            return false;
        };
        self.apply_to_steps(|steps| remove_at(steps, index))
    }

    /// Move a step one slot up (`-1`) or down (`1`).
    pub fn move_step(&mut self, index: &str, delta: isize) -> bool {
        let Some(index) = parse_index(index) else {
            return false;
        };
        self.apply_to_steps(|steps| move_by(steps, index, delta))
    }

    /// Drag-and-drop: drop step `from` before the step at `to`.
    pub fn drop_step(&mut self, from: &str, to: &str) -> bool {
        let (Some(from), Some(to)) = (parse_index(from), parse_index(to)) else {
            return false;
        };
        self.apply_to_steps(|steps| reorder_in_place(steps, from, to))
    }

    pub fn set_step_type(&mut self, index: &str, type_name: &str) -> bool {
        let Ok(kind) = type_name.parse::<StepKind>() else {
            return false;
        };
        self.edit_step(index, |step| step.set_kind(kind))
    }

    pub fn set_step_delay(&mut self, index: &str, input: &str) -> bool {
        self.edit_step(index, |step| {
            step.set_delay_input(input);
            true
        })
    }

    /// Apply an edit to step `index` of the selected scenario. The edit
    /// returns whether it changed anything.
    pub fn edit_step(&mut self, index: &str, edit: impl FnOnce(&mut Step) -> bool) -> bool {
        let Some(index) = parse_index(index) else {
            return false;
        };
        let Some(step) = self.current_scenario_mut().and_then(|s| s.steps.get_mut(index)) else {
            return false;
        };
        let changed = edit(step);
        if changed {
            self.mark_dirty();
        }
        changed
    }

    pub fn add_wait_requirement(&mut self, step: &str) -> Result<usize, EditError> {
        let index = parse_index(step).ok_or(EditError::NoSelection)?;
        let wait = self
            .current_scenario_mut()
            .and_then(|s| s.steps.get_mut(index))
            .and_then(Step::wait_flags_mut)
            .ok_or(EditError::NoSelection)?;
        match wait.add_requirement() {
            Ok(added) => {
                self.mark_dirty();
                Ok(added)
            }
            Err(err) => self.reject(err),
        }
    }

    pub fn remove_wait_requirement(&mut self, step: &str, requirement: &str) -> bool {
        let Some(requirement) = parse_index(requirement) else {
            return false;
        };
        self.edit_step(step, |s| {
            s.wait_flags_mut()
                .is_some_and(|wait| wait.remove_requirement(requirement))
        })
    }

    pub fn update_wait_requirement(
        &mut self,
        step: &str,
        requirement: &str,
        field: RequirementField,
        value: &str,
    ) -> bool {
        let Some(requirement) = parse_index(requirement) else {
            return false;
        };
        self.edit_step(step, |s| {
            let Some(req) = s
                .wait_flags_mut()
                .and_then(|wait| wait.requirements.get_mut(requirement))
            else {
                return false;
            };
            match field {
                RequirementField::Flag => req.flag = value.to_string(),
                RequirementField::RequiredState => req.required_state = parse_bool_input(value),
            }
            true
        })
    }

    fn apply_to_steps(&mut self, op: impl FnOnce(&mut Vec<Step>) -> bool) -> bool {
        let changed = self.current_scenario_mut().is_some_and(|s| op(&mut s.steps));
        if changed {
            self.mark_dirty();
        }
        changed
    }
}

/// `<prefix>_<hex millis>`, bumped until `taken` rejects it.
fn unique_id(prefix: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    loop {
        let id = format!("{prefix}_{stamp:x}");
        if !taken(&id) {
            return id;
        }
        stamp += 1;
    }
}
