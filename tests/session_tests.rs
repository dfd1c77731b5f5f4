//! Editor Session Tests
//!
//! These tests verify:
//! - Bounded lists reject the entry past their limit
//! - Device add, clone and delete keep the selection sensible
//! - Malformed index input is a silent no-op
//! - The busy gate and status strings across load and save

use serde_json::json;

use device_wizard::session::{
    DeviceField, RequirementField, ScenarioField, STATUS_LOADED, STATUS_LOADING, STATUS_NOT_LOADED,
    STATUS_SAVED, STATUS_SAVING,
};
use device_wizard::step::StepAction;
use device_wizard::{EditError, EditorSession, StepKind, TemplateKind, TemplateList};

fn loaded(raw: serde_json::Value) -> EditorSession {
    let mut session = EditorSession::new();
    session.begin_load().unwrap();
    session.load(raw);
    session
}

/// Session with one valid device and one selected, empty scenario
fn session_with_scenario() -> EditorSession {
    let mut session = loaded(json!({
        "active_profile": "default",
        "devices": [{"id": "door", "display_name": "Door", "scenarios": [{"id": "open", "name": "Open"}]}]
    }));
    assert!(session.select_scenario("0"));
    session
}

// =============================================================================
// Limits
// =============================================================================

#[test]
fn test_mqtt_rule_limit() {
    let mut session = loaded(json!({"devices": [{"id": "d"}]}));
    assert!(session.set_template("on_mqtt_event"));

    for expected in 0..8 {
        assert_eq!(session.add_template_entry(TemplateList::MqttRules), Ok(expected));
    }
    let err = session.add_template_entry(TemplateList::MqttRules).unwrap_err();
    assert_eq!(err, EditError::LimitReached { what: "MQTT rule", limit: 8 });
    assert_eq!(session.status(), "MQTT rule limit reached");

    let template = session.current_device().unwrap().template.as_ref().unwrap();
    let rules = &template.mqtt.as_ref().unwrap().rules;
    assert_eq!(rules.len(), 8);
    assert!(rules.iter().all(|r| r.payload_required));
}

#[test]
fn test_template_entry_requires_matching_template() {
    let mut session = loaded(json!({"devices": [{"id": "d"}]}));
    let err = session.add_template_entry(TemplateList::FlagRules).unwrap_err();
    assert_eq!(
        err,
        EditError::TemplateMismatch {
            expected: TemplateKind::OnFlag,
            found: None,
        }
    );
    // Only limit rejections change the status line
    assert_eq!(session.status(), STATUS_LOADED);
}

#[test]
fn test_device_scenario_and_step_limits() {
    let mut session = EditorSession::new();
    for _ in 0..12 {
        session.add_device().unwrap();
    }
    assert!(matches!(
        session.add_device(),
        Err(EditError::LimitReached { what: "Device", limit: 12 })
    ));
    assert!(matches!(session.clone_device(), Err(EditError::LimitReached { .. })));
    assert_eq!(session.model.devices.len(), 12);

    for _ in 0..8 {
        session.add_scenario().unwrap();
    }
    assert!(session.add_scenario().is_err());
    assert_eq!(session.current_device().unwrap().scenarios.len(), 8);

    for _ in 0..16 {
        session.add_step().unwrap();
    }
    assert!(session.add_step().is_err());
    assert_eq!(session.current_scenario().unwrap().steps.len(), 16);
    assert_eq!(session.status(), "Step limit reached");
}

#[test]
fn test_wait_requirement_limit() {
    let mut session = session_with_scenario();
    session.add_step().unwrap();
    assert!(session.set_step_type("0", "wait_flags"));

    for _ in 0..8 {
        session.add_wait_requirement("0").unwrap();
    }
    assert!(session.add_wait_requirement("0").is_err());
    assert!(session.update_wait_requirement("0", "7", RequirementField::Flag, "door"));
    assert!(session.update_wait_requirement("0", "7", RequirementField::RequiredState, "false"));
    assert!(session.remove_wait_requirement("0", "0"));

    let step = &session.current_scenario().unwrap().steps[0];
    let StepAction::WaitFlags(wait) = &step.action else {
        panic!("expected wait_flags step");
    };
    assert_eq!(wait.requirements.len(), 7);
    assert_eq!(wait.requirements[6].flag, "door");
    assert!(!wait.requirements[6].required_state);
}

// =============================================================================
// Devices
// =============================================================================

#[test]
fn test_added_devices_have_unique_ids() {
    let mut session = EditorSession::new();
    session.add_device().unwrap();
    session.add_device().unwrap();
    let devices = &session.model.devices;
    assert_ne!(devices[0].id, devices[1].id);
    assert!(devices[0].id.starts_with("device_"));
    assert_eq!(devices[1].display_name, "New device");
    assert_eq!(session.selected_device(), Some(1));
    assert!(session.is_dirty());
}

#[test]
fn test_clone_device_inserts_after_source() {
    let mut session = loaded(json!({
        "devices": [
            {"id": "a", "display_name": "Alpha", "scenarios": [{"id": "s"}]},
            {"id": "b"}
        ]
    }));
    assert_eq!(session.clone_device(), Ok(1));

    let ids: Vec<&str> = session.model.devices.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "a_copy", "b"]);
    let copy = &session.model.devices[1];
    assert_eq!(copy.display_name, "Alpha copy");
    assert_eq!(copy.name, "Alpha copy");
    assert_eq!(copy.scenarios.len(), 1);
    assert_eq!(session.selected_device(), Some(1));
}

#[test]
fn test_delete_last_device_moves_selection_back() {
    let mut session = loaded(json!({"devices": [{"id": "a"}, {"id": "b"}]}));
    assert!(session.select_device("1"));
    assert!(session.delete_device());
    assert_eq!(session.selected_device(), Some(0));
    assert!(session.delete_device());
    assert_eq!(session.selected_device(), None);
    assert!(!session.delete_device());
}

#[test]
fn test_display_name_edit_mirrors_name() {
    let mut session = loaded(json!({"devices": [{"id": "a"}]}));
    assert!(session.update_device_field(DeviceField::DisplayName, "Front door"));
    let device = session.current_device().unwrap();
    assert_eq!(device.display_name, "Front door");
    assert_eq!(device.name, "Front door");
}

#[test]
fn test_switching_template_keeps_same_kind() {
    let mut session = loaded(json!({"devices": [{"id": "a"}]}));
    assert!(session.set_template("on_flag"));
    session.add_template_entry(TemplateList::FlagRules).unwrap();

    // Re-selecting the same kind keeps the rule
    assert!(!session.set_template("on_flag"));
    let flag = session.current_device().unwrap().template.as_ref().unwrap().flag.as_ref().unwrap();
    assert_eq!(flag.rules.len(), 1);

    assert!(session.set_template("if_condition"));
    assert!(session.set_template(""));
    assert!(session.current_device().unwrap().template.is_none());
}

// =============================================================================
// Scenarios and Steps
// =============================================================================

#[test]
fn test_malformed_indices_are_noops() {
    let mut session = session_with_scenario();
    session.add_step().unwrap();
    let before = session.model.clone();

    assert!(!session.remove_step("abc"));
    assert!(!session.remove_step("-1"));
    assert!(!session.remove_step("5"));
    assert!(!session.drop_step("x", "0"));
    assert!(!session.set_step_type("", "delay"));
    assert!(!session.set_step_type("0", "teleport"));
    assert!(!session.remove_topic("1e9"));
    assert!(!session.select_device("nope"));
    assert_eq!(session.model, before);
}

#[test]
fn test_index_input_uses_leading_digits() {
    let mut session = session_with_scenario();
    session.add_step().unwrap();
    session.add_step().unwrap();
    assert!(session.set_step_type("1px", "delay"));
    assert_eq!(session.current_scenario().unwrap().steps[1].kind(), Some(StepKind::Delay));
}

#[test]
fn test_step_reordering() {
    let mut session = session_with_scenario();
    for kind in ["audio_stop", "delay", "nop"] {
        let index = session.add_step().unwrap();
        assert!(session.set_step_type(&index.to_string(), kind));
    }
    let kinds = |s: &EditorSession| -> Vec<StepKind> {
        s.current_scenario().unwrap().steps.iter().filter_map(|st| st.kind()).collect()
    };

    assert!(session.drop_step("0", "3"));
    assert_eq!(kinds(&session), vec![StepKind::Delay, StepKind::Nop, StepKind::AudioStop]);

    assert!(!session.drop_step("1", "2"));
    assert!(session.move_step("2", -1));
    assert_eq!(kinds(&session), vec![StepKind::Delay, StepKind::AudioStop, StepKind::Nop]);
    assert!(!session.move_step("0", -1));
}

#[test]
fn test_step_delay_and_type_change() {
    let mut session = session_with_scenario();
    session.add_step().unwrap();
    assert!(session.set_step_delay("0", "250ms"));
    assert!(!session.set_step_type("0", "mqtt_publish"));
    assert!(session.set_step_type("0", "event"));

    let step = &session.current_scenario().unwrap().steps[0];
    assert_eq!(step.delay_ms, 250);
    assert!(matches!(step.action, StepAction::Event(_)));
}

#[test]
fn test_remove_scenario_falls_back_to_selection() {
    let mut session = loaded(json!({
        "devices": [{"id": "d", "scenarios": [{"id": "a"}, {"id": "b"}, {"id": "c"}]}]
    }));
    assert!(session.select_scenario("2"));

    assert!(session.remove_scenario(""));
    let ids: Vec<&str> = session
        .current_device()
        .unwrap()
        .scenarios
        .iter()
        .map(|s| s.id.as_str())
        .collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(session.selected_scenario(), Some(1));

    assert!(session.remove_scenario("0"));
    assert_eq!(session.selected_scenario(), Some(0));
}

#[test]
fn test_disabling_button_clears_label() {
    let mut session = session_with_scenario();
    assert!(session.update_scenario_field(ScenarioField::ButtonEnabled, "true"));
    assert!(session.update_scenario_field(ScenarioField::ButtonLabel, "Open"));
    assert!(session.current_scenario().unwrap().button_enabled);

    assert!(session.update_scenario_field(ScenarioField::ButtonEnabled, "on"));
    let scenario = session.current_scenario().unwrap();
    assert!(!scenario.button_enabled);
    assert!(scenario.button_label.is_empty());
}

// =============================================================================
// Load / Save Lifecycle
// =============================================================================

#[test]
fn test_status_through_load_and_save() {
    let mut session = EditorSession::new();
    assert_eq!(session.status(), STATUS_NOT_LOADED);

    session.begin_load().unwrap();
    assert_eq!(session.status(), STATUS_LOADING);
    assert_eq!(session.begin_load(), Err(EditError::Busy));

    session.load(json!({
        "profiles": [{"id": "default", "name": "Default", "active": true}],
        "devices": [{"id": "door"}]
    }));
    assert_eq!(session.status(), STATUS_LOADED);
    assert_eq!(session.active_profile, "default");
    assert!(!session.can_save());

    assert!(session.update_device_field(DeviceField::DisplayName, "Door"));
    assert!(session.can_save());

    let payload = session.begin_save().unwrap();
    assert_eq!(payload.devices[0].display_name, "Door");
    assert_eq!(session.status(), STATUS_SAVING);
    assert!(session.is_busy());
    assert!(!session.can_save());
    assert_eq!(session.begin_save().unwrap_err(), EditError::Busy);

    session.finish_save(Ok(()));
    assert_eq!(session.status(), STATUS_SAVED);
    assert!(!session.is_dirty());
    assert!(!session.is_busy());
}

#[test]
fn test_failed_save_keeps_edits() {
    let mut session = session_with_scenario();
    session.add_step().unwrap();
    session.edit_step("0", |step| {
        step.action = StepAction::default_for(StepKind::AudioStop);
        true
    });
    session.begin_save().unwrap();
    session.finish_save(Err("connection refused".into()));

    assert_eq!(session.status(), "Save failed: connection refused");
    assert!(session.is_dirty());
    assert!(!session.is_busy());
}

#[test]
fn test_invalid_model_blocks_save() {
    let mut session = session_with_scenario();
    session.add_step().unwrap();
    assert!(!session.can_save());

    let err = session.begin_save().unwrap_err();
    assert_eq!(err, EditError::Invalid(1));
    assert_eq!(session.status(), "Fix 1 validation error(s) before saving");
    assert!(!session.is_busy());
}

#[test]
fn test_load_failure_releases_busy_gate() {
    let mut session = EditorSession::new();
    session.begin_load().unwrap();
    session.load_failed("timeout");
    assert_eq!(session.status(), "Load failed: timeout");
    assert!(session.begin_load().is_ok());
}
