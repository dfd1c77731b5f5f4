//! Device Wizard Library
//!
//! Configuration model for a device-automation wizard: device templates,
//! scenario steps, legacy migration, validation, and the load/save transforms
//! between the editing model and the backend's profile documents.

pub mod coerce;
pub mod config_file;
pub mod error;
pub mod limits;
pub mod migrate;
pub mod model;
pub mod reorder;
pub mod serializer;
pub mod session;
pub mod step;
pub mod templates;
pub mod types;
pub mod validation;

// Re-export main types for convenience
pub use error::{EditError, Result, WizardError};
pub use migrate::normalize_step_for_editing;
pub use model::{Device, DeviceConfig, ProfileSet, ProfileSummary, Scenario, Topic};
pub use reorder::{reorder, reorder_in_place};
pub use serializer::{
    normalize_loaded_config, prepare_config_for_save, serialize_step_for_save, SavePayload,
    WireAction, WireStep,
};
pub use session::EditorSession;
pub use step::{Step, StepAction};
pub use templates::{
    ensure_condition_template, ensure_flag_template, ensure_interval_template,
    ensure_mqtt_template, ensure_sequence_template, ensure_signal_template, ensure_template,
    ensure_uid_template, set_device_template, Template, TemplateList,
};
pub use types::{ConditionMode, StepKind, TemplateKind};
pub use validation::{validate, ValidationMessage, ValidationResult};
