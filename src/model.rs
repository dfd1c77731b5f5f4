//! Configuration document model
//!
//! One [`DeviceConfig`] per profile: an ordered list of devices, each with
//! topics, scenarios and an optional template. Keys this model does not know
//! about are kept in `extra` maps and written back unchanged.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::coerce::{lenient, uint_of};
use crate::step::Step;
use crate::templates::Template;

pub const CURRENT_SCHEMA: u32 = 1;

/// Document key used to carry a template of a kind this editor cannot model
const TEMPLATE_KEY: &str = "template";

/// Root configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    #[serde(deserialize_with = "schema_version")]
    pub schema: u32,
    #[serde(deserialize_with = "lenient::seq")]
    pub devices: Vec<Device>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            schema: CURRENT_SCHEMA,
            devices: Vec::new(),
            extra: Map::new(),
        }
    }
}

fn schema_version<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(uint_of(&value)
        .filter(|v| *v > 0)
        .map_or(CURRENT_SCHEMA, |v| v.min(u64::from(u32::MAX)) as u32))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub display_name: String,
    /// Mirror of `display_name` kept for older firmware
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::seq")]
    pub topics: Vec<Topic>,
    #[serde(deserialize_with = "lenient::slots")]
    pub scenarios: Vec<Scenario>,
    #[serde(deserialize_with = "lenient::object", skip_serializing_if = "Option::is_none")]
    pub template: Option<Template>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Device {
    /// Replace the template.
    ///
    /// Also drops any unrecognised template carried over from the document so
    /// the device never serializes two `template` keys.
    pub fn set_template(&mut self, template: Option<Template>) {
        self.extra.remove(TEMPLATE_KEY);
        self.template = template;
    }

    /// Keep a template this editor cannot decode so it survives a save.
    pub(crate) fn preserve_unknown_template(&mut self, raw: Value) {
        if self.template.is_none() && raw.is_object() {
            self.extra.insert(TEMPLATE_KEY.to_string(), raw);
        }
    }

    /// Name shown in lists: display name, then name, then id.
    pub fn label(&self) -> &str {
        [&self.display_name, &self.name, &self.id]
            .into_iter()
            .find(|s| !s.is_empty())
            .map_or("", String::as_str)
    }

    /// Set the display name and keep `name` mirrored.
    pub fn rename(&mut self, display_name: impl Into<String>) {
        self.display_name = display_name.into();
        self.name = self.display_name.clone();
    }
}

/// Named MQTT topic a device listens to or publishes on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topic {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub topic: String,
}

impl Default for Topic {
    fn default() -> Self {
        Self {
            name: "topic".to_string(),
            topic: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::boolean")]
    pub button_enabled: bool,
    #[serde(deserialize_with = "lenient::string")]
    pub button_label: String,
    #[serde(deserialize_with = "lenient::slots")]
    pub steps: Vec<Step>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Scenario {
    /// Turning the button off also clears its label.
    pub fn set_button_enabled(&mut self, enabled: bool) {
        self.button_enabled = enabled;
        if !enabled {
            self.button_label.clear();
        }
    }
}

/// Entry in the backend's profile list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSummary {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::boolean")]
    pub active: bool,
}

/// A profile response split into profile metadata and the device document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileSet {
    pub profiles: Vec<ProfileSummary>,
    pub active_profile: String,
    pub config: DeviceConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TemplateKind;
    use serde_json::json;

    #[test]
    fn test_unknown_keys_round_trip() {
        let raw = json!({
            "schema": 1,
            "devices": [{"id": "a", "display_name": "A", "name": "A", "topics": [], "scenarios": [], "firmware": "2.1"}],
            "notes": "keep me"
        });
        let config: DeviceConfig = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(config.devices[0].extra["firmware"], json!("2.1"));
        assert_eq!(serde_json::to_value(&config).unwrap(), raw);
    }

    #[test]
    fn test_schema_defaults_to_current() {
        let config: DeviceConfig = serde_json::from_value(json!({"devices": []})).unwrap();
        assert_eq!(config.schema, CURRENT_SCHEMA);
        let config: DeviceConfig = serde_json::from_value(json!({"schema": "x"})).unwrap();
        assert_eq!(config.schema, CURRENT_SCHEMA);
        let config: DeviceConfig = serde_json::from_value(json!({"schema": 3})).unwrap();
        assert_eq!(config.schema, 3);
    }

    #[test]
    fn test_label_fallbacks() {
        let mut device = Device {
            id: "dev_1".into(),
            ..Device::default()
        };
        assert_eq!(device.label(), "dev_1");
        device.name = "Legacy".into();
        assert_eq!(device.label(), "Legacy");
        device.rename("Door");
        assert_eq!(device.label(), "Door");
        assert_eq!(device.name, "Door");
    }

    #[test]
    fn test_set_template_drops_preserved_unknown() {
        let mut device = Device::default();
        device.preserve_unknown_template(json!({"type": "sensor_monitor"}));
        assert!(device.extra.contains_key("template"));
        device.set_template(Some(Template::new(TemplateKind::OnFlag)));
        assert!(!device.extra.contains_key("template"));
        let value = serde_json::to_value(&device).unwrap();
        assert_eq!(value["template"]["type"], json!("on_flag"));
    }

    #[test]
    fn test_button_disable_clears_label() {
        let mut scenario = Scenario {
            button_enabled: true,
            button_label: "Go".into(),
            ..Scenario::default()
        };
        scenario.set_button_enabled(false);
        assert!(scenario.button_label.is_empty());
    }
}
