use std::path::Path;

use crate::device::{ConfigDocument, ConfigError};

const EXPECTED_KEYS: [&str; 8] = [
    "usb_port",
    "rotctl_ID",
    "rotctld_port",
    "min_az",
    "max_az",
    "min_el",
    "max_el",
    "control_type",
];

/// Rotor description loaded from `<rotor_config_dir>/<name>.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotorConfig {
    pub name: String,
    pub usb_port: String,
    pub model_id: i64,
    pub daemon_port: u16,
    pub min_az: i64,
    pub max_az: i64,
    pub min_el: i64,
    pub max_el: i64,
    pub control_type: i64,
}

impl RotorConfig {
    pub fn load(dir: &Path, name: &str, usb_override: Option<&str>) -> Result<Self, ConfigError> {
        let doc = ConfigDocument::load(dir, name)?;
        Self::from_document(&doc, usb_override)
    }

    pub fn from_document(
        doc: &ConfigDocument,
        usb_override: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let root = doc.root();
        root.expect_keys(&EXPECTED_KEYS)?;

        let usb_port = match usb_override {
            Some(port) => port.to_string(),
            None => root.string("usb_port")?,
        };

        Ok(Self {
            name: doc.name.clone(),
            usb_port,
            model_id: root.integer("rotctl_ID")?,
            daemon_port: root.port("rotctld_port")?,
            min_az: root.integer("min_az")?,
            max_az: root.integer("max_az")?,
            min_el: root.integer("min_el")?,
            max_el: root.integer("max_el")?,
            control_type: root.integer("control_type")?,
        })
    }

    /// Operating envelope handed to rotctld at start-up.
    pub fn set_conf_arg(&self) -> String {
        format!(
            "--set-conf=min_az={},max_az={},min_el={},max_el={}",
            self.min_az, self.max_az, self.min_el, self.max_el
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAESU: &str = r#"{
        "usb_port": "/dev/ttyUSB0",
        "rotctl_ID": 603,
        "rotctld_port": 4533,
        "min_az": 0,
        "max_az": "450",
        "min_el": 0,
        "max_el": 180,
        "control_type": 1
    }"#;

    #[test]
    fn parses_complete_config() {
        let doc = ConfigDocument::parse("yaesu", YAESU).unwrap();
        let config = RotorConfig::from_document(&doc, None).unwrap();
        assert_eq!(config.name, "yaesu");
        assert_eq!(config.usb_port, "/dev/ttyUSB0");
        assert_eq!(config.model_id, 603);
        assert_eq!(config.daemon_port, 4533);
        assert_eq!(config.max_az, 450);
        assert_eq!(
            config.set_conf_arg(),
            "--set-conf=min_az=0,max_az=450,min_el=0,max_el=180"
        );
    }

    #[test]
    fn usb_override_replaces_configured_port() {
        let doc = ConfigDocument::parse("yaesu", YAESU).unwrap();
        let config = RotorConfig::from_document(&doc, Some("/dev/ttyACM3")).unwrap();
        assert_eq!(config.usb_port, "/dev/ttyACM3");
    }

    #[test]
    fn extra_or_missing_keys_are_rejected() {
        let extra = YAESU.replacen("\"control_type\": 1", "\"control_type\": 1, \"speed\": 2", 1);
        let doc = ConfigDocument::parse("yaesu", &extra).unwrap();
        assert!(matches!(
            RotorConfig::from_document(&doc, None),
            Err(ConfigError::InvalidKeys { .. })
        ));

        let doc = ConfigDocument::parse("yaesu", r#"{"usb_port": "/dev/ttyUSB0"}"#).unwrap();
        assert!(RotorConfig::from_document(&doc, None).is_err());
    }

    #[test]
    fn non_integer_limits_are_fatal() {
        let bad = YAESU.replacen("\"min_el\": 0", "\"min_el\": \"low\"", 1);
        let doc = ConfigDocument::parse("yaesu", &bad).unwrap();
        match RotorConfig::from_document(&doc, None) {
            Err(ConfigError::NotAnInteger { key, .. }) => assert_eq!(key, "min_el"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
