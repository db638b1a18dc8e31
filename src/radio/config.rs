use std::path::Path;

use crate::device::{ConfigDocument, ConfigError, Section};

const SDR_KEYS: [&str; 1] = ["rigctl_port"];
const CHANNEL_KEYS: [&str; 4] = ["usb_port", "rigctl_ID", "serial_speed", "offset"];
const SECTIONS: [&str; 3] = ["sdr", "rx", "tx"];

/// A rigctld-driven receive or transmit chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub usb_port: String,
    pub model_id: i64,
    pub serial_speed: i64,
    /// Added to the rounded corrected frequency, in Hz.
    pub offset_hz: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsbOverrides {
    pub rx: Option<String>,
    pub tx: Option<String>,
}

/// Radio description loaded from `<radio_config_dir>/<name>.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioConfig {
    pub name: String,
    /// Port of an SDR program that already runs its own rigctl server.
    pub sdr_port: Option<u16>,
    pub rx: Option<ChannelConfig>,
    pub tx: Option<ChannelConfig>,
}

impl RadioConfig {
    pub fn load(dir: &Path, name: &str, overrides: &UsbOverrides) -> Result<Self, ConfigError> {
        let doc = ConfigDocument::load(dir, name)?;
        Self::from_document(&doc, overrides)
    }

    pub fn from_document(
        doc: &ConfigDocument,
        overrides: &UsbOverrides,
    ) -> Result<Self, ConfigError> {
        let keys = doc.root().keys();
        if keys.contains("trx") {
            return Err(ConfigError::TransceiverUnsupported {
                name: doc.name.clone(),
            });
        }
        if keys.iter().any(|k| !SECTIONS.contains(k)) {
            return Err(ConfigError::InvalidKeys {
                name: doc.name.clone(),
                section: "document".to_string(),
                expected: "any of sdr, rx, tx".to_string(),
                found: keys.iter().copied().collect::<Vec<_>>().join(", "),
            });
        }

        let sdr_port = match doc.section("sdr")? {
            Some(section) => {
                section.expect_keys(&SDR_KEYS)?;
                Some(section.port("rigctl_port")?)
            }
            None => None,
        };
        let rx = doc
            .section("rx")?
            .map(|s| channel(&s, overrides.rx.as_deref()))
            .transpose()?;
        let tx = doc
            .section("tx")?
            .map(|s| channel(&s, overrides.tx.as_deref()))
            .transpose()?;

        if sdr_port.is_none() && rx.is_none() && tx.is_none() {
            return Err(ConfigError::NoChannels {
                name: doc.name.clone(),
            });
        }

        if let (Some(rx), Some(tx)) = (&rx, &tx) {
            if rx.usb_port == tx.usb_port {
                return Err(ConfigError::PortCollision {
                    name: doc.name.clone(),
                    port: rx.usb_port.clone(),
                });
            }
        }

        Ok(Self {
            name: doc.name.clone(),
            sdr_port,
            rx,
            tx,
        })
    }
}

fn channel(section: &Section<'_>, usb_override: Option<&str>) -> Result<ChannelConfig, ConfigError> {
    section.expect_keys(&CHANNEL_KEYS)?;
    let usb_port = match usb_override {
        Some(port) => port.to_string(),
        None => section.string("usb_port")?,
    };
    Ok(ChannelConfig {
        usb_port,
        model_id: section.integer("rigctl_ID")?,
        serial_speed: section.integer("serial_speed")?,
        offset_hz: section.integer("offset")?,
    })
}
