use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransponderError {
    #[error("no transponder file for NORAD {0}")]
    NoFile(u32),
    #[error("failed reading transponders for NORAD {norad_id}: {source}")]
    Io {
        norad_id: u32,
        source: std::io::Error,
    },
    #[error("transponder file for NORAD {norad_id} contains invalid JSON: {source}")]
    Json {
        norad_id: u32,
        source: serde_json::Error,
    },
    #[error("NORAD {norad_id} has no transponder {uuid}")]
    UnknownUuid { norad_id: u32, uuid: String },
}

/// One transmitter entry as stored per satellite (SatNOGS field names).
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Transponder {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub description: String,
    pub downlink_low: Option<u64>,
    pub downlink_high: Option<u64>,
    pub uplink_low: Option<u64>,
    pub uplink_high: Option<u64>,
}

impl Transponder {
    /// Midpoint of each band, or its lower edge for single frequencies.
    pub fn start_frequencies(&self) -> (Option<u64>, Option<u64>) {
        (
            start_frequency(self.downlink_low, self.downlink_high),
            start_frequency(self.uplink_low, self.uplink_high),
        )
    }
}

fn start_frequency(low: Option<u64>, high: Option<u64>) -> Option<u64> {
    match (low, high) {
        (Some(low), Some(high)) => Some((low + high) / 2),
        (low, _) => low,
    }
}

/// Directory of `<norad_id>.json` files, each mapping UUID to transponder.
pub struct TransponderCatalog {
    dir: PathBuf,
}

impl TransponderCatalog {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn list(&self, norad_id: u32) -> Result<Vec<Transponder>, TransponderError> {
        let path = self.dir.join(format!("{}.json", norad_id));
        if !path.is_file() {
            return Err(TransponderError::NoFile(norad_id));
        }
        let content =
            fs::read_to_string(&path).map_err(|source| TransponderError::Io { norad_id, source })?;
        let entries: BTreeMap<String, Transponder> = serde_json::from_str(&content)
            .map_err(|source| TransponderError::Json { norad_id, source })?;

        Ok(entries
            .into_iter()
            .map(|(uuid, mut t)| {
                t.uuid = uuid;
                t
            })
            .collect())
    }

    pub fn get(&self, norad_id: u32, uuid: &str) -> Result<Transponder, TransponderError> {
        self.list(norad_id)?
            .into_iter()
            .find(|t| t.uuid == uuid)
            .ok_or_else(|| TransponderError::UnknownUuid {
                norad_id,
                uuid: uuid.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SO50: &str = r#"{
        "NvWPN3yGoTzaDbUZp7cBw9": {
            "mode": "FM",
            "description": "Mode V/U FM",
            "downlink_low": 436795000,
            "downlink_high": null,
            "uplink_low": 145850000,
            "uplink_high": null
        },
        "a7sBq2ZmMkd9Z4RkGgTSdv": {
            "mode": "USB",
            "description": "Linear transponder",
            "downlink_low": 435000000,
            "downlink_high": 435030000,
            "uplink_low": 145900000,
            "uplink_high": 145930000
        }
    }"#;

    fn catalog() -> (TransponderCatalog, PathBuf) {
        let dir = std::env::temp_dir().join(format!("satgs-transponders-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("27607.json"), SO50).unwrap();
        fs::write(dir.join("99999.json"), "{ broken").unwrap();
        (TransponderCatalog::new(dir.clone()), dir)
    }

    #[test]
    fn single_frequency_uses_low_and_ranges_use_midpoint() {
        let fm = Transponder {
            uuid: "x".into(),
            mode: Some("FM".into()),
            description: String::new(),
            downlink_low: Some(436_795_000),
            downlink_high: None,
            uplink_low: Some(145_850_000),
            uplink_high: None,
        };
        assert_eq!(fm.start_frequencies(), (Some(436_795_000), Some(145_850_000)));

        let linear = Transponder {
            downlink_high: Some(436_805_001),
            uplink_low: None,
            ..fm
        };
        assert_eq!(linear.start_frequencies(), (Some(436_800_000), None));
    }

    #[test]
    fn lists_and_selects_by_uuid() {
        let (catalog, dir) = catalog();
        let all = catalog.list(27607).unwrap();
        assert_eq!(all.len(), 2);

        let linear = catalog.get(27607, "a7sBq2ZmMkd9Z4RkGgTSdv").unwrap();
        assert_eq!(linear.mode.as_deref(), Some("USB"));
        assert_eq!(linear.start_frequencies(), (Some(435_015_000), Some(145_915_000)));

        assert!(matches!(
            catalog.get(27607, "nope"),
            Err(TransponderError::UnknownUuid { .. })
        ));
        assert!(matches!(catalog.list(1), Err(TransponderError::NoFile(1))));
        assert!(matches!(catalog.list(99999), Err(TransponderError::Json { .. })));
        let _ = fs::remove_dir_all(dir);
    }
}
