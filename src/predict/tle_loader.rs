use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::predict::error::PredictError;
use crate::predict::propagation::SatelliteEphemeris;

pub struct TleLoader {
    tle_dir: PathBuf,
    satellites: BTreeMap<u32, SatelliteEphemeris>,
}

impl TleLoader {
    pub fn new(tle_dir: PathBuf) -> Self {
        Self {
            tle_dir,
            satellites: BTreeMap::new(),
        }
    }

    /// Load all TLE files from the directory
    pub fn load_all(&mut self) -> Result<(), PredictError> {
        if !self.tle_dir.exists() {
            return Err(PredictError::DirectoryNotFound(
                self.tle_dir.display().to_string(),
            ));
        }

        self.satellites.clear();

        for entry in fs::read_dir(&self.tle_dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let is_tle = path
                .extension()
                .map(|ext| ext == "tle" || ext == "txt")
                .unwrap_or(false);
            if !is_tle {
                continue;
            }

            match parse_tle_file(&path) {
                Ok(entries) => {
                    for sat in entries {
                        self.satellites.insert(sat.info.norad_id, sat);
                    }
                }
                Err(e) => {
                    log::warn!("Failed to parse TLE file {}: {}", path.display(), e);
                }
            }
        }

        log::debug!(
            "Loaded {} satellites from {}",
            self.satellites.len(),
            self.tle_dir.display()
        );
        Ok(())
    }

    #[cfg(test)]
    fn insert(&mut self, sat: SatelliteEphemeris) {
        self.satellites.insert(sat.info.norad_id, sat);
    }

    /// Resolve a NORAD ID, COSPAR designator or (partial) satellite name.
    pub fn resolve(&self, identifier: &str) -> Result<&SatelliteEphemeris, PredictError> {
        let query = identifier.trim();
        let not_found = || PredictError::NotFound(query.to_string());

        if !query.is_empty() && query.chars().all(|c| c.is_ascii_digit()) {
            let norad_id: u32 = query.parse().map_err(|_| not_found())?;
            return self.satellites.get(&norad_id).ok_or_else(not_found);
        }

        if let Some(cospar) = CosparId::parse(query) {
            return self
                .satellites
                .values()
                .find(|sat| {
                    sat.info
                        .international_designator
                        .as_deref()
                        .map(|d| cospar.matches(d))
                        .unwrap_or(false)
                })
                .ok_or_else(not_found);
        }

        let needle = normalize_name(query);
        let hits: Vec<&SatelliteEphemeris> = self
            .satellites
            .values()
            .filter(|sat| normalize_name(&sat.info.name).contains(&needle))
            .collect();

        match hits.as_slice() {
            [] => Err(not_found()),
            [single] => Ok(*single),
            many => {
                // An exact name match wins over substring hits.
                if let Some(exact) = many.iter().find(|s| normalize_name(&s.info.name) == needle) {
                    return Ok(*exact);
                }
                Err(PredictError::Ambiguous {
                    query: query.to_string(),
                    candidates: many
                        .iter()
                        .map(|s| format!("{} ({})", s.info.name, s.info.norad_id))
                        .collect::<Vec<_>>()
                        .join(", "),
                })
            }
        }
    }
}

/// International designator in `YYYY-NNNP` form.
struct CosparId {
    year: String,
    launch: String,
    piece: String,
}

impl CosparId {
    fn parse(s: &str) -> Option<Self> {
        let (year, rest) = s.split_once('-')?;
        if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if !rest.is_ascii() || rest.len() < 4 || rest.len() > 6 {
            return None;
        }
        let (launch, piece) = rest.split_at(3);
        if !launch.chars().all(|c| c.is_ascii_digit())
            || !piece.chars().all(|c| c.is_ascii_uppercase())
        {
            return None;
        }
        Some(Self {
            year: year.to_string(),
            launch: launch.to_string(),
            piece: piece.to_string(),
        })
    }

    /// Accepts both `1998-067A` and the TLE column form `98067A`.
    fn matches(&self, designator: &str) -> bool {
        let designator = designator.trim();
        let full = format!("{}-{}{}", self.year, self.launch, self.piece);
        let short = format!("{}{}{}", &self.year[2..], self.launch, self.piece);
        designator == full || designator == short
    }
}

fn normalize_name(name: &str) -> String {
    name.to_lowercase().replace('-', " ")
}

fn parse_tle_file(path: &Path) -> Result<Vec<SatelliteEphemeris>, PredictError> {
    let content = fs::read_to_string(path)?;
    let filename = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    parse_multi_tle(&content)
        .into_iter()
        .map(|(name, line1, line2)| SatelliteEphemeris::from_tle(name, &line1, &line2, &filename))
        .collect()
}

/// Parse multi-satellite TLE content
fn parse_multi_tle(content: &str) -> Vec<(Option<String>, String, String)> {
    let lines: Vec<&str> = content
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    let mut result = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].starts_with("1 ") && i + 1 < lines.len() && lines[i + 1].starts_with("2 ") {
            // 2-line TLE (no name)
            result.push((None, lines[i].to_string(), lines[i + 1].to_string()));
            i += 2;
        } else if i + 2 < lines.len()
            && lines[i + 1].starts_with("1 ")
            && lines[i + 2].starts_with("2 ")
        {
            result.push((
                Some(lines[i].to_string()),
                lines[i + 1].to_string(),
                lines[i + 2].to_string(),
            ));
            i += 3;
        } else {
            i += 1; // Skip unknown line
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::types::SatelliteInfo;

    const ISS_LINE1: &str =
        "1 25544U 98067A   20194.88612269 -.00002218  00000-0 -31515-4 0  9992";
    const ISS_LINE2: &str =
        "2 25544  51.6461 221.2784 0001413  89.1723 280.4612 15.49507896236008";

    fn loader_with(names: &[(&str, u32, &str)]) -> TleLoader {
        let mut loader = TleLoader::new(PathBuf::from("unused"));
        for (name, norad_id, designator) in names {
            let mut sat =
                SatelliteEphemeris::from_tle(None, ISS_LINE1, ISS_LINE2, "test.tle").unwrap();
            sat.info = SatelliteInfo {
                name: name.to_string(),
                norad_id: *norad_id,
                international_designator: Some(designator.to_string()),
                tle_source: "test.tle".into(),
            };
            loader.insert(sat);
        }
        loader
    }

    #[test]
    fn parses_two_and_three_line_sets() {
        let content = format!(
            "ISS (ZARYA)\n{ISS_LINE1}\n{ISS_LINE2}\n\n{ISS_LINE1}\n{ISS_LINE2}\nstray line\n"
        );
        let parsed = parse_multi_tle(&content);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].0.as_deref(), Some("ISS (ZARYA)"));
        assert_eq!(parsed[1].0, None);
    }

    #[test]
    fn non_ascii_designator_is_not_found() {
        let loader = loader_with(&[("ISS (ZARYA)", 25544, "1998-067A")]);
        assert!(matches!(loader.resolve("1998-0€"), Err(PredictError::NotFound(_))));
        assert!(matches!(loader.resolve("1998-06ÄA"), Err(PredictError::NotFound(_))));
    }

    #[test]
    fn resolves_by_norad_id() {
        let loader = loader_with(&[("ISS (ZARYA)", 25544, "1998-067A"), ("SO-50", 27607, "2002-058C")]);
        assert_eq!(loader.resolve("27607").unwrap().info.name, "SO-50");
        assert!(matches!(loader.resolve("11111"), Err(PredictError::NotFound(_))));
    }

    #[test]
    fn resolves_by_cospar_in_either_form() {
        let loader = loader_with(&[("ISS (ZARYA)", 25544, "98067A"), ("SO-50", 27607, "2002-058C")]);
        assert_eq!(loader.resolve("1998-067A").unwrap().info.norad_id, 25544);
        assert_eq!(loader.resolve("2002-058C").unwrap().info.norad_id, 27607);
        assert!(loader.resolve("2002-058D").is_err());
    }

    #[test]
    fn resolves_by_name_ignoring_case_and_dashes() {
        let loader = loader_with(&[
            ("SAUDISAT 1C (SO-50)", 27607, "2002-058C"),
            ("AO-91", 43017, "2017-073E"),
            ("AO-92", 43137, "2018-004AC"),
        ]);
        assert_eq!(loader.resolve("so 50").unwrap().info.norad_id, 27607);
        assert_eq!(loader.resolve("ao-91").unwrap().info.norad_id, 43017);
        assert!(matches!(
            loader.resolve("AO-9"),
            Err(PredictError::Ambiguous { .. })
        ));
        assert!(matches!(loader.resolve("XW-2"), Err(PredictError::NotFound(_))));
    }

    #[test]
    fn missing_directory_is_reported() {
        let mut loader = TleLoader::new(PathBuf::from("/nonexistent/satgs-tle"));
        assert!(matches!(
            loader.load_all(),
            Err(PredictError::DirectoryNotFound(_))
        ));
    }
}
