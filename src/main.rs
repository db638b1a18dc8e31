mod abort;
mod device;
mod predict;
mod radio;
mod rotor;
mod settings;
mod tracker;
mod transponder;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{Duration, Local, Utc};
use clap::{Parser, Subcommand};
use log::{Level, LevelFilter};

use crate::abort::AbortSignal;
use crate::device::list_configs;
use crate::predict::{find_passes, TleLoader};
use crate::radio::UsbOverrides;
use crate::settings::Settings;
use crate::tracker::{track, TrackRequest};
use crate::transponder::TransponderCatalog;

const MAX_PASS_HOURS: i64 = 14 * 24;

#[derive(Parser)]
#[command(name = "satgs")]
#[command(about = "Ground station rotor and radio Doppler tracking")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Station settings file
    #[arg(long, global = true, default_value = "settings.yaml")]
    settings: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track the next pass of a satellite with a rotor, a radio or both
    Track {
        /// NORAD ID, COSPAR designator or name
        satellite: String,
        /// Rotor config name
        #[arg(long)]
        rotor: Option<String>,
        /// Radio config name
        #[arg(long)]
        radio: Option<String>,
        /// Override the rotor USB port
        #[arg(long)]
        rotor_usb: Option<String>,
        /// Override the receiver USB port
        #[arg(long)]
        rx_usb: Option<String>,
        /// Override the transmitter USB port
        #[arg(long)]
        tx_usb: Option<String>,
        /// Transponder UUID from the catalog
        #[arg(long)]
        transponder: Option<String>,
        /// Nominal downlink in Hz
        #[arg(long)]
        downlink: Option<u64>,
        /// Nominal uplink in Hz
        #[arg(long)]
        uplink: Option<u64>,
    },
    /// List upcoming passes of a satellite
    Pass {
        satellite: String,
        /// Search window, up to two weeks
        #[arg(long, default_value_t = 24, value_parser = clap::value_parser!(i64).range(1..=MAX_PASS_HOURS))]
        hours: i64,
    },
    /// List rotor configs
    Rotors,
    /// List radio configs
    Radios,
    /// List known transponders of a satellite
    Transponders { satellite: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let settings = match Settings::from_file(&cli.settings) {
        Ok(s) => s,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Track {
            satellite,
            rotor,
            radio,
            rotor_usb,
            rx_usb,
            tx_usb,
            transponder,
            downlink,
            uplink,
        } => {
            let request = TrackRequest {
                rotor,
                radio,
                rotor_usb,
                radio_usb: UsbOverrides {
                    rx: rx_usb,
                    tx: tx_usb,
                },
                transponder,
                downlink_hz: downlink,
                uplink_hz: uplink,
                ..TrackRequest::new(satellite)
            };
            run_track(&settings, &request)
        }
        Commands::Pass { satellite, hours } => list_passes(&settings, &satellite, hours),
        Commands::Rotors => list_names("rotor", &settings.paths.rotor_config_dir),
        Commands::Radios => list_names("radio", &settings.paths.radio_config_dir),
        Commands::Transponders { satellite } => list_transponders(&settings, &satellite),
    }
}

fn init_logging(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            let tag = match record.level() {
                Level::Error => 'E',
                Level::Warn => 'W',
                Level::Info => 'I',
                Level::Debug => 'D',
                Level::Trace => 'T',
            };
            writeln!(
                buf,
                "[{}] ({}) {}",
                Local::now().format("%H:%M:%S"),
                tag,
                record.args()
            )
        })
        .init();
}

fn run_track(settings: &Settings, request: &TrackRequest) -> ExitCode {
    let abort = AbortSignal::new();
    if let Err(e) = abort.install_ctrl_c() {
        log::warn!("Could not install Ctrl-C handler: {}", e);
    }

    match track(settings, request, &abort) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_tles(settings: &Settings) -> Result<TleLoader, predict::PredictError> {
    let mut loader = TleLoader::new(settings.paths.tle_dir.clone());
    loader.load_all()?;
    Ok(loader)
}

fn list_passes(settings: &Settings, satellite: &str, hours: i64) -> ExitCode {
    let station = match settings.ground_station() {
        Ok(s) => s,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let loader = match load_tles(settings) {
        Ok(l) => l,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let ephemeris = match loader.resolve(satellite) {
        Ok(e) => e,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let start = Utc::now();
    match find_passes(ephemeris, &station, start, start + Duration::hours(hours)) {
        Ok(passes) if passes.is_empty() => {
            println!("No passes of {} in the next {} hours", ephemeris.info.name, hours);
            ExitCode::SUCCESS
        }
        Ok(passes) => {
            println!("Passes of {} (NORAD {}):", ephemeris.info.name, ephemeris.info.norad_id);
            for pass in passes {
                println!(
                    "  rise {}  az {:>6.1}°  max {:>5.1}° at {}  set {}  az {:>6.1}°  ({} min)",
                    pass.aos.format("%Y-%m-%d %H:%M:%S"),
                    pass.aos_azimuth_deg,
                    pass.max_elevation_deg,
                    pass.tca.format("%H:%M:%S"),
                    pass.los.format("%H:%M:%S"),
                    pass.los_azimuth_deg,
                    pass.duration_seconds / 60
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn list_names(kind: &str, dir: &Path) -> ExitCode {
    match list_configs(dir) {
        Ok(names) if names.is_empty() => {
            println!("No {} configs in {}", kind, dir.display());
            ExitCode::SUCCESS
        }
        Ok(names) => {
            for name in names {
                println!("{}", name);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Error reading {}: {}", dir.display(), e);
            ExitCode::FAILURE
        }
    }
}

fn list_transponders(settings: &Settings, satellite: &str) -> ExitCode {
    let loader = match load_tles(settings) {
        Ok(l) => l,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let norad_id = match loader.resolve(satellite) {
        Ok(e) => e.info.norad_id,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let catalog = TransponderCatalog::new(settings.paths.transponder_dir.clone());
    match catalog.list(norad_id) {
        Ok(transponders) => {
            for t in transponders {
                let (down, up) = t.start_frequencies();
                println!(
                    "{}  {:<6}  D: {}  U: {}  {}",
                    t.uuid,
                    t.mode.as_deref().unwrap_or("-"),
                    mhz(down),
                    mhz(up),
                    t.description
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn mhz(hz: Option<u64>) -> String {
    hz.map(|f| format!("{:.4}M", f as f64 / 1_000_000.0))
        .unwrap_or_else(|| "-".to_string())
}
