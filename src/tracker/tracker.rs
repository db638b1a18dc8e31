use chrono::Utc;

use crate::abort::AbortSignal;
use crate::device::DaemonLauncher;
use crate::predict::{find_next_pass, TleLoader, NEXT_PASS_HORIZON};
use crate::radio::{Radio, RadioConfig, UsbOverrides};
use crate::rotor::{Rotor, RotorConfig};
use crate::settings::Settings;
use crate::transponder::TransponderCatalog;
use crate::tracker::{Devices, Session, TrackerError, TrackingState};

/// Everything the operator asked for on the command line.
#[derive(Debug, Clone, Default)]
pub struct TrackRequest {
    pub satellite: String,
    pub rotor: Option<String>,
    pub radio: Option<String>,
    pub rotor_usb: Option<String>,
    pub radio_usb: UsbOverrides,
    pub transponder: Option<String>,
    pub downlink_hz: Option<u64>,
    pub uplink_hz: Option<u64>,
}

impl TrackRequest {
    pub fn new(satellite: impl Into<String>) -> Self {
        Self {
            satellite: satellite.into(),
            ..Self::default()
        }
    }
}

impl From<&Settings> for DaemonLauncher {
    fn from(settings: &Settings) -> Self {
        let daemons = &settings.daemons;
        Self {
            host: daemons.host.clone(),
            rotctld: daemons.rotctld.clone(),
            rigctld: daemons.rigctld.clone(),
            startup_grace: daemons.startup_grace,
            connect_timeout: daemons.connect_timeout,
        }
    }
}

/// Track the next pass of `request.satellite` until cancelled.
///
/// All configuration is validated before any daemon is started. Once
/// devices are open, every exit path releases them. Cancellation at any
/// point is an orderly end and yields `Ok`.
pub fn track(
    settings: &Settings,
    request: &TrackRequest,
    abort: &AbortSignal,
) -> Result<(), TrackerError> {
    match prepare_and_run(settings, request, abort) {
        Err(TrackerError::Cancelled(_)) => {
            log::info!("Interrupted before tracking started, shutting down");
            Ok(())
        }
        result => result,
    }
}

fn prepare_and_run(
    settings: &Settings,
    request: &TrackRequest,
    abort: &AbortSignal,
) -> Result<(), TrackerError> {
    log::debug!("{}", TrackingState::Validating);
    if request.rotor.is_none() && request.radio.is_none() {
        return Err(TrackerError::NoControlSurface);
    }

    let station = settings.ground_station()?;
    if let Some(name) = &settings.station.name {
        log::info!("Station {}", name);
    }
    let rotor_config = request
        .rotor
        .as_deref()
        .map(|name| {
            RotorConfig::load(
                &settings.paths.rotor_config_dir,
                name,
                request.rotor_usb.as_deref(),
            )
        })
        .transpose()?;
    let radio_config = request
        .radio
        .as_deref()
        .map(|name| RadioConfig::load(&settings.paths.radio_config_dir, name, &request.radio_usb))
        .transpose()?;

    abort.check()?;
    log::debug!("{}", TrackingState::Predicting);
    let mut loader = TleLoader::new(settings.paths.tle_dir.clone());
    loader.load_all()?;
    let satellite = loader.resolve(&request.satellite)?;
    log::info!(
        "Tracking {} (NORAD {}) from {}",
        satellite.info.name,
        satellite.info.norad_id,
        satellite.info.tle_source
    );

    let (downlink_hz, uplink_hz) = match &radio_config {
        Some(_) => select_frequencies(settings, request, satellite.info.norad_id)?,
        None => (None, None),
    };

    let pass = find_next_pass(satellite, &station, Utc::now(), NEXT_PASS_HORIZON)?;
    log::info!(
        "Found next pass at {} UTC with an initial azimuth of {}°",
        pass.rise_time.format("%H:%M:%S"),
        pass.initial_azimuth_deg
    );

    abort.check()?;
    let devices = open_devices(
        &DaemonLauncher::from(settings),
        rotor_config,
        radio_config.as_ref(),
        downlink_hz,
        uplink_hz,
        abort,
    )?;

    log::info!("Ready to start");
    Session::new(
        station,
        satellite,
        pass,
        settings.tracking.update_interval,
        devices,
    )
    .run(abort)?;
    Ok(())
}

/// Downlink and uplink for the radio. Explicit values win over the
/// selected transponder.
fn select_frequencies(
    settings: &Settings,
    request: &TrackRequest,
    norad_id: u32,
) -> Result<(Option<u64>, Option<u64>), TrackerError> {
    let catalog = TransponderCatalog::new(settings.paths.transponder_dir.clone());

    let (mut downlink, mut uplink) = match &request.transponder {
        Some(uuid) => {
            let transponder = catalog.get(norad_id, uuid)?;
            log::info!(
                "Using transponder {} ({})",
                transponder.description,
                transponder.mode.as_deref().unwrap_or("unknown mode")
            );
            transponder.start_frequencies()
        }
        None => (None, None),
    };
    if request.downlink_hz.is_some() {
        downlink = request.downlink_hz;
    }
    if request.uplink_hz.is_some() {
        uplink = request.uplink_hz;
    }

    if downlink.is_none() && uplink.is_none() {
        match catalog.list(norad_id) {
            Ok(transponders) => {
                log::info!("Available transponders:");
                for t in transponders {
                    log::info!(
                        "  {}  {}  {}",
                        t.uuid,
                        t.mode.as_deref().unwrap_or("-"),
                        t.description
                    );
                }
            }
            Err(e) => log::warn!("{}", e),
        }
        return Err(TrackerError::NoFrequencies);
    }

    Ok((downlink, uplink))
}

/// Bring up the requested devices. A failed rotor or radio is dropped
/// when the other one is usable.
fn open_devices(
    launcher: &DaemonLauncher,
    rotor_config: Option<RotorConfig>,
    radio_config: Option<&RadioConfig>,
    downlink_hz: Option<u64>,
    uplink_hz: Option<u64>,
    abort: &AbortSignal,
) -> Result<Devices, TrackerError> {
    let mut devices = Devices::default();

    let rotor_error = match rotor_config {
        Some(config) => match Rotor::start(config, launcher) {
            Ok(rotor) => {
                devices.rotor = Some(rotor);
                None
            }
            Err(e) => Some(e),
        },
        None => None,
    };
    abort.check()?;

    let Some(radio_config) = radio_config else {
        return match rotor_error {
            Some(e) => Err(e.into()),
            None => Ok(devices),
        };
    };

    match Radio::start(radio_config, downlink_hz, uplink_hz, launcher) {
        Ok(radio) if radio.is_usable() => devices.radio = Some(radio),
        Ok(mut radio) => {
            radio.close();
            if devices.rotor.is_none() {
                return Err(match rotor_error {
                    Some(e) => e.into(),
                    None => TrackerError::NoUsableChannel(radio_config.name.clone()),
                });
            }
            log::warn!(
                "Radio '{}' has no usable channel, continuing with the rotor only",
                radio_config.name
            );
        }
        Err(e) => {
            if devices.rotor.is_none() {
                return Err(rotor_error.unwrap_or(e).into());
            }
            log::error!("Failed to start radio '{}': {}", radio_config.name, e);
            log::warn!("Continuing with the rotor only");
        }
    }
    abort.check()?;

    if let Some(e) = rotor_error {
        log::error!("Failed to start rotor: {}", e);
        log::warn!("Continuing with the radio only");
    }
    Ok(devices)
}
