use std::time::Duration;

use chrono::Utc;

use crate::abort::AbortSignal;
use crate::predict::{Ephemeris, GroundStation, PassWindow};
use crate::radio::Radio;
use crate::rotor::Rotor;
use crate::tracker::{TrackerError, TrackingState};

const ALIGN_TOLERANCE_DEG: i32 = 2;
const ALIGN_POLL: Duration = Duration::from_millis(500);
const FINAL_COUNTDOWN_SECS: f64 = 10.0;

/// What a teardown actually released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub rotor: bool,
    pub radio: bool,
}

/// Every device a session opened. Released exactly once, either by
/// [`Devices::teardown`] or on drop.
#[derive(Debug, Default)]
pub struct Devices {
    pub rotor: Option<Rotor>,
    pub radio: Option<Radio>,
}

impl Devices {
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.rotor.is_none() && self.radio.is_none()
    }

    pub fn teardown(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();
        if let Some(mut rotor) = self.rotor.take() {
            log::debug!("Shutting down rotor '{}'", rotor.config().name);
            rotor.close();
            report.rotor = true;
        }
        if let Some(mut radio) = self.radio.take() {
            log::debug!("Shutting down radio '{}'", radio.name());
            radio.close();
            report.radio = true;
        }
        report
    }
}

impl Drop for Devices {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// One pass of one satellite, from pre-positioning to teardown.
pub struct Session<'e, E: Ephemeris + ?Sized> {
    station: GroundStation,
    ephemeris: &'e E,
    pass: PassWindow,
    interval: Duration,
    devices: Devices,
    state: TrackingState,
}

impl<'e, E: Ephemeris + ?Sized> Session<'e, E> {
    pub fn new(
        station: GroundStation,
        ephemeris: &'e E,
        pass: PassWindow,
        interval: Duration,
        devices: Devices,
    ) -> Self {
        Self {
            station,
            ephemeris,
            pass,
            interval,
            devices,
            state: TrackingState::Predicting,
        }
    }

    /// Run until the operator cancels or a device fails. Devices are torn
    /// down before this returns, whatever the outcome. Cancellation is an
    /// orderly end and yields `Ok`.
    pub fn run(mut self, abort: &AbortSignal) -> Result<TeardownReport, TrackerError> {
        let result = self.drive(abort);

        match &result {
            Err(TrackerError::Cancelled(_)) => {
                log::info!("Caught keyboard interrupt, shutting down subprocesses");
            }
            Err(e) => {
                log::error!("Caught error, shutting down subprocesses");
                log::error!("{}", e);
            }
            Ok(()) => {}
        }
        self.enter(TrackingState::Aborting);

        let report = self.devices.teardown();
        self.enter(TrackingState::Completed);
        log::info!("Pass completed!");

        match result {
            Ok(()) | Err(TrackerError::Cancelled(_)) => Ok(report),
            Err(e) => Err(e),
        }
    }

    fn drive(&mut self, abort: &AbortSignal) -> Result<(), TrackerError> {
        abort.check()?;
        if self.devices.rotor.is_some() {
            self.enter(TrackingState::PrePositioning);
            self.pre_position(abort)?;
        }

        self.enter(TrackingState::WaitingForRise);
        self.wait_for_rise(abort)?;

        self.enter(TrackingState::Tracking);
        loop {
            self.step()?;
            abort.sleep(self.interval)?;
        }
    }

    fn pre_position(&mut self, abort: &AbortSignal) -> Result<(), TrackerError> {
        let Some(rotor) = self.devices.rotor.as_mut() else {
            return Ok(());
        };
        let target = self.pass.initial_azimuth_deg;

        log::info!("Rotating to starting azimuth");
        rotor.update(target, 0)?;
        loop {
            let aligned = rotor
                .current_position()
                .map(|p| (target - p.azimuth_deg).abs() <= ALIGN_TOLERANCE_DEG)
                .unwrap_or(false);
            if aligned {
                break;
            }
            rotor.update_current_position()?;
            abort.sleep(ALIGN_POLL)?;
        }
        log::info!("Rotor is at start azimuth");
        Ok(())
    }

    fn wait_for_rise(&self, abort: &AbortSignal) -> Result<(), TrackerError> {
        let seconds = (self.pass.rise_time - Utc::now()).num_milliseconds() as f64 / 1000.0;

        if seconds > FINAL_COUNTDOWN_SECS {
            if seconds > 60.0 {
                log::info!(
                    "Waiting for pass to start ({} min)",
                    (seconds / 60.0).round()
                );
            } else {
                log::info!("Waiting for pass to start ({}s)", seconds.round());
            }
            abort.sleep(Duration::from_secs_f64(seconds - FINAL_COUNTDOWN_SECS))?;
            log::info!("Pass starting in 10 seconds!");
            abort.sleep(Duration::from_secs_f64(FINAL_COUNTDOWN_SECS))?;
        } else {
            let seconds = seconds.max(0.0);
            log::info!("Pass starting in {} seconds!", seconds.round());
            abort.sleep(Duration::from_secs_f64(seconds))?;
        }
        Ok(())
    }

    fn step(&mut self) -> Result<(), TrackerError> {
        let observation = self.ephemeris.observe(&self.station, Utc::now())?;
        let (azimuth, elevation) = observation.look_angles();

        if let Some(rotor) = self.devices.rotor.as_mut() {
            rotor.update(azimuth, elevation)?;
        }

        let mut status = format!("AZ: {}°  EL: {}°", azimuth, elevation);
        if let Some(radio) = self.devices.radio.as_mut() {
            radio.update(observation.range_rate_km_s)?;
            let frequencies = radio.status();
            if !frequencies.is_empty() {
                status.push_str("     ");
                status.push_str(&frequencies);
            }
        }

        log::info!("{}", status);
        Ok(())
    }

    fn enter(&mut self, state: TrackingState) {
        log::debug!("{} -> {}", self.state, state);
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::FakeDaemon;
    use crate::device::ProtocolClient;
    use crate::predict::{Observation, PredictError};
    use crate::radio::{Channel, ChannelKind, Link};
    use crate::rotor::RotorConfig;
    use chrono::{DateTime, Duration as ChronoDuration};
    use std::thread;

    struct FixedSky {
        azimuth_deg: f64,
        elevation_deg: f64,
        range_rate_km_s: f64,
    }

    impl Ephemeris for FixedSky {
        fn name(&self) -> &str {
            "FIXED"
        }

        fn observe(
            &self,
            _station: &GroundStation,
            at: DateTime<Utc>,
        ) -> Result<Observation, PredictError> {
            Ok(Observation {
                timestamp: at,
                azimuth_deg: self.azimuth_deg,
                elevation_deg: self.elevation_deg,
                range_km: 1200.0,
                range_rate_km_s: self.range_rate_km_s,
            })
        }
    }

    struct BrokenSky;

    impl Ephemeris for BrokenSky {
        fn name(&self) -> &str {
            "BROKEN"
        }

        fn observe(&self, _: &GroundStation, _: DateTime<Utc>) -> Result<Observation, PredictError> {
            Err(PredictError::Propagation("decayed".into()))
        }
    }

    fn station() -> GroundStation {
        GroundStation::new(52.0, 4.3, 0.0)
    }

    fn pass_now(azimuth: i32) -> PassWindow {
        PassWindow {
            rise_time: Utc::now() - ChronoDuration::seconds(1),
            initial_azimuth_deg: azimuth,
        }
    }

    fn client(daemon: &FakeDaemon) -> ProtocolClient {
        ProtocolClient::connect("127.0.0.1", daemon.port(), Duration::from_secs(3)).unwrap()
    }

    fn rotor(daemon: &FakeDaemon) -> Rotor {
        let config = RotorConfig {
            name: "test".into(),
            usb_port: "/dev/null".into(),
            model_id: 1,
            daemon_port: daemon.port(),
            min_az: 0,
            max_az: 360,
            min_el: 0,
            max_el: 90,
            control_type: 1,
        };
        Rotor::from_parts(config, None, client(daemon))
    }

    fn cancel_after(abort: &AbortSignal, after: Duration) -> thread::JoinHandle<()> {
        let abort = abort.clone();
        thread::spawn(move || {
            thread::sleep(after);
            abort.trigger();
        })
    }

    #[test]
    fn tracks_until_cancelled_then_releases_everything() {
        let rotor_daemon = FakeDaemon::start(151.0, 0.0);
        let sdr_daemon = FakeDaemon::start(0.0, 0.0);
        let devices = Devices {
            rotor: Some(rotor(&rotor_daemon)),
            radio: Some(
                Radio::assemble("sdr", Some(435_000_000), None).with_channel(
                    ChannelKind::Sdr,
                    Channel::Connected(Link::new(client(&sdr_daemon), None, 0)),
                ),
            ),
        };
        let sky = FixedSky {
            azimuth_deg: 180.2,
            elevation_deg: -5.0,
            range_rate_km_s: 0.0,
        };

        let abort = AbortSignal::new();
        let canceller = cancel_after(&abort, Duration::from_millis(700));
        let session = Session::new(station(), &sky, pass_now(150), Duration::from_millis(100), devices);
        let report = session.run(&abort).unwrap();
        canceller.join().unwrap();

        assert_eq!(report, TeardownReport { rotor: true, radio: true });

        let rotor_commands = rotor_daemon.finish();
        // Pre-positioning first, then read-then-move pairs with the floor applied.
        assert_eq!(&rotor_commands[..2], ["p", "P 150 0"]);
        assert!(rotor_commands.len() >= 4);
        for pair in rotor_commands[2..].chunks(2) {
            assert_eq!(pair[0], "p");
            if pair.len() == 2 {
                assert_eq!(pair[1], "P 180 0");
            }
        }

        let sdr_commands = sdr_daemon.finish();
        assert!(!sdr_commands.is_empty());
        assert!(sdr_commands.iter().all(|c| c == "F 435000000"));
    }

    #[test]
    fn cancellation_during_alignment_still_tears_down() {
        // Rotor never reaches the target azimuth.
        let rotor_daemon = FakeDaemon::start(0.0, 0.0);
        let devices = Devices {
            rotor: Some(rotor(&rotor_daemon)),
            radio: None,
        };
        let sky = FixedSky {
            azimuth_deg: 0.0,
            elevation_deg: 0.0,
            range_rate_km_s: 0.0,
        };

        let abort = AbortSignal::new();
        let canceller = cancel_after(&abort, Duration::from_millis(1200));
        let report = Session::new(station(), &sky, pass_now(200), Duration::from_secs(1), devices)
            .run(&abort)
            .unwrap();
        canceller.join().unwrap();

        assert_eq!(report, TeardownReport { rotor: true, radio: false });
        let commands = rotor_daemon.finish();
        assert_eq!(&commands[..2], ["p", "P 200 0"]);
        assert!(commands[2..].iter().all(|c| c == "p"));
        assert!(!commands.iter().any(|c| c.starts_with("P 0")));
    }

    #[test]
    fn errors_propagate_after_teardown() {
        let sdr_daemon = FakeDaemon::start(0.0, 0.0);
        let devices = Devices {
            rotor: None,
            radio: Some(Radio::assemble("sdr", Some(145_000_000), None).with_channel(
                ChannelKind::Sdr,
                Channel::Connected(Link::new(client(&sdr_daemon), None, 0)),
            )),
        };

        let err = Session::new(station(), &BrokenSky, pass_now(0), Duration::from_millis(50), devices)
            .run(&AbortSignal::new())
            .unwrap_err();
        assert!(matches!(err, TrackerError::Predict(_)));
        assert!(sdr_daemon.finish().is_empty());
    }

    fn pass_in(seconds: i64, azimuth: i32) -> PassWindow {
        PassWindow {
            rise_time: Utc::now() + ChronoDuration::seconds(seconds),
            initial_azimuth_deg: azimuth,
        }
    }

    #[test]
    fn cancelled_during_the_final_countdown() {
        // 11 s out: one second of waiting, then the 10 s countdown.
        let rotor_daemon = FakeDaemon::start(90.0, 0.0);
        let devices = Devices {
            rotor: Some(rotor(&rotor_daemon)),
            radio: None,
        };
        let sky = FixedSky {
            azimuth_deg: 95.0,
            elevation_deg: 1.0,
            range_rate_km_s: 0.0,
        };

        let abort = AbortSignal::new();
        let canceller = cancel_after(&abort, Duration::from_millis(2500));
        let started = std::time::Instant::now();
        let report = Session::new(station(), &sky, pass_in(11, 90), Duration::from_secs(1), devices)
            .run(&abort)
            .unwrap();
        canceller.join().unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(2500));
        assert!(elapsed < Duration::from_secs(5));
        assert_eq!(report, TeardownReport { rotor: true, radio: false });
        // Aligned on the first read, never reached tracking.
        assert_eq!(rotor_daemon.finish(), vec!["p", "P 90 0"]);
    }

    #[test]
    fn cancelled_during_a_long_wait() {
        let sky = FixedSky {
            azimuth_deg: 0.0,
            elevation_deg: 0.0,
            range_rate_km_s: 0.0,
        };
        for seconds in [45, 90 * 60] {
            let abort = AbortSignal::new();
            let canceller = cancel_after(&abort, Duration::from_millis(300));
            let started = std::time::Instant::now();
            let report =
                Session::new(station(), &sky, pass_in(seconds, 0), Duration::from_secs(1), Devices::default())
                    .run(&abort)
                    .unwrap();
            canceller.join().unwrap();
            assert!(started.elapsed() < Duration::from_secs(2));
            assert_eq!(report, TeardownReport::default());
        }
    }

    #[test]
    fn rotor_fault_ends_the_session_after_teardown() {
        let rotor_daemon = FakeDaemon::failing(-5);
        let devices = Devices {
            rotor: Some(rotor(&rotor_daemon)),
            radio: None,
        };
        let sky = FixedSky {
            azimuth_deg: 0.0,
            elevation_deg: 0.0,
            range_rate_km_s: 0.0,
        };
        let err = Session::new(station(), &sky, pass_now(100), Duration::from_secs(1), devices)
            .run(&AbortSignal::new())
            .unwrap_err();
        assert!(matches!(
            err,
            TrackerError::Device(crate::device::DeviceError::Protocol { .. })
        ));
        assert_eq!(rotor_daemon.finish(), vec!["p"]);
    }

    #[test]
    fn cancelled_before_start_opens_nothing_new() {
        let abort = AbortSignal::new();
        abort.trigger();
        let sky = FixedSky {
            azimuth_deg: 0.0,
            elevation_deg: 0.0,
            range_rate_km_s: 0.0,
        };
        let report = Session::new(station(), &sky, pass_now(0), Duration::from_secs(1), Devices::default())
            .run(&abort)
            .unwrap();
        assert_eq!(report, TeardownReport::default());
    }

    #[test]
    fn teardown_releases_only_what_was_opened_and_only_once() {
        let mut none = Devices::default();
        assert_eq!(none.teardown(), TeardownReport::default());

        let daemon = FakeDaemon::start(0.0, 0.0);
        let mut rotor_only = Devices {
            rotor: Some(rotor(&daemon)),
            radio: None,
        };
        assert_eq!(rotor_only.teardown(), TeardownReport { rotor: true, radio: false });
        assert_eq!(rotor_only.teardown(), TeardownReport::default());
        assert!(rotor_only.is_empty());
        assert!(daemon.finish().is_empty());

        let rotor_daemon = FakeDaemon::start(0.0, 0.0);
        let sdr_daemon = FakeDaemon::start(0.0, 0.0);
        let mut both = Devices {
            rotor: Some(rotor(&rotor_daemon)),
            radio: Some(Radio::assemble("sdr", None, None).with_channel(
                ChannelKind::Sdr,
                Channel::Connected(Link::new(client(&sdr_daemon), None, 0)),
            )),
        };
        assert_eq!(both.teardown(), TeardownReport { rotor: true, radio: true });
        drop(both);
        rotor_daemon.finish();
        sdr_daemon.finish();
    }
}
