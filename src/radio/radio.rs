use strum_macros::Display;

use crate::device::{
    free_local_port, DaemonLauncher, DaemonProcess, DaemonSpec, DeviceError, ProtocolClient,
};
use crate::radio::{doppler_corrected, ChannelConfig, RadioConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ChannelKind {
    Sdr,
    Rx,
    Tx,
}

impl ChannelKind {
    fn link(&self) -> &'static str {
        match self {
            ChannelKind::Sdr | ChannelKind::Rx => "downlink",
            ChannelKind::Tx => "uplink",
        }
    }
}

/// Whether a channel takes part in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    NotConfigured,
    MissingFrequency,
    Active,
}

/// A channel runs only when it is configured and its link frequency is known.
pub fn activation(configured: bool, frequency_hz: Option<u64>) -> Activation {
    match (configured, frequency_hz) {
        (false, _) => Activation::NotConfigured,
        (true, None) => Activation::MissingFrequency,
        (true, Some(_)) => Activation::Active,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InertReason {
    MissingFrequency,
    Unreachable(String),
}

impl std::fmt::Display for InertReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InertReason::MissingFrequency => write!(f, "no frequency to follow"),
            InertReason::Unreachable(reason) => write!(f, "unreachable ({})", reason),
        }
    }
}

/// An open connection to one rigctl server.
#[derive(Debug)]
pub struct Link {
    client: ProtocolClient,
    daemon: Option<DaemonProcess>,
    offset_hz: i64,
}

impl Link {
    pub fn new(client: ProtocolClient, daemon: Option<DaemonProcess>, offset_hz: i64) -> Self {
        Self {
            client,
            daemon,
            offset_hz,
        }
    }

    fn set_frequency(&mut self, hz: impl std::fmt::Display) -> Result<(), DeviceError> {
        self.client.send(&format!("F {}", hz))?;
        Ok(())
    }

    fn close(&mut self) {
        self.client.close();
        if let Some(daemon) = self.daemon.as_mut() {
            daemon.terminate();
        }
    }
}

/// A configured channel. Unconfigured channels are `None` on [`Radio`].
#[derive(Debug)]
pub enum Channel {
    Inert(InertReason),
    Connected(Link),
}

impl Channel {
    pub fn is_connected(&self) -> bool {
        matches!(self, Channel::Connected(_))
    }

    fn link(&mut self) -> Option<&mut Link> {
        match self {
            Channel::Connected(link) => Some(link),
            Channel::Inert(_) => None,
        }
    }
}

/// Doppler-tracking front end for up to three rigctl servers.
#[derive(Debug)]
pub struct Radio {
    name: String,
    downlink_hz: Option<u64>,
    uplink_hz: Option<u64>,
    sdr: Option<Channel>,
    rx: Option<Channel>,
    tx: Option<Channel>,
    corrected_downlink: Option<f64>,
    corrected_uplink: Option<f64>,
}

impl Radio {
    /// Bring up every configured channel that has a frequency to follow.
    ///
    /// An unreachable SDR only disables that channel. A receiver or
    /// transmitter whose rigctld dies or cannot be reached fails the whole
    /// radio; channels that were already opened are closed on the way out.
    pub fn start(
        config: &RadioConfig,
        downlink_hz: Option<u64>,
        uplink_hz: Option<u64>,
        launcher: &DaemonLauncher,
    ) -> Result<Self, DeviceError> {
        let mut radio = Self::assemble(&config.name, downlink_hz, uplink_hz);

        if let Some(port) = config.sdr_port {
            radio.sdr = Some(match radio.prepare(ChannelKind::Sdr) {
                Activation::Active => {
                    match ProtocolClient::connect(&launcher.host, port, launcher.connect_timeout) {
                        Ok(client) => Channel::Connected(Link::new(client, None, 0)),
                        Err(e) => {
                            log::error!(
                                "Failed to open connection to SDR rigctl server, skipping it: {}",
                                e
                            );
                            Channel::Inert(InertReason::Unreachable(e.to_string()))
                        }
                    }
                }
                _ => Channel::Inert(InertReason::MissingFrequency),
            });
        }

        if let Some(rx) = &config.rx {
            radio.rx = Some(match radio.prepare(ChannelKind::Rx) {
                Activation::Active => Channel::Connected(start_rigctld(rx, launcher)?),
                _ => Channel::Inert(InertReason::MissingFrequency),
            });
        }

        if let Some(tx) = &config.tx {
            radio.tx = Some(match radio.prepare(ChannelKind::Tx) {
                Activation::Active => Channel::Connected(start_rigctld(tx, launcher)?),
                _ => Channel::Inert(InertReason::MissingFrequency),
            });
        }

        Ok(radio)
    }

    /// A radio with no channels; channels are attached with [`with_channel`](Self::with_channel).
    pub fn assemble(name: &str, downlink_hz: Option<u64>, uplink_hz: Option<u64>) -> Self {
        Self {
            name: name.to_string(),
            downlink_hz,
            uplink_hz,
            sdr: None,
            rx: None,
            tx: None,
            corrected_downlink: None,
            corrected_uplink: None,
        }
    }

    #[cfg(test)]
    pub fn with_channel(mut self, kind: ChannelKind, channel: Channel) -> Self {
        *self.slot(kind) = Some(channel);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[cfg(test)]
    pub fn channel(&self, kind: ChannelKind) -> Option<&Channel> {
        match kind {
            ChannelKind::Sdr => self.sdr.as_ref(),
            ChannelKind::Rx => self.rx.as_ref(),
            ChannelKind::Tx => self.tx.as_ref(),
        }
    }

    /// True when at least one channel can be tuned.
    pub fn is_usable(&self) -> bool {
        [&self.sdr, &self.rx, &self.tx]
            .into_iter()
            .flatten()
            .any(Channel::is_connected)
    }

    #[cfg(test)]
    pub fn corrected_downlink(&self) -> Option<f64> {
        self.corrected_downlink
    }

    #[cfg(test)]
    pub fn corrected_uplink(&self) -> Option<f64> {
        self.corrected_uplink
    }

    /// Recompute both links for `range_rate_km_s` and retune every
    /// connected channel.
    pub fn update(&mut self, range_rate_km_s: f64) -> Result<(), DeviceError> {
        if let Some(nominal) = self.downlink_hz {
            let corrected = doppler_corrected(nominal as f64, range_rate_km_s);
            self.corrected_downlink = Some(corrected);

            if let Some(link) = self.sdr.as_mut().and_then(Channel::link) {
                link.set_frequency(corrected)?;
            }
            if let Some(link) = self.rx.as_mut().and_then(Channel::link) {
                link.set_frequency(corrected.round() as i64 + link.offset_hz)?;
            }
        }

        if let Some(nominal) = self.uplink_hz {
            let corrected = doppler_corrected(nominal as f64, range_rate_km_s);
            self.corrected_uplink = Some(corrected);

            if let Some(link) = self.tx.as_mut().and_then(Channel::link) {
                link.set_frequency(corrected.round() as i64 + link.offset_hz)?;
            }
        }

        Ok(())
    }

    /// `D: 435.0012M U: 145.8997M` style summary of the last correction.
    pub fn status(&self) -> String {
        let mut parts = Vec::new();
        if let Some(down) = self.corrected_downlink {
            parts.push(format!("D: {}M", round4(down / 1_000_000.0)));
        }
        if let Some(up) = self.corrected_uplink {
            parts.push(format!("U: {}M", round4(up / 1_000_000.0)));
        }
        parts.join(" ")
    }

    /// Close every open socket and stop every rigctld. Does nothing the
    /// second time.
    pub fn close(&mut self) {
        for kind in [ChannelKind::Sdr, ChannelKind::Rx, ChannelKind::Tx] {
            let taken = self.slot(kind).take();
            match taken {
                Some(Channel::Connected(mut link)) => {
                    log::debug!("Closing {} channel of radio '{}'", kind, self.name);
                    link.close();
                }
                Some(Channel::Inert(reason)) => {
                    log::debug!("{} channel of radio '{}' was idle: {}", kind, self.name, reason);
                }
                None => {}
            }
        }
    }

    /// Log once why a configured channel will stay idle.
    fn prepare(&self, kind: ChannelKind) -> Activation {
        let frequency = match kind {
            ChannelKind::Sdr | ChannelKind::Rx => self.downlink_hz,
            ChannelKind::Tx => self.uplink_hz,
        };
        let state = activation(true, frequency);
        if state == Activation::MissingFrequency {
            log::warn!(
                "{} is defined in radio config '{}' but no {} frequency was provided, it will be ignored",
                kind,
                self.name,
                kind.link()
            );
        }
        state
    }

    fn slot(&mut self, kind: ChannelKind) -> &mut Option<Channel> {
        match kind {
            ChannelKind::Sdr => &mut self.sdr,
            ChannelKind::Rx => &mut self.rx,
            ChannelKind::Tx => &mut self.tx,
        }
    }
}

impl Drop for Radio {
    fn drop(&mut self) {
        self.close();
    }
}

fn start_rigctld(channel: &ChannelConfig, launcher: &DaemonLauncher) -> Result<Link, DeviceError> {
    let port = free_local_port()?;
    let spec = DaemonSpec {
        program: launcher.rigctld.clone(),
        model_id: channel.model_id,
        device_path: channel.usb_port.clone(),
        listen_port: port,
        serial_speed: Some(channel.serial_speed),
        extra_args: Vec::new(),
    };
    let daemon = launcher.launch(&spec)?;
    let client = ProtocolClient::connect(&launcher.host, port, launcher.connect_timeout)?;
    Ok(Link::new(client, Some(daemon), channel.offset_hz))
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
