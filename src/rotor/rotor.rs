use crate::device::{DaemonLauncher, DaemonProcess, DaemonSpec, DeviceError, ProtocolClient};
use crate::rotor::RotorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub azimuth_deg: i32,
    pub elevation_deg: i32,
}

/// Client side of one rotctld instance.
///
/// The daemon receives the full az/el envelope at start-up; on the client
/// side only the elevation floor is enforced.
#[derive(Debug)]
pub struct Rotor {
    config: RotorConfig,
    daemon: Option<DaemonProcess>,
    client: Option<ProtocolClient>,
    current: Option<Position>,
}

impl Rotor {
    pub fn start(config: RotorConfig, launcher: &DaemonLauncher) -> Result<Self, DeviceError> {
        let spec = DaemonSpec {
            program: launcher.rotctld.clone(),
            model_id: config.model_id,
            device_path: config.usb_port.clone(),
            listen_port: config.daemon_port,
            serial_speed: None,
            extra_args: vec![config.set_conf_arg()],
        };
        let daemon = launcher.launch(&spec)?;
        let client =
            ProtocolClient::connect(&launcher.host, config.daemon_port, launcher.connect_timeout)?;

        log::info!("Rotor '{}' ready on port {}", config.name, config.daemon_port);
        Ok(Self::from_parts(config, Some(daemon), client))
    }

    pub fn from_parts(
        config: RotorConfig,
        daemon: Option<DaemonProcess>,
        client: ProtocolClient,
    ) -> Self {
        Self {
            config,
            daemon,
            client: Some(client),
            current: None,
        }
    }

    pub fn config(&self) -> &RotorConfig {
        &self.config
    }

    /// Last position read back from the daemon, `None` before the first read.
    pub fn current_position(&self) -> Option<Position> {
        self.current
    }

    pub fn rotate_to(&mut self, azimuth: i32, elevation: i32) -> Result<(), DeviceError> {
        let elevation = elevation.max(self.min_el());
        self.client()?.send(&format!("P {} {}", azimuth, elevation))?;
        Ok(())
    }

    pub fn update_current_position(&mut self) -> Result<Position, DeviceError> {
        let response = self.client()?.query("p", 2)?;
        let parse = |line: Option<&String>| line.and_then(|l| l.parse::<f64>().ok());

        match (parse(response.first()), parse(response.get(1))) {
            (Some(az), Some(el)) => {
                let position = Position {
                    azimuth_deg: az.round() as i32,
                    elevation_deg: el.round() as i32,
                };
                self.current = Some(position);
                Ok(position)
            }
            _ => Err(DeviceError::Protocol {
                command: "p".to_string(),
                response,
            }),
        }
    }

    /// Read back the current position, then command the new target.
    pub fn update(&mut self, azimuth: i32, elevation: i32) -> Result<(), DeviceError> {
        self.update_current_position()?;
        self.rotate_to(azimuth, elevation)
    }

    /// Close the socket and stop rotctld. Does nothing the second time.
    pub fn close(&mut self) {
        if let Some(mut client) = self.client.take() {
            client.close();
        }
        if let Some(mut daemon) = self.daemon.take() {
            daemon.terminate();
        }
    }

    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.client.is_some()
    }

    fn min_el(&self) -> i32 {
        i32::try_from(self.config.min_el).unwrap_or(i32::MIN)
    }

    fn client(&mut self) -> Result<&mut ProtocolClient, DeviceError> {
        let peer = format!("rotor '{}'", self.config.name);
        self.client.as_mut().ok_or(DeviceError::Closed { peer })
    }
}

impl Drop for Rotor {
    fn drop(&mut self) {
        self.close();
    }
}
