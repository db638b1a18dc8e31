use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStderr, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::device::DeviceError;

/// How one hamlib daemon should be invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonSpec {
    pub program: String,
    pub model_id: i64,
    pub device_path: String,
    pub listen_port: u16,
    pub serial_speed: Option<i64>,
    pub extra_args: Vec<String>,
}

impl DaemonSpec {
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-m".to_string(),
            self.model_id.to_string(),
            "-r".to_string(),
            self.device_path.clone(),
        ];
        if let Some(speed) = self.serial_speed {
            args.push("-s".to_string());
            args.push(speed.to_string());
        }
        args.push("-t".to_string());
        args.push(self.listen_port.to_string());
        args.extend(self.extra_args.iter().cloned());
        args
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.args());
        command
    }
}

/// Spawns device daemons and checks that they survived start-up.
#[derive(Debug, Clone)]
pub struct DaemonLauncher {
    pub host: String,
    pub rotctld: String,
    pub rigctld: String,
    pub startup_grace: Duration,
    pub connect_timeout: Duration,
}

impl DaemonLauncher {
    pub fn launch(&self, spec: &DaemonSpec) -> Result<DaemonProcess, DeviceError> {
        log::info!("Starting {}", spec.program);
        log::debug!("{} {}", spec.program, spec.args().join(" "));
        spawn_checked(spec.command(), &spec.program, self.startup_grace)
    }
}

/// A running daemon. Dropping it terminates the process.
#[derive(Debug)]
pub struct DaemonProcess {
    program: String,
    child: Option<Child>,
}

impl DaemonProcess {
    #[cfg(test)]
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(|c| c.id())
    }

    #[cfg(test)]
    pub fn is_running(&mut self) -> bool {
        match &mut self.child {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Kill and reap the daemon. Safe to call more than once.
    pub fn terminate(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                log::warn!("{} had already exited ({})", self.program, status);
                return;
            }
            Ok(None) => {}
            Err(e) => log::debug!("{} wait error: {}", self.program, e),
        }
        if let Err(e) = child.kill() {
            log::warn!("Failed to stop {} (PID {}): {}", self.program, child.id(), e);
        }
        match child.wait() {
            Ok(_) => log::debug!("{} (PID {}) stopped", self.program, child.id()),
            Err(e) => log::warn!("Failed to reap {}: {}", self.program, e),
        }
    }
}

impl Drop for DaemonProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Spawn `command`, wait `grace`, and fail if the process is already gone.
pub fn spawn_checked(
    mut command: Command,
    program: &str,
    grace: Duration,
) -> Result<DaemonProcess, DeviceError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| DeviceError::Spawn {
            program: program.to_string(),
            source,
        })?;

    log::debug!("{} spawned (PID: {})", program, child.id());

    let stderr = child.stderr.take().map(|pipe| drain(pipe, program.to_string()));

    thread::sleep(grace);

    match child.try_wait() {
        Ok(None) => Ok(DaemonProcess {
            program: program.to_string(),
            child: Some(child),
        }),
        Ok(Some(status)) => {
            let stderr = stderr
                .and_then(|handle| handle.join().ok())
                .unwrap_or_default()
                .trim()
                .to_string();
            let code = status.code().unwrap_or(-1);
            log::error!("{} failed with exit code {}", program, code);
            Err(DeviceError::DaemonStart {
                program: program.to_string(),
                code,
                hint: usb_hint(&stderr),
                stderr,
            })
        }
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(DeviceError::Spawn {
                program: program.to_string(),
                source: e,
            })
        }
    }
}

/// Forward daemon stderr to the debug log and keep a copy for diagnostics.
fn drain(pipe: ChildStderr, program: String) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut captured = String::new();
        for line in BufReader::new(pipe).lines() {
            let Ok(line) = line else { break };
            log::debug!("[{}] {}", program, line);
            captured.push_str(&line);
            captured.push('\n');
        }
        captured
    })
}

fn usb_hint(stderr: &str) -> String {
    if stderr.contains("IO error") || stderr.is_empty() {
        " (tip: make sure the correct USB port is selected, it can be overridden with --rotor-usb, --rx-usb or --tx-usb)".to_string()
    } else {
        " (check the device model ID and USB port in the device config)".to_string()
    }
}
