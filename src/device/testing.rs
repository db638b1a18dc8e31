//! In-process stand-in for rotctld/rigctld used by unit tests.

use std::io::{BufRead, BufReader, Write};
use std::net::{Ipv4Addr, TcpListener};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

pub struct FakeDaemon {
    port: u16,
    received: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl FakeDaemon {
    /// Accepts a single connection. `p` is answered with the given position,
    /// every other command with `RPRT 0`.
    pub fn start(azimuth: f64, elevation: f64) -> Self {
        Self::spawn(move |cmd| {
            if cmd == "p" {
                format!("{}\n{}\n", azimuth, elevation)
            } else {
                "RPRT 0\n".to_string()
            }
        })
    }

    /// Answers every command, `p` included, with `RPRT <code>`.
    pub fn failing(code: i32) -> Self {
        Self::spawn(move |_| format!("RPRT {}\n", code))
    }

    fn spawn(reply: impl Fn(&str) -> String + Send + 'static) -> Self {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = received.clone();

        let handle = thread::spawn(move || {
            let (stream, _) = match listener.accept() {
                Ok(conn) => conn,
                Err(_) => return,
            };
            let mut writer = stream.try_clone().unwrap();
            for line in BufReader::new(stream).lines() {
                let Ok(line) = line else { return };
                let cmd = line.trim().to_string();
                log.lock().unwrap().push(cmd.clone());
                if writer.write_all(reply(&cmd).as_bytes()).is_err() {
                    return;
                }
            }
        });

        Self {
            port,
            received,
            handle,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    /// Waits for the client to hang up and returns every command seen.
    pub fn finish(self) -> Vec<String> {
        self.handle.join().unwrap();
        Arc::try_unwrap(self.received)
            .map(|m| m.into_inner().unwrap())
            .unwrap_or_else(|shared| shared.lock().unwrap().clone())
    }
}
