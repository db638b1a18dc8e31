use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with code {code} right after start: {stderr}{hint}")]
    DaemonStart {
        program: String,
        code: i32,
        stderr: String,
        hint: String,
    },
    #[error("could not connect to {addr}: {reason}")]
    Connection { addr: String, reason: String },
    #[error("could not allocate a local port: {0}")]
    PortAllocation(std::io::Error),
    #[error("I/O error talking to {peer}: {source}")]
    Io {
        peer: String,
        source: std::io::Error,
    },
    #[error("{peer} closed the connection")]
    Closed { peer: String },
    #[error("unexpected response to '{command}': {response:?}")]
    Protocol {
        command: String,
        response: Vec<String>,
    },
}
