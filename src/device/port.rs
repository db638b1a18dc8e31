use std::net::{Ipv4Addr, TcpListener};

use crate::device::DeviceError;

/// Ask the OS for a currently unused loopback TCP port.
pub fn free_local_port() -> Result<u16, DeviceError> {
    let listener =
        TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).map_err(DeviceError::PortAllocation)?;
    let port = listener
        .local_addr()
        .map_err(DeviceError::PortAllocation)?
        .port();
    Ok(port)
}
