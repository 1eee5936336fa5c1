//! Network infrastructure: implements `PortProbe` with a TCP connect.

use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::time::Duration;

use crate::application::ports::PortProbe;

const CONNECT_TIMEOUT: Duration = Duration::from_millis(200);

/// Production probe: a port is live when `127.0.0.1:port` accepts a
/// connection.
pub struct TcpPortProbe;

impl PortProbe for TcpPortProbe {
    fn is_listening(&self, port: u16) -> bool {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).is_ok()
    }
}
