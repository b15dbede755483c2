//! UDP emitter: one datagram per completed page to a loopback consumer.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use log::warn;
use socket2::{Domain, Protocol, Socket, Type};

pub struct UdpSink {
    socket: UdpSocket,
    dest: SocketAddr,
}

impl UdpSink {
    /// One unconnected socket for the process lifetime, implicitly
    /// bound, targeting 127.0.0.1:port.
    pub fn new(port: u16) -> anyhow::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0).into())?;
        Ok(Self {
            socket: socket.into(),
            dest: SocketAddrV4::new(Ipv4Addr::LOCALHOST, port).into(),
        })
    }

    /// Send failures are logged and swallowed; the next page is
    /// attempted normally.
    pub fn send(&self, datagram: &[u8]) {
        if let Err(e) = self.socket.send_to(datagram, self.dest) {
            warn!("udp send to {}: {}", self.dest, e);
        }
    }
}
