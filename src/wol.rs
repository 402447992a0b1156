//! Constructs a WakeOnLAN packet (so called "Magic Packet Technology") from an
//! IEEE MAC-48 address and fires it at a host as a single UDP datagram.
use std::io::{self, Write};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use thiserror::Error;
use tracing::{debug, info};

use crate::mac::{MacAddr, ParseError};

const HEADER: [u8; 6] = [0xFF; 6];
const REPETITIONS: usize = 16;
pub const MAGIC_PACKET_LEN: usize = HEADER.len() + REPETITIONS * 6;

/// 6 bytes of 0xFF followed by 16 copies of the target MAC address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicPacket {
    header: [u8; 6],
    payload: [MacAddr; REPETITIONS],
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("parse: {0}")]
    InvalidFormat(#[from] ParseError),

    #[error("encode: {0}")]
    Encoding(#[source] io::Error),

    #[error("resolve '{addr}': {source}")]
    AddressResolution { addr: String, source: io::Error },

    #[error("connect '{addr}': {source}")]
    Connect { addr: String, source: io::Error },

    #[error("write '{addr}': {source}")]
    Write { addr: String, source: io::Error },
}

impl MagicPacket {
    pub fn new(mac: MacAddr) -> Self {
        MagicPacket {
            header: HEADER,
            payload: [mac; REPETITIONS],
        }
    }

    /// Parses `mac` and builds the packet for it in one go.
    pub fn from_mac_str(mac: &str) -> Result<Self, Error> {
        Ok(MagicPacket::new(mac.parse()?))
    }

    /// The address this packet wakes, as found in the first payload repetition.
    pub fn target(&self) -> MacAddr {
        self.payload[0]
    }

    /// Writes the wire form: header, then every payload repetition in order.
    pub fn encode<W: Write>(&self, w: &mut W) -> Result<(), Error> {
        w.write_all(&self.header).map_err(Error::Encoding)?;
        for mac in &self.payload {
            w.write_all(mac.as_bytes()).map_err(Error::Encoding)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<[u8; MAGIC_PACKET_LEN], Error> {
        let mut buf = [0u8; MAGIC_PACKET_LEN];
        self.encode(&mut buf.as_mut_slice())?;
        Ok(buf)
    }

    pub fn send(&self, host: &str, port: u16) -> Result<(), Error> {
        send_packet(&self.to_bytes()?, host, port)
    }
}

fn resolve(host: &str, port: u16, addr: &str) -> Result<SocketAddr, Error> {
    let resolution_error = |source| Error::AddressResolution {
        addr: addr.to_owned(),
        source,
    };

    (host, port)
        .to_socket_addrs()
        .map_err(resolution_error)?
        .next()
        .ok_or_else(|| {
            resolution_error(io::Error::new(
                io::ErrorKind::NotFound,
                "no addresses found",
            ))
        })
}

fn connect(target: SocketAddr) -> io::Result<UdpSocket> {
    let local = match target {
        SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    };
    let socket = UdpSocket::bind(local)?;
    if target.is_ipv4() {
        socket.set_broadcast(true)?;
    }
    socket.connect(target)?;
    debug!(local = %socket.local_addr()?, %target, "socket ready");

    Ok(socket)
}

/// Sends `bytes` as one datagram to `host:port`. Nothing is awaited after the
/// write; the socket is closed on return.
pub fn send_packet(bytes: &[u8], host: &str, port: u16) -> Result<(), Error> {
    let addr = format!("{host}:{port}");
    let target = resolve(host, port, &addr)?;
    debug!(%addr, %target, "resolved destination");

    let socket = connect(target).map_err(|source| Error::Connect {
        addr: addr.clone(),
        source,
    })?;

    match bytes.get(HEADER.len()..HEADER.len() + 6).map(MacAddr::try_from) {
        Some(Ok(mac)) => info!("Attempting to send a magic packet to MAC {mac}"),
        _ => info!("Attempting to send {} bytes", bytes.len()),
    }
    info!("... Broadcasting to: {addr}");

    socket
        .send(bytes)
        .map_err(|source| Error::Write { addr, source })?;

    Ok(())
}

#[cfg(test)]
fn packet_for(mac: &str) -> [u8; MAGIC_PACKET_LEN] {
    MagicPacket::from_mac_str(mac).unwrap().to_bytes().unwrap()
}

#[test]
fn test_magic_gibberish() {
    assert!(matches!(
        MagicPacket::from_mac_str("hello"),
        Err(Error::InvalidFormat(_))
    ));
}

#[test]
fn test_magic_too_long() {
    assert!(matches!(
        MagicPacket::from_mac_str("11:22:33:44:55:66:77"),
        Err(Error::InvalidFormat(_))
    ));
}

#[test]
fn test_magic() {
    let pkt = packet_for("11:22:33:44:55:66");
    assert_eq!(pkt.len(), 102);

    // starts with padding
    assert_eq!(&pkt[..6], &[0xFF; 6]);

    // followed by 16 copies of the mac
    for copy in pkt[6..].chunks(6) {
        assert_eq!(copy, &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    }
    assert_eq!(pkt[6..].chunks(6).count(), 16);
}

#[test]
fn test_magic_separator_agnostic() {
    assert_eq!(
        packet_for("11:22:33:44:55:66"),
        packet_for("11-22-33-44-55-66")
    );
}

#[test]
fn test_magic_build_is_repeatable() {
    let mac = MacAddr::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    let a = MagicPacket::new(mac);
    let b = MagicPacket::new(mac);
    assert_eq!(a, b);
    assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());
    assert_eq!(a.target(), mac);
}

#[test]
fn test_encode_short_buffer() {
    let pkt = MagicPacket::new(MacAddr::new([1, 2, 3, 4, 5, 6]));
    let mut buf = [0u8; MAGIC_PACKET_LEN - 1];
    assert!(matches!(
        pkt.encode(&mut buf.as_mut_slice()),
        Err(Error::Encoding(_))
    ));
}

#[test]
fn test_encode_into_vec() {
    let pkt = MagicPacket::new(MacAddr::new([1, 2, 3, 4, 5, 6]));
    let mut buf = Vec::new();
    pkt.encode(&mut buf).unwrap();
    assert_eq!(buf, pkt.to_bytes().unwrap());
}

#[test]
fn test_send_loopback() {
    use std::time::Duration;

    let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
    listener
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let port = listener.local_addr().unwrap().port();

    let pkt = MagicPacket::from_mac_str("11:22:33:44:55:66").unwrap();
    pkt.send("127.0.0.1", port).unwrap();

    let mut buf = [0u8; 512];
    let (n, _) = listener.recv_from(&mut buf).unwrap();
    assert_eq!(n, MAGIC_PACKET_LEN);
    assert_eq!(&buf[..n], &pkt.to_bytes().unwrap());
}

#[test]
fn test_send_unresolvable_host() {
    let pkt = packet_for("11:22:33:44:55:66");
    match send_packet(&pkt, "not a host", 9) {
        Err(Error::AddressResolution { addr, .. }) => assert_eq!(addr, "not a host:9"),
        other => panic!("expected a resolution error, got {other:?}"),
    }
}

#[test]
fn test_send_oversize_datagram() {
    // larger than any UDP payload, so the write itself fails
    let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    match send_packet(&vec![0u8; 70_000], "127.0.0.1", port) {
        Err(Error::Write { addr, .. }) => assert_eq!(addr, format!("127.0.0.1:{port}")),
        other => panic!("expected a write error, got {other:?}"),
    }
}
