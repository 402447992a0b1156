//! Wake-on-LAN: parse a MAC address, build its magic packet and send it.
mod mac;
mod wol;

pub use mac::{parse_hardware_addr, HardwareAddrError, MacAddr, ParseError, Stage};
pub use wol::{send_packet, Error, MagicPacket, MAGIC_PACKET_LEN};
