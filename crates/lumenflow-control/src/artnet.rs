//! Art-Net output encoding and socket
//!
//! Art-Net transports DMX512 over UDP, port 6454. The router only emits
//! ArtDmx (OpOutput) packets: one full 512-channel universe per packet,
//! fire-and-forget, no retries and no feedback from controllers.

use std::io;
use std::net::{IpAddr, UdpSocket};

use lumenflow_core::DMX_CHANNELS;

/// Standard Art-Net destination port.
pub const ARTNET_PORT: u16 = 6454;

/// Size of an ArtDmx packet carrying a full universe: 18 header bytes
/// plus 512 data bytes.
pub const ARTDMX_PACKET_SIZE: usize = 18 + DMX_CHANNELS;

/// Encode an ArtDmx (OpOutput 0x5000) packet into a caller-provided
/// buffer, so steady-state emission never allocates.
///
/// The universe's low byte is the sub-uni, the high byte the net, which
/// is exactly the little-endian split of the 15-bit port-address.
pub fn encode_artdmx(
    packet: &mut [u8; ARTDMX_PACKET_SIZE],
    universe: u16,
    sequence: u8,
    frame: &[u8; DMX_CHANNELS],
) {
    packet[0..8].copy_from_slice(b"Art-Net\0");
    packet[8..10].copy_from_slice(&0x5000u16.to_le_bytes());
    packet[10..12].copy_from_slice(&0x000eu16.to_be_bytes());
    packet[12] = sequence;
    // Physical input port, always 0.
    packet[13] = 0;
    packet[14..16].copy_from_slice(&universe.to_le_bytes());
    packet[16..18].copy_from_slice(&(DMX_CHANNELS as u16).to_be_bytes());
    packet[18..].copy_from_slice(frame);
}

/// Outbound UDP socket shared by all controllers.
#[derive(Debug)]
pub struct ArtNetSocket {
    socket: UdpSocket,
    port: u16,
}

impl ArtNetSocket {
    /// Bind an ephemeral local port. `port` is the controllers'
    /// destination port, [`ARTNET_PORT`] outside of tests.
    pub fn new(port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        Ok(Self { socket, port })
    }

    /// Fire-and-forget send to one controller.
    pub fn send(&self, controller: IpAddr, packet: &[u8]) -> io::Result<()> {
        self.socket.send_to(packet, (controller, self.port))?;
        tracing::trace!(%controller, len = packet.len(), "sent ArtNet packet");
        Ok(())
    }

    /// The destination port packets go to.
    pub fn port(&self) -> u16 {
        self.port
    }
}
