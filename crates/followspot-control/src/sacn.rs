//! sACN (E1.31) output
//!
//! Formats and transmits E1.31 DMP data packets over UDP/5568. The emitter
//! owns one socket per configured bind address (or a single INADDR_ANY
//! socket) and a per-universe sequence counter that survives
//! activate/release cycles. Dirty frames go out immediately; unchanged
//! universes are refreshed at least once per second so receivers never hit
//! their source timeout. The same packet (same sequence number) is sent
//! once per bound address; receiving consoles deduplicate by CID +
//! sequence.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::time::{Duration, Instant};

use followspot_core::{DestinationMode, DmxFrame, Settings, DMX_SLOTS, UNIVERSE_MAX};

use crate::{error::ControlError, Result};

/// E1.31 destination port
pub const SACN_PORT: u16 = 5568;

/// Unchanged universes are refreshed at least this often
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);

/// Full E1.31 data packet size: 126 byte header + 512 slots
pub const PACKET_LEN: usize = 638;

/// Source name carried in the framing layer (zero-padded to 64 bytes)
pub const SOURCE_NAME: &str = "FollowSpot";

struct UniverseTx {
    sequence: u8,
    last_sent: Option<Instant>,
}

/// sACN sender for all active universes.
pub struct SacnEmitter {
    sockets: Vec<UdpSocket>,
    bound: Vec<Ipv4Addr>,
    universes: HashMap<u16, UniverseTx>,
}

impl SacnEmitter {
    /// Create an emitter bound to INADDR_ANY.
    pub fn new() -> Result<Self> {
        let mut emitter = Self {
            sockets: Vec::new(),
            bound: Vec::new(),
            universes: HashMap::new(),
        };
        emitter.bind(&[])?;
        Ok(emitter)
    }

    /// Rebind sender sockets when the configured addresses change.
    pub fn reconfigure(&mut self, bind_addresses: &[Ipv4Addr]) -> Result<()> {
        if self.bound == bind_addresses && !self.sockets.is_empty() {
            return Ok(());
        }
        self.bind(bind_addresses)
    }

    fn bind(&mut self, bind_addresses: &[Ipv4Addr]) -> Result<()> {
        let addrs: Vec<Ipv4Addr> = if bind_addresses.is_empty() {
            vec![Ipv4Addr::UNSPECIFIED]
        } else {
            bind_addresses.to_vec()
        };

        let mut sockets = Vec::with_capacity(addrs.len());
        for addr in &addrs {
            let socket = UdpSocket::bind(SocketAddrV4::new(*addr, 0))
                .map_err(|e| ControlError::Network(format!("bind {addr} failed: {e}")))?;
            socket.set_nonblocking(true)?;
            socket.set_multicast_loop_v4(false)?;
            sockets.push(socket);
        }

        tracing::info!(addresses = ?addrs, "sACN sender sockets bound");
        self.sockets = sockets;
        self.bound = bind_addresses.to_vec();
        Ok(())
    }

    /// Transmit one universe for this tick.
    ///
    /// Emits when the frame is dirty or the keepalive interval elapsed;
    /// otherwise returns `Ok(false)`. The sequence number increments once
    /// per emission, shared by the per-address duplicates.
    pub fn transmit(
        &mut self,
        settings: &Settings,
        universe: u16,
        frame: &DmxFrame,
        dirty: bool,
    ) -> Result<bool> {
        if universe == 0 || universe > UNIVERSE_MAX {
            return Err(ControlError::Dmx(format!(
                "invalid sACN universe: {universe} (must be 1-{UNIVERSE_MAX})"
            )));
        }

        let now = Instant::now();
        let tx = self.universes.entry(universe).or_insert(UniverseTx {
            sequence: 0,
            last_sent: None,
        });
        let due = dirty
            || tx
                .last_sent
                .map_or(true, |t| now.duration_since(t) >= KEEPALIVE_INTERVAL);
        if !due {
            return Ok(false);
        }

        let destination = match &settings.destination {
            DestinationMode::Multicast => SocketAddrV4::new(multicast_group(universe), SACN_PORT),
            DestinationMode::Unicast { targets } => {
                let host = targets.get(&universe).ok_or_else(|| {
                    ControlError::Network(format!("no unicast target for universe {universe}"))
                })?;
                SocketAddrV4::new(*host, SACN_PORT)
            }
        };

        let packet = build_data_packet(
            settings.cid.as_bytes(),
            settings.priority.min(200),
            tx.sequence,
            universe,
            frame,
        );

        let mut first_error = None;
        for socket in &self.sockets {
            if let Err(e) = socket.send_to(&packet, destination) {
                first_error.get_or_insert(e);
            }
        }
        tx.sequence = tx.sequence.wrapping_add(1);
        tx.last_sent = Some(now);

        if let Some(e) = first_error {
            return Err(ControlError::Network(format!(
                "send to {destination} failed: {e}"
            )));
        }
        tracing::trace!(universe, dirty, "sACN packet emitted");
        Ok(true)
    }

    /// Mark a universe retired. The keepalive clock resets so a later
    /// re-allocation emits immediately; the sequence counter survives so
    /// the stream never repeats a sequence number.
    pub fn retire(&mut self, universe: u16) {
        if let Some(tx) = self.universes.get_mut(&universe) {
            tx.last_sent = None;
        }
    }

    /// Send a final zero frame on every given universe (shutdown path).
    pub fn flush_zero(&mut self, settings: &Settings, universes: &[u16]) {
        let zero = [0u8; DMX_SLOTS];
        for &universe in universes {
            if let Err(e) = self.transmit(settings, universe, &zero, true) {
                tracing::warn!(universe, error = %e, "final zero frame failed");
            }
        }
    }

    #[cfg(test)]
    fn sequence_of(&self, universe: u16) -> Option<u8> {
        self.universes.get(&universe).map(|tx| tx.sequence)
    }

    #[cfg(test)]
    fn socket_count(&self) -> usize {
        self.sockets.len()
    }
}

/// Multicast group for a universe: 239.255.(U>>8).(U&0xFF).
pub fn multicast_group(universe: u16) -> Ipv4Addr {
    Ipv4Addr::new(239, 255, (universe >> 8) as u8, (universe & 0xFF) as u8)
}

/// Build one E1.31 DMP 0x02 data packet (bit-exact, 638 bytes).
pub fn build_data_packet(
    cid: &[u8; 16],
    priority: u8,
    sequence: u8,
    universe: u16,
    frame: &DmxFrame,
) -> [u8; PACKET_LEN] {
    let mut packet = [0u8; PACKET_LEN];
    let mut offset = 0;

    // Root Layer
    // Preamble Size (16-bit)
    packet[offset..offset + 2].copy_from_slice(&0x0010u16.to_be_bytes());
    offset += 2;

    // Post-amble Size (16-bit)
    packet[offset..offset + 2].copy_from_slice(&0x0000u16.to_be_bytes());
    offset += 2;

    // ACN Packet Identifier "ASC-E1.17" (12 bytes)
    packet[offset..offset + 12].copy_from_slice(&[
        0x41, 0x53, 0x43, 0x2d, 0x45, 0x31, 0x2e, 0x31, 0x37, 0x00, 0x00, 0x00,
    ]);
    offset += 12;

    // Flags and Length (16-bit): 0x7000 | (638 - 16)
    let root_length = (PACKET_LEN - 16) as u16;
    packet[offset..offset + 2].copy_from_slice(&(0x7000u16 | root_length).to_be_bytes());
    offset += 2;

    // Vector (32-bit): VECTOR_ROOT_E131_DATA
    packet[offset..offset + 4].copy_from_slice(&0x00000004u32.to_be_bytes());
    offset += 4;

    // CID (16 bytes)
    packet[offset..offset + 16].copy_from_slice(cid);
    offset += 16;

    // Framing Layer
    // Flags and Length (16-bit): 0x7000 | (638 - 38)
    let framing_length = (PACKET_LEN - 38) as u16;
    packet[offset..offset + 2].copy_from_slice(&(0x7000u16 | framing_length).to_be_bytes());
    offset += 2;

    // Vector (32-bit): VECTOR_E131_DATA_PACKET
    packet[offset..offset + 4].copy_from_slice(&0x00000002u32.to_be_bytes());
    offset += 4;

    // Source Name (64 bytes, zero-padded)
    let name = SOURCE_NAME.as_bytes();
    let copy_len = name.len().min(63);
    packet[offset..offset + copy_len].copy_from_slice(&name[..copy_len]);
    offset += 64;

    // Priority (1 byte)
    packet[offset] = priority;
    offset += 1;

    // Synchronization Address (16-bit): 0, no sync
    packet[offset..offset + 2].copy_from_slice(&0x0000u16.to_be_bytes());
    offset += 2;

    // Sequence Number (1 byte)
    packet[offset] = sequence;
    offset += 1;

    // Options (1 byte): 0, Stream_Terminated stays clear so take-over by a
    // higher-priority source is clean
    packet[offset] = 0;
    offset += 1;

    // Universe (16-bit)
    packet[offset..offset + 2].copy_from_slice(&universe.to_be_bytes());
    offset += 2;

    // DMP Layer
    // Flags and Length (16-bit): 0x7000 | (638 - 115)
    let dmp_length = (PACKET_LEN - 115) as u16;
    packet[offset..offset + 2].copy_from_slice(&(0x7000u16 | dmp_length).to_be_bytes());
    offset += 2;

    // Vector (1 byte): VECTOR_DMP_SET_PROPERTY
    packet[offset] = 0x02;
    offset += 1;

    // Address Type & Data Type (1 byte)
    packet[offset] = 0xA1;
    offset += 1;

    // First Property Address (16-bit)
    packet[offset..offset + 2].copy_from_slice(&0x0000u16.to_be_bytes());
    offset += 2;

    // Address Increment (16-bit)
    packet[offset..offset + 2].copy_from_slice(&0x0001u16.to_be_bytes());
    offset += 2;

    // Property value count (16-bit): 513 (start code + 512 slots)
    packet[offset..offset + 2].copy_from_slice(&513u16.to_be_bytes());
    offset += 2;

    // DMX Start Code (1 byte)
    packet[offset] = 0x00;
    offset += 1;

    // DMX Data (512 bytes)
    packet[offset..offset + DMX_SLOTS].copy_from_slice(frame);

    packet
}

#[cfg(test)]
mod tests {
    use super::*;
    use followspot_core::Settings;
    use std::collections::BTreeMap;

    fn settings() -> Settings {
        let mut s = Settings::default();
        s.ensure_cid();
        s
    }

    #[test]
    fn packet_root_layer_structure() {
        let cid = [7u8; 16];
        let packet = build_data_packet(&cid, 150, 0, 1, &[0u8; DMX_SLOTS]);

        assert_eq!(packet.len(), PACKET_LEN);
        assert_eq!(&packet[0..2], &[0x00, 0x10]);
        assert_eq!(&packet[2..4], &[0x00, 0x00]);
        assert_eq!(
            &packet[4..16],
            &[0x41, 0x53, 0x43, 0x2d, 0x45, 0x31, 0x2e, 0x31, 0x37, 0x00, 0x00, 0x00]
        );
        // root flags+length: 0x7000 | 622
        assert_eq!(&packet[16..18], &(0x7000u16 | 622).to_be_bytes());
        assert_eq!(&packet[18..22], &[0, 0, 0, 4]);
        assert_eq!(&packet[22..38], &cid);
    }

    #[test]
    fn packet_framing_layer_structure() {
        let packet = build_data_packet(&[0u8; 16], 150, 9, 257, &[0u8; DMX_SLOTS]);

        assert_eq!(&packet[38..40], &(0x7000u16 | 600).to_be_bytes());
        assert_eq!(&packet[40..44], &[0, 0, 0, 2]);
        // source name starts at 44, zero-padded
        assert_eq!(&packet[44..54], b"FollowSpot");
        assert!(packet[54..108].iter().all(|&b| b == 0));
        // priority 108, seq 111, options 112, universe 113-114
        assert_eq!(packet[108], 150);
        assert_eq!(packet[111], 9);
        assert_eq!(packet[112], 0);
        assert_eq!(&packet[113..115], &257u16.to_be_bytes());
    }

    #[test]
    fn packet_dmp_layer_structure() {
        let mut frame = [0u8; DMX_SLOTS];
        frame[0] = 0x80;
        frame[4] = 0xFF;
        let packet = build_data_packet(&[0u8; 16], 100, 0, 1, &frame);

        assert_eq!(&packet[115..117], &(0x7000u16 | 523).to_be_bytes());
        assert_eq!(packet[117], 0x02);
        assert_eq!(packet[118], 0xA1);
        assert_eq!(&packet[121..123], &513u16.to_be_bytes());
        assert_eq!(packet[125], 0x00); // start code
        assert_eq!(packet[126], 0x80); // slot 1
        assert_eq!(packet[130], 0xFF); // slot 5
    }

    #[test]
    fn multicast_group_encodes_universe() {
        assert_eq!(multicast_group(1), Ipv4Addr::new(239, 255, 0, 1));
        assert_eq!(multicast_group(256), Ipv4Addr::new(239, 255, 1, 0));
        assert_eq!(multicast_group(63999), Ipv4Addr::new(239, 255, 249, 255));
    }

    #[test]
    fn rejects_invalid_universe() {
        let mut emitter = SacnEmitter::new().unwrap();
        let frame = [0u8; DMX_SLOTS];
        assert!(emitter.transmit(&settings(), 0, &frame, true).is_err());
        assert!(emitter.transmit(&settings(), 64000, &frame, true).is_err());
    }

    #[test]
    fn sequence_increments_per_emission() {
        let mut emitter = SacnEmitter::new().unwrap();
        let s = settings();
        let frame = [0u8; DMX_SLOTS];

        emitter.transmit(&s, 1, &frame, true).unwrap();
        assert_eq!(emitter.sequence_of(1), Some(1));
        emitter.transmit(&s, 1, &frame, true).unwrap();
        assert_eq!(emitter.sequence_of(1), Some(2));

        // clean frame inside the keepalive window: no emission
        let sent = emitter.transmit(&s, 1, &frame, false).unwrap();
        assert!(!sent);
        assert_eq!(emitter.sequence_of(1), Some(2));
    }

    #[test]
    fn sequences_are_per_universe() {
        let mut emitter = SacnEmitter::new().unwrap();
        let s = settings();
        let frame = [0u8; DMX_SLOTS];

        emitter.transmit(&s, 1, &frame, true).unwrap();
        emitter.transmit(&s, 1, &frame, true).unwrap();
        emitter.transmit(&s, 2, &frame, true).unwrap();
        assert_eq!(emitter.sequence_of(1), Some(2));
        assert_eq!(emitter.sequence_of(2), Some(1));
    }

    #[test]
    fn unicast_requires_a_target() {
        let mut emitter = SacnEmitter::new().unwrap();
        let mut s = settings();
        let mut targets = BTreeMap::new();
        targets.insert(1u16, Ipv4Addr::LOCALHOST);
        s.destination = DestinationMode::Unicast { targets };
        let frame = [0u8; DMX_SLOTS];

        emitter.transmit(&s, 1, &frame, true).unwrap();
        let err = emitter.transmit(&s, 2, &frame, true).unwrap_err();
        assert!(matches!(err, ControlError::Network(_)));
    }

    #[test]
    fn multi_nic_duplicates_share_one_sequence() {
        let mut emitter = SacnEmitter::new().unwrap();
        assert_eq!(emitter.socket_count(), 1);

        // two bound addresses: one socket each, every packet sent twice
        let binds = [Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST];
        emitter.reconfigure(&binds).unwrap();
        assert_eq!(emitter.socket_count(), 2);

        let s = settings();
        let frame = [0u8; DMX_SLOTS];
        emitter.transmit(&s, 1, &frame, true).unwrap();
        // one emission, one sequence step, regardless of socket count
        assert_eq!(emitter.sequence_of(1), Some(1));
    }

    #[test]
    fn keepalive_fires_after_the_refresh_interval() {
        let mut emitter = SacnEmitter::new().unwrap();
        let s = settings();
        let frame = [0u8; DMX_SLOTS];

        emitter.transmit(&s, 1, &frame, true).unwrap();
        assert!(!emitter.transmit(&s, 1, &frame, false).unwrap());

        std::thread::sleep(KEEPALIVE_INTERVAL + Duration::from_millis(50));
        assert!(emitter.transmit(&s, 1, &frame, false).unwrap());
        assert_eq!(emitter.sequence_of(1), Some(2));
    }

    #[test]
    fn retired_universe_keeps_its_sequence() {
        let mut emitter = SacnEmitter::new().unwrap();
        let s = settings();
        let frame = [0u8; DMX_SLOTS];
        emitter.transmit(&s, 1, &frame, true).unwrap();
        emitter.transmit(&s, 1, &frame, true).unwrap();
        emitter.retire(1);
        assert_eq!(emitter.sequence_of(1), Some(2));

        // re-allocated universe continues the stream, no repeated sequence
        let sent = emitter.transmit(&s, 1, &frame, false).unwrap();
        assert!(sent);
        assert_eq!(emitter.sequence_of(1), Some(3));
    }
}
