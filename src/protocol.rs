// src/protocol.rs

//! Byte layout of the INSTA-INET panel protocol.
//!
//! Every panel receives one data packet per frame, then all panels receive
//! a broadcast sync packet that makes them latch the frame together.
//!
//! Data packet (1112 bytes):
//!
//! ```text
//! header[34]
//! left[486]  brightness contrast afterglow control  trailer[49]
//! right[486] brightness contrast afterglow control  trailer[49]
//! ```
//!
//! The header and trailer bytes come from a capture of the vendor software.
//! Their meaning (calibration, cycle counters, "checksum") is unknown, so
//! they are sent verbatim and never computed.

use crate::screen::{PanelHalf, PANEL_HALF_BYTES};

/// UDP port panels listen on for data and sync packets.
pub const DATA_PORT: u16 = 9410;
/// Local source port the sync broadcast is sent from.
pub const SYNC_PORT: u16 = 8500;

pub const HEADER_LEN: usize = 34;
pub const TRAILER_LEN: usize = 49;
pub const CONTROL_LEN: usize = 4;
pub const SYNC_PACKET_LEN: usize = 27;

const LANE_LEN: usize = PANEL_HALF_BYTES + CONTROL_LEN + TRAILER_LEN;
pub const DATA_PACKET_LEN: usize = HEADER_LEN + 2 * LANE_LEN;

const LEFT_OFFSET: usize = HEADER_LEN;
const RIGHT_OFFSET: usize = HEADER_LEN + LANE_LEN;

/// Data packet header: protocol tag, version, addressing, `img` packet type
/// (0x01), frame counter (always zero) and payload description.
pub const DATA_HEADER: [u8; HEADER_LEN] = *b"INSTA-INET\x00\x01\x00\x00\x01\xac\x10\x05\x00\x00\
\x01\x00\x01\
\x00\x00\
\x00\x00\x00\x00\x01\xe6\x00\x1a\x00";

/// Trailer appended after each lane's control bytes.
pub const LANE_TRAILER: [u8; TRAILER_LEN] = *b"\xff\xff\xff\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x14\x91\x49\x45\x01\
\x00\x00\x01\
\xe3\x80\x16\x08\
\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00";

/// Sync packet: the data header prefix with packet type `sync` (0x08).
pub const SYNC_PACKET: [u8; SYNC_PACKET_LEN] = *b"INSTA-INET\x00\x01\x00\x00\x01\xac\x10\x05\x00\x00\
\x08\x00\x00\x00\x00\x00\x00";

/// Per-lane control bytes. Identical for both lanes of every panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelControls {
    pub brightness: u8,
    pub contrast: u8,
    pub afterglow: u8,
    pub control: u8,
}

impl Default for PanelControls {
    fn default() -> Self {
        PanelControls {
            brightness: 128,
            contrast: 128,
            afterglow: 80,
            control: 0,
        }
    }
}

impl PanelControls {
    fn to_bytes(self) -> [u8; CONTROL_LEN] {
        [self.brightness, self.contrast, self.afterglow, self.control]
    }
}

/// Maps a level in `[0, 1]` to a control byte, clamping out-of-range input.
pub fn level_to_byte(level: f64) -> u8 {
    let level = if level.is_nan() { 0.0 } else { level.clamp(0.0, 1.0) };
    (level * 255.0) as u8
}

/// A reusable data packet.
///
/// Constant regions are written once at construction; each frame only the
/// two pixel payloads and the control bytes are patched in place.
#[derive(Clone)]
pub struct PacketTemplate {
    bytes: [u8; DATA_PACKET_LEN],
}

impl PacketTemplate {
    pub fn new(controls: PanelControls) -> Self {
        let mut bytes = [0u8; DATA_PACKET_LEN];
        bytes[..HEADER_LEN].copy_from_slice(&DATA_HEADER);
        for lane in [LEFT_OFFSET, RIGHT_OFFSET] {
            let trailer = lane + PANEL_HALF_BYTES + CONTROL_LEN;
            bytes[trailer..trailer + TRAILER_LEN].copy_from_slice(&LANE_TRAILER);
        }
        let mut template = PacketTemplate { bytes };
        template.set_controls(controls);
        template
    }

    pub fn set_controls(&mut self, controls: PanelControls) {
        for lane in [LEFT_OFFSET, RIGHT_OFFSET] {
            let at = lane + PANEL_HALF_BYTES;
            self.bytes[at..at + CONTROL_LEN].copy_from_slice(&controls.to_bytes());
        }
    }

    /// Copies one panel's lane payloads into the packet.
    pub fn set_payloads(&mut self, left: &PanelHalf, right: &PanelHalf) {
        self.bytes[LEFT_OFFSET..LEFT_OFFSET + PANEL_HALF_BYTES].copy_from_slice(left);
        self.bytes[RIGHT_OFFSET..RIGHT_OFFSET + PANEL_HALF_BYTES].copy_from_slice(right);
    }

    pub fn as_bytes(&self) -> &[u8; DATA_PACKET_LEN] {
        &self.bytes
    }
}

impl Default for PacketTemplate {
    fn default() -> Self {
        PacketTemplate::new(PanelControls::default())
    }
}

/// Builds a complete data packet for one panel.
pub fn build_data_packet(
    left: &PanelHalf,
    right: &PanelHalf,
    controls: PanelControls,
) -> [u8; DATA_PACKET_LEN] {
    let mut template = PacketTemplate::new(controls);
    template.set_payloads(left, right);
    template.bytes
}

/// Builds the sync packet. Identical every frame.
pub fn build_sync_packet() -> [u8; SYNC_PACKET_LEN] {
    SYNC_PACKET
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn half(fill: u8) -> PanelHalf {
        [fill; PANEL_HALF_BYTES]
    }

    #[test]
    fn constant_regions_have_their_documented_lengths() {
        assert_eq!(DATA_HEADER.len(), 34);
        assert_eq!(LANE_TRAILER.len(), 49);
        assert_eq!(SYNC_PACKET.len(), 27);
        assert_eq!(DATA_PACKET_LEN, 34 + 486 + 4 + 49 + 486 + 4 + 49);
        assert_eq!(DATA_PACKET_LEN, 1112);
    }

    #[test]
    fn header_and_sync_share_the_protocol_prefix() {
        assert_eq!(&DATA_HEADER[..10], b"INSTA-INET");
        assert_eq!(&DATA_HEADER[..20], &SYNC_PACKET[..20]);
        assert_eq!(DATA_HEADER[20], 0x01, "data packet type");
        assert_eq!(SYNC_PACKET[20], 0x08, "sync packet type");
        assert!(SYNC_PACKET[21..].iter().all(|&b| b == 0));
    }

    #[test]
    fn trailer_matches_capture() {
        assert_eq!(&LANE_TRAILER[..3], &[0xff, 0xff, 0xff]);
        assert_eq!(&LANE_TRAILER[22..27], &[0x14, 0x91, 0x49, 0x45, 0x01]);
        assert_eq!(&LANE_TRAILER[27..30], &[0x00, 0x00, 0x01]);
        assert_eq!(&LANE_TRAILER[30..34], &[0xe3, 0x80, 0x16, 0x08]);
        assert!(LANE_TRAILER[34..].iter().all(|&b| b == 0));
    }

    #[test]
    fn data_packet_field_order() {
        let controls = PanelControls {
            brightness: 1,
            contrast: 2,
            afterglow: 3,
            control: 4,
        };
        let pkt = build_data_packet(&half(0xaa), &half(0xbb), controls);

        assert_eq!(&pkt[..34], &DATA_HEADER);
        assert!(pkt[34..520].iter().all(|&b| b == 0xaa));
        assert_eq!(&pkt[520..524], &[1, 2, 3, 4]);
        assert_eq!(&pkt[524..573], &LANE_TRAILER);
        assert!(pkt[573..1059].iter().all(|&b| b == 0xbb));
        assert_eq!(&pkt[1059..1063], &[1, 2, 3, 4]);
        assert_eq!(&pkt[1063..], &LANE_TRAILER);
    }

    #[test]
    fn only_payload_and_controls_vary_between_frames() {
        let a = build_data_packet(&half(0), &half(0), PanelControls::default());
        let mut left = half(0);
        left[100] = 7;
        let b = build_data_packet(&left, &half(255), PanelControls::default());

        assert_eq!(a.len(), b.len());
        assert_eq!(a[..34], b[..34]);
        assert_eq!(a[520..573], b[520..573]);
        assert_eq!(a[1059..], b[1059..]);
        assert_ne!(a[34..520], b[34..520]);
        assert_ne!(a[573..1059], b[573..1059]);
    }

    #[test]
    fn default_controls_match_panel_defaults() {
        let pkt = PacketTemplate::default();
        assert_eq!(&pkt.as_bytes()[520..524], &[128, 128, 80, 0]);
        assert_eq!(&pkt.as_bytes()[1059..1063], &[128, 128, 80, 0]);
    }

    #[test]
    fn sync_packet_is_constant() {
        assert_eq!(build_sync_packet(), build_sync_packet());
        assert_eq!(build_sync_packet().len(), 27);
    }

    #[test]
    fn level_to_byte_clamps() {
        assert_eq!(level_to_byte(-3.0), 0);
        assert_eq!(level_to_byte(0.0), 0);
        assert_eq!(level_to_byte(0.5), 127);
        assert_eq!(level_to_byte(1.0), 255);
        assert_eq!(level_to_byte(7.5), 255);
        assert_eq!(level_to_byte(f64::NAN), 0);
    }
}
