// src/client.rs

//! Delivery of frames to the physical wall.
//!
//! `InstaClient` owns the sockets: one unbound-port socket used to unicast
//! a data packet to every panel, and one broadcast socket bound to the sync
//! port on the interface facing the panels. A frame is delivered as all
//! panel packets in row-major order followed by a single sync broadcast.
//!
//! Delivery is fire-and-forget; there are no acknowledgements. Failed or
//! short writes are reported to the caller, which decides how to recover.

use crate::error::{WallError, WallResult};
use crate::protocol::{
    build_sync_packet, level_to_byte, PacketTemplate, PanelControls, DATA_PORT, SYNC_PORT,
};
use crate::screen::panel::extract_panel_into;
use crate::screen::{PanelHalf, PanelLayout, Screen, PANEL_HALF_BYTES};
use log::{debug, info, trace};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

/// Anything that can deliver a finished frame.
///
/// Implemented by the UDP client; tests substitute recording sinks. The
/// scheduler drives exactly one sink from its own thread.
pub trait FrameSink: Send {
    fn send(&mut self, screen: &Screen) -> WallResult<()>;

    /// Panel persistence level in `[0, 1]`. Sinks without afterglow ignore it.
    fn set_afterglow(&mut self, _level: f64) {}
}

/// Minimal datagram transport, so tests can record packets instead of
/// touching the network.
pub trait Datagram: Send {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize>;
}

impl Datagram for UdpSocket {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, addr)
    }
}

/// UDP client for a wall of INSTA panels.
pub struct InstaClient {
    layout: PanelLayout,
    data_sock: Box<dyn Datagram>,
    sync_sock: Box<dyn Datagram>,
    panel_addrs: Vec<SocketAddr>,
    sync_addr: SocketAddr,
    controls: PanelControls,
    packet: PacketTemplate,
    sync_bytes: [u8; crate::protocol::SYNC_PACKET_LEN],
    left: PanelHalf,
    right: PanelHalf,
}

impl InstaClient {
    /// Opens the sockets for a wall with the given panel addresses.
    ///
    /// `addrs` lists the panels in row-major order and must contain exactly
    /// one entry per panel of `layout`.
    pub fn connect(layout: PanelLayout, addrs: &[String]) -> WallResult<Self> {
        let ips = parse_panel_addrs(layout, addrs)?;

        let data_sock = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))?;

        let local_ip = local_source_ip(ips[0])?;
        let sync_sock = UdpSocket::bind(SocketAddrV4::new(local_ip, SYNC_PORT))?;
        sync_sock.set_broadcast(true)?;
        info!(
            "InstaClient: {} panels, sync from {}:{}",
            ips.len(),
            local_ip,
            SYNC_PORT
        );

        Self::with_sockets(layout, ips, Box::new(data_sock), Box::new(sync_sock))
    }

    /// Builds a client over arbitrary transports.
    pub fn with_sockets(
        layout: PanelLayout,
        ips: Vec<Ipv4Addr>,
        data_sock: Box<dyn Datagram>,
        sync_sock: Box<dyn Datagram>,
    ) -> WallResult<Self> {
        check_panel_count(layout, ips.len())?;
        let controls = PanelControls::default();
        Ok(InstaClient {
            layout,
            data_sock,
            sync_sock,
            panel_addrs: ips
                .into_iter()
                .map(|ip| SocketAddr::V4(SocketAddrV4::new(ip, DATA_PORT)))
                .collect(),
            sync_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::BROADCAST, DATA_PORT)),
            controls,
            packet: PacketTemplate::new(controls),
            sync_bytes: build_sync_packet(),
            left: [0; PANEL_HALF_BYTES],
            right: [0; PANEL_HALF_BYTES],
        })
    }

    pub fn controls(&self) -> PanelControls {
        self.controls
    }

    pub fn set_brightness(&mut self, level: f64) {
        self.controls.brightness = level_to_byte(level);
        self.packet.set_controls(self.controls);
    }

    pub fn set_contrast(&mut self, level: f64) {
        self.controls.contrast = level_to_byte(level);
        self.packet.set_controls(self.controls);
    }

    /// Unicasts one data packet to every panel, row by row.
    fn send_panels(&mut self, screen: &Screen) -> WallResult<()> {
        for (i, (x, y)) in self.layout.panels().enumerate() {
            extract_panel_into(screen, x, y, &mut self.left, &mut self.right);
            self.packet.set_payloads(&self.left, &self.right);
            let bytes = self.packet.as_bytes();
            let sent = self.data_sock.send_to(bytes, self.panel_addrs[i])?;
            check_written(sent, bytes.len())?;
        }
        Ok(())
    }

    /// Broadcasts the sync packet so all panels latch the frame.
    fn sync(&mut self) -> WallResult<()> {
        let sent = self.sync_sock.send_to(&self.sync_bytes, self.sync_addr)?;
        check_written(sent, self.sync_bytes.len())
    }
}

impl FrameSink for InstaClient {
    fn send(&mut self, screen: &Screen) -> WallResult<()> {
        if screen.layout() != self.layout {
            return Err(WallError::Config(format!(
                "frame is {}x{} panels, wall is {}x{}",
                screen.layout().panels_x,
                screen.layout().panels_y,
                self.layout.panels_x,
                self.layout.panels_y
            )));
        }
        self.send_panels(screen)?;
        self.sync()?;
        trace!("InstaClient: frame delivered");
        Ok(())
    }

    fn set_afterglow(&mut self, level: f64) {
        self.controls.afterglow = level_to_byte(level);
        self.packet.set_controls(self.controls);
        debug!("InstaClient: afterglow set to {}", self.controls.afterglow);
    }
}

fn check_written(sent: usize, expected: usize) -> WallResult<()> {
    if sent != expected {
        return Err(WallError::ShortWrite { sent, expected });
    }
    Ok(())
}

fn check_panel_count(layout: PanelLayout, count: usize) -> WallResult<()> {
    if count != layout.panel_count() {
        return Err(WallError::Config(format!(
            "invalid number of addresses, got {} for {}x{} panels",
            count, layout.panels_x, layout.panels_y
        )));
    }
    Ok(())
}

/// Validates and parses the configured panel addresses.
pub fn parse_panel_addrs(layout: PanelLayout, addrs: &[String]) -> WallResult<Vec<Ipv4Addr>> {
    check_panel_count(layout, addrs.len())?;
    addrs
        .iter()
        .map(|a| {
            a.trim()
                .parse::<Ipv4Addr>()
                .map_err(|_| WallError::Config(format!("invalid panel address '{}'", a)))
        })
        .collect()
}

/// Whether `target` lies in the subnet of `ip`/`netmask`.
pub fn subnet_contains(ip: Ipv4Addr, netmask: Ipv4Addr, target: Ipv4Addr) -> bool {
    let mask = u32::from(netmask);
    u32::from(ip) & mask == u32::from(target) & mask
}

/// Returns the local address on the interface whose subnet contains
/// `target`.
pub fn local_source_ip(target: Ipv4Addr) -> WallResult<Ipv4Addr> {
    for ifaddr in nix::ifaddrs::getifaddrs()? {
        let (Some(address), Some(netmask)) = (ifaddr.address, ifaddr.netmask) else {
            continue;
        };
        let (Some(address), Some(netmask)) = (address.as_sockaddr_in(), netmask.as_sockaddr_in())
        else {
            continue;
        };
        if subnet_contains(address.ip(), netmask.ip(), target) {
            debug!(
                "local_source_ip: {} reachable via {} ({})",
                target,
                address.ip(),
                ifaddr.interface_name
            );
            return Ok(address.ip());
        }
    }
    Err(WallError::NoRoute(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::protocol::{DATA_PACKET_LEN, SYNC_PACKET};
    use std::sync::{Arc, Mutex};
    use test_log::test;

    type Log = Arc<Mutex<Vec<(SocketAddr, Vec<u8>)>>>;

    /// Records every datagram; optionally truncates or fails writes.
    struct RecordingSocket {
        log: Log,
        truncate_to: Option<usize>,
        fail: bool,
    }

    impl Datagram for RecordingSocket {
        fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::NetworkUnreachable, "down"));
            }
            self.log.lock().unwrap().push((addr, buf.to_vec()));
            Ok(self.truncate_to.unwrap_or(buf.len()).min(buf.len()))
        }
    }

    fn socket(log: &Log) -> Box<dyn Datagram> {
        Box::new(RecordingSocket {
            log: log.clone(),
            truncate_to: None,
            fail: false,
        })
    }

    fn ips(n: u8) -> Vec<Ipv4Addr> {
        (1..=n).map(|i| Ipv4Addr::new(192, 168, 3, i)).collect()
    }

    fn client(log: &Log) -> InstaClient {
        InstaClient::with_sockets(PanelLayout::default(), ips(6), socket(log), socket(log)).unwrap()
    }

    #[test]
    fn rejects_wrong_address_count() {
        let log = Log::default();
        let err = InstaClient::with_sockets(PanelLayout::default(), ips(5), socket(&log), socket(&log))
            .err()
            .unwrap();
        assert!(matches!(err, WallError::Config(_)));
        assert!(err.to_string().contains("got 5 for 3x2 panels"));
    }

    #[test]
    fn parse_rejects_bad_addresses() {
        let addrs: Vec<String> = ["10.0.0.1", "nope"].iter().map(|s| s.to_string()).collect();
        let err = parse_panel_addrs(PanelLayout::new(2, 1), &addrs).unwrap_err();
        assert!(err.to_string().contains("'nope'"));

        let addrs: Vec<String> = ["10.0.0.1", " 10.0.0.2 "].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            parse_panel_addrs(PanelLayout::new(2, 1), &addrs).unwrap(),
            vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)]
        );
    }

    #[test]
    fn sends_every_panel_in_row_major_order_then_sync() {
        let log = Log::default();
        let mut c = client(&log);
        let mut screen = Screen::new(PanelLayout::default());
        // mark panel (2, 0) so its packet is recognisable
        screen.set(36, 0, Rgb::new(9, 9, 9));
        c.send(&screen).unwrap();

        let sent = log.lock().unwrap();
        assert_eq!(sent.len(), 7);
        for (i, (addr, bytes)) in sent.iter().take(6).enumerate() {
            assert_eq!(
                *addr,
                SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(192, 168, 3, i as u8 + 1), 9410))
            );
            assert_eq!(bytes.len(), DATA_PACKET_LEN);
        }
        assert_eq!(&sent[2].1[34..37], &[9, 9, 9]);
        assert_eq!(&sent[0].1[34..37], &[0, 0, 0]);

        let (sync_addr, sync) = &sent[6];
        assert_eq!(*sync_addr, "255.255.255.255:9410".parse::<SocketAddr>().unwrap());
        assert_eq!(sync.as_slice(), &SYNC_PACKET);
    }

    #[test]
    fn afterglow_is_clamped_and_applied_to_both_lanes() {
        let log = Log::default();
        let mut c = client(&log);
        c.set_afterglow(2.0);
        assert_eq!(c.controls().afterglow, 255);
        c.set_afterglow(-1.0);
        assert_eq!(c.controls().afterglow, 0);
        c.set_afterglow(0.5);
        c.send(&Screen::new(PanelLayout::default())).unwrap();

        let sent = log.lock().unwrap();
        for (_, bytes) in sent.iter().take(6) {
            assert_eq!(bytes[522], 127);
            assert_eq!(bytes[1061], 127);
        }
    }

    #[test]
    fn brightness_and_contrast_are_client_wide() {
        let log = Log::default();
        let mut c = client(&log);
        c.set_brightness(1.0);
        c.set_contrast(0.0);
        c.send(&Screen::new(PanelLayout::default())).unwrap();
        let sent = log.lock().unwrap();
        for (_, bytes) in sent.iter().take(6) {
            assert_eq!(&bytes[520..522], &[255, 0]);
            assert_eq!(&bytes[1059..1061], &[255, 0]);
        }
    }

    #[test]
    fn short_write_is_reported() {
        let log = Log::default();
        let data = Box::new(RecordingSocket {
            log: log.clone(),
            truncate_to: Some(100),
            fail: false,
        });
        let mut c =
            InstaClient::with_sockets(PanelLayout::default(), ips(6), data, socket(&log)).unwrap();
        let err = c.send(&Screen::new(PanelLayout::default())).unwrap_err();
        assert!(matches!(err, WallError::ShortWrite { sent: 100, expected: 1112 }));
        assert!(err.is_transient());
        // delivery stops at the first failure; no sync for a partial frame
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn socket_failure_is_reported_as_io() {
        let log = Log::default();
        let sync = Box::new(RecordingSocket {
            log: log.clone(),
            truncate_to: None,
            fail: true,
        });
        let mut c =
            InstaClient::with_sockets(PanelLayout::default(), ips(6), socket(&log), sync).unwrap();
        let err = c.send(&Screen::new(PanelLayout::default())).unwrap_err();
        assert!(matches!(err, WallError::Io(_)));
        assert_eq!(log.lock().unwrap().len(), 6);
    }

    #[test]
    fn rejects_frames_for_another_layout() {
        let log = Log::default();
        let mut c = client(&log);
        let err = c.send(&Screen::new(PanelLayout::new(4, 3))).unwrap_err();
        assert!(matches!(err, WallError::Config(_)));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn subnet_matching() {
        let ip = Ipv4Addr::new(192, 168, 3, 100);
        let mask = Ipv4Addr::new(255, 255, 255, 0);
        assert!(subnet_contains(ip, mask, Ipv4Addr::new(192, 168, 3, 6)));
        assert!(!subnet_contains(ip, mask, Ipv4Addr::new(192, 168, 4, 6)));
        assert!(subnet_contains(ip, Ipv4Addr::UNSPECIFIED, Ipv4Addr::new(8, 8, 8, 8)));
    }

    #[test]
    fn loopback_is_found_for_localhost_panels() {
        assert_eq!(
            local_source_ip(Ipv4Addr::new(127, 0, 0, 5)).unwrap(),
            Ipv4Addr::LOCALHOST
        );
    }
}
