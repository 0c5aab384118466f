//! Shared fakes for the integration tests.

#![allow(dead_code)]

use insta_wall::client::{Datagram, InstaClient};
use insta_wall::screen::PanelLayout;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub type Sent = Arc<Mutex<Vec<(SocketAddr, Vec<u8>)>>>;

/// Records datagrams instead of sending them. The first `fail_first`
/// sends across all clones fail.
#[derive(Clone)]
pub struct FakeSocket {
    pub sent: Sent,
    failures_left: Arc<AtomicUsize>,
}

impl FakeSocket {
    pub fn new(fail_first: usize) -> Self {
        FakeSocket {
            sent: Sent::default(),
            failures_left: Arc::new(AtomicUsize::new(fail_first)),
        }
    }
}

impl Datagram for FakeSocket {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(io::Error::new(io::ErrorKind::NetworkDown, "link down"));
        }
        self.sent.lock().unwrap().push((addr, buf.to_vec()));
        Ok(buf.len())
    }
}

pub fn panel_ips(layout: PanelLayout) -> Vec<Ipv4Addr> {
    (0..layout.panel_count())
        .map(|i| Ipv4Addr::new(10, 0, 0, 10 + i as u8))
        .collect()
}

/// A client whose data and sync sockets share one record.
pub fn fake_client(layout: PanelLayout, fail_first: usize) -> (InstaClient, Sent) {
    let socket = FakeSocket::new(fail_first);
    let sent = socket.sent.clone();
    let client = InstaClient::with_sockets(
        layout,
        panel_ips(layout),
        Box::new(socket.clone()),
        Box::new(socket),
    )
    .unwrap();
    (client, sent)
}

/// Polls `cond` until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
