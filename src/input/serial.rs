// src/input/serial.rs

//! Four PlayStation pads relayed by a microcontroller over a serial line.
//!
//! The controller streams fixed 27-byte frames:
//!
//! ```text
//! 0xAA | pad0[6] pad1[6] pad2[6] pad3[6] | 0xAA '\n'
//! ```
//!
//! Each pad is six bytes: two button bytes (active bits set) followed by the
//! right and left stick axes, centred on 128. Frames that do not carry the
//! sentinels are dropped and the reader realigns on the next `0xAA '\n'`.

use super::{Buttons, PadSource, PadState, PAD_COUNT};
use log::{debug, error, info};
use nix::sys::termios::{self, BaudRate, SetArg};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

pub const FRAME_LEN: usize = 1 + 6 * PAD_COUNT + 2;
pub const SENTINEL: u8 = 0xaa;
pub const BAUD_RATE: BaudRate = BaudRate::B57600;

// first button byte
const MASK_SELECT: u8 = 0x01;
const MASK_START: u8 = 0x08;
const MASK_UP: u8 = 0x10;
const MASK_RIGHT: u8 = 0x20;
const MASK_DOWN: u8 = 0x40;
const MASK_LEFT: u8 = 0x80;
// second button byte
const MASK_L2: u8 = 0x01;
const MASK_R2: u8 = 0x02;
const MASK_L1: u8 = 0x04;
const MASK_R1: u8 = 0x08;
const MASK_TRIANGLE: u8 = 0x10;
const MASK_CIRCLE: u8 = 0x20;
const MASK_CROSS: u8 = 0x40;
const MASK_SQUARE: u8 = 0x80;

fn axis(b: u8) -> f32 {
    (b as f32 - 128.0) / 128.0
}

/// Decodes the six bytes of one pad.
pub fn decode_pad(raw: &[u8; 6]) -> PadState {
    let map0 = [
        (MASK_SELECT, Buttons::SELECT),
        (MASK_START, Buttons::START),
        (MASK_UP, Buttons::UP),
        (MASK_RIGHT, Buttons::RIGHT),
        (MASK_DOWN, Buttons::DOWN),
        (MASK_LEFT, Buttons::LEFT),
    ];
    let map1 = [
        (MASK_L2, Buttons::L2),
        (MASK_R2, Buttons::R2),
        (MASK_L1, Buttons::L1),
        (MASK_R1, Buttons::R1),
        (MASK_TRIANGLE, Buttons::TRIANGLE),
        (MASK_CIRCLE, Buttons::CIRCLE),
        (MASK_CROSS, Buttons::CROSS),
        (MASK_SQUARE, Buttons::SQUARE),
    ];

    let mut buttons = Buttons::empty();
    for (mask, button) in map0 {
        buttons.set(button, raw[0] & mask != 0);
    }
    for (mask, button) in map1 {
        buttons.set(button, raw[1] & mask != 0);
    }

    PadState {
        buttons,
        right_stick: (axis(raw[2]), axis(raw[3])),
        left_stick: (axis(raw[4]), axis(raw[5])),
    }
}

/// Parses one complete frame, `None` if the framing is wrong.
pub fn parse_frame(frame: &[u8; FRAME_LEN]) -> Option<[PadState; PAD_COUNT]> {
    if frame[0] != SENTINEL || frame[FRAME_LEN - 2] != SENTINEL || frame[FRAME_LEN - 1] != b'\n' {
        return None;
    }
    let mut pads = [PadState::default(); PAD_COUNT];
    for (i, pad) in pads.iter_mut().enumerate() {
        let start = 1 + 6 * i;
        let mut raw = [0u8; 6];
        raw.copy_from_slice(&frame[start..start + 6]);
        *pad = decode_pad(&raw);
    }
    Some(pads)
}

/// Position just past the first `0xAA '\n'` pair in `buf`.
///
/// Stick bytes can spell the same pair; a false match costs at most the
/// frame it sits in.
fn first_boundary(buf: &[u8]) -> Option<usize> {
    buf.windows(2)
        .position(|w| w[0] == SENTINEL && w[1] == b'\n')
        .map(|i| i + 2)
}

/// Pulls frames out of a byte stream, realigning after corruption.
pub struct FrameReader<R> {
    inner: R,
    buf: [u8; FRAME_LEN],
    /// Bytes at the start of `buf` already read towards the next frame.
    pending: usize,
    discarded: u64,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        FrameReader {
            inner,
            buf: [0; FRAME_LEN],
            pending: 0,
            discarded: 0,
        }
    }

    /// Number of malformed frames dropped so far.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Blocks until the next well-formed frame has been read.
    pub fn next_frame(&mut self) -> io::Result<[PadState; PAD_COUNT]> {
        loop {
            self.inner.read_exact(&mut self.buf[self.pending..])?;
            self.pending = 0;
            if let Some(pads) = parse_frame(&self.buf) {
                return Ok(pads);
            }

            self.discarded += 1;
            debug!("FrameReader: discarding malformed frame {:02x?}", &self.buf[..]);
            match first_boundary(&self.buf) {
                Some(end) => {
                    // the next frame already started inside this buffer
                    self.buf.copy_within(end.., 0);
                    self.pending = FRAME_LEN - end;
                }
                None => self.seek_boundary(self.buf[FRAME_LEN - 1] == SENTINEL)?,
            }
        }
    }

    /// Skips bytes up to and including the next `0xAA '\n'`.
    fn seek_boundary(&mut self, mut after_sentinel: bool) -> io::Result<()> {
        let mut b = [0u8; 1];
        loop {
            self.inner.read_exact(&mut b)?;
            if after_sentinel && b[0] == b'\n' {
                return Ok(());
            }
            after_sentinel = b[0] == SENTINEL;
        }
    }
}

/// Pads fed by a background reader thread.
pub struct SerialPads {
    state: Arc<Mutex<[PadState; PAD_COUNT]>>,
}

impl SerialPads {
    /// Opens a serial device at 57600 baud, raw mode, and starts reading.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let port = open_port(path)?;
        info!("SerialPads: reading {}", path.display());
        Ok(Self::spawn(port))
    }

    /// Starts reading frames from any byte stream.
    pub fn spawn<R: Read + Send + 'static>(reader: R) -> Self {
        let state = Arc::new(Mutex::new([PadState::default(); PAD_COUNT]));
        let shared = state.clone();
        let spawned = thread::Builder::new()
            .name("serial-pads".to_string())
            .spawn(move || {
                let mut frames = FrameReader::new(reader);
                loop {
                    match frames.next_frame() {
                        Ok(pads) => {
                            *shared.lock().unwrap_or_else(PoisonError::into_inner) = pads;
                        }
                        Err(e) => {
                            error!(
                                "SerialPads: reader stopped after {} bad frames: {}",
                                frames.discarded(),
                                e
                            );
                            break;
                        }
                    }
                }
            });
        if let Err(e) = spawned {
            error!("SerialPads: failed to spawn reader thread: {}", e);
        }
        SerialPads { state }
    }
}

impl PadSource for SerialPads {
    fn pads(&self) -> [PadState; PAD_COUNT] {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn open_port(path: &Path) -> anyhow::Result<File> {
    let port = File::options().read(true).write(true).open(path)?;
    let mut tio = termios::tcgetattr(&port)?;
    termios::cfmakeraw(&mut tio);
    termios::cfsetspeed(&mut tio, BAUD_RATE)?;
    termios::tcsetattr(&port, SetArg::TCSANOW, &tio)?;
    Ok(port)
}
