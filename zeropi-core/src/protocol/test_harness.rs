use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use defmt_or_log::{debug, trace};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::{AsyncSerial, LineBuffer};

/// In-memory serial link. Chunks arrive on the other end exactly as they were written.
pub struct Testable {
    tx: UnboundedSender<Vec<u8>>,
    rx: UnboundedReceiver<Vec<u8>>,
    /// rest of a chunk that didn't fit in the last read
    unread: Vec<u8>,
}

impl Testable {
    /// returns the two ends of a link
    pub fn new() -> (Self, Self) {
        let (host_tx, device_rx) = mpsc::unbounded_channel();
        let (device_tx, host_rx) = mpsc::unbounded_channel();
        let host = Self {
            tx: host_tx,
            rx: host_rx,
            unread: Vec::new(),
        };
        let device = Self {
            tx: device_tx,
            rx: device_rx,
            unread: Vec::new(),
        };
        (host, device)
    }

    /// pushes `chunk` to the other end as a single delivery
    pub fn send_chunk(&self, chunk: &[u8]) -> io::Result<()> {
        self.tx
            .send(chunk.to_vec())
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))
    }

    /// next chunk written by the other end, None once it is dropped
    pub async fn recv_chunk(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    /// chunk already written by the other end, if any
    pub fn try_recv_chunk(&mut self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }
}

impl AsyncSerial for Testable {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.unread.is_empty() {
            match self.rx.recv().await {
                Some(chunk) => self.unread = chunk,
                None => return Ok(0),
            }
        }
        let n = self.unread.len().min(buf.len());
        buf[..n].copy_from_slice(&self.unread[..n]);
        self.unread.drain(..n);
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        self.send_chunk(buf)
    }
}

/// What a [FakeBoard] has seen and what it answers with.
#[derive(Debug, Default)]
pub struct BoardState {
    /// every command received, in order
    pub received: Vec<String>,
    /// digital levels by pin, 0 if missing
    pub digital: HashMap<u32, i64>,
    /// analog values by pin, 0 if missing
    pub analog: HashMap<u32, i64>,
}

/// Plays the board side of a link: records commands and answers reads like the firmware does.
pub struct FakeBoard<Serial: AsyncSerial> {
    serial: Serial,
    lines: LineBuffer,
    pub state: Arc<Mutex<BoardState>>,
}

impl<Serial: AsyncSerial> FakeBoard<Serial> {
    pub fn new(serial: Serial) -> Self {
        Self {
            serial,
            lines: LineBuffer::new(),
            state: Arc::default(),
        }
    }

    /// Answers commands until the link goes away.
    pub async fn run(mut self) {
        let mut buf = [0u8; 64];
        loop {
            let n = match self.serial.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            for line in self.lines.push(&buf[..n]) {
                let line = String::from_utf8_lossy(&line).trim().to_string();
                if line.is_empty() {
                    continue;
                }
                trace!("FakeBoard: received {:?}", line);
                let Some(reply) = self.reply(&line) else {
                    continue;
                };
                if self.serial.write(format!("{reply}\r\n").as_bytes()).await.is_err() {
                    break;
                }
            }
        }
        debug!("FakeBoard: link closed");
    }

    /// records `line` and builds the answer for it, if it gets one
    fn reply(&self, line: &str) -> Option<String> {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.received.push(line.to_string());

        let mut tokens = line.split_whitespace();
        let mnemonic = tokens.next()?;
        let target = tokens.next()?;
        match mnemonic {
            "M12" => {
                let pin: u32 = target.strip_prefix('D')?.parse().ok()?;
                let value = state.digital.get(&pin).copied().unwrap_or(0);
                Some(format!("R12 D{pin} L{value} OK"))
            }
            "M13" => {
                let pin: u32 = target.strip_prefix('A')?.parse().ok()?;
                let value = state.analog.get(&pin).copied().unwrap_or(0);
                Some(format!("R13 A{pin} L{value} OK"))
            }
            "M52" => {
                let device: u32 = target.strip_prefix('D')?.parse().ok()?;
                Some(format!("R52 D{device} L0 OK"))
            }
            _ => None,
        }
    }
}
