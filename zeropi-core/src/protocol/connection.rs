use core::fmt::Debug;
use std::{io, time::Duration};

use defmt_or_log::{debug, error, trace, warn};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};

use super::{AsyncSerial, Callback, Correlator, LineBuffer, TransportEvent};
use crate::{Config, error::Result, Error};

/// bytes read from the transport in one go
const READ_BUF_LEN: usize = 256;
/// consecutive read errors after which the transport is considered gone
pub const MAX_READ_ERRORS: u32 = 8;
/// pause before retrying a failed read, multiplied by the number of failures so far
const READ_RETRY_DELAY: Duration = Duration::from_millis(5);

/// What a [CoreHandle] asks of the connection task.
enum Request {
    Write(String),
    Register { key: String, callback: Callback },
    /// answered once every earlier request has been handled
    Flush(oneshot::Sender<()>),
}

/// Owns a transport and the [Correlator] for it.
///
/// Everything touching the correlator happens inside [Core::run], one event at a time:
/// data coming from the transport and requests coming from the handles.
pub struct Core<Serial: AsyncSerial> {
    serial: Serial,
    correlator: Correlator,
    /// Some if replies may be chunked arbitrarily
    lines: Option<LineBuffer>,
    requests: mpsc::UnboundedReceiver<Request>,
    open: watch::Sender<bool>,
    debug: bool,
}

/// Cheap, cloneable way to talk to a running [Core].
#[derive(Clone)]
pub struct CoreHandle {
    requests: mpsc::UnboundedSender<Request>,
    open: watch::Receiver<bool>,
}

impl<Serial: AsyncSerial> Core<Serial> {
    /// Wraps `serial`; nothing happens until [Core::run] is polled.
    pub fn new(serial: Serial, config: &Config) -> (Self, CoreHandle) {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (open_tx, open_rx) = watch::channel(false);
        let core = Self {
            serial,
            correlator: Correlator::new(config.debug),
            lines: config.reassemble_lines.then(LineBuffer::new),
            requests: requests_rx,
            open: open_tx,
            debug: config.debug,
        };
        let handle = CoreHandle {
            requests: requests_tx,
            open: open_rx,
        };
        (core, handle)
    }

    /// Spawns the connection task on the current tokio runtime.
    pub fn spawn(serial: Serial, config: &Config) -> (CoreHandle, JoinHandle<()>) {
        let (core, handle) = Self::new(serial, config);
        (handle, tokio::spawn(core.run()))
    }

    /// Runs until every [CoreHandle] is dropped.
    ///
    /// The transport is already usable when this starts, so it begins by signaling open.
    /// A failed read is retried after a growing pause; [MAX_READ_ERRORS] failures in a row
    /// count as a disconnect. After a disconnect it stops reading but keeps serving handles,
    /// whose writes will fail.
    pub async fn run(mut self) {
        self.on_event(TransportEvent::Open);

        let mut buf = [0u8; READ_BUF_LEN];
        let mut reading = true;
        let mut read_errors = 0;
        loop {
            tokio::select! {
                read = read_after(&mut self.serial, &mut buf, READ_RETRY_DELAY * read_errors), if reading => {
                    let event = read_event(read, &buf);
                    match event {
                        TransportEvent::Error(_) => read_errors += 1,
                        TransportEvent::Disconnect => reading = false,
                        _ => read_errors = 0,
                    }
                    self.on_event(event);
                    if reading && read_errors >= MAX_READ_ERRORS {
                        warn!("Core::run: {} read errors in a row, giving up on the port", read_errors);
                        reading = false;
                        self.on_event(TransportEvent::Disconnect);
                    }
                }
                request = self.requests.recv() => match request {
                    Some(request) => self.handle(request).await,
                    None => break,
                },
            }
        }
        debug!("Core::run: every handle dropped, exiting");
    }

    fn on_event(&mut self, event: TransportEvent) {
        match (event, &mut self.lines) {
            (TransportEvent::Data(data), Some(lines)) => {
                for line in lines.push(&data) {
                    self.correlator.on_event(TransportEvent::Data(line));
                }
            }
            (event, _) => self.correlator.on_event(event),
        }
        self.open.send_replace(self.correlator.is_open());
    }

    async fn handle(&mut self, request: Request) {
        match request {
            Request::Write(command) => {
                let Some(frame) = self.correlator.write(&command) else {
                    return;
                };
                match self.serial.write(frame.as_bytes()).await {
                    Ok(()) if self.debug => debug!("Write results: {} bytes sent", frame.len()),
                    Ok(()) => {}
                    Err(e) => error!("An error has occurred during writing {:?}: {}", command, e),
                }
            }
            Request::Register { key, callback } => self.correlator.register_callback(key, callback),
            Request::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

/// reads from `serial`, waiting `delay` first
async fn read_after<Serial: AsyncSerial>(
    serial: &mut Serial,
    buf: &mut [u8],
    delay: Duration,
) -> io::Result<usize> {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    serial.read(buf).await
}

/// maps the outcome of a read to the signal it stands for
fn read_event(read: io::Result<usize>, buf: &[u8]) -> TransportEvent {
    match read {
        Ok(0) => TransportEvent::Disconnect,
        Ok(n) => TransportEvent::Data(buf[..n].to_vec()),
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
            ) =>
        {
            TransportEvent::Disconnect
        }
        Err(e) => TransportEvent::Error(e),
    }
}

impl CoreHandle {
    pub fn is_open(&self) -> bool {
        *self.open.borrow()
    }

    /// Resolves once the transport has signaled open.
    pub async fn opened(&self) -> Result<()> {
        let mut open = self.open.clone();
        open.wait_for(|open| *open).await.map_err(|_| Error::Closed)?;
        Ok(())
    }

    /// Sends `command` without waiting for anything.
    ///
    /// Fails with [Error::NotOpen], writing nothing, if the port hasn't opened yet.
    /// The outcome of the write itself is only logged.
    pub fn write(&self, command: impl Into<String>) -> Result<()> {
        let command = command.into();
        if !self.is_open() {
            debug!(
                "The port is not open yet, wait for CoreHandle::opened() before writing {:?}",
                command
            );
            return Err(Error::NotOpen);
        }
        self.send(Request::Write(command))
    }

    /// Calls `callback` once, when a reply for `key` arrives.
    ///
    /// A later registration for the same key replaces this one. There is no way to cancel it.
    pub fn register_callback<F>(&self, key: impl Into<String>, callback: F) -> Result<()>
    where
        F: FnOnce(Option<i64>) + Send + 'static,
    {
        self.send(Request::Register {
            key: key.into(),
            callback: Box::new(callback),
        })
    }

    /// Sends `command` and waits for the reply matched by `key`.
    ///
    /// Waits forever if the board never answers; wrap it in [tokio::time::timeout] if that matters.
    pub async fn query(&self, key: impl Into<String>, command: impl Into<String>) -> Result<Option<i64>> {
        if !self.is_open() {
            return Err(Error::NotOpen);
        }
        let key = key.into();
        let (tx, rx) = oneshot::channel();
        self.register_callback(key.clone(), move |value| {
            let _ = tx.send(value);
        })?;
        self.write(command)?;
        trace!("query: waiting on {:?}", key);
        rx.await.map_err(|_| {
            if self.requests.is_closed() {
                Error::Closed
            } else {
                Error::Superseded(key)
            }
        })
    }

    /// Resolves once every request sent before it has been handed to the transport.
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Request::Flush(tx))?;
        rx.await.map_err(|_| Error::Closed)
    }

    fn send(&self, request: Request) -> Result<()> {
        self.requests.send(request).map_err(|_| Error::Closed)
    }
}

impl Debug for CoreHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CoreHandle")
            .field("is_open", &self.is_open())
            .finish()
    }
}

impl<Serial: AsyncSerial> Debug for Core<Serial> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Core")
            .field("correlator", &self.correlator)
            .finish()
    }
}
