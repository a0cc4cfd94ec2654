use std::collections::HashMap;
use std::fmt::Debug;

use defmt_or_log::{debug, error, info, trace, warn};

use super::TransportEvent;

/// Single-shot continuation, called with the value after `L` if the reply had one.
pub type Callback = Box<dyn FnOnce(Option<i64>) + Send + 'static>;

/// every complete reply carries it
const OK_MARKER: &str = "OK";
const OK_SUFFIX: &str = " OK";
/// separates the correlation key from the value in `KEY L<value> OK`
const VALUE_SEPARATOR: &str = " L";

/// Matches replies coming from the board to the callbacks waiting for them.
///
/// It doesn't own the transport: [Correlator::write] returns the bytes to send and
/// transport signals are fed in through [Correlator::on_event].
pub struct Correlator {
    /// set once, when the transport signals open
    is_open: bool,
    /// callbacks waiting for a reply, by correlation key
    pending: HashMap<String, Callback>,
    /// log every line in and out
    debug: bool,
}

impl Correlator {
    pub fn new(debug: bool) -> Self {
        Self {
            is_open: false,
            pending: HashMap::new(),
            debug,
        }
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// is a callback still waiting on `key`?
    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn on_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Open => self.open(),
            TransportEvent::Data(data) => self.on_data(&data),
            TransportEvent::Error(e) => error!("An error has occurred with the serial port: {}", e),
            TransportEvent::Disconnect => warn!("Serial port disconnected"),
        }
    }

    fn open(&mut self) {
        if self.is_open {
            return;
        }
        self.is_open = true;
        info!("Serial port opened successfully");
    }

    /// Frames `command` as a line ready for the transport.
    ///
    /// Returns `None`, sending nothing, while the port is not open: commands are dropped, not queued.
    pub fn write(&self, command: &str) -> Option<String> {
        if !self.is_open {
            if self.debug {
                debug!("The port is not open yet, dropping {:?}", command);
            }
            return None;
        }
        if self.debug {
            debug!("Writing {:?}", command);
        }
        Some(format!("\n{command}\n"))
    }

    /// Stores `callback` under `key`, replacing whatever was waiting there.
    pub fn register_callback(&mut self, key: String, callback: Callback) {
        if self.pending.insert(key, callback).is_some() {
            trace!("register_callback: replaced a pending callback");
        }
    }

    /// Handles a chunk delivered by the transport.
    ///
    /// The chunk is expected to hold one whole reply: newlines are stripped and, if what is
    /// left contains `OK`, it is dispatched. Anything else is discarded.
    pub fn on_data(&mut self, data: &[u8]) {
        if !self.is_open {
            trace!("on_data: port not open, ignoring {} bytes", data.len());
            return;
        }
        let line: String = String::from_utf8_lossy(data)
            .chars()
            .filter(|c| !matches!(c, '\n' | '\r'))
            .collect();
        if self.debug {
            debug!("Data received: {:?}", line);
        }
        if line.contains(OK_MARKER) {
            self.dispatch(&line);
        }
    }

    /// Finds the callback `line` answers and fires it.
    ///
    /// `KEY L<value> OK` fires `KEY` with the parsed value, `KEY OK` fires `KEY` without one.
    /// Only the first ` L` splits, so keys can't contain it. Everything from the first ` OK`
    /// on is ignored, and so is whatever follows the leading integer of the value.
    /// Unmatched and malformed lines are dropped.
    pub fn dispatch(&mut self, line: &str) {
        if !self.is_open {
            return;
        }

        if !line.contains('L') {
            let key = before_ok(line);
            self.fire(key, None);
            return;
        }

        let Some((key, remainder)) = line.split_once(VALUE_SEPARATOR) else {
            trace!("dispatch: no value separator in {:?}", line);
            return;
        };
        if key.is_empty() || remainder.is_empty() || !self.pending.contains_key(key) {
            trace!("dispatch: nothing to do for {:?}", line);
            return;
        }

        let raw = before_ok(remainder);
        match leading_int(raw) {
            Some(value) => self.fire(key, Some(value)),
            // the callback stays registered, a well formed reply may still come
            None => warn!("dispatch: invalid value {:?} for {:?}", raw, key),
        }
    }

    fn fire(&mut self, key: &str, value: Option<i64>) {
        let Some(callback) = self.pending.remove(key) else {
            trace!("fire: no callback registered for {:?}", key);
            return;
        };
        if self.debug {
            debug!("Reply for {:?}: {:?}", key, value);
        }
        callback(value);
    }
}

/// `text` up to the first ` OK`, all of it if there is none
fn before_ok(text: &str) -> &str {
    text.split_once(OK_SUFFIX).map_or(text, |(before, _)| before)
}

/// Base-10 integer at the start of `text`, after optional whitespace and sign.
/// Trailing garbage is ignored: `"12 L3"` is 12, `"x12"` is nothing.
fn leading_int(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let unsigned = text.trim_start_matches(['+', '-']);
    let sign_len = text.len() - unsigned.len();
    if sign_len > 1 {
        return None;
    }
    let digits = unsigned.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    text[..sign_len + digits].parse().ok()
}

impl Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("is_open", &self.is_open)
            .field("pending", &self.pending.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;

    type Calls = Arc<Mutex<Vec<Option<i64>>>>;

    fn recorder() -> (Calls, impl Fn() -> Callback) {
        let calls: Calls = Arc::default();
        let make = {
            let calls = calls.clone();
            move || -> Callback {
                let calls = calls.clone();
                Box::new(move |value| calls.lock().unwrap().push(value))
            }
        };
        (calls, make)
    }

    fn opened() -> Correlator {
        let mut correlator = Correlator::new(true);
        correlator.on_event(TransportEvent::Open);
        correlator
    }

    #[test]
    fn value_reply_fires_once() {
        let (calls, callback) = recorder();
        let mut c = opened();
        c.register_callback("D00".to_string(), callback());
        c.dispatch("D00 L1234 OK");
        assert_eq!(*calls.lock().unwrap(), vec![Some(1234)]);
        assert!(!c.is_pending("D00"));
    }

    #[test]
    fn ack_fires_without_value() {
        let (calls, callback) = recorder();
        let mut c = opened();
        c.register_callback("M56".to_string(), callback());
        c.dispatch("M56 OK");
        assert_eq!(*calls.lock().unwrap(), vec![None]);
    }

    #[test]
    fn bare_key_fires() {
        let (calls, callback) = recorder();
        let mut c = opened();
        c.register_callback("D00".to_string(), callback());
        c.dispatch("D00");
        assert_eq!(*calls.lock().unwrap(), vec![None]);
    }

    #[test]
    fn unmatched_replies_are_dropped() {
        let (calls, callback) = recorder();
        let mut c = opened();
        c.register_callback("R12 D10".to_string(), callback());
        c.dispatch("R13 A10 L5 OK");
        c.dispatch("R99 OK");
        c.dispatch(" L5 OK");
        c.dispatch("R12 D10 L");
        c.dispatch("XL OK");
        assert!(calls.lock().unwrap().is_empty());
        assert!(c.is_pending("R12 D10"));
    }

    #[test]
    fn second_registration_replaces_first() {
        let (first, first_callback) = recorder();
        let (second, second_callback) = recorder();
        let mut c = opened();
        c.register_callback("R52 D0".to_string(), first_callback());
        c.register_callback("R52 D0".to_string(), second_callback());
        assert_eq!(c.pending_len(), 1);
        c.dispatch("R52 D0 L0 OK");
        assert!(first.lock().unwrap().is_empty());
        assert_eq!(*second.lock().unwrap(), vec![Some(0)]);
    }

    #[test]
    fn no_double_fire_without_registering_again() {
        let (calls, callback) = recorder();
        let mut c = opened();
        c.register_callback("R52 D0".to_string(), callback());
        c.dispatch("R52 D0 L0 OK");
        c.dispatch("R52 D0 L0 OK");
        assert_eq!(*calls.lock().unwrap(), vec![Some(0)]);

        c.register_callback("R52 D0".to_string(), callback());
        c.dispatch("R52 D0 L7 OK");
        assert_eq!(*calls.lock().unwrap(), vec![Some(0), Some(7)]);
    }

    #[test]
    fn first_separator_wins() {
        let (calls, callback) = recorder();
        let mut c = opened();
        c.register_callback("R13 A1".to_string(), callback());
        c.dispatch("R13 A1 L-42 OK");
        assert_eq!(*calls.lock().unwrap(), vec![Some(-42)]);

        // `R13 A1 L2` is not a key, the first ` L` splits and the value stops at `2`
        c.register_callback("R13 A1 L2".to_string(), callback());
        c.register_callback("R13 A1".to_string(), callback());
        c.dispatch("R13 A1 L2 L3 OK");
        assert_eq!(*calls.lock().unwrap(), vec![Some(-42), Some(2)]);
        assert!(c.is_pending("R13 A1 L2"));
    }

    #[test]
    fn text_after_ok_is_ignored() {
        let (calls, callback) = recorder();
        let mut c = opened();
        c.register_callback("R13 A10".to_string(), callback());
        c.register_callback("M56".to_string(), callback());
        c.dispatch("R13 A10 L512 OK ");
        c.dispatch("M56 OK ");
        assert_eq!(*calls.lock().unwrap(), vec![Some(512), None]);

        c.register_callback("R12 D3".to_string(), callback());
        c.on_data(b"R12 D3 L1 OK trailing\r\n");
        assert_eq!(*calls.lock().unwrap(), vec![Some(512), None, Some(1)]);
    }

    #[test]
    fn values_parse_like_leading_integers() {
        assert_eq!(leading_int("512"), Some(512));
        assert_eq!(leading_int(" -7 "), Some(-7));
        assert_eq!(leading_int("+3"), Some(3));
        assert_eq!(leading_int("12abc"), Some(12));
        assert_eq!(leading_int("2 L3"), Some(2));
        assert_eq!(leading_int(""), None);
        assert_eq!(leading_int("-"), None);
        assert_eq!(leading_int("--1"), None);
        assert_eq!(leading_int("x12"), None);
        assert_eq!(leading_int("99999999999999999999"), None);
    }

    #[test]
    fn invalid_value_keeps_callback() {
        let (calls, callback) = recorder();
        let mut c = opened();
        c.register_callback("R13 A10".to_string(), callback());
        c.dispatch("R13 A10 Lxyz OK");
        c.dispatch("R13 A10 L OK");
        assert!(calls.lock().unwrap().is_empty());
        assert!(c.is_pending("R13 A10"));
        c.dispatch("R13 A10 L12 OK");
        assert_eq!(*calls.lock().unwrap(), vec![Some(12)]);
    }

    #[test]
    fn nothing_fires_before_open() {
        let (calls, callback) = recorder();
        let mut c = Correlator::new(false);
        c.register_callback("R13 A10".to_string(), callback());
        c.on_data(b"R13 A10 L0 OK\r\n");
        c.dispatch("R13 A10 L0 OK");
        assert!(calls.lock().unwrap().is_empty());

        c.on_event(TransportEvent::Open);
        c.on_data(b"R13 A10 L0 OK\r\n");
        assert_eq!(*calls.lock().unwrap(), vec![Some(0)]);
    }

    #[test]
    fn write_frames_only_when_open() {
        let mut c = Correlator::new(false);
        assert_eq!(c.write("M13 A10"), None);
        c.on_event(TransportEvent::Open);
        assert_eq!(c.write("M13 A10").as_deref(), Some("\nM13 A10\n"));
    }

    #[test]
    fn data_strips_newlines() {
        let (calls, callback) = recorder();
        let mut c = opened();
        c.register_callback("test".to_string(), callback());
        c.on_data(b"\r\ntest OK");
        assert_eq!(*calls.lock().unwrap(), vec![None]);
    }

    #[test]
    fn data_without_ok_is_discarded() {
        let (calls, callback) = recorder();
        let mut c = opened();
        c.register_callback("R13 A10".to_string(), callback());
        c.on_data(b"R13 A10 L5\r\n");
        c.on_data(b"\r\n");
        assert!(calls.lock().unwrap().is_empty());
        assert!(c.is_pending("R13 A10"));
    }

    #[test]
    fn transport_failures_keep_state() {
        let mut c = opened();
        c.register_callback("M56".to_string(), Box::new(|_| {}));
        c.on_event(TransportEvent::Error(io::Error::other("framing error")));
        c.on_event(TransportEvent::Disconnect);
        c.on_event(TransportEvent::Open);
        assert!(c.is_open());
        assert!(c.is_pending("M56"));
    }
}
