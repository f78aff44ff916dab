//! Json line control channel to the host companion app.
//!
//! Each request is one line of json, see [`macropad_types::protocol::host`]. A line which is not valid json puts
//! the channel into recovery: incoming bytes are discarded until the host goes quiet, then the macros are reloaded
//! from storage and the host is warned with `{"WARN":"Reloaded: <file>"}`.
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use macropad_types::protocol::host::{Command, Request, Response};
use serde_json::Value;

use crate::config::{HostConfig, StorageConfig};
use crate::macro_store::MacroStore;
use crate::settings::Settings;
use crate::storage::{FileStorage, StorageError};

/// A byte stream to the host, e.g. a USB CDC data interface. None of the calls may block
pub trait SerialPort {
    /// Whether a host has the port open
    fn connected(&mut self) -> bool;

    /// Number of bytes ready to be read
    fn in_waiting(&mut self) -> usize;

    /// Read up to `buf.len()` bytes, returns the number of bytes read
    fn read(&mut self, buf: &mut [u8]) -> usize;

    fn write(&mut self, bytes: &[u8]);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostError {
    InvalidJson,
    LineTooLong,
    /// A streamed macro without an `id`
    MissingId,
    Storage(StorageError),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::InvalidJson => f.write_str("Invalid json"),
            HostError::LineTooLong => f.write_str("Line too long"),
            HostError::MissingId => f.write_str("Missing id"),
            HostError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl From<StorageError> for HostError {
    fn from(e: StorageError) -> Self {
        HostError::Storage(e)
    }
}

/// Follow-up work for the main loop after a request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostEffect {
    None,
    /// New settings were stored, apply them
    SettingsChanged,
    /// The macro tree was replaced, go back to the root group and wake the display
    MacrosReplaced,
    /// Write the usb marker and hard reset
    EnableUsb,
    SoftReset,
    HardReset,
}

/// The state the host can read and change
pub struct HostContext<'c, S: FileStorage> {
    pub settings: &'c mut Settings,
    pub store: &'c mut MacroStore,
    pub storage: &'c mut S,
}

pub struct ControlChannel<'a> {
    config: HostConfig<'a>,
    files: StorageConfig<'a>,
    /// Bytes of the line being received
    buffer: Vec<u8>,
    was_connected: bool,
    /// Discarding input after a malformed line
    draining: bool,
}

impl<'a> ControlChannel<'a> {
    pub fn new(config: HostConfig<'a>, files: StorageConfig<'a>) -> Self {
        Self {
            config,
            files,
            buffer: Vec::new(),
            was_connected: false,
            draining: false,
        }
    }

    /// Connection state as of the last [`ControlChannel::poll_connection`]
    pub fn is_connected(&self) -> bool {
        self.was_connected
    }

    pub fn is_draining(&self) -> bool {
        self.draining
    }

    /// Whether there's a received line, or bytes to read
    pub fn has_input<P: SerialPort + ?Sized>(&self, port: &mut P) -> bool {
        !self.buffer.is_empty() || port.in_waiting() > 0
    }

    pub fn send<P: SerialPort + ?Sized>(port: &mut P, response: &Response) {
        port.write(&response.to_line());
    }

    /// Track the connection state, greeting the host when it connects.
    ///
    /// The greeting is the firmware version, whether the storage is exposed over USB (and thus read-only for the
    /// firmware) and, if an audio directory is configured, the audio files in it. Returns `true` on the connect edge.
    pub fn poll_connection<P, S>(&mut self, port: &mut P, storage: &mut S) -> bool
    where
        P: SerialPort + ?Sized,
        S: FileStorage,
    {
        let connected = port.connected();
        let rising = connected && !self.was_connected;
        self.was_connected = connected;
        if !rising {
            return false;
        }

        info!("Host connected");
        Self::send(port, &Response::ack_with("version", self.config.firmware_version));
        Self::send(port, &Response::ack_with("usbenabled", storage.is_read_only()));
        if let Some(dir) = self.files.audio_dir {
            match storage.list(dir) {
                Ok(files) => Self::send(port, &Response::ack_with("audiofiles", files)),
                Err(e) => warn!("Failed to list audio files in {}: {:?}", dir, e),
            }
        }
        true
    }

    /// One recovery step: discard up to `readout_size` bytes. Once the host is quiet the macros are reloaded and
    /// the host is warned, then [`HostEffect::MacrosReplaced`] is returned.
    pub fn recover<P, S>(&mut self, port: &mut P, store: &mut MacroStore, storage: &mut S) -> HostEffect
    where
        P: SerialPort + ?Sized,
        S: FileStorage,
    {
        self.buffer.clear();
        let waiting = port.in_waiting();
        if waiting > 0 {
            let mut scratch = [0u8; 64];
            let mut left = waiting.min(self.config.readout_size);
            while left > 0 {
                let chunk = left.min(scratch.len());
                let read = port.read(&mut scratch[..chunk]);
                if read == 0 {
                    break;
                }
                left -= read;
            }
            return HostEffect::None;
        }

        self.draining = false;
        store.replace(MacroStore::load(storage, self.files.macro_file));
        Self::send(port, &Response::warn(format!("Reloaded: {}", self.files.macro_file)));
        HostEffect::MacrosReplaced
    }

    /// Read input and handle at most one complete line
    pub fn process<P, S>(&mut self, port: &mut P, ctx: HostContext<'_, S>) -> HostEffect
    where
        P: SerialPort + ?Sized,
        S: FileStorage,
    {
        let result = match self.read_line(port) {
            None => return HostEffect::None,
            Some(Ok(line)) => self.handle_line(port, &line, ctx),
            Some(Err(e)) => Err(e),
        };
        match result {
            Ok(effect) => effect,
            Err(e) => {
                error!("Host request failed: {:?}", e);
                Self::send(port, &Response::err(e.to_string()));
                self.draining = true;
                HostEffect::None
            }
        }
    }

    fn read_line<P: SerialPort + ?Sized>(&mut self, port: &mut P) -> Option<Result<Vec<u8>, HostError>> {
        if !self.buffer.contains(&b'\n') {
            let n = port.in_waiting().min(self.config.read_chunk_size);
            if n > 0 {
                let start = self.buffer.len();
                self.buffer.resize(start + n, 0);
                let read = port.read(&mut self.buffer[start..]);
                self.buffer.truncate(start + read);
            }
        }

        if let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
            let rest = self.buffer.split_off(end + 1);
            let mut line = core::mem::replace(&mut self.buffer, rest);
            line.truncate(end);
            return Some(Ok(line));
        }
        if self.buffer.len() > self.config.max_line_length {
            self.buffer.clear();
            return Some(Err(HostError::LineTooLong));
        }
        None
    }

    fn handle_line<P, S>(&mut self, port: &mut P, line: &[u8], ctx: HostContext<'_, S>) -> Result<HostEffect, HostError>
    where
        P: SerialPort + ?Sized,
        S: FileStorage,
    {
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(HostEffect::None);
        }
        let payload: Value = serde_json::from_slice(line).map_err(|_| HostError::InvalidJson)?;
        let Ok(request) = Request::from_value(&payload) else {
            Self::send(port, &Response::err(format!("Wrong payload: {}", payload)));
            return Ok(HostEffect::None);
        };
        debug!("Host command {}", request.command.as_str());

        let content = match (&request.content, request.command.requires_content()) {
            (None, true) => {
                Self::send(port, &Response::err(format!("No content: {}", payload)));
                return Ok(HostEffect::None);
            }
            (content, _) => content.as_ref().unwrap_or(&Value::Null),
        };

        let (response, effect) = match &request.command {
            Command::GetSettings => (Response::ack_with("settings", ctx.settings.to_json()), HostEffect::None),
            Command::SetSettings => {
                if ctx.storage.is_read_only() {
                    (
                        Response::err("Cannot set settings because USB storage is enabled"),
                        HostEffect::None,
                    )
                } else {
                    let settings = Settings::from_json(content);
                    settings.save(ctx.storage, self.files.settings_file)?;
                    *ctx.settings = settings;
                    (Response::ack("Settings are set"), HostEffect::SettingsChanged)
                }
            }
            Command::GetMacros => {
                Self::send(port, &Response::ack_with("macros", "start"));
                for (id, raw) in ctx.store.iter() {
                    Self::send(port, &Response::item("macros", id, raw));
                }
                (Response::ack_with("macros", "end"), HostEffect::None)
            }
            Command::SetMacros => match content.as_str() {
                Some("start") => {
                    ctx.store.begin_transfer();
                    return Ok(HostEffect::None);
                }
                Some("end") => {
                    let count = ctx.store.end_transfer();
                    info!("Received {} macro nodes", count);
                    (Response::ack_with("Macros received", count), HostEffect::MacrosReplaced)
                }
                _ => {
                    let id = request.id_string().ok_or(HostError::MissingId)?;
                    ctx.store.put(&id, content);
                    return Ok(HostEffect::None);
                }
            },
            Command::SaveMacros => {
                if ctx.store.save(ctx.storage, self.files.macro_file) {
                    (Response::ack("Macros stored"), HostEffect::None)
                } else {
                    (
                        Response::err("Cannot store macros because USB storage is enabled"),
                        HostEffect::None,
                    )
                }
            }
            Command::EnableUsb => (Response::ack("Enable USB"), HostEffect::EnableUsb),
            Command::SoftReset => (Response::ack("Softreset"), HostEffect::SoftReset),
            Command::HardReset => (Response::ack("Hardreset"), HostEffect::HardReset),
            Command::Unknown(name) => (Response::err(format!("Unkown command: {}", name)), HostEffect::None),
        };
        Self::send(port, &response);
        Ok(effect)
    }
}

/// Split written bytes into response lines
#[cfg(test)]
pub(crate) fn lines(bytes: &[u8]) -> Vec<String> {
    bytes
        .split(|&b| b == b'\n')
        .filter(|l| !l.is_empty())
        .map(|l| String::from_utf8_lossy(l).into_owned())
        .collect()
}

#[cfg(test)]
mod test {
    use alloc::collections::VecDeque;
    use alloc::vec;

    use serde_json::json;

    use super::*;
    use crate::storage::RamStorage;

    #[derive(Default)]
    struct Port {
        connected: bool,
        input: VecDeque<u8>,
        output: Vec<u8>,
    }

    impl Port {
        fn feed(&mut self, line: &str) {
            self.input.extend(line.as_bytes());
            self.input.push_back(b'\n');
        }

        fn take_lines(&mut self) -> Vec<String> {
            let out = lines(&self.output);
            self.output.clear();
            out
        }
    }

    impl SerialPort for Port {
        fn connected(&mut self) -> bool {
            self.connected
        }

        fn in_waiting(&mut self) -> usize {
            self.input.len()
        }

        fn read(&mut self, buf: &mut [u8]) -> usize {
            let n = buf.len().min(self.input.len());
            for (slot, byte) in buf.iter_mut().zip(self.input.drain(..n)) {
                *slot = byte;
            }
            n
        }

        fn write(&mut self, bytes: &[u8]) {
            self.output.extend_from_slice(bytes);
        }
    }

    struct Fixture {
        channel: ControlChannel<'static>,
        port: Port,
        settings: Settings,
        store: MacroStore,
        storage: RamStorage,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                channel: ControlChannel::new(HostConfig::default(), StorageConfig::default()),
                port: Port {
                    connected: true,
                    ..Default::default()
                },
                settings: Settings::default(),
                store: MacroStore::default_root(),
                storage: RamStorage::new(),
            }
        }

        fn process(&mut self) -> HostEffect {
            let ctx = HostContext {
                settings: &mut self.settings,
                store: &mut self.store,
                storage: &mut self.storage,
            };
            self.channel.process(&mut self.port, ctx)
        }

        fn request(&mut self, line: &str) -> (HostEffect, Vec<String>) {
            self.port.feed(line);
            let effect = self.process();
            (effect, self.port.take_lines())
        }
    }

    #[test]
    fn test_greeting_on_connect_edge() {
        let mut storage = RamStorage::new().with_file("sounds/a.wav", "").with_file("sounds/b.wav", "");
        let files = StorageConfig {
            audio_dir: Some("sounds"),
            ..Default::default()
        };
        let mut channel = ControlChannel::new(HostConfig::default(), files);
        let mut port = Port::default();
        assert!(!channel.poll_connection(&mut port, &mut storage));

        port.connected = true;
        assert!(channel.poll_connection(&mut port, &mut storage));
        assert!(!channel.poll_connection(&mut port, &mut storage));
        let version = format!("{{\"ACK\":\"version\",\"CONTENT\":\"{}\"}}", crate::config::FIRMWARE_VERSION);
        assert_eq!(
            port.take_lines(),
            [
                version,
                "{\"ACK\":\"usbenabled\",\"CONTENT\":false}".to_string(),
                "{\"ACK\":\"audiofiles\",\"CONTENT\":[\"sounds/a.wav\",\"sounds/b.wav\"]}".to_string(),
            ]
        );

        port.connected = false;
        assert!(!channel.poll_connection(&mut port, &mut storage));
        port.connected = true;
        assert!(channel.poll_connection(&mut port, &mut storage));
    }

    #[test]
    fn test_settings_commands() {
        let mut f = Fixture::new();
        let (effect, lines) = f.request(r#"{"command":"get_settings"}"#);
        assert_eq!(effect, HostEffect::None);
        let response: Response = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(response.ack.as_deref(), Some("settings"));
        assert_eq!(response.content, Some(Settings::default().to_json()));

        let (effect, lines) = f.request(r#"{"command":"set_settings","content":{"brightness":0.5,"theme":"x"}}"#);
        assert_eq!(effect, HostEffect::SettingsChanged);
        assert_eq!(lines, [r#"{"ACK":"Settings are set"}"#]);
        assert_eq!(f.settings.brightness, 0.5);
        assert!(f.storage.file("settings.json").is_some());

        f.storage.set_read_only(true);
        let (effect, lines) = f.request(r#"{"command":"set_settings","content":{}}"#);
        assert_eq!(effect, HostEffect::None);
        assert_eq!(lines, [r#"{"ERR":"Cannot set settings because USB storage is enabled"}"#]);
    }

    #[test]
    fn test_streamed_macros() {
        let mut f = Fixture::new();
        assert_eq!(f.request(r#"{"command":"set_macros","content":"start"}"#).1, Vec::<String>::new());
        let items = [
            ("2", json!({"type": "blank"})),
            ("0", json!({"type": "group", "label": "Root", "content": ["1", "2"]})),
            ("1", json!({"type": "macro", "label": "Copy", "content": [{"kc": "CONTROL,C"}]})),
        ];
        for (id, node) in &items {
            let line = json!({"command": "set_macros", "id": id, "content": node.to_string()}).to_string();
            assert!(f.request(&line).1.is_empty());
        }
        let (effect, lines) = f.request(r#"{"command":"set_macros","content":"end"}"#);
        assert_eq!(effect, HostEffect::MacrosReplaced);
        assert_eq!(lines, [r#"{"ACK":"Macros received","CONTENT":3}"#]);
        assert_eq!(f.store.len(), 3);

        let (_, lines) = f.request(r#"{"command":"get_macros"}"#);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], r#"{"ACK":"macros","CONTENT":"start"}"#);
        assert_eq!(
            lines[1],
            r#"{"ACK":"macros","ID":"0","CONTENT":"{\"content\":[\"1\",\"2\"],\"label\":\"Root\",\"type\":\"group\"}"}"#
        );
        assert_eq!(lines[4], r#"{"ACK":"macros","CONTENT":"end"}"#);

        let (_, lines) = f.request(r#"{"command":"save_macros"}"#);
        assert_eq!(lines, [r#"{"ACK":"Macros stored"}"#]);
        f.storage.set_read_only(true);
        let (_, lines) = f.request(r#"{"command":"save_macros"}"#);
        assert_eq!(lines, [r#"{"ERR":"Cannot store macros because USB storage is enabled"}"#]);
    }

    #[test]
    fn test_protocol_errors() {
        let mut f = Fixture::new();
        let (_, lines) = f.request(r#"{"content":1}"#);
        assert_eq!(lines, [r#"{"ERR":"Wrong payload: {\"content\":1}"}"#]);
        let (_, lines) = f.request(r#"{"command":"set_macros"}"#);
        assert_eq!(lines, [r#"{"ERR":"No content: {\"command\":\"set_macros\"}"}"#]);
        let (_, lines) = f.request(r#"{"command":"dance"}"#);
        assert_eq!(lines, [r#"{"ERR":"Unkown command: dance"}"#]);
        assert!(!f.channel.is_draining());
    }

    #[test]
    fn test_resets() {
        let mut f = Fixture::new();
        assert_eq!(
            f.request(r#"{"command":"enable_usb"}"#),
            (HostEffect::EnableUsb, vec![r#"{"ACK":"Enable USB"}"#.to_string()])
        );
        assert_eq!(
            f.request(r#"{"command":"soft_reset"}"#),
            (HostEffect::SoftReset, vec![r#"{"ACK":"Softreset"}"#.to_string()])
        );
        assert_eq!(
            f.request(r#"{"command":"hard_reset"}"#),
            (HostEffect::HardReset, vec![r#"{"ACK":"Hardreset"}"#.to_string()])
        );
    }

    #[test]
    fn test_invalid_json_drains_and_reloads() {
        let mut f = Fixture::new();
        f.store.upsert("1", &json!({"type": "blank"}));

        let (effect, lines) = f.request("{\"command\": ");
        assert_eq!(effect, HostEffect::None);
        assert_eq!(lines, [r#"{"ERR":"Invalid json"}"#]);
        assert!(f.channel.is_draining());

        // 100 bytes of garbage take two recovery steps
        f.port.input.extend([b'x'; 100]);
        assert_eq!(f.channel.recover(&mut f.port, &mut f.store, &mut f.storage), HostEffect::None);
        assert_eq!(f.port.input.len(), 36);
        assert_eq!(f.channel.recover(&mut f.port, &mut f.store, &mut f.storage), HostEffect::None);
        assert!(f.port.input.is_empty());
        assert!(f.port.take_lines().is_empty());

        assert_eq!(
            f.channel.recover(&mut f.port, &mut f.store, &mut f.storage),
            HostEffect::MacrosReplaced
        );
        assert!(!f.channel.is_draining());
        assert_eq!(f.port.take_lines(), [r#"{"WARN":"Reloaded: macros.json"}"#]);
        // Nothing saved, so the default tree is back
        assert_eq!(f.store.len(), 1);
    }

    #[test]
    fn test_partial_and_batched_lines() {
        let mut f = Fixture::new();
        f.port.input.extend(br#"{"command":"hard_"#);
        assert_eq!(f.process(), HostEffect::None);
        f.port.input.extend(b"reset\"}\n{\"command\":\"soft_reset\"}\n");
        assert_eq!(f.process(), HostEffect::HardReset);
        // The second line is already buffered
        assert!(f.channel.has_input(&mut f.port));
        assert_eq!(f.process(), HostEffect::SoftReset);
        assert!(!f.channel.has_input(&mut f.port));
    }

    #[test]
    fn test_line_too_long() {
        let mut f = Fixture::new();
        f.channel.config.max_line_length = 8;
        f.channel.config.read_chunk_size = 16;
        f.port.input.extend([b' '; 16]);
        assert_eq!(f.process(), HostEffect::None);
        assert_eq!(f.port.take_lines(), [r#"{"ERR":"Line too long"}"#]);
        assert!(f.channel.is_draining());
    }
}
