// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log streamer: multiplexes a container's raw stdout/stderr bytes into
//! bounded, newline-framed messages on the log bus.
//!
//! Framing rules:
//! - every `\n` and `\r` terminates the current message; empty segments
//!   (adjacent delimiters, `\r\n`, `\n\r`) emit nothing,
//! - a message never exceeds the configured size cap; oversized input is
//!   emitted as consecutive capped messages,
//! - a message never ends mid-codepoint; trailing bytes of an incomplete
//!   UTF-8 sequence carry over to the next emission.
//!
//! Writes to the two streams may race; ordering is preserved within a
//! stream only.

use parking_lot::Mutex;
use std::sync::Arc;
use stevedore_core::{Clock, LogConfig};

/// Kind of stream a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Out,
    Err,
}

stevedore_core::simple_display! {
    MessageKind {
        Out => "OUT",
        Err => "ERR",
    }
}

/// One framed message bound for the log bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub app_id: String,
    pub source_name: String,
    pub source_id: String,
    pub kind: MessageKind,
    pub timestamp_ns: i64,
    pub message: Vec<u8>,
}

/// The log bus seam. Delivery is synchronous and best-effort; emitters must
/// not block and must swallow their own failures.
pub trait LogEmitter: Send + Sync {
    fn emit(&self, message: LogMessage);
}

/// Bridges the log bus onto the daemon's own tracing output. Stands in for
/// an external bus transport, which is outside the agent.
pub struct TracingEmitter;

impl LogEmitter for TracingEmitter {
    fn emit(&self, message: LogMessage) {
        tracing::info!(
            app_id = %message.app_id,
            source = %message.source_name,
            source_id = %message.source_id,
            kind = %message.kind,
            "{}",
            String::from_utf8_lossy(&message.message),
        );
    }
}

/// Per-container log streamer. Safe for concurrent writes; each stream owns
/// its buffer behind its own lock.
pub struct LogStreamer<C: Clock> {
    config: LogConfig,
    source_id: String,
    emitter: Arc<dyn LogEmitter>,
    clock: C,
    max_message_size: usize,
    stdout: Mutex<Vec<u8>>,
    stderr: Mutex<Vec<u8>>,
}

impl<C: Clock> LogStreamer<C> {
    /// An absent source index is reported as "0".
    pub fn new(
        config: LogConfig,
        emitter: Arc<dyn LogEmitter>,
        clock: C,
        max_message_size: usize,
    ) -> Self {
        let source_id = config.index.unwrap_or(0).to_string();
        Self {
            config,
            source_id,
            emitter,
            clock,
            max_message_size,
            stdout: Mutex::new(Vec::new()),
            stderr: Mutex::new(Vec::new()),
        }
    }

    pub fn write_stdout(&self, bytes: &[u8]) {
        self.write(MessageKind::Out, &self.stdout, bytes);
    }

    pub fn write_stderr(&self, bytes: &[u8]) {
        self.write(MessageKind::Err, &self.stderr, bytes);
    }

    /// Emit whatever is buffered on each stream as a single message.
    pub fn flush(&self) {
        if self.config.guid.is_empty() {
            return;
        }
        for (kind, buffer) in [(MessageKind::Out, &self.stdout), (MessageKind::Err, &self.stderr)] {
            let mut buffer = buffer.lock();
            if !buffer.is_empty() {
                self.emit(kind, std::mem::take(&mut *buffer));
            }
        }
    }

    fn write(&self, kind: MessageKind, buffer: &Mutex<Vec<u8>>, bytes: &[u8]) {
        // No app guid: behave as a sink.
        if self.config.guid.is_empty() {
            return;
        }
        let mut buffer = buffer.lock();
        for &byte in bytes {
            if byte == b'\n' || byte == b'\r' {
                if !buffer.is_empty() {
                    self.emit(kind, std::mem::take(&mut *buffer));
                }
                continue;
            }
            buffer.push(byte);
            if buffer.len() >= self.max_message_size {
                let split = utf8_safe_split(&buffer);
                if split == 0 {
                    continue;
                }
                let remainder = buffer.split_off(split);
                let chunk = std::mem::replace(&mut *buffer, remainder);
                self.emit(kind, chunk);
            }
        }
    }

    fn emit(&self, kind: MessageKind, message: Vec<u8>) {
        self.emitter.emit(LogMessage {
            app_id: self.config.guid.clone(),
            source_name: self.config.source_name.clone(),
            source_id: self.source_id.clone(),
            kind,
            timestamp_ns: self.clock.epoch_ns(),
            message,
        });
    }
}

/// Largest prefix of `buffer` that does not end mid-codepoint.
///
/// The tail of an incomplete multi-byte sequence stays behind for the next
/// emission. Invalid UTF-8 splits at the full length; the guarantee only
/// holds for valid input.
fn utf8_safe_split(buffer: &[u8]) -> usize {
    let len = buffer.len();
    let mut lead = len;
    while lead > 0 && len - lead < 4 && buffer[lead - 1] & 0xC0 == 0x80 {
        lead -= 1;
    }
    if lead == 0 {
        return len;
    }
    let lead_byte = buffer[lead - 1];
    let expected = match lead_byte {
        b if b >= 0xF0 => 4,
        b if b >= 0xE0 => 3,
        b if b >= 0xC0 => 2,
        _ => return len,
    };
    if len - (lead - 1) < expected {
        lead - 1
    } else {
        len
    }
}

/// Test emitter that records every emission.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeEmitter {
    messages: Mutex<Vec<LogMessage>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeEmitter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { messages: Mutex::new(Vec::new()) })
    }

    pub fn emissions(&self) -> Vec<LogMessage> {
        self.messages.lock().clone()
    }

    /// Message bodies in emission order, lossily decoded.
    pub fn bodies(&self) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .map(|m| String::from_utf8_lossy(&m.message).into_owned())
            .collect()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl LogEmitter for FakeEmitter {
    fn emit(&self, message: LogMessage) {
        self.messages.lock().push(message);
    }
}

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;
