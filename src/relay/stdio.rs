//! Purpose: Newline-delimited JSON-RPC loop for the relay.
//! Exports: `serve`, `SharedWriter`.
//! Role: Reads stdin lines, feeds the dispatcher, writes one JSON line per response.
//! Invariants: The output stream only ever carries JSON-RPC messages.
//! Invariants: Each line is written and flushed under one lock, so concurrent
//! writers never interleave bytes.
//! Invariants: Malformed lines are logged and skipped; EOF ends the loop cleanly.

use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::error::{Error, ErrorKind};
use crate::mcp::{DispatchOutcome, McpDispatcher, McpHandler, parse_jsonrpc_line};

/// Cloneable handle to the transport's output stream.
pub struct SharedWriter<W> {
    inner: Arc<Mutex<W>>,
}

impl<W> Clone for SharedWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: Write> SharedWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    pub fn write_line<T: Serialize>(&self, message: &T) -> Result<(), Error> {
        let mut line = serde_json::to_vec(message).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode MCP message")
                .with_source(err)
        })?;
        line.push(b'\n');
        let mut writer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let written = writer.write_all(&line);
        written.and_then(|()| writer.flush()).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write MCP message")
                .with_source(err)
        })
    }

    /// Returns the writer once no other handle is alive.
    pub fn into_inner(self) -> Option<W> {
        Arc::try_unwrap(self.inner)
            .ok()
            .map(|mutex| mutex.into_inner().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Runs the loop until `reader` hits EOF.
pub fn serve<R, W, H>(
    mut reader: R,
    writer: &SharedWriter<W>,
    dispatcher: &mut McpDispatcher<H>,
) -> Result<(), Error>
where
    R: BufRead,
    W: Write,
    H: McpHandler,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read MCP request")
                .with_source(err)
        })?;
        if read == 0 {
            return Ok(());
        }
        let Ok(line) = std::str::from_utf8(&buf) else {
            warn!(bytes = buf.len(), "ignoring MCP line that is not valid UTF-8");
            continue;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }

        let value = match parse_jsonrpc_line(message) {
            Ok(value) => value,
            Err(error) => {
                warn!(error = %error.message, "ignoring malformed MCP line");
                continue;
            }
        };
        if let Some(method) = value.get("method").and_then(|method| method.as_str()) {
            debug!(method, "received");
        }

        match dispatcher.dispatch_value(value) {
            DispatchOutcome::NoResponse => {}
            DispatchOutcome::Response(response) => writer.write_line(&response)?,
        }
    }
}
