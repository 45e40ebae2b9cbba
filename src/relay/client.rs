//! Purpose: Blocking HTTP client for the Bridge.
//! Exports: `BridgeClient`, `BridgeReply`, `extract_data`, `DEFAULT_HOST`.
//! Role: The relay's only way into the Bridge; turns envelopes into tool text.
//! Invariants: Non-2xx replies still carry envelopes and are unwrapped like 200s.
//! Invariants: Failures never escape as panics; transport errors become
//! `BridgeReply::Error` with `{"error": <description>}`.

use std::time::Duration;

use serde_json::{Map, Value, json};
use url::Url;

use crate::bridge::server::DEFAULT_PORT;
use crate::core::error::{Error, ErrorKind};

pub const DEFAULT_HOST: &str = "127.0.0.1";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const POST_TIMEOUT: Duration = Duration::from_secs(60);
const GET_TIMEOUT: Duration = Duration::from_secs(30);

type ClientResult<T> = Result<T, Error>;

/// Unwrapped Bridge answer, ready to be placed in a tool result text block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BridgeReply {
    Data(String),
    Error(String),
}

impl BridgeReply {
    pub fn is_error(&self) -> bool {
        matches!(self, BridgeReply::Error(_))
    }

    pub fn text(&self) -> &str {
        match self {
            BridgeReply::Data(text) | BridgeReply::Error(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            BridgeReply::Data(text) | BridgeReply::Error(text) => text,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        BridgeReply::Error(json!({ "error": message.into() }).to_string())
    }
}

#[derive(Clone)]
pub struct BridgeClient {
    base_url: String,
    agent: ureq::Agent,
}

impl Default for BridgeClient {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl BridgeClient {
    pub fn new(host: &str, port: u16) -> Self {
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]")
        } else {
            host.to_string()
        };
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .build();
        Self {
            base_url: format!("http://{host}:{port}/"),
            agent,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POSTs `body` as JSON and returns the decoded reply body.
    pub fn post(&self, path: &str, body: &Value) -> ClientResult<Value> {
        let url = self.endpoint(path)?;
        let payload = serde_json::to_string(body).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode request json")
                .with_source(err)
        })?;
        let response = self
            .agent
            .request("POST", url.as_str())
            .timeout(POST_TIMEOUT)
            .set("Accept", "application/json")
            .set("Content-Type", "application/json")
            .send_string(&payload);
        read_reply(response)
    }

    pub fn get(&self, path: &str) -> ClientResult<Value> {
        let url = self.endpoint(path)?;
        let response = self
            .agent
            .request("GET", url.as_str())
            .timeout(GET_TIMEOUT)
            .set("Accept", "application/json")
            .call();
        read_reply(response)
    }

    /// True when `/health` answers `{"status":"ok"}`.
    pub fn is_available(&self) -> bool {
        match self.get("/health") {
            Ok(body) => body.get("status").and_then(Value::as_str) == Some("ok"),
            Err(_) => false,
        }
    }

    /// POST and unwrap in one step; transport failures fold into `BridgeReply::Error`.
    pub fn post_reply(&self, path: &str, body: &Value) -> BridgeReply {
        match self.post(path, body) {
            Ok(envelope) => extract_data(&envelope),
            Err(err) => BridgeReply::error(err.describe()),
        }
    }

    pub fn get_reply(&self, path: &str) -> BridgeReply {
        match self.get(path) {
            Ok(envelope) => extract_data(&envelope),
            Err(err) => BridgeReply::error(err.describe()),
        }
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        let base = Url::parse(&self.base_url).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid bridge address: {}", self.base_url))
                .with_source(err)
        })?;
        base.join(path.trim_start_matches('/')).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid bridge path: {path}"))
                .with_source(err)
        })
    }
}

fn read_reply(response: Result<ureq::Response, ureq::Error>) -> ClientResult<Value> {
    match response {
        Ok(resp) => read_json_response(resp),
        Err(ureq::Error::Status(_, resp)) => read_json_response(resp),
        Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Io)
            .with_message("bridge request failed")
            .with_hint("Is the bridge running? Start it with `recaf-mcp bridge`.")
            .with_source(err)),
    }
}

fn read_json_response(resp: ureq::Response) -> ClientResult<Value> {
    let status = resp.status();
    let text = resp.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read bridge response")
            .with_source(err)
    })?;
    serde_json::from_str(&text).map_err(|err| {
        Error::new(ErrorKind::Corrupt)
            .with_message(format!("bridge returned invalid json (HTTP {status})"))
            .with_source(err)
    })
}

/// Unwraps a Bridge envelope.
///
/// Error envelopes collapse to `{error, code?, suggestion?}`; success envelopes
/// yield the compact rendering of `data`; anything else is passed through.
pub fn extract_data(envelope: &Value) -> BridgeReply {
    let status = envelope.get("status").and_then(Value::as_str);
    if status == Some("error") {
        let mut error = Map::new();
        let message = envelope
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown bridge error");
        error.insert("error".to_string(), json!(message));
        for key in ["code", "suggestion"] {
            if let Some(value) = envelope.get(key).and_then(Value::as_str) {
                error.insert(key.to_string(), json!(value));
            }
        }
        return BridgeReply::Error(Value::Object(error).to_string());
    }
    match envelope.get("data") {
        Some(data) => BridgeReply::Data(data.to_string()),
        None => BridgeReply::Data(envelope.to_string()),
    }
}
