//! Purpose: Wire envelope, error taxonomy and request-parameter extraction for the Bridge.
//! Exports: `ErrorCode`, `ApiError`, `Params`, `ok_envelope`, error constructors, `map_engine_error`.
//! Role: Every handler returns `Result<Value, ApiError>`; this module turns both arms into JSON.
//! Invariants: An envelope carries exactly one of `data` (ok) or `code` (error); `status` is always set.
//! Invariants: Error messages are never empty; suggestions are optional.
//! Invariants: Blank strings count as missing for required parameters.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NoWorkspace,
    ClassNotFound,
    MemberNotFound,
    InvalidParams,
    DecompileFailed,
    DecompileTimeout,
    FileNotFound,
    AssemblerFailed,
    CompileFailed,
    CompilerUnavailable,
    PatchFailed,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NoWorkspace => "NO_WORKSPACE",
            ErrorCode::ClassNotFound => "CLASS_NOT_FOUND",
            ErrorCode::MemberNotFound => "MEMBER_NOT_FOUND",
            ErrorCode::InvalidParams => "INVALID_PARAMS",
            ErrorCode::DecompileFailed => "DECOMPILE_FAILED",
            ErrorCode::DecompileTimeout => "DECOMPILE_TIMEOUT",
            ErrorCode::FileNotFound => "FILE_NOT_FOUND",
            ErrorCode::AssemblerFailed => "ASSEMBLER_FAILED",
            ErrorCode::CompileFailed => "COMPILE_FAILED",
            ErrorCode::CompilerUnavailable => "COMPILER_UNAVAILABLE",
            ErrorCode::PatchFailed => "PATCH_FAILED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Status used unless a handler overrides it. "No workspace" is a client
    /// state problem and stays 200.
    pub fn default_status(self) -> StatusCode {
        match self {
            ErrorCode::InvalidParams | ErrorCode::AssemblerFailed => StatusCode::BAD_REQUEST,
            ErrorCode::ClassNotFound | ErrorCode::MemberNotFound => StatusCode::NOT_FOUND,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::NoWorkspace
            | ErrorCode::DecompileFailed
            | ErrorCode::DecompileTimeout
            | ErrorCode::FileNotFound
            | ErrorCode::CompileFailed
            | ErrorCode::CompilerUnavailable
            | ErrorCode::PatchFailed => StatusCode::OK,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    suggestion: Option<String>,
    status: StatusCode,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = code.as_str().to_string();
        }
        Self {
            code,
            message,
            suggestion: None,
            status: code.default_status(),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn to_envelope(&self) -> Value {
        let mut envelope = Map::new();
        envelope.insert("status".to_string(), json!("error"));
        envelope.insert("code".to_string(), json!(self.code.as_str()));
        envelope.insert("message".to_string(), json!(self.message));
        if let Some(suggestion) = &self.suggestion {
            envelope.insert("suggestion".to_string(), json!(suggestion));
        }
        Value::Object(envelope)
    }
}

pub fn ok_envelope(data: Value) -> Value {
    json!({ "status": "ok", "data": data })
}

pub fn no_workspace() -> ApiError {
    ApiError::new(ErrorCode::NoWorkspace, "No workspace is currently open")
        .with_suggestion("Use the 'open_jar' tool to open a JAR/APK/class file first.")
}

pub fn class_not_found(class_name: &str) -> ApiError {
    ApiError::new(
        ErrorCode::ClassNotFound,
        format!("Class not found: {class_name}"),
    )
    .with_suggestion(
        "Use 'list_classes' to see available classes. Use '/' separators (e.g. 'com/example/Main').",
    )
}

pub fn member_not_found(class_name: &str, member: &str) -> ApiError {
    ApiError::new(
        ErrorCode::MemberNotFound,
        format!("Member '{member}' not found in class {class_name}"),
    )
    .with_suggestion("Use 'get_class_info' to see available fields and methods.")
}

pub fn missing_params(names: &[&str]) -> ApiError {
    ApiError::new(
        ErrorCode::InvalidParams,
        format!("Missing required parameter(s): {}", names.join(", ")),
    )
    .with_suggestion("Provide the required parameters and try again.")
}

pub fn invalid_params(message: impl Into<String>) -> ApiError {
    ApiError::new(ErrorCode::InvalidParams, message)
}

pub fn workspace_not_found(workspace_id: &str) -> ApiError {
    ApiError::new(
        ErrorCode::InvalidParams,
        format!("Workspace not found: {workspace_id}"),
    )
    .with_suggestion("Use 'list_workspaces' to see available workspace IDs.")
    .with_status(StatusCode::NOT_FOUND)
}

pub fn internal(message: impl Into<String>) -> ApiError {
    ApiError::new(ErrorCode::InternalError, message)
        .with_suggestion("This is an unexpected error. Check the bridge logs for details.")
}

/// Maps an engine failure raised while performing `operation`.
pub fn map_engine_error(operation: &str, err: &Error) -> ApiError {
    let detail = err.describe();
    let mapped = match err.kind() {
        ErrorKind::Timeout => ApiError::new(
            ErrorCode::DecompileTimeout,
            format!("{operation} timed out"),
        )
        .with_suggestion(
            "The operation exceeded the time limit. Try a simpler target or increase timeout.",
        ),
        ErrorKind::NotFound => ApiError::new(
            ErrorCode::FileNotFound,
            format!("{operation} failed: file not found: {detail}"),
        )
        .with_suggestion("Check that the file path is correct and the file exists."),
        ErrorKind::Usage | ErrorKind::AlreadyExists => ApiError::new(
            ErrorCode::InvalidParams,
            format!("{operation} failed: {detail}"),
        )
        .with_suggestion("Check the parameter values and try again."),
        ErrorKind::Internal | ErrorKind::Corrupt | ErrorKind::Io => {
            internal(format!("{operation} failed: {detail}"))
        }
    };
    match err.hint() {
        Some(hint) => mapped.with_suggestion(hint),
        None => mapped,
    }
}

/// JSON object body of a Bridge request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params {
    fields: Map<String, Value>,
}

impl Params {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Empty or whitespace-only bodies are treated as `{}`.
    pub fn from_body(body: &[u8]) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(fields)) => Ok(Self { fields }),
            _ => Err(invalid_params("Request body must be a JSON object")
                .with_suggestion("Send a JSON object such as {\"className\": \"com/example/Main\"}.")),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        !matches!(self.fields.get(key), None | Some(Value::Null))
    }

    /// Returns a string field; `None` when absent or null.
    pub fn string(&self, key: &str) -> Result<Option<&str>, ApiError> {
        match self.fields.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.as_str())),
            Some(_) => Err(invalid_params(format!("Parameter '{key}' must be a string"))),
        }
    }

    /// Returns a string field, treating blank values as absent.
    pub fn non_blank(&self, key: &str) -> Result<Option<&str>, ApiError> {
        Ok(self.string(key)?.filter(|value| !value.trim().is_empty()))
    }

    pub fn string_or<'a>(&'a self, key: &str, default: &'a str) -> Result<&'a str, ApiError> {
        Ok(self.non_blank(key)?.unwrap_or(default))
    }

    /// Fetches every named string field, reporting all missing names at once.
    pub fn required<const N: usize>(&self, keys: [&str; N]) -> Result<[&str; N], ApiError> {
        let mut values = [""; N];
        let mut missing = Vec::new();
        for (slot, key) in values.iter_mut().zip(keys) {
            match self.non_blank(key)? {
                Some(value) => *slot = value,
                None => missing.push(key),
            }
        }
        if missing.is_empty() {
            Ok(values)
        } else {
            Err(missing_params(&missing))
        }
    }

    pub fn int(&self, key: &str) -> Result<Option<i64>, ApiError> {
        match self.fields.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(number)) => number
                .as_i64()
                .or_else(|| number.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(Some)
                .ok_or_else(|| invalid_params(format!("Parameter '{key}' must be an integer"))),
            Some(Value::String(text)) => text
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| invalid_params(format!("Parameter '{key}' must be an integer"))),
            Some(_) => Err(invalid_params(format!(
                "Parameter '{key}' must be an integer"
            ))),
        }
    }

    pub fn int_or(&self, key: &str, default: i64) -> Result<i64, ApiError> {
        Ok(self.int(key)?.unwrap_or(default))
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ApiError> {
        match self.fields.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(value)) => Ok(*value),
            Some(Value::String(text)) if text.eq_ignore_ascii_case("true") => Ok(true),
            Some(Value::String(text)) if text.eq_ignore_ascii_case("false") => Ok(false),
            Some(_) => Err(invalid_params(format!("Parameter '{key}' must be a boolean"))),
        }
    }
}

impl From<Value> for Params {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            _ => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_envelope_shape(envelope: &Value) {
        let object = envelope.as_object().expect("object");
        assert!(object.contains_key("status"));
        assert_ne!(object.contains_key("data"), object.contains_key("code"));
    }

    #[test]
    fn ok_and_error_envelopes_are_exclusive() {
        let ok = ok_envelope(json!({"classCount": 3}));
        assert_envelope_shape(&ok);
        assert_eq!(ok["status"], json!("ok"));

        for error in [
            no_workspace(),
            class_not_found("com/x/A"),
            member_not_found("com/x/A", "run()V"),
            missing_params(&["className"]),
            internal("boom"),
        ] {
            let envelope = error.to_envelope();
            assert_envelope_shape(&envelope);
            assert_eq!(envelope["status"], json!("error"));
            assert!(!envelope["message"].as_str().expect("message").is_empty());
        }
    }

    #[test]
    fn error_codes_serialize_in_screaming_case() {
        assert_eq!(
            serde_json::to_value(ErrorCode::CompilerUnavailable).expect("encode"),
            json!("COMPILER_UNAVAILABLE")
        );
        assert_eq!(ErrorCode::NoWorkspace.as_str(), "NO_WORKSPACE");
    }

    #[test]
    fn default_statuses_follow_error_class() {
        assert_eq!(no_workspace().status(), StatusCode::OK);
        assert_eq!(missing_params(&["x"]).status(), StatusCode::BAD_REQUEST);
        assert_eq!(class_not_found("A").status(), StatusCode::NOT_FOUND);
        assert_eq!(internal("x").status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(workspace_not_found("a-1").status(), StatusCode::NOT_FOUND);
        assert_eq!(workspace_not_found("a-1").code(), ErrorCode::InvalidParams);
    }

    #[test]
    fn empty_message_is_replaced() {
        let error = ApiError::new(ErrorCode::PatchFailed, "  ");
        assert_eq!(error.message(), "PATCH_FAILED");
    }

    #[test]
    fn engine_errors_map_by_kind() {
        let timeout = map_engine_error("Decompile", &Error::new(ErrorKind::Timeout));
        assert_eq!(timeout.code(), ErrorCode::DecompileTimeout);
        assert_eq!(timeout.message(), "Decompile timed out");

        let missing = map_engine_error(
            "Open workspace",
            &Error::new(ErrorKind::NotFound)
                .with_message("archive not found")
                .with_path("/t/a.jar"),
        );
        assert_eq!(missing.code(), ErrorCode::FileNotFound);
        assert_eq!(
            missing.message(),
            "Open workspace failed: file not found: archive not found (/t/a.jar)"
        );
        assert_eq!(missing.status(), StatusCode::OK);

        let usage = map_engine_error(
            "Add field",
            &Error::new(ErrorKind::Usage).with_message("bad descriptor"),
        );
        assert_eq!(usage.code(), ErrorCode::InvalidParams);
        assert_eq!(usage.status(), StatusCode::BAD_REQUEST);

        let io = map_engine_error("Export JAR", &Error::new(ErrorKind::Io));
        assert_eq!(io.code(), ErrorCode::InternalError);
        assert_eq!(io.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn required_reports_every_missing_name() {
        let params = Params::from(json!({"className": "A", "methodName": "  "}));
        let err = params
            .required(["className", "methodName", "methodDesc"])
            .expect_err("missing");
        assert_eq!(
            err.message(),
            "Missing required parameter(s): methodName, methodDesc"
        );
        let [class_name] = params.required(["className"]).expect("present");
        assert_eq!(class_name, "A");
    }

    #[test]
    fn body_parsing_accepts_empty_and_rejects_non_objects() {
        assert_eq!(Params::from_body(b"").expect("empty"), Params::default());
        assert_eq!(Params::from_body(b" \n").expect("blank"), Params::default());
        let err = Params::from_body(b"[1,2]").expect_err("array");
        assert_eq!(err.code(), ErrorCode::InvalidParams);
        assert!(Params::from_body(b"{not json").is_err());
    }

    #[test]
    fn numeric_and_boolean_extraction() {
        let params = Params::from(json!({
            "offset": 5,
            "limit": "7",
            "depth": 2.0,
            "debug": false,
            "bad": [1]
        }));
        assert_eq!(params.int_or("offset", 0).expect("offset"), 5);
        assert_eq!(params.int_or("limit", 500).expect("limit"), 7);
        assert_eq!(params.int_or("depth", 3).expect("depth"), 2);
        assert_eq!(params.int_or("missing", 9).expect("default"), 9);
        assert!(!params.bool_or("debug", true).expect("debug"));
        assert!(params.bool_or("absent", true).expect("default"));
        assert!(params.int("bad").is_err());
    }
}
