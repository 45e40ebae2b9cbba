//! Purpose: `/decompile` plus the bounded decompiler call shared with diff and export.
//! Exports: `decompile`, `run_decompiler`, `decompile_or_fail`.
//! Role: Every decompiler invocation in the Bridge goes through `run_decompiler`.
//! Invariants: A call never blocks its worker longer than `config.decompile_timeout`;
//! an abandoned decompiler thread finishes on its own and its result is dropped.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;

use serde_json::json;

use crate::bridge::envelope::{ApiError, ErrorCode, Params, internal, map_engine_error};
use crate::bridge::handlers::{Reply, require_class};
use crate::bridge::server::BridgeState;
use crate::core::error::{Error, ErrorKind};
use crate::engine::model::{ClassInfo, WorkspaceHandle};

pub fn decompile(state: &BridgeState, workspace: &WorkspaceHandle, params: &Params) -> Reply {
    let [class_name] = params.required(["className"])?;
    let class = require_class(workspace, class_name)?;
    let name = class.name.clone();
    match run_decompiler(state, workspace, class)? {
        Ok(source) => Ok(json!({
            "className": name,
            "source": source,
            "decompiler": state.services.decompiler.name(),
        })),
        Err(err) => Ok(json!({
            "className": name,
            "source": "// Decompilation failed - no output",
            "error": err.describe(),
        })),
    }
}

/// Decompiles on a dedicated thread. The outer error is a timeout or a lost
/// thread; the inner result is the decompiler's own outcome.
pub fn run_decompiler(
    state: &BridgeState,
    workspace: &WorkspaceHandle,
    class: ClassInfo,
) -> Result<Result<String, Error>, ApiError> {
    let timeout = state.config.decompile_timeout;
    let decompiler = state.services.decompiler.clone();
    let workspace = workspace.clone();
    let name = class.name.clone();
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("decompile".to_string())
        .spawn(move || {
            let _ = tx.send(decompiler.decompile(&workspace, &class));
        })
        .map_err(|err| internal(format!("Failed to start decompiler thread: {err}")))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => Ok(result),
        Err(RecvTimeoutError::Timeout) => {
            tracing::warn!(class = %name, ?timeout, "decompilation timed out");
            let err = Error::new(ErrorKind::Timeout);
            Err(map_engine_error(&format!("Decompiling {name}"), &err))
        }
        Err(RecvTimeoutError::Disconnected) => {
            Err(internal(format!("Decompiler stopped without a result for {name}")))
        }
    }
}

/// Like `run_decompiler`, but a decompiler failure is a `DECOMPILE_FAILED` error.
pub fn decompile_or_fail(
    state: &BridgeState,
    workspace: &WorkspaceHandle,
    class: ClassInfo,
) -> Result<String, ApiError> {
    let name = class.name.clone();
    run_decompiler(state, workspace, class)?.map_err(|err| {
        ApiError::new(
            ErrorCode::DecompileFailed,
            format!("Failed to decompile {name}: {}", err.describe()),
        )
        .with_suggestion("Try 'disassemble' to inspect the class bytecode instead.")
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::StatusCode;
    use serde_json::json;

    use crate::bridge::handlers::testing::{self, data};
    use crate::bridge::server::{BridgeConfig, BridgeState};
    use crate::core::error::{Error, ErrorKind};
    use crate::engine::model::{ClassInfo, Workspace};
    use crate::engine::{Decompiler, Services};

    struct Slow;

    impl Decompiler for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        fn decompile(&self, _workspace: &Workspace, _class: &ClassInfo) -> Result<String, Error> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(String::new())
        }
    }

    struct Broken;

    impl Decompiler for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn decompile(&self, _workspace: &Workspace, _class: &ClassInfo) -> Result<String, Error> {
            Err(Error::new(ErrorKind::Internal).with_message("unsupported construct"))
        }
    }

    #[test]
    fn decompiles_with_class_source() {
        let state = testing::state();
        let mut class = ClassInfo::new("com/x/A");
        class.source = Some("class A {}\n".to_string());
        testing::open(&state, "/t/a.jar", vec![class]);
        let reply = state.request("/decompile", &json!({"className": "com.x.A"}));
        let body = data(&reply);
        assert_eq!(body["className"], "com/x/A");
        assert_eq!(body["source"], "class A {}\n");
        assert_eq!(body["decompiler"], "skeleton");
    }

    #[test]
    fn missing_class_is_not_found() {
        let state = testing::state();
        testing::open(&state, "/t/a.jar", vec![ClassInfo::new("A")]);
        let (status, body) = state.request("/decompile", &json!({"className": "Missing"}));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");
        assert_eq!(body["code"], "CLASS_NOT_FOUND");
    }

    #[test]
    fn slow_decompiler_times_out() {
        let config = BridgeConfig {
            decompile_timeout: Duration::from_millis(50),
            ..BridgeConfig::default()
        };
        let state = BridgeState::new(Services::bundled().with_decompiler(Arc::new(Slow)), config);
        testing::open(&state, "/t/a.jar", vec![ClassInfo::new("A")]);
        let (status, body) = state.request("/decompile", &json!({"className": "A"}));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], "DECOMPILE_TIMEOUT");
        assert_eq!(body["message"], "Decompiling A timed out");
    }

    #[test]
    fn decompiler_failure_is_reported_in_data() {
        let state = testing::state_with(Services::bundled().with_decompiler(Arc::new(Broken)));
        testing::open(&state, "/t/a.jar", vec![ClassInfo::new("A")]);
        let reply = state.request("/decompile", &json!({"className": "A"}));
        let body = data(&reply);
        assert_eq!(body["source"], "// Decompilation failed - no output");
        assert_eq!(body["error"], "unsupported construct");
    }
}
