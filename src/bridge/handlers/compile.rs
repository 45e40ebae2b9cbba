//! Purpose: `/compile` of Java source into the current workspace.
//! Exports: `compile`.
//! Role: Bridges the optional engine `Compiler`; absent compiler is a domain error.
//! Invariants: A compiler failure is a successful reply carrying diagnostics; only
//! produced bytecode ever replaces workspace classes.

use axum::http::StatusCode;
use serde_json::json;
use tracing::info;

use crate::bridge::envelope::{ApiError, ErrorCode, Params, invalid_params};
use crate::bridge::handlers::Reply;
use crate::bridge::server::BridgeState;
use crate::engine::CompileRequest;
use crate::engine::model::{ClassInfo, WorkspaceHandle, normalize_class_name};

pub fn compile(state: &BridgeState, workspace: &WorkspaceHandle, params: &Params) -> Reply {
    let [class_name, source] = params.required(["className", "source"])?;
    let target_version = match params.int("targetVersion")? {
        Some(version) if version > 0 => Some(
            u32::try_from(version)
                .map_err(|_| invalid_params(format!("Invalid targetVersion: {version}")))?,
        ),
        _ => None,
    };
    let debug = params.bool_or("debug", true)?;

    let compiler = state.services.compiler.as_ref().ok_or_else(|| {
        ApiError::new(
            ErrorCode::CompilerUnavailable,
            "No Java compiler is available to the bridge",
        )
        .with_suggestion("Use 'assemble' to edit the class through its disassembly instead.")
    })?;

    let slash_name = normalize_class_name(class_name);
    let dot_name = slash_name.replace('/', ".");
    let request = CompileRequest {
        class_name: dot_name.clone(),
        source: source.to_string(),
        target_version,
        debug,
    };
    let result = compiler
        .compile(workspace, &request)
        .map_err(|err| compile_failed(format!("Compilation failed: {}", err.describe())))?;

    if !result.success {
        info!(
            class = %dot_name,
            diagnostics = result.diagnostics.len(),
            "compilation failed"
        );
        return Ok(json!({
            "compiled": false,
            "diagnostics": result.diagnostics,
        }));
    }

    let Some(bytes) = result.compilations.get(&dot_name) else {
        return Err(ApiError::new(
            ErrorCode::CompileFailed,
            format!("Compilation succeeded but no bytecode produced for: {dot_name}"),
        )
        .with_suggestion("This may indicate an inner class or naming issue.")
        .with_status(StatusCode::INTERNAL_SERVER_ERROR));
    };
    let size = bytes.len();

    // Companion classes (inner or anonymous) are applied alongside the requested one.
    let mut classes = Vec::with_capacity(result.compilations.len());
    for (name, bytes) in &result.compilations {
        let class = ClassInfo::from_bytecode(bytes).map_err(|err| {
            compile_failed(format!(
                "Compilation failed: unreadable output for {name}: {}",
                err.describe()
            ))
        })?;
        classes.push(class);
    }
    for class in classes {
        workspace.put_class(class);
    }

    info!(class = %slash_name, bytecode_size = size, "compiled and applied class");
    Ok(json!({
        "compiled": true,
        "applied": true,
        "className": slash_name,
        "bytecodeSize": size,
    }))
}

fn compile_failed(message: String) -> ApiError {
    ApiError::new(ErrorCode::CompileFailed, message)
        .with_suggestion("Check the Java source for errors and ensure the compiler is available.")
        .with_status(StatusCode::INTERNAL_SERVER_ERROR)
}
