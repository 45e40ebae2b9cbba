//! Purpose: `/patch` create and apply.
//! Exports: `patch`.
//! Role: Serialises workspace edits to patch JSON and replays patch JSON onto the
//! current workspace through `engine::patch`.

use axum::http::StatusCode;
use serde_json::{Map, Value, json};
use tracing::info;

use crate::bridge::envelope::{ApiError, ErrorCode, Params, missing_params};
use crate::bridge::handlers::Reply;
use crate::bridge::server::BridgeState;
use crate::core::error::Error;
use crate::engine::model::WorkspaceHandle;
use crate::engine::patch::{
    FeedbackLog, apply_patch, create_patch, deserialize_patch, serialize_patch,
};

pub fn patch(state: &BridgeState, workspace: &WorkspaceHandle, params: &Params) -> Reply {
    let [action] = params.required(["action"])?;
    match action.to_ascii_lowercase().as_str() {
        "create" => create(state, workspace),
        "apply" => apply(state, workspace, params),
        _ => Err(ApiError::new(
            ErrorCode::InvalidParams,
            format!("Unknown patch action: {action}"),
        )
        .with_suggestion("Use 'create' to create a patch or 'apply' to apply one.")),
    }
}

fn create(state: &BridgeState, workspace: &WorkspaceHandle) -> Reply {
    let assembler = state.services.assembler.as_ref();
    let (patch, patch_json) = create_patch(workspace, assembler)
        .and_then(|patch| serialize_patch(&patch).map(|text| (patch, text)))
        .map_err(|err| {
            patch_failed(
                format!("Failed to create patch: {}", err.describe()),
                "Ensure the workspace has modifications to patch.",
            )
        })?;
    info!(
        assembler_patches = patch.assembler_patches.len(),
        text_file_patches = patch.text_file_patches.len(),
        removals = patch.removals.len(),
        "created patch"
    );
    Ok(json!({
        "created": true,
        "assemblerPatches": patch.assembler_patches.len(),
        "textFilePatches": patch.text_file_patches.len(),
        "removals": patch.removals.len(),
        "patchJson": patch_json,
    }))
}

fn apply(state: &BridgeState, workspace: &WorkspaceHandle, params: &Params) -> Reply {
    let patch_json = params
        .non_blank("patchJson")?
        .ok_or_else(|| missing_params(&["patchJson"]))?;
    let patch = deserialize_patch(patch_json).map_err(|err: Error| {
        patch_failed(
            format!("Failed to apply patch: {}", err.describe()),
            "Check that the patch JSON is valid and matches the current workspace.",
        )
    })?;

    let mut feedback = FeedbackLog::default();
    let applied = apply_patch(
        workspace,
        state.services.assembler.as_ref(),
        &patch,
        &mut feedback,
    );
    info!(applied, errors = feedback.errors.len(), "applied patch");

    let mut out = Map::new();
    out.insert("applied".to_string(), json!(applied));
    if !feedback.errors.is_empty() {
        out.insert("errors".to_string(), json!(feedback.errors));
    }
    Ok(Value::Object(out))
}

fn patch_failed(message: String, suggestion: &str) -> ApiError {
    ApiError::new(ErrorCode::PatchFailed, message)
        .with_suggestion(suggestion)
        .with_status(StatusCode::INTERNAL_SERVER_ERROR)
}
