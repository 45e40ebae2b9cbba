//! Purpose: Disassembly and text-assembly endpoints.
//! Exports: `disassemble`, `disassemble_method`, `assemble`.
//! Role: `/disassemble*` and `/assemble` over the engine `Assembler`.
//! Invariants: Disassembly is cut to `maxChars` characters with no ellipsis.
//! Invariants: `/assemble` replaces the class only after every stage succeeds.

use serde_json::json;
use tracing::info;

use crate::bridge::envelope::{ApiError, ErrorCode, Params, map_engine_error, member_not_found};
use crate::bridge::handlers::{Reply, non_negative, require_class, truncate_chars};
use crate::bridge::server::BridgeState;
use crate::engine::AssemblerError;
use crate::engine::model::WorkspaceHandle;

const DEFAULT_MAX_CHARS: i64 = 120_000;

pub fn disassemble(state: &BridgeState, workspace: &WorkspaceHandle, params: &Params) -> Reply {
    let [class_name] = params.required(["className"])?;
    let max_chars = non_negative(params, "maxChars", DEFAULT_MAX_CHARS)?;
    let class = require_class(workspace, class_name)?;
    let text = state
        .services
        .assembler
        .disassemble_class(&class)
        .map_err(|err| map_engine_error(&format!("Disassembling {}", class.name), &err))?;
    let (disassembly, truncated) = truncate_chars(text, max_chars);
    Ok(json!({
        "className": class.name,
        "disassembly": disassembly,
        "truncated": truncated,
    }))
}

pub fn disassemble_method(
    state: &BridgeState,
    workspace: &WorkspaceHandle,
    params: &Params,
) -> Reply {
    let [class_name, method_name, method_desc] =
        params.required(["className", "methodName", "methodDesc"])?;
    let max_chars = non_negative(params, "maxChars", DEFAULT_MAX_CHARS)?;
    let class = require_class(workspace, class_name)?;
    let method = class
        .method(method_name, method_desc)
        .ok_or_else(|| member_not_found(&class.name, &format!("{method_name}{method_desc}")))?;
    let text = state
        .services
        .assembler
        .disassemble_method(&class, method)
        .map_err(|err| {
            map_engine_error(&format!("Disassembling {}.{method_name}", class.name), &err)
        })?;
    let (disassembly, truncated) = truncate_chars(text, max_chars);
    Ok(json!({
        "className": class.name,
        "methodName": method_name,
        "methodDesc": method_desc,
        "disassembly": disassembly,
        "truncated": truncated,
    }))
}

pub fn assemble(state: &BridgeState, workspace: &WorkspaceHandle, params: &Params) -> Reply {
    let [class_name, source] = params.required(["className", "source"])?;
    let existing = require_class(workspace, class_name)?;
    let assembler = &state.services.assembler;

    let tokens = assembler
        .tokenize(source)
        .map_err(|errors| stage_failed("Tokenize", &errors))?;
    let parsed = assembler
        .parse(&tokens)
        .map_err(|errors| stage_failed("Parse", &errors))?;
    let assembled = assembler
        .assemble(parsed, &existing)
        .map_err(|errors| stage_failed("Assembly", &errors))?;

    if assembled.name != existing.name {
        return Err(ApiError::new(
            ErrorCode::AssemblerFailed,
            format!(
                "Class name mismatch: expected '{}' but assembled '{}'",
                existing.name, assembled.name
            ),
        )
        .with_suggestion("Keep the '.class' directive naming the class being replaced."));
    }

    let size = assembled
        .bytecode()
        .map_err(|err| map_engine_error(&format!("Assembling {}", existing.name), &err))?
        .len();
    let name = assembled.name.clone();
    workspace.put_class(assembled);
    info!(class = %name, bytecode_size = size, "assembled class");
    Ok(json!({
        "className": name,
        "assembled": true,
        "applied": true,
        "bytecodeSize": size,
    }))
}

fn stage_failed(stage: &str, errors: &[AssemblerError]) -> ApiError {
    let detail = errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    let suggestion = if stage == "Assembly" {
        "Check the JASM source for errors."
    } else {
        "Check the JASM syntax of the source."
    };
    ApiError::new(ErrorCode::AssemblerFailed, format!("{stage} failed: {detail}"))
        .with_suggestion(suggestion)
}
