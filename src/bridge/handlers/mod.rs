//! Purpose: Endpoint table and helpers shared by the Bridge handlers.
//! Exports: `Endpoint`, `Handler`, `Reply`, `ENDPOINTS`, `find_endpoint`.
//! Role: The router mounts `ENDPOINTS`; each handler validates its parameters, calls
//! the engine and maps the outcome to `Reply`.
//! Invariants: `Handler::Workspace` handlers only run when a current workspace is set.
//! Invariants: Class names are normalised to slash form before every lookup.
//! Invariants: Only `/health` and `/workspace/list-workspaces` accept GET.

use serde_json::Value;

use crate::bridge::envelope::{ApiError, Params, class_not_found, invalid_params};
use crate::bridge::server::BridgeState;
use crate::engine::model::{ClassInfo, WorkspaceHandle, normalize_class_name};

pub mod analysis;
pub mod assembler;
pub mod bytecode;
pub mod compile;
pub mod decompile;
pub mod diff;
pub mod export;
pub mod mapping;
pub mod patch;
pub mod search;
pub mod workspace;

pub type Reply = Result<Value, ApiError>;

#[derive(Clone, Copy)]
pub enum Handler {
    /// Liveness probe; answered with a bare `{"status":"ok"}`.
    Health,
    Session(fn(&BridgeState, &Params) -> Reply),
    Workspace(fn(&BridgeState, &WorkspaceHandle, &Params) -> Reply),
}

pub struct Endpoint {
    pub path: &'static str,
    pub allow_get: bool,
    pub handler: Handler,
}

const fn post(path: &'static str, handler: Handler) -> Endpoint {
    Endpoint {
        path,
        allow_get: false,
        handler,
    }
}

const fn get_or_post(path: &'static str, handler: Handler) -> Endpoint {
    Endpoint {
        path,
        allow_get: true,
        handler,
    }
}

pub static ENDPOINTS: &[Endpoint] = &[
    get_or_post("/health", Handler::Health),
    post("/workspace/open", Handler::Session(workspace::open)),
    post("/workspace/close", Handler::Session(workspace::close)),
    post("/workspace/info", Handler::Workspace(workspace::info)),
    post("/workspace/classes", Handler::Workspace(workspace::classes)),
    post("/workspace/class-info", Handler::Workspace(workspace::class_info)),
    post("/workspace/switch", Handler::Session(workspace::switch)),
    get_or_post(
        "/workspace/list-workspaces",
        Handler::Session(workspace::list_workspaces),
    ),
    post("/decompile", Handler::Workspace(decompile::decompile)),
    post("/search", Handler::Workspace(search::search)),
    post("/analysis/call-graph", Handler::Workspace(analysis::call_graph)),
    post("/analysis/inheritance", Handler::Workspace(analysis::inheritance)),
    post("/mapping/rename", Handler::Workspace(mapping::rename)),
    post("/mapping/export", Handler::Workspace(mapping::export)),
    post("/disassemble", Handler::Workspace(assembler::disassemble)),
    post(
        "/disassemble/method",
        Handler::Workspace(assembler::disassemble_method),
    ),
    post("/assemble", Handler::Workspace(assembler::assemble)),
    post("/compile", Handler::Workspace(compile::compile)),
    post("/diff", Handler::Workspace(diff::diff)),
    post("/export/jar", Handler::Workspace(export::jar)),
    post("/export/source", Handler::Workspace(export::source)),
    post("/bytecode/edit-method", Handler::Workspace(bytecode::edit_method)),
    post("/bytecode/edit-field", Handler::Workspace(bytecode::edit_field)),
    post("/bytecode/remove-member", Handler::Workspace(bytecode::remove_member)),
    post("/bytecode/add-field", Handler::Workspace(bytecode::add_field)),
    post("/bytecode/add-method", Handler::Workspace(bytecode::add_method)),
    post("/bytecode/instructions", Handler::Workspace(bytecode::instructions)),
    post("/patch", Handler::Workspace(patch::patch)),
];

pub fn find_endpoint(path: &str) -> Option<&'static Endpoint> {
    ENDPOINTS.iter().find(|endpoint| endpoint.path == path)
}

/// Looks up a class of the primary resource by either name form.
pub(crate) fn require_class(workspace: &WorkspaceHandle, class_name: &str) -> Result<ClassInfo, ApiError> {
    let name = normalize_class_name(class_name);
    workspace
        .find_class(&name)
        .ok_or_else(|| class_not_found(&name))
}

/// Keeps the first `max_chars` characters of `text`.
pub(crate) fn truncate_chars(text: String, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => (text[..cut].to_string(), true),
        None => (text, false),
    }
}

pub(crate) fn non_negative(params: &Params, key: &str, default: i64) -> Result<usize, ApiError> {
    let value = params.int_or(key, default)?;
    usize::try_from(value)
        .map_err(|_| invalid_params(format!("Parameter '{key}' must not be negative")))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_paths_are_unique() {
        for (index, endpoint) in ENDPOINTS.iter().enumerate() {
            assert!(
                ENDPOINTS[index + 1..].iter().all(|other| other.path != endpoint.path),
                "duplicate endpoint {}",
                endpoint.path
            );
        }
        assert_eq!(ENDPOINTS.len(), 28);
        let gettable: Vec<&str> = ENDPOINTS
            .iter()
            .filter(|endpoint| endpoint.allow_get)
            .map(|endpoint| endpoint.path)
            .collect();
        assert_eq!(gettable, vec!["/health", "/workspace/list-workspaces"]);
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_chars("héllo".to_string(), 2), ("hé".to_string(), true));
        assert_eq!(truncate_chars("abc".to_string(), 3), ("abc".to_string(), false));
        assert_eq!(truncate_chars("abc".to_string(), 0), (String::new(), true));
        assert_eq!(truncate_chars(String::new(), 0), (String::new(), false));
    }
}
