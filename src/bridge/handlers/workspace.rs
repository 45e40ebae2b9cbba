//! Purpose: Workspace lifecycle and listing endpoints.
//! Exports: `open`, `close`, `info`, `classes`, `class_info`, `switch`, `list_workspaces`.
//! Role: `/workspace/*` handlers.
//! Invariants: `classes` slices `[offset, min(offset + limit, n))` of the filtered list in
//! bundle order; `hasMore` is true iff the slice stops short of `n`.

use std::path::Path;

use serde_json::{Value, json};
use tracing::info;

use crate::bridge::envelope::{Params, map_engine_error, workspace_not_found};
use crate::bridge::handlers::{Reply, non_negative, require_class};
use crate::bridge::server::BridgeState;
use crate::engine::model::{WorkspaceHandle, normalize_class_name};

pub fn open(state: &BridgeState, params: &Params) -> Reply {
    let [path] = params.required(["path"])?;
    let workspace = state
        .services
        .importer
        .import(Path::new(path))
        .map_err(|err| map_engine_error("Open workspace", &err))?;
    let handle = workspace.into_handle();
    let class_count = handle.class_count();
    let workspace_id = state.sessions.open(path, handle);
    info!(workspace_id = %workspace_id, path, class_count, "opened workspace");
    Ok(json!({
        "workspaceId": workspace_id,
        "path": path,
        "classCount": class_count,
    }))
}

pub fn close(state: &BridgeState, params: &Params) -> Reply {
    if let Some(workspace_id) = params.non_blank("workspaceId")? {
        state
            .sessions
            .close(workspace_id)
            .ok_or_else(|| workspace_not_found(workspace_id))?;
        info!(workspace_id, "closed workspace");
        return Ok(json!(format!("Workspace closed: {workspace_id}")));
    }
    match state.sessions.close_current() {
        Some(_) => {
            info!("closed current workspace");
            Ok(json!("Workspace closed"))
        }
        None => Ok(json!("No workspace was open")),
    }
}

pub fn info(_state: &BridgeState, workspace: &WorkspaceHandle, _params: &Params) -> Reply {
    Ok(json!({
        "classCount": workspace.class_count(),
        "fileCount": workspace.file_count(),
        "primaryResource": workspace.primary_kind(),
        "supportingResources": workspace.supporting_count(),
    }))
}

pub fn classes(_state: &BridgeState, workspace: &WorkspaceHandle, params: &Params) -> Reply {
    let filter = params.non_blank("filter")?.map(normalize_class_name);
    let offset = non_negative(params, "offset", 0)?;
    let limit = non_negative(params, "limit", 500)?;

    let names = workspace.class_names();
    let total = names.len();
    let matched: Vec<String> = names
        .into_iter()
        .filter(|name| filter.as_deref().is_none_or(|wanted| name.contains(wanted)))
        .collect();
    let n = matched.len();
    let from = offset.min(n);
    let to = from.saturating_add(limit).min(n);

    Ok(json!({
        "totalClasses": total,
        "totalMatched": n,
        "offset": from,
        "returnedCount": to - from,
        "hasMore": to < n,
        "classes": &matched[from..to],
    }))
}

pub fn class_info(_state: &BridgeState, workspace: &WorkspaceHandle, params: &Params) -> Reply {
    let [class_name] = params.required(["className"])?;
    let class = require_class(workspace, class_name)?;
    let fields: Vec<Value> = class
        .fields
        .iter()
        .map(|field| {
            json!({"name": field.name, "descriptor": field.descriptor, "accessFlags": field.access})
        })
        .collect();
    let methods: Vec<Value> = class
        .methods
        .iter()
        .map(|method| {
            json!({"name": method.name, "descriptor": method.descriptor, "accessFlags": method.access})
        })
        .collect();
    Ok(json!({
        "name": class.name,
        "superName": class.super_name,
        "accessFlags": class.access,
        "interfaces": class.interfaces,
        "fields": fields,
        "methods": methods,
        "version": class.version,
    }))
}

pub fn switch(state: &BridgeState, params: &Params) -> Reply {
    let [workspace_id] = params.required(["workspaceId"])?;
    let entry = state
        .sessions
        .switch(workspace_id)
        .ok_or_else(|| workspace_not_found(workspace_id))?;
    info!(workspace_id, "switched workspace");
    Ok(json!({
        "workspaceId": entry.id,
        "path": entry.path,
        "classCount": entry.handle.class_count(),
    }))
}

pub fn list_workspaces(state: &BridgeState, _params: &Params) -> Reply {
    let workspaces: Vec<Value> = state
        .sessions
        .list()
        .into_iter()
        .map(|listing| {
            json!({
                "workspaceId": listing.entry.id,
                "path": listing.entry.path,
                "classCount": listing.entry.handle.class_count(),
                "isCurrent": listing.is_current,
            })
        })
        .collect();
    Ok(json!({ "count": workspaces.len(), "workspaces": workspaces }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::bridge::handlers::testing::{self, data};
    use crate::engine::model::ClassInfo;

    fn classes(names: &[&str]) -> Vec<ClassInfo> {
        names.iter().map(|name| ClassInfo::new(*name)).collect()
    }

    #[test]
    fn pagination_walks_the_filtered_list() {
        let state = testing::state();
        testing::open(
            &state,
            "/t/a.jar",
            classes(&["com/x/A", "com/x/B", "org/y/C", "com/x/D", "com/x/E", "com/x/F"]),
        );

        let page = |offset: i64| {
            state.request(
                "/workspace/classes",
                &json!({"filter": "com.x", "offset": offset, "limit": 2}),
            )
        };
        let first = page(0);
        let first = data(&first);
        assert_eq!(first["totalClasses"], 6);
        assert_eq!(first["totalMatched"], 5);
        assert_eq!(first["returnedCount"], 2);
        assert_eq!(first["hasMore"], true);
        assert_eq!(first["classes"], json!(["com/x/A", "com/x/B"]));

        let second = page(2);
        assert_eq!(data(&second)["returnedCount"], 2);
        assert_eq!(data(&second)["hasMore"], true);

        let third = page(4);
        assert_eq!(data(&third)["returnedCount"], 1);
        assert_eq!(data(&third)["hasMore"], false);
        assert_eq!(data(&third)["classes"], json!(["com/x/F"]));

        let past = page(9);
        assert_eq!(data(&past)["returnedCount"], 0);
        assert_eq!(data(&past)["hasMore"], false);
        assert_eq!(data(&past)["offset"], 5);
    }

    #[test]
    fn negative_paging_is_rejected() {
        let state = testing::state();
        testing::open(&state, "/t/a.jar", classes(&["A"]));
        let (status, body) = state.request("/workspace/classes", &json!({"offset": -1}));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PARAMS");
    }

    #[test]
    fn open_reports_missing_files() {
        let state = testing::state();
        let (status, body) = state.request("/workspace/open", &json!({"path": "/nonexistent/x.jar"}));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], "FILE_NOT_FOUND");
    }

    #[test]
    fn listing_tracks_current_across_switch_and_close() {
        let state = testing::state();
        let first = testing::open(&state, "/t/a.jar", classes(&["A"]));
        let second = testing::open(&state, "/t/a.jar", classes(&["A", "B"]));
        assert_ne!(first, second);

        let listed = state.request("/workspace/list-workspaces", &json!({}));
        let listed = data(&listed);
        assert_eq!(listed["count"], 2);
        assert_eq!(listed["workspaces"][1]["workspaceId"], json!(second));
        assert_eq!(listed["workspaces"][1]["isCurrent"], true);
        assert_eq!(listed["workspaces"][0]["isCurrent"], false);

        let switched = state.request("/workspace/switch", &json!({"workspaceId": first}));
        assert_eq!(data(&switched)["classCount"], 1);
        let listed = state.request("/workspace/list-workspaces", &json!({}));
        assert_eq!(data(&listed)["workspaces"][0]["isCurrent"], true);

        let closed = state.request("/workspace/close", &json!({"workspaceId": first}));
        assert_eq!(data(&closed), &json!(format!("Workspace closed: {first}")));
        let (_, body) = state.request("/workspace/info", &json!({}));
        assert_eq!(body["code"], "NO_WORKSPACE");

        let (status, body) = state.request("/workspace/switch", &json!({"workspaceId": "nope-9"}));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Workspace not found: nope-9");
    }

    #[test]
    fn close_without_workspace_is_benign() {
        let state = testing::state();
        let reply = state.request("/workspace/close", &json!({}));
        assert_eq!(data(&reply), &json!("No workspace was open"));
    }

    #[test]
    fn class_info_accepts_dotted_names() {
        let state = testing::state();
        testing::open(&state, "/t/a.jar", classes(&["com/x/A"]));
        let reply = state.request("/workspace/class-info", &json!({"className": "com.x.A"}));
        let info = data(&reply);
        assert_eq!(info["name"], "com/x/A");
        assert_eq!(info["superName"], "java/lang/Object");
        assert_eq!(info["version"], 52);

        let (status, body) =
            state.request("/workspace/class-info", &json!({"className": "com.x.Missing"}));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Class not found: com/x/Missing");
    }
}
