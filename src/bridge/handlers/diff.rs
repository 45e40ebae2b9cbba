//! Purpose: `/diff` between two decompiled classes or a class and supplied text.
//! Exports: `diff`.
//! Role: Decompiles through the bounded decompiler path and renders with `crate::diff`.

use serde_json::json;
use tracing::info;

use crate::bridge::envelope::{ApiError, ErrorCode, Params, invalid_params};
use crate::bridge::handlers::decompile::decompile_or_fail;
use crate::bridge::handlers::{Reply, require_class};
use crate::bridge::server::BridgeState;
use crate::diff::{MAX_TABLE_CELLS, count_added, count_removed, table_cells, unified_diff};
use crate::engine::model::WorkspaceHandle;

pub fn diff(state: &BridgeState, workspace: &WorkspaceHandle, params: &Params) -> Reply {
    let [class_name1] = params.required(["className1"])?;
    let class_name2 = params.non_blank("className2")?;
    let provided = params.string("source")?;
    if class_name2.is_none() && provided.is_none() {
        return Err(ApiError::new(
            ErrorCode::InvalidParams,
            "Either 'className2' or 'source' must be provided",
        )
        .with_suggestion(
            "Provide className2 to compare two classes, or source to compare against custom text.",
        ));
    }

    let first = require_class(workspace, class_name1)?;
    let second = class_name2
        .map(|name| require_class(workspace, name))
        .transpose()?;

    let label1 = first.name.clone();
    let text1 = decompile_or_fail(state, workspace, first)?;
    let (label2, text2) = match (second, provided) {
        (Some(class), _) => {
            let label = class.name.clone();
            (label, decompile_or_fail(state, workspace, class)?)
        }
        (None, source) => (
            "provided-source".to_string(),
            source.unwrap_or_default().to_string(),
        ),
    };

    if table_cells(&text1, &text2) > MAX_TABLE_CELLS {
        return Err(invalid_params(format!(
            "Inputs too large to diff: {} and {} lines",
            text1.split('\n').count(),
            text2.split('\n').count()
        )));
    }
    let diff = unified_diff(&label1, &label2, &text1, &text2);
    let identical = text1 == text2;
    info!(left = %label1, right = %label2, identical, "diffed classes");
    Ok(json!({
        "linesAdded": count_added(&diff),
        "linesRemoved": count_removed(&diff),
        "identical": identical,
        "diff": diff,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::bridge::handlers::testing::{self, data};
    use crate::engine::model::ClassInfo;

    fn with_source(name: &str, source: &str) -> ClassInfo {
        let mut class = ClassInfo::new(name);
        class.source = Some(source.to_string());
        class
    }

    #[test]
    fn class_against_provided_source() {
        let state = testing::state();
        testing::open(&state, "/t/a.jar", vec![with_source("A", "X\nZ\n")]);
        let reply = state.request("/diff", &json!({"className1": "A", "source": "X\nY\n"}));
        let body = data(&reply);
        assert_eq!(body["linesAdded"], 1);
        assert_eq!(body["linesRemoved"], 1);
        assert_eq!(body["identical"], false);
        let text = body["diff"].as_str().unwrap_or_default();
        assert!(text.starts_with("--- A\n+++ provided-source\n"));
        assert!(text.contains("\n-Z\n"));
        assert!(text.contains("\n+Y\n"));
    }

    #[test]
    fn identical_classes_have_no_hunks() {
        let state = testing::state();
        testing::open(
            &state,
            "/t/a.jar",
            vec![with_source("p/A", "same\n"), with_source("p/B", "same\n")],
        );
        let reply = state.request("/diff", &json!({"className1": "p.A", "className2": "p.B"}));
        let body = data(&reply);
        assert_eq!(body["identical"], true);
        assert_eq!(body["diff"], "--- p/A\n+++ p/B\n");
    }

    #[test]
    fn needs_a_second_side() {
        let state = testing::state();
        testing::open(&state, "/t/a.jar", vec![with_source("A", "x")]);
        let (status, body) = state.request("/diff", &json!({"className1": "A"}));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Either 'className2' or 'source' must be provided");

        let (status, body) = state.request("/diff", &json!({"className1": "A", "className2": "B"}));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Class not found: B");
    }

    #[test]
    fn oversized_inputs_are_rejected() {
        let big = "line\n".repeat(5000);
        let state = testing::state();
        testing::open(&state, "/t/a.jar", vec![with_source("A", &big)]);
        let (status, body) = state.request("/diff", &json!({"className1": "A", "source": big}));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PARAMS");
        assert_eq!(body["message"], "Inputs too large to diff: 5001 and 5001 lines");
    }
}
