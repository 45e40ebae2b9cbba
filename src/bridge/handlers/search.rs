//! Purpose: `/search` over string constants, references and declarations.
//! Exports: `search`.
//! Role: Maps the wire `type` onto an engine `SearchQuery`.

use serde_json::{Value, json};

use crate::bridge::envelope::Params;
use crate::bridge::handlers::{Reply, non_negative};
use crate::bridge::server::BridgeState;
use crate::engine::bytecode::MemberKind;
use crate::engine::model::{WorkspaceHandle, normalize_class_name};
use crate::engine::search::{self as engine, SearchQuery};

pub fn search(_state: &BridgeState, workspace: &WorkspaceHandle, params: &Params) -> Reply {
    let [query] = params.required(["query"])?;
    let kind = params.string_or("type", "string")?;
    let max_results = non_negative(params, "maxResults", 100)?;

    // Class names are compared in internal form; member names and strings verbatim.
    let class_query = normalize_class_name(query);
    let search_query = match kind.to_ascii_lowercase().as_str() {
        "class" => SearchQuery::ClassReference(&class_query),
        "method" => SearchQuery::MemberReference(query, Some(MemberKind::Method)),
        "field" => SearchQuery::MemberReference(query, Some(MemberKind::Field)),
        "declaration" => SearchQuery::Declaration {
            class: &class_query,
            member: query,
        },
        _ => SearchQuery::Strings(query),
    };

    let results: Vec<Value> = engine::search(workspace, search_query, max_results)
        .iter()
        .map(|hit| hit.to_json())
        .collect();
    Ok(json!({
        "query": query,
        "type": kind,
        "count": results.len(),
        "results": results,
    }))
}
