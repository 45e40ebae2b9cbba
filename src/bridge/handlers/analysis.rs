//! Purpose: Call-graph and inheritance endpoints.
//! Exports: `call_graph`, `inheritance`.
//! Role: `/analysis/*` handlers; graphs are rebuilt from the current workspace per request.

use serde_json::{Map, Value, json};

use crate::bridge::envelope::{Params, class_not_found, invalid_params};
use crate::bridge::handlers::Reply;
use crate::bridge::server::BridgeState;
use crate::engine::graph::{CallGraph, InheritanceGraph};
use crate::engine::model::{WorkspaceHandle, normalize_class_name};

pub fn call_graph(_state: &BridgeState, workspace: &WorkspaceHandle, params: &Params) -> Reply {
    let [class_name] = params.required(["className"])?;
    let class_name = normalize_class_name(class_name);
    let method_name = params.non_blank("methodName")?;
    let depth = params.int_or("depth", 3)?;

    let graph = CallGraph::build(workspace);
    let methods = graph
        .methods_of(&class_name)
        .ok_or_else(|| class_not_found(&class_name))?;
    let nodes: Vec<Value> = methods
        .iter()
        .filter(|method| method_name.is_none_or(|wanted| method.name == wanted))
        .map(|method| graph.describe(method, depth))
        .collect();
    Ok(json!({ "className": class_name, "methods": nodes }))
}

pub fn inheritance(_state: &BridgeState, workspace: &WorkspaceHandle, params: &Params) -> Reply {
    let [class_name] = params.required(["className"])?;
    let class_name = normalize_class_name(class_name);
    let direction = params.string_or("direction", "both")?.to_ascii_lowercase();
    let (want_parents, want_children) = match direction.as_str() {
        "both" => (true, true),
        "parents" => (true, false),
        "children" => (false, true),
        other => {
            return Err(invalid_params(format!(
                "Invalid direction: {other}. Use: both, parents, children"
            )));
        }
    };

    let graph = InheritanceGraph::build(workspace);
    if !graph.contains(&class_name) {
        return Err(class_not_found(&class_name));
    }
    let mut out = Map::new();
    out.insert("className".to_string(), json!(class_name));
    if want_parents {
        out.insert("parents".to_string(), json!(graph.all_parents(&class_name)));
    }
    if want_children {
        out.insert("children".to_string(), json!(graph.all_children(&class_name)));
    }
    out.insert(
        "directParents".to_string(),
        json!(graph.direct_parents(&class_name)),
    );
    out.insert(
        "directChildren".to_string(),
        json!(graph.direct_children(&class_name)),
    );
    Ok(Value::Object(out))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::bridge::handlers::testing::{self, data};
    use crate::engine::model::{ACC_PUBLIC, ClassInfo, Instruction, MethodMember};

    fn fixture() -> Vec<ClassInfo> {
        let mut base = ClassInfo::new("a/Base");
        base.methods.push(MethodMember::new("<init>", "()V", ACC_PUBLIC));
        let mut main = ClassInfo::new("a/Main");
        main.super_name = Some("a/Base".to_string());
        let mut run = MethodMember::new("run", "()V", ACC_PUBLIC);
        run.instructions.push(Instruction::Method {
            opcode: "INVOKESPECIAL".to_string(),
            owner: "a/Base".to_string(),
            name: "<init>".to_string(),
            desc: "()V".to_string(),
        });
        main.methods.push(run);
        main.methods.push(MethodMember::new("idle", "()V", ACC_PUBLIC));
        vec![base, main]
    }

    #[test]
    fn call_graph_filters_by_method_name() {
        let state = testing::state();
        testing::open(&state, "/t/a.jar", fixture());
        let reply = state.request(
            "/analysis/call-graph",
            &json!({"className": "a.Main", "methodName": "run"}),
        );
        let body = data(&reply);
        assert_eq!(body["className"], "a/Main");
        assert_eq!(body["methods"].as_array().map(Vec::len), Some(1));
        let callee = &body["methods"][0]["calls"][0];
        assert_eq!(callee["owner"], "a/Base");
        assert_eq!(callee["callers"][0]["name"], "run");

        let reply = state.request("/analysis/call-graph", &json!({"className": "a/Main", "depth": 0}));
        assert_eq!(data(&reply)["methods"][1]["truncated"], true);

        let reply = state.request(
            "/analysis/call-graph",
            &json!({"className": "a/Main", "methodName": "run", "depth": 1_000_000}),
        );
        assert_eq!(reply.0, StatusCode::OK);
        assert_eq!(data(&reply)["methods"][0]["name"], "run");
    }

    #[test]
    fn inheritance_directions() {
        let state = testing::state();
        testing::open(&state, "/t/a.jar", fixture());
        let reply = state.request(
            "/analysis/inheritance",
            &json!({"className": "a/Main", "direction": "PARENTS"}),
        );
        let body = data(&reply);
        assert_eq!(body["parents"], json!(["a/Base", "java/lang/Object"]));
        assert!(body.get("children").is_none());
        assert_eq!(body["directParents"], json!(["a/Base"]));
        assert_eq!(body["directChildren"], json!([]));

        let reply = state.request("/analysis/inheritance", &json!({"className": "a/Base"}));
        assert_eq!(data(&reply)["children"], json!(["a/Main"]));

        let (status, body) =
            state.request("/analysis/inheritance", &json!({"className": "a/Nope"}));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "CLASS_NOT_FOUND");
    }
}
