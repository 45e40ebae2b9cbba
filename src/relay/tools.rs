//! Purpose: MCP tool catalog and tool-call to Bridge request marshalling.
//! Exports: `tool_definitions`, `route`, `BridgeCall`, `BridgeMethod`, `RouteError`.
//! Role: Pure mapping layer; no I/O happens here.
//! Invariants: Optional arguments are forwarded only when present; documented
//! defaults are filled in for `list_classes`, `search_code`, `get_call_graph`
//! and `get_inheritance`.

use serde_json::{Map, Value, json};

use crate::bridge::envelope::ErrorCode;
use crate::mcp::McpTool;

const EDIT_OPERATIONS: &str = "edit_method, edit_field, remove_member, add_field, add_method";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeMethod {
    Get,
    Post,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BridgeCall {
    pub method: BridgeMethod,
    pub path: &'static str,
    pub body: Value,
}

impl BridgeCall {
    fn post(path: &'static str, body: Map<String, Value>) -> Self {
        Self {
            method: BridgeMethod::Post,
            path,
            body: Value::Object(body),
        }
    }

    fn get(path: &'static str) -> Self {
        Self {
            method: BridgeMethod::Get,
            path,
            body: Value::Null,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteError {
    UnknownTool(String),
    UnknownOperation(String),
}

impl RouteError {
    /// Tool-result text for a call that never reached the Bridge.
    pub fn to_text(&self) -> String {
        match self {
            RouteError::UnknownTool(name) => {
                json!({ "error": format!("Unknown tool: {name}") }).to_string()
            }
            RouteError::UnknownOperation(operation) => json!({
                "error": format!("Unknown operation: {operation}. Use: {EDIT_OPERATIONS}"),
                "code": ErrorCode::InvalidParams.as_str(),
            })
            .to_string(),
        }
    }
}

pub fn route(name: &str, args: &Map<String, Value>) -> Result<BridgeCall, RouteError> {
    let mut body = Map::new();
    let call = match name {
        "open_jar" => {
            forward(args, &mut body, &["path"]);
            BridgeCall::post("/workspace/open", body)
        }
        "close_workspace" => {
            forward(args, &mut body, &["workspaceId"]);
            BridgeCall::post("/workspace/close", body)
        }
        "list_classes" => {
            forward(args, &mut body, &["filter"]);
            forward_or(args, &mut body, "offset", json!(0));
            forward_or(args, &mut body, "limit", json!(500));
            BridgeCall::post("/workspace/classes", body)
        }
        "get_class_info" => {
            forward(args, &mut body, &["className"]);
            BridgeCall::post("/workspace/class-info", body)
        }
        "decompile_class" => {
            forward(args, &mut body, &["className"]);
            BridgeCall::post("/decompile", body)
        }
        "search_code" => {
            forward(args, &mut body, &["query"]);
            forward_or(args, &mut body, "type", json!("string"));
            forward_or(args, &mut body, "maxResults", json!(100));
            BridgeCall::post("/search", body)
        }
        "get_call_graph" => {
            forward(args, &mut body, &["className", "methodName"]);
            forward_or(args, &mut body, "depth", json!(3));
            BridgeCall::post("/analysis/call-graph", body)
        }
        "get_inheritance" => {
            forward(args, &mut body, &["className"]);
            forward_or(args, &mut body, "direction", json!("both"));
            BridgeCall::post("/analysis/inheritance", body)
        }
        "rename_symbol" => {
            forward(
                args,
                &mut body,
                &["type", "oldName", "newName", "className", "descriptor"],
            );
            BridgeCall::post("/mapping/rename", body)
        }
        "export_mappings" => {
            forward(args, &mut body, &["format", "outputPath"]);
            BridgeCall::post("/mapping/export", body)
        }
        "switch_workspace" => {
            forward(args, &mut body, &["workspaceId"]);
            BridgeCall::post("/workspace/switch", body)
        }
        "list_workspaces" => BridgeCall::get("/workspace/list-workspaces"),
        "edit_bytecode" => return edit_bytecode(args),
        "diff_classes" => {
            forward(args, &mut body, &["className1", "className2", "source"]);
            BridgeCall::post("/diff", body)
        }
        "export_jar" => {
            forward(args, &mut body, &["outputPath"]);
            BridgeCall::post("/export/jar", body)
        }
        "export_source" => {
            forward(args, &mut body, &["outputDir", "className"]);
            BridgeCall::post("/export/source", body)
        }
        _ => return Err(RouteError::UnknownTool(name.to_string())),
    };
    Ok(call)
}

fn edit_bytecode(args: &Map<String, Value>) -> Result<BridgeCall, RouteError> {
    let operation = args.get("operation").and_then(Value::as_str).unwrap_or("");
    let (path, keys): (&'static str, &[&str]) = match operation {
        "edit_method" => (
            "/bytecode/edit-method",
            &["methodName", "methodDesc", "accessFlags"],
        ),
        "edit_field" => (
            "/bytecode/edit-field",
            &["fieldName", "descriptor", "accessFlags"],
        ),
        "remove_member" => (
            "/bytecode/remove-member",
            &["memberName", "memberType", "descriptor"],
        ),
        "add_field" => (
            "/bytecode/add-field",
            &["fieldName", "descriptor", "accessFlags"],
        ),
        "add_method" => (
            "/bytecode/add-method",
            &["methodName", "methodDesc", "accessFlags"],
        ),
        other => return Err(RouteError::UnknownOperation(other.to_string())),
    };
    let mut body = Map::new();
    forward(args, &mut body, &["className"]);
    forward(args, &mut body, keys);
    Ok(BridgeCall::post(path, body))
}

fn forward(args: &Map<String, Value>, body: &mut Map<String, Value>, keys: &[&str]) {
    for key in keys {
        match args.get(*key) {
            None | Some(Value::Null) => {}
            Some(value) => {
                body.insert((*key).to_string(), value.clone());
            }
        }
    }
}

fn forward_or(args: &Map<String, Value>, body: &mut Map<String, Value>, key: &str, default: Value) {
    let value = match args.get(key) {
        None | Some(Value::Null) => default,
        Some(value) => value.clone(),
    };
    body.insert(key.to_string(), value);
}

fn string(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn integer(description: &str) -> Value {
    json!({ "type": "integer", "description": description })
}

fn one_of(values: &[&str], description: &str) -> Value {
    json!({ "type": "string", "enum": values, "description": description })
}

fn tool(name: &str, description: &str, properties: Vec<(&str, Value)>, required: &[&str]) -> McpTool {
    let properties: Map<String, Value> = properties
        .into_iter()
        .map(|(key, schema)| (key.to_string(), schema))
        .collect();
    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), json!(required));
    }
    McpTool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: Value::Object(schema),
    }
}

/// The static catalog advertised by `tools/list`.
pub fn tool_definitions() -> Vec<McpTool> {
    let qualified = "Fully qualified class name (e.g. 'com/example/Main' or 'com.example.Main')";
    let slashed = "Fully qualified class name (e.g. 'com/example/Main')";
    vec![
        tool(
            "open_jar",
            "Open a JAR, APK, or class file in Recaf for analysis. Returns a workspaceId for multi-workspace support.",
            vec![("path", string("Absolute path to the JAR/APK/class file to open"))],
            &["path"],
        ),
        tool(
            "close_workspace",
            "Close the currently open workspace in Recaf, or close a specific workspace by ID",
            vec![(
                "workspaceId",
                string("Optional workspace ID to close. If omitted, closes the current workspace."),
            )],
            &[],
        ),
        tool(
            "list_classes",
            "List all classes in the current workspace, optionally filtered by name. Supports offset/limit pagination.",
            vec![
                (
                    "filter",
                    string("Optional filter string to match class names (e.g. 'com/example' or 'Main')"),
                ),
                ("offset", integer("Starting offset for pagination (default: 0)")),
                ("limit", integer("Maximum number of classes to return (default: 500)")),
            ],
            &[],
        ),
        tool(
            "get_class_info",
            "Get detailed class information including fields, methods, interfaces, and annotations",
            vec![("className", string(qualified))],
            &["className"],
        ),
        tool(
            "decompile_class",
            "Decompile a Java class to source code",
            vec![(
                "className",
                string("Fully qualified class name to decompile (e.g. 'com/example/Main' or 'com.example.Main')"),
            )],
            &["className"],
        ),
        tool(
            "search_code",
            "Search for strings, class/method/field references, or declarations in the workspace",
            vec![
                ("query", string("Search query string")),
                (
                    "type",
                    one_of(
                        &["string", "class", "method", "field", "declaration"],
                        "Type of search: 'string', 'class', 'method', 'field', 'declaration'",
                    ),
                ),
                ("maxResults", integer("Maximum number of results to return (default: 100)")),
            ],
            &["query"],
        ),
        tool(
            "get_call_graph",
            "Get the call graph showing which methods call which, with callers and callees",
            vec![
                ("className", string(slashed)),
                ("methodName", string("Optional method name to focus on")),
                (
                    "depth",
                    integer("Maximum depth of call graph traversal (default: 3, max: 32)"),
                ),
            ],
            &["className"],
        ),
        tool(
            "get_inheritance",
            "Get the inheritance hierarchy (parents and/or children) of a class",
            vec![
                ("className", string(slashed)),
                (
                    "direction",
                    one_of(
                        &["both", "parents", "children"],
                        "Direction: 'both', 'parents', or 'children' (default: 'both')",
                    ),
                ),
            ],
            &["className"],
        ),
        tool(
            "rename_symbol",
            "Rename a class, field, or method. Updates all references across the workspace",
            vec![
                ("type", one_of(&["class", "field", "method"], "Type of symbol to rename")),
                ("oldName", string("Current name of the symbol")),
                ("newName", string("New name for the symbol")),
                (
                    "className",
                    string("Owning class name (required for field/method renames)"),
                ),
                (
                    "descriptor",
                    string("Optional descriptor for field/method disambiguation"),
                ),
            ],
            &["type", "oldName", "newName"],
        ),
        tool(
            "export_mappings",
            "Export accumulated rename mappings to a file in the specified format",
            vec![
                (
                    "format",
                    string("Mapping format (e.g. 'TinyV1', 'SRG', 'Proguard'). Omit to list available formats"),
                ),
                ("outputPath", string("Absolute path to write the mapping file to")),
            ],
            &[],
        ),
        tool(
            "switch_workspace",
            "Switch to a previously opened workspace by its ID",
            vec![("workspaceId", string("The workspace ID returned by open_jar"))],
            &["workspaceId"],
        ),
        tool(
            "list_workspaces",
            "List all currently registered workspaces with their IDs, paths, and class counts",
            Vec::new(),
            &[],
        ),
        tool(
            "edit_bytecode",
            "Edit bytecode: add/remove/modify methods and fields in a class",
            vec![
                ("className", string(slashed)),
                (
                    "operation",
                    one_of(
                        &["edit_method", "edit_field", "remove_member", "add_field", "add_method"],
                        "Operation: 'edit_method', 'edit_field', 'remove_member', 'add_field', 'add_method'",
                    ),
                ),
                ("methodName", string("Method name (for edit_method, add_method)")),
                (
                    "methodDesc",
                    string("Method descriptor e.g. '(I)V' (for edit_method, add_method)"),
                ),
                ("fieldName", string("Field name (for edit_field, add_field)")),
                (
                    "descriptor",
                    string("Field descriptor e.g. 'I' or 'Ljava/lang/String;' (for edit_field, add_field, remove_member)"),
                ),
                (
                    "accessFlags",
                    integer("Access flags as integer (e.g. 1=public, 2=private)"),
                ),
                ("memberName", string("Member name to remove (for remove_member)")),
                (
                    "memberType",
                    one_of(
                        &["method", "field"],
                        "Member type to remove: 'method' or 'field' (for remove_member)",
                    ),
                ),
            ],
            &["className", "operation"],
        ),
        tool(
            "diff_classes",
            "Compare two classes or a class against provided source code, producing a unified diff",
            vec![
                ("className1", string("First class to compare (will be decompiled)")),
                (
                    "className2",
                    string("Second class to compare (will be decompiled). Provide this OR 'source'."),
                ),
                (
                    "source",
                    string("Source code to compare against className1. Provide this OR 'className2'."),
                ),
            ],
            &["className1"],
        ),
        tool(
            "export_jar",
            "Export the current workspace as a JAR file (includes all modified classes)",
            vec![("outputPath", string("Absolute path to write the output JAR file"))],
            &["outputPath"],
        ),
        tool(
            "export_source",
            "Export decompiled source code to a directory. Can export a single class or all classes.",
            vec![
                (
                    "outputDir",
                    string("Absolute path to the output directory for decompiled source files"),
                ),
                (
                    "className",
                    string("Optional: export only this class. If omitted, exports all classes."),
                ),
            ],
            &["outputDir"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn catalog_is_complete_and_well_formed() {
        let tools = tool_definitions();
        let names: Vec<&str> = tools.iter().map(|tool| tool.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "open_jar",
                "close_workspace",
                "list_classes",
                "get_class_info",
                "decompile_class",
                "search_code",
                "get_call_graph",
                "get_inheritance",
                "rename_symbol",
                "export_mappings",
                "switch_workspace",
                "list_workspaces",
                "edit_bytecode",
                "diff_classes",
                "export_jar",
                "export_source",
            ]
        );
        for tool in &tools {
            assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
            let properties = tool.input_schema["properties"].as_object().expect("properties");
            if let Some(required) = tool.input_schema.get("required") {
                for key in required.as_array().expect("required array") {
                    let key = key.as_str().expect("required name");
                    assert!(properties.contains_key(key), "{} requires {key}", tool.name);
                }
            }
        }
        let rename = &tools[8].input_schema;
        assert_eq!(rename["required"], json!(["type", "oldName", "newName"]));
        assert_eq!(rename["properties"]["type"]["enum"], json!(["class", "field", "method"]));
        assert!(tools[1].input_schema.get("required").is_none());
    }

    #[test]
    fn defaults_fill_optional_arguments() {
        let call = route("list_classes", &Map::new()).expect("route");
        assert_eq!(call.method, BridgeMethod::Post);
        assert_eq!(call.path, "/workspace/classes");
        assert_eq!(call.body, json!({"offset": 0, "limit": 500}));

        let call = route("search_code", &args(json!({"query": "hello"}))).expect("route");
        assert_eq!(call.body, json!({"query": "hello", "type": "string", "maxResults": 100}));

        let call = route(
            "get_call_graph",
            &args(json!({"className": "p/A", "methodName": "run", "depth": 1})),
        )
        .expect("route");
        assert_eq!(call.body, json!({"className": "p/A", "methodName": "run", "depth": 1}));

        let call = route("get_inheritance", &args(json!({"className": "p/A"}))).expect("route");
        assert_eq!(call.body, json!({"className": "p/A", "direction": "both"}));
    }

    #[test]
    fn absent_optionals_are_not_sent() {
        let call = route("close_workspace", &Map::new()).expect("route");
        assert_eq!(call.body, json!({}));

        let call = route(
            "diff_classes",
            &args(json!({"className1": "A", "source": "X", "extra": 1})),
        )
        .expect("route");
        assert_eq!(call.body, json!({"className1": "A", "source": "X"}));

        let call = route("list_workspaces", &Map::new()).expect("route");
        assert_eq!(call.method, BridgeMethod::Get);
        assert_eq!(call.path, "/workspace/list-workspaces");
    }

    #[test]
    fn edit_bytecode_selects_endpoint_and_arguments() {
        let call = route(
            "edit_bytecode",
            &args(json!({
                "className": "p/A",
                "operation": "remove_member",
                "memberName": "count",
                "memberType": "field",
                "methodName": "ignored",
            })),
        )
        .expect("route");
        assert_eq!(call.path, "/bytecode/remove-member");
        assert_eq!(
            call.body,
            json!({"className": "p/A", "memberName": "count", "memberType": "field"})
        );

        let call = route(
            "edit_bytecode",
            &args(json!({
                "className": "p/A",
                "operation": "add_field",
                "fieldName": "flag",
                "descriptor": "Z",
                "accessFlags": 1,
            })),
        )
        .expect("route");
        assert_eq!(call.path, "/bytecode/add-field");
        assert_eq!(call.body["accessFlags"], 1);
    }

    #[test]
    fn unknown_routes_render_error_text() {
        let err = route("format_disk", &Map::new()).expect_err("unknown tool");
        assert_eq!(err.to_text(), "{\"error\":\"Unknown tool: format_disk\"}");

        let err = route(
            "edit_bytecode",
            &args(json!({"className": "p/A", "operation": "rename"})),
        )
        .expect_err("unknown operation");
        let parsed: Value = serde_json::from_str(&err.to_text()).expect("json");
        assert_eq!(parsed["code"], "INVALID_PARAMS");
        assert_eq!(
            parsed["error"],
            "Unknown operation: rename. Use: edit_method, edit_field, remove_member, add_field, add_method"
        );
    }
}
