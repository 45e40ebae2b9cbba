//! Purpose: `McpHandler` implementation that forwards tool calls to the Bridge.
//! Exports: `RelayHandler`, `BridgeTransport`.
//! Role: Glue between the dispatcher, the tool catalog and the Bridge client.
//! Invariants: `isError` is true only for error envelopes, transport failures and
//! calls rejected before reaching the Bridge.

use std::time::Instant;

use serde_json::{Value, json};
use tracing::debug;

use crate::mcp::{
    JsonRpcError, McpHandler, McpResource, McpTool, ResourceContent, ResourceReadRequest,
    ResourceReadResult, ToolCallRequest, ToolCallResult,
};
use crate::relay::client::{BridgeClient, BridgeReply};
use crate::relay::tools::{BridgeMethod, route, tool_definitions};

const WORKSPACE_URI: &str = "recaf://workspace";
const CLASSES_URI: &str = "recaf://classes";
const JSON_MIME: &str = "application/json";

/// The slice of the Bridge the handler needs; lets tests answer without sockets.
pub trait BridgeTransport {
    fn post(&self, path: &str, body: &Value) -> BridgeReply;
    fn get(&self, path: &str) -> BridgeReply;
}

impl BridgeTransport for BridgeClient {
    fn post(&self, path: &str, body: &Value) -> BridgeReply {
        self.post_reply(path, body)
    }

    fn get(&self, path: &str) -> BridgeReply {
        self.get_reply(path)
    }
}

pub struct RelayHandler<T = BridgeClient> {
    bridge: T,
    tools: Vec<McpTool>,
}

impl<T: BridgeTransport> RelayHandler<T> {
    pub fn new(bridge: T) -> Self {
        Self {
            bridge,
            tools: tool_definitions(),
        }
    }

    fn forward(&self, name: &str, request: &ToolCallRequest) -> BridgeReply {
        match route(name, &request.arguments) {
            Ok(call) => match call.method {
                BridgeMethod::Get => self.bridge.get(call.path),
                BridgeMethod::Post => self.bridge.post(call.path, &call.body),
            },
            Err(err) => BridgeReply::Error(err.to_text()),
        }
    }
}

impl<T: BridgeTransport> McpHandler for RelayHandler<T> {
    fn list_tools(&mut self) -> Result<Vec<McpTool>, JsonRpcError> {
        Ok(self.tools.clone())
    }

    fn call_tool(&mut self, request: ToolCallRequest) -> Result<ToolCallResult, JsonRpcError> {
        let started = Instant::now();
        let reply = self.forward(&request.name, &request);
        debug!(
            tool = %request.name,
            is_error = reply.is_error(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tool call"
        );
        let is_error = reply.is_error();
        Ok(ToolCallResult::text(reply.into_text(), is_error))
    }

    fn list_resources(&mut self) -> Result<Vec<McpResource>, JsonRpcError> {
        Ok(vec![
            McpResource {
                uri: WORKSPACE_URI.to_string(),
                name: "Current Workspace".to_string(),
                description: Some(
                    "Information about the currently open workspace in Recaf".to_string(),
                ),
                mime_type: Some(JSON_MIME.to_string()),
            },
            McpResource {
                uri: CLASSES_URI.to_string(),
                name: "Class List".to_string(),
                description: Some("List of all classes in the current workspace".to_string()),
                mime_type: Some(JSON_MIME.to_string()),
            },
        ])
    }

    fn read_resource(
        &mut self,
        request: ResourceReadRequest,
    ) -> Result<ResourceReadResult, JsonRpcError> {
        let text = match request.uri.as_str() {
            WORKSPACE_URI => self.bridge.post("/workspace/info", &json!({})).into_text(),
            CLASSES_URI => self.bridge.post("/workspace/classes", &json!({})).into_text(),
            uri => json!({ "error": format!("Unknown resource: {uri}") }).to_string(),
        };
        Ok(ResourceReadResult {
            contents: vec![ResourceContent {
                uri: request.uri,
                mime_type: Some(JSON_MIME.to_string()),
                text,
            }],
        })
    }
}
