//! Purpose: Structural bytecode edits and method instruction listings.
//! Exports: `edit_method`, `edit_field`, `remove_member`, `add_field`, `add_method`,
//! `instructions`.
//! Role: `/bytecode/*` handlers over `engine::bytecode`.
//! Invariants: Each edit works on a copy of the class and stores it back only on success.

use serde_json::{Value, json};
use tracing::info;

use crate::bridge::envelope::{ApiError, Params, invalid_params, map_engine_error, member_not_found};
use crate::bridge::handlers::{Reply, require_class};
use crate::bridge::server::BridgeState;
use crate::core::error::{Error, ErrorKind};
use crate::engine::bytecode::{self as engine, MemberKind};
use crate::engine::model::{ACC_PRIVATE, ACC_PUBLIC, ClassInfo, Instruction, WorkspaceHandle};

pub fn edit_method(_state: &BridgeState, workspace: &WorkspaceHandle, params: &Params) -> Reply {
    let [class_name, method_name, method_desc] =
        params.required(["className", "methodName", "methodDesc"])?;
    let access = access_flags(params)?;
    let member = format!("{method_name}{method_desc}");
    let class = modify(workspace, class_name, "Edit method", &member, |class| {
        engine::edit_method(class, method_name, method_desc, access)
    })?;
    info!(class = %class.name, method = %member, "edited method");
    Ok(json!({
        "className": class.name,
        "methodName": method_name,
        "methodDesc": method_desc,
        "modified": true,
    }))
}

pub fn edit_field(_state: &BridgeState, workspace: &WorkspaceHandle, params: &Params) -> Reply {
    let [class_name, field_name] = params.required(["className", "fieldName"])?;
    let descriptor = params.non_blank("descriptor")?;
    let access = access_flags(params)?;
    let class = modify(workspace, class_name, "Edit field", field_name, |class| {
        engine::edit_field(class, field_name, descriptor, access)
    })?;
    info!(class = %class.name, field = field_name, "edited field");
    Ok(json!({
        "className": class.name,
        "fieldName": field_name,
        "modified": true,
    }))
}

pub fn remove_member(_state: &BridgeState, workspace: &WorkspaceHandle, params: &Params) -> Reply {
    let [class_name, member_name, member_type] =
        params.required(["className", "memberName", "memberType"])?;
    let kind: MemberKind = member_type
        .parse()
        .map_err(|err: Error| map_engine_error("Remove member", &err))?;
    let descriptor = params.non_blank("descriptor")?;
    let class = modify(workspace, class_name, "Remove member", member_name, |class| {
        engine::remove_member(class, kind, member_name, descriptor).map(|_| ())
    })?;
    info!(class = %class.name, member = member_name, kind = kind.as_str(), "removed member");
    Ok(json!({
        "className": class.name,
        "memberName": member_name,
        "memberType": kind.as_str(),
        "removed": true,
    }))
}

pub fn add_field(_state: &BridgeState, workspace: &WorkspaceHandle, params: &Params) -> Reply {
    let [class_name, field_name, descriptor] =
        params.required(["className", "fieldName", "descriptor"])?;
    let access = access_flags(params)?.unwrap_or(ACC_PRIVATE);
    let class = modify(workspace, class_name, "Add field", field_name, |class| {
        engine::add_field(class, field_name, descriptor, access)
    })?;
    info!(class = %class.name, field = field_name, "added field");
    Ok(json!({
        "className": class.name,
        "fieldName": field_name,
        "descriptor": descriptor,
        "accessFlags": access,
        "added": true,
    }))
}

pub fn add_method(_state: &BridgeState, workspace: &WorkspaceHandle, params: &Params) -> Reply {
    let [class_name, method_name, method_desc] =
        params.required(["className", "methodName", "methodDesc"])?;
    let access = access_flags(params)?.unwrap_or(ACC_PUBLIC);
    let member = format!("{method_name}{method_desc}");
    let class = modify(workspace, class_name, "Add method", &member, |class| {
        engine::add_method(class, method_name, method_desc, access)
    })?;
    info!(class = %class.name, method = %member, "added method");
    Ok(json!({
        "className": class.name,
        "methodName": method_name,
        "methodDesc": method_desc,
        "accessFlags": access,
        "added": true,
    }))
}

pub fn instructions(_state: &BridgeState, workspace: &WorkspaceHandle, params: &Params) -> Reply {
    let [class_name, method_name, method_desc] =
        params.required(["className", "methodName", "methodDesc"])?;
    let class = require_class(workspace, class_name)?;
    let method = class
        .method(method_name, method_desc)
        .ok_or_else(|| member_not_found(&class.name, &format!("{method_name}{method_desc}")))?;

    // Try-catch ranges point at labels by their position in the full instruction list.
    let label_index = |label: &str| -> i64 {
        method
            .instructions
            .iter()
            .position(|insn| matches!(insn, Instruction::Label { name } if name == label))
            .and_then(|index| i64::try_from(index).ok())
            .unwrap_or(-1)
    };

    let listing: Vec<Value> = method
        .instructions
        .iter()
        .filter(|insn| !matches!(insn, Instruction::Label { .. }))
        .map(Instruction::to_json)
        .collect();
    let try_catch: Vec<Value> = method
        .try_catch_blocks
        .iter()
        .map(|block| {
            json!({
                "start": label_index(&block.start),
                "end": label_index(&block.end),
                "handler": label_index(&block.handler),
                "type": block.catch_type.as_deref().unwrap_or("any"),
            })
        })
        .collect();
    let locals: Vec<Value> = method
        .local_variables
        .iter()
        .map(|local| json!({"name": local.name, "desc": local.desc, "index": local.index}))
        .collect();

    Ok(json!({
        "className": class.name,
        "methodName": method_name,
        "methodDesc": method_desc,
        "access": method.access,
        "maxStack": method.max_stack,
        "maxLocals": method.max_locals,
        "instructions": listing,
        "tryCatchBlocks": try_catch,
        "localVariables": locals,
    }))
}

fn access_flags(params: &Params) -> Result<Option<u32>, ApiError> {
    params
        .int("accessFlags")?
        .map(|flags| {
            u32::try_from(flags)
                .ok()
                .filter(|flags| *flags <= 0xFFFF)
                .ok_or_else(|| invalid_params(format!("Invalid accessFlags: {flags}")))
        })
        .transpose()
}

/// Applies `edit` to a copy of the class and stores the result.
fn modify(
    workspace: &WorkspaceHandle,
    class_name: &str,
    operation: &str,
    member: &str,
    edit: impl FnOnce(&mut ClassInfo) -> Result<(), Error>,
) -> Result<ClassInfo, ApiError> {
    let mut class = require_class(workspace, class_name)?;
    edit(&mut class).map_err(|err| match err.kind() {
        ErrorKind::NotFound => member_not_found(&class.name, member),
        _ => map_engine_error(operation, &err),
    })?;
    workspace.put_class(class.clone());
    Ok(class)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::bridge::handlers::testing::{self, data};
    use crate::engine::model::{
        ACC_PUBLIC, ClassInfo, FieldMember, Instruction, LocalVariable, MethodMember,
        TryCatchBlock,
    };

    fn fixture() -> Vec<ClassInfo> {
        let mut class = ClassInfo::new("com/x/A");
        class.fields.push(FieldMember {
            name: "count".to_string(),
            descriptor: "I".to_string(),
            access: 2,
        });
        let mut run = MethodMember::new("run", "()V", ACC_PUBLIC);
        run.instructions = vec![
            Instruction::Label {
                name: "L0".to_string(),
            },
            Instruction::insn("NOP"),
            Instruction::Label {
                name: "L1".to_string(),
            },
            Instruction::insn("RETURN"),
        ];
        run.try_catch_blocks.push(TryCatchBlock {
            start: "L0".to_string(),
            end: "L1".to_string(),
            handler: "L1".to_string(),
            catch_type: None,
        });
        run.local_variables.push(LocalVariable {
            name: "this".to_string(),
            desc: "Lcom/x/A;".to_string(),
            index: 0,
        });
        run.max_stack = 0;
        run.max_locals = 1;
        class.methods.push(run);
        vec![class]
    }

    #[test]
    fn instruction_listing_skips_labels() {
        let state = testing::state();
        testing::open(&state, "/t/a.jar", fixture());
        let reply = state.request(
            "/bytecode/instructions",
            &json!({"className": "com.x.A", "methodName": "run", "methodDesc": "()V"}),
        );
        let body = data(&reply);
        assert_eq!(body["maxLocals"], 1);
        assert_eq!(body["instructions"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["instructions"][0]["type"], "INSN");
        assert_eq!(body["instructions"][0]["opcode"], "NOP");
        assert_eq!(
            body["tryCatchBlocks"],
            json!([{"start": 0, "end": 2, "handler": 2, "type": "any"}])
        );
        assert_eq!(body["localVariables"][0]["name"], "this");
    }

    #[test]
    fn add_members_with_default_access() {
        let state = testing::state();
        testing::open(&state, "/t/a.jar", fixture());
        let reply = state.request(
            "/bytecode/add-field",
            &json!({"className": "com/x/A", "fieldName": "name", "descriptor": "Ljava/lang/String;"}),
        );
        assert_eq!(data(&reply)["accessFlags"], 2);

        let reply = state.request(
            "/bytecode/add-method",
            &json!({"className": "com/x/A", "methodName": "size", "methodDesc": "()I"}),
        );
        assert_eq!(data(&reply)["accessFlags"], 1);
        let listing = state.request(
            "/bytecode/instructions",
            &json!({"className": "com/x/A", "methodName": "size", "methodDesc": "()I"}),
        );
        let opcodes: Vec<&str> = data(&listing)["instructions"]
            .as_array()
            .map(|items| items.iter().filter_map(|item| item["opcode"].as_str()).collect())
            .unwrap_or_default();
        assert_eq!(opcodes, ["ICONST_0", "IRETURN"]);

        let (status, body) = state.request(
            "/bytecode/add-field",
            &json!({"className": "com/x/A", "fieldName": "count", "descriptor": "I"}),
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PARAMS");

        let (status, _) = state.request(
            "/bytecode/add-field",
            &json!({"className": "com/x/A", "fieldName": "bad", "descriptor": "Q"}),
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn edits_and_removals() {
        let state = testing::state();
        testing::open(&state, "/t/a.jar", fixture());
        let reply = state.request(
            "/bytecode/edit-field",
            &json!({"className": "com/x/A", "fieldName": "count", "descriptor": "J", "accessFlags": 1}),
        );
        assert_eq!(data(&reply)["modified"], true);
        let info = state.request("/workspace/class-info", &json!({"className": "com/x/A"}));
        assert_eq!(data(&info)["fields"][0]["descriptor"], "J");
        assert_eq!(data(&info)["fields"][0]["accessFlags"], 1);

        let reply = state.request(
            "/bytecode/edit-method",
            &json!({"className": "com/x/A", "methodName": "run", "methodDesc": "()V", "accessFlags": 9}),
        );
        assert_eq!(data(&reply)["modified"], true);

        let (status, body) = state.request(
            "/bytecode/edit-method",
            &json!({"className": "com/x/A", "methodName": "walk", "methodDesc": "()V"}),
        );
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "MEMBER_NOT_FOUND");

        let reply = state.request(
            "/bytecode/remove-member",
            &json!({"className": "com/x/A", "memberName": "run", "memberType": "METHOD"}),
        );
        assert_eq!(data(&reply)["memberType"], "method");
        let info = state.request("/workspace/class-info", &json!({"className": "com/x/A"}));
        assert_eq!(data(&info)["methods"], json!([]));

        let (status, _) = state.request(
            "/bytecode/remove-member",
            &json!({"className": "com/x/A", "memberName": "count", "memberType": "ctor"}),
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
