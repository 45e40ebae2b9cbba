//! Purpose: Symbol rename and mapping export endpoints.
//! Exports: `rename`, `export`.
//! Role: `/mapping/*` handlers over `engine::mapping`.
//! Invariants: Member renames without a descriptor resolve it from the owning class;
//! a method name without a descriptor renames every overload.
//! Invariants: Renaming an unknown class is a 404 and leaves the workspace untouched.

use std::path::Path;

use serde_json::json;
use tracing::info;

use crate::bridge::envelope::{
    Params, invalid_params, map_engine_error, member_not_found, missing_params,
};
use crate::bridge::handlers::{Reply, require_class};
use crate::bridge::server::BridgeState;
use crate::engine::archive::write_file;
use crate::engine::mapping::{IntermediateMappings, MappingFormat, apply_mappings};
use crate::engine::model::{WorkspaceHandle, normalize_class_name};

pub fn rename(_state: &BridgeState, workspace: &WorkspaceHandle, params: &Params) -> Reply {
    let [kind, old_name, new_name] = params.required(["type", "oldName", "newName"])?;
    let owner = params.non_blank("className")?;
    let descriptor = params.non_blank("descriptor")?;
    let kind = kind.to_ascii_lowercase();

    let mut batch = IntermediateMappings::new();
    let (old_name, new_name) = match kind.as_str() {
        "class" => {
            let old = normalize_class_name(old_name);
            let new = normalize_class_name(new_name);
            let old = require_class(workspace, &old)?.name;
            if old != new && workspace.find_class(&new).is_some() {
                return Err(invalid_params(format!("Class already exists: {new}")));
            }
            batch.add_class(&old, &new);
            (old, new)
        }
        "field" => {
            let owner = owner.ok_or_else(|| invalid_params("Missing 'className' for field rename"))?;
            let class = require_class(workspace, owner)?;
            let descriptor = match descriptor {
                Some(descriptor) => descriptor.to_string(),
                None => class
                    .field(old_name)
                    .map(|field| field.descriptor.clone())
                    .ok_or_else(|| member_not_found(&class.name, old_name))?,
            };
            batch.add_field(&class.name, &descriptor, old_name, new_name);
            (old_name.to_string(), new_name.to_string())
        }
        "method" => {
            let owner =
                owner.ok_or_else(|| invalid_params("Missing 'className' for method rename"))?;
            let class = require_class(workspace, owner)?;
            let descriptors: Vec<String> = match descriptor {
                Some(descriptor) => vec![descriptor.to_string()],
                None => class
                    .methods
                    .iter()
                    .filter(|method| method.name == old_name)
                    .map(|method| method.descriptor.clone())
                    .collect(),
            };
            if descriptors.is_empty() {
                return Err(member_not_found(&class.name, old_name));
            }
            for descriptor in &descriptors {
                batch.add_method(&class.name, descriptor, old_name, new_name);
            }
            (old_name.to_string(), new_name.to_string())
        }
        other => {
            return Err(invalid_params(format!(
                "Invalid type: {other}. Use: class, field, method"
            )));
        }
    };

    let affected = apply_mappings(workspace, &batch);
    info!(kind = %kind, old = %old_name, new = %new_name, affected, "renamed symbol");
    Ok(json!({
        "type": kind,
        "oldName": old_name,
        "newName": new_name,
        "affectedClasses": affected,
    }))
}

pub fn export(_state: &BridgeState, workspace: &WorkspaceHandle, params: &Params) -> Reply {
    let format = params.non_blank("format")?;
    let output_path = params.non_blank("outputPath")?;
    let (format_name, output_path) = match (format, output_path) {
        (None, None) => {
            return Ok(json!({ "availableFormats": MappingFormat::available() }));
        }
        (Some(_), None) => return Err(missing_params(&["outputPath"])),
        (None, Some(_)) => return Err(missing_params(&["format"])),
        (Some(format), Some(path)) => (format, path),
    };

    let format = MappingFormat::from_name(format_name).ok_or_else(|| {
        invalid_params(format!(
            "Unknown mapping format: {format_name}. Available: {}",
            MappingFormat::available().join(", ")
        ))
    })?;
    let text = workspace.with_mappings(|mappings| format.export_text(mappings));
    let size = write_file(Path::new(output_path), text.as_bytes())
        .map_err(|err| map_engine_error("Export mappings", &err))?;
    info!(format = format.name(), path = output_path, size, "exported mappings");
    Ok(json!({
        "format": format.name(),
        "outputPath": output_path,
        "size": size,
    }))
}
