//! Purpose: Archive and decompiled-source export endpoints.
//! Exports: `jar`, `source`.
//! Role: `/export/*` handlers; both write under caller-supplied paths.
//! Invariants: A source export keeps going past per-class failures and reports them
//! in `errors`; the field is omitted when every class succeeded.

use std::path::Path;

use serde_json::{Map, Value, json};
use tracing::info;

use crate::bridge::envelope::{Params, map_engine_error};
use crate::bridge::handlers::decompile::run_decompiler;
use crate::bridge::handlers::{Reply, require_class};
use crate::bridge::server::BridgeState;
use crate::engine::archive::{write_archive, write_file};
use crate::engine::model::WorkspaceHandle;

pub fn jar(_state: &BridgeState, workspace: &WorkspaceHandle, params: &Params) -> Reply {
    let [output_path] = params.required(["outputPath"])?;
    let primary = workspace.snapshot();
    let size = write_archive(&primary, Path::new(output_path))
        .map_err(|err| map_engine_error("Export JAR", &err))?;
    info!(
        path = output_path,
        classes = primary.classes.len(),
        files = primary.files.len(),
        size,
        "exported archive"
    );
    Ok(json!({
        "outputPath": output_path,
        "classCount": primary.classes.len(),
        "fileCount": primary.files.len(),
        "sizeBytes": size,
    }))
}

pub fn source(state: &BridgeState, workspace: &WorkspaceHandle, params: &Params) -> Reply {
    let [output_dir] = params.required(["outputDir"])?;
    let targets = match params.non_blank("className")? {
        Some(class_name) => vec![require_class(workspace, class_name)?],
        None => workspace.snapshot().classes,
    };

    let root = Path::new(output_dir);
    let mut exported = 0usize;
    let mut errors = Vec::new();
    for class in targets {
        let name = class.name.clone();
        let text = match run_decompiler(state, workspace, class) {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                errors.push(format!("Error decompiling {name}: {}", err.describe()));
                continue;
            }
            Err(err) => {
                errors.push(format!("Error decompiling {name}: {}", err.message()));
                continue;
            }
        };
        let target = root.join(format!("{name}.java"));
        match write_file(&target, text.as_bytes()) {
            Ok(_) => exported += 1,
            Err(err) => errors.push(format!("Error writing {name}: {}", err.describe())),
        }
    }

    info!(dir = output_dir, exported, failed = errors.len(), "exported sources");
    let mut out = Map::new();
    out.insert("outputDir".to_string(), json!(output_dir));
    out.insert("classesExported".to_string(), json!(exported));
    if !errors.is_empty() {
        out.insert("errors".to_string(), json!(errors));
    }
    Ok(Value::Object(out))
}
