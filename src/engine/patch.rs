//! Purpose: Workspace patches: capture edits against the import snapshot and replay them.
//! Exports: `WorkspacePatch`, `AssemblerPatch`, `TextFilePatch`, `Removal`, `RemovalKind`,
//! `PatchFeedback`, `FeedbackLog`, `create_patch`, `apply_patch`,
//! `serialize_patch`, `deserialize_patch`.
//! Role: Backs `/patch`.
//! Invariants: Class edits travel as assembler text, files as full contents.
//! Invariants: `apply_patch` validates every entry before mutating; a failed apply leaves
//! the workspace untouched.

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};
use crate::engine::model::{ClassInfo, FileInfo, Workspace, normalize_class_name};
use crate::engine::{Assembler, AssemblerError};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspacePatch {
    #[serde(default)]
    pub assembler_patches: Vec<AssemblerPatch>,
    #[serde(default)]
    pub text_file_patches: Vec<TextFilePatch>,
    #[serde(default)]
    pub removals: Vec<Removal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblerPatch {
    pub class_name: String,
    pub assembly: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextFilePatch {
    pub name: String,
    pub content: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalKind {
    Class,
    File,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Removal {
    pub kind: RemovalKind,
    pub name: String,
}

/// Receives problems found while applying a patch.
pub trait PatchFeedback {
    fn on_assembler_errors(&mut self, class_name: &str, errors: &[AssemblerError]);
    fn on_incomplete_path(&mut self, path: &str);
}

/// Feedback sink that keeps one human-readable line per problem.
#[derive(Debug, Default)]
pub struct FeedbackLog {
    pub errors: Vec<String>,
}

impl PatchFeedback for FeedbackLog {
    fn on_assembler_errors(&mut self, class_name: &str, errors: &[AssemblerError]) {
        let joined: Vec<String> = errors.iter().map(ToString::to_string).collect();
        self.errors
            .push(format!("Assembler error: {class_name}: {}", joined.join("; ")));
    }

    fn on_incomplete_path(&mut self, path: &str) {
        self.errors.push(format!("Incomplete path: {path}"));
    }
}

pub fn create_patch(workspace: &Workspace, assembler: &dyn Assembler) -> Result<WorkspacePatch, Error> {
    let current = workspace.snapshot();
    let baseline = workspace.baseline();
    let mut patch = WorkspacePatch::default();

    for class in &current.classes {
        if baseline.find_class(&class.name) == Some(class) {
            continue;
        }
        patch.assembler_patches.push(AssemblerPatch {
            class_name: class.name.clone(),
            assembly: assembler.disassemble_class(class)?,
        });
    }
    for file in &current.files {
        if baseline.files.iter().any(|known| known == file) {
            continue;
        }
        patch.text_file_patches.push(TextFilePatch {
            name: file.name.clone(),
            content: file.content.clone(),
        });
    }
    for class in &baseline.classes {
        if current.find_class(&class.name).is_none() {
            patch.removals.push(Removal {
                kind: RemovalKind::Class,
                name: class.name.clone(),
            });
        }
    }
    for file in &baseline.files {
        if !current.files.iter().any(|known| known.name == file.name) {
            patch.removals.push(Removal {
                kind: RemovalKind::File,
                name: file.name.clone(),
            });
        }
    }
    Ok(patch)
}

pub fn serialize_patch(patch: &WorkspacePatch) -> Result<String, Error> {
    serde_json::to_string_pretty(patch).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode patch")
            .with_source(err)
    })
}

pub fn deserialize_patch(text: &str) -> Result<WorkspacePatch, Error> {
    serde_json::from_str(text).map_err(|err| {
        Error::new(ErrorKind::Corrupt)
            .with_message("invalid patch json")
            .with_source(err)
    })
}

/// Applies `patch`. Returns false, after reporting every problem to `feedback`,
/// when any entry cannot be applied; nothing is changed in that case.
pub fn apply_patch(
    workspace: &Workspace,
    assembler: &dyn Assembler,
    patch: &WorkspacePatch,
    feedback: &mut dyn PatchFeedback,
) -> bool {
    let mut ok = true;
    let mut classes = Vec::with_capacity(patch.assembler_patches.len());
    for entry in &patch.assembler_patches {
        let class_name = normalize_class_name(&entry.class_name);
        if class_name.is_empty() {
            feedback.on_incomplete_path("class:");
            ok = false;
            continue;
        }
        let existing = workspace
            .find_class(&class_name)
            .unwrap_or_else(|| ClassInfo::new(class_name.clone()));
        let assembled = assembler
            .tokenize(&entry.assembly)
            .and_then(|tokens| assembler.parse(&tokens))
            .and_then(|parsed| assembler.assemble(parsed, &existing));
        match assembled {
            Ok(class) if class.name == class_name => classes.push(class),
            Ok(class) => {
                let mismatch = AssemblerError::new(
                    0,
                    format!("assembled class {} does not match {class_name}", class.name),
                );
                feedback.on_assembler_errors(&class_name, &[mismatch]);
                ok = false;
            }
            Err(errors) => {
                feedback.on_assembler_errors(&class_name, &errors);
                ok = false;
            }
        }
    }
    for entry in &patch.text_file_patches {
        if entry.name.trim().is_empty() {
            feedback.on_incomplete_path("file:");
            ok = false;
        }
    }
    workspace.read(|resource| {
        for removal in &patch.removals {
            let present = match removal.kind {
                RemovalKind::Class => resource.find_class(&removal.name).is_some(),
                RemovalKind::File => resource.files.iter().any(|f| f.name == removal.name),
            };
            if !present {
                let kind = match removal.kind {
                    RemovalKind::Class => "class",
                    RemovalKind::File => "file",
                };
                feedback.on_incomplete_path(&format!("{kind}:{}", removal.name));
                ok = false;
            }
        }
    });
    if !ok {
        return false;
    }

    workspace.write(|resource| {
        for removal in &patch.removals {
            match removal.kind {
                RemovalKind::Class => {
                    resource.remove_class(&removal.name);
                }
                RemovalKind::File => {
                    resource.remove_file(&removal.name);
                }
            }
        }
        for entry in &patch.text_file_patches {
            resource.put_file(FileInfo {
                name: entry.name.clone(),
                content: entry.content.clone(),
            });
        }
        for class in classes {
            resource.put_class(class);
        }
    });
    true
}
