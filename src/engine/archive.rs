//! Purpose: Read and write the bundled engine's workspace archive format.
//! Exports: `JsonArchiveImporter`, `read_archive`, `write_archive`, `write_file`,
//! `ARCHIVE_RESOURCE_KIND`.
//! Role: `open_jar` imports through `JsonArchiveImporter`; `export_jar` writes with `write_archive`.
//! Invariants: An archive is a JSON object `{classes, files}`; a lone class object
//! (one with a `name` key) is accepted as a single-class archive.
//! Invariants: Writing creates missing parent directories and overwrites in place.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::core::error::{Error, ErrorKind};
use crate::engine::ResourceImporter;
use crate::engine::model::{ClassInfo, Workspace, WorkspaceResource, normalize_class_name};

pub const ARCHIVE_RESOURCE_KIND: &str = "JsonArchiveResource";

#[derive(Clone, Copy, Debug, Default)]
pub struct JsonArchiveImporter;

impl ResourceImporter for JsonArchiveImporter {
    fn import(&self, path: &Path) -> Result<Workspace, Error> {
        let resource = read_archive(path)?;
        Ok(Workspace::new(ARCHIVE_RESOURCE_KIND, resource))
    }
}

pub fn read_archive(path: &Path) -> Result<WorkspaceResource, Error> {
    let bytes = fs::read(path).map_err(|err| {
        let kind = if err.kind() == std::io::ErrorKind::NotFound {
            ErrorKind::NotFound
        } else {
            ErrorKind::Io
        };
        Error::new(kind)
            .with_message("failed to read archive")
            .with_path(path)
            .with_source(err)
    })?;

    let value: Value = serde_json::from_slice(&bytes).map_err(|err| {
        Error::new(ErrorKind::Corrupt)
            .with_message("archive is not valid JSON")
            .with_path(path)
            .with_source(err)
    })?;

    let mut resource = if value.get("name").is_some() {
        let class: ClassInfo = serde_json::from_value(value).map_err(|err| corrupt(path, err))?;
        WorkspaceResource {
            classes: vec![class],
            files: Vec::new(),
        }
    } else {
        serde_json::from_value::<WorkspaceResource>(value).map_err(|err| corrupt(path, err))?
    };

    for class in &mut resource.classes {
        class.name = normalize_class_name(&class.name);
    }
    Ok(resource)
}

/// Writes `resource` to `path`, returning the number of bytes written.
pub fn write_archive(resource: &WorkspaceResource, path: &Path) -> Result<u64, Error> {
    let bytes = serde_json::to_vec_pretty(resource).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode archive")
            .with_source(err)
    })?;
    write_file(path, &bytes)
}

/// Writes `bytes` to `path`, creating missing parent directories.
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<u64, Error> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to create output directory")
                .with_path(parent)
                .with_source(err)
        })?;
    }
    fs::write(path, bytes).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write file")
            .with_path(path)
            .with_source(err)
    })?;
    Ok(bytes.len() as u64)
}

fn corrupt(path: &Path, err: serde_json::Error) -> Error {
    Error::new(ErrorKind::Corrupt)
        .with_message("archive does not describe a workspace")
        .with_path(path)
        .with_source(err)
}
