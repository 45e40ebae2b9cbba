//! Purpose: Process-wide registry of open workspaces keyed by generated id.
//! Exports: `WorkspaceRegistry`, `WorkspaceEntry`, `generate_id_stem`.
//! Role: Lets the Bridge hold several workspaces at once and address them by id.
//! Invariants: Ids match `^[A-Za-z0-9_-]+-\d+$` and are never reused within a process.
//! Invariants: Handle lookups compare by `Arc` identity, never by value.
//! Invariants: `snapshot` returns entries in registration order.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::engine::model::WorkspaceHandle;

#[derive(Clone, Debug)]
pub struct WorkspaceEntry {
    pub id: String,
    pub path: String,
    pub handle: WorkspaceHandle,
}

#[derive(Debug)]
pub struct WorkspaceRegistry {
    entries: RwLock<Vec<WorkspaceEntry>>,
    next_seq: AtomicU64,
}

impl Default for WorkspaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkspaceRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Allocates a fresh id for `path`; consumes one sequence number.
    pub fn generate_id(&self, path: &str) -> String {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        format!("{}-{seq}", generate_id_stem(path))
    }

    pub fn register(&self, path: &str, handle: WorkspaceHandle) -> String {
        let id = self.generate_id(path);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.push(WorkspaceEntry {
            id: id.clone(),
            path: path.to_string(),
            handle,
        });
        id
    }

    pub fn get(&self, id: &str) -> Option<WorkspaceHandle> {
        self.find(id, |entry| entry.handle.clone())
    }

    pub fn get_path(&self, id: &str) -> Option<String> {
        self.find(id, |entry| entry.path.clone())
    }

    pub fn remove(&self, id: &str) -> Option<WorkspaceHandle> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let index = entries.iter().position(|entry| entry.id == id)?;
        Some(entries.remove(index).handle)
    }

    pub fn find_id(&self, handle: &WorkspaceHandle) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .find(|entry| WorkspaceHandle::ptr_eq(&entry.handle, handle))
            .map(|entry| entry.id.clone())
    }

    pub fn snapshot(&self) -> Vec<WorkspaceEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn find<R>(&self, id: &str, map: impl FnOnce(&WorkspaceEntry) -> R) -> Option<R> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().find(|entry| entry.id == id).map(map)
    }
}

/// File stem of `path` with every run of characters outside `[A-Za-z0-9_-]`
/// collapsed to `_`.
pub fn generate_id_stem(path: &str) -> String {
    let file_name = Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    let stem = match file_name.rfind('.') {
        Some(dot) if dot > 0 => &file_name[..dot],
        _ => file_name.as_str(),
    };

    let mut out = String::with_capacity(stem.len());
    let mut in_run = false;
    for ch in stem.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
            out.push(ch);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    if out.is_empty() {
        out.push_str("workspace");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::{Workspace, WorkspaceResource};
    use std::sync::Arc;
    use std::thread;

    fn handle() -> WorkspaceHandle {
        Workspace::new("MemoryArchiveResource", WorkspaceResource::default()).into_handle()
    }

    fn is_valid_id(id: &str) -> bool {
        let Some((stem, seq)) = id.rsplit_once('-') else {
            return false;
        };
        !stem.is_empty()
            && stem
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            && !seq.is_empty()
            && seq.chars().all(|c| c.is_ascii_digit())
    }

    #[test]
    fn stems_are_sanitised() {
        assert_eq!(generate_id_stem("/t/a.jar"), "a");
        assert_eq!(generate_id_stem("/t/my app (v2).jar"), "my_app_v2_");
        assert_eq!(generate_id_stem("/t/.hidden"), "_hidden");
        assert_eq!(generate_id_stem("/t/archive.tar.gz"), "archive_tar");
        assert_eq!(generate_id_stem("/t/ü.jar"), "_");
        assert_eq!(generate_id_stem(""), "workspace");
    }

    #[test]
    fn ids_are_unique_and_well_formed() {
        let registry = WorkspaceRegistry::new();
        let first = registry.register("/t/a.jar", handle());
        let second = registry.register("/t/a.jar", handle());
        assert_eq!(first, "a-1");
        assert_eq!(second, "a-2");
        assert!(is_valid_id(&first));
        assert!(is_valid_id(&registry.generate_id("/t/weird name!.jar")));
    }

    #[test]
    fn lookups_and_removal() {
        let registry = WorkspaceRegistry::new();
        let workspace = handle();
        let id = registry.register("/t/a.jar", workspace.clone());
        assert!(Arc::ptr_eq(&registry.get(&id).expect("registered"), &workspace));
        assert_eq!(registry.get_path(&id).as_deref(), Some("/t/a.jar"));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(&id).is_some());
        assert!(registry.get(&id).is_none());
        assert!(registry.remove(&id).is_none());
        assert!(registry.is_empty());

        let next = registry.register("/t/a.jar", handle());
        assert_ne!(next, id);
    }

    #[test]
    fn find_id_compares_identity() {
        let registry = WorkspaceRegistry::new();
        let first = handle();
        let twin = handle();
        let id = registry.register("/t/a.jar", first.clone());
        assert_eq!(registry.find_id(&first).as_deref(), Some(id.as_str()));
        assert!(registry.find_id(&twin).is_none());
    }

    #[test]
    fn snapshot_keeps_registration_order_and_clear_empties() {
        let registry = WorkspaceRegistry::new();
        registry.register("/t/b.jar", handle());
        registry.register("/t/a.jar", handle());
        let ids: Vec<String> = registry.snapshot().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["b-1", "a-2"]);
        registry.clear();
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn concurrent_registration_never_repeats_ids() {
        let registry = Arc::new(WorkspaceRegistry::new());
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    (0..25)
                        .map(|_| registry.register("/t/a.jar", handle()))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut ids: Vec<String> = workers
            .into_iter()
            .flat_map(|worker| worker.join().expect("worker"))
            .collect();
        assert_eq!(registry.len(), 200);
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 200);
    }
}
