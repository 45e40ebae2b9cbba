//! Purpose: Workspace registry plus the "current workspace" pointer.
//! Exports: `Sessions`, `WorkspaceListing`.
//! Role: Single owner of open/close/switch state transitions for the Bridge.
//! Invariants: Opening registers the workspace and makes it current.
//! Invariants: Closing any workspace that is current clears the pointer, whether
//! it was closed by id or as "the current one".
//! Invariants: The current handle, when set, was registered at the time it was set.

use std::sync::{PoisonError, RwLock};

use crate::bridge::registry::{WorkspaceEntry, WorkspaceRegistry};
use crate::engine::model::WorkspaceHandle;

#[derive(Clone, Debug)]
pub struct WorkspaceListing {
    pub entry: WorkspaceEntry,
    pub is_current: bool,
}

#[derive(Debug, Default)]
pub struct Sessions {
    registry: WorkspaceRegistry,
    current: RwLock<Option<WorkspaceHandle>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &WorkspaceRegistry {
        &self.registry
    }

    pub fn current(&self) -> Option<WorkspaceHandle> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn current_id(&self) -> Option<String> {
        self.current()
            .and_then(|handle| self.registry.find_id(&handle))
    }

    /// Registers `handle` under an id derived from `path` and makes it current.
    pub fn open(&self, path: &str, handle: WorkspaceHandle) -> String {
        let id = self.registry.register(path, handle.clone());
        self.set_current(Some(handle));
        id
    }

    /// Makes a registered workspace current; returns its entry.
    pub fn switch(&self, id: &str) -> Option<WorkspaceEntry> {
        let entry = self
            .registry
            .snapshot()
            .into_iter()
            .find(|entry| entry.id == id)?;
        self.set_current(Some(entry.handle.clone()));
        Some(entry)
    }

    /// Closes the current workspace. Returns `None` when nothing was open.
    pub fn close_current(&self) -> Option<WorkspaceHandle> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let handle = current.take()?;
        if let Some(id) = self.registry.find_id(&handle) {
            self.registry.remove(&id);
        }
        Some(handle)
    }

    /// Closes the workspace registered under `id`. Returns `None` for unknown ids.
    pub fn close(&self, id: &str) -> Option<WorkspaceHandle> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let handle = self.registry.remove(id)?;
        if current
            .as_ref()
            .is_some_and(|active| WorkspaceHandle::ptr_eq(active, &handle))
        {
            *current = None;
        }
        Some(handle)
    }

    pub fn list(&self) -> Vec<WorkspaceListing> {
        let current = self.current();
        self.registry
            .snapshot()
            .into_iter()
            .map(|entry| {
                let is_current = current
                    .as_ref()
                    .is_some_and(|active| WorkspaceHandle::ptr_eq(active, &entry.handle));
                WorkspaceListing { entry, is_current }
            })
            .collect()
    }

    fn set_current(&self, handle: Option<WorkspaceHandle>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = handle;
    }
}
