//! Persistence bridge: the async interface to durable project storage.
//!
//! The session mirrors every committed change through [`PersistentStore`].
//! Backends keep the project record (plans with their image bytes) and the
//! marker records (with photo bytes) side by side; markers come back ordered
//! by id.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::sync::{Arc, Mutex, MutexGuard};

use crate::doc::{Marker, MarkerId, Project};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store not initialised")]
    NotInitialised,
    #[error("store lock poisoned")]
    Poisoned,
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Durable storage for one project and its markers. Enables mocking in tests.
#[async_trait::async_trait]
pub trait PersistentStore: Send + Sync {
    /// Open the backing storage. Must be called before any other method.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend cannot be opened.
    async fn init(&self) -> Result<(), StoreError>;

    /// The saved project, if one exists.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend read fails.
    async fn get_project(&self) -> Result<Option<Project>, StoreError>;

    /// Replace the saved project record.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend write fails.
    async fn save_project(&self, project: &Project) -> Result<(), StoreError>;

    /// Every saved marker, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend read fails.
    async fn get_all_markers(&self) -> Result<Vec<Marker>, StoreError>;

    /// Insert a marker or overwrite the record with the same id.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend write fails.
    async fn add_marker(&self, marker: &Marker) -> Result<(), StoreError>;

    /// Delete a marker record. Deleting an unknown id is not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend write fails.
    async fn delete_marker(&self, id: MarkerId) -> Result<(), StoreError>;

    /// Drop the project and all markers.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend write fails.
    async fn clear_all(&self) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<T: PersistentStore + ?Sized> PersistentStore for Arc<T> {
    async fn init(&self) -> Result<(), StoreError> {
        (**self).init().await
    }

    async fn get_project(&self) -> Result<Option<Project>, StoreError> {
        (**self).get_project().await
    }

    async fn save_project(&self, project: &Project) -> Result<(), StoreError> {
        (**self).save_project(project).await
    }

    async fn get_all_markers(&self) -> Result<Vec<Marker>, StoreError> {
        (**self).get_all_markers().await
    }

    async fn add_marker(&self, marker: &Marker) -> Result<(), StoreError> {
        (**self).add_marker(marker).await
    }

    async fn delete_marker(&self, id: MarkerId) -> Result<(), StoreError> {
        (**self).delete_marker(id).await
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        (**self).clear_all().await
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    ready: bool,
    project: Option<Project>,
    markers: Vec<Marker>,
}

/// In-process store. Contents live as long as the value does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    fn ready(&self) -> Result<MutexGuard<'_, MemoryInner>, StoreError> {
        let inner = self.lock()?;
        if inner.ready { Ok(inner) } else { Err(StoreError::NotInitialised) }
    }
}

#[async_trait::async_trait]
impl PersistentStore for MemoryStore {
    async fn init(&self) -> Result<(), StoreError> {
        self.lock()?.ready = true;
        Ok(())
    }

    async fn get_project(&self) -> Result<Option<Project>, StoreError> {
        Ok(self.ready()?.project.clone())
    }

    async fn save_project(&self, project: &Project) -> Result<(), StoreError> {
        self.ready()?.project = Some(project.clone());
        Ok(())
    }

    async fn get_all_markers(&self) -> Result<Vec<Marker>, StoreError> {
        let mut markers = self.ready()?.markers.clone();
        markers.sort_by_key(|m| m.id);
        Ok(markers)
    }

    async fn add_marker(&self, marker: &Marker) -> Result<(), StoreError> {
        let mut inner = self.ready()?;
        match inner.markers.iter_mut().find(|m| m.id == marker.id) {
            Some(slot) => *slot = marker.clone(),
            None => inner.markers.push(marker.clone()),
        }
        Ok(())
    }

    async fn delete_marker(&self, id: MarkerId) -> Result<(), StoreError> {
        self.ready()?.markers.retain(|m| m.id != id);
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        let mut inner = self.ready()?;
        inner.project = None;
        inner.markers.clear();
        Ok(())
    }
}
