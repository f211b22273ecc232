//! In-memory task registry.
//!
//! The single source of truth for status queries and streaming. All state is
//! process-lifetime only; a restart loses every task. The registry is
//! explicitly constructed and passed to the controller and the API layer -
//! there is no global instance.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::task::{StatusSnapshot, Task};

/// Thread-safe registry of research tasks.
///
/// Cloning is cheap and shares the underlying map. Every read and write goes
/// through the inner lock, and tasks are replaced whole under the write
/// guard, so a reader never observes a half-updated record. Guards are held
/// only for the map operation itself, never across an await on the
/// generator.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<Uuid, Task>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly created task.
    pub async fn create(&self, task: Task) {
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id, task);
    }

    /// Fetch a clone of the full task record.
    pub async fn get(&self, task_id: Uuid) -> Option<Task> {
        let tasks = self.tasks.read().await;
        tasks.get(&task_id).cloned()
    }

    /// Fetch just the status snapshot for a task.
    pub async fn get_snapshot(&self, task_id: Uuid) -> Option<StatusSnapshot> {
        let tasks = self.tasks.read().await;
        tasks.get(&task_id).map(|t| t.snapshot())
    }

    /// Replace an existing task record.
    ///
    /// Returns false when the task is no longer present. Deleted entries are
    /// never resurrected: in-flight workflow writes that arrive after a
    /// delete become no-ops.
    pub async fn update(&self, task: &Task) -> bool {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(&task.id) {
            Some(existing) => {
                *existing = task.clone();
                true
            }
            None => false,
        }
    }

    /// Remove a task. Returns whether it existed.
    pub async fn delete(&self, task_id: Uuid) -> bool {
        let mut tasks = self.tasks.write().await;
        tasks.remove(&task_id).is_some()
    }

    /// Clone out all task records.
    pub async fn list_all(&self) -> Vec<Task> {
        let tasks = self.tasks.read().await;
        tasks.values().cloned().collect()
    }
}
