//! In-memory task registry.
//!
//! The registry is the only state shared between the gateway and running
//! orchestrations. It is reached through the [`TaskRegistry`] trait so the
//! backing store can be swapped; [`InMemoryTaskRegistry`] keeps records in a
//! sharded [`DashMap`], so updates to different ids do not contend.
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{AppError, AppResult};
use crate::task::model::{NewTask, Task, TaskId};

pub trait TaskRegistry: Send + Sync {
    /// Insert a new queued task and return its id. The record is readable as
    /// soon as this returns.
    fn create(&self, fields: NewTask) -> TaskId;

    /// Snapshot of a task, or [`AppError::NotFound`].
    fn get(&self, id: &TaskId) -> AppResult<Task>;

    /// Apply `mutator` atomically with respect to other writers of the same id
    /// and return the updated snapshot.
    fn update(&self, id: &TaskId, mutator: &mut dyn FnMut(&mut Task)) -> AppResult<Task>;

    /// Drop terminal tasks last touched before `cutoff`. Returns how many
    /// records were removed.
    fn prune_terminal(&self, cutoff: DateTime<Utc>) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn not_found() -> AppError {
    AppError::NotFound("Task not found".to_string())
}

#[derive(Default)]
pub struct InMemoryTaskRegistry {
    tasks: DashMap<TaskId, Task>,
}

impl InMemoryTaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskRegistry for InMemoryTaskRegistry {
    fn create(&self, fields: NewTask) -> TaskId {
        loop {
            let id = TaskId::new();
            if let Entry::Vacant(slot) = self.tasks.entry(id) {
                slot.insert(Task::new(id, fields));
                tracing::debug!(task_id = %id, "task registered");
                return id;
            }
        }
    }

    fn get(&self, id: &TaskId) -> AppResult<Task> {
        self.tasks
            .get(id)
            .map(|task| task.value().clone())
            .ok_or_else(not_found)
    }

    fn update(&self, id: &TaskId, mutator: &mut dyn FnMut(&mut Task)) -> AppResult<Task> {
        let mut task = self.tasks.get_mut(id).ok_or_else(not_found)?;
        mutator(task.value_mut());
        Ok(task.value().clone())
    }

    fn prune_terminal(&self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.tasks.retain(|_, task| {
            let expired = task.status().is_terminal() && task.updated_at() < cutoff;
            if expired {
                removed += 1;
            }
            !expired
        });
        removed
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }
}
