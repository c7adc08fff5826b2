//! # Task Operations
//!
//! Read access to task trees and the technician-facing mutations: lifecycle
//! events and checklist step completion.

use crate::clock::Clock;
use crate::constants::entities;
use crate::error::{FleetError, Result};
use crate::models::{Task, TaskStep, TaskTransition, TaskWithChecklists};
use crate::state_machine::{TaskEvent, TaskStateMachine};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Completion payload for one checklist step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepCompletion {
    pub note: Option<String>,
    pub photo_ref: Option<String>,
}

#[derive(Clone)]
pub struct TaskService {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    state_machine: TaskStateMachine,
}

impl std::fmt::Debug for TaskService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskService")
            .field("pool", &"PgPool")
            .finish()
    }
}

impl TaskService {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        let state_machine = TaskStateMachine::new(pool.clone(), clock.clone());
        Self {
            pool,
            clock,
            state_machine,
        }
    }

    pub async fn get(&self, task_id: Uuid) -> Result<TaskWithChecklists> {
        let mut conn = self.pool.acquire().await?;
        let task = Task::find_by_id(&mut *conn, task_id)
            .await?
            .ok_or_else(|| FleetError::not_found(entities::TASK, task_id))?;
        Ok(Task::load_tree(&mut conn, task).await?)
    }

    pub async fn history(&self, task_id: Uuid) -> Result<Vec<TaskTransition>> {
        Ok(TaskTransition::list_for_task(&self.pool, task_id).await?)
    }

    /// Apply a user-issued lifecycle event. Archival belongs to the retention
    /// job and is refused here.
    pub async fn transition(
        &self,
        task_id: Uuid,
        event: TaskEvent,
        actor_id: Option<Uuid>,
    ) -> Result<Task> {
        if event.is_system_only() {
            return Err(FleetError::validation(format!(
                "event '{}' is issued by the retention job only",
                event.event_type()
            )));
        }
        self.state_machine.transition(task_id, event, actor_id).await
    }

    /// Mark a step of a live task completed.
    ///
    /// Steps flagged `requiresNote`/`requiresPhoto` need the matching field.
    pub async fn complete_step(
        &self,
        task_id: Uuid,
        step_id: Uuid,
        completion: StepCompletion,
        actor_id: Option<Uuid>,
    ) -> Result<TaskStep> {
        let mut tx = self.pool.begin().await?;
        let task = Task::lock_for_update(&mut tx, task_id)
            .await?
            .ok_or_else(|| FleetError::not_found(entities::TASK, task_id))?;
        if task.status.is_terminal() {
            return Err(FleetError::Conflict(format!(
                "task {task_id} is {} and can no longer change",
                task.status
            )));
        }

        let mut step = TaskStep::lock_for_task(&mut tx, task_id, step_id)
            .await?
            .ok_or_else(|| FleetError::not_found(entities::TASK_STEP, step_id))?;

        let note = completion.note.filter(|n| !n.trim().is_empty());
        let photo_ref = completion.photo_ref.filter(|p| !p.trim().is_empty());
        if step.requires_note && note.is_none() {
            return Err(FleetError::validation(format!("step '{}' requires a note", step.name)));
        }
        if step.requires_photo && photo_ref.is_none() {
            return Err(FleetError::validation(format!("step '{}' requires a photo", step.name)));
        }

        step.is_completed = true;
        step.completed_at = Some(self.clock.now());
        step.completed_by = actor_id;
        step.note = note;
        step.photo_ref = photo_ref;
        TaskStep::save_completion(&mut *tx, &step).await?;
        tx.commit().await?;

        info!(task_id = %task_id, step_id = %step_id, "Checklist step completed");
        Ok(step)
    }
}
