use crate::error::{FleetError, Result};
use crate::models::{Task, TaskStep};
use async_trait::async_trait;
use sqlx::PgConnection;

/// Trait for implementing state transition guards
#[async_trait]
pub trait StateGuard<T: Sync> {
    /// Reject the transition with an error, or let it through.
    async fn check(&self, entity: &T, conn: &mut PgConnection) -> Result<()>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// A task can only be completed once every required step is done.
pub struct RequiredStepsCompleteGuard;

#[async_trait]
impl StateGuard<Task> for RequiredStepsCompleteGuard {
    async fn check(&self, task: &Task, conn: &mut PgConnection) -> Result<()> {
        let open = TaskStep::count_open_required(&mut *conn, task.id).await?;
        if open > 0 {
            return Err(FleetError::validation(format!(
                "Task {} has {open} required steps still open",
                task.id
            )));
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "All required checklist steps must be completed"
    }
}
