use super::definition::{InstantiateOptions, NewTask, NewTaskTemplate, TemplateUpdate};
use super::mapping;
use crate::clock::Clock;
use crate::constants::{entities, TaskStatus};
use crate::database::error_codes::{database_error_details, PgErrorCode};
use crate::database::with_transient_retry;
use crate::error::{FleetError, Result};
use crate::events::{AuditEvent, Auditor, EventPublisher, FleetEvent};
use crate::logging::log_task_operation;
use crate::models::{
    Machine, PageRequest, Paginated, Task, TaskChecklist, TaskChecklistWithSteps, TaskStep,
    TaskTemplate, TaskTemplateWithChecklists, TaskTransition, TaskWithChecklists,
    TemplateChecklist, TemplateChecklistWithSteps, TemplateFilter, TemplateStats, TemplateStep,
};
use crate::state_machine::{TaskEvent, TaskStateMachine};
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Authoring and instantiation of task templates.
///
/// Each operation runs in a single transaction acquired from the pool. Audit
/// events and task-created notifications are emitted only after commit.
#[derive(Clone)]
pub struct TemplateEngine {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    auditor: Auditor,
    events: EventPublisher,
    retry_backoff: Duration,
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("pool", &"PgPool")
            .field("retry_backoff", &self.retry_backoff)
            .finish()
    }
}

impl TemplateEngine {
    pub fn new(
        pool: PgPool,
        clock: Arc<dyn Clock>,
        auditor: Auditor,
        events: EventPublisher,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            pool,
            clock,
            auditor,
            events,
            retry_backoff,
        }
    }

    pub async fn create(
        &self,
        new_template: NewTaskTemplate,
        actor_id: Option<Uuid>,
    ) -> Result<TaskTemplateWithChecklists> {
        new_template.validate()?;

        let created = with_transient_retry("template.create", self.retry_backoff, || {
            self.create_once(&new_template, actor_id)
        })
        .await?;

        info!(
            template_id = %created.template.id,
            name = %created.template.name,
            checklists = created.checklists.len(),
            "Task template created"
        );
        self.audit(actor_id, "template.create", created.template.id, json!({
            "name": created.template.name,
            "version": created.template.version,
        }))
        .await;

        Ok(created)
    }

    async fn create_once(
        &self,
        new_template: &NewTaskTemplate,
        actor_id: Option<Uuid>,
    ) -> Result<TaskTemplateWithChecklists> {
        let now = self.clock.now();
        let template = TaskTemplate {
            id: Uuid::new_v4(),
            name: new_template.name.trim().to_string(),
            description: new_template.description.clone(),
            task_type: new_template.task_type,
            default_priority: new_template.default_priority,
            estimated_duration_minutes: new_template.estimated_duration_minutes,
            is_active: new_template.is_active,
            version: 1,
            created_by: actor_id,
            created_at: now,
            updated_at: now,
        };
        let tree = mapping::template_tree(template.id, &new_template.checklists);

        let mut tx = self.pool.begin().await?;
        TaskTemplate::insert(&mut *tx, &template).await?;
        insert_template_tree(&mut tx, &tree).await?;
        tx.commit().await?;

        Ok(TaskTemplateWithChecklists {
            template,
            checklists: tree,
        })
    }

    /// Apply a partial update. A `checklists` payload replaces the whole tree
    /// (delete then recreate) and bumps the template version.
    pub async fn update(
        &self,
        id: Uuid,
        update: TemplateUpdate,
        actor_id: Option<Uuid>,
    ) -> Result<TaskTemplateWithChecklists> {
        update.validate()?;

        let updated = with_transient_retry("template.update", self.retry_backoff, || {
            self.update_once(id, &update)
        })
        .await?;

        info!(
            template_id = %id,
            version = updated.template.version,
            replaced_checklists = update.checklists.is_some(),
            "Task template updated"
        );
        self.audit(actor_id, "template.update", id, json!({
            "version": updated.template.version,
            "replacedChecklists": update.checklists.is_some(),
        }))
        .await;

        Ok(updated)
    }

    async fn update_once(&self, id: Uuid, update: &TemplateUpdate) -> Result<TaskTemplateWithChecklists> {
        let mut tx = self.pool.begin().await?;
        let mut template = TaskTemplate::lock_for_update(&mut tx, id)
            .await?
            .ok_or_else(|| FleetError::not_found(entities::TASK_TEMPLATE, id))?;

        if let Some(name) = &update.name {
            template.name = name.trim().to_string();
        }
        if let Some(description) = &update.description {
            template.description = Some(description.clone());
        }
        if let Some(task_type) = update.task_type {
            template.task_type = task_type;
        }
        if let Some(priority) = update.default_priority {
            template.default_priority = priority;
        }
        if let Some(minutes) = update.estimated_duration_minutes {
            template.estimated_duration_minutes = minutes;
        }
        if let Some(is_active) = update.is_active {
            template.is_active = is_active;
        }
        if let Some(checklists) = &update.checklists {
            TemplateChecklist::delete_for_template(&mut *tx, id).await?;
            let tree = mapping::template_tree(id, checklists);
            insert_template_tree(&mut tx, &tree).await?;
            template.version += 1;
        }
        template.updated_at = self.clock.now();
        TaskTemplate::update(&mut *tx, &template).await?;

        let updated = TaskTemplate::load_tree(&mut tx, template).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Clone a template's structure (not its tasks) under a new name.
    pub async fn duplicate(
        &self,
        id: Uuid,
        new_name: String,
        actor_id: Option<Uuid>,
    ) -> Result<TaskTemplateWithChecklists> {
        super::definition::validate_name("name", &new_name)?;

        let copy = with_transient_retry("template.duplicate", self.retry_backoff, || {
            self.duplicate_once(id, &new_name, actor_id)
        })
        .await?;

        info!(source_id = %id, template_id = %copy.template.id, "Task template duplicated");
        self.audit(actor_id, "template.duplicate", copy.template.id, json!({
            "sourceId": id,
            "name": copy.template.name,
        }))
        .await;

        Ok(copy)
    }

    async fn duplicate_once(
        &self,
        id: Uuid,
        new_name: &str,
        actor_id: Option<Uuid>,
    ) -> Result<TaskTemplateWithChecklists> {
        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;
        let source = TaskTemplate::lock_for_share(&mut tx, id)
            .await?
            .ok_or_else(|| FleetError::not_found(entities::TASK_TEMPLATE, id))?;
        let source = TaskTemplate::load_tree(&mut tx, source).await?;

        let template = TaskTemplate {
            id: Uuid::new_v4(),
            name: new_name.trim().to_string(),
            description: source.template.description.clone(),
            task_type: source.template.task_type,
            default_priority: source.template.default_priority,
            estimated_duration_minutes: source.template.estimated_duration_minutes,
            is_active: true,
            version: 1,
            created_by: actor_id,
            created_at: now,
            updated_at: now,
        };
        let tree = mapping::duplicate_tree(template.id, &source.checklists);

        TaskTemplate::insert(&mut *tx, &template).await?;
        insert_template_tree(&mut tx, &tree).await?;
        tx.commit().await?;

        Ok(TaskTemplateWithChecklists {
            template,
            checklists: tree,
        })
    }

    pub async fn toggle_active(&self, id: Uuid, actor_id: Option<Uuid>) -> Result<TaskTemplate> {
        let template = with_transient_retry("template.toggle", self.retry_backoff, || async {
            let mut tx = self.pool.begin().await?;
            let mut template = TaskTemplate::lock_for_update(&mut tx, id)
                .await?
                .ok_or_else(|| FleetError::not_found(entities::TASK_TEMPLATE, id))?;
            template.is_active = !template.is_active;
            template.updated_at = self.clock.now();
            TaskTemplate::update(&mut *tx, &template).await?;
            tx.commit().await?;
            Ok::<_, FleetError>(template)
        })
        .await?;

        info!(template_id = %id, is_active = template.is_active, "Task template toggled");
        self.audit(actor_id, "template.toggle", id, json!({ "isActive": template.is_active }))
            .await;

        Ok(template)
    }

    /// Delete a template nobody references. Tasks keep their own copies, but
    /// a referenced template stays for traceability.
    pub async fn delete(&self, id: Uuid, actor_id: Option<Uuid>) -> Result<()> {
        with_transient_retry("template.delete", self.retry_backoff, || async {
            let mut tx = self.pool.begin().await?;
            TaskTemplate::lock_for_update(&mut tx, id)
                .await?
                .ok_or_else(|| FleetError::not_found(entities::TASK_TEMPLATE, id))?;

            let referencing = TaskTemplate::count_referencing_tasks(&mut *tx, id).await?;
            if referencing > 0 {
                return Err(FleetError::Conflict(format!(
                    "task template {id} is referenced by {referencing} tasks"
                )));
            }

            TaskTemplate::delete(&mut *tx, id)
                .await
                .map_err(|err| referenced_template_conflict(id, err))?;
            tx.commit().await?;
            Ok::<_, FleetError>(())
        })
        .await?;

        info!(template_id = %id, "Task template deleted");
        self.audit(actor_id, "template.delete", id, json!({})).await;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<TaskTemplateWithChecklists> {
        let mut conn = self.pool.acquire().await?;
        let template = TaskTemplate::find_by_id(&mut *conn, id)
            .await?
            .ok_or_else(|| FleetError::not_found(entities::TASK_TEMPLATE, id))?;
        Ok(TaskTemplate::load_tree(&mut conn, template).await?)
    }

    pub async fn list(
        &self,
        filter: &TemplateFilter,
        page: PageRequest,
    ) -> Result<Paginated<TaskTemplate>> {
        let mut conn = self.pool.acquire().await?;
        let (templates, total) = TaskTemplate::list(&mut conn, filter, page).await?;
        Ok(Paginated::new(templates, page, total))
    }

    pub async fn stats(&self) -> Result<TemplateStats> {
        let mut conn = self.pool.acquire().await?;
        Ok(TaskTemplate::stats(&mut conn).await?)
    }

    /// Stamp out a task from a template.
    ///
    /// The task receives a private deep copy of the checklist tree. Overrides
    /// win over template defaults, except the estimated duration which always
    /// comes from the template. With an assignee the task starts `assigned`.
    pub async fn instantiate(
        &self,
        template_id: Uuid,
        options: InstantiateOptions,
        actor_id: Option<Uuid>,
    ) -> Result<TaskWithChecklists> {
        if let Some(title) = &options.title {
            super::definition::validate_name("title", title)?;
        }

        let created = with_transient_retry("template.instantiate", self.retry_backoff, || {
            self.instantiate_once(template_id, &options, actor_id)
        })
        .await?;

        self.announce(&created.task, actor_id, "template.instantiate").await;
        Ok(created)
    }

    async fn instantiate_once(
        &self,
        template_id: Uuid,
        options: &InstantiateOptions,
        actor_id: Option<Uuid>,
    ) -> Result<TaskWithChecklists> {
        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;

        let template = TaskTemplate::lock_for_share(&mut tx, template_id)
            .await?
            .ok_or_else(|| FleetError::not_found(entities::TASK_TEMPLATE, template_id))?;
        if !template.is_active {
            return Err(FleetError::InactiveTemplate(template_id));
        }
        if let Some(machine_id) = options.machine_id {
            ensure_machine_exists(&mut tx, machine_id).await?;
        }
        let template = TaskTemplate::load_tree(&mut tx, template).await?;

        let task = Task {
            id: Uuid::new_v4(),
            title: options
                .title
                .clone()
                .unwrap_or_else(|| template.template.name.clone()),
            description: options
                .description
                .clone()
                .or_else(|| template.template.description.clone()),
            task_type: template.template.task_type,
            status: TaskStatus::Created,
            priority: options.priority.unwrap_or(template.template.default_priority),
            due_date: options.due_date,
            template_id: Some(template_id),
            machine_id: options.machine_id,
            assigned_to: None,
            created_by: actor_id,
            recurrence_scope: options.recurrence_scope.clone(),
            estimated_duration_minutes: Some(template.template.estimated_duration_minutes),
            created_at: now,
            updated_at: now,
            completed_at: None,
            archived_at: None,
        };
        let tree = mapping::instance_tree(task.id, &template.checklists);

        let created =
            persist_new_task(&mut tx, task, tree, options.assignee_id, actor_id, now).await?;
        tx.commit().await?;
        Ok(created)
    }

    /// Create a task without a template (simple recurring work).
    pub async fn create_task(&self, new_task: NewTask, actor_id: Option<Uuid>) -> Result<Task> {
        super::definition::validate_name("title", &new_task.title)?;

        let created = with_transient_retry("task.create", self.retry_backoff, || async {
            let now = self.clock.now();
            let mut tx = self.pool.begin().await?;
            if let Some(machine_id) = new_task.machine_id {
                ensure_machine_exists(&mut tx, machine_id).await?;
            }
            let task = Task {
                id: Uuid::new_v4(),
                title: new_task.title.clone(),
                description: new_task.description.clone(),
                task_type: new_task.task_type,
                status: TaskStatus::Created,
                priority: new_task.priority,
                due_date: new_task.due_date,
                template_id: None,
                machine_id: new_task.machine_id,
                assigned_to: None,
                created_by: actor_id,
                recurrence_scope: new_task.recurrence_scope.clone(),
                estimated_duration_minutes: None,
                created_at: now,
                updated_at: now,
                completed_at: None,
                archived_at: None,
            };
            let created = persist_new_task(&mut tx, task, Vec::new(), None, actor_id, now).await?;
            tx.commit().await?;
            Ok::<_, FleetError>(created)
        })
        .await?;

        self.announce(&created.task, actor_id, "task.create").await;
        Ok(created.task)
    }

    async fn announce(&self, task: &Task, actor_id: Option<Uuid>, action: &str) {
        log_task_operation(
            action,
            task.id,
            task.task_type.as_str(),
            task.status.as_str(),
            task.recurrence_scope.as_deref(),
        );
        self.events.publish(
            FleetEvent::TaskCreated {
                task_id: task.id,
                task_type: task.task_type.to_string(),
                machine_id: task.machine_id,
                template_id: task.template_id,
                due_date: task.due_date,
            },
            self.clock.now(),
        );
        self.auditor
            .record(AuditEvent::new(
                actor_id,
                action,
                entities::TASK,
                task.id,
                json!({
                    "templateId": task.template_id,
                    "machineId": task.machine_id,
                    "taskType": task.task_type,
                    "priority": task.priority,
                }),
            ))
            .await;
    }

    async fn audit(
        &self,
        actor_id: Option<Uuid>,
        action: &str,
        template_id: Uuid,
        metadata: serde_json::Value,
    ) {
        self.auditor
            .record(AuditEvent::new(
                actor_id,
                action,
                entities::TASK_TEMPLATE,
                template_id,
                metadata,
            ))
            .await;
    }
}

async fn insert_template_tree(
    conn: &mut PgConnection,
    tree: &[TemplateChecklistWithSteps],
) -> Result<()> {
    for entry in tree {
        TemplateChecklist::insert(&mut *conn, &entry.checklist).await?;
        for step in &entry.steps {
            TemplateStep::insert(&mut *conn, step).await?;
        }
    }
    Ok(())
}

async fn ensure_machine_exists(conn: &mut PgConnection, machine_id: Uuid) -> Result<()> {
    Machine::find_by_id(&mut *conn, machine_id)
        .await?
        .ok_or_else(|| FleetError::not_found(entities::MACHINE, machine_id))?;
    Ok(())
}

/// Insert a task row, its private checklist tree, the initial transition and,
/// with an assignee, the assignment transition.
async fn persist_new_task(
    conn: &mut PgConnection,
    mut task: Task,
    tree: Vec<TaskChecklistWithSteps>,
    assignee_id: Option<Uuid>,
    actor_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<TaskWithChecklists> {
    Task::insert(&mut *conn, &task).await?;
    for entry in &tree {
        TaskChecklist::insert(&mut *conn, &entry.checklist).await?;
        for step in &entry.steps {
            TaskStep::insert(&mut *conn, step).await?;
        }
    }

    TaskTransition::insert(
        &mut *conn,
        &TaskTransition {
            id: Uuid::new_v4(),
            task_id: task.id,
            from_status: None,
            to_status: TaskStatus::Created.to_string(),
            event: "create".to_string(),
            actor_id,
            created_at: now,
        },
    )
    .await?;

    if let Some(assignee_id) = assignee_id {
        TaskStateMachine::apply(
            &mut *conn,
            &mut task,
            &TaskEvent::Assign { assignee_id },
            actor_id,
            now,
        )
        .await?;
    }

    debug!(task_id = %task.id, checklists = tree.len(), "Task tree persisted");
    Ok(TaskWithChecklists {
        task,
        checklists: tree,
    })
}

fn referenced_template_conflict(id: Uuid, err: sqlx::Error) -> FleetError {
    match database_error_details(&err) {
        Some((code, _)) if PgErrorCode::is_foreign_key_violation(&code) => {
            FleetError::Conflict(format!("task template {id} is referenced by tasks"))
        }
        _ => err.into(),
    }
}
