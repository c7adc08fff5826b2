//! Template engine integration tests: authoring, instantiation and isolation
//! between templates and the tasks stamped from them.

mod common;

use common::{checklist, safety_template, MachineFactory, TestContext};
use fleetops_core::constants::{TaskPriority, TaskStatus, TaskType};
use fleetops_core::events::FleetEvent;
use fleetops_core::models::{PageRequest, TaskTemplate, TemplateFilter};
use fleetops_core::templates::{InstantiateOptions, TemplateUpdate};
use fleetops_core::FleetError;
use sqlx::PgPool;
use uuid::Uuid;

#[sqlx::test]
async fn test_instantiate_deep_copies_checklist_tree(
    pool: PgPool,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new(pool);
    let machine = MachineFactory::new().with_code("VM-001").create(&ctx.pool).await;
    let template = ctx
        .state
        .templates
        .create(safety_template("Monthly service"), None)
        .await?;

    let mut events = ctx.events.subscribe();
    let created = ctx
        .state
        .templates
        .instantiate(
            template.template.id,
            InstantiateOptions {
                machine_id: Some(machine.id),
                ..Default::default()
            },
            None,
        )
        .await?;

    assert_eq!(created.task.status, TaskStatus::Created);
    assert_eq!(created.task.title, "Monthly service");
    assert_eq!(created.task.template_id, Some(template.template.id));
    assert_eq!(created.task.estimated_duration_minutes, Some(45));
    assert_eq!(created.task.created_at, common::base_time());
    assert_eq!(created.checklists.len(), 1);

    let safety = &created.checklists[0];
    assert_eq!(safety.checklist.name, "Safety");
    assert_eq!(safety.checklist.sort_order, 0);
    let names: Vec<_> = safety.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Check door", "Check voltage"]);
    assert_eq!(safety.steps[0].sort_order, 0);
    assert_eq!(safety.steps[1].sort_order, 1);
    assert!(safety.steps.iter().all(|s| !s.is_completed));

    // Fresh identities with back-references to the template rows
    let template_safety = &template.checklists[0];
    assert_ne!(safety.checklist.id, template_safety.checklist.id);
    assert_eq!(
        safety.checklist.template_checklist_id,
        Some(template_safety.checklist.id)
    );
    assert_eq!(
        safety.steps[0].template_step_id,
        Some(template_safety.steps[0].id)
    );

    let published = events.recv().await?;
    match published.event {
        FleetEvent::TaskCreated { task_id, machine_id, .. } => {
            assert_eq!(task_id, created.task.id);
            assert_eq!(machine_id, Some(machine.id));
        }
        other => panic!("unexpected event {other:?}"),
    }

    let history = ctx.state.tasks.history(created.task.id).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].to_status, "created");
    Ok(())
}

#[sqlx::test]
async fn test_template_edit_does_not_touch_existing_tasks(
    pool: PgPool,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new(pool);
    let template = ctx
        .state
        .templates
        .create(safety_template("Door service"), None)
        .await?;
    let task = ctx
        .state
        .templates
        .instantiate(template.template.id, InstantiateOptions::default(), None)
        .await?;

    let updated = ctx
        .state
        .templates
        .update(
            template.template.id,
            TemplateUpdate {
                checklists: Some(vec![
                    checklist("Safety", &["Check door", "Check voltage", "Check lock"]),
                    checklist("Hygiene", &["Wipe panel"]),
                ]),
                ..Default::default()
            },
            None,
        )
        .await?;
    assert_eq!(updated.template.version, 2);
    assert_eq!(updated.checklists.len(), 2);
    assert_eq!(updated.checklists[1].checklist.sort_order, 1);

    let reloaded = ctx.state.tasks.get(task.task.id).await?;
    assert_eq!(reloaded.checklists.len(), 1);
    assert_eq!(reloaded.checklists[0].steps.len(), 2);
    assert_eq!(reloaded.checklists, task.checklists);

    // New instances see the new tree
    let second = ctx
        .state
        .templates
        .instantiate(template.template.id, InstantiateOptions::default(), None)
        .await?;
    assert_eq!(second.checklists.len(), 2);
    assert_eq!(second.checklists[0].steps.len(), 3);
    Ok(())
}

#[sqlx::test]
async fn test_overrides_and_assignee(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new(pool);
    let template = ctx
        .state
        .templates
        .create(safety_template("Override service"), None)
        .await?;
    let technician = Uuid::new_v4();
    let due = common::base_time() + chrono::Duration::days(3);

    let created = ctx
        .state
        .templates
        .instantiate(
            template.template.id,
            InstantiateOptions {
                title: Some("Urgent door fix".to_string()),
                priority: Some(TaskPriority::Urgent),
                assignee_id: Some(technician),
                due_date: Some(due),
                ..Default::default()
            },
            None,
        )
        .await?;

    assert_eq!(created.task.title, "Urgent door fix");
    assert_eq!(created.task.priority, TaskPriority::Urgent);
    assert_eq!(created.task.status, TaskStatus::Assigned);
    assert_eq!(created.task.assigned_to, Some(technician));
    assert_eq!(created.task.due_date, Some(due));

    let history = ctx.state.tasks.history(created.task.id).await?;
    let events: Vec<_> = history.iter().map(|t| t.event.as_str()).collect();
    assert_eq!(events, ["create", "assign"]);
    Ok(())
}

#[sqlx::test]
async fn test_inactive_template_cannot_be_instantiated(
    pool: PgPool,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new(pool);
    let template = ctx
        .state
        .templates
        .create(safety_template("Retired service"), None)
        .await?;
    let toggled = ctx
        .state
        .templates
        .toggle_active(template.template.id, None)
        .await?;
    assert!(!toggled.is_active);

    let err = ctx
        .state
        .templates
        .instantiate(template.template.id, InstantiateOptions::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::InactiveTemplate(id) if id == template.template.id));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
        .fetch_one(&ctx.pool)
        .await?;
    assert_eq!(count, 0);
    Ok(())
}

#[sqlx::test]
async fn test_unknown_machine_rolls_back_instantiation(
    pool: PgPool,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new(pool);
    let template = ctx
        .state
        .templates
        .create(safety_template("Ghost machine service"), None)
        .await?;

    let err = ctx
        .state
        .templates
        .instantiate(
            template.template.id,
            InstantiateOptions {
                machine_id: Some(Uuid::new_v4()),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND");

    let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM task_checklists")
        .fetch_one(&ctx.pool)
        .await?;
    assert_eq!(orphans, 0);
    Ok(())
}

#[sqlx::test]
async fn test_referenced_template_cannot_be_deleted(
    pool: PgPool,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new(pool);
    let used = ctx
        .state
        .templates
        .create(safety_template("Used service"), None)
        .await?;
    let unused = ctx
        .state
        .templates
        .create(safety_template("Unused service"), None)
        .await?;
    ctx.state
        .templates
        .instantiate(used.template.id, InstantiateOptions::default(), None)
        .await?;

    let err = ctx.state.templates.delete(used.template.id, None).await.unwrap_err();
    assert_eq!(err.error_code(), "CONFLICT");
    assert!(ctx.state.templates.get(used.template.id).await.is_ok());

    ctx.state.templates.delete(unused.template.id, None).await?;
    let err = ctx.state.templates.get(unused.template.id).await.unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND");

    let steps: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM template_steps s JOIN template_checklists c ON c.id = s.checklist_id WHERE c.template_id = $1",
    )
    .bind(unused.template.id)
    .fetch_one(&ctx.pool)
    .await?;
    assert_eq!(steps, 0);
    Ok(())
}

#[sqlx::test]
async fn test_duplicate_copies_structure_with_new_ids(
    pool: PgPool,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new(pool);
    let source = ctx
        .state
        .templates
        .create(safety_template("Original"), None)
        .await?;
    ctx.state
        .templates
        .toggle_active(source.template.id, None)
        .await?;

    let copy = ctx
        .state
        .templates
        .duplicate(source.template.id, "Original (copy)".to_string(), None)
        .await?;

    assert_ne!(copy.template.id, source.template.id);
    assert_eq!(copy.template.name, "Original (copy)");
    assert!(copy.template.is_active);
    assert_eq!(copy.template.version, 1);
    assert_eq!(copy.checklists.len(), source.checklists.len());
    assert_ne!(copy.checklists[0].checklist.id, source.checklists[0].checklist.id);
    let names: Vec<_> = copy.checklists[0].steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Check door", "Check voltage"]);
    Ok(())
}

#[sqlx::test]
async fn test_list_filters_and_stats(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new(pool);
    let maintenance = ctx
        .state
        .templates
        .create(safety_template("Filter maintenance"), None)
        .await?;
    let mut cleaning = safety_template("Filter cleaning");
    cleaning.task_type = TaskType::Cleaning;
    cleaning.is_active = false;
    ctx.state.templates.create(cleaning, None).await?;
    ctx.state
        .templates
        .instantiate(maintenance.template.id, InstantiateOptions::default(), None)
        .await?;

    let active = ctx
        .state
        .templates
        .list(
            &TemplateFilter {
                is_active: Some(true),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await?;
    assert_eq!(active.pagination.total_count, 1);
    assert_eq!(active.items[0].id, maintenance.template.id);

    let by_name = ctx
        .state
        .templates
        .list(
            &TemplateFilter {
                name: Some("CLEAN".to_string()),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await?;
    assert_eq!(by_name.items.len(), 1);
    assert_eq!(by_name.items[0].task_type, TaskType::Cleaning);

    let stats = ctx.state.templates.stats().await?;
    assert_eq!(stats.total, 2);
    assert_eq!(stats.active, 1);
    assert_eq!(stats.inactive, 1);
    assert_eq!(stats.by_type.get("maintenance"), Some(&1));
    assert_eq!(stats.instantiated_tasks, 1);

    let found = TaskTemplate::find_active_by_name(&ctx.pool, "Filter maintenance").await?;
    assert_eq!(found.map(|t| t.id), Some(maintenance.template.id));
    Ok(())
}

#[sqlx::test]
async fn test_invalid_template_is_rejected(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new(pool);

    let mut blank = safety_template("   ");
    blank.name = "   ".to_string();
    let err = ctx.state.templates.create(blank, None).await.unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");

    let mut zero = safety_template("Zero minutes");
    zero.estimated_duration_minutes = 0;
    let err = ctx.state.templates.create(zero, None).await.unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");
    Ok(())
}
