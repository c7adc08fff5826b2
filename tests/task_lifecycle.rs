//! Task lifecycle through the service layer: transitions, the completion
//! guard and checklist step evidence.

mod common;

use common::{checklist, safety_template, step, TestContext};
use fleetops_core::constants::TaskStatus;
use fleetops_core::models::TaskWithChecklists;
use fleetops_core::state_machine::TaskEvent;
use fleetops_core::tasks::StepCompletion;
use fleetops_core::templates::InstantiateOptions;
use fleetops_core::FleetError;
use sqlx::PgPool;
use uuid::Uuid;

async fn instance_with_evidence_steps(ctx: &TestContext) -> TaskWithChecklists {
    let mut definition = safety_template("Evidence service");
    let mut photo = step("Photograph coin box");
    photo.requires_photo = true;
    let mut note = step("Record meter reading");
    note.requires_note = true;
    let mut optional = step("Polish glass");
    optional.is_required = false;
    let mut evidence = checklist("Evidence", &[]);
    evidence.steps = vec![photo, note, optional];
    definition.checklists.push(evidence);

    let template = ctx
        .state
        .templates
        .create(definition, None)
        .await
        .expect("Failed to create test TaskTemplate");
    ctx.state
        .templates
        .instantiate(template.template.id, InstantiateOptions::default(), None)
        .await
        .expect("Failed to instantiate test TaskTemplate")
}

#[sqlx::test]
async fn test_full_lifecycle_records_history(
    pool: PgPool,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new(pool);
    let instance = instance_with_evidence_steps(&ctx).await;
    let task_id = instance.task.id;
    let technician = Uuid::new_v4();

    let assigned = ctx
        .state
        .tasks
        .transition(task_id, TaskEvent::Assign { assignee_id: technician }, Some(technician))
        .await?;
    assert_eq!(assigned.status, TaskStatus::Assigned);
    assert_eq!(assigned.assigned_to, Some(technician));

    ctx.state
        .tasks
        .transition(task_id, TaskEvent::Start, Some(technician))
        .await?;

    // Required steps are still open
    let err = ctx
        .state
        .tasks
        .transition(task_id, TaskEvent::Complete, Some(technician))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");
    assert_eq!(
        ctx.state.tasks.get(task_id).await?.task.status,
        TaskStatus::InProgress
    );

    for checklist in &instance.checklists {
        for step in checklist.steps.iter().filter(|s| s.is_required) {
            ctx.state
                .tasks
                .complete_step(
                    task_id,
                    step.id,
                    StepCompletion {
                        note: Some("reading 04512".to_string()),
                        photo_ref: Some("photos/coin-box.jpg".to_string()),
                    },
                    Some(technician),
                )
                .await?;
        }
    }

    let completed = ctx
        .state
        .tasks
        .transition(task_id, TaskEvent::Complete, Some(technician))
        .await?;
    assert_eq!(completed.status, TaskStatus::Completed);
    assert_eq!(completed.completed_at, Some(common::base_time()));

    let history = ctx.state.tasks.history(task_id).await?;
    let events: Vec<_> = history.iter().map(|t| t.event.as_str()).collect();
    assert_eq!(events, ["create", "assign", "start", "complete"]);
    assert!(history[1..].iter().all(|t| t.actor_id == Some(technician)));
    Ok(())
}

#[sqlx::test]
async fn test_step_evidence_is_enforced(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new(pool);
    let instance = instance_with_evidence_steps(&ctx).await;
    let task_id = instance.task.id;
    let evidence = &instance.checklists[1];
    let (photo, note) = (&evidence.steps[0], &evidence.steps[1]);

    let err = ctx
        .state
        .tasks
        .complete_step(task_id, photo.id, StepCompletion::default(), None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");

    let err = ctx
        .state
        .tasks
        .complete_step(
            task_id,
            note.id,
            StepCompletion {
                note: Some("   ".to_string()),
                photo_ref: None,
            },
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");

    let technician = Uuid::new_v4();
    let done = ctx
        .state
        .tasks
        .complete_step(
            task_id,
            photo.id,
            StepCompletion {
                note: None,
                photo_ref: Some("photos/coin-box.jpg".to_string()),
            },
            Some(technician),
        )
        .await?;
    assert!(done.is_completed);
    assert_eq!(done.completed_by, Some(technician));
    assert_eq!(done.completed_at, Some(common::base_time()));
    assert_eq!(done.photo_ref.as_deref(), Some("photos/coin-box.jpg"));

    let reloaded = ctx.state.tasks.get(task_id).await?;
    assert!(reloaded.checklists[1].steps[0].is_completed);
    assert!(!reloaded.checklists[1].steps[1].is_completed);

    // A step id from another task is not found under this one
    let other = instance_with_evidence_steps(&ctx).await;
    let err = ctx
        .state
        .tasks
        .complete_step(task_id, other.checklists[0].steps[0].id, StepCompletion::default(), None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND");
    Ok(())
}

#[sqlx::test]
async fn test_invalid_and_system_only_events(
    pool: PgPool,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new(pool);
    let instance = instance_with_evidence_steps(&ctx).await;
    let task_id = instance.task.id;

    let err = ctx
        .state
        .tasks
        .transition(task_id, TaskEvent::Start, None)
        .await
        .unwrap_err();
    assert!(matches!(
        &err,
        FleetError::InvalidTransition { from, event } if from == "created" && event == "start"
    ));

    let err = ctx
        .state
        .tasks
        .transition(task_id, TaskEvent::Archive, None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");

    let cancelled = ctx
        .state
        .tasks
        .transition(task_id, TaskEvent::Cancel, None)
        .await?;
    assert_eq!(cancelled.status, TaskStatus::Cancelled);

    // Terminal: no further transitions and no step changes
    let err = ctx
        .state
        .tasks
        .transition(task_id, TaskEvent::Assign { assignee_id: Uuid::new_v4() }, None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_TRANSITION");

    let err = ctx
        .state
        .tasks
        .complete_step(
            task_id,
            instance.checklists[0].steps[0].id,
            StepCompletion::default(),
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "CONFLICT");

    let err = ctx.state.tasks.get(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND");
    Ok(())
}
