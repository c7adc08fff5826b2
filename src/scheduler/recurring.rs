use super::policy::{PolicyScope, RecurringPolicy};
use crate::constants::entities;
use crate::error::{FleetError, Result};
use crate::logging::{log_error, log_scheduler_unit};
use crate::models::{Machine, Task, TaskTemplate};
use crate::templates::{InstantiateOptions, NewTask, TemplateEngine};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

const JOB: &str = "task_generation";

/// What happened to one (policy, scope) unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    Created(Uuid),
    /// A live instance already exists
    AlreadyLive(Uuid),
    /// A concurrent run inserted the instance first
    Raced,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerRunReport {
    pub machines: usize,
    pub units: usize,
    pub created: usize,
    pub already_live: usize,
    pub raced: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub stopped_early: bool,
}

/// Generates recurring work for active machines and the warehouse.
///
/// A unit is one policy for one scope. Units are independent: a failure or
/// timeout in one is logged with its context and the run moves on.
#[derive(Clone)]
pub struct Scheduler {
    pool: PgPool,
    engine: TemplateEngine,
    policies: Vec<RecurringPolicy>,
    unit_timeout: Duration,
    shutdown: Option<watch::Receiver<bool>>,
}

crate::debug_with_pgpool!(Scheduler {
    pool: PgPool,
    engine,
    policies,
    unit_timeout
});

impl Scheduler {
    pub fn new(
        pool: PgPool,
        engine: TemplateEngine,
        policies: Vec<RecurringPolicy>,
        unit_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            engine,
            policies,
            unit_timeout,
            shutdown: None,
        }
    }

    /// Stop picking up new units once `shutdown` flips to true.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn shutting_down(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// One full generation pass at `now`.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SchedulerRunReport> {
        let mut report = SchedulerRunReport::default();

        let machines = match Machine::list_active(&self.pool).await {
            Ok(machines) => machines,
            Err(err) => {
                log_error(JOB, "list_active_machines", &err.to_string(), None);
                report.failed += 1;
                Vec::new()
            }
        };
        report.machines = machines.len();

        let mut units: Vec<(&RecurringPolicy, Option<&Machine>)> = Vec::new();
        for machine in &machines {
            for policy in self.policies.iter().filter(|p| p.scope == PolicyScope::Machine) {
                units.push((policy, Some(machine)));
            }
        }
        for policy in self.policies.iter().filter(|p| p.scope == PolicyScope::Warehouse) {
            units.push((policy, None));
        }

        for (policy, machine) in units {
            if self.shutting_down() {
                info!(remaining_from = %policy.task_type, "Shutdown requested, stopping generation run");
                report.stopped_early = true;
                break;
            }
            report.units += 1;

            let scope = policy.scope_key(machine);
            let task_type = policy.task_type.as_str();
            match tokio::time::timeout(self.unit_timeout, self.generate(policy, machine, now)).await
            {
                Ok(Ok(UnitOutcome::Created(task_id))) => {
                    report.created += 1;
                    log_scheduler_unit(JOB, &scope, Some(task_type), "created");
                    tracing::debug!(task_id = %task_id, "Recurring task created");
                }
                Ok(Ok(UnitOutcome::AlreadyLive(_))) => {
                    report.already_live += 1;
                    log_scheduler_unit(JOB, &scope, Some(task_type), "already_live");
                }
                Ok(Ok(UnitOutcome::Raced)) => {
                    report.raced += 1;
                    log_scheduler_unit(JOB, &scope, Some(task_type), "already_scheduled");
                }
                Ok(Err(err)) => {
                    report.failed += 1;
                    log_error(
                        JOB,
                        "generate",
                        &err.to_string(),
                        Some(&format!(
                            "scope={scope} task_type={task_type} machine={}",
                            machine.map(|m| m.code.as_str()).unwrap_or("-")
                        )),
                    );
                }
                Err(_) => {
                    report.timed_out += 1;
                    log_error(
                        JOB,
                        "generate",
                        &FleetError::Timeout {
                            operation: format!("generate {task_type}"),
                            timeout_ms: self.unit_timeout.as_millis() as u64,
                        }
                        .to_string(),
                        Some(&format!("scope={scope} task_type={task_type}")),
                    );
                }
            }
        }

        info!(
            machines = report.machines,
            created = report.created,
            already_live = report.already_live,
            raced = report.raced,
            failed = report.failed,
            timed_out = report.timed_out,
            stopped_early = report.stopped_early,
            "Task generation run finished"
        );
        Ok(report)
    }

    /// Create the policy's task for one scope unless a live one exists.
    ///
    /// The partial unique index settles races between concurrent runs; losing
    /// the race is reported as [`UnitOutcome::Raced`], not as an error.
    pub async fn generate(
        &self,
        policy: &RecurringPolicy,
        machine: Option<&Machine>,
        now: DateTime<Utc>,
    ) -> Result<UnitOutcome> {
        let scope = policy.scope_key(machine);

        if let Some(existing) =
            Task::find_live_recurring(&self.pool, policy.task_type, &scope).await?
        {
            if existing.due_date.is_some_and(|due| due < now) {
                warn!(
                    task_id = %existing.id,
                    task_type = %policy.task_type,
                    scope = %scope,
                    "Live recurring task is overdue; not generating another"
                );
            }
            return Ok(UnitOutcome::AlreadyLive(existing.id));
        }

        let due_date = policy.due_date(now).ok_or_else(|| {
            FleetError::validation(format!("due date overflow for {}", policy.task_type))
        })?;
        let machine_id = machine.map(|m| m.id);

        let created = match &policy.template {
            Some(template_name) => {
                let template = TaskTemplate::find_active_by_name(&self.pool, template_name)
                    .await?
                    .ok_or_else(|| {
                        FleetError::not_found(entities::TASK_TEMPLATE, template_name)
                    })?;
                // The instance takes the template's type; dedup keys on the policy's
                if template.task_type != policy.task_type {
                    return Err(FleetError::validation(format!(
                        "template '{template_name}' is {} but the policy generates {}",
                        template.task_type, policy.task_type
                    )));
                }
                self.engine
                    .instantiate(
                        template.id,
                        InstantiateOptions {
                            title: Some(policy.task_title(machine)),
                            priority: Some(policy.priority),
                            machine_id,
                            due_date: Some(due_date),
                            recurrence_scope: Some(scope.clone()),
                            ..Default::default()
                        },
                        None,
                    )
                    .await
                    .map(|created| created.task.id)
            }
            None => self
                .engine
                .create_task(
                    NewTask {
                        title: policy.task_title(machine),
                        description: None,
                        task_type: policy.task_type,
                        priority: policy.priority,
                        due_date: Some(due_date),
                        machine_id,
                        recurrence_scope: Some(scope.clone()),
                    },
                    None,
                )
                .await
                .map(|task| task.id),
        };

        match created {
            Ok(task_id) => Ok(UnitOutcome::Created(task_id)),
            Err(FleetError::DuplicateRecurringTask { .. }) => Ok(UnitOutcome::Raced),
            Err(err) => Err(err),
        }
    }
}
