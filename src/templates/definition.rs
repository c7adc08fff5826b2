//! Request shapes for authoring templates and creating tasks, with validation.
//!
//! Checklist and step order is never taken from the payload: it is the position
//! of the entry in its list, so orders are always `0..n-1`.

use crate::constants::{StepType, TaskPriority, TaskType};
use crate::error::{FleetError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTaskTemplate {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub default_priority: TaskPriority,
    pub estimated_duration_minutes: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub checklists: Vec<ChecklistDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistDefinition {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_required: bool,
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub step_type: StepType,
    #[serde(default = "default_true")]
    pub is_required: bool,
    #[serde(default)]
    pub requires_photo: bool,
    #[serde(default)]
    pub requires_note: bool,
    pub validation_rules: Option<serde_json::Value>,
}

/// Partial update. `checklists`, when present, replaces the whole tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub task_type: Option<TaskType>,
    pub default_priority: Option<TaskPriority>,
    pub estimated_duration_minutes: Option<i32>,
    pub is_active: Option<bool>,
    pub checklists: Option<Vec<ChecklistDefinition>>,
}

/// Caller overrides merged over template defaults at instantiation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantiateOptions {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Uuid>,
    pub machine_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
    /// Set by the scheduler only
    #[serde(skip)]
    pub recurrence_scope: Option<String>,
}

/// A task created without a template (simple recurring work).
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub task_type: TaskType,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub machine_id: Option<Uuid>,
    pub recurrence_scope: Option<String>,
}

pub fn validate_name(field: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(FleetError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

pub fn validate_duration(minutes: i32) -> Result<()> {
    if minutes <= 0 {
        return Err(FleetError::validation(format!(
            "estimatedDurationMinutes must be positive, got {minutes}"
        )));
    }
    Ok(())
}

pub fn validate_checklists(checklists: &[ChecklistDefinition]) -> Result<()> {
    for (i, checklist) in checklists.iter().enumerate() {
        validate_name(&format!("checklists[{i}].name"), &checklist.name)?;
        for (j, step) in checklist.steps.iter().enumerate() {
            validate_name(&format!("checklists[{i}].steps[{j}].name"), &step.name)?;
        }
    }
    Ok(())
}

impl NewTaskTemplate {
    pub fn validate(&self) -> Result<()> {
        validate_name("name", &self.name)?;
        validate_duration(self.estimated_duration_minutes)?;
        validate_checklists(&self.checklists)
    }
}

impl TemplateUpdate {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            validate_name("name", name)?;
        }
        if let Some(minutes) = self.estimated_duration_minutes {
            validate_duration(minutes)?;
        }
        if let Some(checklists) = &self.checklists {
            validate_checklists(checklists)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_defaults() {
        let template: NewTaskTemplate = serde_json::from_str(
            r#"{
                "name": "Safety round",
                "type": "maintenance",
                "estimatedDurationMinutes": 30,
                "checklists": [
                    {"name": "Safety", "order": 7, "steps": [{"name": "Check door"}]}
                ]
            }"#,
        )
        .unwrap();

        assert!(template.is_active);
        assert_eq!(template.default_priority, TaskPriority::Medium);
        assert!(template.checklists[0].is_required);
        let step = &template.checklists[0].steps[0];
        assert_eq!(step.step_type, StepType::Check);
        assert!(step.is_required);
        assert!(!step.requires_photo);
        template.validate().unwrap();
    }

    #[test]
    fn test_validation_rejects_blank_names_and_bad_duration() {
        let mut template = NewTaskTemplate {
            name: "  ".to_string(),
            description: None,
            task_type: TaskType::Cleaning,
            default_priority: TaskPriority::Low,
            estimated_duration_minutes: 10,
            is_active: true,
            checklists: vec![],
        };
        assert_eq!(template.validate().unwrap_err().error_code(), "VALIDATION_ERROR");

        template.name = "Clean".to_string();
        template.estimated_duration_minutes = 0;
        assert!(template.validate().is_err());

        let update = TemplateUpdate {
            checklists: Some(vec![ChecklistDefinition {
                name: "Outside".to_string(),
                description: None,
                is_required: true,
                steps: vec![StepDefinition {
                    name: String::new(),
                    description: None,
                    step_type: StepType::Photo,
                    is_required: true,
                    requires_photo: true,
                    requires_note: false,
                    validation_rules: None,
                }],
            }]),
            ..Default::default()
        };
        let err = update.validate().unwrap_err();
        assert!(err.to_string().contains("checklists[0].steps[0].name"));
    }
}
