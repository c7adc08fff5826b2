//! Explicit entity mappings for template authoring, duplication and
//! instantiation. Every mapping whitelists the copied fields and mints a new
//! identity; source ids survive only as `template_*_id` back-references on
//! task copies.

use super::definition::ChecklistDefinition;
use crate::models::{
    TaskChecklist, TaskChecklistWithSteps, TaskStep, TemplateChecklist,
    TemplateChecklistWithSteps, TemplateStep,
};
use uuid::Uuid;

fn ordinal(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}

/// Build a template tree from authoring payloads.
pub fn template_tree(
    template_id: Uuid,
    definitions: &[ChecklistDefinition],
) -> Vec<TemplateChecklistWithSteps> {
    definitions
        .iter()
        .enumerate()
        .map(|(i, definition)| {
            let checklist = TemplateChecklist {
                id: Uuid::new_v4(),
                template_id,
                name: definition.name.trim().to_string(),
                description: definition.description.clone(),
                is_required: definition.is_required,
                sort_order: ordinal(i),
            };
            let steps = definition
                .steps
                .iter()
                .enumerate()
                .map(|(j, step)| TemplateStep {
                    id: Uuid::new_v4(),
                    checklist_id: checklist.id,
                    name: step.name.trim().to_string(),
                    description: step.description.clone(),
                    sort_order: ordinal(j),
                    step_type: step.step_type,
                    is_required: step.is_required,
                    requires_photo: step.requires_photo,
                    requires_note: step.requires_note,
                    validation_rules: step.validation_rules.clone(),
                })
                .collect();
            TemplateChecklistWithSteps { checklist, steps }
        })
        .collect()
}

/// Copy a template's structure under a new template.
pub fn duplicate_tree(
    template_id: Uuid,
    source: &[TemplateChecklistWithSteps],
) -> Vec<TemplateChecklistWithSteps> {
    source
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let checklist = TemplateChecklist {
                id: Uuid::new_v4(),
                template_id,
                name: entry.checklist.name.clone(),
                description: entry.checklist.description.clone(),
                is_required: entry.checklist.is_required,
                sort_order: ordinal(i),
            };
            let steps = entry
                .steps
                .iter()
                .enumerate()
                .map(|(j, step)| TemplateStep {
                    id: Uuid::new_v4(),
                    checklist_id: checklist.id,
                    name: step.name.clone(),
                    description: step.description.clone(),
                    sort_order: ordinal(j),
                    step_type: step.step_type,
                    is_required: step.is_required,
                    requires_photo: step.requires_photo,
                    requires_note: step.requires_note,
                    validation_rules: step.validation_rules.clone(),
                })
                .collect();
            TemplateChecklistWithSteps { checklist, steps }
        })
        .collect()
}

pub fn instance_checklist(task_id: Uuid, source: &TemplateChecklist, order: usize) -> TaskChecklist {
    TaskChecklist {
        id: Uuid::new_v4(),
        task_id,
        template_checklist_id: Some(source.id),
        name: source.name.clone(),
        description: source.description.clone(),
        is_required: source.is_required,
        sort_order: ordinal(order),
    }
}

pub fn instance_step(checklist_id: Uuid, source: &TemplateStep, order: usize) -> TaskStep {
    TaskStep {
        id: Uuid::new_v4(),
        checklist_id,
        template_step_id: Some(source.id),
        name: source.name.clone(),
        description: source.description.clone(),
        sort_order: ordinal(order),
        step_type: source.step_type,
        is_required: source.is_required,
        requires_photo: source.requires_photo,
        requires_note: source.requires_note,
        validation_rules: source.validation_rules.clone(),
        is_completed: false,
        completed_at: None,
        completed_by: None,
        note: None,
        photo_ref: None,
    }
}

/// Deep-copy a template tree into a task's private tree.
pub fn instance_tree(
    task_id: Uuid,
    source: &[TemplateChecklistWithSteps],
) -> Vec<TaskChecklistWithSteps> {
    source
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let checklist = instance_checklist(task_id, &entry.checklist, i);
            let steps = entry
                .steps
                .iter()
                .enumerate()
                .map(|(j, step)| instance_step(checklist.id, step, j))
                .collect();
            TaskChecklistWithSteps { checklist, steps }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::StepType;
    use crate::templates::definition::StepDefinition;

    fn step(name: &str, requires_photo: bool) -> StepDefinition {
        StepDefinition {
            name: name.to_string(),
            description: None,
            step_type: if requires_photo { StepType::Photo } else { StepType::Check },
            is_required: true,
            requires_photo,
            requires_note: false,
            validation_rules: None,
        }
    }

    fn safety_definitions() -> Vec<ChecklistDefinition> {
        vec![
            ChecklistDefinition {
                name: "Safety".to_string(),
                description: Some("Before opening".to_string()),
                is_required: true,
                steps: vec![step("Check door", false), step("Check voltage", true)],
            },
            ChecklistDefinition {
                name: "Wrap up".to_string(),
                description: None,
                is_required: false,
                steps: vec![step("Photo of front", true)],
            },
        ]
    }

    #[test]
    fn test_orders_follow_payload_position() {
        let template_id = Uuid::new_v4();
        let tree = template_tree(template_id, &safety_definitions());

        let orders: Vec<i32> = tree.iter().map(|c| c.checklist.sort_order).collect();
        assert_eq!(orders, vec![0, 1]);
        let step_orders: Vec<i32> = tree[0].steps.iter().map(|s| s.sort_order).collect();
        assert_eq!(step_orders, vec![0, 1]);
        assert!(tree.iter().all(|c| c.checklist.template_id == template_id));
        assert!(tree[0].steps.iter().all(|s| s.checklist_id == tree[0].checklist.id));
    }

    #[test]
    fn test_instance_tree_mints_new_ids_and_keeps_back_references() {
        let tree = template_tree(Uuid::new_v4(), &safety_definitions());
        let task_id = Uuid::new_v4();
        let copy = instance_tree(task_id, &tree);

        assert_eq!(copy.len(), 2);
        for (source, instance) in tree.iter().zip(&copy) {
            assert_ne!(source.checklist.id, instance.checklist.id);
            assert_eq!(instance.checklist.template_checklist_id, Some(source.checklist.id));
            assert_eq!(instance.checklist.task_id, task_id);
            assert_eq!(instance.checklist.name, source.checklist.name);

            for (s, i) in source.steps.iter().zip(&instance.steps) {
                assert_ne!(s.id, i.id);
                assert_eq!(i.template_step_id, Some(s.id));
                assert_eq!(i.checklist_id, instance.checklist.id);
                assert_eq!(i.sort_order, s.sort_order);
                assert_eq!(i.requires_photo, s.requires_photo);
                assert!(!i.is_completed);
            }
        }
        assert_eq!(copy[0].steps[1].name, "Check voltage");
        assert!(copy[0].steps[1].requires_photo);
    }

    #[test]
    fn test_duplicate_tree_is_detached_from_source() {
        let source = template_tree(Uuid::new_v4(), &safety_definitions());
        let new_template = Uuid::new_v4();
        let copy = duplicate_tree(new_template, &source);

        assert_eq!(copy.len(), source.len());
        assert!(copy.iter().all(|c| c.checklist.template_id == new_template));
        assert_ne!(copy[0].checklist.id, source[0].checklist.id);
        assert_ne!(copy[0].steps[0].id, source[0].steps[0].id);
        assert_eq!(copy[1].steps[0].name, "Photo of front");
    }
}
