use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, info};

pub type WorkflowId = u64;
pub type StepId = u64;

/// Reserved id meaning "no workflow".
pub const NO_WORKFLOW: WorkflowId = 0;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WorkflowStep {
    pub id: StepId,
    pub command: String,
    pub args: Vec<String>,
    /// Original template text, re-resolved on every execution when `args` is empty.
    pub description: String,
}

impl WorkflowStep {
    /// Arguments to resolve: explicit `args`, or the template past its first token.
    pub fn effective_args(&self) -> Vec<String> {
        if !self.args.is_empty() {
            return self.args.clone();
        }
        self.description
            .split_whitespace()
            .skip(1)
            .map(ToString::to_string)
            .collect()
    }

    /// The template this step would be re-created from.
    pub fn template(&self) -> String {
        if !self.description.trim().is_empty() {
            return self.description.clone();
        }
        let mut parts = vec![self.command.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Splits a template like `commit -m <message>` into its command token and the
/// template itself.
pub fn parse_step_template(template: &str) -> Option<(String, String)> {
    let trimmed = template.trim();
    let command = trimmed.split_whitespace().next()?;
    Some((command.to_string(), trimmed.to_string()))
}

#[derive(Debug, Default)]
struct WorkflowInner {
    steps: Vec<WorkflowStep>,
    next_id: StepId,
}

/// Ordered steps with a per-workflow id counter.
#[derive(Debug)]
pub struct Workflow {
    inner: RwLock<WorkflowInner>,
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new()
    }
}

impl Workflow {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(WorkflowInner {
                steps: Vec::new(),
                next_id: 1,
            }),
        }
    }

    pub fn add_step(&self, command: &str, args: Vec<String>, description: &str) -> StepId {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.steps.push(WorkflowStep {
            id,
            command: command.to_string(),
            args,
            description: description.to_string(),
        });
        id
    }

    pub fn add_template(&self, template: &str) -> Option<StepId> {
        let (command, description) = parse_step_template(template)?;
        Some(self.add_step(&command, Vec::new(), &description))
    }

    pub fn remove_step(&self, id: StepId) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = inner.steps.len();
        inner.steps.retain(|step| step.id != id);
        inner.steps.len() != before
    }

    /// Removes all steps. Ids keep counting up.
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.steps.clear();
    }

    pub fn steps(&self) -> Vec<WorkflowStep> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .steps
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .steps
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WorkflowSource {
    Dynamic,
    Config,
}

impl WorkflowSource {
    pub fn label(self) -> &'static str {
        match self {
            Self::Dynamic => "dynamic",
            Self::Config => "config",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WorkflowSummary {
    pub id: WorkflowId,
    pub name: String,
    pub step_count: usize,
    pub is_active: bool,
    pub source: WorkflowSource,
    pub read_only: bool,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum WorkflowError {
    #[error("workflow {0} not found")]
    NotFound(WorkflowId),

    #[error("workflow {0} is read-only; clone it to edit")]
    ReadOnly(WorkflowId),

    #[error("workflow {0} has no steps")]
    EmptyWorkflow(WorkflowId),

    #[error("step {step} not found in workflow {workflow}")]
    StepNotFound { workflow: WorkflowId, step: StepId },

    #[error("invalid step template '{0}'")]
    InvalidTemplate(String),
}

#[derive(Debug)]
struct ManagedWorkflow {
    name: String,
    source: WorkflowSource,
    read_only: bool,
    workflow: Arc<Workflow>,
}

#[derive(Debug)]
struct ManagerInner {
    workflows: HashMap<WorkflowId, ManagedWorkflow>,
    order: Vec<WorkflowId>,
    active: WorkflowId,
    next_id: WorkflowId,
    next_dynamic_number: usize,
}

impl ManagerInner {
    fn insert(&mut self, name: String, source: WorkflowSource, read_only: bool) -> WorkflowId {
        let id = self.next_id;
        self.next_id += 1;
        self.workflows.insert(
            id,
            ManagedWorkflow {
                name,
                source,
                read_only,
                workflow: Arc::new(Workflow::new()),
            },
        );
        self.order.push(id);
        id
    }

    fn next_dynamic_name(&mut self) -> String {
        let name = format!("Workflow {}", self.next_dynamic_number);
        self.next_dynamic_number += 1;
        name
    }

    fn writable(&self, id: WorkflowId) -> Result<&ManagedWorkflow, WorkflowError> {
        let managed = self.workflows.get(&id).ok_or(WorkflowError::NotFound(id))?;
        if managed.read_only {
            return Err(WorkflowError::ReadOnly(id));
        }
        Ok(managed)
    }
}

/// Named workflows in display order with one active pointer.
#[derive(Debug)]
pub struct WorkflowManager {
    inner: RwLock<ManagerInner>,
}

impl Default for WorkflowManager {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowManager {
    /// A manager holding one empty, active, dynamic workflow.
    pub fn new() -> Self {
        let manager = Self {
            inner: RwLock::new(ManagerInner {
                workflows: HashMap::new(),
                order: Vec::new(),
                active: NO_WORKFLOW,
                next_id: 1,
                next_dynamic_number: 1,
            }),
        };
        manager.create_workflow();
        manager
    }

    /// Creates an empty dynamic workflow and makes it active.
    pub fn create_workflow(&self) -> WorkflowId {
        let mut inner = self.write();
        let name = inner.next_dynamic_name();
        let id = inner.insert(name, WorkflowSource::Dynamic, false);
        inner.active = id;
        debug!(workflow = id, "created workflow");
        id
    }

    /// Registers a config-sourced workflow. It is not made active.
    pub fn create_read_only_workflow(&self, name: &str, templates: &[String]) -> WorkflowId {
        let mut inner = self.write();
        let id = inner.insert(name.to_string(), WorkflowSource::Config, true);
        if let Some(managed) = inner.workflows.get(&id) {
            for template in templates {
                managed.workflow.add_template(template);
            }
        }
        if inner.active == NO_WORKFLOW {
            inner.active = id;
        }
        debug!(workflow = id, name, "registered read-only workflow");
        id
    }

    /// Creates a writable workflow from step templates and makes it active.
    pub fn create_workflow_from_templates(&self, name: &str, templates: &[String]) -> WorkflowId {
        let mut inner = self.write();
        let name = if name.trim().is_empty() {
            inner.next_dynamic_name()
        } else {
            name.to_string()
        };
        let id = inner.insert(name, WorkflowSource::Dynamic, false);
        if let Some(managed) = inner.workflows.get(&id) {
            for template in templates {
                managed.workflow.add_template(template);
            }
        }
        inner.active = id;
        id
    }

    /// Copies any workflow, read-only or not, into a new writable one.
    pub fn clone_workflow(&self, id: WorkflowId) -> Result<WorkflowId, WorkflowError> {
        let (name, steps) = {
            let inner = self.read();
            let managed = inner.workflows.get(&id).ok_or(WorkflowError::NotFound(id))?;
            (managed.name.clone(), managed.workflow.steps())
        };

        let mut inner = self.write();
        let clone_id = inner.insert(format!("{name} (copy)"), WorkflowSource::Dynamic, false);
        if let Some(managed) = inner.workflows.get(&clone_id) {
            for step in steps {
                managed
                    .workflow
                    .add_step(&step.command, step.args, &step.description);
            }
        }
        inner.active = clone_id;
        info!(source = id, workflow = clone_id, "cloned workflow");
        Ok(clone_id)
    }

    /// Deletes a writable workflow. Returns false for read-only or unknown ids.
    pub fn delete_workflow(&self, id: WorkflowId) -> bool {
        let mut inner = self.write();
        if inner.writable(id).is_err() {
            return false;
        }

        let Some(position) = inner.order.iter().position(|candidate| *candidate == id) else {
            return false;
        };
        inner.order.remove(position);
        inner.workflows.remove(&id);

        if inner.active == id {
            let neighbor = match inner.order.len() {
                0 => NO_WORKFLOW,
                len => inner.order[position.min(len - 1)],
            };
            inner.active = neighbor;
        }
        info!(workflow = id, active = inner.active, "deleted workflow");
        true
    }

    pub fn add_step(
        &self,
        id: WorkflowId,
        command: &str,
        args: Vec<String>,
        description: &str,
    ) -> Result<StepId, WorkflowError> {
        let inner = self.read();
        let managed = inner.writable(id)?;
        Ok(managed.workflow.add_step(command, args, description))
    }

    /// Adds a step from a template such as `commit -m <message>`.
    pub fn add_template_step(&self, id: WorkflowId, template: &str) -> Result<StepId, WorkflowError> {
        let (command, description) = parse_step_template(template)
            .ok_or_else(|| WorkflowError::InvalidTemplate(template.to_string()))?;
        self.add_step(id, &command, Vec::new(), &description)
    }

    pub fn remove_step(&self, id: WorkflowId, step: StepId) -> Result<(), WorkflowError> {
        let inner = self.read();
        let managed = inner.writable(id)?;
        if managed.workflow.remove_step(step) {
            Ok(())
        } else {
            Err(WorkflowError::StepNotFound { workflow: id, step })
        }
    }

    pub fn clear_workflow(&self, id: WorkflowId) -> Result<(), WorkflowError> {
        let inner = self.read();
        let managed = inner.writable(id)?;
        managed.workflow.clear();
        Ok(())
    }

    pub fn set_active(&self, id: WorkflowId) -> Result<(), WorkflowError> {
        let mut inner = self.write();
        if !inner.workflows.contains_key(&id) {
            return Err(WorkflowError::NotFound(id));
        }
        inner.active = id;
        Ok(())
    }

    pub fn active_id(&self) -> WorkflowId {
        self.read().active
    }

    pub fn workflow(&self, id: WorkflowId) -> Option<Arc<Workflow>> {
        self.read()
            .workflows
            .get(&id)
            .map(|managed| managed.workflow.clone())
    }

    pub fn active_workflow(&self) -> Option<Arc<Workflow>> {
        self.workflow(self.active_id())
    }

    pub fn summary(&self, id: WorkflowId) -> Option<WorkflowSummary> {
        let inner = self.read();
        inner
            .workflows
            .get(&id)
            .map(|managed| summarize(id, managed, inner.active))
    }

    /// Summaries in insertion order.
    pub fn list_workflows(&self) -> Vec<WorkflowSummary> {
        let inner = self.read();
        inner
            .order
            .iter()
            .filter_map(|id| {
                inner
                    .workflows
                    .get(id)
                    .map(|managed| summarize(*id, managed, inner.active))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().order.len()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ManagerInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, ManagerInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn summarize(id: WorkflowId, managed: &ManagedWorkflow, active: WorkflowId) -> WorkflowSummary {
    WorkflowSummary {
        id,
        name: managed.name.clone(),
        step_count: managed.workflow.len(),
        is_active: id == active,
        source: managed.source,
        read_only: managed.read_only,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn templates(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn starts_with_one_active_dynamic_workflow() {
        let manager = WorkflowManager::new();
        let list = manager.list_workflows();
        assert_eq!(list.len(), 1);
        assert!(list[0].is_active);
        assert_eq!(list[0].source, WorkflowSource::Dynamic);
        assert!(!list[0].read_only);
        assert_eq!(manager.active_id(), list[0].id);
    }

    #[test]
    fn deleting_the_only_workflow_leaves_none_active() {
        let manager = WorkflowManager::new();
        let id = manager.active_id();
        assert!(manager.delete_workflow(id));
        assert_eq!(manager.active_id(), NO_WORKFLOW);
        assert!(manager.list_workflows().is_empty());
        assert!(manager.active_workflow().is_none());
    }

    #[test]
    fn deleting_active_moves_to_neighbor_in_insertion_order() {
        let manager = WorkflowManager::new();
        let first = manager.active_id();
        let second = manager.create_workflow();
        let third = manager.create_workflow();

        manager.set_active(second).expect("set active");
        assert!(manager.delete_workflow(second));
        assert_eq!(manager.active_id(), third);

        assert!(manager.delete_workflow(third));
        assert_eq!(manager.active_id(), first);

        // Deleting a non-active workflow keeps the pointer.
        let fourth = manager.create_workflow();
        manager.set_active(first).expect("set active");
        assert!(manager.delete_workflow(fourth));
        assert_eq!(manager.active_id(), first);
    }

    #[test]
    fn read_only_workflows_reject_mutation() {
        let manager = WorkflowManager::new();
        let id = manager.create_read_only_workflow("ship", &templates(&["add <path>", "push"]));

        let error = manager
            .add_step(id, "status", Vec::new(), "status")
            .expect_err("read-only");
        assert_eq!(error, WorkflowError::ReadOnly(id));
        assert_eq!(manager.summary(id).expect("summary").step_count, 2);

        assert_eq!(manager.clear_workflow(id), Err(WorkflowError::ReadOnly(id)));
        assert!(!manager.delete_workflow(id));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn cloning_read_only_produces_writable_copy_with_same_templates() {
        let manager = WorkflowManager::new();
        let source = manager.create_read_only_workflow(
            "release",
            &templates(&["tag <version>", "push origin <version>"]),
        );

        let clone = manager.clone_workflow(source).expect("clone");
        let summary = manager.summary(clone).expect("summary");
        assert!(!summary.read_only);
        assert_eq!(summary.source, WorkflowSource::Dynamic);
        assert!(summary.is_active);
        assert_eq!(summary.name, "release (copy)");

        let original = manager.workflow(source).expect("source");
        let copied = manager.workflow(clone).expect("clone");
        assert_eq!(original.steps(), copied.steps());

        manager
            .add_template_step(clone, "status")
            .expect("clone is writable");
        assert_eq!(copied.len(), 3);
        assert_eq!(original.len(), 2);
    }

    #[test]
    fn unknown_ids_are_reported() {
        let manager = WorkflowManager::new();
        assert!(!manager.delete_workflow(42));
        assert_eq!(manager.clone_workflow(42), Err(WorkflowError::NotFound(42)));
        assert_eq!(manager.set_active(42), Err(WorkflowError::NotFound(42)));
        assert_eq!(manager.clear_workflow(42), Err(WorkflowError::NotFound(42)));
    }

    #[test]
    fn step_ids_are_never_reused() {
        let workflow = Workflow::new();
        let a = workflow.add_step("status", Vec::new(), "status");
        let b = workflow.add_step("diff", Vec::new(), "diff");
        assert!(workflow.remove_step(b));
        workflow.clear();
        let c = workflow.add_step("log", Vec::new(), "log");
        assert_eq!((a, b, c), (1, 2, 3));
        assert!(!workflow.remove_step(b));
    }

    #[test]
    fn effective_args_fall_back_to_template() {
        let workflow = Workflow::new();
        workflow.add_template("commit -m <message>");
        workflow.add_step("push", templates(&["origin", "main"]), "push origin <branch>");

        let steps = workflow.steps();
        assert_eq!(steps[0].command, "commit");
        assert_eq!(steps[0].effective_args(), templates(&["-m", "<message>"]));
        assert_eq!(steps[1].effective_args(), templates(&["origin", "main"]));
    }

    #[test]
    fn blank_templates_are_rejected() {
        let manager = WorkflowManager::new();
        let id = manager.active_id();
        assert_eq!(
            manager.add_template_step(id, "   "),
            Err(WorkflowError::InvalidTemplate("   ".to_string()))
        );
    }

    #[test]
    fn list_reports_insertion_order_and_active_flag() {
        let manager = WorkflowManager::new();
        let config = manager.create_read_only_workflow("cfg", &templates(&["status"]));
        let dynamic = manager.create_workflow();

        let list = manager.list_workflows();
        let ids: Vec<WorkflowId> = list.iter().map(|summary| summary.id).collect();
        assert_eq!(ids, vec![1, config, dynamic]);
        assert_eq!(
            list.iter().filter(|summary| summary.is_active).count(),
            1
        );
        assert!(list[2].is_active);
        assert_eq!(list[1].source, WorkflowSource::Config);
    }

    #[test]
    fn templates_build_a_writable_active_workflow() {
        let manager = WorkflowManager::new();
        let id = manager.create_workflow_from_templates(
            "release",
            &templates(&["tag -a <name> -m <message>", "push --tags"]),
        );
        assert_eq!(manager.active_id(), id);
        let summary = manager.summary(id).expect("summary");
        assert_eq!(summary.name, "release");
        assert_eq!(summary.step_count, 2);
        assert!(!summary.read_only);

        let unnamed = manager.create_workflow_from_templates(" ", &[]);
        let summary = manager.summary(unnamed).expect("summary");
        assert!(summary.name.starts_with("Workflow"), "{}", summary.name);
    }
}
