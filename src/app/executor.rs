use crate::domain::{
    Workflow, WorkflowError, WorkflowId, extract_placeholders, substitute_placeholders,
};
use std::io;
use thiserror::Error;
use tracing::{debug, info};

/// Answer to a placeholder prompt. Cancelling is a normal outcome, not an error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PromptReply {
    Value(String),
    Cancelled,
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("input closed while reading '{0}'")]
    Closed(String),
}

/// Asks the user for one placeholder value.
pub trait Prompter {
    fn prompt(&mut self, name: &str) -> Result<PromptReply, PromptError>;
}

/// Dispatches one resolved command line. What it does with it is its own business.
pub trait CommandRouter {
    fn route(&mut self, args: &[String]);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecOutcome {
    Completed { dispatched: usize },
    /// A prompt was cancelled; steps before it had already been dispatched.
    Cancelled { dispatched: usize },
}

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("placeholder prompt failed: {0}")]
    Prompt(#[from] PromptError),
}

/// Runs workflow steps in order, resolving `<placeholders>` as it goes.
pub struct WorkflowExecutor<'a> {
    prompter: &'a mut dyn Prompter,
    router: &'a mut dyn CommandRouter,
}

impl<'a> WorkflowExecutor<'a> {
    pub fn new(prompter: &'a mut dyn Prompter, router: &'a mut dyn CommandRouter) -> Self {
        Self { prompter, router }
    }

    pub fn execute(
        &mut self,
        id: WorkflowId,
        workflow: &Workflow,
    ) -> Result<ExecOutcome, ExecuteError> {
        let steps = workflow.steps();
        if steps.is_empty() {
            return Err(WorkflowError::EmptyWorkflow(id).into());
        }

        let mut dispatched = 0;
        for step in &steps {
            let args = step.effective_args();
            let names = extract_placeholders(&args);

            let mut values = Vec::with_capacity(names.len());
            for name in names {
                match self.prompter.prompt(&name)? {
                    PromptReply::Value(value) => values.push((name, value)),
                    PromptReply::Cancelled => {
                        info!(workflow = id, step = step.id, placeholder = %name, "workflow cancelled");
                        return Ok(ExecOutcome::Cancelled { dispatched });
                    }
                }
            }

            let mut argv = Vec::with_capacity(args.len() + 1);
            argv.push(step.command.clone());
            argv.extend(substitute_placeholders(&args, &values));
            debug!(workflow = id, step = step.id, ?argv, "dispatching step");
            self.router.route(&argv);
            dispatched += 1;
        }

        Ok(ExecOutcome::Completed { dispatched })
    }

    /// Runs a single template as a throwaway one-step workflow.
    pub fn execute_template(&mut self, template: &str) -> Result<ExecOutcome, ExecuteError> {
        let workflow = Workflow::new();
        workflow
            .add_template(template)
            .ok_or_else(|| WorkflowError::InvalidTemplate(template.to_string()))?;
        self.execute(0, &workflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WorkflowManager;
    use std::collections::VecDeque;

    /// Replays canned answers; `None` stands for a cancelled prompt.
    #[derive(Default)]
    struct ScriptedPrompter {
        answers: VecDeque<Option<String>>,
        asked: Vec<String>,
    }

    impl ScriptedPrompter {
        fn new(answers: &[Option<&str>]) -> Self {
            Self {
                answers: answers.iter().map(|a| a.map(ToString::to_string)).collect(),
                asked: Vec::new(),
            }
        }
    }

    impl Prompter for ScriptedPrompter {
        fn prompt(&mut self, name: &str) -> Result<PromptReply, PromptError> {
            self.asked.push(name.to_string());
            match self.answers.pop_front() {
                Some(Some(value)) => Ok(PromptReply::Value(value)),
                Some(None) => Ok(PromptReply::Cancelled),
                None => Err(PromptError::Closed(name.to_string())),
            }
        }
    }

    #[derive(Default)]
    struct RecordingRouter {
        routed: Vec<Vec<String>>,
    }

    impl CommandRouter for RecordingRouter {
        fn route(&mut self, args: &[String]) {
            self.routed.push(args.to_vec());
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn empty_workflow_is_rejected() {
        let mut prompter = ScriptedPrompter::default();
        let mut router = RecordingRouter::default();
        let mut executor = WorkflowExecutor::new(&mut prompter, &mut router);
        let result = executor.execute(7, &Workflow::new());
        assert!(matches!(
            result,
            Err(ExecuteError::Workflow(WorkflowError::EmptyWorkflow(7)))
        ));
        assert!(router.routed.is_empty());
    }

    #[test]
    fn multi_word_value_stays_one_argument() {
        let workflow = Workflow::new();
        workflow.add_step("commit", strings(&["--message", "<summary>"]), "");

        let mut prompter = ScriptedPrompter::new(&[Some("fix bug")]);
        let mut router = RecordingRouter::default();
        let outcome = WorkflowExecutor::new(&mut prompter, &mut router)
            .execute(1, &workflow)
            .expect("execute");

        assert_eq!(outcome, ExecOutcome::Completed { dispatched: 1 });
        assert_eq!(
            router.routed,
            vec![strings(&["commit", "--message", "fix bug"])]
        );
    }

    #[test]
    fn templates_are_resolved_and_prompted_once_per_name() {
        let workflow = Workflow::new();
        workflow.add_template("push <remote> <branch>:<branch>");
        workflow.add_template("status");

        let mut prompter = ScriptedPrompter::new(&[Some("origin"), Some("main")]);
        let mut router = RecordingRouter::default();
        WorkflowExecutor::new(&mut prompter, &mut router)
            .execute(1, &workflow)
            .expect("execute");

        assert_eq!(prompter.asked, strings(&["remote", "branch"]));
        assert_eq!(
            router.routed,
            vec![
                strings(&["push", "origin", "main:main"]),
                strings(&["status"]),
            ]
        );
    }

    #[test]
    fn cancelling_a_prompt_stops_the_whole_run() {
        let workflow = Workflow::new();
        workflow.add_template("add <path>");
        workflow.add_template("commit -m <message>");
        workflow.add_template("push");

        let mut prompter = ScriptedPrompter::new(&[Some("src"), None]);
        let mut router = RecordingRouter::default();
        let outcome = WorkflowExecutor::new(&mut prompter, &mut router)
            .execute(1, &workflow)
            .expect("execute");

        assert_eq!(outcome, ExecOutcome::Cancelled { dispatched: 1 });
        assert_eq!(router.routed, vec![strings(&["add", "src"])]);
    }

    #[test]
    fn cancel_before_first_dispatch_routes_nothing() {
        let workflow = Workflow::new();
        workflow.add_step("commit", strings(&["--message", "<summary>"]), "");
        workflow.add_template("push");

        let mut prompter = ScriptedPrompter::new(&[None]);
        let mut router = RecordingRouter::default();
        let outcome = WorkflowExecutor::new(&mut prompter, &mut router)
            .execute(1, &workflow)
            .expect("execute");
        assert_eq!(outcome, ExecOutcome::Cancelled { dispatched: 0 });
        assert!(router.routed.is_empty());
    }

    #[test]
    fn prompt_failure_is_an_error_not_a_cancel() {
        let workflow = Workflow::new();
        workflow.add_template("checkout <branch>");

        let mut prompter = ScriptedPrompter::default();
        let mut router = RecordingRouter::default();
        let result = WorkflowExecutor::new(&mut prompter, &mut router).execute(1, &workflow);
        assert!(matches!(result, Err(ExecuteError::Prompt(PromptError::Closed(_)))));
    }

    #[test]
    fn ad_hoc_template_runs_as_one_step() {
        let mut prompter = ScriptedPrompter::new(&[Some("3")]);
        let mut router = RecordingRouter::default();
        let mut executor = WorkflowExecutor::new(&mut prompter, &mut router);
        executor
            .execute_template("log -n <count> --oneline")
            .expect("execute");
        assert!(executor.execute_template("   ").is_err());
        assert_eq!(router.routed, vec![strings(&["log", "-n", "3", "--oneline"])]);
    }

    #[test]
    fn read_only_workflow_runs_but_stays_unchanged() {
        let manager = WorkflowManager::new();
        let id = manager.create_read_only_workflow("ship", &strings(&["status", "push"]));
        let workflow = manager.workflow(id).expect("workflow");

        let mut prompter = ScriptedPrompter::default();
        let mut router = RecordingRouter::default();
        WorkflowExecutor::new(&mut prompter, &mut router)
            .execute(id, &workflow)
            .expect("execute");
        assert_eq!(router.routed.len(), 2);
        assert_eq!(workflow.len(), 2);
    }
}
