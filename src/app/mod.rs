mod executor;
mod input;
mod line_editor;

use crate::domain::{
    Action, CommandInfo, Context, GitStatus, KeyBindingResolver, KeyStroke, NO_WORKFLOW,
    WorkflowError, WorkflowId, WorkflowManager, WorkflowStep, WorkflowSummary, rank,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

pub use executor::{
    CommandRouter, ExecOutcome, ExecuteError, PromptError, PromptReply, Prompter, WorkflowExecutor,
};
pub use input::{ByteSource, DecodeMode, Decoded, KeyDecoder, ReaderSource};
pub use line_editor::{Edit, LineEditor, TermOp, rune_width};

#[cfg(test)]
pub(crate) use input::tests::SliceSource;

const NOTICE_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Error)]
pub enum AppError {
    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Terminal(#[from] crate::infra::TerminalError),
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Search,
    WorkflowManagement,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::WorkflowManagement => "workflows",
        }
    }
}

pub type ContextListener = Arc<dyn Fn(Context) + Send + Sync>;

/// Main-loop-only interaction state.
#[derive(Clone, Default)]
pub struct UiState {
    pub input: LineEditor,
    /// Catalog indices that match the input, best first.
    pub filtered: Vec<usize>,
    selected: usize,
    context_stack: Vec<Context>,
    pub mode: Mode,
    /// Highlighted step in the workflow view.
    pub step_cursor: usize,
    /// Highlighted workflow in the selection list.
    pub workflow_cursor: usize,
    on_context_change: Option<ContextListener>,
}

impl fmt::Debug for UiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiState")
            .field("input", &self.input)
            .field("filtered", &self.filtered.len())
            .field("selected", &self.selected)
            .field("context_stack", &self.context_stack)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl UiState {
    pub fn set_context_listener(&mut self, listener: ContextListener) {
        listener(self.context());
        self.on_context_change = Some(listener);
    }

    /// Top of the context stack, Global when the stack is empty.
    pub fn context(&self) -> Context {
        self.context_stack.last().copied().unwrap_or(Context::Global)
    }

    /// Pushes `context` unless it is already current. Re-entering a context
    /// further down the stack pops back to it.
    pub fn enter_context(&mut self, context: Context) {
        let before = self.context();
        if before == context {
            return;
        }
        match self.context_stack.iter().position(|c| *c == context) {
            Some(index) => self.context_stack.truncate(index + 1),
            None if context == Context::Global => self.context_stack.clear(),
            None => self.context_stack.push(context),
        }
        self.notify_if_changed(before);
    }

    pub fn exit_context(&mut self) {
        let before = self.context();
        self.context_stack.pop();
        self.notify_if_changed(before);
    }

    pub fn reset_context(&mut self) {
        let before = self.context();
        self.context_stack.clear();
        self.notify_if_changed(before);
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn set_selected(&mut self, index: usize) {
        self.selected = match self.filtered.len() {
            0 => 0,
            len => index.min(len - 1),
        };
    }

    pub fn selected_entry(&self) -> Option<usize> {
        self.filtered.get(self.selected).copied()
    }

    fn notify_if_changed(&self, before: Context) {
        let after = self.context();
        if after == before {
            return;
        }
        debug!(from = before.name(), to = after.name(), "context changed");
        if let Some(listener) = &self.on_context_change {
            listener(after);
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notice {
    pub text: String,
    pub posted_at: Instant,
}

#[derive(Clone, Debug)]
pub struct AppModel {
    pub ui: UiState,
    pub catalog: Arc<[CommandInfo]>,
    pub workflows: Arc<WorkflowManager>,
    pub bindings: Arc<KeyBindingResolver>,
    pub git: Option<GitStatus>,
    pub notice: Option<Notice>,
}

impl AppModel {
    pub fn new(
        catalog: Arc<[CommandInfo]>,
        workflows: Arc<WorkflowManager>,
        bindings: Arc<KeyBindingResolver>,
    ) -> Self {
        let mut ui = UiState::default();
        let resolver = bindings.clone();
        ui.set_context_listener(Arc::new(move |context| resolver.set_context(context)));

        let mut model = Self {
            ui,
            catalog,
            workflows,
            bindings,
            git: None,
            notice: None,
        };
        model.refilter();
        model
    }

    pub fn post_notice(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            posted_at: Instant::now(),
        });
    }

    pub fn notice_text(&self) -> Option<&str> {
        self.notice.as_ref().map(|notice| notice.text.as_str())
    }

    pub fn context(&self) -> Context {
        self.ui.context()
    }

    pub fn selected_command(&self) -> Option<&CommandInfo> {
        self.ui
            .selected_entry()
            .and_then(|index| self.catalog.get(index))
    }

    /// Steps of the active workflow, for the workflow view.
    pub fn active_steps(&self) -> Vec<WorkflowStep> {
        self.workflows
            .active_workflow()
            .map(|workflow| workflow.steps())
            .unwrap_or_default()
    }

    pub fn active_summary(&self) -> Option<WorkflowSummary> {
        self.workflows.summary(self.workflows.active_id())
    }

    fn refilter(&mut self) {
        let filter = self.ui.input.text();
        self.ui.filtered = rank(
            self.catalog.iter().map(|entry| entry.command.as_str()),
            &filter,
        );
        let selected = self.ui.selected;
        self.ui.set_selected(selected);
    }

    fn after_text_edit(&mut self) {
        self.refilter();
        self.ui.set_selected(0);
        if self.ui.input.is_empty() && self.ui.context() == Context::Search {
            self.ui.exit_context();
        } else if !self.ui.input.is_empty() && self.ui.context() == Context::Input {
            self.ui.enter_context(Context::Search);
        }
    }

    fn clamp_workflow_cursors(&mut self) {
        let steps = self.active_steps().len();
        self.ui.step_cursor = self.ui.step_cursor.min(steps.saturating_sub(1));
        let workflows = self.workflows.len();
        self.ui.workflow_cursor = self.ui.workflow_cursor.min(workflows.saturating_sub(1));
    }

    fn highlighted_workflow(&self) -> Option<WorkflowId> {
        self.workflows
            .list_workflows()
            .get(self.ui.workflow_cursor)
            .map(|summary| summary.id)
    }

    /// The workflow the current context operates on.
    fn target_workflow(&self) -> Option<WorkflowId> {
        if self.context() == Context::WorkflowSelection {
            self.highlighted_workflow()
        } else {
            Some(self.workflows.active_id()).filter(|id| *id != NO_WORKFLOW)
        }
    }
}

#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyStroke),
    Tick(Instant),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AppCommand {
    None,
    Quit,
    ExecuteWorkflow { id: WorkflowId },
    ExecuteTemplate { template: String },
}

pub fn update(model: AppModel, event: AppEvent) -> (AppModel, AppCommand) {
    match event {
        AppEvent::Key(stroke) => update_on_key(model, stroke),
        AppEvent::Tick(now) => (expire_notice(model, now), AppCommand::None),
    }
}

fn expire_notice(mut model: AppModel, now: Instant) -> AppModel {
    let expired = model
        .notice
        .as_ref()
        .is_some_and(|notice| now.saturating_duration_since(notice.posted_at) >= NOTICE_TTL);
    if expired {
        model.notice = None;
    }
    model
}

type Handler = fn(&mut AppModel) -> AppCommand;

const SEARCH_CONTEXTS: [Context; 4] = [
    Context::Global,
    Context::Input,
    Context::Results,
    Context::Search,
];

fn dispatch_table() -> &'static HashMap<(Context, Action), Handler> {
    static TABLE: OnceLock<HashMap<(Context, Action), Handler>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table: HashMap<(Context, Action), Handler> = HashMap::new();
        for context in Context::ALL {
            table.insert((context, Action::Quit), |_| AppCommand::Quit);
            table.insert((context, Action::SoftCancel), soft_cancel);
            table.insert((context, Action::ToggleWorkflowView), toggle_workflow_view);
        }

        let search: [(Action, Handler); 14] = [
            (Action::MoveUp, |m| move_selection(m, -1)),
            (Action::MoveDown, |m| move_selection(m, 1)),
            (Action::MoveLeft, |m| edit_input(m, LineEditor::move_left)),
            (Action::MoveRight, |m| edit_input(m, LineEditor::move_right)),
            (Action::MoveWordLeft, |m| edit_input(m, LineEditor::move_word_left)),
            (Action::MoveWordRight, |m| edit_input(m, LineEditor::move_word_right)),
            (Action::MoveToBeginning, |m| edit_input(m, LineEditor::move_home)),
            (Action::MoveToEnd, |m| edit_input(m, LineEditor::move_end)),
            (Action::DeleteBackward, |m| edit_input(m, LineEditor::backspace)),
            (Action::DeleteWord, |m| edit_input(m, LineEditor::delete_word_left)),
            (Action::DeleteToEnd, |m| edit_input(m, LineEditor::delete_to_end)),
            (Action::ClearLine, |m| edit_input(m, LineEditor::clear)),
            (Action::Submit, submit_search),
            (Action::AddToWorkflow, add_to_workflow),
        ];
        for context in SEARCH_CONTEXTS {
            for (action, handler) in search {
                table.insert((context, action), handler);
            }
        }

        let view: [(Action, Handler); 11] = [
            (Action::MoveUp, |m| move_step_cursor(m, -1)),
            (Action::MoveDown, |m| move_step_cursor(m, 1)),
            (Action::Submit, execute_workflow),
            (Action::WorkflowExecute, execute_workflow),
            (Action::WorkflowCreate, create_workflow),
            (Action::WorkflowDelete, delete_workflow),
            (Action::WorkflowClear, clear_workflow),
            (Action::WorkflowClone, clone_workflow),
            (Action::WorkflowSelect, enter_selection),
            (Action::WorkflowRemoveStep, remove_step),
            (Action::WorkflowCancel, toggle_workflow_view),
        ];
        for (action, handler) in view {
            table.insert((Context::WorkflowView, action), handler);
        }

        let selection: [(Action, Handler); 8] = [
            (Action::MoveUp, |m| move_workflow_cursor(m, -1)),
            (Action::MoveDown, |m| move_workflow_cursor(m, 1)),
            (Action::Submit, activate_highlighted),
            (Action::WorkflowExecute, execute_workflow),
            (Action::WorkflowCreate, create_workflow),
            (Action::WorkflowDelete, delete_workflow),
            (Action::WorkflowClone, clone_workflow),
            (Action::WorkflowCancel, leave_selection),
        ];
        for (action, handler) in selection {
            table.insert((Context::WorkflowSelection, action), handler);
        }

        table
    })
}

fn update_on_key(mut model: AppModel, stroke: KeyStroke) -> (AppModel, AppCommand) {
    if stroke == KeyStroke::Ctrl('c') {
        return (model, AppCommand::Quit);
    }

    let context = model.context();
    let action = model.bindings.action_for(&stroke);
    if let Some(action) = action {
        if let Some(handler) = dispatch_table().get(&(context, action)) {
            let command = handler(&mut model);
            return (model, command);
        }
    }

    if model.ui.mode == Mode::Search {
        if let Some(ch) = stroke.printable_char() {
            insert_char(&mut model, ch);
            return (model, AppCommand::None);
        }
    }

    debug!(context = context.name(), key = %stroke, "unbound key");
    (model, AppCommand::None)
}

fn insert_char(model: &mut AppModel, ch: char) {
    if !matches!(model.context(), Context::Input | Context::Search) {
        model.ui.enter_context(Context::Input);
    }
    model.ui.input.insert_char(ch);
    model.after_text_edit();
}

fn soft_cancel(model: &mut AppModel) -> AppCommand {
    model.ui.input.clear();
    model.ui.mode = Mode::Search;
    model.refilter();
    model.ui.set_selected(0);
    model.ui.reset_context();
    AppCommand::None
}

fn toggle_workflow_view(model: &mut AppModel) -> AppCommand {
    model.ui.reset_context();
    match model.ui.mode {
        Mode::Search => {
            model.ui.mode = Mode::WorkflowManagement;
            model.ui.enter_context(Context::WorkflowView);
            model.clamp_workflow_cursors();
        }
        Mode::WorkflowManagement => model.ui.mode = Mode::Search,
    }
    AppCommand::None
}

fn move_selection(model: &mut AppModel, delta: isize) -> AppCommand {
    if !matches!(model.context(), Context::Results | Context::Search) {
        model.ui.enter_context(Context::Results);
    }
    let target = model.ui.selected.saturating_add_signed(delta);
    model.ui.set_selected(target);
    AppCommand::None
}

fn edit_input(model: &mut AppModel, edit: fn(&mut LineEditor) -> Edit) -> AppCommand {
    let before = model.ui.input.len();
    let outcome = edit(&mut model.ui.input);
    if outcome.dirty_from.is_some() || model.ui.input.len() != before {
        model.after_text_edit();
    }
    AppCommand::None
}

fn submit_search(model: &mut AppModel) -> AppCommand {
    match model.selected_command() {
        Some(entry) => AppCommand::ExecuteTemplate {
            template: entry.command.clone(),
        },
        None => {
            model.post_notice("No matching command");
            AppCommand::None
        }
    }
}

fn add_to_workflow(model: &mut AppModel) -> AppCommand {
    let Some(entry) = model.selected_command().cloned() else {
        model.post_notice("No command selected");
        return AppCommand::None;
    };

    let mut active = model.workflows.active_id();
    if model.workflows.workflow(active).is_none() {
        active = model.workflows.create_workflow();
    }

    match model.workflows.add_template_step(active, &entry.command) {
        Ok(_) => {
            let name = model
                .workflows
                .summary(active)
                .map(|summary| summary.name)
                .unwrap_or_default();
            model.post_notice(format!("Added '{}' to {name}", entry.command));
        }
        Err(error) => report_workflow_error(model, &error),
    }
    AppCommand::None
}

fn move_step_cursor(model: &mut AppModel, delta: isize) -> AppCommand {
    model.ui.step_cursor = model.ui.step_cursor.saturating_add_signed(delta);
    model.clamp_workflow_cursors();
    AppCommand::None
}

fn move_workflow_cursor(model: &mut AppModel, delta: isize) -> AppCommand {
    model.ui.workflow_cursor = model.ui.workflow_cursor.saturating_add_signed(delta);
    model.clamp_workflow_cursors();
    AppCommand::None
}

fn execute_workflow(model: &mut AppModel) -> AppCommand {
    match model.target_workflow() {
        Some(id) => AppCommand::ExecuteWorkflow { id },
        None => {
            model.post_notice("No workflow to run");
            AppCommand::None
        }
    }
}

fn create_workflow(model: &mut AppModel) -> AppCommand {
    let id = model.workflows.create_workflow();
    if let Some(summary) = model.workflows.summary(id) {
        model.post_notice(format!("Created {}", summary.name));
    }
    select_in_list(model, id);
    AppCommand::None
}

fn delete_workflow(model: &mut AppModel) -> AppCommand {
    let Some(id) = model.target_workflow() else {
        model.post_notice("No workflow to delete");
        return AppCommand::None;
    };
    let summary = model.workflows.summary(id);
    if model.workflows.delete_workflow(id) {
        let name = summary.map(|s| s.name).unwrap_or_default();
        model.post_notice(format!("Deleted {name}"));
    } else if summary.is_some_and(|s| s.read_only) {
        report_workflow_error(model, &WorkflowError::ReadOnly(id));
    } else {
        report_workflow_error(model, &WorkflowError::NotFound(id));
    }
    model.clamp_workflow_cursors();
    AppCommand::None
}

fn clear_workflow(model: &mut AppModel) -> AppCommand {
    let Some(id) = model.target_workflow() else {
        return AppCommand::None;
    };
    match model.workflows.clear_workflow(id) {
        Ok(()) => model.post_notice("Cleared workflow"),
        Err(error) => report_workflow_error(model, &error),
    }
    model.clamp_workflow_cursors();
    AppCommand::None
}

fn clone_workflow(model: &mut AppModel) -> AppCommand {
    let Some(id) = model.target_workflow() else {
        return AppCommand::None;
    };
    match model.workflows.clone_workflow(id) {
        Ok(clone_id) => {
            if let Some(summary) = model.workflows.summary(clone_id) {
                model.post_notice(format!("Cloned into {}", summary.name));
            }
            select_in_list(model, clone_id);
        }
        Err(error) => report_workflow_error(model, &error),
    }
    AppCommand::None
}

fn remove_step(model: &mut AppModel) -> AppCommand {
    let active = model.workflows.active_id();
    let Some(step) = model.active_steps().get(model.ui.step_cursor).cloned() else {
        model.post_notice("No step selected");
        return AppCommand::None;
    };
    match model.workflows.remove_step(active, step.id) {
        Ok(()) => model.post_notice(format!("Removed '{}'", step.template())),
        Err(error) => report_workflow_error(model, &error),
    }
    model.clamp_workflow_cursors();
    AppCommand::None
}

fn enter_selection(model: &mut AppModel) -> AppCommand {
    let active = model.workflows.active_id();
    select_in_list(model, active);
    model.ui.enter_context(Context::WorkflowSelection);
    AppCommand::None
}

fn leave_selection(model: &mut AppModel) -> AppCommand {
    model.ui.exit_context();
    if model.context() != Context::WorkflowView {
        model.ui.enter_context(Context::WorkflowView);
    }
    model.clamp_workflow_cursors();
    AppCommand::None
}

fn activate_highlighted(model: &mut AppModel) -> AppCommand {
    let Some(id) = model.highlighted_workflow() else {
        return AppCommand::None;
    };
    match model.workflows.set_active(id) {
        Ok(()) => {
            if let Some(summary) = model.workflows.summary(id) {
                model.post_notice(format!("Active: {}", summary.name));
            }
            model.ui.step_cursor = 0;
            leave_selection(model);
        }
        Err(error) => report_workflow_error(model, &error),
    }
    AppCommand::None
}

fn select_in_list(model: &mut AppModel, id: WorkflowId) {
    if let Some(index) = model
        .workflows
        .list_workflows()
        .iter()
        .position(|summary| summary.id == id)
    {
        model.ui.workflow_cursor = index;
    }
    model.clamp_workflow_cursors();
}

fn report_workflow_error(model: &mut AppModel, error: &WorkflowError) {
    debug!(%error, "workflow operation rejected");
    let text = match error {
        WorkflowError::ReadOnly(_) => {
            let clone_key = model
                .bindings
                .snapshot()
                .keys(Context::WorkflowView, Action::WorkflowClone)
                .first()
                .map(ToString::to_string);
            match clone_key {
                Some(key) => format!("Workflow is read-only; press {key} to clone it"),
                None => "Workflow is read-only; clone it to edit".to_string(),
            }
        }
        other => other.to_string(),
    };
    model.post_notice(text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AltKey, ContextualKeyBindingMap};

    fn catalog() -> Arc<[CommandInfo]> {
        vec![
            CommandInfo::new("add <path>", "Stage changes"),
            CommandInfo::new("status", "Show the working tree status"),
            CommandInfo::new("stash-drop", "Drop a stash entry"),
            CommandInfo::new("commit -m <message>", "Record changes"),
        ]
        .into()
    }

    fn model() -> AppModel {
        AppModel::new(
            catalog(),
            Arc::new(WorkflowManager::new()),
            Arc::new(KeyBindingResolver::new(ContextualKeyBindingMap::builtin())),
        )
    }

    fn press(model: AppModel, stroke: KeyStroke) -> (AppModel, AppCommand) {
        update(model, AppEvent::Key(stroke))
    }

    fn type_text(mut model: AppModel, text: &str) -> AppModel {
        for ch in text.chars() {
            model = press(model, KeyStroke::Char(ch)).0;
        }
        model
    }

    #[test]
    fn typing_enters_input_then_search_and_filters() {
        let model = model();
        assert_eq!(model.context(), Context::Global);
        assert_eq!(model.ui.filtered, vec![0, 1, 2, 3]);

        let model = type_text(model, "st");
        assert_eq!(model.context(), Context::Search);
        assert_eq!(model.ui.context_stack.len(), 2);
        assert_eq!(model.ui.filtered, vec![1, 2]);
        assert_eq!(model.bindings.current_context(), Context::Search);
    }

    #[test]
    fn erasing_the_input_leaves_search() {
        let model = type_text(model(), "s");
        let (model, _) = press(model, KeyStroke::backspace());
        assert_eq!(model.context(), Context::Input);
        assert_eq!(model.ui.filtered.len(), 4);
    }

    #[test]
    fn navigation_enters_results_and_clamps() {
        let (model, _) = press(model(), KeyStroke::down());
        assert_eq!(model.context(), Context::Results);
        assert_eq!(model.ui.selected(), 1);

        let mut model = model;
        for _ in 0..10 {
            model = press(model, KeyStroke::Ctrl('n')).0;
        }
        assert_eq!(model.ui.selected(), 3);
        for _ in 0..10 {
            model = press(model, KeyStroke::up()).0;
        }
        assert_eq!(model.ui.selected(), 0);

        let model = type_text(model, "zzz");
        assert!(model.ui.filtered.is_empty());
        assert_eq!(model.ui.selected(), 0);
    }

    #[test]
    fn context_stack_edges() {
        let mut ui = UiState::default();
        ui.enter_context(Context::Results);
        ui.enter_context(Context::Results);
        assert_eq!(ui.context_stack.len(), 1);

        ui.exit_context();
        assert_eq!(ui.context(), Context::Global);
        ui.exit_context();
        assert_eq!(ui.context(), Context::Global);
        assert_eq!(ui.context_stack.len(), 0);

        ui.enter_context(Context::Input);
        ui.enter_context(Context::Search);
        ui.enter_context(Context::Results);
        ui.enter_context(Context::Input);
        assert_eq!(ui.context_stack.len(), 1);
    }

    #[test]
    fn soft_cancel_recovers_from_anywhere() {
        let model = type_text(model(), "sta");
        let (model, _) = press(model, KeyStroke::tab());
        let (model, _) = press(model, KeyStroke::Char('s'));
        assert_eq!(model.context(), Context::WorkflowSelection);

        let (model, command) = press(model, KeyStroke::Escape);
        assert_eq!(command, AppCommand::None);
        assert_eq!(model.context(), Context::Global);
        assert_eq!(model.ui.mode, Mode::Search);
        assert!(model.ui.input.is_empty());
        assert_eq!(model.ui.selected(), 0);
        assert_eq!(model.ui.filtered.len(), 4);
        assert_eq!(model.bindings.current_context(), Context::Global);
    }

    #[test]
    fn toggle_swaps_modes() {
        let (model, _) = press(model(), KeyStroke::tab());
        assert_eq!(model.ui.mode, Mode::WorkflowManagement);
        assert_eq!(model.context(), Context::WorkflowView);

        // Letters are workflow commands here, not search input.
        let (model, _) = press(model, KeyStroke::Char('n'));
        assert!(model.ui.input.is_empty());
        assert_eq!(model.workflows.len(), 2);

        let (model, _) = press(model, KeyStroke::tab());
        assert_eq!(model.ui.mode, Mode::Search);
        assert_eq!(model.context(), Context::Global);
    }

    #[test]
    fn submit_runs_selected_entry_as_template() {
        let model = type_text(model(), "commit");
        let (_, command) = press(model, KeyStroke::enter());
        assert_eq!(
            command,
            AppCommand::ExecuteTemplate {
                template: "commit -m <message>".to_string()
            }
        );

        let model = type_text(self::model(), "qqq");
        let (model, command) = press(model, KeyStroke::enter());
        assert_eq!(command, AppCommand::None);
        assert!(model.notice_text().is_some());
    }

    #[test]
    fn add_to_workflow_then_execute_from_view() {
        let model = type_text(model(), "status");
        let (model, _) = press(model, KeyStroke::Ctrl('t'));
        let active = model.workflows.active_id();
        assert_eq!(model.active_steps().len(), 1);
        assert_eq!(model.active_steps()[0].template(), "status");

        let (model, _) = press(model, KeyStroke::tab());
        let (_, command) = press(model, KeyStroke::Char('x'));
        assert_eq!(command, AppCommand::ExecuteWorkflow { id: active });
    }

    #[test]
    fn add_to_workflow_recreates_a_workflow_when_none_exist() {
        let model = model();
        let only = model.workflows.active_id();
        assert!(model.workflows.delete_workflow(only));
        assert_eq!(model.workflows.active_id(), NO_WORKFLOW);

        let (model, _) = press(model, KeyStroke::Ctrl('t'));
        assert_eq!(model.workflows.len(), 1);
        assert_eq!(model.active_steps().len(), 1);
    }

    #[test]
    fn read_only_edits_are_refused_with_a_clone_hint() {
        let model = model();
        let config = model
            .workflows
            .create_read_only_workflow("ship", &["push".to_string()]);
        model.workflows.set_active(config).expect("activate");

        let (model, _) = press(model, KeyStroke::tab());
        let (model, _) = press(model, KeyStroke::Char('c'));
        assert_eq!(model.active_steps().len(), 1);
        let notice = model.notice_text().expect("notice");
        assert!(notice.contains("read-only"), "{notice}");
        assert!(notice.contains("press y"), "{notice}");

        let (model, _) = press(model, KeyStroke::Char('d'));
        assert!(model.workflows.workflow(config).is_some());

        let (model, _) = press(model, KeyStroke::Char('y'));
        let clone = model.workflows.active_id();
        assert_ne!(clone, config);
        let summary = model.active_summary().expect("summary");
        assert!(!summary.read_only);
        assert_eq!(model.active_steps()[0].template(), "push");
    }

    #[test]
    fn selection_picks_and_activates_a_workflow() {
        let model = model();
        let first = model.workflows.active_id();
        model.workflows.create_workflow();

        let (model, _) = press(model, KeyStroke::tab());
        let (model, _) = press(model, KeyStroke::Char('s'));
        assert_eq!(model.context(), Context::WorkflowSelection);
        assert_eq!(model.ui.workflow_cursor, 1);

        let (model, _) = press(model, KeyStroke::up());
        let (model, _) = press(model, KeyStroke::enter());
        assert_eq!(model.workflows.active_id(), first);
        assert_eq!(model.context(), Context::WorkflowView);

        let (model, _) = press(model, KeyStroke::Char('s'));
        let (model, _) = press(model, KeyStroke::Char('q'));
        assert_eq!(model.context(), Context::WorkflowView);
        assert_eq!(model.ui.mode, Mode::WorkflowManagement);
    }

    #[test]
    fn remove_step_in_view() {
        let model = model();
        let active = model.workflows.active_id();
        model
            .workflows
            .add_template_step(active, "status")
            .expect("add");
        model
            .workflows
            .add_template_step(active, "push")
            .expect("add");

        let (model, _) = press(model, KeyStroke::tab());
        let (model, _) = press(model, KeyStroke::down());
        let (model, _) = press(model, KeyStroke::Char('r'));
        let templates: Vec<String> = model.active_steps().iter().map(|s| s.template()).collect();
        assert_eq!(templates, vec!["status".to_string()]);
        assert_eq!(model.ui.step_cursor, 0);
    }

    #[test]
    fn editing_keys_reach_the_line_editor() {
        let model = type_text(model(), "commit -m");
        let (model, _) = press(model, KeyStroke::Ctrl('w'));
        assert_eq!(model.ui.input.text(), "commit ");
        let (model, _) = press(model, KeyStroke::Alt(AltKey::Left));
        assert_eq!(model.ui.input.cursor_column(), 0);
        let (model, _) = press(model, KeyStroke::Ctrl('k'));
        assert!(model.ui.input.is_empty());
        assert_eq!(model.context(), Context::Input);
    }

    #[test]
    fn quit_and_hard_interrupt() {
        let (_, command) = press(model(), KeyStroke::Ctrl('q'));
        assert_eq!(command, AppCommand::Quit);
        let (_, command) = press(model(), KeyStroke::Ctrl('c'));
        assert_eq!(command, AppCommand::Quit);
    }

    #[test]
    fn notices_expire_on_tick() {
        let mut model = model();
        model.post_notice("hello");
        let posted = model.notice.as_ref().expect("notice").posted_at;

        let (model, _) = update(model, AppEvent::Tick(posted + Duration::from_secs(1)));
        assert_eq!(model.notice_text(), Some("hello"));
        let (model, _) = update(model, AppEvent::Tick(posted + NOTICE_TTL));
        assert_eq!(model.notice_text(), None);
    }
}
