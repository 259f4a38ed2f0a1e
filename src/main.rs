mod app;
mod cli;
mod domain;
mod infra;
mod ui;

use crate::app::{
    AppCommand, AppError, AppEvent, AppModel, DecodeMode, Decoded, ExecOutcome,
    ExecuteError, KeyDecoder, ReaderSource, WorkflowExecutor,
};
use crate::cli::{CliInvocation, CliOptions};
use crate::domain::{
    CommandInfo, Environment, KeyBindingResolver, KeyStroke, WorkflowError, WorkflowManager,
    resolve_keybindings,
};
use crate::infra::{
    CONFIG_ENV, ConfigWatcher, GitCli, LOG_ENV, LoggingGuard, ProcessRouter, StdinSource,
    TerminalPrompter, TerminalSession, WatchSignal, builtin_catalog, init_logging,
    install_panic_hook, load_config, poll_status, resolve_config_path, watch_config_file,
};
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Idle wake-up for notice expiry and config reloads.
const TICK: Duration = Duration::from_millis(250);
const GIT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
enum MainError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Cli(#[from] crate::cli::CliRunError),
}

fn main() {
    if let Err(error) = run_main() {
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "gitdeck: {error}");
        std::process::exit(1);
    }
}

fn run_main() -> Result<(), MainError> {
    let args = std::env::args().collect::<Vec<_>>();
    let invocation = match crate::cli::parse_invocation(&args) {
        Ok(invocation) => invocation,
        Err(error) => {
            let mut err = io::stderr().lock();
            let _ = writeln!(err, "{error}");
            let _ = writeln!(err);
            let _ = write!(err, "{}", crate::cli::USAGE);
            std::process::exit(2);
        }
    };

    let _logging = start_logging();

    match invocation {
        CliInvocation::PrintHelp => {
            let mut out = io::stdout().lock();
            let _ = write!(out, "{}", crate::cli::USAGE);
            Ok(())
        }
        CliInvocation::PrintVersion => {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliInvocation::Console(options) => Ok(run_console(&options)?),
        CliInvocation::Command { command, options } => {
            crate::cli::run(command, &options)?;
            Ok(())
        }
    }
}

fn start_logging() -> Option<LoggingGuard> {
    match init_logging(std::env::var(LOG_ENV).ok()) {
        Ok(guard) => {
            info!(log_dir = %guard.log_dir.display(), version = env!("CARGO_PKG_VERSION"), "gitdeck starting");
            Some(guard)
        }
        Err(error) => {
            let mut err = io::stderr().lock();
            let _ = writeln!(err, "gitdeck: logging disabled: {error}");
            None
        }
    }
}

fn detect_environment() -> Environment {
    Environment::detect(std::env::consts::OS, |key| std::env::var(key).ok())
}

/// Everything the loop talks to besides the model.
struct Services {
    config_path: Option<PathBuf>,
    profile_override: Option<String>,
    watcher: Option<ConfigWatcher>,
    git: GitCli,
    router: ProcessRouter,
    last_git_poll: Option<Instant>,
}

impl Services {
    fn poll_git(&mut self, model: &mut AppModel) {
        model.git = poll_status(&self.git);
        self.last_git_poll = Some(Instant::now());
    }

    fn git_due(&self, now: Instant) -> bool {
        self.last_git_poll
            .is_none_or(|last| now.saturating_duration_since(last) >= GIT_POLL_INTERVAL)
    }

    fn apply_watch_signals(&mut self, model: &mut AppModel) {
        let Some(watcher) = &self.watcher else {
            return;
        };
        let mut changed = false;
        for signal in watcher.drain() {
            match signal {
                WatchSignal::Changed => changed = true,
                WatchSignal::Error(message) => {
                    warn!(%message, "config watcher error");
                    model.post_notice(format!("Config watch error: {message}"));
                }
            }
        }
        if changed {
            self.reload_bindings(model);
        }
    }

    /// Re-resolves keybindings from the config file and swaps them in.
    /// Workflows stay as they were at startup.
    fn reload_bindings(&self, model: &mut AppModel) {
        let loaded = load_config(self.config_path.as_deref());
        let profile = self
            .profile_override
            .clone()
            .unwrap_or(loaded.config.profile);
        let resolution =
            resolve_keybindings(&profile, detect_environment(), &loaded.config.keybindings);
        model.bindings.replace(resolution.map);

        let warnings: Vec<String> = loaded
            .warnings
            .into_iter()
            .chain(resolution.warnings)
            .collect();
        info!(warnings = warnings.len(), "keybindings reloaded");
        match warnings.first() {
            Some(first) => model.post_notice(format!("Reloaded keybindings: {first}")),
            None => model.post_notice("Reloaded keybindings"),
        }
    }
}

fn build_console(options: &CliOptions) -> (AppModel, Services) {
    let config_path = resolve_config_path(options.config.as_deref(), std::env::var(CONFIG_ENV).ok());
    let loaded = load_config(config_path.as_deref());
    let config = loaded.config;

    let profile = options.profile.clone().unwrap_or_else(|| config.profile.clone());
    let resolution = resolve_keybindings(&profile, detect_environment(), &config.keybindings);

    let workflows = WorkflowManager::new();
    for workflow in &config.workflows {
        let id = workflows.create_read_only_workflow(&workflow.name, &workflow.steps);
        debug!(id, name = %workflow.name, steps = workflow.steps.len(), "loaded config workflow");
    }

    let catalog: Arc<[CommandInfo]> = builtin_catalog().into();
    let bindings = Arc::new(KeyBindingResolver::new(resolution.map));
    let mut model = AppModel::new(catalog, Arc::new(workflows), bindings);

    let warnings: Vec<String> = loaded
        .warnings
        .into_iter()
        .chain(resolution.warnings)
        .collect();
    if let Some(first) = warnings.first() {
        let more = warnings.len() - 1;
        if more > 0 {
            model.post_notice(format!("Config: {first} (+{more} more, see log)"));
        } else {
            model.post_notice(format!("Config: {first}"));
        }
    }

    let watcher = config_path.as_deref().and_then(|path| match watch_config_file(path) {
        Ok(watcher) => Some(watcher),
        Err(error) => {
            debug!(%error, "config hot reload disabled");
            None
        }
    });

    let services = Services {
        config_path,
        profile_override: options.profile.clone(),
        watcher,
        git: GitCli::new("git"),
        router: ProcessRouter::new(&config.router_program),
        last_git_poll: None,
    };
    (model, services)
}

fn run_console(options: &CliOptions) -> Result<(), AppError> {
    let (model, mut services) = build_console(options);
    if io::stdin().is_terminal() && io::stdout().is_terminal() {
        run_tty(model, &mut services)
    } else {
        info!("stdin is not a terminal, using line mode");
        run_line_mode(model, &mut services)
    }
}

fn run_tty(mut model: AppModel, services: &mut Services) -> Result<(), AppError> {
    install_panic_hook();
    let mut session = TerminalSession::enter()?;
    let mut source = StdinSource::new();
    let decoder = KeyDecoder::new(DecodeMode::Raw);
    services.poll_git(&mut model);

    loop {
        session.draw(|frame| crate::ui::render(frame, &model))?;

        let event = if source.wait_readable(TICK)? {
            match decoder.next_key(&mut source)? {
                Decoded::Key(stroke) => AppEvent::Key(stroke),
                Decoded::Nothing => continue,
                Decoded::Eof => break,
            }
        } else {
            AppEvent::Tick(Instant::now())
        };

        let (next, command) = crate::app::update(model, event);
        model = next;
        services.apply_watch_signals(&mut model);
        if services.git_due(Instant::now()) {
            services.poll_git(&mut model);
        }

        match command {
            AppCommand::None => {}
            AppCommand::Quit => break,
            command => {
                if let Some(notice) = reject_empty(&model, &command) {
                    model.post_notice(notice);
                    continue;
                }
                let outcome = {
                    let _suspended = session.suspend()?;
                    let mut prompter = TerminalPrompter::new(
                        &mut source,
                        KeyDecoder::new(DecodeMode::Raw),
                        model.bindings.snapshot(),
                        io::stdout(),
                    )
                    .with_raw_mode();
                    let outcome = run_command(&model, &command, &mut prompter, &mut services.router);
                    if !matches!(outcome, Ok(ExecOutcome::Cancelled { .. })) {
                        if let Err(error) = prompter.wait_for_continue() {
                            warn!(%error, "failed waiting to return to the console");
                        }
                    }
                    outcome
                };
                model.post_notice(outcome_notice(outcome));
                services.poll_git(&mut model);
            }
        }
    }

    session.restore()?;
    info!("console closed");
    Ok(())
}

/// Line mode for piped stdin: each line is typed into the console and the
/// screen is printed as text after every Enter.
fn run_line_mode(mut model: AppModel, services: &mut Services) -> Result<(), AppError> {
    let stdin = io::stdin();
    let mut source = ReaderSource::new(stdin.lock());
    let decoder = KeyDecoder::new(DecodeMode::Buffered);
    services.poll_git(&mut model);
    print_plain(&model)?;

    loop {
        let stroke = match decoder.next_key(&mut source)? {
            Decoded::Key(stroke) => stroke,
            Decoded::Nothing => continue,
            Decoded::Eof => break,
        };
        let line_end = stroke == KeyStroke::enter();

        let (next, command) = crate::app::update(model, AppEvent::Key(stroke));
        model = next;

        match command {
            AppCommand::None => {}
            AppCommand::Quit => break,
            command => {
                let notice = match reject_empty(&model, &command) {
                    Some(notice) => notice,
                    None => {
                        let mut prompter = TerminalPrompter::new(
                            &mut source,
                            KeyDecoder::new(DecodeMode::Buffered),
                            model.bindings.snapshot(),
                            io::stdout(),
                        )
                        .without_echo();
                        outcome_notice(run_command(
                            &model,
                            &command,
                            &mut prompter,
                            &mut services.router,
                        ))
                    }
                };
                model.post_notice(notice);
                services.poll_git(&mut model);
            }
        }

        if line_end {
            print_plain(&model)?;
        }
    }
    Ok(())
}

fn print_plain(model: &AppModel) -> io::Result<()> {
    let mut out = io::stdout().lock();
    for line in crate::ui::render_plain(model) {
        writeln!(out, "{line}")?;
    }
    writeln!(out)?;
    out.flush()
}

/// Refuses to hand over the terminal for a workflow with nothing to run.
fn reject_empty(model: &AppModel, command: &AppCommand) -> Option<String> {
    let AppCommand::ExecuteWorkflow { id } = command else {
        return None;
    };
    match model.workflows.workflow(*id) {
        Some(workflow) if workflow.is_empty() => Some(WorkflowError::EmptyWorkflow(*id).to_string()),
        Some(_) => None,
        None => Some(WorkflowError::NotFound(*id).to_string()),
    }
}

fn run_command<S: Write>(
    model: &AppModel,
    command: &AppCommand,
    prompter: &mut TerminalPrompter<'_, S>,
    router: &mut ProcessRouter,
) -> Result<ExecOutcome, ExecuteError> {
    let mut executor = WorkflowExecutor::new(prompter, router);
    match command {
        AppCommand::ExecuteWorkflow { id } => {
            let workflow = model
                .workflows
                .workflow(*id)
                .ok_or(WorkflowError::NotFound(*id))?;
            executor.execute(*id, &workflow)
        }
        AppCommand::ExecuteTemplate { template } => executor.execute_template(template),
        AppCommand::None | AppCommand::Quit => Ok(ExecOutcome::Completed { dispatched: 0 }),
    }
}

fn outcome_notice(outcome: Result<ExecOutcome, ExecuteError>) -> String {
    match outcome {
        Ok(ExecOutcome::Completed { dispatched }) => match dispatched {
            1 => "Ran 1 command".to_string(),
            n => format!("Ran {n} commands"),
        },
        Ok(ExecOutcome::Cancelled { dispatched: 0 }) => "Cancelled".to_string(),
        Ok(ExecOutcome::Cancelled { dispatched }) => {
            format!("Cancelled after {dispatched} of the steps ran")
        }
        Err(error) => {
            error!(%error, "execution failed");
            error.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_notices_read_naturally() {
        assert_eq!(
            outcome_notice(Ok(ExecOutcome::Completed { dispatched: 1 })),
            "Ran 1 command"
        );
        assert_eq!(
            outcome_notice(Ok(ExecOutcome::Completed { dispatched: 3 })),
            "Ran 3 commands"
        );
        assert_eq!(
            outcome_notice(Ok(ExecOutcome::Cancelled { dispatched: 0 })),
            "Cancelled"
        );
        let empty = outcome_notice(Err(WorkflowError::EmptyWorkflow(4).into()));
        assert!(empty.contains('4'), "{empty}");
    }

    #[test]
    fn git_poll_is_throttled() {
        let mut services = Services {
            config_path: None,
            profile_override: None,
            watcher: None,
            git: GitCli::new("git"),
            router: ProcessRouter::new("git"),
            last_git_poll: None,
        };
        let now = Instant::now();
        assert!(services.git_due(now));
        services.last_git_poll = Some(now);
        assert!(!services.git_due(now + Duration::from_millis(500)));
        assert!(services.git_due(now + GIT_POLL_INTERVAL));
    }

    #[test]
    fn empty_workflows_are_refused_before_running() {
        let (model, _) = build_console(&CliOptions {
            profile: None,
            config: Some(PathBuf::from("/nonexistent/gitdeck/config.json")),
        });
        let id = model.workflows.active_id();
        let refusal = reject_empty(&model, &AppCommand::ExecuteWorkflow { id });
        assert!(refusal.is_some());
        assert_eq!(
            reject_empty(&model, &AppCommand::ExecuteTemplate { template: "status".to_string() }),
            None
        );
    }
}
