use crate::domain::{
    Action, Context, ContextualKeyBindingMap, Environment, resolve_keybindings,
};
use crate::infra::{CONFIG_ENV, LoadedConfig, WorkflowConfig, load_config, resolve_config_path};
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

pub const USAGE: &str = "\
gitdeck - keyboard-driven git command console

Usage:
  gitdeck [--profile NAME] [--config PATH]
  gitdeck keys [--profile NAME] [--context NAME] [--config PATH]
  gitdeck workflows [--config PATH]
  gitdeck --help | --version

Options:
  -p, --profile NAME   Keybinding profile: default, emacs, vi, readline
  -c, --config PATH    Config file (also GITDECK_CONFIG)
      --context NAME   Only print bindings for one context

Environment:
  GITDECK_CONFIG       Config file path
  GITDECK_LOG          Log filter, e.g. debug or gitdeck=trace
";

/// Flags shared by the console and every subcommand.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CliOptions {
    pub profile: Option<String>,
    pub config: Option<PathBuf>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliInvocation {
    PrintHelp,
    PrintVersion,
    Console(CliOptions),
    Command {
        command: CliCommand,
        options: CliOptions,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliCommand {
    Keys { context: Option<Context> },
    Workflows,
}

#[derive(Debug, Error)]
pub enum CliParseError {
    #[error("unknown subcommand: {0}")]
    UnknownSubcommand(String),

    #[error("unknown flag: {0}")]
    UnknownFlag(String),

    #[error("missing value for flag: {0}")]
    MissingFlagValue(String),

    #[error("invalid value for {flag}: {value}")]
    InvalidFlagValue { flag: String, value: String },

    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
}

pub fn parse_invocation(args: &[String]) -> Result<CliInvocation, CliParseError> {
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        return Ok(CliInvocation::PrintHelp);
    }
    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        return Ok(CliInvocation::PrintVersion);
    }

    let mut options = CliOptions::default();
    let mut subcommand: Option<&str> = None;
    let mut context: Option<Context> = None;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--profile" | "-p" => {
                let value = flag_value(&mut iter, "--profile")?;
                options.profile = Some(value.to_string());
            }
            "--config" | "-c" => {
                let value = flag_value(&mut iter, "--config")?;
                options.config = Some(PathBuf::from(value));
            }
            "--context" if subcommand == Some("keys") => {
                let value = flag_value(&mut iter, "--context")?;
                let parsed = Context::from_name(value).ok_or_else(|| {
                    CliParseError::InvalidFlagValue {
                        flag: "--context".to_string(),
                        value: value.to_string(),
                    }
                })?;
                context = Some(parsed);
            }
            _ if arg.starts_with('-') => {
                return Err(CliParseError::UnknownFlag(arg.to_string()));
            }
            value if subcommand.is_none() => match value {
                "keys" | "workflows" => subcommand = Some(value),
                other => return Err(CliParseError::UnknownSubcommand(other.to_string())),
            },
            other => return Err(CliParseError::UnexpectedArgument(other.to_string())),
        }
    }

    let command = match subcommand {
        None => return Ok(CliInvocation::Console(options)),
        Some("keys") => CliCommand::Keys { context },
        Some(_) => CliCommand::Workflows,
    };
    Ok(CliInvocation::Command { command, options })
}

fn flag_value<'a>(
    iter: &mut impl Iterator<Item = &'a String>,
    flag: &str,
) -> Result<&'a str, CliParseError> {
    iter.next()
        .map(String::as_str)
        .ok_or_else(|| CliParseError::MissingFlagValue(flag.to_string()))
}

#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

/// Loads the config the same way the console does, reporting warnings on stderr.
pub fn load_cli_config(options: &CliOptions) -> LoadedConfig {
    let path = resolve_config_path(options.config.as_deref(), std::env::var(CONFIG_ENV).ok());
    load_config(path.as_deref())
}

pub fn run(command: CliCommand, options: &CliOptions) -> Result<(), CliRunError> {
    let loaded = load_cli_config(options);
    {
        let mut err = io::stderr().lock();
        for warning in &loaded.warnings {
            let _ = writeln!(err, "warning: {warning}");
        }
    }

    let mut out = io::BufWriter::new(io::stdout().lock());
    match command {
        CliCommand::Keys { context } => {
            let profile = options
                .profile
                .as_deref()
                .unwrap_or(loaded.config.profile.as_str());
            let environment = Environment::detect(std::env::consts::OS, |key| std::env::var(key).ok());
            let resolution = resolve_keybindings(profile, environment, &loaded.config.keybindings);
            {
                let mut err = io::stderr().lock();
                for warning in &resolution.warnings {
                    let _ = writeln!(err, "warning: {warning}");
                }
            }
            write_keys_table(&mut out, &resolution.map, context)?;
        }
        CliCommand::Workflows => write_workflows(&mut out, &loaded.config.workflows)?,
    }
    out.flush()?;
    Ok(())
}

/// Returns `Ok(false)` when the reader went away.
fn write_line(out: &mut impl Write, line: &str) -> io::Result<bool> {
    match writeln!(out, "{line}") {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::BrokenPipe => Ok(false),
        Err(error) => Err(error),
    }
}

pub fn write_keys_table(
    out: &mut impl Write,
    map: &ContextualKeyBindingMap,
    only: Option<Context>,
) -> io::Result<()> {
    let header = format!(
        "# profile: {}  platform: {}  terminal: {}",
        map.profile.name(),
        map.environment.platform.label(),
        map.environment.terminal.label()
    );
    if !write_line(out, &header)? {
        return Ok(());
    }

    for context in Context::ALL {
        if only.is_some_and(|wanted| wanted != context) {
            continue;
        }
        if !write_line(out, &format!("[{}]", context.name()))? {
            return Ok(());
        }
        for action in Action::ALL {
            let keys = map.keys(context, action);
            if keys.is_empty() {
                continue;
            }
            let joined = keys
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            if !write_line(out, &format!("  {:<22}{joined}", action.name()))? {
                return Ok(());
            }
        }
    }
    Ok(())
}

pub fn write_workflows(out: &mut impl Write, workflows: &[WorkflowConfig]) -> io::Result<()> {
    if workflows.is_empty() {
        write_line(out, "No workflows configured.")?;
        return Ok(());
    }
    for workflow in workflows {
        let heading = format!("{} ({} steps)", workflow.name, workflow.steps.len());
        if !write_line(out, &heading)? {
            return Ok(());
        }
        for (index, step) in workflow.steps.iter().enumerate() {
            if !write_line(out, &format!("  {}. {step}", index + 1))? {
                return Ok(());
            }
        }
    }
    Ok(())
}
