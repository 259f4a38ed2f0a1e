use crate::app::CommandRouter;
use crate::domain::GitStatus;
use std::io::{self, Write};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Header status source. Any error just means "no status to show".
pub trait GitStatusReader {
    fn read_status(&self) -> Result<GitStatus, GitError>;
}

/// Reads status by shelling out to the configured git binary.
#[derive(Clone, Debug)]
pub struct GitCli {
    program: String,
}

impl GitCli {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

impl GitStatusReader for GitCli {
    fn read_status(&self) -> Result<GitStatus, GitError> {
        let mut command = Command::new(&self.program);
        command
            .args(["status", "--porcelain=v2", "--branch"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = command.output().map_err(|source| GitError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        if !output.status.success() {
            return Err(GitError::Failed {
                program: self.program.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(parse_porcelain_v2(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Polls the reader, folding every failure into `None`.
pub fn poll_status(reader: &dyn GitStatusReader) -> Option<GitStatus> {
    match reader.read_status() {
        Ok(status) => Some(status),
        Err(error) => {
            debug!(%error, "git status unavailable");
            None
        }
    }
}

/// Parses `git status --porcelain=v2 --branch`.
pub fn parse_porcelain_v2(output: &str) -> GitStatus {
    let mut status = GitStatus::default();
    for line in output.lines() {
        if let Some(header) = line.strip_prefix("# ") {
            parse_branch_header(header, &mut status);
            continue;
        }

        let mut fields = line.split(' ');
        match fields.next() {
            Some("1") | Some("2") => {
                let xy = fields.next().unwrap_or("..").as_bytes();
                if xy.first().is_some_and(|x| *x != b'.') {
                    status.staged += 1;
                }
                if xy.get(1).is_some_and(|y| *y != b'.') {
                    status.modified += 1;
                }
            }
            Some("u") => status.modified += 1,
            Some("?") => status.untracked += 1,
            _ => {}
        }
    }
    status
}

fn parse_branch_header(header: &str, status: &mut GitStatus) {
    let Some((key, value)) = header.split_once(' ') else {
        return;
    };
    match key {
        "branch.head" => status.branch = value.to_string(),
        "branch.upstream" => status.has_upstream = true,
        "branch.ab" => {
            for part in value.split_whitespace() {
                if let Some(ahead) = part.strip_prefix('+') {
                    status.ahead = ahead.parse().unwrap_or(0);
                } else if let Some(behind) = part.strip_prefix('-') {
                    status.behind = behind.parse().unwrap_or(0);
                }
            }
        }
        _ => {}
    }
}

/// Runs each routed command line through the configured program with the
/// terminal handed over to it.
#[derive(Clone, Debug)]
pub struct ProcessRouter {
    program: String,
}

impl ProcessRouter {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

impl CommandRouter for ProcessRouter {
    fn route(&mut self, args: &[String]) {
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "$ {} {}", self.program, args.join(" "));
        let _ = out.flush();
        drop(out);

        info!(program = %self.program, ?args, "running command");
        match Command::new(&self.program).args(args).status() {
            Ok(status) if status.success() => {}
            Ok(status) => {
                warn!(program = %self.program, code = ?status.code(), "command failed");
                let mut err = io::stderr().lock();
                let _ = writeln!(err, "{} exited with {status}", self.program);
            }
            Err(error) => {
                warn!(program = %self.program, %error, "command could not start");
                let mut err = io::stderr().lock();
                let _ = writeln!(err, "failed to run {}: {error}", self.program);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) struct FixedStatus(pub(crate) Option<GitStatus>);

    impl GitStatusReader for FixedStatus {
        fn read_status(&self) -> Result<GitStatus, GitError> {
            self.0.clone().ok_or_else(|| GitError::Failed {
                program: "git".to_string(),
                code: Some(128),
                stderr: "not a git repository".to_string(),
            })
        }
    }

    #[test]
    fn parses_branch_and_counts() {
        let output = "\
# branch.oid 1b2c3d
# branch.head main
# branch.upstream origin/main
# branch.ab +2 -1
1 M. N... 100644 100644 100644 aaa bbb src/lib.rs
1 .M N... 100644 100644 100644 aaa bbb README.md
1 MM N... 100644 100644 100644 aaa bbb Cargo.toml
2 R. N... 100644 100644 100644 aaa bbb R100 new.rs\told.rs
u UU N... 100644 100644 100644 100644 aaa bbb ccc conflict.rs
? notes.txt
? scratch/
! target/
";
        let status = parse_porcelain_v2(output);
        assert_eq!(status.branch, "main");
        assert!(status.has_upstream);
        assert_eq!((status.ahead, status.behind), (2, 1));
        assert_eq!(status.staged, 3);
        assert_eq!(status.modified, 3);
        assert_eq!(status.untracked, 2);
        assert!(!status.is_clean());
    }

    #[test]
    fn clean_detached_repo() {
        let status = parse_porcelain_v2("# branch.oid abc\n# branch.head (detached)\n");
        assert_eq!(status.branch, "(detached)");
        assert!(!status.has_upstream);
        assert!(status.is_clean());
    }

    #[test]
    fn reader_errors_mean_no_status() {
        assert_eq!(poll_status(&FixedStatus(None)), None);
        let status = GitStatus {
            branch: "dev".to_string(),
            ..GitStatus::default()
        };
        assert_eq!(poll_status(&FixedStatus(Some(status.clone()))), Some(status));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let cli = GitCli::new("/nonexistent/gitdeck-test-git");
        assert!(matches!(cli.read_status(), Err(GitError::Spawn { .. })));
    }
}
