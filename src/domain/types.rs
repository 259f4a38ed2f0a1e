/// One entry of the command catalog. `command` may contain `<placeholder>` tokens.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInfo {
    pub command: String,
    pub description: String,
}

impl CommandInfo {
    pub fn new(command: &str, description: &str) -> Self {
        Self {
            command: command.to_string(),
            description: description.to_string(),
        }
    }
}

/// Repository state shown in the header.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct GitStatus {
    pub branch: String,
    pub staged: usize,
    pub modified: usize,
    pub untracked: usize,
    pub ahead: usize,
    pub behind: usize,
    pub has_upstream: bool,
}

impl GitStatus {
    pub fn is_clean(&self) -> bool {
        self.staged == 0 && self.modified == 0 && self.untracked == 0
    }
}
