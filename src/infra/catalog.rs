use crate::domain::CommandInfo;
use std::collections::HashSet;

/// Registry row. Hidden rows are plumbing the console never offers.
#[derive(Clone, Copy, Debug)]
pub struct CatalogEntry {
    pub command: &'static str,
    pub description: &'static str,
    pub hidden: bool,
}

const fn entry(command: &'static str, description: &'static str) -> CatalogEntry {
    CatalogEntry {
        command,
        description,
        hidden: false,
    }
}

const fn hidden(command: &'static str, description: &'static str) -> CatalogEntry {
    CatalogEntry {
        command,
        description,
        hidden: true,
    }
}

const BUILTIN: &[CatalogEntry] = &[
    entry("status", "Show the working tree status"),
    entry("add <path>", "Stage changes in a path"),
    entry("add --all", "Stage every change"),
    entry("add --patch", "Interactively stage hunks"),
    entry("restore --staged <path>", "Unstage a path"),
    entry("restore <path>", "Discard working tree changes in a path"),
    entry("commit", "Record staged changes"),
    entry("commit -m <message>", "Commit with a message"),
    entry("commit --amend", "Rewrite the last commit"),
    entry("commit --amend --no-edit", "Amend without editing the message"),
    entry("diff", "Show unstaged changes"),
    entry("diff --staged", "Show staged changes"),
    entry("log --oneline --graph --decorate", "Show compact history"),
    entry("log -n <count>", "Show the last commits"),
    entry("show <rev>", "Show a commit"),
    entry("branch", "List branches"),
    entry("branch <name>", "Create a branch"),
    entry("branch -d <name>", "Delete a merged branch"),
    entry("switch <branch>", "Switch branches"),
    entry("switch -c <branch>", "Create and switch to a branch"),
    entry("checkout <branch>", "Check out a branch"),
    entry("merge <branch>", "Merge a branch into the current one"),
    entry("rebase <upstream>", "Rebase onto another branch"),
    entry("rebase --continue", "Continue an interrupted rebase"),
    entry("rebase --abort", "Abort the current rebase"),
    entry("cherry-pick <rev>", "Apply an existing commit"),
    entry("fetch", "Download objects and refs"),
    entry("fetch --prune", "Fetch and drop deleted remote branches"),
    entry("pull", "Fetch and integrate"),
    entry("pull --rebase", "Fetch and rebase"),
    entry("push", "Update the remote branch"),
    entry("push -u <remote> <branch>", "Push and set upstream"),
    entry("push --force-with-lease", "Force push safely"),
    entry("stash", "Stash working changes"),
    entry("stash pop", "Apply and drop the latest stash"),
    entry("stash list", "List stashes"),
    entry("stash drop <stash>", "Drop a stash entry"),
    entry("tag <name>", "Create a lightweight tag"),
    entry("tag -a <name> -m <message>", "Create an annotated tag"),
    entry("remote -v", "List remotes"),
    entry("reset --soft HEAD~<count>", "Undo commits, keep changes staged"),
    entry("reset --hard <rev>", "Reset the branch and working tree"),
    entry("clean -nd", "Preview untracked files to remove"),
    entry("blame <path>", "Show who changed each line"),
    entry("grep <pattern>", "Search tracked files"),
    hidden("update-index --refresh", "Refresh the index"),
    hidden("rev-parse --show-toplevel", "Print the repository root"),
];

pub fn builtin_catalog() -> Vec<CommandInfo> {
    prepare_catalog(BUILTIN)
}

/// Drops hidden rows and repeated commands, keeping first-seen order.
pub fn prepare_catalog(entries: &[CatalogEntry]) -> Vec<CommandInfo> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter(|entry| !entry.hidden && !entry.command.trim().is_empty())
        .filter(|entry| seen.insert(entry.command))
        .map(|entry| CommandInfo::new(entry.command, entry.description))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_and_duplicate_rows_are_filtered() {
        let catalog = prepare_catalog(&[
            entry("status", "a"),
            hidden("gc", "b"),
            entry("push", "c"),
            entry("status", "d"),
            entry("  ", "e"),
        ]);
        let commands: Vec<&str> = catalog.iter().map(|c| c.command.as_str()).collect();
        assert_eq!(commands, vec!["status", "push"]);
        assert_eq!(catalog[0].description, "a");
    }

    #[test]
    fn builtin_catalog_is_unique() {
        let catalog = builtin_catalog();
        let mut seen = HashSet::new();
        for info in &catalog {
            assert!(seen.insert(info.command.clone()), "duplicate {}", info.command);
        }
        assert!(catalog.iter().all(|info| !info.command.starts_with("rev-parse")));
    }
}
