mod catalog;
mod config;
mod git;
mod logging;
mod prompt;
mod terminal;
mod watch;

pub use catalog::*;
pub use config::*;
pub use git::*;
pub use logging::*;
pub use prompt::*;
pub use terminal::*;
pub use watch::*;
