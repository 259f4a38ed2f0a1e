mod fuzzy;
mod keybindings;
mod keys;
mod placeholder;
mod profiles;
mod types;
mod workflow;

pub use fuzzy::*;
pub use keybindings::*;
pub use keys::*;
pub use placeholder::*;
pub use types::*;
pub use workflow::*;
