use crate::domain::keys::{AltKey, KeyParseError, KeyStroke, parse_key};
use crate::domain::profiles::{search_defaults, workflow_defaults};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, warn};

/// The closed set of actions a key can be bound to.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Action {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MoveWordLeft,
    MoveWordRight,
    MoveToBeginning,
    MoveToEnd,
    DeleteBackward,
    DeleteWord,
    DeleteToEnd,
    ClearLine,
    Submit,
    AddToWorkflow,
    ToggleWorkflowView,
    WorkflowCreate,
    WorkflowDelete,
    WorkflowClear,
    WorkflowClone,
    WorkflowExecute,
    WorkflowSelect,
    WorkflowRemoveStep,
    WorkflowCancel,
    SoftCancel,
    Quit,
}

impl Action {
    /// Lookup order. When two actions share a stroke in one context the earlier one wins.
    pub const ALL: [Action; 25] = [
        Action::SoftCancel,
        Action::Quit,
        Action::ToggleWorkflowView,
        Action::Submit,
        Action::MoveUp,
        Action::MoveDown,
        Action::MoveLeft,
        Action::MoveRight,
        Action::MoveWordLeft,
        Action::MoveWordRight,
        Action::MoveToBeginning,
        Action::MoveToEnd,
        Action::DeleteBackward,
        Action::DeleteWord,
        Action::DeleteToEnd,
        Action::ClearLine,
        Action::AddToWorkflow,
        Action::WorkflowCreate,
        Action::WorkflowDelete,
        Action::WorkflowClear,
        Action::WorkflowClone,
        Action::WorkflowExecute,
        Action::WorkflowSelect,
        Action::WorkflowRemoveStep,
        Action::WorkflowCancel,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::MoveUp => "move_up",
            Self::MoveDown => "move_down",
            Self::MoveLeft => "move_left",
            Self::MoveRight => "move_right",
            Self::MoveWordLeft => "move_word_left",
            Self::MoveWordRight => "move_word_right",
            Self::MoveToBeginning => "move_to_beginning",
            Self::MoveToEnd => "move_to_end",
            Self::DeleteBackward => "delete_backward",
            Self::DeleteWord => "delete_word",
            Self::DeleteToEnd => "delete_to_end",
            Self::ClearLine => "clear_line",
            Self::Submit => "submit",
            Self::AddToWorkflow => "add_to_workflow",
            Self::ToggleWorkflowView => "toggle_workflow_view",
            Self::WorkflowCreate => "workflow_create",
            Self::WorkflowDelete => "workflow_delete",
            Self::WorkflowClear => "workflow_clear",
            Self::WorkflowClone => "workflow_clone",
            Self::WorkflowExecute => "workflow_execute",
            Self::WorkflowSelect => "workflow_select",
            Self::WorkflowRemoveStep => "workflow_remove_step",
            Self::WorkflowCancel => "workflow_cancel",
            Self::SoftCancel => "soft_cancel",
            Self::Quit => "quit",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|action| action.name() == normalized)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Context {
    #[default]
    Global,
    Input,
    Results,
    Search,
    WorkflowView,
    WorkflowSelection,
}

impl Context {
    pub const ALL: [Context; 6] = [
        Context::Global,
        Context::Input,
        Context::Results,
        Context::Search,
        Context::WorkflowView,
        Context::WorkflowSelection,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Input => "input",
            Self::Results => "results",
            Self::Search => "search",
            Self::WorkflowView => "workflow_view",
            Self::WorkflowSelection => "workflow_selection",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|context| context.name() == normalized)
    }

    pub fn is_workflow(self) -> bool {
        matches!(self, Self::WorkflowView | Self::WorkflowSelection)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Profile {
    #[default]
    Default,
    Emacs,
    Vi,
    Readline,
}

impl Profile {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "" | "default" => Some(Self::Default),
            "emacs" => Some(Self::Emacs),
            "vi" | "vim" => Some(Self::Vi),
            "readline" => Some(Self::Readline),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Emacs => "emacs",
            Self::Vi => "vi",
            Self::Readline => "readline",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Platform {
    MacOs,
    Linux,
    Windows,
    #[default]
    Other,
}

impl Platform {
    pub fn from_os(os: &str) -> Self {
        match os {
            "macos" => Self::MacOs,
            "linux" => Self::Linux,
            "windows" => Self::Windows,
            _ => Self::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::MacOs => "macOS",
            Self::Linux => "Linux",
            Self::Windows => "Windows",
            Self::Other => "other",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Terminal {
    AppleTerminal,
    ITerm2,
    Tmux,
    Screen,
    Rxvt,
    WindowsTerminal,
    Xterm,
    Dumb,
    #[default]
    Unknown,
}

impl Terminal {
    pub fn label(self) -> &'static str {
        match self {
            Self::AppleTerminal => "Apple Terminal",
            Self::ITerm2 => "iTerm2",
            Self::Tmux => "tmux",
            Self::Screen => "screen",
            Self::Rxvt => "rxvt",
            Self::WindowsTerminal => "Windows Terminal",
            Self::Xterm => "xterm-compatible",
            Self::Dumb => "dumb",
            Self::Unknown => "unknown",
        }
    }
}

/// Platform and terminal the bindings are resolved for.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Environment {
    pub platform: Platform,
    pub terminal: Terminal,
}

impl Environment {
    /// Detects the terminal from the usual environment variables. `var` is a lookup
    /// such as `std::env::var(..).ok()`.
    pub fn detect(os: &str, var: impl Fn(&str) -> Option<String>) -> Self {
        let platform = Platform::from_os(os);
        let term = var("TERM").unwrap_or_default().to_lowercase();
        let term_program = var("TERM_PROGRAM").unwrap_or_default();

        let terminal = if var("TMUX").is_some_and(|value| !value.is_empty()) {
            Terminal::Tmux
        } else if term.starts_with("screen") {
            Terminal::Screen
        } else if term_program == "Apple_Terminal" {
            Terminal::AppleTerminal
        } else if term_program == "iTerm.app" {
            Terminal::ITerm2
        } else if var("WT_SESSION").is_some() {
            Terminal::WindowsTerminal
        } else if term.contains("rxvt") {
            Terminal::Rxvt
        } else if term == "dumb" {
            Terminal::Dumb
        } else if term.contains("xterm")
            || term.contains("kitty")
            || term.contains("alacritty")
            || term.contains("wezterm")
            || term_program == "WezTerm"
            || term_program == "vscode"
        {
            Terminal::Xterm
        } else {
            Terminal::Unknown
        };

        Self { platform, terminal }
    }
}

/// Actions of one context mapped to their stroke alternatives. An empty list means unbound.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct KeyBindingMap {
    bindings: HashMap<Action, Vec<KeyStroke>>,
}

impl KeyBindingMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, action: Action, strokes: Vec<KeyStroke>) {
        self.bindings.insert(action, strokes);
    }

    /// Appends alternatives that are not already bound to `action`.
    pub fn extend(&mut self, action: Action, strokes: impl IntoIterator<Item = KeyStroke>) {
        let entry = self.bindings.entry(action).or_default();
        for stroke in strokes {
            if !entry.contains(&stroke) {
                entry.push(stroke);
            }
        }
    }

    pub fn keys(&self, action: Action) -> &[KeyStroke] {
        self.bindings
            .get(&action)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn matches(&self, action: Action, stroke: &KeyStroke) -> bool {
        stroke.matches_any(self.keys(action))
    }

    pub fn action_for(&self, stroke: &KeyStroke) -> Option<Action> {
        Action::ALL
            .iter()
            .copied()
            .find(|action| self.matches(*action, stroke))
    }
}

/// One binding map per context plus what it was resolved for.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContextualKeyBindingMap {
    maps: BTreeMap<Context, KeyBindingMap>,
    pub profile: Profile,
    pub environment: Environment,
}

impl ContextualKeyBindingMap {
    /// Profile defaults with terminal adjustments and no user overrides.
    pub fn for_profile(profile: Profile, environment: Environment) -> Self {
        let maps = Context::ALL
            .iter()
            .map(|context| {
                let mut map = profile_map(profile, *context);
                apply_environment(&mut map, environment);
                (*context, map)
            })
            .collect();
        Self {
            maps,
            profile,
            environment,
        }
    }

    #[cfg(test)]
    pub fn builtin() -> Self {
        Self::for_profile(Profile::Default, Environment::default())
    }

    pub fn map(&self, context: Context) -> &KeyBindingMap {
        static EMPTY: std::sync::OnceLock<KeyBindingMap> = std::sync::OnceLock::new();
        self.maps
            .get(&context)
            .unwrap_or_else(|| EMPTY.get_or_init(KeyBindingMap::new))
    }

    pub fn keys(&self, context: Context, action: Action) -> &[KeyStroke] {
        self.map(context).keys(action)
    }

    pub fn matches_key_stroke(&self, context: Context, action: Action, stroke: &KeyStroke) -> bool {
        self.map(context).matches(action, stroke)
    }

    pub fn action_for(&self, context: Context, stroke: &KeyStroke) -> Option<Action> {
        self.map(context).action_for(stroke)
    }
}

/// Sparse user overrides: context name -> action name -> key strings.
pub type KeybindingOverrides = BTreeMap<String, BTreeMap<String, Vec<String>>>;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unknown keybinding context '{0}'")]
    UnknownContext(String),

    #[error("unknown action '{action}' in context '{context}'")]
    UnknownAction { context: String, action: String },

    #[error("invalid key for '{action}' in context '{context}': {source}")]
    InvalidKey {
        context: String,
        action: String,
        #[source]
        source: KeyParseError,
    },
}

#[derive(Clone, Debug)]
pub struct Resolution {
    pub map: ContextualKeyBindingMap,
    pub warnings: Vec<String>,
}

/// Resolves bindings: profile defaults, then terminal adjustments, then user overrides.
/// A bad override drops every override and keeps the chosen profile's defaults.
pub fn resolve_keybindings(
    profile_name: &str,
    environment: Environment,
    overrides: &KeybindingOverrides,
) -> Resolution {
    let mut warnings = Vec::new();
    let profile = match Profile::from_name(profile_name) {
        Some(profile) => profile,
        None => {
            let message = format!("unknown profile '{profile_name}', using default");
            warn!(profile = profile_name, "unknown keybinding profile, using default");
            warnings.push(message);
            Profile::Default
        }
    };

    match try_resolve(profile, environment, overrides) {
        Ok(map) => {
            debug!(
                profile = profile.name(),
                platform = environment.platform.label(),
                terminal = environment.terminal.label(),
                "resolved keybindings"
            );
            Resolution { map, warnings }
        }
        Err(error) => {
            warn!(%error, profile = profile.name(), "ignoring keybinding overrides");
            warnings.push(format!(
                "{error}; using {} profile defaults",
                profile.name()
            ));
            Resolution {
                map: ContextualKeyBindingMap::for_profile(profile, environment),
                warnings,
            }
        }
    }
}

pub fn try_resolve(
    profile: Profile,
    environment: Environment,
    overrides: &KeybindingOverrides,
) -> Result<ContextualKeyBindingMap, ResolveError> {
    let parsed = parse_overrides(overrides)?;
    let global_overrides = parsed.get(&Context::Global);

    let mut resolved = ContextualKeyBindingMap::for_profile(profile, environment);
    for (context, map) in resolved.maps.iter_mut() {
        // Global overrides are the base layer for every context.
        if let Some(global) = global_overrides {
            for (action, strokes) in global {
                map.bind(*action, strokes.clone());
            }
        }
        if *context != Context::Global {
            if let Some(specific) = parsed.get(context) {
                for (action, strokes) in specific {
                    map.bind(*action, strokes.clone());
                }
            }
        }
    }
    Ok(resolved)
}

type ParsedOverrides = BTreeMap<Context, Vec<(Action, Vec<KeyStroke>)>>;

fn parse_overrides(overrides: &KeybindingOverrides) -> Result<ParsedOverrides, ResolveError> {
    let mut parsed = ParsedOverrides::new();
    for (context_name, actions) in overrides {
        let context = Context::from_name(context_name)
            .ok_or_else(|| ResolveError::UnknownContext(context_name.clone()))?;
        let entry = parsed.entry(context).or_default();
        for (action_name, keys) in actions {
            let action =
                Action::from_name(action_name).ok_or_else(|| ResolveError::UnknownAction {
                    context: context_name.clone(),
                    action: action_name.clone(),
                })?;
            let mut strokes = Vec::new();
            for key in keys {
                let alternatives = parse_key(key).map_err(|source| ResolveError::InvalidKey {
                    context: context_name.clone(),
                    action: action_name.clone(),
                    source,
                })?;
                for stroke in alternatives {
                    if !strokes.contains(&stroke) {
                        strokes.push(stroke);
                    }
                }
            }
            entry.push((action, strokes));
        }
    }
    Ok(parsed)
}

fn profile_map(profile: Profile, context: Context) -> KeyBindingMap {
    if context.is_workflow() {
        workflow_defaults(profile)
    } else {
        search_defaults(profile)
    }
}

/// Adds the encodings a given platform/terminal sends for keys the profiles bind
/// by their canonical CSI form.
fn apply_environment(map: &mut KeyBindingMap, environment: Environment) {
    let arrows: [(Action, &[u8; 3], &[u8; 3]); 4] = [
        (Action::MoveUp, b"\x1b[A", b"\x1bOA"),
        (Action::MoveDown, b"\x1b[B", b"\x1bOB"),
        (Action::MoveRight, b"\x1b[C", b"\x1bOC"),
        (Action::MoveLeft, b"\x1b[D", b"\x1bOD"),
    ];
    let application_cursor = !matches!(
        environment.terminal,
        Terminal::WindowsTerminal | Terminal::Dumb
    );
    if application_cursor {
        for (action, csi, ss3) in arrows {
            if map.matches(action, &KeyStroke::raw(csi)) {
                map.extend(action, [KeyStroke::raw(ss3)]);
            }
        }
    }

    let (home, end) = match environment.terminal {
        Terminal::Tmux | Terminal::Screen => (
            vec![KeyStroke::raw(b"\x1b[1~")],
            vec![KeyStroke::raw(b"\x1b[4~")],
        ),
        Terminal::Rxvt => (
            vec![KeyStroke::raw(b"\x1b[7~")],
            vec![KeyStroke::raw(b"\x1b[8~")],
        ),
        Terminal::WindowsTerminal | Terminal::Dumb => (Vec::new(), Vec::new()),
        _ => (
            vec![KeyStroke::raw(b"\x1bOH"), KeyStroke::raw(b"\x1b[1~")],
            vec![KeyStroke::raw(b"\x1bOF"), KeyStroke::raw(b"\x1b[4~")],
        ),
    };
    if !map.keys(Action::MoveToBeginning).is_empty() {
        map.extend(Action::MoveToBeginning, home);
    }
    if !map.keys(Action::MoveToEnd).is_empty() {
        map.extend(Action::MoveToEnd, end);
    }

    // Option+arrow in macOS terminals sends ESC b / ESC f by default.
    let mac_word_keys = environment.platform == Platform::MacOs
        || matches!(
            environment.terminal,
            Terminal::AppleTerminal | Terminal::ITerm2
        );
    if mac_word_keys {
        if !map.keys(Action::MoveWordLeft).is_empty() {
            map.extend(Action::MoveWordLeft, [KeyStroke::Alt(AltKey::Char('b'))]);
        }
        if !map.keys(Action::MoveWordRight).is_empty() {
            map.extend(Action::MoveWordRight, [KeyStroke::Alt(AltKey::Char('f'))]);
        }
    }
}

/// Shared handle to the active bindings and the UI's current context.
///
/// The map is swapped atomically on config reload; readers take a snapshot.
#[derive(Debug)]
pub struct KeyBindingResolver {
    map: RwLock<Arc<ContextualKeyBindingMap>>,
    context: RwLock<Context>,
}

impl KeyBindingResolver {
    pub fn new(map: ContextualKeyBindingMap) -> Self {
        Self {
            map: RwLock::new(Arc::new(map)),
            context: RwLock::new(Context::Global),
        }
    }

    pub fn snapshot(&self) -> Arc<ContextualKeyBindingMap> {
        self.map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, map: ContextualKeyBindingMap) {
        let mut slot = self.map.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Arc::new(map);
    }

    pub fn set_context(&self, context: Context) {
        let mut slot = self.context.write().unwrap_or_else(PoisonError::into_inner);
        *slot = context;
    }

    pub fn current_context(&self) -> Context {
        *self.context.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn action_for(&self, stroke: &KeyStroke) -> Option<Action> {
        self.snapshot().action_for(self.current_context(), stroke)
    }

    pub fn matches_key_stroke(&self, action: Action, stroke: &KeyStroke) -> bool {
        self.snapshot()
            .matches_key_stroke(self.current_context(), action, stroke)
    }

    /// Display label of the first binding for `action` in the current context.
    pub fn hint(&self, action: Action) -> Option<String> {
        self.snapshot()
            .keys(self.current_context(), action)
            .first()
            .map(ToString::to_string)
    }
}
