use ratatui::style::Color;

// Dark surfaces with one accent. New roles go here, not inline in widgets.
pub const BG: Color = Color::Rgb(12, 14, 18);
pub const BAR_BG: Color = Color::Rgb(20, 24, 31);
pub const SELECTION_BG: Color = Color::Rgb(40, 33, 20);

pub const FG: Color = Color::Rgb(226, 228, 233);
pub const MUTED: Color = Color::Rgb(150, 158, 171);
pub const DIM: Color = Color::Rgb(100, 108, 122);
pub const BORDER: Color = Color::Rgb(52, 61, 76);
pub const BORDER_FOCUS: Color = Color::Rgb(240, 150, 40);

pub const ACCENT: Color = Color::Rgb(240, 150, 40);

// Git status.
pub const BRANCH: Color = Color::Rgb(125, 200, 240);
pub const STAGED: Color = Color::Rgb(134, 239, 172);
pub const MODIFIED: Color = Color::Rgb(250, 204, 21);
pub const UNTRACKED: Color = Color::Rgb(248, 113, 113);

pub const PLACEHOLDER: Color = Color::Rgb(196, 160, 250);
pub const READ_ONLY: Color = Color::Rgb(148, 163, 184);
pub const NOTICE: Color = Color::Rgb(253, 224, 71);
