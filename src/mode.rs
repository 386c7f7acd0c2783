#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Moving and selecting cells
    #[default]
    Normal,
    /// A cell edit is open
    Edit,
    /// Typing at the command prompt
    Command,
}

impl Mode {
    pub fn display_name(&self) -> &'static str {
        match self {
            Mode::Normal => "NORMAL",
            Mode::Edit => "EDIT",
            Mode::Command => "COMMAND",
        }
    }
}
