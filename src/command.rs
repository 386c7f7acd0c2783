/// Commands typed at the prompt. Column and row commands act on the cursor's column or row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Write,
    Quit,
    ForceQuit,
    WriteQuit,
    InsertColumn { name: String, before: bool },
    DeleteColumn,
    RenameColumn(String),
    /// 0-based target position
    MoveColumn(usize),
    /// Column instruction for the current column; empty clears it
    Note(String),
    InsertRows(usize),
    DeleteRow,
    /// 0-based target position
    MoveRow(usize),
    NavigateRow(usize),
    /// `column=value` pairs for the cursor's row, applied as a background row update
    Fill(Vec<(String, String)>),
    Rename(String),
    Open(String),
    New(String),
    Retry,
    Recover,
    Discard,
    Unknown(String),
}

/// Parse a 1-based position argument into a 0-based index
fn position(arg: &str) -> Option<usize> {
    arg.trim().parse::<usize>().ok().filter(|n| *n > 0).map(|n| n - 1)
}

/// Parse `Cue=Doors; Stage Notes=dim` into column/value pairs
fn fields(arg: &str) -> Option<Vec<(String, String)>> {
    if arg.is_empty() {
        return None;
    }
    arg.split(';')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            let (column, value) = part.split_once('=')?;
            let column = column.trim();
            (!column.is_empty()).then(|| (column.to_string(), value.trim().to_string()))
        })
        .collect::<Option<Vec<_>>>()
        .filter(|fields| !fields.is_empty())
}

impl Command {
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();

        if let Ok(row_dest) = trimmed.parse::<usize>() {
            return (row_dest > 0).then(|| Command::NavigateRow(row_dest - 1));
        }

        let (name, arg) = match trimmed.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (trimmed, ""),
        };

        let needs_arg = |build: fn(String) -> Command| {
            if arg.is_empty() {
                None
            } else {
                Some(build(arg.to_string()))
            }
        };

        match name {
            "w" => Some(Command::Write),
            "q" => Some(Command::Quit),
            "q!" => Some(Command::ForceQuit),
            "wq" => Some(Command::WriteQuit),
            "ic" | "addcol" => needs_arg(|name| Command::InsertColumn { name, before: false }),
            "icb" => needs_arg(|name| Command::InsertColumn { name, before: true }),
            "dc" | "delcol" => Some(Command::DeleteColumn),
            "rc" | "renamecol" => needs_arg(Command::RenameColumn),
            "mc" => position(arg).map(Command::MoveColumn),
            "note" => Some(Command::Note(arg.to_string())),
            "ir" => {
                if arg.is_empty() {
                    Some(Command::InsertRows(1))
                } else {
                    arg.parse::<usize>().ok().map(Command::InsertRows)
                }
            }
            "dr" | "delrow" => Some(Command::DeleteRow),
            "mr" => position(arg).map(Command::MoveRow),
            "fill" => fields(arg).map(Command::Fill),
            "name" => needs_arg(Command::Rename),
            "open" | "e" => needs_arg(Command::Open),
            "new" => needs_arg(Command::New),
            "retry" => Some(Command::Retry),
            "recover" => Some(Command::Recover),
            "discard" => Some(Command::Discard),
            _ => Some(Command::Unknown(trimmed.to_string())),
        }
    }
}
