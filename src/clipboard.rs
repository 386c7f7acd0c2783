use tracing::{debug, warn};

use crate::error::GridError;
use crate::grid::GridModel;
use crate::selection::{CellPos, SelectionRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipKind {
    Copy,
    Cut,
}

/// The single pending copy/cut. `cells` is row-major; a single-cell copy is a 1x1 matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipboardPayload {
    pub kind: ClipKind,
    pub cells: Vec<Vec<String>>,
    /// Where a cut came from. The source is cleared only once a paste succeeds.
    pub source: Option<SelectionRange>,
}

impl ClipboardPayload {
    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    pub fn cols(&self) -> usize {
        self.cells.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    pub fn to_tsv(&self) -> String {
        to_tsv(&self.cells)
    }
}

/// What a paste did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PasteOutcome {
    pub written: usize,
    pub skipped: usize,
    pub cleared_source: usize,
}

/// Tab-separated columns, newline-separated rows
pub fn to_tsv(cells: &[Vec<String>]) -> String {
    cells
        .iter()
        .map(|row| row.join("\t"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse clipboard text as TSV. One trailing line break is ignored; ragged rows are kept as-is.
pub fn parse_tsv(text: &str) -> Vec<Vec<String>> {
    let text = text
        .strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text);
    text.split('\n')
        .map(|line| {
            line.trim_end_matches('\r')
                .split('\t')
                .map(str::to_string)
                .collect()
        })
        .collect()
}

/// Plain-text access to the operating system clipboard
pub trait SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), String>;
    fn get_text(&mut self) -> Result<String, String>;
}

/// The OS clipboard: command-line tools where available, arboard otherwise
#[derive(Debug, Default)]
pub struct NativeClipboard;

impl SystemClipboard for NativeClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), String> {
        copy_to_system_clipboard(text)
    }

    fn get_text(&mut self) -> Result<String, String> {
        paste_from_system_clipboard()
    }
}

/// Clipboard that never leaves the process. Used when no system clipboard is wanted.
#[derive(Debug, Default)]
pub struct InProcessClipboard {
    text: Option<String>,
}

impl SystemClipboard for InProcessClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), String> {
        self.text = Some(text.to_string());
        Ok(())
    }

    fn get_text(&mut self) -> Result<String, String> {
        self.text.clone().ok_or_else(|| "Clipboard is empty".to_string())
    }
}

pub struct Clipboard {
    payload: Option<ClipboardPayload>,
    /// System clipboard contents as of our last copy. If the system text differs, another
    /// application has copied since and its text wins.
    system_seen: Option<String>,
    system: Box<dyn SystemClipboard>,
}

impl Clipboard {
    pub fn new(system: Box<dyn SystemClipboard>) -> Self {
        Self {
            payload: None,
            system_seen: None,
            system,
        }
    }

    pub fn payload(&self) -> Option<&ClipboardPayload> {
        self.payload.as_ref()
    }

    pub fn copy(&mut self, grid: &GridModel, range: SelectionRange) -> String {
        self.store(ClipKind::Copy, grid, range)
    }

    /// Like copy, but the source range is cleared after the next successful paste
    pub fn cut(&mut self, grid: &GridModel, range: SelectionRange) -> String {
        self.store(ClipKind::Cut, grid, range)
    }

    fn store(&mut self, kind: ClipKind, grid: &GridModel, range: SelectionRange) -> String {
        let (r0, r1, c0, c1) = range.bounds();
        let Some(cells) = grid.get_span(r0, r1, c0, c1) else {
            return "Selection is outside the grid".to_string();
        };

        let payload = ClipboardPayload {
            kind,
            cells,
            source: (kind == ClipKind::Cut).then_some(range),
        };
        let tsv = payload.to_tsv();

        self.system_seen = match self.system.set_text(&tsv) {
            Ok(()) => Some(tsv),
            Err(e) => {
                warn!(error = %e, "system clipboard write failed");
                self.system.get_text().ok()
            }
        };

        let msg = match kind {
            ClipKind::Copy => format!("Copied {}x{}", payload.rows(), payload.cols()),
            ClipKind::Cut => format!("Cut {}x{}", payload.rows(), payload.cols()),
        };
        self.payload = Some(payload);
        msg
    }

    /// Drop a pending cut without touching the grid
    pub fn cancel_cut(&mut self) -> bool {
        if self.payload.as_ref().is_some_and(|p| p.kind == ClipKind::Cut) {
            self.payload = None;
            return true;
        }
        false
    }

    /// Pick the payload to paste: our own unless another application has written newer text
    fn resolve(&mut self) -> Option<ClipboardPayload> {
        let system_text = self.system.get_text().ok().filter(|t| !t.is_empty());

        match (&self.payload, system_text) {
            (Some(_), Some(text)) if self.system_seen.as_deref() != Some(text.as_str()) => {
                debug!("pasting external clipboard text");
                Some(ClipboardPayload {
                    kind: ClipKind::Copy,
                    cells: parse_tsv(&text),
                    source: None,
                })
            }
            (Some(payload), _) => Some(payload.clone()),
            (None, Some(text)) => Some(ClipboardPayload {
                kind: ClipKind::Copy,
                cells: parse_tsv(&text),
                source: None,
            }),
            (None, None) => None,
        }
    }

    /// Paste at `anchor`. Writes that fall outside the grid are skipped. A cut clears its
    /// source afterwards (cells overlapping the destination keep the pasted values) and
    /// becomes a plain copy so a second paste does not clear again.
    pub fn paste(&mut self, grid: &mut GridModel, anchor: CellPos) -> Result<Option<PasteOutcome>, GridError> {
        let Some(payload) = self.resolve() else {
            return Ok(None);
        };

        let mut outcome = PasteOutcome::default();
        let mut max_cols = 0;
        for (i, row) in payload.cells.iter().enumerate() {
            max_cols = max_cols.max(row.len());
            for (j, value) in row.iter().enumerate() {
                let (r, c) = (anchor.row + i, anchor.col + j);
                if r < grid.row_count() && c < grid.col_count() {
                    grid.set_cell_at(r, c, value.clone())?;
                    outcome.written += 1;
                } else {
                    outcome.skipped += 1;
                }
            }
        }

        if payload.kind == ClipKind::Cut {
            if let Some(source) = payload.source {
                let dest = SelectionRange::new(
                    anchor,
                    CellPos::new(
                        anchor.row + payload.rows().saturating_sub(1),
                        anchor.col + max_cols.saturating_sub(1),
                    ),
                );
                for pos in source.cells().filter(|p| !dest.contains(p.row, p.col)) {
                    if pos.row < grid.row_count() && pos.col < grid.col_count() {
                        grid.set_cell_at(pos.row, pos.col, String::new())?;
                        outcome.cleared_source += 1;
                    }
                }
            }
            if let Some(own) = self.payload.as_mut() {
                if own.kind == ClipKind::Cut {
                    own.kind = ClipKind::Copy;
                    own.source = None;
                }
            }
        }

        Ok(Some(outcome))
    }
}

/// Set every in-bounds cell of `range` to empty. Returns the number of cells cleared.
pub fn clear_range(grid: &mut GridModel, range: SelectionRange) -> Result<usize, GridError> {
    let mut cleared = 0;
    for pos in range.cells() {
        if pos.row < grid.row_count() && pos.col < grid.col_count() {
            grid.set_cell_at(pos.row, pos.col, String::new())?;
            cleared += 1;
        }
    }
    Ok(cleared)
}

/// Copy text to system clipboard using platform-appropriate method
fn copy_to_system_clipboard(text: &str) -> Result<(), String> {
    // Command-line tools are more reliable than arboard from inside a terminal on Linux
    #[cfg(target_os = "linux")]
    {
        use std::io::Write;
        use std::process::{Command, Stdio};

        let commands: [(&str, &[&str]); 3] = [
            ("wl-copy", &[]),
            ("xclip", &["-selection", "clipboard"]),
            ("xsel", &["--clipboard", "--input"]),
        ];

        for (cmd, args) in commands {
            if let Ok(mut child) = Command::new(cmd)
                .args(args)
                .stdin(Stdio::piped())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
            {
                if let Some(mut stdin) = child.stdin.take() {
                    if stdin.write_all(text.as_bytes()).is_ok() {
                        drop(stdin);
                        if child.wait().map(|s| s.success()).unwrap_or(false) {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    let mut clipboard = arboard::Clipboard::new().map_err(|e| format!("Clipboard error: {}", e))?;
    clipboard
        .set_text(text)
        .map_err(|e| format!("Clipboard error: {}", e))
}

/// Paste text from system clipboard using platform-appropriate method
fn paste_from_system_clipboard() -> Result<String, String> {
    #[cfg(target_os = "linux")]
    {
        use std::process::Command;

        let commands: [(&str, &[&str]); 3] = [
            ("wl-paste", &["--no-newline"]),
            ("xclip", &["-selection", "clipboard", "-o"]),
            ("xsel", &["--clipboard", "--output"]),
        ];

        for (cmd, args) in commands {
            if let Ok(output) = Command::new(cmd).args(args).output() {
                if output.status.success() {
                    return String::from_utf8(output.stdout)
                        .map_err(|_| "Clipboard contains invalid UTF-8".to_string());
                }
            }
        }
    }

    let mut clipboard = arboard::Clipboard::new().map_err(|e| format!("Clipboard error: {}", e))?;
    clipboard
        .get_text()
        .map_err(|e| format!("Clipboard error: {}", e))
}
