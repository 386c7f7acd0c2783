use unicode_width::UnicodeWidthStr;

/// Terminal display width of a string (first line only)
pub fn display_width(s: &str) -> usize {
    s.lines().next().map(UnicodeWidthStr::width).unwrap_or(0)
}

/// Number of characters (not bytes) in a string
pub fn char_count(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of a character index, clamped to the end of the string
fn byte_offset(s: &str, char_idx: usize) -> usize {
    s.char_indices().nth(char_idx).map(|(i, _)| i).unwrap_or(s.len())
}

/// Insert a character at a character index
pub fn insert_char_at(s: &mut String, char_idx: usize, c: char) {
    let at = byte_offset(s, char_idx);
    s.insert(at, c);
}

/// Remove the character at a character index, returning it
pub fn remove_char_at(s: &mut String, char_idx: usize) -> Option<char> {
    if char_idx >= char_count(s) {
        return None;
    }
    let at = byte_offset(s, char_idx);
    Some(s.remove(at))
}

/// Convert a column index to Excel-style letters (0 -> A, 25 -> Z, 26 -> AA, etc.)
pub fn col_to_letters(mut col: usize) -> String {
    let mut result = String::new();
    loop {
        result.insert(0, (b'A' + (col % 26) as u8) as char);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    result
}
