use std::cmp::min;

/// Single-line editor for the directory path field.
///
/// Editing methods return `true` when the text changed, which is what triggers revalidation.
#[derive(Clone, Debug, Default)]
pub struct PathInput {
    text: String,
    cursor_col: usize,
}

impl PathInput {
    pub fn from_text(text: &str) -> Self {
        let text = strip_line_breaks(text);
        let cursor_col = text.chars().count();
        Self { text, cursor_col }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor_col(&self) -> usize {
        self.cursor_col
    }

    pub fn insert_char(&mut self, ch: char) -> bool {
        let mut buffer = [0u8; 4];
        self.insert_str(ch.encode_utf8(&mut buffer))
    }

    /// Inserts pasted text; line breaks are dropped since a path never spans lines.
    pub fn insert_str(&mut self, text: &str) -> bool {
        let cleaned = strip_line_breaks(text);
        if cleaned.is_empty() {
            return false;
        }

        self.clamp_cursor();
        let byte_index = char_to_byte_index(&self.text, self.cursor_col);
        self.text.insert_str(byte_index, &cleaned);
        self.cursor_col += cleaned.chars().count();
        true
    }

    pub fn backspace(&mut self) -> bool {
        self.clamp_cursor();
        if self.cursor_col == 0 {
            return false;
        }

        let byte_index = char_to_byte_index(&self.text, self.cursor_col - 1);
        self.text.remove(byte_index);
        self.cursor_col -= 1;
        true
    }

    pub fn delete_forward(&mut self) -> bool {
        self.clamp_cursor();
        if self.cursor_col >= self.text.chars().count() {
            return false;
        }

        let byte_index = char_to_byte_index(&self.text, self.cursor_col);
        self.text.remove(byte_index);
        true
    }

    /// Removes the path segment left of the cursor, including its trailing separator.
    pub fn delete_segment_back(&mut self) -> bool {
        self.clamp_cursor();
        if self.cursor_col == 0 {
            return false;
        }

        let chars = self.text.chars().collect::<Vec<_>>();
        let mut start = self.cursor_col;
        while start > 0 && chars[start - 1] == '/' {
            start -= 1;
        }
        while start > 0 && chars[start - 1] != '/' {
            start -= 1;
        }

        let from = char_to_byte_index(&self.text, start);
        let to = char_to_byte_index(&self.text, self.cursor_col);
        self.text.replace_range(from..to, "");
        self.cursor_col = start;
        true
    }

    pub fn clear(&mut self) -> bool {
        if self.text.is_empty() {
            return false;
        }
        self.text.clear();
        self.cursor_col = 0;
        true
    }

    pub fn move_left(&mut self) {
        self.clamp_cursor();
        self.cursor_col = self.cursor_col.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.clamp_cursor();
        self.cursor_col = (self.cursor_col + 1).min(self.text.chars().count());
    }

    pub fn move_home(&mut self) {
        self.cursor_col = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor_col = self.text.chars().count();
    }

    fn clamp_cursor(&mut self) {
        let len = self.text.chars().count();
        self.cursor_col = min(self.cursor_col, len);
    }
}

fn strip_line_breaks(text: &str) -> String {
    text.chars().filter(|ch| !matches!(ch, '\n' | '\r')).collect()
}

fn char_to_byte_index(text: &str, char_index: usize) -> usize {
    match text.char_indices().nth(char_index) {
        Some((idx, _)) => idx,
        None => text.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edits_report_whether_text_changed() {
        let mut input = PathInput::default();
        assert!(!input.backspace());
        assert!(input.insert_str("/tmp"));
        assert!(!input.delete_forward());
        input.move_left();
        assert!(input.delete_forward());
        assert_eq!(input.text(), "/tm");
        assert!(!input.insert_str("\n"));
    }

    #[test]
    fn unicode_paths_keep_cursor_in_chars() {
        let mut input = PathInput::from_text("/home/zoë");
        assert_eq!(input.cursor_col(), 9);
        input.backspace();
        input.insert_char('e');
        assert_eq!(input.text(), "/home/zoe");
    }

    #[test]
    fn paste_drops_line_breaks_but_keeps_spaces() {
        let mut input = PathInput::default();
        input.insert_str("/tmp/my dir\r\n");
        assert_eq!(input.text(), "/tmp/my dir");
    }

    #[test]
    fn delete_segment_back_removes_last_component() {
        let mut input = PathInput::from_text("/var/log/nginx/");
        assert!(input.delete_segment_back());
        assert_eq!(input.text(), "/var/log/");
        assert!(input.delete_segment_back());
        assert_eq!(input.text(), "/var/");
        input.move_home();
        assert!(!input.delete_segment_back());
    }
}
