use std::cmp::min;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthChar;

/// Single-line text buffer with a cursor measured in code points.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LineEditor {
    chars: Vec<char>,
    cursor: usize,
}

/// What an edit did to the visible line, in terminal columns.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Edit {
    /// Signed column movement of the cursor.
    pub column_delta: isize,
    /// Columns to step left from the old cursor before reprinting.
    pub back_cols: usize,
    /// First code point (in the new buffer) whose cell may have changed.
    pub dirty_from: Option<usize>,
}

impl Edit {
    pub fn is_noop(&self) -> bool {
        self.column_delta == 0 && self.dirty_from.is_none()
    }
}

/// Relative terminal operations that bring the screen in line after an edit.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TermOp {
    Left(u16),
    Right(u16),
    Print(String),
    ClearToEnd,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Display column of the cursor.
    pub fn cursor_column(&self) -> usize {
        width_of(&self.chars[..self.cursor])
    }

    pub fn insert_char(&mut self, ch: char) -> Edit {
        let ch = match ch {
            '\n' | '\r' | '\t' => ' ',
            other => other,
        };
        if ch.is_control() {
            return Edit::default();
        }
        self.splice_insert(&[ch])
    }

    /// Deletes the grapheme cluster before the cursor.
    pub fn backspace(&mut self) -> Edit {
        self.clamp_cursor();
        if self.cursor == 0 {
            return Edit::default();
        }
        let start = self.cluster_start(self.cursor);
        self.delete_range(start, self.cursor)
    }

    pub fn move_left(&mut self) -> Edit {
        self.clamp_cursor();
        let target = self.cluster_start(self.cursor);
        self.move_to(target)
    }

    pub fn move_right(&mut self) -> Edit {
        self.clamp_cursor();
        let target = self.cluster_end(self.cursor);
        self.move_to(target)
    }

    pub fn move_home(&mut self) -> Edit {
        self.move_to(0)
    }

    pub fn move_end(&mut self) -> Edit {
        self.move_to(self.chars.len())
    }

    pub fn move_word_left(&mut self) -> Edit {
        self.clamp_cursor();
        let target = self.word_left_target();
        self.move_to(target)
    }

    pub fn move_word_right(&mut self) -> Edit {
        self.clamp_cursor();
        let target = self.word_right_target();
        self.move_to(target)
    }

    pub fn delete_word_left(&mut self) -> Edit {
        self.clamp_cursor();
        let target = self.word_left_target();
        self.delete_range(target, self.cursor)
    }

    pub fn delete_to_end(&mut self) -> Edit {
        self.clamp_cursor();
        if self.cursor == self.chars.len() {
            return Edit::default();
        }
        self.chars.truncate(self.cursor);
        Edit {
            column_delta: 0,
            back_cols: 0,
            dirty_from: Some(self.cursor),
        }
    }

    pub fn clear(&mut self) -> Edit {
        if self.chars.is_empty() {
            return Edit::default();
        }
        let back_cols = self.cursor_column();
        self.chars.clear();
        self.cursor = 0;
        Edit {
            column_delta: -(back_cols as isize),
            back_cols,
            dirty_from: Some(0),
        }
    }

    /// Turns an edit into relative cursor motions and partial reprints.
    pub fn repaint(&self, edit: &Edit) -> Vec<TermOp> {
        let mut ops = Vec::new();
        let Some(dirty_from) = edit.dirty_from else {
            push_motion(&mut ops, edit.column_delta);
            return ops;
        };

        push_motion(&mut ops, -(edit.back_cols as isize));
        let dirty_from = min(dirty_from, self.chars.len());
        let tail: String = self.chars[dirty_from..].iter().collect();
        if !tail.is_empty() {
            ops.push(TermOp::Print(tail));
        }
        ops.push(TermOp::ClearToEnd);
        let behind_cursor = width_of(&self.chars[self.cursor.max(dirty_from)..]);
        push_motion(&mut ops, -(behind_cursor as isize));
        ops
    }

    fn splice_insert(&mut self, inserted: &[char]) -> Edit {
        self.clamp_cursor();
        let at = self.cursor;
        self.chars.splice(at..at, inserted.iter().copied());
        self.cursor += inserted.len();
        Edit {
            column_delta: width_of(inserted) as isize,
            back_cols: 0,
            dirty_from: Some(at),
        }
    }

    fn delete_range(&mut self, start: usize, end: usize) -> Edit {
        if start >= end {
            return Edit::default();
        }
        let back_cols = width_of(&self.chars[start..end]);
        self.chars.drain(start..end);
        if self.cursor >= end {
            self.cursor -= end - start;
        } else if self.cursor > start {
            self.cursor = start;
        }
        Edit {
            column_delta: -(back_cols as isize),
            back_cols,
            dirty_from: Some(start),
        }
    }

    fn move_to(&mut self, target: usize) -> Edit {
        let target = min(target, self.chars.len());
        let delta = if target >= self.cursor {
            width_of(&self.chars[self.cursor..target]) as isize
        } else {
            -(width_of(&self.chars[target..self.cursor]) as isize)
        };
        self.cursor = target;
        Edit {
            column_delta: delta,
            back_cols: 0,
            dirty_from: None,
        }
    }

    fn word_left_target(&self) -> usize {
        let mut index = self.cursor;
        while index > 0 && self.chars[index - 1].is_whitespace() {
            index -= 1;
        }
        while index > 0 && !self.chars[index - 1].is_whitespace() {
            index -= 1;
        }
        index
    }

    fn word_right_target(&self) -> usize {
        let len = self.chars.len();
        let mut index = self.cursor;
        while index < len && self.chars[index].is_whitespace() {
            index += 1;
        }
        while index < len && !self.chars[index].is_whitespace() {
            index += 1;
        }
        index
    }

    /// Code point offsets of every cluster boundary, including both ends.
    fn cluster_bounds(&self) -> Vec<usize> {
        let text = self.text();
        let mut bounds = vec![0];
        let mut offset = 0;
        for grapheme in text.graphemes(true) {
            offset += grapheme.chars().count();
            bounds.push(offset);
        }
        bounds
    }

    /// Start of the grapheme cluster that ends at `end`.
    fn cluster_start(&self, end: usize) -> usize {
        self.cluster_bounds()
            .into_iter()
            .take_while(|bound| *bound < end)
            .last()
            .unwrap_or(0)
    }

    /// End of the grapheme cluster that starts at `start`.
    fn cluster_end(&self, start: usize) -> usize {
        self.cluster_bounds()
            .into_iter()
            .find(|bound| *bound > start)
            .unwrap_or(self.chars.len())
    }

    fn clamp_cursor(&mut self) {
        self.cursor = min(self.cursor, self.chars.len());
    }
}

fn push_motion(ops: &mut Vec<TermOp>, columns: isize) {
    let amount = u16::try_from(columns.unsigned_abs()).unwrap_or(u16::MAX);
    if amount == 0 {
        return;
    }
    if columns < 0 {
        ops.push(TermOp::Left(amount));
    } else {
        ops.push(TermOp::Right(amount));
    }
}

fn width_of(chars: &[char]) -> usize {
    chars.iter().map(|ch| rune_width(*ch)).sum()
}

/// Terminal cells a code point occupies.
pub fn rune_width(ch: char) -> usize {
    if is_invisible(ch) {
        return 0;
    }
    if is_regional_indicator(ch) {
        return 1;
    }
    if is_wide_emoji(ch) {
        return 2;
    }
    match UnicodeWidthChar::width(ch) {
        Some(0) | None => 0,
        Some(2) => 2,
        Some(_) => 1,
    }
}

/// Joiners, selectors and modifiers that never take a cell of their own.
fn is_invisible(ch: char) -> bool {
    matches!(
        ch as u32,
        0x200b..=0x200d | 0xfe00..=0xfe0f | 0x1f3fb..=0x1f3ff | 0xe0020..=0xe007f | 0xe0100..=0xe01ef
    )
}

fn is_regional_indicator(ch: char) -> bool {
    matches!(ch as u32, 0x1f1e6..=0x1f1ff)
}

fn is_wide_emoji(ch: char) -> bool {
    matches!(
        ch as u32,
        0x1f300..=0x1f64f | 0x1f680..=0x1f6ff | 0x1f900..=0x1f9ff | 0x1fa70..=0x1faff
    )
}
