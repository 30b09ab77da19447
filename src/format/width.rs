//! Display-width bookkeeping for one line.

use unicode_width::UnicodeWidthChar;

/// Columns taken by `c` in a terminal. Control characters count as one
/// column because the formatter renders them as spaces.
pub fn char_width(c: char) -> usize {
    if c.is_control() {
        1
    } else {
        c.width().unwrap_or(0)
    }
}

pub fn str_width(s: &str) -> usize {
    s.chars().map(char_width).sum()
}

/// Punctuation and separators a cut may land next to.
const BREAK_CHARS: &[char] = &[
    ' ', '\t', ',', '.', ';', ':', '!', '?', '-', '_', '/', '\\', '|', '(', ')', '[', ']', '{', '}',
    '<', '>', '"', '\'', '`', '~', '@', '#', '$', '%', '^', '&', '*', '+', '=',
    '，', '。', '；', '：', '！', '？', '、', '—', '…', '（', '）', '【', '】', '｛', '｝', '《', '》',
    '「', '」', '『', '』', '“', '”', '‘', '’', '·', '～', '－', '＿', '／', '＼', '｜', '＋', '＝',
    '＊', '＆', '％', '＄', '＃', '＠', '\u{3000}',
];

pub fn is_break_char(c: char) -> bool {
    c.is_whitespace() || BREAK_CHARS.contains(&c)
}

/// CJK ideographs, kana and hangul. Each such character is its own word.
pub fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF
        | 0x3400..=0x4DBF
        | 0x3040..=0x309F
        | 0x30A0..=0x30FF
        | 0xAC00..=0xD7AF
        | 0xF900..=0xFAFF
        | 0x20000..=0x2A6DF)
}

/// Char boundaries of a line with prefix sums of display width.
///
/// Index `i` names the boundary before the `i`-th char; index `len()` is the
/// end of the line.
#[derive(Debug, Clone)]
pub struct WidthIndex {
    /// Byte offset of each boundary
    bytes: Vec<usize>,
    /// Columns before each boundary
    cols: Vec<usize>,
    /// Boundaries where a cut reads naturally, ascending
    breaks: Vec<usize>,
    /// `is_break` per boundary
    flags: Vec<bool>,
}

impl WidthIndex {
    pub fn new(text: &str) -> Self {
        let count = text.chars().count();
        let mut bytes = Vec::with_capacity(count + 1);
        let mut cols = Vec::with_capacity(count + 1);
        let mut breaks = Vec::new();
        let mut flags = vec![false; count + 1];

        let mut col = 0;
        let mut prev: Option<char> = None;
        for (idx, (offset, c)) in text.char_indices().enumerate() {
            if let Some(p) = prev {
                if is_break_char(p) || is_break_char(c) || is_cjk(p) || is_cjk(c) {
                    breaks.push(idx);
                    flags[idx] = true;
                }
            }
            bytes.push(offset);
            cols.push(col);
            col += char_width(c);
            prev = Some(c);
        }
        bytes.push(text.len());
        cols.push(col);
        flags[0] = true;
        flags[count] = true;

        Self {
            bytes,
            cols,
            breaks,
            flags,
        }
    }

    /// Number of chars.
    pub fn len(&self) -> usize {
        self.bytes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_width(&self) -> usize {
        self.cols[self.len()]
    }

    pub fn byte(&self, boundary: usize) -> usize {
        self.bytes[boundary]
    }

    pub fn col(&self, boundary: usize) -> usize {
        self.cols[boundary]
    }

    /// Columns between two boundaries.
    pub fn width(&self, from: usize, to: usize) -> usize {
        self.cols[to] - self.cols[from]
    }

    /// Boundary at or before byte offset `byte`.
    pub fn boundary_at_or_before(&self, byte: usize) -> usize {
        self.bytes.partition_point(|&b| b <= byte).saturating_sub(1)
    }

    /// Boundary at or after byte offset `byte`.
    pub fn boundary_at_or_after(&self, byte: usize) -> usize {
        self.bytes.partition_point(|&b| b < byte).min(self.len())
    }

    /// Leftmost boundary whose column is at least `col`.
    pub fn first_at_col(&self, col: usize) -> usize {
        self.cols.partition_point(|&c| c < col).min(self.len())
    }

    /// Rightmost boundary whose column is at most `col`.
    pub fn last_within_col(&self, col: usize) -> usize {
        self.cols.partition_point(|&c| c <= col).saturating_sub(1)
    }

    pub fn is_break(&self, boundary: usize) -> bool {
        self.flags.get(boundary).copied().unwrap_or(false)
    }

    /// Nearest break in `[from, limit]`, searching upward.
    pub fn break_at_or_after(&self, from: usize, limit: usize) -> Option<usize> {
        let pos = self.breaks.partition_point(|&b| b < from);
        self.breaks.get(pos).copied().filter(|&b| b <= limit)
    }

    /// Nearest break in `[limit, from]`, searching downward.
    pub fn break_at_or_before(&self, from: usize, limit: usize) -> Option<usize> {
        let pos = self.breaks.partition_point(|&b| b <= from);
        pos.checked_sub(1)
            .map(|i| self.breaks[i])
            .filter(|&b| b >= limit)
    }
}
