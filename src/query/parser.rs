use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Number of distinct visual markers keywords cycle through.
pub const PALETTE_SIZE: usize = 7;

/// A single search term: a bare word or a quoted phrase.
///
/// Keywords are immutable once parsed. `color_index` is assigned from the
/// keyword's position in the parsed list, so the same query always paints
/// the same keyword with the same marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Keyword {
    pub text: String,
    pub is_phrase: bool,
    pub color_index: usize,
}

impl Keyword {
    pub fn literal(text: impl Into<String>, position: usize) -> Self {
        Self {
            text: text.into(),
            is_phrase: false,
            color_index: position % PALETTE_SIZE,
        }
    }

    pub fn phrase(text: impl Into<String>, position: usize) -> Self {
        Self {
            text: text.into(),
            is_phrase: true,
            color_index: position % PALETTE_SIZE,
        }
    }
}

/// Parse a raw query into an ordered, deduplicated keyword list.
///
/// Whitespace separates keywords except inside a quoted phrase. Straight
/// double quotes, backticks and the paired CJK marks (“…”, 「…」, 『…』,
/// ＂…＂) delimit phrases. A quote without its closing partner is kept as
/// an ordinary character of the word it starts. Never fails: an empty or
/// all-blank query gives an empty list.
pub fn parse_keywords(input: &str) -> Vec<Keyword> {
    let mut parser = KeywordParser::new(input);
    parser.parse();
    parser.finish()
}

/// Closing delimiter for a phrase opened by `open`, if `open` opens one.
pub fn closing_quote(open: char) -> Option<char> {
    match open {
        '"' => Some('"'),
        '`' => Some('`'),
        '\u{201C}' => Some('\u{201D}'), // “ ”
        '\u{300C}' => Some('\u{300D}'), // 「 」
        '\u{300E}' => Some('\u{300F}'), // 『 』
        '\u{FF02}' => Some('\u{FF02}'), // ＂ ＂
        _ => None,
    }
}

/// Raw term collected before deduplication.
struct Term {
    text: String,
    is_phrase: bool,
}

struct KeywordParser<'a> {
    input: &'a str,
    pos: usize,
    terms: Vec<Term>,
}

impl<'a> KeywordParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            terms: Vec::new(),
        }
    }

    fn parse(&mut self) {
        loop {
            self.skip_whitespace();

            let Some(ch) = self.peek_char() else {
                break;
            };

            match closing_quote(ch) {
                Some(close) => self.parse_phrase(close),
                None => self.parse_word(),
            }
        }
    }

    fn parse_phrase(&mut self, close: char) {
        let open_pos = self.pos;
        self.advance(); // opening quote
        let body_start = self.pos;

        while let Some(ch) = self.peek_char() {
            if ch == close {
                break;
            }
            self.advance();
        }

        if self.is_eof() {
            // Unterminated: the quote is just a character of a plain word
            self.pos = open_pos;
            self.parse_word();
            return;
        }

        let body = &self.input[body_start..self.pos];
        self.advance(); // closing quote

        // A phrase spanning several lines becomes one keyword per line
        for line in body.split(['\n', '\r']) {
            let line = line.trim();
            if !line.is_empty() {
                self.terms.push(Term {
                    text: line.to_string(),
                    is_phrase: true,
                });
            }
        }
    }

    fn parse_word(&mut self) {
        let start = self.pos;

        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                break;
            }
            self.advance();
        }

        let word = &self.input[start..self.pos];
        if !word.is_empty() {
            self.terms.push(Term {
                text: word.to_string(),
                is_phrase: false,
            });
        }
    }

    fn finish(self) -> Vec<Keyword> {
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut keywords = Vec::with_capacity(self.terms.len());

        for term in self.terms {
            if !seen.insert(term.text.clone()) {
                continue;
            }
            let position = keywords.len();
            keywords.push(if term.is_phrase {
                Keyword::phrase(term.text, position)
            } else {
                Keyword::literal(term.text, position)
            });
        }

        keywords
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.peek_char() {
            self.pos += ch.len_utf8();
        }
    }
}
