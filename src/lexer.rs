//! Tokenizer primitives shared by every level of the parser.
//!
//! Tokens are maximal runs of non-blank characters, with two exceptions that are
//! opaque to the scan: a token starting with `{` extends at least to its matching
//! `}`, and a token starting with `"` ends at the next `"`.

/// Errors that can occur while scanning for tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexingError {
    /// A `{` whose nesting never returns to zero.
    #[error("matching brace not found for '{{' at offset {0}")]
    UnmatchedBrace(usize),
    /// A `"` with no closing quote after it.
    #[error("unterminated quoted argument starting at offset {0}")]
    UnterminatedQuote(usize),
}

/// Blank characters separating tokens.
pub fn is_blank(c: u8) -> bool {
    c.is_ascii_whitespace()
}

/// Find the `}` matching the `{` at `open`, looking no further than `end` (exclusive).
///
/// Returns `None` when `open` isn't a `{` or the nesting depth never returns to zero.
pub fn match_brace(s: &str, open: usize, end: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }
    let end = end.min(bytes.len());
    let mut depth = 0usize;
    for (i, &c) in bytes.iter().enumerate().take(end).skip(open) {
        match c {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Find the next `"` after the one at `open`, looking no further than `end` (exclusive).
pub fn match_quote(s: &str, open: usize, end: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    if bytes.get(open) != Some(&b'"') {
        return None;
    }
    let end = end.min(bytes.len());
    bytes
        .get(open + 1..end)?
        .iter()
        .position(|&c| c == b'"')
        .map(|i| open + 1 + i)
}

/// One token of the input along with its byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// The token text exactly as written, quotes and braces included.
    pub text: &'a str,
    /// Offset of the first byte.
    pub start: usize,
    /// Offset one past the last byte.
    pub end: usize,
}

impl<'a> Token<'a> {
    /// True for a `"..."` token.
    pub fn is_quoted(&self) -> bool {
        self.text.starts_with('"')
    }

    /// Text between the quotes of a quoted token, or the whole token otherwise.
    pub fn unquoted(&self) -> &'a str {
        if self.is_quoted() {
            &self.text[1..self.text.len() - 1]
        } else {
            self.text
        }
    }
}

/// Iterator over the tokens of a string. Stops after the first error.
pub struct Tokens<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn skip_blanks(&mut self) {
        let bytes = self.input.as_bytes();
        while self.pos < bytes.len() && is_blank(bytes[self.pos]) {
            self.pos += 1;
        }
    }

    fn skip_word(&mut self) {
        let bytes = self.input.as_bytes();
        while self.pos < bytes.len() && !is_blank(bytes[self.pos]) {
            self.pos += 1;
        }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Result<Token<'a>, LexingError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_blanks();
        let len = self.input.len();
        if self.pos >= len {
            return None;
        }

        let start = self.pos;
        match self.input.as_bytes()[start] {
            b'"' => match match_quote(self.input, start, len) {
                Some(close) => self.pos = close + 1,
                None => {
                    self.pos = len;
                    return Some(Err(LexingError::UnterminatedQuote(start)));
                }
            },
            b'{' => match match_brace(self.input, start, len) {
                Some(close) => {
                    self.pos = close + 1;
                    self.skip_word();
                }
                None => {
                    self.pos = len;
                    return Some(Err(LexingError::UnmatchedBrace(start)));
                }
            },
            _ => self.skip_word(),
        }

        Some(Ok(Token {
            text: &self.input[start..self.pos],
            start,
            end: self.pos,
        }))
    }
}

/// Split `line` into tokens.
pub fn split_into_tokens(line: &str) -> Tokens<'_> {
    Tokens { input: line, pos: 0 }
}
