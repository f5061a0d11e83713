//! Speaker turns: the stage-3 output format and the helpers that stitch
//! chunked model output into one list.
//!
//! Models are asked to answer with a bracketed list of `("speaker", "text")`
//! tuples. [`parse_turns`] accepts exactly that literal syntax (single or
//! double quotes, escapes, adjacent-string concatenation, trailing commas)
//! plus an optional surrounding code fence, and nothing else.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Clause that replaces a premature farewell in a non-final chunk.
pub const CONTINUATION_CLAUSE: &str = "Let's keep going.";

/// One utterance: who speaks, and what they say.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct Turn {
    pub speaker: String,
    pub text: String,
}

impl Turn {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }
}

impl From<(String, String)> for Turn {
    fn from((speaker, text): (String, String)) -> Self {
        Self { speaker, text }
    }
}

impl From<Turn> for (String, String) {
    fn from(t: Turn) -> Self {
        (t.speaker, t.text)
    }
}

/// Why model output is not an acceptable turn list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnListError {
    #[error("{message} at character {position}")]
    Syntax { position: usize, message: String },
}

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\s*```\s*$").unwrap()
});

static FAREWELL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)good\s?-?bye|bye for now|that[’']s all|that is all|thanks? (?:you )?for listening|until next time|see you next time|signing off|that wraps (?:it )?up|wrapping (?:things )?up",
    )
    .unwrap()
});

// ── Parsing ──────────────────────────────────────────────────────

/// Parse model output as a list of `(speaker, text)` tuples.
pub fn parse_turns(raw: &str) -> Result<Vec<Turn>, TurnListError> {
    let body = CODE_FENCE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw);
    let mut p = Parser::new(body);
    let turns = p.list()?;
    p.skip_ws();
    if !p.at_end() {
        return Err(p.error("unexpected text after the closing ']'"));
    }
    Ok(turns)
}

/// Whether `raw` is a well-formed turn list: a bracketed list whose every
/// element is a two-string tuple.
///
/// The check is purely structural. An empty list or a blank speaker label is
/// still well formed; stage 4 refuses an empty list on its own.
pub fn validate_turn_list(raw: &str) -> bool {
    parse_turns(raw).is_ok()
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(s: &str) -> Self {
        Self {
            chars: s.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn error(&self, message: &str) -> TurnListError {
        TurnListError::Syntax {
            position: self.pos,
            message: message.to_string(),
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, c: char) -> Result<(), TurnListError> {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{c}'")))
        }
    }

    /// Consume `c` if it is the next non-space character.
    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn list(&mut self) -> Result<Vec<Turn>, TurnListError> {
        self.expect('[')?;
        let mut turns = Vec::new();
        loop {
            if self.eat(']') {
                return Ok(turns);
            }
            turns.push(self.tuple()?);
            if !self.eat(',') {
                self.expect(']')?;
                return Ok(turns);
            }
        }
    }

    fn tuple(&mut self) -> Result<Turn, TurnListError> {
        self.skip_ws();
        if self.peek() != Some('(') {
            return Err(self.error("expected a '(speaker, text)' tuple"));
        }
        self.pos += 1;
        let speaker = self.string()?;
        self.expect(',')?;
        let text = self.string()?;
        self.eat(',');
        self.skip_ws();
        if self.peek() != Some(')') {
            return Err(self.error("expected ')' closing a two-element tuple"));
        }
        self.pos += 1;
        Ok(Turn { speaker, text })
    }

    /// One or more adjacent string literals, concatenated.
    fn string(&mut self) -> Result<String, TurnListError> {
        self.skip_ws();
        let mut out = self.literal()?;
        loop {
            let save = self.pos;
            self.skip_ws();
            if matches!(self.peek(), Some('"' | '\'')) {
                out.push_str(&self.literal()?);
            } else {
                self.pos = save;
                return Ok(out);
            }
        }
    }

    fn literal(&mut self) -> Result<String, TurnListError> {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.error("expected a quoted string")),
        };
        self.pos += 1;
        let mut out = String::new();
        loop {
            let c = self
                .peek()
                .ok_or_else(|| self.error("unterminated string"))?;
            self.pos += 1;
            match c {
                c if c == quote => return Ok(out),
                '\n' => {
                    self.pos -= 1;
                    return Err(self.error("line break inside a string"));
                }
                '\\' => {
                    let e = self
                        .peek()
                        .ok_or_else(|| self.error("unterminated escape"))?;
                    self.pos += 1;
                    match e {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '\\' => out.push('\\'),
                        '\'' => out.push('\''),
                        '"' => out.push('"'),
                        '\n' => {}
                        'u' => out.push(self.unicode_escape()?),
                        other => {
                            out.push('\\');
                            out.push(other);
                        }
                    }
                }
                c => out.push(c),
            }
        }
    }

    fn unicode_escape(&mut self) -> Result<char, TurnListError> {
        let end = self.pos + 4;
        if end > self.chars.len() {
            return Err(self.error("truncated \\u escape"));
        }
        let hex: String = self.chars[self.pos..end].iter().collect();
        let code = u32::from_str_radix(&hex, 16).map_err(|_| self.error("invalid \\u escape"))?;
        self.pos = end;
        char::from_u32(code).ok_or_else(|| self.error("invalid \\u escape"))
    }
}

// ── Serialization ────────────────────────────────────────────────

/// Render turns in the same literal syntax [`parse_turns`] reads.
pub fn serialize_turns(turns: &[Turn]) -> String {
    let mut out = String::from("[\n");
    for t in turns {
        out.push_str("    (");
        push_quoted(&mut out, &t.speaker);
        out.push_str(", ");
        push_quoted(&mut out, &t.text);
        out.push_str("),\n");
    }
    out.push(']');
    out
}

fn push_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
}

// ── Chunk stitching ──────────────────────────────────────────────

/// Whether `text` contains a closing or farewell phrase.
pub fn contains_farewell(text: &str) -> bool {
    FAREWELL.is_match(text)
}

/// Cut every turn at its first farewell phrase and append
/// [`CONTINUATION_CLAUSE`]. Returns how many turns were changed.
pub fn filter_farewells(turns: &mut [Turn]) -> usize {
    let mut changed = 0;
    for turn in turns.iter_mut() {
        let Some(m) = FAREWELL.find(&turn.text) else {
            continue;
        };
        let kept = turn.text[..m.start()].trim_end();
        turn.text = if kept.is_empty() {
            CONTINUATION_CLAUSE.to_string()
        } else {
            format!("{kept} {CONTINUATION_CLAUSE}")
        };
        changed += 1;
    }
    changed
}

/// Turns dropped from the head of a non-first chunk: `min(max_skip, n / 10)`.
pub fn boundary_skip_count(chunk_len: usize, max_skip: usize) -> usize {
    max_skip.min(chunk_len / 10)
}

/// Append a chunk's turns to `combined`, dropping the head turns that the
/// overlap region most likely regenerated. Returns the number dropped.
///
/// `chunk_index` is 0-based; the first chunk is appended whole.
pub fn merge_chunk_turns(
    combined: &mut Vec<Turn>,
    chunk: Vec<Turn>,
    chunk_index: usize,
    max_skip: usize,
) -> usize {
    let skip = if chunk_index == 0 {
        0
    } else {
        boundary_skip_count(chunk.len(), max_skip)
    };
    combined.extend(chunk.into_iter().skip(skip));
    skip
}

/// Speaker labels used in `turns` that are not in `allowed`, in first-seen order.
pub fn unexpected_speakers(turns: &[Turn], allowed: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for t in turns {
        if !allowed.iter().any(|a| a == &t.speaker) && !seen.contains(&t.speaker) {
            seen.push(t.speaker.clone());
        }
    }
    seen
}
