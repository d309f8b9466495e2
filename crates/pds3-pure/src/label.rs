//! PDS3 label grammar: statement splitting, block nesting and label file reading.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::iter::Peekable;
use std::ops::Deref;
use std::path::Path;
use std::str::CharIndices;

use log::debug;

use crate::error::{Error, ParseError, ParseErrorKind, Result};
use crate::value::{parse_pointer, parse_value, Group, Value};

// ── Types ──

/// The root group of one parsed label file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Label {
    root: Group,
}

impl Label {
    /// Parse label text. See [`parse_label`].
    pub fn parse(text: &str) -> Result<Self> {
        parse_label(text)
    }

    pub fn root(&self) -> &Group {
        &self.root
    }

    pub fn into_root(self) -> Group {
        self.root
    }
}

impl Deref for Label {
    type Target = Group;

    fn deref(&self) -> &Group {
        &self.root
    }
}

/// Kind of a nested block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Object,
    Group,
}

impl BlockKind {
    fn opener(self) -> &'static str {
        match self {
            BlockKind::Object => "OBJECT",
            BlockKind::Group => "GROUP",
        }
    }

    fn closer(self) -> &'static str {
        match self {
            BlockKind::Object => "END_OBJECT",
            BlockKind::Group => "END_GROUP",
        }
    }
}

/// One logical statement: a physical line plus any continuation lines
/// needed to close an open string, list or comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Statement {
    /// 1-based number of the first physical line.
    pub line: usize,
    /// 1-based number of the last physical line.
    pub last_line: usize,
    /// Byte offset in the first physical line where the statement begins.
    /// Anything before it on that line closes an earlier comment.
    pub start: usize,
    /// Statement text with comments removed, physical lines joined by `\n`.
    pub text: String,
}

/// Result of splitting label text into statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Statements {
    pub items: Vec<Statement>,
    /// Set when the text ended inside a string, list or comment.
    pub unterminated: Option<(Statement, &'static str)>,
    /// Number of physical lines scanned.
    pub line_count: usize,
}

/// Classification of a statement by its keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Directive<'a> {
    Open(BlockKind, &'a str),
    Close(BlockKind, Option<&'a str>),
    End,
    Assign(&'a str, &'a str),
}

// ── Splitting ──

fn peek_is(chars: &mut Peekable<CharIndices<'_>>, c: char) -> bool {
    chars.peek().is_some_and(|&(_, next)| next == c)
}

/// Split label text into statements, stopping after the top-level `END`.
///
/// Comments (`/* ... */`) are removed outside of double-quoted strings.
/// A statement continues onto following lines while a double-quoted string,
/// a `(`/`{` list or a comment is still open.
pub(crate) fn split_statements(text: &str) -> Statements {
    let mut items = Vec::new();
    let mut current: Option<Statement> = None;
    let mut in_quote = false;
    let mut in_comment = false;
    let mut depth: usize = 0;
    let mut line_count = 0;

    for (idx, line) in text.lines().enumerate() {
        let number = idx + 1;
        line_count = number;

        let mut cleaned = String::with_capacity(line.len());
        let mut first_col = None;
        let mut chars = line.char_indices().peekable();
        while let Some((col, ch)) = chars.next() {
            if in_comment {
                if ch == '*' && peek_is(&mut chars, '/') {
                    chars.next();
                    in_comment = false;
                }
                continue;
            }
            if first_col.is_none() && !ch.is_whitespace() && !(ch == '/' && peek_is(&mut chars, '*'))
            {
                first_col = Some(col);
            }
            if in_quote {
                if ch == '"' {
                    in_quote = false;
                }
                cleaned.push(ch);
                continue;
            }
            match ch {
                '/' if peek_is(&mut chars, '*') => {
                    chars.next();
                    in_comment = true;
                }
                '"' => {
                    in_quote = true;
                    cleaned.push(ch);
                }
                '(' | '{' => {
                    depth += 1;
                    cleaned.push(ch);
                }
                ')' | '}' => {
                    depth = depth.saturating_sub(1);
                    cleaned.push(ch);
                }
                _ => cleaned.push(ch),
            }
        }

        match current.as_mut() {
            Some(stmt) => {
                stmt.text.push('\n');
                stmt.text.push_str(&cleaned);
                stmt.last_line = number;
            }
            None if !cleaned.trim().is_empty() => {
                current = Some(Statement {
                    line: number,
                    last_line: number,
                    start: first_col.unwrap_or(0),
                    text: cleaned,
                });
            }
            None => {}
        }

        let open = in_quote || depth > 0 || (in_comment && current.is_some());
        if !open {
            if let Some(stmt) = current.take() {
                let is_end = stmt.text.trim().eq_ignore_ascii_case("END");
                items.push(stmt);
                if is_end {
                    break;
                }
            }
        }
    }

    let unterminated = current.map(|stmt| {
        let what = if in_quote {
            "string"
        } else if depth > 0 {
            "list"
        } else {
            "comment"
        };
        (stmt, what)
    });

    Statements {
        items,
        unterminated,
        line_count,
    }
}

/// Classify a statement by its keyword. Returns `None` when the statement is
/// not an assignment and not a marker.
pub(crate) fn classify(text: &str) -> Option<Directive<'_>> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("END") {
        return Some(Directive::End);
    }

    let (key, value) = match text.split_once('=') {
        Some((k, v)) => (k.trim(), Some(v.trim())),
        None => (text, None),
    };

    let upper = key.to_ascii_uppercase();
    match (upper.as_str(), value) {
        ("OBJECT" | "BEGIN_OBJECT", Some(v)) => Some(Directive::Open(BlockKind::Object, v)),
        ("GROUP" | "BEGIN_GROUP", Some(v)) => Some(Directive::Open(BlockKind::Group, v)),
        ("END_OBJECT", v) => Some(Directive::Close(BlockKind::Object, v)),
        ("END_GROUP", v) => Some(Directive::Close(BlockKind::Group, v)),
        (_, Some(v)) => Some(Directive::Assign(key, v)),
        (_, None) => None,
    }
}

/// Strip surrounding double or single quotes from a block name.
fn block_name(raw: &str) -> &str {
    let raw = raw.trim();
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(raw)
        .trim()
}

fn is_valid_key(key: &str) -> bool {
    let name = key.strip_prefix('^').unwrap_or(key);
    let mut bytes = name.bytes();
    matches!(bytes.next(), Some(b) if b.is_ascii_alphabetic())
        && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b':')
}

// ── Parsing ──

struct OpenBlock {
    kind: BlockKind,
    name: String,
    group: Group,
}

/// Parse PDS3 label text into a [`Label`].
///
/// The parse is single-pass over the statements with an explicit stack of
/// open `OBJECT`/`GROUP` blocks. A closed block is inserted under its name
/// in the enclosing group; repeated names become a sequence of groups.
/// Re-declaring a plain key in the same group is an error. Anything after
/// the top-level `END` is ignored.
pub fn parse_label(text: &str) -> Result<Label> {
    let split = split_statements(text);
    let mut root = Group::new();
    let mut stack: Vec<OpenBlock> = Vec::new();

    for stmt in &split.items {
        let fail = |kind| ParseError::new(stmt.line, stmt.text.trim(), kind);

        let directive = classify(&stmt.text).ok_or_else(|| fail(ParseErrorKind::ExpectedAssignment))?;
        match directive {
            Directive::Open(kind, name) => {
                let name = block_name(name);
                if name.is_empty() {
                    return Err(fail(ParseErrorKind::EmptyValue).into());
                }
                stack.push(OpenBlock {
                    kind,
                    name: name.to_string(),
                    group: Group::new(),
                });
            }
            Directive::Close(kind, name) => {
                let block = stack
                    .pop()
                    .ok_or_else(|| fail(ParseErrorKind::UnmatchedEnd(kind.closer().into())))?;
                let name_matches = name
                    .map(block_name)
                    .is_none_or(|n| n.eq_ignore_ascii_case(&block.name));
                if block.kind != kind || !name_matches {
                    return Err(fail(ParseErrorKind::MismatchedEnd {
                        expected: format!("{} = {}", block.kind.opener(), block.name),
                        found: stmt.text.trim().to_string(),
                    })
                    .into());
                }
                let parent = stack.last_mut().map_or(&mut root, |b| &mut b.group);
                parent
                    .insert_block(block.name.clone(), block.group)
                    .map_err(|_| fail(ParseErrorKind::DuplicateKey(block.name)))?;
            }
            Directive::End => {
                if let Some(open) = stack.last() {
                    return Err(fail(ParseErrorKind::EndInsideBlock(format!(
                        "{} = {}",
                        open.kind.opener(),
                        open.name
                    )))
                    .into());
                }
                debug!(
                    "parsed label: {} statements, {} top-level keys",
                    split.items.len(),
                    root.len()
                );
                return Ok(Label { root });
            }
            Directive::Assign(key, raw) => {
                if !is_valid_key(key) {
                    return Err(fail(ParseErrorKind::InvalidKey(key.to_string())).into());
                }
                if raw.is_empty() {
                    return Err(fail(ParseErrorKind::EmptyValue).into());
                }
                let value = match key.strip_prefix('^') {
                    Some(target) => parse_pointer(target, raw)
                        .map(Value::Pointer)
                        .map_err(|e| fail(ParseErrorKind::MalformedPointer(e)))?,
                    None => parse_value(raw).map_err(|e| fail(ParseErrorKind::MalformedValue(e)))?,
                };
                let group = stack.last_mut().map_or(&mut root, |b| &mut b.group);
                group
                    .insert_unique(key.to_string(), value)
                    .map_err(|_| fail(ParseErrorKind::DuplicateKey(key.to_string())))?;
            }
        }
    }

    Err(match split.unterminated {
        Some((stmt, what)) => {
            ParseError::new(stmt.line, stmt.text.trim(), ParseErrorKind::Unterminated(what))
        }
        None => ParseError::new(split.line_count, "", ParseErrorKind::UnterminatedLabel),
    }
    .into())
}

// ── Reading ──

/// Read a label file up to and including its `END` line.
///
/// Attached labels are followed by binary data in the same file; reading
/// stops at `END` so that data is never decoded as text. Non-ASCII bytes are
/// replaced. A file without `END` is returned whole and will fail to parse.
pub fn read_label_text(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut raw = Vec::new();
    let mut line = Vec::new();
    let mut scan = EndScan::default();

    loop {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .map_err(|e| Error::io(path, e))?;
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&line);
        if scan.is_end(&line) {
            break;
        }
    }

    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Quote and comment state carried across raw label lines, so that the
/// `END` line is found with the same rules `split_statements` applies.
#[derive(Debug, Default)]
struct EndScan {
    in_quote: bool,
    in_comment: bool,
}

impl EndScan {
    fn is_end(&mut self, line: &[u8]) -> bool {
        let outside = !self.in_quote && !self.in_comment;
        let mut kept = Vec::with_capacity(line.len());
        let mut i = 0;
        while i < line.len() {
            let (b, next) = (line[i], line.get(i + 1).copied());
            if self.in_comment {
                if b == b'*' && next == Some(b'/') {
                    self.in_comment = false;
                    i += 1;
                }
            } else if self.in_quote {
                self.in_quote = b != b'"';
                kept.push(b);
            } else if b == b'/' && next == Some(b'*') {
                self.in_comment = true;
                i += 1;
            } else {
                self.in_quote = b == b'"';
                kept.push(b);
            }
            i += 1;
        }
        outside && !self.in_quote && kept.trim_ascii().eq_ignore_ascii_case(b"END")
    }
}
