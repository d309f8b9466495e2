//! Typed label values and the parser for the right-hand side of a statement.

use core::fmt;

/// A numeric literal, kept as integer when it has no fractional or exponent part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Real(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Integer(n) => n as f64,
            Number::Real(f) => f,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(n) => write!(f, "{n}"),
            // Debug keeps the fractional marker on whole reals (`3.0`, not `3`).
            Number::Real(r) => write!(f, "{r:?}"),
        }
    }
}

/// A single unitless label value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Integer(i64),
    Real(f64),
    /// Content of a double-quoted string.
    Text(String),
    /// A bare token or a single-quoted symbolic literal.
    Symbol(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Integer(n) => Number::Integer(*n).fmt(f),
            Scalar::Real(r) => Number::Real(*r).fmt(f),
            Scalar::Text(s) | Scalar::Symbol(s) => f.write_str(s),
        }
    }
}

/// Where a pointer's data starts inside its target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerOffset {
    /// 1-based record number, scaled by `RECORD_BYTES`.
    Record(u64),
    /// Byte offset given with a `<BYTES>` unit, used as-is.
    Bytes(u64),
    /// Only a file name was given: data starts at the top of that file.
    FileStart,
}

/// A `^KEY` statement locating binary data described by the `KEY` object.
#[derive(Debug, Clone, PartialEq)]
pub struct Pointer {
    /// The object the pointer refers to (the key without its caret).
    pub target: String,
    /// Detached data file, or `None` when the data follows the label.
    pub file: Option<String>,
    pub offset: PointerOffset,
    /// The pointer expression as written, with whitespace collapsed.
    pub raw: String,
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// An ordered key/value mapping. Keys are unique.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    entries: Vec<(String, Value)>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find_map(|(k, v)| if k == key { Some(v) } else { None })
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterate entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a new key. Returns the value back if the key already exists.
    pub(crate) fn insert_unique(&mut self, key: String, value: Value) -> Result<(), Value> {
        if self.contains_key(&key) {
            return Err(value);
        }
        self.entries.push((key, value));
        Ok(())
    }

    /// Insert a closed block. A repeated block name turns the existing entry
    /// into a sequence of groups instead of replacing it.
    pub(crate) fn insert_block(&mut self, key: String, block: Group) -> Result<(), Group> {
        let Some(idx) = self.entries.iter().position(|(k, _)| *k == key) else {
            self.entries.push((key, Value::Group(block)));
            return Ok(());
        };

        let slot = &mut self.entries[idx].1;
        match slot {
            Value::Group(_) => {
                let first = core::mem::replace(slot, Value::Sequence(Vec::new()));
                *slot = Value::Sequence(vec![first, Value::Group(block)]);
                Ok(())
            }
            Value::Sequence(items)
                if !items.is_empty() && items.iter().all(|v| matches!(v, Value::Group(_))) =>
            {
                items.push(Value::Group(block));
                Ok(())
            }
            _ => Err(block),
        }
    }
}

/// A parsed label value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    /// A number tagged with a `<unit>`.
    Quantity { value: Number, unit: String },
    /// A parenthesised list or braced set.
    Sequence(Vec<Value>),
    /// An `OBJECT` or `GROUP` block.
    Group(Group),
    Pointer(Pointer),
}

impl Value {
    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Value::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<&Pointer> {
        match self {
            Value::Pointer(p) => Some(p),
            _ => None,
        }
    }

    /// Integer content of a unitless integer or an integer quantity.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Scalar(Scalar::Integer(n))
            | Value::Quantity {
                value: Number::Integer(n),
                ..
            } => Some(*n),
            _ => None,
        }
    }

    /// Text content of a quoted string or a symbol.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(Scalar::Text(s)) | Value::Scalar(Scalar::Symbol(s)) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(s) => s.fmt(f),
            Value::Quantity { value, unit } => write!(f, "{value} <{unit}>"),
            Value::Sequence(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt(f)?;
                }
                f.write_str(")")
            }
            Value::Group(g) => {
                f.write_str("{")?;
                for (i, (k, v)) in g.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{k} = {v}")?;
                }
                f.write_str("}")
            }
            Value::Pointer(p) => p.fmt(f),
        }
    }
}

// ── Parsing ──

/// Parse the value text of a `KEY = VALUE` statement.
///
/// The whole text must be consumed; the error is a human-readable reason.
pub fn parse_value(text: &str) -> Result<Value, String> {
    let mut parser = ValueParser::new(text);
    let value = parser.value()?;
    parser.skip_ws();
    if let Some(rest) = parser.remaining() {
        return Err(format!("unexpected `{rest}` after value"));
    }
    Ok(value)
}

/// Parse the value text of a `^KEY = VALUE` statement.
pub fn parse_pointer(target: &str, text: &str) -> Result<Pointer, String> {
    let value = parse_value(text)?;
    let (file, offset) = match value {
        Value::Scalar(Scalar::Integer(n)) => (None, record_offset(n)?),
        Value::Quantity { value, unit } => (None, byte_offset(value, &unit)?),
        Value::Scalar(Scalar::Text(file)) => (Some(file), PointerOffset::FileStart),
        Value::Sequence(items) => match <[Value; 2]>::try_from(items) {
            Ok([Value::Scalar(Scalar::Text(file)), Value::Scalar(Scalar::Integer(n))]) => {
                (Some(file), record_offset(n)?)
            }
            Ok([Value::Scalar(Scalar::Text(file)), Value::Quantity { value, unit }]) => {
                (Some(file), byte_offset(value, &unit)?)
            }
            _ => return Err("expected (\"FILE\", offset)".into()),
        },
        other => return Err(format!("unsupported pointer value `{other}`")),
    };

    Ok(Pointer {
        target: target.to_string(),
        file,
        offset,
        raw: text.split_whitespace().collect::<Vec<_>>().join(" "),
    })
}

fn record_offset(n: i64) -> Result<PointerOffset, String> {
    match u64::try_from(n) {
        Ok(record) if record >= 1 => Ok(PointerOffset::Record(record)),
        _ => Err(format!("record number {n} is not 1-based")),
    }
}

fn byte_offset(value: Number, unit: &str) -> Result<PointerOffset, String> {
    if !unit.eq_ignore_ascii_case("BYTES") {
        return Err(format!("offset unit <{unit}> is not <BYTES>"));
    }
    match value {
        Number::Integer(n) => u64::try_from(n)
            .map(PointerOffset::Bytes)
            .map_err(|_| format!("negative byte offset {n}")),
        Number::Real(r) => Err(format!("byte offset {r:?} is not an integer")),
    }
}

/// Recursive-descent parser over one statement's value text.
struct ValueParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> ValueParser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn remaining(&self) -> Option<&'a str> {
        let rest = &self.src[self.pos..];
        if rest.is_empty() {
            None
        } else {
            Some(rest)
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Consume up to (not including) `delim`, or fail with `what`.
    fn take_until(&mut self, delim: u8, what: &str) -> Result<&'a str, String> {
        let rest = &self.src[self.pos..];
        let end = rest
            .bytes()
            .position(|b| b == delim)
            .ok_or_else(|| format!("unterminated {what}"))?;
        self.pos += end + 1;
        Ok(&rest[..end])
    }

    fn value(&mut self) -> Result<Value, String> {
        self.skip_ws();
        match self.peek() {
            None => Err("missing value".into()),
            Some(b'(') => self.sequence(b')'),
            Some(b'{') => self.sequence(b'}'),
            Some(b'"') => {
                self.pos += 1;
                let text = self.take_until(b'"', "string")?;
                Ok(Value::Scalar(Scalar::Text(text.to_string())))
            }
            Some(b'\'') => {
                self.pos += 1;
                let text = self.take_until(b'\'', "symbolic literal")?;
                Ok(Value::Scalar(Scalar::Symbol(text.to_string())))
            }
            Some(_) => self.bare(),
        }
    }

    fn sequence(&mut self, close: u8) -> Result<Value, String> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(Value::Sequence(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b) if b == close => {
                    self.pos += 1;
                    return Ok(Value::Sequence(items));
                }
                Some(b) => return Err(format!("unexpected `{}` in list", b as char)),
                None => return Err("unterminated list".into()),
            }
        }
    }

    fn bare(&mut self) -> Result<Value, String> {
        let rest = &self.src[self.pos..];
        let len = rest
            .bytes()
            .position(|b| b.is_ascii_whitespace() || b"(){},<>\"".contains(&b))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(format!("unexpected `{}`", &rest[..1]));
        }
        let token = &rest[..len];
        self.pos += len;

        let number = parse_number(token)?;
        let before_unit = self.pos;
        self.skip_ws();
        if self.peek() != Some(b'<') {
            self.pos = before_unit;
            return Ok(Value::Scalar(match number {
                Some(Number::Integer(n)) => Scalar::Integer(n),
                Some(Number::Real(r)) => Scalar::Real(r),
                None => Scalar::Symbol(token.to_string()),
            }));
        }

        let Some(value) = number else {
            return Err(format!("unit on non-numeric value `{token}`"));
        };
        self.pos += 1;
        let unit = self.take_until(b'>', "unit")?.trim();
        if unit.is_empty() {
            return Err("empty unit".into());
        }
        Ok(Value::Quantity {
            value,
            unit: unit.to_string(),
        })
    }
}

/// Parse an integer, real or `radix#digits#` literal.
///
/// `Ok(None)` means the token is not a number. A numeric token whose value
/// does not fit an `i64` or a finite `f64` is an error.
fn parse_number(token: &str) -> Result<Option<Number>, String> {
    let Some(first) = token.bytes().next() else {
        return Ok(None);
    };
    if !(first.is_ascii_digit() || matches!(first, b'+' | b'-' | b'.')) {
        return Ok(None);
    }

    if let Some(n) = parse_radix(token) {
        return Ok(Some(Number::Integer(n)));
    }

    let out_of_range = || format!("number out of range `{token}`");
    if token.contains(['.', 'e', 'E']) {
        match token.parse::<f64>() {
            Ok(r) if r.is_finite() => Ok(Some(Number::Real(r))),
            Ok(_) => Err(out_of_range()),
            Err(_) => Ok(None),
        }
    } else {
        match token.parse::<i64>() {
            Ok(n) => Ok(Some(Number::Integer(n))),
            Err(_) if is_decimal(token) => Err(out_of_range()),
            Err(_) => Ok(None),
        }
    }
}

fn is_decimal(token: &str) -> bool {
    let digits = token.strip_prefix(['+', '-']).unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a based integer such as `16#0FFF#` or `2#1010#`.
fn parse_radix(token: &str) -> Option<i64> {
    let (sign, body) = match token.as_bytes().first()? {
        b'-' => (-1, &token[1..]),
        b'+' => (1, &token[1..]),
        _ => (1, token),
    };
    let body = body.strip_suffix('#')?;
    let (radix, digits) = body.split_once('#')?;
    let radix = radix.parse::<u32>().ok().filter(|r| (2..=16).contains(r))?;
    i64::from_str_radix(digits, radix).ok().map(|n| sign * n)
}
