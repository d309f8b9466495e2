//! Removal of label statements carrying units outside the supported vocabulary.
//!
//! Downstream consumers model quantities with a fixed unit vocabulary. A
//! statement whose `<unit>` is not part of it is dropped before parsing,
//! together with any continuation lines, so the rest of the label still
//! parses. Values on dropped statements are lost.

use std::ops::RangeInclusive;

use log::warn;

use crate::label::{classify, split_statements, Directive};

/// Units removed by [`UnitFilter::default`]: temperatures in Celsius.
pub const DEFAULT_DISALLOWED_UNITS: &[&str] = &["degC"];

/// Drops statements whose units match a disallowed list (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFilter {
    disallowed: Vec<String>,
}

impl Default for UnitFilter {
    fn default() -> Self {
        Self::new(DEFAULT_DISALLOWED_UNITS.iter().copied())
    }
}

impl UnitFilter {
    pub fn new<I, S>(units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            disallowed: units
                .into_iter()
                .map(|u| u.as_ref().trim().to_ascii_lowercase())
                .filter(|u| !u.is_empty())
                .collect(),
        }
    }

    /// Whether `unit` is, or is built from, a disallowed unit.
    ///
    /// Compound units such as `degC/s` or `W/m**2` are split into their
    /// named atoms, so `degC/s` is disallowed when `degC` is.
    pub fn is_disallowed(&self, unit: &str) -> bool {
        let unit = unit.trim().to_ascii_lowercase();
        self.disallowed
            .iter()
            .any(|d| *d == unit || unit_atoms(&unit).any(|atom| atom == d))
    }

    /// Return `text` without the statements that use a disallowed unit.
    ///
    /// Block markers are always kept. Lines outside statements (blank lines,
    /// comments, anything after `END`) are kept verbatim.
    pub fn filter(&self, text: &str) -> String {
        if self.disallowed.is_empty() {
            return text.to_string();
        }

        let split = split_statements(text);
        let mut dropped: Vec<(RangeInclusive<usize>, usize)> = Vec::new();
        for stmt in &split.items {
            let is_marker = !matches!(classify(&stmt.text), Some(Directive::Assign(..)) | None);
            if !is_marker && unit_tokens(&stmt.text).any(|u| self.is_disallowed(u)) {
                warn!(
                    "dropping label line {}: unsupported unit in `{}`",
                    stmt.line,
                    stmt.text.trim()
                );
                dropped.push((stmt.line..=stmt.last_line, stmt.start));
            }
        }

        if dropped.is_empty() {
            return text.to_string();
        }

        // The first line of a dropped statement may begin with the close of
        // an earlier comment; that part stays.
        let mut out = text
            .lines()
            .enumerate()
            .filter_map(|(idx, line)| {
                let number = idx + 1;
                match dropped.iter().find(|(r, _)| r.contains(&number)) {
                    None => Some(line),
                    Some((r, start)) if *r.start() == number => {
                        let head = line.get(..*start).unwrap_or("");
                        (!head.trim().is_empty()).then_some(head.trim_end())
                    }
                    Some(_) => None,
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        if text.ends_with('\n') && !out.is_empty() {
            out.push('\n');
        }
        out
    }
}

/// Remove statements using the default disallowed units. See [`UnitFilter`].
pub fn filter_units(text: &str) -> String {
    UnitFilter::default().filter(text)
}

/// Iterate the `<unit>` tokens of a statement, skipping quoted text.
fn unit_tokens(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    core::iter::from_fn(move || loop {
        let idx = rest.find(['<', '"'])?;
        if rest.as_bytes()[idx] == b'"' {
            let after = &rest[idx + 1..];
            rest = after.find('"').map_or("", |end| &after[end + 1..]);
            continue;
        }
        let after = &rest[idx + 1..];
        let end = after.find('>')?;
        rest = &after[end + 1..];
        return Some(after[..end].trim());
    })
}

/// Named components of a compound unit: `w/m**2/sr` gives `w`, `m`, `sr`.
fn unit_atoms(unit: &str) -> impl Iterator<Item = &str> {
    unit.split(|c: char| !(c.is_alphabetic() || c == '_'))
        .filter(|atom| !atom.is_empty())
}
