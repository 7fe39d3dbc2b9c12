//! Placeholder substitution inside `<a:t>` text-run bodies.
//!
//! Three syntaxes are recognised per key, tried in order:
//!
//! 1. `{{key}}`, with optional whitespace inside the braces; whitespace
//!    following the closing braces (space, NBSP, `&nbsp;`, `&#160;`,
//!    `&#xA0;`) is consumed too.
//! 2. `[key]`.
//! 3. The bare key, when it is the entire (trimmed) text of a run.
//!
//! All keys are matched against the original run text in one pass, so a
//! substituted value is never matched again. Markup outside text runs is
//! never touched.

use crate::error::Result;
use quick_xml::escape::escape;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::LazyLock;

/// `<a:t>` (any prefix) with its body. The body never contains `<`.
static TEXT_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(<(?:\w+:)?t(?:\s[^>]*)?>)([^<]*)(</(?:\w+:)?t>)").unwrap());

/// A whole `<a:r>` run.
static RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<((?:\w+:)?)r>(.*?)</(?:\w+:)?r>").unwrap());

/// Run properties inside a run.
static RUN_PROPS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:\w+:)?rPr\b[^>]*?(?:/>|>.*?</(?:\w+:)?rPr>)").unwrap()
});

const SPACE: &str = r"(?:[\s\u{A0}]|&nbsp;|&#160;|&#[xX][aA]0;)*";

/// Placeholder values for one slide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    entries: Vec<(String, String)>,
    blank_keys: HashSet<String>,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Substitute this key even when its value is empty.
    pub fn allow_blank(mut self, key: impl Into<String>) -> Self {
        self.blank_keys.insert(key.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries that will actually be substituted.
    fn active(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter(|(k, v)| !v.is_empty() || self.blank_keys.contains(k))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One key ready for matching against escaped run text.
struct Rule {
    braces: Regex,
    bracket: String,
    bare: String,
    replacement: String,
}

impl Rule {
    fn new(key: &str, value: &str) -> Result<Self> {
        let escaped_key = escape(key).into_owned();
        let braces = Regex::new(&format!(
            r"\{{\{{{space}{key}{space}\}}\}}{space}",
            space = SPACE,
            key = regex::escape(&escaped_key)
        ))?;
        Ok(Self {
            braces,
            bracket: format!("[{}]", escaped_key),
            bare: escaped_key,
            replacement: escape_text(value),
        })
    }

    /// Byte ranges of `body` this key replaces, using the first syntax
    /// that matches.
    fn spans(&self, body: &str) -> Vec<(usize, usize)> {
        let braces: Vec<_> = self
            .braces
            .find_iter(body)
            .map(|m| (m.start(), m.end()))
            .collect();
        if !braces.is_empty() {
            return braces;
        }
        let brackets: Vec<_> = body
            .match_indices(self.bracket.as_str())
            .map(|(i, m)| (i, i + m.len()))
            .collect();
        if !brackets.is_empty() {
            return brackets;
        }
        if body.trim() == self.bare {
            return vec![(0, body.len())];
        }
        Vec::new()
    }
}

/// Splice every rule's replacement into `body` at once. Overlapping
/// matches go to the earliest start, then to the first rule.
fn replace_spans<'t>(body: &'t str, rules: &[Rule]) -> Cow<'t, str> {
    let mut spans: Vec<(usize, usize, usize)> = rules
        .iter()
        .enumerate()
        .flat_map(|(i, rule)| rule.spans(body).into_iter().map(move |(s, e)| (s, e, i)))
        .collect();
    if spans.is_empty() {
        return Cow::Borrowed(body);
    }
    spans.sort_by_key(|&(start, _, rule)| (start, rule));

    let mut out = String::with_capacity(body.len());
    let mut cursor = 0;
    for (start, end, rule) in spans {
        if start < cursor {
            continue;
        }
        out.push_str(&body[cursor..start]);
        out.push_str(&rules[rule].replacement);
        cursor = end;
    }
    out.push_str(&body[cursor..]);
    Cow::Owned(out)
}

/// Replace placeholders in every text run of a slide.
///
/// Values with line breaks split their run into several runs separated
/// by `<a:br>` so the breaks render.
pub fn substitute(xml: &str, values: &Placeholders) -> Result<String> {
    let rules = values
        .active()
        .map(|(k, v)| Rule::new(k, v))
        .collect::<Result<Vec<_>>>()?;
    if rules.is_empty() {
        return Ok(xml.to_string());
    }

    let replaced = TEXT_RUN_RE.replace_all(xml, |caps: &regex::Captures<'_>| {
        format!("{}{}{}", &caps[1], replace_spans(&caps[2], &rules), &caps[3])
    });

    if values.active().any(|(_, v)| v.contains('\n')) {
        Ok(expand_line_breaks(&replaced))
    } else {
        Ok(replaced.into_owned())
    }
}

/// Remove a marker token (any of the three syntaxes) from the text runs.
pub fn strip_marker(xml: &str, marker: &str) -> Result<String> {
    let values = Placeholders::new().with(marker, "").allow_blank(marker);
    substitute(xml, &values)
}

/// Strip characters XML 1.0 forbids, normalise line endings and escape.
pub fn escape_text(value: &str) -> String {
    let cleaned: String = value
        .replace("\r\n", "\n")
        .chars()
        .filter(|c| !matches!(*c, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\r'))
        .collect();
    escape(cleaned.as_str()).into_owned()
}

/// Split runs whose text contains `\n` into runs joined by `<a:br>`,
/// repeating the run properties on each piece.
pub fn expand_line_breaks(xml: &str) -> String {
    RUN_RE
        .replace_all(xml, |caps: &regex::Captures<'_>| {
            let prefix = &caps[1];
            let inner = &caps[2];
            let whole = caps[0].to_string();

            let Some(text) = TEXT_RUN_RE.captures(inner) else {
                return whole;
            };
            if !text[2].contains('\n') {
                return whole;
            }
            let props = RUN_PROPS_RE
                .find(inner)
                .map(|m| m.as_str())
                .unwrap_or("");
            let line_break = if props.is_empty() {
                format!("<{}br/>", prefix)
            } else {
                format!("<{p}br>{}</{p}br>", props, p = prefix)
            };

            text[2]
                .split('\n')
                .map(|line| {
                    format!(
                        "<{p}r>{}{}{}{}</{p}r>",
                        props,
                        &text[1],
                        line,
                        &text[3],
                        p = prefix
                    )
                })
                .collect::<Vec<_>>()
                .join(&line_break)
        })
        .into_owned()
}
