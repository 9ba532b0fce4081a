// Event model — the flat token stream both HTML fragments are flattened into.
//
// The whole pipeline (atomizer, aligners, rewriters, emitter) operates on
// `Event` values. Equality is what the aligners match on, so it is defined
// carefully: source position never participates, attribute order never
// participates, and `style` values are compared after normalization.

use std::sync::LazyLock;

use regex::Regex;

static WS_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Opaque source-position info. Propagated through the pipeline for
/// debugging but never consulted for alignment or equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pos(pub u32);

impl Pos {
    /// Position for events the engine fabricates (change markers, revert
    /// payloads) rather than reads from a parsed fragment.
    pub fn synthetic() -> Self {
        Pos(u32::MAX)
    }
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// Insertion-ordered attribute list.
///
/// Order is preserved for serialization but ignored by `PartialEq`; `style`
/// values compare equal under property reordering (see
/// [`normalize_style_value`]).
#[derive(Debug, Clone, Default)]
pub struct Attrs(Vec<(String, String)>);

impl Attrs {
    pub fn new() -> Self {
        Attrs(Vec::new())
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Attrs(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Replace the value in place if the attribute exists, append otherwise.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name.to_string(), value)),
        }
    }

    /// Append a class token, preserving any existing classes as a
    /// space-joined string. Duplicates are not deduplicated.
    pub fn append_class(&mut self, class: &str) {
        let merged = match self.get("class") {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.set("class", merged);
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.get("class")
            .is_some_and(|cls| cls.split_ascii_whitespace().any(|c| c == class))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl PartialEq for Attrs {
    fn eq(&self, other: &Self) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        self.0.iter().all(|(k, v)| {
            other.get(k).is_some_and(|ov| {
                if k == "style" {
                    normalize_style_value(v) == normalize_style_value(ov)
                } else {
                    v == ov
                }
            })
        })
    }
}

/// Canonicalize a `style` attribute value for comparison: split on `;`,
/// trim, lowercase property names, trim values, drop empty declarations,
/// sort properties lexicographically.
pub fn normalize_style_value(style: &str) -> String {
    let mut props: Vec<(String, String)> = style
        .split(';')
        .filter_map(|decl| {
            let decl = decl.trim();
            let (name, value) = decl.split_once(':')?;
            let name = name.trim().to_lowercase();
            let value = value.trim().to_string();
            if name.is_empty() || value.is_empty() {
                return None;
            }
            Some((name, value))
        })
        .collect();
    props.sort();
    props
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join("; ")
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// One token of the parsed HTML stream.
///
/// Tag names are localnames — the parser strips namespace prefixes before
/// events reach the engine.
#[derive(Debug, Clone)]
pub enum Event {
    Start { tag: String, attrs: Attrs, pos: Pos },
    End { tag: String, pos: Pos },
    Text { value: String, pos: Pos },
}

impl Event {
    pub fn start(tag: impl Into<String>, attrs: Attrs, pos: Pos) -> Self {
        Event::Start { tag: tag.into(), attrs, pos }
    }

    pub fn end(tag: impl Into<String>, pos: Pos) -> Self {
        Event::End { tag: tag.into(), pos }
    }

    pub fn text(value: impl Into<String>, pos: Pos) -> Self {
        Event::Text { value: value.into(), pos }
    }

    pub fn pos(&self) -> Pos {
        match self {
            Event::Start { pos, .. } | Event::End { pos, .. } | Event::Text { pos, .. } => *pos,
        }
    }

    /// Localname of a `Start` event, if this is one.
    pub fn start_tag(&self) -> Option<&str> {
        match self {
            Event::Start { tag, .. } => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn end_tag(&self) -> Option<&str> {
        match self {
            Event::End { tag, .. } => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Event::Text { value, .. } => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, Event::Start { .. })
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Event::End { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Event::Text { .. })
    }

    /// Whitespace-only (or empty) text event.
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Event::Text { value, .. } if value.trim().is_empty())
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Event::Start { tag: t1, attrs: a1, .. },
                Event::Start { tag: t2, attrs: a2, .. },
            ) => t1 == t2 && a1 == a2,
            (Event::End { tag: t1, .. }, Event::End { tag: t2, .. }) => t1 == t2,
            (Event::Text { value: v1, .. }, Event::Text { value: v2, .. }) => v1 == v2,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Text extraction helpers
// ---------------------------------------------------------------------------

/// Fold any whitespace run to a single space and trim the ends.
pub fn collapse_ws(s: &str) -> String {
    WS_RUN.replace_all(s, " ").trim().to_string()
}

/// Collapsed, lowercased visible text of an event slice. The lowering makes
/// block alignment keys case-insensitive.
pub fn extract_text(events: &[Event]) -> String {
    let joined: String = events.iter().filter_map(Event::as_text).collect();
    collapse_ws(&joined).to_lowercase()
}

/// Visible text of an event slice, verbatim.
pub fn raw_text(events: &[Event]) -> String {
    events.iter().filter_map(Event::as_text).collect()
}

/// Split an event slice into (leading whitespace-only text events, core,
/// trailing whitespace-only text events).
pub fn strip_edge_whitespace(events: &[Event]) -> (&[Event], &[Event], &[Event]) {
    let mut i = 0;
    let mut j = events.len();
    while i < j && events[i].is_blank_text() {
        i += 1;
    }
    while j > i && events[j - 1].is_blank_text() {
        j -= 1;
    }
    (&events[..i], &events[i..j], &events[j..])
}

pub fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x.len_utf8())
        .sum()
}

/// Longest common suffix in bytes, bounded so it never overlaps a prefix of
/// `max_prefix` bytes on either side.
pub fn common_suffix_len(a: &str, b: &str, max_prefix: usize) -> usize {
    let limit = (a.len() - max_prefix).min(b.len() - max_prefix);
    let mut n = 0;
    let mut ac = a.chars().rev();
    let mut bc = b.chars().rev();
    loop {
        match (ac.next(), bc.next()) {
            (Some(x), Some(y)) if x == y && n + x.len_utf8() <= limit => n += x.len_utf8(),
            _ => return n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn style_normalization_reorders_and_trims() {
        assert_eq!(
            normalize_style_value("font-size: 20px; color: red"),
            normalize_style_value("color: red; font-size:20px"),
        );
        assert_eq!(normalize_style_value(";;"), "");
        assert_eq!(
            normalize_style_value("COLOR: Red"),
            normalize_style_value("color:Red"),
        );
    }

    #[test]
    fn attrs_equality_ignores_order() {
        let a = Attrs::from_pairs([("id", "x"), ("class", "a b")]);
        let b = Attrs::from_pairs([("class", "a b"), ("id", "x")]);
        assert_eq!(a, b);
    }

    #[test]
    fn attrs_equality_normalizes_style() {
        let a = Attrs::from_pairs([("style", "color:red; font-size:10px")]);
        let b = Attrs::from_pairs([("style", "font-size: 10px; color: red")]);
        assert_eq!(a, b);
        let c = Attrs::from_pairs([("style", "color:blue")]);
        assert_ne!(a, c);
    }

    #[test]
    fn append_class_preserves_existing() {
        let mut attrs = Attrs::from_pairs([("class", "report")]);
        attrs.append_class("tagdiff_added");
        assert_eq!(attrs.get("class"), Some("report tagdiff_added"));
        assert!(attrs.has_class("report"));
        assert!(attrs.has_class("tagdiff_added"));
    }

    #[test]
    fn event_equality_ignores_pos() {
        let a = Event::text("hi", Pos(1));
        let b = Event::text("hi", Pos(99));
        assert_eq!(a, b);
    }

    #[test]
    fn edge_whitespace_split() {
        let events = vec![
            Event::text("\n  ", Pos(0)),
            Event::text("core", Pos(1)),
            Event::text(" ", Pos(2)),
        ];
        let (lead, core, trail) = strip_edge_whitespace(&events);
        assert_eq!(lead.len(), 1);
        assert_eq!(core.len(), 1);
        assert_eq!(trail.len(), 1);
    }

    #[test]
    fn prefix_suffix_lengths() {
        let pre = common_prefix_len("Texto X tail", "Texto Y tail");
        assert_eq!(pre, 6);
        let suf = common_suffix_len("Texto X tail", "Texto Y tail", pre);
        assert_eq!(suf, 5);
    }
}
