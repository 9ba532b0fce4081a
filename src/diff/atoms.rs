// Atomizer — groups flat parser events into alignment units.
//
// The outer aligner matches on atom keys, not raw events; the key of each
// atom kind is chosen to maximize useful matches (a paragraph can match a
// list item with the same text, a row keeps its identity when a later column
// disappears, a styled cell forces a replace even when its text is equal).
// Every atom carries its underlying events so unchanged atoms re-emit
// verbatim.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::{is_inline_formatting_tag, DiffConfig, STRUCTURAL_CHILD_TAGS};
use crate::event::{collapse_ws, extract_text, Attrs, Event};

use super::text::text_split;

static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-*•+]+\s+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AtomKind {
    Text,
    Br,
    Event,
    Block,
}

/// Alignment key — what the outer LCS compares.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AtomKey {
    Text(String),
    Br,
    Event(Event),
    Block(BlockKey),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BlockKey {
    /// `li`/`p`/`h1..h6`: text-only identity (marker-stripped, lowercased) so
    /// a paragraph matches a list item with the same content.
    BlockText(String),
    /// `td`/`th` and visual containers: text plus visual-attr and
    /// inline-structure signatures, so style-only changes become replaces.
    Keyed {
        tag: String,
        text: String,
        attrs: Vec<(String, String)>,
        structure: Vec<String>,
    },
    /// `tr`: row identity lives in the first two direct cells.
    Row { first: String, second: String },
    /// `tr` with no direct cells.
    RowText(String),
    /// `ul`/`ol`: always equal at the outer level so children are diffed.
    List(String),
    /// Everything else block-like.
    Tagged { tag: String, text: String },
}

#[derive(Debug, Clone)]
pub(crate) struct Atom {
    pub kind: AtomKind,
    /// Block tag, for `AtomKind::Block`.
    pub tag: Option<String>,
    pub key: AtomKey,
    pub events: Vec<Event>,
}

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

/// Stable signature over the attributes considered meaningful for matching
/// (the configured visual set plus the implicit `id`).
pub(crate) fn attrs_signature(attrs: &Attrs, config: &DiffConfig) -> Vec<(String, String)> {
    let mut sig = Vec::new();
    for key in tracked_keys(config) {
        if let Some(value) = attrs.get(&key) {
            sig.push((key, value.to_string()));
        }
    }
    sig
}

/// Fingerprint of the inline formatting structure within a block: the inline
/// wrapper localnames in document order. `<br>` is deliberately excluded —
/// line breaks diff as their own atoms, and including them here would force
/// a visual replace of entire blocks on layout-only changes.
pub(crate) fn structure_signature(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(Event::start_tag)
        .filter(|tag| is_inline_formatting_tag(tag))
        .map(str::to_string)
        .collect()
}

pub(crate) fn has_visual_attrs(attrs: &Attrs, config: &DiffConfig) -> bool {
    tracked_keys(config)
        .into_iter()
        .any(|key| attrs.get(&key).is_some_and(|v| !v.is_empty()))
}

fn tracked_keys(config: &DiffConfig) -> Vec<String> {
    let mut keys = config.track_attrs.clone();
    if !keys.iter().any(|k| k == "id") {
        keys.push("id".to_string());
    }
    keys
}

/// The artificial wrapper the parser adds around both fragments. Atomizing
/// it would swallow attribute-only changes inside as "equal".
pub(crate) fn is_diff_wrapper(tag: &str, attrs: &Attrs) -> bool {
    tag == "div" && attrs.has_class("diff")
}

// ---------------------------------------------------------------------------
// Block scanning
// ---------------------------------------------------------------------------

/// Index just past the `End` that closes the block starting at `start`,
/// honoring nesting of the same tag.
pub(crate) fn find_block_end(events: &[Event], start: usize, tag: &str) -> usize {
    let mut depth = 1usize;
    let mut j = start + 1;
    while j < events.len() && depth > 0 {
        match &events[j] {
            Event::Start { tag: t, .. } if t == tag => depth += 1,
            Event::End { tag: t, .. } if t == tag => depth -= 1,
            _ => {}
        }
        j += 1;
    }
    j
}

fn has_structural_children(block_events: &[Event]) -> bool {
    block_events[1..block_events.len().saturating_sub(1)]
        .iter()
        .filter_map(Event::start_tag)
        .any(|tag| STRUCTURAL_CHILD_TAGS.contains(&tag))
}

/// Visible text of the first `n` direct `<td>`/`<th>` cells of a row. Row
/// identity usually lives in the leading columns, so keying on them keeps a
/// row matched to itself when a later column is added or removed.
fn first_cell_texts(tr_events: &[Event], n: usize) -> Vec<String> {
    let mut texts = Vec::new();
    let mut in_cell: Option<(String, usize)> = None;
    let mut buf = String::new();

    for event in tr_events {
        match event {
            Event::Start { tag, .. } if tag == "td" || tag == "th" => match in_cell {
                Some((ref cell_tag, ref mut depth)) if cell_tag == tag => *depth += 1,
                Some(_) => {}
                None => {
                    in_cell = Some((tag.clone(), 1));
                    buf.clear();
                }
            },
            Event::End { tag, .. } if tag == "td" || tag == "th" => {
                let mut closed = false;
                if let Some((cell_tag, depth)) = in_cell.as_mut() {
                    if cell_tag == tag {
                        *depth -= 1;
                        closed = *depth == 0;
                    }
                }
                if closed {
                    texts.push(collapse_ws(&buf));
                    in_cell = None;
                    if texts.len() >= n {
                        break;
                    }
                }
            }
            Event::Text { value, .. } => {
                if in_cell.is_some() {
                    buf.push_str(value);
                }
            }
            _ => {}
        }
    }

    texts.resize(n, String::new());
    texts
}

fn block_tags(config: &DiffConfig) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let mut add = |tag: &str| {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    };
    if config.enable_list_atomization {
        add("li");
    }
    if config.enable_table_atomization {
        // Rows and cells atomize so the outer matcher doesn't drift across
        // rows; the table itself atomizes so its start/end can't split
        // across opcodes when only the table tag is restyled.
        for tag in ["td", "th", "tr", "table"] {
            add(tag);
        }
    }
    if config.enable_inline_wrapper_atomization {
        for tag in ["b", "strong", "i", "em"] {
            add(tag);
        }
    }
    for tag in &config.visual_atomize_tags {
        add(tag);
    }
    tags
}

fn block_key(tag: &str, block_events: &[Event], attrs: &Attrs, config: &DiffConfig) -> BlockKey {
    let block_text = extract_text(block_events);
    match tag {
        "td" | "th" => BlockKey::Keyed {
            tag: tag.to_string(),
            text: block_text,
            attrs: attrs_signature(attrs, config),
            structure: structure_signature(block_events),
        },
        "tr" => {
            let cells = first_cell_texts(block_events, 2);
            if cells.iter().any(|c| !c.is_empty()) {
                BlockKey::Row { first: cells[0].clone(), second: cells[1].clone() }
            } else {
                BlockKey::RowText(block_text)
            }
        }
        "li" | "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            BlockKey::BlockText(LIST_MARKER.replace(&block_text, "").into_owned())
        }
        "ul" | "ol" => BlockKey::List(tag.to_string()),
        _ if config.is_visual_atomize_tag(tag) => BlockKey::Keyed {
            tag: tag.to_string(),
            text: block_text,
            attrs: attrs_signature(attrs, config),
            structure: structure_signature(block_events),
        },
        _ => BlockKey::Tagged { tag: tag.to_string(), text: block_text },
    }
}

// ---------------------------------------------------------------------------
// Atomization
// ---------------------------------------------------------------------------

/// Convert a flat event stream into atoms. The concatenation of all atom
/// events reconstitutes the original stream (checked in debug builds).
pub(crate) fn atomize(events: &[Event], config: &DiffConfig) -> Vec<Atom> {
    let block_tags = block_tags(config);
    let mut atoms = Vec::new();
    let mut i = 0;

    while i < events.len() {
        // <br> collapses with its End into one atom so moving breaks can't
        // disturb the alignment of neighboring blocks.
        if let Event::Start { tag, .. } = &events[i] {
            if tag == "br"
                && events.get(i + 1).is_some_and(|e| e.end_tag() == Some("br"))
            {
                atoms.push(Atom {
                    kind: AtomKind::Br,
                    tag: None,
                    key: AtomKey::Br,
                    events: events[i..i + 2].to_vec(),
                });
                i += 2;
                continue;
            }
        }

        if let Event::Start { tag, attrs, .. } = &events[i] {
            let wrapper = is_diff_wrapper(tag, attrs);
            if block_tags.iter().any(|t| t == tag) && !wrapper {
                let j = find_block_end(events, i, tag);
                let block_events = &events[i..j];
                // A div with structural children is a section container;
                // swallowing it would hide every change inside.
                if !(tag == "div" && has_structural_children(block_events)) {
                    let key = block_key(tag, block_events, attrs, config);
                    atoms.push(Atom {
                        kind: AtomKind::Block,
                        tag: Some(tag.clone()),
                        key: AtomKey::Block(key),
                        events: block_events.to_vec(),
                    });
                    i = j;
                    continue;
                }
            }
        }

        if let Event::Text { value, pos } = &events[i] {
            if config.tokenize_text && !value.is_empty() {
                for part in text_split(config, value) {
                    atoms.push(Atom {
                        kind: AtomKind::Text,
                        tag: None,
                        key: AtomKey::Text(part.clone()),
                        events: vec![Event::text(part, *pos)],
                    });
                }
                i += 1;
                continue;
            }
        }

        atoms.push(Atom {
            kind: AtomKind::Event,
            tag: None,
            key: AtomKey::Event(events[i].clone()),
            events: vec![events[i].clone()],
        });
        i += 1;
    }

    debug_assert!(
        reconstitutes(&atoms, events),
        "atomizer lost or invented events"
    );
    atoms
}

pub(crate) fn concat_atom_events(atoms: &[Atom]) -> Vec<Event> {
    atoms.iter().flat_map(|a| a.events.iter().cloned()).collect()
}

/// Equivalence of the atomized stream with the original, treating adjacent
/// text events as one run (tokenization splits text events).
fn reconstitutes(atoms: &[Atom], original: &[Event]) -> bool {
    fn folded(events: &[Event]) -> Vec<Event> {
        let mut out: Vec<Event> = Vec::new();
        for event in events {
            match (out.last_mut(), event) {
                (Some(Event::Text { value: prev, .. }), Event::Text { value, .. }) => {
                    prev.push_str(value);
                }
                _ => out.push(event.clone()),
            }
        }
        out
    }
    folded(&concat_atom_events(atoms)) == folded(original)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_html_fragment;
    use pretty_assertions::assert_eq;

    fn atomize_fragment(html: &str) -> Vec<Atom> {
        let events = parse_html_fragment(html, "div", "diff").unwrap();
        atomize(&events, &DiffConfig::default())
    }

    #[test]
    fn wrapper_div_is_not_a_block_atom() {
        let atoms = atomize_fragment("text");
        assert_eq!(atoms[0].kind, AtomKind::Event);
    }

    #[test]
    fn br_pair_collapses() {
        let atoms = atomize_fragment("a<br>b");
        let kinds: Vec<AtomKind> = atoms.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                AtomKind::Event,
                AtomKind::Text,
                AtomKind::Br,
                AtomKind::Text,
                AtomKind::Event,
            ]
        );
    }

    #[test]
    fn paragraph_and_list_item_share_key() {
        let p = atomize_fragment("<p>Item A.</p>");
        // The li lives inside the ul block atom; atomize it directly.
        let li_events = parse_html_fragment("<ul><li>Item A.</li></ul>", "div", "diff").unwrap();
        let li_atoms = atomize(&li_events[2..li_events.len() - 2], &DiffConfig::default());
        assert_eq!(p[1].key, li_atoms[0].key);
    }

    #[test]
    fn list_marker_stripped_from_block_key() {
        let dashed = atomize_fragment("<p>- Item</p>");
        let plain = atomize_fragment("<p>Item</p>");
        assert_eq!(dashed[1].key, plain[1].key);
    }

    #[test]
    fn row_key_uses_first_two_cells() {
        let row_a = block_key_for("<table><tr><td>A</td><td>B</td><td>X</td></tr></table>");
        let row_b = block_key_for("<table><tr><td>A</td><td>B</td><td>Y</td></tr></table>");
        assert_eq!(row_a, row_b);
    }

    fn block_key_for(table_html: &str) -> BlockKey {
        let events = parse_html_fragment(table_html, "div", "diff").unwrap();
        let start = events
            .iter()
            .position(|e| e.start_tag() == Some("tr"))
            .unwrap();
        let end = find_block_end(&events, start, "tr");
        let attrs = Attrs::new();
        block_key("tr", &events[start..end], &attrs, &DiffConfig::default())
    }

    #[test]
    fn styled_cell_key_differs_from_plain() {
        let cfg = DiffConfig::default();
        let plain = parse_html_fragment("<table><tr><td>10.8</td></tr></table>", "div", "diff").unwrap();
        let styled = parse_html_fragment(
            "<table><tr><td><strong style=\"color:red\">10.8</strong></td></tr></table>",
            "div",
            "diff",
        )
        .unwrap();
        let key = |events: &[Event]| {
            let start = events.iter().position(|e| e.start_tag() == Some("td")).unwrap();
            let end = find_block_end(events, start, "td");
            block_key("td", &events[start..end], &Attrs::new(), &cfg)
        };
        assert_ne!(key(&plain), key(&styled));
    }

    #[test]
    fn div_with_structural_children_not_atomized() {
        let atoms = atomize_fragment("<div id=\"x\"><p>a</p></div>");
        // The inner div falls through to event atoms; the <p> becomes a block.
        assert!(atoms
            .iter()
            .any(|a| a.kind == AtomKind::Block && a.tag.as_deref() == Some("p")));
        assert!(!atoms
            .iter()
            .any(|a| a.kind == AtomKind::Block && a.tag.as_deref() == Some("div")));
    }

    #[test]
    fn plain_div_is_a_visual_block() {
        let atoms = atomize_fragment("<div id=\"x\">plain</div>");
        assert!(atoms
            .iter()
            .any(|a| a.kind == AtomKind::Block && a.tag.as_deref() == Some("div")));
    }

    #[test]
    fn text_atoms_tokenize() {
        let atoms = atomize_fragment("Foo bar");
        let texts: Vec<&str> = atoms
            .iter()
            .filter_map(|a| match &a.key {
                AtomKey::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["Foo", " ", "bar"]);
    }

    #[test]
    fn atom_events_reconstitute_stream() {
        let events =
            parse_html_fragment("<p>Hola <b>mundo</b></p><ul><li>x</li></ul>", "div", "diff")
                .unwrap();
        let atoms = atomize(&events, &DiffConfig::default());
        assert!(reconstitutes(&atoms, &events));
    }
}
