// HTML fragment parsing — adapter around html5ever.
//
// html5ever has no streaming API, so the input is parsed into an RcDom tree
// (fragments land in the synthesized <body>) and then flattened into the
// flat event stream the engine works on, wrapped in one artificial wrapper
// element.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::ParseOpts;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use crate::error::DiffError;
use crate::event::{Attrs, Event, Pos};

/// Parse an HTML fragment into an event stream rooted at a single wrapper
/// element carrying the given tag and class.
///
/// Malformed but recoverable HTML never fails — html5ever repairs it the way
/// a browser would. Empty input yields just the wrapper start/end pair.
pub fn parse_html_fragment(
    html: &str,
    wrapper_element: &str,
    wrapper_class: &str,
) -> Result<Vec<Event>, DiffError> {
    let dom = parse_html(html);

    let mut events = Vec::new();
    let mut counter: u32 = 0;

    let wrapper_attrs = Attrs::from_pairs([("class", wrapper_class)]);
    events.push(Event::start(wrapper_element, wrapper_attrs, next_pos(&mut counter)));

    if let Some(body) = find_body(&dom.document) {
        for child in body.children.borrow().iter() {
            flatten(child, &mut events, &mut counter);
        }
    }

    events.push(Event::end(wrapper_element, next_pos(&mut counter)));
    Ok(events)
}

fn parse_html(html: &str) -> RcDom {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            drop_doctype: true,
            ..Default::default()
        },
        ..Default::default()
    };
    parse_document(RcDom::default(), opts)
        .from_utf8()
        .one(html.as_bytes())
}

/// The `<body>` element the parser hangs fragment content off:
/// document → html → body.
fn find_body(document: &Handle) -> Option<Handle> {
    let html = child_element(document, "html")?;
    child_element(&html, "body")
}

fn child_element(handle: &Handle, name: &str) -> Option<Handle> {
    handle
        .children
        .borrow()
        .iter()
        .find(|child| {
            matches!(&child.data, NodeData::Element { name: qual, .. } if qual.local.as_ref() == name)
        })
        .cloned()
}

/// Flatten one tree node into events. Elements become a Start/End pair with
/// their subtree in between; void elements naturally come out as adjacent
/// Start+End since they have no children. Comments and doctypes are dropped —
/// the event model has no variant for them.
fn flatten(handle: &Handle, events: &mut Vec<Event>, counter: &mut u32) {
    match &handle.data {
        NodeData::Text { contents } => {
            let value = contents.borrow().to_string();
            events.push(Event::text(value, next_pos(counter)));
        }
        NodeData::Element { name, attrs, .. } => {
            let tag = name.local.as_ref().to_string();
            let attrs = Attrs::from_pairs(
                attrs
                    .borrow()
                    .iter()
                    .map(|a| (a.name.local.as_ref().to_string(), a.value.to_string())),
            );
            events.push(Event::start(tag.clone(), attrs, next_pos(counter)));
            for child in handle.children.borrow().iter() {
                flatten(child, events, counter);
            }
            events.push(Event::end(tag, next_pos(counter)));
        }
        NodeData::Document => {
            for child in handle.children.borrow().iter() {
                flatten(child, events, counter);
            }
        }
        _ => {}
    }
}

fn next_pos(counter: &mut u32) -> Pos {
    let pos = Pos(*counter);
    *counter = counter.saturating_add(1);
    pos
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tags(events: &[Event]) -> Vec<String> {
        events
            .iter()
            .map(|e| match e {
                Event::Start { tag, .. } => format!("<{tag}>"),
                Event::End { tag, .. } => format!("</{tag}>"),
                Event::Text { value, .. } => format!("'{value}'"),
            })
            .collect()
    }

    #[test]
    fn empty_input_yields_wrapper_only() {
        let events = parse_html_fragment("", "div", "diff").unwrap();
        assert_eq!(tags(&events), vec!["<div>", "</div>"]);
        assert_eq!(events[0].start_tag(), Some("div"));
    }

    #[test]
    fn simple_paragraph() {
        let events = parse_html_fragment("<p>Hi</p>", "div", "diff").unwrap();
        assert_eq!(tags(&events), vec!["<div>", "<p>", "'Hi'", "</p>", "</div>"]);
    }

    #[test]
    fn void_element_is_start_end_pair() {
        let events = parse_html_fragment("a<br>b", "div", "diff").unwrap();
        assert_eq!(
            tags(&events),
            vec!["<div>", "'a'", "<br>", "</br>", "'b'", "</div>"]
        );
    }

    #[test]
    fn whitespace_and_newlines_preserved() {
        let events = parse_html_fragment("<p>a</p>\n  <p>b</p>", "div", "diff").unwrap();
        let texts: Vec<&str> = events.iter().filter_map(Event::as_text).collect();
        assert!(texts.contains(&"\n  "));
    }

    #[test]
    fn comments_are_dropped() {
        let events = parse_html_fragment("x<!-- hidden -->y", "div", "diff").unwrap();
        let texts: String = events.iter().filter_map(Event::as_text).collect();
        assert_eq!(texts, "xy");
    }

    #[test]
    fn table_structure_survives() {
        let events =
            parse_html_fragment("<table><tr><td>x</td></tr></table>", "div", "diff").unwrap();
        let starts: Vec<&str> = events.iter().filter_map(Event::start_tag).collect();
        assert!(starts.contains(&"table"));
        assert!(starts.contains(&"tr"));
        assert!(starts.contains(&"td"));
    }

    #[test]
    fn wrapper_class_is_set() {
        let events = parse_html_fragment("x", "section", "changes").unwrap();
        match &events[0] {
            Event::Start { tag, attrs, .. } => {
                assert_eq!(tag, "section");
                assert_eq!(attrs.get("class"), Some("changes"));
            }
            other => panic!("expected wrapper start, got {other:?}"),
        }
    }
}
