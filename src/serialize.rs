// Event stream → HTML string.
//
// Preserves event order and attribute order, self-closes void elements, and
// injects no whitespace of its own. Escaping is minimal-but-safe: `& < >` in
// text, plus `"` in attribute values. NBSP is written as the raw character —
// the text differ puts it there deliberately to keep whitespace visible.

use crate::event::Event;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Render an event stream back to HTML.
pub fn serialize_events(events: &[Event]) -> String {
    let mut out = String::new();
    for event in events {
        match event {
            Event::Start { tag, attrs, .. } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs.iter() {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_attr_into(value, &mut out);
                    out.push('"');
                }
                out.push('>');
            }
            Event::End { tag, .. } => {
                if !is_void_element(tag) {
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                }
            }
            Event::Text { value, .. } => {
                escape_text_into(value, &mut out);
            }
        }
    }
    out
}

fn escape_text_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr_into(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}
