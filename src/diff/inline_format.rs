// Inline formatting diff — same text, different inline wrappers.
//
// `<p><span>CLINICAL:</span> stable.</p>` → `<p><strong>CLINICAL:</strong>
// stable.</p>` should mark only the rewrapped region, leaving the unchanged
// tail out of the diff entirely. Text spans are extracted with their active
// formatting stack, the pure text is compared, and only spans whose wrapper
// names changed render as a del+ins pair.

use crate::event::{collapse_ws, Attrs, Event, Pos};

use super::{ChangeKind, StreamDiffer};
use crate::config::is_inline_formatting_tag;

#[derive(Debug, Clone)]
struct TextSpan {
    text: String,
    formatting: Vec<(String, Attrs)>,
    start_char: usize,
    end_char: usize,
}

fn extract_text_spans(events: &[Event]) -> Vec<TextSpan> {
    let mut spans = Vec::new();
    let mut formatting: Vec<(String, Attrs)> = Vec::new();
    let mut char_pos = 0usize;

    for event in events {
        match event {
            Event::Start { tag, attrs, .. } => {
                if is_inline_formatting_tag(tag) {
                    formatting.push((tag.clone(), attrs.clone()));
                }
            }
            Event::End { tag, .. } => {
                if is_inline_formatting_tag(tag) {
                    if let Some(i) = formatting.iter().rposition(|(t, _)| t == tag) {
                        formatting.remove(i);
                    }
                }
            }
            Event::Text { value, .. } => {
                if !value.is_empty() {
                    let len = value.chars().count();
                    spans.push(TextSpan {
                        text: value.clone(),
                        formatting: formatting.clone(),
                        start_char: char_pos,
                        end_char: char_pos + len,
                    });
                    char_pos += len;
                }
            }
        }
    }
    spans
}

fn formatting_names(formatting: &[(String, Attrs)]) -> Vec<&str> {
    formatting.iter().map(|(t, _)| t.as_str()).collect()
}

fn char_slice(s: &str, from: usize, to: usize) -> String {
    s.chars().skip(from).take(to.saturating_sub(from)).collect()
}

/// Try the inline-formatting diff. Only fires when both sides are the same
/// container with equal attributes and the concatenated text matches after
/// whitespace collapse — otherwise the visual-replace rewriters own the
/// change. Nothing is emitted unless the whole slice is handled.
pub(crate) fn try_inline_formatting_diff(
    differ: &mut StreamDiffer<'_>,
    old_events: &[Event],
    new_events: &[Event],
) -> bool {
    let (old_children, container) = split_container(old_events);
    let (new_children, new_container) = split_container(new_events);

    match (&container, &new_container) {
        (Some((old_tag, old_attrs)), Some((new_tag, new_attrs))) => {
            if old_tag != new_tag || old_attrs != new_attrs {
                return false;
            }
        }
        (None, None) => {}
        _ => return false,
    }

    // Only text and inline wrappers may appear: anything else (<br>, <img>)
    // would be silently dropped by the span walk.
    let only_inline_content = |events: &[Event]| {
        events.iter().all(|event| match event {
            Event::Text { .. } => true,
            Event::Start { tag, .. } | Event::End { tag, .. } => is_inline_formatting_tag(tag),
        })
    };
    if !only_inline_content(old_children) || !only_inline_content(new_children) {
        return false;
    }

    let old_spans = extract_text_spans(old_children);
    let new_spans = extract_text_spans(new_children);

    let old_text: String = old_spans.iter().map(|s| s.text.as_str()).collect();
    let new_text: String = new_spans.iter().map(|s| s.text.as_str()).collect();
    if collapse_ws(&old_text) != collapse_ws(&new_text) {
        return false;
    }
    // The formatting must actually differ somewhere, or there is nothing to
    // mark.
    if old_spans.len() == new_spans.len()
        && old_spans
            .iter()
            .zip(new_spans.iter())
            .all(|(a, b)| formatting_names(&a.formatting) == formatting_names(&b.formatting))
    {
        return false;
    }

    let pos = Pos::synthetic();

    if let Some((tag, attrs)) = new_container {
        let start_pos = new_events[0].pos();
        differ.enter(start_pos, &tag, attrs);
    }

    for span in &new_spans {
        let old_fmt = formatting_at(&old_spans, span.start_char);
        if formatting_names(old_fmt) == formatting_names(&span.formatting) {
            emit_with_formatting(differ, &span.text, &span.formatting, pos, None);
            continue;
        }

        // Find the old text overlapping this span, with its formatting.
        let mut old_text_at = String::new();
        let mut del_fmt: &[(String, Attrs)] = old_fmt;
        for old_span in &old_spans {
            if old_span.start_char <= span.start_char && span.start_char < old_span.end_char {
                let from = span.start_char.max(old_span.start_char) - old_span.start_char;
                let to = span.end_char.min(old_span.end_char) - old_span.start_char;
                if from < to {
                    old_text_at = char_slice(&old_span.text, from, to);
                    del_fmt = &old_span.formatting;
                }
                break;
            }
        }

        let del_text = if old_text_at.is_empty() { span.text.clone() } else { old_text_at };
        let del_fmt = del_fmt.to_vec();
        let ins_fmt = span.formatting.clone();
        let ins_text = span.text.clone();
        differ.with_group(None, |d| {
            emit_with_formatting(d, &del_text, &del_fmt, pos, Some(ChangeKind::Del));
            emit_with_formatting(d, &ins_text, &ins_fmt, pos, Some(ChangeKind::Ins));
        });
    }

    if let Some((tag, _)) = container {
        let end_pos = new_events[new_events.len() - 1].pos();
        differ.leave(end_pos, &tag);
    }
    true
}

fn formatting_at(spans: &[TextSpan], pos: usize) -> &[(String, Attrs)] {
    for span in spans {
        if span.start_char <= pos && pos < span.end_char {
            return &span.formatting;
        }
    }
    &[]
}

/// Peel a single wrapping container (Start … End) off the slice.
fn split_container(events: &[Event]) -> (&[Event], Option<(String, Attrs)>) {
    if events.len() > 2 {
        if let Event::Start { tag, attrs, .. } = &events[0] {
            if events[events.len() - 1].end_tag() == Some(tag.as_str()) {
                return (&events[1..events.len() - 1], Some((tag.clone(), attrs.clone())));
            }
        }
    }
    (events, None)
}

fn emit_with_formatting(
    differ: &mut StreamDiffer<'_>,
    text: &str,
    formatting: &[(String, Attrs)],
    pos: Pos,
    change: Option<ChangeKind>,
) {
    if text.is_empty() {
        return;
    }
    if let Some(kind) = change {
        let attrs = differ.change_attrs(None);
        differ.append(Event::start(kind.tag(), attrs, pos));
    }
    for (tag, attrs) in formatting {
        differ.append(Event::start(tag, attrs.clone(), pos));
    }
    differ.push_text(text.to_string(), pos);
    for (tag, _) in formatting.iter().rev() {
        differ.append(Event::end(tag, pos));
    }
    if let Some(kind) = change {
        differ.append(Event::end(kind.tag(), pos));
    }
}
