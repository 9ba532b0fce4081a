// Adjacent change-tag merge — coalesce `</ins><ins>` (and `del`) seams.
//
// Token-level diffing emits one marker per token run, which reads as
// `<ins>en</ins><ins> </ins><ins>negrita</ins>`. Merging keeps the output
// compact without collapsing unrelated changes: a seam merges only when
// both tags are attribute-free, or both carry the same group id.

use crate::config::DiffConfig;
use crate::event::Event;

pub(crate) fn merge_adjacent_change_tags(events: &[Event], config: &DiffConfig) -> Vec<Event> {
    let mut out: Vec<Event> = Vec::with_capacity(events.len());

    for event in events {
        if let Event::Start { tag, attrs, .. } = event {
            if (tag == "ins" || tag == "del")
                && out.last().is_some_and(|prev| prev.end_tag() == Some(tag.as_str()))
            {
                if attrs.is_empty() {
                    out.pop();
                    continue;
                }
                if let Some(this_id) = attrs.get(&config.diff_id_attr) {
                    if let Some(start_idx) = matching_start_index(&out, tag) {
                        if let Event::Start { attrs: prev_attrs, .. } = &out[start_idx] {
                            if prev_attrs.get(&config.diff_id_attr) == Some(this_id) {
                                // Keep the first Start and its metadata;
                                // drop the seam.
                                out.pop();
                                continue;
                            }
                        }
                    }
                }
            }
        }
        out.push(event.clone());
    }
    out
}

/// Index of the `Start` matching the trailing `End` for `tag` in `out`.
fn matching_start_index(out: &[Event], tag: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (idx, event) in out.iter().enumerate().rev() {
        if event.end_tag() == Some(tag) {
            depth += 1;
        } else if event.start_tag() == Some(tag) {
            depth -= 1;
            if depth == 0 {
                return Some(idx);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Attrs, Pos};
    use pretty_assertions::assert_eq;

    fn ins(id: Option<&str>, config: &DiffConfig) -> Attrs {
        let mut attrs = Attrs::new();
        if let Some(id) = id {
            attrs.set(&config.diff_id_attr, id);
        }
        attrs
    }

    fn marked(text: &str, id: Option<&str>, config: &DiffConfig) -> Vec<Event> {
        vec![
            Event::start("ins", ins(id, config), Pos(0)),
            Event::text(text, Pos(0)),
            Event::end("ins", Pos(0)),
        ]
    }

    #[test]
    fn merges_same_id_runs() {
        let config = DiffConfig::default();
        let mut events = marked("en", Some("1"), &config);
        events.extend(marked(" ", Some("1"), &config));
        events.extend(marked("negrita", Some("1"), &config));
        let merged = merge_adjacent_change_tags(&events, &config);
        assert_eq!(merged.len(), 5);
        let texts: String = merged.iter().filter_map(Event::as_text).collect();
        assert_eq!(texts, "en negrita");
    }

    #[test]
    fn keeps_distinct_ids_apart() {
        let config = DiffConfig::default();
        let mut events = marked("a", Some("1"), &config);
        events.extend(marked("b", Some("2"), &config));
        let merged = merge_adjacent_change_tags(&events, &config);
        assert_eq!(merged.len(), 6);
    }

    #[test]
    fn merges_attribute_free_tags() {
        let config = DiffConfig::default();
        let mut events = marked("a", None, &config);
        events.extend(marked("b", None, &config));
        let merged = merge_adjacent_change_tags(&events, &config);
        assert_eq!(merged.len(), 4);
    }

    #[test]
    fn merge_is_idempotent() {
        let config = DiffConfig::default();
        let mut events = marked("a", Some("1"), &config);
        events.extend(marked("b", Some("1"), &config));
        let once = merge_adjacent_change_tags(&events, &config);
        let twice = merge_adjacent_change_tags(&once, &config);
        assert_eq!(once, twice);
    }
}
