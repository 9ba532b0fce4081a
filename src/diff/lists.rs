// Structural list conversion — paragraphs wrapped into a list (or back),
// and same-list restyles (ul↔ol, bullet or inherited style changes).
//
// Rendering del+ins copies of whole lists duplicates every item and breaks
// per-change accept/reject. Instead one group id covers the conversion: the
// pre-change markup rides along as hidden revert data (or as a visibly
// deleted list on the reverse direction), and the post-change list is
// emitted once with class markers.

use crate::config::is_block_wrapper_tag;
use crate::event::{extract_text, Event};

use super::atoms::find_block_end;
use super::tables::merge_inherited_style;
use super::{diff_event_slices, ChangeKind, StreamDiffer};

pub(crate) fn has_list_tags(events: &[Event]) -> bool {
    events
        .iter()
        .filter_map(Event::start_tag)
        .any(|tag| matches!(tag, "ul" | "ol" | "li"))
}

pub(crate) fn count_block_wrappers(events: &[Event]) -> usize {
    events
        .iter()
        .filter_map(Event::start_tag)
        .filter(|tag| is_block_wrapper_tag(tag))
        .count()
}

/// Normalized item identity: collapsed, lowercased text with a leading list
/// marker stripped, so `- Item` (paragraph) matches `Item` (list item).
fn normalized_text(events: &[Event]) -> String {
    static MARKER: std::sync::LazyLock<regex::Regex> =
        std::sync::LazyLock::new(|| regex::Regex::new(r"^[-*•+]+\s+").unwrap());
    MARKER.replace(&extract_text(events), "").into_owned()
}

/// The slice's core must be exactly one `ul`/`ol` block. Returns the block.
fn single_list_block(events: &[Event]) -> Option<&[Event]> {
    let (_, core, _) = crate::event::strip_edge_whitespace(events);
    let first = core.first()?;
    let tag = first.start_tag()?;
    if tag != "ul" && tag != "ol" {
        return None;
    }
    let end = find_block_end(core, 0, tag);
    (end == core.len()).then_some(core)
}

/// The slice must contain only block-wrapper blocks (`p`, `h1..h6`) and
/// whitespace at the top level. Returns the blocks.
fn block_wrapper_blocks(events: &[Event]) -> Option<Vec<&[Event]>> {
    let mut blocks = Vec::new();
    let mut i = 0;
    while i < events.len() {
        match &events[i] {
            Event::Text { value, .. } if value.trim().is_empty() => i += 1,
            Event::Start { tag, .. } if is_block_wrapper_tag(tag) => {
                let j = find_block_end(events, i, tag);
                blocks.push(&events[i..j]);
                i = j;
            }
            _ => return None,
        }
    }
    (!blocks.is_empty()).then_some(blocks)
}

/// Direct `<li>` blocks of a list slice (`[Start(ul) … End(ul)]`).
fn list_items(list_events: &[Event]) -> Vec<(usize, usize)> {
    let mut items = Vec::new();
    let mut i = 1;
    let end = list_events.len().saturating_sub(1);
    while i < end {
        if list_events[i].start_tag() == Some("li") {
            let j = find_block_end(list_events, i, "li");
            items.push((i, j));
            i = j;
            continue;
        }
        i += 1;
    }
    items
}

impl StreamDiffer<'_> {
    /// Paragraphs ↔ list conversion. Exactly one side holds a single list;
    /// the other holds only block wrappers. Anything else is not handled.
    pub(crate) fn try_list_conversion_impl(
        &mut self,
        old_events: &[Event],
        new_events: &[Event],
    ) -> bool {
        let old_has = has_list_tags(old_events);
        let new_has = has_list_tags(new_events);
        if old_has == new_has {
            return false;
        }

        if new_has {
            // Forward: paragraphs wrapped into a list.
            let Some(list) = single_list_block(new_events) else {
                return false;
            };
            let Some(paragraphs) = block_wrapper_blocks(old_events) else {
                return false;
            };
            let (new_lws, _, new_tws) = crate::event::strip_edge_whitespace(new_events);
            let (new_lws, new_tws) = (new_lws.to_vec(), new_tws.to_vec());
            let list = list.to_vec();
            let paragraphs: Vec<Vec<Event>> = paragraphs.iter().map(|p| p.to_vec()).collect();
            let old_payload = old_events.to_vec();
            self.with_group(None, |d| {
                d.emit_structural_revert(&old_payload, None);
                d.append_all(&new_lws);
                d.emit_added_list(&list, &paragraphs);
                d.append_all(&new_tws);
            });
            return true;
        }

        // Reverse: a list flattened back to paragraphs. The deleted list
        // stays visible (it doubles as the revert payload), the new
        // paragraphs follow as inserts.
        let Some(list) = single_list_block(old_events) else {
            return false;
        };
        if block_wrapper_blocks(new_events).is_none() {
            return false;
        }
        let list = list.to_vec();
        let new_payload = new_events.to_vec();
        self.with_group(None, |d| {
            d.emit_deleted_list(&list);
            d.insert_events(&new_payload);
        });
        true
    }

    fn emit_added_list(&mut self, list_events: &[Event], paragraphs: &[Vec<Event>]) {
        let Some(Event::Start { tag: list_tag, attrs, pos }) = list_events.first() else {
            return;
        };
        let (list_tag, mut attrs, pos) = (list_tag.clone(), attrs.clone(), *pos);
        attrs.append_class("tagdiff_added");
        self.inject_diff_id(&mut attrs, None);
        self.append(Event::start(&list_tag, attrs, pos));

        let mut used = vec![false; paragraphs.len()];
        let items = list_items(list_events);
        let mut cursor = 1;
        for (start, end) in items {
            // Whitespace between items.
            let between = list_events[cursor..start].to_vec();
            self.append_all(&between);
            cursor = end;

            let item = &list_events[start..end];
            let Event::Start { attrs: li_attrs, pos: li_pos, .. } = &item[0] else {
                continue;
            };
            let (mut li_attrs, li_pos) = (li_attrs.clone(), *li_pos);
            li_attrs.append_class("diff-bullet-ins");
            self.inject_diff_id(&mut li_attrs, None);
            self.append(Event::start("li", li_attrs, li_pos));

            let children = item[1..item.len() - 1].to_vec();
            let item_text = normalized_text(item);
            let matched = paragraphs
                .iter()
                .enumerate()
                .find(|(i, p)| !used[*i] && normalized_text(p) == item_text);

            match matched {
                Some((pidx, paragraph)) => {
                    used[pidx] = true;
                    let paragraph = paragraph.clone();
                    // A p-wrapped item diffs against the whole paragraph;
                    // a bare item diffs against the paragraph's children.
                    let old_side: Vec<Event> = if children
                        .first()
                        .and_then(Event::start_tag)
                        .is_some_and(is_block_wrapper_tag)
                    {
                        paragraph
                    } else {
                        paragraph[1..paragraph.len() - 1].to_vec()
                    };
                    if old_side == children {
                        self.append_all(&children);
                    } else {
                        let out = diff_event_slices(
                            &old_side,
                            &children,
                            self.config,
                            self.ids_handle(),
                        );
                        self.extend_output(out);
                    }
                }
                None => {
                    // A genuinely new item: its content is an insertion.
                    self.insert_events(&children);
                }
            }

            self.append(Event::end("li", li_pos));
        }

        let tail = list_events[cursor..list_events.len() - 1].to_vec();
        self.append_all(&tail);
        let end_pos = list_events[list_events.len() - 1].pos();
        self.append(Event::end(&list_tag, end_pos));
    }

    fn emit_deleted_list(&mut self, list_events: &[Event]) {
        let Some(Event::Start { tag: list_tag, attrs, pos }) = list_events.first() else {
            return;
        };
        let (list_tag, mut attrs, pos) = (list_tag.clone(), attrs.clone(), *pos);
        attrs.append_class("tagdiff_deleted");
        self.inject_diff_id(&mut attrs, None);
        self.append(Event::start(&list_tag, attrs, pos));

        let items = list_items(list_events);
        let mut cursor = 1;
        for (start, end) in items {
            let between = list_events[cursor..start].to_vec();
            self.append_all(&between);
            cursor = end;

            let item = &list_events[start..end];
            let Event::Start { attrs: li_attrs, pos: li_pos, .. } = &item[0] else {
                continue;
            };
            let (mut li_attrs, li_pos) = (li_attrs.clone(), *li_pos);
            li_attrs.append_class("diff-bullet-del");
            self.inject_diff_id(&mut li_attrs, None);
            self.append(Event::start("li", li_attrs, li_pos));

            let children = item[1..item.len() - 1].to_vec();
            self.with_context(Some(ChangeKind::Del), |d| d.block_process(&children));

            self.append(Event::end("li", li_pos));
        }

        let tail = list_events[cursor..list_events.len() - 1].to_vec();
        self.append_all(&tail);
        let end_pos = list_events[list_events.len() - 1].pos();
        self.append(Event::end(&list_tag, end_pos));
    }

    /// Same list, different style or type. Items must match pairwise by
    /// text; the change is the bullet shape (`ul`↔`ol`, `list-style-type`)
    /// or inherited styling (font/color), or another tracked attribute.
    pub(crate) fn try_list_restyle_impl(
        &mut self,
        old_events: &[Event],
        new_events: &[Event],
    ) -> bool {
        let Some(old_list) = single_list_block(old_events) else {
            return false;
        };
        let Some(new_list) = single_list_block(new_events) else {
            return false;
        };
        let (Event::Start { tag: old_tag, attrs: old_attrs, .. }, Event::Start { tag: new_tag, attrs: new_attrs, .. }) =
            (&old_list[0], &new_list[0])
        else {
            return false;
        };

        let old_items = list_items(old_list);
        let new_items = list_items(new_list);
        if old_items.is_empty() || old_items.len() != new_items.len() {
            return false;
        }
        let same_texts = old_items.iter().zip(new_items.iter()).all(|(o, n)| {
            normalized_text(&old_list[o.0..o.1]) == normalized_text(&new_list[n.0..n.1])
        });
        if !same_texts {
            return false;
        }

        let old_style = old_attrs.get("style").unwrap_or_default();
        let new_style = new_attrs.get("style").unwrap_or_default();
        let bullet_shape_changed = old_tag != new_tag
            || style_prop(old_style, "list-style-type") != style_prop(new_style, "list-style-type");
        let inherited_changed = ["font-family", "font-size", "font-style", "font-weight", "color"]
            .iter()
            .any(|prop| style_prop(old_style, prop) != style_prop(new_style, prop));
        let attrs_changed = old_attrs != new_attrs;
        if !bullet_shape_changed && !inherited_changed && !attrs_changed {
            return false;
        }

        let old_list = old_list.to_vec();
        let new_list = new_list.to_vec();
        let old_attrs = old_attrs.clone();
        let inherited_only = !bullet_shape_changed;
        self.with_group(None, |d| {
            d.emit_structural_revert(&old_list, None);
            d.emit_restyled_list(&old_list, &new_list, &old_attrs, inherited_only);
        });
        true
    }

    fn emit_restyled_list(
        &mut self,
        old_list: &[Event],
        new_list: &[Event],
        old_attrs: &crate::event::Attrs,
        inherited_only: bool,
    ) {
        let Some(Event::Start { tag: list_tag, attrs, pos }) = new_list.first() else {
            return;
        };
        let (list_tag, mut attrs, pos) = (list_tag.clone(), attrs.clone(), *pos);
        attrs.append_class("tagdiff_added");
        self.inject_refattr(&mut attrs, old_attrs);
        self.inject_diff_id(&mut attrs, None);
        self.append(Event::start(&list_tag, attrs, pos));

        let old_items = list_items(old_list);
        let new_items = list_items(new_list);
        let del_style = merge_inherited_style(None, old_attrs.get("style"));

        let mut cursor = 1;
        for (idx, (start, end)) in new_items.iter().copied().enumerate() {
            let between = new_list[cursor..start].to_vec();
            self.append_all(&between);
            cursor = end;

            let item = &new_list[start..end];
            let Event::Start { attrs: li_attrs, pos: li_pos, .. } = &item[0] else {
                continue;
            };
            let (mut li_attrs, li_pos) = (li_attrs.clone(), *li_pos);
            let children = item[1..item.len() - 1].to_vec();

            if inherited_only {
                // The bullet glyph is unchanged; show old vs new styling of
                // the content instead of marking the bullet.
                self.inject_diff_id(&mut li_attrs, None);
                self.append(Event::start("li", li_attrs, li_pos));

                let (old_start, old_end) = old_items[idx];
                let old_children = old_list[old_start + 1..old_end - 1].to_vec();
                let del_style = del_style.clone();
                self.with_group(None, |d| {
                    let mut del_attrs = crate::event::Attrs::new();
                    if let Some(style) = &del_style {
                        del_attrs.set("style", style.clone());
                    }
                    d.inject_diff_id(&mut del_attrs, None);
                    d.append(Event::start("del", del_attrs, li_pos));
                    d.append_all(&old_children);
                    d.append(Event::end("del", li_pos));

                    let mut ins_attrs = crate::event::Attrs::new();
                    d.inject_diff_id(&mut ins_attrs, None);
                    d.append(Event::start("ins", ins_attrs, li_pos));
                    d.append_all(&children);
                    d.append(Event::end("ins", li_pos));
                });

                self.append(Event::end("li", li_pos));
                continue;
            }

            li_attrs.append_class("diff-bullet-ins");
            self.inject_diff_id(&mut li_attrs, None);
            self.append(Event::start("li", li_attrs, li_pos));

            let (old_start, old_end) = old_items[idx];
            let old_children = old_list[old_start + 1..old_end - 1].to_vec();
            if old_children == children {
                self.append_all(&children);
            } else {
                let out =
                    diff_event_slices(&old_children, &children, self.config, self.ids_handle());
                self.extend_output(out);
            }

            self.append(Event::end("li", li_pos));
        }

        let tail = new_list[cursor..new_list.len() - 1].to_vec();
        self.append_all(&tail);
        let end_pos = new_list[new_list.len() - 1].pos();
        self.append(Event::end(&list_tag, end_pos));
    }
}

/// Value of one property inside a style attribute, normalized.
fn style_prop(style: &str, prop: &str) -> Option<String> {
    style.split(';').find_map(|decl| {
        let (name, value) = decl.trim().split_once(':')?;
        (name.trim().eq_ignore_ascii_case(prop)).then(|| value.trim().to_lowercase())
    })
}

/// Free-function entry points used by the dispatcher.
pub(crate) fn try_list_conversion(
    differ: &mut StreamDiffer<'_>,
    old_events: &[Event],
    new_events: &[Event],
) -> bool {
    differ.try_list_conversion_impl(old_events, new_events)
}

pub(crate) fn try_list_restyle(
    differ: &mut StreamDiffer<'_>,
    old_events: &[Event],
    new_events: &[Event],
) -> bool {
    differ.try_list_restyle_impl(old_events, new_events)
}
