// Inner event differ — recursive, atom-free.
//
// Handles `Replace` opcodes from the outer aligner and re-diffs structural
// containers whose atoms compared equal but whose events differ. Runs LCS on
// raw events, reapplies the opcode normalizations, and falls back to a
// deterministic pairwise walk when no rewriter claims the slice.

use crate::config::is_inline_formatting_tag;
use crate::event::{collapse_ws, common_prefix_len, common_suffix_len, Attrs, Event};

use super::atoms::has_visual_attrs;
use super::lcs::{self, OpTag};
use super::normalize;
use super::{ChangeKind, StreamDiffer};

impl StreamDiffer<'_> {
    /// Event-level diff of the two full streams (no atomization). Entry
    /// point for [`super::diff_event_slices`].
    pub(crate) fn process_events(&mut self) {
        // Visual-only container change: treat the whole slice as one
        // replace so the del→ins rendering sees both sides, instead of LCS
        // flagging just the start tag.
        if normalize::should_force_visual_replace(&self.old_events, &self.new_events, self.config) {
            let old_len = self.old_events.len();
            let new_len = self.new_events.len();
            self.replace_range(0, old_len, 0, new_len);
            self.leave_all();
            return;
        }

        let mut opcodes = lcs::opcodes(&self.old_events, &self.new_events);
        if self.config.delete_first {
            opcodes = normalize::delete_first(opcodes);
        }
        opcodes = normalize::fuse_inline_wrapper_attr_change(opcodes, &self.old_events, &self.new_events);
        opcodes = normalize::fuse_inline_wrapper_tag_change(opcodes, &self.old_events, &self.new_events);

        let mut k = 0;
        while k < opcodes.len() {
            if self.try_table_cell_wrapper_pattern(&opcodes, k) {
                k += 3;
                continue;
            }

            let op = opcodes[k];
            match op.tag {
                OpTag::Replace => self.replace_range(op.old_lo, op.old_hi, op.new_lo, op.new_hi),
                OpTag::Delete => {
                    let events = self.old_events[op.old_lo..op.old_hi].to_vec();
                    self.with_group(None, |d| d.delete_events(&events));
                }
                OpTag::Insert => {
                    let events = self.new_events[op.new_lo..op.new_hi].to_vec();
                    self.with_group(None, |d| d.insert_events(&events));
                }
                OpTag::Equal => {
                    let events = self.old_events[op.old_lo..op.old_hi].to_vec();
                    self.unchanged_events(&events);
                }
            }
            k += 1;
        }
        self.leave_all();
    }

    // -- replace -------------------------------------------------------------

    pub(crate) fn replace_range(
        &mut self,
        old_lo: usize,
        old_hi: usize,
        new_lo: usize,
        new_hi: usize,
    ) {
        let old = self.old_events[old_lo..old_hi].to_vec();
        let new = self.new_events[new_lo..new_hi].to_vec();

        if self.handle_replace_special_cases(&old, &new) {
            return;
        }

        // Pairwise walk over the two slices.
        let len = old.len().max(new.len());
        for idx in 0..len {
            match (old.get(idx).cloned(), new.get(idx).cloned()) {
                (None, Some(_)) => {
                    let events = self.new_events[new_lo + idx..new_hi].to_vec();
                    self.with_group(None, |d| d.insert_events(&events));
                    break;
                }
                (Some(_), None) => {
                    let events = self.old_events[old_lo + idx..old_hi].to_vec();
                    self.with_group(None, |d| d.delete_events(&events));
                    break;
                }
                (Some(old_event), Some(new_event)) => {
                    if discriminant_matches(&old_event, &new_event) {
                        self.replace_matching_events(&old_event, &new_event);
                    } else if self.replace_mismatched_events(
                        &old_event,
                        &new_event,
                        old_lo + idx,
                        old_hi,
                        new_lo + idx,
                        new_hi,
                    ) {
                        break;
                    }
                }
                (None, None) => unreachable!(),
            }
        }
    }

    fn replace_matching_events(&mut self, old_event: &Event, new_event: &Event) {
        match (old_event, new_event) {
            (Event::Start { attrs: old_attrs, .. }, Event::Start { tag, attrs, pos }) => {
                let (tag, attrs, old_attrs) = (tag.clone(), attrs.clone(), old_attrs.clone());
                self.enter_mark_replaced(*pos, &tag, attrs, &old_attrs);
            }
            (Event::End { tag: old_tag, .. }, Event::End { tag, pos }) => {
                let (old_tag, tag, pos) = (old_tag.clone(), tag.clone(), *pos);
                if !self.leave(pos, &tag) {
                    self.leave(pos, &old_tag);
                }
            }
            (Event::Text { value: old_value, .. }, Event::Text { value, pos }) => {
                let (old_value, value, pos) = (old_value.clone(), value.clone(), *pos);
                self.diff_text(pos, &old_value, &value);
            }
            _ => unreachable!("variants checked by caller"),
        }
    }

    /// Mismatched variants in a pairwise replace. Returns true when the rest
    /// of the slice was consumed.
    fn replace_mismatched_events(
        &mut self,
        old_event: &Event,
        new_event: &Event,
        old_from: usize,
        old_hi: usize,
        new_from: usize,
        new_hi: usize,
    ) -> bool {
        // Old text vanished where the new side opens or closes a tag.
        if let Event::Text { value, pos } = old_event {
            let (value, pos) = (value.clone(), *pos);
            self.mark_text(pos, &value, ChangeKind::Del, None);
            match new_event {
                Event::Start { tag, attrs, pos } => {
                    let (tag, attrs, pos) = (tag.clone(), attrs.clone(), *pos);
                    self.enter(pos, &tag, attrs);
                }
                Event::End { tag, pos } => {
                    let (tag, pos) = (tag.clone(), *pos);
                    self.leave(pos, &tag);
                }
                Event::Text { .. } => unreachable!("variants differ"),
            }
            return false;
        }

        // The old side had markup the new side flattened to text: a stable
        // delete→insert that keeps the old formatting inside the <del>
        // ("Texto <strong>en negrita</strong>" → "Texto normal").
        let old_events = self.old_events[old_from..old_hi].to_vec();
        let new_events = self.new_events[new_from..new_hi].to_vec();
        self.with_group(None, |d| {
            d.delete_events(&old_events);
            d.insert_events(&new_events);
        });
        true
    }

    // -- table cell wrapper opcode pattern ------------------------------------

    /// Styled inline wrapper added around the existing text of a cell:
    /// `Replace(Start td)` + `Equal(Text)` + `Insert(..wrapper End..)`.
    /// Renders the cell replaced-in-place with the wrapper marked
    /// `tagdiff_replaced data-old-tag="none"`, text emitted once.
    fn try_table_cell_wrapper_pattern(&mut self, opcodes: &[lcs::Opcode], k: usize) -> bool {
        if k + 2 >= opcodes.len() {
            return false;
        }
        let (op1, op2, op3) = (opcodes[k], opcodes[k + 1], opcodes[k + 2]);
        if !(op1.tag == OpTag::Replace
            && op2.tag == OpTag::Equal
            && op3.tag == OpTag::Insert
            && op1.old_len() == 1
            && op2.old_len() == 1
            && op2.new_len() == 1
            && op1.new_len() >= 2)
        {
            return false;
        }

        let Event::Start { tag: cont_tag, attrs: cont_attrs_new, .. } =
            self.new_events[op1.new_lo].clone()
        else {
            return false;
        };
        if cont_tag != "td" && cont_tag != "th" {
            return false;
        }
        let Event::Start { attrs: old_cont_attrs, .. } = self.old_events[op1.old_lo].clone() else {
            return false;
        };
        let Event::Text { value: old_text, .. } = self.old_events[op2.old_lo].clone() else {
            return false;
        };
        let Event::Text { value: new_text, pos: new_text_pos } =
            self.new_events[op2.new_lo].clone()
        else {
            return false;
        };

        // Find the last styled inline wrapper opened in the inserted range.
        let mut wrapper: Option<(usize, String, Attrs)> = None;
        for j in op1.new_lo + 1..op1.new_hi {
            if let Event::Start { tag, attrs, .. } = &self.new_events[j] {
                if is_inline_formatting_tag(tag) && has_visual_attrs(attrs, self.config) {
                    wrapper = Some((j, tag.clone(), attrs.clone()));
                }
            }
        }
        let Some((wrapper_idx, wrapper_tag, wrapper_attrs)) = wrapper else {
            return false;
        };
        if op3.new_len() < 1 {
            return false;
        }
        let Event::End { tag: end_tag, pos: end_pos } = self.new_events[op3.new_lo].clone() else {
            return false;
        };
        if end_tag != wrapper_tag {
            return false;
        }
        if collapse_ws(&old_text) != collapse_ws(&new_text) {
            return false;
        }

        let new_start_pos = self.new_events[op1.new_lo].pos();
        self.enter_mark_replaced(new_start_pos, &cont_tag, cont_attrs_new, &old_cont_attrs);
        // Whitespace between container and wrapper.
        let lead = self.new_events[op1.new_lo + 1..wrapper_idx].to_vec();
        self.append_all(&lead);

        let mut marked = wrapper_attrs;
        marked.append_class("tagdiff_replaced");
        marked.set("data-old-tag", "none");
        self.inject_diff_id(&mut marked, None);
        let wrapper_pos = self.new_events[wrapper_idx].pos();
        self.enter(wrapper_pos, &wrapper_tag, marked);
        // The shared text, once.
        self.push_text(old_text, new_text_pos);
        self.leave(end_pos, &end_tag);
        // Remaining insert tail (indentation).
        let tail = self.new_events[op3.new_lo + 1..op3.new_hi].to_vec();
        self.append_all(&tail);
        true
    }

    // -- forced event diff for void tags --------------------------------------

    /// Atom keys agreed but the streams differ around a configured void tag
    /// (`<img>`). Diff only the children when both sides are one container,
    /// keeping unchanged text out of the markers when the only change is a
    /// trailing void element.
    pub(crate) fn force_event_diff_for_void_tags(
        &mut self,
        old_events: &[Event],
        new_events: &[Event],
    ) -> bool {
        if self.config.force_event_diff_on_equal_for_tags.is_empty() {
            return false;
        }
        let has_force_tag = |events: &[Event]| {
            events
                .iter()
                .filter_map(Event::start_tag)
                .any(|tag| self.config.forces_event_diff_for(tag))
        };
        if !has_force_tag(old_events) && !has_force_tag(new_events) {
            return false;
        }

        let same_container = old_events.len() >= 2
            && new_events.len() >= 2
            && matches!(
                (&old_events[0], &new_events[0]),
                (Event::Start { tag: a, .. }, Event::Start { tag: b, .. }) if a == b
            )
            && matches!(
                (&old_events[old_events.len() - 1], &new_events[new_events.len() - 1]),
                (Event::End { tag: a, .. }, Event::End { tag: b, .. }) if a == b
            );

        if !same_container {
            let out = super::diff_event_slices(old_events, new_events, self.config, self.ids_handle());
            self.extend_output(out);
            return true;
        }

        let Event::Start { tag: cont_tag, attrs: cont_attrs, pos: cont_pos } = &new_events[0]
        else {
            unreachable!();
        };
        let (cont_tag, cont_attrs, cont_pos) = (cont_tag.clone(), cont_attrs.clone(), *cont_pos);
        self.enter(cont_pos, &cont_tag, cont_attrs);

        let old_children = &old_events[1..old_events.len() - 1];
        let new_children = &new_events[1..new_events.len() - 1];

        if !self.diff_children_around_void_tail(old_children, new_children) {
            let out =
                super::diff_event_slices(old_children, new_children, self.config, self.ids_handle());
            self.extend_output(out);
        }

        let end_pos = new_events[new_events.len() - 1].pos();
        self.leave(end_pos, &cont_tag);
        true
    }

    /// Common text plus a one-sided void tail: emit the shared text
    /// unchanged and only wrap the differing tail.
    fn diff_children_around_void_tail(
        &mut self,
        old_children: &[Event],
        new_children: &[Event],
    ) -> bool {
        let Some(parsed_old) = self.split_text_then_void_tail(old_children) else {
            return false;
        };
        let Some(parsed_new) = self.split_text_then_void_tail(new_children) else {
            return false;
        };
        let (_old_lead, old_text_event, old_tail) = parsed_old;
        let (new_lead, new_text_event, new_tail) = parsed_new;
        let (Some(old_text_event), Some(new_text_event)) = (old_text_event, new_text_event) else {
            return false;
        };
        let old_text = old_text_event.as_text().unwrap_or_default().to_string();
        let new_text = new_text_event.as_text().unwrap_or_default().to_string();
        if collapse_ws(&old_text) != collapse_ws(&new_text) {
            return false;
        }

        let pre = common_prefix_len(&old_text, &new_text);
        let suf = common_suffix_len(&old_text, &new_text, pre);
        let old_mid = &old_text[pre..old_text.len() - suf];
        let new_mid = &new_text[pre..new_text.len() - suf];
        let common = format!("{}{}", &old_text[..pre], &old_text[old_text.len() - suf..]);

        let old_changed = !old_mid.is_empty() || !old_tail.is_empty();
        let new_changed = !new_mid.is_empty() || !new_tail.is_empty();

        let old_tail = old_tail.to_vec();
        let new_tail = new_tail.to_vec();
        let new_lead = new_lead.to_vec();

        self.append_all(&new_lead);
        self.push_text(common, new_text_event.pos());

        if old_changed && !new_changed {
            let attrs = self.change_attrs(None);
            let pos = old_text_event.pos();
            self.append(Event::start("del", attrs, pos));
            if !old_mid.is_empty() {
                let visible = self.visible_inline_ws(old_mid);
                self.push_text(visible, pos);
            }
            self.append_all(&old_tail);
            self.append(Event::end("del", pos));
        } else if new_changed && !old_changed {
            let attrs = self.change_attrs(None);
            let pos = new_text_event.pos();
            self.append(Event::start("ins", attrs, pos));
            if !new_mid.is_empty() {
                let visible = self.visible_inline_ws(new_mid);
                self.push_text(visible, pos);
            }
            self.append_all(&new_tail);
            self.append(Event::end("ins", pos));
        } else {
            return false;
        }
        true
    }

    /// Keep newlines (indentation) as-is, but make inline whitespace visible
    /// inside change markers.
    fn visible_inline_ws(&self, s: &str) -> String {
        if !self.config.preserve_whitespace_in_diff {
            return s.to_string();
        }
        s.chars()
            .map(|ch| {
                if ch.is_whitespace() && ch != '\n' && ch != '\r' {
                    '\u{a0}'
                } else {
                    ch
                }
            })
            .collect()
    }

    /// Split children into (leading whitespace, at most one text event with
    /// visible content, tail of whitespace and configured void tags).
    #[allow(clippy::type_complexity)]
    fn split_text_then_void_tail<'e>(
        &self,
        children: &'e [Event],
    ) -> Option<(&'e [Event], Option<&'e Event>, &'e [Event])> {
        let mut i = 0;
        while i < children.len() && children[i].is_blank_text() {
            i += 1;
        }
        if i >= children.len() {
            return Some((&children[..i], None, &children[i..]));
        }
        if !children[i].is_text() {
            return None;
        }
        let text_event = &children[i];
        let tail = &children[i + 1..];
        for event in tail {
            match event {
                Event::Text { value, .. } => {
                    if !value.trim().is_empty() {
                        return None;
                    }
                }
                Event::Start { tag, .. } => {
                    if !self.config.forces_event_diff_for(tag) {
                        return None;
                    }
                }
                Event::End { tag, .. } => {
                    if !self.config.forces_event_diff_for(tag) {
                        return None;
                    }
                }
            }
        }
        Some((&children[..i], Some(text_event), tail))
    }
}

fn discriminant_matches(a: &Event, b: &Event) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}
