// Visual rewriters — changes where the text survives but its presentation
// doesn't: wrapper toggles, tag swaps, attribute-only restyles.
//
// Every rewriter either fully handles its slice or reports false without
// emitting anything, so the dispatcher can fall through to the next one.

use crate::config::{is_block_wrapper_tag, is_inline_formatting_tag, DiffConfig};
use crate::event::{
    collapse_ws, common_prefix_len, common_suffix_len, extract_text, raw_text,
    strip_edge_whitespace, Attrs, Event, Pos,
};

use super::atoms::{has_visual_attrs, structure_signature};
use super::inline_format;
use super::{ChangeKind, StreamDiffer};

impl StreamDiffer<'_> {
    /// Rewriters tried before the pairwise replace walk, in a pinned order —
    /// the predicates overlap, and earlier ones produce the more localized
    /// rendering.
    pub(crate) fn handle_replace_special_cases(
        &mut self,
        old_events: &[Event],
        new_events: &[Event],
    ) -> bool {
        // One inline wrapper flattened to plain text while prefix/suffix
        // survive ("Texto <u>X</u> tail" → "Texto Y tail").
        if self.try_inline_wrapper_to_plain(old_events, new_events) {
            return true;
        }

        // Styled wrapper toggled around identical text — render one copy.
        if self.try_visual_wrapper_toggle(old_events, new_events) {
            return true;
        }

        // The new side collapses to bare text while the old side carries
        // markup: a stable del→ins keeps the old formatting in the del.
        if new_events.len() == 1
            && new_events[0].is_text()
            && old_events.iter().any(|e| !e.is_text())
        {
            self.grouped_replace(old_events, new_events);
            return true;
        }

        // Inline wrapper added/removed with the same text (<b>X</b> ↔ X).
        if can_unwrap_wrapper(old_events, new_events) {
            self.grouped_replace(old_events, new_events);
            return true;
        }

        // Same container, same text, different inline wrappers inside.
        if inline_format::try_inline_formatting_diff(self, old_events, new_events) {
            return true;
        }

        // Visual-only change on a container (style/class/tag).
        if can_visual_container_replace(old_events, new_events, self.config) {
            if self.config.visual_replace_inline {
                self.with_group(None, |d| {
                    render_visual_replace_inline(d, old_events, new_events)
                });
            } else {
                self.grouped_replace(old_events, new_events);
            }
            return true;
        }

        false
    }

    // -- inline wrapper → plain text ------------------------------------------

    /// `<p>Texto <u>subrayado</u></p>` → `<p>Texto normal</p>` without
    /// marking the unchanged prefix. Requires the new side to be a single
    /// text event, the old side to hold exactly one inline wrapper subtree,
    /// and the common prefix/suffix to align with the old side's leading and
    /// trailing text.
    fn try_inline_wrapper_to_plain(&mut self, old_events: &[Event], new_events: &[Event]) -> bool {
        let [Event::Text { value: new_text, pos: new_pos }] = new_events else {
            return false;
        };
        if old_events.is_empty() {
            return false;
        }
        let Some((start_idx, end_idx)) = find_inline_wrapper_bounds(old_events) else {
            return false;
        };

        let prefix_events = &old_events[..start_idx];
        let wrapper_events = &old_events[start_idx..=end_idx];
        let suffix_events = &old_events[end_idx + 1..];

        let old_text = raw_text(old_events);
        let prefix_text = raw_text(prefix_events);
        let suffix_text = raw_text(suffix_events);

        let pre = common_prefix_len(&old_text, new_text);
        let suf = common_suffix_len(&old_text, new_text, pre);
        if pre != prefix_text.len() || suf != suffix_text.len() {
            return false;
        }

        let mid_new = new_text[pre..new_text.len() - suf].to_string();
        let new_pos = *new_pos;

        if !prefix_text.is_empty() {
            let pos = prefix_events.last().map(Event::pos).unwrap_or(new_pos);
            self.push_text(prefix_text, pos);
        }
        let wrapper_events = wrapper_events.to_vec();
        self.delete_events(&wrapper_events);
        if !mid_new.is_empty() {
            self.mark_text(new_pos, &mid_new, ChangeKind::Ins, None);
        }
        if !suffix_text.is_empty() {
            self.push_text(suffix_text, new_pos);
        }
        true
    }

    // -- visual wrapper toggle (no duplication) -------------------------------

    /// One side is plain text, the other wraps the *same* text in a single
    /// styled inline wrapper. Rendering del+ins would duplicate the value
    /// (ugly inside `<td>`); instead one copy is emitted with the wrapper
    /// marked `tagdiff_replaced`.
    ///
    /// An identical container around both sides (the cell itself) is peeled
    /// first, so `<td>X</td>` → `<td><strong style>X</strong></td>` matches.
    pub(crate) fn try_visual_wrapper_toggle(
        &mut self,
        old_events: &[Event],
        new_events: &[Event],
    ) -> bool {
        if let Some(plan) = toggle_plan(old_events, new_events, self.config) {
            self.emit_toggle(plan);
            return true;
        }

        // Peel one identical container level and retry.
        let (_, old_core, _) = strip_edge_whitespace(old_events);
        let (new_lws, new_core, new_tws) = strip_edge_whitespace(new_events);
        if old_core.len() < 2 || new_core.len() < 2 {
            return false;
        }
        let (Event::Start { tag: old_tag, attrs: old_attrs, .. }, Event::Start { tag, attrs, .. }) =
            (&old_core[0], &new_core[0])
        else {
            return false;
        };
        if old_tag != tag
            || old_attrs != attrs
            || old_core[old_core.len() - 1].end_tag() != Some(old_tag.as_str())
            || new_core[new_core.len() - 1].end_tag() != Some(tag.as_str())
        {
            return false;
        }
        let old_inner = &old_core[1..old_core.len() - 1];
        let new_inner = &new_core[1..new_core.len() - 1];
        let Some(plan) = toggle_plan(old_inner, new_inner, self.config) else {
            return false;
        };

        let new_lws = new_lws.to_vec();
        let container_start = new_core[0].clone();
        let container_end = new_core[new_core.len() - 1].clone();
        let new_tws = new_tws.to_vec();

        self.append_all(&new_lws);
        self.append(container_start);
        self.emit_toggle(plan);
        self.append(container_end);
        self.append_all(&new_tws);
        true
    }

    fn emit_toggle(&mut self, plan: TogglePlan) {
        match plan {
            TogglePlan::Added { lws, tag, attrs, inner, tws, pos } => {
                self.append_all(&lws);
                let mut marked = attrs;
                marked.append_class("tagdiff_replaced");
                marked.set("data-old-tag", "none");
                self.inject_diff_id(&mut marked, None);
                self.append(Event::start(&tag, marked, pos));
                self.append_all(&inner);
                self.append(Event::end(&tag, pos));
                self.append_all(&tws);
            }
            TogglePlan::Removed { lws, old_tag, old_attrs, text_event, tws } => {
                self.append_all(&lws);
                let mut attrs = Attrs::new();
                attrs.set("data-old-tag", old_tag);
                self.inject_refattr(&mut attrs, &old_attrs);
                attrs.append_class("tagdiff_replaced");
                self.inject_diff_id(&mut attrs, None);
                let pos = text_event.pos();
                self.append(Event::start("span", attrs, pos));
                self.append(text_event);
                self.append(Event::end("span", pos));
                self.append_all(&tws);
            }
        }
    }
}

enum TogglePlan {
    /// Plain → styled wrapper: emit the new wrapper once, marked replaced.
    Added {
        lws: Vec<Event>,
        tag: String,
        attrs: Attrs,
        inner: Vec<Event>,
        tws: Vec<Event>,
        pos: Pos,
    },
    /// Styled wrapper → plain: emit a marker span carrying the old wrapper's
    /// identity in `data-old-*`.
    Removed {
        lws: Vec<Event>,
        old_tag: String,
        old_attrs: Attrs,
        text_event: Event,
        tws: Vec<Event>,
    },
}

enum ToggleSide<'e> {
    Plain { text: &'e Event },
    Wrap { lws: &'e [Event], inner: &'e [Event], tws: &'e [Event], tag: &'e str, attrs: &'e Attrs },
}

fn toggle_parse(events: &[Event]) -> Option<ToggleSide<'_>> {
    let (lws, core, tws) = strip_edge_whitespace(events);
    if let [text_event] = core {
        if text_event.is_text() {
            return Some(ToggleSide::Plain { text: text_event });
        }
        return None;
    }
    if core.len() >= 3 {
        if let Event::Start { tag, attrs, .. } = &core[0] {
            if is_inline_formatting_tag(tag) && core[core.len() - 1].end_tag() == Some(tag.as_str())
            {
                let inner = &core[1..core.len() - 1];
                if !inner.is_empty() && inner.iter().all(Event::is_text) {
                    return Some(ToggleSide::Wrap { lws, inner, tws, tag, attrs });
                }
            }
        }
    }
    None
}

fn toggle_plan(old_events: &[Event], new_events: &[Event], config: &DiffConfig) -> Option<TogglePlan> {
    let old = toggle_parse(old_events)?;
    let new = toggle_parse(new_events)?;

    match (old, new) {
        (ToggleSide::Plain { text }, ToggleSide::Wrap { lws, inner, tws, tag, attrs }) => {
            if !has_visual_attrs(attrs, config) {
                return None;
            }
            let plain = collapse_ws(text.as_text().unwrap_or_default()).to_lowercase();
            if plain != extract_text(inner) {
                return None;
            }
            let pos = inner
                .first()
                .map(Event::pos)
                .or_else(|| new_events.first().map(Event::pos))
                .unwrap_or_else(Pos::synthetic);
            Some(TogglePlan::Added {
                lws: lws.to_vec(),
                tag: tag.to_string(),
                attrs: attrs.clone(),
                inner: inner.to_vec(),
                tws: tws.to_vec(),
                pos,
            })
        }
        (ToggleSide::Wrap { inner, tag, attrs, .. }, ToggleSide::Plain { text }) => {
            if !has_visual_attrs(attrs, config) {
                return None;
            }
            let plain = collapse_ws(text.as_text().unwrap_or_default()).to_lowercase();
            if extract_text(inner) != plain {
                return None;
            }
            let (new_lws, _, new_tws) = strip_edge_whitespace(new_events);
            Some(TogglePlan::Removed {
                lws: new_lws.to_vec(),
                old_tag: tag.to_string(),
                old_attrs: attrs.clone(),
                text_event: text.clone(),
                tws: new_tws.to_vec(),
            })
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// `<strong>TEXT</strong>` ↔ `TEXT` with identical text. Forces a grouped
/// delete→insert so the rendering order stays stable.
pub(crate) fn can_unwrap_wrapper(old_events: &[Event], new_events: &[Event]) -> bool {
    fn unwrap(events: &[Event]) -> Option<String> {
        if events.len() < 3 {
            return None;
        }
        let Event::Start { tag, .. } = &events[0] else {
            return None;
        };
        if !is_inline_formatting_tag(tag) || events[events.len() - 1].end_tag() != Some(tag.as_str())
        {
            return None;
        }
        let text = extract_text(&events[1..events.len() - 1]);
        (!text.is_empty()).then_some(text)
    }

    let old_wrapped = unwrap(old_events);
    let new_wrapped = unwrap(new_events);
    let old_plain = extract_text(old_events);
    let new_plain = extract_text(new_events);

    match (old_wrapped, new_wrapped) {
        (Some(old_text), None) => old_text == new_plain,
        (None, Some(new_text)) => new_text == old_plain,
        _ => false,
    }
}

/// Container/tag/attribute-only change that should still produce a visible
/// diff: same collapsed text, but the tag, a tracked attribute, the `id`, or
/// the inline formatting structure differs. Restricted to an allowlist of
/// tags so structural HTML (tables, lists) is never blown up.
pub(crate) fn can_visual_container_replace(
    old_events: &[Event],
    new_events: &[Event],
    config: &DiffConfig,
) -> bool {
    let (_, old_events, _) = strip_edge_whitespace(old_events);
    let (_, new_events, _) = strip_edge_whitespace(new_events);
    if old_events.len() < 2 || new_events.len() < 2 {
        return false;
    }
    let (Event::Start { tag: old_tag, attrs: old_attrs, .. }, Event::Start { tag: new_tag, attrs: new_attrs, .. }) =
        (&old_events[0], &new_events[0])
    else {
        return false;
    };
    if !old_events[old_events.len() - 1].is_end() || !new_events[new_events.len() - 1].is_end() {
        return false;
    }

    if !config.is_visual_container(old_tag) && !config.is_visual_container(new_tag) {
        return false;
    }

    let old_text = extract_text(old_events);
    let new_text = extract_text(new_events);
    if old_text.is_empty() || new_text.is_empty() || old_text != new_text {
        return false;
    }

    if structure_signature(old_events) != structure_signature(new_events) {
        return true;
    }
    if old_tag != new_tag {
        return true;
    }
    for attr in &config.track_attrs {
        if old_attrs.get(attr) != new_attrs.get(attr) {
            return true;
        }
    }
    old_attrs.get("id") != new_attrs.get("id")
}

// ---------------------------------------------------------------------------
// Visual replace rendering
// ---------------------------------------------------------------------------

/// Inline rendering of a visual-only container change.
///
/// Tag change: `<del><OLD>TEXT</OLD></del><ins><NEW>TEXT</NEW></ins>`.
/// Same tag, attrs-only change: the tag once with its new attributes and a
/// buffered `<del style=old>copy</del><ins>copy</ins>` inside. Cells keep
/// the structural tag outermost with span-wrapped copies inside.
pub(crate) fn render_visual_replace_inline(
    differ: &mut StreamDiffer<'_>,
    old_events: &[Event],
    new_events: &[Event],
) {
    let (_, old_core, _) = strip_edge_whitespace(old_events);
    let (new_lws, new_core, new_tws) = strip_edge_whitespace(new_events);
    let new_lws = new_lws.to_vec();
    let new_tws = new_tws.to_vec();

    differ.append_all(&new_lws);

    let shaped = containers_of(old_core).zip(containers_of(new_core));
    let Some(((old_tag, old_attrs), (new_tag, new_attrs))) = shaped else {
        // Not the Start..End shape the predicate promised; degrade to a
        // grouped replace.
        differ.grouped_replace(old_core, new_core);
        differ.append_all(&new_tws);
        return;
    };

    let pos = new_core
        .first()
        .or(old_core.first())
        .map(Event::pos)
        .unwrap_or_else(Pos::synthetic);
    let old_inner = old_core[1..old_core.len() - 1].to_vec();
    let new_inner = new_core[1..new_core.len() - 1].to_vec();

    let is_cell = matches!(old_tag.as_str(), "td" | "th") && matches!(new_tag.as_str(), "td" | "th");

    if is_cell {
        // The structural tag must stay outermost to keep the table valid.
        let start = new_core[0].clone();
        let end = new_core[new_core.len() - 1].clone();
        differ.append(start);
        wrap_inline_visual_replace(differ, ChangeKind::Del, "span", old_attrs, &old_inner, pos);
        wrap_inline_visual_replace(differ, ChangeKind::Ins, "span", new_attrs, &new_inner, pos);
        differ.append(end);
        differ.append_all(&new_tws);
        return;
    }

    if old_tag == new_tag && structure_signature(old_core) == structure_signature(new_core) {
        // Same tag, style-only: enter the tag once with the new attributes,
        // buffer the content, then flush del(old style) + ins copies.
        let mut attrs = new_attrs.clone();
        differ.inject_diff_id(&mut attrs, None);
        differ.append(Event::start(&new_tag, attrs, pos));
        let old_style = old_attrs.get("style").map(str::to_string);
        differ.begin_style_del(&new_tag, old_style);
        differ.append_all(&new_inner);
        differ.end_style_del(pos);
        differ.append(Event::end(&new_tag, pos));
        differ.append_all(&new_tws);
        return;
    }

    let old_wrap = preserve_wrapper_tag(&old_tag);
    let new_wrap = preserve_wrapper_tag(&new_tag);

    if is_block_wrapper_tag(&old_tag) {
        wrap_block_visual_replace(differ, ChangeKind::Del, old_wrap, old_attrs, &old_inner, pos);
    } else {
        wrap_inline_visual_replace(differ, ChangeKind::Del, old_wrap, old_attrs, &old_inner, pos);
    }
    if is_block_wrapper_tag(&new_tag) {
        wrap_block_visual_replace(differ, ChangeKind::Ins, new_wrap, new_attrs, &new_inner, pos);
    } else {
        wrap_inline_visual_replace(differ, ChangeKind::Ins, new_wrap, new_attrs, &new_inner, pos);
    }

    differ.append_all(&new_tws);
}

/// The first container's tag+attrs when the slice is `Start … End`.
fn containers_of(core: &[Event]) -> Option<(String, Attrs)> {
    if core.len() < 2 {
        return None;
    }
    let Event::Start { tag, attrs, .. } = &core[0] else {
        return None;
    };
    core[core.len() - 1].is_end().then(|| (tag.clone(), attrs.clone()))
}

/// Wrapper tags worth preserving in the del/ins copies; anything else
/// becomes a neutral span.
fn preserve_wrapper_tag(tag: &str) -> &str {
    if is_inline_formatting_tag(tag) || is_block_wrapper_tag(tag) || matches!(tag, "td" | "th") {
        tag
    } else {
        "span"
    }
}

/// `<del><WRAP attrs>inner</WRAP></del>` — inline shape.
fn wrap_inline_visual_replace(
    differ: &mut StreamDiffer<'_>,
    kind: ChangeKind,
    wrapper_tag: &str,
    attrs: Attrs,
    inner: &[Event],
    pos: Pos,
) {
    let change_attrs = differ.change_attrs(None);
    differ.append(Event::start(kind.tag(), change_attrs, pos));
    differ.append(Event::start(wrapper_tag, attrs, pos));
    differ.with_context(None, |d| d.block_process(inner));
    differ.append(Event::end(wrapper_tag, pos));
    differ.append(Event::end(kind.tag(), pos));
}

/// `<WRAP attrs><del>inner</del></WRAP>` — block wrappers stay outside the
/// change marker so the markup stays valid.
fn wrap_block_visual_replace(
    differ: &mut StreamDiffer<'_>,
    kind: ChangeKind,
    wrapper_tag: &str,
    attrs: Attrs,
    inner: &[Event],
    pos: Pos,
) {
    differ.append(Event::start(wrapper_tag, attrs, pos));
    let change_attrs = differ.change_attrs(None);
    differ.append(Event::start(kind.tag(), change_attrs, pos));
    differ.replay_with_br_markers(inner);
    differ.append(Event::end(kind.tag(), pos));
    differ.append(Event::end(wrapper_tag, pos));
}

/// Bounds of the single inline wrapper subtree in `events`, if there is
/// exactly one.
fn find_inline_wrapper_bounds(events: &[Event]) -> Option<(usize, usize)> {
    let start_idx = events.iter().position(|e| {
        e.start_tag().is_some_and(is_inline_formatting_tag)
    })?;
    let Event::Start { tag: wrapper, .. } = &events[start_idx] else {
        return None;
    };

    let mut depth = 0usize;
    let mut end_idx = None;
    for (j, event) in events.iter().enumerate().skip(start_idx) {
        if event.start_tag() == Some(wrapper.as_str()) {
            depth += 1;
        } else if event.end_tag() == Some(wrapper.as_str()) {
            depth -= 1;
            if depth == 0 {
                end_idx = Some(j);
                break;
            }
        }
    }
    let end_idx = end_idx?;

    // No other inline wrapper may exist outside this subtree.
    for (i, event) in events.iter().enumerate() {
        if (i < start_idx || i > end_idx)
            && event.start_tag().is_some_and(is_inline_formatting_tag)
        {
            return None;
        }
    }
    Some((start_idx, end_idx))
}
