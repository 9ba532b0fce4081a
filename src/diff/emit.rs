// Emitter — context-aware output with HTML-validity rules.
//
// The core rule: `<ins>`/`<del>` never wrap a structural container. When a
// structural tag opens inside a change context it gets a class marker
// (`tagdiff_added` / `tagdiff_deleted`) instead, and its children keep the
// context so their text is still marked. Block wrappers (`p`, `h1..h6`)
// invert the nesting — `<del><p>…</p></del>` — so accepting removes the
// whole paragraph rather than leaving an empty shell behind.

use crate::config::{is_block_wrapper_tag, is_structural_tag};
use crate::event::{Attrs, Event, Pos};

use super::text::{cut_leading_space, make_whitespace_visible};
use super::ChangeKind;
use super::StreamDiffer;

/// A tag whose `End` must close extra wrapper tags: the synthetic `<li>`,
/// or the `<ins>`/`<del>` opened around a block wrapper or void element.
#[derive(Debug)]
pub(crate) struct PendingClose {
    /// Localname whose `End` event triggers this entry.
    pub trigger: String,
    /// Tag to close right after the trigger closes (`ins`, `del`, `li`).
    pub close: Option<String>,
    /// Context to restore (block wrappers clear it so nested text isn't
    /// double-wrapped).
    pub restore: Option<ChangeKind>,
}

/// Pending "emit a `<del>` copy, then an `<ins>` copy" buffer for same-tag
/// style-only changes: the container is emitted once with its new
/// attributes, the content is captured, and on the container's `End` the
/// capture replays inside `<del style=old>` and `<ins>`.
#[derive(Debug)]
pub(crate) struct StyleDelFrame {
    pub trigger: String,
    pub old_style: Option<String>,
    pub buf: Vec<Event>,
}

impl StreamDiffer<'_> {
    /// The single output sink. While a style-del frame is active, events are
    /// captured into it instead.
    pub(crate) fn append(&mut self, event: Event) {
        if let Some(frame) = self.style_del_buffer.last_mut() {
            frame.buf.push(event);
            return;
        }
        self.out.push(event);
    }

    pub(crate) fn push_text(&mut self, value: String, pos: Pos) {
        self.append(Event::text(value, pos));
    }

    pub(crate) fn append_all(&mut self, events: &[Event]) {
        for event in events {
            self.append(event.clone());
        }
    }

    // -- change-marker attributes --------------------------------------------

    /// Attributes for an `<ins>`/`<del>` wrapper: the group id when ids are
    /// enabled (explicit id > active group > fresh).
    pub(crate) fn change_attrs(&mut self, diff_id: Option<String>) -> Attrs {
        let mut attrs = Attrs::new();
        if self.config.add_diff_ids {
            let id = diff_id
                .or_else(|| self.active_diff_id())
                .unwrap_or_else(|| self.next_diff_id());
            attrs.set(&self.config.diff_id_attr.clone(), id);
        }
        attrs
    }

    pub(crate) fn inject_diff_id(&mut self, attrs: &mut Attrs, diff_id: Option<String>) {
        if self.config.add_diff_ids {
            let id = diff_id
                .or_else(|| self.active_diff_id())
                .unwrap_or_else(|| self.next_diff_id());
            attrs.set(&self.config.diff_id_attr.clone(), id);
        }
    }

    /// Record changed tracked attributes as `data-old-<attr>` alongside the
    /// new values.
    pub(crate) fn inject_refattr(&self, attrs: &mut Attrs, old_attrs: &Attrs) {
        for name in &self.config.track_attrs {
            let old_value = old_attrs.get(name);
            let new_value = attrs.get(name).map(str::to_string);
            if old_value != new_value.as_deref() {
                if let Some(old_value) = old_value {
                    attrs.set(&format!("data-old-{name}"), old_value);
                }
            }
        }
    }

    // -- stack discipline ----------------------------------------------------

    pub(crate) fn enter(&mut self, pos: Pos, tag: &str, attrs: Attrs) {
        self.stack.push(tag.to_string());
        self.append(Event::start(tag, attrs, pos));
    }

    /// Enter a tag marked as replaced-in-place: `tagdiff_replaced` class,
    /// `data-old-*` for changed tracked attributes, group id.
    pub(crate) fn enter_mark_replaced(&mut self, pos: Pos, tag: &str, mut attrs: Attrs, old_attrs: &Attrs) {
        attrs.append_class("tagdiff_replaced");
        self.inject_refattr(&mut attrs, old_attrs);
        self.inject_diff_id(&mut attrs, None);
        self.enter(pos, tag, attrs);
    }

    /// Close `tag` if it is the innermost open tag. Closing an unmatched tag
    /// is a no-op — never an error.
    pub(crate) fn leave(&mut self, pos: Pos, tag: &str) -> bool {
        match self.stack.last() {
            Some(top) if top == tag => {
                self.append(Event::end(tag, pos));
                self.stack.pop();
                true
            }
            _ => false,
        }
    }

    /// Close anything still open at the end of processing, including change
    /// wrappers whose trigger tag never saw its `End`.
    pub(crate) fn leave_all(&mut self) {
        let pos = self
            .new_events
            .last()
            .or(self.old_events.last())
            .map(Event::pos)
            .unwrap_or_else(Pos::synthetic);
        while let Some(tag) = self.stack.pop() {
            self.append(Event::end(&tag, pos));
            while self
                .wrap_change_end_for
                .last()
                .is_some_and(|p| p.trigger == tag)
            {
                let pending = self.wrap_change_end_for.pop().unwrap();
                if let Some(close) = pending.close {
                    self.append(Event::end(close, pos));
                }
            }
        }
        while let Some(pending) = self.wrap_change_end_for.pop() {
            if let Some(close) = pending.close {
                self.append(Event::end(close, pos));
            }
        }
        self.skip_end_for.clear();
        debug_assert!(self.style_del_buffer.is_empty(), "unfinished style-del capture");
    }

    // -- block processing ----------------------------------------------------

    /// Emit a slice of events under the current context, applying the
    /// validity rules above.
    pub(crate) fn block_process(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::Start { tag, attrs, pos } => {
                    let (tag, attrs, pos) = (tag.clone(), attrs.clone(), *pos);
                    self.start_in_block(pos, &tag, attrs);
                }
                Event::End { tag, pos } => {
                    let (tag, pos) = (tag.clone(), *pos);
                    self.end_in_block(pos, &tag);
                }
                Event::Text { value, pos } => {
                    let (value, pos) = (value.clone(), *pos);
                    self.text_in_block(pos, &value);
                }
            }
        }
    }

    fn start_in_block(&mut self, pos: Pos, tag: &str, mut attrs: Attrs) {
        let context = self.context;

        // <br> changes render a visible pilcrow.
        if tag == "br" {
            if let Some(kind) = context {
                let marker = self.config.linebreak_marker.clone();
                match kind {
                    ChangeKind::Ins => {
                        // <ins>¶</ins><br>
                        if !marker.is_empty() {
                            self.mark_text(pos, &marker, ChangeKind::Ins, None);
                        }
                        self.enter(pos, tag, attrs);
                    }
                    ChangeKind::Del => {
                        // <del>¶<br></del> — the break goes inside the
                        // marker so it is removed on accept; its stream End
                        // is then skipped.
                        let change_attrs = self.change_attrs(None);
                        self.append(Event::start("del", change_attrs, pos));
                        if !marker.is_empty() {
                            self.push_text(marker, pos);
                        }
                        self.append(Event::start(tag, attrs, pos));
                        self.append(Event::end(tag, pos));
                        self.append(Event::end("del", pos));
                        self.skip_end_for.push(tag.to_string());
                    }
                }
                return;
            }
        }

        // Structural tags take a class marker instead of an ins/del wrapper;
        // children keep the context so their text is still marked.
        if is_structural_tag(tag) {
            if let Some(kind) = context {
                attrs.append_class(&format!("tagdiff_{}", kind.class_suffix()));
                self.inject_diff_id(&mut attrs, None);
                self.enter(pos, tag, attrs);
                return;
            }
        }

        // Block wrappers are wrapped whole: <del><p>…</p></del>. Inside a
        // list, a synthetic <li> keeps the markup valid.
        if is_block_wrapper_tag(tag) {
            if let Some(kind) = context {
                if self
                    .stack
                    .last()
                    .is_some_and(|top| top == "ul" || top == "ol")
                    && tag != "li"
                {
                    let mut li_attrs = Attrs::new();
                    li_attrs.append_class(&format!("tagdiff_{}", kind.class_suffix()));
                    self.inject_diff_id(&mut li_attrs, None);
                    self.append(Event::start("li", li_attrs, pos));
                    self.wrap_change_end_for.push(PendingClose {
                        trigger: tag.to_string(),
                        close: Some("li".to_string()),
                        restore: None,
                    });
                }

                let change_attrs = self.change_attrs(None);
                self.append(Event::start(kind.tag(), change_attrs, pos));
                self.enter(pos, tag, attrs);
                self.wrap_change_end_for.push(PendingClose {
                    trigger: tag.to_string(),
                    close: Some(kind.tag().to_string()),
                    restore: Some(kind),
                });
                // Clear the context so nested text isn't double-wrapped.
                self.context = None;
                return;
            }
        }

        // Void elements with no text (e.g. <img>) still show their change.
        if self.config.wraps_void_tag(tag) {
            if let Some(kind) = context {
                let change_attrs = self.change_attrs(None);
                self.append(Event::start(kind.tag(), change_attrs, pos));
                self.enter(pos, tag, attrs);
                self.wrap_change_end_for.push(PendingClose {
                    trigger: tag.to_string(),
                    close: Some(kind.tag().to_string()),
                    restore: None,
                });
                return;
            }
        }

        self.enter(pos, tag, attrs);
    }

    fn end_in_block(&mut self, pos: Pos, tag: &str) {
        if self.skip_end_for.last().is_some_and(|t| t == tag) {
            self.skip_end_for.pop();
            return;
        }

        // Close wrapper ins/del (and a synthetic <li> if present) after the
        // element they wrap.
        let mut left = false;
        while self
            .wrap_change_end_for
            .last()
            .is_some_and(|p| p.trigger == tag)
        {
            let pending = self.wrap_change_end_for.pop().unwrap();
            if !left {
                self.leave(pos, tag);
                left = true;
            }
            if let Some(close) = pending.close {
                self.append(Event::end(close, pos));
            }
            if let Some(kind) = pending.restore {
                self.context = Some(kind);
            }
        }
        if left {
            return;
        }

        self.leave(pos, tag);
    }

    fn text_in_block(&mut self, pos: Pos, value: &str) {
        if let Some(kind) = self.context {
            // Wrap visible text and inline whitespace, but not newline
            // indentation — that would only add noise.
            if !value.trim().is_empty() || !value.contains(['\n', '\r']) {
                self.mark_text(pos, value, kind, None);
                return;
            }
        }
        self.push_text(value.to_string(), pos);
    }

    /// Wrap a text run in an `<ins>`/`<del>` marker, keeping whitespace
    /// visible with NBSPs when configured.
    pub(crate) fn mark_text(&mut self, pos: Pos, text: &str, kind: ChangeKind, diff_id: Option<String>) {
        if self.config.preserve_whitespace_in_diff {
            let visible = make_whitespace_visible(text);
            let attrs = self.change_attrs(diff_id);
            self.append(Event::start(kind.tag(), attrs, pos));
            self.push_text(visible, pos);
            self.append(Event::end(kind.tag(), pos));
            return;
        }

        let (ws, rest) = cut_leading_space(text);
        if !ws.is_empty() {
            self.push_text(ws.to_string(), pos);
        }
        let attrs = self.change_attrs(diff_id);
        self.append(Event::start(kind.tag(), attrs, pos));
        self.push_text(rest.to_string(), pos);
        self.append(Event::end(kind.tag(), pos));
    }

    // -- style-del buffering -------------------------------------------------

    /// Begin capturing content for a same-tag style-only change. The caller
    /// has already emitted the container start with its new attributes.
    pub(crate) fn begin_style_del(&mut self, trigger: &str, old_style: Option<String>) {
        self.style_del_buffer.push(StyleDelFrame {
            trigger: trigger.to_string(),
            old_style,
            buf: Vec::new(),
        });
    }

    /// Flush the innermost capture: the buffered copy once inside
    /// `<del style=old>` and once inside `<ins>`, sharing one id.
    pub(crate) fn end_style_del(&mut self, pos: Pos) {
        let Some(frame) = self.style_del_buffer.pop() else {
            return;
        };
        let id = self
            .active_diff_id()
            .or_else(|| self.maybe_new_diff_id());

        let mut del_attrs = Attrs::new();
        if let Some(style) = &frame.old_style {
            del_attrs.set("style", style.clone());
        }
        if let Some(id) = &id {
            del_attrs.set(&self.config.diff_id_attr.clone(), id.clone());
        }
        self.append(Event::start("del", del_attrs, pos));
        self.replay_with_br_markers(&frame.buf);
        self.append(Event::end("del", pos));

        let mut ins_attrs = Attrs::new();
        if let Some(id) = &id {
            ins_attrs.set(&self.config.diff_id_attr.clone(), id.clone());
        }
        self.append(Event::start("ins", ins_attrs, pos));
        self.replay_with_br_markers(&frame.buf);
        self.append(Event::end("ins", pos));
    }

    /// Replay captured events inside a change marker, turning each `<br>`
    /// into a visible pilcrow followed by the break itself.
    pub(crate) fn replay_with_br_markers(&mut self, events: &[Event]) {
        let marker = self.config.linebreak_marker.clone();
        for event in events {
            if let Event::Start { tag, .. } = event {
                if tag == "br" && !marker.is_empty() {
                    self.push_text(marker.clone(), event.pos());
                }
            }
            self.append(event.clone());
        }
    }

    // -- structural revert payloads ------------------------------------------

    /// Hidden carrier of the pre-change markup for structural conversions:
    /// `<del class="structural-revert-data" style="display:none">…</del>`.
    /// The UI swaps it back in when the change is rejected.
    pub(crate) fn emit_structural_revert(&mut self, payload: &[Event], diff_id: Option<String>) {
        let mut attrs = Attrs::from_pairs([
            ("class", "structural-revert-data"),
            ("style", "display:none"),
        ]);
        self.inject_diff_id(&mut attrs, diff_id);
        let pos = payload.first().map(Event::pos).unwrap_or_else(Pos::synthetic);
        self.append(Event::start("del", attrs, pos));
        self.append_all(payload);
        self.append(Event::end("del", pos));
    }
}
