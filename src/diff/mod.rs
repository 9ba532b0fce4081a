// The diff pipeline.
//
// Architecture:
//   events(OLD)+events(NEW) → atomize → LCS on atom keys → opcode normalize
//   → dispatch (tables / lists / visual rewriters / inner event differ)
//   → emitter (context-aware, structural-tag aware) → merge pass
//
// `StreamDiffer` is both the outer differ (atom-level, entered through
// [`StreamDiffer::process`]) and the recursive inner differ (raw-event-level,
// entered through [`diff_event_slices`]). One concrete type with a shared
// diff-id allocator handle replaces the original's factory indirection.

pub(crate) mod atoms;
pub(crate) mod emit;
pub(crate) mod events;
pub(crate) mod inline_format;
pub(crate) mod lcs;
pub(crate) mod lists;
pub(crate) mod merge;
pub(crate) mod normalize;
pub(crate) mod tables;
pub(crate) mod text;
pub(crate) mod visual;

use std::cell::Cell;
use std::rc::Rc;

use crate::config::{is_structural_tag, DiffConfig};
use crate::event::{collapse_ws, extract_text, Event};

use atoms::{Atom, AtomKind};
use emit::{PendingClose, StyleDelFrame};
use lcs::OpTag;

/// Which change marker the emitter is currently inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChangeKind {
    Ins,
    Del,
}

impl ChangeKind {
    pub(crate) fn tag(self) -> &'static str {
        match self {
            ChangeKind::Ins => "ins",
            ChangeKind::Del => "del",
        }
    }

    /// Suffix for the structural class marker (`tagdiff_added` / `tagdiff_deleted`).
    pub(crate) fn class_suffix(self) -> &'static str {
        match self {
            ChangeKind::Ins => "added",
            ChangeKind::Del => "deleted",
        }
    }
}

pub(crate) struct StreamDiffer<'a> {
    pub(crate) config: &'a DiffConfig,
    pub(crate) old_events: Vec<Event>,
    pub(crate) new_events: Vec<Event>,

    out: Vec<Event>,
    pub(crate) stack: Vec<String>,
    pub(crate) context: Option<ChangeKind>,
    pub(crate) skip_end_for: Vec<String>,
    pub(crate) wrap_change_end_for: Vec<PendingClose>,
    pub(crate) style_del_buffer: Vec<StyleDelFrame>,

    ids: Rc<Cell<u64>>,
    id_stack: Vec<String>,
}

/// Diff two raw event streams and return the combined output stream,
/// including the final merge pass. This is the engine without the
/// parser/serializer wiring.
pub fn diff_streams(old_events: Vec<Event>, new_events: Vec<Event>, config: &DiffConfig) -> Vec<Event> {
    let mut differ = StreamDiffer::new(old_events, new_events, config);
    differ.process();
    let mut out = differ.take_output();
    if config.merge_adjacent_change_tags {
        out = merge::merge_adjacent_change_tags(&out, config);
    }
    out
}

/// Run the inner (atom-free) event differ over two slices and return its
/// output. Threads the caller's diff-id allocator so group ids stay monotone
/// across recursion.
pub(crate) fn diff_event_slices(
    old: &[Event],
    new: &[Event],
    config: &DiffConfig,
    ids: Rc<Cell<u64>>,
) -> Vec<Event> {
    let mut differ = StreamDiffer::with_allocator(old.to_vec(), new.to_vec(), config, ids);
    differ.process_events();
    differ.take_output()
}

impl<'a> StreamDiffer<'a> {
    pub(crate) fn new(old_events: Vec<Event>, new_events: Vec<Event>, config: &'a DiffConfig) -> Self {
        Self::with_allocator(old_events, new_events, config, Rc::new(Cell::new(0)))
    }

    pub(crate) fn with_allocator(
        old_events: Vec<Event>,
        new_events: Vec<Event>,
        config: &'a DiffConfig,
        ids: Rc<Cell<u64>>,
    ) -> Self {
        StreamDiffer {
            config,
            old_events,
            new_events,
            out: Vec::new(),
            stack: Vec::new(),
            context: None,
            skip_end_for: Vec::new(),
            wrap_change_end_for: Vec::new(),
            style_del_buffer: Vec::new(),
            ids,
            id_stack: Vec::new(),
        }
    }

    pub(crate) fn take_output(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.out)
    }

    /// Splice a recursive inner differ's finished output into ours.
    pub(crate) fn extend_output(&mut self, events: Vec<Event>) {
        self.out.extend(events);
    }

    pub(crate) fn ids_handle(&self) -> Rc<Cell<u64>> {
        Rc::clone(&self.ids)
    }

    // -- diff-id allocation --------------------------------------------------

    pub(crate) fn next_diff_id(&self) -> String {
        let n = self.ids.get() + 1;
        self.ids.set(n);
        n.to_string()
    }

    /// Fresh id when ids are enabled, `None` otherwise.
    pub(crate) fn maybe_new_diff_id(&self) -> Option<String> {
        self.config.add_diff_ids.then(|| self.next_diff_id())
    }

    pub(crate) fn active_diff_id(&self) -> Option<String> {
        self.id_stack.last().cloned()
    }

    /// Group several emitted markers under one id; nested groups reuse the
    /// innermost id. A no-op when ids are disabled.
    pub(crate) fn with_group<R>(&mut self, id: Option<String>, f: impl FnOnce(&mut Self) -> R) -> R {
        if !self.config.add_diff_ids {
            return f(self);
        }
        let id = id.unwrap_or_else(|| self.next_diff_id());
        self.id_stack.push(id);
        let result = f(self);
        self.id_stack.pop();
        result
    }

    pub(crate) fn with_context<R>(
        &mut self,
        context: Option<ChangeKind>,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let prev = self.context;
        self.context = context;
        let result = f(self);
        self.context = prev;
        result
    }

    // -- context-wrapped slice processing ------------------------------------

    pub(crate) fn delete_events(&mut self, events: &[Event]) {
        self.with_context(Some(ChangeKind::Del), |d| d.block_process(events));
    }

    pub(crate) fn insert_events(&mut self, events: &[Event]) {
        self.with_context(Some(ChangeKind::Ins), |d| d.block_process(events));
    }

    pub(crate) fn unchanged_events(&mut self, events: &[Event]) {
        self.with_context(None, |d| d.block_process(events));
    }

    /// Grouped bulk replacement: the whole old side as one `del`, the whole
    /// new side as one `ins`, sharing a single id.
    pub(crate) fn grouped_replace(&mut self, old_events: &[Event], new_events: &[Event]) {
        self.with_group(None, |d| {
            d.delete_events(old_events);
            d.insert_events(new_events);
        });
    }

    // -- outer pipeline ------------------------------------------------------

    /// Atom-level diff of the two full streams.
    pub(crate) fn process(&mut self) {
        if self.bulk_replace_if_unrelated() {
            return;
        }

        let old_atoms = atoms::atomize(&self.old_events, self.config);
        let new_atoms = atoms::atomize(&self.new_events, self.config);
        let old_keys: Vec<&atoms::AtomKey> = old_atoms.iter().map(|a| &a.key).collect();
        let new_keys: Vec<&atoms::AtomKey> = new_atoms.iter().map(|a| &a.key).collect();

        let mut opcodes = lcs::opcodes(&old_keys, &new_keys);
        if self.config.delete_first {
            opcodes = normalize::delete_first(opcodes);
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(
            old_atoms = old_atoms.len(),
            new_atoms = new_atoms.len(),
            opcodes = opcodes.len(),
            "outer alignment"
        );

        let mut k = 0;
        while k < opcodes.len() {
            let op = opcodes[k];

            // A structural list conversion can surface as a delete/insert
            // pair instead of one replace when an anchor sits between them —
            // possibly with a whitespace-only equal run in the middle.
            if matches!(op.tag, OpTag::Delete | OpTag::Insert) && k + 1 < opcodes.len() {
                let mut partner_at = k + 1;
                let mut ws_between: Option<lcs::Opcode> = None;
                if opcodes[partner_at].tag == OpTag::Equal
                    && partner_at + 1 < opcodes.len()
                    && whitespace_only_atoms(&old_atoms[opcodes[partner_at].old_lo..opcodes[partner_at].old_hi])
                {
                    ws_between = Some(opcodes[partner_at]);
                    partner_at += 1;
                }
                let next = opcodes[partner_at];
                let pair = match (op.tag, next.tag) {
                    (OpTag::Delete, OpTag::Insert) => Some((op, next)),
                    (OpTag::Insert, OpTag::Delete) => Some((next, op)),
                    _ => None,
                };
                if let Some((del_op, ins_op)) = pair {
                    let old_events =
                        atoms::concat_atom_events(&old_atoms[del_op.old_lo..del_op.old_hi]);
                    let new_events =
                        atoms::concat_atom_events(&new_atoms[ins_op.new_lo..ins_op.new_hi]);
                    if lists::has_list_tags(&old_events) != lists::has_list_tags(&new_events) {
                        let handled = if lists::try_list_conversion(self, &old_events, &new_events)
                        {
                            true
                        } else if lists::count_block_wrappers(&old_events) <= 1
                            && lists::count_block_wrappers(&new_events) <= 2
                        {
                            self.grouped_replace(&old_events, &new_events);
                            true
                        } else {
                            false
                        };
                        if handled {
                            if let Some(ws) = ws_between {
                                let events =
                                    atoms::concat_atom_events(&new_atoms[ws.new_lo..ws.new_hi]);
                                self.unchanged_events(&events);
                            }
                            k = partner_at + 1;
                            continue;
                        }
                    }
                }
            }

            match op.tag {
                OpTag::Replace => {
                    if self.try_structural_start_replace(&old_atoms, &new_atoms, op) {
                        k += 1;
                        continue;
                    }
                    self.process_replace_atoms(
                        &old_atoms[op.old_lo..op.old_hi],
                        &new_atoms[op.new_lo..op.new_hi],
                    );
                }
                OpTag::Delete => {
                    let events = atoms::concat_atom_events(&old_atoms[op.old_lo..op.old_hi]);
                    self.with_group(None, |d| d.delete_events(&events));
                }
                OpTag::Insert => {
                    let events = atoms::concat_atom_events(&new_atoms[op.new_lo..op.new_hi]);
                    self.with_group(None, |d| d.insert_events(&events));
                }
                OpTag::Equal => {
                    self.process_equal_atoms(
                        &old_atoms[op.old_lo..op.old_hi],
                        &new_atoms[op.new_lo..op.new_hi],
                    );
                }
            }
            k += 1;
        }

        self.leave_all();
    }

    /// If the two sides share too little text, emit one grouped bulk
    /// del+ins instead of structural matching — unrelated documents would
    /// otherwise shred into interleaved word salad.
    fn bulk_replace_if_unrelated(&mut self) -> bool {
        let threshold = self.config.bulk_replace_similarity_threshold;
        if threshold <= 0.0 {
            return false;
        }
        let old_text = extract_text(&self.old_events);
        let new_text = extract_text(&self.new_events);
        if old_text.trim().is_empty() || new_text.trim().is_empty() {
            return false;
        }
        let ratio = lcs::text_similarity_ratio(&old_text, &new_text);
        if ratio >= threshold {
            return false;
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(ratio, threshold, "bulk replace: inputs too dissimilar");

        let old = self.old_events.clone();
        let new = self.new_events.clone();

        // Both streams share the artificial wrapper; emit it once and bulk
        // only the content.
        let shared_wrapper = old.len() >= 2
            && new.len() >= 2
            && old.first() == new.first()
            && old.first().is_some_and(Event::is_start)
            && old.last() == new.last()
            && old.last().is_some_and(Event::is_end);
        if shared_wrapper {
            self.append(old[0].clone());
            self.grouped_replace(&old[1..old.len() - 1], &new[1..new.len() - 1]);
            self.append(old[old.len() - 1].clone());
        } else {
            self.grouped_replace(&old, &new);
        }
        true
    }

    /// Attribute-only change on a single structural start tag: mark the tag
    /// replaced in place instead of nesting a deleted copy inside an added
    /// one.
    fn try_structural_start_replace(
        &mut self,
        old_atoms: &[Atom],
        new_atoms: &[Atom],
        op: lcs::Opcode,
    ) -> bool {
        if op.old_len() != 1 || op.new_len() != 1 {
            return false;
        }
        let old_atom = &old_atoms[op.old_lo];
        let new_atom = &new_atoms[op.new_lo];
        if old_atom.events.len() != 1 || new_atom.events.len() != 1 {
            return false;
        }
        let (Event::Start { tag: old_tag, attrs: old_attrs, .. }, Event::Start { tag, attrs, pos }) =
            (&old_atom.events[0], &new_atom.events[0])
        else {
            return false;
        };
        if old_tag != tag || !is_structural_tag(tag) {
            return false;
        }
        let (tag, attrs, old_attrs, pos) = (tag.clone(), attrs.clone(), old_attrs.clone(), *pos);
        self.enter_mark_replaced(pos, &tag, attrs, &old_attrs);
        true
    }

    // -- replace opcode ------------------------------------------------------

    fn process_replace_atoms(&mut self, old_slice: &[Atom], new_slice: &[Atom]) {
        let old_events = atoms::concat_atom_events(old_slice);
        let new_events = atoms::concat_atom_events(new_slice);

        // Structural list conversion and list restyling take priority over
        // the generic structural fallback.
        if lists::has_list_tags(&old_events) != lists::has_list_tags(&new_events)
            && lists::try_list_conversion(self, &old_events, &new_events)
        {
            return;
        }

        let single_blocks = |tag: &str| {
            old_slice.len() == 1
                && new_slice.len() == 1
                && old_slice[0].kind == AtomKind::Block
                && new_slice[0].kind == AtomKind::Block
                && old_slice[0].tag.as_deref() == Some(tag)
                && new_slice[0].tag.as_deref() == Some(tag)
        };

        // Same number of blocks with pairwise-identical tags means a pure
        // style change; let inner differs mark attributes instead of
        // forcing a bulk block.
        let pure_style_structural = old_slice.len() == new_slice.len()
            && old_slice.iter().zip(new_slice.iter()).all(|(a, b)| {
                a.kind == AtomKind::Block && b.kind == AtomKind::Block && a.tag == b.tag
            });

        if pure_style_structural && single_blocks("tr") {
            tables::diff_tr_by_cells(self, &old_events, &new_events, None);
            return;
        }
        if single_blocks("table") {
            tables::diff_table_by_rows(self, &old_events, &new_events);
            return;
        }

        let both_lists = old_slice.len() == 1
            && new_slice.len() == 1
            && matches!(old_slice[0].tag.as_deref(), Some("ul") | Some("ol"))
            && matches!(new_slice[0].tag.as_deref(), Some("ul") | Some("ol"));
        if both_lists && lists::try_list_restyle(self, &old_events, &new_events) {
            return;
        }

        if (has_structural_tags(&old_events) || has_structural_tags(&new_events))
            && !pure_style_structural
        {
            self.grouped_replace(&old_events, &new_events);
            return;
        }

        let out = diff_event_slices(&old_events, &new_events, self.config, self.ids_handle());
        self.extend_output(out);
    }

    // -- equal opcode --------------------------------------------------------

    /// Atoms compared equal by key, but their event streams may still differ
    /// (keys deliberately collapse whitespace and ignore some attributes).
    fn process_equal_atoms(&mut self, old_slice: &[Atom], new_slice: &[Atom]) {
        let len = old_slice.len().max(new_slice.len());
        for idx in 0..len {
            match (old_slice.get(idx), new_slice.get(idx)) {
                (None, Some(a_new)) => {
                    let events = a_new.events.clone();
                    self.unchanged_events(&events);
                }
                (Some(a_old), None) => {
                    let events = a_old.events.clone();
                    self.unchanged_events(&events);
                }
                (Some(a_old), Some(a_new)) => self.process_equal_pair(a_old, a_new),
                (None, None) => unreachable!(),
            }
        }
    }

    fn process_equal_pair(&mut self, a_old: &Atom, a_new: &Atom) {
        // Same text but a different block tag (p → li, p → h2): force one
        // grouped replace so accept/reject moves the whole block.
        if a_old.kind == AtomKind::Block && a_new.kind == AtomKind::Block && a_old.tag != a_new.tag
        {
            let old_events = a_old.events.clone();
            let new_events = a_new.events.clone();
            self.grouped_replace(&old_events, &new_events);
            return;
        }

        let is_structural_block = a_new.kind == AtomKind::Block
            && a_new.tag.as_deref().is_some_and(is_structural_tag);

        if is_structural_block {
            if a_old.events == a_new.events {
                let events = a_new.events.clone();
                self.unchanged_events(&events);
                return;
            }
            let old_events = a_old.events.clone();
            let new_events = a_new.events.clone();
            match a_new.tag.as_deref() {
                Some("tr") => tables::diff_tr_by_cells(self, &old_events, &new_events, None),
                Some("table") => tables::diff_table_by_rows(self, &old_events, &new_events),
                Some("ul") | Some("ol") => {
                    if !lists::try_list_restyle(self, &old_events, &new_events) {
                        let out = diff_event_slices(
                            &old_events,
                            &new_events,
                            self.config,
                            self.ids_handle(),
                        );
                        self.extend_output(out);
                    }
                }
                _ => {
                    let out =
                        diff_event_slices(&old_events, &new_events, self.config, self.ids_handle());
                    self.extend_output(out);
                }
            }
            return;
        }

        let old_events = a_old.events.clone();
        let new_events = a_new.events.clone();

        if old_events != new_events {
            // Same text, different inline wrappers inside an unchanged
            // container: per-span marking keeps the unchanged tail out of
            // the diff.
            if inline_format::try_inline_formatting_diff(self, &old_events, &new_events) {
                return;
            }

            if visual::can_visual_container_replace(&old_events, &new_events, self.config) {
                self.with_group(None, |d| {
                    visual::render_visual_replace_inline(d, &old_events, &new_events)
                });
                return;
            }

            // Whitespace multiplicity hidden by the collapsed key: a simple
            // container with one text child where only spacing changed.
            if whitespace_only_text_change(&old_events, &new_events) {
                let out =
                    diff_event_slices(&old_events, &new_events, self.config, self.ids_handle());
                self.extend_output(out);
                return;
            }

            if self.force_event_diff_for_void_tags(&old_events, &new_events) {
                return;
            }
        }

        self.unchanged_events(&new_events);
    }
}

fn whitespace_only_atoms(atoms: &[Atom]) -> bool {
    atoms
        .iter()
        .all(|atom| atom.events.iter().all(Event::is_blank_text))
}

/// Any structural container start inside the slice.
pub(crate) fn has_structural_tags(events: &[Event]) -> bool {
    events
        .iter()
        .filter_map(Event::start_tag)
        .any(|tag| matches!(tag, "ul" | "ol" | "li" | "table" | "tr" | "td" | "th"))
}

fn whitespace_only_text_change(old_events: &[Event], new_events: &[Event]) -> bool {
    let [Event::Start { tag: ot, .. }, Event::Text { value: ov, .. }, Event::End { tag: oe, .. }] =
        old_events
    else {
        return false;
    };
    let [Event::Start { tag: nt, .. }, Event::Text { value: nv, .. }, Event::End { tag: ne, .. }] =
        new_events
    else {
        return false;
    };
    ot == nt && oe == ne && ov != nv && collapse_ws(ov) == collapse_ws(nv)
}
