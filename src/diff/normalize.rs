// Opcode normalizations applied between alignment and dispatch.

use crate::config::{is_inline_formatting_tag, DiffConfig};
use crate::event::Event;

use super::lcs::{OpTag, Opcode};
use super::visual::can_visual_container_replace;

/// Deterministic reading order: an `Insert` immediately followed by a
/// `Delete` at the same anchor is swapped, so deletions always render
/// before insertions.
pub(crate) fn delete_first(mut opcodes: Vec<Opcode>) -> Vec<Opcode> {
    let mut k = 0;
    while k + 1 < opcodes.len() {
        if opcodes[k].tag == OpTag::Insert && opcodes[k + 1].tag == OpTag::Delete {
            opcodes.swap(k, k + 1);
            k += 2;
        } else {
            k += 1;
        }
    }
    opcodes
}

/// Fuse a `Delete` whose range opens an inline wrapper with an adjacent
/// `Insert` opening the same wrapper tag (different attributes) into one
/// `Replace`, so the rewriters see both sides and can mark a single
/// attribute change instead of nesting a removal inside an insertion.
pub(crate) fn fuse_inline_wrapper_attr_change(
    opcodes: Vec<Opcode>,
    old_events: &[Event],
    new_events: &[Event],
) -> Vec<Opcode> {
    fuse_adjacent_wrapper_pair(opcodes, old_events, new_events, |old_tag, new_tag| {
        old_tag == new_tag && is_inline_formatting_tag(old_tag)
    })
}

/// Same fusion for an inline wrapper swapped for a different inline wrapper
/// (`<b>` → `<strong>`, `<span>` → `<em>`).
pub(crate) fn fuse_inline_wrapper_tag_change(
    opcodes: Vec<Opcode>,
    old_events: &[Event],
    new_events: &[Event],
) -> Vec<Opcode> {
    fuse_adjacent_wrapper_pair(opcodes, old_events, new_events, |old_tag, new_tag| {
        old_tag != new_tag && is_inline_formatting_tag(old_tag) && is_inline_formatting_tag(new_tag)
    })
}

fn fuse_adjacent_wrapper_pair(
    opcodes: Vec<Opcode>,
    old_events: &[Event],
    new_events: &[Event],
    tags_match: impl Fn(&str, &str) -> bool,
) -> Vec<Opcode> {
    let mut out: Vec<Opcode> = Vec::with_capacity(opcodes.len());
    let mut k = 0;
    while k < opcodes.len() {
        if k + 1 < opcodes.len() {
            let (a, b) = (opcodes[k], opcodes[k + 1]);
            if a.tag == OpTag::Delete && b.tag == OpTag::Insert {
                let old_first = old_events.get(a.old_lo).and_then(Event::start_tag);
                let new_first = new_events.get(b.new_lo).and_then(Event::start_tag);
                if let (Some(old_tag), Some(new_tag)) = (old_first, new_first) {
                    if tags_match(old_tag, new_tag) {
                        out.push(Opcode {
                            tag: OpTag::Replace,
                            old_lo: a.old_lo,
                            old_hi: a.old_hi,
                            new_lo: b.new_lo,
                            new_hi: b.new_hi,
                        });
                        k += 2;
                        continue;
                    }
                }
            }
        }
        out.push(opcodes[k]);
        k += 1;
    }
    out
}

/// Visual-only container change: same collapsed text, only the tag,
/// attributes, or inline structure differ. When it holds, the inner differ
/// short-circuits LCS and treats the whole slice as one replace.
pub(crate) fn should_force_visual_replace(
    old_events: &[Event],
    new_events: &[Event],
    config: &DiffConfig,
) -> bool {
    old_events != new_events && can_visual_container_replace(old_events, new_events, config)
}
