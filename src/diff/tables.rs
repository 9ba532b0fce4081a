// Table diff — two-level alignment, never event-level at the top of a table.
//
// Rows align by the text of their first two cells, then cells align within
// each row with a walk that prefers preserving left-to-right column
// identity. A plain LCS on cell keys drifts across duplicate values (two
// "8" cells) when a column is removed, marking the wrong column deleted and
// breaking the table when the change is applied.

use crate::event::{collapse_ws, extract_text, Attrs, Event, Pos};

use super::{diff_event_slices, StreamDiffer};

/// CSS properties inherited by descendants; when a restyled table wrapper
/// changes them, the `<del>` copy must carry the old values so deleted text
/// renders in its original font.
const INHERITABLE_PROPS: &[&str] =
    &["font-family", "font-size", "font-style", "font-weight", "color"];

#[derive(Debug, Clone)]
pub(crate) struct Cell {
    pub tag: String,
    pub events: Vec<Event>,
    pub attrs: Attrs,
}

/// Direct child `<td>`/`<th>` blocks of a `<tr>` slice.
pub(crate) fn extract_direct_cells(tr_events: &[Event]) -> Vec<Cell> {
    let mut cells = Vec::new();
    let mut i = 0;
    while i < tr_events.len() {
        if let Event::Start { tag, attrs, .. } = &tr_events[i] {
            if tag == "td" || tag == "th" {
                let j = super::atoms::find_block_end(tr_events, i, tag);
                cells.push(Cell {
                    tag: tag.clone(),
                    events: tr_events[i..j].to_vec(),
                    attrs: attrs.clone(),
                });
                i = j;
                continue;
            }
        }
        i += 1;
    }
    cells
}

/// All `<tr>` blocks within a `<table>` slice, looking through
/// `thead`/`tbody`/`tfoot`.
pub(crate) fn extract_tr_blocks(table_events: &[Event]) -> Vec<Vec<Event>> {
    let mut rows = Vec::new();
    let mut i = 0;
    while i < table_events.len() {
        if table_events[i].start_tag() == Some("tr") {
            let j = super::atoms::find_block_end(table_events, i, "tr");
            rows.push(table_events[i..j].to_vec());
            i = j;
            continue;
        }
        i += 1;
    }
    rows
}

/// Row identity: collapsed text of the first two direct cells.
fn row_key(tr_events: &[Event]) -> (String, String) {
    let cells = extract_direct_cells(tr_events);
    let cell_text = |cell: &Cell| collapse_ws(&extract_text(&cell.events));
    let first = cells.first().map(&cell_text).unwrap_or_default();
    let second = cells.get(1).map(&cell_text).unwrap_or_default();
    (first, second)
}

/// Text-only key used to keep column alignment stable even when every cell
/// gets restyled.
fn align_key(cell: &Cell) -> (String, String) {
    (cell.tag.clone(), collapse_ws(&extract_text(&cell.events)))
}

/// Which old index to delete (`len(old) == len(new) + 1`) so the remaining
/// cells line up best: maximize position-matches of the prefix before the
/// deletion plus the suffix shifted left by one. Ties resolve to the
/// rightmost candidate — among a run of duplicate cells the last one is the
/// removed column, so prefix matches stay position-aligned. Keeps duplicate
/// and empty cells from drifting.
fn best_single_delete_index(old_keys: &[(String, String)], new_keys: &[(String, String)]) -> usize {
    let mut best_k = 0;
    let mut best_score = -1i64;
    for k in 0..old_keys.len() {
        let mut score = 0i64;
        for i in 0..k.min(new_keys.len()) {
            if old_keys[i] == new_keys[i] {
                score += 1;
            }
        }
        for i in k..new_keys.len() {
            if old_keys[i + 1] == new_keys[i] {
                score += 1;
            }
        }
        if score >= best_score {
            best_score = score;
            best_k = k;
        }
    }
    best_k
}

/// Mirror of [`best_single_delete_index`] for a single inserted column,
/// with the same rightmost tie-break.
fn best_single_insert_index(old_keys: &[(String, String)], new_keys: &[(String, String)]) -> usize {
    let mut best_k = 0;
    let mut best_score = -1i64;
    for k in 0..new_keys.len() {
        let mut score = 0i64;
        for i in 0..k.min(old_keys.len()) {
            if old_keys[i] == new_keys[i] {
                score += 1;
            }
        }
        for i in k..old_keys.len() {
            if old_keys[i] == new_keys[i + 1] {
                score += 1;
            }
        }
        if score >= best_score {
            best_score = score;
            best_k = k;
        }
    }
    best_k
}

fn style_props(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (name, value) = decl.trim().split_once(':')?;
            let name = name.trim().to_lowercase();
            let value = value.trim().to_string();
            (!name.is_empty() && !value.is_empty()).then_some((name, value))
        })
        .collect()
}

/// Merge inheritable props of the old table style into a del style: when
/// the old cell inherited its font from the table and the table's font
/// changed, the del must carry the old table font explicitly.
pub(crate) fn merge_inherited_style(
    del_style: Option<&str>,
    table_old_style: Option<&str>,
) -> Option<String> {
    let Some(table_old_style) = table_old_style else {
        return del_style.map(str::to_string);
    };
    let table_props = style_props(table_old_style);
    let mut del_props = del_style.map(style_props).unwrap_or_default();
    let mut merged = false;
    for prop in INHERITABLE_PROPS {
        if let Some((_, value)) = table_props.iter().find(|(name, _)| name == prop) {
            if !del_props.iter().any(|(name, _)| name == prop) {
                del_props.push((prop.to_string(), value.clone()));
                merged = true;
            }
        }
    }
    if !merged {
        return del_style.map(str::to_string);
    }
    Some(
        del_props
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

// ---------------------------------------------------------------------------
// Cell pairing
// ---------------------------------------------------------------------------

/// Diff one old/new cell pair. When the text differs, a SINGLE cell is
/// emitted whose content carries the del+ins pair — never two cells in
/// place of one, which would alter the column count.
fn diff_cell_pair(
    differ: &mut StreamDiffer<'_>,
    old_cell: &Cell,
    new_cell: &Cell,
    table_old_style: Option<&str>,
) {
    let old_events = &old_cell.events;
    let new_events = &new_cell.events;

    if old_events.is_empty() || !old_events[0].is_start() || !old_events[old_events.len() - 1].is_end()
    {
        differ.grouped_replace(old_events, new_events);
        return;
    }

    let old_attrs = &old_cell.attrs;
    let new_attrs = if new_events.first().is_some_and(Event::is_start) {
        &new_cell.attrs
    } else {
        old_attrs
    };
    let same_text = align_key(old_cell) == align_key(new_cell);
    let same_attrs = old_attrs == new_attrs;

    if same_text && same_attrs {
        if let Some(table_style) = table_old_style {
            // Cell untouched, but the table's inherited style changed: show
            // old-font vs new-font copies.
            emit_cell_with_del_ins(
                differ,
                new_events,
                &old_events[1..old_events.len() - 1],
                &new_events[1..new_events.len() - 1],
                Some(table_style.to_string()),
            );
            return;
        }
        if old_events == new_events {
            differ.append_all(new_events);
            return;
        }
        // Inner elements changed (a span restyle): event-level diff.
        let out = diff_event_slices(old_events, new_events, differ.config, differ.ids_handle());
        differ.extend_output(out);
        return;
    }

    if same_text {
        // Style-only change on the cell itself.
        let old_style = merge_inherited_style(old_attrs.get("style"), table_old_style);
        emit_cell_with_del_ins(
            differ,
            new_events,
            &old_events[1..old_events.len() - 1],
            &new_events[1..new_events.len() - 1],
            old_style,
        );
        return;
    }

    // Text differs: one cell, del+ins content.
    let del_style = if !same_attrs {
        merge_inherited_style(old_attrs.get("style"), table_old_style)
    } else {
        merge_inherited_style(None, table_old_style)
    };
    emit_cell_with_del_ins(
        differ,
        new_events,
        &old_events[1..old_events.len() - 1],
        &new_events[1..new_events.len() - 1],
        del_style,
    );
}

/// Emit a single cell (the new wrapper) whose content is
/// `<del [style=old]>old</del><ins>new</ins>` under one group id.
fn emit_cell_with_del_ins(
    differ: &mut StreamDiffer<'_>,
    new_cell_events: &[Event],
    old_content: &[Event],
    new_content: &[Event],
    del_style: Option<String>,
) {
    let Some(Event::Start { tag, attrs, pos }) = new_cell_events.first() else {
        return;
    };
    let (tag, mut attrs, pos) = (tag.clone(), attrs.clone(), *pos);
    differ.inject_diff_id(&mut attrs, None);
    differ.append(Event::start(&tag, attrs, pos));

    differ.with_group(None, |d| {
        let mut del_attrs = Attrs::new();
        if let Some(style) = &del_style {
            del_attrs.set("style", style.clone());
        }
        d.inject_diff_id(&mut del_attrs, None);
        d.append(Event::start("del", del_attrs, Pos::synthetic()));
        if !old_content.is_empty() {
            d.replay_with_br_markers(old_content);
        }
        d.append(Event::end("del", Pos::synthetic()));

        let mut ins_attrs = Attrs::new();
        d.inject_diff_id(&mut ins_attrs, None);
        d.append(Event::start("ins", ins_attrs, Pos::synthetic()));
        if !new_content.is_empty() {
            d.replay_with_br_markers(new_content);
        }
        d.append(Event::end("ins", Pos::synthetic()));
    });

    if let Some(end) = new_cell_events.last() {
        differ.append(end.clone());
    }
}

// ---------------------------------------------------------------------------
// Row alignment
// ---------------------------------------------------------------------------

/// Diff a row by aligning direct cells. Single-column removal/insertion is
/// handled positionally with a stable chosen index; everything else walks
/// greedily left to right.
pub(crate) fn diff_tr_by_cells(
    differ: &mut StreamDiffer<'_>,
    old_tr_events: &[Event],
    new_tr_events: &[Event],
    table_old_style: Option<&str>,
) {
    if old_tr_events.is_empty() || new_tr_events.is_empty() {
        let out = diff_event_slices(old_tr_events, new_tr_events, differ.config, differ.ids_handle());
        differ.extend_output(out);
        return;
    }

    // Keep the old <tr> wrapper; row attributes rarely matter.
    differ.append(old_tr_events[0].clone());

    let old_cells = extract_direct_cells(old_tr_events);
    let new_cells = extract_direct_cells(new_tr_events);
    let old_align: Vec<_> = old_cells.iter().map(align_key).collect();
    let new_align: Vec<_> = new_cells.iter().map(align_key).collect();

    if old_cells.len() == new_cells.len() + 1 {
        let k = best_single_delete_index(&old_align, &new_align);
        for idx in 0..k {
            if idx < new_cells.len() {
                diff_cell_pair(differ, &old_cells[idx], &new_cells[idx], table_old_style);
            } else {
                let events = old_cells[idx].events.clone();
                differ.with_group(None, |d| d.delete_events(&events));
            }
        }
        let removed = old_cells[k].events.clone();
        differ.with_group(None, |d| d.delete_events(&removed));
        for idx in k..new_cells.len() {
            diff_cell_pair(differ, &old_cells[idx + 1], &new_cells[idx], table_old_style);
        }
        differ.append(old_tr_events[old_tr_events.len() - 1].clone());
        return;
    }

    if new_cells.len() == old_cells.len() + 1 {
        let k = best_single_insert_index(&old_align, &new_align);
        for idx in 0..k {
            if idx < old_cells.len() {
                diff_cell_pair(differ, &old_cells[idx], &new_cells[idx], table_old_style);
            } else {
                let events = new_cells[idx].events.clone();
                differ.with_group(None, |d| d.insert_events(&events));
            }
        }
        let added = new_cells[k].events.clone();
        differ.with_group(None, |d| d.insert_events(&added));
        for idx in k..old_cells.len() {
            diff_cell_pair(differ, &old_cells[idx], &new_cells[idx + 1], table_old_style);
        }
        differ.append(old_tr_events[old_tr_events.len() - 1].clone());
        return;
    }

    let mut i = 0;
    let mut j = 0;
    while i < old_cells.len() || j < new_cells.len() {
        if i < old_cells.len() && j < new_cells.len() && old_align[i] == new_align[j] {
            diff_cell_pair(differ, &old_cells[i], &new_cells[j], table_old_style);
            i += 1;
            j += 1;
            continue;
        }

        let old_remaining = old_cells.len() - i;
        let new_remaining = new_cells.len() - j;

        if i < old_cells.len() && old_remaining > new_remaining {
            let events = old_cells[i].events.clone();
            differ.with_group(None, |d| d.delete_events(&events));
            i += 1;
            continue;
        }
        if j < new_cells.len() && new_remaining > old_remaining {
            let events = new_cells[j].events.clone();
            differ.with_group(None, |d| d.insert_events(&events));
            j += 1;
            continue;
        }

        // Same remaining count, different keys: pair them into one cell.
        if i < old_cells.len() && j < new_cells.len() {
            diff_cell_pair(differ, &old_cells[i], &new_cells[j], table_old_style);
            i += 1;
            j += 1;
            continue;
        }

        if i < old_cells.len() {
            let events = old_cells[i].events.clone();
            differ.with_group(None, |d| d.delete_events(&events));
            i += 1;
        }
        if j < new_cells.len() {
            let events = new_cells[j].events.clone();
            differ.with_group(None, |d| d.insert_events(&events));
            j += 1;
        }
    }

    differ.append(old_tr_events[old_tr_events.len() - 1].clone());
}

// ---------------------------------------------------------------------------
// Table alignment
// ---------------------------------------------------------------------------

/// Diff a table by aligning rows, then cells. Keeps the output valid even
/// when the table tag itself is restyled: the old table rides along hidden
/// as revert data and the new one is marked `tagdiff_added`.
pub(crate) fn diff_table_by_rows(
    differ: &mut StreamDiffer<'_>,
    old_table_events: &[Event],
    new_table_events: &[Event],
) {
    if old_table_events.is_empty() || new_table_events.is_empty() {
        let out =
            diff_event_slices(old_table_events, new_table_events, differ.config, differ.ids_handle());
        differ.extend_output(out);
        return;
    }

    let mut table_old_style: Option<String> = None;
    let mut table_attrs_changed = false;
    if let (
        Event::Start { attrs: old_attrs, .. },
        Event::Start { tag: new_tag, attrs: new_attrs, pos: new_pos },
    ) = (&old_table_events[0], &new_table_events[0])
    {
        table_attrs_changed = old_attrs != new_attrs;
        if table_attrs_changed {
            table_old_style = old_attrs
                .get("style")
                .filter(|s| !s.is_empty())
                .map(str::to_string);

            let diff_id = differ.maybe_new_diff_id();
            differ.emit_structural_revert(old_table_events, diff_id.clone());

            let mut attrs_out = new_attrs.clone();
            attrs_out.append_class("tagdiff_added");
            differ.inject_refattr(&mut attrs_out, old_attrs);
            differ.inject_diff_id(&mut attrs_out, diff_id);
            differ.append(Event::start(new_tag, attrs_out, *new_pos));
        }
    }
    if !table_attrs_changed {
        differ.append(new_table_events[0].clone());
    }

    let old_rows = extract_tr_blocks(old_table_events);
    let new_rows = extract_tr_blocks(new_table_events);
    let old_keys: Vec<_> = old_rows.iter().map(|r| row_key(r)).collect();
    let new_keys: Vec<_> = new_rows.iter().map(|r| row_key(r)).collect();

    let row_style = table_old_style.as_deref();
    for op in super::lcs::opcodes(&old_keys, &new_keys) {
        match op.tag {
            super::lcs::OpTag::Equal => {
                for (oi, nj) in (op.old_lo..op.old_hi).zip(op.new_lo..op.new_hi) {
                    diff_tr_by_cells(differ, &old_rows[oi], &new_rows[nj], row_style);
                }
            }
            super::lcs::OpTag::Delete => {
                differ.with_group(None, |d| {
                    for oi in op.old_lo..op.old_hi {
                        let row = old_rows[oi].clone();
                        d.delete_events(&row);
                    }
                });
            }
            super::lcs::OpTag::Insert => {
                differ.with_group(None, |d| {
                    for nj in op.new_lo..op.new_hi {
                        let row = new_rows[nj].clone();
                        d.insert_events(&row);
                    }
                });
            }
            super::lcs::OpTag::Replace => {
                // Pair rows positionally where possible.
                let n = op.old_len().min(op.new_len());
                for k in 0..n {
                    diff_tr_by_cells(
                        differ,
                        &old_rows[op.old_lo + k],
                        &new_rows[op.new_lo + k],
                        row_style,
                    );
                }
                if op.old_len() > n {
                    differ.with_group(None, |d| {
                        for oi in op.old_lo + n..op.old_hi {
                            let row = old_rows[oi].clone();
                            d.delete_events(&row);
                        }
                    });
                }
                if op.new_len() > n {
                    differ.with_group(None, |d| {
                        for nj in op.new_lo + n..op.new_hi {
                            let row = new_rows[nj].clone();
                            d.insert_events(&row);
                        }
                    });
                }
            }
        }
    }

    differ.append(new_table_events[new_table_events.len() - 1].clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn keys(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn single_delete_index_with_duplicates() {
        // Row "LII": 8 8 0% — removing the middle "8" must pick index 2,
        // not the first duplicate by accident.
        let old = keys(&[("td", "lii"), ("td", "8"), ("td", "8"), ("td", "0%"), ("td", "enero")]);
        let new = keys(&[("td", "lii"), ("td", "8"), ("td", "0%"), ("td", "enero")]);
        assert_eq!(best_single_delete_index(&old, &new), 2);
    }

    #[test]
    fn single_insert_index_mirrors() {
        let old = keys(&[("td", "a"), ("td", "c")]);
        let new = keys(&[("td", "a"), ("td", "b"), ("td", "c")]);
        assert_eq!(best_single_insert_index(&old, &new), 1);
    }

    #[test]
    fn inherited_style_merge() {
        let merged = merge_inherited_style(
            Some("color: blue"),
            Some("font-family: serif; border: 1px"),
        );
        assert_eq!(merged.as_deref(), Some("color: blue; font-family: serif"));

        let untouched = merge_inherited_style(Some("color: blue"), Some("border: 1px"));
        assert_eq!(untouched.as_deref(), Some("color: blue"));

        // No table restyle: the cell's own style passes through.
        assert_eq!(
            merge_inherited_style(Some("color: blue"), None).as_deref(),
            Some("color: blue")
        );
        assert_eq!(merge_inherited_style(None, None), None);
    }
}
