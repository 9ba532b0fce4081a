// Regression tests — every bug found becomes a test case here.
// Never delete a test from this file.

use htmldiff::{render_diff, render_diff_with, DiffConfig, Options};

fn render_with_ids(old: &str, new: &str) -> String {
    let options = Options::new().with_config(DiffConfig::default().with_diff_ids(true));
    render_diff_with(old, new, &options).unwrap()
}

/// A changed word renders as a paired del→ins with the surrounding text
/// untouched.
#[test]
fn word_replacement_keeps_context() {
    let out = render_diff("<p>Foo bar baz</p>", "<p>Foo blah baz</p>").unwrap();
    assert!(out.contains("Foo "), "{out}");
    assert!(out.contains(" baz"), "{out}");
    let del = out.find("<del").expect("del present");
    let ins = out.find("<ins").expect("ins present");
    assert!(del < ins, "del must open before ins: {out}");
    assert!(!out.contains("<del>Foo"), "{out}");
}

/// Inserted text keeps its whitespace visible as NBSP inside the marker.
#[test]
fn inserted_word_carries_visible_space() {
    let out = render_diff("Foo baz", "Foo blah baz").unwrap();
    assert!(out.contains("blah"), "{out}");
    assert!(out.contains('\u{a0}'), "{out}");
    assert!(!out.contains("<del"), "{out}");
}

/// Rewrapping an inline span must not mark the unchanged sentence tail.
#[test]
fn inline_wrapper_change_does_not_delete_whole_sentence() {
    let before = r#"<div class="report-content">
            <p>
                <span>CLINICAL HISTORY:</span> The patient reports chest pain and fatigue.
            </p>
        </div>"#;
    let after = r#"<div class="report-content">
            <p>
                <strong>CLINICAL HISTORY:</strong> The patient reports chest pain and fatigue.
            </p>
        </div>"#;
    let out = render_diff(before, after).unwrap();
    assert!(out.contains("The patient reports chest pain and fatigue."), "{out}");
    assert!(!out.contains("<del>The patient reports chest pain and fatigue."), "{out}");
    assert!(!out.contains("<ins>The patient reports chest pain and fatigue."), "{out}");
}

/// A style-only change on an inline wrapper is a visible diff with both
/// styles present.
#[test]
fn style_only_change_is_marked() {
    let out = render_diff(
        r#"Foo <span style="font-size:14px">bar</span>"#,
        r#"Foo <span style="font-size:20px">bar</span>"#,
    )
    .unwrap();
    assert!(out.contains("<del"), "{out}");
    assert!(out.contains("<ins"), "{out}");
    assert!(out.contains("font-size:14px"), "{out}");
    assert!(out.contains("font-size:20px"), "{out}");
}

/// Inserted and deleted line breaks render a pilcrow marker.
#[test]
fn linebreak_marker_visible_on_insert_and_delete() {
    let out = render_diff("Foo", "Foo<br>Bar").unwrap();
    assert!(out.contains('\u{b6}'), "{out}");

    let out = render_diff("FooBar", "Foo<br><br>Bar").unwrap();
    assert!(out.matches('\u{b6}').count() >= 2, "{out}");

    let out = render_diff("Foo<br><br>Bar", "FooBar").unwrap();
    assert!(out.matches('\u{b6}').count() >= 2, "{out}");
}

/// Moving line breaks around unchanged paragraphs must not touch them.
#[test]
fn moving_linebreaks_does_not_touch_unchanged_paragraphs() {
    let before = r#"<div class="report-content">
    <h3>REPORT STATUS: FINAL</h3>
    <p><strong>INDICATION:</strong> Severe headache.</p>
    <p><strong>COMPARISON:</strong> None available.</p>
    <br><br><br>
    <p><strong>Electronically Signed by:</strong> Dr. Strange</p>
</div>"#;
    let after = r#"<div class="report-content">
    <h3>REPORT STATUS: FINAL</h3>
    <br><br>
    <p><strong>INDICATION:</strong> Severe headache.</p>
    <p><strong>COMPARISON:</strong> None available.</p>
    <p><strong>Electronically Signed by:</strong> Dr. Strange</p>
</div>"#;
    let out = render_diff(before, after).unwrap();
    assert_eq!(out.matches("Severe headache.").count(), 1, "{out}");
    assert!(!out.contains("<del>Severe headache.") && !out.contains("<ins>Severe headache."));
    assert_eq!(out.matches("None available.").count(), 1, "{out}");
    assert_eq!(out.matches("Dr. Strange").count(), 1, "{out}");
    assert!(out.matches('\u{b6}').count() >= 5, "{out}");
}

/// Editing one list item leaves its siblings unmarked.
#[test]
fn list_change_localized_to_modified_item() {
    let old = "<ul><li>Uno</li><li>Dos</li><li>Tres</li></ul>";
    let new = "<ul><li>Uno</li><li>Dos cambiado</li><li>Tres</li></ul>";
    let out = render_diff(old, new).unwrap();
    assert!(out.contains("<ins"), "{out}");
    assert!(out.contains("cambiado"), "{out}");
    assert!(!out.contains("<del>Uno"), "{out}");
    assert!(!out.contains("<del>Tres"), "{out}");
}

/// Editing one cell leaves the rest of the row unmarked, inside a single
/// cell (never two cells in place of one).
#[test]
fn table_cell_change_localized() {
    let old = "<table><tr><td>A</td><td>B</td></tr></table>";
    let new = "<table><tr><td>A</td><td>C</td></tr></table>";
    let out = render_diff(old, new).unwrap();
    assert_eq!(out.matches("<td").count(), 2, "{out}");
    assert!(out.contains(">B</del>"), "{out}");
    assert!(out.contains(">C</ins>"), "{out}");
    assert!(!out.contains("<del>A"), "{out}");
}

/// Removing an intermediate column with duplicate values must mark the
/// removed column's cells, not drift onto a neighbor with the same text.
#[test]
fn table_remove_intermediate_column_with_duplicates_marks_correct_column() {
    let old = r#"<table>
<thead><tr>
<th>Localización</th>
<th>Diámetro Actual (mm)</th>
<th>Diámetro Previo (mm)</th>
<th>Cambio (%)</th>
<th>Fecha Previa</th>
</tr></thead>
<tbody>
<tr><td>LSD</td><td>11</td><td>10</td><td>+10%</td><td>Enero 2024</td></tr>
<tr><td>LII</td><td>8</td><td>8</td><td>0%</td><td>Enero 2024</td></tr>
</tbody>
</table>"#;
    let new = r#"<table>
<thead><tr>
<th>Localización</th>
<th>Diámetro Actual (mm)</th>
<th>Cambio (%)</th>
<th>Fecha Previa</th>
</tr></thead>
<tbody>
<tr><td>LSD</td><td>11</td><td>+10%</td><td>Enero 2024</td></tr>
<tr><td>LII</td><td>8</td><td>0%</td><td>Enero 2024</td></tr>
</tbody>
</table>"#;
    let out = render_diff(old, new).unwrap();

    // Deleted header is the removed column, not its right neighbor.
    let deleted_th_at = out
        .find(r#"<th class="tagdiff_deleted""#)
        .unwrap_or_else(|| panic!("no deleted th: {out}"));
    assert!(
        out[deleted_th_at..].starts_with(r#"<th class="tagdiff_deleted""#)
            && out[deleted_th_at..out[deleted_th_at..].find("</th>").unwrap() + deleted_th_at]
                .contains("Diámetro Previo (mm)"),
        "{out}"
    );
    let cambio_at = out.find("Cambio (%)").unwrap();
    let cambio_cell = out[..cambio_at].rfind("<th").unwrap();
    assert!(!out[cambio_cell..cambio_at].contains("tagdiff_deleted"), "{out}");

    // One deleted td per body row, holding the removed values.
    assert_eq!(out.matches(r#"<td class="tagdiff_deleted""#).count(), 2, "{out}");
    assert!(out.contains(">10</del>"), "{out}");
    assert!(out.contains(">8</del>"), "{out}");
    assert!(!out.contains(">+10%</del>"), "{out}");
    assert!(!out.contains(">0%</del>"), "{out}");
}

/// Removing a column whose cells may be blank still marks the right cells.
#[test]
fn table_remove_description_column_marks_deleted_cells() {
    let old = r#"<table>
<thead><tr>
<th>Hallazgo</th><th>Descripción</th><th>Localización</th><th>Tamaño</th>
</tr></thead>
<tbody>
<tr><td>Masa pulmonar</td><td>Con bordes espiculados</td><td>Lóbulo superior derecho</td><td>Aprox 3 cm</td></tr>
<tr><td>Adenopatías mediastínicas</td><td> </td><td>Mediastino</td><td>1.5 cm</td></tr>
</tbody>
</table>"#;
    let new = r#"<table>
<thead><tr>
<th>Hallazgo</th><th>Localización</th><th>Tamaño</th>
</tr></thead>
<tbody>
<tr><td>Masa pulmonar</td><td>Lóbulo superior derecho</td><td>Aprox 3 cm</td></tr>
<tr><td>Adenopatías mediastínicas</td><td>Mediastino</td><td>1.5 cm</td></tr>
</tbody>
</table>"#;
    let out = render_with_ids(old, new);
    assert!(out.contains("Descripción"), "{out}");
    assert!(out.contains("tagdiff_deleted"), "{out}");

    let deleted_th_at = out.find(r#"<th class="tagdiff_deleted""#).unwrap();
    let deleted_th_end = out[deleted_th_at..].find("</th>").unwrap() + deleted_th_at;
    assert!(out[deleted_th_at..deleted_th_end].contains("Descripción"), "{out}");
    let loc_at = out.find("Localización").unwrap();
    let loc_cell = out[..loc_at].rfind("<th").unwrap();
    assert!(!out[loc_cell..loc_at].contains("tagdiff_deleted"), "{out}");
}

/// Wrapping paragraphs into a list is one grouped structural change: a
/// hidden revert payload plus a marked list — no per-word shredding.
#[test]
fn paragraph_to_list_conversion_is_grouped_and_structural() {
    let before = "<p>Item A.</p><p>Item B.</p>";
    let after = "<ol><li><p>Item A.</p></li><li><p>Item B.</p></li></ol>";
    let out = render_with_ids(before, after);

    assert_eq!(out.matches("structural-revert-data").count(), 1, "{out}");
    assert!(out.contains(r#"<ol class="tagdiff_added""#), "{out}");
    assert_eq!(out.matches(r#"<li class="diff-bullet-ins""#).count(), 2, "{out}");
    // Item text is not rewrapped in ins/del; the only del is the hidden
    // revert payload.
    assert!(!out.contains("<ins"), "{out}");
    assert_eq!(out.matches("<del").count(), 1, "{out}");
}

/// The bullets repro: the leading unchanged paragraph stays put, the
/// converted paragraphs become one marked list.
#[test]
fn bullets_group_conversion() {
    let before = r#"<div>
<p><strong>HALLAZGOS:</strong></p>
<p><strong>Hepatobiliar:</strong> El hígado presenta morfología, tamaño y señal habituales.</p>
<p><strong>Vesícula Biliar:</strong> La vesícula biliar es de tamaño y grosor de pared normales.</p>
</div>"#;
    let after = r#"<div>
<p><strong>HALLAZGOS:</strong></p>
<ul>
<li><strong>Hepatobiliar:</strong> El hígado presenta morfología, tamaño y señal habituales.</li>
<li><strong>Vesícula Biliar:</strong> La vesícula biliar es de tamaño y grosor de pared normales.</li>
</ul>
</div>"#;
    let out = render_with_ids(before, after);

    assert!(out.contains("tagdiff_added"), "{out}");
    assert!(out.contains("structural-revert-data"), "{out}");
    assert!(out.contains("diff-bullet-ins"), "{out}");
    // The unchanged heading paragraph is not marked.
    assert!(!out.contains("<del><p><strong>HALLAZGOS:"), "{out}");
    // Item text is not shredded into word-level markers.
    assert!(!out.contains("<ins"), "{out}");
}

/// Flattening a list back to paragraphs marks the old list deleted
/// (bullet by bullet) and the new paragraphs inserted, under one group.
#[test]
fn list_to_paragraphs_conversion() {
    let before = "<ol><li><p>Item A.</p></li><li><p>Item B.</p></li></ol>";
    let after = "<p>Item A.</p><p>Item B.</p>";
    let out = render_with_ids(before, after);

    assert!(out.contains(r#"<ol class="tagdiff_deleted""#), "{out}");
    assert_eq!(out.matches(r#"<li class="diff-bullet-del""#).count(), 2, "{out}");
    assert!(out.contains("<ins"), "{out}");
}

/// A styled wrapper added around identical cell text renders one copy of
/// the text, marked replaced.
#[test]
fn visual_wrapper_added_in_cell_does_not_duplicate_text() {
    let old = "<table><tr><td>10.8</td></tr></table>";
    let new = r#"<table><tr><td><strong style="color:red">10.8</strong></td></tr></table>"#;
    let out = render_diff(old, new).unwrap();

    assert_eq!(out.matches("10.8").count(), 1, "{out}");
    assert!(out.contains("tagdiff_replaced"), "{out}");
    assert!(out.contains(r#"data-old-tag="none""#), "{out}");
    assert!(!out.contains("<del"), "{out}");
    assert!(!out.contains("<ins"), "{out}");
}

/// Unrelated texts render as one bulk del+ins pair sharing an id — no
/// interleaved word salad.
#[test]
fn bulk_replace_for_unrelated_inputs() {
    let old = "<p><strong>Motivo del estudio:</strong></p>";
    let new = "<p><strong>RADIOGRAFÍA DE PELVIS AP</strong></p>";
    let out = render_with_ids(old, new);

    assert_eq!(out.matches("<del").count(), 1, "{out}");
    assert_eq!(out.matches("<ins").count(), 1, "{out}");
    let del = out.find("<del").unwrap();
    let ins = out.find("<ins").unwrap();
    assert!(del < ins, "{out}");
    // Both markers carry the same group id.
    assert!(out.contains(r#"<del data-diff-id="1""#), "{out}");
    assert!(out.contains(r#"<ins data-diff-id="1""#), "{out}");
    // Whole subtrees move as units.
    assert_eq!(out.matches("Motivo del estudio:").count(), 1, "{out}");
    assert_eq!(out.matches("RADIOGRAFÍA DE PELVIS AP").count(), 1, "{out}");
}

/// A replaced image is marked in place with its old source recorded.
#[test]
fn image_source_change_marked_in_place() {
    let out = render_diff(r#"<img src="pic0.jpg">"#, r#"<img src="pic1.jpg">"#).unwrap();
    assert!(out.contains(r#"src="pic1.jpg""#), "{out}");
    assert!(out.contains("tagdiff_replaced"), "{out}");
    assert!(out.contains(r#"data-old-src="pic0.jpg""#), "{out}");
}

/// An inline wrapper flattened to plain text keeps the shared prefix and
/// suffix out of the markers.
#[test]
fn inline_wrapper_to_plain_preserves_shared_text() {
    let out =
        render_diff("<p>Texto <u>subrayado</u> final</p>", "<p>Texto normal final</p>").unwrap();
    assert_eq!(out.matches("Texto ").count(), 1, "{out}");
    assert!(!out.contains("<del>Texto"), "{out}");
    assert!(out.contains("<u>"), "{out}");
    assert!(out.contains("normal"), "{out}");
    assert!(out.contains(" final"), "{out}");
}

/// Bold toggled to italic with identical text renders a del+ins pair that
/// preserves both wrappers.
#[test]
fn inline_wrapper_tag_swap() {
    let out = render_diff("Foo <b>bar</b> baz", "Foo <i>bar</i> baz").unwrap();
    assert!(out.contains("<b>bar</b>"), "{out}");
    assert!(out.contains("<i>bar</i>"), "{out}");
    let del = out.find("<del").unwrap();
    let ins = out.find("<ins").unwrap();
    assert!(del < ins, "{out}");
}

/// A restyled cell keeps the table intact: the cell is emitted once with
/// old-style and new-style copies inside, all carrying group ids.
#[test]
fn td_style_change_preserves_table_and_has_ids() {
    let before = r#"<table><tr><td style="color:red">Test</td></tr></table>"#;
    let after = r#"<table><tr><td style="color:blue">Test</td></tr></table>"#;
    let out = render_with_ids(before, after);

    assert!(out.contains("<table"), "{out}");
    assert!(out.contains("</table>"), "{out}");
    assert_eq!(out.matches("<td").count(), 1, "{out}");
    assert!(out.contains("color:red"), "{out}");
    assert!(out.contains("color:blue"), "{out}");
    assert!(out.contains("data-diff-id=\""), "{out}");
}

/// A restyled table wrapper emits hidden revert data and a marked new
/// table whose deleted copies inherit the old font.
#[test]
fn table_wrapper_restyle_inherits_old_font_in_del() {
    let before = r#"<table style="font-family: serif"><tr><td>X</td></tr></table>"#;
    let after = r#"<table style="font-family: mono"><tr><td>X</td></tr></table>"#;
    let out = render_with_ids(before, after);

    assert_eq!(out.matches("structural-revert-data").count(), 1, "{out}");
    assert!(out.contains("tagdiff_added"), "{out}");
    assert!(out.contains(r#"data-old-style="font-family: serif""#), "{out}");
    assert!(out.contains(r#"<del style="font-family: serif""#), "{out}");
}

/// Default configuration tracks refs and treats cells as visual containers.
#[test]
fn default_config_tracks_refs_and_cells() {
    let config = DiffConfig::default();
    assert!(config.track_attrs.iter().any(|a| a == "ref"));
    assert!(config.track_attrs.iter().any(|a| a == "data-ref"));
    assert!(config.visual_container_tags.iter().any(|t| t == "td"));
    assert!(config.visual_container_tags.iter().any(|t| t == "th"));
}
