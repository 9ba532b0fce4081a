// Universal invariants checked over a corpus of input pairs.

use htmldiff::{diff_event_streams, parse_html_fragment, render_diff, DiffConfig, Event};

/// Pairs exercising every pipeline branch: text edits, list edits and
/// conversions, tables, line breaks, wrapper toggles, bulk replacement.
fn corpus() -> Vec<(&'static str, &'static str)> {
    vec![
        ("", ""),
        ("plain text", "plain text"),
        ("<p>Foo bar baz</p>", "<p>Foo bar baz</p>"),
        ("<p>Foo bar baz</p>", "<p>Foo blah baz</p>"),
        ("Foo baz", "Foo blah baz"),
        ("Foo bar baz", "Foo baz"),
        ("Foo <b>bar</b> baz", "Foo <i>bar</i> baz"),
        (
            "Foo <span style=\"font-size:14px\">bar</span>",
            "Foo <span style=\"font-size:20px\">bar</span>",
        ),
        ("Foo", "Foo<br>Bar"),
        ("Foo<br><br>Bar", "FooBar"),
        (
            "<ul><li>Uno</li><li>Dos</li><li>Tres</li></ul>",
            "<ul><li>Uno</li><li>Dos cambiado</li><li>Tres</li></ul>",
        ),
        (
            "<p>Item A.</p><p>Item B.</p>",
            "<ol><li><p>Item A.</p></li><li><p>Item B.</p></li></ol>",
        ),
        (
            "<ol><li><p>Item A.</p></li><li><p>Item B.</p></li></ol>",
            "<p>Item A.</p><p>Item B.</p>",
        ),
        (
            "<table><tr><td>A</td><td>B</td></tr></table>",
            "<table><tr><td>A</td><td>C</td></tr></table>",
        ),
        (
            "<table><tr><td>a</td><td>b</td><td>c</td></tr></table>",
            "<table><tr><td>a</td><td>c</td></tr></table>",
        ),
        (
            "<table><tr><td>10.8</td></tr></table>",
            "<table><tr><td><strong style=\"color:red\">10.8</strong></td></tr></table>",
        ),
        (
            "<p><strong>Motivo del estudio:</strong></p>",
            "<p><strong>RADIOGRAFÍA DE PELVIS AP</strong></p>",
        ),
        ("<img src=\"pic0.jpg\">", "<img src=\"pic1.jpg\">"),
        (
            "<p><span>CLINICAL:</span> Patient stable.</p>",
            "<p><strong>CLINICAL:</strong> Patient stable.</p>",
        ),
    ]
}

fn diff_events(old: &str, new: &str) -> Vec<Event> {
    let config = DiffConfig::default();
    let old_events = parse_html_fragment(old, "div", "diff").unwrap();
    let new_events = parse_html_fragment(new, "div", "diff").unwrap();
    diff_event_streams(old_events, new_events, &config)
}

#[test]
fn round_trip_identity_has_no_markers() {
    for (old, _) in corpus() {
        let out = render_diff(old, old).unwrap();
        assert!(!out.contains("<ins"), "ins in identity diff of {old:?}: {out}");
        assert!(!out.contains("<del"), "del in identity diff of {old:?}: {out}");
        assert!(!out.contains("tagdiff"), "tagdiff in identity diff of {old:?}: {out}");
        assert!(!out.contains("diff-bullet"), "bullet marker in identity diff of {old:?}: {out}");
    }
}

#[test]
fn output_has_balanced_tags() {
    for (old, new) in corpus() {
        let events = diff_events(old, new);
        let mut stack: Vec<&str> = Vec::new();
        for event in &events {
            match event {
                Event::Start { tag, .. } => stack.push(tag),
                Event::End { tag, .. } => {
                    assert_eq!(
                        stack.pop(),
                        Some(tag.as_str()),
                        "unbalanced {tag} diffing {old:?} vs {new:?}"
                    );
                }
                Event::Text { .. } => {}
            }
        }
        assert!(stack.is_empty(), "unclosed tags {stack:?} diffing {old:?} vs {new:?}");
    }
}

#[test]
fn paired_markers_open_del_before_ins() {
    for (old, new) in corpus() {
        let events = diff_events(old, new);
        let mut first_del: Vec<(String, usize)> = Vec::new();
        let mut first_ins: Vec<(String, usize)> = Vec::new();
        for (idx, event) in events.iter().enumerate() {
            if let Event::Start { tag, attrs, .. } = event {
                if let Some(id) = attrs.get("data-diff-id") {
                    let bucket = match tag.as_str() {
                        "del" => &mut first_del,
                        "ins" => &mut first_ins,
                        _ => continue,
                    };
                    if !bucket.iter().any(|(i, _)| i == id) {
                        bucket.push((id.to_string(), idx));
                    }
                }
            }
        }
        for (id, del_idx) in &first_del {
            if let Some((_, ins_idx)) = first_ins.iter().find(|(i, _)| i == id) {
                assert!(
                    del_idx < ins_idx,
                    "ins before del for id {id} diffing {old:?} vs {new:?}"
                );
            }
        }
    }
}

#[test]
fn output_is_deterministic() {
    for (old, new) in corpus() {
        let a = render_diff(old, new).unwrap();
        let b = render_diff(old, new).unwrap();
        assert_eq!(a, b, "nondeterministic output for {old:?} vs {new:?}");
    }
}

#[test]
fn wrapper_frames_every_output() {
    for (old, new) in corpus() {
        let out = render_diff(old, new).unwrap();
        assert!(
            out.starts_with("<div class=\"diff\">"),
            "missing wrapper start for {old:?} vs {new:?}: {out}"
        );
        assert!(out.ends_with("</div>"), "missing wrapper end for {old:?} vs {new:?}: {out}");
    }
}

#[test]
fn changed_inputs_produce_markers() {
    for (old, new) in corpus() {
        if old == new {
            continue;
        }
        let out = render_diff(old, new).unwrap();
        assert!(
            out.contains("<ins")
                || out.contains("<del")
                || out.contains("tagdiff")
                || out.contains("diff-bullet"),
            "no markers for {old:?} vs {new:?}: {out}"
        );
    }
}

#[test]
fn disabling_ids_removes_the_attribute() {
    let config = DiffConfig::default().with_diff_ids(false);
    let options = htmldiff::Options::new().with_config(config);
    let out = htmldiff::render_diff_with("<p>Foo bar</p>", "<p>Foo baz</p>", &options).unwrap();
    assert!(out.contains("<del"));
    assert!(!out.contains("data-diff-id"));
}
