// Runtime configuration for diff rendering.

use std::sync::LazyLock;

use regex::Regex;

/// Token splitter: runs of whitespace and runs of punctuation are separate
/// tokens from word characters, so punctuation-only edits don't drag the
/// neighboring word into the change.
static TOKEN_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+|[^\w\s]+").unwrap());

/// Inline wrappers that carry formatting, not structural identity.
pub const INLINE_FORMATTING_TAGS: &[&str] = &["span", "strong", "b", "em", "i", "u"];

/// Line-level wrappers that are best deleted/inserted whole.
pub const BLOCK_WRAPPER_TAGS: &[&str] = &["p", "h1", "h2", "h3", "h4", "h5", "h6"];

/// Tags whose children's identity depends on placement; never nested inside
/// `<ins>`/`<del>` — they get class markers instead.
pub const STRUCTURAL_TAGS: &[&str] =
    &["table", "thead", "tbody", "tfoot", "tr", "td", "th", "ul", "ol", "li"];

/// Tags that end the "plain div" atomization heuristic: a div containing any
/// of these is a section container, not a visual block.
pub const STRUCTURAL_CHILD_TAGS: &[&str] = &[
    "p", "br", "table", "ul", "ol", "li", "tr", "td", "th", "h1", "h2", "h3", "h4", "h5", "h6",
];

pub fn is_inline_formatting_tag(tag: &str) -> bool {
    INLINE_FORMATTING_TAGS.contains(&tag)
}

pub fn is_block_wrapper_tag(tag: &str) -> bool {
    BLOCK_WRAPPER_TAGS.contains(&tag)
}

pub fn is_structural_tag(tag: &str) -> bool {
    STRUCTURAL_TAGS.contains(&tag)
}

/// Engine configuration. Plain public fields; `Default` gives the documented
/// defaults and `with_*` helpers cover the common overrides.
#[derive(Debug, Clone)]
pub struct DiffConfig {
    /// Enforce `<del>` before `<ins>` by opcode reordering.
    pub delete_first: bool,
    /// Glyph rendered when a `<br>` is inserted or deleted. Empty disables.
    pub linebreak_marker: String,

    /// Attributes whose change should be visible to a reader (the implicit
    /// `id` is always considered in addition).
    pub track_attrs: Vec<String>,
    /// Tags where visual-only changes (attrs/tag change, same text) render as
    /// a visible diff. Excludes structural containers other than cells.
    pub visual_container_tags: Vec<String>,
    /// Tags atomized as blocks for alignment. Intentionally excludes generic
    /// container divs with structural children so large sections aren't
    /// swallowed.
    pub visual_atomize_tags: Vec<String>,

    /// Enable text-token atomization.
    pub tokenize_text: bool,
    /// Token splitter regex.
    pub tokenize_regex: Regex,
    /// Render whitespace as NBSP inside `<del>`/`<ins>` so it stays visible.
    pub preserve_whitespace_in_diff: bool,
    /// Merge adjacent `<ins>…</ins><ins>…</ins>` (and `<del>`) pairs.
    pub merge_adjacent_change_tags: bool,
    /// Render visual-only changes as an inline del+ins pair.
    pub visual_replace_inline: bool,

    pub enable_list_atomization: bool,
    pub enable_table_atomization: bool,
    pub enable_inline_wrapper_atomization: bool,

    /// Void tags that force an inner event diff when atom keys agree but the
    /// event streams differ.
    pub force_event_diff_on_equal_for_tags: Vec<String>,
    /// Void tags wrapped with `<ins>`/`<del>` so the change is visible even
    /// though they carry no text.
    pub wrap_void_tag_changes_with_ins_del: Vec<String>,

    /// Emit stable group ids on change markers for per-change accept/reject.
    /// A data-* attribute is used because a paired ins/del sharing an HTML
    /// `id` would be invalid.
    pub add_diff_ids: bool,
    pub diff_id_attr: String,

    /// Matching blocks with fewer tokens than this are ignored by the text
    /// differ, preventing shredded diffs on unrelated texts.
    pub sequence_match_threshold: usize,

    /// If the similarity ratio of the full texts is below this value, skip
    /// structural matching and render one bulk del + ins. 0 disables.
    pub bulk_replace_similarity_threshold: f64,
}

impl Default for DiffConfig {
    fn default() -> Self {
        DiffConfig {
            delete_first: true,
            linebreak_marker: "\u{00b6}".to_string(),
            track_attrs: to_strings(&["style", "class", "src", "href", "ref", "data-ref"]),
            visual_container_tags: to_strings(&[
                "span", "div", "p", "h1", "h2", "h3", "h4", "h5", "h6", "strong", "b", "em",
                "i", "u", "td", "th",
            ]),
            visual_atomize_tags: to_strings(&[
                "span", "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "strong", "b", "em",
                "i", "u",
            ]),
            tokenize_text: true,
            tokenize_regex: TOKEN_SPLIT.clone(),
            preserve_whitespace_in_diff: true,
            merge_adjacent_change_tags: true,
            visual_replace_inline: true,
            enable_list_atomization: true,
            enable_table_atomization: true,
            enable_inline_wrapper_atomization: true,
            force_event_diff_on_equal_for_tags: to_strings(&["img"]),
            wrap_void_tag_changes_with_ins_del: to_strings(&["img"]),
            add_diff_ids: true,
            diff_id_attr: "data-diff-id".to_string(),
            sequence_match_threshold: 2,
            bulk_replace_similarity_threshold: 0.3,
        }
    }
}

impl DiffConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether change markers carry group ids.
    pub fn with_diff_ids(mut self, add: bool) -> Self {
        self.add_diff_ids = add;
        self
    }

    /// Set the attribute name used for group ids.
    pub fn with_diff_id_attr(mut self, attr: impl Into<String>) -> Self {
        self.diff_id_attr = attr.into();
        self
    }

    /// Set the glyph marking inserted/deleted line breaks.
    pub fn with_linebreak_marker(mut self, marker: impl Into<String>) -> Self {
        self.linebreak_marker = marker.into();
        self
    }

    /// Set the bulk-replace similarity threshold (0 disables).
    pub fn with_bulk_replace_threshold(mut self, threshold: f64) -> Self {
        self.bulk_replace_similarity_threshold = threshold;
        self
    }

    /// Set the junk-block cutoff of the text differ.
    pub fn with_sequence_match_threshold(mut self, threshold: usize) -> Self {
        self.sequence_match_threshold = threshold;
        self
    }

    pub(crate) fn is_visual_container(&self, tag: &str) -> bool {
        self.visual_container_tags.iter().any(|t| t == tag)
    }

    pub(crate) fn is_visual_atomize_tag(&self, tag: &str) -> bool {
        self.visual_atomize_tags.iter().any(|t| t == tag)
    }

    pub(crate) fn forces_event_diff_for(&self, tag: &str) -> bool {
        self.force_event_diff_on_equal_for_tags.iter().any(|t| t == tag)
    }

    pub(crate) fn wraps_void_tag(&self, tag: &str) -> bool {
        self.wrap_void_tag_changes_with_ins_del.iter().any(|t| t == tag)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_tracks_refs_and_cells() {
        let cfg = DiffConfig::default();
        assert!(cfg.track_attrs.iter().any(|a| a == "ref"));
        assert!(cfg.track_attrs.iter().any(|a| a == "data-ref"));
        assert!(cfg.is_visual_container("td"));
        assert!(cfg.is_visual_container("th"));
        assert!(cfg.delete_first);
        assert_eq!(cfg.diff_id_attr, "data-diff-id");
    }

    #[test]
    fn token_regex_separates_punctuation_and_whitespace() {
        let cfg = DiffConfig::default();
        let m: Vec<&str> = cfg.tokenize_regex.find_iter("CAD. x").map(|m| m.as_str()).collect();
        assert_eq!(m, vec![".", " "]);
    }
}
