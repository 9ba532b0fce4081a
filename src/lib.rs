// htmldiff — structural HTML diff engine.
//
// Architecture:
//   HTML strings → html5ever fragment parse → event streams → atomizer
//   → outer LCS aligner → rewriter dispatch → emitter → merge pass
//   → event stream → HTML string
//
// Given two well-formed HTML fragments, produces one combined fragment in
// which textual changes are wrapped in <ins>/<del> and structural changes
// carry class markers (tagdiff_added, tagdiff_deleted, tagdiff_replaced,
// diff-bullet-ins, diff-bullet-del), grouped by data-diff-id so a frontend
// can accept or reject each change independently.

mod config;
mod diff;
mod error;
pub mod event;
mod parse;
mod serialize;

pub use config::DiffConfig;
pub use error::DiffError;
pub use event::{Attrs, Event, Pos};
pub use parse::parse_html_fragment;
pub use serialize::serialize_events;

/// Rendering options: the wrapper element both fragments are parsed into,
/// plus the engine configuration.
#[derive(Debug, Clone)]
pub struct Options {
    /// Tag of the artificial root element. Default: `"div"`.
    pub wrapper_element: String,
    /// Class attribute of the artificial root element. Default: `"diff"`.
    pub wrapper_class: String,
    /// Engine configuration.
    pub config: DiffConfig,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            wrapper_element: "div".to_string(),
            wrapper_class: "diff".to_string(),
            config: DiffConfig::default(),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the wrapper element tag.
    pub fn with_wrapper_element(mut self, tag: impl Into<String>) -> Self {
        self.wrapper_element = tag.into();
        self
    }

    /// Set the wrapper element class.
    pub fn with_wrapper_class(mut self, class: impl Into<String>) -> Self {
        self.wrapper_class = class.into();
        self
    }

    /// Set the engine configuration.
    pub fn with_config(mut self, config: DiffConfig) -> Self {
        self.config = config;
        self
    }
}

/// Render the diff between two HTML fragments using default options.
///
/// # Examples
///
/// ```
/// let out = htmldiff::render_diff("<p>Foo bar baz</p>", "<p>Foo blah baz</p>").unwrap();
/// assert!(out.contains("<del"));
/// assert!(out.contains("<ins"));
/// ```
pub fn render_diff(old_html: &str, new_html: &str) -> Result<String, DiffError> {
    render_diff_with(old_html, new_html, &Options::default())
}

/// Render the diff between two HTML fragments with custom options.
///
/// The output begins with the wrapper start tag and ends with its close
/// tag; everything in between is the combined, marked-up content.
pub fn render_diff_with(
    old_html: &str,
    new_html: &str,
    options: &Options,
) -> Result<String, DiffError> {
    let old_events =
        parse::parse_html_fragment(old_html, &options.wrapper_element, &options.wrapper_class)?;
    let new_events =
        parse::parse_html_fragment(new_html, &options.wrapper_element, &options.wrapper_class)?;
    let out = diff::diff_streams(old_events, new_events, &options.config);
    Ok(serialize::serialize_events(&out))
}

/// Diff two already-parsed event streams. The engine without the
/// parser/serializer wiring; returns the combined output stream.
pub fn diff_event_streams(
    old_events: Vec<Event>,
    new_events: Vec<Event>,
    config: &DiffConfig,
) -> Vec<Event> {
    diff::diff_streams(old_events, new_events, config)
}
