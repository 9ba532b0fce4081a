// Text-level differ — token LCS with junk suppression and deterministic
// del→ins ordering.
//
// Tokens separate runs of word characters, runs of punctuation, and runs of
// whitespace, so a punctuation-only edit ("CAD" vs "CAD.") becomes a clean
// insert/delete instead of a replace that drags neighboring whitespace in.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::DiffConfig;
use crate::event::Pos;

use super::{ChangeKind, StreamDiffer};

static LEADING_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s+").unwrap());
static TRAILING_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+$").unwrap());
static INNER_SPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").unwrap());

/// Split `text` into tokens, keeping separator runs as their own tokens.
pub(crate) fn split_tokens(regex: &Regex, text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut last = 0;
    for m in regex.find_iter(text) {
        if m.start() > last {
            parts.push(text[last..m.start()].to_string());
        }
        if !m.as_str().is_empty() {
            parts.push(m.as_str().to_string());
        }
        last = m.end();
    }
    if last < text.len() {
        parts.push(text[last..].to_string());
    }
    parts
}

pub(crate) fn text_split(config: &DiffConfig, text: &str) -> Vec<String> {
    if config.tokenize_text {
        split_tokens(&config.tokenize_regex, text)
    } else {
        // Legacy behavior: the whole run is one token.
        vec![text.to_string()]
    }
}

/// Replace whitespace that HTML would collapse with NBSPs: leading/trailing
/// runs always, interior runs of two or more spaces. Single mid-string spaces
/// stay readable.
pub(crate) fn make_whitespace_visible(s: &str) -> String {
    if s.is_empty() {
        return s.to_string();
    }
    let nbsp_run = |m: &regex::Captures| "\u{a0}".repeat(m[0].chars().count());
    let s = LEADING_SPACE.replace(s, |m: &regex::Captures| nbsp_run(m));
    let s = TRAILING_SPACE.replace(&s, |m: &regex::Captures| nbsp_run(m));
    INNER_SPACE_RUN
        .replace_all(&s, |m: &regex::Captures| nbsp_run(m))
        .into_owned()
}

pub(crate) fn cut_leading_space(s: &str) -> (&str, &str) {
    match LEADING_SPACE.find(s) {
        Some(m) => (&s[..m.end()], &s[m.end()..]),
        None => ("", s),
    }
}

impl StreamDiffer<'_> {
    /// Diff two text runs token-by-token, emitting `<del>`/`<ins>` markers
    /// into the current output.
    ///
    /// Opcodes are buffered into pending del/ins runs that flush on every
    /// `Equal`, so a delete/insert/delete pattern renders as one `<del>`
    /// followed by one `<ins>` — never an insertion inside a deletion.
    pub(crate) fn diff_text(&mut self, pos: Pos, old_text: &str, new_text: &str) {
        let old = text_split(self.config, old_text);
        let new = text_split(self.config, new_text);
        let opcodes =
            super::lcs::opcodes_with_junk_filter(&old, &new, self.config.sequence_match_threshold);

        let mut pending_del: Vec<String> = Vec::new();
        let mut pending_ins: Vec<String> = Vec::new();

        for op in opcodes {
            match op.tag {
                super::lcs::OpTag::Equal => {
                    self.flush_pending_text(pos, &mut pending_del, &mut pending_ins);
                    self.push_text(old[op.old_lo..op.old_hi].concat(), pos);
                }
                super::lcs::OpTag::Replace => {
                    let old_part = old[op.old_lo..op.old_hi].concat();
                    let new_part = new[op.new_lo..op.new_hi].concat();
                    if is_space_only_pair(&old_part, &new_part) {
                        // Whitespace multiplicity changed ("   " vs " "):
                        // keep the common run unchanged and mark only the
                        // extra spaces.
                        self.flush_pending_text(pos, &mut pending_del, &mut pending_ins);
                        let common = common_prefix(&old_part, &new_part);
                        if !common.is_empty() {
                            self.push_text(common.to_string(), pos);
                        }
                        let old_rem = &old_part[common.len()..];
                        let new_rem = &new_part[common.len()..];
                        if !old_rem.is_empty() {
                            pending_del.push(old_rem.to_string());
                        }
                        if !new_rem.is_empty() {
                            pending_ins.push(new_rem.to_string());
                        }
                        continue;
                    }
                    pending_del.extend(old[op.old_lo..op.old_hi].iter().cloned());
                    pending_ins.extend(new[op.new_lo..op.new_hi].iter().cloned());
                }
                super::lcs::OpTag::Delete => {
                    pending_del.extend(old[op.old_lo..op.old_hi].iter().cloned());
                }
                super::lcs::OpTag::Insert => {
                    pending_ins.extend(new[op.new_lo..op.new_hi].iter().cloned());
                }
            }
        }
        self.flush_pending_text(pos, &mut pending_del, &mut pending_ins);
    }

    fn flush_pending_text(
        &mut self,
        pos: Pos,
        pending_del: &mut Vec<String>,
        pending_ins: &mut Vec<String>,
    ) {
        if !pending_del.is_empty() && !pending_ins.is_empty() {
            // Paired change: one id for both so the frontend can act on the
            // pair as a unit.
            let id = self.maybe_new_diff_id();
            self.mark_text(pos, &pending_del.concat(), ChangeKind::Del, id.clone());
            self.mark_text(pos, &pending_ins.concat(), ChangeKind::Ins, id);
            pending_del.clear();
            pending_ins.clear();
            return;
        }
        if !pending_del.is_empty() {
            let id = self.maybe_new_diff_id();
            self.mark_text(pos, &pending_del.concat(), ChangeKind::Del, id);
            pending_del.clear();
        }
        if !pending_ins.is_empty() {
            let id = self.maybe_new_diff_id();
            self.mark_text(pos, &pending_ins.concat(), ChangeKind::Ins, id);
            pending_ins.clear();
        }
    }
}

fn is_space_only_pair(old_part: &str, new_part: &str) -> bool {
    !old_part.is_empty()
        && !new_part.is_empty()
        && old_part.trim().is_empty()
        && new_part.trim().is_empty()
        && !old_part.contains(['\n', '\r'])
        && !new_part.contains(['\n', '\r'])
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let n = crate::event::common_prefix_len(a, b);
    &a[..n]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn split_keeps_separators() {
        let cfg = DiffConfig::default();
        assert_eq!(
            text_split(&cfg, "Foo bar, baz"),
            vec!["Foo", " ", "bar", ",", " ", "baz"]
        );
    }

    #[test]
    fn split_separates_punctuation_from_words() {
        let cfg = DiffConfig::default();
        assert_eq!(text_split(&cfg, "CAD."), vec!["CAD", "."]);
    }

    #[test]
    fn whitespace_visibility() {
        assert_eq!(make_whitespace_visible(" x "), "\u{a0}x\u{a0}");
        assert_eq!(make_whitespace_visible("a  b"), "a\u{a0}\u{a0}b");
        assert_eq!(make_whitespace_visible("a b"), "a b");
    }

    #[test]
    fn cut_leading() {
        assert_eq!(cut_leading_space("  x"), ("  ", "x"));
        assert_eq!(cut_leading_space("x"), ("", "x"));
    }
}
