// Sequence alignment — matching blocks, edit opcodes, similarity ratio.
//
// All alignment in the engine (atom keys, raw events, text tokens, table
// rows) goes through this module. Matching blocks are found by recursing on
// the longest common contiguous run (earliest position on ties), which
// keeps one logical change in one gap — a subsequence-maximizing alignment
// happily threads a match through the middle of a replaced region, splitting
// what should be a single replace across an incidental anchor. For fixed
// inputs the result is identical across runs and platforms.

/// A run of equal items: `a[a_start..a_start+len] == b[b_start..b_start+len]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchBlock {
    pub a_start: usize,
    pub b_start: usize,
    pub len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpTag {
    Equal,
    Replace,
    Delete,
    Insert,
}

/// One edit instruction over `a[old_lo..old_hi]` / `b[new_lo..new_hi]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub tag: OpTag,
    pub old_lo: usize,
    pub old_hi: usize,
    pub new_lo: usize,
    pub new_hi: usize,
}

impl Opcode {
    pub fn old_len(&self) -> usize {
        self.old_hi - self.old_lo
    }

    pub fn new_len(&self) -> usize {
        self.new_hi - self.new_lo
    }
}

/// Non-crossing matching blocks, in order.
pub fn matching_blocks<T: PartialEq>(a: &[T], b: &[T]) -> Vec<MatchBlock> {
    let mut blocks = Vec::new();
    collect_blocks(a, b, 0, 0, &mut blocks);

    // Adjacent runs merge into one block.
    let mut merged: Vec<MatchBlock> = Vec::with_capacity(blocks.len());
    for block in blocks {
        match merged.last_mut() {
            Some(last)
                if last.a_start + last.len == block.a_start
                    && last.b_start + last.len == block.b_start =>
            {
                last.len += block.len;
            }
            _ => merged.push(block),
        }
    }
    merged
}

fn collect_blocks<T: PartialEq>(
    a: &[T],
    b: &[T],
    a_off: usize,
    b_off: usize,
    out: &mut Vec<MatchBlock>,
) {
    if a.is_empty() || b.is_empty() {
        return;
    }
    let (ai, bj, len) = longest_common_run(a, b);
    if len == 0 {
        return;
    }
    collect_blocks(&a[..ai], &b[..bj], a_off, b_off, out);
    out.push(MatchBlock { a_start: a_off + ai, b_start: b_off + bj, len });
    collect_blocks(&a[ai + len..], &b[bj + len..], a_off + ai + len, b_off + bj + len, out);
}

/// Longest common contiguous run, earliest position on ties.
fn longest_common_run<T: PartialEq>(a: &[T], b: &[T]) -> (usize, usize, usize) {
    let mut best = (0usize, 0usize, 0usize);
    let mut prev = vec![0usize; b.len() + 1];
    for (i, item_a) in a.iter().enumerate() {
        let mut cur = vec![0usize; b.len() + 1];
        for (j, item_b) in b.iter().enumerate() {
            if item_a == item_b {
                let len = prev[j] + 1;
                cur[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        prev = cur;
    }
    best
}

/// Build edit opcodes from matching blocks. Gaps touching both sequences
/// become `Replace`, one-sided gaps `Delete`/`Insert` — so an adjacent
/// delete+insert pair never appears in the raw output.
pub fn opcodes_from_blocks(blocks: &[MatchBlock], a_len: usize, b_len: usize) -> Vec<Opcode> {
    let mut ops = Vec::new();
    let mut i = 0;
    let mut j = 0;
    let sentinel = MatchBlock { a_start: a_len, b_start: b_len, len: 0 };
    for block in blocks.iter().chain(std::iter::once(&sentinel)) {
        let tag = if i < block.a_start && j < block.b_start {
            Some(OpTag::Replace)
        } else if i < block.a_start {
            Some(OpTag::Delete)
        } else if j < block.b_start {
            Some(OpTag::Insert)
        } else {
            None
        };
        if let Some(tag) = tag {
            ops.push(Opcode {
                tag,
                old_lo: i,
                old_hi: block.a_start,
                new_lo: j,
                new_hi: block.b_start,
            });
        }
        if block.len > 0 {
            ops.push(Opcode {
                tag: OpTag::Equal,
                old_lo: block.a_start,
                old_hi: block.a_start + block.len,
                new_lo: block.b_start,
                new_hi: block.b_start + block.len,
            });
        }
        i = block.a_start + block.len;
        j = block.b_start + block.len;
    }
    ops
}

pub fn opcodes<T: PartialEq>(a: &[T], b: &[T]) -> Vec<Opcode> {
    opcodes_from_blocks(&matching_blocks(a, b), a.len(), b.len())
}

/// Opcodes with junk suppression: matching blocks of `threshold` tokens or
/// fewer are discarded (scaled down to `min_len / 4` on short inputs), so
/// incidental matches in unrelated text don't shred the diff into
/// interleavings.
pub fn opcodes_with_junk_filter<T: PartialEq>(a: &[T], b: &[T], threshold: usize) -> Vec<Opcode> {
    let effective = threshold.min(a.len().min(b.len()) / 4);
    let blocks: Vec<MatchBlock> = matching_blocks(a, b)
        .into_iter()
        .filter(|block| block.len > effective)
        .collect();
    opcodes_from_blocks(&blocks, a.len(), b.len())
}

/// Character-level similarity of two strings in `[0, 1]`:
/// `2·M / (len_a + len_b)` where `M` counts the matched characters.
pub fn text_similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let matched: usize = matching_blocks(&a, &b).iter().map(|block| block.len).sum();
    2.0 * matched as f64 / (a.len() + b.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn equal_sequences_are_one_block() {
        let a = chars("abcdef");
        let ops = opcodes(&a, &a);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].tag, OpTag::Equal);
        assert_eq!((ops[0].old_lo, ops[0].old_hi), (0, 6));
    }

    #[test]
    fn middle_replace() {
        let a = chars("abXcd");
        let b = chars("abYcd");
        let ops = opcodes(&a, &b);
        let tags: Vec<OpTag> = ops.iter().map(|o| o.tag).collect();
        assert_eq!(tags, vec![OpTag::Equal, OpTag::Replace, OpTag::Equal]);
    }

    #[test]
    fn pure_insert_and_delete() {
        let a = chars("ad");
        let b = chars("abcd");
        let ops = opcodes(&a, &b);
        let tags: Vec<OpTag> = ops.iter().map(|o| o.tag).collect();
        assert_eq!(tags, vec![OpTag::Equal, OpTag::Insert, OpTag::Equal]);

        let ops = opcodes(&b, &a);
        let tags: Vec<OpTag> = ops.iter().map(|o| o.tag).collect();
        assert_eq!(tags, vec![OpTag::Equal, OpTag::Delete, OpTag::Equal]);
    }

    #[test]
    fn opcode_ranges_tile_both_sequences() {
        let a = chars("the quick brown fox");
        let b = chars("the slow brown cat");
        let ops = opcodes(&a, &b);
        let mut i = 0;
        let mut j = 0;
        for op in &ops {
            assert_eq!(op.old_lo, i);
            assert_eq!(op.new_lo, j);
            i = op.old_hi;
            j = op.new_hi;
        }
        assert_eq!(i, a.len());
        assert_eq!(j, b.len());
    }

    #[test]
    fn replaced_region_is_one_gap() {
        // A shared item inside the replaced region must not split the
        // replace in two — the longest-run strategy anchors on the real
        // context instead.
        let a = vec!["head", "ws", "one", "ws", "two", "ws", "tail"];
        let b = vec!["head", "ws", "LIST", "ws", "tail"];
        let ops = opcodes(&a, &b);
        let tags: Vec<OpTag> = ops.iter().map(|o| o.tag).collect();
        assert_eq!(tags, vec![OpTag::Equal, OpTag::Replace, OpTag::Equal]);
        assert_eq!((ops[1].old_lo, ops[1].old_hi), (2, 5));
        assert_eq!((ops[1].new_lo, ops[1].new_hi), (2, 3));
    }

    #[test]
    fn junk_filter_drops_tiny_matches() {
        // A single shared token in otherwise unrelated text must not anchor
        // an alignment that interleaves the two sides.
        let a: Vec<&str> = "uno dos tres cuatro mismo cinco seis siete ocho".split(' ').collect();
        let b: Vec<&str> = "alfa beta gamma delta mismo eps zeta eta theta".split(' ').collect();
        assert!(opcodes(&a, &b).iter().any(|o| o.tag == OpTag::Equal));
        let ops = opcodes_with_junk_filter(&a, &b, 2);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].tag, OpTag::Replace);
    }

    #[test]
    fn junk_filter_keeps_everything_on_short_inputs() {
        let a: Vec<&str> = vec!["Foo", " ", "bar"];
        let b: Vec<&str> = vec!["Foo", " ", "baz"];
        // min_len/4 == 0, so nothing is filtered even with threshold 2.
        let ops = opcodes_with_junk_filter(&a, &b, 2);
        assert!(ops.iter().any(|o| o.tag == OpTag::Equal));
    }

    #[test]
    fn ratio_bounds() {
        assert_eq!(text_similarity_ratio("abc", "abc"), 1.0);
        assert_eq!(text_similarity_ratio("abc", "xyz"), 0.0);
        let mid = text_similarity_ratio("abcd", "abxy");
        assert!(mid > 0.4 && mid < 0.6, "{mid}");
    }

    #[test]
    fn unrelated_sentences_score_below_bulk_threshold() {
        let ratio = text_similarity_ratio("motivo del estudio:", "radiografía de pelvis ap");
        assert!(ratio < 0.3, "{ratio}");
    }
}
