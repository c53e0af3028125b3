//! Fragment indexing: the position in traversal order becomes the index.
//!
//! Called exactly once, at the end of extraction. The resulting index is the
//! only key the rewriting service echoes back, so it must be reproducible:
//! the same document extracted twice yields the same index for the same
//! anchor.

use crate::fragment::{Fragment, RawFragment};

/// Assign contiguous indices `0..n` in the order the extractor emitted them.
pub fn index_fragments(raw: Vec<RawFragment>) -> Vec<Fragment> {
    raw.into_iter()
        .enumerate()
        .map(|(index, f)| Fragment {
            index,
            text: f.text,
            anchor: f.anchor,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::Anchor;

    fn raw(text: &str, paragraph: usize, run: usize) -> RawFragment {
        RawFragment::new(text, Anchor::Docx { paragraph, run })
    }

    #[test]
    fn indices_are_contiguous_from_zero() {
        let out = index_fragments(vec![raw("a", 0, 0), raw("b", 0, 2), raw("c", 3, 0)]);
        let indices: Vec<usize> = out.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(out[1].anchor, Anchor::Docx { paragraph: 0, run: 2 });
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(index_fragments(Vec::new()).is_empty());
    }

    #[test]
    fn same_input_same_indices() {
        let input = vec![raw("x", 0, 0), raw("x", 1, 0)];
        assert_eq!(index_fragments(input.clone()), index_fragments(input));
    }
}
