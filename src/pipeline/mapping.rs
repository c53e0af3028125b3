//! Replacement mapping: equi-join of extracted and generated fragments on `index`.
//!
//! The join never looks at text. Generated text may be empty, duplicated
//! across fragments, or rewritten beyond recognition; the traversal index is
//! the only stable key, provided the service echoes back the index set it
//! was given.
//!
//! | extracted | generated | entry                                   |
//! |-----------|-----------|-----------------------------------------|
//! | yes       | yes       | matched, `replacement = Some(..)`        |
//! | yes       | no        | `replacement = None`, passed through     |
//! | no        | yes       | orphan, never used for rewriting         |

use crate::error::CoverageWarning;
use crate::fragment::{Anchor, Fragment, GeneratedFragment};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One row of the mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplacementEntry {
    pub index: usize,
    /// Anchor captured at extraction; `None` for orphans.
    pub anchor: Option<Anchor>,
    /// Text captured at extraction; `None` for orphans.
    pub original: Option<String>,
    /// Text returned by the service; `None` when absent or explicitly null.
    pub replacement: Option<String>,
}

/// Join status of a [`ReplacementEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Present on both sides.
    Matched,
    /// Extracted, but the service returned nothing for it.
    MissingReplacement,
    /// Returned by the service, but never extracted.
    Orphan,
}

impl ReplacementEntry {
    pub fn status(&self) -> EntryStatus {
        match (&self.original, &self.replacement) {
            (None, _) => EntryStatus::Orphan,
            (Some(_), None) => EntryStatus::MissingReplacement,
            (Some(_), Some(_)) => EntryStatus::Matched,
        }
    }

    pub fn is_orphan(&self) -> bool {
        self.original.is_none()
    }

    /// True when applying this entry must not touch the document: no
    /// replacement, replacement identical to the original, or an empty
    /// original that could not serve as a search key.
    pub fn is_noop(&self) -> bool {
        match (&self.original, &self.replacement) {
            (Some(original), Some(replacement)) => {
                original.is_empty() || original == replacement
            }
            _ => true,
        }
    }

    /// `(original, replacement)` for entries the rewriter must act on.
    pub fn change(&self) -> Option<(&str, &str)> {
        if self.is_noop() {
            return None;
        }
        match (&self.original, &self.replacement) {
            (Some(o), Some(r)) => Some((o.as_str(), r.as_str())),
            _ => None,
        }
    }
}

/// Index-ordered result of [`map`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    entries: BTreeMap<usize, ReplacementEntry>,
    warnings: Vec<CoverageWarning>,
}

impl Mapping {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ReplacementEntry> {
        self.entries.get(&index)
    }

    /// Every entry, orphans included, in index order.
    pub fn entries(&self) -> impl Iterator<Item = &ReplacementEntry> {
        self.entries.values()
    }

    /// Entries that target an extracted fragment, in index order.
    pub fn targets(&self) -> impl Iterator<Item = &ReplacementEntry> {
        self.entries.values().filter(|e| !e.is_orphan())
    }

    pub fn orphans(&self) -> impl Iterator<Item = &ReplacementEntry> {
        self.entries.values().filter(|e| e.is_orphan())
    }

    /// Number of entries that will mutate the document if they resolve.
    pub fn change_count(&self) -> usize {
        self.targets().filter(|e| e.change().is_some()).count()
    }

    /// Coverage problems found while joining.
    pub fn warnings(&self) -> &[CoverageWarning] {
        &self.warnings
    }

    /// Build a mapping directly from `(index, original, replacement)` triples,
    /// e.g. when replaying a persisted mapping. Anchors are left empty.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (usize, S, Option<S>)>,
        S: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(index, original, replacement)| {
                (
                    index,
                    ReplacementEntry {
                        index,
                        anchor: None,
                        original: Some(original.into()),
                        replacement: replacement.map(Into::into),
                    },
                )
            })
            .collect();
        Self {
            entries,
            warnings: Vec::new(),
        }
    }
}

/// Join `extracted` with `generated` on `index`.
///
/// Produces exactly one entry per index in `extracted ∪ generated`. When the
/// service repeats an index, the first occurrence wins and a
/// [`CoverageWarning::DuplicateIndex`] is recorded.
pub fn map(extracted: &[Fragment], generated: &[GeneratedFragment]) -> Mapping {
    join(extracted, generated, |_| true)
}

/// Like [`map`], for a service that was only shown `sent`.
///
/// Fragments left out of the request still get an entry with no
/// replacement, but only sent fragments the answer skipped raise
/// [`CoverageWarning::MissingReplacement`].
pub fn map_sent(
    extracted: &[Fragment],
    generated: &[GeneratedFragment],
    sent: &[&Fragment],
) -> Mapping {
    let sent: BTreeSet<usize> = sent.iter().map(|f| f.index).collect();
    join(extracted, generated, |index| sent.contains(&index))
}

fn join(
    extracted: &[Fragment],
    generated: &[GeneratedFragment],
    expected: impl Fn(usize) -> bool,
) -> Mapping {
    let mut returned: BTreeMap<usize, (Option<&str>, usize)> = BTreeMap::new();
    for g in generated {
        returned
            .entry(g.index)
            .and_modify(|(_, count)| *count += 1)
            .or_insert((g.text.as_deref(), 1));
    }

    let mut warnings = Vec::new();
    for (&index, &(_, count)) in &returned {
        if count > 1 {
            warnings.push(CoverageWarning::DuplicateIndex { index, count });
        }
    }

    let mut entries = BTreeMap::new();
    for fragment in extracted {
        let replacement = match returned.get(&fragment.index) {
            Some((text, _)) => text.map(str::to_string),
            None => {
                if expected(fragment.index) {
                    warnings.push(CoverageWarning::MissingReplacement {
                        index: fragment.index,
                    });
                }
                None
            }
        };
        entries.insert(
            fragment.index,
            ReplacementEntry {
                index: fragment.index,
                anchor: Some(fragment.anchor.clone()),
                original: Some(fragment.text.clone()),
                replacement,
            },
        );
    }

    for (&index, &(text, _)) in &returned {
        if entries.contains_key(&index) {
            continue;
        }
        warnings.push(CoverageWarning::Orphan { index });
        entries.insert(
            index,
            ReplacementEntry {
                index,
                anchor: None,
                original: None,
                replacement: text.map(str::to_string),
            },
        );
    }

    Mapping { entries, warnings }
}

/// Keep only the fragments worth sending to the rewriting service.
///
/// Fragments with fewer than `min_chars` alphanumeric characters (bullets,
/// separators, stray punctuation) are left out; the mapper then passes them
/// through unchanged.
pub fn select_for_service(fragments: &[Fragment], min_chars: usize) -> Vec<&Fragment> {
    fragments
        .iter()
        .filter(|f| f.text.chars().filter(|c| c.is_alphanumeric()).count() >= min_chars)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(index: usize, text: &str) -> Fragment {
        Fragment {
            index,
            text: text.to_string(),
            anchor: Anchor::Literal,
        }
    }

    fn gen(index: usize, text: &str) -> GeneratedFragment {
        GeneratedFragment::new(index, text)
    }

    #[test]
    fn one_entry_per_index_in_union() {
        let e = vec![frag(0, "a"), frag(1, "b"), frag(2, "c")];
        let g = vec![gen(1, "B"), gen(2, "C"), gen(7, "ghost")];
        let m = map(&e, &g);

        let indices: Vec<usize> = m.entries().map(|e| e.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 7]);

        assert_eq!(m.get(0).unwrap().status(), EntryStatus::MissingReplacement);
        assert_eq!(m.get(0).unwrap().replacement, None);
        assert_eq!(m.get(1).unwrap().status(), EntryStatus::Matched);
        assert_eq!(m.get(7).unwrap().status(), EntryStatus::Orphan);
        assert_eq!(m.orphans().count(), 1);
        assert_eq!(m.targets().count(), 3);
    }

    #[test]
    fn coverage_warnings_name_both_sides() {
        let m = map(&[frag(0, "a")], &[gen(5, "x")]);
        assert!(m
            .warnings()
            .contains(&CoverageWarning::MissingReplacement { index: 0 }));
        assert!(m.warnings().contains(&CoverageWarning::Orphan { index: 5 }));
    }

    #[test]
    fn duplicate_generated_index_keeps_first() {
        let m = map(&[frag(0, "a")], &[gen(0, "first"), gen(0, "second")]);
        assert_eq!(m.len(), 1);
        assert_eq!(m.get(0).unwrap().replacement.as_deref(), Some("first"));
        assert_eq!(
            m.warnings(),
            &[CoverageWarning::DuplicateIndex { index: 0, count: 2 }]
        );
    }

    #[test]
    fn join_ignores_text_equality() {
        // Same text at two indices, swapped answers: the index decides.
        let e = vec![frag(0, "Rust"), frag(1, "Rust")];
        let g = vec![gen(1, "Go"), gen(0, "Zig")];
        let m = map(&e, &g);
        assert_eq!(m.get(0).unwrap().replacement.as_deref(), Some("Zig"));
        assert_eq!(m.get(1).unwrap().replacement.as_deref(), Some("Go"));
    }

    #[test]
    fn null_text_means_unchanged() {
        let g = vec![GeneratedFragment {
            index: 0,
            text: None,
        }];
        let m = map(&[frag(0, "keep")], &g);
        let entry = m.get(0).unwrap();
        assert!(entry.is_noop());
        assert!(m.warnings().is_empty());
    }

    #[test]
    fn noop_rules() {
        let m = map(
            &[frag(0, "same"), frag(1, ""), frag(2, "old")],
            &[gen(0, "same"), gen(1, "new"), gen(2, "")],
        );
        assert!(m.get(0).unwrap().is_noop());
        assert!(m.get(1).unwrap().is_noop(), "empty original is not a search key");
        assert_eq!(m.get(2).unwrap().change(), Some(("old", "")));
        assert_eq!(m.change_count(), 1);
    }

    #[test]
    fn empty_sides() {
        assert!(map(&[], &[]).is_empty());
        let m = map(&[], &[gen(0, "x")]);
        assert_eq!(m.orphans().count(), 1);
        assert_eq!(m.change_count(), 0);
    }

    #[test]
    fn from_pairs_builds_targets() {
        let m = Mapping::from_pairs([(0, "Senior", Some("Lead")), (1, "x", None)]);
        assert_eq!(m.targets().count(), 2);
        assert_eq!(m.get(0).unwrap().change(), Some(("Senior", "Lead")));
        assert!(m.get(1).unwrap().is_noop());
    }

    #[test]
    fn select_for_service_drops_punctuation() {
        let fs = vec![frag(0, "•"), frag(1, "Rust"), frag(2, "--"), frag(3, "5")];
        let picked: Vec<usize> = select_for_service(&fs, 1).iter().map(|f| f.index).collect();
        assert_eq!(picked, vec![1, 3]);
        assert_eq!(select_for_service(&fs, 0).len(), 4);
    }

    #[test]
    fn fragments_held_back_from_the_service_raise_no_warning() {
        let fs = vec![frag(0, "•"), frag(1, "Rust"), frag(2, "Go")];
        let sent = select_for_service(&fs, 1);
        let m = map_sent(&fs, &[gen(1, "Zig")], &sent);

        assert_eq!(
            m.warnings(),
            &[CoverageWarning::MissingReplacement { index: 2 }]
        );
        assert_eq!(m.get(0).unwrap().replacement, None);
        assert!(m.get(0).unwrap().is_noop());
        assert_eq!(m.targets().count(), 3);
        assert_eq!(m.change_count(), 1);
    }
}
