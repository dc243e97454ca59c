//! Comparing fingerprints between the baseline and the candidate revision.

use std::collections::BTreeMap;

use tracing::debug;

/// Project name to fingerprint. `None` records a project whose declared set
/// was never touched by any history entry.
pub type FingerprintMap = BTreeMap<String, Option<String>>;

pub struct ChangeSet;

impl ChangeSet {
    /// The to-do set: every project in `head` whose fingerprint differs from
    /// its baseline value. A project absent from `baseline` is new and always
    /// counts as changed, as does one with no fingerprint at all.
    ///
    /// Pure and deterministic: identical inputs always produce the identical
    /// to-do set, so re-running a comparison is safe.
    pub fn compare(baseline: &FingerprintMap, head: &FingerprintMap) -> Vec<String> {
        let mut todo = Vec::new();
        for (name, fingerprint) in head {
            let changed = match (baseline.get(name), fingerprint) {
                (Some(old), new) if old == new && new.is_some() => false,
                _ => true,
            };
            debug!(project = %name, changed, "compared fingerprints");
            if changed {
                todo.push(name.clone());
            }
        }
        todo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn map(entries: &[(&str, Option<&str>)]) -> FingerprintMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    }

    #[test]
    fn unchanged_fingerprints_are_excluded() {
        let baseline = map(&[("p", Some("aaa")), ("q", Some("bbb"))]);
        let head = map(&[("p", Some("aaa")), ("q", Some("ccc"))]);
        assert_eq!(ChangeSet::compare(&baseline, &head), vec!["q".to_string()]);
    }

    #[test]
    fn new_project_is_always_changed() {
        let baseline = map(&[("p", Some("aaa"))]);
        let head = map(&[("p", Some("aaa")), ("fresh", Some("ddd"))]);
        assert_eq!(
            ChangeSet::compare(&baseline, &head),
            vec!["fresh".to_string()]
        );
    }

    #[test]
    fn missing_fingerprint_counts_as_changed() {
        let baseline = map(&[("p", None)]);
        let head = map(&[("p", None)]);
        // No history entry ever touched the declared set on either side; we
        // cannot prove it unchanged, so it must be built.
        assert_eq!(ChangeSet::compare(&baseline, &head), vec!["p".to_string()]);
    }

    #[test]
    fn compare_is_idempotent() {
        let baseline = map(&[("a", Some("1")), ("b", Some("2")), ("c", None)]);
        let head = map(&[("a", Some("1")), ("b", Some("9")), ("c", None)]);
        let first = ChangeSet::compare(&baseline, &head);
        let second = ChangeSet::compare(&baseline, &head);
        assert_eq!(first, second);
        assert_eq!(first, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn empty_head_produces_empty_todo() {
        let baseline = map(&[("p", Some("aaa"))]);
        assert!(ChangeSet::compare(&baseline, &FingerprintMap::new()).is_empty());
    }
}
