//! The version allocation state machine.

use synthflow_types::version::{BumpLevel, VersionTag};
use tracing::warn;

use crate::ports::HistoryView;

/// Allocates the next version tag for a merge-request target.
///
/// Guarantee: allocated tags are monotonically non-decreasing per target no
/// matter how many times a request is rebuilt, and promotion to official is
/// idempotent.
pub struct VersionAllocator;

impl VersionAllocator {
    /// Decide the next provisional tag from the two known prior tags.
    ///
    /// `recent` is the most recent tag of any kind; `last_official` the most
    /// recent official one ( `v0.0.0` baseline when absent). `level` comes
    /// from the request title, `request_id` from the triggering event.
    pub fn allocate(
        recent: Option<&VersionTag>,
        last_official: Option<&VersionTag>,
        level: BumpLevel,
        request_id: u64,
    ) -> VersionTag {
        let last_official = last_official.unwrap_or(&VersionTag::ZERO);
        // The official version this merge request is building toward.
        let candidate = last_official.bump(level);

        if let Some(recent) = recent {
            if recent.is_provisional() && recent.base() >= candidate.base() {
                // Same target: another trial of the existing provisional tag.
                let mut tag = recent.next_trial();
                if recent.origin != Some(request_id) {
                    // The triggering event is authoritative, not history.
                    warn!(
                        history_origin = ?recent.origin,
                        event_origin = request_id,
                        "provisional tag origin disagrees with triggering event, overwriting"
                    );
                    tag.origin = Some(request_id);
                }
                return tag;
            }
        }

        candidate.with_origin(request_id)
    }

    /// Convenience wrapper reading both prior tags from history.
    pub fn allocate_from(
        history: &dyn HistoryView,
        level: BumpLevel,
        request_id: u64,
    ) -> anyhow::Result<VersionTag> {
        let recent = history.latest_tag()?;
        let last_official = history.latest_official_tag()?;
        Ok(Self::allocate(
            recent.as_ref(),
            last_official.as_ref(),
            level,
            request_id,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn first_trial_bumps_from_last_official() {
        // Scenario: minor-bump title, prior official v1.2.0, no provisional.
        let official = VersionTag::official(1, 2, 0);
        let tag = VersionAllocator::allocate(
            Some(&official),
            Some(&official),
            BumpLevel::Minor,
            42,
        );
        assert_eq!(tag.to_string(), "mr42-v1.3.0.0");
        assert_eq!(tag.promoted().to_string(), "v1.3.0");
    }

    #[test]
    fn rebuild_increments_trial() {
        // Scenario: same request rebuilt before merge.
        let official = VersionTag::official(1, 2, 0);
        let trial0 = VersionTag::official(1, 3, 0).with_origin(42);
        let tag = VersionAllocator::allocate(
            Some(&trial0),
            Some(&official),
            BumpLevel::Minor,
            42,
        );
        assert_eq!(tag.to_string(), "mr42-v1.3.0.1");
    }

    #[test]
    fn origin_mismatch_is_overwritten_with_event_id() {
        let official = VersionTag::official(1, 2, 0);
        let foreign = VersionTag::official(1, 3, 0).with_origin(7);
        let tag =
            VersionAllocator::allocate(Some(&foreign), Some(&official), BumpLevel::Minor, 42);
        assert_eq!(tag.origin, Some(42));
        assert_eq!(tag.trial, 1);
    }

    #[test]
    fn stale_provisional_below_target_is_ignored() {
        // A leftover provisional for an older target must not leak its trial
        // counter into the new target.
        let official = VersionTag::official(1, 2, 0);
        let stale = VersionTag::official(1, 2, 1).with_origin(7).next_trial();
        let tag =
            VersionAllocator::allocate(Some(&stale), Some(&official), BumpLevel::Minor, 42);
        assert_eq!(tag.to_string(), "mr42-v1.3.0.0");
    }

    #[test]
    fn empty_history_starts_from_zero_baseline() {
        let tag = VersionAllocator::allocate(None, None, BumpLevel::Patch, 5);
        assert_eq!(tag.to_string(), "mr5-v0.0.1.0");
    }

    #[test]
    fn allocation_never_goes_backwards() {
        let official = VersionTag::official(2, 0, 0);
        for level in [BumpLevel::Patch, BumpLevel::Minor, BumpLevel::Major] {
            let tag = VersionAllocator::allocate(Some(&official), Some(&official), level, 9);
            assert!(tag > official.with_origin(9), "{tag} vs baseline");
        }
    }
}
