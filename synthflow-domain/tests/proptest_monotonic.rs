//! Property-based tests for version allocation.
//!
//! These verify spec-level guarantees:
//! - Allocated tags never decrease relative to any prior tag for the target.
//! - Allocation is deterministic for identical inputs.
//! - Promotion is idempotent.

use proptest::prelude::*;
use synthflow_domain::VersionAllocator;
use synthflow_types::version::{BumpLevel, VersionTag};

fn arb_level() -> impl Strategy<Value = BumpLevel> {
    prop_oneof![
        Just(BumpLevel::Patch),
        Just(BumpLevel::Minor),
        Just(BumpLevel::Major),
    ]
}

fn arb_official() -> impl Strategy<Value = VersionTag> {
    (0u32..20, 0u32..20, 0u32..20)
        .prop_map(|(major, minor, patch)| VersionTag::official(major, minor, patch))
}

proptest! {
    #[test]
    fn allocation_is_monotonic_and_deterministic(
        official in arb_official(),
        level in arb_level(),
        recent_level in arb_level(),
        recent_trial in 0u32..5,
        recent_origin in 1u64..100,
        recent_is_provisional in any::<bool>(),
        request_id in 1u64..1000,
    ) {
        // The most recent tag is either the last official itself or a
        // provisional trial derived from some bump of it.
        let recent = if recent_is_provisional {
            let mut tag = official.bump(recent_level).with_origin(recent_origin);
            tag.trial = recent_trial;
            tag
        } else {
            official.clone()
        };

        let first = VersionAllocator::allocate(
            Some(&recent), Some(&official), level, request_id,
        );
        let second = VersionAllocator::allocate(
            Some(&recent), Some(&official), level, request_id,
        );

        // Deterministic.
        prop_assert_eq!(&first, &second);

        // Never below the official baseline's bump floor.
        prop_assert!(first.base() >= official.bump(level).base());

        // Strictly above the most recent provisional tag of the same target.
        if recent.is_provisional() && recent.base() >= official.bump(level).base() {
            prop_assert!(first > recent, "{} should exceed {}", first, recent);
        }

        // The allocated tag is provisional and tied to the triggering event.
        prop_assert_eq!(first.origin, Some(request_id));

        // Promotion is idempotent and official outranks the trial.
        let promoted = first.promoted();
        prop_assert_eq!(promoted.promoted(), promoted.clone());
        prop_assert!(promoted > first);
    }
}
