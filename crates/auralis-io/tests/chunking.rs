//! Property tests for the chunk planner.

use auralis_io::plan_chunks;
use proptest::prelude::*;

proptest! {
    /// Descriptors tile [0, total) contiguously with no gaps or overlaps,
    /// for any track length and any legal configuration.
    #[test]
    fn plan_tiles_exactly(
        total in 0u64..50_000_000,
        sample_rate in prop::sample::select(vec![8000u32, 22050, 44100, 48000, 96000]),
        chunk_seconds in 1.0f64..30.0,
        overlap_ratio in 0.01f64..0.49,
    ) {
        let overlap_seconds = chunk_seconds * overlap_ratio;
        let plan = plan_chunks(total, sample_rate, chunk_seconds, overlap_seconds).unwrap();

        if total == 0 {
            prop_assert!(plan.is_empty());
        } else {
            prop_assert_eq!(plan[0].start_sample, 0);
            prop_assert_eq!(plan.last().unwrap().end_sample, total);
            let covered: u64 = plan.iter().map(|d| d.len()).sum();
            prop_assert_eq!(covered, total);
            for pair in plan.windows(2) {
                prop_assert_eq!(pair[0].end_sample, pair[1].start_sample);
            }
            for d in &plan {
                prop_assert!(d.len() > 0);
            }
        }
    }

    /// Illegal overlap configurations are rejected, never silently fixed.
    #[test]
    fn illegal_overlap_rejected(
        chunk_seconds in 1.0f64..30.0,
        excess in 0.0f64..2.0,
    ) {
        let overlap = chunk_seconds / 2.0 + excess;
        prop_assert!(plan_chunks(441_000, 44100, chunk_seconds, overlap).is_err());
    }
}
