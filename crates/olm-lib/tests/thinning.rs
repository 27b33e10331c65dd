use olm_lib::thinned_indices;
use proptest::prelude::*;

proptest! {
    #[test]
    fn thinning_keeps_ends_with_bounded_gaps(len in 1usize..60, keep_every in 1usize..8) {
        let kept = thinned_indices(len, keep_every).expect("thin");
        prop_assert_eq!(kept.first().copied(), Some(0));
        prop_assert_eq!(kept.last().copied(), Some(len - 1));
        for pair in kept.windows(2) {
            let gap = pair[1] - pair[0];
            prop_assert!(gap >= 1 && gap <= keep_every);
        }
        // every gap except the one before the last index is exactly keep_every
        if kept.len() > 2 {
            for pair in kept[..kept.len() - 1].windows(2) {
                prop_assert_eq!(pair[1] - pair[0], keep_every);
            }
        }
    }
}
