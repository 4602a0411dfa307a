//! Property-based tests for the core invariants.

use proptest::prelude::*;
use std::sync::Arc;

use crate::claim_strategy::{ClaimStrategy, MultiProducerClaim, SingleProducerClaim};
use crate::ring_buffer::RingBuffer;
use crate::sequence::Sequence;

mod sequence_properties {
    use super::*;

    proptest! {
        #[test]
        fn set_then_get_round_trips(value in any::<i64>()) {
            let seq = Sequence::new(0);
            seq.set(value);
            prop_assert_eq!(seq.get(), value);
        }

        #[test]
        fn increment_and_get_accumulates(initial in -1000i64..1000, deltas in prop::collection::vec(1i64..100, 1..50)) {
            let seq = Sequence::new(initial);
            let mut expected = initial;
            for delta in deltas {
                expected += delta;
                prop_assert_eq!(seq.increment_and_get(delta), expected);
            }
            prop_assert_eq!(seq.get(), expected);
        }

        #[test]
        fn compare_and_set_only_from_expected(initial in any::<i64>(), wrong in any::<i64>(), new in any::<i64>()) {
            prop_assume!(wrong != initial);
            let seq = Sequence::new(initial);
            prop_assert!(!seq.compare_and_set(wrong, new));
            prop_assert_eq!(seq.get(), initial);
            prop_assert!(seq.compare_and_set(initial, new));
            prop_assert_eq!(seq.get(), new);
        }
    }
}

mod ring_buffer_properties {
    use super::*;

    proptest! {
        #[test]
        fn masked_indexing_wraps(size_power in 1u32..10, sequence in 0i64..1_000_000, value in any::<i64>()) {
            let size = 1usize << size_power;
            let ring = RingBuffer::<i64>::new(size).unwrap();

            unsafe { *ring.get_mut_unchecked(sequence) = value };
            prop_assert_eq!(*ring.get(sequence), value);
            // The same slot one lap later.
            prop_assert_eq!(*ring.get(sequence + size as i64), value);
        }

        #[test]
        fn non_power_of_two_rejected(size in 1usize..4096) {
            prop_assume!(!crate::is_power_of_two(size));
            prop_assert!(RingBuffer::<i64>::new(size).is_err());
        }
    }
}

mod claim_properties {
    use super::*;

    proptest! {
        #[test]
        fn single_producer_claims_strictly_increase(
            size_power in 1u32..10,
            requests in prop::collection::vec(1i64..8, 1..30)
        ) {
            let size = 1usize << size_power;
            let claim = SingleProducerClaim::new(size);
            // Consumer that keeps pace, so claims never block.
            let gate = Arc::new(Sequence::default());
            claim.set_gating_sequences(vec![Arc::clone(&gate)]);

            let mut last = -1i64;
            for n in requests {
                if let Ok(seq) = claim.try_claim_n(n) {
                    prop_assert!(seq > last);
                    claim.publish(last + 1, seq);
                    gate.set(seq);
                    last = seq;
                }
            }
        }

        #[test]
        fn capacity_never_exceeded(
            size_power in 1u32..8,
            requests in prop::collection::vec(1i64..4, 1..40)
        ) {
            let size = 1usize << size_power;
            let claim = SingleProducerClaim::new(size);
            let gate = Arc::new(Sequence::default());
            claim.set_gating_sequences(vec![Arc::clone(&gate)]);

            let mut highest = -1i64;
            for n in requests {
                if let Ok(seq) = claim.try_claim_n(n) {
                    highest = seq;
                }
                // A granted claim never runs more than one lap ahead of
                // the gate.
                prop_assert!(highest - gate.get() <= size as i64);
            }
        }

        #[test]
        fn multi_producer_publish_order_is_irrelevant(
            size_power in 2u32..8,
            count in 1i64..8
        ) {
            let size = 1usize << size_power;
            let claim = MultiProducerClaim::new(size);

            let high = claim.try_claim_n(count).unwrap();
            // Publish in reverse; the contiguous prefix still reaches the
            // top once all are in.
            for seq in (0..=high).rev() {
                claim.publish(seq, seq);
            }
            prop_assert_eq!(claim.highest_published(0, high), high);
        }
    }
}
