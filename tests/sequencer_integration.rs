//! End-to-end producer/consumer scenarios over the raw sequencer API.

use spindle::{Sequence, Sequencer};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Single producer, single consumer: every value arrives exactly once and
/// in order, and the consumer's sequence ends on the last index.
#[test]
fn test_spsc_sum_over_small_ring() {
    const ROUNDS: i64 = 1000;

    let sequencer: Arc<Sequencer<i64>> = Arc::new(Sequencer::new(16).unwrap());
    let consumer_seq = Arc::new(Sequence::default());
    sequencer.set_gating_sequences(vec![Arc::clone(&consumer_seq)]);

    let consumer = {
        let sequencer = Arc::clone(&sequencer);
        let consumer_seq = Arc::clone(&consumer_seq);
        thread::spawn(move || {
            let barrier = sequencer.new_barrier(vec![]);
            let mut idx = -1i64;
            let mut sum = 0i64;
            let mut previous = -1i64;
            while idx < ROUNDS - 1 {
                let cursor = barrier.wait_for(idx + 1).unwrap();
                for i in idx + 1..=cursor {
                    let value = *sequencer.get(i);
                    assert_eq!(value, i, "value must equal its index");
                    assert_eq!(i, previous + 1, "no index skipped or repeated");
                    previous = i;
                    sum += value;
                }
                idx = cursor;
                consumer_seq.set(idx);
            }
            sum
        })
    };

    for value in 0..ROUNDS {
        let idx = sequencer.claim();
        sequencer.write(idx, value);
        sequencer.publish(idx);
    }

    assert_eq!(consumer.join().unwrap(), 499_500);
    assert_eq!(consumer_seq.get(), ROUNDS - 1);
}

/// Two independent consumers of the same producer each see the full
/// stream.
#[test]
fn test_two_consumer_fan_out() {
    const ROUNDS: i64 = 1000;

    let sequencer: Arc<Sequencer<i64>> = Arc::new(Sequencer::new(16).unwrap());
    let sum_seq = Arc::new(Sequence::default());
    let squares_seq = Arc::new(Sequence::default());
    sequencer.set_gating_sequences(vec![Arc::clone(&sum_seq), Arc::clone(&squares_seq)]);

    let spawn_consumer = |own_seq: Arc<Sequence>, square: bool| {
        let sequencer = Arc::clone(&sequencer);
        thread::spawn(move || {
            let barrier = sequencer.new_barrier(vec![]);
            let mut idx = -1i64;
            let mut acc = 0i64;
            while idx < ROUNDS - 1 {
                let cursor = barrier.wait_for(idx + 1).unwrap();
                for i in idx + 1..=cursor {
                    let v = *sequencer.get(i);
                    acc += if square { v * v } else { v };
                }
                idx = cursor;
                own_seq.set(idx);
            }
            acc
        })
    };

    let sums = spawn_consumer(Arc::clone(&sum_seq), false);
    let squares = spawn_consumer(Arc::clone(&squares_seq), true);

    for value in 0..ROUNDS {
        let idx = sequencer.claim();
        sequencer.write(idx, value);
        sequencer.publish(idx);
    }

    assert_eq!(sums.join().unwrap(), 499_500);
    assert_eq!(squares.join().unwrap(), 332_833_500);
}

/// Four producers share one ring; the consumer sees each value exactly
/// once and never observes a gap in the published prefix.
#[test]
fn test_multi_producer_collects_every_value_once() {
    const PRODUCERS: i64 = 4;
    const PER_PRODUCER: i64 = 250;
    const TOTAL: i64 = PRODUCERS * PER_PRODUCER;

    let sequencer: Arc<Sequencer<i64>> = Arc::new(Sequencer::multi_producer(64).unwrap());
    let consumer_seq = Arc::new(Sequence::default());
    sequencer.set_gating_sequences(vec![Arc::clone(&consumer_seq)]);

    let consumer = {
        let sequencer = Arc::clone(&sequencer);
        let consumer_seq = Arc::clone(&consumer_seq);
        thread::spawn(move || {
            let barrier = sequencer.new_barrier(vec![]);
            let mut idx = -1i64;
            let mut seen: HashMap<i64, usize> = HashMap::new();
            while idx < TOTAL - 1 {
                let cursor = barrier.wait_for(idx + 1).unwrap();
                // The barrier only ever hands out contiguously published
                // prefixes, so every index in the range is readable.
                for i in idx + 1..=cursor {
                    *seen.entry(*sequencer.get(i)).or_default() += 1;
                }
                if cursor > idx {
                    idx = cursor;
                    consumer_seq.set(idx);
                }
            }
            seen
        })
    };

    let mut producers = Vec::new();
    for p in 0..PRODUCERS {
        let sequencer = Arc::clone(&sequencer);
        producers.push(thread::spawn(move || {
            for i in 0..PER_PRODUCER {
                let value = p * PER_PRODUCER + i;
                let idx = sequencer.claim();
                sequencer.write(idx, value);
                sequencer.publish(idx);
            }
        }));
    }
    for producer in producers {
        producer.join().unwrap();
    }

    let seen = consumer.join().unwrap();
    assert_eq!(seen.len() as i64, TOTAL, "exactly {TOTAL} distinct values");
    for value in 0..TOTAL {
        assert_eq!(seen.get(&value), Some(&1), "value {value} seen once");
    }
    assert_eq!(consumer_seq.get(), TOTAL - 1);
}

/// A timed wait with no producer returns within roughly the timeout, with
/// a value below the requested target.
#[test]
fn test_wait_for_timeout_liveness() {
    let sequencer: Sequencer<i64> = Sequencer::new(8).unwrap();
    let barrier = sequencer.new_barrier(vec![]);

    let start = Instant::now();
    let observed = barrier
        .wait_for_timeout(1, Duration::from_millis(5))
        .unwrap();
    let elapsed = start.elapsed();

    assert!(observed < 1);
    assert!(
        elapsed >= Duration::from_millis(5),
        "returned before the timeout: {elapsed:?}"
    );
    assert!(
        elapsed < Duration::from_millis(250),
        "timeout overshot: {elapsed:?}"
    );
}

/// Batch claims publish as a range and readers observe the whole batch at
/// once.
#[test]
fn test_batch_claim_and_publish_range() {
    let sequencer: Sequencer<i64> = Sequencer::new(32).unwrap();
    let consumer_seq = Arc::new(Sequence::default());
    sequencer.set_gating_sequences(vec![Arc::clone(&consumer_seq)]);

    let high = sequencer.claim_n(8);
    assert_eq!(high, 7);
    for idx in 0..=high {
        sequencer.write(idx, idx * 2);
    }
    sequencer.publish_range(0, high);

    let barrier = sequencer.new_barrier(vec![]);
    assert_eq!(barrier.wait_for(high).unwrap(), high);
    for idx in 0..=high {
        assert_eq!(*sequencer.get(idx), idx * 2);
    }
}
