use alex_core::{Payload, TopicCache};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Barrier};
use std::thread;

const PRODUCERS: usize = 4;
const CONSUMERS: usize = 4;
const WRITES_PER_PRODUCER: usize = 2_000;

fn producer_topic(producer: usize) -> String {
    format!("stress/{producer}/response")
}

fn written_value(producer: usize, index: usize) -> Payload {
    if index % 3 == 0 {
        Payload::Text(format!("raw-{producer}-{index}"))
    } else {
        Payload::Json(json!({
            "producer": producer,
            "index": index,
            "blob": "x".repeat(index % 64),
        }))
    }
}

fn decode_written(payload: &Payload) -> Option<(usize, usize)> {
    match payload {
        Payload::Text(text) => {
            let mut parts = text.strip_prefix("raw-")?.split('-');
            let producer = parts.next()?.parse().ok()?;
            let index = parts.next()?.parse().ok()?;
            Some((producer, index))
        }
        Payload::Json(value) => {
            let producer = value["producer"].as_u64()? as usize;
            let index = value["index"].as_u64()? as usize;
            Some((producer, index))
        }
    }
}

#[test]
fn concurrent_producers_and_consumers_only_see_written_values() {
    let cache = Arc::new(TopicCache::new());
    let barrier = Arc::new(Barrier::new(PRODUCERS + CONSUMERS));
    let mut handles = Vec::new();

    for producer in 0..PRODUCERS {
        let cache = Arc::clone(&cache);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(producer as u64);
            barrier.wait();
            for index in 0..WRITES_PER_PRODUCER {
                cache.set(producer_topic(producer), written_value(producer, index));
                if rng.gen_ratio(1, 8) {
                    thread::yield_now();
                }
            }
        }));
    }

    let mut readers = Vec::new();
    for consumer in 0..CONSUMERS {
        let cache = Arc::clone(&cache);
        let barrier = Arc::clone(&barrier);
        readers.push(thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(1_000 + consumer as u64);
            let mut last_index: HashMap<usize, usize> = HashMap::new();
            let mut reads = 0usize;
            barrier.wait();
            for _ in 0..WRITES_PER_PRODUCER * 2 {
                let producer = rng.gen_range(0..PRODUCERS);
                let Some(payload) = cache.get(&producer_topic(producer)) else {
                    continue;
                };
                let (seen_producer, index) =
                    decode_written(&payload).expect("value was written by a producer");
                assert_eq!(seen_producer, producer, "value crossed topics");
                assert_eq!(payload, written_value(producer, index), "torn value");
                let previous = last_index.insert(producer, index).unwrap_or(0);
                assert!(index >= previous, "went backwards on one topic");
                reads += 1;
                if rng.gen_ratio(1, 4) {
                    thread::yield_now();
                }
            }
            reads
        }));
    }

    for handle in handles {
        handle.join().expect("producer panicked");
    }
    for reader in readers {
        reader.join().expect("consumer panicked");
    }

    for producer in 0..PRODUCERS {
        assert_eq!(
            cache.get(&producer_topic(producer)),
            Some(written_value(producer, WRITES_PER_PRODUCER - 1))
        );
    }
    assert_eq!(cache.len(), PRODUCERS);
    assert_eq!(cache.last_seq(), (PRODUCERS * WRITES_PER_PRODUCER) as u64);
}

#[test]
fn snapshot_during_writes_contains_only_written_values() {
    let cache = Arc::new(TopicCache::new());
    let writer = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || {
            for index in 0..WRITES_PER_PRODUCER {
                cache.set(producer_topic(index % PRODUCERS), written_value(index % PRODUCERS, index));
            }
        })
    };

    for _ in 0..200 {
        for (topic, entry) in cache.snapshot() {
            let (producer, index) = decode_written(&entry.payload).expect("written value");
            assert_eq!(topic, producer_topic(producer));
            assert_eq!(entry.payload, written_value(producer, index));
        }
    }
    writer.join().expect("writer panicked");
    assert_eq!(cache.snapshot().len(), PRODUCERS);
}
