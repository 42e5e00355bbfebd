use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use assert_matches::assert_matches;

use kegg_graph::domain::EntityKind;
use kegg_graph::error::GraphError;
use kegg_graph::fetch::{CancelToken, FetchDriver, FetchSettings};
use kegg_graph::kegg::KeggClient;
use kegg_graph::progress::{NoopSink, RecordingSink};
use kegg_graph::record::FlatRecord;

#[derive(Default)]
struct SlowClient {
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    failing: Vec<String>,
    cancel_on: Option<(String, CancelToken)>,
}

impl SlowClient {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl KeggClient for SlowClient {
    fn fetch(&self, _kind: EntityKind, id: &str) -> Result<FlatRecord, GraphError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(id.to_string());

        // Later ids finish first so completion order differs from dispatch order.
        let delay = 30u64.saturating_sub(id[1..].parse::<u64>().unwrap_or(0) * 3);
        thread::sleep(Duration::from_millis(delay));

        if let Some((trigger, cancel)) = &self.cancel_on {
            if trigger == id {
                cancel.cancel();
            }
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.iter().any(|failing| failing == id) {
            return Err(GraphError::KeggStatus {
                status: 404,
                message: format!("{id} not found"),
            });
        }
        let mut record = FlatRecord::default();
        record.push(Some("ENTRY"), id);
        Ok(record)
    }
}

fn ids(count: usize) -> Vec<String> {
    (1..=count).map(|n| format!("R{n}")).collect()
}

fn settings(chunk_size: usize, workers: usize) -> FetchSettings {
    FetchSettings {
        chunk_size,
        workers,
    }
}

#[test]
fn results_keep_dispatch_order() {
    let client = SlowClient::default();
    let driver = FetchDriver::new(&client, settings(5, 4), CancelToken::new(), &NoopSink);
    let ids = ids(9);

    let mut seen = Vec::new();
    let mut indexes = Vec::new();
    for chunk in driver.chunks("FetchReactions", EntityKind::Reaction, &ids) {
        let chunk = chunk.unwrap();
        assert_eq!(chunk.total, 2);
        indexes.push(chunk.index);
        for (id, result) in chunk.results {
            let record = result.unwrap();
            assert_eq!(record.field("ENTRY").first(), Some(id.as_str()));
            seen.push(id);
        }
    }
    assert_eq!(seen, ids);
    assert_eq!(indexes, vec![1, 2]);
}

#[test]
fn never_exceeds_worker_count() {
    let client = SlowClient::default();
    let driver = FetchDriver::new(&client, settings(8, 3), CancelToken::new(), &NoopSink);
    let ids = ids(8);
    for chunk in driver.chunks("FetchOrthologs", EntityKind::Ortholog, &ids) {
        chunk.unwrap();
    }
    let peak = client.peak.load(Ordering::SeqCst);
    assert!((1..=3).contains(&peak), "peak concurrency {peak}");
    assert_eq!(client.calls().len(), 8);
}

#[test]
fn single_worker_runs_sequentially() {
    let client = SlowClient::default();
    let driver = FetchDriver::new(&client, settings(4, 1), CancelToken::new(), &NoopSink);
    let ids = ids(4);
    for chunk in driver.chunks("FetchOrthologs", EntityKind::Ortholog, &ids) {
        chunk.unwrap();
    }
    assert_eq!(client.peak.load(Ordering::SeqCst), 1);
    assert_eq!(client.calls(), ids);
}

#[test]
fn failures_stay_with_their_id() {
    let client = SlowClient {
        failing: vec!["R2".to_string(), "R5".to_string()],
        ..SlowClient::default()
    };
    let driver = FetchDriver::new(&client, settings(10, 2), CancelToken::new(), &NoopSink);
    let ids = ids(6);
    let chunk = driver
        .chunks("FetchReactions", EntityKind::Reaction, &ids)
        .next()
        .unwrap()
        .unwrap();

    assert_eq!(chunk.failures(), 2);
    for (id, result) in &chunk.results {
        if id == "R2" || id == "R5" {
            assert_matches!(result, Err(GraphError::KeggStatus { status: 404, .. }));
        } else {
            assert!(result.is_ok(), "{id} should have succeeded");
        }
    }
}

#[test]
fn chunks_are_fetched_on_demand() {
    let client = SlowClient::default();
    let sink = RecordingSink::default();
    let driver = FetchDriver::new(&client, settings(3, 2), CancelToken::new(), &sink);
    let ids = ids(7);
    let mut chunks = driver.chunks("FetchPathways", EntityKind::Pathway, &ids);

    assert!(client.calls().is_empty());
    let first = chunks.next().unwrap().unwrap();
    assert_eq!(first.results.len(), 3);
    assert_eq!(client.calls().len(), 3);

    let rest: Vec<_> = chunks.map(|chunk| chunk.unwrap()).collect();
    assert_eq!(rest.len(), 2);
    assert_eq!(rest[1].results.len(), 1);
    assert_eq!(client.calls().len(), 7);

    let progress: Vec<_> = sink
        .events()
        .into_iter()
        .filter(|event| event.message.starts_with("Working on"))
        .collect();
    assert_eq!(progress.len(), 3);
    assert!(progress[2].message.contains("pathway chunk 3 of 3"));
    assert!(progress.iter().all(|event| event.stage == "FetchPathways"));
}

#[test]
fn cancellation_stops_before_the_next_chunk() {
    let cancel = CancelToken::new();
    let client = SlowClient {
        cancel_on: Some(("R3".to_string(), cancel.clone())),
        ..SlowClient::default()
    };
    let driver = FetchDriver::new(&client, settings(2, 1), cancel, &NoopSink);
    let ids = ids(6);
    let mut chunks = driver.chunks("FetchReactions", EntityKind::Reaction, &ids);

    assert_matches!(chunks.next(), Some(Ok(chunk)) if chunk.index == 1);
    assert_matches!(chunks.next(), Some(Err(GraphError::Cancelled)));
    assert!(chunks.next().is_none());

    let calls = client.calls();
    assert!(!calls.contains(&"R5".to_string()));
    assert!(!calls.contains(&"R6".to_string()));
}

#[test]
fn zero_settings_are_clamped() {
    let client = SlowClient::default();
    let driver = FetchDriver::new(&client, settings(0, 0), CancelToken::new(), &NoopSink);
    assert_eq!(driver.settings(), settings(1, 1));
    let ids = ids(2);
    assert_eq!(driver.chunks("FetchModules", EntityKind::Module, &ids).count(), 2);
}
