use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use crate::domain::EntityKind;
use crate::error::GraphError;
use crate::kegg::KeggClient;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::record::FlatRecord;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSettings {
    pub chunk_size: usize,
    pub workers: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            workers: 1,
        }
    }
}

pub type FetchOutcome = Result<FlatRecord, GraphError>;

#[derive(Debug)]
pub struct FetchedChunk {
    /// 1-based.
    pub index: usize,
    pub total: usize,
    pub results: Vec<(String, FetchOutcome)>,
}

impl FetchedChunk {
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|(_, result)| result.is_err()).count()
    }
}

pub struct FetchDriver<'a, C: KeggClient> {
    client: &'a C,
    settings: FetchSettings,
    cancel: CancelToken,
    sink: &'a dyn ProgressSink,
}

impl<'a, C: KeggClient> FetchDriver<'a, C> {
    pub fn new(
        client: &'a C,
        settings: FetchSettings,
        cancel: CancelToken,
        sink: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            client,
            settings: FetchSettings {
                chunk_size: settings.chunk_size.max(1),
                workers: settings.workers.max(1),
            },
            cancel,
            sink,
        }
    }

    pub fn settings(&self) -> FetchSettings {
        self.settings
    }

    pub fn chunks<'d>(
        &'d self,
        stage: impl fmt::Display,
        kind: EntityKind,
        ids: &'d [String],
    ) -> ChunkIter<'d, 'a, C> {
        let total = ids.len().div_ceil(self.settings.chunk_size);
        ChunkIter {
            driver: self,
            stage: stage.to_string(),
            kind,
            chunks: ids.chunks(self.settings.chunk_size),
            index: 0,
            total,
            done: false,
        }
    }

    fn fetch_chunk(&self, kind: EntityKind, ids: &[String]) -> Vec<(String, FetchOutcome)> {
        let workers = self.settings.workers.min(ids.len()).max(1);
        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel::<(usize, FetchOutcome)>();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                scope.spawn(move || {
                    loop {
                        let idx = next.fetch_add(1, Ordering::SeqCst);
                        let Some(id) = ids.get(idx) else {
                            break;
                        };
                        let outcome = if self.cancel.is_cancelled() {
                            Err(GraphError::Cancelled)
                        } else {
                            self.client.fetch(kind, id)
                        };
                        if tx.send((idx, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(tx);

        let mut slots: Vec<Option<FetchOutcome>> = ids.iter().map(|_| None).collect();
        for (idx, outcome) in rx {
            slots[idx] = Some(outcome);
        }

        ids.iter()
            .cloned()
            .zip(slots)
            .map(|(id, slot)| (id, slot.unwrap_or(Err(GraphError::Cancelled))))
            .collect()
    }
}

pub struct ChunkIter<'d, 'a, C: KeggClient> {
    driver: &'d FetchDriver<'a, C>,
    stage: String,
    kind: EntityKind,
    chunks: std::slice::Chunks<'d, String>,
    index: usize,
    total: usize,
    done: bool,
}

impl<C: KeggClient> Iterator for ChunkIter<'_, '_, C> {
    type Item = Result<FetchedChunk, GraphError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.driver.cancel.is_cancelled() {
            self.done = true;
            return Some(Err(GraphError::Cancelled));
        }
        let ids = self.chunks.next()?;
        self.index += 1;
        self.driver.sink.event(ProgressEvent::info(
            &self.stage,
            format!(
                "Working on {} chunk {} of {} ({} ids)",
                self.kind,
                self.index,
                self.total,
                ids.len()
            ),
        ));

        let results = self.driver.fetch_chunk(self.kind, ids);
        if self.driver.cancel.is_cancelled() {
            self.done = true;
            return Some(Err(GraphError::Cancelled));
        }

        Some(Ok(FetchedChunk {
            index: self.index,
            total: self.total,
            results,
        }))
    }
}
