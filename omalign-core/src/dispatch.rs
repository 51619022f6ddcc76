//! Multi-worker query dispatch
//!
//! Each worker thread owns a clone of the aligner and pulls queries from a
//! bounded job queue. Outcomes come back in completion order, tagged with
//! the ticket handed out at submission. A query that fails or panics still
//! yields exactly one (empty) outcome.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use rayon::prelude::*;

use crate::error::{AlignError, AlignResult};
use crate::mapper::OpticalMapAligner;
use crate::types::{AlignmentRecord, DataMolecule, Region};

struct QueryJob {
    ticket: u64,
    query: DataMolecule,
    regions: Option<Vec<Region>>,
}

/// Records of one submitted query
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub ticket: u64,
    pub query_name: String,
    pub records: Vec<AlignmentRecord>,
    /// Alignment raised an error or panicked; `records` is empty
    pub failed: bool,
}

pub struct WorkerPool {
    jobs: Option<Sender<QueryJob>>,
    results: Receiver<QueryOutcome>,
    workers: Vec<JoinHandle<()>>,
    next_ticket: u64,
    pending: usize,
}

impl WorkerPool {
    /// Pool sized by the aligner's `threads` and `queue_capacity`.
    pub fn new(aligner: &OpticalMapAligner) -> AlignResult<Self> {
        let params = aligner.params();
        Self::with_threads(aligner, params.threads, params.queue_capacity)
    }

    pub fn with_threads(
        aligner: &OpticalMapAligner,
        threads: usize,
        capacity: usize,
    ) -> AlignResult<Self> {
        if threads == 0 || capacity == 0 {
            return Err(AlignError::WorkerPool(format!(
                "need at least one worker and one queue slot (threads {}, capacity {})",
                threads, capacity
            )));
        }

        let (job_tx, job_rx) = bounded::<QueryJob>(capacity);
        let (result_tx, result_rx) = unbounded::<QueryOutcome>();

        let mut workers = Vec::with_capacity(threads);
        for id in 0..threads {
            let aligner = aligner.clone();
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("omalign-worker-{}", id))
                .spawn(move || run_worker(aligner, jobs, results))
                .map_err(|e| {
                    AlignError::WorkerPool(format!("failed to spawn worker {}: {}", id, e))
                })?;
            workers.push(handle);
        }

        log::info!("Started {} alignment workers (queue capacity {})", threads, capacity);

        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            workers,
            next_ticket: 0,
            pending: 0,
        })
    }

    /// Queue a query; blocks while the queue is full. Returns its ticket.
    pub fn submit(
        &mut self,
        query: DataMolecule,
        regions: Option<Vec<Region>>,
    ) -> AlignResult<u64> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| AlignError::WorkerPool("pool already finished".to_string()))?;

        let ticket = self.next_ticket;
        jobs.send(QueryJob { ticket, query, regions })
            .map_err(|_| AlignError::WorkerPool("all workers have exited".to_string()))?;
        self.next_ticket += 1;
        self.pending += 1;
        Ok(ticket)
    }

    /// Next finished query, blocking until one is available. `None` once
    /// every submission has been returned.
    pub fn recv(&mut self) -> Option<QueryOutcome> {
        if self.pending == 0 {
            return None;
        }
        let outcome = self.results.recv().ok()?;
        self.pending -= 1;
        Some(outcome)
    }

    /// Next finished query if one is ready.
    pub fn try_recv(&mut self) -> Option<QueryOutcome> {
        let outcome = self.results.try_recv().ok()?;
        self.pending -= 1;
        Some(outcome)
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Close the queue, collect every outstanding outcome and stop the workers.
    pub fn finish(mut self) -> AlignResult<Vec<QueryOutcome>> {
        self.jobs = None;

        let mut outcomes = Vec::with_capacity(self.pending);
        while let Some(outcome) = self.recv() {
            outcomes.push(outcome);
        }
        if self.pending > 0 {
            return Err(AlignError::WorkerPool(format!(
                "{} queries lost: workers exited early",
                self.pending
            )));
        }

        self.join_workers();
        Ok(outcomes)
    }

    fn join_workers(&mut self) {
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Alignment worker terminated abnormally");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.jobs = None;
        self.join_workers();
    }
}

fn run_worker(aligner: OpticalMapAligner, jobs: Receiver<QueryJob>, results: Sender<QueryOutcome>) {
    for job in jobs {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            aligner.align(&job.query, job.regions.as_deref())
        }));

        let (records, failed) = match outcome {
            Ok(Ok(records)) => (records, false),
            Ok(Err(e)) => {
                log::warn!("Query {} failed: {}", job.query.name, e);
                (Vec::new(), true)
            }
            Err(_) => {
                log::error!("Query {} panicked during alignment", job.query.name);
                (Vec::new(), true)
            }
        };

        let outcome = QueryOutcome {
            ticket: job.ticket,
            query_name: job.query.name,
            records,
            failed,
        };
        if results.send(outcome).is_err() {
            break;
        }
    }
}

/// Run every query through a fresh pool. Outcomes are in completion order.
pub fn align_all(
    aligner: &OpticalMapAligner,
    queries: impl IntoIterator<Item = DataMolecule>,
) -> AlignResult<Vec<QueryOutcome>> {
    let mut pool = WorkerPool::new(aligner)?;
    for query in queries {
        pool.submit(query, None)?;
    }
    pool.finish()
}

/// Data-parallel alternative to the pool; records are in input order and a
/// failed query contributes an empty list.
pub fn align_batch(
    aligner: &OpticalMapAligner,
    queries: &[DataMolecule],
) -> Vec<Vec<AlignmentRecord>> {
    queries
        .par_iter()
        .map_init(
            || aligner.clone(),
            |aligner, query| match aligner.align(query, None) {
                Ok(records) => records,
                Err(e) => {
                    log::warn!("Query {} failed: {}", query.name, e);
                    Vec::new()
                }
            },
        )
        .collect()
}
