//! Parallel evaluation of a fitted RBF field.
//!
//! The sum `sum_i C[i] * phi(|q - P[i]|)` is split over the **source**
//! dimension: sources are cut into fixed-size chunks (100 by default) that sit
//! in a shared work queue. Each worker pops chunks until the queue is empty,
//! accumulating its own m x 3 partial sum, and hands that partial to the
//! coordinator over a completion channel. The coordinator waits for every
//! worker, then adds the partials together.
//!
//! Source points, coefficients and query points are only read while workers
//! run. The queue is the only state shared between workers.
//!
//! Results agree with [`evaluate`](crate::rbf::evaluate) up to floating-point
//! summation order.

use crate::rbf::{RadialBasis, RbfFit};
use crate::{MorphError, MorphResult};
use nalgebra::{Point3, Vector3};
use std::collections::VecDeque;
use std::ops::Range;
use std::sync::{Mutex, mpsc};
use tracing::{debug, trace};

/// Default number of source points per work item.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Worker-pool configuration for evaluating a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelEvaluator {
    worker_count: usize,
    chunk_size: usize,
}

impl ParallelEvaluator {
    /// Create an evaluator with `worker_count` workers and the default chunk
    /// size.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `worker_count` is zero.
    pub fn new(worker_count: usize) -> MorphResult<Self> {
        if worker_count == 0 {
            return Err(MorphError::invalid_argument(
                "worker count must be at least 1",
            ));
        }
        Ok(Self {
            worker_count,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Set how many source points make up one work item.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `chunk_size` is zero.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> MorphResult<Self> {
        if chunk_size == 0 {
            return Err(MorphError::invalid_argument("chunk size must be at least 1"));
        }
        self.chunk_size = chunk_size;
        Ok(self)
    }

    /// Number of workers.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Source points per work item.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Displacement at each query point.
    ///
    /// Empty queries return an empty result without starting any workers.
    ///
    /// # Errors
    ///
    /// Returns `WorkerPool` if the threads cannot be started or a chunk's
    /// contribution is lost.
    pub fn evaluate<K: RadialBasis>(
        &self,
        fit: &RbfFit<K>,
        queries: &[Point3<f64>],
    ) -> MorphResult<Vec<Vector3<f64>>> {
        let m = queries.len();
        if m == 0 {
            return Ok(Vec::new());
        }

        let chunks = chunk_ranges(fit.len(), self.chunk_size);
        let total_chunks = chunks.len();
        let workers = self.worker_count.min(total_chunks.max(1));
        debug!(
            target: "liner_morph::parallel",
            sources = fit.len(),
            queries = m,
            chunks = total_chunks,
            workers,
            "Starting parallel evaluation"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("rbf-worker-{}", i))
            .build()
            .map_err(|e| {
                MorphError::worker_pool(format!("failed to start {} workers: {}", workers, e))
            })?;

        let queue = Mutex::new(chunks);
        let (done_tx, done_rx) = mpsc::channel::<WorkerReport>();

        pool.scope(|scope| {
            let queue = &queue;
            for worker in 0..workers {
                let done_tx = done_tx.clone();
                scope.spawn(move |_| {
                    let mut partial = vec![Vector3::zeros(); m];
                    let mut chunks_done = 0;
                    loop {
                        let next = match queue.lock() {
                            Ok(mut q) => q.pop_front(),
                            Err(_) => None,
                        };
                        let Some(range) = next else {
                            break;
                        };
                        fit.accumulate(range, queries, &mut partial);
                        chunks_done += 1;
                    }
                    // The receiver outlives the scope
                    let _ = done_tx.send(WorkerReport {
                        worker,
                        chunks_done,
                        partial,
                    });
                });
            }
        });
        drop(done_tx);

        let mut total = vec![Vector3::zeros(); m];
        let mut chunks_done = 0;
        for report in done_rx {
            for (t, p) in total.iter_mut().zip(&report.partial) {
                *t += p;
            }
            chunks_done += report.chunks_done;
            trace!(
                target: "liner_morph::parallel",
                worker = report.worker,
                chunks = report.chunks_done,
                "Worker finished"
            );
        }

        if chunks_done != total_chunks {
            return Err(MorphError::worker_pool(format!(
                "{} of {} chunks completed",
                chunks_done, total_chunks
            )));
        }

        Ok(total)
    }

    /// New positions `q + displacement(q)` for each query point.
    ///
    /// # Errors
    ///
    /// As [`ParallelEvaluator::evaluate`].
    pub fn morph<K: RadialBasis>(
        &self,
        fit: &RbfFit<K>,
        queries: &[Point3<f64>],
    ) -> MorphResult<Vec<Point3<f64>>> {
        let displacements = self.evaluate(fit, queries)?;
        Ok(displacements
            .into_iter()
            .zip(queries)
            .map(|(d, q)| q + d)
            .collect())
    }
}

/// Evaluate `fit` at `queries` on `worker_count` workers.
///
/// # Errors
///
/// - `InvalidArgument` if `worker_count` is zero
/// - `WorkerPool` if the workers fail
pub fn evaluate_parallel<K: RadialBasis>(
    fit: &RbfFit<K>,
    queries: &[Point3<f64>],
    worker_count: usize,
) -> MorphResult<Vec<Vector3<f64>>> {
    ParallelEvaluator::new(worker_count)?.evaluate(fit, queries)
}

/// Partial result handed from a worker to the coordinator.
struct WorkerReport {
    worker: usize,
    chunks_done: usize,
    partial: Vec<Vector3<f64>>,
}

fn chunk_ranges(n: usize, chunk_size: usize) -> VecDeque<Range<usize>> {
    (0..n)
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(n))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbf::{RbfKernel, evaluate, fit};

    fn scattered(n: usize, seed: f64) -> Vec<Point3<f64>> {
        (0..n)
            .map(|i| {
                let t = i as f64 * 0.618_033_988 + seed;
                Point3::new(
                    (t * 12.9898).sin() * 50.0,
                    (t * 78.233).sin() * 50.0,
                    (t * 37.719).cos() * 50.0,
                )
            })
            .collect()
    }

    fn sample_fit(n: usize) -> RbfFit {
        let original = scattered(n, 0.0);
        let displaced: Vec<_> = original
            .iter()
            .map(|p| p + Vector3::new(0.01 * p.y, 0.02 * p.z, -0.01 * p.x))
            .collect();
        fit(&original, &displaced, RbfKernel::Linear).unwrap()
    }

    #[test]
    fn test_chunk_ranges() {
        let chunks: Vec<_> = chunk_ranges(250, 100).into_iter().collect();
        assert_eq!(chunks, vec![0..100, 100..200, 200..250]);
        assert!(chunk_ranges(0, 100).is_empty());
        assert_eq!(chunk_ranges(100, 100).len(), 1);
    }

    #[test]
    fn test_matches_serial() {
        let field = sample_fit(230);
        let queries = scattered(500, 0.5);
        let serial = evaluate(&field, &queries);

        for workers in [1, 2, 8] {
            let parallel = evaluate_parallel(&field, &queries, workers).unwrap();
            assert_eq!(parallel.len(), serial.len());
            for (p, s) in parallel.iter().zip(&serial) {
                let scale = s.norm().max(1.0);
                assert!(
                    (p - s).norm() / scale < 1e-4,
                    "workers={} parallel={:?} serial={:?}",
                    workers,
                    p,
                    s
                );
            }
        }
    }

    #[test]
    fn test_small_chunks() {
        let field = sample_fit(37);
        let queries = scattered(20, 0.25);
        let serial = evaluate(&field, &queries);

        let evaluator = ParallelEvaluator::new(3).unwrap().with_chunk_size(4).unwrap();
        assert_eq!(evaluator.chunk_size(), 4);
        let parallel = evaluator.evaluate(&field, &queries).unwrap();
        for (p, s) in parallel.iter().zip(&serial) {
            assert!((p - s).norm() < 1e-9);
        }
    }

    #[test]
    fn test_zero_workers_rejected() {
        let field = sample_fit(5);
        let err = evaluate_parallel(&field, &scattered(3, 0.1), 0).unwrap_err();
        assert!(matches!(err, MorphError::InvalidArgument { .. }));

        assert!(ParallelEvaluator::new(2).unwrap().with_chunk_size(0).is_err());
    }

    #[test]
    fn test_empty_queries() {
        let field = sample_fit(5);
        let out = evaluate_parallel(&field, &[], 4).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_parallel_morph_hits_targets() {
        let field = sample_fit(150);
        let moved = ParallelEvaluator::new(4)
            .unwrap()
            .morph(&field, field.sources())
            .unwrap();
        for ((m, s), d) in moved.iter().zip(field.sources()).zip(field.displacements()) {
            assert!((m - (s + d)).norm() < 1e-6);
        }
    }
}
