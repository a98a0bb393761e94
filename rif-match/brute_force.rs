use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering};

use float_ord::FloatOrd;
use rayon::prelude::*;

use crate::distance::Distance;

/// Entries scanned between checks of the cancellation flag
const CANCEL_CHECK_INTERVAL: usize = 256;

/// One search result; `index` points into the scanned database
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub distance: f32,
    pub index: usize,
}

/// Exhaustive k-nearest-neighbour search under a [`Distance`].
///
/// Results are ascending by distance, ties broken by database index, and hold
/// `min(k, db.len())` entries.
#[derive(Debug, Clone, Default)]
pub struct BruteForce<D> {
    metric: D,
}

impl<D> BruteForce<D> {
    pub fn new(metric: D) -> Self {
        Self { metric }
    }

    pub fn metric(&self) -> &D {
        &self.metric
    }

    pub fn find_nn<T, V>(&self, k: usize, query: &[T], db: &[V]) -> Vec<Neighbor>
    where
        D: Distance<T>,
        V: AsRef<[T]>,
    {
        self.scan(k, query, db, None).unwrap_or_default()
    }

    /// Like [`find_nn`](Self::find_nn) but gives up with `None` once `cancel`
    /// is raised
    pub fn find_nn_cancellable<T, V>(
        &self,
        k: usize,
        query: &[T],
        db: &[V],
        cancel: &AtomicBool,
    ) -> Option<Vec<Neighbor>>
    where
        D: Distance<T>,
        V: AsRef<[T]>,
    {
        self.scan(k, query, db, Some(cancel))
    }

    /// Independent searches for every query, in parallel
    pub fn find_nn_batch<T, V, Q>(&self, k: usize, queries: &[Q], db: &[V]) -> Vec<Vec<Neighbor>>
    where
        D: Distance<T>,
        T: Sync,
        V: AsRef<[T]> + Sync,
        Q: AsRef<[T]> + Sync,
    {
        queries
            .par_iter()
            .map(|query| self.find_nn(k, query.as_ref(), db))
            .collect()
    }

    fn scan<T, V>(
        &self,
        k: usize,
        query: &[T],
        db: &[V],
        cancel: Option<&AtomicBool>,
    ) -> Option<Vec<Neighbor>>
    where
        D: Distance<T>,
        V: AsRef<[T]>,
    {
        if k == 0 {
            return Some(Vec::new());
        }

        // Max-heap on distance: the top is the current k-th best
        let mut heap: BinaryHeap<(FloatOrd<f32>, usize)> = BinaryHeap::with_capacity(k + 1);

        for (index, entry) in db.iter().enumerate() {
            if let Some(flag) = cancel {
                if index % CANCEL_CHECK_INTERVAL == 0 && flag.load(Ordering::Relaxed) {
                    log::debug!("Nearest neighbour scan cancelled at {}/{}", index, db.len());
                    return None;
                }
            }

            let bound = if heap.len() < k {
                f32::INFINITY
            } else {
                heap.peek().map_or(f32::INFINITY, |top| top.0.0)
            };

            let distance = self.metric.distance(query, entry.as_ref(), bound);
            if distance < bound {
                heap.push((FloatOrd(distance), index));
                if heap.len() > k {
                    heap.pop();
                }
            }
        }

        Some(
            heap.into_sorted_vec()
                .into_iter()
                .map(|(distance, index)| Neighbor {
                    distance: distance.0,
                    index,
                })
                .collect(),
        )
    }
}
