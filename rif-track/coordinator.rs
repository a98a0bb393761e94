//! Threaded track and match loop.
//!
//! The caller's thread tracks every frame. The reference database is built on
//! a worker thread when the first frame arrives, and every `query_period`
//! frames a snapshot of the current features is matched against it on
//! another worker. Frame motion accumulated while a query runs is composed
//! onto its models so that outlines land where the reference is now.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rif_core::GrayImage;
use rif_descriptor::{FeatureStore, Quantize5x5, Quantizer};
use rif_match::AffineModel;

use crate::config::{CoordinatorConfig, MatcherConfig};
use crate::error::{TrackError, TrackResult};
use crate::matcher::{Matcher, QueryResult, ReferenceImage};
use crate::polygon::PolygonTracker;
use crate::tracker::{RifTrack, TrackOutcome};

const IDLE_POLL: Duration = Duration::from_millis(5);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared with the worker threads
#[derive(Default)]
struct SharedState {
    matcher: Mutex<Option<Arc<Matcher>>>,
    latest: Mutex<Option<QueryResult>>,
    snapshot: Mutex<FeatureStore>,
    building_db: AtomicBool,
    database_failed: AtomicBool,
    query_in_progress: AtomicBool,
    should_stop: AtomicBool,
}

/// What happened on one call to [`TrackMatchMt::track_frame`]
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorReport {
    /// 1-based count of frames received
    pub frame: usize,
    /// `None` while the database is being built
    pub track: Option<TrackOutcome>,
    pub building_database: bool,
    pub query_in_progress: bool,
    /// Outlines added from a finished query on this frame
    pub polygons_added: usize,
}

pub struct TrackMatchMt<Q: Quantizer = Quantize5x5> {
    query_period: usize,
    matcher_config: MatcherConfig,
    references: Arc<Vec<ReferenceImage>>,
    tracker: RifTrack<Q>,
    polygons: PolygonTracker,
    shared: Arc<SharedState>,
    workers: Vec<JoinHandle<()>>,
    frame: usize,
    cumulative: AffineModel,
}

impl<Q: Quantizer> TrackMatchMt<Q> {
    pub fn new(config: CoordinatorConfig, references: Vec<ReferenceImage>) -> TrackResult<Self> {
        config.validate()?;
        Ok(Self {
            query_period: config.query_period,
            matcher_config: config.matcher,
            references: Arc::new(references),
            tracker: RifTrack::new(config.track)?,
            polygons: PolygonTracker::new(),
            shared: Arc::new(SharedState::default()),
            workers: Vec::new(),
            frame: 0,
            cumulative: AffineModel::identity(),
        })
    }

    pub fn tracker(&self) -> &RifTrack<Q> {
        &self.tracker
    }

    pub fn polygons(&self) -> &PolygonTracker {
        &self.polygons
    }

    /// Motion since the running query's snapshot was taken
    pub fn cumulative_model(&self) -> &AffineModel {
        &self.cumulative
    }

    pub fn is_database_ready(&self) -> bool {
        self.matcher().is_some()
    }

    pub fn is_building_database(&self) -> bool {
        self.shared.building_db.load(Ordering::Acquire)
    }

    pub fn is_query_in_progress(&self) -> bool {
        self.shared.query_in_progress.load(Ordering::Acquire)
    }

    /// Block until no build or query is running, or `timeout` passes.
    /// Returns whether the workers went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        while self.is_building_database() || self.is_query_in_progress() {
            if start.elapsed() >= timeout {
                return false;
            }
            thread::sleep(IDLE_POLL);
        }
        true
    }

    pub fn reset(&mut self) {
        self.polygons.reset();
    }

    pub fn track_frame(&mut self, image: &GrayImage) -> TrackResult<CoordinatorReport> {
        self.frame += 1;
        self.reap_workers();

        let matcher = self.matcher();
        if matcher.is_none() && !self.shared.database_failed.load(Ordering::Acquire) {
            if !self.is_building_database() {
                self.spawn_build()?;
            }
            log::debug!("Frame {} skipped while the database builds", self.frame);
            return Ok(self.report(None, 0));
        }

        // A query finishing mid-frame is picked up on the next frame
        let query_running = self.is_query_in_progress();
        let mut polygons_added = 0;
        if let Some(matcher) = &matcher {
            if !query_running {
                let finished = lock(&self.shared.latest).take();
                if let Some(result) = finished {
                    polygons_added = self.apply_query(matcher, &result);
                }
            }
        }

        let outcome = self.tracker.track_frame(image)?;
        if outcome.valid {
            self.polygons.propagate(&outcome.transform);
        } else {
            self.reset();
        }

        self.advance_query(query_running, &outcome.transform, matcher)?;
        Ok(self.report(Some(outcome), polygons_added))
    }

    /// Stop the workers and wait for them
    pub fn shutdown(&mut self) {
        self.shared.should_stop.store(true, Ordering::SeqCst);
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Worker thread panicked");
            }
        }
    }

    fn matcher(&self) -> Option<Arc<Matcher>> {
        lock(&self.shared.matcher).clone()
    }

    fn report(&self, track: Option<TrackOutcome>, polygons_added: usize) -> CoordinatorReport {
        CoordinatorReport {
            frame: self.frame,
            track,
            building_database: self.is_building_database(),
            query_in_progress: self.is_query_in_progress(),
            polygons_added,
        }
    }

    /// Bring finished query models up to date with the motion since the
    /// snapshot and start tracking the new references
    fn apply_query(&mut self, matcher: &Matcher, result: &QueryResult) -> usize {
        let models: Vec<Option<AffineModel>> = result
            .models
            .iter()
            .map(|model| model.map(|m| self.cumulative.compose(&m)))
            .collect();
        let before = self.polygons.len();
        self.polygons
            .update_polygons(&models, &matcher.reference_sizes(), &matcher.labels());
        self.polygons.len() - before
    }

    /// Accumulate frame motion for the query seen running at the start of
    /// the frame, or start the next one on schedule
    fn advance_query(
        &mut self,
        query_running: bool,
        transform: &AffineModel,
        matcher: Option<Arc<Matcher>>,
    ) -> TrackResult<()> {
        if query_running {
            self.cumulative = transform.compose(&self.cumulative);
        } else if let Some(matcher) = matcher {
            if self.frame % self.query_period == 0 {
                self.spawn_query(matcher)?;
            }
        }
        Ok(())
    }

    fn reap_workers(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = self.workers.drain(..).partition(|h| h.is_finished());
        self.workers = running;
        for handle in finished {
            if handle.join().is_err() {
                log::error!("Worker thread panicked");
            }
        }
    }

    fn spawn_build(&mut self) -> TrackResult<()> {
        self.shared.building_db.store(true, Ordering::Release);
        log::info!("Building database of {} images", self.references.len());

        let shared = Arc::clone(&self.shared);
        let references = Arc::clone(&self.references);
        let config = self.matcher_config.clone();

        let spawned = thread::Builder::new()
            .name("rif-db-build".to_string())
            .spawn(move || {
                let built = Matcher::new(config).and_then(|mut matcher| {
                    matcher.build_database_cancellable(&references, &shared.should_stop)?;
                    Ok(matcher)
                });
                match built {
                    Ok(matcher) => *lock(&shared.matcher) = Some(Arc::new(matcher)),
                    Err(TrackError::Cancelled) => log::debug!("Database build cancelled"),
                    Err(e) => {
                        log::error!("Database build failed: {}", e);
                        shared.database_failed.store(true, Ordering::Release);
                    }
                }
                shared.building_db.store(false, Ordering::Release);
            });

        match spawned {
            Ok(handle) => {
                self.workers.push(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.building_db.store(false, Ordering::Release);
                Err(e.into())
            }
        }
    }

    fn spawn_query(&mut self, matcher: Arc<Matcher>) -> TrackResult<()> {
        let Some(current) = self.tracker.current_store() else {
            return Ok(());
        };

        self.cumulative = AffineModel::identity();
        lock(&self.shared.snapshot).clone_from(current);
        self.shared.query_in_progress.store(true, Ordering::Release);
        log::debug!("Frame {}: querying {} features", self.frame, current.len());

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("rif-query".to_string())
            .spawn(move || {
                let result = {
                    let snapshot = lock(&shared.snapshot);
                    matcher.query_cancellable(&snapshot, &shared.should_stop)
                };
                if let Some(result) = result {
                    *lock(&shared.latest) = Some(result);
                }
                shared.query_in_progress.store(false, Ordering::Release);
            });

        match spawned {
            Ok(handle) => {
                self.workers.push(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.query_in_progress.store(false, Ordering::Release);
                Err(e.into())
            }
        }
    }
}

impl<Q: Quantizer> Drop for TrackMatchMt<Q> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<Q: Quantizer> std::fmt::Debug for TrackMatchMt<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackMatchMt")
            .field("frame", &self.frame)
            .field("query_period", &self.query_period)
            .field("references", &self.references.len())
            .field("database_ready", &self.is_database_ready())
            .field("query_in_progress", &self.is_query_in_progress())
            .field("polygons", &self.polygons.len())
            .finish()
    }
}
