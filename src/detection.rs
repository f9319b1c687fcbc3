//! Periodic sampling loop.
//!
//! A timer task fires every `interval_ms`. Each tick that finds a ready
//! frame gets the next sequence number and runs the pose model on its own
//! task, so a slow estimate never holds back the next tick. At most
//! `max_in_flight` estimates run at once; a tick that finds them all busy
//! is skipped without taking a sequence number. Finished
//! estimates go to a single commit task that owns the drawing surface and
//! the presence state. It drops any result whose sequence number is not newer
//! than the last one it committed.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::camera::{VideoFrameMeta, VideoSource};
use crate::config::{Config, DetectionConfig};
use crate::error::{CycleError, ModelError};
use crate::pose::{PoseModel, PoseResult};
use crate::presence::{PresenceClassifier, PresenceState};
use crate::render::{DrawingSurface, OverlayRenderer};

/// The most recently committed cycle. `seq == 0` means nothing has committed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Committed {
    pub seq: u64,
    pub presence: PresenceState,
}

/// Reported to whoever holds the event receiver.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleEvent {
    Committed { seq: u64, presence: PresenceState },
    /// Estimation or classification failed. The loop keeps going.
    Failed { seq: u64, error: CycleError },
    /// Finished after a newer cycle had already committed.
    Stale { seq: u64, latest: u64 },
    /// The model never loaded, so sampling never started.
    LoadFailed(ModelError),
}

enum Outcome {
    Completed {
        seq: u64,
        meta: VideoFrameMeta,
        pose: PoseResult,
    },
    Failed {
        seq: u64,
        error: ModelError,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct DetectionLoop {
    interval: Duration,
    event_capacity: usize,
    max_in_flight: usize,
    classifier: PresenceClassifier,
    renderer: OverlayRenderer,
}

impl DetectionLoop {
    pub fn new(config: &DetectionConfig, renderer: OverlayRenderer) -> Self {
        Self {
            interval: Duration::from_millis(config.interval_ms.max(1)),
            event_capacity: config.event_capacity.max(1),
            max_in_flight: config.max_in_flight.max(1),
            classifier: PresenceClassifier::new(config.lowest_score),
            renderer,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.detection, OverlayRenderer::from_config(&config.overlay))
    }

    /// Start sampling with an already loaded model. Must be called inside a tokio runtime.
    pub fn start<M, V, S>(&self, model: Arc<M>, source: Arc<V>, surface: S) -> LoopHandle<S>
    where
        V: VideoSource + 'static,
        M: PoseModel<V::Frame> + 'static,
        S: DrawingSurface + 'static,
    {
        self.launch(async move { Ok(model) }, source, surface)
    }

    /// Start once `load` resolves. No tick fires before that.
    pub fn start_when_loaded<M, V, S, L>(&self, load: L, source: Arc<V>, surface: S) -> LoopHandle<S>
    where
        V: VideoSource + 'static,
        M: PoseModel<V::Frame> + 'static,
        S: DrawingSurface + 'static,
        L: Future<Output = Result<M, ModelError>> + Send + 'static,
    {
        self.launch(async move { load.await.map(Arc::new) }, source, surface)
    }

    fn launch<M, V, S, L>(&self, load: L, source: Arc<V>, surface: S) -> LoopHandle<S>
    where
        V: VideoSource + 'static,
        M: PoseModel<V::Frame> + 'static,
        S: DrawingSurface + 'static,
        L: Future<Output = Result<Arc<M>, ModelError>> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        // 送信側は許可証を持ったまま送るので、上限分の容量があれば詰まらない
        let (results_tx, results_rx) = mpsc::channel::<Outcome>(self.max_in_flight);
        let (events_tx, events_rx) = mpsc::channel::<CycleEvent>(self.event_capacity);
        let (state_tx, state_rx) = watch::channel(Committed::default());
        let events = EventSink {
            tx: events_tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        let dropped_events = Arc::clone(&events.dropped);

        let sampler = tokio::spawn(run_sampler(
            self.interval,
            Arc::new(Semaphore::new(self.max_in_flight)),
            load,
            source,
            results_tx,
            events.clone(),
            cancel.clone(),
        ));
        let committer = tokio::spawn(run_committer(
            self.classifier,
            self.renderer,
            surface,
            results_rx,
            state_tx,
            events,
            cancel.clone(),
        ));

        LoopHandle {
            cancel,
            state: state_rx,
            events: Some(events_rx),
            dropped_events,
            sampler: Some(sampler),
            committer: Some(committer),
        }
    }
}

fn check_meta(meta: &VideoFrameMeta) -> Result<(), CycleError> {
    if !meta.is_ready() {
        return Err(CycleError::SourceNotReady);
    }
    if !meta.has_valid_dimensions() {
        return Err(CycleError::InvalidDimensions {
            width: meta.width,
            height: meta.height,
        });
    }
    Ok(())
}

/// Anything short of a ready frame with real dimensions skips the tick.
///
/// `meta()` is only a cheap gate. The returned size always belongs to the returned frame.
fn capture<V: VideoSource + ?Sized>(source: &V) -> Result<(VideoFrameMeta, V::Frame), CycleError> {
    check_meta(&source.meta())?;
    let (meta, frame) = source.snapshot().ok_or(CycleError::SourceNotReady)?;
    check_meta(&meta)?;
    Ok((meta, frame))
}

async fn run_sampler<M, V, L>(
    interval: Duration,
    in_flight: Arc<Semaphore>,
    load: L,
    source: Arc<V>,
    results_tx: mpsc::Sender<Outcome>,
    events: EventSink,
    cancel: CancellationToken,
) where
    V: VideoSource + 'static,
    M: PoseModel<V::Frame> + 'static,
    L: Future<Output = Result<Arc<M>, ModelError>> + Send + 'static,
{
    let model = tokio::select! {
        _ = cancel.cancelled() => return,
        loaded = load => match loaded {
            Ok(model) => model,
            Err(e) => {
                error!("pose model failed to load: {}", e);
                events.emit(CycleEvent::LoadFailed(e));
                return;
            }
        },
    };
    info!(interval_ms = interval.as_millis() as u64, "model ready, sampling started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut next_seq: u64 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Ok(permit) = Arc::clone(&in_flight).try_acquire_owned() else {
            trace!("tick skipped: all estimation slots busy");
            continue;
        };
        let (meta, frame) = match capture(source.as_ref()) {
            Ok(captured) => captured,
            Err(e) => {
                trace!("tick skipped: {}", e);
                continue;
            }
        };

        next_seq += 1;
        let seq = next_seq;
        let model = Arc::clone(&model);
        let results_tx = results_tx.clone();
        let cancel = cancel.clone();

        tokio::spawn(async move {
            let result = model.estimate(frame).await;
            if cancel.is_cancelled() {
                debug!(seq, "loop stopped, discarding in-flight result");
                return;
            }
            let outcome = match result {
                Ok(pose) => Outcome::Completed { seq, meta, pose },
                Err(error) => Outcome::Failed { seq, error },
            };
            // the commit task is gone once the loop stops
            let _ = results_tx.send(outcome).await;
            drop(permit);
        });
    }

    info!(cycles = next_seq, "sampling stopped");
}

async fn run_committer<S: DrawingSurface>(
    classifier: PresenceClassifier,
    renderer: OverlayRenderer,
    mut surface: S,
    mut results_rx: mpsc::Receiver<Outcome>,
    state_tx: watch::Sender<Committed>,
    events: EventSink,
    cancel: CancellationToken,
) -> S {
    let mut last_committed: u64 = 0;

    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = results_rx.recv() => match outcome {
                Some(outcome) => outcome,
                None => break,
            },
        };

        match outcome {
            Outcome::Failed { seq, error } => {
                warn!(seq, "pose estimation failed: {}", error);
                events.emit(CycleEvent::Failed {
                    seq,
                    error: error.into(),
                });
            }
            Outcome::Completed { seq, .. } if seq <= last_committed => {
                debug!(seq, latest = last_committed, "late result discarded");
                events.emit(CycleEvent::Stale {
                    seq,
                    latest: last_committed,
                });
            }
            Outcome::Completed { seq, meta, pose } => {
                let presence = match classifier.classify(&pose) {
                    Ok(presence) => presence,
                    Err(e) => {
                        error!(seq, "malformed pose result: {}", e);
                        events.emit(CycleEvent::Failed {
                            seq,
                            error: e.into(),
                        });
                        continue;
                    }
                };

                renderer.render(&pose, meta.width, meta.height, &mut surface);
                surface.present();
                last_committed = seq;

                let previous = state_tx.send_replace(Committed { seq, presence });
                if previous.presence != presence {
                    info!(seq, %presence, "presence changed");
                }
                trace!(seq, width = meta.width, height = meta.height, "cycle committed");
                events.emit(CycleEvent::Committed { seq, presence });
            }
        }
    }

    surface
}

#[derive(Clone)]
struct EventSink {
    tx: mpsc::Sender<CycleEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSink {
    /// Never blocks the loop. A lagging receiver loses events.
    fn emit(&self, event: CycleEvent) {
        if let Err(mpsc::error::TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Handle to a running loop. Dropping it stops sampling.
pub struct LoopHandle<S> {
    cancel: CancellationToken,
    state: watch::Receiver<Committed>,
    events: Option<mpsc::Receiver<CycleEvent>>,
    dropped_events: Arc<AtomicU64>,
    sampler: Option<JoinHandle<()>>,
    committer: Option<JoinHandle<S>>,
}

impl<S> LoopHandle<S> {
    pub fn presence(&self) -> PresenceState {
        self.state.borrow().presence
    }

    pub fn committed(&self) -> Committed {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Committed> {
        self.state.clone()
    }

    /// The event stream can be taken once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<CycleEvent>> {
        self.events.take()
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
            && self.sampler.as_ref().map_or(false, |task| !task.is_finished())
    }

    /// Stop ticking and hand the surface back. In-flight estimates finish but are not committed.
    pub async fn stop(mut self) -> Result<S> {
        self.cancel.cancel();
        if let Some(sampler) = self.sampler.take() {
            sampler.await.context("sampler task panicked")?;
        }
        let committer = self
            .committer
            .take()
            .context("detection loop already stopped")?;
        committer.await.context("commit task panicked")
    }
}

impl<S> Drop for LoopHandle<S> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
