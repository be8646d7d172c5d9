use image::RgbImage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tryon_core::{
    CompositeRequest, Compositor, CompositorConfig, EffectCatalog, Intensity, LandmarkSet,
    RegistryError, RenderMode, Selection,
};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("region table does not fit the detector: {0}")]
    Registry(#[from] RegistryError),
    #[error("no image loaded")]
    NoImage,
    #[error("render {0} superseded by a newer request")]
    Superseded(u64),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Result of a render request.
pub struct RenderOutcome {
    pub image: RgbImage,
    pub mode: RenderMode,
    pub generation: u64,
}

/// Messages sent from D-Bus handlers to the engine thread.
enum EngineRequest {
    LoadImage {
        image: RgbImage,
        epoch: u64,
    },
    SetLandmarks {
        epoch: u64,
        landmarks: Option<LandmarkSet>,
    },
    Render {
        generation: u64,
        selection: Selection,
        intensity: Intensity,
        reply: oneshot::Sender<Result<RenderOutcome, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    epoch: Arc<AtomicU64>,
    generation: Arc<AtomicU64>,
    landmark_count: usize,
}

impl EngineHandle {
    /// Points per landmark set the compositor's regions were validated against.
    pub fn landmark_count(&self) -> usize {
        self.landmark_count
    }

    /// Replace the base image. Returns its epoch; landmarks tagged with an
    /// older epoch are dropped by the engine.
    pub async fn load_image(&self, image: RgbImage) -> Result<u64, EngineError> {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.tx
            .send(EngineRequest::LoadImage { image, epoch })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        Ok(epoch)
    }

    /// Epoch of the most recently requested image.
    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Deliver detector output (or its absence) for the image loaded at `epoch`.
    pub async fn set_landmarks(
        &self,
        epoch: u64,
        landmarks: Option<LandmarkSet>,
    ) -> Result<(), EngineError> {
        self.tx
            .send(EngineRequest::SetLandmarks { epoch, landmarks })
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    /// Render the current image with `selection`.
    ///
    /// Requests queued behind newer ones resolve to
    /// [`EngineError::Superseded`] without being composited.
    pub async fn render(
        &self,
        selection: Selection,
        intensity: Intensity,
    ) -> Result<RenderOutcome, EngineError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Render {
                generation,
                selection,
                intensity,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Validates the region table against the detector's landmark count first,
/// so a mismatched detector stops the daemon at startup.
pub fn spawn_engine(
    catalog: &EffectCatalog,
    landmark_count: usize,
    config: CompositorConfig,
) -> Result<EngineHandle, EngineError> {
    let compositor = Compositor::new(catalog, landmark_count, config)?;
    tracing::info!(
        landmark_count,
        fallback_opacity = config.fallback_opacity,
        "compositor ready"
    );

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(16);

    std::thread::Builder::new()
        .name("tryon-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            let mut state = EngineState::default();
            while let Some(req) = rx.blocking_recv() {
                let mut pending = state.apply(req);
                if pending.is_some() {
                    // Coalesce renders queued behind this one; only the newest is drawn.
                    while let Ok(next) = rx.try_recv() {
                        if let Some(job) = state.apply(next) {
                            pending = Some(match pending.take() {
                                Some(prev) => newest(prev, job),
                                None => job,
                            });
                        }
                    }
                }
                if let Some(job) = pending {
                    state.render(&compositor, job);
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle {
        tx,
        epoch: Arc::new(AtomicU64::new(0)),
        generation: Arc::new(AtomicU64::new(0)),
        landmark_count,
    })
}

struct RenderJob {
    generation: u64,
    selection: Selection,
    intensity: Intensity,
    reply: oneshot::Sender<Result<RenderOutcome, EngineError>>,
}

/// Keep the newer job; answer the other as superseded.
fn newest(a: RenderJob, b: RenderJob) -> RenderJob {
    let (keep, stale) = if b.generation > a.generation { (b, a) } else { (a, b) };
    tracing::debug!(stale = stale.generation, kept = keep.generation, "render superseded");
    let _ = stale.reply.send(Err(EngineError::Superseded(stale.generation)));
    keep
}

/// Engine-owned resources: the base image and its landmarks.
#[derive(Default)]
struct EngineState {
    base: Option<RgbImage>,
    epoch: u64,
    landmarks: Option<LandmarkSet>,
    last_generation: u64,
}

impl EngineState {
    /// Apply state changes in arrival order; render requests are handed back.
    fn apply(&mut self, req: EngineRequest) -> Option<RenderJob> {
        match req {
            EngineRequest::LoadImage { image, epoch } => {
                if epoch <= self.epoch {
                    tracing::debug!(epoch, current = self.epoch, "stale image ignored");
                } else {
                    tracing::info!(
                        epoch,
                        width = image.width(),
                        height = image.height(),
                        "base image loaded"
                    );
                    self.base = Some(image);
                    self.epoch = epoch;
                    self.landmarks = None;
                }
                None
            }
            EngineRequest::SetLandmarks { epoch, landmarks } => {
                if epoch != self.epoch {
                    tracing::debug!(epoch, current = self.epoch, "landmarks for replaced image discarded");
                } else {
                    tracing::info!(
                        epoch,
                        points = landmarks.as_ref().map(LandmarkSet::len),
                        "landmarks updated"
                    );
                    self.landmarks = landmarks;
                }
                None
            }
            EngineRequest::Render {
                generation,
                selection,
                intensity,
                reply,
            } => Some(RenderJob {
                generation,
                selection,
                intensity,
                reply,
            }),
        }
    }

    fn render(&mut self, compositor: &Compositor, job: RenderJob) {
        if job.generation <= self.last_generation {
            let _ = job.reply.send(Err(EngineError::Superseded(job.generation)));
            return;
        }
        let Some(base) = &self.base else {
            let _ = job.reply.send(Err(EngineError::NoImage));
            return;
        };

        let result = compositor.composite(&CompositeRequest {
            base_image: base,
            landmarks: self.landmarks.as_ref(),
            selection: &job.selection,
            intensity: job.intensity,
        });
        tracing::debug!(generation = job.generation, mode = ?result.mode, "render complete");

        self.last_generation = job.generation;
        let _ = job.reply.send(Ok(RenderOutcome {
            image: result.image,
            mode: result.mode,
            generation: job.generation,
        }));
    }
}
