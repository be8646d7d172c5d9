use crate::engine::{EngineError, EngineHandle};
use image::RgbImage;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tryon_core::{
    parse_landmarks, EffectCatalog, EffectType, Intensity, LandmarkError, LandmarkProvider, Rgb,
    SelectionState,
};
use zbus::interface;

/// Where landmarks for the current image stand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStatus {
    #[default]
    NoImage,
    Pending,
    Ready,
    Unavailable,
}

/// Per-client preview session. One writer at a time.
#[derive(Default)]
struct Session {
    selection: SelectionState,
    image_path: Option<PathBuf>,
    detection: DetectionStatus,
    /// Epoch whose landmarks came from `SetLandmarks`; detection must not replace them.
    client_landmarks_epoch: Option<u64>,
}

/// D-Bus interface for the TryOn preview daemon.
///
/// Bus name: org.freedesktop.TryOn1
/// Object path: /org/freedesktop/TryOn1
pub struct TryOnService {
    engine: EngineHandle,
    catalog: Arc<EffectCatalog>,
    provider: Arc<dyn LandmarkProvider>,
    session: Arc<Mutex<Session>>,
    detect_timeout: Duration,
    /// Newest generation written to each output path.
    written: Mutex<HashMap<PathBuf, u64>>,
}

impl TryOnService {
    pub fn new(
        engine: EngineHandle,
        catalog: Arc<EffectCatalog>,
        provider: Arc<dyn LandmarkProvider>,
        default_intensity: Intensity,
        detect_timeout: Duration,
    ) -> Self {
        let session = Session {
            selection: SelectionState::with_intensity(default_intensity),
            ..Session::default()
        };
        Self {
            engine,
            catalog,
            provider,
            session: Arc::new(Mutex::new(session)),
            detect_timeout,
            written: Mutex::new(HashMap::new()),
        }
    }

    /// Run the provider off the async runtime and hand its result to the
    /// engine, unless a newer image has been opened or the client supplied
    /// landmarks meanwhile.
    fn spawn_detection(&self, image: RgbImage, path: PathBuf, epoch: u64) {
        let engine = self.engine.clone();
        let provider = Arc::clone(&self.provider);
        let session = Arc::clone(&self.session);
        let timeout = self.detect_timeout;

        tokio::spawn(async move {
            let detect = tokio::task::spawn_blocking(move || provider.detect(&image, Some(&path)));
            let landmarks = match tokio::time::timeout(timeout, detect).await {
                Ok(Ok(Ok(set))) => Some(set),
                Ok(Ok(Err(LandmarkError::NoFaceFound))) => {
                    tracing::info!(epoch, "no face found; using whole-frame preview");
                    None
                }
                Ok(Ok(Err(e))) => {
                    tracing::warn!(epoch, error = %e, "landmark detection failed");
                    None
                }
                Ok(Err(e)) => {
                    tracing::error!(epoch, error = %e, "landmark task panicked");
                    None
                }
                Err(_) => {
                    tracing::warn!(epoch, timeout_secs = timeout.as_secs(), "landmark detection timed out");
                    None
                }
            };

            // Epoch changes and client landmarks happen under this lock too.
            let mut session = session.lock().await;
            if engine.current_epoch() != epoch {
                tracing::debug!(epoch, "detection result for replaced image dropped");
                return;
            }
            if session.client_landmarks_epoch == Some(epoch) {
                tracing::debug!(epoch, "client landmarks present; detection result dropped");
                return;
            }
            let status = if landmarks.is_some() {
                DetectionStatus::Ready
            } else {
                DetectionStatus::Unavailable
            };
            if let Err(e) = engine.set_landmarks(epoch, landmarks).await {
                tracing::error!(error = %e, "failed to deliver landmarks");
                return;
            }
            session.detection = status;
        });
    }

    /// Save a render unless a newer generation already landed at `path`.
    /// Returns whether the file was written.
    async fn write_render(
        &self,
        path: PathBuf,
        generation: u64,
        image: RgbImage,
    ) -> zbus::fdo::Result<bool> {
        let mut written = self.written.lock().await;
        if written.get(&path).is_some_and(|&last| last > generation) {
            tracing::debug!(path = %path.display(), generation, "newer render already written; skipped");
            return Ok(false);
        }
        let save_path = path.clone();
        tokio::task::spawn_blocking(move || image.save(&save_path))
            .await
            .map_err(failed)?
            .map_err(failed)?;
        written.insert(path, generation);
        Ok(true)
    }
}

fn failed(e: impl std::fmt::Display) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(e.to_string())
}

fn invalid(e: impl std::fmt::Display) -> zbus::fdo::Error {
    zbus::fdo::Error::InvalidArgs(e.to_string())
}

#[interface(name = "org.freedesktop.TryOn1")]
impl TryOnService {
    /// Decode an image and make it the preview base. Landmarks are looked
    /// up in the background; until they arrive renders use the fallback.
    async fn open_image(&self, path: &str) -> zbus::fdo::Result<String> {
        tracing::info!(path, "open_image requested");
        let path = PathBuf::from(path);
        let decode_path = path.clone();
        let image = tokio::task::spawn_blocking(move || image::open(&decode_path))
            .await
            .map_err(failed)?
            .map_err(invalid)?
            .to_rgb8();
        let (width, height) = image.dimensions();

        let epoch = {
            let mut session = self.session.lock().await;
            let epoch = self.engine.load_image(image.clone()).await.map_err(failed)?;
            session.image_path = Some(path.clone());
            session.detection = DetectionStatus::Pending;
            epoch
        };
        self.spawn_detection(image, path, epoch);

        Ok(serde_json::json!({
            "epoch": epoch,
            "width": width,
            "height": height,
        })
        .to_string())
    }

    /// Supply landmarks for the current image directly, as JSON. They take
    /// precedence over any detection still running for that image.
    async fn set_landmarks(&self, json: &str) -> zbus::fdo::Result<u32> {
        let set = parse_landmarks(json).map_err(invalid)?;
        let mut session = self.session.lock().await;
        let epoch = self.engine.current_epoch();
        if epoch == 0 {
            return Err(failed(EngineError::NoImage));
        }
        let expected = self.engine.landmark_count();
        if set.len() != expected {
            return Err(invalid(format!(
                "expected {expected} landmarks, got {}",
                set.len()
            )));
        }
        let points = set.len() as u32;
        self.engine.set_landmarks(epoch, Some(set)).await.map_err(failed)?;
        session.client_landmarks_epoch = Some(epoch);
        session.detection = DetectionStatus::Ready;
        drop(session);
        tracing::info!(epoch, points, "landmarks supplied by client");
        Ok(points)
    }

    /// Select a catalog preset by id.
    async fn select_preset(&self, effect_id: &str) -> zbus::fdo::Result<()> {
        let mut session = self.session.lock().await;
        session
            .selection
            .set_preset(&self.catalog, effect_id)
            .map_err(invalid)
    }

    /// Preview an external color, e.g. from a product recommendation.
    async fn set_override(
        &self,
        r: u8,
        g: u8,
        b: u8,
        effect_type: &str,
        label: &str,
    ) -> zbus::fdo::Result<()> {
        let effect_type: EffectType = effect_type.parse().map_err(invalid)?;
        let mut session = self.session.lock().await;
        session
            .selection
            .set_override(Rgb::new(r, g, b), effect_type, label);
        Ok(())
    }

    /// Remove the active effect.
    async fn clear(&self) -> zbus::fdo::Result<()> {
        self.session.lock().await.selection.clear();
        Ok(())
    }

    /// Set intensity, 0 to 100.
    async fn set_intensity(&self, value: i32) -> zbus::fdo::Result<()> {
        let mut session = self.session.lock().await;
        session
            .selection
            .set_intensity(i64::from(value))
            .map_err(invalid)
    }

    /// Composite the current state and write it as an image file.
    async fn render(&self, out_path: &str) -> zbus::fdo::Result<String> {
        let (selection, intensity) = {
            let session = self.session.lock().await;
            (session.selection.current().clone(), session.selection.intensity())
        };
        let label = selection.label().map(str::to_owned);

        let outcome = self
            .engine
            .render(selection, intensity)
            .await
            .map_err(failed)?;

        let out = PathBuf::from(out_path);
        if !self
            .write_render(out.clone(), outcome.generation, outcome.image)
            .await?
        {
            return Err(failed(EngineError::Superseded(outcome.generation)));
        }

        tracing::info!(
            path = %out.display(),
            mode = ?outcome.mode,
            generation = outcome.generation,
            "render written"
        );

        Ok(serde_json::json!({
            "path": out_path,
            "mode": outcome.mode,
            "generation": outcome.generation,
            "effect": label,
            "intensity": intensity.get(),
        })
        .to_string())
    }

    /// Catalog entries as a JSON array.
    async fn list_effects(&self) -> zbus::fdo::Result<String> {
        serde_json::to_string(self.catalog.effects()).map_err(failed)
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let session = self.session.lock().await;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "image": session.image_path.as_ref().map(|p| p.display().to_string()),
            "landmarks": session.detection,
            "effect": session.selection.current().label(),
            "intensity": session.selection.intensity().get(),
            "effects_loaded": self.catalog.len(),
        })
        .to_string())
    }
}
