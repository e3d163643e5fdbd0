//! The summarization backend seam and its ONNX implementation.
//!
//! The server only talks to [`SummaryBackend`]. [`OnnxBackend`] loads the
//! checkpoint lazily on first use and keeps it for the life of the process;
//! a failed load leaves the slot empty so the next request tries again.

use std::sync::Arc;

use async_trait::async_trait;
use precis_core::GenerationParams;
use thiserror::Error;
use tokio::sync::OnceCell;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Checkpoint directory or one of its files is missing.
    #[error("{0}")]
    ModelNotFound(String),

    /// Loading or running the model failed for any other reason.
    #[error("{0}")]
    Inference(String),
}

impl From<precis_ai::ModelError> for BackendError {
    fn from(err: precis_ai::ModelError) -> Self {
        if err.is_not_found() {
            Self::ModelNotFound(err.to_string())
        } else {
            Self::Inference(format!("{err:#}"))
        }
    }
}

/// Something that turns article text into a summary.
#[async_trait]
pub trait SummaryBackend: Send + Sync + 'static {
    /// Make sure the model is loaded, loading it if necessary.
    async fn ensure_loaded(&self) -> Result<(), BackendError>;

    /// Summarize `text` with already-validated parameters.
    async fn summarize(
        &self,
        text: String,
        params: GenerationParams,
    ) -> Result<String, BackendError>;
}

/// A value built by a blocking loader on first use, then shared.
///
/// Concurrent callers wait for the one load in flight. A failed load leaves
/// the slot empty, so the next caller runs its loader again.
pub struct ModelSlot<T> {
    cell: OnceCell<Arc<T>>,
}

impl<T: Send + Sync + 'static> ModelSlot<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// The loaded value, running `load` on the blocking pool if the slot is empty.
    pub async fn get_or_load<F>(&self, load: F) -> Result<Arc<T>, BackendError>
    where
        F: FnOnce() -> Result<T, BackendError> + Send + 'static,
    {
        let value = self
            .cell
            .get_or_try_init(|| async move {
                tokio::task::spawn_blocking(load)
                    .await
                    .map_err(|e| BackendError::Inference(format!("model load task failed: {e}")))?
                    .map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(value))
    }
}

impl<T: Send + Sync + 'static> Default for ModelSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(feature = "onnx")]
pub use onnx::OnnxBackend;

#[cfg(feature = "onnx")]
mod onnx {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use precis_ai::{DecodingConfig, Summarizer, SummarizerOptions};
    use precis_core::{GenerationParams, GenerationSettings, ModelSettings};
    use tracing::{info, warn};

    use super::{BackendError, ModelSlot, SummaryBackend};

    /// Process-wide summarizer, loaded once on first use.
    pub struct OnnxBackend {
        checkpoint_dir: PathBuf,
        options: SummarizerOptions,
        generation: GenerationSettings,
        slot: ModelSlot<Mutex<Summarizer>>,
    }

    impl OnnxBackend {
        pub fn new(model: &ModelSettings, generation: GenerationSettings) -> Self {
            Self {
                checkpoint_dir: model.checkpoint_dir.clone(),
                options: SummarizerOptions::from(model),
                generation,
                slot: ModelSlot::new(),
            }
        }

        /// Whether the model has been loaded.
        pub fn is_loaded(&self) -> bool {
            self.slot.is_loaded()
        }

        async fn summarizer(&self) -> Result<Arc<Mutex<Summarizer>>, BackendError> {
            let dir = self.checkpoint_dir.clone();
            let options = self.options.clone();
            self.slot
                .get_or_load(move || {
                    info!(checkpoint = %dir.display(), "loading summarization model");
                    Summarizer::load(&dir, options).map(Mutex::new).map_err(|e| {
                        warn!(error = %e, "model load failed");
                        BackendError::from(e)
                    })
                })
                .await
        }
    }

    #[async_trait]
    impl SummaryBackend for OnnxBackend {
        async fn ensure_loaded(&self) -> Result<(), BackendError> {
            self.summarizer().await.map(|_| ())
        }

        async fn summarize(
            &self,
            text: String,
            params: GenerationParams,
        ) -> Result<String, BackendError> {
            let summarizer = self.summarizer().await?;
            let decoding = DecodingConfig::new(&params, &self.generation);

            // ONNX sessions need `&mut`, so requests take turns on the blocking pool.
            tokio::task::spawn_blocking(move || {
                let mut guard = summarizer
                    .lock()
                    .map_err(|_| anyhow::anyhow!("summarizer lock poisoned"))?;
                guard.summarize(&text, &decoding)
            })
            .await
            .map_err(|e| BackendError::Inference(format!("generation task failed: {e}")))?
            .map_err(|e| BackendError::Inference(format!("{e:#}")))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn backend_for(dir: PathBuf) -> OnnxBackend {
            let model = ModelSettings {
                checkpoint_dir: dir,
                ..ModelSettings::default()
            };
            OnnxBackend::new(&model, GenerationSettings::default())
        }

        #[tokio::test]
        async fn missing_checkpoint_reports_not_found() {
            let tmp = tempfile::tempdir().unwrap();
            let backend = backend_for(tmp.path().join("checkpoint-1878"));

            let err = backend.ensure_loaded().await.unwrap_err();
            assert!(matches!(err, BackendError::ModelNotFound(_)));
            assert!(!backend.is_loaded());
        }

        #[tokio::test]
        async fn failed_load_is_retried() {
            let tmp = tempfile::tempdir().unwrap();
            let backend = backend_for(tmp.path().join("later"));

            assert!(backend.ensure_loaded().await.is_err());
            // Still missing, so the second attempt fails the same way rather
            // than returning a cached error.
            let err = backend
                .summarize("text".into(), GenerationParams::default())
                .await
                .unwrap_err();
            assert!(matches!(err, BackendError::ModelNotFound(_)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_loader(
        loads: Arc<AtomicUsize>,
        result: Result<u32, BackendError>,
    ) -> impl FnOnce() -> Result<u32, BackendError> + Send + 'static {
        move || {
            loads.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            result
        }
    }

    #[tokio::test]
    async fn concurrent_first_use_loads_once() {
        let slot = ModelSlot::new();
        let loads = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            slot.get_or_load(counting_loader(loads.clone(), Ok(7))),
            slot.get_or_load(counting_loader(loads.clone(), Ok(8))),
        );

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(*a, 7);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(slot.is_loaded());
    }

    #[tokio::test]
    async fn failed_load_leaves_slot_empty() {
        let slot = ModelSlot::new();
        let loads = Arc::new(AtomicUsize::new(0));

        let missing = BackendError::ModelNotFound("no checkpoint".into());
        let err = slot
            .get_or_load(counting_loader(loads.clone(), Err(missing.clone())))
            .await
            .unwrap_err();
        assert_eq!(err, missing);
        assert!(!slot.is_loaded());

        let value = slot
            .get_or_load(counting_loader(loads.clone(), Ok(3)))
            .await
            .unwrap();
        assert_eq!(*value, 3);
        assert_eq!(loads.load(Ordering::SeqCst), 2);

        // Loaded now; later loaders are not run.
        let value = slot
            .get_or_load(counting_loader(loads.clone(), Ok(4)))
            .await
            .unwrap();
        assert_eq!(*value, 3);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }
}
