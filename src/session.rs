//! Observable classification session for hosts (CLI, services).
//!
//! Wraps a shared [`Classifier`] with the bookkeeping around a single
//! classification: advice lookup, history persistence and a state snapshot
//! subscribers can watch.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::DynamicImage;
use thiserror::Error;
use tokio::sync::{Mutex, watch};

use crate::advice::{DisposalAdvice, advice_for};
use crate::classify::Classifier;
use crate::core::db::{HistoryDb, HistoryRepository, NewWasteRecord, UserRepository, WasteRecord};
use crate::models::Prediction;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("a classification is already in progress")]
    Busy,
    #[error("session is closed")]
    Closed,
    #[error("classification worker failed: {0}")]
    Worker(String),
}

/// Snapshot published after every state change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub prediction: Option<Prediction>,
    pub advice: Option<DisposalAdvice>,
    /// Records of the current user, most recent first
    pub history: Vec<WasteRecord>,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct ClassificationSession {
    classifier: Arc<Classifier>,
    history: Option<HistoryDb>,
    state: watch::Sender<SessionState>,
    in_flight: Mutex<()>,
    closed: AtomicBool,
}

impl ClassificationSession {
    pub fn new(classifier: Arc<Classifier>, history: Option<HistoryDb>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            classifier,
            history,
            state,
            in_flight: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn classifier(&self) -> &Arc<Classifier> {
        &self.classifier
    }

    /// Classify an image, persist it to history and publish the result.
    ///
    /// Fails with [`SessionError::Busy`] when another classification is
    /// pending; the pending one is unaffected.
    pub async fn classify(
        &self,
        image: DynamicImage,
        image_uri: Option<String>,
    ) -> Result<Prediction, SessionError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SessionError::Closed);
        }
        let _flight = self.in_flight.try_lock().map_err(|_| SessionError::Busy)?;

        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        let classifier = Arc::clone(&self.classifier);
        let prediction = match tokio::task::spawn_blocking(move || classifier.classify(&image)).await {
            Ok(prediction) => prediction,
            Err(e) => {
                let err = SessionError::Worker(e.to_string());
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(format!("Classification failed: {}", err));
                });
                return Err(err);
            }
        };
        let advice = advice_for(&prediction.label);

        let mut error = None;
        let mut records = None;
        if let Some(history) = &self.history {
            match save_record(history, &prediction, &advice, image_uri).await {
                Ok(user_records) => records = Some(user_records),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to save classification to history");
                    error = Some(format!("Failed to save to history: {:#}", e));
                }
            }
        }

        self.state.send_modify(|s| {
            s.prediction = Some(prediction.clone());
            s.advice = Some(advice);
            if let Some(records) = records {
                s.history = records;
            }
            s.loading = false;
            s.error = error;
        });
        Ok(prediction)
    }

    /// Reload the current user's records into the published state.
    pub async fn load_history(&self) -> Result<(), SessionError> {
        let Some(history) = &self.history else {
            return Ok(());
        };
        match current_user_records(history).await {
            Ok(records) => self.state.send_modify(|s| s.history = records),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load history");
                self.state
                    .send_modify(|s| s.error = Some(format!("Failed to load history: {:#}", e)));
            }
        }
        Ok(())
    }

    pub fn clear_error(&self) {
        self.state.send_modify(|s| s.error = None);
    }

    /// Release the classifier. Only the first call has an effect.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.classifier.close();
        tracing::debug!("classification session closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for ClassificationSession {
    fn drop(&mut self) {
        self.close();
    }
}

async fn save_record(
    history: &HistoryDb,
    prediction: &Prediction,
    advice: &DisposalAdvice,
    image_uri: Option<String>,
) -> anyhow::Result<Vec<WasteRecord>> {
    let user = history.get_current_user().await?;
    history
        .create_record(NewWasteRecord {
            user_id: user.id.to_string(),
            waste_type: prediction.label.clone(),
            confidence: prediction.confidence,
            image_uri,
            disposal_advice: advice.advice.clone(),
            ..Default::default()
        })
        .await?;
    history.get_records_for_user(&user.id.to_string()).await
}

async fn current_user_records(history: &HistoryDb) -> anyhow::Result<Vec<WasteRecord>> {
    let user = history.get_current_user().await?;
    history.get_records_for_user(&user.id.to_string()).await
}
