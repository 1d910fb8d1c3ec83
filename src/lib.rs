pub mod advice;
pub mod assets;
pub mod assistant;
pub mod classify;
pub mod config;
pub mod core;
pub mod models;
pub mod session;

pub use advice::{DisposalAdvice, advice_for, all_categories};
pub use assets::ModelAssets;
pub use classify::{
    Classifier, run_with_fallback,
    engine::{EngineState, InferenceBackend, InferenceEngine, InputSpec, RtenBackend, TensorLayout},
    error::{ClassifyError, InferenceError, LoadError, PreprocessError},
    fallback::FallbackClassifier,
    scores::{ScoreInterpreter, ScoreNormalization},
};
pub use config::{ClassifierSettings, HistorySettings, Settings};
pub use models::{InputTensor, LabelSet, Prediction, RawScores};
pub use session::{ClassificationSession, SessionError, SessionState};
