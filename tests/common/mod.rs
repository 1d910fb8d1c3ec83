mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from wastesort for tests
pub use wastesort::core::db::{
    GUEST_USER_NAME, GeoLocation, HistoryDb, HistoryRepository, NewWasteRecord, ProfileUpdate,
    UserRepository, WasteRecord,
};
pub use wastesort::{
    ClassificationSession, Classifier, ClassifierSettings, InferenceBackend, InferenceEngine,
    InferenceError, InputSpec, InputTensor, LabelSet, ModelAssets, Prediction, RawScores,
    SessionError, TensorLayout,
};
