use std::io::ErrorKind;
use std::path::Path;

use crate::classify::error::LoadError;

pub const MODEL_FILE_NAME: &str = "model.rten";
pub const LABELS_FILE_NAME: &str = "labels.txt";

/// The two immutable resources the classifier starts from. Either may be absent.
#[derive(Debug, Clone, Default)]
pub struct ModelAssets {
    pub model: Option<Vec<u8>>,
    pub labels: Option<Vec<u8>>,
}

impl ModelAssets {
    /// No model and no labels: heuristic classification with the default labels.
    pub fn none() -> Self {
        Self::default()
    }

    /// Read `model.rten` and `labels.txt` from a directory.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            model: read_optional(&dir.join(MODEL_FILE_NAME)),
            labels: read_optional(&dir.join(LABELS_FILE_NAME)),
        }
    }

    pub fn with_model(mut self, bytes: Vec<u8>) -> Self {
        self.model = Some(bytes);
        self
    }

    pub fn with_labels(mut self, text: impl Into<String>) -> Self {
        self.labels = Some(text.into().into_bytes());
        self
    }
}

fn read_optional(path: &Path) -> Option<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => {
            tracing::debug!(path = %path.display(), len = bytes.len(), "read asset");
            Some(bytes)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "asset not present");
            None
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %LoadError::Io(e), "treating asset as missing");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dir_yields_no_assets() {
        let dir = tempfile::TempDir::new().unwrap();
        let assets = ModelAssets::from_dir(dir.path().join("nope"));
        assert!(assets.model.is_none());
        assert!(assets.labels.is_none());
    }

    #[test]
    fn reads_fixed_names() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join(LABELS_FILE_NAME), "glass\nmetal\n").unwrap();

        let assets = ModelAssets::from_dir(dir.path());
        assert!(assets.model.is_none());
        assert_eq!(assets.labels.as_deref(), Some(&b"glass\nmetal\n"[..]));
    }
}
