use serde::{Deserialize, Serialize};

/// Labels used when no labels resource is bundled.
pub const DEFAULT_LABELS: [&str; 5] = [
    "Glass",
    "Biodegradable",
    "Non-Biodegradable",
    "Organic",
    "Inorganic",
];

/// Ordered class names, index-aligned with the model's output positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Parse newline separated labels. Lines are trimmed and blank lines skipped.
    /// Returns `None` when nothing usable remains.
    pub fn parse(text: &str) -> Option<Self> {
        let labels: Vec<String> = text
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();

        if labels.is_empty() {
            None
        } else {
            Some(Self { labels })
        }
    }

    /// Parse a labels resource, substituting the built-in set when it is
    /// missing, not UTF-8, or empty.
    pub fn from_resource(bytes: Option<&[u8]>) -> Self {
        bytes
            .and_then(|b| std::str::from_utf8(b).ok())
            .and_then(Self::parse)
            .unwrap_or_default()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self {
            labels: DEFAULT_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// Flat `height x width x 3` buffer of RGB floats in `[0, 1]`, row-major.
#[derive(Debug, Clone)]
pub struct InputTensor {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl InputTensor {
    pub const CHANNELS: usize = 3;

    /// Size of the serialized buffer: 4 bytes per float.
    pub fn byte_len(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    /// Serialize the floats in native byte order.
    pub fn to_ne_bytes(&self) -> Vec<u8> {
        self.data.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    /// RGB triple at pixel (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
        let px = self.data.get(offset..offset + Self::CHANNELS)?;
        Some([px[0], px[1], px[2]])
    }
}

/// One score per label index, as produced by a single forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RawScores(Vec<f32>);

impl RawScores {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f32>> for RawScores {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// A label with its confidence in `[0, 1]`.
///
/// Confidences from the heuristic fallback are fixed per rule and carry no
/// statistical meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.label.is_empty() && self.confidence.is_finite() && (0.0..=1.0).contains(&self.confidence)
    }
}
