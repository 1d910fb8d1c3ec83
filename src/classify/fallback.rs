//! Model-free heuristic classification from the average image color.
//!
//! Keeps the classifier usable when no model is bundled. The result is a pure
//! function of the pixel data, so tests and demos behave the same on every run.

use image::{DynamicImage, GenericImageView};

use crate::models::Prediction;

/// Sample every `DEFAULT_STRIDE`-th pixel along both axes.
pub const DEFAULT_STRIDE: u32 = 10;

/// Mean 8-bit channel values over the sampled pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AverageColor {
    pub red: u32,
    pub green: u32,
    pub blue: u32,
}

impl AverageColor {
    /// Average over a strided sample starting at (0, 0). Integer division, as
    /// the thresholds below are defined on whole channel values.
    pub fn sample(img: &DynamicImage, stride: u32) -> Self {
        let stride = stride.max(1) as usize;
        let (mut red, mut green, mut blue, mut count) = (0u64, 0u64, 0u64, 0u64);

        for y in (0..img.height()).step_by(stride) {
            for x in (0..img.width()).step_by(stride) {
                let [r, g, b, _] = img.get_pixel(x, y).0;
                red += r as u64;
                green += g as u64;
                blue += b as u64;
                count += 1;
            }
        }

        if count == 0 {
            return Self { red: 0, green: 0, blue: 0 };
        }

        Self {
            red: (red / count) as u32,
            green: (green / count) as u32,
            blue: (blue / count) as u32,
        }
    }

    fn is_washed_out(&self) -> bool {
        self.red > 200 && self.green > 200 && self.blue > 200
    }

    fn looks_like_plastic(&self) -> bool {
        // washed-out images belong to the glass rule
        if self.is_washed_out() {
            return false;
        }
        let (r, g, b) = (self.red as f32, self.green as f32, self.blue as f32);
        (self.blue > 100 && self.green > 100)
            || (self.red >= 180 && self.green >= 180 && self.blue >= 180)
            || (b > r * 0.8 && b > g * 0.8)
    }

    fn is_green_dominant(&self) -> bool {
        self.green > self.red && self.green > self.blue
    }

    fn is_blue_dominant(&self) -> bool {
        self.blue > self.red && self.blue > self.green
    }

    fn is_warm(&self) -> bool {
        self.red > self.blue && self.green > self.blue
    }
}

/// One entry of the ordered decision list.
pub struct FallbackRule {
    pub name: &'static str,
    pub matches: fn(&AverageColor) -> bool,
    pub decide: fn(&AverageColor) -> Prediction,
}

fn blue_dominant_prediction(c: &AverageColor) -> Prediction {
    if c.blue as i64 - c.red as i64 > 50 {
        Prediction::new("Non-Biodegradable", 0.82)
    } else {
        Prediction::new("Inorganic", 0.75)
    }
}

fn dominant_channel_prediction(c: &AverageColor) -> Prediction {
    let label = if c.red > c.green && c.red > c.blue {
        "Organic"
    } else if c.green > c.red && c.green > c.blue {
        "Biodegradable"
    } else if c.blue > c.red && c.blue > c.green {
        "Non-Biodegradable"
    } else {
        "Inorganic"
    };
    Prediction::new(label, 0.70)
}

/// Evaluated top to bottom; the first match wins.
pub const RULES: [FallbackRule; 6] = [
    FallbackRule {
        name: "plastic signature",
        matches: AverageColor::looks_like_plastic,
        decide: |_| Prediction::new("Non-Biodegradable", 0.88),
    },
    FallbackRule {
        name: "washed out",
        matches: AverageColor::is_washed_out,
        decide: |_| Prediction::new("Glass", 0.85),
    },
    FallbackRule {
        name: "green dominant",
        matches: AverageColor::is_green_dominant,
        decide: |_| Prediction::new("Biodegradable", 0.78),
    },
    FallbackRule {
        name: "blue dominant",
        matches: AverageColor::is_blue_dominant,
        decide: blue_dominant_prediction,
    },
    FallbackRule {
        name: "warm dominant",
        matches: AverageColor::is_warm,
        decide: |_| Prediction::new("Organic", 0.79),
    },
    FallbackRule {
        name: "dominant channel",
        matches: |_| true,
        decide: dominant_channel_prediction,
    },
];

/// Apply the ordered rules to an average color.
pub fn decide(color: &AverageColor) -> Prediction {
    RULES
        .iter()
        .find(|rule| (rule.matches)(color))
        .map(|rule| {
            tracing::debug!(rule = rule.name, ?color, "fallback rule matched");
            (rule.decide)(color)
        })
        .unwrap_or_else(|| dominant_channel_prediction(color))
}

#[derive(Debug, Clone, Copy)]
pub struct FallbackClassifier {
    pub stride: u32,
}

impl FallbackClassifier {
    pub fn new(stride: u32) -> Self {
        Self { stride: stride.max(1) }
    }

    pub fn classify(&self, img: &DynamicImage) -> Prediction {
        decide(&AverageColor::sample(img, self.stride))
    }
}

impl Default for FallbackClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_STRIDE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn color(red: u32, green: u32, blue: u32) -> AverageColor {
        AverageColor { red, green, blue }
    }

    fn solid(r: u8, g: u8, b: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(64, 48, |_, _| Rgb([r, g, b])))
    }

    #[test]
    fn sample_uses_stride() {
        // only (0,0), (10,0), (0,10), (10,10) are sampled
        let img = ImageBuffer::from_fn(20, 20, |x, y| {
            if x % 10 == 0 && y % 10 == 0 { Rgb([200u8, 100, 0]) } else { Rgb([0u8, 0, 0]) }
        });
        let avg = AverageColor::sample(&DynamicImage::ImageRgb8(img), 10);
        assert_eq!(avg, color(200, 100, 0));
    }

    #[test]
    fn white_is_glass() {
        assert_eq!(decide(&color(255, 255, 255)), Prediction::new("Glass", 0.85));
    }

    #[test]
    fn bright_grey_is_plastic() {
        assert_eq!(decide(&color(190, 185, 182)), Prediction::new("Non-Biodegradable", 0.88));
    }

    #[test]
    fn green_is_biodegradable() {
        assert_eq!(decide(&color(0, 255, 0)), Prediction::new("Biodegradable", 0.78));
    }

    #[test]
    fn warm_is_organic() {
        assert_eq!(decide(&color(200, 150, 50)), Prediction::new("Organic", 0.79));
    }

    #[test]
    fn red_falls_through_to_dominant_channel() {
        assert_eq!(decide(&color(200, 50, 50)), Prediction::new("Organic", 0.70));
    }

    #[test]
    fn black_is_a_full_tie() {
        assert_eq!(decide(&color(0, 0, 0)), Prediction::new("Inorganic", 0.70));
    }

    #[test]
    fn rules_are_first_match() {
        // pure blue also satisfies the blue-dominant rule, but plastic comes first
        let blue = color(0, 0, 255);
        assert!((RULES[3].matches)(&blue));
        assert_eq!(decide(&blue), Prediction::new("Non-Biodegradable", 0.88));
    }

    #[test]
    fn blue_dominant_rule_splits_on_red_gap() {
        assert_eq!(
            (RULES[3].decide)(&color(40, 30, 120)),
            Prediction::new("Non-Biodegradable", 0.82)
        );
        assert_eq!(
            (RULES[3].decide)(&color(90, 30, 120)),
            Prediction::new("Inorganic", 0.75)
        );
    }

    #[test]
    fn classify_is_deterministic() {
        let img = ImageBuffer::from_fn(123, 77, |x, y| Rgb([(x * 2) as u8, (y * 3) as u8, ((x + y) % 256) as u8]));
        let img = DynamicImage::ImageRgb8(img);
        let classifier = FallbackClassifier::default();
        let first = classifier.classify(&img);
        for _ in 0..5 {
            assert_eq!(classifier.classify(&img), first);
        }
    }

    #[test]
    fn solid_images() {
        let classifier = FallbackClassifier::default();
        assert_eq!(classifier.classify(&solid(255, 255, 255)).label, "Glass");
        assert_eq!(classifier.classify(&solid(0, 255, 0)).label, "Biodegradable");
    }
}
