use serde::{Deserialize, Serialize};

/// How to dispose of a classified item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisposalAdvice {
    pub category: String,
    pub advice: String,
    pub icon: String,
}

struct AdviceEntry {
    keys: &'static [&'static str],
    category: &'static str,
    advice: &'static str,
    icon: &'static str,
}

// Substring matching walks this table in order, so keys that contain another
// key ("non-biodegradable", "inorganic") come before it.
const ADVICE_TABLE: &[AdviceEntry] = &[
    AdviceEntry {
        keys: &["non-biodegradable", "inorganic"],
        category: "Non-Biodegradable/Inorganic",
        advice: "Dispose in dry waste bin, consider recycling. Check if materials can be processed at recycling centers.",
        icon: "🗑️",
    },
    AdviceEntry {
        keys: &["biodegradable", "organic"],
        category: "Biodegradable/Organic",
        advice: "Can be composted into manure. Create a compost pile or use a compost bin for natural decomposition.",
        icon: "🌱",
    },
    AdviceEntry {
        keys: &["glass"],
        category: "Glass",
        advice: "Recycle at glass recycling unit. Clean the glass and remove any metal lids before recycling.",
        icon: "🔗",
    },
    AdviceEntry {
        keys: &["plastic"],
        category: "Plastic",
        advice: "Sort by plastic type and recycle appropriately. Clean containers before recycling.",
        icon: "♻️",
    },
    AdviceEntry {
        keys: &["metal"],
        category: "Metal",
        advice: "Clean and recycle at metal recycling facility. Separate different metal types if possible.",
        icon: "🔧",
    },
    AdviceEntry {
        keys: &["paper", "cardboard"],
        category: "Paper/Cardboard",
        advice: "Recycle in paper recycling bin. Remove any plastic tape or staples before recycling.",
        icon: "📄",
    },
    AdviceEntry {
        keys: &["trash", "general waste"],
        category: "General Waste",
        advice: "Dispose in general waste bin. Consider if any parts can be separated for recycling.",
        icon: "🗑️",
    },
];

const UNKNOWN: AdviceEntry = AdviceEntry {
    keys: &[],
    category: "Unknown",
    advice: "Unable to classify waste type. Please dispose responsibly and consider consulting local waste management guidelines.",
    icon: "❓",
};

impl From<&AdviceEntry> for DisposalAdvice {
    fn from(entry: &AdviceEntry) -> Self {
        Self {
            category: entry.category.to_string(),
            advice: entry.advice.to_string(),
            icon: entry.icon.to_string(),
        }
    }
}

/// Disposal advice for a label.
///
/// Matches the lowercase label exactly first, then by substring (so
/// "Plastic Bottle" gets the plastic advice), then returns the "Unknown" entry.
pub fn advice_for(label: &str) -> DisposalAdvice {
    let label = label.trim().to_lowercase();

    let exact = ADVICE_TABLE
        .iter()
        .find(|entry| entry.keys.iter().any(|key| *key == label));
    let entry = exact
        .or_else(|| {
            ADVICE_TABLE
                .iter()
                .find(|entry| entry.keys.iter().any(|key| label.contains(*key)))
        })
        .unwrap_or(&UNKNOWN);

    entry.into()
}

/// Display categories shown to the user.
pub fn all_categories() -> &'static [&'static str] {
    &[
        "Glass",
        "Biodegradable",
        "Non-Biodegradable",
        "Organic",
        "Inorganic",
        "Plastic",
        "Metal",
        "Paper",
        "Cardboard",
    ]
}
