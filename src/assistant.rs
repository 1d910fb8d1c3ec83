//! Offline waste-management assistant.
//!
//! Replies are picked by keyword, first matching topic wins.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message: String,
    pub is_user: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl ChatMessage {
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_user: true,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn bot(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_user: false,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

struct Topic {
    matches: fn(&str) -> bool,
    reply: &'static str,
}

const TOPICS: &[Topic] = &[
    Topic {
        matches: |m| m.contains("hello") || m.contains("hi") || m.contains("hey"),
        reply: "Hello! I'm your waste management assistant. I can help you with recycling tips, \
                waste classification, disposal advice, and environmental best practices. \
                How can I assist you today?",
    },
    Topic {
        matches: |m| m.contains("recycle") || m.contains("recycling"),
        reply: "Great question! Here are some recycling tips:\n\n\
                ♻️ Separate materials before recycling\n\
                🔹 Clean containers to avoid contamination\n\
                🔹 Check local recycling guidelines\n\
                🔹 Remove caps and labels when possible\n\
                🔹 Flatten cardboard boxes to save space\n\n\
                What specific item would you like to recycle?",
    },
    Topic {
        matches: |m| m.contains("plastic"),
        reply: "Plastic recycling tips:\n\n\
                • Rinse and clean plastic containers\n\
                • Remove labels if possible\n\
                • Check recycling symbols (♻️ #1-7)\n\
                • Not all plastics can be recycled locally\n\
                • Consider reusable alternatives for single-use items\n\n\
                Did you know: Some plastic items like bags often require special drop-off locations?",
    },
    Topic {
        matches: |m| m.contains("glass"),
        reply: "Glass recycling guide:\n\n\
                🔹 Clean glass thoroughly before recycling\n\
                🔹 Remove metal lids and caps\n\
                🔹 Glass bottles and jars are typically recyclable\n\
                🔹 Windows, mirrors, and ceramics are NOT recyclable\n\
                🔹 Broken glass should be wrapped before disposal\n\n\
                Tip: Keep different colored glass separate if required by your facility.",
    },
    Topic {
        matches: |m| m.contains("organic") || m.contains("compost") || m.contains("biodegradable"),
        reply: "Organic waste management:\n\n\
                🌱 Compost fruits, vegetables, and yard waste\n\
                🔹 Avoid meat, dairy, and oily foods in compost\n\
                🔹 Keep compost balanced\n\
                🔹 Turn compost regularly for better decomposition\n\
                🔹 Can create rich fertilizer for your garden\n\n\
                Would you like tips on starting your own compost pile?",
    },
    Topic {
        matches: |m| m.contains("hazardous") || m.contains("battery") || m.contains("electronic"),
        reply: "⚠️ Important: Hazardous waste disposal\n\n\
                Batteries, electronics, chemicals, and medications require special handling:\n\n\
                • Check for local hazardous waste collection events\n\
                • Electronics: Use e-waste recycling centers\n\
                • Batteries: Find battery recycling locations\n\
                • Medications: Return to pharmacies or approved collection sites\n\
                • Never dispose in regular trash or down drains\n\n\
                Safety first! Always follow local hazardous waste guidelines.",
    },
    Topic {
        matches: |m| m.contains("thank"),
        reply: "You're welcome! I'm here to help you with any waste management questions. \
                Feel free to ask me anything about recycling, disposal, or sustainable practices! 🌍♻️",
    },
    Topic {
        matches: |m| m.contains("reduce") || m.contains("less waste"),
        reply: "Reduce waste strategies:\n\n\
                ✓ Bring reusable bags to stores\n\
                ✓ Use a reusable water bottle\n\
                ✓ Avoid single-use plastics\n\
                ✓ Buy in bulk to reduce packaging\n\
                ✓ Use digital receipts instead of paper\n\
                ✓ Repair items instead of replacing\n\
                ✓ Donate items you no longer need\n\n\
                Remember: The best waste is the waste we don't create!",
    },
    Topic {
        matches: |m| m.contains("paper") || m.contains("cardboard"),
        reply: "Paper and cardboard recycling:\n\n\
                📄 Recycle newspapers, magazines, and office paper\n\
                📦 Flatten cardboard boxes for easier processing\n\
                🔹 Remove plastic tape and labels\n\
                🔹 Ensure paper is clean and dry\n\
                ⚠️ Greasy pizza boxes may not be recyclable\n\
                🔹 Shredded paper may need special handling\n\n\
                Tip: One ton of recycled paper saves 17 trees!",
    },
    Topic {
        matches: |m| m.contains("where") && m.contains("recycle"),
        reply: "Finding recycling locations:\n\n\
                • Check your local government website\n\
                • Use recycling center locator apps\n\
                • Contact your waste management provider\n\
                • Look for community recycling programs\n\
                • Some stores offer recycling for specific items\n\n\
                Many cities have online directories of recycling facilities!",
    },
];

const DEFAULT_REPLY: &str = "I understand you're asking about waste management. I can help you with:\n\n\
    ♻️ Recycling guidelines\n\
    🗑️ Waste classification\n\
    🌱 Composting advice\n\
    ⚠️ Hazardous waste disposal\n\
    🔹 Disposal methods for specific materials\n\
    🌍 Environmental best practices\n\n\
    What would you like to know more about?";

/// Canned reply for a user message.
pub fn reply(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    TOPICS
        .iter()
        .find(|topic| (topic.matches)(&lower))
        .map(|topic| topic.reply)
        .unwrap_or(DEFAULT_REPLY)
}

pub fn welcome_message() -> ChatMessage {
    ChatMessage::bot(
        "👋 Hello! I'm your AI waste management assistant. \
         I can help you with recycling, waste disposal, and environmental best practices. \
         Ask me anything about waste management!",
    )
}
