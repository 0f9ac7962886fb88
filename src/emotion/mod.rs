use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::IntoEnumIterator;

use crate::error::{RecError, RecResult};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
    strum_macros::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Calm,
}

impl Emotion {
    /// Trims and lower-cases `raw` before matching. Anything outside the
    /// fixed set is rejected here and never reaches the selector.
    pub fn parse(raw: &str) -> RecResult<Self> {
        let normalized = raw.trim().to_lowercase();
        Emotion::from_str(&normalized).map_err(|_| RecError::InvalidEmotion {
            value: raw.to_string(),
        })
    }

    /// Genre tags for the mood, highest priority first.
    pub fn genres(&self) -> &'static [&'static str] {
        match self {
            Emotion::Happy => &[
                "pop", "dance", "edm", "k-pop", "reggaeton", "house", "funk", "hip-hop", "trap",
            ],
            Emotion::Sad => &[
                "acoustic",
                "indie folk",
                "singer-songwriter",
                "lo-fi",
                "blues",
                "jazz",
            ],
            Emotion::Angry => &["hard rock", "heavy metal", "punk", "hardcore hip-hop", "drill"],
            Emotion::Calm => &[
                "ambient",
                "classical",
                "soft rock",
                "indie folk",
                "chillstep",
                "lo-fi",
            ],
        }
    }

    /// "Happy", "Sad", ... for playlist names.
    pub fn title(&self) -> String {
        let name = self.as_ref();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    pub fn valid_options() -> String {
        Emotion::iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
