//! Lead scoring.
//!
//! A lead's priority is a weighted sum of three signals from the form: the
//! selling interest flag, the buying interest flag and how soon the person
//! wants to act. The result is recomputed whenever any of the three inputs
//! change on a stored lead.

use serde::{Deserialize, Serialize};

pub const SCORE_VERSION: &str = "v1";

const SELLING_POINTS: i64 = 30;
const BUYING_POINTS: i64 = 20;

const HOT_THRESHOLD: i64 = 70;
const WARM_THRESHOLD: i64 = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringInput<'a> {
    pub selling_interest: bool,
    pub buying_interest: bool,
    pub timeframe: &'a str,
}

/// Normalised timeframe bucket and the points it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeframeBucket {
    Asap,
    WithinThreeMonths,
    ThreeToSixMonths,
    SixToTwelveMonths,
    Unknown,
}

impl TimeframeBucket {
    pub fn classify(raw: &str) -> Self {
        let normalized: String = raw
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .replace(['–', '—'], "-")
            .replace(" - ", "-");

        match normalized.as_str() {
            "asap" | "immediately" | "now" | "as soon as possible" => Self::Asap,
            "1-3 months" | "within 3 months" | "0-3 months" | "1-3m" => Self::WithinThreeMonths,
            "3-6 months" | "3-6m" => Self::ThreeToSixMonths,
            "6-12 months" | "6-12m" => Self::SixToTwelveMonths,
            _ => Self::Unknown,
        }
    }

    pub fn points(self) -> i64 {
        match self {
            Self::Asap => 50,
            Self::WithinThreeMonths => 35,
            Self::ThreeToSixMonths => 20,
            Self::SixToTwelveMonths => 10,
            Self::Unknown => 0,
        }
    }
}

/// Points contributed by each signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreFactors {
    pub selling_interest: i64,
    pub buying_interest: i64,
    pub timeframe: i64,
    pub timeframe_bucket: TimeframeBucket,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub total_score: i64,
    pub category: String,
    pub score_version: String,
    pub factors: ScoreFactors,
}

pub fn category_for(total: i64) -> &'static str {
    if total >= HOT_THRESHOLD {
        "hot"
    } else if total >= WARM_THRESHOLD {
        "warm"
    } else {
        "cold"
    }
}

pub fn compute_score(input: &ScoringInput<'_>) -> ScoreResult {
    let bucket = TimeframeBucket::classify(input.timeframe);
    let factors = ScoreFactors {
        selling_interest: if input.selling_interest { SELLING_POINTS } else { 0 },
        buying_interest: if input.buying_interest { BUYING_POINTS } else { 0 },
        timeframe: bucket.points(),
        timeframe_bucket: bucket,
    };
    let total_score = factors.selling_interest + factors.buying_interest + factors.timeframe;

    ScoreResult {
        total_score,
        category: category_for(total_score).to_string(),
        score_version: SCORE_VERSION.to_string(),
        factors,
    }
}

/// Interprets a `"yes"`/`"no"` form flag; anything but `yes` is no.
pub fn parse_interest_flag(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("yes")
}
