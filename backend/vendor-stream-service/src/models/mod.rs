pub mod twitter;

use serde::{Deserialize, Serialize};

pub use twitter::{
    Includes, MatchingRule, Place, PlaceGeo, ProblemCode, RawStreamEvent, RawTweet,
    StreamProblem, TweetGeo, User,
};

/// Filter rule as submitted to the rules endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub value: String,
    pub tag: String,
}

/// Rule as reported back by the rules endpoint, carrying its remote id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledRule {
    pub id: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Row of the vendors table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vendor {
    pub twitter_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Normalized, storage/queue-ready representation of one matched tweet.
///
/// `id` is the tweet id: unique and stable across re-deliveries, so consumers
/// of the stored list de-duplicate on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub id: String,
    pub subject_id: String,
    pub subject_name: String,
    pub text: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<Geotag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geotag {
    pub id: String,
    pub name: String,
    pub full_name: String,
    pub place_type: String,
    pub country: String,
    pub country_code: String,
    pub coordinates: Coordinates,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub long: f64,
}
