//! Wire shapes of the filtered stream endpoint.

use serde::{Deserialize, Serialize};

/// One data frame: the matched tweet plus its expansions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawStreamEvent {
    #[serde(default)]
    pub data: Option<RawTweet>,
    #[serde(default)]
    pub includes: Includes,
    #[serde(default)]
    pub matching_rules: Vec<MatchingRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Includes {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub tweets: Vec<RawTweet>,
    #[serde(default)]
    pub places: Vec<Place>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTweet {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub geo: Option<TweetGeo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TweetGeo {
    #[serde(default)]
    pub place_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub place_type: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub geo: Option<PlaceGeo>,
}

/// GeoJSON-style bounding box: `[west_long, south_lat, east_long, north_lat]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceGeo {
    #[serde(default, rename = "type")]
    pub geo_type: Option<String>,
    #[serde(default)]
    pub bbox: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingRule {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

/// Problem document sent by the endpoint, either in a non-2xx connect response
/// or in-band as an error frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamProblem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default, rename = "type")]
    pub problem_type: Option<String>,
    #[serde(default)]
    pub connection_issue: Option<String>,
    #[serde(default)]
    pub disconnect_type: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
}

/// Structured classification of a `StreamProblem`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemCode {
    Unauthorized,
    TooManyConnections,
    OperationalDisconnect,
    RateLimited,
    Other,
}

const CONNECTION_LIMIT_DETAIL: &str = "maximum allowed connection";

impl StreamProblem {
    /// Parse a problem out of a response body or frame.
    ///
    /// Accepts both a bare problem object and the `{"errors": [...]}` envelope,
    /// in which case the first entry is used.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        if let Some(first) = value
            .get("errors")
            .and_then(|errors| errors.as_array())
            .and_then(|errors| errors.first())
        {
            return serde_json::from_value(first.clone()).ok();
        }

        let has_problem_fields = ["title", "detail", "connection_issue", "type"]
            .iter()
            .any(|key| value.get(key).is_some());
        if has_problem_fields {
            return serde_json::from_value(value.clone()).ok();
        }

        None
    }

    /// Classify by structured fields first; the free-text detail is only a
    /// fallback when none of them is recognised.
    pub fn code(&self) -> ProblemCode {
        if let Some(issue) = self.connection_issue.as_deref() {
            if issue == "TooManyConnections" {
                return ProblemCode::TooManyConnections;
            }
        }

        if let Some(kind) = self.disconnect_type.as_deref() {
            if kind.contains("OperationalDisconnect") {
                return ProblemCode::OperationalDisconnect;
            }
        }

        if let Some(problem_type) = self.problem_type.as_deref() {
            let slug = problem_type.rsplit('/').next().unwrap_or(problem_type);
            match slug {
                "operational-disconnect" => return ProblemCode::OperationalDisconnect,
                "not-authorized-for-resource" | "unsupported-authentication" => {
                    return ProblemCode::Unauthorized
                }
                "usage-capped" | "rate-limit-exceeded" => return ProblemCode::RateLimited,
                _ => {}
            }
        }

        match self.status {
            Some(401) | Some(403) => return ProblemCode::Unauthorized,
            Some(429) if !self.mentions_connection_limit() => return ProblemCode::RateLimited,
            _ => {}
        }

        match self.title.as_deref() {
            Some("Unauthorized") | Some("Forbidden") => return ProblemCode::Unauthorized,
            Some("operational-disconnect") => return ProblemCode::OperationalDisconnect,
            Some("Too Many Requests") => return ProblemCode::RateLimited,
            _ => {}
        }

        if self.mentions_connection_limit() {
            return ProblemCode::TooManyConnections;
        }

        ProblemCode::Other
    }

    pub fn describe(&self) -> String {
        self.detail
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or("unknown stream problem")
            .to_string()
    }

    fn mentions_connection_limit(&self) -> bool {
        self.detail
            .as_deref()
            .is_some_and(|detail| detail.contains(CONNECTION_LIMIT_DETAIL))
    }
}
