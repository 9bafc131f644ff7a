//! Recommendation response shapes and normalization.

use serde::Deserialize;
use serde_json::Value;

/// Raw response from the recommendation service.
///
/// Variants are tried in declaration order.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RecommendPayload {
    /// `[12, "15", 18]`
    Bare(Vec<Value>),
    /// `{"similar_articles": [12, 15]}`
    Similar { similar_articles: Vec<Value> },
    /// `{"recommendations": [{"id": 12, "score": 0.9}]}`
    Ranked { recommendations: Vec<Value> },
}

impl RecommendPayload {
    /// Normalize to an ordered list of article ids, dropping anything that is
    /// not a well-formed integer.
    pub fn into_ids(self) -> Vec<i64> {
        match self {
            RecommendPayload::Bare(items) | RecommendPayload::Similar { similar_articles: items } => {
                items.iter().filter_map(coerce_id).collect()
            }
            RecommendPayload::Ranked { recommendations } => recommendations
                .iter()
                .filter_map(|item| item.get("id"))
                .filter_map(coerce_id)
                .collect(),
        }
    }
}

/// Integers, integral floats and numeric strings become ids; everything else is dropped.
pub fn coerce_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}
