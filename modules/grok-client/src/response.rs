//! Parsing for model responses.
//!
//! The model wraps JSON in markdown fences often enough that stripping is
//! unconditional. Discovery must come back as an object carrying a
//! `categories` array; classification may come back as either a bare array
//! or a `{"categorizations": [...]}` wrapper. Anything else is a shape
//! error, which the retry policy will not resend.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use followlens_common::{Category, ClassificationResult, Taxonomy};

use crate::error::GrokError;
use crate::util::strip_code_blocks;

#[derive(Debug, Deserialize)]
struct DiscoveryPayload {
    categories: Vec<CategoryPayload>,
    #[serde(default)]
    analysis_summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CategoryPayload {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    characteristics: Vec<String>,
    #[serde(default)]
    estimated_percentage: f64,
}

#[derive(Debug, Default, Deserialize)]
struct RawClassification {
    // Present in responses but pairing is positional; kept so the field
    // is tolerated, not consulted.
    #[serde(default)]
    #[allow(dead_code)]
    account_index: Option<u32>,
    #[serde(default)]
    category: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    alternative: Option<String>,
}

impl From<RawClassification> for ClassificationResult {
    fn from(raw: RawClassification) -> Self {
        ClassificationResult {
            category: raw.category,
            confidence: raw.confidence,
            reasoning: raw.reasoning,
            alternative: raw.alternative,
        }
    }
}

/// Parse a discovery response into a taxonomy. A bare JSON array here is a
/// hard error: discovery must yield object-shaped taxonomy metadata.
pub fn parse_discovery(text: &str) -> Result<Taxonomy, GrokError> {
    let stripped = strip_code_blocks(text);
    let value: Value =
        serde_json::from_str(stripped).map_err(|e| GrokError::Parse(e.to_string()))?;

    if value.is_array() {
        return Err(GrokError::Shape(
            "discovery returned a JSON array, expected an object with a 'categories' array"
                .to_string(),
        ));
    }

    let payload: DiscoveryPayload = serde_json::from_value(value)
        .map_err(|e| GrokError::Shape(format!("discovery object malformed: {e}")))?;

    Ok(Taxonomy {
        categories: payload
            .categories
            .into_iter()
            .map(|c| Category {
                name: c.name,
                description: c.description,
                characteristics: c.characteristics,
                estimated_percentage: c.estimated_percentage,
            })
            .collect(),
        analysis_summary: payload.analysis_summary,
        discovered_at: Utc::now(),
    })
}

/// Parse a batch classification response. Accepts a bare array or a
/// `{"categorizations": [...]}` wrapper; each element with missing fields
/// falls back to empty-string/0.0 defaults rather than failing the batch.
pub fn parse_batch(text: &str) -> Result<Vec<ClassificationResult>, GrokError> {
    let stripped = strip_code_blocks(text);
    let value: Value =
        serde_json::from_str(stripped).map_err(|e| GrokError::Parse(e.to_string()))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("categorizations") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(GrokError::Shape(
                    "'categorizations' field is not a list".to_string(),
                ))
            }
            None => {
                return Err(GrokError::Shape(
                    "classification object lacks a 'categorizations' list".to_string(),
                ))
            }
        },
        other => {
            return Err(GrokError::Shape(format!(
                "classification response is neither array nor object: {other}"
            )))
        }
    };

    Ok(items
        .into_iter()
        .map(|item| {
            let raw: RawClassification = serde_json::from_value(item).unwrap_or_else(|e| {
                warn!(error = %e, "Malformed classification entry, defaulting fields");
                RawClassification::default()
            });
            raw.into()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_parses_fenced_object() {
        let text = r#"```json
        {
          "categories": [
            {"name": "Tech", "description": "Software people",
             "characteristics": ["builds things"], "estimated_percentage": 40},
            {"name": "News", "description": "Journalists"}
          ],
          "total_categories": 2,
          "analysis_summary": "A tech-heavy network"
        }
        ```"#;

        let taxonomy = parse_discovery(text).unwrap();
        assert_eq!(taxonomy.categories.len(), 2);
        assert_eq!(taxonomy.categories[0].name, "Tech");
        assert_eq!(taxonomy.categories[1].description, "Journalists");
        assert_eq!(taxonomy.analysis_summary.as_deref(), Some("A tech-heavy network"));
    }

    #[test]
    fn discovery_rejects_bare_array() {
        let text = r#"[{"name": "Tech", "description": "x"}]"#;
        let err = parse_discovery(text).unwrap_err();
        assert!(matches!(err, GrokError::Shape(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn discovery_unparseable_text_is_retryable() {
        let err = parse_discovery("sorry, I cannot do that").unwrap_err();
        assert!(matches!(err, GrokError::Parse(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn batch_accepts_bare_array() {
        let text = r#"[
            {"account_index": 1, "category": "Tech", "confidence": 0.95,
             "reasoning": "bio mentions compilers"},
            {"account_index": 2, "category": "News", "confidence": 0.7,
             "reasoning": "journalist", "alternative": "Politics"}
        ]"#;

        let results = parse_batch(text).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].category, "Tech");
        assert_eq!(results[1].alternative.as_deref(), Some("Politics"));
    }

    #[test]
    fn batch_accepts_wrapped_object() {
        let text = r#"{"categorizations": [{"category": "Tech", "confidence": 0.9, "reasoning": "r"}]}"#;
        let results = parse_batch(text).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].category, "Tech");
    }

    #[test]
    fn batch_missing_fields_default() {
        let text = r#"[{"account_index": 1}]"#;
        let results = parse_batch(text).unwrap();
        assert_eq!(results[0].category, "");
        assert_eq!(results[0].confidence, 0.0);
        assert_eq!(results[0].reasoning, "");
    }

    #[test]
    fn batch_object_without_categorizations_is_shape_error() {
        let err = parse_batch(r#"{"results": []}"#).unwrap_err();
        assert!(matches!(err, GrokError::Shape(_)));
    }
}
