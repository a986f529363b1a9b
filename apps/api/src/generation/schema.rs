//! Shape check for recovered model output.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;
use crate::models::idea::ValidationData;

/// `target_audience` arrives as either a sentence or a list of segments.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Audience {
    Text(String),
    Segments(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawIdea {
    title: String,
    problem: String,
    solution: String,
    market_size: String,
    target_audience: Audience,
    revenue_streams: Vec<String>,
    validation_data: ValidationData,
}

/// A generated idea that passed schema validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdeaContent {
    pub title: String,
    pub problem: String,
    pub solution: String,
    pub market_size: String,
    pub target_audience: String,
    pub revenue_streams: Vec<String>,
    pub validation_data: ValidationData,
}

/// Checks the recovered object field by field. Any missing, extra or
/// wrong-shaped field rejects the whole idea.
pub fn validate_idea(value: Value) -> Result<IdeaContent, AppError> {
    let raw: RawIdea = serde_json::from_value(value)
        .map_err(|e| AppError::SchemaValidation(format!("model output has wrong shape: {e}")))?;

    let target_audience = match raw.target_audience {
        Audience::Text(text) => text.trim().to_string(),
        Audience::Segments(segments) => clean_list(segments).join(", "),
    };

    let idea = IdeaContent {
        title: raw.title.trim().to_string(),
        problem: raw.problem.trim().to_string(),
        solution: raw.solution.trim().to_string(),
        market_size: raw.market_size.trim().to_string(),
        target_audience,
        revenue_streams: clean_list(raw.revenue_streams),
        validation_data: ValidationData {
            market_trends: clean_list(raw.validation_data.market_trends),
            competitor_analysis: raw.validation_data.competitor_analysis.trim().to_string(),
            demand_indicators: clean_list(raw.validation_data.demand_indicators),
        },
    };

    let required = [
        ("title", idea.title.is_empty()),
        ("problem", idea.problem.is_empty()),
        ("solution", idea.solution.is_empty()),
        ("market_size", idea.market_size.is_empty()),
        ("target_audience", idea.target_audience.is_empty()),
        ("revenue_streams", idea.revenue_streams.is_empty()),
        (
            "validation_data.market_trends",
            idea.validation_data.market_trends.is_empty(),
        ),
        (
            "validation_data.competitor_analysis",
            idea.validation_data.competitor_analysis.is_empty(),
        ),
        (
            "validation_data.demand_indicators",
            idea.validation_data.demand_indicators.is_empty(),
        ),
    ];
    let empty: Vec<&str> = required
        .iter()
        .filter(|(_, is_empty)| *is_empty)
        .map(|(field, _)| *field)
        .collect();

    if !empty.is_empty() {
        return Err(AppError::SchemaValidation(format!(
            "model output has empty fields: {}",
            empty.join(", ")
        )));
    }

    Ok(idea)
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
