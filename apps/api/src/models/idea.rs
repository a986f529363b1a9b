use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Evidence block attached to every generated idea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationData {
    pub market_trends: Vec<String>,
    pub competitor_analysis: String,
    pub demand_indicators: Vec<String>,
}

/// Canonical record of one successful generation. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GeneratedIdeaRow {
    pub id: Uuid,
    pub email: String,
    pub title: String,
    pub description: String,
    pub market_size: String,
    pub target_audience: String,
    pub revenue_streams: Vec<String>,
    pub validation_data: Json<ValidationData>,
    pub preferences: Option<String>,
    pub constraints: Option<String>,
    pub industry: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for `generated_ideas`; `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewGeneratedIdea {
    pub email: String,
    pub title: String,
    pub description: String,
    pub market_size: String,
    pub target_audience: String,
    pub revenue_streams: Vec<String>,
    pub validation_data: ValidationData,
    pub preferences: Option<String>,
    pub constraints: Option<String>,
    pub industry: Option<String>,
}

/// Library pointer. `title`/`description` are copied at write time, not joined.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SavedIdeaRow {
    pub id: Uuid,
    pub user_email: String,
    pub idea_id: Uuid,
    pub title: String,
    pub description: String,
    pub is_liked: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSavedIdea {
    pub user_email: String,
    pub idea_id: Uuid,
    pub title: String,
    pub description: String,
}

impl NewSavedIdea {
    pub fn pointing_at(idea: &GeneratedIdeaRow) -> Self {
        Self {
            user_email: idea.email.clone(),
            idea_id: idea.id,
            title: idea.title.clone(),
            description: idea.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saved_idea_copies_title_and_description() {
        let idea = GeneratedIdeaRow {
            id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            title: "PetPal".to_string(),
            description: "Subscription vet triage".to_string(),
            market_size: "$2B".to_string(),
            target_audience: "Pet owners".to_string(),
            revenue_streams: vec!["Subscriptions".to_string()],
            validation_data: Json(ValidationData {
                market_trends: vec![],
                competitor_analysis: "Few".to_string(),
                demand_indicators: vec![],
            }),
            preferences: None,
            constraints: None,
            industry: None,
            created_at: Utc::now(),
        };

        let saved = NewSavedIdea::pointing_at(&idea);
        assert_eq!(saved.idea_id, idea.id);
        assert_eq!(saved.user_email, "ada@example.com");
        assert_eq!(saved.title, "PetPal");
        assert_eq!(saved.description, "Subscription vet triage");
    }

    #[test]
    fn test_generated_idea_serializes_validation_data_inline() {
        let data = ValidationData {
            market_trends: vec!["Remote work".to_string()],
            competitor_analysis: "Fragmented".to_string(),
            demand_indicators: vec!["Search volume up".to_string()],
        };
        let value = serde_json::to_value(Json(data)).unwrap();
        assert_eq!(value["market_trends"][0], "Remote work");
    }
}
