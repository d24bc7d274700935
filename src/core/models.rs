//! Request bodies and read-only views over backend responses.
//!
//! Responses are cached verbatim as JSON. The view types here only pick out
//! the well-known fields used for display: every field is optional and
//! anything unknown is kept in `extra`, so the backend schema can grow
//! without breaking the client.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::profile::Profile;

/// Decode a view from a payload, falling back to an empty view.
pub trait PayloadView: DeserializeOwned + Default {
    fn from_payload(payload: &Value) -> Self {
        match serde_json::from_value(payload.clone()) {
            Ok(view) => view,
            Err(e) => {
                warn!(error = %e, "unexpected payload shape, showing nothing");
                Self::default()
            }
        }
    }
}

impl<T: DeserializeOwned + Default> PayloadView for T {}

// MARK: - requests

#[derive(Debug, Clone, Serialize)]
pub struct ExercisePlanRequest<'a> {
    pub profile: &'a Profile,
    pub preferences: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeSuggestRequest {
    pub ingredients: Vec<String>,
    pub cuisine: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetailRequest {
    pub dish: String,
    pub ingredients: Vec<String>,
    pub cuisine: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CoachSearchRequest {
    pub zip: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub roles: Vec<String>,
    pub radius_km: f64,
    pub max_results: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressProjectRequest<'a> {
    pub profile: &'a Profile,
    pub calorie_target: f64,
    pub extra_burn_kcal_per_day: f64,
    pub weeks: u32,
}

// MARK: - lenient field readers

/// Per-field decoders: a value of the wrong type reads as absent instead of
/// failing the whole view.
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn opt<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(serde_json::from_value(Value::deserialize(d)?).ok())
    }

    /// Numbers, or strings holding a number.
    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    /// Non-negative whole numbers, including `3.0` and `"3"`.
    pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        let n = match Value::deserialize(d)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        Ok(n.filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n <= u32::MAX as f64)
            .map(|n| n as u32))
    }

    /// Strings; numbers and booleans are taken as their text.
    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => Some(b),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" => Some(true),
                "false" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }

    /// Keeps the items that decode and drops the rest.
    pub fn list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        })
    }

    /// Like [`list`], with scalars read through [`text`].
    pub fn texts<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            Value::String(s) => vec![s],
            _ => Vec::new(),
        })
    }
}

// MARK: - diet plan

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlanResult {
    #[serde(deserialize_with = "lenient::opt")]
    pub targets: Option<Targets>,
    #[serde(deserialize_with = "lenient::text")]
    pub plan_markdown: Option<String>,
    pub trust: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Targets {
    #[serde(deserialize_with = "lenient::number")]
    pub bmi: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub bmr: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub tdee: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub calorie_target: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExercisePlan {
    #[serde(deserialize_with = "lenient::text")]
    pub plan_markdown: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// MARK: - progress

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectionResult {
    #[serde(deserialize_with = "lenient::list")]
    pub series: Vec<ProjectionPoint>,
    #[serde(deserialize_with = "lenient::opt")]
    pub assumptions: Option<Assumptions>,
    #[serde(deserialize_with = "lenient::text")]
    pub explanation_md: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectionPoint {
    #[serde(deserialize_with = "lenient::count")]
    pub week: Option<u32>,
    #[serde(deserialize_with = "lenient::number")]
    pub weight_kg: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Assumptions {
    #[serde(deserialize_with = "lenient::number")]
    pub start_weight_kg: Option<f64>,
    #[serde(deserialize_with = "lenient::opt")]
    pub milestones: Option<Milestones>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Milestones {
    #[serde(deserialize_with = "lenient::number")]
    pub end_weight_kg: Option<f64>,
}

// MARK: - recipes

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecipeSuggestions {
    #[serde(deserialize_with = "lenient::list")]
    pub suggestions: Vec<DishSuggestion>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DishSuggestion {
    #[serde(deserialize_with = "lenient::text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub one_liner: Option<String>,
}

impl DishSuggestion {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Dish")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecipeResult {
    #[serde(deserialize_with = "lenient::text")]
    pub dish: Option<String>,
    pub servings: Option<Value>,
    #[serde(deserialize_with = "lenient::texts")]
    pub steps: Vec<String>,
    #[serde(deserialize_with = "lenient::opt")]
    pub nutrition: Option<Nutrition>,
    #[serde(deserialize_with = "lenient::text")]
    pub image_url: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub image_b64: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub image_error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Nutrition {
    #[serde(deserialize_with = "lenient::number")]
    pub kcal: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub protein_g: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub carbs_g: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub fat_g: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub sodium_mg: Option<f64>,
}

// MARK: - coaches

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CoachSearchResults {
    #[serde(deserialize_with = "lenient::list")]
    pub items: Vec<Coach>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Coach {
    #[serde(deserialize_with = "lenient::text")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub role: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub rating: Option<f64>,
    #[serde(deserialize_with = "lenient::count")]
    pub reviews: Option<u32>,
    #[serde(deserialize_with = "lenient::texts")]
    pub certifications: Vec<String>,
    #[serde(deserialize_with = "lenient::texts")]
    pub specialties: Vec<String>,
    #[serde(deserialize_with = "lenient::texts")]
    pub modalities: Vec<String>,
    #[serde(deserialize_with = "lenient::texts")]
    pub languages: Vec<String>,
    #[serde(deserialize_with = "lenient::opt")]
    pub location: Option<CoachLocation>,
    #[serde(deserialize_with = "lenient::flag")]
    pub accepting_clients: Option<bool>,
    #[serde(deserialize_with = "lenient::number")]
    pub price_per_session: Option<f64>,
    #[serde(deserialize_with = "lenient::text")]
    pub email: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub phone: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CoachLocation {
    #[serde(deserialize_with = "lenient::text")]
    pub city: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub state: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub country: Option<String>,
}

// MARK: - voice

/// Credentials for the voice-call widget.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VapiConfig {
    #[serde(deserialize_with = "lenient::text")]
    pub public_key: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub assistant_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_view_reads_known_fields() {
        let payload = json!({
            "targets": {"bmi": 24.9, "bmr": 1680, "tdee": 2184, "calorie_target": 1684},
            "plan_markdown": "# Day 1...",
            "trust": {"sources": ["USDA"]},
            "model": "v2"
        });
        let plan = PlanResult::from_payload(&payload);
        let targets = plan.targets.unwrap();
        assert_eq!(targets.bmi, Some(24.9));
        assert_eq!(targets.calorie_target, Some(1684.0));
        assert_eq!(plan.plan_markdown.as_deref(), Some("# Day 1..."));
        assert!(plan.trust.is_some());
        assert_eq!(plan.extra.get("model"), Some(&json!("v2")));
    }

    #[test]
    fn test_missing_fields_are_none() {
        let plan = PlanResult::from_payload(&json!({}));
        assert!(plan.targets.is_none());
        assert!(plan.plan_markdown.is_none());

        let targets = PlanResult::from_payload(&json!({"targets": {"bmi": 20.0}}))
            .targets
            .unwrap();
        assert_eq!(targets.tdee, None);
    }

    #[test]
    fn test_wrong_shape_degrades_to_empty() {
        let plan = PlanResult::from_payload(&json!({"targets": "soon", "plan_markdown": "# Day 1"}));
        assert!(plan.targets.is_none());
        assert_eq!(plan.plan_markdown.as_deref(), Some("# Day 1"));

        let recipes = RecipeSuggestions::from_payload(&json!([1, 2]));
        assert!(recipes.suggestions.is_empty());
    }

    #[test]
    fn test_projection_view() {
        let payload = json!({
            "series": [{"week": 0, "weight_kg": 72.0}, {"week": 1, "weight_kg": 71.4}],
            "assumptions": {"start_weight_kg": 72.0, "milestones": {"end_weight_kg": 68.1}, "deficit": 500},
            "explanation_md": "Steady loss"
        });
        let projection = ProjectionResult::from_payload(&payload);
        assert_eq!(projection.series.len(), 2);
        let assumptions = projection.assumptions.unwrap();
        assert_eq!(assumptions.milestones.unwrap().end_weight_kg, Some(68.1));
        assert!(assumptions.extra.contains_key("deficit"));
    }

    #[test]
    fn test_dish_display_name_default() {
        let dish = DishSuggestion::default();
        assert_eq!(dish.display_name(), "Dish");
    }

    #[test]
    fn test_coach_search_request_shape() {
        let request = CoachSearchRequest {
            zip: Some("02139".to_string()),
            roles: vec!["Dietitian".to_string()],
            radius_km: 25.0,
            max_results: 10,
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "zip": "02139",
                "city": null,
                "state": null,
                "roles": ["Dietitian"],
                "radius_km": 25.0,
                "max_results": 10
            })
        );
    }

    #[test]
    fn test_one_bad_coach_keeps_the_others() {
        let results = CoachSearchResults::from_payload(&json!({
            "items": [
                {"id": "c1", "name": "Asha Rao", "reviews": 12},
                {"id": 42, "name": "Ben Li", "reviews": "7", "rating": "4.5"},
                "not a coach",
                {"id": "c3", "specialties": "Weight loss", "location": {"city": 5}}
            ]
        }));
        assert_eq!(results.items.len(), 3);
        assert_eq!(results.items[1].id.as_deref(), Some("42"));
        assert_eq!(results.items[1].reviews, Some(7));
        assert_eq!(results.items[1].rating, Some(4.5));
        assert_eq!(results.items[2].specialties, vec!["Weight loss".to_string()]);
        assert_eq!(
            results.items[2].location.as_ref().unwrap().city.as_deref(),
            Some("5")
        );
    }

    #[test]
    fn test_recipe_keeps_steps_when_nutrition_is_odd() {
        let recipe = RecipeResult::from_payload(&json!({
            "dish": "Dal Tadka",
            "steps": ["Boil", "Temper"],
            "nutrition": {"kcal": "450", "protein_g": "lots", "fat_g": 12.5}
        }));
        assert_eq!(recipe.steps, vec!["Boil".to_string(), "Temper".to_string()]);
        let nutrition = recipe.nutrition.unwrap();
        assert_eq!(nutrition.kcal, Some(450.0));
        assert_eq!(nutrition.protein_g, None);
        assert_eq!(nutrition.fat_g, Some(12.5));

        let recipe = RecipeResult::from_payload(&json!({"dish": "Dal", "nutrition": "n/a", "steps": 3}));
        assert_eq!(recipe.dish.as_deref(), Some("Dal"));
        assert!(recipe.nutrition.is_none());
        assert!(recipe.steps.is_empty());
    }

    #[test]
    fn test_projection_accepts_float_weeks() {
        let projection = ProjectionResult::from_payload(&json!({
            "series": [
                {"week": 0, "weight_kg": 72},
                {"week": 1.0, "weight_kg": "71.4"},
                {"week": 1.5, "weight_kg": 71.0},
                null
            ]
        }));
        assert_eq!(projection.series.len(), 3);
        assert_eq!(projection.series[1].week, Some(1));
        assert_eq!(projection.series[1].weight_kg, Some(71.4));
        assert_eq!(projection.series[2].week, None);
        assert_eq!(projection.series[2].weight_kg, Some(71.0));
    }
}
