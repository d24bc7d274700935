use base64::Engine;
use serde_json::Value;

use crate::core::models::{
    Coach, ExercisePlan, PayloadView, PlanResult, ProjectionResult, RecipeResult,
    RecipeSuggestions,
};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";
const MISSING: &str = "–";

/// Plain-text rendering of backend results for the terminal.
pub struct ResultFormatter;

impl ResultFormatter {
    /// Whole numbers print without decimals, everything else with one.
    fn number(value: Option<f64>) -> String {
        match value {
            Some(v) if v.fract() == 0.0 => format!("{}", v as i64),
            Some(v) => format!("{:.1}", v),
            None => MISSING.to_string(),
        }
    }

    fn with_unit(value: Option<f64>, unit: &str) -> String {
        format!("{} {}", Self::number(value), unit)
    }

    fn scalar(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Null => MISSING.to_string(),
            other => other.to_string(),
        }
    }

    pub fn format_plan(payload: &Value) -> String {
        let plan = PlanResult::from_payload(payload);
        let mut out = String::new();

        if let Some(t) = &plan.targets {
            out.push_str("📊 Daily targets (estimates)\n");
            out.push_str(RULE);
            out.push('\n');
            out.push_str(&format!("BMI:            {}\n", Self::number(t.bmi)));
            out.push_str(&format!("BMR:            {}\n", Self::with_unit(t.bmr, "kcal")));
            out.push_str(&format!("TDEE:           {}\n", Self::with_unit(t.tdee, "kcal")));
            out.push_str(&format!(
                "Calorie target: {}\n",
                Self::with_unit(t.calorie_target, "kcal")
            ));
            out.push('\n');
        }

        out.push_str("🥗 Recommended 7-day diet chart\n");
        out.push_str(RULE);
        out.push('\n');
        out.push_str(plan.plan_markdown.as_deref().unwrap_or("_No plan returned_"));
        out.push('\n');
        out
    }

    pub fn format_exercise(payload: &Value) -> String {
        let plan = ExercisePlan::from_payload(payload);
        format!(
            "🏃 Exercise plan\n{}\n{}\n",
            RULE,
            plan.plan_markdown.as_deref().unwrap_or("_No plan returned_")
        )
    }

    pub fn format_projection(payload: &Value) -> String {
        let projection = ProjectionResult::from_payload(payload);
        let mut out = format!("📈 Projected weight\n{}\n", RULE);

        if projection.series.is_empty() {
            out.push_str("_No projection returned_\n");
        } else {
            out.push_str(&format!("{:>6}  {:>10}\n", "Week", "Weight kg"));
            for point in &projection.series {
                out.push_str(&format!(
                    "{:>6}  {:>10}\n",
                    point
                        .week
                        .map(|w| w.to_string())
                        .unwrap_or_else(|| MISSING.to_string()),
                    Self::number(point.weight_kg)
                ));
            }
        }

        if let Some(assumptions) = &projection.assumptions {
            let end = assumptions
                .milestones
                .as_ref()
                .and_then(|m| m.end_weight_kg);
            out.push_str(&format!(
                "\nStart: {}  →  End: {}\n",
                Self::with_unit(assumptions.start_weight_kg, "kg"),
                Self::with_unit(end, "kg")
            ));
        }

        if let Some(explanation) = &projection.explanation_md {
            out.push('\n');
            out.push_str(explanation);
            out.push('\n');
        }
        out
    }

    pub fn format_suggestions(payload: &Value) -> String {
        let ideas = RecipeSuggestions::from_payload(payload);
        if ideas.suggestions.is_empty() {
            return "No suggestions were returned.\n".to_string();
        }

        let mut out = format!("🍳 Suggestions\n{}\n", RULE);
        for (i, dish) in ideas.suggestions.iter().enumerate() {
            out.push_str(&format!(
                "{}. {} — {}\n",
                i + 1,
                dish.display_name(),
                dish.one_liner.as_deref().unwrap_or_default()
            ));
        }
        out
    }

    pub fn format_recipe(payload: &Value) -> String {
        let recipe = RecipeResult::from_payload(payload);
        let mut out = format!(
            "📜 {}\n{}\n",
            recipe.dish.as_deref().unwrap_or("Recipe"),
            RULE
        );

        if let Some(servings) = &recipe.servings {
            out.push_str(&format!("Servings: {}\n", Self::scalar(servings)));
        }
        for (i, step) in recipe.steps.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, step));
        }

        if let Some(n) = &recipe.nutrition {
            out.push_str("\nPer-serving nutrition (approx.)\n");
            out.push_str(&format!(
                "Calories {} | Protein {} | Carbs {} | Fat {} | Sodium {}\n",
                Self::number(n.kcal),
                Self::with_unit(n.protein_g, "g"),
                Self::with_unit(n.carbs_g, "g"),
                Self::with_unit(n.fat_g, "g"),
                Self::with_unit(n.sodium_mg, "mg"),
            ));
        }

        if let Some(url) = &recipe.image_url {
            out.push_str(&format!("\n🖼  {}\n", url));
        } else if recipe.image_b64.is_some() {
            out.push_str("\n🖼  inline image available (use --image-out to save it)\n");
        } else if let Some(err) = &recipe.image_error {
            out.push_str(&format!("\n(No image available: {})\n", err));
        }
        out
    }

    pub fn format_coach(coach: &Coach) -> String {
        let mut out = format!(
            "{} · {}\n",
            coach.name.as_deref().unwrap_or("Unnamed"),
            coach.role.as_deref().unwrap_or(MISSING)
        );
        if let Some(rating) = coach.rating {
            out.push_str(&format!("  {}", Self::stars(rating)));
            if let Some(reviews) = coach.reviews {
                out.push_str(&format!(" · {} reviews", reviews));
            }
            out.push('\n');
        }
        if !coach.specialties.is_empty() {
            let shown: Vec<&str> = coach.specialties.iter().take(4).map(String::as_str).collect();
            out.push_str(&format!("  Specialties: {}\n", shown.join(", ")));
        }
        if let Some(loc) = &coach.location {
            out.push_str(&format!(
                "  🗺  {}, {}\n",
                loc.city.as_deref().unwrap_or(MISSING),
                loc.state.as_deref().unwrap_or(MISSING)
            ));
        }
        if !coach.modalities.is_empty() {
            out.push_str(&format!("  💻 {}\n", coach.modalities.join(" / ")));
        }
        match coach.accepting_clients {
            Some(true) => out.push_str("  Accepting\n"),
            Some(false) => out.push_str("  Waitlist\n"),
            None => {}
        }
        out
    }

    /// "⭐⭐⭐⭐⭐ (4.8)"
    pub fn stars(rating: f64) -> String {
        let full = rating.round().clamp(0.0, 5.0) as usize;
        format!("{} ({:.1})", "⭐".repeat(full), rating)
    }

    /// Decode a recipe's inline base64 image, if it has one.
    pub fn decode_image(payload: &Value) -> Option<Vec<u8>> {
        let recipe = RecipeResult::from_payload(payload);
        let encoded = recipe.image_b64?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .ok()
    }
}
