//! Interaction handling.
//!
//! Every user action takes the current [`SessionState`] by value and hands
//! back the next one together with an [`ActionOutcome`]. A failed backend
//! call returns the state it was given, so whatever was shown before stays.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

use crate::core::error::ClientError;
use crate::core::models::{
    CoachSearchRequest, PayloadView, PlanResult, RecipeDetailRequest, RecipeSuggestRequest,
};
use crate::core::profile::Profile;
use crate::core::store::{CachedResult, ResultCache};
use crate::http_client::BackendClient;

/// Logical result names, one cache entry each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResultSlot {
    Diet,
    Exercise,
    Progress,
    RecipeSuggestions,
    RecipeDetail,
    Coaches,
}

impl ResultSlot {
    pub const ALL: [ResultSlot; 6] = [
        ResultSlot::Diet,
        ResultSlot::Exercise,
        ResultSlot::Progress,
        ResultSlot::RecipeSuggestions,
        ResultSlot::RecipeDetail,
        ResultSlot::Coaches,
    ];

    pub fn cache_name(&self) -> &'static str {
        match self {
            ResultSlot::Diet => "diet_result",
            ResultSlot::Exercise => "exercise_result",
            ResultSlot::Progress => "progress_result",
            ResultSlot::RecipeSuggestions => "recipe_suggestions",
            ResultSlot::RecipeDetail => "recipe_detail",
            ResultSlot::Coaches => "coach_results",
        }
    }

    pub fn from_cache_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.cache_name() == name)
    }
}

impl fmt::Display for ResultSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cache_name())
    }
}

/// Everything the interactive session shows.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub consent: bool,
    pub profile: Option<Profile>,
    pub results: BTreeMap<ResultSlot, CachedResult>,
}

impl SessionState {
    /// Start a session, pre-populated from whatever the cache still holds.
    pub fn restore(cache: &ResultCache, profile: Option<Profile>, consent: bool) -> Self {
        let results = ResultSlot::ALL
            .into_iter()
            .filter_map(|slot| cache.load(slot.cache_name()).map(|r| (slot, r)))
            .collect();
        Self {
            consent,
            profile,
            results,
        }
    }

    pub fn result(&self, slot: ResultSlot) -> Option<&CachedResult> {
        self.results.get(&slot)
    }

    /// Calorie target from the last diet plan, if there is one.
    pub fn calorie_target(&self) -> Option<f64> {
        let diet = self.result(ResultSlot::Diet)?;
        PlanResult::from_payload(&diet.data).targets?.calorie_target
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    GeneratePlan,
    ExercisePlan {
        preferences: Map<String, Value>,
    },
    ProjectProgress {
        /// Falls back to the last diet plan's target.
        calorie_target: Option<f64>,
        extra_burn_kcal_per_day: f64,
        weeks: u32,
    },
    SuggestRecipes(RecipeSuggestRequest),
    RecipeDetail(RecipeDetailRequest),
    SearchCoaches(CoachSearchRequest),
}

#[derive(Debug)]
pub enum ActionOutcome {
    Completed(ResultSlot),
    Cleared(ResultSlot),
    /// Not sent: something the user has to fix first.
    Rejected(String),
    Failed(ClientError),
}

impl ActionOutcome {
    /// Message for the user.
    pub fn message(&self) -> String {
        match self {
            ActionOutcome::Completed(slot) => format!("{} ready", slot),
            ActionOutcome::Cleared(slot) => format!("{} cleared", slot),
            ActionOutcome::Rejected(reason) => reason.clone(),
            ActionOutcome::Failed(e) => e.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Completed(_) | ActionOutcome::Cleared(_))
    }
}

/// Forget a result, both in the session and in the cache.
pub fn clear(
    mut state: SessionState,
    cache: &ResultCache,
    slot: ResultSlot,
) -> (SessionState, ActionOutcome) {
    state.results.remove(&slot);
    if let Err(e) = cache.clear(slot.cache_name()) {
        warn!(slot = %slot, error = %e, "failed to clear cached result");
    }
    (state, ActionOutcome::Cleared(slot))
}

/// Run one user action against the backend and the cache.
pub async fn perform(
    mut state: SessionState,
    client: &BackendClient,
    cache: &ResultCache,
    action: Action,
) -> (SessionState, ActionOutcome) {
    let (slot, response) = match dispatch(&state, client, &action).await {
        Ok(Dispatch::Sent(slot, response)) => (slot, response),
        Ok(Dispatch::Rejected(reason)) => return (state, ActionOutcome::Rejected(reason)),
        Err(e) => return (state, ActionOutcome::Failed(e)),
    };

    let result = match cache.save(slot.cache_name(), &response) {
        Ok(result) => result,
        Err(e) => {
            warn!(slot = %slot, error = %e, "result not cached");
            CachedResult {
                name: slot.cache_name().to_string(),
                timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
                data: response,
            }
        }
    };
    state.results.insert(slot, result);

    // new suggestions make the previously chosen recipe stale
    if slot == ResultSlot::RecipeSuggestions {
        state.results.remove(&ResultSlot::RecipeDetail);
        if let Err(e) = cache.clear(ResultSlot::RecipeDetail.cache_name()) {
            warn!(error = %e, "failed to clear stale recipe detail");
        }
    }

    info!(slot = %slot, "action completed");
    (state, ActionOutcome::Completed(slot))
}

enum Dispatch {
    Sent(ResultSlot, Value),
    Rejected(String),
}

fn ready_profile(state: &SessionState) -> std::result::Result<&Profile, String> {
    if !state.consent {
        return Err("Please provide consent on the Profile tab first.".to_string());
    }
    state
        .profile
        .as_ref()
        .ok_or_else(|| "No profile found. Please fill out the Profile tab.".to_string())
}

async fn dispatch(
    state: &SessionState,
    client: &BackendClient,
    action: &Action,
) -> crate::core::Result<Dispatch> {
    let sent = match action {
        Action::GeneratePlan => match ready_profile(state) {
            Ok(profile) => (ResultSlot::Diet, client.plan(profile).await?),
            Err(reason) => return Ok(Dispatch::Rejected(reason)),
        },
        Action::ExercisePlan { preferences } => match ready_profile(state) {
            Ok(profile) => (
                ResultSlot::Exercise,
                client.exercise_plan(profile, preferences.clone()).await?,
            ),
            Err(reason) => return Ok(Dispatch::Rejected(reason)),
        },
        Action::ProjectProgress {
            calorie_target,
            extra_burn_kcal_per_day,
            weeks,
        } => {
            let profile = match ready_profile(state) {
                Ok(profile) => profile,
                Err(reason) => return Ok(Dispatch::Rejected(reason)),
            };
            let Some(target) = calorie_target.or_else(|| state.calorie_target()) else {
                return Ok(Dispatch::Rejected(
                    "No calorie target yet. Generate a diet plan first or pass one.".to_string(),
                ));
            };
            let response = client
                .progress_project(profile, target, *extra_burn_kcal_per_day, *weeks)
                .await?;
            (ResultSlot::Progress, response)
        }
        Action::SuggestRecipes(request) => {
            if request.ingredients.is_empty() {
                return Ok(Dispatch::Rejected(
                    "Please choose at least one ingredient.".to_string(),
                ));
            }
            (ResultSlot::RecipeSuggestions, client.recipe_suggest(request).await?)
        }
        Action::RecipeDetail(request) => {
            if request.dish.trim().is_empty() {
                return Ok(Dispatch::Rejected("Please choose a dish first.".to_string()));
            }
            (ResultSlot::RecipeDetail, client.recipe_detail(request).await?)
        }
        Action::SearchCoaches(request) => {
            (ResultSlot::Coaches, client.coach_search(request).await?)
        }
    };
    Ok(Dispatch::Sent(sent.0, sent.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_names_round_trip() {
        for slot in ResultSlot::ALL {
            assert_eq!(ResultSlot::from_cache_name(slot.cache_name()), Some(slot));
        }
        assert_eq!(ResultSlot::from_cache_name("coach_requests"), None);
    }

    #[test]
    fn test_calorie_target_from_diet_result() {
        let mut state = SessionState::default();
        assert_eq!(state.calorie_target(), None);

        state.results.insert(
            ResultSlot::Diet,
            CachedResult {
                name: "diet_result".to_string(),
                timestamp: 0.0,
                data: serde_json::json!({"targets": {"calorie_target": 1684}}),
            },
        );
        assert_eq!(state.calorie_target(), Some(1684.0));
    }

    #[test]
    fn test_outcome_messages() {
        let failed = ActionOutcome::Failed(ClientError::Backend {
            status: 500,
            body: "{\"detail\":\"bad profile\"}".to_string(),
        });
        assert!(failed.message().contains("500"));
        assert!(failed.message().contains("bad profile"));
        assert!(!failed.is_success());
        assert_eq!(ActionOutcome::Completed(ResultSlot::Diet).message(), "diet_result ready");
    }
}
