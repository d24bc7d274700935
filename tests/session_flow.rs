use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use weightpilot::config::BackendConfig;
use weightpilot::core::models::{RecipeDetailRequest, RecipeSuggestRequest};
use weightpilot::core::{Profile, ProfileForm, ResultCache};
use weightpilot::http_client::BackendClient;
use weightpilot::session::{self, Action, ActionOutcome, ResultSlot, SessionState};

struct Fixture {
    _dir: TempDir,
    cache: ResultCache,
    client: BackendClient,
}

fn fixture(server: &MockServer) -> Fixture {
    let dir = TempDir::new().unwrap();
    let cache = ResultCache::new(dir.path().join("cache"));
    let client = BackendClient::new(&BackendConfig {
        base_url: server.uri(),
        api_key: None,
        timeout: Duration::from_secs(5),
        health_timeout: Duration::from_secs(2),
    })
    .unwrap();
    Fixture {
        _dir: dir,
        cache,
        client,
    }
}

fn profile() -> Profile {
    ProfileForm::default().build().unwrap()
}

fn ready_state(cache: &ResultCache) -> SessionState {
    SessionState::restore(cache, Some(profile()), true)
}

async fn mount(server: &MockServer, route: &str, status: u16, body: Value) {
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

fn plan_reply() -> Value {
    json!({
        "targets": {"bmi": 24.9, "bmr": 1680, "tdee": 2184, "calorie_target": 1684},
        "plan_markdown": "# Day 1...",
        "trust": {}
    })
}

#[tokio::test]
async fn generate_plan_caches_result_under_diet_result() {
    let server = MockServer::start().await;
    mount(&server, "/v1/plan", 200, plan_reply()).await;
    let fx = fixture(&server);

    let (state, outcome) =
        session::perform(ready_state(&fx.cache), &fx.client, &fx.cache, Action::GeneratePlan).await;

    assert!(matches!(outcome, ActionOutcome::Completed(ResultSlot::Diet)));
    assert_eq!(state.result(ResultSlot::Diet).unwrap().data, plan_reply());
    assert_eq!(state.calorie_target(), Some(1684.0));

    let cached = fx.cache.load("diet_result").unwrap();
    assert_eq!(cached.data, plan_reply());
    assert!(cached.timestamp > 0.0);

    // a later session picks the result up again
    let restored = SessionState::restore(&fx.cache, Some(profile()), true);
    assert_eq!(restored.result(ResultSlot::Diet).unwrap().data, plan_reply());
}

#[tokio::test]
async fn actions_without_consent_are_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/plan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(plan_reply()))
        .expect(0)
        .mount(&server)
        .await;
    let fx = fixture(&server);

    let state = SessionState::restore(&fx.cache, Some(profile()), false);
    let (state, outcome) =
        session::perform(state, &fx.client, &fx.cache, Action::GeneratePlan).await;

    match outcome {
        ActionOutcome::Rejected(reason) => assert!(reason.contains("consent")),
        other => panic!("expected rejection, got {other:?}"),
    }
    assert!(state.result(ResultSlot::Diet).is_none());
    assert!(fx.cache.load("diet_result").is_none());
}

#[tokio::test]
async fn actions_without_profile_are_not_sent() {
    let server = MockServer::start().await;
    let fx = fixture(&server);

    let state = SessionState::restore(&fx.cache, None, true);
    let (_, outcome) = session::perform(
        state,
        &fx.client,
        &fx.cache,
        Action::ExercisePlan {
            preferences: Default::default(),
        },
    )
    .await;

    assert!(matches!(outcome, ActionOutcome::Rejected(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_call_keeps_previous_result() {
    let server = MockServer::start().await;
    mount(&server, "/v1/plan", 500, json!({"detail": "bad profile"})).await;
    let fx = fixture(&server);

    fx.cache.save("diet_result", &json!({"plan_markdown": "old"})).unwrap();
    let before = ready_state(&fx.cache);
    let before_ts = before.result(ResultSlot::Diet).unwrap().timestamp;

    let (state, outcome) =
        session::perform(before, &fx.client, &fx.cache, Action::GeneratePlan).await;

    match &outcome {
        ActionOutcome::Failed(e) => {
            assert_eq!(e.status(), Some(500));
            assert!(outcome.message().contains("bad profile"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    let shown = state.result(ResultSlot::Diet).unwrap();
    assert_eq!(shown.data, json!({"plan_markdown": "old"}));
    assert_eq!(shown.timestamp, before_ts);
    assert_eq!(
        fx.cache.load("diet_result").unwrap().data,
        json!({"plan_markdown": "old"})
    );
}

#[tokio::test]
async fn projection_uses_calorie_target_from_diet_plan() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/v1/progress/project",
        200,
        json!({"series": [{"week": 0, "weight_kg": 72.0}], "explanation_md": "ok"}),
    )
    .await;
    let fx = fixture(&server);
    fx.cache.save("diet_result", &plan_reply()).unwrap();

    let action = Action::ProjectProgress {
        calorie_target: None,
        extra_burn_kcal_per_day: 150.0,
        weeks: 8,
    };
    let (state, outcome) =
        session::perform(ready_state(&fx.cache), &fx.client, &fx.cache, action).await;

    assert!(outcome.is_success());
    assert!(state.result(ResultSlot::Progress).is_some());

    let received = server.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(sent["calorie_target"], json!(1684.0));
    assert_eq!(sent["extra_burn_kcal_per_day"], json!(150.0));
    assert_eq!(sent["weeks"], json!(8));
    assert_eq!(sent["profile"]["age"], json!(28));
}

#[tokio::test]
async fn projection_without_any_target_is_rejected() {
    let server = MockServer::start().await;
    let fx = fixture(&server);

    let action = Action::ProjectProgress {
        calorie_target: None,
        extra_burn_kcal_per_day: 0.0,
        weeks: 12,
    };
    let (_, outcome) =
        session::perform(ready_state(&fx.cache), &fx.client, &fx.cache, action).await;
    assert!(matches!(outcome, ActionOutcome::Rejected(_)));
}

#[tokio::test]
async fn new_suggestions_drop_the_previous_recipe() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/v1/recipe/suggest",
        200,
        json!({"suggestions": [{"name": "Chicken Tikka", "one_liner": "Smoky"}]}),
    )
    .await;
    mount(
        &server,
        "/v1/recipe/detail",
        200,
        json!({"dish": "Chicken Tikka", "servings": 2, "steps": ["Grill"]}),
    )
    .await;
    let fx = fixture(&server);

    let detail = Action::RecipeDetail(RecipeDetailRequest {
        dish: "Chicken Tikka".to_string(),
        ingredients: vec!["Chicken".to_string()],
        cuisine: "indian".to_string(),
    });
    let (state, outcome) =
        session::perform(ready_state(&fx.cache), &fx.client, &fx.cache, detail).await;
    assert!(outcome.is_success());
    assert!(fx.cache.load("recipe_detail").is_some());

    let suggest = Action::SuggestRecipes(RecipeSuggestRequest {
        ingredients: vec!["Chicken".to_string()],
        cuisine: "indian".to_string(),
        count: 5,
    });
    let (state, outcome) = session::perform(state, &fx.client, &fx.cache, suggest).await;
    assert!(outcome.is_success());
    assert!(state.result(ResultSlot::RecipeSuggestions).is_some());
    assert!(state.result(ResultSlot::RecipeDetail).is_none());
    assert!(fx.cache.load("recipe_detail").is_none());
}

#[tokio::test]
async fn empty_ingredients_are_rejected() {
    let server = MockServer::start().await;
    let fx = fixture(&server);

    let suggest = Action::SuggestRecipes(RecipeSuggestRequest {
        ingredients: vec![],
        cuisine: "indian".to_string(),
        count: 5,
    });
    let (_, outcome) =
        session::perform(ready_state(&fx.cache), &fx.client, &fx.cache, suggest).await;
    assert!(matches!(outcome, ActionOutcome::Rejected(_)));
}

#[tokio::test]
async fn clear_forgets_result_everywhere() {
    let server = MockServer::start().await;
    let fx = fixture(&server);
    fx.cache.save("coach_results", &json!({"items": []})).unwrap();

    let state = ready_state(&fx.cache);
    assert!(state.result(ResultSlot::Coaches).is_some());

    let (state, outcome) = session::clear(state, &fx.cache, ResultSlot::Coaches);
    assert!(matches!(outcome, ActionOutcome::Cleared(ResultSlot::Coaches)));
    assert!(state.result(ResultSlot::Coaches).is_none());
    assert!(fx.cache.load("coach_results").is_none());
}
