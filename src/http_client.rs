use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::BackendConfig;
use crate::core::error::{ClientError, Result};
use crate::core::models::{
    CoachSearchRequest, ExercisePlanRequest, ProgressProjectRequest, RecipeDetailRequest,
    RecipeSuggestRequest,
};
use crate::core::profile::Profile;

pub const HEALTH_PATH: &str = "/health";
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Outcome of a health probe.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceStatus {
    Available,
    /// No HTTP response at all (refused, DNS, timeout).
    Unavailable(String),
    /// Responded, but not with 200.
    Error(String),
}

impl ServiceStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, ServiceStatus::Available)
    }
}

/// JSON request/response client for the agent backend.
///
/// Holds no per-call state: every call can be retried by the caller.
pub struct BackendClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    health_timeout: Duration,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("weightpilot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Connectivity)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            health_timeout: config.health_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn prepare(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, self.url(path))
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    /// Probe `/health`, reporting why the backend is not usable.
    pub async fn health(&self) -> ServiceStatus {
        let result = self
            .prepare(Method::GET, HEALTH_PATH)
            .timeout(self.health_timeout)
            .send()
            .await;

        match result {
            Ok(response) if response.status() == StatusCode::OK => ServiceStatus::Available,
            Ok(response) => ServiceStatus::Error(format!("HTTP {}", response.status())),
            Err(e) => ServiceStatus::Unavailable(e.to_string()),
        }
    }

    /// True only if `/health` answered 200 within the health timeout.
    pub async fn check_health(&self) -> bool {
        let status = self.health().await;
        if !status.is_available() {
            debug!(?status, "backend health check failed");
        }
        status.is_available()
    }

    /// Issue one JSON call and return the decoded body.
    pub async fn request<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        let started = Instant::now();
        debug!(%method, path, "calling agent backend");

        let mut builder = self.prepare(method.clone(), path);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(%method, path, error = %e, "agent backend unreachable");
            ClientError::Connectivity(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!(%method, path, status = status.as_u16(), "agent backend returned an error");
            return Err(ClientError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(ClientError::Connectivity)?;
        let value = serde_json::from_slice(&bytes)?;
        debug!(%method, path, elapsed_ms = started.elapsed().as_millis() as u64, "agent call finished");
        Ok(value)
    }

    pub async fn get_json(&self, path: &str) -> Result<Value> {
        self.request::<Value>(Method::GET, path, None).await
    }

    pub async fn post_json<B>(&self, path: &str, body: &B) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, path, Some(body)).await
    }

    // MARK: - agent endpoints

    /// `{targets, plan_markdown, trust}` for a profile.
    pub async fn plan(&self, profile: &Profile) -> Result<Value> {
        self.post_json("/v1/plan", profile).await
    }

    /// `{plan_markdown}`.
    pub async fn exercise_plan(
        &self,
        profile: &Profile,
        preferences: Map<String, Value>,
    ) -> Result<Value> {
        let request = ExercisePlanRequest {
            profile,
            preferences,
        };
        self.post_json("/v1/exercise/plan", &request).await
    }

    /// `{public_key, assistant_id}` for the voice widget.
    pub async fn vapi_config(&self) -> Result<Value> {
        self.get_json("/v1/vapi/config").await
    }

    /// `{suggestions: [{name, one_liner}]}`.
    pub async fn recipe_suggest(&self, request: &RecipeSuggestRequest) -> Result<Value> {
        self.post_json("/v1/recipe/suggest", request).await
    }

    /// `{servings, steps, nutrition, image_url | image_b64 | image_error}`.
    pub async fn recipe_detail(&self, request: &RecipeDetailRequest) -> Result<Value> {
        self.post_json("/v1/recipe/detail", request).await
    }

    /// `{items: [{id, name, role, rating, ...}]}`.
    pub async fn coach_search(&self, request: &CoachSearchRequest) -> Result<Value> {
        self.post_json("/v1/coach/search", request).await
    }

    /// `{series, assumptions, explanation_md}`.
    pub async fn progress_project(
        &self,
        profile: &Profile,
        calorie_target: f64,
        extra_burn_kcal_per_day: f64,
        weeks: u32,
    ) -> Result<Value> {
        let request = ProgressProjectRequest {
            profile,
            calorie_target,
            extra_burn_kcal_per_day,
            weeks,
        };
        self.post_json("/v1/progress/project", &request).await
    }
}
