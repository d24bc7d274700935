use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveDate, NaiveTime};
use colored::*;
use serde_json::{Map, Value};
use std::path::Path;

use crate::config::Config;
use crate::core::models::{
    CoachSearchRequest, CoachSearchResults, PayloadView, RecipeDetailRequest,
    RecipeSuggestRequest, RecipeSuggestions,
};
use crate::core::profile::{Goal, Profile, ProfileForm, StoredProfile};
use crate::core::progress::{self, WeightLog};
use crate::core::{CoachFilter, ConsultationLog, ConsultationRequest, ResultCache};
use crate::formatter::ResultFormatter;
use crate::http_client::BackendClient;
use crate::session::{self, Action, ActionOutcome, ResultSlot, SessionState};
use crate::voice::{self, WidgetCredentials};

pub use commands::{
    Args, CacheCommands, CoachCommands, CoachFilterArgs, Commands, IngredientArgs,
    ProfileCommands, ProfileFields, RecipeCommands, TrackCommands,
};

mod commands;

/// Everything a command needs, resolved once at start.
pub struct App {
    pub config: Config,
    pub cache: ResultCache,
    pub client: BackendClient,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let client =
            BackendClient::new(&config.backend).context("Failed to create HTTP client")?;
        let cache = ResultCache::new(config.cache_dir.clone());
        Ok(Self {
            config,
            cache,
            client,
        })
    }

    fn stored_profile(&self) -> Result<Option<StoredProfile>> {
        StoredProfile::load(&self.config.profile_file())
    }

    fn session(&self) -> Result<SessionState> {
        let (profile, consent) = match self.stored_profile()? {
            Some(stored) => (Some(stored.profile), stored.consent),
            None => (None, true),
        };
        Ok(SessionState::restore(&self.cache, profile, consent))
    }
}

pub async fn dispatch(app: &App, command: Commands) -> Result<()> {
    match command {
        Commands::Status => handle_status(app).await,
        Commands::Health => handle_health(app).await,
        Commands::Profile { command } => match command {
            ProfileCommands::Init { force } => handle_profile_init(app, force),
            ProfileCommands::Show => handle_profile_show(app),
            ProfileCommands::Set(fields) => handle_profile_set(app, fields),
        },
        Commands::Plan => run_action(app, Action::GeneratePlan).await.map(|_| ()),
        Commands::Exercise { preferences } => handle_exercise(app, &preferences).await,
        Commands::Project {
            calorie_target,
            extra_burn,
            weeks,
        } => {
            let action = Action::ProjectProgress {
                calorie_target,
                extra_burn_kcal_per_day: extra_burn,
                weeks,
            };
            run_action(app, action).await.map(|_| ())
        }
        Commands::Track { command } => match command {
            TrackCommands::Log { weight_kg, date } => {
                handle_track_log(app, weight_kg, date.as_deref())
            }
            TrackCommands::History { all } => handle_track_history(app, all),
            TrackCommands::Show => handle_track_show(app),
            TrackCommands::Set {
                start_kg,
                target_kg,
            } => handle_track_set(app, start_kg, target_kg),
        },
        Commands::Recipe { command } => match command {
            RecipeCommands::Suggest { input, count } => {
                let request = RecipeSuggestRequest {
                    ingredients: input.ingredients,
                    cuisine: input.cuisine,
                    count,
                };
                run_action(app, Action::SuggestRecipes(request)).await.map(|_| ())
            }
            RecipeCommands::Detail {
                dish,
                pick,
                input,
                image_out,
            } => handle_recipe_detail(app, dish, pick, input, image_out.as_deref()).await,
            RecipeCommands::Clear => handle_recipe_clear(app),
        },
        Commands::Coach { command } => match command {
            CoachCommands::Search {
                zip,
                city,
                state,
                roles,
                radius_km,
                max_results,
                filter,
            } => {
                let request = CoachSearchRequest {
                    zip,
                    city,
                    state,
                    roles,
                    radius_km,
                    max_results,
                };
                let state = run_action(app, Action::SearchCoaches(request)).await?;
                print_coaches(&state, &coach_filter(filter));
                Ok(())
            }
            CoachCommands::List { filter } => {
                print_coaches(&app.session()?, &coach_filter(filter));
                Ok(())
            }
            CoachCommands::Request {
                id,
                name,
                email,
                date,
                time,
                message,
                modality,
                no_profile,
            } => {
                let details = RequestDetails {
                    name,
                    email,
                    date,
                    time,
                    message,
                    modality,
                    attach_profile: !no_profile,
                };
                handle_coach_request(app, &id, details)
            }
            CoachCommands::Requests => handle_coach_requests(app),
        },
        Commands::Voice { out } => handle_voice(app, &out).await,
        Commands::Cache { command } => match command {
            CacheCommands::List => handle_cache_list(app),
            CacheCommands::Show { name } => handle_cache_show(app, &name),
            CacheCommands::Clear { name } => handle_cache_clear(app, &name),
        },
    }
}

/// Run one action, print its outcome and rendered result.
async fn run_action(app: &App, action: Action) -> Result<SessionState> {
    let state = app.session()?;
    println!("{}", "⏳ Contacting agent…".dimmed());
    let (state, outcome) = session::perform(state, &app.client, &app.cache, action).await;

    match &outcome {
        ActionOutcome::Completed(slot) => {
            println!("{}", format!("✅ {}", outcome.message()).green());
            if let Some(result) = state.result(*slot) {
                println!();
                print!("{}", render_slot(*slot, &result.data));
            }
            Ok(state)
        }
        ActionOutcome::Cleared(_) => {
            println!("{}", outcome.message().green());
            Ok(state)
        }
        ActionOutcome::Rejected(reason) => bail!("{}", reason),
        ActionOutcome::Failed(_) => bail!("{}", outcome.message()),
    }
}

fn render_slot(slot: ResultSlot, data: &Value) -> String {
    match slot {
        ResultSlot::Diet => ResultFormatter::format_plan(data),
        ResultSlot::Exercise => ResultFormatter::format_exercise(data),
        ResultSlot::Progress => ResultFormatter::format_projection(data),
        ResultSlot::RecipeSuggestions => ResultFormatter::format_suggestions(data),
        ResultSlot::RecipeDetail => ResultFormatter::format_recipe(data),
        // the coach commands print the (filtered) cards themselves
        ResultSlot::Coaches => String::new(),
    }
}

pub async fn handle_status(app: &App) -> Result<()> {
    println!("{}", "WeightPilot Status".cyan().bold());
    println!("Backend URL: {}", app.client.base_url());

    let status = app.client.health().await;
    if status.is_available() {
        println!("Backend status: {}", "Online".green());
    } else {
        println!("Backend status: {} ({:?})", "Offline".red(), status);
    }

    match app.stored_profile()? {
        Some(stored) => println!(
            "Profile: {} y/o, {} kg, goal {} (consent: {})",
            stored.profile.age, stored.profile.weight_kg, stored.profile.goal, stored.consent
        ),
        None => println!("Profile: {}", "not set (run `weightpilot profile init`)".yellow()),
    }

    println!("\n{}", "Cached results".cyan().bold());
    println!("Directory: {}", app.cache.dir().display());
    print_cache_entries(app)
}

pub async fn handle_health(app: &App) -> Result<()> {
    if app.client.check_health().await {
        println!("{} {}", "Online".green(), app.client.base_url());
        Ok(())
    } else {
        bail!("Backend offline: {}", app.client.base_url())
    }
}

pub fn handle_profile_init(app: &App, force: bool) -> Result<()> {
    let path = app.config.profile_file();
    if path.exists() && !force {
        bail!(
            "Profile already exists at {} (use --force to replace it)",
            path.display()
        );
    }
    let stored = StoredProfile {
        consent: true,
        profile: ProfileForm::default().build()?,
    };
    stored.save(&path)?;
    println!("✅ Profile saved to {}", path.display());
    Ok(())
}

pub fn handle_profile_show(app: &App) -> Result<()> {
    let stored = app
        .stored_profile()?
        .ok_or_else(|| anyhow!("No profile found. Run `weightpilot profile init` first."))?;
    println!("{}", serde_json::to_string_pretty(&stored.profile)?);
    if !stored.consent {
        println!("{}", "⚠️  Consent not given: actions will not be sent.".yellow());
    }
    Ok(())
}

/// Overlay the given fields on an existing form.
pub fn apply_fields(mut form: ProfileForm, fields: ProfileFields) -> ProfileForm {
    if let Some(age) = fields.age {
        form.age = age;
    }
    if let Some(sex) = fields.sex {
        form.sex = sex;
    }
    if let Some(gender_identity) = fields.gender_identity {
        form.gender_identity = gender_identity;
    }
    if let Some(height_cm) = fields.height_cm {
        form.height_cm = height_cm;
    }
    if let Some(weight_kg) = fields.weight_kg {
        form.weight_kg = weight_kg;
    }
    if let Some(activity) = fields.activity {
        form.activity_level = activity;
    }
    if let Some(goal) = fields.goal {
        form.goal = goal;
    }
    if let Some(goal_rate) = fields.goal_rate {
        form.goal_rate = goal_rate;
    }
    if let Some(diet) = fields.diet {
        form.diet = diet;
    }
    if let Some(allergies) = fields.allergies {
        form.allergies = allergies;
    }
    if let Some(medical) = fields.medical {
        form.medical_flags = medical;
    }
    if let Some(cuisines) = fields.cuisines {
        form.cuisines = cuisines;
    }
    if let Some(race_ethnicity) = fields.race_ethnicity {
        form.race_ethnicity = race_ethnicity;
    }
    form
}

pub fn handle_profile_set(app: &App, fields: ProfileFields) -> Result<()> {
    let existing = app.stored_profile()?;
    let consent = fields
        .consent
        .or(existing.as_ref().map(|s| s.consent))
        .unwrap_or(true);
    let form = existing
        .as_ref()
        .map(|s| ProfileForm::from(&s.profile))
        .unwrap_or_default();

    let profile: Profile = apply_fields(form, fields).build()?;
    StoredProfile { consent, profile }.save(&app.config.profile_file())?;
    println!("✅ Profile saved. Use `weightpilot plan` to generate your plan.");
    Ok(())
}

/// `YYYY-MM-DD`, or today when absent.
fn parse_date(raw: Option<&str>) -> Result<NaiveDate> {
    match raw {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .with_context(|| format!("Invalid date {raw:?}, expected YYYY-MM-DD")),
        None => Ok(Local::now().date_naive()),
    }
}

fn handle_track_log(app: &App, weight_kg: f64, date: Option<&str>) -> Result<()> {
    let path = app.config.weights_file();
    let date = parse_date(date)?;
    let mut log = WeightLog::load(&path)?;
    log.record(date, weight_kg)?;
    log.save(&path)?;
    println!("📈 Logged {:.1} kg for {}", weight_kg, date);
    Ok(())
}

fn handle_track_history(app: &App, all: bool) -> Result<()> {
    let log = WeightLog::load(&app.config.weights_file())?;
    let entries = if all {
        log.entries()
    } else {
        log.trend(Local::now().date_naive())
    };
    if entries.is_empty() {
        println!("No weigh-ins yet. Run `weightpilot track log <kg>`.");
        return Ok(());
    }

    println!("{}", "Weekly weight trend".cyan().bold());
    let mut previous: Option<f64> = None;
    for entry in entries {
        let change = match previous {
            Some(p) => format!("{:+.1}", entry.weight_kg - p),
            None => String::new(),
        };
        println!("  {}  {:>6.1} kg  {}", entry.date, entry.weight_kg, change.dimmed());
        previous = Some(entry.weight_kg);
    }
    Ok(())
}

fn handle_track_show(app: &App) -> Result<()> {
    let log = WeightLog::load(&app.config.weights_file())?;
    let goal = app
        .stored_profile()?
        .map(|stored| stored.profile.goal)
        .unwrap_or(Goal::Maintain);

    let (Some(start), Some(current), Some(target)) = (
        log.start_weight(),
        log.current_weight(),
        log.target_weight(goal),
    ) else {
        println!("No weigh-ins yet. Run `weightpilot track log <kg>`.");
        return Ok(());
    };
    let percent = progress::progress_percent(start, current, target);

    println!("Start {:.1} kg → now {:.1} kg → target {:.1} kg", start, current, target);
    let filled = (percent * 20.0).round() as usize;
    println!(
        "[{}{}] {:.0}% complete",
        "█".repeat(filled).green(),
        "░".repeat(20 - filled),
        (percent * 100.0).floor()
    );
    Ok(())
}

fn handle_track_set(app: &App, start_kg: Option<f64>, target_kg: Option<f64>) -> Result<()> {
    if start_kg.is_none() && target_kg.is_none() {
        bail!("Pass --start-kg and/or --target-kg");
    }
    let path = app.config.weights_file();
    let mut log = WeightLog::load(&path)?;
    if let Some(start) = start_kg {
        log.set_start(start)?;
    }
    if let Some(target) = target_kg {
        log.set_target(target)?;
    }
    log.save(&path)?;
    println!("✅ Targets updated.");
    Ok(())
}

/// `key=value`, where value is parsed as JSON when it can be.
pub fn parse_preference(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Preference must look like key=value: {raw:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("Preference key is empty: {raw:?}");
    }
    let value = value.trim();
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

async fn handle_exercise(app: &App, raw: &[String]) -> Result<()> {
    let preferences = raw
        .iter()
        .map(|p| parse_preference(p))
        .collect::<Result<Map<String, Value>>>()?;
    run_action(app, Action::ExercisePlan { preferences })
        .await
        .map(|_| ())
}

async fn handle_recipe_detail(
    app: &App,
    dish: Option<String>,
    pick: Option<usize>,
    input: IngredientArgs,
    image_out: Option<&Path>,
) -> Result<()> {
    let dish = match (dish, pick) {
        (Some(dish), _) => dish,
        (None, Some(n)) => {
            let state = app.session()?;
            let ideas = state
                .result(ResultSlot::RecipeSuggestions)
                .map(|r| RecipeSuggestions::from_payload(&r.data))
                .unwrap_or_default();
            let chosen = n
                .checked_sub(1)
                .and_then(|i| ideas.suggestions.get(i))
                .ok_or_else(|| anyhow!("No suggestion #{n}. Run `weightpilot recipe suggest` first."))?;
            chosen.name.clone().unwrap_or_default()
        }
        (None, None) => bail!("Pass --dish or --pick"),
    };

    let request = RecipeDetailRequest {
        dish,
        ingredients: input.ingredients,
        cuisine: input.cuisine,
    };
    let state = run_action(app, Action::RecipeDetail(request)).await?;

    if let Some(path) = image_out {
        let image = state
            .result(ResultSlot::RecipeDetail)
            .and_then(|r| ResultFormatter::decode_image(&r.data));
        match image {
            Some(bytes) => {
                std::fs::write(path, bytes)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("🖼  Image saved to {}", path.display());
            }
            None => println!("{}", "No inline image to save.".yellow()),
        }
    }
    println!(
        "{}",
        "Nutrition is model-estimated; for clinical needs verify with a registered dietitian."
            .dimmed()
    );
    Ok(())
}

fn handle_recipe_clear(app: &App) -> Result<()> {
    let state = app.session()?;
    let (state, _) = session::clear(state, &app.cache, ResultSlot::RecipeSuggestions);
    let (_, outcome) = session::clear(state, &app.cache, ResultSlot::RecipeDetail);
    println!("{}", outcome.message().green());
    Ok(())
}

fn coach_filter(args: CoachFilterArgs) -> CoachFilter {
    CoachFilter {
        role: args.only_role,
        accepting_only: args.accepting,
        modalities: args.modalities,
        specialties: args.specialties,
        location: args.location,
    }
}

fn print_coaches(state: &SessionState, filter: &CoachFilter) {
    let Some(result) = state.result(ResultSlot::Coaches) else {
        println!("{}", "No coach search yet. Run `weightpilot coach search`.".yellow());
        return;
    };
    let results = CoachSearchResults::from_payload(&result.data);
    let shown = filter.apply(&results.items);

    println!("{}", format!("Results: {} professional(s)", shown.len()).bold());
    for coach in shown {
        println!();
        if let Some(id) = &coach.id {
            println!("{}", format!("[{}]", id).dimmed());
        }
        print!("{}", ResultFormatter::format_coach(coach));
    }
}

pub struct RequestDetails {
    pub name: String,
    pub email: String,
    pub date: Option<String>,
    pub time: String,
    pub message: String,
    pub modality: String,
    pub attach_profile: bool,
}

fn handle_coach_request(app: &App, id: &str, details: RequestDetails) -> Result<()> {
    let state = app.session()?;
    let results = state
        .result(ResultSlot::Coaches)
        .map(|r| CoachSearchResults::from_payload(&r.data))
        .unwrap_or_default();
    let coach = results
        .items
        .iter()
        .find(|c| c.id.as_deref() == Some(id))
        .ok_or_else(|| anyhow!("No coach with id {id:?} in the last search"))?;

    let date = parse_date(details.date.as_deref())?;
    let time = NaiveTime::parse_from_str(&details.time, "%H:%M")
        .with_context(|| format!("Invalid time {:?}, expected HH:MM", details.time))?;

    let request = ConsultationRequest::new(
        coach,
        &details.name,
        &details.email,
        date,
        time,
        &details.message,
        &details.modality,
        details.attach_profile,
    )
    .ok_or_else(|| anyhow!("Please provide your name and email."))?;

    ConsultationLog::record(&app.config.consultations_file(), request.clone())
        .context("Consultation request not recorded")?;

    println!(
        "{}",
        format!("📨 Request sent to {}. You'll be contacted by email.", request.pro_name).green()
    );
    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}

fn handle_coach_requests(app: &App) -> Result<()> {
    let log = ConsultationLog::load(&app.config.consultations_file())?;
    if log.requests.is_empty() {
        println!("No requests sent yet.");
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&log)?);
    Ok(())
}

async fn handle_voice(app: &App, out: &Path) -> Result<()> {
    let payload = app
        .client
        .vapi_config()
        .await
        .context("Could not load voice configuration")?;
    let credentials = WidgetCredentials::from_payload(&payload)
        .ok_or_else(|| anyhow!("Voice is not configured on the backend"))?;

    std::fs::write(out, voice::widget_page(&credentials))
        .with_context(|| format!("Failed to write {}", out.display()))?;
    println!("🎙  Open {} in a browser to talk to your coach.", out.display());
    Ok(())
}

fn print_cache_entries(app: &App) -> Result<()> {
    let names = app.cache.names()?;
    if names.is_empty() {
        println!("(empty)");
        return Ok(());
    }
    for name in names {
        let captured = app
            .cache
            .load(&name)
            .and_then(|r| r.captured_at())
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unreadable".to_string());
        println!("  {:<20} {}", name.cyan(), captured);
    }
    Ok(())
}

fn handle_cache_list(app: &App) -> Result<()> {
    print_cache_entries(app)
}

fn handle_cache_show(app: &App, name: &str) -> Result<()> {
    let result = app
        .cache
        .load(name)
        .ok_or_else(|| anyhow!("Nothing cached under {name:?}"))?;
    println!("{}", serde_json::to_string_pretty(&result.data)?);
    Ok(())
}

fn handle_cache_clear(app: &App, name: &str) -> Result<()> {
    match ResultSlot::from_cache_name(name) {
        Some(slot) => {
            let (_, outcome) = session::clear(app.session()?, &app.cache, slot);
            println!("{}", outcome.message().green());
        }
        None => {
            app.cache.clear(name)?;
            println!("{}", format!("{} cleared", name).green());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_preference() {
        assert_eq!(
            parse_preference("days_per_week=4").unwrap(),
            ("days_per_week".to_string(), json!(4))
        );
        assert_eq!(
            parse_preference("equipment=[\"bands\",\"mat\"]").unwrap().1,
            json!(["bands", "mat"])
        );
        assert_eq!(
            parse_preference("focus = strength").unwrap(),
            ("focus".to_string(), json!("strength"))
        );
        assert!(parse_preference("novalue").is_err());
        assert!(parse_preference("=3").is_err());
    }

    #[test]
    fn test_apply_fields_keeps_unset() {
        let form = apply_fields(
            ProfileForm::default(),
            ProfileFields {
                weight_kg: Some(80.5),
                diet: Some("vegan".to_string()),
                allergies: Some(vec!["soy".to_string()]),
                ..Default::default()
            },
        );
        let profile = form.build().unwrap();
        assert_eq!(profile.weight_kg, 80.5);
        assert_eq!(profile.age, 28);
        assert_eq!(profile.diet.map(|d| d.to_string()).as_deref(), Some("vegan"));
        assert!(profile.allergies.contains("soy"));
    }

    #[test]
    fn test_coach_results_are_not_summarized_twice() {
        let data = json!({"items": [{"id": "c1"}, {"id": "c2"}]});
        assert_eq!(render_slot(ResultSlot::Coaches, &data), "");
        assert!(render_slot(ResultSlot::Diet, &json!({})).contains("_No plan returned_"));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date(Some("2026-09-03")).unwrap(),
            NaiveDate::from_ymd_opt(2026, 9, 3).unwrap()
        );
        assert!(parse_date(Some("03/09/2026")).is_err());
    }
}
