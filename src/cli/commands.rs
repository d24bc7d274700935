use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "weightpilot")]
#[command(about = "Personalized diet & weight care, backed by your agent service")]
#[command(version)]
pub struct Args {
    /// Agent backend base URL (overrides AGENT_API_URL)
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    /// API key sent as X-API-Key (overrides UI_API_KEY)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// HTTP timeout in seconds (overrides UI_HTTP_TIMEOUT)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Directory holding profile.json
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Directory holding cached results (overrides UI_CACHE_DIR)
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show backend, profile and cache status
    Status,
    /// Check whether the backend answers /health
    Health,
    /// Manage the saved profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Generate a personalized 7-day diet plan
    Plan,
    /// Generate an exercise plan
    Exercise {
        /// Preference as key=value (value may be JSON), repeatable
        #[arg(long = "pref", value_name = "KEY=VALUE")]
        preferences: Vec<String>,
    },
    /// Project weight over the coming weeks
    Project {
        /// Daily calorie target (defaults to the last diet plan's)
        #[arg(long)]
        calorie_target: Option<f64>,
        /// Extra kcal burned per day through exercise
        #[arg(long, default_value = "0")]
        extra_burn: f64,
        #[arg(long, default_value = "12")]
        weeks: u32,
    },
    /// Log weigh-ins and follow progress toward the goal weight
    Track {
        #[command(subcommand)]
        command: TrackCommands,
    },
    /// Recipe ideas from ingredients
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Find and contact coaches
    Coach {
        #[command(subcommand)]
        command: CoachCommands,
    },
    /// Write a page that opens the voice coach
    Voice {
        #[arg(long, default_value = "voice-coach.html")]
        out: PathBuf,
    },
    /// Inspect or clear cached results
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Write the default profile
    Init {
        /// Replace an existing profile
        #[arg(long)]
        force: bool,
    },
    /// Show the saved profile as sent to the backend
    Show,
    /// Change fields of the saved profile
    Set(ProfileFields),
}

#[derive(ClapArgs, Default)]
pub struct ProfileFields {
    #[arg(long)]
    pub age: Option<u32>,
    /// Female or Male
    #[arg(long)]
    pub sex: Option<String>,
    #[arg(long)]
    pub gender_identity: Option<String>,
    #[arg(long)]
    pub height_cm: Option<f64>,
    #[arg(long)]
    pub weight_kg: Option<f64>,
    /// sedentary, light, moderate, active, very-active
    #[arg(long)]
    pub activity: Option<String>,
    /// maintain, lose, gain
    #[arg(long)]
    pub goal: Option<String>,
    /// gentle, moderate, aggressive
    #[arg(long)]
    pub goal_rate: Option<String>,
    /// none, vegetarian, vegan, pescatarian, mediterranean, low-carb, high-protein
    #[arg(long)]
    pub diet: Option<String>,
    /// Replaces the list; "none" clears it
    #[arg(long, value_delimiter = ',')]
    pub allergies: Option<Vec<String>>,
    /// Replaces the list; "none" clears it
    #[arg(long, value_delimiter = ',')]
    pub medical: Option<Vec<String>>,
    #[arg(long, value_delimiter = ',')]
    pub cuisines: Option<Vec<String>>,
    #[arg(long)]
    pub race_ethnicity: Option<String>,
    /// Consent to sending the profile to the backend
    #[arg(long)]
    pub consent: Option<bool>,
}

#[derive(Subcommand)]
pub enum TrackCommands {
    /// Record a weigh-in (replaces any entry for the same date)
    Log {
        weight_kg: f64,
        /// YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Weigh-ins from the last 8 weeks
    History {
        /// Show every entry
        #[arg(long)]
        all: bool,
    },
    /// Progress toward the target weight
    Show,
    /// Override the start or target weight
    Set {
        #[arg(long)]
        start_kg: Option<f64>,
        #[arg(long)]
        target_kg: Option<f64>,
    },
}

#[derive(ClapArgs)]
pub struct IngredientArgs {
    #[arg(long = "ingredient", short = 'i', value_delimiter = ',', default_values = ["Onion", "Tomato", "Chicken"])]
    pub ingredients: Vec<String>,
    #[arg(long, default_value = "indian")]
    pub cuisine: String,
}

#[derive(Subcommand)]
pub enum RecipeCommands {
    /// Suggest dishes
    Suggest {
        #[command(flatten)]
        input: IngredientArgs,
        #[arg(long, default_value = "5")]
        count: u32,
    },
    /// Full recipe, nutrition and image for one dish
    Detail {
        /// Dish name
        #[arg(long, conflicts_with = "pick", required_unless_present = "pick")]
        dish: Option<String>,
        /// Number of a dish from the last suggestions (1-based)
        #[arg(long)]
        pick: Option<usize>,
        #[command(flatten)]
        input: IngredientArgs,
        /// Save an inline image to this file
        #[arg(long)]
        image_out: Option<PathBuf>,
    },
    /// Forget suggestions and recipe detail
    Clear,
}

#[derive(Subcommand)]
pub enum CoachCommands {
    /// Search coaches near a place
    Search {
        #[arg(long)]
        zip: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        state: Option<String>,
        /// Dietitian, Personal Trainer; repeatable
        #[arg(long = "role")]
        roles: Vec<String>,
        #[arg(long, default_value = "25")]
        radius_km: f64,
        #[arg(long, default_value = "20")]
        max_results: u32,
        #[command(flatten)]
        filter: CoachFilterArgs,
    },
    /// Show the last search results, optionally narrowed
    List {
        #[command(flatten)]
        filter: CoachFilterArgs,
    },
    /// Request a consultation with a coach from the last search
    Request {
        /// Coach id
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,
        /// HH:MM
        #[arg(long, default_value = "10:00")]
        time: String,
        #[arg(long, default_value = "")]
        message: String,
        #[arg(long, default_value = "Virtual")]
        modality: String,
        /// Do not attach the profile summary
        #[arg(long)]
        no_profile: bool,
    },
    /// List sent consultation requests
    Requests,
}

#[derive(ClapArgs, Default)]
pub struct CoachFilterArgs {
    /// Only this role
    #[arg(long = "only-role")]
    pub only_role: Option<String>,
    #[arg(long)]
    pub accepting: bool,
    #[arg(long = "modality")]
    pub modalities: Vec<String>,
    #[arg(long = "specialty")]
    pub specialties: Vec<String>,
    /// city / state / country contains
    #[arg(long)]
    pub location: Option<String>,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// List cached result names and when they were captured
    List,
    /// Print a cached payload as JSON
    Show { name: String },
    /// Delete a cached result
    Clear { name: String },
}
