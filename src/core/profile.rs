use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::error::ProfileError;
use super::store::write_atomic;

pub const AGE_RANGE: (u32, u32) = (13, 100);
pub const HEIGHT_RANGE_CM: (f64, f64) = (120.0, 230.0);
pub const WEIGHT_RANGE_KG: (f64, f64) = (35.0, 250.0);

/// Lowercase and fold `_`/`-` into spaces so "Very Active", "very_active"
/// and "very-active" all name the same choice.
fn normalize_choice(s: &str) -> String {
    s.trim().to_lowercase().replace(['_', '-'], " ")
}

/// Declares a closed set of form choices with a fixed wire spelling.
macro_rules! choice_enum {
    ($(#[$meta:meta])* $name:ident, $field:literal { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ProfileError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let wanted = normalize_choice(s);
                $name::ALL
                    .iter()
                    .copied()
                    .find(|choice| normalize_choice(choice.as_str()) == wanted)
                    .ok_or_else(|| ProfileError::UnknownChoice {
                        field: $field,
                        value: s.to_string(),
                    })
            }
        }
    };
}

choice_enum!(
    /// Sex assigned at birth, as the backend expects it.
    Sex, "sex_assigned_at_birth" {
        Female => "Female",
        Male => "Male",
    }
);

choice_enum!(
    ActivityLevel, "activity_level" {
        Sedentary => "Sedentary",
        Light => "Light",
        Moderate => "Moderate",
        Active => "Active",
        VeryActive => "Very Active",
    }
);

choice_enum!(
    Goal, "goal" {
        Maintain => "maintain",
        Lose => "lose",
        Gain => "gain",
    }
);

choice_enum!(
    GoalRate, "goal_rate" {
        Gentle => "gentle",
        Moderate => "moderate",
        Aggressive => "aggressive",
    }
);

choice_enum!(
    /// Dietary pattern. No restriction is modelled as `Option::None`.
    Diet, "diet" {
        Vegetarian => "vegetarian",
        Vegan => "vegan",
        Pescatarian => "pescatarian",
        Mediterranean => "mediterranean",
        LowCarb => "low-carb",
        HighProtein => "high-protein",
    }
);

/// The profile sent to the agent backend.
///
/// Built fresh from user input for every action; the backend is solely
/// responsible for interpreting combinations of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub age: u32,
    pub sex_assigned_at_birth: Sex,
    pub gender_identity: Option<String>,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub activity_level: ActivityLevel,
    pub goal: Goal,
    pub goal_rate: GoalRate,
    pub diet: Option<Diet>,
    #[serde(default)]
    pub allergies: BTreeSet<String>,
    #[serde(default)]
    pub medical_flags: BTreeSet<String>,
    #[serde(default)]
    pub cuisines: Vec<String>,
    pub race_ethnicity: Option<String>,
}

impl Profile {
    /// Check the numeric ranges. There are no cross-field rules.
    pub fn validate(&self) -> std::result::Result<(), ProfileError> {
        check_range(
            "age",
            f64::from(self.age),
            (f64::from(AGE_RANGE.0), f64::from(AGE_RANGE.1)),
        )?;
        check_range("height_cm", self.height_cm, HEIGHT_RANGE_CM)?;
        check_range("weight_kg", self.weight_kg, WEIGHT_RANGE_KG)?;
        Ok(())
    }
}

pub(crate) fn check_range(
    field: &'static str,
    value: f64,
    (min, max): (f64, f64),
) -> std::result::Result<(), ProfileError> {
    // NaN is never contained, so it is rejected too
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ProfileError::OutOfRange {
            field,
            min,
            max,
            value,
        })
    }
}

/// Raw values as entered on the profile form.
#[derive(Debug, Clone)]
pub struct ProfileForm {
    pub age: u32,
    pub sex: String,
    pub gender_identity: String,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub activity_level: String,
    pub goal: String,
    pub goal_rate: String,
    /// "none" means no restriction.
    pub diet: String,
    pub allergies: Vec<String>,
    pub medical_flags: Vec<String>,
    pub cuisines: Vec<String>,
    pub race_ethnicity: String,
}

impl Default for ProfileForm {
    fn default() -> Self {
        Self {
            age: 28,
            sex: "Female".to_string(),
            gender_identity: String::new(),
            height_cm: 170.0,
            weight_kg: 72.0,
            activity_level: "Light".to_string(),
            goal: "lose".to_string(),
            goal_rate: "moderate".to_string(),
            diet: "none".to_string(),
            allergies: vec!["none".to_string()],
            medical_flags: vec!["none".to_string()],
            cuisines: vec!["American".to_string(), "Indian".to_string()],
            race_ethnicity: String::new(),
        }
    }
}

impl From<&Profile> for ProfileForm {
    fn from(profile: &Profile) -> Self {
        Self {
            age: profile.age,
            sex: profile.sex_assigned_at_birth.to_string(),
            gender_identity: profile.gender_identity.clone().unwrap_or_default(),
            height_cm: profile.height_cm,
            weight_kg: profile.weight_kg,
            activity_level: profile.activity_level.to_string(),
            goal: profile.goal.to_string(),
            goal_rate: profile.goal_rate.to_string(),
            diet: profile
                .diet
                .map(|d| d.to_string())
                .unwrap_or_else(|| "none".to_string()),
            allergies: profile.allergies.iter().cloned().collect(),
            medical_flags: profile.medical_flags.iter().cloned().collect(),
            cuisines: profile.cuisines.clone(),
            race_ethnicity: profile.race_ethnicity.clone().unwrap_or_default(),
        }
    }
}

impl ProfileForm {
    /// Normalize the form into a validated [`Profile`].
    pub fn build(&self) -> std::result::Result<Profile, ProfileError> {
        let diet = if normalize_choice(&self.diet) == "none" || self.diet.trim().is_empty() {
            None
        } else {
            Some(self.diet.parse::<Diet>()?)
        };

        let profile = Profile {
            age: self.age,
            sex_assigned_at_birth: self.sex.parse()?,
            gender_identity: non_empty(&self.gender_identity),
            height_cm: self.height_cm,
            weight_kg: self.weight_kg,
            activity_level: self.activity_level.parse()?,
            goal: self.goal.parse()?,
            goal_rate: self.goal_rate.parse()?,
            diet,
            allergies: selection(&self.allergies),
            medical_flags: selection(&self.medical_flags),
            cuisines: self
                .cuisines
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
            race_ethnicity: non_empty(&self.race_ethnicity),
        };

        profile.validate()?;
        Ok(profile)
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// A multiselect that contains "none" means an empty selection.
fn selection(items: &[String]) -> BTreeSet<String> {
    if items.iter().any(|i| normalize_choice(i) == "none") {
        return BTreeSet::new();
    }
    items
        .iter()
        .map(|i| i.trim())
        .filter(|i| !i.is_empty())
        .map(str::to_string)
        .collect()
}

/// The profile file on disk, together with the consent flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredProfile {
    #[serde(default = "default_consent")]
    pub consent: bool,
    pub profile: Profile,
}

fn default_consent() -> bool {
    true
}

impl StoredProfile {
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let stored: StoredProfile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        stored
            .profile
            .validate()
            .with_context(|| format!("Invalid profile in {}", path.display()))?;
        Ok(Some(stored))
    }

    /// Written atomically: an interrupted save keeps the previous profile.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json_str =
            serde_json::to_string_pretty(self).context("Failed to serialize profile")?;
        write_atomic(path, json_str.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Profile {
        ProfileForm {
            sex: "Male".to_string(),
            ..ProfileForm::default()
        }
        .build()
        .unwrap()
    }

    #[test]
    fn test_wire_format_matches_backend() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(
            value,
            json!({
                "age": 28,
                "sex_assigned_at_birth": "Male",
                "gender_identity": null,
                "height_cm": 170.0,
                "weight_kg": 72.0,
                "activity_level": "Light",
                "goal": "lose",
                "goal_rate": "moderate",
                "diet": null,
                "allergies": [],
                "medical_flags": [],
                "cuisines": ["American", "Indian"],
                "race_ethnicity": null
            })
        );
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut profile = sample();
        profile.diet = Some(Diet::HighProtein);
        profile.activity_level = ActivityLevel::VeryActive;
        profile.allergies.insert("peanut".to_string());
        profile.race_ethnicity = Some("Optional".to_string());

        let text = serde_json::to_string(&profile).unwrap();
        assert!(text.contains("\"high-protein\""));
        assert!(text.contains("\"Very Active\""));

        let back: Profile = serde_json::from_str(&text).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn test_form_none_means_empty() {
        let form = ProfileForm {
            allergies: vec!["none".to_string(), "gluten".to_string()],
            medical_flags: vec!["diabetes".to_string()],
            gender_identity: "  ".to_string(),
            ..ProfileForm::default()
        };
        let profile = form.build().unwrap();
        assert!(profile.allergies.is_empty());
        assert_eq!(profile.medical_flags.len(), 1);
        assert_eq!(profile.gender_identity, None);
        assert_eq!(profile.diet, None);
    }

    #[test]
    fn test_choice_spellings() {
        assert_eq!("very_active".parse::<ActivityLevel>().unwrap(), ActivityLevel::VeryActive);
        assert_eq!("Very Active".parse::<ActivityLevel>().unwrap(), ActivityLevel::VeryActive);
        assert_eq!("low_carb".parse::<Diet>().unwrap(), Diet::LowCarb);
        assert_eq!("FEMALE".parse::<Sex>().unwrap(), Sex::Female);
        assert!("keto".parse::<Diet>().is_err());
    }

    #[test]
    fn test_ranges() {
        let too_young = ProfileForm {
            age: 12,
            ..ProfileForm::default()
        };
        assert!(matches!(
            too_young.build(),
            Err(ProfileError::OutOfRange { field: "age", .. })
        ));

        let heavy = ProfileForm {
            weight_kg: 250.5,
            ..ProfileForm::default()
        };
        assert!(matches!(
            heavy.build(),
            Err(ProfileError::OutOfRange { field: "weight_kg", .. })
        ));

        let edge = ProfileForm {
            age: 100,
            height_cm: 120.0,
            weight_kg: 35.0,
            ..ProfileForm::default()
        };
        assert!(edge.build().is_ok());

        let nan = ProfileForm {
            height_cm: f64::NAN,
            ..ProfileForm::default()
        };
        assert!(nan.build().is_err());
    }

    #[test]
    fn test_form_from_profile_rebuilds_same_profile() {
        let mut profile = sample();
        profile.diet = Some(Diet::Pescatarian);
        profile.medical_flags.insert("hypertension".to_string());
        let rebuilt = ProfileForm::from(&profile).build().unwrap();
        assert_eq!(rebuilt, profile);
    }

    #[test]
    fn test_stored_profile_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("profile.json");
        assert!(StoredProfile::load(&path).unwrap().is_none());

        let stored = StoredProfile {
            consent: false,
            profile: sample(),
        };
        stored.save(&path).unwrap();

        let loaded = StoredProfile::load(&path).unwrap().unwrap();
        assert!(!loaded.consent);
        assert_eq!(loaded.profile, stored.profile);
    }

    #[test]
    fn test_resave_leaves_only_profile_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        let mut stored = StoredProfile {
            consent: true,
            profile: sample(),
        };
        stored.save(&path).unwrap();
        stored.profile.weight_kg = 70.0;
        stored.save(&path).unwrap();

        assert_eq!(StoredProfile::load(&path).unwrap().unwrap().profile.weight_kg, 70.0);
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["profile.json".to_string()]);
    }
}
