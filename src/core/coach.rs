use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;
use uuid::Uuid;

use super::models::Coach;
use super::store::write_atomic;

/// Client-side narrowing of coach search results.
#[derive(Debug, Clone, Default)]
pub struct CoachFilter {
    /// `None` matches every role.
    pub role: Option<String>,
    pub accepting_only: bool,
    /// Any overlap matches. Empty matches everything.
    pub modalities: Vec<String>,
    /// Any overlap matches. Empty matches everything.
    pub specialties: Vec<String>,
    /// Case-insensitive substring of "city state country".
    pub location: Option<String>,
}

impl CoachFilter {
    pub fn matches(&self, coach: &Coach) -> bool {
        if let Some(role) = &self.role {
            if !coach
                .role
                .as_deref()
                .is_some_and(|r| r.eq_ignore_ascii_case(role))
            {
                return false;
            }
        }
        if self.accepting_only && !coach.accepting_clients.unwrap_or(false) {
            return false;
        }
        if !self.modalities.is_empty() && !overlaps(&self.modalities, &coach.modalities) {
            return false;
        }
        if !self.specialties.is_empty() && !overlaps(&self.specialties, &coach.specialties) {
            return false;
        }
        if let Some(query) = self.location.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let Some(loc) = &coach.location else {
                return false;
            };
            let hay = format!(
                "{} {} {}",
                loc.city.as_deref().unwrap_or_default(),
                loc.state.as_deref().unwrap_or_default(),
                loc.country.as_deref().unwrap_or_default()
            )
            .to_lowercase();
            if !hay.contains(&query.to_lowercase()) {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, coaches: &'a [Coach]) -> Vec<&'a Coach> {
        coaches.iter().filter(|c| self.matches(c)).collect()
    }
}

fn overlaps(wanted: &[String], offered: &[String]) -> bool {
    wanted
        .iter()
        .any(|w| offered.iter().any(|o| o.eq_ignore_ascii_case(w)))
}

/// A consultation request to a coach, kept locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationRequest {
    pub id: String,
    pub pro_id: String,
    pub pro_name: String,
    pub contact_name: String,
    pub contact_email: String,
    pub preferred_datetime: String,
    pub message: String,
    pub modality: String,
    pub attach_profile: bool,
}

impl ConsultationRequest {
    /// Build a request for `coach`. Name and email are required.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        coach: &Coach,
        contact_name: &str,
        contact_email: &str,
        date: NaiveDate,
        time: NaiveTime,
        message: &str,
        modality: &str,
        attach_profile: bool,
    ) -> Option<Self> {
        let contact_name = contact_name.trim();
        let contact_email = contact_email.trim();
        if contact_name.is_empty() || contact_email.is_empty() {
            return None;
        }

        Some(Self {
            id: Uuid::new_v4().to_string(),
            pro_id: coach.id.clone().unwrap_or_default(),
            pro_name: coach.name.clone().unwrap_or_default(),
            contact_name: contact_name.to_string(),
            contact_email: contact_email.to_string(),
            preferred_datetime: format!("{} {}", date, time.format("%H:%M:%S")),
            message: message.trim().to_string(),
            modality: modality.to_string(),
            attach_profile,
        })
    }
}

/// Every consultation request the user has sent, oldest first.
///
/// Stored as a JSON array next to the profile. Unlike cached results this is
/// user data: a file that cannot be read is an error, never an empty log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsultationLog {
    pub requests: Vec<ConsultationRequest>,
}

impl ConsultationLog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json_str =
            serde_json::to_string_pretty(self).context("Failed to serialize requests")?;
        write_atomic(path, json_str.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Append `request` to the log at `path`.
    pub fn record(path: &Path, request: ConsultationRequest) -> Result<()> {
        let mut log = Self::load(path)?;
        log.requests.push(request);
        log.save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::CoachLocation;

    fn coach(id: &str, role: &str, accepting: bool, city: &str) -> Coach {
        Coach {
            id: Some(id.to_string()),
            name: Some(format!("Coach {id}")),
            role: Some(role.to_string()),
            accepting_clients: Some(accepting),
            modalities: vec!["Virtual".to_string()],
            specialties: vec!["Weight management".to_string(), "HIIT".to_string()],
            location: Some(CoachLocation {
                city: Some(city.to_string()),
                state: Some("MA".to_string()),
                country: Some("USA".to_string()),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let coaches = vec![coach("a", "Dietitian", false, "Boston"), Coach::default()];
        assert_eq!(CoachFilter::default().apply(&coaches).len(), 2);
    }

    #[test]
    fn test_role_and_accepting() {
        let coaches = vec![
            coach("a", "Dietitian", true, "Boston"),
            coach("b", "Personal Trainer", true, "Austin"),
            coach("c", "Dietitian", false, "Miami"),
        ];
        let filter = CoachFilter {
            role: Some("dietitian".to_string()),
            accepting_only: true,
            ..Default::default()
        };
        let ids: Vec<_> = filter
            .apply(&coaches)
            .iter()
            .map(|c| c.id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_overlap_and_location() {
        let coaches = vec![coach("a", "Dietitian", true, "Boston")];
        let mut filter = CoachFilter {
            specialties: vec!["Diabetes".to_string(), "hiit".to_string()],
            location: Some("boston ma".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.apply(&coaches).len(), 1);

        filter.modalities = vec!["In-person".to_string()];
        assert!(filter.apply(&coaches).is_empty());

        let no_location = CoachFilter {
            location: Some("Seattle".to_string()),
            ..Default::default()
        };
        assert!(!no_location.matches(&Coach::default()));
    }

    #[test]
    fn test_consultation_requires_contact() {
        let pro = coach("rd_001", "Dietitian", true, "Boston");
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let time = NaiveTime::from_hms_opt(10, 0, 0).unwrap();

        assert!(ConsultationRequest::new(&pro, " ", "a@b.c", date, time, "", "Virtual", true).is_none());

        let request =
            ConsultationRequest::new(&pro, " Jane ", "jane@example.com", date, time, " hi ", "Virtual", false)
                .unwrap();
        assert_eq!(request.pro_id, "rd_001");
        assert_eq!(request.contact_name, "Jane");
        assert_eq!(request.preferred_datetime, "2026-03-02 10:00:00");
        assert_eq!(request.message, "hi");
    }

    fn request_to(coach: &Coach) -> ConsultationRequest {
        ConsultationRequest::new(
            coach,
            "Sam",
            "sam@example.com",
            NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            "",
            "Virtual",
            true,
        )
        .unwrap()
    }

    #[test]
    fn test_consultation_log_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("consultations.json");
        assert!(ConsultationLog::load(&path).unwrap().requests.is_empty());

        let first = request_to(&coach("c1", "Dietitian", true, "Boston"));
        let second = request_to(&coach("c2", "Personal Trainer", true, "Austin"));
        ConsultationLog::record(&path, first.clone()).unwrap();
        ConsultationLog::record(&path, second.clone()).unwrap();

        let log = ConsultationLog::load(&path).unwrap();
        assert_eq!(log.requests, vec![first, second]);
    }

    #[test]
    fn test_unreadable_log_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("consultations.json");
        std::fs::write(&path, "[{\"id\": \"r1\", \"pro_id\"").unwrap();

        let request = request_to(&coach("c1", "Dietitian", true, "Boston"));
        assert!(ConsultationLog::record(&path, request).is_err());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "[{\"id\": \"r1\", \"pro_id\""
        );
    }
}
