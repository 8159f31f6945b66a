use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{AppError, AppResult};

/// Number of sections a user can mark as completed for a day.
pub const SECTION_COUNT: usize = 4;

/// Keys a client may send in an autosave body that must never reach the content document.
const PROTECTED_KEYS: &[&str] = &["id", "_id", "userId", "date", "createdAt", "updatedAt"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub content: EntryContent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entry as returned by the API: the stored document plus derived fields.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    #[serde(flatten)]
    pub entry: Entry,
    pub completion_percentage: u8,
}

impl From<Entry> for EntryView {
    fn from(entry: Entry) -> Self {
        let completion_percentage = entry.content.completion_percentage();
        Self {
            entry,
            completion_percentage,
        }
    }
}

// ============================================================================
// Closed vocabularies
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    Sunny,
    PartlyCloudy,
    Cloudy,
    Rainy,
    Stormy,
    Snowy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepQuality {
    Poor,
    Fair,
    Good,
    Great,
    Excellent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feeling {
    Happy,
    Peace,
    Sad,
    Worried,
    Excited,
    Bored,
    Relaxed,
    Lonely,
    Tired,
    Angry,
    Overwhelmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Reflection,
    SelfCare,
    Emotional,
    Review,
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct Reflection {
    #[validate(custom = "validate_list_items")]
    pub gratitude: Vec<String>,
    #[validate(length(max = 1000))]
    pub expectations: Option<String>,
    #[validate(custom = "validate_list_items")]
    pub positive_notes: Vec<String>,
    #[validate(length(max = 1000))]
    pub what_makes_today_great: Option<String>,
    #[validate(custom = "validate_list_items")]
    pub good_things_happened: Vec<String>,
    #[validate(length(max = 2000))]
    pub self_assessment_note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct Trackers {
    #[validate(range(min = 1, max = 5, message = "Mood must be between 1 and 5"))]
    pub mood: Option<u8>,
    #[validate(range(max = 15, message = "Water intake must be between 0 and 15"))]
    pub water_intake: u8,
    #[validate(range(min = 0.0, max = 24.0, message = "Sleep hours must be between 0 and 24"))]
    pub sleep_hours: Option<f64>,
    pub sleep_quality: Option<SleepQuality>,
    pub meals: Meals,
    #[validate]
    pub energy_levels: Vec<EnergyReading>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Meals {
    pub breakfast: bool,
    pub lunch: bool,
    pub dinner: bool,
    pub snack: bool,
}

/// One point on the day's energy curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct EnergyReading {
    /// Hour of day, 6 through 24.
    #[validate(range(min = 6, max = 24, message = "Energy time must be between 6 and 24"))]
    pub time: u8,
    #[validate(range(max = 10, message = "Energy must be between 0 and 10"))]
    pub energy: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct TomorrowPlan {
    #[validate(length(max = 1000))]
    pub how_to_make_better: Option<String>,
    #[validate(length(max = 1000))]
    pub expectations: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct SelfCare {
    #[validate(length(max = 1000))]
    pub self_love: Option<String>,
    #[validate(length(max = 1000))]
    pub gratitude_note: Option<String>,
    pub feeling: Option<Feeling>,
    pub additional_feelings: Vec<Feeling>,
    #[validate]
    pub activities: Activities,
    #[validate(length(max = 2000))]
    pub mind_thoughts: Option<String>,
    #[validate(length(max = 1000))]
    pub next_step: Option<String>,
    #[validate]
    pub ratings: Ratings,
    pub self_care_checklist: SelfCareChecklist,
    pub self_care_plan_days: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Activities {
    #[validate(range(max = 5))]
    pub reading: u8,
    #[validate(range(max = 7))]
    pub music: u8,
    #[validate(range(max = 5))]
    pub mindfulness: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct Ratings {
    #[validate(range(min = 1, max = 5))]
    pub self_talk: Option<u8>,
    #[validate(range(min = 1, max = 5))]
    pub energy_point: Option<u8>,
    #[validate(range(min = 1, max = 5))]
    pub overall: Option<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelfCareChecklist {
    pub ate_breakfast: bool,
    pub ate_lunch: bool,
    pub ate_dinner: bool,
    #[serde(rename = "slept7to9Hours")]
    pub slept_7_to_9_hours: bool,
    pub took_nap: bool,
    pub watched_movie: bool,
    pub got_fresh_air: bool,
    pub exercised: bool,
    pub called_friend: bool,
    pub journaled: bool,
    pub drank_water: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct EmotionalGuidance {
    #[validate(length(max = 500))]
    pub where_are_you: Option<String>,
    #[validate(length(max = 1000))]
    pub how_youre_feeling: Option<String>,
    #[validate(length(max = 1000))]
    pub what_youre_thinking: Option<String>,
    #[validate(length(max = 1000))]
    pub coping_method: Option<String>,
    #[validate(length(max = 1000))]
    pub feeling_before_go: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct Review {
    #[validate(custom = "validate_list_items")]
    pub priorities: Vec<String>,
    #[validate]
    pub todo_list: Vec<TodoItem>,
    #[validate(length(max = 1000))]
    pub focus: Option<String>,
    #[validate(length(max = 2000))]
    pub mindfulness_notes: Option<String>,
    #[validate(custom = "validate_list_items")]
    pub today_notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TodoItem {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[validate(length(min = 1, max = 500, message = "To-do text must be 1-500 characters"))]
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

fn validate_list_items(items: &[String]) -> Result<(), ValidationError> {
    if items.iter().any(|item| item.chars().count() > 500) {
        let mut err = ValidationError::new("length");
        err.message = Some("List items must be at most 500 characters".into());
        return Err(err);
    }
    Ok(())
}

// ============================================================================
// Entry content
// ============================================================================

/// The mutable part of an entry. Sections are flattened so the wire format
/// stays a single flat document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryContent {
    pub weather: Option<Weather>,
    #[serde(flatten)]
    #[validate]
    pub reflection: Reflection,
    #[serde(flatten)]
    #[validate]
    pub trackers: Trackers,
    #[validate]
    pub tomorrow_plan: TomorrowPlan,
    #[serde(flatten)]
    #[validate]
    pub self_care: SelfCare,
    #[validate]
    pub emotional_guidance: EmotionalGuidance,
    #[serde(flatten)]
    #[validate]
    pub review: Review,
    pub completed_sections: Vec<Section>,
}

impl EntryContent {
    /// Share of the eight key fields that are filled in, as a whole percent.
    pub fn completion_percentage(&self) -> u8 {
        let checks = [
            !self.reflection.gratitude.is_empty(),
            self.trackers.mood.is_some(),
            self.trackers.water_intake > 0,
            is_present(&self.self_care.self_love),
            self.self_care.feeling.is_some(),
            self.self_care.ratings.overall.is_some(),
            is_present(&self.emotional_guidance.where_are_you),
            !self.review.priorities.is_empty(),
        ];
        let filled = checks.iter().filter(|c| **c).count();
        (filled as f64 / checks.len() as f64 * 100.0).round() as u8
    }

    /// Completed sections as a whole percent of the four sections.
    pub fn section_completion_rate(&self) -> u8 {
        (self.completed_sections.len() as f64 / SECTION_COUNT as f64 * 100.0).round() as u8
    }

    /// Primary feeling followed by any additional ones.
    pub fn feelings(&self) -> impl Iterator<Item = Feeling> + '_ {
        self.self_care
            .feeling
            .into_iter()
            .chain(self.self_care.additional_feelings.iter().copied())
    }

    /// Trim free text and collapse duplicate completed sections.
    pub fn normalize(&mut self) {
        let r = &mut self.reflection;
        trim_all(&mut r.gratitude);
        trim_opt(&mut r.expectations);
        trim_all(&mut r.positive_notes);
        trim_opt(&mut r.what_makes_today_great);
        trim_all(&mut r.good_things_happened);
        trim_opt(&mut r.self_assessment_note);

        trim_opt(&mut self.tomorrow_plan.how_to_make_better);
        trim_opt(&mut self.tomorrow_plan.expectations);

        let s = &mut self.self_care;
        trim_opt(&mut s.self_love);
        trim_opt(&mut s.gratitude_note);
        trim_opt(&mut s.mind_thoughts);
        trim_opt(&mut s.next_step);

        let g = &mut self.emotional_guidance;
        trim_opt(&mut g.where_are_you);
        trim_opt(&mut g.how_youre_feeling);
        trim_opt(&mut g.what_youre_thinking);
        trim_opt(&mut g.coping_method);
        trim_opt(&mut g.feeling_before_go);

        let v = &mut self.review;
        trim_all(&mut v.priorities);
        for todo in &mut v.todo_list {
            todo.text = todo.text.trim().to_string();
        }
        trim_opt(&mut v.focus);
        trim_opt(&mut v.mindfulness_notes);
        trim_all(&mut v.today_notes);

        let mut seen = Vec::with_capacity(SECTION_COUNT);
        self.completed_sections.retain(|s| {
            if seen.contains(s) {
                false
            } else {
                seen.push(*s);
                true
            }
        });
    }

    /// Full write-path check used by create and update.
    pub fn validated(mut self) -> AppResult<Self> {
        self.normalize();
        self.validate()?;
        Ok(self)
    }

    /// Numeric bounds only; text lengths are not checked. Used by autosave.
    pub fn check_bounds(&self) -> AppResult<()> {
        let t = &self.trackers;
        if let Some(mood) = t.mood {
            ensure_range("mood", mood as f64, 1.0, 5.0)?;
        }
        ensure_range("waterIntake", t.water_intake as f64, 0.0, 15.0)?;
        if let Some(hours) = t.sleep_hours {
            ensure_range("sleepHours", hours, 0.0, 24.0)?;
        }
        for reading in &t.energy_levels {
            ensure_range("energyLevels.time", reading.time as f64, 6.0, 24.0)?;
            ensure_range("energyLevels.energy", reading.energy as f64, 0.0, 10.0)?;
        }

        let a = &self.self_care.activities;
        ensure_range("activities.reading", a.reading as f64, 0.0, 5.0)?;
        ensure_range("activities.music", a.music as f64, 0.0, 7.0)?;
        ensure_range("activities.mindfulness", a.mindfulness as f64, 0.0, 5.0)?;

        let r = &self.self_care.ratings;
        for (field, rating) in [
            ("ratings.selfTalk", r.self_talk),
            ("ratings.energyPoint", r.energy_point),
            ("ratings.overall", r.overall),
        ] {
            if let Some(value) = rating {
                ensure_range(field, value as f64, 1.0, 5.0)?;
            }
        }
        Ok(())
    }

    /// Overlay the given top-level keys onto this document and re-read it.
    /// Keys are replaced whole, nested objects included.
    pub fn apply_patch(&self, patch: Map<String, Value>) -> AppResult<Self> {
        let mut doc = serde_json::to_value(self).map_err(anyhow::Error::from)?;
        if let Value::Object(fields) = &mut doc {
            for (key, value) in patch {
                if PROTECTED_KEYS.contains(&key.as_str()) {
                    continue;
                }
                fields.insert(key, value);
            }
        }

        let mut patched: EntryContent =
            serde_json::from_value(doc).map_err(|e| AppError::Validation(e.to_string()))?;
        patched.normalize();
        patched.check_bounds()?;
        Ok(patched)
    }
}

fn is_present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

fn trim_opt(value: &mut Option<String>) {
    if let Some(s) = value {
        let trimmed = s.trim();
        if trimmed.len() != s.len() {
            *s = trimmed.to_string();
        }
    }
}

fn trim_all(values: &mut [String]) {
    for s in values.iter_mut() {
        let trimmed = s.trim();
        if trimmed.len() != s.len() {
            *s = trimmed.to_string();
        }
    }
}

fn ensure_range(field: &str, value: f64, min: f64, max: f64) -> AppResult<()> {
    if value < min || value > max {
        return Err(AppError::Validation(format!(
            "{} must be between {} and {}",
            field, min, max
        )));
    }
    Ok(())
}
