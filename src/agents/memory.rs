/// Memory agent: loads the birthday file and finds today's events.
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::lock_log;
use crate::calendar::MonthDay;
use crate::error::DataUnavailable;
use crate::llm::{GenerationClient, GenerationProfile};

pub const DEFAULT_DATA_PATH: &str = "data/birthdays.json";
pub const DEFAULT_RELATIONSHIP: &str = "family member";

pub const MEMORY_PROFILE: GenerationProfile = GenerationProfile {
    agent: "memory",
    system_prompt: "You are a Memory Agent specialized in monitoring and analyzing important \
        dates and events. Your role is to:\n\
        1. Monitor data files for important dates (birthdays, anniversaries, appointments)\n\
        2. Analyze the significance of dates and relationships\n\
        3. Provide intelligent alerts with context and suggestions\n\
        4. Help maintain family connections through timely reminders\n\n\
        Always be thorough, accurate, and considerate of family relationships.",
    max_output_tokens: 400,
    temperature: 0.6,
};

/// A recurring, year-less dated occurrence such as a birthday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub subject_name: String,
    pub relationship_label: String,
    pub occurs_on: MonthDay,
    /// Extra record fields (`age`, `notes`, ...) passed through verbatim.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Event {
    /// Flat view used inside prompts and log payloads.
    pub fn prompt_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("name".to_string(), json!(self.subject_name));
        map.insert("relationship".to_string(), json!(self.relationship_label));
        map.insert("date".to_string(), json!(self.occurs_on.to_string()));
        for (key, value) in &self.attributes {
            map.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Value::Object(map)
    }

    pub fn prompt_json(&self) -> String {
        serde_json::to_string_pretty(&self.prompt_value()).unwrap_or_default()
    }
}

/// Result of reading the birthday file. `unavailable` is set when the file
/// could not be used at all, in which case `events` is empty.
#[derive(Debug, Clone, Default)]
pub struct EventSet {
    pub events: Vec<Event>,
    pub other_events: usize,
    pub skipped_records: usize,
    pub unavailable: Option<DataUnavailable>,
}

#[derive(Debug, Deserialize)]
struct BirthdayFile {
    #[serde(default)]
    birthdays: Vec<Value>,
    #[serde(default)]
    events: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub timestamp: DateTime<Utc>,
    pub as_of: NaiveDate,
    pub event: Event,
    pub analysis: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub events: Vec<Event>,
    pub unavailable: Option<DataUnavailable>,
}

/// Reads and validates the birthday file. Never fails: unusable storage
/// yields an empty set with `unavailable` populated.
pub fn load_event_set(path: &Path) -> EventSet {
    let unavailable = |err: DataUnavailable| {
        tracing::warn!(path = %path.display(), error = %err, "birthday data unavailable");
        EventSet {
            unavailable: Some(err),
            ..EventSet::default()
        }
    };

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return unavailable(DataUnavailable::Missing {
                path: path.to_path_buf(),
            });
        }
        Err(err) => {
            return unavailable(DataUnavailable::Unreadable {
                path: path.to_path_buf(),
                reason: err.to_string(),
            });
        }
    };

    let file = match serde_json::from_str::<BirthdayFile>(&content) {
        Ok(file) => file,
        Err(err) => {
            return unavailable(DataUnavailable::Malformed {
                path: path.to_path_buf(),
                reason: err.to_string(),
            });
        }
    };

    let mut set = EventSet {
        other_events: file.events.len(),
        ..EventSet::default()
    };
    for (index, record) in file.birthdays.iter().enumerate() {
        match parse_birthday(record) {
            Ok(event) => set.events.push(event),
            Err(err) => {
                set.skipped_records += 1;
                tracing::warn!(index, error = %err, "skipping birthday record");
            }
        }
    }

    tracing::debug!(
        path = %path.display(),
        birthdays = set.events.len(),
        other_events = set.other_events,
        skipped = set.skipped_records,
        "birthday data loaded"
    );
    set
}

fn parse_birthday(record: &Value) -> anyhow::Result<Event> {
    let object = record
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("birthday record is not an object"))?;

    let name = object
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| anyhow::anyhow!("birthday record has no name"))?;
    let relationship = object
        .get("relationship")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_RELATIONSHIP);
    let date = object
        .get("date")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("birthday record for {name} has no date"))?;
    let occurs_on = MonthDay::parse_iso(date)
        .map_err(|_| anyhow::anyhow!("invalid date format for {name}: '{date}'"))?;

    let id = match object.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
        Some(Value::Number(id)) => id.to_string(),
        _ => derive_event_id(name, relationship, date),
    };

    let attributes = object
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "id" | "name" | "relationship" | "date"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(Event {
        id,
        subject_name: name.to_string(),
        relationship_label: relationship.to_string(),
        occurs_on,
        attributes,
    })
}

fn derive_event_id(name: &str, relationship: &str, date: &str) -> String {
    let digest = format!("{:x}", md5::compute(format!("{name}|{relationship}|{date}")));
    format!("bday-{}", &digest[..12])
}

/// Events whose month and day equal `as_of`, in storage order.
pub fn filter_todays(events: &[Event], as_of: NaiveDate) -> Vec<Event> {
    events
        .iter()
        .filter(|event| event.occurs_on.matches(as_of))
        .cloned()
        .collect()
}

pub struct MemoryAgent {
    data_path: PathBuf,
    generation: GenerationClient,
    analyze_matches: bool,
    matches: Mutex<Vec<MatchRecord>>,
}

impl MemoryAgent {
    pub fn new(data_path: impl Into<PathBuf>, generation: GenerationClient) -> Self {
        Self {
            data_path: data_path.into(),
            generation,
            analyze_matches: true,
            matches: Mutex::new(Vec::new()),
        }
    }

    pub fn with_analysis(mut self, enabled: bool) -> Self {
        self.analyze_matches = enabled;
        self
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn load_events(&self) -> EventSet {
        load_event_set(&self.data_path)
    }

    pub fn find_todays_events(&self, as_of: NaiveDate) -> Vec<Event> {
        filter_todays(&self.load_events().events, as_of)
    }

    /// Finds today's events, optionally asks the model for a shared analysis
    /// of them, and records each match.
    pub async fn scan(&self, as_of: NaiveDate) -> ScanResult {
        let set = self.load_events();
        let events = filter_todays(&set.events, as_of);

        if events.is_empty() {
            tracing::info!(as_of = %as_of, "no birthdays today");
            return ScanResult {
                events,
                unavailable: set.unavailable,
            };
        }

        tracing::info!(as_of = %as_of, count = events.len(), "found birthdays today");

        let analysis = if self.analyze_matches {
            Some(
                self.generation
                    .generate_or_fallback(&MEMORY_PROFILE, "analysis", analysis_prompt(&events, as_of))
                    .await,
            )
        } else {
            None
        };

        let timestamp = Utc::now();
        lock_log(&self.matches).extend(events.iter().map(|event| MatchRecord {
            timestamp,
            as_of,
            event: event.clone(),
            analysis: analysis.clone(),
        }));

        ScanResult {
            events,
            unavailable: set.unavailable,
        }
    }

    pub fn matches(&self) -> Vec<MatchRecord> {
        lock_log(&self.matches).clone()
    }
}

fn analysis_prompt(events: &[Event], as_of: NaiveDate) -> String {
    let listing = serde_json::to_string_pretty(
        &events.iter().map(Event::prompt_value).collect::<Vec<_>>(),
    )
    .unwrap_or_default();
    format!(
        "Analyze these birthdays for today ({}):\n{}\n\n\
         For each birthday, provide:\n\
         1. The significance of the relationship\n\
         2. Suggested ways to celebrate or connect\n\
         3. Any special considerations (age, distance, etc.)\n\
         4. Emotional context for the family\n\n\
         Format your response as enhanced birthday information with additional context.",
        as_of.format("%B %d"),
        listing
    )
}
