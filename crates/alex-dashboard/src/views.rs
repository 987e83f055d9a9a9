use alex_core::{topics, Payload, TopicCache};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

const ACTIVE_STATES: [&str; 2] = ["listening", "FACE_VERIFIED"];
const PREVIEW_CHARS: usize = 96;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DashboardView {
    pub agent_state: String,
    pub agent_active: bool,
    pub agent_feedback: Option<String>,
    pub weather: String,
    pub temperature: String,
    pub battery: BatteryView,
    pub live_summary: Option<String>,
}

const DEFAULT_BATTERY_LEVEL: i64 = 100;

#[derive(Clone, Debug, PartialEq)]
pub struct BatteryView {
    pub level: i64,
    pub charging: bool,
    pub reported: bool,
}

impl Default for BatteryView {
    fn default() -> Self {
        Self {
            level: DEFAULT_BATTERY_LEVEL,
            charging: false,
            reported: false,
        }
    }
}

impl BatteryView {
    /// Each field is read on its own so one odd value does not hide the rest.
    fn from_report(map: &Map<String, Value>) -> Self {
        let level = map
            .get("level")
            .and_then(|level| match level {
                Value::String(text) => text.trim().parse::<f64>().ok(),
                other => other.as_f64(),
            })
            .filter(|level| level.is_finite())
            .map(|level| level.round() as i64)
            .unwrap_or(DEFAULT_BATTERY_LEVEL);
        let charging = map
            .get("charging")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Self {
            level,
            charging,
            reported: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NoteStatus {
    Progress {
        message: String,
        percent: Option<u16>,
    },
    Raw(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuizItem {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Cornell {
    #[serde(default)]
    pub cues: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Artifacts {
    pub summary: String,
    pub flashcards: Vec<Flashcard>,
    pub quiz: Vec<QuizItem>,
    pub mindmap: Option<String>,
    pub cornell: Option<Cornell>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NotesView {
    pub status: Option<NoteStatus>,
    pub artifacts: Option<Result<Artifacts, String>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatLine {
    pub role: String,
    pub content: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Feed<T> {
    #[default]
    Empty,
    Items(Vec<T>),
    Raw(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryView {
    pub history: Feed<ChatLine>,
    pub activity: Feed<String>,
    pub base: Option<String>,
    pub stats: Vec<(String, String)>,
    pub context: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct IntegrationsView {
    pub auth_url: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VoiceView {
    pub voices: Vec<String>,
    pub status: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DebugRow {
    pub topic: String,
    pub seq: u64,
    pub age_secs: i64,
    pub kind: &'static str,
    pub preview: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DebugView {
    pub rows: Vec<DebugRow>,
    pub last_seq: u64,
}

fn structured(cache: &TopicCache, topic: &str) -> Option<Value> {
    cache
        .get(topic)
        .and_then(|payload| payload.structured().map(|value| value.into_owned()))
}

fn str_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match map.get(*key) {
        Some(Value::String(text)) => Some(text.clone()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub fn ellipsize(input: &str, max: usize) -> String {
    if input.chars().count() <= max {
        return input.to_string();
    }
    if max <= 3 {
        return "...".chars().take(max).collect();
    }
    let prefix: String = input.chars().take(max - 3).collect();
    format!("{prefix}...")
}

impl DashboardView {
    pub fn from_cache(cache: &TopicCache) -> Self {
        let agent_state = match cache.get(topics::DASHBOARD_STATE) {
            Some(payload) => match payload.structured().as_deref() {
                Some(Value::Object(map)) => {
                    str_field(map, &["state"]).unwrap_or_else(|| "UNKNOWN".to_string())
                }
                Some(Value::String(text)) => text.clone(),
                _ => payload.display_text(),
            },
            None => "UNKNOWN".to_string(),
        };
        let agent_active = ACTIVE_STATES.contains(&agent_state.as_str());

        let (weather, temperature) = match structured(cache, topics::DASHBOARD_RESPONSE) {
            Some(Value::Object(map)) => {
                let weather = map.get("weather").and_then(Value::as_object);
                let condition = weather
                    .and_then(|w| str_field(w, &["condition"]))
                    .unwrap_or_else(|| "Unknown".to_string());
                let temperature = weather
                    .and_then(|w| w.get("temperature"))
                    .map(scalar_text)
                    .unwrap_or_else(|| "0".to_string());
                (condition, format!("{temperature}°C"))
            }
            _ => ("Loading...".to_string(), "--".to_string()),
        };

        let battery = match structured(cache, topics::BATTERY_RESPONSE) {
            Some(Value::Object(map)) => BatteryView::from_report(&map),
            _ => BatteryView::default(),
        };

        let live_summary = cache.get(topics::SUMMARY_REALTIME).map(|payload| {
            match payload.structured().as_deref() {
                Some(Value::Object(map)) => {
                    str_field(map, &["summary", "text", "message"]).unwrap_or_else(|| payload.display_text())
                }
                _ => payload.display_text(),
            }
        });

        let agent_feedback = cache.get(topics::AGENT_STATUS).map(|payload| {
            match payload.structured().as_deref() {
                Some(Value::Object(map)) => {
                    str_field(map, &["status", "message"]).unwrap_or_else(|| payload.display_text())
                }
                _ => payload.display_text(),
            }
        });

        Self {
            agent_state,
            agent_active,
            agent_feedback,
            weather,
            temperature,
            battery,
            live_summary,
        }
    }
}

impl NotesView {
    pub fn from_cache(cache: &TopicCache) -> Self {
        let status = cache
            .get(topics::NOTE_STATUS)
            .map(|payload| match payload.as_json() {
                Some(Value::Object(map)) => NoteStatus::Progress {
                    message: str_field(map, &["message"]).unwrap_or_else(|| "Ready".to_string()),
                    percent: map.get("progress").and_then(Value::as_f64).map(progress_percent),
                },
                _ => NoteStatus::Raw(payload.display_text()),
            });

        let artifacts = cache
            .get(topics::NOTE_RESULT)
            .map(|payload| match payload.structured().as_deref() {
                Some(Value::Object(map)) => Ok(parse_artifacts(map)),
                _ => Err(format!("Invalid JSON in {}", topics::NOTE_RESULT)),
            });

        Self { status, artifacts }
    }
}

/// Publishers send either a 0..=1 fraction or a 0..=100 percentage.
fn progress_percent(progress: f64) -> u16 {
    let percent = if progress > 1.0 { progress } else { progress * 100.0 };
    percent.clamp(0.0, 100.0) as u16
}

fn parse_artifacts(map: &Map<String, Value>) -> Artifacts {
    let summary = str_field(map, &["summary_md", "summary"])
        .unwrap_or_else(|| "**No summary available**".to_string());

    let flashcards = map
        .get("flashcards")
        .and_then(Value::as_array)
        .map(|cards| {
            cards
                .iter()
                .enumerate()
                .filter_map(|(idx, card)| {
                    let card = card.as_object()?;
                    Some(Flashcard {
                        front: str_field(card, &["front", "question"])
                            .unwrap_or_else(|| format!("Card {}", idx + 1)),
                        back: str_field(card, &["back", "answer"])
                            .unwrap_or_else(|| "No answer".to_string()),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let quiz = map
        .get("quiz")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(|item| QuizItem {
                    question: str_field(item, &["question"]).unwrap_or_default(),
                    options: item
                        .get("options")
                        .and_then(Value::as_array)
                        .map(|options| options.iter().map(scalar_text).collect())
                        .unwrap_or_default(),
                    correct_answer: str_field(item, &["correct_answer"]).unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default();

    let mindmap = str_field(map, &["mindmap"]).filter(|code| !code.trim().is_empty());
    let cornell = map
        .get("cornell")
        .cloned()
        .and_then(|value| serde_json::from_value::<Cornell>(value).ok());

    Artifacts {
        summary,
        flashcards,
        quiz,
        mindmap,
        cornell,
    }
}

impl MemoryView {
    pub fn from_cache(cache: &TopicCache) -> Self {
        let history = match cache.get(topics::HISTORY) {
            None => Feed::Empty,
            // The dashboard requests history on the same topic it listens to.
            Some(Payload::Text(text)) if text == topics::commands::GET => Feed::Empty,
            Some(Payload::Json(Value::String(text))) if text == topics::commands::GET => Feed::Empty,
            Some(payload) => match payload.structured().as_deref() {
                Some(Value::Array(items)) => Feed::Items(
                    items
                        .iter()
                        .map(|item| match item.as_object() {
                            Some(map) => ChatLine {
                                role: str_field(map, &["role"]).unwrap_or_else(|| "user".to_string()),
                                content: str_field(map, &["content"]).unwrap_or_default(),
                            },
                            None => ChatLine {
                                role: "user".to_string(),
                                content: scalar_text(item),
                            },
                        })
                        .collect(),
                ),
                _ => Feed::Raw(payload.display_text()),
            },
        };

        let activity = match cache.get(topics::MEMORY_ACTIVITY_RESPONSE) {
            None => Feed::Empty,
            Some(payload) => match payload.structured().as_deref() {
                Some(Value::Array(items)) => Feed::Items(items.iter().map(activity_row).collect()),
                _ => Feed::Raw(payload.display_text()),
            },
        };

        let base = cache
            .get(topics::MEMORY_BASE_RESPONSE)
            .map(|payload| match payload.structured() {
                Some(value) => {
                    serde_json::to_string_pretty(&*value).unwrap_or_else(|_| payload.display_text())
                }
                None => payload.display_text(),
            });

        let stats = match structured(cache, topics::MEMORY_STATS_RESPONSE) {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(key, value)| (key.clone(), scalar_text(value)))
                .collect(),
            _ => Vec::new(),
        };

        let context = cache
            .get(topics::MEMORY_CONTEXT_RESPONSE)
            .map(|payload| payload.display_text());

        Self {
            history,
            activity,
            base,
            stats,
            context,
        }
    }
}

fn activity_row(item: &Value) -> String {
    match item {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| format!("{key}: {}", scalar_text(value)))
            .collect::<Vec<_>>()
            .join("  "),
        other => scalar_text(other),
    }
}

impl IntegrationsView {
    pub fn from_cache(cache: &TopicCache) -> Self {
        let auth_url = match structured(cache, topics::AUTH_RESPONSE) {
            Some(Value::Object(map)) => str_field(&map, &["auth_url"]),
            _ => None,
        };
        Self { auth_url }
    }
}

impl VoiceView {
    pub fn from_cache(cache: &TopicCache) -> Self {
        let voices = match structured(cache, topics::VOICE_LIST_RESPONSE) {
            Some(Value::Array(items)) => voice_names(&items),
            Some(Value::Object(map)) => map
                .get("voices")
                .and_then(Value::as_array)
                .map(|items| voice_names(items))
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        let status = cache.get(topics::VOICE_STATUS).map(|payload| {
            match payload.structured().as_deref() {
                Some(Value::Object(map)) => str_field(map, &["message", "status", "voice"])
                    .unwrap_or_else(|| payload.display_text()),
                _ => payload.display_text(),
            }
        });
        Self { voices, status }
    }
}

fn voice_names(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(name.clone()),
            Value::Object(map) => str_field(map, &["name", "id"]),
            _ => None,
        })
        .collect()
}

impl DebugView {
    pub fn from_cache(cache: &TopicCache, now: DateTime<Utc>) -> Self {
        let rows = cache
            .snapshot()
            .into_iter()
            .map(|(topic, entry)| DebugRow {
                topic,
                seq: entry.seq,
                age_secs: entry.age_secs(now),
                kind: match entry.payload {
                    Payload::Json(_) => "json",
                    Payload::Text(_) => "text",
                },
                preview: ellipsize(&entry.payload.display_text().replace('\n', " "), PREVIEW_CHARS),
            })
            .collect();
        Self {
            rows,
            last_seq: cache.last_seq(),
        }
    }
}
