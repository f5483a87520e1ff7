//! Message classification and field extraction.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;
use crate::fact::{ChatterFact, FactKind, MessageMeta};
use crate::markup::strip_markup;
use crate::message::ChatterMessage;

static OPERATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?i:operator|picker|controller|by)(?::\s*|\s+)(\p{Lu}[\p{L}\p{M}'\-]*(?:[ \t]+\p{Lu}[\p{L}\p{M}'\-]*)*)",
    )
    .expect("operator pattern")
});

static MEDIA_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"]+"#).expect("media url pattern"));

static MEDIA_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\w\-.]+\.(?i:mp4|mov|avi|mkv|webm|3gp)\b").expect("media file pattern")
});

static BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-*•]|\d+[.)])\s*(.*)$").expect("bullet pattern"));

/// Turns chatter messages into facts. Implementations never fail: anything
/// they cannot classify is dropped.
pub trait ChatterParser {
    fn parse(&self, messages: &[ChatterMessage]) -> Vec<ChatterFact>;
}

/// Marker substrings per category, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerSet {
    pub problem: String,
    pub control: Vec<String>,
    pub pick: Vec<String>,
    pub video: Vec<String>,
}

impl Default for MarkerSet {
    fn default() -> Self {
        Self {
            problem: "[PROBLEM]".to_string(),
            control: vec!["control session".into(), "quality control".into()],
            pick: vec![
                "picking session".into(),
                "pick session".into(),
                "pick completed".into(),
                "picking completed".into(),
                "pick finished".into(),
                "picking finished".into(),
            ],
            video: vec!["video".into()],
        }
    }
}

/// Default parser: marker substrings decide the category, in the order
/// problem, control, pick, video.
#[derive(Debug, Clone, Default)]
pub struct MarkerParser {
    markers: MarkerSet,
}

impl MarkerParser {
    pub fn new(markers: MarkerSet) -> Self {
        Self { markers }
    }

    pub fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    /// Category of a plain-text body, if any marker matches.
    pub fn classify(&self, text: &str) -> Option<FactKind> {
        let lower = text.to_lowercase();
        let any = |markers: &[String]| markers.iter().any(|m| lower.contains(&m.to_lowercase()));

        if lower.contains(&self.markers.problem.to_lowercase()) {
            Some(FactKind::ProblemReport)
        } else if any(&self.markers.control) {
            Some(FactKind::ControlSession)
        } else if any(&self.markers.pick) {
            Some(FactKind::PickSession)
        } else if any(&self.markers.video) {
            Some(FactKind::VideoEvent)
        } else {
            None
        }
    }

    /// Classify and extract one message.
    pub fn parse_message(&self, message: &ChatterMessage) -> Option<ChatterFact> {
        let text = strip_markup(&message.body);
        let kind = self.classify(&text)?;

        let meta = MessageMeta {
            id: message.id,
            date: message.date,
            author: message.author.clone(),
        };
        let operator = extract_operator(&text).or_else(|| {
            message
                .author
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
        });

        let fact = match kind {
            FactKind::PickSession => ChatterFact::PickSession {
                meta,
                operator,
                duration_minutes: parse_duration(&text),
            },
            FactKind::ControlSession => ChatterFact::ControlSession {
                meta,
                operator,
                errors: extract_errors(&text),
            },
            FactKind::VideoEvent => ChatterFact::VideoEvent {
                meta,
                operator,
                media_ref: extract_media_ref(&text),
            },
            FactKind::ProblemReport => ChatterFact::ProblemReport {
                meta,
                operator,
                description: self.problem_description(&text),
            },
        };
        Some(fact)
    }

    fn problem_description(&self, text: &str) -> String {
        let marker = self.markers.problem.to_lowercase();
        let without_marker = match text.to_lowercase().find(&marker) {
            // Lowercasing can shift byte offsets for some scripts; fall back to the full text.
            Some(start) if text.is_char_boundary(start) && text.is_char_boundary(start + marker.len()) => {
                format!("{}{}", &text[..start], &text[start + marker.len()..])
            }
            _ => text.to_string(),
        };
        without_marker
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl ChatterParser for MarkerParser {
    fn parse(&self, messages: &[ChatterMessage]) -> Vec<ChatterFact> {
        let mut seen = BTreeSet::new();
        messages
            .iter()
            .filter(|message| seen.insert(message.id))
            .filter_map(|message| self.parse_message(message))
            .collect()
    }
}

/// Parse with the default markers.
pub fn parse_chatter(messages: &[ChatterMessage]) -> Vec<ChatterFact> {
    MarkerParser::default().parse(messages)
}

fn extract_operator(text: &str) -> Option<String> {
    OPERATOR
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Bullet lines following an `Errors` header, or an inline `Errors: a; b` list.
fn extract_errors(text: &str) -> Vec<String> {
    let mut errors = Vec::new();
    let mut lines = text.lines().map(str::trim);

    while let Some(line) = lines.next() {
        if !line.to_lowercase().starts_with("error") {
            continue;
        }
        if let Some((_, inline)) = line.split_once(':') {
            errors.extend(
                inline
                    .split(';')
                    .map(str::trim)
                    .filter(|item| !is_empty_error(item))
                    .map(str::to_string),
            );
        }
        for next in lines.by_ref() {
            let Some(caps) = BULLET.captures(next) else {
                break;
            };
            let item = caps.get(1).map_or("", |m| m.as_str()).trim();
            if !is_empty_error(item) {
                errors.push(item.to_string());
            }
        }
        break;
    }
    errors
}

fn is_empty_error(item: &str) -> bool {
    matches!(
        item.to_lowercase().as_str(),
        "" | "none" | "no" | "-" | "0" | "nothing"
    )
}

fn extract_media_ref(text: &str) -> Option<String> {
    MEDIA_URL
        .find(text)
        .or_else(|| MEDIA_FILE.find(text))
        .map(|m| m.as_str().to_string())
}
