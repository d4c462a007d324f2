//! Validation of generated metadata and the deterministic fallbacks behind it.
//!
//! A generator failure never blocks a publish. Whatever the generator returns
//! (or fails to return) is resolved field by field into a complete
//! [`PublicationMetadata`]: missing or blank values are replaced with defaults
//! derived from the item's base name and the configured [`MetadataDefaults`].

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::contract::{GeneratedMetadata, GenerationError};

/// Fallback values and the fixed suffix applied to every description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataDefaults {
    /// Link mentioned in fallback descriptions, e.g. a shop URL.
    pub link_url: Option<String>,
    /// Description used when the generator provides none. `{link}` is
    /// replaced with `link_url`.
    pub fallback_description: Option<String>,
    pub fallback_tags: Vec<String>,
    /// One of these is appended to every description.
    pub calls_to_action: Vec<String>,
    /// Appended after the call to action, e.g. `#Shorts`.
    pub hashtag: Option<String>,
}

impl Default for MetadataDefaults {
    fn default() -> Self {
        Self {
            link_url: None,
            fallback_description: None,
            fallback_tags: ["funny", "cute", "animals", "trending", "shorts"]
                .into_iter()
                .map(String::from)
                .collect(),
            calls_to_action: Vec::new(),
            hashtag: Some("#Shorts".to_string()),
        }
    }
}

impl MetadataDefaults {
    fn description(&self) -> String {
        let link = self.link_url.as_deref().unwrap_or("");
        match &self.fallback_description {
            Some(template) => template.replace("{link}", link).trim().to_string(),
            None if link.is_empty() => "Enjoy this moment!".to_string(),
            None => format!("Enjoy this moment! Check it out: {link}"),
        }
    }

    /// Picks a call to action for `item_id`, the same one on every run.
    fn call_to_action(&self, item_id: &str) -> Option<&str> {
        if self.calls_to_action.is_empty() {
            return None;
        }
        let index = item_id.bytes().map(usize::from).sum::<usize>() % self.calls_to_action.len();
        Some(self.calls_to_action[index].as_str())
    }
}

/// Complete metadata handed to the publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

impl PublicationMetadata {
    /// Validates a generator result for `item_id`, filling every gap.
    pub fn resolve(
        item_id: &str,
        generated: Result<GeneratedMetadata, GenerationError>,
        defaults: &MetadataDefaults,
    ) -> Self {
        let generated = match generated {
            Ok(generated) => generated,
            Err(e) => {
                warn!(
                    item_id = %item_id,
                    error = %e,
                    "[RUN][GENERATE] Generator failed, using fallback metadata"
                );
                GeneratedMetadata::default()
            }
        };

        let title = generated
            .title
            .as_deref()
            .map(clean_field)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| {
                debug!(item_id = %item_id, "[RUN][GENERATE] Title missing, using base name");
                base_name(item_id)
            });

        let mut description = generated
            .description
            .as_deref()
            .map(clean_field)
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| defaults.description());

        let mut tags: Vec<String> = Vec::new();
        for tag in generated.tags.iter().map(|t| clean_field(t)) {
            if !tag.is_empty() && !tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
                tags.push(tag);
            }
        }
        if tags.is_empty() {
            tags = defaults.fallback_tags.clone();
        }

        if let Some(cta) = defaults.call_to_action(item_id) {
            description.push_str("\n\n");
            description.push_str(cta);
        }
        if let Some(hashtag) = defaults.hashtag.as_deref().filter(|h| !h.is_empty()) {
            description.push_str("\n\n");
            description.push_str(hashtag);
        }

        Self {
            title,
            description,
            tags,
        }
    }
}

/// File stem of the last path segment of an item id.
///
/// `clips/otter_jump.mp4` becomes `otter_jump`.
pub fn base_name(item_id: &str) -> String {
    Path::new(item_id)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(item_id)
        .to_string()
}

fn label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:\d+[.)]\s*)?\**\s*(title|description|tags)\s*\**\s*:\s*\**\s*(.*)$")
            .expect("label pattern is a valid regex")
    })
}

/// Parses a free-text reply made of `Title:`, `Description:` and `Tags:` lines.
///
/// Labels are case-insensitive and may carry list numbering or bold markers.
/// Lines without a label are ignored; later labels override earlier ones.
pub fn parse_labelled_response(text: &str) -> GeneratedMetadata {
    let mut parsed = GeneratedMetadata::default();
    for line in text.lines() {
        let Some(caps) = label_pattern().captures(line) else {
            continue;
        };
        let value = caps[2].trim();
        match caps[1].to_ascii_lowercase().as_str() {
            "title" => parsed.title = Some(clean_field(value)),
            "description" => parsed.description = Some(clean_field(value)),
            "tags" => {
                parsed.tags = value
                    .split(',')
                    .map(clean_field)
                    .filter(|t| !t.is_empty())
                    .collect();
            }
            _ => {}
        }
    }
    parsed
}

fn clean_field(value: &str) -> String {
    value
        .trim()
        .trim_matches(|c| c == '"' || c == '*')
        .trim()
        .to_string()
}
