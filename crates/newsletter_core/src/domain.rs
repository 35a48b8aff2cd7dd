//! crates/newsletter_core/src/domain.rs
//!
//! Defines the pure, core data structures for the newsletter service.
//! These structs are independent of any database or web framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error returned when parsing an enum tag from a stored string fails.
#[derive(Debug, thiserror::Error)]
#[error("'{value}' is not a valid {kind}")]
pub struct ParseTagError {
    pub kind: &'static str,
    pub value: String,
}

//=========================================================================================
// Enum Tags
//=========================================================================================

/// How often a template is eligible for scheduled generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Biweekly => "biweekly",
            Frequency::Monthly => "monthly",
        }
    }

    /// Strict parse: anything outside the four known values is an error,
    /// so malformed input is rejected at the boundary instead of stored.
    pub fn parse(value: &str) -> Result<Self, ParseTagError> {
        match value {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "biweekly" => Ok(Frequency::Biweekly),
            "monthly" => Ok(Frequency::Monthly),
            other => Err(ParseTagError {
                kind: "frequency",
                value: other.to_string(),
            }),
        }
    }
}

/// The kind of content block a section renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    RecentPosts,
    RecentScience,
    IndustryNews,
    AgentSpotlight,
    PodcastHighlights,
    CommunityCorner,
    MarketAnalysis,
    ResearchSpotlight,
    QuickFacts,
    Custom,
}

impl SectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionType::RecentPosts => "recent_posts",
            SectionType::RecentScience => "recent_science",
            SectionType::IndustryNews => "industry_news",
            SectionType::AgentSpotlight => "agent_spotlight",
            SectionType::PodcastHighlights => "podcast_highlights",
            SectionType::CommunityCorner => "community_corner",
            SectionType::MarketAnalysis => "market_analysis",
            SectionType::ResearchSpotlight => "research_spotlight",
            SectionType::QuickFacts => "quick_facts",
            SectionType::Custom => "custom",
        }
    }

    /// Unrecognized type tags fall back to `Custom` so an old stored
    /// template never becomes unreadable.
    pub fn parse(value: &str) -> Self {
        match value {
            "recent_posts" => SectionType::RecentPosts,
            "recent_science" => SectionType::RecentScience,
            "industry_news" => SectionType::IndustryNews,
            "agent_spotlight" => SectionType::AgentSpotlight,
            "podcast_highlights" => SectionType::PodcastHighlights,
            "community_corner" => SectionType::CommunityCorner,
            "market_analysis" => SectionType::MarketAnalysis,
            "research_spotlight" => SectionType::ResearchSpotlight,
            "quick_facts" => SectionType::QuickFacts,
            _ => SectionType::Custom,
        }
    }
}

/// Which data provider supplies context for a section.
///
/// Unknown tags resolve to `None` ("no data") rather than an error, so a
/// section pointing at a provider that was never wired up still renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    RecentPosts,
    ResearchArticles,
    IndustryFeeds,
    AgentActivity,
    PodcastEpisodes,
    ForumActivity,
    QuickFacts,
    #[default]
    #[serde(other)]
    None,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::RecentPosts => "recent_posts",
            DataSource::ResearchArticles => "research_articles",
            DataSource::IndustryFeeds => "industry_feeds",
            DataSource::AgentActivity => "agent_activity",
            DataSource::PodcastEpisodes => "podcast_episodes",
            DataSource::ForumActivity => "forum_activity",
            DataSource::QuickFacts => "quick_facts",
            DataSource::None => "",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "recent_posts" => DataSource::RecentPosts,
            "research_articles" => DataSource::ResearchArticles,
            "industry_feeds" => DataSource::IndustryFeeds,
            "agent_activity" => DataSource::AgentActivity,
            "podcast_episodes" => DataSource::PodcastEpisodes,
            "forum_activity" => DataSource::ForumActivity,
            "quick_facts" => DataSource::QuickFacts,
            _ => DataSource::None,
        }
    }
}

//=========================================================================================
// Templates and Sections
//=========================================================================================

/// A named, reusable definition of a newsletter's structure and cadence.
#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub frequency: Frequency,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Owned sections, sorted ascending by `sort_order`.
    pub sections: Vec<Section>,
}

/// One configured content block within a template.
#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub id: Uuid,
    pub template_id: Uuid,
    /// Machine key, unique within its template. Stable identity across edits.
    pub name: String,
    /// Human-readable heading shown in the rendered newsletter.
    pub title: String,
    /// Instructions describing what content to generate.
    pub prompt: String,
    pub section_type: SectionType,
    /// Informational only; not enforced at generation time.
    pub required: bool,
    pub sort_order: i32,
    /// Advisory target length, passed to the generation instructions.
    pub word_count: i32,
    pub data_source: DataSource,
}

pub const DEFAULT_WORD_COUNT: i32 = 200;

//=========================================================================================
// Drafts (admin input, pre-persistence)
//=========================================================================================

/// Admin-submitted template payload. Saving replaces the full section set;
/// section `sort_order` is taken from array position.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateDraft {
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub frequency: Frequency,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub sections: Vec<SectionDraft>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionDraft {
    pub name: String,
    pub title: String,
    pub prompt: String,
    #[serde(default = "default_section_type")]
    pub section_type: SectionType,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_word_count")]
    pub word_count: i32,
    #[serde(default)]
    pub data_source: DataSource,
}

fn default_section_type() -> SectionType {
    SectionType::Custom
}

fn default_word_count() -> i32 {
    DEFAULT_WORD_COUNT
}

impl TemplateDraft {
    /// Validates the draft before it touches the store. Invalid drafts are
    /// rejected synchronously and never persisted.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("template name is required".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for (i, section) in self.sections.iter().enumerate() {
            if section.name.trim().is_empty() {
                return Err(format!("section {} is missing a name", i + 1));
            }
            if section.title.trim().is_empty() {
                return Err(format!("section '{}' is missing a title", section.name));
            }
            if section.prompt.trim().is_empty() {
                return Err(format!("section '{}' is missing a prompt", section.name));
            }
            if section.word_count <= 0 {
                return Err(format!(
                    "section '{}' has a non-positive word count",
                    section.name
                ));
            }
            if !seen.insert(section.name.trim().to_string()) {
                return Err(format!("duplicate section name '{}'", section.name));
            }
        }
        Ok(())
    }
}

//=========================================================================================
// Section Payloads (typed provider output)
//=========================================================================================

/// Typed context data a provider hands to the synthesizer. One variant per
/// known data source, plus a raw catch-all for anything unrecognized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum SectionPayload {
    Posts(Vec<PostSummary>),
    ResearchArticles(Vec<ResearchArticle>),
    NewsItems(Vec<NewsItem>),
    AgentActivity(Vec<AgentActivityItem>),
    PodcastEpisodes(Vec<EpisodeSummary>),
    ForumThreads(Vec<ForumThread>),
    Facts(Vec<String>),
    Raw(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub title: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchArticle {
    pub title: String,
    pub journal: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub headline: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentActivityItem {
    pub agent: String,
    pub activity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForumThread {
    pub title: String,
    pub replies: u32,
}

//=========================================================================================
// Generated Newsletters (output artifact)
//=========================================================================================

/// One rendered content block inside a generated newsletter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedSection {
    pub section_name: String,
    pub section_title: String,
    pub content: String,
}

/// The persisted output of one composition run. Independent of its parent
/// template once created; later template edits do not change it.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedNewsletter {
    pub id: Uuid,
    pub template_id: Uuid,
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<RenderedSection>,
    pub html: String,
}

/// Listing row for generated newsletters (no body payloads).
#[derive(Debug, Clone, Serialize)]
pub struct NewsletterSummary {
    pub id: Uuid,
    pub template_id: Uuid,
    pub title: String,
    pub generated_at: DateTime<Utc>,
}

//=========================================================================================
// Admin users (auth)
//=========================================================================================

#[derive(Debug, Clone)]
pub struct AdminUser {
    pub id: Uuid,
    pub email: String,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_parse_rejects_unknown_values() {
        assert!(Frequency::parse("weekly").is_ok());
        assert!(Frequency::parse("fortnightly").is_err());
        assert!(Frequency::parse("").is_err());
    }

    #[test]
    fn data_source_parse_falls_back_to_none() {
        assert_eq!(DataSource::parse("recent_posts"), DataSource::RecentPosts);
        assert_eq!(DataSource::parse("no_such_source"), DataSource::None);
        assert_eq!(DataSource::parse(""), DataSource::None);
    }

    #[test]
    fn draft_validation_catches_missing_fields() {
        let mut draft = TemplateDraft {
            id: None,
            name: "Weekly Digest".to_string(),
            description: String::new(),
            frequency: Frequency::Weekly,
            active: true,
            sections: vec![SectionDraft {
                name: "intro".to_string(),
                title: "Introduction".to_string(),
                prompt: "Write an intro.".to_string(),
                section_type: SectionType::Custom,
                required: true,
                word_count: 150,
                data_source: DataSource::None,
            }],
        };
        assert!(draft.validate().is_ok());

        draft.sections[0].prompt = "  ".to_string();
        assert!(draft.validate().is_err());

        draft.sections[0].prompt = "Write an intro.".to_string();
        draft.name = String::new();
        assert!(draft.validate().is_err());
    }

    #[test]
    fn draft_validation_rejects_duplicate_section_names() {
        let section = SectionDraft {
            name: "facts".to_string(),
            title: "Quick Facts".to_string(),
            prompt: "List facts.".to_string(),
            section_type: SectionType::QuickFacts,
            required: false,
            word_count: 100,
            data_source: DataSource::QuickFacts,
        };
        let draft = TemplateDraft {
            id: None,
            name: "Digest".to_string(),
            description: String::new(),
            frequency: Frequency::Weekly,
            active: true,
            sections: vec![section.clone(), section],
        };
        assert!(draft.validate().is_err());
    }
}
