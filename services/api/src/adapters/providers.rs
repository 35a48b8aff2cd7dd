//! services/api/src/adapters/providers.rs
//!
//! The section data provider registry. One arm per known `DataSource` tag:
//! recent posts are a live query against the document store; the remaining
//! sources are pluggable and currently stubbed with small static payloads.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use newsletter_core::domain::{
    AgentActivityItem, DataSource, EpisodeSummary, ForumThread, NewsItem, PostSummary,
    ResearchArticle, SectionPayload,
};
use newsletter_core::ports::{PortResult, SectionDataProvider};
use sqlx::{FromRow, SqlitePool};
use tracing::warn;

/// Provider registry backed by the service database for live sources.
#[derive(Clone)]
pub struct DataProviderRegistry {
    pool: SqlitePool,
}

impl DataProviderRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Documents published in the last 7 days, newest first, capped at 5.
    /// A query failure degrades to "no context" rather than erroring, so one
    /// flaky read never breaks a whole section.
    async fn recent_posts(&self) -> Option<SectionPayload> {
        #[derive(FromRow)]
        struct Row {
            title: String,
            generated_at: DateTime<Utc>,
        }

        let cutoff = Utc::now() - Duration::days(7);
        let rows = sqlx::query_as::<_, Row>(
            "SELECT title, generated_at FROM newsletters
             WHERE generated_at > ?1 ORDER BY generated_at DESC LIMIT 5",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await;

        match rows {
            Ok(rows) if !rows.is_empty() => Some(SectionPayload::Posts(
                rows.into_iter()
                    .map(|r| PostSummary {
                        title: r.title,
                        published_at: r.generated_at,
                    })
                    .collect(),
            )),
            Ok(_) => None,
            Err(e) => {
                warn!("recent_posts provider query failed: {e}");
                None
            }
        }
    }
}

// Stub payloads for the sources with no live feed wired up yet. Kept small
// and static so generated drafts are predictable.

fn research_articles() -> SectionPayload {
    SectionPayload::ResearchArticles(vec![
        ResearchArticle {
            title: "Myrcene potentiates cannabinoid receptor binding in vitro".to_string(),
            journal: "Journal of Cannabis Research".to_string(),
            summary: "Reports increased CB1 affinity in the presence of myrcene at \
physiological concentrations."
                .to_string(),
        },
        ResearchArticle {
            title: "Limonene inhalation and anxiety markers: a pilot study".to_string(),
            journal: "Phytomedicine".to_string(),
            summary: "Small-cohort study observing reduced salivary cortisol after \
limonene exposure."
                .to_string(),
        },
    ])
}

fn industry_feeds() -> SectionPayload {
    SectionPayload::NewsItems(vec![
        NewsItem {
            headline: "Terpene analytics firm closes Series A funding round".to_string(),
            source: "Cannabis Business Times".to_string(),
        },
        NewsItem {
            headline: "New state testing rules add terpene profile disclosure".to_string(),
            source: "MJBizDaily".to_string(),
        },
    ])
}

fn agent_activity() -> SectionPayload {
    SectionPayload::AgentActivity(vec![AgentActivityItem {
        agent: "Research Curator".to_string(),
        activity: "Indexed 14 new terpene studies and flagged 3 for editorial review."
            .to_string(),
    }])
}

fn podcast_episodes() -> SectionPayload {
    SectionPayload::PodcastEpisodes(vec![EpisodeSummary {
        title: "Beta-caryophyllene: the dietary cannabinoid".to_string(),
        description: "A conversation on the only terpene known to act directly on CB2."
            .to_string(),
    }])
}

fn forum_activity() -> SectionPayload {
    SectionPayload::ForumThreads(vec![ForumThread {
        title: "Best extraction temperatures for preserving monoterpenes?".to_string(),
        replies: 23,
    }])
}

fn quick_facts() -> SectionPayload {
    SectionPayload::Facts(vec![
        "Over 150 distinct terpenes have been identified in cannabis.".to_string(),
        "Pinene is the most widely distributed terpene in nature.".to_string(),
        "Linalool is shared between cannabis and lavender.".to_string(),
    ])
}

#[async_trait]
impl SectionDataProvider for DataProviderRegistry {
    /// Never errors for unknown tags: `DataSource::None` (which every
    /// unrecognized string parses to) yields `Ok(None)`.
    async fn provide(&self, source: DataSource) -> PortResult<Option<SectionPayload>> {
        let payload = match source {
            DataSource::RecentPosts => self.recent_posts().await,
            DataSource::ResearchArticles => Some(research_articles()),
            DataSource::IndustryFeeds => Some(industry_feeds()),
            DataSource::AgentActivity => Some(agent_activity()),
            DataSource::PodcastEpisodes => Some(podcast_episodes()),
            DataSource::ForumActivity => Some(forum_activity()),
            DataSource::QuickFacts => Some(quick_facts()),
            DataSource::None => None,
        };
        Ok(payload)
    }
}
