//! End-to-end composition and scheduler tests against the real database
//! adapter and provider registry, with the offline generator.

use std::sync::Arc;

use api_lib::adapters::{DataProviderRegistry, DbAdapter, OfflineGenerationAdapter};
use api_lib::scheduler::{period_key, run_scheduled_generation};
use chrono::{Duration, Utc};
use newsletter_core::compose::Composer;
use newsletter_core::domain::{DataSource, Frequency, SectionDraft, SectionType, TemplateDraft};
use newsletter_core::ports::{
    NewsletterStore, PortError, SectionDataProvider, TemplateStore,
};
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

struct Harness {
    templates: Arc<dyn TemplateStore>,
    newsletters: Arc<dyn NewsletterStore>,
    composer: Composer,
    db: Arc<DbAdapter>,
}

async fn harness() -> Harness {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let db = Arc::new(DbAdapter::new(pool.clone()));
    db.init_schema().await.unwrap();

    let templates: Arc<dyn TemplateStore> = db.clone();
    let newsletters: Arc<dyn NewsletterStore> = db.clone();
    let composer = Composer::new(
        templates.clone(),
        newsletters.clone(),
        Arc::new(DataProviderRegistry::new(pool)),
        Arc::new(OfflineGenerationAdapter),
    );
    Harness {
        templates,
        newsletters,
        composer,
        db,
    }
}

fn section(name: &str, data_source: DataSource) -> SectionDraft {
    SectionDraft {
        name: name.to_string(),
        title: format!("{name} title"),
        prompt: format!("Write about {name}."),
        section_type: SectionType::Custom,
        required: false,
        word_count: 150,
        data_source,
    }
}

fn weekly(name: &str, active: bool, sections: Vec<SectionDraft>) -> TemplateDraft {
    TemplateDraft {
        id: None,
        name: name.to_string(),
        description: String::new(),
        frequency: Frequency::Weekly,
        active,
        sections,
    }
}

#[tokio::test]
async fn compose_persists_a_draft_with_structured_sections() {
    let h = harness().await;
    let template = h
        .templates
        .save_template(weekly(
            "Weekly Digest",
            true,
            vec![
                section("intro", DataSource::None),
                section("facts", DataSource::QuickFacts),
            ],
        ))
        .await
        .unwrap();

    let composed = h.composer.compose(template.id).await.unwrap();
    assert_eq!(composed.sections.len(), 2);
    assert_eq!(composed.sections[0].section_name, "intro");
    assert_eq!(composed.sections[1].section_name, "facts");
    assert!(composed
        .sections
        .iter()
        .all(|s| !s.content.trim().is_empty()));

    // Round-trip through the store: the structured metadata survives.
    let stored = h.newsletters.get_newsletter(composed.id).await.unwrap();
    assert_eq!(stored.template_id, template.id);
    assert_eq!(stored.sections, composed.sections);
    assert!(stored.html.contains("facts title"));

    let listed = h.newsletters.list_newsletters(Some(template.id)).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, composed.id);
}

#[tokio::test]
async fn compose_unknown_template_has_no_side_effects() {
    let h = harness().await;
    let err = h.composer.compose(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, PortError::NotFound(_)));
    assert!(h.newsletters.list_newsletters(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn provider_registry_unknown_tag_yields_no_data() {
    let h = harness().await;
    let registry = DataProviderRegistry::new(h.db.pool().clone());
    // DataSource::None is what every unrecognized tag parses to.
    assert!(registry.provide(DataSource::None).await.unwrap().is_none());
    // Stubbed sources return small static payloads.
    assert!(registry
        .provide(DataSource::QuickFacts)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn scheduler_composes_only_active_weekly_templates() {
    let h = harness().await;
    h.templates
        .save_template(weekly("Active Weekly", true, vec![section("a", DataSource::None)]))
        .await
        .unwrap();
    h.templates
        .save_template(weekly("Inactive Weekly", false, vec![section("a", DataSource::None)]))
        .await
        .unwrap();
    let mut monthly = weekly("Active Monthly", true, vec![section("a", DataSource::None)]);
    monthly.frequency = Frequency::Monthly;
    h.templates.save_template(monthly).await.unwrap();

    let generated = run_scheduled_generation(&h.templates, &h.newsletters, &h.composer, Utc::now())
        .await
        .unwrap();
    assert_eq!(generated, 1);

    let newsletters = h.newsletters.list_newsletters(None).await.unwrap();
    assert_eq!(newsletters.len(), 1);
    assert!(newsletters[0].title.starts_with("Active Weekly - "));
}

#[tokio::test]
async fn scheduler_is_idempotent_within_a_period() {
    let h = harness().await;
    h.templates
        .save_template(weekly("Digest", true, vec![section("a", DataSource::None)]))
        .await
        .unwrap();

    let now = Utc::now();
    let first = run_scheduled_generation(&h.templates, &h.newsletters, &h.composer, now)
        .await
        .unwrap();
    let second = run_scheduled_generation(&h.templates, &h.newsletters, &h.composer, now)
        .await
        .unwrap();
    assert_eq!(first, 1);
    assert_eq!(second, 0);
    assert_eq!(h.newsletters.list_newsletters(None).await.unwrap().len(), 1);

    // A new period gets its own slot.
    let next_week = now + Duration::days(7);
    assert_ne!(period_key(now), period_key(next_week));
    let third = run_scheduled_generation(&h.templates, &h.newsletters, &h.composer, next_week)
        .await
        .unwrap();
    assert_eq!(third, 1);
}

#[tokio::test]
async fn manual_composition_bypasses_the_period_guard() {
    let h = harness().await;
    let template = h
        .templates
        .save_template(weekly("Digest", true, vec![section("a", DataSource::None)]))
        .await
        .unwrap();

    // An admin triggering twice gets two drafts.
    h.composer.compose(template.id).await.unwrap();
    h.composer.compose(template.id).await.unwrap();
    assert_eq!(h.newsletters.list_newsletters(None).await.unwrap().len(), 2);
}
