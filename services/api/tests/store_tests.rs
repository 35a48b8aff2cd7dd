//! Integration tests for the sqlx-backed template and newsletter stores,
//! run against an in-memory SQLite database.

use api_lib::adapters::DbAdapter;
use newsletter_core::domain::{DataSource, Frequency, SectionDraft, SectionType, TemplateDraft};
use newsletter_core::ports::{NewsletterStore, PortError, TemplateStore};
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

async fn test_adapter() -> DbAdapter {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let adapter = DbAdapter::new(pool);
    adapter.init_schema().await.unwrap();
    adapter
}

fn section(name: &str, data_source: DataSource) -> SectionDraft {
    SectionDraft {
        name: name.to_string(),
        title: format!("{name} title"),
        prompt: format!("Write about {name}."),
        section_type: SectionType::Custom,
        required: false,
        word_count: 200,
        data_source,
    }
}

fn draft(name: &str, sections: Vec<SectionDraft>) -> TemplateDraft {
    TemplateDraft {
        id: None,
        name: name.to_string(),
        description: "test template".to_string(),
        frequency: Frequency::Weekly,
        active: true,
        sections,
    }
}

#[tokio::test]
async fn save_and_load_round_trip_preserves_section_order() {
    let db = test_adapter().await;
    let saved = db
        .save_template(draft(
            "Weekly Digest",
            vec![
                section("intro", DataSource::None),
                section("science", DataSource::ResearchArticles),
                section("facts", DataSource::QuickFacts),
            ],
        ))
        .await
        .unwrap();

    let loaded = db.get_template(saved.id).await.unwrap();
    assert_eq!(loaded.name, "Weekly Digest");
    assert_eq!(loaded.frequency, Frequency::Weekly);
    assert_eq!(loaded.sections.len(), 3);

    let names: Vec<&str> = loaded.sections.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["intro", "science", "facts"]);

    // sort_order reflects array position, ascending.
    let orders: Vec<i32> = loaded.sections.iter().map(|s| s.sort_order).collect();
    assert_eq!(orders, vec![0, 1, 2]);

    let science = &loaded.sections[1];
    assert_eq!(science.title, "science title");
    assert_eq!(science.prompt, "Write about science.");
    assert_eq!(science.data_source, DataSource::ResearchArticles);
    assert_eq!(science.word_count, 200);
    assert_eq!(science.template_id, saved.id);
}

#[tokio::test]
async fn resaving_replaces_the_full_section_set() {
    let db = test_adapter().await;
    let saved = db
        .save_template(draft(
            "Digest",
            vec![
                section("intro", DataSource::None),
                section("facts", DataSource::QuickFacts),
            ],
        ))
        .await
        .unwrap();

    let mut update = draft(
        "Digest v2",
        vec![
            section("facts", DataSource::QuickFacts),
            section("market", DataSource::IndustryFeeds),
        ],
    );
    update.id = Some(saved.id);
    let updated = db.save_template(update).await.unwrap();

    assert_eq!(updated.id, saved.id);
    assert_eq!(updated.name, "Digest v2");
    let names: Vec<&str> = updated.sections.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["facts", "market"]);
    assert!(updated.updated_at >= saved.updated_at);

    // No stale sections linger for this template.
    let reloaded = db.get_template(saved.id).await.unwrap();
    assert!(!reloaded.sections.iter().any(|s| s.name == "intro"));
    assert_eq!(reloaded.sections.len(), 2);
}

#[tokio::test]
async fn deleting_a_template_cascades_to_sections() {
    let db = test_adapter().await;
    let saved = db
        .save_template(draft("Digest", vec![section("intro", DataSource::None)]))
        .await
        .unwrap();

    db.delete_template(saved.id).await.unwrap();

    let err = db.get_template(saved.id).await.unwrap_err();
    assert!(matches!(err, PortError::NotFound(_)));

    let orphans: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sections WHERE template_id = ?1")
            .bind(saved.id.to_string())
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert_eq!(orphans, 0);
}

#[tokio::test]
async fn invalid_drafts_are_rejected_and_never_persisted() {
    let db = test_adapter().await;

    let mut no_name = draft("", vec![section("intro", DataSource::None)]);
    no_name.name = "   ".to_string();
    let err = db.save_template(no_name).await.unwrap_err();
    assert!(matches!(err, PortError::Validation(_)));

    let mut blank_prompt = section("intro", DataSource::None);
    blank_prompt.prompt = String::new();
    let err = db
        .save_template(draft("Digest", vec![blank_prompt]))
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::Validation(_)));

    assert!(db.list_templates(false).await.unwrap().is_empty());
}

#[tokio::test]
async fn updating_an_unknown_template_is_not_found() {
    let db = test_adapter().await;
    let mut update = draft("Ghost", vec![]);
    update.id = Some(Uuid::new_v4());
    let err = db.save_template(update).await.unwrap_err();
    assert!(matches!(err, PortError::NotFound(_)));
}

#[tokio::test]
async fn list_templates_can_filter_to_active() {
    let db = test_adapter().await;
    db.save_template(draft("Active", vec![])).await.unwrap();
    let mut inactive = draft("Inactive", vec![]);
    inactive.active = false;
    db.save_template(inactive).await.unwrap();

    let all = db.list_templates(false).await.unwrap();
    assert_eq!(all.len(), 2);

    let active = db.list_templates(true).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].name, "Active");
}

#[tokio::test]
async fn generation_run_claims_are_first_writer_wins() {
    let db = test_adapter().await;
    let template_id = Uuid::new_v4();

    assert!(db
        .try_claim_generation_run(template_id, "2026-W35")
        .await
        .unwrap());
    // Same template, same period: already claimed.
    assert!(!db
        .try_claim_generation_run(template_id, "2026-W35")
        .await
        .unwrap());
    // New period or different template: claimable.
    assert!(db
        .try_claim_generation_run(template_id, "2026-W36")
        .await
        .unwrap());
    assert!(db
        .try_claim_generation_run(Uuid::new_v4(), "2026-W35")
        .await
        .unwrap());
}
