//! crates/newsletter_core/src/compose.rs
//!
//! The composition pipeline: build generation instructions for each section,
//! synthesize content (with a deterministic placeholder on any failure), and
//! assemble the finished newsletter document.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::domain::{DataSource, GeneratedNewsletter, RenderedSection, Section, SectionPayload};
use crate::ports::{
    NewsletterStore, PortResult, SectionDataProvider, TemplateStore, TextGenerationService,
};

//=========================================================================================
// Instruction Building and the Placeholder
//=========================================================================================

/// Builds the generation instructions for one section: its prompt, the
/// advisory word-count guidance, and the serialized context data when a
/// provider supplied any.
pub fn build_instructions(section: &Section, payload: Option<&SectionPayload>) -> String {
    let mut instructions = format!(
        "{}\n\nWrite roughly {} words. Respond with the section body only, no heading.",
        section.prompt.trim(),
        section.word_count
    );
    if let Some(payload) = payload {
        let data = serde_json::to_string_pretty(payload).unwrap_or_else(|_| "null".to_string());
        instructions.push_str("\n\nCONTEXT DATA:\n");
        instructions.push_str(&data);
    }
    instructions
}

/// Deterministic fallback content for a section whose provider or generator
/// failed. Never empty, so a composed newsletter never has a blank block.
pub fn placeholder_content(section: &Section) -> String {
    match section.data_source {
        DataSource::None => format!(
            "[Content for \"{}\" is not available yet. This section will be filled in before publication.]",
            section.title
        ),
        source => format!(
            "[Content for \"{}\" is not available yet (data source: {}). This section will be filled in before publication.]",
            section.title,
            source.as_str()
        ),
    }
}

fn render_html(title: &str, date: &str, sections: &[RenderedSection]) -> String {
    let mut html = String::new();
    html.push_str("<div class=\"newsletter\">\n");
    html.push_str(&format!(
        "  <div class=\"newsletter-header\">\n    <h1>{}</h1>\n    <p class=\"newsletter-date\">{}</p>\n  </div>\n",
        title, date
    ));
    for section in sections {
        html.push_str(&format!(
            "  <div class=\"newsletter-section\">\n    <h2>{}</h2>\n    <div class=\"section-content\">{}</div>\n  </div>\n",
            section.section_title, section.content
        ));
    }
    html.push_str("</div>\n");
    html
}

//=========================================================================================
// The Composer
//=========================================================================================

/// Assembles a full newsletter from a template's sections and persists the
/// result as a draft document.
pub struct Composer {
    templates: Arc<dyn TemplateStore>,
    newsletters: Arc<dyn NewsletterStore>,
    provider: Arc<dyn SectionDataProvider>,
    generator: Arc<dyn TextGenerationService>,
}

impl Composer {
    pub fn new(
        templates: Arc<dyn TemplateStore>,
        newsletters: Arc<dyn NewsletterStore>,
        provider: Arc<dyn SectionDataProvider>,
        generator: Arc<dyn TextGenerationService>,
    ) -> Self {
        Self {
            templates,
            newsletters,
            provider,
            generator,
        }
    }

    /// Composes one newsletter from the given template.
    ///
    /// A missing template propagates as `NotFound` with no side effects.
    /// A provider or generator failure for one section is recovered locally
    /// with the placeholder; the other sections are unaffected.
    pub async fn compose(&self, template_id: Uuid) -> PortResult<GeneratedNewsletter> {
        let template = self.templates.get_template(template_id).await?;

        // The store returns sections sorted, but sort again so ordering never
        // depends on the adapter. Stable sort keeps insertion order on ties.
        let mut sections = template.sections.clone();
        sections.sort_by_key(|s| s.sort_order);

        let mut rendered = Vec::with_capacity(sections.len());
        for section in &sections {
            let content = self.synthesize_section(section).await;
            rendered.push(RenderedSection {
                section_name: section.name.clone(),
                section_title: section.title.clone(),
                content,
            });
        }

        let generated_at = Utc::now();
        let date = generated_at.format("%Y-%m-%d").to_string();
        let title = format!("{} - {}", template.name, date);
        let html = render_html(&title, &date, &rendered);

        let newsletter = GeneratedNewsletter {
            id: Uuid::new_v4(),
            template_id,
            title,
            generated_at,
            sections: rendered,
            html,
        };
        self.newsletters.save_newsletter(&newsletter).await?;
        Ok(newsletter)
    }

    /// Provider lookup plus generation for one section. Every failure path
    /// lands on the placeholder; this never errors and never returns an
    /// empty string.
    async fn synthesize_section(&self, section: &Section) -> String {
        let payload = match self.provider.provide(section.data_source).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    section = %section.name,
                    data_source = section.data_source.as_str(),
                    "data provider failed, continuing without context: {e}"
                );
                None
            }
        };

        let instructions = build_instructions(section, payload.as_ref());
        match self.generator.generate(&instructions).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!(section = %section.name, "generator returned empty content");
                placeholder_content(section)
            }
            Err(e) => {
                warn!(section = %section.name, "generation failed: {e}");
                placeholder_content(section)
            }
        }
    }
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Frequency, NewsletterSummary, SectionType, Template, TemplateDraft,
    };
    use crate::ports::{PortError, TemplateStore};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn section(name: &str, sort_order: i32, data_source: DataSource) -> Section {
        Section {
            id: Uuid::new_v4(),
            template_id: Uuid::nil(),
            name: name.to_string(),
            title: format!("Title of {name}"),
            prompt: format!("Write the {name} section."),
            section_type: SectionType::Custom,
            required: false,
            sort_order,
            word_count: 120,
            data_source,
        }
    }

    fn template(sections: Vec<Section>) -> Template {
        Template {
            id: Uuid::new_v4(),
            name: "Weekly Digest".to_string(),
            description: String::new(),
            frequency: Frequency::Weekly,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            sections,
        }
    }

    struct FakeTemplateStore {
        template: Option<Template>,
    }

    #[async_trait]
    impl TemplateStore for FakeTemplateStore {
        async fn save_template(&self, _draft: TemplateDraft) -> PortResult<Template> {
            unimplemented!("not used by the composer")
        }
        async fn get_template(&self, template_id: Uuid) -> PortResult<Template> {
            self.template
                .clone()
                .ok_or_else(|| PortError::NotFound(format!("Template {template_id} not found")))
        }
        async fn list_templates(&self, _active_only: bool) -> PortResult<Vec<Template>> {
            Ok(self.template.clone().into_iter().collect())
        }
        async fn delete_template(&self, _template_id: Uuid) -> PortResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeNewsletterStore {
        saved: Mutex<Vec<GeneratedNewsletter>>,
    }

    #[async_trait]
    impl NewsletterStore for FakeNewsletterStore {
        async fn save_newsletter(&self, newsletter: &GeneratedNewsletter) -> PortResult<()> {
            self.saved.lock().unwrap().push(newsletter.clone());
            Ok(())
        }
        async fn get_newsletter(&self, id: Uuid) -> PortResult<GeneratedNewsletter> {
            Err(PortError::NotFound(id.to_string()))
        }
        async fn list_newsletters(
            &self,
            _template_id: Option<Uuid>,
        ) -> PortResult<Vec<NewsletterSummary>> {
            Ok(vec![])
        }
        async fn try_claim_generation_run(
            &self,
            _template_id: Uuid,
            _period_key: &str,
        ) -> PortResult<bool> {
            Ok(true)
        }
    }

    /// Provider that only knows quick facts; everything else is missing data.
    struct FactsOnlyProvider;

    #[async_trait]
    impl SectionDataProvider for FactsOnlyProvider {
        async fn provide(&self, source: DataSource) -> PortResult<Option<SectionPayload>> {
            match source {
                DataSource::QuickFacts => Ok(Some(SectionPayload::Facts(vec![
                    "Myrcene is the most common terpene in cannabis.".to_string(),
                ]))),
                _ => Ok(None),
            }
        }
    }

    /// Generator that echoes instructions, or fails for prompts containing a marker.
    struct EchoGenerator;

    #[async_trait]
    impl TextGenerationService for EchoGenerator {
        async fn generate(&self, instructions: &str) -> PortResult<String> {
            if instructions.contains("FAIL_THIS_SECTION") {
                return Err(PortError::Unexpected("generator unavailable".to_string()));
            }
            Ok(format!("generated: {}", instructions.lines().next().unwrap_or("")))
        }
    }

    fn composer_with(template: Option<Template>) -> (Composer, Arc<FakeNewsletterStore>) {
        let newsletters = Arc::new(FakeNewsletterStore::default());
        let composer = Composer::new(
            Arc::new(FakeTemplateStore { template }),
            newsletters.clone(),
            Arc::new(FactsOnlyProvider),
            Arc::new(EchoGenerator),
        );
        (composer, newsletters)
    }

    #[tokio::test]
    async fn compose_orders_sections_by_sort_order() {
        // Inserted out of order: "intro" has the higher sort_order.
        let tpl = template(vec![
            section("intro", 2, DataSource::None),
            section("facts", 1, DataSource::QuickFacts),
        ]);
        let id = tpl.id;
        let (composer, store) = composer_with(Some(tpl));

        let newsletter = composer.compose(id).await.unwrap();
        let names: Vec<&str> = newsletter
            .sections
            .iter()
            .map(|s| s.section_name.as_str())
            .collect();
        assert_eq!(names, vec!["facts", "intro"]);
        assert_eq!(store.saved.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn compose_isolates_a_failing_section() {
        let mut bad = section("market", 2, DataSource::None);
        bad.prompt = "FAIL_THIS_SECTION".to_string();
        let tpl = template(vec![section("intro", 1, DataSource::None), bad.clone()]);
        let id = tpl.id;
        let (composer, _) = composer_with(Some(tpl));

        let newsletter = composer.compose(id).await.unwrap();
        assert_eq!(newsletter.sections.len(), 2);
        assert!(newsletter.sections[0].content.starts_with("generated:"));
        assert_eq!(newsletter.sections[1].content, placeholder_content(&bad));
    }

    #[tokio::test]
    async fn compose_missing_template_is_not_found() {
        let (composer, store) = composer_with(None);
        let err = composer.compose(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
        assert!(store.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn compose_tolerates_a_null_provider_payload() {
        // industry_feeds is stubbed to None by the provider; the section must
        // still come back with non-empty content.
        let tpl = template(vec![section("news", 1, DataSource::IndustryFeeds)]);
        let id = tpl.id;
        let (composer, _) = composer_with(Some(tpl));

        let newsletter = composer.compose(id).await.unwrap();
        assert!(!newsletter.sections[0].content.trim().is_empty());
    }

    #[tokio::test]
    async fn compose_title_carries_template_name_and_date() {
        let tpl = template(vec![section("intro", 1, DataSource::None)]);
        let id = tpl.id;
        let (composer, _) = composer_with(Some(tpl));

        let newsletter = composer.compose(id).await.unwrap();
        let date = newsletter.generated_at.format("%Y-%m-%d").to_string();
        assert_eq!(newsletter.title, format!("Weekly Digest - {date}"));
        assert!(newsletter.html.contains("newsletter-section"));
        assert!(newsletter.html.contains(&newsletter.title));
    }

    #[test]
    fn instructions_embed_prompt_word_count_and_data() {
        let s = section("facts", 1, DataSource::QuickFacts);
        let payload = SectionPayload::Facts(vec!["Limonene smells of citrus.".to_string()]);
        let instructions = build_instructions(&s, Some(&payload));
        assert!(instructions.contains("Write the facts section."));
        assert!(instructions.contains("roughly 120 words"));
        assert!(instructions.contains("CONTEXT DATA"));
        assert!(instructions.contains("Limonene"));

        let without = build_instructions(&s, None);
        assert!(!without.contains("CONTEXT DATA"));
    }

    #[test]
    fn placeholder_names_section_and_source() {
        let s = section("news", 1, DataSource::IndustryFeeds);
        let text = placeholder_content(&s);
        assert!(text.contains("Title of news"));
        assert!(text.contains("industry_feeds"));
    }
}
