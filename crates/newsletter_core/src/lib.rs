pub mod compose;
pub mod domain;
pub mod ports;

pub use compose::{build_instructions, placeholder_content, Composer};
pub use domain::{
    AdminCredentials, AdminUser, DataSource, Frequency, GeneratedNewsletter, NewsletterSummary,
    RenderedSection, Section, SectionDraft, SectionPayload, SectionType, Template, TemplateDraft,
};
pub use ports::{
    AuthStore, NewsletterStore, PortError, PortResult, SectionDataProvider, TemplateStore,
    TextGenerationService,
};
