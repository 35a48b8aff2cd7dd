//! crates/newsletter_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    AdminCredentials, AdminUser, DataSource, GeneratedNewsletter, NewsletterSummary,
    SectionPayload, Template, TemplateDraft,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistence for templates and their owned sections.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Upsert. A draft without an id inserts a new template; one with an id
    /// updates it in place and replaces the full section set, transactionally.
    /// Invalid drafts are rejected with `PortError::Validation` before any write.
    async fn save_template(&self, draft: TemplateDraft) -> PortResult<Template>;

    /// Fetches a template with its sections sorted ascending by `sort_order`.
    async fn get_template(&self, template_id: Uuid) -> PortResult<Template>;

    async fn list_templates(&self, active_only: bool) -> PortResult<Vec<Template>>;

    /// Deletes a template and, by cascade, all of its sections.
    async fn delete_template(&self, template_id: Uuid) -> PortResult<()>;
}

/// Persistence for generated newsletter documents.
#[async_trait]
pub trait NewsletterStore: Send + Sync {
    /// Persists a composed newsletter as a draft document.
    async fn save_newsletter(&self, newsletter: &GeneratedNewsletter) -> PortResult<()>;

    async fn get_newsletter(&self, id: Uuid) -> PortResult<GeneratedNewsletter>;

    async fn list_newsletters(
        &self,
        template_id: Option<Uuid>,
    ) -> PortResult<Vec<NewsletterSummary>>;

    /// Claims the scheduled-generation slot for `(template_id, period_key)`.
    /// Returns `true` if this caller won the slot, `false` if the period was
    /// already generated. Keeps a double-fired scheduler tick from producing
    /// duplicate newsletters.
    async fn try_claim_generation_run(
        &self,
        template_id: Uuid,
        period_key: &str,
    ) -> PortResult<bool>;
}

/// Supplies contextual data for a section's generation.
///
/// `DataSource::None` and any source with no wired backend yield `Ok(None)`.
/// Implementations should degrade backend failures to `Ok(None)` as well; the
/// composer treats an `Err` from a provider the same as missing data for that
/// one section.
#[async_trait]
pub trait SectionDataProvider: Send + Sync {
    async fn provide(&self, source: DataSource) -> PortResult<Option<SectionPayload>>;
}

/// Turns generation instructions into prose. Opaque to the core; callers must
/// tolerate latency, errors, and malformed output.
#[async_trait]
pub trait TextGenerationService: Send + Sync {
    async fn generate(&self, instructions: &str) -> PortResult<String>;
}

/// Admin account and login-session persistence.
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn create_admin_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<AdminUser>;

    async fn get_admin_by_email(&self, email: &str) -> PortResult<AdminCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        admin_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the admin id for a live session, `Unauthorized` otherwise.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}
