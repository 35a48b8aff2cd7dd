//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the template and newsletter REST endpoints
//! and the master definition for the OpenAPI specification.

use crate::web::auth::{self, AuthResponse, LoginRequest, SignupRequest};
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use newsletter_core::domain::{
    DataSource, Frequency, GeneratedNewsletter, NewsletterSummary, Section, SectionDraft,
    SectionType, Template, TemplateDraft,
};
use newsletter_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        save_template_handler,
        list_templates_handler,
        get_template_handler,
        delete_template_handler,
        generate_newsletter_handler,
        list_newsletters_handler,
    ),
    components(
        schemas(
            SignupRequest,
            LoginRequest,
            AuthResponse,
            SaveTemplateRequest,
            SectionInput,
            TemplateResponse,
            SectionResponse,
            NewsletterResponse,
            RenderedSectionResponse,
            NewsletterSummaryResponse,
        )
    ),
    tags(
        (name = "Newsletter API", description = "Admin endpoints for newsletter templates and generation.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Request and Response Structs
//=========================================================================================

/// Create-or-update payload for a template. Omitting `id` creates a new
/// template; supplying it updates in place and replaces the full section set.
#[derive(Deserialize, ToSchema)]
pub struct SaveTemplateRequest {
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// One of: daily, weekly, biweekly, monthly. Anything else is rejected.
    pub frequency: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub sections: Vec<SectionInput>,
}

fn default_true() -> bool {
    true
}

/// One section in a save payload. Rendering order is the array position.
#[derive(Deserialize, ToSchema)]
pub struct SectionInput {
    pub name: String,
    pub title: String,
    pub prompt: String,
    #[serde(default)]
    pub section_type: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub word_count: Option<i32>,
    /// Unknown tags resolve to "no data source" rather than an error.
    #[serde(default)]
    pub data_source: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct TemplateResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub frequency: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sections: Vec<SectionResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct SectionResponse {
    pub id: Uuid,
    pub name: String,
    pub title: String,
    pub prompt: String,
    pub section_type: String,
    pub required: bool,
    pub sort_order: i32,
    pub word_count: i32,
    pub data_source: String,
}

#[derive(Serialize, ToSchema)]
pub struct NewsletterResponse {
    pub id: Uuid,
    pub template_id: Uuid,
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<RenderedSectionResponse>,
    pub html: String,
}

#[derive(Serialize, ToSchema)]
pub struct RenderedSectionResponse {
    pub section_name: String,
    pub section_title: String,
    pub content: String,
}

#[derive(Serialize, ToSchema)]
pub struct NewsletterSummaryResponse {
    pub id: Uuid,
    pub template_id: Uuid,
    pub title: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Deserialize, IntoParams)]
pub struct ListTemplatesParams {
    /// When true, only templates with `active = true` are returned.
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Deserialize, IntoParams)]
pub struct ListNewslettersParams {
    /// Restrict the listing to newsletters generated from one template.
    pub template_id: Option<Uuid>,
}

//=========================================================================================
// Conversions
//=========================================================================================

impl TemplateResponse {
    fn from_domain(template: Template) -> Self {
        Self {
            id: template.id,
            name: template.name,
            description: template.description,
            frequency: template.frequency.as_str().to_string(),
            active: template.active,
            created_at: template.created_at,
            updated_at: template.updated_at,
            sections: template
                .sections
                .into_iter()
                .map(SectionResponse::from_domain)
                .collect(),
        }
    }
}

impl SectionResponse {
    fn from_domain(section: Section) -> Self {
        Self {
            id: section.id,
            name: section.name,
            title: section.title,
            prompt: section.prompt,
            section_type: section.section_type.as_str().to_string(),
            required: section.required,
            sort_order: section.sort_order,
            word_count: section.word_count,
            data_source: section.data_source.as_str().to_string(),
        }
    }
}

impl NewsletterResponse {
    fn from_domain(newsletter: GeneratedNewsletter) -> Self {
        Self {
            id: newsletter.id,
            template_id: newsletter.template_id,
            title: newsletter.title,
            generated_at: newsletter.generated_at,
            sections: newsletter
                .sections
                .into_iter()
                .map(|s| RenderedSectionResponse {
                    section_name: s.section_name,
                    section_title: s.section_title,
                    content: s.content,
                })
                .collect(),
            html: newsletter.html,
        }
    }
}

impl NewsletterSummaryResponse {
    fn from_domain(summary: NewsletterSummary) -> Self {
        Self {
            id: summary.id,
            template_id: summary.template_id,
            title: summary.title,
            generated_at: summary.generated_at,
        }
    }
}

impl SaveTemplateRequest {
    /// Converts the wire payload into a core draft. The frequency string is
    /// parsed strictly here so malformed values never reach the store.
    fn into_draft(self) -> Result<TemplateDraft, (StatusCode, String)> {
        let frequency = Frequency::parse(&self.frequency)
            .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
        Ok(TemplateDraft {
            id: self.id,
            name: self.name,
            description: self.description,
            frequency,
            active: self.active,
            sections: self
                .sections
                .into_iter()
                .map(|s| SectionDraft {
                    name: s.name,
                    title: s.title,
                    prompt: s.prompt,
                    section_type: s
                        .section_type
                        .as_deref()
                        .map(SectionType::parse)
                        .unwrap_or(SectionType::Custom),
                    required: s.required,
                    word_count: s.word_count.unwrap_or(newsletter_core::domain::DEFAULT_WORD_COUNT),
                    data_source: s
                        .data_source
                        .as_deref()
                        .map(DataSource::parse)
                        .unwrap_or(DataSource::None),
                })
                .collect(),
        })
    }
}

/// Maps a port error onto the uniform failure envelope.
fn port_error_response(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Unexpected(msg) => {
            error!("Internal error: {msg}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Create or update a newsletter template.
#[utoipa::path(
    post,
    path = "/templates",
    request_body = SaveTemplateRequest,
    responses(
        (status = 201, description = "Template saved", body = TemplateResponse),
        (status = 404, description = "Unknown template id"),
        (status = 422, description = "Validation failure"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn save_template_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SaveTemplateRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let draft = req.into_draft()?;
    let template = state
        .templates
        .save_template(draft)
        .await
        .map_err(port_error_response)?;
    Ok((StatusCode::CREATED, Json(TemplateResponse::from_domain(template))))
}

/// List templates, optionally restricted to active ones.
#[utoipa::path(
    get,
    path = "/templates",
    params(ListTemplatesParams),
    responses(
        (status = 200, description = "Templates", body = [TemplateResponse]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_templates_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTemplatesParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let templates = state
        .templates
        .list_templates(params.active_only)
        .await
        .map_err(port_error_response)?;
    let body: Vec<TemplateResponse> = templates
        .into_iter()
        .map(TemplateResponse::from_domain)
        .collect();
    Ok(Json(body))
}

/// Fetch one template with its sections.
#[utoipa::path(
    get,
    path = "/templates/{id}",
    params(("id" = Uuid, Path, description = "Template id")),
    responses(
        (status = 200, description = "Template", body = TemplateResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_template_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let template = state
        .templates
        .get_template(id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(TemplateResponse::from_domain(template)))
}

/// Delete a template and all of its sections.
#[utoipa::path(
    delete,
    path = "/templates/{id}",
    params(("id" = Uuid, Path, description = "Template id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_template_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .templates
        .delete_template(id)
        .await
        .map_err(port_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Manually trigger composition for one template.
///
/// Unlike the scheduler this path carries no period-dedup: an admin asking
/// twice gets two drafts.
#[utoipa::path(
    post,
    path = "/templates/{id}/generate",
    params(("id" = Uuid, Path, description = "Template id")),
    responses(
        (status = 201, description = "Newsletter generated", body = NewsletterResponse),
        (status = 404, description = "Not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn generate_newsletter_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let newsletter = state.composer.compose(id).await.map_err(port_error_response)?;
    Ok((
        StatusCode::CREATED,
        Json(NewsletterResponse::from_domain(newsletter)),
    ))
}

/// List generated newsletters, optionally for one template.
#[utoipa::path(
    get,
    path = "/newsletters",
    params(ListNewslettersParams),
    responses(
        (status = 200, description = "Newsletters", body = [NewsletterSummaryResponse]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_newsletters_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListNewslettersParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let newsletters = state
        .newsletters
        .list_newsletters(params.template_id)
        .await
        .map_err(port_error_response)?;
    let body: Vec<NewsletterSummaryResponse> = newsletters
        .into_iter()
        .map(NewsletterSummaryResponse::from_domain)
        .collect();
    Ok(Json(body))
}
