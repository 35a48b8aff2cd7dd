//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `TemplateStore`, `NewsletterStore`, and `AuthStore` ports from the
//! `core` crate. It handles all interactions with the SQLite database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use newsletter_core::domain::{
    AdminCredentials, AdminUser, DataSource, Frequency, GeneratedNewsletter, NewsletterSummary,
    RenderedSection, Section, SectionType, Template, TemplateDraft,
};
use newsletter_core::ports::{
    AuthStore, NewsletterStore, PortError, PortResult, TemplateStore,
};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

//=========================================================================================
// Schema
//=========================================================================================

/// Statements run one at a time at startup; all idempotent.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS templates (
        id          TEXT PRIMARY KEY,
        name        TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        frequency   TEXT NOT NULL,
        active      INTEGER NOT NULL DEFAULT 1,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sections (
        id           TEXT PRIMARY KEY,
        template_id  TEXT NOT NULL REFERENCES templates(id) ON DELETE CASCADE,
        name         TEXT NOT NULL,
        title        TEXT NOT NULL,
        prompt       TEXT NOT NULL,
        section_type TEXT NOT NULL,
        required     INTEGER NOT NULL DEFAULT 0,
        sort_order   INTEGER NOT NULL,
        word_count   INTEGER NOT NULL DEFAULT 200,
        data_source  TEXT NOT NULL DEFAULT '',
        UNIQUE (template_id, name)
    )",
    "CREATE TABLE IF NOT EXISTS newsletters (
        id            TEXT PRIMARY KEY,
        template_id   TEXT NOT NULL,
        title         TEXT NOT NULL,
        html          TEXT NOT NULL,
        status        TEXT NOT NULL DEFAULT 'draft',
        sections_json TEXT NOT NULL,
        generated_at  TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS generation_runs (
        template_id TEXT NOT NULL,
        period_key  TEXT NOT NULL,
        ran_at      TEXT NOT NULL,
        PRIMARY KEY (template_id, period_key)
    )",
    "CREATE TABLE IF NOT EXISTS admins (
        id              TEXT PRIMARY KEY,
        email           TEXT NOT NULL UNIQUE,
        hashed_password TEXT NOT NULL,
        created_at      TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS auth_sessions (
        id         TEXT PRIMARY KEY,
        admin_id   TEXT NOT NULL REFERENCES admins(id) ON DELETE CASCADE,
        expires_at TEXT NOT NULL
    )",
];

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the persistence ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the schema at startup (idempotent).
    pub async fn init_schema(&self) -> Result<(), sqlx::Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn load_sections(&self, template_id: Uuid) -> PortResult<Vec<Section>> {
        // rowid as the tiebreaker gives insertion order for equal sort_order.
        let records = sqlx::query_as::<_, SectionRecord>(
            "SELECT id, template_id, name, title, prompt, section_type, required, sort_order,
                    word_count, data_source
             FROM sections WHERE template_id = ?1
             ORDER BY sort_order ASC, rowid ASC",
        )
        .bind(template_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn parse_uuid(value: &str) -> PortResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| PortError::Unexpected(format!("malformed id in database: {value}")))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct TemplateRecord {
    id: String,
    name: String,
    description: String,
    frequency: String,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TemplateRecord {
    fn to_domain(self, sections: Vec<Section>) -> PortResult<Template> {
        Ok(Template {
            id: parse_uuid(&self.id)?,
            name: self.name,
            description: self.description,
            frequency: Frequency::parse(&self.frequency)
                .map_err(|e| PortError::Unexpected(e.to_string()))?,
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
            sections,
        })
    }
}

#[derive(FromRow)]
struct SectionRecord {
    id: String,
    template_id: String,
    name: String,
    title: String,
    prompt: String,
    section_type: String,
    required: bool,
    sort_order: i64,
    word_count: i64,
    data_source: String,
}

impl SectionRecord {
    fn to_domain(self) -> PortResult<Section> {
        Ok(Section {
            id: parse_uuid(&self.id)?,
            template_id: parse_uuid(&self.template_id)?,
            name: self.name,
            title: self.title,
            prompt: self.prompt,
            section_type: SectionType::parse(&self.section_type),
            required: self.required,
            sort_order: self.sort_order as i32,
            word_count: self.word_count as i32,
            data_source: DataSource::parse(&self.data_source),
        })
    }
}

#[derive(FromRow)]
struct NewsletterRecord {
    id: String,
    template_id: String,
    title: String,
    html: String,
    sections_json: String,
    generated_at: DateTime<Utc>,
}

impl NewsletterRecord {
    fn to_domain(self) -> PortResult<GeneratedNewsletter> {
        let sections: Vec<RenderedSection> = serde_json::from_str(&self.sections_json)
            .map_err(|e| PortError::Unexpected(format!("malformed sections metadata: {e}")))?;
        Ok(GeneratedNewsletter {
            id: parse_uuid(&self.id)?,
            template_id: parse_uuid(&self.template_id)?,
            title: self.title,
            generated_at: self.generated_at,
            sections,
            html: self.html,
        })
    }
}

#[derive(FromRow)]
struct NewsletterSummaryRecord {
    id: String,
    template_id: String,
    title: String,
    generated_at: DateTime<Utc>,
}

impl NewsletterSummaryRecord {
    fn to_domain(self) -> PortResult<NewsletterSummary> {
        Ok(NewsletterSummary {
            id: parse_uuid(&self.id)?,
            template_id: parse_uuid(&self.template_id)?,
            title: self.title,
            generated_at: self.generated_at,
        })
    }
}

#[derive(FromRow)]
struct AdminCredentialsRecord {
    id: String,
    email: String,
    hashed_password: String,
}

impl AdminCredentialsRecord {
    fn to_domain(self) -> PortResult<AdminCredentials> {
        Ok(AdminCredentials {
            id: parse_uuid(&self.id)?,
            email: self.email,
            hashed_password: self.hashed_password,
        })
    }
}

#[derive(FromRow)]
struct AuthSessionRecord {
    admin_id: String,
    expires_at: DateTime<Utc>,
}

//=========================================================================================
// `TemplateStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl TemplateStore for DbAdapter {
    async fn save_template(&self, draft: TemplateDraft) -> PortResult<Template> {
        draft.validate().map_err(PortError::Validation)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let template_id = match draft.id {
            Some(id) => {
                let result = sqlx::query(
                    "UPDATE templates
                     SET name = ?1, description = ?2, frequency = ?3, active = ?4, updated_at = ?5
                     WHERE id = ?6",
                )
                .bind(&draft.name)
                .bind(&draft.description)
                .bind(draft.frequency.as_str())
                .bind(draft.active)
                .bind(now)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;

                if result.rows_affected() == 0 {
                    return Err(PortError::NotFound(format!("Template {id} not found")));
                }
                id
            }
            None => {
                let id = Uuid::new_v4();
                sqlx::query(
                    "INSERT INTO templates (id, name, description, frequency, active, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .bind(id.to_string())
                .bind(&draft.name)
                .bind(&draft.description)
                .bind(draft.frequency.as_str())
                .bind(draft.active)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
                id
            }
        };

        // Full replacement of the section set: sort_order comes from the
        // draft's array position. Runs inside the transaction so a concurrent
        // reader never observes a half-replaced set.
        sqlx::query("DELETE FROM sections WHERE template_id = ?1")
            .bind(template_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        for (position, section) in draft.sections.iter().enumerate() {
            sqlx::query(
                "INSERT INTO sections
                    (id, template_id, name, title, prompt, section_type, required, sort_order,
                     word_count, data_source)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(template_id.to_string())
            .bind(section.name.trim())
            .bind(&section.title)
            .bind(&section.prompt)
            .bind(section.section_type.as_str())
            .bind(section.required)
            .bind(position as i64)
            .bind(i64::from(section.word_count))
            .bind(section.data_source.as_str())
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)?;

        self.get_template(template_id).await
    }

    async fn get_template(&self, template_id: Uuid) -> PortResult<Template> {
        let record = sqlx::query_as::<_, TemplateRecord>(
            "SELECT id, name, description, frequency, active, created_at, updated_at
             FROM templates WHERE id = ?1",
        )
        .bind(template_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Template {template_id} not found"))
            }
            _ => unexpected(e),
        })?;

        let sections = self.load_sections(template_id).await?;
        record.to_domain(sections)
    }

    async fn list_templates(&self, active_only: bool) -> PortResult<Vec<Template>> {
        let query = if active_only {
            "SELECT id, name, description, frequency, active, created_at, updated_at
             FROM templates WHERE active = 1 ORDER BY created_at ASC"
        } else {
            "SELECT id, name, description, frequency, active, created_at, updated_at
             FROM templates ORDER BY created_at ASC"
        };
        let records = sqlx::query_as::<_, TemplateRecord>(query)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        let mut templates = Vec::with_capacity(records.len());
        for record in records {
            let id = parse_uuid(&record.id)?;
            let sections = self.load_sections(id).await?;
            templates.push(record.to_domain(sections)?);
        }
        Ok(templates)
    }

    async fn delete_template(&self, template_id: Uuid) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // Explicit child delete; does not rely on the foreign_keys pragma.
        sqlx::query("DELETE FROM sections WHERE template_id = ?1")
            .bind(template_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        let result = sqlx::query("DELETE FROM templates WHERE id = ?1")
            .bind(template_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Template {template_id} not found"
            )));
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// `NewsletterStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl NewsletterStore for DbAdapter {
    async fn save_newsletter(&self, newsletter: &GeneratedNewsletter) -> PortResult<()> {
        let sections_json = serde_json::to_string(&newsletter.sections)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        sqlx::query(
            "INSERT INTO newsletters (id, template_id, title, html, status, sections_json, generated_at)
             VALUES (?1, ?2, ?3, ?4, 'draft', ?5, ?6)",
        )
        .bind(newsletter.id.to_string())
        .bind(newsletter.template_id.to_string())
        .bind(&newsletter.title)
        .bind(&newsletter.html)
        .bind(sections_json)
        .bind(newsletter.generated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_newsletter(&self, id: Uuid) -> PortResult<GeneratedNewsletter> {
        let record = sqlx::query_as::<_, NewsletterRecord>(
            "SELECT id, template_id, title, html, sections_json, generated_at
             FROM newsletters WHERE id = ?1",
        )
        .bind(id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Newsletter {id} not found")),
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn list_newsletters(
        &self,
        template_id: Option<Uuid>,
    ) -> PortResult<Vec<NewsletterSummary>> {
        let records = match template_id {
            Some(id) => {
                sqlx::query_as::<_, NewsletterSummaryRecord>(
                    "SELECT id, template_id, title, generated_at FROM newsletters
                     WHERE template_id = ?1 ORDER BY generated_at DESC",
                )
                .bind(id.to_string())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, NewsletterSummaryRecord>(
                    "SELECT id, template_id, title, generated_at FROM newsletters
                     ORDER BY generated_at DESC",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn try_claim_generation_run(
        &self,
        template_id: Uuid,
        period_key: &str,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO generation_runs (template_id, period_key, ran_at)
             VALUES (?1, ?2, ?3)",
        )
        .bind(template_id.to_string())
        .bind(period_key)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(result.rows_affected() == 1)
    }
}

//=========================================================================================
// `AuthStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthStore for DbAdapter {
    async fn create_admin_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<AdminUser> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO admins (id, email, hashed_password, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(id.to_string())
        .bind(email)
        .bind(hashed_password)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                PortError::Validation("email is already registered".to_string())
            }
            _ => unexpected(e),
        })?;

        Ok(AdminUser {
            id,
            email: email.to_string(),
        })
    }

    async fn get_admin_by_email(&self, email: &str) -> PortResult<AdminCredentials> {
        let record = sqlx::query_as::<_, AdminCredentialsRecord>(
            "SELECT id, email, hashed_password FROM admins WHERE email = ?1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Admin {email} not found")),
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        admin_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, admin_id, expires_at) VALUES (?1, ?2, ?3)")
            .bind(session_id)
            .bind(admin_id.to_string())
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT admin_id, expires_at FROM auth_sessions WHERE id = ?1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        match record {
            Some(session) if session.expires_at > Utc::now() => parse_uuid(&session.admin_id),
            Some(_) => {
                // Expired: clean it up and reject.
                self.delete_auth_session(session_id).await.ok();
                Err(PortError::Unauthorized)
            }
            None => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
