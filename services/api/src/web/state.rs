//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use newsletter_core::compose::Composer;
use newsletter_core::ports::{AuthStore, NewsletterStore, TemplateStore};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub templates: Arc<dyn TemplateStore>,
    pub newsletters: Arc<dyn NewsletterStore>,
    pub auth: Arc<dyn AuthStore>,
    pub composer: Arc<Composer>,
    pub config: Arc<Config>,
}
