pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;

// Re-export the handlers the binary needs when building the router.
pub use middleware::require_auth;
pub use rest::{
    delete_template_handler, generate_newsletter_handler, get_template_handler,
    list_newsletters_handler, list_templates_handler, save_template_handler,
};
