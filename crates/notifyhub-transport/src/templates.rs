//! Handlebars email templates.
//!
//! Templates are embedded at compile time and registered once; job
//! payloads name the template and carry the data it renders.

use handlebars::Handlebars;

use notifyhub_core::error::{AppError, ErrorKind};
use notifyhub_core::result::AppResult;

const DIGEST_HTML: &str = include_str!("../templates/digest.html.hbs");
const DIGEST_TEXT: &str = include_str!("../templates/digest.txt.hbs");

/// Registry of the email templates the pipeline renders.
pub struct TemplateRenderer {
    registry: Handlebars<'static>,
}

impl TemplateRenderer {
    /// Register all embedded templates.
    pub fn new() -> AppResult<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry
            .register_template_string("digest.html", DIGEST_HTML)
            .and_then(|_| registry.register_template_string("digest.txt", DIGEST_TEXT))
            .map_err(|e| {
                AppError::with_source(ErrorKind::Internal, "Failed to register email template", e)
            })?;
        Ok(Self { registry })
    }

    /// Whether a template is registered.
    pub fn has_template(&self, name: &str) -> bool {
        self.registry.has_template(name)
    }

    /// Render a registered template with the given data.
    pub fn render(&self, name: &str, data: &serde_json::Value) -> AppResult<String> {
        self.registry.render(name, data).map_err(|e| {
            AppError::with_source(
                ErrorKind::Internal,
                format!("Failed to render template '{name}'"),
                e,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn digest_data() -> serde_json::Value {
        json!({
            "display_name": "Avery",
            "period": "daily",
            "total": 2,
            "notifications": [
                { "title": "Assignment due", "message": "Lab 3 closes tonight" },
                { "title": "New reply", "message": "Sam replied to your thread" },
            ],
        })
    }

    #[test]
    fn digest_templates_render() {
        let renderer = TemplateRenderer::new().unwrap();
        let html = renderer.render("digest.html", &digest_data()).unwrap();
        assert!(html.contains("Assignment due"));
        assert!(html.contains("Avery"));

        let text = renderer.render("digest.txt", &digest_data()).unwrap();
        assert!(text.contains("New reply"));
    }

    #[test]
    fn unknown_template_errors() {
        let renderer = TemplateRenderer::new().unwrap();
        assert!(!renderer.has_template("missing"));
        assert!(renderer.render("missing", &json!({})).is_err());
    }
}
