//! Built-in templates using the Tera template engine
//!
//! All templates are embedded directly in the binary.

use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera};

use crate::config::SiteConfig;
use crate::content::DateFormatter;
use crate::source::date::parse_instant;
use crate::Result;

/// Template renderer with the embedded theme
pub struct TemplateRenderer {
    tera: Tera,
    dates: DateFormatter,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new(config: &SiteConfig) -> Result<Self> {
        let dates = DateFormatter::new(&config.language, &config.date_format)?;
        let mut tera = Tera::default();

        // Register all templates
        tera.add_raw_templates(vec![
            ("layout.html", include_str!("spacetraveling/layout.html")),
            ("index.html", include_str!("spacetraveling/index.html")),
            ("post.html", include_str!("spacetraveling/post.html")),
            ("not_found.html", include_str!("spacetraveling/not_found.html")),
            // Partials
            (
                "partials/header.html",
                include_str!("spacetraveling/partials/header.html"),
            ),
            (
                "partials/exit_preview.html",
                include_str!("spacetraveling/partials/exit_preview.html"),
            ),
            (
                "partials/post_item.html",
                include_str!("spacetraveling/partials/post_item.html"),
            ),
        ])?;

        tera.register_filter(
            "display_date",
            DisplayDate {
                dates: dates.clone(),
            },
        );

        Ok(Self { tera, dates })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }

    /// The formatter behind the `display_date` filter
    pub fn dates(&self) -> &DateFormatter {
        &self.dates
    }
}

/// Tera filter: format a stored instant in the site locale
///
/// `null` renders as an empty string. An optional `format` argument
/// overrides the configured pattern.
struct DisplayDate {
    dates: DateFormatter,
}

impl tera::Filter for DisplayDate {
    fn filter(
        &self,
        value: &tera::Value,
        args: &HashMap<String, tera::Value>,
    ) -> tera::Result<tera::Value> {
        if value.is_null() {
            return Ok(tera::Value::String(String::new()));
        }

        let s = tera::try_get_value!("display_date", "value", String, value);
        let instant = parse_instant(&s)
            .ok_or_else(|| tera::Error::msg(format!("display_date: invalid instant `{}`", s)))?;

        let formatted = match args.get("format") {
            Some(val) => {
                let format = tera::try_get_value!("display_date", "format", String, val);
                self.dates.display_with(Some(&instant), &format)
            }
            None => self.dates.display(Some(&instant)),
        };
        Ok(tera::Value::String(formatted.unwrap_or_default()))
    }
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct SiteData {
    pub title: String,
    pub language: String,
    pub edit_format: String,
    /// Content repository, enables the preview toolbar
    pub repository: Option<String>,
}

impl SiteData {
    pub fn new(config: &SiteConfig, repository: Option<String>) -> Self {
        Self {
            title: config.title.clone(),
            language: config.language.clone(),
            edit_format: config.edit_format.clone(),
            repository,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::PostSummary;
    use chrono::{TimeZone, Utc};

    fn renderer() -> TemplateRenderer {
        TemplateRenderer::new(&SiteConfig::default()).unwrap()
    }

    fn base_context(repository: Option<&str>) -> Context {
        let mut context = Context::new();
        context.insert(
            "site",
            &SiteData::new(&SiteConfig::default(), repository.map(str::to_string)),
        );
        context.insert("preview", &false);
        context
    }

    #[test]
    fn test_display_date_filter() {
        let renderer = renderer();
        let summary = PostSummary {
            uid: "hooks".to_string(),
            first_publication_date: Some(Utc.with_ymd_and_hms(2021, 4, 15, 12, 0, 0).unwrap()),
            title: "Hooks".to_string(),
            subtitle: String::new(),
            author: "Joseph".to_string(),
        };
        let undated = PostSummary {
            uid: "draft".to_string(),
            first_publication_date: None,
            ..summary.clone()
        };

        let mut context = base_context(None);
        context.insert("posts", &vec![summary, undated]);
        context.insert("next_page", &None::<String>);
        let html = renderer.render("index.html", &context).unwrap();

        assert!(html.contains("<time>15 abr 2021</time>"));
        assert!(html.contains("<time></time>"));
        assert!(!html.contains("Carregar mais posts"));
    }

    #[test]
    fn test_load_more_button_carries_cursor() {
        let mut context = base_context(None);
        context.insert("posts", &Vec::<PostSummary>::new());
        context.insert("next_page", &Some("memory:page-2"));
        let html = renderer().render("index.html", &context).unwrap();
        assert!(html.contains("Carregar mais posts"));
        assert!(html.contains(r#"data-next="memory:page-2""#));
        assert!(html.contains("/api/posts?cursor="));
    }

    #[test]
    fn test_toolbar_only_with_repository() {
        let mut context = base_context(Some("spacetraveling"));
        context.insert("status", &404);
        context.insert("message", &"not found");
        let html = renderer().render("not_found.html", &context).unwrap();
        assert!(html.contains("prismic.js?new=true&repo=spacetraveling"));

        let mut context = base_context(None);
        context.insert("status", &404);
        context.insert("message", &"not found");
        let html = renderer().render("not_found.html", &context).unwrap();
        assert!(!html.contains("prismic.js"));
        assert!(html.contains(r#"<html lang="pt-BR">"#));
    }

    #[test]
    fn test_text_is_escaped() {
        let mut context = base_context(None);
        context.insert("status", &404);
        context.insert("message", &"<script>alert(1)</script>");
        let html = renderer().render("not_found.html", &context).unwrap();
        assert!(!html.contains("<script>alert(1)"));
    }
}
