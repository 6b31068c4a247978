//! Compiled askama templates for the bundled site.

use askama::Template;
use async_trait::async_trait;
use axum::http::StatusCode;

use super::TemplateEngine;
use crate::error::RenderError;
use crate::shape::{Entry, Section, ViewModel};

#[derive(Template)]
#[template(path = "item.html")]
struct ItemPage<'a> {
    entry: &'a Entry,
}

#[derive(Template)]
#[template(path = "list.html")]
struct ListPage<'a> {
    entries: &'a [Entry],
}

#[derive(Template)]
#[template(path = "multi.html")]
struct MultiPage<'a> {
    sections: &'a [Section],
}

#[derive(Template)]
#[template(path = "static.html")]
struct StaticPage<'a> {
    resource: &'a str,
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorPage<'a> {
    status: u16,
    reason: &'a str,
}

const TEMPLATES: [&str; 5] = ["item.html", "list.html", "multi.html", "static.html", "error.html"];

/// Template set compiled into the binary.
///
/// Each page template accepts exactly one view shape; handing it another is a
/// render error rather than a partially filled page.
#[derive(Debug, Clone, Copy, Default)]
pub struct SiteTemplates;

impl SiteTemplates {
    pub fn new() -> Self {
        Self
    }
}

fn evaluate(template: &str, page: &impl Template) -> Result<String, RenderError> {
    page.render().map_err(|e| RenderError::Evaluation {
        template: template.to_string(),
        message: e.to_string(),
    })
}

fn wrong_view(template: &str, view: &ViewModel) -> RenderError {
    let kind = match view {
        ViewModel::Item { .. } => "item",
        ViewModel::List { .. } => "list",
        ViewModel::Multi { .. } => "multi",
        ViewModel::Static { .. } => "static",
    };
    RenderError::Evaluation {
        template: template.to_string(),
        message: format!("cannot render a {kind} view"),
    }
}

#[async_trait]
impl TemplateEngine for SiteTemplates {
    async fn render(&self, template: &str, view: &ViewModel) -> Result<String, RenderError> {
        match (template, view) {
            ("item.html", ViewModel::Item { entry }) => evaluate(template, &ItemPage { entry }),
            ("list.html", ViewModel::List { entries }) => evaluate(template, &ListPage { entries }),
            ("multi.html", ViewModel::Multi { sections }) => {
                evaluate(template, &MultiPage { sections })
            }
            ("static.html", ViewModel::Static { resource }) => {
                evaluate(template, &StaticPage { resource })
            }
            (name, view) if self.has_template(name) => Err(wrong_view(name, view)),
            (name, _) => Err(RenderError::MissingTemplate(name.to_string())),
        }
    }

    async fn render_error(&self, template: &str, status: StatusCode) -> Result<String, RenderError> {
        if template != "error.html" {
            return Err(RenderError::MissingTemplate(template.to_string()));
        }
        let page = ErrorPage {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Error"),
        };
        evaluate(template, &page)
    }

    fn has_template(&self, template: &str) -> bool {
        TEMPLATES.contains(&template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn entry(title: &str, body: &str) -> Entry {
        Entry {
            id: None,
            title: title.to_string(),
            body: body.to_string(),
            fields: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_item_page_escapes_title_but_not_body() {
        let view = ViewModel::Item {
            entry: entry("Fish & Chips", "<p>crispy</p>"),
        };
        let html = SiteTemplates::new().render("item.html", &view).await.unwrap();

        assert!(html.contains("Fish &amp; Chips") || html.contains("Fish &#38; Chips"));
        assert!(html.contains("<p>crispy</p>"));
    }

    #[tokio::test]
    async fn test_item_page_shows_byline_only_when_present() {
        let mut with_author = entry("Post", "");
        with_author
            .fields
            .insert("author".into(), serde_json::Value::String("ana".into()));

        let html = SiteTemplates::new()
            .render("item.html", &ViewModel::Item { entry: with_author })
            .await
            .unwrap();
        assert!(html.contains(r#"<p class="byline">ana</p>"#));

        let html = SiteTemplates::new()
            .render("item.html", &ViewModel::Item { entry: entry("Post", "") })
            .await
            .unwrap();
        assert!(!html.contains("byline"));
    }

    #[tokio::test]
    async fn test_list_page_renders_every_entry() {
        let view = ViewModel::List {
            entries: vec![entry("first", ""), entry("second", "")],
        };
        let html = SiteTemplates::new().render("list.html", &view).await.unwrap();

        assert!(html.contains("first"));
        assert!(html.contains("second"));
    }

    #[tokio::test]
    async fn test_multi_page_names_sections() {
        let view = ViewModel::Multi {
            sections: vec![Section {
                name: "latest".into(),
                entries: vec![entry("news", "")],
            }],
        };
        let html = SiteTemplates::new().render("multi.html", &view).await.unwrap();
        assert!(html.contains("latest"));
        assert!(html.contains("news"));
    }

    #[tokio::test]
    async fn test_unknown_template_is_missing() {
        let view = ViewModel::Static {
            resource: "http://cms/api/about/".into(),
        };
        let err = SiteTemplates::new().render("nope.html", &view).await.unwrap_err();
        assert_eq!(err, RenderError::MissingTemplate("nope.html".into()));
    }

    #[tokio::test]
    async fn test_mismatched_view_is_evaluation_error() {
        let view = ViewModel::List { entries: vec![] };
        let err = SiteTemplates::new().render("item.html", &view).await.unwrap_err();
        assert!(matches!(err, RenderError::Evaluation { .. }));
    }

    #[tokio::test]
    async fn test_error_page_shows_status() {
        let html = SiteTemplates::new()
            .render_error("error.html", StatusCode::NOT_FOUND)
            .await
            .unwrap();
        assert!(html.contains("404"));
        assert!(html.contains("Not Found"));
    }
}
