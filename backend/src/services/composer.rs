//! Report HTML composition
//!
//! Two passes: the narrative Markdown becomes HTML and its `{{.Name}}`
//! placeholders are replaced by chart fragments, then the result is rendered
//! into the page shell.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use handlebars::Handlebars;
use pulldown_cmark::{html, Event, Options, Parser};
use regex::{Captures, Regex};
use serde_json::json;

use super::charts::ChartSet;
use crate::error::{AppError, AppResult};

const REPORT_TEMPLATE: &str = include_str!("../../templates/report.html.hbs");
const LANDING_TEMPLATE: &str = include_str!("../../templates/landing.html.hbs");

/// Bundle key of the solar animation, relative to `index.html`
pub const ANIMATION_FILE: &str = "sun_72h.gif";

/// Placeholder that embeds the animation
pub const ANIMATION_PLACEHOLDER: &str = "SunGif";

/// Renders narrative + charts into the final page
pub struct ReportComposer {
    templates: Handlebars<'static>,
    /// A paragraph holding nothing but placeholders
    placeholder_row: Regex,
    placeholder: Regex,
}

/// Markdown to HTML; raw HTML in the narrative is escaped as text
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut output = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut output, parser);
    output
}

fn animation_html(has_animation: bool) -> String {
    if has_animation {
        format!(
            r#"<figure class="sun-animation"><img src="{}" alt="Sun over the last 72 hours" loading="lazy"><figcaption>Solar imagery, last 72 hours</figcaption></figure>"#,
            ANIMATION_FILE
        )
    } else {
        String::new()
    }
}

impl ReportComposer {
    pub fn new() -> AppResult<Self> {
        let mut templates = Handlebars::new();
        templates
            .register_template_string("report", REPORT_TEMPLATE)
            .map_err(|e| AppError::Render(format!("report template: {}", e)))?;
        templates
            .register_template_string("landing", LANDING_TEMPLATE)
            .map_err(|e| AppError::Render(format!("landing template: {}", e)))?;

        let placeholder_row = Regex::new(r"<p>((?:\s*\{\{\s*\.\w+\s*\}\}\s*)+)</p>")
            .map_err(|e| AppError::Render(e.to_string()))?;
        let placeholder =
            Regex::new(r"\{\{\s*\.(\w+)\s*\}\}").map_err(|e| AppError::Render(e.to_string()))?;

        Ok(Self {
            templates,
            placeholder_row,
            placeholder,
        })
    }

    /// Replace known placeholders in `content`; unknown ones stay as written
    pub fn substitute(&self, content: &str, fragments: &BTreeMap<String, String>) -> String {
        let inline = |text: &str| -> String {
            self.placeholder
                .replace_all(text, |caps: &Captures| match fragments.get(&caps[1]) {
                    Some(fragment) => fragment.clone(),
                    None => caps[0].to_string(),
                })
                .into_owned()
        };

        let rows = self.placeholder_row.replace_all(content, |caps: &Captures| {
            let names_known = self
                .placeholder
                .captures_iter(&caps[1])
                .any(|name| fragments.contains_key(&name[1]));
            if names_known {
                format!(r#"<div class="chart-row">{}</div>"#, inline(&caps[1]))
            } else {
                caps[0].to_string()
            }
        });
        inline(&rows)
    }

    /// Full `index.html` for one bundle
    pub fn compose(
        &self,
        markdown: &str,
        charts: &ChartSet,
        has_animation: bool,
        generated_at: DateTime<Utc>,
    ) -> AppResult<String> {
        let mut fragments = charts.clone();
        fragments.insert(ANIMATION_PLACEHOLDER.to_string(), animation_html(has_animation));

        let content = self.substitute(&markdown_to_html(markdown), &fragments);
        let data = json!({
            "title": format!("HF Propagation Report {}", generated_at.format("%Y-%m-%d")),
            "version": env!("CARGO_PKG_VERSION"),
            "generated_at": generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            "content": content,
        });

        self.templates
            .render("report", &data)
            .map_err(|e| AppError::Render(e.to_string()))
    }

    /// Page served at `/` when no report can be shown
    pub fn landing_page(&self, reports: &[String]) -> AppResult<String> {
        let data = json!({
            "version": env!("CARGO_PKG_VERSION"),
            "reports": reports,
        });
        self.templates
            .render("landing", &data)
            .map_err(|e| AppError::Render(e.to_string()))
    }
}
