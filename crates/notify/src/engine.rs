//! Template rendering for notification subjects and bodies.
//!
//! Templates use two constructs, applied in this order:
//!
//! 1. `{{#if key}}...{{/if}}` keeps its inner content when `key` maps to a
//!    non-empty value and is removed otherwise.
//! 2. `{{key}}` is replaced by the value of `key`. Unknown keys are left in
//!    the output verbatim.
//!
//! Conditional blocks do not nest. A nested block is matched from the outer
//! open marker to the *first* close marker, so the inner open marker and the
//! outer close marker end up as literal text in the output.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};

use crate::templates::TemplateSet;
use crate::traits::NotificationRequest;

/// Header line placed between the rendered body and the request details.
pub const DETAILS_HEADER: &str = "Details:";

const UNKNOWN: &str = "unknown";

static CONDITIONAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{#if (\w+)\}\}([\s\S]*?)\{\{/if\}\}").expect("conditional pattern is valid")
});

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("placeholder pattern is valid"));

/// Builds subjects and bodies from a shared [`TemplateSet`].
#[derive(Debug, Clone)]
pub struct TemplateEngine {
    templates: Arc<TemplateSet>,
}

impl TemplateEngine {
    pub fn new(templates: Arc<TemplateSet>) -> Self {
        Self { templates }
    }

    /// Render `template` against `data`. Never fails.
    pub fn render(template: &str, data: &HashMap<String, String>) -> String {
        let resolved = CONDITIONAL.replace_all(template, |caps: &Captures| {
            let truthy = data.get(&caps[1]).is_some_and(|v| !v.is_empty());
            if truthy {
                caps[2].to_string()
            } else {
                String::new()
            }
        });

        PLACEHOLDER
            .replace_all(&resolved, |caps: &Captures| {
                data.get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Subject for an event, suffixed with `@<folder>` when the working
    /// directory has a last path segment.
    pub fn build_subject(&self, event_type: &str, cwd: Option<&str>) -> String {
        let base = self.templates.subject_for(event_type);
        match cwd.and_then(folder_name) {
            Some(folder) => format!("{base} @{folder}"),
            None => base.to_string(),
        }
    }

    /// Body for a request, stamped with the current local time.
    pub fn build_body(&self, request: &NotificationRequest) -> String {
        self.build_body_at(request, &current_timestamp())
    }

    fn build_body_at(&self, request: &NotificationRequest, timestamp: &str) -> String {
        let mut body = match self.templates.body_for(&request.event_type) {
            Some(template) => Self::render(template, &body_data(request, timestamp)),
            None => self.templates.defaults.message.clone(),
        };

        if let Some(details) = request.details.as_deref().filter(|d| !d.is_empty()) {
            body.push_str("\n\n");
            body.push_str(DETAILS_HEADER);
            body.push('\n');
            body.push_str(details);
        }
        body
    }
}

fn body_data(request: &NotificationRequest, timestamp: &str) -> HashMap<String, String> {
    let non_empty = |v: Option<&str>| v.filter(|s| !s.is_empty()).map(str::to_string);
    HashMap::from([
        ("timestamp".to_string(), timestamp.to_string()),
        (
            "message".to_string(),
            request.message.clone().unwrap_or_default(),
        ),
        (
            "cwd".to_string(),
            non_empty(request.cwd.as_deref()).unwrap_or_else(|| UNKNOWN.to_string()),
        ),
        (
            "sessionId".to_string(),
            non_empty(Some(request.session_id.as_str())).unwrap_or_else(|| UNKNOWN.to_string()),
        ),
    ])
}

/// Zero-padded 24-hour `HH:MM` in local time.
pub fn current_timestamp() -> String {
    chrono::Local::now().format("%H:%M").to_string()
}

fn folder_name(cwd: &str) -> Option<&str> {
    cwd.rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn engine() -> TemplateEngine {
        TemplateEngine::new(Arc::new(TemplateSet::builtin()))
    }

    #[test]
    fn plain_text_is_unchanged() {
        let t = "No placeholders here, just {braces} and text.";
        assert_eq!(TemplateEngine::render(t, &data(&[("x", "1")])), t);
    }

    #[test]
    fn substitutes_known_keys() {
        let out = TemplateEngine::render("Hi {{name}}, {{name}}!", &data(&[("name", "Ada")]));
        assert_eq!(out, "Hi Ada, Ada!");
    }

    #[test]
    fn unknown_placeholder_passes_through() {
        assert_eq!(TemplateEngine::render("hi {{x}}", &HashMap::new()), "hi {{x}}");
    }

    #[test]
    fn present_but_empty_value_substitutes_empty() {
        assert_eq!(TemplateEngine::render("[{{x}}]", &data(&[("x", "")])), "[]");
    }

    #[test]
    fn conditional_block_truthy_and_falsy() {
        let t = "{{#if message}}> {{message}}\n{{/if}}end";
        assert_eq!(
            TemplateEngine::render(t, &data(&[("message", "hello")])),
            "> hello\nend"
        );
        assert_eq!(TemplateEngine::render(t, &data(&[("message", "")])), "end");
        assert_eq!(TemplateEngine::render(t, &HashMap::new()), "end");
    }

    #[test]
    fn conditional_inner_content_is_exact() {
        let t = "{{#if flag}}  keep\n  spacing  {{/if}}";
        assert_eq!(
            TemplateEngine::render(t, &data(&[("flag", "yes")])),
            "  keep\n  spacing  "
        );
    }

    #[test]
    fn multiple_blocks_are_independent() {
        let t = "{{#if a}}A{{/if}}-{{#if b}}B{{/if}}";
        assert_eq!(TemplateEngine::render(t, &data(&[("a", "1")])), "A-");
    }

    #[test]
    fn nested_blocks_leave_markers_literal() {
        let t = "{{#if a}}X{{#if b}}Y{{/if}}Z{{/if}}";
        assert_eq!(
            TemplateEngine::render(t, &data(&[("a", "1"), ("b", "1")])),
            "X{{#if b}}YZ{{/if}}"
        );
        assert_eq!(TemplateEngine::render(t, &HashMap::new()), "Z{{/if}}");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let out = TemplateEngine::render("{{a}}", &data(&[("a", "{{b}}"), ("b", "nope")]));
        assert_eq!(out, "{{b}}");
    }

    #[test]
    fn subject_gets_folder_suffix() {
        let e = engine();
        assert_eq!(e.build_subject("Stop", Some("/a/b/project")), "Task completed @project");
        assert_eq!(e.build_subject("Stop", Some("")), "Task completed");
        assert_eq!(e.build_subject("Stop", None), "Task completed");
        assert_eq!(e.build_subject("Stop", Some("/a/b/")), "Task completed");
    }

    #[test]
    fn unknown_event_uses_default_subject() {
        assert_eq!(
            engine().build_subject("Mystery", Some("C:\\work\\repo")),
            "Notification @repo"
        );
    }

    #[test]
    fn body_renders_request_fields() {
        let req = NotificationRequest::new("Notification", "s1")
            .with_cwd("/x/y/myproj")
            .with_message("hello");
        let body = engine().build_body_at(&req, "09:05");

        assert!(body.starts_with("Current time is 09:05\n\n> hello\n\n"));
        assert!(body.contains("Working directory: /x/y/myproj"));
        assert!(body.contains("Session ID: s1"));
    }

    #[test]
    fn body_fills_unknowns_and_drops_empty_message_block() {
        let req = NotificationRequest::new("Stop", "");
        let body = engine().build_body_at(&req, "23:59");

        assert!(!body.contains('>'));
        assert!(body.contains("Working directory: unknown"));
        assert!(body.contains("Session ID: unknown"));
    }

    #[test]
    fn details_appended_after_rendering() {
        let req = NotificationRequest::new("Stop", "s1").with_details("exit code {{code}}");
        let body = engine().build_body_at(&req, "10:00");
        assert!(body.ends_with("\n\nDetails:\nexit code {{code}}"));
    }

    #[test]
    fn unknown_event_uses_default_body_plus_details() {
        let mut set = TemplateSet::builtin();
        set.defaults.message = "Something happened.".to_string();
        let e = TemplateEngine::new(Arc::new(set));

        let req = NotificationRequest::new("Mystery", "s1").with_details("more");
        assert_eq!(e.build_body_at(&req, "10:00"), "Something happened.\n\nDetails:\nmore");
    }

    #[test]
    fn timestamp_is_zero_padded_hours_and_minutes() {
        let ts = current_timestamp();
        assert_eq!(ts.len(), 5);
        assert_eq!(&ts[2..3], ":");
        assert!(ts[..2].chars().all(|c| c.is_ascii_digit()));
        assert!(ts[3..].chars().all(|c| c.is_ascii_digit()));
    }
}
