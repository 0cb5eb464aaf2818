//! Per-language template sets with a fallback chain.
//!
//! Template files are YAML documents named `templates.<lang>.yaml` with three
//! top-level mappings: `subjects`, `content` and `defaults`. The files under
//! `config/templates` are compiled in and used for any language the template
//! directory has no file for.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const FALLBACK_LANGUAGE: &str = "en";

/// Subject and body templates keyed by event type. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSet {
    #[serde(default)]
    pub subjects: HashMap<String, String>,
    #[serde(default)]
    pub content: HashMap<String, String>,
    pub defaults: TemplateDefaults,
}

/// Used when an event type has no entry of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDefaults {
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

const BUNDLED: &[(&str, &str)] = &[
    ("en", include_str!("../../../config/templates/templates.en.yaml")),
    ("zh-CN", include_str!("../../../config/templates/templates.zh-CN.yaml")),
];

const BUILTIN_BODY_ATTENTION: &str = "Current time is {{timestamp}}\n\n\
{{#if message}}> {{message}}\n\n{{/if}}\
Working directory: {{cwd}}\nSession ID: {{sessionId}}\n\n\
Please open the terminal for details.";

const BUILTIN_BODY_DONE: &str = "Current time is {{timestamp}}\n\n\
{{#if message}}> {{message}}\n\n{{/if}}\
Working directory: {{cwd}}\nSession ID: {{sessionId}}\n\n\
Please check the terminal for details.";

impl TemplateSet {
    /// The in-process set used when no template file can be loaded.
    pub fn builtin() -> Self {
        let subjects = [
            ("Notification", "Your attention needed"),
            ("Stop", "Task completed"),
            ("SubagentStop", "Subtask completed"),
        ];
        let content = [
            ("Notification", BUILTIN_BODY_ATTENTION),
            ("Stop", BUILTIN_BODY_DONE),
            ("SubagentStop", BUILTIN_BODY_DONE),
        ];
        Self {
            subjects: subjects
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            content: content
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            defaults: TemplateDefaults {
                subject: "Notification".to_string(),
                message: String::new(),
            },
        }
    }

    /// The compiled-in set for `language`, if one ships with the binary.
    pub fn bundled(language: &str) -> Option<Self> {
        let (_, raw) = BUNDLED.iter().find(|(lang, _)| *lang == language)?;
        match serde_yaml::from_str(raw) {
            Ok(set) => Some(set),
            Err(e) => {
                warn!(language, error = %e, "bundled templates do not parse");
                None
            }
        }
    }

    /// Base subject for an event, or the default subject.
    pub fn subject_for(&self, event_type: &str) -> &str {
        self.subjects
            .get(event_type)
            .unwrap_or(&self.defaults.subject)
    }

    /// Body template for an event, if it has one.
    pub fn body_for(&self, event_type: &str) -> Option<&str> {
        self.content.get(event_type).map(String::as_str)
    }
}

/// Errors reading a single template file. Never escapes [`TemplateStore::load`].
#[derive(Debug, thiserror::Error)]
pub enum TemplateLoadError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Loads template sets from a directory of YAML files, backed by the
/// compiled-in sets.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
    bundled: bool,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            bundled: true,
        }
    }

    #[cfg(test)]
    fn dir_only(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            bundled: false,
        }
    }

    pub fn file_path(&self, language: &str) -> PathBuf {
        self.dir.join(format!("templates.{language}.yaml"))
    }

    /// Read and parse the file for one language, without fallback.
    pub fn load_file(&self, language: &str) -> Result<TemplateSet, TemplateLoadError> {
        let path = self.file_path(language);
        let raw = std::fs::read_to_string(&path).map_err(|source| TemplateLoadError::Io {
            path: path.clone(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| TemplateLoadError::Parse { path, source })
    }

    /// Load the set for `language`, falling back to English and then to the
    /// built-in set. For each language a file in the directory wins over the
    /// compiled-in copy. Always returns something usable.
    pub fn load(&self, language: &str) -> TemplateSet {
        if let Some(set) = self.load_language(language) {
            return set;
        }

        if language != FALLBACK_LANGUAGE {
            if let Some(set) = self.load_language(FALLBACK_LANGUAGE) {
                warn!(language, "no templates for language, falling back to English");
                return set;
            }
        }

        warn!(language, "falling back to built-in templates");
        TemplateSet::builtin()
    }

    fn load_language(&self, language: &str) -> Option<TemplateSet> {
        match self.load_file(language) {
            Ok(set) => {
                debug!(language, "loaded templates");
                return Some(set);
            }
            Err(TemplateLoadError::Io { ref source, .. }) if source.kind() == ErrorKind::NotFound => {
                debug!(language, dir = %self.dir.display(), "no template file for language");
            }
            Err(e) => warn!(language, error = %e, "cannot load templates for language"),
        }

        if !self.bundled {
            return None;
        }
        let set = TemplateSet::bundled(language);
        if set.is_some() {
            debug!(language, "using bundled templates");
        }
        set
    }
}
