//! Cascading configuration resolution.
//!
//! Sources, highest priority first: process environment, the project
//! settings file, the user-global settings file, built-in defaults. Each
//! source is parsed into a [`ConfigLayer`] of optional values; layers are
//! merged field by field so a lower source only fills gaps.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::config::*;
use crate::error::ConfigError;

/// Keys recognized in settings files and the environment.
pub const SETTINGS_KEYS: &[&str] = &[
    "SMTP_HOST",
    "SMTP_PORT",
    "SMTP_SECURE",
    "SMTP_USER",
    "SMTP_PASS",
    "FROM_EMAIL",
    "TO_EMAIL",
    "SUBJECT_PREFIX",
    "TEMPLATE_LANGUAGE",
    "TEMPLATE_DIR",
    "RETRY_ATTEMPTS",
    "RETRY_DELAY",
    "TIMEOUT",
];

pub const PROJECT_SETTINGS_FILE: &str = ".hookmail.env";
pub const GLOBAL_SETTINGS_FILE: &str = "hookmail.env";

/// Files whose presence marks a project root.
const PROJECT_MARKERS: &[&str] = &[PROJECT_SETTINGS_FILE, ".git"];

const PLACEHOLDER_SETTINGS: &str = "\
# hookmail settings. Uncomment and fill in the values below.
#
# SMTP_HOST=smtp.example.com
# SMTP_PORT=587
# SMTP_SECURE=false
# SMTP_USER=you@example.com
# SMTP_PASS=app-password
# FROM_EMAIL=you@example.com
# TO_EMAIL=you@example.com
# SUBJECT_PREFIX=[Notice]
# TEMPLATE_LANGUAGE=en
# RETRY_ATTEMPTS=3
# RETRY_DELAY=1000
# TIMEOUT=10000
";

// ── Layers ────────────────────────────────────────────────────

/// One source's worth of settings; `None` means "not defined here".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigLayer {
    pub smtp: SmtpLayer,
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject_prefix: Option<String>,
    pub language: Option<String>,
    pub template_dir: Option<PathBuf>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmtpLayer {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub secure: Option<bool>,
    pub auth: AuthLayer,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthLayer {
    pub user: Option<String>,
    pub pass: Option<String>,
}

impl ConfigLayer {
    /// Build a layer from `KEY=value` pairs. Blank values count as undefined;
    /// values that fail to parse are logged and dropped. `SMTP_PASS` is kept
    /// exactly as given, every other value is trimmed.
    pub fn from_pairs<I, K, V>(source: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut layer = Self::default();
        for (key, value) in pairs {
            let key = key.as_ref();
            let raw = value.as_ref();
            let value = raw.trim();
            if value.is_empty() {
                continue;
            }
            match key {
                "SMTP_HOST" => layer.smtp.host = Some(value.to_string()),
                "SMTP_PORT" => layer.smtp.port = parse_setting(source, key, value),
                "SMTP_SECURE" => layer.smtp.secure = parse_bool(source, key, value),
                "SMTP_USER" => layer.smtp.auth.user = Some(value.to_string()),
                "SMTP_PASS" => layer.smtp.auth.pass = Some(raw.to_string()),
                "FROM_EMAIL" => layer.from = Some(value.to_string()),
                "TO_EMAIL" => layer.to = Some(value.to_string()),
                "SUBJECT_PREFIX" => layer.subject_prefix = Some(value.to_string()),
                "TEMPLATE_LANGUAGE" => layer.language = Some(value.to_string()),
                "TEMPLATE_DIR" => layer.template_dir = Some(PathBuf::from(value)),
                "RETRY_ATTEMPTS" => layer.retry_attempts = parse_setting(source, key, value),
                "RETRY_DELAY" => layer.retry_delay_ms = parse_setting(source, key, value),
                "TIMEOUT" => layer.timeout_ms = parse_setting(source, key, value),
                _ => {}
            }
        }
        layer
    }

    /// Parse a `KEY=value` settings file (see [`parse_settings`]).
    ///
    /// A missing, unreadable or malformed file yields an empty layer; the
    /// problem is logged, never returned.
    pub fn from_file(path: &Path) -> Self {
        if !path.is_file() {
            return Self::default();
        }
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read settings file, ignoring it");
                return Self::default();
            }
        };
        match parse_settings(&contents) {
            Ok(pairs) => Self::from_pairs(&path.display().to_string(), pairs),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed settings file, ignoring it");
                Self::default()
            }
        }
    }

    /// Merge with a lower-priority layer: values already set here win.
    pub fn or(self, lower: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            smtp: self.smtp.or(lower.smtp),
            from: self.from.or(lower.from),
            to: self.to.or(lower.to),
            subject_prefix: self.subject_prefix.or(lower.subject_prefix),
            language: self.language.or(lower.language),
            template_dir: self.template_dir.or(lower.template_dir),
            retry_attempts: self.retry_attempts.or(lower.retry_attempts),
            retry_delay_ms: self.retry_delay_ms.or(lower.retry_delay_ms),
            timeout_ms: self.timeout_ms.or(lower.timeout_ms),
        }
    }

    /// Fill the remaining gaps with built-in defaults.
    pub fn finish(self) -> Configuration {
        Configuration {
            smtp: SmtpConfig {
                host: self.smtp.host.unwrap_or_default(),
                port: self.smtp.port.unwrap_or(DEFAULT_SMTP_PORT),
                secure: self.smtp.secure.unwrap_or(false),
                auth: SmtpAuth {
                    user: self.smtp.auth.user.unwrap_or_default(),
                    pass: self.smtp.auth.pass.unwrap_or_default(),
                },
            },
            from: self.from.unwrap_or_default(),
            to: self.to.unwrap_or_default(),
            subject_prefix: self
                .subject_prefix
                .unwrap_or_else(|| DEFAULT_SUBJECT_PREFIX.to_string()),
            language: self.language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            template_dir: self.template_dir,
            retry_attempts: self.retry_attempts.unwrap_or(DEFAULT_RETRY_ATTEMPTS).max(1),
            retry_delay_ms: self.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS),
            timeout_ms: self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl SmtpLayer {
    fn or(self, lower: SmtpLayer) -> SmtpLayer {
        SmtpLayer {
            host: self.host.or(lower.host),
            port: self.port.or(lower.port),
            secure: self.secure.or(lower.secure),
            auth: AuthLayer {
                user: self.auth.user.or(lower.auth.user),
                pass: self.auth.pass.or(lower.auth.pass),
            },
        }
    }
}

/// Split settings text into `(key, value)` pairs.
///
/// Values are taken literally: no `$VAR` expansion and no escape sequences.
/// Blank lines and `#` comments are skipped, an `export ` prefix is allowed,
/// and one pair of matching quotes around a value is removed. Any other line
/// without a `KEY=` part makes the whole text invalid.
pub fn parse_settings(contents: &str) -> Result<Vec<(String, String)>, ConfigError> {
    let mut pairs = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let malformed = ConfigError::MalformedSettings { line: idx + 1 };
        let Some((key, value)) = line.split_once('=') else {
            return Err(malformed);
        };
        let key = key.trim();
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(malformed);
        }
        pairs.push((key.to_string(), unquote(value.trim()).to_string()));
    }
    Ok(pairs)
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .into_iter()
        .find_map(|q| value.strip_prefix(q)?.strip_suffix(q))
        .unwrap_or(value)
}

fn recognized_env() -> Vec<(String, String)> {
    std::env::vars()
        .filter(|(k, _)| SETTINGS_KEYS.contains(&k.as_str()))
        .collect()
}

fn parse_setting<T: FromStr>(source: &str, key: &str, value: &str) -> Option<T> {
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(source, key, value, "unparseable setting, ignoring it");
            None
        }
    }
}

fn parse_bool(source: &str, key: &str, value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => {
            warn!(source, key, value, "unparseable boolean setting, ignoring it");
            None
        }
    }
}

// ── Resolver ──────────────────────────────────────────────────

/// Locates the settings sources and merges them into a [`Configuration`].
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    cwd: PathBuf,
    global_path: PathBuf,
    env: HashMap<String, String>,
}

impl ConfigResolver {
    /// Resolver with an empty environment; see [`ConfigResolver::with_env`].
    pub fn new(cwd: impl Into<PathBuf>, global_path: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            global_path: global_path.into(),
            env: HashMap::new(),
        }
    }

    /// Resolver for the running process: current directory, the user config
    /// directory and the recognized environment variables.
    pub fn from_process() -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir()?;
        let global_path = Self::default_global_dir()?.join(GLOBAL_SETTINGS_FILE);
        Ok(Self::new(cwd, global_path).with_env(recognized_env()))
    }

    pub fn with_env<I, K, V>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = env.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    /// `~/.config/hookmail` (platform equivalent).
    pub fn default_global_dir() -> Result<PathBuf, ConfigError> {
        Ok(dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("hookmail"))
    }

    /// Settings file of the project containing the working directory.
    pub fn project_path(&self) -> PathBuf {
        find_project_root(&self.cwd).join(PROJECT_SETTINGS_FILE)
    }

    /// Merge all sources.
    ///
    /// When neither settings file exists a commented placeholder is written
    /// to the global location and [`ConfigError::TemplateWritten`] returned,
    /// so nothing is ever sent with unset credentials.
    pub fn resolve(&self) -> Result<Configuration, ConfigError> {
        let project_path = self.project_path();
        if !project_path.is_file() && !self.global_path.is_file() {
            self.write_placeholder()?;
            return Err(ConfigError::TemplateWritten {
                path: self.global_path.clone(),
            });
        }

        debug!(project = %project_path.display(), global = %self.global_path.display(), "resolving configuration");
        let merged = ConfigLayer::from_pairs("environment", &self.env)
            .or(ConfigLayer::from_file(&project_path))
            .or(ConfigLayer::from_file(&self.global_path));
        Ok(merged.finish())
    }

    fn write_placeholder(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.global_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.global_path, PLACEHOLDER_SETTINGS)?;
        info!(path = %self.global_path.display(), "wrote placeholder settings file");
        Ok(())
    }
}

/// Walk upward from `start` to the first directory holding a project marker,
/// falling back to `start` itself.
pub fn find_project_root(start: &Path) -> PathBuf {
    start
        .ancestors()
        .find(|dir| PROJECT_MARKERS.iter().any(|m| dir.join(m).exists()))
        .unwrap_or(start)
        .to_path_buf()
}
