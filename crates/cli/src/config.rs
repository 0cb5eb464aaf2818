use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hookmail_core::{ConfigResolver, Configuration};
use tracing::debug;

/// Resolve the template directory.
/// Priority: cli_override > TEMPLATE_DIR setting > `<config dir>/hookmail/templates`.
pub fn resolve_template_dir(config: &Configuration, cli_override: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = cli_override {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = &config.template_dir {
        return Ok(dir.clone());
    }
    let dir = ConfigResolver::default_global_dir()
        .context("could not determine user config directory")?
        .join("templates");
    debug!(dir = %dir.display(), "using default template directory");
    Ok(dir)
}
