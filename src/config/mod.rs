//! Configuration file loading.
//!
//! The configuration is a TOML file, by default
//! `$XDG_CONFIG_HOME/chezmoi/chezmoi.toml`. A missing file yields the
//! defaults. The persistent state database lives next to it.
pub mod toml_loader;
pub mod validation;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use serde::Deserialize;

use crate::encryption::{EncryptionTool, GpgEncryption, NoEncryption};
use crate::platform::home_dir;
use crate::state::DEFAULT_UMASK;
use crate::template::{TemplateEngine, TemplateFuncs, parse_options};

/// Base name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "chezmoi.toml";

/// Base name of the persistent state database.
pub const STATE_FILE_NAME: &str = "chezmoistate.db";

/// Which decryption tool `encrypted_` sources use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionKind {
    /// Sources must not be encrypted.
    #[default]
    None,
    /// Decrypt with gpg.
    Gpg,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TemplateSection {
    options: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GpgSection {
    command: Option<String>,
    args: Vec<String>,
}

/// The configuration file as written.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
struct ConfigFile {
    source_dir: Option<PathBuf>,
    dest_dir: Option<PathBuf>,
    umask: Option<String>,
    format: Option<String>,
    remove: bool,
    data: toml::Table,
    template: TemplateSection,
    encryption: EncryptionKind,
    gpg: GpgSection,
}

/// Resolved configuration with every default applied.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path the configuration was loaded from (whether or not it exists).
    pub config_file: PathBuf,
    /// Directory holding the source state.
    pub source_dir: PathBuf,
    /// Directory the source state is applied to.
    pub dest_dir: PathBuf,
    /// Permission bits masked off every target.
    pub umask: u32,
    /// Output format for `dump` and `data`.
    pub format: String,
    /// Also apply `.chezmoiremove` during `apply`.
    pub remove: bool,
    /// User template data, the highest-priority layer.
    pub data: serde_json::Value,
    /// Options passed to the template engine.
    pub template_options: Vec<String>,
    /// Decryption tool for `encrypted_` sources.
    pub encryption: EncryptionKind,
    /// gpg invocation used when `encryption` is `gpg`.
    pub gpg: GpgEncryption,
}

impl Config {
    /// Load the configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed, the umask is not
    /// octal, or a data key is not an identifier.
    pub fn load(path: &Path) -> Result<Self> {
        let file: ConfigFile = toml_loader::load_config(path)?;
        let umask = file
            .umask
            .as_deref()
            .map(validation::parse_umask)
            .transpose()
            .with_context(|| path.display().to_string())?
            .unwrap_or(DEFAULT_UMASK);
        let data = serde_json::to_value(&file.data)
            .with_context(|| format!("{}: invalid data", path.display()))?;
        validation::validate_data_keys(&data).with_context(|| path.display().to_string())?;
        let gpg_default = GpgEncryption::default();
        Ok(Self {
            config_file: path.to_path_buf(),
            source_dir: file.source_dir.unwrap_or_else(default_source_dir),
            dest_dir: file.dest_dir.unwrap_or_else(home_dir),
            umask,
            format: file.format.unwrap_or_else(|| "json".to_string()),
            remove: file.remove,
            data,
            template_options: file
                .template
                .options
                .unwrap_or_else(|| vec!["missingkey=error".to_string()]),
            encryption: file.encryption,
            gpg: GpgEncryption {
                command: file.gpg.command.unwrap_or(gpg_default.command),
                args: file.gpg.args,
            },
        })
    }

    /// Path of the persistent state database.
    #[must_use]
    pub fn state_file(&self) -> PathBuf {
        self.config_file
            .parent()
            .map_or_else(
                || PathBuf::from(STATE_FILE_NAME),
                |dir| dir.join(STATE_FILE_NAME),
            )
    }

    /// The configured decryption tool.
    #[must_use]
    pub fn encryption_tool(&self) -> Box<dyn EncryptionTool> {
        match self.encryption {
            EncryptionKind::None => Box::new(NoEncryption),
            EncryptionKind::Gpg => Box::new(self.gpg.clone()),
        }
    }

    /// A template engine honouring `template.options`.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown template option.
    pub fn template_engine(&self, funcs: TemplateFuncs) -> Result<TemplateEngine> {
        let undefined = parse_options(&self.template_options)
            .with_context(|| self.config_file.display().to_string())?;
        Ok(TemplateEngine::new(undefined, funcs))
    }
}

/// `$XDG_CONFIG_HOME/chezmoi/chezmoi.toml`, falling back to `~/.config`.
#[must_use]
pub fn default_config_file() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", &[".config"])
        .join("chezmoi")
        .join(CONFIG_FILE_NAME)
}

/// `$XDG_DATA_HOME/chezmoi`, falling back to `~/.local/share`.
#[must_use]
pub fn default_source_dir() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", &[".local", "share"]).join("chezmoi")
}

/// `$<var>`, or `fallback` joined onto the home directory when unset.
pub(crate) fn xdg_dir(var: &str, fallback: &[&str]) -> PathBuf {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map_or_else(
            || fallback.iter().fold(home_dir(), |dir, part| dir.join(part)),
            PathBuf::from,
        )
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn load(contents: &str) -> Result<Config> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, contents).unwrap();
        Config::load(&path)
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.umask, DEFAULT_UMASK);
        assert_eq!(config.format, "json");
        assert!(!config.remove);
        assert_eq!(config.data, json!({}));
        assert_eq!(config.template_options, ["missingkey=error"]);
        assert_eq!(config.encryption, EncryptionKind::None);
        assert_eq!(config.state_file(), dir.path().join(STATE_FILE_NAME));
    }

    #[test]
    fn values_are_read() {
        let config = load(
            r#"
sourceDir = "/src"
destDir = "/dest"
umask = "077"
format = "yaml"
remove = true
encryption = "gpg"

[data]
email = "me@example.com"
[data.work]
enabled = true

[template]
options = ["missingkey=zero"]

[gpg]
command = "gpg2"
args = ["--batch"]
"#,
        )
        .unwrap();
        assert_eq!(config.source_dir, PathBuf::from("/src"));
        assert_eq!(config.dest_dir, PathBuf::from("/dest"));
        assert_eq!(config.umask, 0o077);
        assert_eq!(config.format, "yaml");
        assert!(config.remove);
        assert_eq!(
            config.data,
            json!({"email": "me@example.com", "work": {"enabled": true}})
        );
        assert_eq!(config.template_options, ["missingkey=zero"]);
        assert_eq!(config.gpg.command, "gpg2");
        assert_eq!(config.gpg.args, ["--batch"]);
        assert_eq!(config.encryption, EncryptionKind::Gpg);
    }

    #[test]
    fn invalid_data_key_is_rejected() {
        let err = load("[data]\n\"bad-key\" = 1\n").unwrap_err();
        assert!(format!("{err:#}").contains("data.bad-key: invalid identifier"));
    }

    #[test]
    fn invalid_umask_is_rejected() {
        assert!(load("umask = \"9\"\n").is_err());
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert!(load("sourcedir = \"/x\"\n").is_err());
    }

    #[test]
    fn unknown_template_option_is_rejected() {
        let config = load("[template]\noptions = [\"missingkey=panic\"]\n").unwrap();
        assert!(config.template_engine(TemplateFuncs::new()).is_err());
    }
}
