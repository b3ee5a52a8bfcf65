use crate::error::ConfigError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Ledger bound used when the configuration does not set `histsize`.
pub const DEFAULT_HISTSIZE: usize = 100;

/// Environment variable naming the directory used instead of `~/.config/runmd`.
pub const HOME_ENV: &str = "RUNMD_HOME";

/// Configuration written on first start.
pub const DEFAULT_CONFIG: &str = r#"# runmd configuration
histsize = 100

[lang.python]
aliases = "python, python3, py"
command = "python3"
options = "-c"

[lang.shell]
aliases = "sh, bash, shell"
command = "bash"
options = "-c"

[lang.ruby]
aliases = "ruby, rb"
command = "ruby"
options = "-e"

[lang.javascript]
aliases = "javascript, js, node"
command = "node"
options = "-e"

[lang.perl]
aliases = "perl, pl"
command = "perl"
options = "-e"
"#;

/// One `[lang.<name>]` table.
///
/// Every field is optional at the serde level so that [`Config::validate`] can
/// name the missing one instead of surfacing a generic parse error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageSection {
    /// Comma-separated alias list, e.g. `"python, py"`.
    pub aliases: Option<String>,
    /// Executable name or path.
    pub command: Option<String>,
    /// Space-delimited arguments placed between the command and the snippet body.
    pub options: Option<String>,
}

impl LanguageSection {
    pub fn alias_list(&self) -> Vec<String> {
        self.aliases
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|alias| alias.trim().to_string())
            .filter(|alias| !alias.is_empty())
            .collect()
    }

    pub fn option_list(&self) -> Vec<String> {
        self.options
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Maximum number of history entries kept.
    #[serde(default = "default_histsize")]
    pub histsize: usize,

    /// Per-snippet timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Language sections in declaration order.
    #[serde(default)]
    pub lang: IndexMap<String, LanguageSection>,
}

fn default_histsize() -> usize {
    DEFAULT_HISTSIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            histsize: DEFAULT_HISTSIZE,
            timeout: None,
            lang: IndexMap::new(),
        }
    }
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Load config from `path`, writing [`DEFAULT_CONFIG`] there first if the file is missing.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let io_err = |source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            };
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
            std::fs::write(path, DEFAULT_CONFIG).map_err(io_err)?;
            tracing::info!(path = %path.display(), "wrote default configuration");
        }
        Self::load_from(path)
    }

    /// Check that every language section declares usable aliases and a command.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (section, lang) in &self.lang {
            let missing = |field| ConfigError::MissingField {
                section: section.clone(),
                field,
            };
            let aliases = lang.aliases.as_deref().ok_or_else(|| missing("aliases"))?;
            let command = lang.command.as_deref().ok_or_else(|| missing("command"))?;
            if lang.options.is_none() {
                return Err(missing("options"));
            }

            if aliases.split(',').any(|alias| alias.trim().is_empty()) {
                return Err(ConfigError::InvalidAliases {
                    section: section.clone(),
                });
            }
            if command.trim().is_empty() {
                return Err(ConfigError::EmptyCommand {
                    section: section.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    /// `~/.config/runmd`, home of both the configuration and the history file.
    ///
    /// `RUNMD_HOME` overrides the location.
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        if let Some(dir) = std::env::var_os(HOME_ENV).filter(|dir| !dir.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoHome)?;
        Ok(home.join(".config").join("runmd"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.histsize, 100);
        assert_eq!(config.timeout, None);
        assert!(config.lang.contains_key("python"));
    }

    #[test]
    fn test_sections_keep_declaration_order() {
        let text = r#"
[lang.zeta]
aliases = "z"
command = "zeta"
options = ""

[lang.alpha]
aliases = "a"
command = "alpha"
options = ""
"#;
        let config = Config::from_toml(text).unwrap();
        let names: Vec<&str> = config.lang.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_histsize_and_timeout() {
        let config = Config::from_toml("histsize = 5\ntimeout = 3\n").unwrap();
        assert_eq!(config.histsize, 5);
        assert_eq!(config.timeout(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_missing_command_is_reported() {
        let text = "[lang.python]\naliases = \"python\"\noptions = \"-c\"\n";
        match Config::from_toml(text) {
            Err(ConfigError::MissingField { section, field }) => {
                assert_eq!(section, "python");
                assert_eq!(field, "command");
            }
            other => panic!("expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_alias_is_rejected() {
        let text = "[lang.python]\naliases = \"python, \"\ncommand = \"python3\"\noptions = \"\"\n";
        assert!(matches!(
            Config::from_toml(text),
            Err(ConfigError::InvalidAliases { .. })
        ));
    }

    #[test]
    fn test_blank_command_is_rejected() {
        let text = "[lang.python]\naliases = \"python\"\ncommand = \"  \"\noptions = \"\"\n";
        assert!(matches!(
            Config::from_toml(text),
            Err(ConfigError::EmptyCommand { .. })
        ));
    }

    #[test]
    fn test_alias_and_option_lists() {
        let section = LanguageSection {
            aliases: Some(" python ,py".to_string()),
            command: Some("python3".to_string()),
            options: Some("-u   -c".to_string()),
        };
        assert_eq!(section.alias_list(), vec!["python", "py"]);
        assert_eq!(section.option_list(), vec!["-u", "-c"]);
    }

    #[test]
    fn test_load_or_init_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_or_init(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config, Config::from_toml(DEFAULT_CONFIG).unwrap());
    }

    #[test]
    fn test_load_from_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let res = Config::load_from(&dir.path().join("absent.toml"));
        assert!(matches!(res, Err(ConfigError::Io { .. })));
    }
}
