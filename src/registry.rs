//! Language token to invocation binding resolution.

use crate::config::Config;

/// How to run snippets of one configured language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Name of the `[lang.<name>]` section this binding came from.
    pub section: String,
    pub aliases: Vec<String>,
    pub command: String,
    pub options: Vec<String>,
}

impl Binding {
    pub fn new(
        section: impl Into<String>,
        aliases: &[&str],
        command: impl Into<String>,
        options: &[&str],
    ) -> Self {
        Self {
            section: section.into(),
            aliases: aliases.iter().map(|x| x.to_string()).collect(),
            command: command.into(),
            options: options.iter().map(|x| x.to_string()).collect(),
        }
    }

    /// Case-sensitive exact alias membership.
    pub fn matches(&self, token: &str) -> bool {
        self.aliases.iter().any(|alias| alias == token)
    }
}

/// Something that can tell whether a fence's language token is recognized.
///
/// The registry is the usual implementation; plain token lists are accepted
/// so extraction can be exercised without configuration.
pub trait LanguageSet {
    fn contains(&self, token: &str) -> bool;
}

impl LanguageSet for [&str] {
    fn contains(&self, token: &str) -> bool {
        self.iter().any(|x| *x == token)
    }
}

impl<const N: usize> LanguageSet for [&str; N] {
    fn contains(&self, token: &str) -> bool {
        self.as_slice().contains(&token)
    }
}

/// Bindings in configuration declaration order, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct LanguageRegistry {
    bindings: Vec<Binding>,
}

impl LanguageRegistry {
    pub fn new(bindings: Vec<Binding>) -> Self {
        Self { bindings }
    }

    pub fn from_config(config: &Config) -> Self {
        let bindings = config
            .lang
            .iter()
            .map(|(section, lang)| Binding {
                section: section.clone(),
                aliases: lang.alias_list(),
                command: lang.command.as_deref().unwrap_or_default().trim().to_string(),
                options: lang.option_list(),
            })
            .collect();
        Self { bindings }
    }

    /// First binding, in declaration order, that lists `token` as an alias.
    pub fn resolve(&self, token: &str) -> Option<&Binding> {
        self.bindings.iter().find(|binding| binding.matches(token))
    }

    /// Every alias of every binding, in declaration order.
    pub fn aliases(&self) -> Vec<&str> {
        self.bindings
            .iter()
            .flat_map(|binding| binding.aliases.iter().map(String::as_str))
            .collect()
    }
}

impl LanguageSet for LanguageRegistry {
    fn contains(&self, token: &str) -> bool {
        self.resolve(token).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> LanguageRegistry {
        LanguageRegistry::new(vec![
            Binding::new("python", &["python", "py"], "python3", &["-c"]),
            Binding::new("shell", &["sh", "bash"], "bash", &["-c"]),
            Binding::new("legacy", &["py"], "python2", &["-c"]),
        ])
    }

    #[test]
    fn test_resolve_by_alias() {
        let registry = registry();
        assert_eq!(registry.resolve("bash").unwrap().command, "bash");
        assert_eq!(registry.resolve("python").unwrap().options, vec!["-c"]);
    }

    #[test]
    fn test_first_section_wins_on_overlap() {
        assert_eq!(registry().resolve("py").unwrap().section, "python");
    }

    #[test]
    fn test_resolution_is_case_sensitive() {
        assert!(registry().resolve("Python").is_none());
        assert!(registry().resolve("pyth").is_none());
    }

    #[test]
    fn test_aliases_in_declaration_order() {
        assert_eq!(
            registry().aliases(),
            vec!["python", "py", "sh", "bash", "py"]
        );
    }

    #[test]
    fn test_from_config() {
        let config = Config::from_toml(
            "[lang.python]\naliases = \"python, py\"\ncommand = \" python3 \"\noptions = \"-u -c\"\n",
        )
        .unwrap();
        let registry = LanguageRegistry::from_config(&config);
        let binding = registry.resolve("py").unwrap();
        assert_eq!(binding.section, "python");
        assert_eq!(binding.command, "python3");
        assert_eq!(binding.options, vec!["-u", "-c"]);
    }
}
