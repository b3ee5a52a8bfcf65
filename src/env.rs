use crate::error::EnvError;
use std::collections::HashMap;
use std::env as stdenv;
use std::path::Path;

/// Project-local variables file, looked up in the directory documents are searched in.
pub const RUNENV_FILE: &str = ".runenv";

/// Snapshot of the variables a snippet process will see.
///
/// Built from a copy of the process environment; overlays produce a new
/// `Environment` and never touch the process environment or the original map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the current process environment.
    ///
    /// Variables whose name or value is not valid unicode are left out.
    pub fn inherited() -> Self {
        let vars = stdenv::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Copy of `self` with `overlay` applied on top; overlay values win.
    pub fn with_overlay(&self, overlay: &HashMap<String, String>) -> Self {
        let mut merged = self.clone();
        for (key, val) in overlay {
            merged.set_var(key.clone(), val.clone());
        }
        merged
    }
}

/// Parse `KEY=value` assignments as given on the command line.
///
/// Only the first `=` separates key and value, so values may contain `=`.
pub fn parse_assignments<S: AsRef<str>>(items: &[S]) -> Result<HashMap<String, String>, EnvError> {
    let mut vars = HashMap::new();
    for item in items {
        let item = item.as_ref();
        match item.split_once('=') {
            Some((key, val)) if !key.is_empty() => {
                vars.insert(key.to_string(), val.to_string());
            }
            _ => return Err(EnvError::Malformed(item.to_string())),
        }
    }
    Ok(vars)
}

/// Read a dotenv file without touching the process environment.
///
/// A missing file yields no variables.
pub fn load_runenv(path: &Path) -> Result<HashMap<String, String>, EnvError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let err = |source| EnvError::Runenv {
        path: path.to_path_buf(),
        source,
    };
    let vars = dotenvy::from_path_iter(path)
        .map_err(err)?
        .map(|item| item.map_err(err))
        .collect::<Result<HashMap<_, _>, _>>()?;
    tracing::debug!(path = %path.display(), count = vars.len(), "loaded project variables");
    Ok(vars)
}

/// `top` on top of `base`; keys in both take the value from `top`.
pub fn layered(mut base: HashMap<String, String>, top: HashMap<String, String>) -> HashMap<String, String> {
    base.extend(top);
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_set_and_get_var() {
        let mut env = Environment::default();

        // initially absent
        assert_eq!(env.get_var("SOME_RANDOM_ENV_VAR_12345"), None);

        env.set_var("KEY", "VALUE");

        assert_eq!(env.get_var("KEY"), Some("VALUE"));
    }

    #[test]
    fn test_env_reads_from_process_env() {
        let env = Environment::inherited();
        assert!(env.get_var("PATH").is_some());
    }

    #[test]
    fn test_overlay_wins_and_leaves_original_untouched() {
        let mut base = Environment::default();
        base.set_var("KEEP", "1");
        base.set_var("SHARED", "base");

        let overlay = HashMap::from([
            ("SHARED".to_string(), "overlay".to_string()),
            ("NEW".to_string(), "2".to_string()),
        ]);
        let merged = base.with_overlay(&overlay);

        assert_eq!(merged.get_var("KEEP"), Some("1"));
        assert_eq!(merged.get_var("SHARED"), Some("overlay"));
        assert_eq!(merged.get_var("NEW"), Some("2"));
        assert_eq!(base.get_var("SHARED"), Some("base"));
        assert_eq!(base.get_var("NEW"), None);
    }

    #[test]
    fn test_parse_assignments() {
        let vars = parse_assignments(&["A=1", "URL=http://x?a=b", "EMPTY="]).unwrap();
        assert_eq!(vars["A"], "1");
        assert_eq!(vars["URL"], "http://x?a=b");
        assert_eq!(vars["EMPTY"], "");

        assert!(matches!(
            parse_assignments(&["NOEQUALS"]),
            Err(EnvError::Malformed(item)) if item == "NOEQUALS"
        ));
        assert!(parse_assignments(&["=value"]).is_err());
    }

    #[test]
    fn test_load_runenv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RUNENV_FILE);
        std::fs::write(
            &path,
            "# project defaults\nVAR1=value1\nexport VAR2=\"two words\"\nURL=http://x?a=b\n",
        )
        .unwrap();

        let vars = load_runenv(&path).unwrap();

        assert_eq!(vars.len(), 3);
        assert_eq!(vars["VAR1"], "value1");
        assert_eq!(vars["VAR2"], "two words");
        assert_eq!(vars["URL"], "http://x?a=b");
    }

    #[test]
    fn test_missing_runenv_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_runenv(&dir.path().join(RUNENV_FILE)).unwrap().is_empty());
    }

    #[test]
    fn test_broken_runenv_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RUNENV_FILE);
        std::fs::write(&path, "GOOD=1\nBAD=\"unterminated\n").unwrap();
        assert!(matches!(load_runenv(&path), Err(EnvError::Runenv { .. })));
    }

    #[test]
    fn test_command_line_wins_over_runenv() {
        let runenv = HashMap::from([
            ("VAR1".to_string(), "file".to_string()),
            ("VAR2".to_string(), "file".to_string()),
        ]);
        let cli = parse_assignments(&["VAR2=cli", "VAR3=cli"]).unwrap();

        let merged = layered(runenv, cli);

        assert_eq!(merged["VAR1"], "file");
        assert_eq!(merged["VAR2"], "cli");
        assert_eq!(merged["VAR3"], "cli");
    }
}
