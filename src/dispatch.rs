use crate::error::{Error, SelectionError};
use crate::executor::{ExecutionResult, Executor};
use crate::io_adapters::OutputSink;
use crate::parser::Snippet;
use crate::registry::LanguageRegistry;
use crate::selector::{self, SelectionSpec};
use std::collections::HashMap;
use std::time::Duration;

/// What happened to one selected snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Executed(ExecutionResult),
    /// The snippet's language has no binding; nothing was run.
    Unconfigured,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetOutcome {
    pub name: String,
    pub lang: String,
    pub outcome: Outcome,
}

/// Per-snippet outcomes of one dispatch, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<SnippetOutcome>,
}

impl BatchReport {
    pub fn executed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Executed(_)))
            .count()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(&o.outcome, Outcome::Executed(r) if r.success))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.executed() - self.succeeded()
    }

    pub fn unconfigured(&self) -> usize {
        self.outcomes.len() - self.executed()
    }

    /// True when every selected snippet ran and succeeded.
    pub fn success(&self) -> bool {
        self.failed() == 0 && self.unconfigured() == 0
    }
}

/// Drives selection and sequential execution of snippets.
pub struct Dispatcher<'a> {
    registry: &'a LanguageRegistry,
    executor: &'a dyn Executor,
    overlay: HashMap<String, String>,
    timeout: Option<Duration>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a LanguageRegistry, executor: &'a dyn Executor) -> Self {
        Self {
            registry,
            executor,
            overlay: HashMap::new(),
            timeout: None,
        }
    }

    /// Variables added to every child's environment.
    pub fn with_overlay(mut self, overlay: HashMap<String, String>) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Select snippets for `spec` and run them one after another.
    ///
    /// A name or tag that matches nothing fails before anything runs. After
    /// that, unconfigured languages and failing snippets are reported to
    /// `sink` and counted, and the remaining snippets still run.
    pub fn dispatch(
        &self,
        snippets: &[Snippet],
        spec: &SelectionSpec,
        sink: &mut dyn OutputSink,
    ) -> Result<BatchReport, SelectionError> {
        let selected = selector::select(snippets, spec)?;
        let mut report = BatchReport::default();

        for snippet in selected {
            let outcome = self.run_one(snippet, sink);
            report.outcomes.push(SnippetOutcome {
                name: snippet.name.clone(),
                lang: snippet.lang.clone(),
                outcome,
            });
        }

        tracing::debug!(
            spec = %spec,
            executed = report.executed(),
            failed = report.failed(),
            unconfigured = report.unconfigured(),
            "dispatch finished"
        );
        Ok(report)
    }

    fn run_one(&self, snippet: &Snippet, sink: &mut dyn OutputSink) -> Outcome {
        let binding = match self.registry.resolve(&snippet.lang) {
            Some(binding) if snippet.executable => binding,
            _ => {
                let err = Error::UnresolvedLanguage {
                    lang: snippet.lang.clone(),
                    name: snippet.name.clone(),
                };
                tracing::warn!(error = %err, "configuration error");
                sink.notice(&format!("Error: {}", err));
                return Outcome::Unconfigured;
            }
        };

        let header = match &snippet.tag {
            Some(tag) => format!("> Running: {} ({}) {}", snippet.display_name(), snippet.lang, tag),
            None => format!("> Running: {} ({})", snippet.display_name(), snippet.lang),
        };
        sink.notice(&header);

        let result = self
            .executor
            .execute(binding, &snippet.code, &self.overlay, self.timeout, sink);
        if let Some(failure) = &result.failure {
            sink.notice(&format!("Error: code block '{}' failed: {}", snippet.name, failure));
        }
        Outcome::Executed(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutionFailure;
    use crate::io_adapters::MemSink;
    use crate::registry::Binding;
    use std::cell::RefCell;
    use std::path::PathBuf;

    /// Records what it was asked to run; bodies containing "fail" exit 1.
    #[derive(Default)]
    struct FakeExecutor {
        calls: RefCell<Vec<(String, String)>>,
    }

    impl Executor for FakeExecutor {
        fn execute(
            &self,
            binding: &Binding,
            body: &str,
            _overlay: &HashMap<String, String>,
            _timeout: Option<Duration>,
            sink: &mut dyn OutputSink,
        ) -> ExecutionResult {
            self.calls
                .borrow_mut()
                .push((binding.command.clone(), body.to_string()));
            sink.line(body);
            if body.contains("fail") {
                ExecutionResult {
                    success: false,
                    output: body.to_string(),
                    failure: Some(ExecutionFailure::NonZeroExit { code: 1 }),
                }
            } else {
                ExecutionResult {
                    success: true,
                    output: body.to_string(),
                    failure: None,
                }
            }
        }
    }

    fn snippet(lang: &str, name: &str, tag: Option<&str>, code: &str) -> Snippet {
        Snippet {
            lang: lang.to_string(),
            name: name.to_string(),
            tag: tag.map(str::to_string),
            source: PathBuf::from("doc.md"),
            code: code.to_string(),
            executable: true,
            display: None,
        }
    }

    fn registry() -> LanguageRegistry {
        LanguageRegistry::new(vec![Binding::new("shell", &["sh"], "sh", &["-c"])])
    }

    #[test]
    fn test_tag_filter_runs_only_tagged_snippets() {
        let registry = registry();
        let executor = FakeExecutor::default();
        let snippets = vec![
            snippet("sh", "tagged", Some("ci"), "echo tagged"),
            snippet("sh", "plain", None, "echo plain"),
        ];
        let (mut sink, _) = MemSink::with_handle();

        let report = Dispatcher::new(&registry, &executor)
            .dispatch(&snippets, &SelectionSpec::Tag("ci".into()), &mut sink)
            .unwrap();

        assert_eq!(report.executed(), 1);
        assert_eq!(report.unconfigured(), 0);
        assert!(report.success());
        assert_eq!(*executor.calls.borrow(), vec![("sh".to_string(), "echo tagged".to_string())]);
    }

    #[test]
    fn test_failures_do_not_stop_the_batch() {
        let registry = registry();
        let executor = FakeExecutor::default();
        let snippets = vec![
            snippet("sh", "a", None, "echo a"),
            snippet("sh", "b", None, "please fail"),
            snippet("ruby", "c", None, "puts 1"),
            snippet("sh", "d", None, "echo d"),
        ];
        let (mut sink, handle) = MemSink::with_handle();

        let report = Dispatcher::new(&registry, &executor)
            .dispatch(&snippets, &SelectionSpec::All, &mut sink)
            .unwrap();

        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.executed(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.unconfigured(), 1);
        assert!(!report.success());
        assert_eq!(report.outcomes[2].outcome, Outcome::Unconfigured);
        assert_eq!(executor.calls.borrow().len(), 3);
        assert_eq!(handle.lines(), vec!["echo a", "please fail", "echo d"]);
        assert!(
            handle
                .notices()
                .iter()
                .any(|n| n.contains("language 'ruby' is not configured"))
        );
    }

    #[test]
    fn test_non_executable_snippet_is_not_run() {
        let registry = registry();
        let executor = FakeExecutor::default();
        let mut stale = snippet("sh", "stale", None, "echo");
        stale.executable = false;
        let (mut sink, _) = MemSink::with_handle();

        let report = Dispatcher::new(&registry, &executor)
            .dispatch(&[stale], &SelectionSpec::Name("stale".into()), &mut sink)
            .unwrap();

        assert_eq!(report.unconfigured(), 1);
        assert!(executor.calls.borrow().is_empty());
    }

    #[test]
    fn test_missing_name_runs_nothing() {
        let registry = registry();
        let executor = FakeExecutor::default();
        let snippets = vec![snippet("sh", "hello", None, "echo hi")];
        let (mut sink, _) = MemSink::with_handle();

        let res = Dispatcher::new(&registry, &executor).dispatch(
            &snippets,
            &SelectionSpec::Name("missing".into()),
            &mut sink,
        );

        assert_eq!(res, Err(SelectionError::NameNotFound("missing".into())));
        assert!(executor.calls.borrow().is_empty());
    }

    #[test]
    fn test_all_on_empty_document_succeeds() {
        let registry = registry();
        let executor = FakeExecutor::default();
        let (mut sink, _) = MemSink::with_handle();

        let report = Dispatcher::new(&registry, &executor)
            .dispatch(&[], &SelectionSpec::All, &mut sink)
            .unwrap();

        assert_eq!(report.outcomes.len(), 0);
        assert!(report.success());
    }

    #[test]
    fn test_header_uses_display_name() {
        let registry = registry();
        let executor = FakeExecutor::default();
        let mut s = snippet("sh", "script", Some("ci"), "echo");
        s.display = Some("bash".into());
        let (mut sink, handle) = MemSink::with_handle();

        Dispatcher::new(&registry, &executor)
            .dispatch(&[s], &SelectionSpec::All, &mut sink)
            .unwrap();

        assert_eq!(handle.notices(), vec!["> Running: bash (sh) ci"]);
    }
}
