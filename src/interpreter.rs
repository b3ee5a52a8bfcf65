use crate::cli::{Cli, Command, HistArgs, ListArgs, RunArgs, ShowArgs};
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::document;
use crate::env::{self, RUNENV_FILE, parse_assignments};
use crate::executor::{ExitCode, Executor, ProcessExecutor};
use crate::history::{HistoryStore, Ledger, PROGRAM};
use crate::io_adapters::OutputSink;
use crate::parser::Snippet;
use crate::registry::LanguageRegistry;
use crate::selector::{SelectionSpec, TAG_MARKER};
use anyhow::{Context, bail};
use argh::{EarlyExit, FromArgs};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::{Path, PathBuf};
use std::time::Duration;

const NAME_WIDTH: usize = 30;
const LANG_WIDTH: usize = 15;
const FILE_WIDTH: usize = 40;
const TAG_WIDTH: usize = 15;

/// Front-end that turns command lines into snippet runs.
///
/// The interpreter owns the configuration, the language registry built from
/// it, the history store and the executor used for child processes. All
/// output goes to the [`OutputSink`] passed to each call.
///
/// Example
/// ```no_run
/// use runmd::{Config, HistoryStore, Interpreter, WriterSink};
/// let dir = Config::default_dir().unwrap();
/// let config = Config::load_or_init(&dir.join("config.toml")).unwrap();
/// let sh = Interpreter::new(config, HistoryStore::in_dir(&dir));
/// let code = sh.run(&["list"], "runmd list", &mut WriterSink::stdio()).unwrap();
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    config: Config,
    registry: LanguageRegistry,
    store: HistoryStore,
    executor: Box<dyn Executor>,
    root: PathBuf,
}

impl Interpreter {
    pub fn new(config: Config, store: HistoryStore) -> Self {
        let registry = LanguageRegistry::from_config(&config);
        tracing::debug!(aliases = ?registry.aliases(), "language registry built");
        Self {
            config,
            registry,
            store,
            executor: Box::new(ProcessExecutor::inherited()),
            root: PathBuf::from("."),
        }
    }

    /// Replace the executor used for snippets.
    pub fn with_executor(mut self, executor: Box<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    /// Directory searched for Markdown files when no file is given.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Parse `args` (without the program name) and execute them.
    ///
    /// `command_line` is what gets recorded in the history for `run`.
    pub fn run(
        &self,
        args: &[&str],
        command_line: &str,
        sink: &mut dyn OutputSink,
    ) -> anyhow::Result<ExitCode> {
        let cli = match Cli::from_args(&[PROGRAM], args) {
            Ok(cli) => cli,
            Err(early) => return Ok(print_early_exit(early, sink)),
        };
        if cli.version {
            sink.line(&format!("{} {}", PROGRAM, env!("CARGO_PKG_VERSION")));
            return Ok(0);
        }
        match cli.command {
            Some(command) => self.execute(command, command_line, sink),
            None => match Cli::from_args(&[PROGRAM], &["--help"]) {
                Ok(_) => Ok(0),
                Err(early) => Ok(print_early_exit(early, sink)),
            },
        }
    }

    /// Execute an already parsed command.
    pub fn execute(
        &self,
        command: Command,
        command_line: &str,
        sink: &mut dyn OutputSink,
    ) -> anyhow::Result<ExitCode> {
        match command {
            Command::Run(args) => self.run_blocks(args, command_line, sink),
            Command::Show(args) => Ok(self.show(args, sink)),
            Command::List(args) => Ok(self.list(args, sink)),
            Command::Hist(args) => self.hist(args, sink),
            Command::Shell(args) => {
                self.repl(args.file, sink)?;
                Ok(0)
            }
        }
    }

    /// Snippets of `file`, or of every Markdown file under the root.
    ///
    /// Unreadable documents are reported to `sink` and skipped.
    fn snippets(&self, file: Option<&Path>, sink: &mut dyn OutputSink) -> Vec<Snippet> {
        let paths = match file {
            Some(file) => vec![file.to_path_buf()],
            None => document::discover(&self.root),
        };
        let collection = document::collect(&paths, &self.registry);
        for err in &collection.errors {
            sink.notice(&format!("Error: {}", err));
        }
        collection
            .snippets
            .into_iter()
            .map(Snippet::with_shebang_display)
            .collect()
    }

    fn run_blocks(
        &self,
        args: RunArgs,
        command_line: &str,
        sink: &mut dyn OutputSink,
    ) -> anyhow::Result<ExitCode> {
        let spec = match (&args.tag, &args.blockname) {
            (Some(_), Some(_)) => {
                sink.notice("Error: Give either a code block name or a tag, not both.");
                return Ok(1);
            }
            (Some(tag), None) => SelectionSpec::Tag(tag.trim_start_matches(TAG_MARKER).to_string()),
            (None, Some(name)) => SelectionSpec::parse(name),
            (None, None) => {
                sink.notice("Error: You must provide a code block name or 'all' to run.");
                return Ok(1);
            }
        };
        // Variables given on the command line override the project file.
        let overlay = env::layered(
            env::load_runenv(&self.root.join(RUNENV_FILE))?,
            parse_assignments(&args.env)?,
        );
        let timeout = args
            .timeout
            .map(Duration::from_secs)
            .or_else(|| self.config.timeout());

        let snippets = self.snippets(args.file.as_deref(), sink);
        let dispatcher = Dispatcher::new(&self.registry, self.executor.as_ref())
            .with_overlay(overlay)
            .with_timeout(timeout);

        let success = match dispatcher.dispatch(&snippets, &spec, sink) {
            Ok(report) => {
                if report.outcomes.len() > 1 && !report.success() {
                    sink.notice(&format!(
                        "Error: {} of {} code blocks failed, {} not configured",
                        report.failed(),
                        report.outcomes.len(),
                        report.unconfigured()
                    ));
                }
                report.success()
            }
            Err(err) => {
                sink.notice(&format!("Error: {}", err));
                false
            }
        };

        self.record(command_line, success, sink);
        Ok(if success { 0 } else { 1 })
    }

    /// Append the invocation to the history; failures are reported only.
    fn record(&self, command_line: &str, success: bool, sink: &mut dyn OutputSink) {
        let ledger = self.load_ledger(sink);
        let ledger = ledger.append(command_line, success, self.config.histsize);
        if let Err(err) = self.store.persist(&ledger) {
            tracing::warn!(error = %err, "could not write history");
            sink.notice(&format!("Error: {}", err));
        }
    }

    fn load_ledger(&self, sink: &mut dyn OutputSink) -> Ledger {
        match self.store.load() {
            Ok(ledger) => ledger,
            Err(err) => {
                tracing::warn!(error = %err, "starting with an empty history");
                sink.notice(&format!("Error: {}", err));
                Ledger::default()
            }
        }
    }

    fn show(&self, args: ShowArgs, sink: &mut dyn OutputSink) -> ExitCode {
        let snippets = self.snippets(args.file.as_deref(), sink);
        match crate::selector::select(&snippets, &SelectionSpec::Name(args.blockname)) {
            Ok(selected) => {
                for snippet in selected {
                    let header = match &snippet.tag {
                        Some(tag) => format!("{} ({}) {}", snippet.name, snippet.lang, tag),
                        None => format!("{} ({})", snippet.name, snippet.lang),
                    };
                    sink.notice(&header);
                    for line in snippet.code.lines() {
                        sink.line(&format!("  {}", line));
                    }
                }
                0
            }
            Err(err) => {
                sink.notice(&format!("Error: {}", err));
                1
            }
        }
    }

    fn list(&self, args: ListArgs, sink: &mut dyn OutputSink) -> ExitCode {
        let snippets = self.snippets(args.file.as_deref(), sink);
        let tag = args
            .tag
            .as_deref()
            .map(|tag| tag.trim_start_matches(TAG_MARKER));

        sink.line(&table_row("NAME", "LANG", "FILE", "TAG"));
        sink.line(&"-".repeat(NAME_WIDTH + LANG_WIDTH + FILE_WIDTH + TAG_WIDTH));
        for snippet in &snippets {
            if tag.is_some() && snippet.tag.as_deref() != tag {
                continue;
            }
            let file = snippet.source.display().to_string();
            sink.line(&table_row(
                &snippet.name,
                &snippet.lang,
                &file,
                snippet.tag.as_deref().unwrap_or_default(),
            ));
        }
        0
    }

    fn hist(&self, args: HistArgs, sink: &mut dyn OutputSink) -> anyhow::Result<ExitCode> {
        if args.clear {
            self.store
                .persist(&Ledger::default())
                .context("clearing history")?;
            return Ok(0);
        }

        let ledger = self.load_ledger(sink);
        let Some(id) = args.id else {
            for entry in ledger.entries() {
                sink.line(&entry.to_string());
            }
            return Ok(0);
        };

        let command_line = ledger.command_for(id)?.to_string();
        let Some(words) = shlex::split(&command_line) else {
            bail!("history entry {} is not a valid command line: {}", id, command_line);
        };
        let words: Vec<&str> = words.iter().skip(1).map(String::as_str).collect();
        let cli = match Cli::from_args(&[PROGRAM], &words) {
            Ok(cli) => cli,
            Err(early) => return Ok(print_early_exit(early, sink)),
        };
        match cli.command {
            Some(command @ Command::Run(_)) => {
                tracing::debug!(id, command = %command_line, "replaying history entry");
                self.execute(command, &command_line, sink)
            }
            _ => bail!("history entry {} cannot be replayed: {}", id, command_line),
        }
    }

    /// Interactive loop reading `list`, `run`, `show` and `hist` commands.
    pub fn repl(&self, file: Option<PathBuf>, sink: &mut dyn OutputSink) -> rustyline::Result<()> {
        let mut rl = DefaultEditor::new()?;
        sink.notice(&format!(
            "Welcome to the {} {} shell. Type help for the list of commands.",
            PROGRAM,
            env!("CARGO_PKG_VERSION")
        ));

        loop {
            match rl.readline("runmd> ") {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line)?;
                    if matches!(line, "exit" | "quit") {
                        break;
                    }
                    self.repl_line(line, file.as_deref(), sink);
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err),
            }
        }
        sink.notice("Exiting...");
        Ok(())
    }

    fn repl_line(&self, line: &str, file: Option<&Path>, sink: &mut dyn OutputSink) {
        let Some(words) = shlex::split(line) else {
            sink.notice("Error: unbalanced quotes");
            return;
        };
        let words: Vec<&str> = words.iter().map(String::as_str).collect();
        if words == ["help"] {
            let _ = self.run(&["--help"], line, sink);
            return;
        }
        let mut command = match Cli::from_args(&[PROGRAM], &words) {
            Ok(Cli {
                command: Some(command),
                ..
            }) => command,
            Ok(_) => return,
            Err(early) => {
                print_early_exit(early, sink);
                return;
            }
        };

        // The shell's file applies unless the command names its own.
        match &mut command {
            Command::Run(RunArgs { file: f, .. })
            | Command::Show(ShowArgs { file: f, .. })
            | Command::List(ListArgs { file: f, .. }) => {
                if f.is_none() {
                    *f = file.map(Path::to_path_buf);
                }
            }
            Command::Shell(_) => {
                sink.notice("Error: already in a shell");
                return;
            }
            Command::Hist(_) => {}
        }

        let command_line = format!("{} {}", PROGRAM, line);
        if let Err(err) = self.execute(command, &command_line, sink) {
            sink.notice(&format!("Error: {:#}", err));
        }
    }
}

fn table_row(name: &str, lang: &str, file: &str, tag: &str) -> String {
    format!(
        "{:<NAME_WIDTH$} {:<LANG_WIDTH$} {:<FILE_WIDTH$} {:<TAG_WIDTH$}",
        name, lang, file, tag
    )
    .trim_end()
    .to_string()
}

fn print_early_exit(early: EarlyExit, sink: &mut dyn OutputSink) -> ExitCode {
    match early.status {
        Ok(()) => {
            for line in early.output.lines() {
                sink.line(line);
            }
            0
        }
        Err(()) => {
            for line in early.output.lines() {
                sink.notice(line);
            }
            1
        }
    }
}
