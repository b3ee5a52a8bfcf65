use runmd::{Config, HistoryStore, Interpreter, WriterSink};
use tracing_subscriber::EnvFilter;

/// Variable holding the log filter, e.g. `RUNMD_LOG=debug`.
const LOG_ENV: &str = "RUNMD_LOG";

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn try_main() -> anyhow::Result<i32> {
    let dir = Config::default_dir()?;
    let config = Config::load_or_init(&dir.join("config.toml"))?;
    tracing::debug!(dir = %dir.display(), languages = config.lang.len(), "configuration loaded");
    let interpreter = Interpreter::new(config, HistoryStore::in_dir(&dir));

    let argv: Vec<String> = std::env::args().collect();
    let args: Vec<&str> = argv.iter().skip(1).map(String::as_str).collect();
    let command_line = shlex::try_join(argv.iter().map(String::as_str)).unwrap_or_else(|_| argv.join(" "));
    interpreter.run(&args, &command_line, &mut WriterSink::stdio())
}

fn main() -> std::process::ExitCode {
    init_logging();
    match try_main() {
        Ok(code) => std::process::ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            std::process::ExitCode::FAILURE
        }
    }
}
