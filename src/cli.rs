//! Command line surface, parsed with [`argh`].

use argh::FromArgs;
use std::path::PathBuf;

#[derive(FromArgs, Debug, PartialEq)]
/// Manage and run code blocks embedded in Markdown files.
pub struct Cli {
    #[argh(switch, short = 'V')]
    /// print version information and exit
    pub version: bool,

    #[argh(subcommand)]
    pub command: Option<Command>,
}

#[derive(FromArgs, Debug, PartialEq)]
#[argh(subcommand)]
pub enum Command {
    Run(RunArgs),
    Show(ShowArgs),
    List(ListArgs),
    Hist(HistArgs),
    Shell(ShellArgs),
}

#[derive(FromArgs, Debug, PartialEq)]
/// Run code blocks from the Markdown files.
#[argh(subcommand, name = "run")]
pub struct RunArgs {
    #[argh(positional)]
    /// name of the code block to run, "all" for every block, or @tag
    pub blockname: Option<String>,

    #[argh(option, short = 'f')]
    /// markdown file to process; defaults to every *.md file below the current directory
    pub file: Option<PathBuf>,

    #[argh(option, short = 't')]
    /// run every code block carrying this tag
    pub tag: Option<String>,

    #[argh(option)]
    /// environment variable passed to the code blocks, as KEY=value (repeatable)
    pub env: Vec<String>,

    #[argh(option)]
    /// seconds after which a running code block is killed
    pub timeout: Option<u64>,
}

#[derive(FromArgs, Debug, PartialEq)]
/// Show the content of a code block.
#[argh(subcommand, name = "show")]
pub struct ShowArgs {
    #[argh(positional)]
    /// name of the code block to show
    pub blockname: String,

    #[argh(option, short = 'f')]
    /// markdown file to process; defaults to every *.md file below the current directory
    pub file: Option<PathBuf>,
}

#[derive(FromArgs, Debug, PartialEq)]
/// List the code blocks found in the Markdown files.
#[argh(subcommand, name = "list")]
pub struct ListArgs {
    #[argh(option, short = 'f')]
    /// markdown file to process; defaults to every *.md file below the current directory
    pub file: Option<PathBuf>,

    #[argh(option, short = 't')]
    /// only list code blocks carrying this tag
    pub tag: Option<String>,
}

#[derive(FromArgs, Debug, PartialEq)]
/// Display, replay or clear the run history.
#[argh(subcommand, name = "hist")]
pub struct HistArgs {
    #[argh(positional)]
    /// id of the history entry to run again
    pub id: Option<u64>,

    #[argh(switch)]
    /// forget every history entry
    pub clear: bool,
}

#[derive(FromArgs, Debug, PartialEq)]
/// Start an interactive shell.
#[argh(subcommand, name = "shell")]
pub struct ShellArgs {
    #[argh(option, short = 'f')]
    /// markdown file to process; defaults to every *.md file below the current directory
    pub file: Option<PathBuf>,
}
