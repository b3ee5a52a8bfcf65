//! Extraction of named code blocks from Markdown text.
//!
//! A code block is recognized when it looks like this:
//!
//! ````text
//! ```python {name=hello, tag=demo}
//! print("hi")
//! ```
//! ````
//!
//! The language token must be known to the supplied [`LanguageSet`], the
//! metadata block must carry a non-empty `name` and may carry a `tag`. Anything
//! else that starts with three backticks is skipped without complaint.

use crate::registry::LanguageSet;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const FENCE: &str = "```";

/// A code block extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    /// Language token as written after the opening fence.
    pub lang: String,
    pub name: String,
    pub tag: Option<String>,
    /// Document the snippet was found in.
    pub source: PathBuf,
    /// Body with surrounding whitespace trimmed.
    pub code: String,
    /// Whether the language token resolved when the snippet was extracted.
    pub executable: bool,
    /// Interpreter detected from a shebang line, shown instead of the name.
    pub display: Option<String>,
}

impl Snippet {
    /// Name to show to users, the shebang interpreter when one was detected.
    pub fn display_name(&self) -> &str {
        self.display.as_deref().unwrap_or(&self.name)
    }

    /// Return a copy whose display name is the interpreter named by the body's shebang line.
    ///
    /// Selection keeps using [`Snippet::name`].
    pub fn with_shebang_display(self) -> Self {
        match detect_shebang(&self.code) {
            Some(interpreter) => Self {
                display: Some(interpreter),
                ..self
            },
            None => self,
        }
    }
}

static SHEBANG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#!(?:/usr/bin/env )?(\S+)").expect("shebang pattern is valid")
});

/// Interpreter named by the first line of `body`, if it is a shebang.
pub fn detect_shebang(body: &str) -> Option<String> {
    let first = body.lines().next()?;
    SHEBANG
        .captures(first)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Header of a fence: everything between the opening backticks and the newline.
#[derive(Debug, PartialEq, Eq)]
struct Header<'a> {
    lang: &'a str,
    name: &'a str,
    tag: Option<&'a str>,
}

struct Scanner<'a, L: ?Sized> {
    text: &'a str,
    pos: usize,
    languages: &'a L,
}

impl<'a, L: LanguageSet + ?Sized> Scanner<'a, L> {
    fn new(text: &'a str, languages: &'a L) -> Self {
        Self {
            text,
            pos: 0,
            languages,
        }
    }

    /// Find the next well-formed block, skipping any malformed fences on the way.
    ///
    /// Returns the header and the raw body.
    fn next_block(&mut self) -> Option<(Header<'a>, &'a str)> {
        loop {
            let open = self.pos + self.text[self.pos..].find(FENCE)?;
            let after = open + FENCE.len();

            let parsed = self.parse_header(after);
            let Some((header, body_start)) = parsed else {
                self.pos = after;
                continue;
            };

            let Some(close) = self.text[body_start..].find(FENCE) else {
                // No closing fence for this block; later openings might still close.
                self.pos = after;
                continue;
            };
            let close = body_start + close;
            self.pos = close + FENCE.len();
            return Some((header, &self.text[body_start..close]));
        }
    }

    /// Parse `lang {name=..[, tag=..]}` followed by the end of the line.
    ///
    /// Returns the header and the offset where the body starts.
    fn parse_header(&self, start: usize) -> Option<(Header<'a>, usize)> {
        let line_end = self.text[start..]
            .find('\n')
            .map(|i| start + i)
            .unwrap_or(self.text.len());
        let line = &self.text[start..line_end];

        let (lang, rest) = line.split_once(' ')?;
        if lang.is_empty() || !self.languages.contains(lang) {
            return None;
        }

        let rest = rest.strip_prefix("{name=")?;
        let close = rest.find('}')?;
        let (name, tag) = split_metadata(&rest[..close]);
        if name.is_empty() {
            return None;
        }
        if matches!(tag, Some("")) {
            return None;
        }
        if !rest[close + 1..].trim().is_empty() {
            return None;
        }

        // A header on the last line has no body and cannot be closed.
        if line_end == self.text.len() {
            return None;
        }

        Some((Header { lang, name, tag }, line_end + 1))
    }
}

/// Split `name[, tag=value]` into trimmed parts.
///
/// Commas that are not followed by `tag=` belong to the name.
fn split_metadata(inner: &str) -> (&str, Option<&str>) {
    for (idx, _) in inner.match_indices(',') {
        if let Some(tag) = inner[idx + 1..].trim_start().strip_prefix("tag=") {
            return (inner[..idx].trim(), Some(tag.trim()));
        }
    }
    (inner.trim(), None)
}

/// Extract every well-formed code block of `text`, in document order.
///
/// `source` is recorded on each snippet. A snippet is marked executable when
/// `languages` contains its token, which always holds for blocks found here;
/// dispatching against a narrower registry re-checks it.
pub fn extract<L: LanguageSet + ?Sized>(text: &str, source: &Path, languages: &L) -> Vec<Snippet> {
    let mut scanner = Scanner::new(text, languages);
    let mut snippets = Vec::new();
    while let Some((header, body)) = scanner.next_block() {
        snippets.push(Snippet {
            lang: header.lang.to_string(),
            name: header.name.to_string(),
            tag: header.tag.map(str::to_string),
            source: source.to_path_buf(),
            code: body.trim().to_string(),
            executable: languages.contains(header.lang),
            display: None,
        });
    }
    tracing::debug!(source = %source.display(), count = snippets.len(), "extracted code blocks");
    snippets
}
