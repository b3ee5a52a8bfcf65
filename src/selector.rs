use crate::error::SelectionError;
use crate::parser::Snippet;
use std::fmt;

/// Marks a selection string as a tag filter, as in `@ci`.
pub const TAG_MARKER: char = '@';

/// Selects every snippet.
pub const ALL: &str = "all";

/// Which snippets an invocation targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionSpec {
    /// The first snippet with this exact name.
    Name(String),
    /// Every snippet, in scan order.
    All,
    /// Every snippet carrying this tag.
    Tag(String),
}

impl SelectionSpec {
    /// `all` selects everything, `@value` filters by tag, anything else is a name.
    pub fn parse(text: &str) -> Self {
        if text == ALL {
            Self::All
        } else if let Some(tag) = text.strip_prefix(TAG_MARKER) {
            Self::Tag(tag.to_string())
        } else {
            Self::Name(text.to_string())
        }
    }

    fn not_found(&self) -> Option<SelectionError> {
        match self {
            Self::Name(name) => Some(SelectionError::NameNotFound(name.clone())),
            Self::Tag(tag) => Some(SelectionError::TagNotFound(tag.clone())),
            Self::All => None,
        }
    }
}

impl fmt::Display for SelectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{}", name),
            Self::All => write!(f, "{}", ALL),
            Self::Tag(tag) => write!(f, "{}{}", TAG_MARKER, tag),
        }
    }
}

/// Compute the snippets targeted by `spec`, preserving scan order.
///
/// Duplicate names resolve to the first occurrence. An empty result for a
/// name or tag is an error; for [`SelectionSpec::All`] it is not.
pub fn select<'a>(
    snippets: &'a [Snippet],
    spec: &SelectionSpec,
) -> Result<Vec<&'a Snippet>, SelectionError> {
    let selected: Vec<&Snippet> = match spec {
        SelectionSpec::Name(name) => snippets.iter().find(|s| &s.name == name).into_iter().collect(),
        SelectionSpec::All => snippets.iter().collect(),
        SelectionSpec::Tag(tag) => snippets
            .iter()
            .filter(|s| s.tag.as_deref() == Some(tag.as_str()))
            .collect(),
    };

    match spec.not_found() {
        Some(err) if selected.is_empty() => Err(err),
        _ => Ok(selected),
    }
}
