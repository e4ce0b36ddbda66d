//! Load settings shared by every stage of the pipeline.

/// Default name shown in diagnostics when the caller gives none.
pub const DEFAULT_LABEL: &str = "reader";

/// Options controlling how a stream is loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadSettings {
    /// Source name used in error messages.
    pub label: String,
    /// Emit comment tokens from the scanner instead of skipping them.
    pub parse_comments: bool,
    /// How many aliases to sequences or mappings one document may hold.
    pub max_aliases_for_collections: usize,
    /// Accept mapping keys that refer back to one of their ancestors.
    pub allow_recursive_keys: bool,
    /// Upper bound on the number of code points read from the input.
    pub code_point_limit: usize,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
            parse_comments: false,
            max_aliases_for_collections: 50,
            allow_recursive_keys: false,
            code_point_limit: 3 * 1024 * 1024,
        }
    }
}

impl LoadSettings {
    /// Create settings labelled with a file name, if one is known.
    pub fn new(filename: Option<&str>) -> Self {
        Self {
            label: filename.unwrap_or(DEFAULT_LABEL).to_string(),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_parse_comments(mut self, parse_comments: bool) -> Self {
        self.parse_comments = parse_comments;
        self
    }

    pub fn with_max_aliases_for_collections(mut self, max: usize) -> Self {
        self.max_aliases_for_collections = max;
        self
    }

    pub fn with_allow_recursive_keys(mut self, allow: bool) -> Self {
        self.allow_recursive_keys = allow;
        self
    }

    pub fn with_code_point_limit(mut self, limit: usize) -> Self {
        self.code_point_limit = limit;
        self
    }
}
