//! Object keys listed by a table file.

/// Public info about an object stored in a table file (for `list_keys()`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    /// Object path (`/`-separated for objects inside directories).
    pub name: String,
    /// Object class name (e.g. "TH2F", "TDirectory").
    pub class_name: String,
}

impl KeyInfo {
    /// Create a key for `name` inside `prefix` (empty prefix = top level).
    pub fn new(prefix: &str, name: &str, class_name: &str) -> Self {
        let name = if prefix.is_empty() { name.to_string() } else { format!("{prefix}/{name}") };
        Self { name, class_name: class_name.to_string() }
    }

    /// Whether the key refers to a directory.
    pub fn is_directory(&self) -> bool {
        self.class_name == "TDirectory" || self.class_name == "TDirectoryFile"
    }
}
