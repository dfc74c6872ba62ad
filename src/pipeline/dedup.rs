use std::collections::HashSet;

/// Identity keys already claimed during this run. Never pruned.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True (and remembers the key) the first time a key is offered.
    pub fn is_new(&mut self, key: &str) -> bool {
        self.seen.insert(key.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

/// Source id, else detail URL, else title. Titles are a weak key and may merge
/// distinct postings that share a title.
pub fn identity_key(id: Option<&str>, url: Option<&str>, title: Option<&str>) -> Option<String> {
    [id, url, title]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|k| !k.is_empty())
        .map(str::to_string)
}
