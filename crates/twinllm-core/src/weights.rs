use std::path::PathBuf;

/// Ordered list of weight-shard files backing one model.
///
/// Shards are memory-mapped together at load time. When two shards define a
/// tensor with the same name, the shard that appears later in the list wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeightShards(Vec<PathBuf>);

impl WeightShards {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self(paths)
    }

    /// Parse a single path or a comma-separated list of paths.
    pub fn parse(spec: &str) -> Self {
        Self(parse_shard_list(spec))
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Comma-joined form for log lines.
    pub fn display(&self) -> String {
        self.0
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Split a comma-separated shard list, dropping empty segments.
pub fn parse_shard_list(spec: &str) -> Vec<PathBuf> {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}
