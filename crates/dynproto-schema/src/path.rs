//! # Path Mapper
//!
//! Resolves the virtual paths used by `parse` calls and `import`
//! directives to real storage locations.
//!
//! A mapping replaces a leading run of whole path segments. Mapping
//! `proto/` to `/disk/protos/` sends `proto/person.proto` to
//! `/disk/protos/person.proto` but leaves `protocol/x.proto` alone. The
//! empty prefix matches every path. When several prefixes match, the
//! longest wins; a path no prefix matches is its own real path.
//!
//! Resolution never fails. Whether anything exists at the result is the
//! registry's concern.

/// One registered prefix substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapping {
    /// Virtual prefix, stored without a trailing `/`.
    pub virtual_prefix: String,
    /// Real directory the prefix stands for, as given.
    pub real_dir: String,
}

/// The accumulated prefix mappings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualPathMap {
    mappings: Vec<PathMapping>,
}

impl VirtualPathMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `virtual_prefix -> real_dir`, replacing any earlier mapping
    /// of the same prefix.
    pub fn map_path(&mut self, virtual_prefix: &str, real_dir: &str) {
        let virtual_prefix = normalize_prefix(virtual_prefix);
        match self.mappings.iter_mut().find(|m| m.virtual_prefix == virtual_prefix) {
            Some(existing) => existing.real_dir = real_dir.to_string(),
            None => self.mappings.push(PathMapping {
                virtual_prefix,
                real_dir: real_dir.to_string(),
            }),
        }
    }

    /// Registered mappings in registration order.
    pub fn mappings(&self) -> &[PathMapping] {
        &self.mappings
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// The real path for `virtual_path` under the longest matching prefix.
    pub fn resolve(&self, virtual_path: &str) -> String {
        self.candidates(virtual_path)
            .into_iter()
            .next()
            .unwrap_or_else(|| virtual_path.to_string())
    }

    /// Every real path `virtual_path` maps to, longest prefix first.
    ///
    /// Returns `[virtual_path]` when no prefix matches. Never empty.
    pub fn candidates(&self, virtual_path: &str) -> Vec<String> {
        let mut matches: Vec<(&PathMapping, &str)> = self
            .mappings
            .iter()
            .filter_map(|m| strip_segments(virtual_path, &m.virtual_prefix).map(|rest| (m, rest)))
            .collect();
        if matches.is_empty() {
            return vec![virtual_path.to_string()];
        }
        // Stable: equal-length prefixes are identical after normalization.
        matches.sort_by(|a, b| b.0.virtual_prefix.len().cmp(&a.0.virtual_prefix.len()));
        matches.into_iter().map(|(m, rest)| join(&m.real_dir, rest)).collect()
    }
}

fn normalize_prefix(prefix: &str) -> String {
    prefix.trim_end_matches('/').to_string()
}

/// Remainder of `path` after a whole-segment `prefix`, if it matches.
fn strip_segments<'p>(path: &'p str, prefix: &str) -> Option<&'p str> {
    if prefix.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix('/')
    }
}

fn join(real_dir: &str, rest: &str) -> String {
    if real_dir.is_empty() {
        return rest.to_string();
    }
    let base = real_dir.trim_end_matches('/');
    match (base.is_empty(), rest.is_empty()) {
        (true, _) => format!("/{rest}"),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}/{rest}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmapped_path_resolves_to_itself() {
        let map = VirtualPathMap::new();
        assert_eq!(map.resolve("person.proto"), "person.proto");
        assert_eq!(map.candidates("a/b.proto"), vec!["a/b.proto".to_string()]);
    }

    #[test]
    fn test_prefix_substitution() {
        let mut map = VirtualPathMap::new();
        map.map_path("proto/", "/disk/protos/");
        assert_eq!(map.resolve("proto/person.proto"), "/disk/protos/person.proto");
        assert_eq!(map.resolve("proto/sub/x.proto"), "/disk/protos/sub/x.proto");
    }

    #[test]
    fn test_prefix_matches_whole_segments_only() {
        let mut map = VirtualPathMap::new();
        map.map_path("proto", "/disk/protos");
        assert_eq!(map.resolve("protocol/x.proto"), "protocol/x.proto");
        assert_eq!(map.resolve("proto/x.proto"), "/disk/protos/x.proto");
    }

    #[test]
    fn test_empty_prefix_matches_everything() {
        let mut map = VirtualPathMap::new();
        map.map_path("", "./my_protos_dir/");
        assert_eq!(map.resolve("person.proto"), "./my_protos_dir/person.proto");
        assert_eq!(map.resolve("a/b.proto"), "./my_protos_dir/a/b.proto");
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mut map = VirtualPathMap::new();
        map.map_path("", "/root");
        map.map_path("google", "/usr/include/google");
        map.map_path("google/protobuf", "/opt/wkt");
        assert_eq!(map.resolve("google/protobuf/any.proto"), "/opt/wkt/any.proto");
        assert_eq!(map.resolve("google/api/http.proto"), "/usr/include/google/api/http.proto");
        assert_eq!(map.resolve("mine.proto"), "/root/mine.proto");
        assert_eq!(
            map.candidates("google/protobuf/any.proto"),
            vec![
                "/opt/wkt/any.proto".to_string(),
                "/usr/include/google/protobuf/any.proto".to_string(),
                "/root/google/protobuf/any.proto".to_string(),
            ]
        );
    }

    #[test]
    fn test_remap_overwrites() {
        let mut map = VirtualPathMap::new();
        map.map_path("proto/", "/old");
        map.map_path("proto", "/new");
        assert_eq!(map.mappings().len(), 1);
        assert_eq!(map.resolve("proto/a.proto"), "/new/a.proto");
    }

    #[test]
    fn test_root_real_dir() {
        let mut map = VirtualPathMap::new();
        map.map_path("abs", "/");
        assert_eq!(map.resolve("abs/etc/a.proto"), "/etc/a.proto");
    }
}
