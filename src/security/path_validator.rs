//! Destination mapping and remote path validation.
//!
//! Remote paths come from hosts we do not control. Every path is normalized
//! here before it is joined onto the destination root, and anything that
//! could climb out of that root is rejected.

use std::path::{Path, PathBuf};

use crate::constants::PARTIAL_SUFFIX;
use crate::errors::CollectError;

/// Validates a single local path component (host address or share name).
///
/// # Returns
///
/// * `Ok(())` - the name can be used as one directory level
/// * `Err(reason)` - a short description of what is wrong
pub fn validate_component(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("is empty");
    }
    if name == "." || name == ".." {
        return Err("is a relative directory reference");
    }
    if name.contains('/') || name.contains('\\') {
        return Err("contains a path separator");
    }
    if name.contains('\0') {
        return Err("contains a null byte");
    }
    Ok(())
}

/// Normalizes a share-relative remote path.
///
/// Both `/` and `\` separate segments. Empty and `.` segments are dropped.
/// The result uses `/` and has no leading or trailing separator.
///
/// # Errors
///
/// `PathTraversal` when the path contains a `..` segment, a segment with a
/// null byte or a colon (drive prefixes, alternate data streams), or nothing
/// but separators.
pub fn normalize_remote_path(path: &str) -> Result<String, CollectError> {
    let reject = |reason: &str| CollectError::PathTraversal {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let mut segments = Vec::new();
    for segment in path.split(|c| c == '/' || c == '\\') {
        match segment {
            "" | "." => continue,
            ".." => return Err(reject("contains a parent-directory segment")),
            s if s.contains('\0') => return Err(reject("contains a null byte")),
            s if s.contains(':') => return Err(reject("contains a drive or stream separator")),
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return Err(reject("is empty"));
    }

    Ok(segments.join("/"))
}

/// Maps discovered remote files onto the local destination tree:
/// `root / host / share / remote path`.
///
/// The mapping is pure and deterministic. Distinct (host, share, path)
/// identities map to distinct destinations because each part occupies its
/// own, separator-free path levels.
#[derive(Debug, Clone)]
pub struct DestinationMapper {
    root: PathBuf,
}

impl DestinationMapper {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Compute the destination path for one remote file.
    ///
    /// Creates nothing on disk.
    pub fn map(
        &self,
        host_address: &str,
        share_name: &str,
        remote_relative_path: &str,
    ) -> Result<PathBuf, CollectError> {
        for part in [host_address, share_name] {
            validate_component(part).map_err(|reason| CollectError::PathTraversal {
                path: part.to_string(),
                reason: reason.to_string(),
            })?;
        }

        let normalized = normalize_remote_path(remote_relative_path)?;

        let mut destination = self.root.join(host_address).join(share_name);
        for segment in normalized.split('/') {
            destination.push(segment);
        }

        Ok(destination)
    }
}

/// Path of the in-flight file written before the final rename.
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(PARTIAL_SUFFIX);
    destination.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_map_layout() {
        let mapper = DestinationMapper::new("/out");
        let dest = mapper
            .map("10.0.0.5", "C$", "Users/alice/Documents/Outlook Files/Outlook.pst")
            .unwrap();

        let expected: PathBuf = ["/out", "10.0.0.5", "C$", "Users", "alice", "Documents", "Outlook Files", "Outlook.pst"]
            .iter()
            .collect();
        assert_eq!(dest, expected);
    }

    #[test]
    fn test_normalize_remote_path() {
        assert_eq!(normalize_remote_path("/Users//alice/./x.pst/").unwrap(), "Users/alice/x.pst");
        assert_eq!(normalize_remote_path("Users\\alice\\x.pst").unwrap(), "Users/alice/x.pst");
        assert_eq!(normalize_remote_path("a/.../b").unwrap(), "a/.../b");
    }

    #[test]
    fn test_traversal_rejected() {
        let mapper = DestinationMapper::new("/out");
        let attempts = [
            "../etc/passwd",
            "Users/../../escape.pst",
            "Users\\..\\..\\escape.pst",
            "Users/alice/..",
            "C:/Windows/x.pst",
            "Users/alice/x.pst:hidden",
            "",
            "///",
            "./.",
        ];

        for attempt in attempts {
            let result = mapper.map("host", "C$", attempt);
            assert!(
                matches!(result, Err(CollectError::PathTraversal { .. })),
                "Failed to catch escape attempt: {:?}",
                attempt
            );
        }
    }

    #[test]
    fn test_bad_host_or_share_rejected() {
        let mapper = DestinationMapper::new("/out");
        assert!(mapper.map("..", "C$", "x.pst").is_err());
        assert!(mapper.map("host", "a/b", "x.pst").is_err());
        assert!(mapper.map("", "C$", "x.pst").is_err());
        assert!(mapper.map("host", "C$\\..", "x.pst").is_err());
    }

    #[test]
    fn test_validate_component() {
        assert!(validate_component("C$").is_ok());
        assert!(validate_component("192.168.1.20").is_ok());
        assert!(validate_component("ws01.corp.local").is_ok());
        assert_eq!(validate_component(""), Err("is empty"));
        assert!(validate_component("..").is_err());
        assert!(validate_component("a\\b").is_err());
        assert!(validate_component("a\0b").is_err());
    }

    #[test]
    fn test_partial_path() {
        let dest = Path::new("/out/h/C$/Outlook.pst");
        assert_eq!(partial_path(dest), PathBuf::from("/out/h/C$/Outlook.pst.partial"));
    }

    proptest! {
        #[test]
        fn prop_mapping_is_injective(
            a in ("[a-c]{1,2}", "[A-C]\\$", "[a-c]{1,2}(/[a-c]{1,2}){0,2}"),
            b in ("[a-c]{1,2}", "[A-C]\\$", "[a-c]{1,2}(/[a-c]{1,2}){0,2}"),
        ) {
            let mapper = DestinationMapper::new("/out");
            let da = mapper.map(&a.0, &a.1, &a.2).unwrap();
            let db = mapper.map(&b.0, &b.1, &b.2).unwrap();
            prop_assert_eq!(a == b, da == db);
        }

        #[test]
        fn prop_parent_segments_never_mapped(
            prefix in "[a-z]{0,3}(/[a-z]{1,3}){0,2}",
            suffix in "(/[a-z]{1,3}){0,2}",
            sep in prop::sample::select(vec!["/", "\\"]),
        ) {
            let path = format!("{}{}..{}", prefix, sep, suffix);
            let mapper = DestinationMapper::new("/out");
            prop_assert!(mapper.map("host", "C$", &path).is_err());
        }

        #[test]
        fn prop_mapped_paths_stay_under_root(path in "[a-zA-Z0-9 ._-]{1,8}(/[a-zA-Z0-9 ._-]{1,8}){0,3}") {
            let mapper = DestinationMapper::new("/out");
            if let Ok(dest) = mapper.map("host", "C$", &path) {
                prop_assert!(dest.starts_with("/out/host/C$"));
                prop_assert!(!dest.components().any(|c| matches!(c, std::path::Component::ParentDir)));
            }
        }
    }

    #[test]
    fn test_distinct_identities_distinct_destinations() {
        let mapper = DestinationMapper::new("/out");
        let identities = [
            ("h1", "C$", "a/b.pst"),
            ("h2", "C$", "a/b.pst"),
            ("h1", "D$", "a/b.pst"),
            ("h1", "C$", "a/c.pst"),
            ("h1", "C$", "b.pst"),
        ];
        let destinations: HashSet<PathBuf> = identities
            .iter()
            .map(|(h, s, p)| mapper.map(h, s, p).unwrap())
            .collect();
        assert_eq!(destinations.len(), identities.len());
    }
}
