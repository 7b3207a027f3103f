//! Common types used throughout HarborDrive.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A path within a remote drive, independent of the backing provider.
///
/// This type represents logical paths inside the drive's namespace, not
/// physical filesystem paths. Paths are absolute; the root is the empty
/// component list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DrivePath {
    components: Vec<String>,
}

impl DrivePath {
    /// Create a root path.
    pub fn root() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Create a path from string components.
    ///
    /// # Preconditions
    /// - Components must not contain path separators
    /// - Components must not be empty, `.` or `..`
    ///
    /// # Errors
    /// - Returns error if any component is invalid
    pub fn from_components(components: Vec<String>) -> crate::Result<Self> {
        for comp in &components {
            if comp.is_empty() {
                return Err(crate::Error::InvalidArgument(
                    "path component cannot be empty".to_string(),
                ));
            }
            if comp == "." || comp == ".." {
                return Err(crate::Error::InvalidArgument(
                    "relative path components are not supported".to_string(),
                ));
            }
            if comp.contains('/') || comp.contains('\\') {
                return Err(crate::Error::InvalidArgument(
                    "path component cannot contain separators".to_string(),
                ));
            }
        }
        Ok(Self { components })
    }

    /// Parse a path string into a DrivePath.
    ///
    /// Uses '/' as separator. Leading and trailing slashes are stripped and
    /// repeated slashes collapse, so `/docs//notes/` parses the same as
    /// `/docs/notes`.
    pub fn parse(path: &str) -> crate::Result<Self> {
        let components: Vec<String> = path
            .split('/')
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect();
        Self::from_components(components)
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Get the parent path, if any.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            None
        } else {
            let mut components = self.components.clone();
            components.pop();
            Some(Self { components })
        }
    }

    /// Get the file/directory name (last component).
    pub fn name(&self) -> Option<&str> {
        self.components.last().map(|s| s.as_str())
    }

    /// Join this path with a child component.
    pub fn join(&self, child: &str) -> crate::Result<Self> {
        let mut components = self.components.clone();
        components.push(child.to_string());
        Self::from_components(components)
    }

    /// Get the path components.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Convert to a string representation ("/" for the root).
    pub fn to_string_path(&self) -> String {
        if self.is_root() {
            "/".to_string()
        } else {
            format!("/{}", self.components.join("/"))
        }
    }
}

impl fmt::Display for DrivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_path())
    }
}

/// The classified outcome of a move/copy request: which parts of the item's
/// identity actually change.
///
/// A destination string ending in '/' (or the bare root "/") is
/// directory-valued: the item keeps its base name and moves into that
/// directory. Any other destination names the new full path. A request that
/// changes neither parent nor name is rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    /// New parent directory, when the item changes directory.
    pub new_parent: Option<DrivePath>,
    /// New base name, when the item is renamed.
    pub new_name: Option<String>,
}

impl Relocation {
    /// Classify a relocation from `source` to the raw `target` string.
    ///
    /// # Errors
    /// - `InvalidArgument` if the source is the root, the target is
    ///   unparsable, or the relocation would be a no-op
    pub fn classify(source: &DrivePath, target: &str) -> crate::Result<Self> {
        let src_parent = source
            .parent()
            .ok_or_else(|| crate::Error::InvalidArgument(
                "cannot relocate the root directory".to_string(),
            ))?;
        let src_name = source.name().expect("non-root path has a name");

        let into_directory = target == "/" || target.ends_with('/');
        let target_path = DrivePath::parse(target)?;

        let (dst_parent, dst_name) = if into_directory {
            (target_path, src_name.to_string())
        } else {
            // Parsing stripped nothing here; a non-root target always has a
            // name component.
            let name = target_path
                .name()
                .ok_or_else(|| crate::Error::InvalidArgument(
                    "destination path is empty".to_string(),
                ))?
                .to_string();
            let parent = target_path.parent().expect("non-root path has a parent");
            (parent, name)
        };

        let same_parent = dst_parent == src_parent;
        let same_name = dst_name == src_name;
        if same_parent && same_name {
            return Err(crate::Error::InvalidArgument(format!(
                "relocating {} onto itself is a no-op",
                source
            )));
        }

        Ok(Self {
            new_parent: (!same_parent).then_some(dst_parent),
            new_name: (!same_name).then_some(dst_name),
        })
    }

    /// The full destination path the relocation resolves to.
    pub fn destination(&self, source: &DrivePath) -> DrivePath {
        let parent = self
            .new_parent
            .clone()
            .or_else(|| source.parent())
            .unwrap_or_else(DrivePath::root);
        let name = self
            .new_name
            .clone()
            .or_else(|| source.name().map(String::from))
            .unwrap_or_default();
        parent.join(&name).unwrap_or_else(|_| source.clone())
    }
}
