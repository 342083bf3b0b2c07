//! Namespace paths

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, NamingResult};

pub const SEPARATOR: char = '/';

/// Characters that may not appear anywhere in a path.
const FORBIDDEN: &[char] = &[':'];

/// Normalized path: the ordered name segments from the root.
///
/// Empty segments are dropped while parsing, so `/a//b/` and `/a/b`
/// name the same node. The root is the empty sequence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(Vec<String>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Syntactic check only: non-empty, rooted, no forbidden characters.
    pub fn is_valid(raw: &str) -> bool {
        raw.starts_with(SEPARATOR) && !raw.contains(FORBIDDEN)
    }

    pub fn parse(raw: &str) -> NamingResult<Self> {
        if !Self::is_valid(raw) {
            return Err(Error::InvalidPath(raw.to_string()));
        }
        Ok(Self(
            raw.split(SEPARATOR)
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        ))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Last segment, `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn parent(&self) -> Option<NodePath> {
        if self.is_root() {
            None
        } else {
            Some(self.prefix(self.0.len() - 1))
        }
    }

    /// The path made of the first `depth` segments.
    pub fn prefix(&self, depth: usize) -> NodePath {
        Self(self.0[..depth.min(self.0.len())].to_vec())
    }

    /// Every path from the root down to and including `self`, shallowest first.
    pub fn prefixes(&self) -> impl Iterator<Item = NodePath> + '_ {
        (0..=self.0.len()).map(move |depth| self.prefix(depth))
    }

    pub fn join(&self, name: &str) -> NodePath {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Self(segments)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "{}", SEPARATOR);
        }
        for segment in &self.0 {
            write!(f, "{}{}", SEPARATOR, segment)?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
