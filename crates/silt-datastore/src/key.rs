//! Hierarchical datastore keys.
//!
//! A [`Key`] is a slash-delimited, case-sensitive identifier in normal form:
//! - always begins with a single leading `/`
//! - never contains doubled separators
//! - never carries a trailing separator (the root key `/` is the one
//!   exception, being nothing but its separator)
//!
//! Construction never fails: [`Key::new`] normalizes arbitrary input, and the
//! empty string normalizes to the root key. Equality and ordering are
//! byte-wise on the normal form, so a sorted set of keys enumerates in the
//! same order the backing store lists their physical names.

use std::fmt;
use std::str::FromStr;

/// A normalized hierarchical key, e.g. `/blocks/CIQA4X`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(String);

impl Key {
    /// Create a key from arbitrary input, normalizing separators.
    ///
    /// # Examples
    ///
    /// ```
    /// use silt_datastore::Key;
    ///
    /// assert_eq!(Key::new("a/b").as_str(), "/a/b");
    /// assert_eq!(Key::new("//a///b/").as_str(), "/a/b");
    /// assert_eq!(Key::new("").as_str(), "/");
    /// ```
    pub fn new(s: &str) -> Self {
        let mut out = String::with_capacity(s.len() + 1);
        for segment in s.split('/').filter(|seg| !seg.is_empty()) {
            out.push('/');
            out.push_str(segment);
        }
        if out.is_empty() {
            out.push('/');
        }
        Key(out)
    }

    /// The root key `/`.
    pub fn root() -> Self {
        Key("/".to_string())
    }

    /// The normal string form, including the leading separator.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this is the root key.
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// The last path segment, or `""` for the root key.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// The parent key. The root key is its own parent.
    pub fn parent(&self) -> Key {
        match self.0.rfind('/') {
            Some(0) | None => Key::root(),
            Some(idx) => Key(self.0[..idx].to_string()),
        }
    }

    /// A child of this key, normalizing the given segment.
    ///
    /// ```
    /// use silt_datastore::Key;
    ///
    /// assert_eq!(Key::new("/a").child("b").as_str(), "/a/b");
    /// assert_eq!(Key::root().child("b").as_str(), "/b");
    /// ```
    pub fn child(&self, segment: &str) -> Key {
        Key::new(&format!("{}/{}", self.0, segment))
    }

    /// Iterate over the path segments, root first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|seg| !seg.is_empty())
    }

    /// Separator-aligned prefix test.
    ///
    /// `/ab` is a prefix of `/ab` and `/ab/x`, but NOT of `/abc/x`; plain
    /// string matching would accept all three. The root key is a prefix of
    /// every key.
    pub fn has_prefix(&self, prefix: &Key) -> bool {
        if prefix.is_root() {
            return true;
        }
        self == prefix
            || (self.0.starts_with(&prefix.0) && self.0.as_bytes().get(prefix.0.len()) == Some(&b'/'))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::new(s)
    }
}

impl FromStr for Key {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Key::new(s))
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
