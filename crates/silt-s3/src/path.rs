//! Mapping between logical keys and physical object names.
//!
//! A [`StorePath`] owns the configured root prefix and fixes one convention
//! for both directions of the mapping: the stored root never carries a
//! leading or trailing separator, and keys always carry their leading
//! separator. Encoding is plain concatenation, decoding strips exactly
//! `root.len()` bytes, and the two are exact inverses for every name
//! encoding produces.

use silt_datastore::Key;

/// The physical root prefix of one datastore inside a bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorePath {
    root: String,
}

impl StorePath {
    /// Build a store path, normalizing the configured prefix.
    ///
    /// Leading and trailing separators and doubled separators are collapsed
    /// once here, so `"ipfs"`, `"/ipfs"` and `"ipfs/"` configure the same
    /// layout.
    pub fn new(root: &str) -> Self {
        let key = Key::new(root);
        let root = if key.is_root() {
            String::new()
        } else {
            key.as_str()[1..].to_string()
        };
        StorePath { root }
    }

    /// The normalized root prefix (empty for a store at the bucket root).
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Returns `true` when the store sits at the bucket root.
    pub fn is_bucket_root(&self) -> bool {
        self.root.is_empty()
    }

    /// Physical object name for a key.
    ///
    /// Object-storage keys are not absolute: with an empty root the key's
    /// leading separator is dropped, otherwise the root (which has no
    /// trailing separator) is prepended to the key (which has its leading
    /// one), so a doubled separator can never appear.
    pub fn full_key(&self, key: &Key) -> String {
        if self.root.is_empty() {
            key.as_str()[1..].to_string()
        } else {
            format!("{}{}", self.root, key.as_str())
        }
    }

    /// Recover the key from a physical name produced by [`StorePath::full_key`].
    ///
    /// Strips exactly `root.len()` leading bytes and normalizes the
    /// remainder.
    pub fn decode(&self, name: &str) -> Key {
        Key::new(&name[self.root.len()..])
    }

    /// Physical listing prefix for a logical query prefix.
    ///
    /// With no logical prefix this scopes the listing to everything under
    /// the root (the root plus a trailing separator, so a sibling prefix
    /// like `ipfs2` is not swept in).
    pub fn scoped_prefix(&self, prefix: Option<&Key>) -> String {
        match prefix {
            Some(key) => self.full_key(key),
            None if self.root.is_empty() => String::new(),
            None => format!("{}/", self.root),
        }
    }

    /// Physical name of the root marker object probed and written by `open`.
    pub fn root_marker(&self) -> String {
        format!("{}/", self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // -----------------------------------------------------------------------
    // Root normalization
    // -----------------------------------------------------------------------

    #[test]
    fn root_spellings_collapse_to_one_form() {
        for spelling in ["ipfs", "/ipfs", "ipfs/", "/ipfs/", "//ipfs//"] {
            assert_eq!(StorePath::new(spelling).root(), "ipfs");
        }
    }

    #[test]
    fn empty_root_forms() {
        for spelling in ["", "/", "//"] {
            let path = StorePath::new(spelling);
            assert_eq!(path.root(), "");
            assert!(path.is_bucket_root());
        }
    }

    #[test]
    fn nested_root_keeps_inner_separators() {
        assert_eq!(StorePath::new("/repos/alpha/").root(), "repos/alpha");
    }

    // -----------------------------------------------------------------------
    // Encoding
    // -----------------------------------------------------------------------

    #[test]
    fn full_key_with_root() {
        let path = StorePath::new("ipfs");
        assert_eq!(path.full_key(&Key::new("/a/b")), "ipfs/a/b");
    }

    #[test]
    fn full_key_with_empty_root_has_no_leading_separator() {
        let path = StorePath::new("");
        assert_eq!(path.full_key(&Key::new("/a/b")), "a/b");
    }

    #[test]
    fn full_key_never_doubles_separators() {
        let path = StorePath::new("/ipfs/");
        assert_eq!(path.full_key(&Key::new("//a//b/")), "ipfs/a/b");
    }

    #[test]
    fn root_key_encodes_to_marker() {
        let path = StorePath::new("ipfs");
        assert_eq!(path.full_key(&Key::root()), "ipfs/");
        assert_eq!(path.root_marker(), "ipfs/");
    }

    // -----------------------------------------------------------------------
    // Decoding
    // -----------------------------------------------------------------------

    #[test]
    fn decode_inverts_full_key() {
        let path = StorePath::new("ipfs");
        let key = Key::new("/blocks/CIQA4X");
        assert_eq!(path.decode(&path.full_key(&key)), key);
    }

    #[test]
    fn decode_inverts_full_key_with_empty_root() {
        let path = StorePath::new("");
        let key = Key::new("/blocks/CIQA4X");
        assert_eq!(path.decode(&path.full_key(&key)), key);
    }

    #[test]
    fn decode_marker_is_root_key() {
        let path = StorePath::new("ipfs");
        assert_eq!(path.decode("ipfs/"), Key::root());
    }

    // -----------------------------------------------------------------------
    // Listing prefixes
    // -----------------------------------------------------------------------

    #[test]
    fn scoped_prefix_without_logical_prefix() {
        assert_eq!(StorePath::new("ipfs").scoped_prefix(None), "ipfs/");
        assert_eq!(StorePath::new("").scoped_prefix(None), "");
    }

    #[test]
    fn scoped_prefix_with_logical_prefix() {
        let path = StorePath::new("ipfs");
        assert_eq!(path.scoped_prefix(Some(&Key::new("/ab"))), "ipfs/ab");
    }

    proptest! {
        #[test]
        fn round_trip_for_any_key(
            root in "[a-z]{0,8}(/[a-z]{1,8}){0,2}",
            raw in "(/[a-z0-9]{1,10}){1,4}",
        ) {
            let path = StorePath::new(&root);
            let key = Key::new(&raw);
            prop_assert_eq!(path.decode(&path.full_key(&key)), key);
        }

        #[test]
        fn physical_names_have_no_doubled_separators(
            root in "/?[a-z]{0,8}/?",
            raw in "/{0,2}[a-z]{1,8}(//?[a-z]{1,8}){0,3}/{0,2}",
        ) {
            let path = StorePath::new(&root);
            let name = path.full_key(&Key::new(&raw));
            prop_assert!(!name.contains("//"));
            prop_assert!(!name.starts_with('/'));
        }
    }
}
