/// Lazy walk from a path up to the root.
///
/// For `/a/b/c` yields `/a/b/c`, `/a/b`, `/a`, `/`. Used to find the nearest
/// not-found boundary for an unmatched request, so callers usually stop at the
/// first hit with `find_map`.
///
/// ```
/// use onyx_router::path::Ancestors;
///
/// let chain: Vec<&str> = Ancestors::new("/a/b/c").collect();
/// assert_eq!(chain, vec!["/a/b/c", "/a/b", "/a", "/"]);
/// ```
#[derive(Debug, Clone)]
pub struct Ancestors<'a> {
    next: Option<&'a str>,
}

impl<'a> Ancestors<'a> {
    /// `path` is expected to be canonical (see [`super::normalize_path`]).
    pub fn new(path: &'a str) -> Self {
        Self { next: Some(path) }
    }
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        self.next = match current.rfind('/') {
            _ if current == "/" || current.is_empty() => None,
            Some(0) => Some("/"),
            Some(idx) => Some(&current[..idx]),
            None => None,
        };

        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_to_root() {
        let chain: Vec<&str> = Ancestors::new("/users").collect();
        assert_eq!(chain, vec!["/users", "/"]);

        let chain: Vec<&str> = Ancestors::new("/").collect();
        assert_eq!(chain, vec!["/"]);
    }

    #[test]
    fn stops_at_first_hit() {
        let mut iter = Ancestors::new("/a/b/c/d");
        assert_eq!(iter.find(|p| *p == "/a/b"), Some("/a/b"));
        assert_eq!(iter.next(), Some("/a"));
    }
}
