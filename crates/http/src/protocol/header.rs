//! Ordered HTTP header list.
//!
//! Unlike `http::HeaderMap`, [`Headers`] keeps every field in arrival order
//! with its original name casing, which is what gets written back on the
//! wire. Lookups go through a lower-cased name index.

use std::collections::HashMap;

/// An ordered list of `(name, value)` header pairs with a case-insensitive index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    original: Vec<(String, String)>,
    /// lower cased name -> positions in `original`
    index: HashMap<String, Vec<usize>>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { original: Vec::with_capacity(capacity), index: HashMap::with_capacity(capacity) }
    }

    /// Appends a header, keeping any existing fields with the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let position = self.original.len();
        self.index.entry(name.to_ascii_lowercase()).or_default().push(position);
        self.original.push((name, value.into()));
    }

    /// Returns the first value for `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.positions(name).and_then(|positions| positions.first()).map(|&i| self.original[i].1.as_str())
    }

    /// Returns every value for `name` in arrival order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.positions(name)
            .map(|positions| positions.iter().map(|&i| self.original[i].1.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions(name).is_some()
    }

    /// Checks whether any value of the comma separated header `name` contains `token`.
    ///
    /// Used for `Connection: keep-alive, Upgrade` style headers, so both the
    /// name and the token match case-insensitively.
    pub fn contains_token(&self, name: &str, token: &str) -> bool {
        self.get_all(name)
            .into_iter()
            .flat_map(|value| value.split(','))
            .any(|item| item.trim().eq_ignore_ascii_case(token))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.original.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    fn positions(&self, name: &str) -> Option<&Vec<usize>> {
        // fast path: most lookups already use lower case names
        if name.bytes().all(|b| !b.is_ascii_uppercase()) {
            return self.index.get(name);
        }
        self.index.get(&name.to_ascii_lowercase())
    }
}

impl<N, V> FromIterator<(N, V)> for Headers
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
