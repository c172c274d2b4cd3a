//! Ordered header list with case-insensitive lookup.
//!
//! Names keep the spelling the client sent and duplicates stay in insertion
//! order, so forwarding reproduces what arrived on the wire.

use hyper::header::{HeaderName, HeaderValue};

use crate::error::ProxyError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, rejecting names and values that cannot be sent upstream.
    pub fn append(&mut self, name: &str, value: &str) -> Result<(), ProxyError> {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            return Err(ProxyError::Parse(format!("invalid header name {:?}", name)));
        }
        let value = value.trim_matches(|c| c == ' ' || c == '\t');
        if HeaderValue::from_str(value).is_err() {
            return Err(ProxyError::Parse(format!("invalid value for header {}", name)));
        }
        self.entries.push((name.to_string(), value.to_string()));
        Ok(())
    }

    /// First value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[cfg(test)]
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove every value stored under `name`. Returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let mut headers = Headers::new();
        headers.append("Content-Length", "5").unwrap();
        assert_eq!(headers.get("content-length"), Some("5"));
        assert!(headers.contains("CONTENT-LENGTH"));
    }

    #[test]
    fn duplicates_keep_insertion_order() {
        let mut headers = Headers::new();
        headers.append("Accept", "text/html").unwrap();
        headers.append("Host", "example.com").unwrap();
        headers.append("accept", "application/json").unwrap();

        let accepts: Vec<_> = headers.get_all("Accept").collect();
        assert_eq!(accepts, vec!["text/html", "application/json"]);

        let names: Vec<_> = headers.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["Accept", "Host", "accept"]);
    }

    #[test]
    fn remove_drops_every_spelling() {
        let mut headers = Headers::new();
        headers.append("Proxy-Authorization", "Basic a").unwrap();
        headers.append("proxy-authorization", "Basic b").unwrap();
        headers.append("Host", "example.com").unwrap();

        assert_eq!(headers.remove("PROXY-AUTHORIZATION"), 2);
        assert_eq!(headers.len(), 1);
        assert!(!headers.contains("Proxy-Authorization"));
    }

    #[test]
    fn rejects_invalid_names() {
        let mut headers = Headers::new();
        assert!(headers.append("Bad Name", "x").is_err());
        assert!(headers.append("", "x").is_err());
        assert!(headers.is_empty());
    }
}
