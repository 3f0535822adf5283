//! Canonical absolute URIs for the site, collections, items and relationships
//!
//! Templates, relative to the mount prefix:
//!
//! | Target       | Path                                 |
//! |--------------|--------------------------------------|
//! | site         | `/`                                  |
//! | collection   | `/{type}/`                           |
//! | item         | `/{type}/{key}`                      |
//! | relationship | `/{type}/{key}/{relationship}/`      |
//!
//! Keys are restricted to URI-safe characters, so no escaping is needed and
//! [`UriBuilder::parse`] recovers exactly what was built.

use axum::http::HeaderMap;
use axum::http::header::HOST;

use crate::core::field::RecordKey;

/// Origin used when neither configuration nor the request names one
pub const DEFAULT_ORIGIN: &str = "http://localhost";

/// Builds and parses resource URIs for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriBuilder {
    origin: String,
    prefix: String,
}

/// Components recovered from a URI
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourcePath {
    pub resource: Option<String>,
    pub key: Option<RecordKey>,
    pub relationship: Option<String>,
}

/// `""` or `/segment(/segment)*` with no trailing slash
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

impl UriBuilder {
    pub fn new(origin: impl AsRef<str>, prefix: &str) -> Self {
        Self {
            origin: origin.as_ref().trim_end_matches('/').to_string(),
            prefix: normalize_prefix(prefix),
        }
    }

    /// Origin from `base_url` when configured, else from the `Host` header
    pub fn for_request(base_url: Option<&str>, prefix: &str, headers: &HeaderMap) -> Self {
        if let Some(base_url) = base_url {
            return Self::new(base_url, prefix);
        }
        let host = headers
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .filter(|host| !host.is_empty());
        match host {
            Some(host) => Self::new(format!("http://{}", host), prefix),
            None => Self::new(DEFAULT_ORIGIN, prefix),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn site(&self) -> String {
        format!("{}{}/", self.origin, self.prefix)
    }

    pub fn collection(&self, resource: &str) -> String {
        format!("{}{}/{}/", self.origin, self.prefix, resource)
    }

    pub fn item(&self, resource: &str, key: &RecordKey) -> String {
        format!("{}{}/{}/{}", self.origin, self.prefix, resource, key)
    }

    pub fn relationship(&self, resource: &str, key: &RecordKey, relationship: &str) -> String {
        format!(
            "{}{}/{}/{}/{}/",
            self.origin, self.prefix, resource, key, relationship
        )
    }

    /// Generic form; a relationship without a key has no URI and falls back
    /// to the collection
    pub fn uri(
        &self,
        resource: Option<&str>,
        key: Option<&RecordKey>,
        relationship: Option<&str>,
    ) -> String {
        match (resource, key, relationship) {
            (None, _, _) => self.site(),
            (Some(resource), None, _) => self.collection(resource),
            (Some(resource), Some(key), None) => self.item(resource, key),
            (Some(resource), Some(key), Some(rel)) => self.relationship(resource, key, rel),
        }
    }

    /// Recover the components of a URI built by any origin under this prefix
    ///
    /// The origin is not compared, so URIs survive a change of host.
    pub fn parse(&self, uri: &str) -> Option<ResourcePath> {
        let path = match uri.find("://") {
            Some(idx) => {
                let rest = &uri[idx + 3..];
                &rest[rest.find('/')?..]
            }
            None => uri,
        };
        let path = path.strip_prefix(self.prefix.as_str())?;
        let segments: Vec<&str> = path.strip_prefix('/')?.split('/').collect();

        let named = |s: &str| (!s.is_empty()).then(|| s.to_string());
        match segments.as_slice() {
            [""] => Some(ResourcePath::default()),
            [resource, ""] => Some(ResourcePath {
                resource: Some(named(resource)?),
                ..ResourcePath::default()
            }),
            [resource, key] => Some(ResourcePath {
                resource: Some(named(resource)?),
                key: Some(RecordKey::parse(key).ok()?),
                relationship: None,
            }),
            [resource, key, relationship, ""] => Some(ResourcePath {
                resource: Some(named(resource)?),
                key: Some(RecordKey::parse(key).ok()?),
                relationship: Some(named(relationship)?),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn builder() -> UriBuilder {
        UriBuilder::new("http://api.test", "/v1/")
    }

    #[test]
    fn test_templates() {
        let uris = builder();
        let key = RecordKey::Id(7);
        assert_eq!(uris.site(), "http://api.test/v1/");
        assert_eq!(uris.collection("Person"), "http://api.test/v1/Person/");
        assert_eq!(uris.item("Person", &key), "http://api.test/v1/Person/7");
        assert_eq!(
            uris.relationship("Person", &key, "pets"),
            "http://api.test/v1/Person/7/pets/"
        );
    }

    #[test]
    fn test_parse_recovers_components() {
        let uris = builder();
        let key = RecordKey::Name("ada".into());

        assert_eq!(uris.parse(&uris.site()), Some(ResourcePath::default()));

        let collection = uris.parse(&uris.collection("Person")).unwrap();
        assert_eq!(collection.resource.as_deref(), Some("Person"));
        assert_eq!(collection.key, None);

        let item = uris.parse(&uris.item("Person", &key)).unwrap();
        assert_eq!(item.key, Some(key.clone()));
        assert_eq!(item.relationship, None);

        let rel = uris
            .parse(&uris.uri(Some("Person"), Some(&key), Some("pets")))
            .unwrap();
        assert_eq!(rel.resource.as_deref(), Some("Person"));
        assert_eq!(rel.key, Some(key));
        assert_eq!(rel.relationship.as_deref(), Some("pets"));
    }

    #[test]
    fn test_parse_ignores_origin_but_not_prefix() {
        let uris = builder();
        let parsed = uris.parse("https://elsewhere:8080/v1/Person/3").unwrap();
        assert_eq!(parsed.key, Some(RecordKey::Id(3)));
        assert_eq!(parsed.resource.as_deref(), Some("Person"));

        assert!(uris.parse("http://api.test/v2/Person/3").is_none());
        assert!(uris.parse("http://api.test/v1/Person/3/").is_none());
        assert!(uris.parse("http://api.test/v1/Person/bad key").is_none());
    }

    #[test]
    fn test_origin_from_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("example.org:3000"));

        let uris = UriBuilder::for_request(None, "", &headers);
        assert_eq!(uris.site(), "http://example.org:3000/");

        let configured = UriBuilder::for_request(Some("https://api.example/"), "", &headers);
        assert_eq!(configured.site(), "https://api.example/");

        let fallback = UriBuilder::for_request(None, "", &HeaderMap::new());
        assert_eq!(fallback.site(), "http://localhost/");
    }
}
