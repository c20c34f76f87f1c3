use std::fmt;
use std::sync::Arc;

use bon::Builder;
use url::Url;

/// Predicate over a target URL, used to scope an initializer
///
/// Primitives compare one URL component; [`and`](MatchPredicate::and),
/// [`or`](MatchPredicate::or) and [`negate`](MatchPredicate::negate) compose
/// them. Protocol and host comparisons ignore ASCII case, path prefixes do
/// not.
#[derive(Clone)]
pub struct MatchPredicate {
    label: String,
    test: Arc<dyn Fn(&Url) -> bool + Send + Sync>,
}

impl MatchPredicate {
    pub fn from_fn<F>(label: impl Into<String>, test: F) -> Self
    where
        F: Fn(&Url) -> bool + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            test: Arc::new(test),
        }
    }

    pub fn always() -> Self {
        Self::from_fn("*", |_| true)
    }

    pub fn protocol(protocol: impl Into<String>) -> Self {
        let protocol = protocol.into();
        Self::from_fn(format!("protocol={protocol}"), move |url| {
            url.scheme().eq_ignore_ascii_case(&protocol)
        })
    }

    pub fn host(host: impl Into<String>) -> Self {
        let host = host.into();
        Self::from_fn(format!("host={host}"), move |url| {
            url.host_str()
                .is_some_and(|candidate| candidate.eq_ignore_ascii_case(&host))
        })
    }

    /// Matches the explicit port, or the scheme's default when none is given
    pub fn port(port: u16) -> Self {
        Self::from_fn(format!("port={port}"), move |url| {
            url.port_or_known_default() == Some(port)
        })
    }

    pub fn path_prefix(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self::from_fn(format!("path^={prefix}"), move |url| {
            url.path().starts_with(prefix.as_str())
        })
    }

    pub fn and(self, other: MatchPredicate) -> Self {
        let label = format!("({} && {})", self.label, other.label);
        Self::from_fn(label, move |url| self.matches(url) && other.matches(url))
    }

    pub fn or(self, other: MatchPredicate) -> Self {
        let label = format!("({} || {})", self.label, other.label);
        Self::from_fn(label, move |url| self.matches(url) || other.matches(url))
    }

    pub fn negate(self) -> Self {
        let label = format!("!{}", self.label);
        Self::from_fn(label, move |url| !self.matches(url))
    }

    pub fn matches(&self, url: &Url) -> bool {
        (self.test)(url)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for MatchPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MatchPredicate").field(&self.label).finish()
    }
}

/// Protocol-anchored scope: every given component must match
///
/// ```
/// use protoreg::initializers::{MatchPredicate, Scope};
///
/// let scope = Scope::builder()
///     .protocol("https")
///     .host("localhost")
///     .port(11113)
///     .build();
/// let predicate = MatchPredicate::from(scope);
/// assert!(predicate.matches(&"https://localhost:11113/".parse().unwrap()));
/// ```
#[derive(Debug, Clone, Builder)]
pub struct Scope {
    #[builder(into)]
    protocol: String,
    #[builder(into)]
    host: Option<String>,
    port: Option<u16>,
    #[builder(into)]
    path_prefix: Option<String>,
}

impl Scope {
    pub fn protocol_only(protocol: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            host: None,
            port: None,
            path_prefix: None,
        }
    }

    pub fn to_predicate(&self) -> MatchPredicate {
        let mut predicate = MatchPredicate::protocol(self.protocol.clone());
        if let Some(host) = &self.host {
            predicate = predicate.and(MatchPredicate::host(host.clone()));
        }
        if let Some(port) = self.port {
            predicate = predicate.and(MatchPredicate::port(port));
        }
        if let Some(prefix) = &self.path_prefix {
            predicate = predicate.and(MatchPredicate::path_prefix(prefix.clone()));
        }
        predicate
    }
}

impl From<Scope> for MatchPredicate {
    fn from(scope: Scope) -> Self {
        scope.to_predicate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_protocol_and_host_ignore_case() {
        let predicate = MatchPredicate::protocol("HTTPS").and(MatchPredicate::host("LocalHost"));
        assert!(predicate.matches(&url("https://localhost/")));
        assert!(!predicate.matches(&url("http://localhost/")));
    }

    #[test]
    fn test_port_matches_explicit_and_default() {
        assert!(MatchPredicate::port(11113).matches(&url("https://localhost:11113/")));
        assert!(!MatchPredicate::port(11113).matches(&url("https://localhost:9999/")));
        assert!(MatchPredicate::port(443).matches(&url("https://localhost/")));
    }

    #[test]
    fn test_path_prefix_is_case_sensitive() {
        let predicate = MatchPredicate::path_prefix("/api");
        assert!(predicate.matches(&url("http://svc.example/api/v1")));
        assert!(!predicate.matches(&url("http://svc.example/API/v1")));
        assert!(!predicate.matches(&url("http://svc.example/")));
    }

    #[test]
    fn test_scope_combines_all_fields() {
        let predicate: MatchPredicate = Scope::builder()
            .protocol("https")
            .host("svc.example")
            .port(8443)
            .path_prefix("/admin")
            .build()
            .into();

        assert!(predicate.matches(&url("https://SVC.example:8443/admin/users")));
        assert!(!predicate.matches(&url("https://svc.example:8443/public")));
        assert!(!predicate.matches(&url("https://svc.example/admin")));
        assert!(!predicate.matches(&url("http://svc.example:8443/admin")));
    }

    #[test]
    fn test_scope_protocol_only() {
        let predicate = Scope::protocol_only("file").to_predicate();
        assert!(predicate.matches(&url("file:///tmp/data")));
        assert!(!predicate.matches(&url("http://svc.example/")));
    }

    #[test]
    fn test_or_and_negate() {
        let predicate = MatchPredicate::host("a.example")
            .or(MatchPredicate::host("b.example"))
            .and(MatchPredicate::path_prefix("/private").negate());

        assert!(predicate.matches(&url("http://a.example/public")));
        assert!(predicate.matches(&url("http://b.example/")));
        assert!(!predicate.matches(&url("http://b.example/private/x")));
        assert!(!predicate.matches(&url("http://c.example/")));
        assert_eq!(
            predicate.label(),
            "((host=a.example || host=b.example) && !path^=/private)"
        );
    }

    #[test]
    fn test_host_absent_never_matches() {
        assert!(!MatchPredicate::host("localhost").matches(&url("file:///etc/hosts")));
    }
}
