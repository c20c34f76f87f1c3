use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use protoreg::config::{Config, RuleConfig, rule_predicate};
use protoreg::handlers::{
    BoundUrl, Connection, FileConnection, HttpConnection, ProtocolRegistry, Proxy,
};
use protoreg::observability::MetricsSnapshot;
use protoreg::platform;

use crate::cli::{ConfigArgs, ProbeArgs};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Serialize)]
struct ProbeSummary {
    url: String,
    handler: &'static str,
    kind: &'static str,
    proxy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    http: Option<HttpSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<MetricsSnapshot>,
}

#[derive(Debug, Serialize)]
struct HttpSummary {
    headers: BTreeMap<String, Vec<String>>,
    user_agent: String,
    connect_timeout_ms: u128,
    request_timeout_ms: u128,
    cookie_store: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tls: Option<TlsSummary>,
}

#[derive(Debug, Serialize)]
struct TlsSummary {
    identity: Option<&'static str>,
    root_certificates: usize,
    hostname_verifier: bool,
}

#[derive(Debug, Serialize)]
struct RuleSummary {
    position: usize,
    name: String,
    scope: String,
    actions: Vec<&'static str>,
}

fn load_config(path: Option<PathBuf>) -> Result<Config, BoxError> {
    let config = match path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

pub async fn run(args: ProbeArgs) -> Result<(), BoxError> {
    let mut config = load_config(args.config)?;
    config.registry.install = true;
    let registry = config.build_registry()?;

    let proxy = match &args.proxy {
        Some(value) => Proxy::parse(value)?,
        None => Proxy::Direct,
    };

    let bound = platform::url(&args.url)?;
    info!(url = %bound.url(), handler = bound.handler_name(), proxy = %proxy, "Opening connection");

    let connection = if proxy.is_direct() {
        bound.open_connection()?
    } else {
        bound.open_connection_with_proxy(&proxy)?
    };

    let summary = summarize(&bound, connection.as_ref(), &proxy, Some(&registry));
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if args.send {
        match connection.downcast_ref::<HttpConnection>() {
            Some(http) => {
                let response = http.send().await?;
                println!(
                    "{}",
                    serde_json::json!({
                        "status": response.status().as_u16(),
                        "content_length": response.content_length(),
                    })
                );
            }
            None => warn!(kind = connection.kind(), "--send only applies to HTTP connections"),
        }
    }

    Ok(())
}

pub fn show_config(args: ConfigArgs) -> Result<(), BoxError> {
    let config = load_config(args.config)?;
    print!("{}", config.to_toml()?);
    Ok(())
}

pub fn list_rules(args: ConfigArgs) -> Result<(), BoxError> {
    let config = load_config(args.config)?;
    let rules: Vec<RuleSummary> = config
        .rules
        .iter()
        .enumerate()
        .map(|(position, rule)| describe_rule(position, rule))
        .collect();

    println!("{}", serde_json::to_string_pretty(&rules)?);
    Ok(())
}

fn summarize(
    bound: &BoundUrl,
    connection: &dyn Connection,
    proxy: &Proxy,
    registry: Option<&ProtocolRegistry>,
) -> ProbeSummary {
    let http = connection.downcast_ref::<HttpConnection>().map(|http| {
        let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in http.headers() {
            headers
                .entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        HttpSummary {
            headers,
            user_agent: http.user_agent().to_string(),
            connect_timeout_ms: http.connect_timeout().as_millis(),
            request_timeout_ms: http.request_timeout().as_millis(),
            cookie_store: http.cookie_store(),
            tls: http.tls().map(|tls| TlsSummary {
                identity: tls.identity().map(|identity| identity.format()),
                root_certificates: tls.root_certificates().len(),
                hostname_verifier: tls.has_hostname_verifier(),
            }),
        }
    });

    ProbeSummary {
        url: connection.url().to_string(),
        handler: bound.handler_name(),
        kind: connection.kind(),
        proxy: proxy.to_string(),
        http,
        file: connection
            .downcast_ref::<FileConnection>()
            .map(|file| file.path().to_path_buf()),
        metrics: registry.map(ProtocolRegistry::metrics),
    }
}

fn describe_rule(position: usize, rule: &RuleConfig) -> RuleSummary {
    let mut actions = Vec::new();
    if !rule.headers.is_empty() {
        actions.push("headers");
    }
    if rule.accept_invalid_hostnames {
        actions.push("accept-invalid-hostnames");
    }
    if rule.client_identity.is_some() {
        actions.push("client-identity");
    }
    if !rule.root_certificates.is_empty() {
        actions.push("root-certificates");
    }
    if rule.cookies {
        actions.push("cookies");
    }

    RuleSummary {
        position,
        name: rule.name.clone(),
        scope: rule_predicate(rule).label().to_string(),
        actions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protoreg::initializers::HeaderInitializer;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_summarize_http_connection() {
        let registry = ProtocolRegistry::with_builtin_handlers(Default::default());
        registry.add_initializer(HeaderInitializer::new().header("X-Probe", "1").unwrap());

        let bound = registry.resolve_url("https://example.com/").unwrap();
        let conn = bound.open_connection().unwrap();
        let summary = summarize(&bound, conn.as_ref(), &Proxy::Direct, Some(&registry));

        assert_eq!(summary.kind, "https");
        assert_eq!(summary.proxy, "DIRECT");
        let http = summary.http.unwrap();
        assert_eq!(http.headers["x-probe"], vec!["1".to_string()]);
        assert!(http.tls.is_some());
        assert_eq!(summary.metrics.unwrap().connections_opened, 1);
        assert!(summary.file.is_none());
    }

    #[test]
    fn test_summarize_file_connection() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.txt");
        fs::write(&path, b"hello").unwrap();

        let registry = ProtocolRegistry::with_builtin_handlers(Default::default());
        let url = url::Url::from_file_path(&path).unwrap();
        let bound = registry.resolve_url(url.as_str()).unwrap();
        let conn = bound.open_connection().unwrap();
        let summary = summarize(&bound, conn.as_ref(), &Proxy::Direct, None);

        assert_eq!(summary.kind, "file");
        assert_eq!(summary.file, Some(path));
        assert!(summary.http.is_none());
        assert!(summary.metrics.is_none());
    }

    #[test]
    fn test_describe_rule() {
        let rule = RuleConfig {
            name: "internal".to_string(),
            protocol: Some("https".to_string()),
            host: Some("internal.example".to_string()),
            cookies: true,
            accept_invalid_hostnames: true,
            ..RuleConfig::default()
        };

        let summary = describe_rule(0, &rule);
        assert_eq!(summary.name, "internal");
        assert_eq!(summary.actions, vec!["accept-invalid-hostnames", "cookies"]);
        assert!(summary.scope.contains("internal.example"));
    }
}
