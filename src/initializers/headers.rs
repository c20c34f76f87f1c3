use reqwest::header::{HeaderMap, HeaderName, HeaderValue, InvalidHeaderName, InvalidHeaderValue};
use thiserror::Error;

use super::{ConnectionInitializer, InitializerError};
use crate::handlers::Connection;

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("invalid header name '{0}': {1}")]
    Name(String, #[source] InvalidHeaderName),
    #[error("invalid value for header '{0}': {1}")]
    Value(String, #[source] InvalidHeaderValue),
}

/// Adds request headers to every connection that carries headers
#[derive(Debug, Clone, Default)]
pub struct HeaderInitializer {
    headers: HeaderMap,
}

impl HeaderInitializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: &str, value: &str) -> Result<Self, HeaderError> {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| HeaderError::Name(name.to_string(), e))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|e| HeaderError::Value(name.to_string(), e))?;
        self.headers.append(header_name, header_value);
        Ok(self)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl ConnectionInitializer for HeaderInitializer {
    fn initialize(&self, connection: &mut dyn Connection) -> Result<(), InitializerError> {
        if let Some(headers) = connection.headers_mut() {
            for (name, value) in &self.headers {
                headers.append(name.clone(), value.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{FileHandler, HttpConnection, HttpHandler, ProtocolHandler};
    use url::Url;

    #[test]
    fn test_headers_are_appended() {
        let init = HeaderInitializer::new()
            .header("X-Marker", "one")
            .unwrap()
            .header("x-marker", "two")
            .unwrap();

        let mut conn = HttpHandler::default()
            .open(&Url::parse("http://public.example/").unwrap())
            .unwrap();
        init.initialize(conn.as_mut()).unwrap();

        let http = conn.downcast_ref::<HttpConnection>().unwrap();
        let values: Vec<_> = http.headers().get_all("x-marker").iter().collect();
        assert_eq!(values, vec!["one", "two"]);
    }

    #[test]
    fn test_connection_without_headers_is_untouched() {
        let init = HeaderInitializer::new().header("X-Marker", "one").unwrap();
        let mut conn = FileHandler
            .open(&Url::parse("file:///tmp/data.bin").unwrap())
            .unwrap();
        assert!(init.initialize(conn.as_mut()).is_ok());
    }

    #[test]
    fn test_invalid_header_rejected() {
        assert!(matches!(
            HeaderInitializer::new().header("bad header", "v"),
            Err(HeaderError::Name(..))
        ));
        assert!(matches!(
            HeaderInitializer::new().header("X-Ok", "line\nbreak"),
            Err(HeaderError::Value(..))
        ));
    }
}
