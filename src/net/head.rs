//! Request and response heads shared by both connection kinds.

use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use http::{Extensions, Method, StatusCode, Uri};

use crate::net::connection::{ConnectionError, ResponseHead};

/// Request line and headers collected between `put_request_line` and `end_headers`.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    host: Option<String>,
    headers: HeaderMap,
}

impl RequestHead {
    pub fn new(method: &str, path: &str) -> Result<Self, ConnectionError> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| ConnectionError::InvalidMethod(method.to_string()))?;
        let uri = Uri::try_from(path).map_err(|_| ConnectionError::InvalidPath(path.to_string()))?;
        Ok(Self {
            method,
            uri,
            host: None,
            headers: HeaderMap::new(),
        })
    }

    pub fn append(&mut self, name: &str, value: &str) -> Result<(), ConnectionError> {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConnectionError::InvalidHeader(name.to_string()))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| ConnectionError::InvalidHeader(format!("{}: {}", name, value)))?;
        self.headers.append(header_name, header_value);
        Ok(())
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Replace the Host header.
    pub fn set_host(&mut self, value: impl Into<String>) {
        self.host = Some(value.into());
    }

    pub fn set_default_host(&mut self, value: impl Into<String>) {
        self.host.get_or_insert_with(|| value.into());
    }

    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }

    /// True when the headers announce a body.
    pub fn expects_body(&self) -> bool {
        self.content_length().map(|n| n > 0).unwrap_or(false) || self.headers.contains_key(TRANSFER_ENCODING)
    }

    /// Headers as sent, Host first.
    pub fn header_map(&self) -> Result<HeaderMap, ConnectionError> {
        let mut map = HeaderMap::with_capacity(self.headers.len() + 1);
        if let Some(host) = &self.host {
            let value = HeaderValue::from_str(host)
                .map_err(|_| ConnectionError::InvalidHeader(format!("Host: {}", host)))?;
            map.insert(HOST, value);
        }
        for (name, value) in &self.headers {
            map.append(name.clone(), value.clone());
        }
        Ok(map)
    }
}

/// `host` or `host:port`, omitting the port when it is the protocol default.
pub fn host_header(host: &str, port: u16, default_port: u16) -> String {
    if port == default_port {
        host.to_string()
    } else {
        format!("{}:{}", host, port)
    }
}

/// Build a `ResponseHead`, keeping the reason phrase the server actually sent.
pub fn response_head(
    status: StatusCode,
    headers: &HeaderMap,
    extensions: &Extensions,
    length: Option<u64>,
) -> ResponseHead {
    let reason = extensions
        .get::<hyper::ext::ReasonPhrase>()
        .map(|r| String::from_utf8_lossy(r.as_bytes()).into_owned())
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_default();

    ResponseHead {
        status: status.as_u16(),
        reason,
        headers: headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect(),
        length,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_tokens() {
        assert!(matches!(
            RequestHead::new("G E T", "/"),
            Err(ConnectionError::InvalidMethod(_))
        ));
        assert!(matches!(
            RequestHead::new("GET", "/a b"),
            Err(ConnectionError::InvalidPath(_))
        ));
        let mut head = RequestHead::new("GET", "/").unwrap();
        assert!(matches!(
            head.append("x-ms-meta-a", "1\r\nInjected: yes"),
            Err(ConnectionError::InvalidHeader(_))
        ));
    }

    #[test]
    fn host_goes_first_and_override_wins() {
        let mut head = RequestHead::new("GET", "/container?restype=container").unwrap();
        head.set_default_host("127.0.0.1:10000");
        head.append("x-ms-version", "2021-08-06").unwrap();
        head.set_host("blob.example:80");
        head.set_default_host("ignored");

        let map = head.header_map().unwrap();
        let names: Vec<_> = map.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["host", "x-ms-version"]);
        assert_eq!(map[HOST], "blob.example:80");
        assert_eq!(head.uri.to_string(), "/container?restype=container");
    }

    #[test]
    fn body_expectation_follows_headers() {
        let mut head = RequestHead::new("PUT", "/c/b").unwrap();
        assert!(!head.expects_body());
        head.append("Content-Length", "0").unwrap();
        assert!(!head.expects_body());

        let mut head = RequestHead::new("PUT", "/c/b").unwrap();
        head.append("Content-Length", "7").unwrap();
        assert_eq!(head.content_length(), Some(7));
        assert!(head.expects_body());
    }

    #[test]
    fn default_port_is_omitted() {
        assert_eq!(host_header("example.net", 443, 443), "example.net");
        assert_eq!(host_header("127.0.0.1", 10000, 80), "127.0.0.1:10000");
    }

    #[test]
    fn reason_falls_back_to_canonical() {
        let head = response_head(StatusCode::NOT_FOUND, &HeaderMap::new(), &Extensions::new(), Some(0));
        assert_eq!(head.reason, "Not Found");
        assert_eq!(head.status, 404);
    }
}
