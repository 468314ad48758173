//! HTTP message value types observed by the proxy and probed by active rules.
//!
//! These are plain values, not live connections: the transport collaborator
//! turns an `HttpRequest` into an `HttpResponse`, and the scan pipeline only
//! ever reads or clones them.

use serde::{Deserialize, Serialize};
use url::Url;

/// Where a parameter was carried in the request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ParamKind {
    Url,
    Form,
    Cookie,
}

/// A single request parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Param {
    pub name: String,
    pub value: String,
    pub kind: ParamKind,
}

impl Param {
    pub fn new(name: impl Into<String>, value: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind,
        }
    }
}

/// An HTTP request as observed or crafted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub uri: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            version: "HTTP/1.1".to_string(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// First header value with the given name, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replace or insert a header, case-insensitive on the name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some((_, v)) => *v = value,
            None => self.headers.push((name.to_string(), value)),
        }
    }

    /// Drop a header if present, case-insensitive on the name.
    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Headers rendered one per line, the form rules match signatures against.
    pub fn headers_as_string(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.headers {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out
    }

    /// Parameters carried in the query string.
    pub fn url_params(&self) -> Vec<Param> {
        let Ok(url) = Url::parse(&self.uri) else {
            return Vec::new();
        };
        url.query_pairs()
            .map(|(name, value)| Param::new(name, value, ParamKind::Url))
            .collect()
    }

    /// Parameters carried in a form-encoded body.
    pub fn form_params(&self) -> Vec<Param> {
        let form = self
            .header("Content-Type")
            .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);
        if !form || self.body.is_empty() {
            return Vec::new();
        }
        url::form_urlencoded::parse(self.body.as_bytes())
            .map(|(name, value)| Param::new(name, value, ParamKind::Form))
            .collect()
    }

    /// Rewrite the query string from the given parameters.
    pub fn set_url_params(&mut self, params: &[Param]) {
        let Ok(mut url) = Url::parse(&self.uri) else {
            return;
        };
        if params.is_empty() {
            url.set_query(None);
        } else {
            let query: String = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params.iter().map(|p| (&p.name, &p.value)))
                .finish();
            url.set_query(Some(&query));
        }
        self.uri = url.to_string();
    }

    /// Host component of the request URI, lowercased.
    pub fn host(&self) -> Option<String> {
        Url::parse(&self.uri)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
    }
}

/// An HTTP response as received from the transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            reason: String::new(),
            version: "HTTP/1.1".to_string(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// First header value with the given name, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Headers rendered one per line, the form rules match signatures against.
    pub fn headers_as_string(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.headers {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out
    }

    fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// Whether the body is a textual format passive rules should inspect.
    pub fn is_text(&self) -> bool {
        let Some(ct) = self.content_type() else {
            return false;
        };
        let ct = ct.to_ascii_lowercase();
        ct.starts_with("text/")
            || ct.contains("json")
            || ct.contains("xml")
            || ct.contains("javascript")
    }

    /// Whether the body is an HTML document.
    pub fn is_html(&self) -> bool {
        self.content_type()
            .map(|ct| {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("xhtml")
            })
            .unwrap_or(false)
    }

    /// Status line, used as evidence by method-tampering rules.
    pub fn prime_header(&self) -> String {
        if self.reason.is_empty() {
            format!("{} {}", self.version, self.status)
        } else {
            format!("{} {} {}", self.version, self.status, self.reason)
        }
    }
}

/// One request/response pair flowing through the scan pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpMessage {
    pub request: HttpRequest,
    pub response: Option<HttpResponse>,
}

impl HttpMessage {
    pub fn new(request: HttpRequest) -> Self {
        Self {
            request,
            response: None,
        }
    }

    /// Whether a JavaScript resource is being served, by content type or path.
    pub fn is_javascript(&self) -> bool {
        if let Some(response) = &self.response {
            if let Some(ct) = response.header("Content-Type") {
                if ct.to_ascii_lowercase().contains("javascript") {
                    return true;
                }
            }
        }
        Url::parse(&self.request.uri)
            .ok()
            .map(|u| u.path().to_ascii_lowercase().ends_with(".js"))
            .unwrap_or(false)
    }
}
