//! Intercepted requests and the responses sent back
//!
//! Methods, status codes and headers are the `http` crate's. The service
//! worker hands over method, path and decoded form fields; the CLI builds the
//! same request from a text line.

use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Method, StatusCode};

use crate::error::{AppError, Result};

/// Content type of every HTML fragment the dog routes return.
pub const CONTENT_TYPE_HTML: &str = "application/html";

pub const CONTENT_TYPE_TEXT: &str = "text/plain;charset=UTF-8";

/// A response to an intercepted request.
pub type Response = http::Response<String>;

/// Parse a method name, ignoring case.
pub fn parse_method(raw: &str) -> Result<Method> {
    Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
        .map_err(|_| AppError::Method(raw.to_string()))
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Path without query string
    pub path: String,
    /// Submitted form fields, in submission order
    pub form: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = match path.split_once('?') {
            Some((p, _)) => p.to_string(),
            None => path,
        };
        Self {
            method,
            path,
            form: Vec::new(),
        }
    }

    pub fn with_form<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.form
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Parse `METHOD PATH [k=v&k=v]`.
    pub fn parse_line(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let method = parts
            .next()
            .ok_or_else(|| AppError::Request("empty request line".into()))
            .and_then(parse_method)?;
        let path = parts
            .next()
            .ok_or_else(|| AppError::Request(format!("missing path in {:?}", line)))?;
        if !path.starts_with('/') {
            return Err(AppError::Request(format!("path must start with '/': {:?}", path)));
        }

        let form = match parts.next() {
            Some(body) => parse_form(body),
            None => Vec::new(),
        };
        if let Some(extra) = parts.next() {
            return Err(AppError::Request(format!("unexpected {:?} after form body", extra)));
        }

        Ok(Request::new(method, path).with_form(form))
    }
}

/// Decode an `application/x-www-form-urlencoded` body.
pub fn parse_form(body: &str) -> Vec<(String, String)> {
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (decode_component(k), decode_component(v)),
            None => (decode_component(pair), String::new()),
        })
        .collect()
}

fn decode_component(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => match (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                (Some(hi), Some(lo)) => {
                    out.push(hi << 4 | lo);
                    i += 2;
                }
                _ => out.push(b'%'),
            },
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

fn respond(status: StatusCode, content_type: &'static str, body: String) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// `200` with an HTML fragment.
pub fn html_response(body: impl Into<String>) -> Response {
    respond(StatusCode::OK, CONTENT_TYPE_HTML, body.into())
}

/// `200` with plain text.
pub fn text_response(body: impl Into<String>) -> Response {
    respond(StatusCode::OK, CONTENT_TYPE_TEXT, body.into())
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    respond(status, CONTENT_TYPE_TEXT, message.into())
}

/// The `Content-Type` of `response`, empty when unset.
pub fn content_type(response: &Response) -> &str {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}
