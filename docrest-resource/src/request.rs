//! Transport-neutral request and response values.
//!
//! Routing and HTTP framing live outside this crate. A router resolves the resource, builds a
//! [`Request`] with the remaining path segments already split into a [`ResourcePath`], and
//! writes the returned [`Response`] back to the client.

use serde_json::Value;
use std::{fmt, str::FromStr};

use crate::error::{RestError, RestResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = RestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            other => Err(RestError::MalformedRequest(format!("unsupported method {other}"))),
        }
    }
}

/// Path segments following the resource name: `/{id}/{field}/{nested_id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePath {
    pub id: Option<String>,
    pub field: Option<String>,
    pub nested_id: Option<String>,
}

impl ResourcePath {
    /// `/resource`
    pub fn root() -> Self {
        Self::default()
    }

    /// `/resource/{id}`
    pub fn item(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// `/resource/{id}/{field}`
    pub fn nested(id: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            field: Some(field.into()),
            nested_id: None,
        }
    }

    /// `/resource/{id}/{field}/{nested_id}`
    pub fn nested_item(id: impl Into<String>, field: impl Into<String>, nested_id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            field: Some(field.into()),
            nested_id: Some(nested_id.into()),
        }
    }

    /// Splits the path remainder after the resource name. Empty segments are skipped.
    pub fn parse(remainder: &str) -> RestResult<Self> {
        let segments: Vec<&str> = remainder.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Ok(Self::root()),
            [id] => Ok(Self::item(*id)),
            [id, field] => Ok(Self::nested(*id, *field)),
            [id, field, nested_id] => Ok(Self::nested_item(*id, *field, *nested_id)),
            _ => Err(RestError::MalformedRequest(format!("unsupported path {remainder}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: ResourcePath,
    /// Decoded query parameters, in the order they appeared.
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Request {
    pub fn new(method: Method, path: ResourcePath) -> Self {
        Self {
            method,
            path,
            params: Vec::new(),
            body: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Appends every `key=value` pair of an already-decoded query string.
    pub fn with_query(mut self, query: &str) -> Self {
        let pairs = query
            .trim_start_matches('?')
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (pair.to_string(), String::new()),
            });

        self.params.extend(pairs);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// The request body, which must be a JSON object.
    pub fn json_object(&self) -> RestResult<&Value> {
        match &self.body {
            Some(body @ Value::Object(_)) => Ok(body),
            Some(_) => Err(RestError::MalformedRequest("request body must be a JSON object".into())),
            None => Err(RestError::MalformedRequest("request body is missing".into())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200).with_body(body)
    }

    pub fn created(body: Value) -> Self {
        Self::new(201).with_body(body)
    }

    pub fn no_content() -> Self {
        Self::new(204)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.headers.push((name.into(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Looks a header up by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_remainders_split_into_segments() {
        assert_eq!(ResourcePath::parse("").unwrap(), ResourcePath::root());
        assert_eq!(ResourcePath::parse("/a/").unwrap(), ResourcePath::item("a"));
        assert_eq!(ResourcePath::parse("a/tags/b").unwrap(), ResourcePath::nested_item("a", "tags", "b"));
        assert!(ResourcePath::parse("a/tags/b/c").is_err());
    }

    #[test]
    fn query_strings_keep_parameter_order() {
        let request = Request::new(Method::Get, ResourcePath::root()).with_query("?age__gte=10&$sort=-age&flag");

        assert_eq!(
            request.params,
            vec![
                ("age__gte".to_string(), "10".to_string()),
                ("$sort".to_string(), "-age".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn methods_parse_case_insensitively() {
        assert_eq!("patch".parse::<Method>().unwrap(), Method::Patch);
        assert!("TRACE".parse::<Method>().is_err());
    }
}
