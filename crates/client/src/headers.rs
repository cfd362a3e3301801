//! Content headers: the headers that describe a body rather than a message.
//!
//! [`ContentHeaders`] keeps them in a [`HeaderMap`] next to a dedicated
//! content-length slot. The slot is filled lazily by the owning
//! [`HttpContent`](crate::content::HttpContent) the first time the headers are
//! looked at, unless a length was set explicitly.

use std::fmt;
use std::str::FromStr;

use http::header::{
    ALLOW, CONTENT_DISPOSITION, CONTENT_ENCODING, CONTENT_LANGUAGE, CONTENT_LENGTH, CONTENT_LOCATION, CONTENT_RANGE,
    CONTENT_TYPE, EXPIRES, IntoHeaderName, LAST_MODIFIED,
};
use http::{HeaderMap, HeaderName, HeaderValue};
use mime::Mime;

use crate::HttpError;
use crate::content::Encoding;

/// Returns true for header names that belong to the content rather than the message.
pub fn is_content_header(name: &HeaderName) -> bool {
    let content_headers = [
        ALLOW,
        CONTENT_DISPOSITION,
        CONTENT_ENCODING,
        CONTENT_LANGUAGE,
        CONTENT_LENGTH,
        CONTENT_LOCATION,
        CONTENT_RANGE,
        CONTENT_TYPE,
        EXPIRES,
        LAST_MODIFIED,
    ];
    content_headers.contains(name) || name.as_str() == "content-md5"
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LengthSlot {
    /// Not looked at yet.
    Pending,
    /// Resolved from the content, `None` once the content could not tell.
    Computed(Option<u64>),
    /// Set by the caller, never recomputed.
    Explicit(u64),
}

#[derive(Debug, Clone)]
pub struct ContentHeaders {
    headers: HeaderMap,
    length: LengthSlot,
}

impl Default for ContentHeaders {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentHeaders {
    pub fn new() -> Self {
        Self { headers: HeaderMap::new(), length: LengthSlot::Pending }
    }

    /// The content length, if known.
    ///
    /// Read through [`HttpContent::headers`](crate::content::HttpContent::headers)
    /// to get the lazily computed value.
    pub fn content_length(&self) -> Option<u64> {
        match self.length {
            LengthSlot::Explicit(length) | LengthSlot::Computed(Some(length)) => Some(length),
            LengthSlot::Pending | LengthSlot::Computed(None) => None,
        }
    }

    /// Sets the content length explicitly, `None` goes back to computing it.
    pub fn set_content_length(&mut self, length: Option<u64>) {
        self.length = length.map_or(LengthSlot::Pending, LengthSlot::Explicit);
    }

    /// True when the caller set the content length, as opposed to it being computed.
    pub fn is_content_length_explicit(&self) -> bool {
        matches!(self.length, LengthSlot::Explicit(_))
    }

    pub(crate) fn is_length_pending(&self) -> bool {
        self.length == LengthSlot::Pending
    }

    pub(crate) fn set_computed_length(&mut self, length: Option<u64>) {
        if !self.is_content_length_explicit() {
            self.length = LengthSlot::Computed(length);
        }
    }

    pub fn content_type(&self) -> Option<Mime> {
        self.headers.get(CONTENT_TYPE)?.to_str().ok()?.parse().ok()
    }

    pub fn set_content_type(&mut self, mime: &Mime) -> Result<(), HttpError> {
        let value = HeaderValue::from_str(mime.as_ref()).map_err(|e| HttpError::argument("content_type", e))?;
        self.headers.insert(CONTENT_TYPE, value);
        Ok(())
    }

    /// The `charset` parameter of the content type, lowercased.
    pub fn charset(&self) -> Option<String> {
        let content_type = self.content_type()?;
        content_type.get_param(mime::CHARSET).map(|charset| charset.as_str().to_string())
    }

    /// The encoding named by the charset parameter.
    ///
    /// Fails when a charset is present but not supported.
    pub fn encoding(&self) -> Result<Option<Encoding>, HttpError> {
        match self.charset() {
            None => Ok(None),
            Some(charset) => Encoding::for_label(&charset)
                .map(Some)
                .ok_or_else(|| HttpError::invalid_operation(format!("the character set `{charset}` is not supported"))),
        }
    }

    pub fn content_disposition(&self) -> Option<ContentDisposition> {
        self.headers.get(CONTENT_DISPOSITION)?.to_str().ok()?.parse().ok()
    }

    pub fn set_content_disposition(&mut self, disposition: &ContentDisposition) -> Result<(), HttpError> {
        let value =
            HeaderValue::from_str(&disposition.to_string()).map_err(|e| HttpError::argument("content_disposition", e))?;
        self.headers.insert(CONTENT_DISPOSITION, value);
        Ok(())
    }

    pub fn get<K: http::header::AsHeaderName>(&self, name: K) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    pub fn contains_key<K: http::header::AsHeaderName>(&self, name: K) -> bool {
        self.headers.contains_key(name)
    }

    /// Inserts a header, replacing previous values. `Content-Length` goes to the length slot.
    pub fn insert<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) {
        self.headers.insert(name, value);
        self.take_content_length_header();
    }

    /// Adds a header value without removing previous ones.
    pub fn append<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) {
        self.headers.append(name, value);
        self.take_content_length_header();
    }

    pub fn remove<K: http::header::AsHeaderName>(&mut self, name: K) -> Option<HeaderValue> {
        self.headers.remove(name)
    }

    /// Iterates the headers as (name, value) pairs, one pair per value.
    pub fn iter(&self) -> http::header::Iter<'_, HeaderValue> {
        self.headers.iter()
    }

    /// Iterates distinct header names with all their values joined by `, `.
    pub fn joined(&self) -> impl Iterator<Item = (&HeaderName, String)> + '_ {
        self.headers.keys().map(|name| {
            let values = self
                .headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(", ");
            (name, values)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn as_header_map(&self) -> &HeaderMap {
        &self.headers
    }

    fn take_content_length_header(&mut self) {
        let Some(value) = self.headers.remove(CONTENT_LENGTH) else {
            return;
        };
        if let Some(length) = value.to_str().ok().and_then(|v| v.trim().parse().ok()) {
            self.length = LengthSlot::Explicit(length);
        }
    }
}

/// A `Content-Disposition` value such as `form-data; name=field; filename=a.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    disposition_type: String,
    parameters: Vec<(String, String)>,
}

impl ContentDisposition {
    pub fn new(disposition_type: impl Into<String>) -> Self {
        Self { disposition_type: disposition_type.into(), parameters: Vec::new() }
    }

    pub fn form_data() -> Self {
        Self::new("form-data")
    }

    pub fn disposition_type(&self) -> &str {
        &self.disposition_type
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
    }

    /// Sets a parameter, replacing any previous value of the same name.
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.parameters.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(&name)) {
            Some(entry) => entry.1 = value,
            None => self.parameters.push((name, value)),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.parameter("name")
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.set_parameter("name", name);
    }

    pub fn file_name(&self) -> Option<&str> {
        self.parameter("filename")
    }

    pub fn set_file_name(&mut self, file_name: impl Into<String>) {
        self.set_parameter("filename", file_name);
    }
}

fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value.bytes().all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

impl fmt::Display for ContentDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.disposition_type)?;
        for (name, value) in &self.parameters {
            if is_token(value) {
                write!(f, "; {name}={value}")?;
            } else {
                write!(f, "; {name}=\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))?;
            }
        }
        Ok(())
    }
}

impl FromStr for ContentDisposition {
    type Err = HttpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(';');
        let disposition_type = parts.next().map(str::trim).unwrap_or_default();
        if !is_token(disposition_type) {
            return Err(HttpError::argument("content_disposition", format!("invalid disposition type `{disposition_type}`")));
        }

        let mut disposition = Self::new(disposition_type);
        for part in parts {
            let Some((name, value)) = part.split_once('=') else {
                continue;
            };
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .map_or_else(|| value.to_string(), |v| v.replace("\\\"", "\"").replace("\\\\", "\\"));
            disposition.set_parameter(name.trim(), value);
        }
        Ok(disposition)
    }
}
