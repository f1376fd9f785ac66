//! Payload encoders applied before substitution into a template.
//!
//! Every encoder is a deterministic, side-effect free string transform. The
//! strategy is picked once per run through [`EncoderKind::encoder`].

use std::fmt;

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;

pub trait Encoder: Send + Sync {
    fn encode(&self, payload: &str) -> String;
}

/// Form-style percent encoding; spaces become `+`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UrlEncoder;

/// Percent encoding suitable for cookie values; spaces become `%20`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CookieEncoder;

/// Quoted, escaped JSON string literal.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonEncoder;

/// Escapes the five XML special characters.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlEncoder;

#[derive(Debug, Default, Clone, Copy)]
pub struct Base64Encoder;

/// URL-safe alphabet, padding kept.
#[derive(Debug, Default, Clone, Copy)]
pub struct Base64UrlEncoder;

/// Leaves the payload untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityEncoder;

impl Encoder for UrlEncoder {
    fn encode(&self, payload: &str) -> String {
        percent_encode(payload, "+")
    }
}

impl Encoder for CookieEncoder {
    fn encode(&self, payload: &str) -> String {
        percent_encode(payload, "%20")
    }
}

impl Encoder for JsonEncoder {
    fn encode(&self, payload: &str) -> String {
        serde_json::Value::String(payload.to_string()).to_string()
    }
}

impl Encoder for XmlEncoder {
    fn encode(&self, payload: &str) -> String {
        let mut encoded = String::with_capacity(payload.len());
        for ch in payload.chars() {
            match ch {
                '&' => encoded.push_str("&amp;"),
                '<' => encoded.push_str("&lt;"),
                '>' => encoded.push_str("&gt;"),
                '"' => encoded.push_str("&quot;"),
                '\'' => encoded.push_str("&apos;"),
                _ => encoded.push(ch),
            }
        }
        encoded
    }
}

impl Encoder for Base64Encoder {
    fn encode(&self, payload: &str) -> String {
        STANDARD.encode(payload.as_bytes())
    }
}

impl Encoder for Base64UrlEncoder {
    fn encode(&self, payload: &str) -> String {
        URL_SAFE.encode(payload.as_bytes())
    }
}

impl Encoder for IdentityEncoder {
    fn encode(&self, payload: &str) -> String {
        payload.to_string()
    }
}

/// Percent-encodes everything but ASCII alphanumerics and `_.-~`.
fn percent_encode(input: &str, space: &str) -> String {
    let mut encoded = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            b' ' => encoded.push_str(space),
            _ => {
                encoded.push('%');
                encoded.push_str(&format!("{:02X}", byte));
            }
        }
    }
    encoded
}

/// Named encoding strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EncoderKind {
    Url,
    Json,
    Cookie,
    Xml,
    Base64,
    Base64Url,
    #[default]
    None,
}

impl EncoderKind {
    pub fn all() -> &'static [EncoderKind] {
        &[
            EncoderKind::Url,
            EncoderKind::Json,
            EncoderKind::Cookie,
            EncoderKind::Xml,
            EncoderKind::Base64,
            EncoderKind::Base64Url,
            EncoderKind::None,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            EncoderKind::Url => "url",
            EncoderKind::Json => "json",
            EncoderKind::Cookie => "cookie",
            EncoderKind::Xml => "xml",
            EncoderKind::Base64 => "base64",
            EncoderKind::Base64Url => "base64url",
            EncoderKind::None => "none",
        }
    }

    /// Looks up an encoder by name; unknown names fall back to [`EncoderKind::None`].
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
            .unwrap_or_default()
    }

    pub fn encoder(&self) -> &'static dyn Encoder {
        match self {
            EncoderKind::Url => &UrlEncoder,
            EncoderKind::Json => &JsonEncoder,
            EncoderKind::Cookie => &CookieEncoder,
            EncoderKind::Xml => &XmlEncoder,
            EncoderKind::Base64 => &Base64Encoder,
            EncoderKind::Base64Url => &Base64UrlEncoder,
            EncoderKind::None => &IdentityEncoder,
        }
    }
}

impl fmt::Display for EncoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
