use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestParseError {
    #[error("request text is empty")]
    Empty,
    #[error("request line is not `METHOD TARGET VERSION`: {0:?}")]
    MalformedRequestLine(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("request target {0:?} is relative and no Host header is present")]
    MissingHost(String),
    #[error("invalid request target {target:?}: {message}")]
    InvalidUrl { target: String, message: String },
}

/// A raw request split into request line, header block and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub method: String,
    pub target: String,
    pub version: String,
    /// Header name/value pairs in first-seen order. A repeated name replaces
    /// the earlier value.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ParsedRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Resolves the request target into an absolute URL.
    ///
    /// Origin-form targets (`/path?query`) are joined with the `Host` header
    /// under `default_scheme`.
    pub fn target_url(&self, default_scheme: &str) -> Result<Url, TargetError> {
        let absolute = if self.target.starts_with('/') {
            let host = self
                .header("Host")
                .map(str::trim)
                .filter(|host| !host.is_empty())
                .ok_or_else(|| TargetError::MissingHost(self.target.clone()))?;
            format!("{default_scheme}://{host}{}", self.target)
        } else {
            self.target.clone()
        };
        Url::parse(&absolute).map_err(|err| TargetError::InvalidUrl {
            target: self.target.clone(),
            message: err.to_string(),
        })
    }

    fn set_header(&mut self, name: &str, value: &str) {
        match self.headers.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }
}

/// Parses request text laid out as request line, header block, blank line, body.
///
/// The header block ends at the first line that is not a `Name: Value` pair
/// with a single colon-space separator. That terminating line is dropped and
/// everything after it is the body. A header value that itself contains `": "`
/// is indistinguishable from a malformed line and also ends the block.
pub fn parse_request(text: &str) -> Result<ParsedRequest, RequestParseError> {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    let request_line = lines[0];
    if request_line.trim().is_empty() {
        return Err(RequestParseError::Empty);
    }
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    let [method, target, version] = parts.as_slice() else {
        return Err(RequestParseError::MalformedRequestLine(
            request_line.to_string(),
        ));
    };

    let mut request = ParsedRequest {
        method: method.to_string(),
        target: target.to_string(),
        version: version.to_string(),
        headers: Vec::new(),
        body: String::new(),
    };

    let mut index = 1;
    while let Some((name, value)) = lines.get(index).and_then(|line| split_header(line)) {
        request.set_header(name, value);
        index += 1;
    }

    // The line that ends the header block is consumed, blank or not.
    let body_lines = lines.get(index + 1..).unwrap_or_default();
    request.body = body_lines.join("\n");
    Ok(request)
}

fn split_header(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(": ")?;
    if value.contains(": ") || name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    Some((name, value.trim_start()))
}
