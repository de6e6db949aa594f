use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("invalid page url: {0}")]
    Parse(#[from] url::ParseError),
    #[error("page url has no host")]
    MissingHost,
    #[error("unsupported page scheme: {0}")]
    Scheme(String),
}

/// Snapshot of the page location at the moment an escape is requested.
/// Always re-captured from the host, never cached across user actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentLocation {
    scheme: String,
    host: String,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl CurrentLocation {
    pub fn parse(href: &str) -> Result<Self, LocationError> {
        let url = Url::parse(href)?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(LocationError::Scheme(other.to_string())),
        }
        let host_str = url.host_str().ok_or(LocationError::MissingHost)?;
        let host = match url.port() {
            Some(port) => format!("{host_str}:{port}"),
            None => host_str.to_string(),
        };
        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            path: url.path().to_string(),
            query: url.query().map(str::to_string),
            fragment: url.fragment().map(str::to_string),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn is_secure(&self) -> bool {
        self.scheme == "https"
    }

    /// Host, path, query and fragment without the scheme prefix, as consumed
    /// by intent URIs and scheme rewrites.
    pub fn suffix(&self) -> String {
        let mut out = format!("{}{}", self.host, self.path);
        if let Some(query) = &self.query {
            out.push('?');
            out.push_str(query);
        }
        if let Some(fragment) = &self.fragment {
            out.push('#');
            out.push_str(fragment);
        }
        out
    }

    pub fn href(&self) -> String {
        format!("{}://{}", self.scheme, self.suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_query_and_fragment() {
        let location = CurrentLocation::parse("https://app.example.com/sign-in?ref=x#top").unwrap();
        assert_eq!(location.scheme(), "https");
        assert_eq!(location.suffix(), "app.example.com/sign-in?ref=x#top");
        assert_eq!(location.href(), "https://app.example.com/sign-in?ref=x#top");
    }

    #[test]
    fn parse_keeps_explicit_port() {
        let location = CurrentLocation::parse("http://localhost:3000/").unwrap();
        assert!(!location.is_secure());
        assert_eq!(location.href(), "http://localhost:3000/");
    }

    #[test]
    fn parse_rejects_non_web_schemes() {
        let err = CurrentLocation::parse("file:///etc/passwd").unwrap_err();
        assert!(matches!(err, LocationError::Scheme(_)));
    }
}
