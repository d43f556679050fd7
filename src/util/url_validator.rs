use std::net::IpAddr;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// Plain HTTP to a non-loopback host would leak the session cookie.
    #[error("Insecure base URL: HTTPS required (except localhost)")]
    InsecureBaseUrl,
    #[error("URL has no host")]
    MissingHost,
}

/// Validates the service origin.
///
/// HTTPS is required; plain HTTP is accepted only for `localhost` and loopback
/// addresses so a development server can be used. Any path is stripped so
/// endpoint paths can be joined onto the result.
///
/// ```
/// use shortfeed::util::validate_base_url;
///
/// assert!(validate_base_url("https://shorts.example.com").is_ok());
/// assert!(validate_base_url("http://localhost:3000").is_ok());
/// assert!(validate_base_url("http://shorts.example.com").is_err());
/// ```
pub fn validate_base_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let mut url = validate_endpoint_url(url_str)?;
    url.set_path("/");
    Ok(url)
}

/// Same scheme rules as [`validate_base_url`], but keeps the path so the
/// result can be used as a prefix. A trailing slash is added when missing.
pub fn validate_endpoint_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let mut url = Url::parse(url_str)?;

    match url.scheme() {
        "https" => {}
        "http" => {
            if !is_loopback_host(&url) {
                return Err(UrlValidationError::InsecureBaseUrl);
            }
            tracing::warn!(url = %url, "Using non-HTTPS endpoint (localhost only)");
        }
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().is_none() {
        return Err(UrlValidationError::MissingHost);
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Validates a media URL before handing it to the system opener.
///
/// Media URLs come from other users' uploads, so only http/https are passed on;
/// `file://` and custom schemes could launch arbitrary handlers.
pub fn validate_media_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
    if url.host_str().is_none() {
        return Err(UrlValidationError::MissingHost);
    }
    Ok(url)
}

fn is_loopback_host(url: &Url) -> bool {
    match url.host_str() {
        Some("localhost") => true,
        Some(host) => {
            let host = host
                .strip_prefix('[')
                .and_then(|h| h.strip_suffix(']'))
                .unwrap_or(host);
            host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
        }
        None => false,
    }
}
