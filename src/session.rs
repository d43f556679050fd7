//! Who is signed in, and where to send them when nobody is.

use crate::api::Viewer;
use thiserror::Error;
use url::Url;

/// A mutation was attempted without a signed-in viewer.
///
/// Carries the sign-in location so the caller can redirect instead of
/// dropping the action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Sign in required: {sign_in_url}")]
pub struct AuthRequired {
    pub sign_in_url: Url,
}

/// Sign-in page on the identity provider that returns to `callback` afterwards.
pub fn sign_in_url(base: &Url, callback: &str) -> Url {
    let mut url = base.clone();
    url.set_path("/api/auth/signin");
    url.set_query(None);
    url.query_pairs_mut().append_pair("callbackUrl", callback);
    url
}

/// Current viewer, if any.
#[derive(Debug, Clone)]
pub struct SessionState {
    viewer: Option<Viewer>,
    base: Url,
}

impl SessionState {
    pub fn signed_out(base: Url) -> Self {
        Self { viewer: None, base }
    }

    pub fn signed_in(base: Url, viewer: Viewer) -> Self {
        Self {
            viewer: Some(viewer),
            base,
        }
    }

    pub fn viewer(&self) -> Option<&Viewer> {
        self.viewer.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.viewer.is_some()
    }

    pub fn set_viewer(&mut self, viewer: Option<Viewer>) {
        match &viewer {
            Some(v) => tracing::info!(viewer_id = %v.id, "Session resolved"),
            None => tracing::info!("No active session"),
        }
        self.viewer = viewer;
    }

    pub fn sign_in_url(&self) -> Url {
        sign_in_url(&self.base, "/")
    }

    /// The viewer, or the sign-in redirect if there is none.
    pub fn require(&self) -> Result<&Viewer, AuthRequired> {
        self.viewer.as_ref().ok_or_else(|| AuthRequired {
            sign_in_url: self.sign_in_url(),
        })
    }

    /// Whether the signed-in viewer wrote the comment with `author_id`.
    pub fn owns(&self, author_id: &str) -> bool {
        self.viewer.as_ref().is_some_and(|v| v.id == author_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://shorts.example.com/").unwrap()
    }

    fn viewer(id: &str) -> Viewer {
        Viewer {
            id: id.into(),
            username: None,
            name: None,
        }
    }

    #[test]
    fn test_sign_in_url_carries_callback() {
        let url = sign_in_url(&base(), "/");
        assert_eq!(
            url.as_str(),
            "https://shorts.example.com/api/auth/signin?callbackUrl=%2F"
        );
    }

    #[test]
    fn test_require_signed_out_returns_redirect() {
        let session = SessionState::signed_out(base());
        let err = session.require().unwrap_err();
        assert_eq!(err.sign_in_url.path(), "/api/auth/signin");
    }

    #[test]
    fn test_owns_matches_viewer_id() {
        let session = SessionState::signed_in(base(), viewer("u1"));
        assert!(session.owns("u1"));
        assert!(!session.owns("u2"));
        assert!(!SessionState::signed_out(base()).owns("u1"));
    }
}
