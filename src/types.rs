//! NewType wrappers for strong typing throughout the auth core.
//!
//! These types prevent accidental mixing of semantically different strings
//! (e.g., passing a refresh token where an access token is expected).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(
    /// Signed access token in its compact wire form.
    ///
    /// Opaque to callers: the only valid operations are carrying it back in
    /// a cookie/header and presenting it to the token codec for
    /// verification.
    AccessToken
);

newtype_string!(
    /// Signed refresh token in its compact wire form.
    ///
    /// Single-use once rotated: presenting a refresh token retires the
    /// session it belongs to and mints a replacement pair.
    RefreshToken
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_creation() {
        let token = AccessToken::new("abc");
        assert_eq!(token.as_str(), "abc");
        assert_eq!(token.to_string(), "abc");

        let token: AccessToken = "xyz".into();
        assert_eq!(token.as_str(), "xyz");
    }

    #[test]
    fn test_access_token_into_inner() {
        let token = AccessToken::new("eyJhbGciOi...");
        let inner: String = token.into_inner();
        assert_eq!(inner, "eyJhbGciOi...");
    }

    #[test]
    fn test_token_serde_transparent() {
        let token = RefreshToken::new("abc.def.ghi");
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "\"abc.def.ghi\"");

        let parsed: RefreshToken = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, token);
    }

    #[test]
    fn test_type_equality() {
        let a = AccessToken::new("t1");
        let b = AccessToken::new("t1");
        let c = AccessToken::new("t2");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_borrow_and_as_ref() {
        use std::borrow::Borrow;

        let token = RefreshToken::new("abc");
        let s: &str = token.borrow();
        assert_eq!(s, "abc");
        let s: &str = token.as_ref();
        assert_eq!(s, "abc");
    }
}
