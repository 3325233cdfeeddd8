//! HTTP verb as a typed enum.
//!
//! A blueprint routes exactly these five verbs. Anything else a client
//! sends is rejected at the server boundary with `405 Method Not Allowed`
//! before the router is ever consulted.

use std::fmt;
use std::str::FromStr;

/// A routable HTTP verb.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Verb {
    Delete,
    Get,
    Patch,
    Post,
    Put,
}

impl Verb {
    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Get    => "GET",
            Self::Patch  => "PATCH",
            Self::Post   => "POST",
            Self::Put    => "PUT",
        }
    }

    /// Maps an [`http::Method`] onto a routable verb.
    ///
    /// Returns `None` for everything a blueprint cannot declare
    /// (HEAD, OPTIONS, WebDAV extensions, …).
    pub fn from_method(method: &http::Method) -> Option<Self> {
        method.as_str().parse().ok()
    }
}

/// Parses an uppercase verb string (e.g. `"GET"`). Case-sensitive per RFC 9110 §9.1.
impl FromStr for Verb {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DELETE" => Ok(Self::Delete),
            "GET"    => Ok(Self::Get),
            "PATCH"  => Ok(Self::Patch),
            "POST"   => Ok(Self::Post),
            "PUT"    => Ok(Self::Put),
            _        => Err(()),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_the_wire_form() {
        for verb in [Verb::Delete, Verb::Get, Verb::Patch, Verb::Post, Verb::Put] {
            assert_eq!(verb.as_str().parse::<Verb>(), Ok(verb));
        }
    }

    #[test]
    fn rejects_unroutable_methods() {
        assert!("HEAD".parse::<Verb>().is_err());
        assert!("get".parse::<Verb>().is_err());
        assert_eq!(Verb::from_method(&http::Method::OPTIONS), None);
        assert_eq!(Verb::from_method(&http::Method::POST), Some(Verb::Post));
    }
}
