//! Origin guard (pre-upgrade).
//!
//! Viewer pages are commonly embedded cross-origin, so the default accepts
//! every origin. Deployments that want tighter control switch to an
//! allowlist in config. Requests without an `Origin` header (non-browser
//! clients) are always accepted.

use axum::http::{header::ORIGIN, HeaderMap};

use vncrelay_core::error::{RelayError, Result};

use crate::config::OriginsSection;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OriginPolicy {
    #[default]
    AllowAll,
    /// Exact `scheme://host[:port]` matches, compared case-insensitively.
    Allowlist(Vec<String>),
}

impl OriginPolicy {
    pub fn from_section(s: &OriginsSection) -> Self {
        if s.allow_all {
            OriginPolicy::AllowAll
        } else {
            OriginPolicy::Allowlist(
                s.allowlist
                    .iter()
                    .map(|o| o.trim().trim_end_matches('/').to_ascii_lowercase())
                    .collect(),
            )
        }
    }

    pub fn check(&self, headers: &HeaderMap) -> Result<()> {
        let rules = match self {
            OriginPolicy::AllowAll => return Ok(()),
            OriginPolicy::Allowlist(rules) => rules,
        };
        let Some(origin) = headers.get(ORIGIN) else { return Ok(()); };
        let origin = origin
            .to_str()
            .map_err(|_| RelayError::Upgrade("origin header is not valid ascii".into()))?;
        let origin = origin.trim_end_matches('/').to_ascii_lowercase();
        if rules.iter().any(|r| *r == origin) {
            Ok(())
        } else {
            Err(RelayError::Upgrade(format!("request origin not allowed: {origin}")))
        }
    }
}
