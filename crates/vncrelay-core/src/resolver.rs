//! Session identifier → backend target resolution.
//!
//! The relay treats the resolver as an external collaborator: a total
//! function with no error return. An unusable target (empty string, bad
//! scheme, unreachable host) simply makes the backend dial fail later.

use std::collections::HashMap;

/// Maps an opaque session identifier to a backend WebSocket URL.
pub trait Resolver: Send + Sync {
    fn resolve(&self, id: &str) -> String;
}

impl<F> Resolver for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn resolve(&self, id: &str) -> String {
        self(id)
    }
}

/// Placeholder replaced by the identifier in URL templates.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Substitutes the identifier into a URL template (`{id}`).
///
/// A template without a placeholder resolves every identifier to the same
/// backend.
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    template: String,
}

impl TemplateResolver {
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into() }
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl Resolver for TemplateResolver {
    fn resolve(&self, id: &str) -> String {
        self.template.replace(ID_PLACEHOLDER, id)
    }
}

/// Exact-match lookup table with an optional template fallback.
///
/// Unknown identifiers without a fallback resolve to an empty target.
#[derive(Debug, Clone, Default)]
pub struct TableResolver {
    targets: HashMap<String, String>,
    fallback: Option<TemplateResolver>,
}

impl TableResolver {
    pub fn new(targets: HashMap<String, String>) -> Self {
        Self { targets, fallback: None }
    }

    pub fn with_fallback(mut self, fallback: TemplateResolver) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl Resolver for TableResolver {
    fn resolve(&self, id: &str) -> String {
        if let Some(t) = self.targets.get(id) {
            return t.clone();
        }
        match &self.fallback {
            Some(f) => f.resolve(id),
            None => {
                tracing::debug!(id = %id, "no backend target for identifier");
                String::new()
            }
        }
    }
}
