//! Contexts: named URL scopes used to group targets and scope alert filters.

use regex::Regex;

use crate::errors::ScanError;

/// A named scope over the target application, defined by ordered include and
/// exclude patterns matched against full URIs.
#[derive(Debug, Clone)]
pub struct Context {
    pub id: i64,
    pub name: String,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl Context {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    /// Add an include pattern. Invalid patterns are a caller error.
    pub fn include(mut self, pattern: &str) -> Result<Self, ScanError> {
        let regex = Regex::new(pattern)
            .map_err(|e| ScanError::Validation(format!("invalid include pattern: {e}")))?;
        self.include.push(regex);
        Ok(self)
    }

    /// Add an exclude pattern. Excludes win over includes.
    pub fn exclude(mut self, pattern: &str) -> Result<Self, ScanError> {
        let regex = Regex::new(pattern)
            .map_err(|e| ScanError::Validation(format!("invalid exclude pattern: {e}")))?;
        self.exclude.push(regex);
        Ok(self)
    }

    /// Whether the URI falls inside this context's scope.
    pub fn is_in_context(&self, uri: &str) -> bool {
        if !self.include.iter().any(|p| p.is_match(uri)) {
            return false;
        }
        !self.exclude.iter().any(|p| p.is_match(uri))
    }
}

/// Registration-ordered set of contexts for the current session.
///
/// Order matters: context filter evaluation walks contexts in the order they
/// were registered, so lookups preserve it.
#[derive(Debug, Default)]
pub struct SessionContexts {
    contexts: Vec<Context>,
}

impl SessionContexts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a context. Duplicate ids are rejected.
    pub fn add(&mut self, context: Context) -> Result<(), ScanError> {
        if self.contexts.iter().any(|c| c.id == context.id) {
            return Err(ScanError::Conflict(format!(
                "context id {} already registered",
                context.id
            )));
        }
        self.contexts.push(context);
        Ok(())
    }

    /// Remove a context, returning whether it existed.
    pub fn remove(&mut self, context_id: i64) -> bool {
        let before = self.contexts.len();
        self.contexts.retain(|c| c.id != context_id);
        self.contexts.len() != before
    }

    pub fn get(&self, context_id: i64) -> Option<&Context> {
        self.contexts.iter().find(|c| c.id == context_id)
    }

    /// Contexts whose scope contains the URI, in registration order.
    pub fn for_url<'a>(&'a self, uri: &'a str) -> impl Iterator<Item = &'a Context> {
        self.contexts.iter().filter(move |c| c.is_in_context(uri))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Context> {
        self.contexts.iter()
    }
}
