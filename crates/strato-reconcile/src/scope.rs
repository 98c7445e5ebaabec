//! Parent scope addressing
//!
//! Most resources are nested under either an account or a zone; a handful
//! accept both. [`Scope`] carries the container kind together with its
//! identifier so reconcilers and clients can build paths without tracking
//! two optional fields.

/// The parent container a resource is nested under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Account(String),
    Zone(String),
}

impl Scope {
    /// The container identifier, regardless of kind.
    pub fn id(&self) -> &str {
        match self {
            Scope::Account(id) | Scope::Zone(id) => id,
        }
    }

    /// The container kind as used in import identifiers.
    pub fn kind(&self) -> &'static str {
        match self {
            Scope::Account(_) => "account",
            Scope::Zone(_) => "zone",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind(), self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_id() {
        let scope = Scope::Zone("abc123".to_string());
        assert_eq!(scope.kind(), "zone");
        assert_eq!(scope.id(), "abc123");
        assert_eq!(scope.to_string(), "zone abc123");
    }
}
