//! Scope parsing, extraction from token claims, and required-scope checks.
//!
//! Issuers disagree on where scopes live in an access token. Five claim
//! names are inspected, each either a delimited string or a list of strings,
//! and the results are merged.

use serde_json::{Map, Value};

use super::error::OAuthError;

/// Claim names inspected for scopes, in the order they are merged.
pub const SCOPE_CLAIMS: [&str; 5] = ["scope", "scopes", "scp", "permissions", "roles"];

/// Split a whitespace- or comma-delimited scope list into trimmed, non-empty
/// pieces.
pub fn split_scopes(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(|c: char| c.is_whitespace() || c == ',')
        .map(str::trim)
        .filter(|scope| !scope.is_empty())
}

/// Collect scopes, dropping duplicates while keeping first-seen order.
pub fn unique_scopes<'a>(scopes: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for scope in scopes {
        if !unique.iter().any(|s| s == scope) {
            unique.push(scope.to_string());
        }
    }
    unique
}

/// The shape a scope claim can take.
#[derive(Debug, Clone, Copy)]
enum ScopeClaim<'a> {
    /// `"read write"` or `"read,write"`.
    Delimited(&'a str),
    /// `["read", "write"]`; non-string elements are ignored.
    List(&'a [Value]),
}

impl<'a> ScopeClaim<'a> {
    fn from_value(value: &'a Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(ScopeClaim::Delimited(s)),
            Value::Array(items) => Some(ScopeClaim::List(items)),
            _ => None,
        }
    }

    fn scopes(self) -> Box<dyn Iterator<Item = &'a str> + 'a> {
        match self {
            ScopeClaim::Delimited(s) => Box::new(split_scopes(s)),
            ScopeClaim::List(items) => Box::new(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|scope| !scope.is_empty()),
            ),
        }
    }
}

/// Extract the union of scopes across every recognised scope claim.
pub fn extract_scopes(claims: &Map<String, Value>) -> Vec<String> {
    unique_scopes(
        SCOPE_CLAIMS
            .iter()
            .filter_map(|name| claims.get(*name))
            .filter_map(ScopeClaim::from_value)
            .flat_map(ScopeClaim::scopes),
    )
}

/// Scopes a token must carry for any request to succeed.
///
/// All scopes must be present (AND semantics).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeRequirement {
    required: Vec<String>,
}

impl ScopeRequirement {
    pub fn new(required: Vec<String>) -> Self {
        Self { required }
    }

    /// Check granted scopes against the requirement.
    ///
    /// Returns `Err(OAuthError::InsufficientScope)` naming exactly the
    /// required scopes that were not granted.
    pub fn check(&self, granted: &[String]) -> Result<(), OAuthError> {
        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|scope| !granted.contains(scope))
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(OAuthError::InsufficientScope { missing })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("claims must be an object"),
        }
    }

    #[test]
    fn test_split_scopes_whitespace_and_commas() {
        let scopes: Vec<&str> = split_scopes(" video:read,video:write\tprofile ,, ").collect();
        assert_eq!(scopes, vec!["video:read", "video:write", "profile"]);
    }

    #[test]
    fn test_unique_scopes_keeps_first_seen_order() {
        let scopes = unique_scopes(["b", "a", "b", "c", "a"]);
        assert_eq!(scopes, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_extract_from_scope_string() {
        let scopes = extract_scopes(&claims(json!({"scope": "video:read video:write"})));
        assert_eq!(scopes, vec!["video:read", "video:write"]);
    }

    #[test]
    fn test_extract_union_of_string_and_list_claims() {
        let scopes = extract_scopes(&claims(json!({
            "scope": "video:read profile",
            "roles": ["admin", "video:read", "  "],
        })));
        assert_eq!(scopes, vec!["video:read", "profile", "admin"]);
    }

    #[test]
    fn test_extract_all_claim_names_in_order() {
        let scopes = extract_scopes(&claims(json!({
            "roles": ["e"],
            "permissions": "d",
            "scp": ["c"],
            "scopes": "b",
            "scope": "a",
        })));
        assert_eq!(scopes, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_extract_ignores_other_shapes() {
        let scopes = extract_scopes(&claims(json!({
            "scope": 42,
            "scp": [1, "ok", null],
            "permissions": {"nested": "no"},
        })));
        assert_eq!(scopes, vec!["ok"]);
    }

    #[test]
    fn test_extract_no_claims() {
        assert!(extract_scopes(&claims(json!({"sub": "user"}))).is_empty());
    }

    #[test]
    fn test_requirement_satisfied() {
        let req = ScopeRequirement::new(vec!["video:read".to_string()]);
        let granted = vec!["video:read".to_string(), "video:write".to_string()];
        assert!(req.check(&granted).is_ok());
    }

    #[test]
    fn test_requirement_names_missing_scopes() {
        let req = ScopeRequirement::new(vec![
            "video:read".to_string(),
            "video:write".to_string(),
            "credits".to_string(),
        ]);
        let granted = vec!["video:read".to_string()];
        match req.check(&granted) {
            Err(OAuthError::InsufficientScope { missing }) => {
                assert_eq!(missing, vec!["video:write", "credits"]);
            }
            other => panic!("expected insufficient scope, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_requirement_always_passes() {
        let req = ScopeRequirement::default();
        assert!(req.check(&[]).is_ok());
    }
}
