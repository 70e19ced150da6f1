//! Permission Evaluation
//!
//! Permissions are `domain:action:target` strings held by the session.
//! A grant matches a request when each segment matches exactly or is the
//! super value: `admin` for domain and action, `*` for target.
//!
//! ```
//! use gymsense::permission::has_permission;
//!
//! let perms = vec!["iot:update:*".to_string()];
//! assert!(has_permission(&perms, "iot", "update", "bench-3"));
//! assert!(!has_permission(&perms, "iot", "delete", "bench-3"));
//! ```

use std::fmt;

/// Super value accepted in the domain and action segments
pub const ADMIN: &str = "admin";

/// Wildcard accepted in the target segment
pub const ANY_TARGET: &str = "*";

/// Known permission domains
pub const DOMAINS: [&str; 4] = ["user", "iot", "hub", "admin"];

/// Known permission actions
pub const ACTIONS: [&str; 5] = ["create", "read", "update", "delete", "admin"];

/// A parsed permission triple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission<'a> {
    pub domain: &'a str,
    pub action: &'a str,
    pub target: &'a str,
}

impl<'a> Permission<'a> {
    /// Parse `domain:action:target`. Returns `None` unless there are
    /// exactly three segments.
    pub fn parse(raw: &'a str) -> Option<Self> {
        let mut parts = raw.split(':');
        let domain = parts.next()?;
        let action = parts.next()?;
        let target = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            domain,
            action,
            target,
        })
    }

    /// Whether this grant covers the requested triple
    pub fn grants(&self, domain: &str, action: &str, target: &str) -> bool {
        (self.domain == domain || self.domain == ADMIN)
            && (self.action == action || self.action == ADMIN)
            && (self.target == target || self.target == ANY_TARGET)
    }

    /// Whether both domain and action are in the known vocabulary
    pub fn is_known(&self) -> bool {
        DOMAINS.contains(&self.domain) && ACTIONS.contains(&self.action)
    }
}

impl fmt::Display for Permission<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.domain, self.action, self.target)
    }
}

/// Check a permission list against a requested (domain, action, target).
///
/// Malformed entries are skipped, never an error.
pub fn has_permission<S: AsRef<str>>(
    permissions: &[S],
    domain: &str,
    action: &str,
    target: &str,
) -> bool {
    permissions
        .iter()
        .filter_map(|p| Permission::parse(p.as_ref()))
        .any(|p| p.grants(domain, action, target))
}

/// Whether the holder may edit the metadata of a device
pub fn can_modify_device<S: AsRef<str>>(permissions: &[S], device_id: &str) -> bool {
    has_permission(permissions, "iot", "update", device_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perms(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_match() {
        let p = perms(&["iot:read:d1"]);
        assert!(has_permission(&p, "iot", "read", "d1"));
        assert!(!has_permission(&p, "iot", "read", "d2"));
        assert!(!has_permission(&p, "iot", "update", "d1"));
        assert!(!has_permission(&p, "hub", "read", "d1"));
    }

    #[test]
    fn test_wildcard_target() {
        let p = perms(&["iot:delete:*"]);
        assert!(has_permission(&p, "iot", "delete", "d1"));
        assert!(has_permission(&p, "iot", "delete", "anything"));
        assert!(!has_permission(&p, "iot", "update", "d1"));
    }

    #[test]
    fn test_admin_domain() {
        let p = perms(&["admin:read:d1"]);
        assert!(has_permission(&p, "iot", "read", "d1"));
        assert!(has_permission(&p, "user", "read", "d1"));
        assert!(!has_permission(&p, "iot", "update", "d1"));
    }

    #[test]
    fn test_admin_action() {
        let p = perms(&["iot:admin:d1"]);
        assert!(has_permission(&p, "iot", "delete", "d1"));
        assert!(has_permission(&p, "iot", "create", "d1"));
        assert!(!has_permission(&p, "hub", "delete", "d1"));
        assert!(!has_permission(&p, "iot", "delete", "d2"));
    }

    #[test]
    fn test_full_admin() {
        let p = perms(&["admin:admin:*"]);
        for domain in DOMAINS {
            for action in ACTIONS {
                assert!(has_permission(&p, domain, action, "x"));
            }
        }
    }

    #[test]
    fn test_wildcard_is_not_a_request_super_value() {
        // "*" only matches in the grant, a request for "*" needs a "*" grant
        let p = perms(&["iot:read:d1"]);
        assert!(!has_permission(&p, "iot", "read", "*"));
    }

    #[test]
    fn test_first_match_among_many() {
        let p = perms(&["user:read:me@gym.io", "hub:update:h1", "iot:update:*"]);
        assert!(has_permission(&p, "iot", "update", "d9"));
        assert!(has_permission(&p, "hub", "update", "h1"));
        assert!(!has_permission(&p, "hub", "update", "h2"));
    }

    #[test]
    fn test_malformed_entries_never_match() {
        let p = perms(&["", "iot", "iot:read", "iot:read:d1:extra", ":::"]);
        assert!(!has_permission(&p, "iot", "read", "d1"));
        assert!(!has_permission(&p, "iot", "read", ""));
    }

    #[test]
    fn test_malformed_entries_do_not_hide_valid_ones() {
        let p = perms(&["garbage", "iot:read:d1"]);
        assert!(has_permission(&p, "iot", "read", "d1"));
    }

    #[test]
    fn test_empty_list() {
        let p: Vec<String> = Vec::new();
        assert!(!has_permission(&p, "iot", "read", "d1"));
    }

    #[test]
    fn test_can_modify_device() {
        assert!(can_modify_device(&perms(&["iot:update:d1"]), "d1"));
        assert!(can_modify_device(&perms(&["admin:admin:*"]), "d1"));
        assert!(!can_modify_device(&perms(&["iot:read:*"]), "d1"));
    }

    #[test]
    fn test_parse_and_display() {
        let p = Permission::parse("hub:create:h7").unwrap();
        assert_eq!(p.domain, "hub");
        assert_eq!(p.action, "create");
        assert_eq!(p.target, "h7");
        assert!(p.is_known());
        assert_eq!(p.to_string(), "hub:create:h7");

        assert!(!Permission::parse("gym:lift:*").unwrap().is_known());
        assert!(Permission::parse("a:b").is_none());
    }
}
