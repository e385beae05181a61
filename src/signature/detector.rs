//! Stateless pattern matcher for injection-class attacks.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::signature::patterns::{AttackType, PatternSet, Severity};

/// A positive detection against one input.
#[derive(Debug, Clone)]
pub struct SignatureMatch {
    /// Name of the pattern that fired.
    pub pattern: String,
    pub attack_type: AttackType,
    pub severity: Severity,
    /// Truncated slice of the matching text. Evidence only; never sent to
    /// clients.
    pub excerpt: String,
}

/// A detection attributed to a named request field.
#[derive(Debug, Clone)]
pub struct FieldMatch {
    pub field: String,
    pub matched: SignatureMatch,
}

const EXCERPT_LIMIT: usize = 80;

/// Pure matcher over the active pattern set.
///
/// Holds no mutable detection state; same input and pattern set always
/// produce the same result. The pattern set is swapped atomically on
/// configuration reload.
pub struct SignatureDetector {
    patterns: Arc<ArcSwap<PatternSet>>,
}

impl SignatureDetector {
    pub fn new(patterns: Arc<ArcSwap<PatternSet>>) -> Self {
        Self { patterns }
    }

    /// Match `input` against the table, first matching pattern wins.
    ///
    /// `family` restricts matching to one attack family when the caller
    /// already knows what it is probing for.
    pub fn detect(&self, input: &str, family: Option<AttackType>) -> Option<SignatureMatch> {
        if input.is_empty() {
            return None;
        }
        let patterns = self.patterns.load();
        for pattern in patterns.iter() {
            if let Some(f) = family {
                if pattern.attack_type != f {
                    continue;
                }
            }
            if let Some(m) = pattern.regex.find(input) {
                return Some(SignatureMatch {
                    pattern: pattern.name.clone(),
                    attack_type: pattern.attack_type,
                    severity: pattern.severity,
                    excerpt: truncate(m.as_str(), EXCERPT_LIMIT),
                });
            }
        }
        None
    }

    /// Scan a request's untrusted fields, reporting the first offender.
    pub fn scan<'a, I>(&self, fields: I) -> Option<FieldMatch>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (field, value) in fields {
            if let Some(matched) = self.detect(value, None) {
                return Some(FieldMatch {
                    field: field.to_string(),
                    matched,
                });
            }
        }
        None
    }
}

fn truncate(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> SignatureDetector {
        SignatureDetector::new(Arc::new(ArcSwap::from_pointee(PatternSet::builtin())))
    }

    #[test]
    fn test_sql_injection_is_critical() {
        let d = detector();
        let m = d.detect("' OR '1'='1", None).expect("should match");
        assert_eq!(m.attack_type, AttackType::SqlInjection);
        assert_eq!(m.severity, Severity::Critical);

        let m = d.detect("1 UNION SELECT password FROM users", None).unwrap();
        assert_eq!(m.attack_type, AttackType::SqlInjection);
    }

    #[test]
    fn test_command_injection_is_critical() {
        let d = detector();
        let m = d.detect("foo; cat /etc/hosts", None).expect("should match");
        assert_eq!(m.attack_type, AttackType::CommandInjection);
        assert_eq!(m.severity, Severity::Critical);
    }

    #[test]
    fn test_xss_and_traversal_are_high() {
        let d = detector();
        let m = d.detect("<script>alert(1)</script>", None).unwrap();
        assert_eq!(m.attack_type, AttackType::Xss);
        assert_eq!(m.severity, Severity::High);

        let m = d.detect("../../etc/passwd", None).unwrap();
        assert_eq!(m.attack_type, AttackType::PathTraversal);
        assert_eq!(m.severity, Severity::High);
    }

    #[test]
    fn test_ldap_injection() {
        let d = detector();
        let m = d.detect("*)(uid=*))(|(uid=*", None).expect("should match");
        assert_eq!(m.attack_type, AttackType::LdapInjection);
    }

    #[test]
    fn test_benign_inputs_do_not_match() {
        let d = detector();
        for input in [
            "wireless mouse",
            "ergonomic keyboard with numpad",
            "user@example.com",
            "How to improve battery life",
            "1234567890",
            "",
        ] {
            assert!(d.detect(input, None).is_none(), "false positive on {input:?}");
        }
    }

    #[test]
    fn test_family_filter() {
        let d = detector();
        // SQLi payload probed only for XSS: no match.
        assert!(d
            .detect("' OR '1'='1", Some(AttackType::Xss))
            .is_none());
        assert!(d
            .detect("' OR '1'='1", Some(AttackType::SqlInjection))
            .is_some());
    }

    #[test]
    fn test_determinism() {
        let d = detector();
        let a = d.detect("' OR '1'='1", None).unwrap();
        let b = d.detect("' OR '1'='1", None).unwrap();
        assert_eq!(a.pattern, b.pattern);
        assert_eq!(a.excerpt, b.excerpt);
    }

    #[test]
    fn test_scan_reports_offending_field() {
        let d = detector();
        let fields = [
            ("query", "wireless mouse"),
            ("redirect", "javascript:alert(1)"),
        ];
        let hit = d.scan(fields.iter().map(|(k, v)| (*k, *v))).unwrap();
        assert_eq!(hit.field, "redirect");
        assert_eq!(hit.matched.attack_type, AttackType::Xss);
    }
}
