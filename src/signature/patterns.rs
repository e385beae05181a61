//! Attack signature tables.
//!
//! Detection is a pure function over an ordered list of
//! `{pattern, attack_type, severity}` tuples compiled at initialization.
//! The built-in table covers the five injection families; deployments can
//! replace it wholesale from configuration.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Injection families the detector recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackType {
    SqlInjection,
    Xss,
    PathTraversal,
    CommandInjection,
    LdapInjection,
}

impl AttackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttackType::SqlInjection => "sql_injection",
            AttackType::Xss => "xss",
            AttackType::PathTraversal => "path_traversal",
            AttackType::CommandInjection => "command_injection",
            AttackType::LdapInjection => "ldap_injection",
        }
    }
}

/// Finding severity, ordered low to critical.
///
/// Per-family severities reflect blast radius, not exploit difficulty:
/// SQL and command injection are critical, the rest high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// One pattern as declared in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSpec {
    /// Identifier used in evidence records and logs.
    pub name: String,
    /// Regular expression source.
    pub pattern: String,
    pub attack_type: AttackType,
    pub severity: Severity,
}

/// A compiled pattern.
#[derive(Debug)]
pub struct SignaturePattern {
    pub name: String,
    pub regex: Regex,
    pub attack_type: AttackType,
    pub severity: Severity,
}

#[derive(Debug, Error)]
#[error("invalid signature pattern `{name}`: {source}")]
pub struct PatternError {
    pub name: String,
    #[source]
    pub source: regex::Error,
}

/// Ordered, compiled signature table. First matching pattern wins.
#[derive(Debug)]
pub struct PatternSet {
    patterns: Vec<SignaturePattern>,
}

impl PatternSet {
    /// Compile a pattern list, preserving order.
    pub fn compile(specs: &[PatternSpec]) -> Result<Self, PatternError> {
        let mut patterns = Vec::with_capacity(specs.len());
        for spec in specs {
            let regex = Regex::new(&spec.pattern).map_err(|source| PatternError {
                name: spec.name.clone(),
                source,
            })?;
            patterns.push(SignaturePattern {
                name: spec.name.clone(),
                regex,
                attack_type: spec.attack_type,
                severity: spec.severity,
            });
        }
        Ok(Self { patterns })
    }

    /// Compile the built-in table.
    pub fn builtin() -> Self {
        Self::compile(&default_patterns()).expect("built-in signature patterns must compile")
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignaturePattern> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Built-in signature table, ordered by blast radius.
pub fn default_patterns() -> Vec<PatternSpec> {
    let spec = |name: &str, pattern: &str, attack_type, severity| PatternSpec {
        name: name.to_string(),
        pattern: pattern.to_string(),
        attack_type,
        severity,
    };
    use AttackType::*;
    use Severity::*;

    vec![
        // SQL injection
        spec(
            "sql_tautology",
            r#"(?i)['"]\s*(or|and)\s+['"]?[\w\s]*['"]?\s*="#,
            SqlInjection,
            Critical,
        ),
        spec(
            "sql_union_select",
            r"(?i)\bunion\b.{1,40}\bselect\b",
            SqlInjection,
            Critical,
        ),
        spec(
            "sql_statement",
            r"(?i)\b(insert\s+into|delete\s+from|drop\s+(table|database)|truncate\s+table|alter\s+table|update\s+\w+\s+set)\b",
            SqlInjection,
            Critical,
        ),
        spec(
            "sql_comment_breakout",
            r"(?i)['\d]\s*(--|#|;)\s*$|['\d]\s*(--|#)\s",
            SqlInjection,
            Critical,
        ),
        spec(
            "sql_stored_procedure",
            r"(?i)\b(exec|execute)\b[\s(]+(x|s)p_\w+",
            SqlInjection,
            Critical,
        ),
        // Command injection
        spec(
            "cmd_chained_shell",
            r"(?i)(;|\||&&|\$\(|`)\s*(cat|ls|id|pwd|whoami|rm|wget|curl|nc|bash|sh|powershell|cmd(\.exe)?)\b",
            CommandInjection,
            Critical,
        ),
        spec(
            "cmd_destructive",
            r"(?i)\b(rm\s+-rf\s+/|chmod\s+777|mkfifo)\b",
            CommandInjection,
            Critical,
        ),
        spec("cmd_ifs_evasion", r"\$\{IFS\}", CommandInjection, Critical),
        // Cross-site scripting
        spec("xss_script_tag", r"(?i)<\s*script\b", Xss, High),
        spec("xss_js_scheme", r"(?i)\bjavascript\s*:", Xss, High),
        spec(
            "xss_event_handler",
            r"(?i)\bon(error|load|click|mouseover|focus|submit)\s*=",
            Xss,
            High,
        ),
        spec(
            "xss_tag_injection",
            r"(?i)<\s*(iframe|object|embed|svg)\b",
            Xss,
            High,
        ),
        // Path traversal
        spec("path_dotdot", r"\.\.[/\\]", PathTraversal, High),
        spec(
            "path_dotdot_encoded",
            r"(?i)%2e%2e(%2f|%5c|/|\\)",
            PathTraversal,
            High,
        ),
        spec(
            "path_sensitive_file",
            r"(?i)(/etc/(passwd|shadow)|boot\.ini|win\.ini)",
            PathTraversal,
            High,
        ),
        // LDAP injection
        spec(
            "ldap_filter_breakout",
            r"\*\)\s*\(\s*[|&]|\)\s*\(\s*\|\s*\(",
            LdapInjection,
            High,
        ),
        spec(
            "ldap_wildcard_attr",
            r"(?i)\(\s*(uid|cn|objectclass|mail)\s*=\s*\*",
            LdapInjection,
            High,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_compiles() {
        let set = PatternSet::builtin();
        assert!(!set.is_empty());
    }

    #[test]
    fn test_invalid_pattern_reports_name() {
        let specs = vec![PatternSpec {
            name: "broken".to_string(),
            pattern: "(unclosed".to_string(),
            attack_type: AttackType::Xss,
            severity: Severity::High,
        }];
        let err = PatternSet::compile(&specs).unwrap_err();
        assert_eq!(err.name, "broken");
    }

    #[test]
    fn test_family_severities() {
        for p in PatternSet::builtin().iter() {
            let expected = match p.attack_type {
                AttackType::SqlInjection | AttackType::CommandInjection => Severity::Critical,
                _ => Severity::High,
            };
            assert_eq!(p.severity, expected, "pattern {}", p.name);
        }
    }
}
