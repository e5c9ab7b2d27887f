//! Static security checks over template sources and destination paths.
//!
//! Both checks are pure: they take a string and return every violation they
//! find, in source order. Nothing here renders, reads or writes anything.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::template::{self, Token, functions};

// ============================================================================
// Violations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ViolationKind {
    DangerousPattern,
    UnsafeFunction,
    PathTraversal,
    ReservedName,
    SizeLimitExceeded,
    CountLimitExceeded,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DangerousPattern => "dangerous pattern",
            Self::UnsafeFunction => "unsafe function",
            Self::PathTraversal => "path traversal",
            Self::ReservedName => "reserved name",
            Self::SizeLimitExceeded => "size limit exceeded",
            Self::CountLimitExceeded => "count limit exceeded",
        };
        f.write_str(s)
    }
}

/// One finding from the security validator or resource limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationViolation {
    pub kind: ViolationKind,
    pub description: String,
    /// `template:line` for template findings, the destination for path
    /// findings, or the counter name for limits.
    pub location: String,
}

impl ValidationViolation {
    pub fn new(kind: ViolationKind, description: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            location: location.into(),
        }
    }
}

impl fmt::Display for ValidationViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.kind, self.description, self.location)
    }
}

impl std::error::Error for ValidationViolation {}

// ============================================================================
// Policy
// ============================================================================

/// Thresholds for the static checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityPolicy {
    /// Maximum template source size in bytes.
    pub max_template_size: usize,
    /// Maximum destination length in characters.
    pub max_path_length: usize,
    /// Maximum `{{range}}` nesting depth.
    pub max_range_depth: usize,
    /// Maximum block or parenthesis nesting depth.
    pub max_nesting_depth: usize,
    /// Maximum width or precision in a format verb.
    pub max_format_width: usize,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            max_template_size: 1024 * 1024,
            max_path_length: 260,
            max_range_depth: 3,
            max_nesting_depth: template::MAX_NESTING,
            max_format_width: functions::MAX_FORMAT_WIDTH,
        }
    }
}

// ============================================================================
// Patterns
// ============================================================================

struct DangerousPattern {
    regex: Regex,
    description: &'static str,
}

/// Applied to action code with string literals blanked out. Identifiers
/// preceded by `.` or `$` are variable references and never match.
static DANGEROUS_PATTERNS: LazyLock<Vec<DangerousPattern>> = LazyLock::new(|| {
    [
        (
            r"(?i)(?:^|[^\w.$])(env|getenv|expandenv|environ|lookupenv|setenv)\b",
            "environment variable access",
        ),
        (
            r"(?i)(?:^|[^\w.$])(exec|system|shell|popen|spawn|command|cmd|call|run)\b",
            "command execution",
        ),
        (
            r"(?i)(?:^|[^\w.$])(readfile|writefile|readdir|file|files|open|include|tpl|template|define|block|glob|getfile|mkdir|remove)\b",
            "file access",
        ),
        (
            r"(?i)(?:^|[^\w.$])(http|https|fetch|curl|wget|dial|socket|request|download|gethostbyname|lookup)\b",
            "network access",
        ),
        (r"\b(os|exec|net|io|syscall|filepath|ioutil)\.\w+", "host package access"),
    ]
    .into_iter()
    .map(|(pattern, description)| DangerousPattern {
        regex: Regex::new(pattern).expect("static pattern compiles"),
        description,
    })
    .collect()
});

/// A format verb with its width and precision.
static FORMAT_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%[-+# 0]*(\*|\d+)?(?:\.(\*|\d+))?[a-zA-Z%]").expect("static pattern compiles")
});

/// Percent-encoded dot, slash, backslash, NUL or a double-encoded `%`.
static ENCODED_TRAVERSAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)%(2e|2f|5c|00|25)").expect("static pattern compiles"));

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

const DANGEROUS_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

const BLOCK_OPENERS: &[&str] = &["if", "range"];
const KEYWORDS: &[&str] = &["if", "else", "end", "range"];

// ============================================================================
// Validator
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct SecurityValidator {
    policy: SecurityPolicy,
}

impl SecurityValidator {
    pub fn new(policy: SecurityPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    /// Scan a template source; `id` is used in violation locations.
    pub fn validate_template(&self, id: &str, source: &str) -> Vec<ValidationViolation> {
        if source.len() > self.policy.max_template_size {
            return vec![ValidationViolation::new(
                ViolationKind::SizeLimitExceeded,
                format!(
                    "template is {} bytes, maximum is {}",
                    source.len(),
                    self.policy.max_template_size
                ),
                id,
            )];
        }

        let mut violations = Vec::new();
        let mut blocks: Vec<bool> = Vec::new();
        let mut range_depth = 0usize;
        let mut deep_blocks_reported = false;

        for action in template::raw_actions(source) {
            let location = format!("{id}:{}", action.line);
            let (code, literals) = template::split_literals(&action.text);

            for pattern in DANGEROUS_PATTERNS.iter() {
                for m in pattern.regex.find_iter(&code) {
                    let matched = m.as_str().trim_start_matches(|c: char| !c.is_alphanumeric());
                    violations.push(ValidationViolation::new(
                        ViolationKind::DangerousPattern,
                        format!("{} (`{matched}`)", pattern.description),
                        &location,
                    ));
                }
            }

            for literal in &literals {
                self.check_format_widths(literal, &location, &mut violations);
            }

            let tokens = template::tokenize(&action.text, true).unwrap_or_default();
            self.check_calls(&tokens, &location, &mut violations);
            self.check_parens(&tokens, &location, &mut violations);

            // Track block nesting to measure range depth.
            if let Some(Token::Ident(first)) = tokens.first() {
                match first.as_str() {
                    kw if BLOCK_OPENERS.contains(&kw) => {
                        let is_range = kw == "range";
                        blocks.push(is_range);
                        if blocks.len() > self.policy.max_nesting_depth && !deep_blocks_reported {
                            deep_blocks_reported = true;
                            violations.push(ValidationViolation::new(
                                ViolationKind::DangerousPattern,
                                format!(
                                    "blocks nested more than {} levels deep",
                                    self.policy.max_nesting_depth
                                ),
                                &location,
                            ));
                        }
                        if is_range {
                            range_depth += 1;
                            if range_depth > self.policy.max_range_depth {
                                violations.push(ValidationViolation::new(
                                    ViolationKind::DangerousPattern,
                                    format!(
                                        "iteration nested {range_depth} levels deep, maximum is {}",
                                        self.policy.max_range_depth
                                    ),
                                    &location,
                                ));
                            }
                        }
                    }
                    "end" => {
                        if blocks.pop() == Some(true) {
                            range_depth -= 1;
                        }
                    }
                    _ => {}
                }
            }
        }

        violations
    }

    fn check_format_widths(&self, literal: &str, location: &str, out: &mut Vec<ValidationViolation>) {
        let max = self.policy.max_format_width;
        for caps in FORMAT_VERB.captures_iter(literal) {
            for group in [caps.get(1), caps.get(2)].into_iter().flatten() {
                let text = group.as_str();
                let too_big = text == "*" || text.parse::<usize>().map_or(true, |n| n > max);
                if too_big {
                    out.push(ValidationViolation::new(
                        ViolationKind::DangerousPattern,
                        format!("format width '{text}' in \"{}\" exceeds maximum of {max}", &caps[0]),
                        location,
                    ));
                }
            }
        }
    }

    fn check_parens(&self, tokens: &[Token], location: &str, out: &mut Vec<ValidationViolation>) {
        let mut depth = 0usize;
        let mut deepest = 0usize;
        for tok in tokens {
            match tok {
                Token::LParen => {
                    depth += 1;
                    deepest = deepest.max(depth);
                }
                Token::RParen => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        if deepest > self.policy.max_nesting_depth {
            out.push(ValidationViolation::new(
                ViolationKind::DangerousPattern,
                format!(
                    "expression nested {deepest} levels deep, maximum is {}",
                    self.policy.max_nesting_depth
                ),
                location,
            ));
        }
    }

    fn check_calls(&self, tokens: &[Token], location: &str, out: &mut Vec<ValidationViolation>) {
        for (i, tok) in tokens.iter().enumerate() {
            let Token::Ident(name) = tok else { continue };
            if KEYWORDS.contains(&name.as_str()) {
                continue;
            }
            if !functions::is_allowed(name) {
                out.push(ValidationViolation::new(
                    ViolationKind::UnsafeFunction,
                    format!("call to '{name}' is not permitted"),
                    location,
                ));
                continue;
            }
            // A literal repeat count can be checked before anything runs.
            if name == "repeat" {
                if let Some(Token::Int(n)) = tokens.get(i + 1) {
                    if *n < 0 || *n as usize > functions::MAX_REPEAT_BYTES {
                        out.push(ValidationViolation::new(
                            ViolationKind::DangerousPattern,
                            format!("repeat count {n} is out of bounds"),
                            location,
                        ));
                    }
                }
            }
        }
    }

    /// Check a rendered destination path.
    pub fn validate_path(&self, path: &str) -> Vec<ValidationViolation> {
        if path.trim().is_empty() {
            return vec![ValidationViolation::new(
                ViolationKind::PathTraversal,
                "destination is empty",
                path,
            )];
        }

        let mut violations = Vec::new();
        let mut flag = |kind, description: String| {
            violations.push(ValidationViolation::new(kind, description, path));
        };

        if path.contains('\0') {
            flag(ViolationKind::DangerousPattern, "destination contains a null byte".into());
        }

        if ENCODED_TRAVERSAL.is_match(path) {
            flag(
                ViolationKind::PathTraversal,
                "destination contains a percent-encoded separator or dot".into(),
            );
        }

        let normalized = path.replace('\\', "/");
        let bytes = normalized.as_bytes();
        if normalized.starts_with("//") {
            flag(ViolationKind::PathTraversal, "UNC paths are not allowed".into());
        } else if normalized.starts_with('/') {
            flag(ViolationKind::PathTraversal, "absolute paths are not allowed".into());
        }
        if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
            flag(ViolationKind::PathTraversal, "drive-letter paths are not allowed".into());
        }
        if normalized == "~" || normalized.starts_with("~/") {
            flag(ViolationKind::PathTraversal, "home-directory paths are not allowed".into());
        }

        let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
        if segments.is_empty() {
            flag(ViolationKind::PathTraversal, "destination names no file".into());
        }
        if segments.iter().any(|s| *s == "..") {
            flag(ViolationKind::PathTraversal, "destination contains a '..' segment".into());
        }

        for segment in &segments {
            if *segment == ".." {
                continue;
            }
            let stem = segment.split('.').next().unwrap_or(segment).trim_end();
            if RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(stem)) {
                flag(
                    ViolationKind::ReservedName,
                    format!("'{segment}' is a reserved device name"),
                );
            }
            if let Some(c) = segment
                .chars()
                .find(|c| DANGEROUS_CHARS.contains(c) || (c.is_control() && *c != '\0'))
            {
                flag(
                    ViolationKind::DangerousPattern,
                    format!("'{segment}' contains forbidden character {c:?}"),
                );
            }
            if segment.ends_with('.') || segment.ends_with(' ') {
                flag(
                    ViolationKind::DangerousPattern,
                    format!("'{segment}' ends with a dot or space"),
                );
            }
        }

        let length = path.chars().count();
        if length > self.policy.max_path_length {
            flag(
                ViolationKind::SizeLimitExceeded,
                format!(
                    "destination is {length} characters, maximum is {}",
                    self.policy.max_path_length
                ),
            );
        }

        violations
    }
}

/// Validate a template with the default policy.
pub fn validate_template(source: &str) -> Vec<ValidationViolation> {
    SecurityValidator::default().validate_template("template", source)
}

/// Validate a destination path with the default policy.
pub fn validate_path(path: &str) -> Vec<ValidationViolation> {
    SecurityValidator::default().validate_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(v: &[ValidationViolation]) -> Vec<ViolationKind> {
        v.iter().map(|v| v.kind).collect()
    }

    #[test]
    fn clean_template_passes() {
        let src = r#"package main

import "os"

func main() {
    port := os.Getenv("PORT") // {{.ProjectName | snakeCase}}
    {{- if eq .AuthType "jwt" }}
    setupJWT()
    {{- end }}
    fmt.Println({{ printf "%q" .ProjectName }})
}
"#;
        assert!(validate_template(src).is_empty(), "{:?}", validate_template(src));
    }

    #[test]
    fn env_access_is_flagged_twice() {
        let v = validate_template(r#"{{ env "HOME" }}"#);
        assert_eq!(kinds(&v), vec![ViolationKind::DangerousPattern, ViolationKind::UnsafeFunction]);
        assert_eq!(v[0].location, "template:1");
    }

    #[test]
    fn variable_named_like_a_function_is_fine() {
        assert!(validate_template("{{ .Command }} {{ $.Env }}").is_empty());
    }

    #[test]
    fn reports_every_violation() {
        let src = "{{ exec \"rm\" }}\n{{ readFile \"/etc/passwd\" }}\n{{ httpGet \"x\" }}";
        let v = validate_template(src);
        assert!(v.iter().filter(|v| v.kind == ViolationKind::UnsafeFunction).count() == 3);
        assert!(v.iter().any(|v| v.location == "template:3"));
    }

    #[test]
    fn host_package_access() {
        let v = validate_template("{{ os.Getenv \"HOME\" }}");
        assert!(v.iter().any(|v| v.description.contains("host package")));
    }

    #[test]
    fn deep_range_nesting() {
        let src = "{{range .A}}{{range .B}}{{range .C}}{{range .D}}x{{end}}{{end}}{{end}}{{end}}";
        let v = validate_template(src);
        assert_eq!(kinds(&v), vec![ViolationKind::DangerousPattern]);
        assert!(v[0].description.contains("4 levels"));
        let ok = "{{range .A}}{{if .X}}{{range .B}}{{end}}{{end}}{{end}}{{range .C}}{{end}}";
        assert!(validate_template(ok).is_empty());
    }

    #[test]
    fn deep_nesting_is_flagged_once_per_kind() {
        let parens = format!("{{{{{}1{}}}}}", "(".repeat(300_000), ")".repeat(300_000));
        let v = validate_template(&parens);
        assert_eq!(kinds(&v), vec![ViolationKind::DangerousPattern]);
        assert!(v[0].description.contains("300000 levels"));

        let blocks = "{{if .A}}".repeat(1000) + &"{{end}}".repeat(1000);
        let v = validate_template(&blocks);
        assert_eq!(kinds(&v), vec![ViolationKind::DangerousPattern]);
        assert!(v[0].description.contains("blocks nested"));
    }

    #[test]
    fn oversized_format_width() {
        assert!(!validate_template(r#"{{ printf "%99999d" 1 }}"#).is_empty());
        assert!(!validate_template(r#"{{ printf "%.9999s" .A }}"#).is_empty());
        assert!(!validate_template(r#"{{ printf "%*d" 9 1 }}"#).is_empty());
        assert!(validate_template(r#"{{ printf "%-20s|%05d" .A 3 }}"#).is_empty());
    }

    #[test]
    fn huge_repeat_literal() {
        assert!(!validate_template(r#"{{ repeat 99999999 "x" }}"#).is_empty());
    }

    #[test]
    fn oversized_template() {
        let big = "x".repeat(1024 * 1024 + 1);
        assert_eq!(kinds(&validate_template(&big)), vec![ViolationKind::SizeLimitExceeded]);
    }

    #[test]
    fn inclusion_keywords_are_unsafe() {
        let v = validate_template(r#"{{ template "other" . }}"#);
        assert!(v.iter().any(|v| v.kind == ViolationKind::UnsafeFunction));
    }

    #[test]
    fn broken_templates_are_still_scanned() {
        let v = validate_template(r#"{{ $x := env "HOME" "#);
        assert!(v.iter().any(|v| v.kind == ViolationKind::UnsafeFunction));
    }

    #[test]
    fn safe_paths() {
        for p in ["main.go", "cmd/server/main.go", "./internal/auth/jwt.go", ".github/workflows/ci.yml", "a\\b.txt"] {
            assert!(validate_path(p).is_empty(), "{p}: {:?}", validate_path(p));
        }
    }

    #[test]
    fn traversal_in_every_spelling() {
        for p in [
            "../etc/passwd",
            "a/../../b",
            "..\\..\\windows",
            "..%2fetc%2fpasswd",
            "%2e%2e/secret",
            "..%5c..%5cboot.ini",
            "/etc/passwd",
            "\\\\server\\share\\x",
            "C:\\Windows\\system32",
            "c:/windows",
            "~/.ssh/authorized_keys",
        ] {
            let v = validate_path(p);
            assert!(v.iter().any(|v| v.kind == ViolationKind::PathTraversal), "{p}: {v:?}");
        }
    }

    #[test]
    fn reserved_names_any_case() {
        for p in ["CON", "con.txt", "dir/Nul", "lpt9.log", "src/COM1 .go", "aux"] {
            let v = validate_path(p);
            assert!(v.iter().any(|v| v.kind == ViolationKind::ReservedName), "{p}: {v:?}");
        }
        assert!(validate_path("console.go").is_empty());
        assert!(validate_path("com10.txt").is_empty());
    }

    #[test]
    fn dangerous_characters() {
        assert!(!validate_path("a\0b").is_empty());
        assert!(!validate_path("what?.txt").is_empty());
        assert!(!validate_path("pipe|name").is_empty());
        assert!(!validate_path("trailing.").is_empty());
    }

    #[test]
    fn length_limit() {
        let p = "a/".repeat(130) + "b";
        assert_eq!(kinds(&validate_path(&p)), vec![ViolationKind::SizeLimitExceeded]);
    }

    #[test]
    fn empty_path() {
        assert_eq!(kinds(&validate_path("")), vec![ViolationKind::PathTraversal]);
        assert_eq!(kinds(&validate_path("./")), vec![ViolationKind::PathTraversal]);
    }
}
