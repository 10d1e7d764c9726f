//! Signature patterns for the error taxonomy.
//!
//! Each error type carries an ordered list of regular expressions. Capture
//! group 1, when present, becomes the record message; otherwise the whole
//! match is used. Patterns are compiled once per process.

use super::ErrorType;
use regex::Regex;
use std::sync::LazyLock;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("invalid signature pattern"))
        .collect()
}

static TYPE_ERROR: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"TypeError: ([^\n]+)",
        r"error TS\d+: ([^\n]+)",
        r"error\[E0308\]: ([^\n]+)",
    ])
});

static SYNTAX_ERROR: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"SyntaxError: ([^\n]+)",
        r"Unexpected token ([^\n]+)",
        r"(?m)^error: expected ([^\n]+)",
    ])
});

static REFERENCE_ERROR: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"ReferenceError: ([^\n]+)",
        r"\b([A-Za-z_$][\w$]*) is not defined\b",
        r"NameError: name '([^']+)' is not defined",
    ])
});

static FILE_NOT_FOUND: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"ENOENT: no such file or directory,? ([^\n]+)",
        r"(?m)^.*: ([^\s:]+): No such file or directory",
        r"FileNotFoundError: ([^\n]+)",
    ])
});

static PERMISSION_ERROR: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"EACCES: permission denied,? ([^\n]+)",
        r"EPERM: operation not permitted,? ([^\n]+)",
        r"(?i)permission denied(?::\s*([^\n]+))?",
    ])
});

static TEST_FAILURE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?m)^\s*(?:✗|✖|×|FAIL|FAILED)[:\s]+([^\n]+)",
        r"AssertionError: ([^\n]+)",
        r"(?m)^test (\S+) \.\.\. FAILED",
        r"assertion `([^`]+)` failed",
        r"(?m)\b(\d+) (?:tests? )?failed\b",
    ])
});

static SHELL_ERROR: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"command not found: ([^\n]+)",
        r"(?m)^(?:bash|sh|zsh): ([^:\n]+): command not found",
        r"(?m)^sh: \d+: ([^:\n]+): not found",
        r"/bin/sh: ([^\n]+)",
    ])
});

static MISSING_DEPENDENCY: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"Cannot find module '([^']+)'",
        r"Error: Can't resolve '([^']+)'",
        r"ModuleNotFoundError: No module named '([^']+)'",
        r"npm ERR! missing: ([^\s,]+)",
        r"error\[E0432\]: unresolved import `([^`]+)`",
    ])
});

static GIT_ERROR: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?m)^fatal: ([^\n]+)",
        r"(?m)^error: pathspec ([^\n]+)",
        r"(?m)^error: failed to push ([^\n]+)",
        r"CONFLICT \(([^)]+)\)",
        r"Merge conflict in ([^\n]+)",
    ])
});

static TIMEOUT_ERROR: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?im)^.*\btimed? ?out\b.*$",
        r"(?m)^.*ETIMEDOUT.*$",
        r"(?im)^.*deadline exceeded.*$",
    ])
});

static NETWORK_ERROR: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?m)^.*ECONNREFUSED.*$",
        r"(?m)^.*ECONNRESET.*$",
        r"(?m)^.*ENOTFOUND.*$",
        r"(?m)^.*getaddrinfo.*$",
        r"(?im)^.*network (?:error|unreachable).*$",
        r"(?m)^.*fetch failed.*$",
    ])
});

static MEMORY_ERROR: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?m)^.*JavaScript heap out of memory.*$",
        r"(?im)^.*\bout of memory\b.*$",
        r"(?m)^.*Cannot allocate memory.*$",
        r"(?m)^.*OOMKilled.*$",
    ])
});

static BUILD_ERROR: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"error\[E\d+\]: ([^\n]+)",
        r"(?im)^.*build failed.*$",
        r"(?im)^.*compilation (?:failed|error).*$",
        r"(?m)^ERROR in ([^\n]+)",
    ])
});

static UNCOMMITTED_CHANGES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?im)^.*uncommitted changes.*$",
        r"(?m)^.*Changes not staged for commit.*$",
        r"(?im)^.*working (?:tree|directory) (?:is )?dirty.*$",
    ])
});

static LOOP_ERROR: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?im)^.*\bloop (?:detected|limit|stalled?)\b.*$",
        r"(?im)^.*iteration limit reached.*$",
        r"(?im)^.*no progress detected.*$",
    ])
});

/// Location hint: `at <path>`, `in <path>`, or `from <path>`, with optional
/// `:line` / `:line:col` suffix.
static LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:at|in|from)\s+([A-Za-z0-9_$./\\~-]+(?::\d+){0,2})").expect("invalid pattern")
});

/// Ordered signature patterns for an error type.
pub fn signatures(kind: ErrorType) -> &'static [Regex] {
    match kind {
        ErrorType::TypeError => &TYPE_ERROR,
        ErrorType::SyntaxError => &SYNTAX_ERROR,
        ErrorType::ReferenceError => &REFERENCE_ERROR,
        ErrorType::FileNotFound => &FILE_NOT_FOUND,
        ErrorType::PermissionError => &PERMISSION_ERROR,
        ErrorType::TestFailure => &TEST_FAILURE,
        ErrorType::ShellError => &SHELL_ERROR,
        ErrorType::MissingDependency => &MISSING_DEPENDENCY,
        ErrorType::GitError => &GIT_ERROR,
        ErrorType::TimeoutError => &TIMEOUT_ERROR,
        ErrorType::NetworkError => &NETWORK_ERROR,
        ErrorType::MemoryError => &MEMORY_ERROR,
        ErrorType::BuildError => &BUILD_ERROR,
        ErrorType::UncommittedChanges => &UNCOMMITTED_CHANGES,
        ErrorType::LoopError => &LOOP_ERROR,
    }
}

/// Extract a file/module location hint from matched text, if any.
pub fn location_hint(text: &str) -> Option<String> {
    LOCATION
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_patterns_compile() {
        for kind in ErrorType::ALL {
            assert!(!signatures(kind).is_empty(), "no patterns for {}", kind);
        }
    }

    #[test]
    fn test_missing_dependency_captures_name() {
        let re = &signatures(ErrorType::MissingDependency)[0];
        let caps = re.captures("Error: Cannot find module 'lodash'").unwrap();
        assert_eq!(&caps[1], "lodash");
    }

    #[test]
    fn test_location_hint() {
        assert_eq!(
            location_hint("TypeError: x is undefined at src/app.js:10:5"),
            Some("src/app.js:10:5".to_string())
        );
        assert_eq!(location_hint("nothing to see here"), None);
    }

    #[test]
    fn test_rust_test_failure() {
        let re = &signatures(ErrorType::TestFailure)[2];
        let caps = re.captures("test cluster::tests::merge ... FAILED").unwrap();
        assert_eq!(&caps[1], "cluster::tests::merge");
    }
}
