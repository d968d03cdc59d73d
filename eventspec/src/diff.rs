//! Line-oriented diff of rendered event payloads.
//!
//! Used only for failure reports: when a structural comparison fails, the
//! two serialized forms are diffed line by line over their longest common
//! subsequence. Lines present only in the actual rendering are prefixed
//! with `-`, lines present only in the expected rendering with `+`.

/// One line of a computed diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    /// Line present in both renderings.
    Unchanged(String),
    /// Line present only in the actual rendering.
    Removed(String),
    /// Line present only in the expected rendering.
    Added(String),
}

/// Computes a line-by-line diff of the actual rendering against the
/// expected one.
pub fn line_by_line(actual: &str, expected: &str) -> Vec<DiffLine> {
    let left: Vec<&str> = actual.lines().collect();
    let right: Vec<&str> = expected.lines().collect();

    let m = left.len();
    let n = right.len();
    let mut dp = vec![vec![0_usize; n + 1]; m + 1];
    for i in 1..=m {
        for j in 1..=n {
            if left[i - 1] == right[j - 1] {
                dp[i][j] = dp[i - 1][j - 1] + 1;
            } else {
                dp[i][j] = dp[i][j - 1].max(dp[i - 1][j]);
            }
        }
    }

    let mut lines = Vec::new();
    let mut i = m;
    let mut j = n;
    while i > 0 && j > 0 {
        if left[i - 1] == right[j - 1] {
            lines.push(DiffLine::Unchanged(left[i - 1].to_string()));
            i -= 1;
            j -= 1;
        } else if dp[i][j - 1] >= dp[i - 1][j] {
            lines.push(DiffLine::Added(right[j - 1].to_string()));
            j -= 1;
        } else {
            lines.push(DiffLine::Removed(left[i - 1].to_string()));
            i -= 1;
        }
    }
    while i > 0 {
        lines.push(DiffLine::Removed(left[i - 1].to_string()));
        i -= 1;
    }
    while j > 0 {
        lines.push(DiffLine::Added(right[j - 1].to_string()));
        j -= 1;
    }

    lines.reverse();
    lines
}

/// Renders a computed diff with `-`/`+` prefixes, one line per entry.
pub fn render(lines: &[DiffLine]) -> String {
    let mut out = String::new();
    for line in lines {
        if !out.is_empty() {
            out.push('\n');
        }
        match line {
            DiffLine::Unchanged(text) => {
                out.push_str("  ");
                out.push_str(text);
            }
            DiffLine::Removed(text) => {
                out.push_str("- ");
                out.push_str(text);
            }
            DiffLine::Added(text) => {
                out.push_str("+ ");
                out.push_str(text);
            }
        }
    }
    out
}
