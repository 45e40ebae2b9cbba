//! Purpose: Line-oriented LCS diff that renders unified-format text.
//! Exports: `unified_diff`, `unified_diff_with_context`, `count_added`, `count_removed`,
//! `diff_lines`, `build_hunks`, `table_cells`, `DiffLine`, `Hunk`, `LineKind`.
//! Role: Backs `/diff`; pure functions with no engine access.
//! Invariants: Inputs are split on '\n' only; a trailing newline yields a final empty line.
//! Invariants: Walk order is match, then insertion, then deletion (insertion wins ties).
//! Invariants: `countA` counts non-added lines, `countB` counts non-removed lines.
//! Invariants: The LCS table holds `table_cells` entries; callers bound it with
//! `MAX_TABLE_CELLS` before diffing untrusted text.

use std::fmt::Write as _;

pub const DEFAULT_CONTEXT_LINES: usize = 3;
/// 64 MiB of `u32` entries.
pub const MAX_TABLE_CELLS: usize = 16 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    Equal,
    Added,
    Removed,
}

impl LineKind {
    pub fn marker(self) -> char {
        match self {
            LineKind::Equal => ' ',
            LineKind::Added => '+',
            LineKind::Removed => '-',
        }
    }
}

/// One entry of the edit script. Line numbers are 1-based; `line_a` is 0 for
/// additions and `line_b` is 0 for removals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiffLine<'a> {
    pub kind: LineKind,
    pub text: &'a str,
    pub line_a: usize,
    pub line_b: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hunk<'a> {
    pub start_a: usize,
    pub count_a: usize,
    pub start_b: usize,
    pub count_b: usize,
    pub lines: Vec<DiffLine<'a>>,
}

impl Hunk<'_> {
    fn write_to(&self, out: &mut String) {
        let _ = writeln!(
            out,
            "@@ -{},{} +{},{} @@",
            self.start_a, self.count_a, self.start_b, self.count_b
        );
        for line in &self.lines {
            out.push(line.kind.marker());
            out.push_str(line.text);
            out.push('\n');
        }
    }
}

/// Size of the LCS table `unified_diff` would allocate for these inputs.
pub fn table_cells(text_a: &str, text_b: &str) -> usize {
    let rows = text_a.split('\n').count() + 1;
    let cols = text_b.split('\n').count() + 1;
    rows.saturating_mul(cols)
}

pub fn unified_diff(label_a: &str, label_b: &str, text_a: &str, text_b: &str) -> String {
    unified_diff_with_context(label_a, label_b, text_a, text_b, DEFAULT_CONTEXT_LINES)
}

pub fn unified_diff_with_context(
    label_a: &str,
    label_b: &str,
    text_a: &str,
    text_b: &str,
    context: usize,
) -> String {
    let lines_a: Vec<&str> = text_a.split('\n').collect();
    let lines_b: Vec<&str> = text_b.split('\n').collect();
    let script = diff_lines(&lines_a, &lines_b);

    let mut out = String::new();
    let _ = writeln!(out, "--- {label_a}");
    let _ = writeln!(out, "+++ {label_b}");
    for hunk in build_hunks(&script, context) {
        hunk.write_to(&mut out);
    }
    out
}

/// Computes the edit script from a reversed LCS length table.
pub fn diff_lines<'a>(a: &[&'a str], b: &[&'a str]) -> Vec<DiffLine<'a>> {
    let (n, m) = (a.len(), b.len());
    let width = m + 1;
    let mut lcs = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i * width + j] = if a[i] == b[j] {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let mut script = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (0, 0);
    let (mut line_a, mut line_b) = (1, 1);
    while i < n || j < m {
        if i < n && j < m && a[i] == b[j] {
            script.push(DiffLine {
                kind: LineKind::Equal,
                text: a[i],
                line_a,
                line_b,
            });
            i += 1;
            j += 1;
            line_a += 1;
            line_b += 1;
        } else if j < m && (i >= n || lcs[i * width + j + 1] >= lcs[(i + 1) * width + j]) {
            script.push(DiffLine {
                kind: LineKind::Added,
                text: b[j],
                line_a: 0,
                line_b,
            });
            j += 1;
            line_b += 1;
        } else {
            script.push(DiffLine {
                kind: LineKind::Removed,
                text: a[i],
                line_a,
                line_b: 0,
            });
            i += 1;
            line_a += 1;
        }
    }
    script
}

/// Groups changed lines with `context` surrounding lines; ranges that overlap
/// or touch are merged into one hunk.
pub fn build_hunks<'a>(script: &[DiffLine<'a>], context: usize) -> Vec<Hunk<'a>> {
    if script.is_empty() {
        return Vec::new();
    }
    let last_index = script.len() - 1;
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for (index, line) in script.iter().enumerate() {
        if line.kind == LineKind::Equal {
            continue;
        }
        let start = index.saturating_sub(context);
        let end = (index + context).min(last_index);
        match ranges.last_mut() {
            Some(range) if range.1 + 1 >= start => range.1 = end.max(range.1),
            _ => ranges.push((start, end)),
        }
    }

    ranges
        .into_iter()
        .map(|(start, end)| {
            let lines = script[start..=end].to_vec();
            let start_a = lines
                .iter()
                .map(|line| line.line_a)
                .find(|&number| number != 0)
                .unwrap_or(1);
            let start_b = lines
                .iter()
                .map(|line| line.line_b)
                .find(|&number| number != 0)
                .unwrap_or(1);
            let count_a = lines
                .iter()
                .filter(|line| line.kind != LineKind::Added)
                .count();
            let count_b = lines
                .iter()
                .filter(|line| line.kind != LineKind::Removed)
                .count();
            Hunk {
                start_a,
                count_a,
                start_b,
                count_b,
                lines,
            }
        })
        .collect()
}

pub fn count_added(diff: &str) -> usize {
    count_hunk_lines(diff, '+')
}

pub fn count_removed(diff: &str) -> usize {
    count_hunk_lines(diff, '-')
}

// Header lines come before the first `@@`; body lines are counted by marker only,
// so a removed line whose text starts with "--" is still a removal.
fn count_hunk_lines(diff: &str, marker: char) -> usize {
    let mut in_hunk = false;
    let mut count = 0;
    for line in diff.lines() {
        if line.starts_with("@@") {
            in_hunk = true;
        } else if in_hunk && line.starts_with(marker) {
            count += 1;
        } else if !in_hunk {
            let header = if marker == '+' { "+++" } else { "---" };
            if line.starts_with(marker) && !line.starts_with(header) {
                count += 1;
            }
        }
    }
    count
}
