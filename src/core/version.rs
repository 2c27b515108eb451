//! RubyGems version and requirement handling.
//!
//! Gem versions are not semver: they have any number of segments and
//! prerelease markers are alphabetic segments (`1.0.0.rc1`, `2.0a`).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error parsing a version or requirement string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("malformed version number string {0}")]
    MalformedVersion(String),

    #[error("illformed requirement [{0:?}]")]
    MalformedRequirement(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Num(u64),
    Str(String),
}

impl Segment {
    fn cmp_segment(&self, other: &Segment) -> Ordering {
        match (self, other) {
            (Segment::Num(a), Segment::Num(b)) => a.cmp(b),
            (Segment::Str(a), Segment::Str(b)) => a.cmp(b),
            // Prerelease markers sort below any number.
            (Segment::Num(_), Segment::Str(_)) => Ordering::Greater,
            (Segment::Str(_), Segment::Num(_)) => Ordering::Less,
        }
    }
}

/// A gem version such as `1.2.3` or `3.3.0.rc1`.
#[derive(Debug, Clone)]
pub struct GemVersion {
    raw: String,
    segments: Vec<Segment>,
}

impl GemVersion {
    /// Parse a version string.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let trimmed = s.trim();
        let valid = !trimmed.is_empty()
            && trimmed.starts_with(|c: char| c.is_ascii_digit())
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
        if !valid {
            return Err(VersionError::MalformedVersion(s.to_string()));
        }

        // RubyGems treats `-` as a prerelease separator (`1.0-rc1` == `1.0.pre.rc1`).
        let normalized = trimmed.replace('-', ".pre.");

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut current_is_digit = false;
        for c in normalized.chars() {
            if c == '.' {
                push_segment(&mut segments, &mut current, current_is_digit);
                continue;
            }
            let is_digit = c.is_ascii_digit();
            if !current.is_empty() && is_digit != current_is_digit {
                push_segment(&mut segments, &mut current, current_is_digit);
            }
            current_is_digit = is_digit;
            current.push(c);
        }
        push_segment(&mut segments, &mut current, current_is_digit);

        if segments.is_empty() {
            return Err(VersionError::MalformedVersion(s.to_string()));
        }

        Ok(GemVersion {
            raw: trimmed.to_string(),
            segments,
        })
    }

    /// The upper bound used by the pessimistic operator.
    ///
    /// `~> 3.3.0` allows `< 3.4`, `~> 3.3` allows `< 4`.
    pub fn bump(&self) -> GemVersion {
        let mut numeric: Vec<u64> = self
            .segments
            .iter()
            .take_while(|s| matches!(s, Segment::Num(_)))
            .map(|s| match s {
                Segment::Num(n) => *n,
                Segment::Str(_) => 0,
            })
            .collect();

        if numeric.len() > 1 {
            numeric.pop();
        }
        if let Some(last) = numeric.last_mut() {
            *last += 1;
        } else {
            numeric.push(1);
        }

        let raw = numeric
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");
        GemVersion {
            raw,
            segments: numeric.into_iter().map(Segment::Num).collect(),
        }
    }

    /// The version as originally written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn push_segment(segments: &mut Vec<Segment>, current: &mut String, is_digit: bool) {
    if current.is_empty() {
        return;
    }
    let segment = if is_digit {
        current
            .parse()
            .map(Segment::Num)
            .unwrap_or_else(|_| Segment::Str(current.clone()))
    } else {
        Segment::Str(current.clone())
    };
    segments.push(segment);
    current.clear();
}

impl FromStr for GemVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GemVersion::parse(s)
    }
}

impl fmt::Display for GemVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for GemVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        let zero = Segment::Num(0);
        for i in 0..len {
            let a = self.segments.get(i).unwrap_or(&zero);
            let b = other.segments.get(i).unwrap_or(&zero);
            match a.cmp_segment(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for GemVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for GemVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GemVersion {}

/// Comparison operator of a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    Pessimistic,
}

impl Op {
    const TABLE: [(&'static str, Op); 7] = [
        ("~>", Op::Pessimistic),
        (">=", Op::GtEq),
        ("<=", Op::LtEq),
        ("!=", Op::NotEq),
        ("=", Op::Eq),
        (">", Op::Gt),
        ("<", Op::Lt),
    ];

    /// The operator as written in gem metadata.
    pub fn as_str(&self) -> &'static str {
        Op::TABLE
            .iter()
            .find(|(_, op)| op == self)
            .map(|(s, _)| *s)
            .unwrap_or("=")
    }

    fn from_symbol(s: &str) -> Option<Op> {
        Op::TABLE.iter().find(|(sym, _)| *sym == s).map(|(_, op)| *op)
    }

    fn split_prefix(s: &str) -> (Op, &str) {
        for (sym, op) in Op::TABLE {
            if let Some(rest) = s.strip_prefix(sym) {
                return (op, rest);
            }
        }
        (Op::Eq, s)
    }
}

/// A single `op version` constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub op: Op,
    pub version: GemVersion,
}

impl Constraint {
    pub fn new(op: Op, version: GemVersion) -> Self {
        Constraint { op, version }
    }

    /// Build a constraint from the operator symbol used in gem metadata.
    pub fn from_parts(op: &str, version: &str) -> Result<Self, VersionError> {
        let op = Op::from_symbol(op.trim())
            .ok_or_else(|| VersionError::MalformedRequirement(format!("{} {}", op, version)))?;
        Ok(Constraint::new(op, GemVersion::parse(version)?))
    }

    pub fn matches(&self, v: &GemVersion) -> bool {
        let target = &self.version;
        match self.op {
            Op::Eq => v == target,
            Op::NotEq => v != target,
            Op::Gt => v > target,
            Op::Lt => v < target,
            Op::GtEq => v >= target,
            Op::LtEq => v <= target,
            Op::Pessimistic => v >= target && *v < target.bump(),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op.as_str(), self.version)
    }
}

/// A set of constraints that must all hold, e.g. `>= 2.7, < 4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    constraints: Vec<Constraint>,
}

impl Requirement {
    /// The requirement every version satisfies (`>= 0`).
    pub fn default_requirement() -> Self {
        let zero = GemVersion {
            raw: "0".to_string(),
            segments: vec![Segment::Num(0)],
        };
        Requirement {
            constraints: vec![Constraint::new(Op::GtEq, zero)],
        }
    }

    pub fn from_constraints(constraints: Vec<Constraint>) -> Self {
        if constraints.is_empty() {
            return Requirement::default_requirement();
        }
        Requirement { constraints }
    }

    /// Parse a comma separated requirement string.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let mut constraints = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(VersionError::MalformedRequirement(s.to_string()));
            }
            let (op, rest) = Op::split_prefix(part);
            let version = GemVersion::parse(rest)
                .map_err(|_| VersionError::MalformedRequirement(s.to_string()))?;
            constraints.push(Constraint::new(op, version));
        }
        Ok(Requirement::from_constraints(constraints))
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn is_satisfied_by(&self, v: &GemVersion) -> bool {
        self.constraints.iter().all(|c| c.matches(v))
    }

    /// Whether this is the catch-all `>= 0` requirement.
    pub fn is_default(&self) -> bool {
        *self == Requirement::default_requirement()
    }
}

impl Default for Requirement {
    fn default() -> Self {
        Requirement::default_requirement()
    }
}

impl FromStr for Requirement {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Requirement::parse(s)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.constraints.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join(", "))
    }
}
