use std::fmt;
use thiserror::Error;

/// One segment of a field path: a named object field or a numeric array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Location of a validation issue inside a nested value, rendered in the
/// same dot/bracket notation the form decoder consumes (`a.b[2].c`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn push_key(&mut self, key: impl Into<String>) {
        self.segments.push(PathSegment::Key(key.into()));
    }

    pub fn push_index(&mut self, index: usize) {
        self.segments.push(PathSegment::Index(index));
    }

    pub fn pop(&mut self) {
        self.segments.pop();
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("$");
        }
        for (pos, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) => {
                    if pos > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// A single schema rejection, located by field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub path: FieldPath,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: FieldPath, message: impl Into<String>) -> Self {
        Self { path, message: message.into() }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// The full issue list produced by one validation pass.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("validation failed: {}", self.summary())]
pub struct ValidationFailure {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationFailure {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    pub fn single(path: FieldPath, message: impl Into<String>) -> Self {
        Self { issues: vec![ValidationIssue::new(path, message)] }
    }

    fn summary(&self) -> String {
        match self.issues.as_slice() {
            [] => "no issues recorded".to_string(),
            [only] => only.to_string(),
            [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_renders_dot_bracket_notation() {
        let mut path = FieldPath::root();
        path.push_key("a");
        path.push_key("b");
        path.push_index(2);
        path.push_key("c");
        assert_eq!(path.to_string(), "a.b[2].c");
    }

    #[test]
    fn root_path_renders_dollar() {
        assert_eq!(FieldPath::root().to_string(), "$");
    }

    #[test]
    fn failure_summarizes_issue_count() {
        let failure = ValidationFailure::new(vec![
            ValidationIssue::new(FieldPath::root(), "expected object"),
            ValidationIssue::new(FieldPath::root(), "expected string"),
        ]);
        assert_eq!(failure.to_string(), "validation failed: $: expected object (and 1 more)");
    }
}
