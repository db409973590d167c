//! Source positions for error reporting.

use std::fmt;

/// A location in Spackel source text. Lines and columns are 1-indexed and
/// counted in characters, not bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

impl Pos {
    pub fn new(line: u32, column: u32) -> Self {
        Pos { line, column }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_as_line_colon_column() {
        assert_eq!(Pos::new(3, 14).to_string(), "3:14");
    }
}
