//! Predicate trees and their evaluation.

use crate::error::{CoreError, CoreResult};
use crate::object::{Cell, StoreState};
use crate::query::path::FieldPath;
use crate::schema::FieldType;
use crate::value::Case;

/// String comparison applied by a text condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TextOp {
    Equals,
    Contains,
    BeginsWith,
    EndsWith,
}

/// The test a leaf applies to the cell(s) its path reaches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Test {
    IntEquals(i64),
    /// Inclusive on both ends.
    Between(i64, i64),
    GreaterThan(i64),
    LessThan(i64),
    /// `needle` is already lowercased for [`Case::Insensitive`].
    Text {
        op: TextOp,
        needle: String,
        case: Case,
    },
    IsNull,
}

impl Test {
    /// Builds a text test, folding the needle for case-insensitive matching.
    pub(crate) fn text(op: TextOp, needle: &str, case: Case) -> Self {
        let needle = match case {
            Case::Sensitive => needle.to_string(),
            Case::Insensitive => needle.to_lowercase(),
        };
        Self::Text { op, needle, case }
    }

    /// Field type this test applies to.
    fn operand_kind(&self) -> &'static str {
        match self {
            Self::IntEquals(_) | Self::Between(..) | Self::GreaterThan(_) | Self::LessThan(_) => {
                "integer"
            }
            Self::Text { .. } => "text",
            Self::IsNull => "link",
        }
    }

    fn accepts(&self, field_type: FieldType) -> bool {
        matches!(
            (self, field_type),
            (
                Self::IntEquals(_) | Self::Between(..) | Self::GreaterThan(_) | Self::LessThan(_),
                FieldType::Int
            ) | (Self::Text { .. }, FieldType::Text)
                | (Self::IsNull, FieldType::Link(_))
        )
    }

    fn eval(&self, cell: &Cell) -> bool {
        match (self, cell) {
            (Self::IntEquals(v), Cell::Int(n)) => n == v,
            (Self::Between(low, high), Cell::Int(n)) => low <= n && n <= high,
            (Self::GreaterThan(v), Cell::Int(n)) => n > v,
            (Self::LessThan(v), Cell::Int(n)) => n < v,
            (Self::Text { op, needle, case }, Cell::Text(s)) => match case {
                Case::Sensitive => text_matches(*op, s, needle),
                Case::Insensitive => text_matches(*op, &s.to_lowercase(), needle),
            },
            (Self::IsNull, Cell::Link(target)) => target.is_none(),
            _ => false,
        }
    }
}

fn text_matches(op: TextOp, haystack: &str, needle: &str) -> bool {
    match op {
        TextOp::Equals => haystack == needle,
        TextOp::Contains => haystack.contains(needle),
        TextOp::BeginsWith => haystack.starts_with(needle),
        TextOp::EndsWith => haystack.ends_with(needle),
    }
}

/// A single field comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Condition {
    path: FieldPath,
    test: Test,
}

impl Condition {
    /// Pairs a path with a test after checking the leaf field's type.
    pub(crate) fn new(path: FieldPath, test: Test) -> CoreResult<Self> {
        let leaf = path.leaf.field_type();
        if !test.accepts(leaf) {
            return Err(CoreError::type_mismatch(
                &path.text,
                test.operand_kind(),
                leaf.describe(),
            ));
        }
        Ok(Self { path, test })
    }

    fn eval(&self, state: &StoreState, row: &[Cell]) -> bool {
        self.path.cells(state, row).any(|cell| self.test.eval(cell))
    }
}

/// A predicate tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Predicate {
    Leaf(Condition),
    /// Conjunction; empty is true.
    All(Vec<Predicate>),
    /// Disjunction.
    Any(Vec<Predicate>),
}

impl Predicate {
    /// Evaluates against one row, short-circuiting both connectives.
    pub(crate) fn eval(&self, state: &StoreState, row: &[Cell]) -> bool {
        match self {
            Self::Leaf(condition) => condition.eval(state, row),
            Self::All(children) => children.iter().all(|p| p.eval(state, row)),
            Self::Any(children) => children.iter().any(|p| p.eval(state, row)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_tests() {
        assert!(Test::Between(20, 50).eval(&Cell::Int(20)));
        assert!(Test::Between(20, 50).eval(&Cell::Int(50)));
        assert!(!Test::Between(20, 50).eval(&Cell::Int(51)));
        assert!(Test::GreaterThan(3).eval(&Cell::Int(4)));
        assert!(!Test::LessThan(3).eval(&Cell::Int(3)));
        assert!(!Test::IntEquals(3).eval(&Cell::Text("3".into())));
    }

    #[test]
    fn text_case_handling() {
        let tiger = Cell::Text("Tiger".into());
        assert!(Test::text(TextOp::Contains, "tig", Case::Insensitive).eval(&tiger));
        assert!(!Test::text(TextOp::Contains, "tig", Case::Sensitive).eval(&tiger));
        assert!(Test::text(TextOp::BeginsWith, "Ti", Case::Sensitive).eval(&tiger));
        assert!(Test::text(TextOp::EndsWith, "GER", Case::Insensitive).eval(&tiger));
        assert!(Test::text(TextOp::Equals, "TIGER", Case::Insensitive).eval(&tiger));
        assert!(!Test::text(TextOp::Equals, "TIGER", Case::Sensitive).eval(&tiger));
    }

    #[test]
    fn null_test() {
        assert!(Test::IsNull.eval(&Cell::Link(None)));
        assert!(!Test::IsNull.eval(&Cell::Link(Some(0))));
    }

    #[test]
    fn operand_must_fit_field() {
        assert!(Test::Between(1, 2).accepts(FieldType::Int));
        assert!(!Test::Between(1, 2).accepts(FieldType::Text));
        assert!(!Test::IsNull.accepts(FieldType::Int));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn between_matches_range(low in -100i64..100, span in 0i64..100, n in -200i64..200) {
                let high = low + span;
                prop_assert_eq!(Test::Between(low, high).eval(&Cell::Int(n)), (low..=high).contains(&n));
            }

            #[test]
            fn insensitive_contains_ignores_ascii_case(s in "[a-zA-Z]{0,12}", start in 0usize..12, len in 0usize..6) {
                let start = start.min(s.len());
                let end = (start + len).min(s.len());
                let needle = s[start..end].to_uppercase();
                let cell = Cell::Text(s.clone());
                prop_assert!(Test::text(TextOp::Contains, &needle, Case::Insensitive).eval(&cell));
            }
        }
    }
}
