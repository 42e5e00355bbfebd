use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::domain::{Direction, Side};

static COMPOUND_TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(?P<stoich>\d+)\s+)?(?P<compound>[CG]\d+)").expect("compound term pattern")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EquationError {
    #[error("no `=` separator in equation")]
    MissingSeparator,

    #[error("more than one `=` separator in equation")]
    MultipleSeparators,

    #[error("term `{0}` does not name a compound or glycan")]
    InvalidTerm(String),

    #[error("term `{0}` has a stoichiometry that is not a positive integer")]
    InvalidStoichiometry(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Term {
    pub compound_id: String,
    pub stoichiometry: u32,
}

impl Term {
    pub fn new(compound_id: impl Into<String>, stoichiometry: u32) -> Self {
        Self {
            compound_id: compound_id.into(),
            stoichiometry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedEquation {
    pub direction: Direction,
    pub left: Vec<Term>,
    pub right: Vec<Term>,
}

impl ParsedEquation {
    pub fn terms(&self) -> impl Iterator<Item = (Side, &Term)> {
        self.left
            .iter()
            .map(|term| (Side::Left, term))
            .chain(self.right.iter().map(|term| (Side::Right, term)))
    }
}

pub fn parse_equation(text: &str) -> Result<ParsedEquation, EquationError> {
    let mut halves = text.split('=');
    let left = halves.next().unwrap_or_default();
    let right = halves.next().ok_or(EquationError::MissingSeparator)?;
    if halves.next().is_some() {
        return Err(EquationError::MultipleSeparators);
    }

    let backward = left.ends_with('<');
    let forward = right.starts_with('>');
    let direction = match (backward, forward) {
        (true, true) => Direction::Reversible,
        (true, false) => Direction::BackwardOnly,
        (false, true) => Direction::ForwardOnly,
        (false, false) => Direction::Unknown,
    };

    let left = left.strip_suffix('<').unwrap_or(left);
    let right = right.strip_prefix('>').unwrap_or(right);

    Ok(ParsedEquation {
        direction,
        left: parse_side(left)?,
        right: parse_side(right)?,
    })
}

// Sides are joined with " + " so that coefficients like "(n+1)" stay intact.
fn parse_side(side: &str) -> Result<Vec<Term>, EquationError> {
    side.trim().split(" + ").map(parse_term).collect()
}

fn parse_term(term: &str) -> Result<Term, EquationError> {
    let term = term.trim();
    let captures = COMPOUND_TERM
        .captures(term)
        .ok_or_else(|| EquationError::InvalidTerm(term.to_string()))?;
    let stoichiometry = match captures.name("stoich") {
        Some(digits) => digits
            .as_str()
            .parse::<u32>()
            .ok()
            .filter(|value| *value > 0)
            .ok_or_else(|| EquationError::InvalidStoichiometry(term.to_string()))?,
        None => 1,
    };
    Ok(Term::new(&captures["compound"], stoichiometry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversible_equation() {
        let parsed = parse_equation("C00001 + C00002 <=> C00003").unwrap();
        assert_eq!(parsed.direction, Direction::Reversible);
        assert_eq!(
            parsed.left,
            vec![Term::new("C00001", 1), Term::new("C00002", 1)]
        );
        assert_eq!(parsed.right, vec![Term::new("C00003", 1)]);
    }

    #[test]
    fn forward_equation_with_coefficient() {
        let parsed = parse_equation("2 C00001 => C00004").unwrap();
        assert_eq!(parsed.direction, Direction::ForwardOnly);
        assert_eq!(parsed.left, vec![Term::new("C00001", 2)]);
        assert_eq!(parsed.right, vec![Term::new("C00004", 1)]);
    }

    #[test]
    fn terms_are_tagged_with_sides() {
        let parsed = parse_equation("C00001 <= C00002 + G00003").unwrap();
        let sides: Vec<_> = parsed
            .terms()
            .map(|(side, term)| (side, term.compound_id.as_str()))
            .collect();
        assert_eq!(
            sides,
            vec![
                (Side::Left, "C00001"),
                (Side::Right, "C00002"),
                (Side::Right, "G00003")
            ]
        );
    }
}
