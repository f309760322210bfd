//! Exhaustive search proving a hand of cards can reach the target value.
//!
//! The search reduces the hand one pairwise combination at a time: pick any
//! two remaining values, combine them with one of the four operators
//! (subtraction and division in both orders), and recurse on the shrunk
//! list. A single remaining value is a solution iff it lands within
//! [`SOLVE_EPSILON`](crate::SOLVE_EPSILON) of the target. Worst case is
//! roughly 36 x 18 x 6 leaf evaluations per hand, cheap enough to run
//! synchronously on the matchmaking path.

use crate::{Puzzle, SOLVE_EPSILON, TARGET};

/// Returns true when some arithmetic combination of the cards reaches 24.
pub fn is_solvable(puzzle: &Puzzle) -> bool {
    solve(puzzle).is_some()
}

/// Returns the first discovered solution, rendered with explicit
/// parentheses around every combination so the expression validator
/// accepts it verbatim.
pub fn solve(puzzle: &Puzzle) -> Option<String> {
    let values: Vec<(f64, String)> = puzzle
        .iter()
        .map(|&card| (f64::from(card), card.to_string()))
        .collect();
    search(&values)
}

fn search(values: &[(f64, String)]) -> Option<String> {
    if let [(value, repr)] = values {
        if (value - TARGET).abs() < SOLVE_EPSILON {
            return Some(repr.clone());
        }
        return None;
    }

    for i in 0..values.len() {
        for j in (i + 1)..values.len() {
            let (a, a_repr) = &values[i];
            let (b, b_repr) = &values[j];

            let rest: Vec<(f64, String)> = values
                .iter()
                .enumerate()
                .filter(|&(k, _)| k != i && k != j)
                .map(|(_, v)| v.clone())
                .collect();

            for combined in combinations(*a, *b, a_repr, b_repr) {
                let mut next = rest.clone();
                next.push(combined);
                if let Some(solution) = search(&next) {
                    return Some(solution);
                }
            }
        }
    }

    None
}

// Divisors within epsilon of zero are skipped rather than evaluated.
fn combinations(a: f64, b: f64, a_repr: &str, b_repr: &str) -> Vec<(f64, String)> {
    let mut out = vec![
        (a + b, format!("({} + {})", a_repr, b_repr)),
        (a * b, format!("({} * {})", a_repr, b_repr)),
        (a - b, format!("({} - {})", a_repr, b_repr)),
        (b - a, format!("({} - {})", b_repr, a_repr)),
    ];

    if b.abs() > SOLVE_EPSILON {
        out.push((a / b, format!("({} / {})", a_repr, b_repr)));
    }
    if a.abs() > SOLVE_EPSILON {
        out.push((b / a, format!("({} / {})", b_repr, a_repr)));
    }

    out
}
