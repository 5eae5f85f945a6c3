use crate::types::Rank;

/// Classifies a candidate number set against a round's winning numbers.
///
/// Set semantics: element order on either side is irrelevant. Total for any
/// input, including a bonus that happens to sit inside `winning` (which a
/// valid drawing never produces).
pub fn calculate_rank(candidate: &[u8], winning: &[u8], bonus: u8) -> Rank {
    let matches = candidate.iter().filter(|n| winning.contains(n)).count();
    match matches {
        6 => Rank::First,
        5 if candidate.contains(&bonus) => Rank::Second,
        5 => Rank::Third,
        4 => Rank::Fourth,
        3 => Rank::Fifth,
        _ => Rank::None,
    }
}
