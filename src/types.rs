use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const NUMBER_COUNT: usize = 6;
pub const MIN_NUMBER: u8 = 1;
pub const MAX_NUMBER: u8 = 45;

/// Prize tier a candidate number set achieves against a drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rank {
    First,
    Second,
    Third,
    Fourth,
    Fifth,
    None,
}

impl Rank {
    pub fn label(self) -> &'static str {
        match self {
            Self::First => "1st",
            Self::Second => "2nd",
            Self::Third => "3rd",
            Self::Fourth => "4th",
            Self::Fifth => "5th",
            Self::None => "none",
        }
    }
}

/// Canonical record of one round's official outcome, regardless of which
/// upstream source it came from. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawResult {
    pub round: u32,
    /// "YYYY-MM-DD", or empty when the source carried no parseable date.
    pub draw_date: String,
    /// Six distinct numbers in [1,45], ascending.
    pub winning_numbers: Vec<u8>,
    pub bonus_number: u8,
    pub total_sales: u64,
    pub first_prize_amount: u64,
    pub first_prize_winner_count: u64,
    /// Prize-pool amount per rank (1..=3) where the source provides a
    /// tier breakdown; absent tiers are simply not present.
    pub prize_amounts: BTreeMap<u8, u64>,
}

/// One submitted number set, owned by an anonymous device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participation {
    pub device_id: String,
    pub round: u32,
    pub numbers: Vec<u8>,
    pub created_at: String,
}

/// Counts of participations per rank category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankTally {
    #[serde(rename = "1st")]
    pub first: u64,
    #[serde(rename = "2nd")]
    pub second: u64,
    #[serde(rename = "3rd")]
    pub third: u64,
    #[serde(rename = "4th")]
    pub fourth: u64,
    #[serde(rename = "5th")]
    pub fifth: u64,
    #[serde(rename = "none")]
    pub none: u64,
}

impl RankTally {
    pub fn record(&mut self, rank: Rank) {
        match rank {
            Rank::First => self.first += 1,
            Rank::Second => self.second += 1,
            Rank::Third => self.third += 1,
            Rank::Fourth => self.fourth += 1,
            Rank::Fifth => self.fifth += 1,
            Rank::None => self.none += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.first + self.second + self.third + self.fourth + self.fifth + self.none
    }
}

/// Immutable aggregate snapshot for one closed round. At most one exists
/// per round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyStats {
    pub round: u32,
    pub winning_numbers: Vec<u8>,
    pub bonus_number: u8,
    /// Distinct devices, not raw entry count.
    pub total_participants: u64,
    pub results: RankTally,
    pub prize_amounts: BTreeMap<u8, u64>,
    pub calculated_at: String,
}

pub fn join_numbers(numbers: &[u8]) -> String {
    numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn split_numbers(raw: &str) -> Result<Vec<u8>, std::num::ParseIntError> {
    raw.split(',').map(|part| part.trim().parse()).collect()
}

/// Validates a submitted number set and returns it in canonical ascending
/// order, or a human-readable rejection reason.
pub fn canonical_numbers(mut numbers: Vec<u8>) -> Result<Vec<u8>, String> {
    if numbers.len() != NUMBER_COUNT {
        return Err(format!(
            "expected exactly {NUMBER_COUNT} numbers, got {}",
            numbers.len()
        ));
    }
    if let Some(out_of_range) = numbers
        .iter()
        .find(|n| !(MIN_NUMBER..=MAX_NUMBER).contains(*n))
    {
        return Err(format!(
            "number {out_of_range} is outside [{MIN_NUMBER},{MAX_NUMBER}]"
        ));
    }
    numbers.sort_unstable();
    if numbers.windows(2).any(|pair| pair[0] == pair[1]) {
        return Err("numbers must be distinct".to_string());
    }
    Ok(numbers)
}
