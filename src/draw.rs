use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub const NUMBER_MIN: u8 = 1;
pub const NUMBER_MAX: u8 = 45;
pub const NUMBERS_PER_DRAW: usize = 6;

/// One lottery drawing. Field names follow the legacy on-disk JSON schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawRecord {
    #[serde(deserialize_with = "round_from_int_or_string")]
    pub round: u32,
    pub numbers: Vec<u8>,
    pub bonus_number: u8,
    pub first_prize: u64,
    pub first_winners: u64,
    pub draw_date: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DrawValidationError {
    #[error("round must be a positive integer")]
    NonPositiveRound,
    #[error("expected {NUMBERS_PER_DRAW} numbers, got {0}")]
    WrongNumberCount(usize),
    #[error("duplicate number {0} in draw")]
    DuplicateNumber(u8),
    #[error("number {0} outside {NUMBER_MIN}..={NUMBER_MAX}")]
    NumberOutOfRange(u8),
    #[error("bonus number {0} outside {NUMBER_MIN}..={NUMBER_MAX}")]
    BonusOutOfRange(u8),
    #[error("bonus number {0} collides with main numbers")]
    BonusCollision(u8),
}

impl DrawRecord {
    pub fn validate(&self) -> Result<(), DrawValidationError> {
        if self.round == 0 {
            return Err(DrawValidationError::NonPositiveRound);
        }
        if self.numbers.len() != NUMBERS_PER_DRAW {
            return Err(DrawValidationError::WrongNumberCount(self.numbers.len()));
        }
        let mut seen = [false; (NUMBER_MAX as usize) + 1];
        for &n in &self.numbers {
            if !(NUMBER_MIN..=NUMBER_MAX).contains(&n) {
                return Err(DrawValidationError::NumberOutOfRange(n));
            }
            if seen[n as usize] {
                return Err(DrawValidationError::DuplicateNumber(n));
            }
            seen[n as usize] = true;
        }
        if !(NUMBER_MIN..=NUMBER_MAX).contains(&self.bonus_number) {
            return Err(DrawValidationError::BonusOutOfRange(self.bonus_number));
        }
        if seen[self.bonus_number as usize] {
            return Err(DrawValidationError::BonusCollision(self.bonus_number));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Older file revisions stored `round` as a string in some runs. Accept both
/// shapes on the way in; unparseable text maps to 0 so the record falls out
/// at validation instead of aborting the whole load.
fn round_from_int_or_string<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RoundRepr {
        Int(u32),
        Text(String),
    }

    Ok(match RoundRepr::deserialize(deserializer)? {
        RoundRepr::Int(n) => n,
        RoundRepr::Text(s) => s.trim().parse::<u32>().unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DrawRecord {
        DrawRecord {
            round: 1172,
            numbers: vec![7, 9, 24, 40, 42, 44],
            bonus_number: 45,
            first_prize: 1_823_749_000,
            first_winners: 15,
            draw_date: "2025년 04월 19일".to_string(),
        }
    }

    #[test]
    fn valid_record_passes() {
        assert!(record().is_valid());
    }

    #[test]
    fn five_numbers_rejected() {
        let mut r = record();
        r.numbers.pop();
        assert_eq!(r.validate(), Err(DrawValidationError::WrongNumberCount(5)));
    }

    #[test]
    fn duplicate_numbers_rejected() {
        let mut r = record();
        r.numbers = vec![7, 7, 24, 40, 42, 44];
        assert_eq!(r.validate(), Err(DrawValidationError::DuplicateNumber(7)));
    }

    #[test]
    fn out_of_range_number_rejected() {
        let mut r = record();
        r.numbers = vec![7, 9, 24, 40, 42, 46];
        assert_eq!(r.validate(), Err(DrawValidationError::NumberOutOfRange(46)));
    }

    #[test]
    fn zero_bonus_rejected() {
        let mut r = record();
        r.bonus_number = 0;
        assert_eq!(r.validate(), Err(DrawValidationError::BonusOutOfRange(0)));
    }

    #[test]
    fn bonus_collision_rejected() {
        let mut r = record();
        r.bonus_number = 24;
        assert_eq!(r.validate(), Err(DrawValidationError::BonusCollision(24)));
    }

    #[test]
    fn zero_round_rejected() {
        let mut r = record();
        r.round = 0;
        assert_eq!(r.validate(), Err(DrawValidationError::NonPositiveRound));
    }

    #[test]
    fn round_deserializes_from_string() {
        let json = r#"{
            "round": "1101",
            "numbers": [6, 7, 27, 29, 38, 45],
            "bonusNumber": 17,
            "firstPrize": 2098193250,
            "firstWinners": 13,
            "drawDate": "2023년 12월 30일"
        }"#;
        let parsed: DrawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.round, 1101);
        assert!(parsed.is_valid());
    }

    #[test]
    fn unparseable_round_becomes_zero() {
        let json = r#"{
            "round": "n/a",
            "numbers": [6, 7, 27, 29, 38, 45],
            "bonusNumber": 17,
            "firstPrize": 0,
            "firstWinners": 0,
            "drawDate": ""
        }"#;
        let parsed: DrawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.round, 0);
        assert!(!parsed.is_valid());
    }
}
