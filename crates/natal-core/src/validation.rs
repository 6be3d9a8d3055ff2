//! Clinical input validation shared by the record services.

use chrono::{Datelike, NaiveDate};

use crate::error::{NatalError, NatalResult};

/// Minimum length of a correction justification, in characters.
pub const MIN_JUSTIFICATION_CHARS: usize = 20;

pub fn justification(text: &str) -> NatalResult<()> {
    let len = text.trim().chars().count();
    if len < MIN_JUSTIFICATION_CHARS {
        return Err(NatalError::validation(format!(
            "justification must have at least {MIN_JUSTIFICATION_CHARS} characters (got {len})"
        )));
    }
    Ok(())
}

/// Mother's birth date: not in the future, age between 12 and 60 years.
pub fn mother_birth_date(birth_date: NaiveDate, today: NaiveDate) -> NatalResult<()> {
    if birth_date > today {
        return Err(NatalError::validation("birth date cannot be in the future"));
    }
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    if !(12..=60).contains(&age) {
        return Err(NatalError::validation(format!(
            "age must be between 12 and 60 years (got {age})"
        )));
    }
    Ok(())
}

fn in_range<T: PartialOrd + std::fmt::Display>(
    field: &str,
    value: Option<T>,
    min: T,
    max: T,
) -> NatalResult<()> {
    match value {
        Some(v) if v < min || v > max => Err(NatalError::validation(format!(
            "{field} must be between {min} and {max} (got {v})"
        ))),
        _ => Ok(()),
    }
}

pub fn gestational_weeks(weeks: Option<u32>) -> NatalResult<()> {
    in_range("gestational age (weeks)", weeks, 20, 45)
}

pub fn newborn_weight(grams: Option<u32>) -> NatalResult<()> {
    in_range("weight (g)", grams, 500, 6000)
}

pub fn newborn_length(cm: Option<f64>) -> NatalResult<()> {
    in_range("length (cm)", cm, 25.0, 65.0)
}

pub fn apgar(score: Option<u32>) -> NatalResult<()> {
    in_range("APGAR", score, 0, 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn justification_length_boundary() {
        assert!(justification("demasiado corto 15").is_err());
        assert!(justification(&"a".repeat(19)).is_err());
        assert!(justification(&"a".repeat(20)).is_ok());
    }

    #[test]
    fn justification_counts_characters_not_bytes() {
        // 10 two-byte characters: 20 bytes but only 10 chars.
        assert!(justification(&"ñ".repeat(10)).is_err());
        assert!(justification(&"ñ".repeat(20)).is_ok());
    }

    #[test]
    fn justification_ignores_padding() {
        assert!(justification(&format!("   {}   ", "a".repeat(15))).is_err());
    }

    #[test]
    fn mother_age_window() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert!(mother_birth_date(NaiveDate::from_ymd_opt(1995, 3, 10).unwrap(), today).is_ok());
        assert!(mother_birth_date(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(), today).is_err());
        assert!(mother_birth_date(NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(), today).is_err());
        assert!(mother_birth_date(NaiveDate::from_ymd_opt(1960, 1, 1).unwrap(), today).is_err());
        // Turns 12 tomorrow.
        assert!(mother_birth_date(NaiveDate::from_ymd_opt(2013, 6, 2).unwrap(), today).is_err());
        assert!(mother_birth_date(NaiveDate::from_ymd_opt(2013, 6, 1).unwrap(), today).is_ok());
    }

    #[test]
    fn clinical_ranges() {
        assert!(gestational_weeks(Some(39)).is_ok());
        assert!(gestational_weeks(Some(19)).is_err());
        assert!(gestational_weeks(None).is_ok());
        assert!(newborn_weight(Some(3400)).is_ok());
        assert!(newborn_weight(Some(499)).is_err());
        assert!(newborn_length(Some(50.5)).is_ok());
        assert!(newborn_length(Some(70.0)).is_err());
        assert!(apgar(Some(10)).is_ok());
        assert!(apgar(Some(11)).is_err());
    }
}
