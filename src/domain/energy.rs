//! Energy extraction policy.
//!
//! Classifies a product document as usable or unusable. An unusable record
//! is a normal outcome: the tracker quarantines it and counts nothing.

use std::fmt;

use serde_json::Value;

use super::error::DomainError;
use super::product::ProductRecord;

/// `status` value Open Food Facts uses for unknown products.
pub const STATUS_NOT_FOUND: i64 = 0;

/// Nutritional energy in kilojoules. Always finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct EnergyValue(f64);

impl EnergyValue {
    pub const ZERO: Self = Self(0.0);

    pub fn from_kilojoules(kilojoules: f64) -> Result<Self, DomainError> {
        if kilojoules.is_finite() && kilojoules >= 0.0 {
            Ok(Self(kilojoules))
        } else {
            Err(DomainError::invariant(format!(
                "energy must be a finite, non-negative kJ value, got {kilojoules}"
            )))
        }
    }

    pub fn kilojoules(self) -> f64 {
        self.0
    }
}

impl fmt::Display for EnergyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} kJ", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnusableReason {
    Absent,
    NotFound,
    MissingEnergy,
    NonNumericEnergy(String),
    OutOfRange(f64),
}

impl fmt::Display for UnusableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("no product document"),
            Self::NotFound => f.write_str("product not found upstream"),
            Self::MissingEnergy => f.write_str("no per-serving energy"),
            Self::NonNumericEnergy(raw) => write!(f, "per-serving energy `{raw}` is not numeric"),
            Self::OutOfRange(value) => write!(f, "per-serving energy {value} is out of range"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Usable(EnergyValue),
    Unusable(UnusableReason),
}

impl Resolution {
    /// Energy this resolution adds to a running total.
    pub fn contribution(&self) -> EnergyValue {
        match self {
            Self::Usable(energy) => *energy,
            Self::Unusable(_) => EnergyValue::ZERO,
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Usable(_))
    }
}

/// Resolve the per-serving energy of `record`.
pub fn resolve(record: Option<&ProductRecord>) -> Resolution {
    let Some(record) = record.filter(|record| !record.is_absent()) else {
        return Resolution::Unusable(UnusableReason::Absent);
    };

    if record.status() == Some(STATUS_NOT_FOUND) {
        return Resolution::Unusable(UnusableReason::NotFound);
    }

    let kilojoules = match record.energy_serving() {
        None | Some(Value::Null) => return Resolution::Unusable(UnusableReason::MissingEnergy),
        Some(Value::String(text)) => match text.trim().parse::<f64>() {
            Ok(value) => value,
            Err(_) => {
                return Resolution::Unusable(UnusableReason::NonNumericEnergy(text.clone()));
            }
        },
        Some(Value::Number(number)) => match number.as_f64() {
            Some(value) => value,
            None => {
                return Resolution::Unusable(UnusableReason::NonNumericEnergy(number.to_string()));
            }
        },
        Some(other) => {
            return Resolution::Unusable(UnusableReason::NonNumericEnergy(other.to_string()));
        }
    };

    match EnergyValue::from_kilojoules(kilojoules) {
        Ok(energy) => Resolution::Usable(energy),
        Err(_) => Resolution::Unusable(UnusableReason::OutOfRange(kilojoules)),
    }
}
