//! Host-supplied draw order.

use crate::error::ValidationError;
use crate::ticket::{HIGHEST_NUMBER, LOWEST_NUMBER};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use tracing::instrument;

/// Ordered, duplicate-free numbers in `1..=90`.
///
/// The only way to build one is through validation, so holding a
/// `DrawSequence` proves the values are callable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct DrawSequence(Vec<u8>);

impl DrawSequence {
    /// Validates raw values.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NumberOutOfRange`] or
    /// [`ValidationError::DuplicateNumber`] for the first offending value.
    #[instrument(skip(values), fields(len = values.len()))]
    pub fn from_values(values: &[i64]) -> Result<Self, ValidationError> {
        let mut seen = HashSet::with_capacity(values.len());
        let mut numbers = Vec::with_capacity(values.len());
        for &value in values {
            let number = u8::try_from(value)
                .ok()
                .filter(|n| (LOWEST_NUMBER..=HIGHEST_NUMBER).contains(n))
                .ok_or(ValidationError::NumberOutOfRange(value))?;
            if !seen.insert(number) {
                return Err(ValidationError::DuplicateNumber(number));
            }
            numbers.push(number);
        }
        Ok(Self(numbers))
    }

    /// Parses a comma and/or whitespace separated list, e.g. `"5, 17 90"`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnparseableNumber`] for non-numeric tokens,
    /// otherwise the same errors as [`DrawSequence::from_values`].
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let values = input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(|token| {
                token
                    .parse::<i64>()
                    .map_err(|_| ValidationError::UnparseableNumber(token.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_values(&values)
    }

    /// A full random permutation of `1..=90`.
    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut numbers: Vec<u8> = (LOWEST_NUMBER..=HIGHEST_NUMBER).collect();
        numbers.shuffle(rng);
        Self(numbers)
    }

    /// The numbers in draw order.
    pub fn numbers(&self) -> &[u8] {
        &self.0
    }

    /// Number at `index`, if the sequence is that long.
    pub fn get(&self, index: usize) -> Option<u8> {
        self.0.get(index).copied()
    }

    /// Length of the sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for an empty sequence.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<u8>> for DrawSequence {
    type Error = ValidationError;

    fn try_from(values: Vec<u8>) -> Result<Self, Self::Error> {
        let widened: Vec<i64> = values.into_iter().map(i64::from).collect();
        Self::from_values(&widened)
    }
}

impl TryFrom<Vec<i64>> for DrawSequence {
    type Error = ValidationError;

    fn try_from(values: Vec<i64>) -> Result<Self, Self::Error> {
        Self::from_values(&values)
    }
}

impl TryFrom<&str> for DrawSequence {
    type Error = ValidationError;

    fn try_from(input: &str) -> Result<Self, Self::Error> {
        Self::parse(input)
    }
}

impl FromStr for DrawSequence {
    type Err = ValidationError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl From<DrawSequence> for Vec<u8> {
    fn from(sequence: DrawSequence) -> Self {
        sequence.0
    }
}
