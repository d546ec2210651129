use std::f64::consts::LN_2;
use std::fmt;

use crate::error::{Error, Result};

/// Sizing of a Bloom filter, derived once from the expected item count
/// and the false positive rate expressed as `1 / probability_denominator`.
///
/// ```text
///   bits = ceil(n * ln(p) / ln(2))
///   k    = round(ln(2) * bits / n)
/// ```
///
/// Both derived values must fit an `i32` so that they survive the
/// on-disk snapshot format unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    number_of_items: u32,
    probability_denominator: u32,
    number_of_bits: u32,
    number_of_hash_functions: u32,
}

impl Shape {
    /// Size a filter for `items` entries at a `1 / probability_denominator`
    /// false positive rate.
    pub fn new(items: u32, probability_denominator: u32) -> Result<Self> {
        check_items(items, probability_denominator)?;

        let n = items as f64;
        let bits = (n * (probability_denominator as f64).ln() / LN_2).ceil();
        if !bits.is_finite() || bits < 1.0 || bits > i32::MAX as f64 {
            return Err(Error::Config(format!(
                "{items} items at 1/{probability_denominator} needs {bits} bits, outside i32"
            )));
        }

        let hashes = (LN_2 * bits / n).round();
        if hashes < 1.0 || hashes > i32::MAX as f64 {
            return Err(Error::Config(format!(
                "hash function count {hashes} outside [1, i32::MAX]"
            )));
        }

        Ok(Shape {
            number_of_items: items,
            probability_denominator,
            number_of_bits: bits as u32,
            number_of_hash_functions: hashes as u32,
        })
    }

    /// Rebuild a shape from persisted fields without re-deriving them.
    pub fn from_parts(items: u32, probability_denominator: u32, bits: u32, hashes: u32) -> Result<Self> {
        check_items(items, probability_denominator)?;
        if bits == 0 || bits > i32::MAX as u32 {
            return Err(Error::Config(format!("bit count {bits} outside [1, i32::MAX]")));
        }
        if hashes == 0 || hashes > i32::MAX as u32 {
            return Err(Error::Config(format!(
                "hash function count {hashes} outside [1, i32::MAX]"
            )));
        }
        Ok(Shape {
            number_of_items: items,
            probability_denominator,
            number_of_bits: bits,
            number_of_hash_functions: hashes,
        })
    }

    pub fn number_of_items(&self) -> u32 {
        self.number_of_items
    }

    pub fn probability_denominator(&self) -> u32 {
        self.probability_denominator
    }

    pub fn number_of_bits(&self) -> u32 {
        self.number_of_bits
    }

    pub fn number_of_hash_functions(&self) -> u32 {
        self.number_of_hash_functions
    }

    /// Bytes needed to hold `number_of_bits`.
    pub fn number_of_bytes(&self) -> usize {
        (self.number_of_bits as usize).div_ceil(8)
    }

    /// Expected false positive rate once `inserted` items are in the filter:
    /// `(1 - e^(-k * n / m))^k`.
    pub fn estimated_fpr(&self, inserted: u64) -> f64 {
        let k = self.number_of_hash_functions as f64;
        let m = self.number_of_bits as f64;
        (1.0 - (-k * inserted as f64 / m).exp()).powf(k)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Shape(n={}, p=1/{}, m={}, k={})",
            self.number_of_items,
            self.probability_denominator,
            self.number_of_bits,
            self.number_of_hash_functions
        )
    }
}

fn check_items(items: u32, probability_denominator: u32) -> Result<()> {
    if items == 0 || items > i32::MAX as u32 {
        return Err(Error::Config(format!("number of items {items} outside [1, i32::MAX]")));
    }
    if probability_denominator < 2 || probability_denominator > i32::MAX as u32 {
        return Err(Error::Config(format!(
            "probability denominator {probability_denominator} outside [2, i32::MAX]"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_bits_and_hashes() {
        // 5 * ln(10) / ln(2) = 16.6 -> 17 bits; ln(2) * 17 / 5 = 2.36 -> 2 hashes
        let shape = Shape::new(5, 10).unwrap();
        assert_eq!(shape.number_of_bits(), 17);
        assert_eq!(shape.number_of_hash_functions(), 2);
        assert_eq!(shape.number_of_bytes(), 3);
    }

    #[test]
    fn overflow_is_config_error() {
        assert!(matches!(Shape::new(i32::MAX as u32, i32::MAX as u32), Err(Error::Config(_))));
    }
}
