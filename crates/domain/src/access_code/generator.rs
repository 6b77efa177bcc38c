//! Drawing candidate access code numbers.

use rand::Rng;

use super::{ACCESS_CODES_RANGE, AccessCodeNumber};

/// Source of candidate numbers for random issue.
pub trait CodeNumberGenerator: Send + Sync {
    fn generate(&self) -> AccessCodeNumber;
}

/// Uniform draws over [`ACCESS_CODES_RANGE`] from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeNumbers;

impl CodeNumberGenerator for RandomCodeNumbers {
    fn generate(&self) -> AccessCodeNumber {
        AccessCodeNumber::from_range(rand::thread_rng().gen_range(ACCESS_CODES_RANGE))
    }
}
