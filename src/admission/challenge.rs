//! Arithmetic challenges issued to unverified users.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Default lower bound for challenge operands.
pub const DEFAULT_OPERAND_MIN: u32 = 5;

/// Default upper bound (inclusive) for challenge operands.
pub const DEFAULT_OPERAND_MAX: u32 = 20;

/// A pending `a + b` question and its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Left operand.
    pub operand_a: u32,
    /// Right operand.
    pub operand_b: u32,
    /// `operand_a + operand_b`.
    pub expected_answer: u32,
}

impl Challenge {
    /// Build a challenge from two operands.
    pub fn new(operand_a: u32, operand_b: u32) -> Self {
        Self {
            operand_a,
            operand_b,
            expected_answer: operand_a.saturating_add(operand_b),
        }
    }

    /// The question shown to the user, e.g. `7 + 12 = ?`.
    pub fn prompt(&self) -> String {
        format!("{} + {} = ?", self.operand_a, self.operand_b)
    }

    /// Whether `answer` parses as an integer equal to the expected answer.
    ///
    /// Surrounding whitespace is ignored; anything else non-numeric is a miss.
    pub fn is_answered_by(&self, answer: &str) -> bool {
        answer
            .trim()
            .parse::<i64>()
            .is_ok_and(|value| value == i64::from(self.expected_answer))
    }
}

/// Produces fresh challenges.
pub trait ChallengeSource: Send + Sync {
    /// Draw a new challenge.
    fn next_challenge(&self) -> Challenge;
}

/// Draws both operands independently and uniformly from `[min, max]`.
#[derive(Debug, Clone, Copy)]
pub struct RandomChallenges {
    min: u32,
    max: u32,
}

impl RandomChallenges {
    /// Create a source over the inclusive range `[min, max]`.
    ///
    /// Bounds given in the wrong order are swapped.
    pub fn new(min: u32, max: u32) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }
}

impl Default for RandomChallenges {
    fn default() -> Self {
        Self::new(DEFAULT_OPERAND_MIN, DEFAULT_OPERAND_MAX)
    }
}

impl ChallengeSource for RandomChallenges {
    fn next_challenge(&self) -> Challenge {
        let mut rng = rand::thread_rng();
        let a = rng.gen_range(self.min..=self.max);
        let b = rng.gen_range(self.min..=self.max);
        Challenge::new(a, b)
    }
}
