//! Token usage reported by providers.

use serde::{Deserialize, Serialize};

/// Token usage for a generation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    /// Merge another usage into this one (accumulate, saturating at `u32::MAX`).
    pub fn merge(&mut self, other: &Usage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
    }

    /// Whether the provider reported any token counts at all.
    pub fn is_empty(&self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_accumulates() {
        let mut total = Usage::default();
        total.merge(&Usage { input_tokens: 10, output_tokens: 2 });
        total.merge(&Usage { input_tokens: 5, output_tokens: 3 });
        assert_eq!(total, Usage { input_tokens: 15, output_tokens: 5 });
    }

    #[test]
    fn merge_saturates_instead_of_overflowing() {
        let mut total = Usage {
            input_tokens: u32::MAX - 1,
            output_tokens: 7,
        };
        total.merge(&Usage {
            input_tokens: 10,
            output_tokens: u32::MAX,
        });
        assert_eq!(total.input_tokens, u32::MAX);
        assert_eq!(total.output_tokens, u32::MAX);
    }
}
