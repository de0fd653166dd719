//! Column sensitivity rules and masking.
//!
//! A column rule declares which roles may see a column and how the value is
//! obscured for everyone else. Masking is computed independently of the
//! row-filter effect: a row can be visible while individual columns in it
//! are suppressed.

use crate::identity::Role;
use custodian_proto::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How a masked column value is obscured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaskingStrategy {
    /// Replace with null.
    Null,
    /// Replace with a fixed placeholder string.
    Redacted(String),
    /// Hash the value (stable lookup without revealing it).
    Hash,
    /// Partial masking (show some characters).
    Partial {
        /// Number of characters to show.
        visible_chars: u32,
        /// Show characters from the end (true) or the beginning (false).
        from_end: bool,
        /// Character to use for masking.
        mask_char: char,
    },
}

impl Default for MaskingStrategy {
    fn default() -> Self {
        MaskingStrategy::Null
    }
}

impl MaskingStrategy {
    /// Relative restrictiveness, used to break ties between conflicting
    /// rules for the same column. Higher reveals less.
    pub(crate) fn restrictiveness(&self) -> u8 {
        match self {
            MaskingStrategy::Null => 3,
            MaskingStrategy::Redacted(_) => 2,
            MaskingStrategy::Hash => 1,
            MaskingStrategy::Partial { .. } => 0,
        }
    }
}

/// A column sensitivity rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRule {
    /// Resource the column belongs to.
    pub resource: String,
    /// Column name.
    pub column: String,
    /// Roles allowed to see the cleartext value.
    pub visible_to: BTreeSet<Role>,
    /// Masking applied for everyone else.
    pub masking: MaskingStrategy,
}

impl ColumnRule {
    /// Create a rule visible only to the given roles.
    pub fn new(
        resource: impl Into<String>,
        column: impl Into<String>,
        visible_to: impl IntoIterator<Item = Role>,
    ) -> Self {
        Self {
            resource: resource.into(),
            column: column.into(),
            visible_to: visible_to.into_iter().collect(),
            masking: MaskingStrategy::default(),
        }
    }

    /// Set the masking strategy.
    pub fn with_masking(mut self, masking: MaskingStrategy) -> Self {
        self.masking = masking;
        self
    }

    /// Whether the column is visible in cleartext to the role.
    pub fn visible_to(&self, role: Role) -> bool {
        self.visible_to.contains(&role)
    }
}

/// Applies masking strategies to values during result assembly.
pub struct ColumnMasker;

impl ColumnMasker {
    /// Mask a value according to the strategy.
    pub fn mask(value: &Value, strategy: &MaskingStrategy) -> Value {
        match strategy {
            MaskingStrategy::Null => Value::Null,
            MaskingStrategy::Redacted(placeholder) => Value::String(placeholder.clone()),
            MaskingStrategy::Hash => Self::hash_value(value),
            MaskingStrategy::Partial {
                visible_chars,
                from_end,
                mask_char,
            } => Self::partial_mask(value, *visible_chars as usize, *from_end, *mask_char),
        }
    }

    fn partial_mask(value: &Value, visible_chars: usize, from_end: bool, mask_char: char) -> Value {
        match value {
            Value::String(s) => {
                if s.chars().count() <= visible_chars {
                    Value::String(mask_char.to_string().repeat(s.chars().count()))
                } else if from_end {
                    let masked_len = s.chars().count() - visible_chars;
                    let visible: String = s.chars().skip(masked_len).collect();
                    Value::String(format!(
                        "{}{}",
                        mask_char.to_string().repeat(masked_len),
                        visible
                    ))
                } else {
                    let visible: String = s.chars().take(visible_chars).collect();
                    let masked_len = s.chars().count() - visible_chars;
                    Value::String(format!(
                        "{}{}",
                        visible,
                        mask_char.to_string().repeat(masked_len)
                    ))
                }
            }
            // Non-string values get nulled
            _ => Value::Null,
        }
    }

    fn hash_value(value: &Value) -> Value {
        let hash = match value {
            Value::String(s) => blake3::hash(s.as_bytes()),
            Value::Int64(i) => blake3::hash(&i.to_le_bytes()),
            Value::Float64(f) => blake3::hash(&f.to_le_bytes()),
            Value::Bool(b) => blake3::hash(&[*b as u8]),
            Value::Timestamp(t) => blake3::hash(&t.to_le_bytes()),
            Value::Null => return Value::String("hash:null".to_string()),
            other => blake3::hash(format!("{:?}", other).as_bytes()),
        };
        Value::String(format!("hash:{}", hash.to_hex()))
    }
}
