//! Order instruction parsing and record comparison
//!
//! `order=createdAt` sorts ascending, `order=-createdAt` descending. Keys are
//! compared numerically; records whose key cannot be read as a number are kept
//! (never filtered) and placed after every numeric key in either direction.

use std::cmp::Ordering;

use serde_json::Value;

use super::Message;

/// Field used when a query string carries no usable `order` pair
pub const DEFAULT_ORDER_FIELD: &str = "createdAt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Sort field and direction requested by a GET query string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderInstruction {
    pub field: String,
    pub direction: Direction,
}

impl Default for OrderInstruction {
    fn default() -> Self {
        Self {
            field: DEFAULT_ORDER_FIELD.to_string(),
            direction: Direction::Ascending,
        }
    }
}

impl OrderInstruction {
    /// Parse a single `order` value: a leading `-` selects descending order
    pub fn parse(value: &str) -> Self {
        let (field, direction) = match value.strip_prefix('-') {
            Some(rest) => (rest, Direction::Descending),
            None => (value, Direction::Ascending),
        };

        if field.is_empty() {
            return Self {
                direction,
                ..Self::default()
            };
        }

        Self {
            field: field.to_string(),
            direction,
        }
    }

    /// Extract the instruction from a raw (still percent-encoded) query string
    ///
    /// The first `order` pair wins. A query without one sorts by the default
    /// field, ascending.
    pub fn from_query(query: &str) -> Self {
        serde_urlencoded::from_str::<Vec<(String, String)>>(query)
            .ok()
            .and_then(|pairs| {
                pairs
                    .into_iter()
                    .find(|(key, _)| key == "order")
                    .map(|(_, value)| Self::parse(&value))
            })
            .unwrap_or_default()
    }

    pub fn compare(&self, a: &Message, b: &Message) -> Ordering {
        let left = numeric_key(a.get(&self.field));
        let right = numeric_key(b.get(&self.field));

        match (left, right) {
            (Some(x), Some(y)) => match self.direction {
                Direction::Ascending => x.total_cmp(&y),
                Direction::Descending => y.total_cmp(&x),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    /// Stable in-place sort of `messages` by this instruction
    pub fn apply(&self, messages: &mut [Message]) {
        messages.sort_by(|a, b| self.compare(a, b));
    }
}

/// Coerce a field to a number the way numeric subtraction in a browser would
fn numeric_key(value: Option<&Value>) -> Option<f64> {
    let key = match value? {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().ok()?
            }
        }
        Value::Array(_) | Value::Object(_) => return None,
    };

    (!key.is_nan()).then_some(key)
}
