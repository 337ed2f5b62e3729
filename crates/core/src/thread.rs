//! Follow-up thread types.
//!
//! A thread is the ordered list of chat-style messages attached to one
//! analysis. Only assistant replies can be shared with the end customer, so
//! sharing is addressed by *assistant ordinal*: the position of a message
//! among the assistant messages of its thread, ignoring user messages.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

/// Author of a follow-up message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Written locally by the console user.
    User,
    /// Produced by the generation endpoint.
    Assistant,
}

impl MessageRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl Display for MessageRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(CoreError::InvalidInput(format!("Invalid message role: {s}"))),
        }
    }
}

/// A persisted follow-up message row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FollowUpMessage {
    /// Store-assigned id. Increases with insertion order.
    pub id: i64,
    pub analysis_id: String,
    /// Idempotency key generated when the message was appended locally.
    pub client_key: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub shared: bool,
    pub created_at: DateTime<Utc>,
}

/// A message that has not been persisted yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewFollowUpMessage {
    pub analysis_id: String,
    pub client_key: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub shared: bool,
}

/// Absolute index of the assistant message with the given ordinal.
///
/// Used by every code path that turns an assistant ordinal into a slot, so
/// that reads and writes always agree on which message an ordinal means.
pub fn assistant_index<T>(
    items: &[T],
    ordinal: usize,
    role_of: impl Fn(&T) -> MessageRole,
) -> Option<usize> {
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| role_of(item) == MessageRole::Assistant)
        .nth(ordinal)
        .map(|(idx, _)| idx)
}

/// Assistant ordinal for every item, `None` for user messages.
pub fn assistant_ordinals<T>(items: &[T], role_of: impl Fn(&T) -> MessageRole) -> Vec<Option<usize>> {
    let mut next = 0_usize;
    items
        .iter()
        .map(|item| {
            if role_of(item) == MessageRole::Assistant {
                let ordinal = next;
                next = next.saturating_add(1);
                Some(ordinal)
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use MessageRole::{Assistant, User};

    #[test]
    fn role_round_trips_through_str() {
        assert_eq!("user".parse::<MessageRole>().ok(), Some(User));
        assert_eq!(Assistant.to_string(), "assistant");
        assert!("system".parse::<MessageRole>().is_err());
    }

    #[test]
    fn assistant_index_skips_user_messages() {
        let roles = [User, Assistant, User, User, Assistant];
        assert_eq!(assistant_index(&roles, 0, |r| *r), Some(1));
        assert_eq!(assistant_index(&roles, 1, |r| *r), Some(4));
        assert_eq!(assistant_index(&roles, 2, |r| *r), None);
    }

    #[test]
    fn ordinals_agree_with_index_lookup() {
        let roles = [Assistant, User, Assistant, User, Assistant];
        let ordinals = assistant_ordinals(&roles, |r| *r);
        for (idx, ordinal) in ordinals.iter().enumerate() {
            if let Some(ordinal) = ordinal {
                assert_eq!(assistant_index(&roles, *ordinal, |r| *r), Some(idx));
            }
        }
        assert_eq!(ordinals, vec![Some(0), None, Some(1), None, Some(2)]);
    }
}
