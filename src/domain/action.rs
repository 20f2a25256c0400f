use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Kinds of email the service renders, each with its own set of templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Subscribe,
    Unsubscribe,
    Update,
    /// A submission of a newsletter message
    Message,
}

impl Action {
    /// Actions a subscriber can confirm through an activation link
    pub const SUBSCRIPTION_ACTIONS: [Action; 3] =
        [Action::Subscribe, Action::Unsubscribe, Action::Update];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::Update => "update",
            Self::Message => "message",
        }
    }

    pub fn is_subscription_action(&self) -> bool {
        Self::SUBSCRIPTION_ACTIONS.contains(self)
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "subscribe" => Ok(Self::Subscribe),
            "unsubscribe" => Ok(Self::Unsubscribe),
            "update" => Ok(Self::Update),
            "message" => Ok(Self::Message),
            other => Err(Error::ParsingError(format!("Unknown action: {}", other))),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
