//! Conversation state machine vocabulary — states and user types.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The states of a conversation.
///
/// `Start` is the sole initial state for a fresh conversation; `End` is
/// terminal and has no registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Start,
    UserTypeSelection,
    StudioHeadMenu,
    ParentMenu,
    DancerMenu,
    CompetitionRegistration,
    DancerRegistration,
    LicenseRenewal,
    End,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::Start
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::UserTypeSelection => "user_type_selection",
            Self::StudioHeadMenu => "studio_head_menu",
            Self::ParentMenu => "parent_menu",
            Self::DancerMenu => "dancer_menu",
            Self::CompetitionRegistration => "competition_registration",
            Self::DancerRegistration => "dancer_registration",
            Self::LicenseRenewal => "license_renewal",
            Self::End => "end",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ConversationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "user_type_selection" => Ok(Self::UserTypeSelection),
            "studio_head_menu" => Ok(Self::StudioHeadMenu),
            "parent_menu" => Ok(Self::ParentMenu),
            "dancer_menu" => Ok(Self::DancerMenu),
            "competition_registration" => Ok(Self::CompetitionRegistration),
            "dancer_registration" => Ok(Self::DancerRegistration),
            "license_renewal" => Ok(Self::LicenseRenewal),
            "end" => Ok(Self::End),
            other => Err(format!("unknown conversation state: {other}")),
        }
    }
}

/// Classification of the person behind a phone number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    StudioHead,
    Parent,
    Dancer,
    Admin,
    Unknown,
}

impl Default for UserType {
    fn default() -> Self {
        Self::Unknown
    }
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::StudioHead => "studio_head",
            Self::Parent => "parent",
            Self::Dancer => "dancer",
            Self::Admin => "admin",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

impl FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "studio_head" => Ok(Self::StudioHead),
            "parent" => Ok(Self::Parent),
            "dancer" => Ok(Self::Dancer),
            "admin" => Ok(Self::Admin),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown user type: {other}")),
        }
    }
}
