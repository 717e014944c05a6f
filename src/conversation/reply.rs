//! Response descriptors — the {template, data} pairs handed to the
//! messaging-delivery collaborator.
//!
//! The engine never renders message text; it names a provider-side template
//! and supplies its data. Each state has exactly one canonical template; an
//! unmapped state (only `End`) falls back to the generic error template.

use serde::Serialize;

use super::model::Conversation;
use super::state::ConversationState;

pub const WELCOME_TEMPLATE: &str = "welcome_template";
pub const USER_TYPE_SELECTION_TEMPLATE: &str = "user_type_selection_template";
pub const STUDIO_HEAD_MENU_TEMPLATE: &str = "studio_head_menu_template";
pub const PARENT_MENU_TEMPLATE: &str = "parent_menu_template";
pub const DANCER_MENU_TEMPLATE: &str = "dancer_menu_template";
pub const COMPETITION_REGISTRATION_TEMPLATE: &str = "competition_registration_template";
pub const DANCER_REGISTRATION_TEMPLATE: &str = "dancer_registration_template";
pub const LICENSE_RENEWAL_TEMPLATE: &str = "license_renewal_template";
pub const INVALID_USER_TYPE_TEMPLATE: &str = "invalid_user_type_template";
pub const INVALID_OPTION_TEMPLATE: &str = "invalid_option_template";
pub const TIMEOUT_TEMPLATE: &str = "timeout_template";
pub const ERROR_TEMPLATE: &str = "error_template";

/// Canonical response template for a state, if one is mapped.
pub fn template_for(state: ConversationState) -> Option<&'static str> {
    match state {
        ConversationState::Start => Some(WELCOME_TEMPLATE),
        ConversationState::UserTypeSelection => Some(USER_TYPE_SELECTION_TEMPLATE),
        ConversationState::StudioHeadMenu => Some(STUDIO_HEAD_MENU_TEMPLATE),
        ConversationState::ParentMenu => Some(PARENT_MENU_TEMPLATE),
        ConversationState::DancerMenu => Some(DANCER_MENU_TEMPLATE),
        ConversationState::CompetitionRegistration => Some(COMPETITION_REGISTRATION_TEMPLATE),
        ConversationState::DancerRegistration => Some(DANCER_REGISTRATION_TEMPLATE),
        ConversationState::LicenseRenewal => Some(LICENSE_RENEWAL_TEMPLATE),
        ConversationState::End => None,
    }
}

/// The response descriptor returned by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub template: String,
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl Reply {
    pub fn new(template: &str, data: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            template: template.to_string(),
            data,
        }
    }

    /// Descriptor for a conversation's current state: its canonical
    /// template plus phone number, user type, and scratch data.
    pub fn for_state(conversation: &Conversation) -> Self {
        let template = template_for(conversation.current_state).unwrap_or(ERROR_TEMPLATE);
        let mut data = serde_json::Map::new();
        data.insert(
            "phone_number".to_string(),
            conversation.phone_number.clone().into(),
        );
        data.insert(
            "user_type".to_string(),
            conversation.user_type.to_string().into(),
        );
        data.insert(
            "state_data".to_string(),
            serde_json::Value::Object(conversation.state_data.clone()),
        );
        Self::new(template, data)
    }

    /// Timeout notice; the triggering message is not otherwise answered.
    pub fn timeout(phone_number: &str) -> Self {
        Self::new(TIMEOUT_TEMPLATE, phone_data(phone_number))
    }

    /// The selected token is not a known user type.
    pub fn invalid_user_type(phone_number: &str) -> Self {
        Self::new(INVALID_USER_TYPE_TEMPLATE, phone_data(phone_number))
    }

    /// The message matches none of the current menu's options.
    pub fn invalid_option(phone_number: &str) -> Self {
        Self::new(INVALID_OPTION_TEMPLATE, phone_data(phone_number))
    }

    /// Generic fallback when the current state has no handler.
    pub fn error() -> Self {
        Self::new(ERROR_TEMPLATE, serde_json::Map::new())
    }
}

fn phone_data(phone_number: &str) -> serde_json::Map<String, serde_json::Value> {
    let mut data = serde_json::Map::new();
    data.insert("phone_number".to_string(), phone_number.into());
    data
}
