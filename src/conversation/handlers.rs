//! State handlers — pure functions from (conversation, input) to an outcome.
//!
//! Handlers never touch persistence: they mutate the in-memory snapshot and
//! report whether they did, and the engine decides what to commit. Dispatch
//! is a lookup table over the closed state enum; states without an entry
//! (the leaf registration states and `End`) have no handler.

use super::model::Conversation;
use super::reply::Reply;
use super::state::{ConversationState, UserType};

/// What a handler did with the message.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    /// Input recognized; the conversation snapshot was mutated and the
    /// engine must commit it.
    Advanced(Reply),
    /// Input not recognized; nothing was mutated and nothing is committed.
    Invalid(Reply),
}

type Handler = fn(&mut Conversation, &str) -> HandlerOutcome;

/// The handler registered for a state, if any.
pub fn handler_for(state: ConversationState) -> Option<Handler> {
    match state {
        ConversationState::Start => Some(handle_start),
        ConversationState::UserTypeSelection => Some(handle_user_type_selection),
        ConversationState::StudioHeadMenu => Some(handle_studio_head_menu),
        ConversationState::ParentMenu => Some(handle_parent_menu),
        ConversationState::DancerMenu => Some(handle_dancer_menu),
        ConversationState::CompetitionRegistration
        | ConversationState::DancerRegistration
        | ConversationState::LicenseRenewal
        | ConversationState::End => None,
    }
}

/// Any first message moves a fresh conversation to user-type selection.
fn handle_start(conversation: &mut Conversation, _message: &str) -> HandlerOutcome {
    conversation.update_state(ConversationState::UserTypeSelection);
    let mut data = serde_json::Map::new();
    data.insert(
        "phone_number".to_string(),
        conversation.phone_number.clone().into(),
    );
    HandlerOutcome::Advanced(Reply::new(
        super::reply::USER_TYPE_SELECTION_TEMPLATE,
        data,
    ))
}

/// Classify the sender and route to their menu.
///
/// Only the three routable tokens are accepted; `admin` and `unknown` are
/// legal `UserType` values but have no menu, so they are invalid here.
fn handle_user_type_selection(conversation: &mut Conversation, message: &str) -> HandlerOutcome {
    let token = message.trim().to_lowercase();
    let (user_type, next_state) = match token.as_str() {
        "studio_head" => (UserType::StudioHead, ConversationState::StudioHeadMenu),
        "parent" => (UserType::Parent, ConversationState::ParentMenu),
        "dancer" => (UserType::Dancer, ConversationState::DancerMenu),
        _ => return HandlerOutcome::Invalid(Reply::invalid_user_type(&conversation.phone_number)),
    };

    conversation.user_type = user_type;
    conversation.update_state(next_state);
    HandlerOutcome::Advanced(Reply::for_state(conversation))
}

fn handle_studio_head_menu(conversation: &mut Conversation, message: &str) -> HandlerOutcome {
    let next_state = match message.trim() {
        "1" => ConversationState::CompetitionRegistration,
        "2" => ConversationState::DancerRegistration,
        "3" => ConversationState::LicenseRenewal,
        _ => return HandlerOutcome::Invalid(Reply::invalid_option(&conversation.phone_number)),
    };

    conversation.update_state(next_state);
    HandlerOutcome::Advanced(Reply::for_state(conversation))
}

fn handle_parent_menu(conversation: &mut Conversation, message: &str) -> HandlerOutcome {
    let next_state = match message.trim() {
        "1" => ConversationState::DancerRegistration,
        "2" => ConversationState::CompetitionRegistration,
        _ => return HandlerOutcome::Invalid(Reply::invalid_option(&conversation.phone_number)),
    };

    conversation.update_state(next_state);
    HandlerOutcome::Advanced(Reply::for_state(conversation))
}

fn handle_dancer_menu(conversation: &mut Conversation, message: &str) -> HandlerOutcome {
    let next_state = match message.trim() {
        "1" => ConversationState::CompetitionRegistration,
        "2" => ConversationState::LicenseRenewal,
        _ => return HandlerOutcome::Invalid(Reply::invalid_option(&conversation.phone_number)),
    };

    conversation.update_state(next_state);
    HandlerOutcome::Advanced(Reply::for_state(conversation))
}
