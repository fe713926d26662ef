//! Wire-type registry for account commands and events.
//!
//! Payloads cross the dispatch edge as a kebab-case type tag plus a JSON
//! body. The registry maps tags back onto the closed command and event
//! enums, which use adjacently tagged serde representations so the wire
//! tag is exactly the enum variant's own tag.

use serde_json::json;

use crate::account::{AccountCommand, AccountEvent};

/// Wire tags of every account command, in declaration order.
pub const COMMAND_TAGS: [&str; 4] = [
    "deposit-funds",
    "withdraw-funds",
    "set-withdraw-policy",
    "remove-withdraw-policy",
];

/// Wire tags of every account event, in declaration order.
pub const EVENT_TAGS: [&str; 4] = [
    "funds-deposited",
    "funds-withdrawn",
    "withdraw-policy-set",
    "withdraw-policy-removed",
];

/// Decoding failures at the wire boundary.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The tag names no registered command or event type.
    #[error("type not registered: {0}")]
    UnknownType(String),
    /// The tag is known but the body does not match its shape.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decode a command from its wire tag and JSON body.
///
/// An empty body stands for a command with no fields.
///
/// # Errors
///
/// [`RegistryError::UnknownType`] for an unregistered tag,
/// [`RegistryError::Malformed`] when the body does not deserialize.
pub fn decode_command(tag: &str, body: &[u8]) -> Result<AccountCommand, RegistryError> {
    if !COMMAND_TAGS.contains(&tag) {
        return Err(RegistryError::UnknownType(tag.to_owned()));
    }
    decode_tagged(tag, body)
}

/// Decode an event from its wire tag and JSON body.
///
/// # Errors
///
/// Same failure modes as [`decode_command`].
pub fn decode_event(tag: &str, body: &[u8]) -> Result<AccountEvent, RegistryError> {
    if !EVENT_TAGS.contains(&tag) {
        return Err(RegistryError::UnknownType(tag.to_owned()));
    }
    decode_tagged(tag, body)
}

/// Split an event into its wire tag and JSON body.
pub fn encode_event(event: &AccountEvent) -> Result<(String, Vec<u8>), serde_json::Error> {
    let value = serde_json::to_value(event)?;
    // Adjacently tagged: {"type": tag, "data": body}. The shape is fixed by
    // the enum's serde attributes.
    let tag = value["type"]
        .as_str()
        .expect("tagged enum always carries a type string")
        .to_owned();
    let body = match &value["data"] {
        serde_json::Value::Null => Vec::new(),
        data => serde_json::to_vec(data)?,
    };
    Ok((tag, body))
}

fn decode_tagged<T: serde::de::DeserializeOwned>(
    tag: &str,
    body: &[u8],
) -> Result<T, RegistryError> {
    let tagged = if body.is_empty() {
        json!({ "type": tag })
    } else {
        let data: serde_json::Value = serde_json::from_slice(body)?;
        json!({ "type": tag, "data": data })
    };
    Ok(serde_json::from_value(tagged)?)
}
