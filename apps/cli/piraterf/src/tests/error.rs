// Unit tests for error module

use crate::error::PirateRfError;

use client_core::error::{CoreError, ValidationError};

use common::ErrorLocation;

use std::panic::Location;

/// **VALUE**: Tests that errors serialize with their variant tag.
///
/// **WHY THIS MATTERS**: Scripts wrapping the CLI match on the error type, not the text.
///
/// **BUG THIS CATCHES**: Would catch removal of `#[derive(Serialize)]` or the tag attribute.
#[test]
fn given_piraterf_error_when_serialized_then_tagged_by_type() {
    // GIVEN: A timeout error
    let err = PirateRfError::Timeout {
        message: String::from("no Live within 30s"),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN: Serializing to JSON
    let value = serde_json::to_value(&err).unwrap();

    // THEN: Tagged with the variant and carrying the message
    assert_eq!(value["type"], "Timeout");
    assert_eq!(value["data"]["message"], "no Live within 30s");
}

/// **VALUE**: Verifies core errors convert while keeping their text.
///
/// **WHY THIS MATTERS**: The CLI prints what went wrong inside the library.
///
/// **BUG THIS CATCHES**: Would catch the core message being replaced by a generic one.
#[test]
fn given_core_error_when_converted_then_message_kept() {
    let core = CoreError::from(ValidationError::UnknownModule {
        module: "nope".to_string(),
        location: ErrorLocation::from(Location::caller()),
    });

    let err = PirateRfError::from(core);

    match err {
        PirateRfError::Core { message, .. } => assert!(message.contains("nope")),
        other => panic!("Expected Core, got {other:?}"),
    }
}
