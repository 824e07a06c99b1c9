use crate::ErrorLocation;

use std::panic::Location;

/// **VALUE**: Verifies that `ErrorLocation::from()` captures file, line, and column.
///
/// **WHY THIS MATTERS**: Every error in the client carries an ErrorLocation. If capture
/// breaks, transport and bridge failures lose the only pointer to where they were raised.
///
/// **BUG THIS CATCHES**: Would catch if `Location::caller()` stops being propagated or
/// line/column extraction is swapped.
#[test]
fn given_location_caller_when_error_location_created_then_captures_file_line_column() {
    // GIVEN / WHEN: An ErrorLocation built from the current position
    let location = ErrorLocation::from(Location::caller());

    // THEN: File, line and column are populated
    assert!(location.file.contains("error_location.rs"));
    assert!(location.line > 0);
    assert!(location.column > 0);
}

/// **VALUE**: Verifies the `[file:line:column]` display format.
///
/// **WHY THIS MATTERS**: Error messages append the location verbatim; log readers rely
/// on the bracketed form to jump to source.
///
/// **BUG THIS CATCHES**: Would catch a Display change that drops brackets or fields.
#[test]
fn given_error_location_when_formatted_then_produces_bracketed_format() {
    // GIVEN: A location
    let location = ErrorLocation::here();

    // WHEN: Formatting
    let formatted = location.to_string();

    // THEN: "[file:line:column]"
    assert!(formatted.starts_with('['));
    assert!(formatted.ends_with(']'));
    assert_eq!(formatted.matches(':').count(), 2);
    assert!(formatted.contains(&location.line.to_string()));
}

/// **VALUE**: Verifies `here()` reports its caller rather than its own body.
///
/// **BUG THIS CATCHES**: Would catch removal of `#[track_caller]` on `here()`.
#[test]
fn given_here_when_called_then_points_at_call_site() {
    let location = ErrorLocation::here();

    assert!(location.file.contains("tests"));
}

/// **VALUE**: Verifies ErrorLocation serializes with named fields.
///
/// **WHY THIS MATTERS**: The CLI error type is serialized for machine-readable output.
#[test]
fn given_error_location_when_serialized_then_contains_fields() {
    let json = serde_json::to_string(&ErrorLocation::here()).unwrap();

    assert!(json.contains("\"file\""));
    assert!(json.contains("\"line\""));
    assert!(json.contains("\"column\""));
}
