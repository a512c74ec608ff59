use super::*;

#[test]
fn listing_errors_map_to_categories() {
    let err = UiError::from_listing(
        UiErrorContext::Load { view_id: 1 },
        &ListingError::Transport("unknown manager".into()),
    );
    assert_eq!(err.category(), UiErrorCategory::Transport);
    assert_eq!(err.status_line(), "Load failed: transport error: unknown manager");

    let err = UiError::from_listing(
        UiErrorContext::General,
        &ListingError::missing_model(),
    );
    assert_eq!(err.category(), UiErrorCategory::Configuration);
}

#[test]
fn text_failures_are_classified_by_keyword() {
    let err = UiError::from_message(
        UiErrorContext::Channel,
        "failed to connect websocket: ws://127.0.0.1:1/ws",
    );
    assert_eq!(err.category(), UiErrorCategory::Transport);
    assert_eq!(err.context(), UiErrorContext::Channel);

    let err = UiError::from_message(UiErrorContext::General, "something odd");
    assert_eq!(err.category(), UiErrorCategory::Unknown);
    assert_eq!(err.message(), "something odd");
}
