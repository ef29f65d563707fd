use super::*;

fn status(code: u16) -> TransportError {
    TransportError::Status {
        url: Some("http://provider/v1/rerank".to_string()),
        status_code: code,
        message: "boom".to_string(),
    }
}

#[test]
fn test_transport_error_display_messages() {
    assert_eq!(
        status(503).to_string(),
        "http status 503 [url=http://provider/v1/rerank]: boom"
    );

    let connect = TransportError::Connect {
        url: None,
        message: "refused".to_string(),
    };
    assert_eq!(connect.to_string(), "connection failed: refused");

    let invoke = InvokeError::ServerUnavailable("down".to_string());
    assert_eq!(invoke.to_string(), "server unavailable: down");
    assert_eq!(invoke.message(), "down");
}

#[test]
fn test_mapping_table_classifies_each_transport_family() {
    let cases = vec![
        (
            TransportError::Connect {
                url: None,
                message: "refused".to_string(),
            },
            InvokeErrorKind::Connection,
        ),
        (
            TransportError::Protocol {
                url: None,
                message: "truncated body".to_string(),
            },
            InvokeErrorKind::ServerUnavailable,
        ),
        (status(401), InvokeErrorKind::Unauthorized),
        (status(404), InvokeErrorKind::Unauthorized),
        (status(500), InvokeErrorKind::Unauthorized),
        (
            TransportError::Timeout {
                url: None,
                message: "deadline".to_string(),
            },
            InvokeErrorKind::BadRequest,
        ),
        (
            TransportError::Request {
                url: None,
                message: "bad header".to_string(),
            },
            InvokeErrorKind::BadRequest,
        ),
    ];

    for (error, expected) in cases {
        let mapped = map_transport_error(INVOKE_ERROR_MAPPING, &error);
        assert_eq!(mapped.kind(), expected, "mapping for {error:?}");
        assert_eq!(mapped.message(), error.to_string());
    }
}

#[test]
fn test_mapping_table_first_match_wins() {
    let connect = TransportError::Connect {
        url: None,
        message: "refused".to_string(),
    };
    assert!(connect.is_request_error());

    let reversed: Vec<ErrorMapping> = INVOKE_ERROR_MAPPING.iter().rev().copied().collect();
    assert_eq!(
        map_transport_error(&reversed, &connect).kind(),
        InvokeErrorKind::BadRequest
    );
    assert_eq!(
        map_transport_error(INVOKE_ERROR_MAPPING, &connect).kind(),
        InvokeErrorKind::Connection
    );
}

#[test]
fn test_unmatched_error_falls_back_to_bad_request() {
    let mapped = map_transport_error(&[], &status(418));
    assert_eq!(mapped.kind(), InvokeErrorKind::BadRequest);
}

#[test]
fn test_rate_limited_row_never_matches() {
    let row = INVOKE_ERROR_MAPPING
        .iter()
        .find(|row| row.kind == InvokeErrorKind::RateLimited)
        .expect("rate limited row present");

    assert!(!(row.matches)(&status(429)));
}

#[test]
fn test_credentials_invalid_wraps_cause_message() {
    let cause = InvokeError::ServerUnavailable("http status 503".to_string());
    let wrapped = InvokeError::credentials_invalid(&cause);

    assert_eq!(wrapped.kind(), InvokeErrorKind::CredentialsValidateFailed);
    assert_eq!(wrapped.message(), "server unavailable: http status 503");
    assert_eq!(
        wrapped.to_string(),
        "credentials validation failed: server unavailable: http status 503"
    );
}

#[test]
fn test_invoke_error_kind_round_trip_through_constructor() {
    for kind in [
        InvokeErrorKind::Connection,
        InvokeErrorKind::ServerUnavailable,
        InvokeErrorKind::RateLimited,
        InvokeErrorKind::Unauthorized,
        InvokeErrorKind::BadRequest,
        InvokeErrorKind::CredentialsValidateFailed,
    ] {
        assert_eq!(InvokeError::new(kind, "x").kind(), kind);
    }
}
