//! Integration tests for the call lifecycle
//!
//! Drives `ApiMiddleware` end to end with scripted transports and checks the
//! notifications forwarded downstream.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use api_middleware_core::{
    Action, ApiCall, ApiMiddlewareError, ApiResponse, Headers, LifecycleDescriptor, Method,
    Notification, Payload, RequestBody, RequestOptions, ResolveArgs, Resolvable, Response,
    TransportError, json,
};
use api_middleware_runtime::ApiMiddleware;
use api_middleware_testing::assertions::{assert_error, assert_not_error, assert_types};
use api_middleware_testing::{
    MiddlewareTest, MockState, MockTransport, RecordingNext, init_test_tracing,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
struct AppState {
    token: String,
    user_id: u32,
}

fn state() -> AppState {
    AppState {
        token: "secret".to_string(),
        user_id: 7,
    }
}

fn get_call() -> ApiCall<AppState> {
    ApiCall::new()
        .endpoint("https://api.example.com/items")
        .method("GET")
        .types("ITEMS_REQUEST", "ITEMS_SUCCESS", "ITEMS_FAILURE")
}

fn request_error(message: &str) -> ApiMiddlewareError {
    ApiMiddlewareError::request(message)
}

// ============================================================================
// Pass-through
// ============================================================================

#[tokio::test]
async fn non_call_actions_pass_through_untouched() {
    init_test_tracing();

    let original = Notification {
        meta: Some(json!({ "source": "ui" })),
        ..Notification::new("UNRELATED")
    };
    let expected = original.clone();

    MiddlewareTest::new()
        .given_state(state())
        .when_action(Action::Notify(original))
        .then_notifications(move |notifications| {
            assert_eq!(notifications, [expected]);
        })
        .then_requests(|requests| assert!(requests.is_empty()))
        .run()
        .await;
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn invalid_call_emits_one_request_type_error() {
    let mut call = ApiCall::<AppState>::new()
        .method("FETCH")
        .types("ITEMS_REQUEST", "ITEMS_SUCCESS", "ITEMS_FAILURE");
    call.credentials = Some("sometimes".to_string());

    MiddlewareTest::new()
        .given_state(state())
        .when_action(Action::Call(call))
        .then_notifications(|notifications| {
            assert_types(notifications, &["ITEMS_REQUEST"]);
            assert_error(
                &notifications[0],
                &ApiMiddlewareError::invalid_request(vec![
                    "[ApiCall] must have an endpoint".to_string(),
                    "Invalid [ApiCall].method: FETCH".to_string(),
                    "Invalid [ApiCall].credentials: sometimes".to_string(),
                ]),
            );
        })
        .then_requests(|requests| assert!(requests.is_empty()))
        .run()
        .await;
}

#[tokio::test]
async fn invalid_call_without_request_type_emits_nothing() {
    let mut call = get_call();
    call.types.clear();

    MiddlewareTest::new()
        .given_state(state())
        .when_action(Action::Call(call))
        .then_forwarded(|forwarded| assert!(forwarded.is_empty()))
        .then_requests(|requests| assert!(requests.is_empty()))
        .run()
        .await;
}

#[tokio::test]
async fn invalid_call_with_empty_request_type_emits_nothing() {
    let call = get_call().method("").types("", "ITEMS_SUCCESS", "ITEMS_FAILURE");

    MiddlewareTest::new()
        .given_state(state())
        .when_action(Action::Call(call))
        .then_forwarded(|forwarded| assert!(forwarded.is_empty()))
        .run()
        .await;
}

#[tokio::test]
async fn validation_notification_skips_request_descriptor() {
    let resolved = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&resolved);

    let call = get_call().method("NOPE").types(
        LifecycleDescriptor::new("ITEMS_REQUEST").with_meta(Resolvable::from_fn(
            move |_: ResolveArgs<AppState>| {
                flag.store(true, Ordering::SeqCst);
                async { Ok(json!("meta")) }
            },
        )),
        "ITEMS_SUCCESS",
        "ITEMS_FAILURE",
    );

    MiddlewareTest::new()
        .given_state(state())
        .when_action(Action::Call(call))
        .then_notifications(|notifications| {
            assert_eq!(notifications.len(), 1);
            assert_eq!(notifications[0].meta, None);
        })
        .run()
        .await;

    assert!(!resolved.load(Ordering::SeqCst));
}

#[tokio::test]
async fn custom_validator_replaces_default_rules() {
    let call = get_call().body("x");

    MiddlewareTest::new()
        .given_state(state())
        .with_middleware(|middleware| {
            middleware.with_validator(|call: &ApiCall<AppState>| {
                if call.body.is_some() {
                    vec!["GET calls must not carry a body".to_string()]
                } else {
                    Vec::new()
                }
            })
        })
        .when_action(Action::Call(call))
        .then_notifications(|notifications| {
            assert_error(
                &notifications[0],
                &ApiMiddlewareError::invalid_request(vec![
                    "GET calls must not carry a body".to_string(),
                ]),
            );
        })
        .run()
        .await;
}

// ============================================================================
// Bailout
// ============================================================================

#[tokio::test]
async fn bailout_abandons_call_silently() {
    MiddlewareTest::new()
        .given_state(state())
        .given_response(ApiResponse::new(200))
        .when_action(Action::Call(get_call().bailout(true)))
        .then_forwarded(|forwarded| assert!(forwarded.is_empty()))
        .then_requests(|requests| assert!(requests.is_empty()))
        .run()
        .await;
}

#[tokio::test]
async fn bailout_function_reads_state() {
    let call = get_call().bailout_fn(|state: &AppState| Ok(state.token.is_empty()));

    MiddlewareTest::new()
        .given_state(AppState::default())
        .given_response(ApiResponse::new(200))
        .when_action(Action::Call(call))
        .then_requests(|requests| assert!(requests.is_empty()))
        .run()
        .await;
}

#[tokio::test]
async fn failing_bailout_function_reports_request_error() {
    let call = get_call().bailout_fn(|_: &AppState| Err(anyhow::anyhow!("no session")));

    MiddlewareTest::new()
        .given_state(state())
        .when_action(Action::Call(call))
        .then_notifications(|notifications| {
            assert_types(notifications, &["ITEMS_REQUEST"]);
            assert_error(
                &notifications[0],
                &request_error("[ApiCall].bailout function failed"),
            );
        })
        .then_requests(|requests| assert!(requests.is_empty()))
        .run()
        .await;
}

// ============================================================================
// Dynamic fields
// ============================================================================

#[tokio::test]
async fn failing_endpoint_function_stops_before_transport() {
    let call = get_call().endpoint_fn(|_: &AppState| Err(anyhow::anyhow!("no base url")));

    MiddlewareTest::new()
        .given_state(state())
        .given_response(ApiResponse::new(200))
        .when_action(Action::Call(call))
        .then_notifications(|notifications| {
            assert_types(notifications, &["ITEMS_REQUEST"]);
            assert_error(
                &notifications[0],
                &request_error("[ApiCall].endpoint function failed"),
            );
        })
        .then_requests(|requests| assert!(requests.is_empty()))
        .run()
        .await;
}

#[tokio::test]
async fn panicking_endpoint_function_is_reported_like_an_error() {
    let call = get_call().endpoint_fn(|_: &AppState| panic!("endpoint exploded"));

    MiddlewareTest::new()
        .given_state(state())
        .when_action(Action::Call(call))
        .then_notifications(|notifications| {
            assert_error(
                &notifications[0],
                &request_error("[ApiCall].endpoint function failed"),
            );
        })
        .run()
        .await;
}

#[tokio::test]
async fn failing_headers_function_never_evaluates_options() {
    let options_evaluated = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&options_evaluated);

    let call = get_call()
        .headers_fn(|_: &AppState| Err(anyhow::anyhow!("token expired")))
        .options_fn(move |_: &AppState| {
            flag.store(true, Ordering::SeqCst);
            Ok(RequestOptions::new())
        });

    MiddlewareTest::new()
        .given_state(state())
        .given_response(ApiResponse::new(200))
        .when_action(Action::Call(call))
        .then_notifications(|notifications| {
            assert_types(notifications, &["ITEMS_REQUEST"]);
            assert_error(
                &notifications[0],
                &request_error("[ApiCall].headers function failed"),
            );
        })
        .then_requests(|requests| assert!(requests.is_empty()))
        .run()
        .await;

    assert!(!options_evaluated.load(Ordering::SeqCst));
}

#[tokio::test]
async fn failing_options_function_reports_request_error() {
    let call = get_call().options_fn(|_: &AppState| Err(anyhow::anyhow!("bad options")));

    MiddlewareTest::new()
        .given_state(state())
        .when_action(Action::Call(call))
        .then_notifications(|notifications| {
            assert_error(
                &notifications[0],
                &request_error("[ApiCall].options function failed"),
            );
        })
        .run()
        .await;
}

#[tokio::test]
async fn field_error_still_resolves_request_meta() {
    let call = get_call()
        .endpoint_fn(|_: &AppState| Err(anyhow::anyhow!("boom")))
        .types(
            LifecycleDescriptor::new("ITEMS_REQUEST").with_meta(Resolvable::from_fn(
                |args: ResolveArgs<AppState>| async move {
                    Ok(json!({ "user": args.state.user_id }))
                },
            )),
            "ITEMS_SUCCESS",
            "ITEMS_FAILURE",
        );

    MiddlewareTest::new()
        .given_state(state())
        .when_action(Action::Call(call))
        .then_notifications(|notifications| {
            assert_eq!(notifications.len(), 1);
            assert_eq!(notifications[0].meta, Some(json!({ "user": 7 })));
            assert_error(
                &notifications[0],
                &request_error("[ApiCall].endpoint function failed"),
            );
        })
        .run()
        .await;
}

#[tokio::test]
async fn dynamic_fields_use_current_state() {
    let call = ApiCall::new()
        .endpoint_fn(|state: &AppState| {
            Ok(format!("https://api.example.com/users/{}", state.user_id))
        })
        .method("post")
        .headers_fn(|state: &AppState| {
            let mut headers = Headers::new();
            headers.insert("Authorization".to_string(), format!("Bearer {}", state.token));
            Ok(headers)
        })
        .body(json!({ "name": "Ada" }))
        .credentials("include")
        .types("USER_REQUEST", "USER_SUCCESS", "USER_FAILURE");

    MiddlewareTest::new()
        .given_state(state())
        .given_response(ApiResponse::new(201))
        .when_action(Action::Call(call))
        .then_requests(|requests| {
            assert_eq!(requests.len(), 1);
            let request = &requests[0];
            assert_eq!(request.endpoint, "https://api.example.com/users/7");
            assert_eq!(request.config.method, Method::Post);
            assert_eq!(request.config.headers["Authorization"], "Bearer secret");
            assert_eq!(
                request.config.body,
                Some(RequestBody::Json(json!({ "name": "Ada" })))
            );
            assert_eq!(
                request.config.credentials,
                Some(api_middleware_core::Credentials::Include)
            );
        })
        .run()
        .await;
}

#[tokio::test]
async fn each_evaluation_takes_a_fresh_snapshot() {
    let state = MockState::new(state());
    let transport = MockTransport::new().respond(ApiResponse::new(200));
    let middleware = ApiMiddleware::new(state.clone(), transport.shared());
    let next = RecordingNext::new();

    let call = get_call()
        .endpoint_fn(|s: &AppState| Ok(format!("https://api.example.com/{}", s.user_id)));
    middleware.process(Action::Call(call), &next).await;

    // endpoint, request-sent, success
    assert_eq!(state.reads(), 3);
    assert_eq!(transport.calls()[0].endpoint, "https://api.example.com/7");
}

// ============================================================================
// Transport
// ============================================================================

#[tokio::test]
async fn explicit_fields_override_options() {
    let mut options = RequestOptions::new();
    options.insert("method".to_string(), json!("DELETE"));
    options.insert("body".to_string(), json!("ignored"));
    options.insert("headers".to_string(), json!({ "X-From-Options": "1" }));
    options.insert("timeout_ms".to_string(), json!(500));

    let mut headers = Headers::new();
    headers.insert("Accept".to_string(), "application/json".to_string());

    let call = get_call().options(options).headers(headers.clone()).body("payload");

    MiddlewareTest::new()
        .given_state(state())
        .given_response(ApiResponse::new(200))
        .when_action(Action::Call(call))
        .then_requests(move |requests| {
            let config = &requests[0].config;
            assert_eq!(config.method, Method::Get);
            assert_eq!(config.body, Some(RequestBody::Text("payload".to_string())));
            assert_eq!(config.headers, headers);
            assert_eq!(config.options.len(), 1);
            assert_eq!(config.options["timeout_ms"], json!(500));
        })
        .run()
        .await;
}

#[tokio::test]
async fn options_function_result_reaches_transport() {
    let call = get_call().options_fn(|state: &AppState| {
        let mut options = RequestOptions::new();
        options.insert("tenant".to_string(), json!(state.user_id));
        options.insert("timeout_ms".to_string(), json!(250));
        Ok(options)
    });

    MiddlewareTest::new()
        .given_state(state())
        .given_response(ApiResponse::new(200))
        .when_action(Action::Call(call))
        .then_notifications(|notifications| {
            assert_types(notifications, &["ITEMS_REQUEST", "ITEMS_SUCCESS"]);
        })
        .then_requests(|requests| {
            assert_eq!(requests.len(), 1);
            let config = &requests[0].config;
            assert_eq!(config.method, Method::Get);
            assert_eq!(config.options["tenant"], json!(7));
            assert_eq!(config.options["timeout_ms"], json!(250));
        })
        .run()
        .await;
}

#[tokio::test]
async fn transport_failure_follows_request_sent() {
    MiddlewareTest::new()
        .given_state(state())
        .given_transport_error(TransportError::Network("connection refused".to_string()))
        .when_action(Action::Call(get_call()))
        .then_notifications(|notifications| {
            assert_types(notifications, &["ITEMS_REQUEST", "ITEMS_REQUEST"]);
            assert_not_error(&notifications[0]);
            assert_error(&notifications[1], &request_error("connection refused"));
        })
        .run()
        .await;
}

#[tokio::test]
async fn per_call_transport_takes_precedence() {
    let dedicated =
        MockTransport::new().respond(ApiResponse::json(200, &json!({ "from": "call" })));
    let call = get_call().transport(dedicated.shared());

    MiddlewareTest::new()
        .given_state(state())
        .given_response(ApiResponse::json(200, &json!({ "from": "stage" })))
        .when_action(Action::Call(call))
        .then_notifications(|notifications| {
            assert_eq!(
                notifications[1].payload,
                Some(Payload::Value(json!({ "from": "call" })))
            );
        })
        .then_requests(|requests| assert!(requests.is_empty()))
        .run()
        .await;

    assert_eq!(dedicated.call_count(), 1);
}

// ============================================================================
// Outcomes
// ============================================================================

#[tokio::test]
async fn successful_response_emits_request_then_success() {
    MiddlewareTest::new()
        .given_state(state())
        .given_response(ApiResponse::json(200, &json!({ "a": 1 })))
        .when_action(Action::Call(get_call()))
        .then_notifications(|notifications| {
            assert_types(notifications, &["ITEMS_REQUEST", "ITEMS_SUCCESS"]);
            assert_eq!(notifications[0], Notification::new("ITEMS_REQUEST"));
            assert_not_error(&notifications[1]);
            assert_eq!(notifications[1].payload, Some(Payload::Value(json!({ "a": 1 }))));
        })
        .run()
        .await;
}

#[tokio::test]
async fn unsuccessful_response_emits_api_error() {
    MiddlewareTest::new()
        .given_state(state())
        .given_response(ApiResponse::new(404))
        .when_action(Action::Call(get_call()))
        .then_notifications(|notifications| {
            assert_types(notifications, &["ITEMS_REQUEST", "ITEMS_FAILURE"]);
            assert_error(
                &notifications[1],
                &ApiMiddlewareError::api(404, "Not Found", None),
            );
        })
        .run()
        .await;
}

#[tokio::test]
async fn unsuccessful_json_response_carries_body() {
    MiddlewareTest::new()
        .given_state(state())
        .given_response(ApiResponse::json(422, &json!({ "field": "name" })))
        .when_action(Action::Call(get_call()))
        .then_notifications(|notifications| {
            assert_error(
                &notifications[1],
                &ApiMiddlewareError::api(
                    422,
                    "Unprocessable Entity",
                    Some(json!({ "field": "name" })),
                ),
            );
        })
        .run()
        .await;
}

#[tokio::test]
async fn no_content_response_has_empty_success_payload() {
    let response = ApiResponse::new(204)
        .with_header("Content-Type", "application/json")
        .with_body("not json at all");

    MiddlewareTest::new()
        .given_state(state())
        .given_response(response)
        .when_action(Action::Call(get_call()))
        .then_notifications(|notifications| {
            assert_not_error(&notifications[1]);
            assert_eq!(notifications[1].payload, None);
        })
        .run()
        .await;
}

#[tokio::test]
async fn undecodable_json_body_becomes_internal_error() {
    let response = ApiResponse::new(200)
        .with_header("Content-Type", "application/json")
        .with_body("{ truncated");

    MiddlewareTest::new()
        .given_state(state())
        .given_response(response)
        .when_action(Action::Call(get_call()))
        .then_notifications(|notifications| {
            assert_types(notifications, &["ITEMS_REQUEST", "ITEMS_SUCCESS"]);
            assert!(notifications[1].error);
            assert!(matches!(
                notifications[1].error_payload(),
                Some(ApiMiddlewareError::Internal { .. })
            ));
        })
        .run()
        .await;
}

#[tokio::test]
async fn success_meta_failure_clobbers_payload() {
    let call = get_call().types(
        "ITEMS_REQUEST",
        LifecycleDescriptor::new("ITEMS_SUCCESS")
            .with_meta(Resolvable::from_fn(|_: ResolveArgs<AppState>| async {
                Err(anyhow::anyhow!("meta unavailable"))
            })),
        "ITEMS_FAILURE",
    );

    MiddlewareTest::new()
        .given_state(state())
        .given_response(ApiResponse::json(200, &json!({ "a": 1 })))
        .when_action(Action::Call(call))
        .then_notifications(|notifications| {
            let success = &notifications[1];
            assert_eq!(success.action_type.as_str(), "ITEMS_SUCCESS");
            assert_eq!(success.meta, None);
            assert_error(success, &ApiMiddlewareError::internal("meta unavailable"));
        })
        .run()
        .await;
}

#[tokio::test]
async fn resolvers_receive_the_response() {
    let call = get_call().types(
        "ITEMS_REQUEST",
        LifecycleDescriptor::new("ITEMS_SUCCESS").with_meta(Resolvable::from_fn(
            |args: ResolveArgs<AppState>| async move {
                let response = args.response.expect("success resolvers see the response");
                Ok(json!({ "etag": response.header("etag") }))
            },
        )),
        "ITEMS_FAILURE",
    );

    MiddlewareTest::new()
        .given_state(state())
        .given_response(ApiResponse::new(200).with_header("ETag", "v1"))
        .when_action(Action::Call(call))
        .then_notifications(|notifications| {
            assert_eq!(notifications[1].meta, Some(json!({ "etag": "v1" })));
        })
        .run()
        .await;
}

#[tokio::test]
async fn explicit_failure_payload_still_forces_error() {
    let call = get_call().types(
        "ITEMS_REQUEST",
        "ITEMS_SUCCESS",
        LifecycleDescriptor::new("ITEMS_FAILURE").with_payload(Resolvable::value(json!("nope"))),
    );

    MiddlewareTest::new()
        .given_state(state())
        .given_response(ApiResponse::new(500))
        .when_action(Action::Call(call))
        .then_notifications(|notifications| {
            assert!(notifications[1].error);
            assert_eq!(notifications[1].payload, Some(Payload::Value(json!("nope"))));
        })
        .run()
        .await;
}

// ============================================================================
// Success predicate
// ============================================================================

#[tokio::test]
async fn per_call_predicate_overrides_status() {
    let call = get_call().ok_fn(|response: &dyn Response| Ok(response.status() == 404));

    MiddlewareTest::new()
        .given_state(state())
        .given_response(ApiResponse::new(404))
        .when_action(Action::Call(call))
        .then_notifications(|notifications| {
            assert_types(notifications, &["ITEMS_REQUEST", "ITEMS_SUCCESS"]);
            assert_not_error(&notifications[1]);
        })
        .run()
        .await;
}

#[tokio::test]
async fn per_call_predicate_wins_over_stage_predicate() {
    let call = get_call().ok_fn(|_: &dyn Response| Ok(true));

    MiddlewareTest::new()
        .given_state(state())
        .given_response(ApiResponse::new(200))
        .with_middleware(|middleware| middleware.with_ok(|_: &dyn Response| Ok(false)))
        .when_action(Action::Call(call))
        .then_notifications(|notifications| {
            assert_types(notifications, &["ITEMS_REQUEST", "ITEMS_SUCCESS"]);
        })
        .run()
        .await;
}

#[tokio::test]
async fn failing_predicate_emits_internal_failure() {
    let call = get_call().ok_fn(|_: &dyn Response| Err(anyhow::anyhow!("cannot tell")));

    MiddlewareTest::new()
        .given_state(state())
        .given_response(ApiResponse::new(200))
        .when_action(Action::Call(call))
        .then_notifications(|notifications| {
            assert_types(notifications, &["ITEMS_REQUEST", "ITEMS_FAILURE"]);
            assert_error(
                &notifications[1],
                &ApiMiddlewareError::internal("[ApiCall].ok function failed"),
            );
        })
        .run()
        .await;
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn concurrent_calls_are_independent() {
    let transport = MockTransport::new()
        .respond(ApiResponse::json(200, &json!(1)))
        .respond(ApiResponse::json(200, &json!(2)));
    let middleware = Arc::new(ApiMiddleware::new(state, transport.shared()));

    let tasks: Vec<_> = ["A", "B"]
        .into_iter()
        .map(|name| {
            let middleware = Arc::clone(&middleware);
            tokio::spawn(async move {
                let next = RecordingNext::new();
                let call = get_call().types(
                    format!("{name}_REQUEST"),
                    format!("{name}_SUCCESS"),
                    format!("{name}_FAILURE"),
                );
                middleware.process(Action::Call(call), &next).await;
                next.notifications()
            })
        })
        .collect();

    for (task, name) in tasks.into_iter().zip(["A", "B"]) {
        let notifications = task.await.unwrap();
        assert_types(
            &notifications,
            &[format!("{name}_REQUEST").as_str(), format!("{name}_SUCCESS").as_str()],
        );
    }
    assert_eq!(transport.call_count(), 2);
}
