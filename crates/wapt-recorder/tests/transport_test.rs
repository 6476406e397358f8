mod common;

use common::Harness;
use std::time::Duration;
use wapt_recorder::error::{RecorderError, TransportError};
use wapt_recorder::protocol::{Action, Payload, Record};
use wapt_recorder::transport::deliver_with_retry;
use wapt_recorder::{
    CollectingTransport, Delivery, DeliveryConfig, DeliveryMode, DomEvent, EventKind,
    HttpTransport, MachineState, MemoryStore, Recorder, Session, Transition, Transport,
};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sample_payload() -> Payload {
    Payload {
        task_name: "login".into(),
        window_width: 1280,
        window_height: 720,
        records: vec![Record {
            time: 0,
            action: Action::navigate_to("http://app.test/login.jsp?record=true"),
            dom: None,
        }],
    }
}

fn fast_retries(max_retries: u32) -> DeliveryConfig {
    DeliveryConfig {
        mode: DeliveryMode::AckThenClear,
        max_retries,
        retry_delay_ms: 1,
        timeout_ms: 2_000,
    }
}

#[tokio::test]
async fn test_http_post_sends_json_to_page_url() {
    let mock_server = MockServer::start().await;
    let payload = sample_payload();

    Mock::given(method("POST"))
        .and(path("/home.jsp"))
        .and(query_param("record", "false"))
        .and(header("Content-Type", "application/json; charset=UTF-8"))
        .and(body_json(serde_json::to_value(&payload).unwrap()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let transport = HttpTransport::new(Duration::from_secs(2));
    let url = format!("{}/home.jsp?record=false", mock_server.uri());
    let status = transport.send(&url, &payload).await.unwrap();
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_http_non_success_status_is_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let transport = HttpTransport::default();
    let err = transport
        .send(&mock_server.uri(), &sample_payload())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Status(500)));
}

#[tokio::test]
async fn test_retry_until_acknowledged() {
    let transport = CollectingTransport::failing(2);
    let status = deliver_with_retry(
        &transport,
        "http://app.test/x?record=false",
        &sample_payload(),
        &fast_retries(3),
    )
    .await
    .unwrap();

    assert_eq!(status, 200);
    assert_eq!(transport.attempts(), 3);
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn test_retry_exhaustion_reports_attempts() {
    let transport = CollectingTransport::failing(10);
    let err = deliver_with_retry(
        &transport,
        "http://app.test/x?record=false",
        &sample_payload(),
        &fast_retries(2),
    )
    .await
    .unwrap_err();

    match err {
        TransportError::Exhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(last.contains("503"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(transport.attempts(), 3);
}

#[tokio::test]
async fn test_failed_delivery_keeps_session_for_retry() {
    let mut h = Harness::with_parts(MemoryStore::new(), CollectingTransport::failing(4));
    h.config.delivery.max_retries = 1;

    h.load("/login.jsp?record=true").await.unwrap();
    h.click(1, 2);

    let err = h.load("/login.jsp?record=false").await.unwrap_err();
    assert!(matches!(
        err,
        RecorderError::Transport(TransportError::Exhausted { attempts: 2, .. })
    ));
    let session = Session::load(&*h.store).unwrap().unwrap();
    assert_eq!(session.record_count, 2);

    // Two more failures, then the server accepts.
    let err = h.load("/login.jsp?record=false").await.unwrap_err();
    assert!(matches!(err, RecorderError::Transport(_)));
    let transition = h.load("/login.jsp?record=false").await.unwrap();
    assert_eq!(
        transition,
        Transition::Finalized {
            records: 2,
            delivery: Delivery::Acknowledged { status: 200 },
        }
    );
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_events_after_stop_signal_are_not_recorded() {
    let mut h = Harness::with_parts(MemoryStore::new(), CollectingTransport::failing(1));
    h.config.delivery.max_retries = 0;

    h.load("/login.jsp?record=true").await.unwrap();
    h.click(1, 2);
    assert_eq!(h.record_count(), 2);

    assert!(h.load("/login.jsp?record=false").await.is_err());
    h.click(3, 4);
    h.fire(DomEvent::key(EventKind::KeyDown, 'z'));
    assert_eq!(h.record_count(), 2);

    let recorder = Recorder::new(h.parts()).unwrap();
    assert_eq!(recorder.machine().state().unwrap(), MachineState::Finalizing);

    // Plain navigation neither resumes nor records while delivery is pending.
    let transition = h.load("/home.jsp").await.unwrap();
    assert_eq!(
        transition,
        Transition::Pending {
            task_name: "login".into(),
        }
    );
    h.click(5, 6);
    assert_eq!(h.record_count(), 2);

    let transition = h.load("/login.jsp?record=false").await.unwrap();
    assert_eq!(
        transition,
        Transition::Finalized {
            records: 2,
            delivery: Delivery::Acknowledged { status: 200 },
        }
    );
    assert_eq!(h.transport.sent()[0].1.len(), 2);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_fire_and_forget_clears_immediately() {
    let mut h = Harness::new();
    h.config.delivery.mode = DeliveryMode::FireAndForget;

    h.load("/cart.jsp?record=true").await.unwrap();
    h.click(7, 7);
    let transition = h.load("/cart.jsp?record=false").await.unwrap();

    assert_eq!(
        transition,
        Transition::Finalized {
            records: 2,
            delivery: Delivery::Dispatched,
        }
    );
    assert_eq!(h.transport.sent().len(), 1);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_end_to_end_over_http() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search.jsp"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = std::rc::Rc::new(MemoryStore::new());
    let page = std::rc::Rc::new(wapt_recorder::StaticPage::new(
        format!("{}/search.jsp?record=true", mock_server.uri()),
        wapt_recorder::Viewport::new(800, 600),
        common::markup("search"),
    ));
    let parts = wapt_recorder::RecorderParts {
        store: store.clone(),
        page: page.clone(),
        clock: std::rc::Rc::new(wapt_recorder::ManualClock::new(0)),
        transport: std::rc::Rc::new(HttpTransport::new(Duration::from_secs(2))),
        config: wapt_recorder::RecorderConfig::default(),
    };

    let mut bus = wapt_recorder::LocalEventBus::new();
    wapt_recorder::Recorder::install(parts.clone(), &mut bus)
        .await
        .unwrap();

    page.set_href(format!("{}/search.jsp?record=false", mock_server.uri()));
    let transition = wapt_recorder::Recorder::install(parts, &mut bus)
        .await
        .unwrap();
    assert_eq!(
        transition,
        Transition::Finalized {
            records: 1,
            delivery: Delivery::Acknowledged { status: 204 },
        }
    );
    assert!(store.is_empty());
}
