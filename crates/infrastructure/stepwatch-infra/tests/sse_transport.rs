use axum::body::Body;
use axum::extract::Path;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::{routing::get, Router};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use stepwatch_infra::{
    default_http_client, sse_frames, Endpoint, SseTransport, Transport, TransportError,
};

const EVENTS: &str = concat!(
    ": keep-alive\n\n",
    "data: {\"type\":\"step_start\",\"step\":1,\"message\":\"Extracting\"}\n\n",
    "event: progress\n",
    "data: {\"type\":\"step_end\",\"step\":1,\"message\":\"ok\"}\n\n",
    "data: {\"type\":\"complete\",\"data\":{\"result\":\"x\"}}\n\n",
);

async fn start_event_server() -> (std::net::SocketAddr, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route(
            "/jobs/:id/events",
            get(|Path(id): Path<String>| async move {
                if id == "missing" {
                    return StatusCode::NOT_FOUND.into_response();
                }
                // Split the body into awkward chunks to exercise reassembly.
                let chunks: Vec<Result<Bytes, std::io::Error>> = EVENTS
                    .as_bytes()
                    .chunks(7)
                    .map(|c| Ok(Bytes::copy_from_slice(c)))
                    .collect();
                (
                    [(header::CONTENT_TYPE, "text/event-stream")],
                    Body::from_stream(stream::iter(chunks)),
                )
                    .into_response()
            }),
        )
        .route(
            "/echo/:id/events",
            get(|Path(id): Path<String>| async move {
                (
                    [(header::CONTENT_TYPE, "text/event-stream")],
                    format!("data: {id}\n\n"),
                )
            }),
        )
        .route(
            "/resume/:id/events",
            get(|headers: HeaderMap| async move {
                let seen = headers
                    .get("last-event-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("none")
                    .to_string();
                let next: u32 = seen.parse().unwrap_or(0) + 1;
                (
                    [(header::CONTENT_TYPE, "text/event-stream")],
                    format!("id: {next}\ndata: {seen}\n\nretry: 5000\n\n"),
                )
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, handle)
}

#[tokio::test]
async fn streams_one_frame_per_sse_message_then_ends() {
    let (addr, _server) = start_event_server().await;
    let endpoint = Endpoint::parse(format!("http://{addr}/jobs/{{job_id}}/events")).unwrap();
    let transport = SseTransport::new(default_http_client().unwrap(), endpoint);

    let frames: Vec<String> = transport
        .open("job-1")
        .await
        .expect("stream opens")
        .map(|f| f.expect("frame"))
        .collect()
        .await;

    assert_eq!(frames.len(), 3, "comment-only message must be skipped");
    assert!(frames[0].contains("step_start"));
    assert!(frames[1].contains("step_end"));
    assert!(frames[2].contains("complete"));
}

#[tokio::test]
async fn non_success_status_is_an_open_error() {
    let (addr, _server) = start_event_server().await;
    let endpoint = Endpoint::parse(format!("http://{addr}/jobs/{{job_id}}/events")).unwrap();
    let transport = SseTransport::new(default_http_client().unwrap(), endpoint);

    match transport.open("missing").await {
        Err(e @ TransportError::Status { status }) => {
            assert_eq!(status, 404);
            assert_eq!(e.kind(), "status");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("404 must not open a stream"),
    }
}

#[tokio::test]
async fn job_id_is_percent_encoded_into_the_path() {
    let (addr, _server) = start_event_server().await;
    let endpoint = Endpoint::parse(format!("http://{addr}/echo/{{job_id}}/events")).unwrap();
    assert_eq!(
        endpoint.url_for("a b/c").unwrap().path(),
        "/echo/a%20b%2Fc/events"
    );

    let transport = SseTransport::new(default_http_client().unwrap(), endpoint);
    let mut frames = transport.open("a b/c").await.unwrap();
    assert_eq!(frames.next().await.unwrap().unwrap(), "a b/c");
}

#[tokio::test]
async fn refused_connection_is_a_request_error() {
    // Bind then drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let endpoint = Endpoint::parse(format!("http://{addr}/jobs/{{job_id}}")).unwrap();
    let transport = SseTransport::new(default_http_client().unwrap(), endpoint);
    match transport.open("job-1").await {
        Err(e @ TransportError::Request(_)) => assert_eq!(e.kind(), "connect"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("nothing listens on {addr}"),
    }
}

#[test]
fn endpoint_templates_are_validated() {
    assert!(matches!(
        Endpoint::parse("http://host/jobs/events"),
        Err(TransportError::InvalidEndpoint(_))
    ));
    assert!(matches!(
        Endpoint::parse("not a url/{job_id}"),
        Err(TransportError::InvalidEndpoint(_))
    ));
    let ok = Endpoint::parse("https://host/api/{job_id}/progress").unwrap();
    assert!(matches!(
        ok.url_for(""),
        Err(TransportError::InvalidEndpoint(_))
    ));
}

#[tokio::test]
async fn body_error_is_forwarded_after_complete_frames() {
    let body = stream::iter(vec![
        Ok(Bytes::from_static(b"data: one\n\nda")),
        Ok(Bytes::from_static(b"ta: two\n\n")),
        Err(TransportError::Interrupted("reset by peer".into())),
        Ok(Bytes::from_static(b"data: never\n\n")),
    ])
    .boxed();

    let out: Vec<Result<String, TransportError>> = sse_frames(body).collect().await;
    assert_eq!(out.len(), 3);
    assert_eq!(out[0].as_ref().unwrap(), "one");
    assert_eq!(out[1].as_ref().unwrap(), "two");
    assert!(matches!(out[2], Err(TransportError::Interrupted(_))));
}

#[tokio::test]
async fn unterminated_trailing_message_is_flushed_on_close() {
    let body = stream::iter(vec![Ok(Bytes::from_static(b"data: last"))]).boxed();
    let out: Vec<String> = sse_frames(body).map(|f| f.unwrap()).collect().await;
    assert_eq!(out, vec!["last".to_string()]);
}

#[tokio::test]
async fn reopen_resumes_from_last_event_id() {
    let (addr, _server) = start_event_server().await;
    let endpoint = Endpoint::parse(format!("http://{addr}/resume/{{job_id}}/events")).unwrap();
    let transport = SseTransport::new(default_http_client().unwrap(), endpoint);
    assert_eq!(transport.last_event_id("job-1"), None);

    let first: Vec<String> = transport
        .open("job-1")
        .await
        .unwrap()
        .map(|f| f.unwrap())
        .collect()
        .await;
    assert_eq!(first, vec!["none".to_string()]);
    assert_eq!(transport.last_event_id("job-1").as_deref(), Some("1"));

    let second: Vec<String> = transport
        .open("job-1")
        .await
        .unwrap()
        .map(|f| f.unwrap())
        .collect()
        .await;
    assert_eq!(second, vec!["1".to_string()]);

    // Ids are tracked per job.
    let other: Vec<String> = transport
        .open("job-2")
        .await
        .unwrap()
        .map(|f| f.unwrap())
        .collect()
        .await;
    assert_eq!(other, vec!["none".to_string()]);
}
