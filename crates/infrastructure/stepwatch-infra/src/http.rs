use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, Url};
use tracing::debug;

use stepwatch_config::JOB_ID_PLACEHOLDER;

use crate::sse::{SseMessage, SseParser};
use crate::transport::{FrameStream, Transport, TransportError};

/// Characters left untouched when a job id is spliced into a URL path.
const JOB_ID_SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Build an HTTP client for long-lived event streams.
///
/// Only the connect phase is bounded; a whole-request timeout would cut
/// healthy streams, so silence is detected by the monitor instead.
pub fn default_http_client() -> Result<Client, TransportError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .tcp_keepalive(Duration::from_secs(30))
        .user_agent(concat!("stepwatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(TransportError::from)
}

/// URL template with a `{job_id}` placeholder, e.g. `https://api/jobs/{job_id}/events`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    template: String,
}

impl Endpoint {
    pub fn parse(template: impl Into<String>) -> Result<Self, TransportError> {
        let template = template.into();
        if !template.contains(JOB_ID_PLACEHOLDER) {
            return Err(TransportError::InvalidEndpoint(format!(
                "{template} has no {JOB_ID_PLACEHOLDER} placeholder"
            )));
        }
        let endpoint = Self { template };
        endpoint.url_for("probe")?;
        Ok(endpoint)
    }

    pub fn url_for(&self, job_id: &str) -> Result<Url, TransportError> {
        if job_id.is_empty() {
            return Err(TransportError::InvalidEndpoint("empty job id".into()));
        }
        let encoded = utf8_percent_encode(job_id, JOB_ID_SAFE).to_string();
        let raw = self.template.replace(JOB_ID_PLACEHOLDER, &encoded);
        Url::parse(&raw).map_err(|e| TransportError::InvalidEndpoint(format!("{raw}: {e}")))
    }
}

const LAST_EVENT_ID: &str = "Last-Event-ID";

/// Last SSE `id` seen per job.
#[derive(Debug, Clone, Default)]
struct EventIds(Arc<Mutex<HashMap<String, String>>>);

impl EventIds {
    fn get(&self, job_id: &str) -> Option<String> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .cloned()
    }

    fn record(&self, job_id: &str, id: &str) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_id.to_string(), id.to_string());
    }
}

/// Server-Sent Events transport over HTTP.
///
/// Reopening a job's stream sends the last seen event `id` as
/// `Last-Event-ID` so the server can resume instead of replaying.
pub struct SseTransport {
    client: Client,
    endpoint: Endpoint,
    event_ids: EventIds,
}

impl SseTransport {
    pub fn new(client: Client, endpoint: Endpoint) -> Self {
        Self {
            client,
            endpoint,
            event_ids: EventIds::default(),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Event id a reopen of `job_id` would resume from.
    pub fn last_event_id(&self, job_id: &str) -> Option<String> {
        self.event_ids.get(job_id)
    }
}

#[async_trait::async_trait]
impl Transport for SseTransport {
    async fn open(&self, job_id: &str) -> Result<FrameStream, TransportError> {
        let url = self.endpoint.url_for(job_id)?;
        debug!(%url, "opening event stream");

        let mut req = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(id) = self.event_ids.get(job_id) {
            debug!(job_id, last_event_id = %id, "resuming event stream");
            req = req.header(LAST_EVENT_ID, id);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        let body = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Interrupted(e.to_string())))
            .boxed();
        Ok(frames(body, Some((self.event_ids.clone(), job_id.to_string()))))
    }
}

struct FrameState {
    body: BoxStream<'static, Result<Bytes, TransportError>>,
    parser: SseParser,
    ready: VecDeque<String>,
    done: bool,
    ids: Option<(EventIds, String)>,
}

impl FrameState {
    fn accept(&mut self, msgs: impl IntoIterator<Item = SseMessage>) {
        for msg in msgs {
            if let (Some((ids, job_id)), Some(id)) = (&self.ids, &msg.id) {
                ids.record(job_id, id);
            }
            self.ready.extend(frame_data(msg));
        }
    }
}

/// Turn a raw event-stream body into one text frame per SSE message `data`.
pub fn sse_frames(body: BoxStream<'static, Result<Bytes, TransportError>>) -> FrameStream {
    frames(body, None)
}

fn frames(
    body: BoxStream<'static, Result<Bytes, TransportError>>,
    ids: Option<(EventIds, String)>,
) -> FrameStream {
    let state = FrameState {
        body,
        parser: SseParser::new(),
        ready: VecDeque::new(),
        done: false,
        ids,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(frame) = st.ready.pop_front() {
                return Some((Ok(frame), st));
            }
            if st.done {
                return None;
            }
            match st.body.next().await {
                Some(Ok(chunk)) => {
                    let msgs = st.parser.push_bytes(&chunk);
                    st.accept(msgs);
                }
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.done = true;
                    let tail = st.parser.finish();
                    st.accept(tail);
                }
            }
        }
    })
    .boxed()
}

fn frame_data(msg: SseMessage) -> Option<String> {
    (!msg.data.trim().is_empty()).then_some(msg.data)
}
