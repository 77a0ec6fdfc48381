use crate::{
    Result,
    cache::Clock,
    client::SupraClient,
    config::STATUS_CACHE_TTL,
    error::Error,
    fallback::FallbackConfig,
    transport::{
        ApiRequest,
        ApiResponse,
        Transport,
    },
};
use chrono::{
    DateTime,
    Utc,
};
use serde_json::{
    Value,
    json,
};
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        Mutex,
    },
    time::Duration,
};
use tokio::sync::oneshot;

pub const FAKE_BASE_URL: &str = "http://supra.test";

enum FakeReply {
    Ready(Result<ApiResponse>),
    Deferred(oneshot::Receiver<Result<ApiResponse>>),
}

#[derive(Default)]
struct FakeState {
    requests: Vec<ApiRequest>,
    replies: VecDeque<FakeReply>,
}

/// Scripted transport: replies are handed out in the order they were queued
/// and every request is recorded.
#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_raw(&self, status: u16, body: impl Into<Vec<u8>>) {
        self.push(FakeReply::Ready(Ok(ApiResponse {
            status,
            body: body.into(),
        })));
    }

    pub fn queue_json(&self, status: u16, body: Value) {
        self.queue_raw(status, body.to_string());
    }

    pub fn queue_ok(&self, body: Value) {
        self.queue_json(200, body);
    }

    /// Queues a command endpoint response.
    pub fn queue_command(&self, command: &str, returncode: i32, stdout: &str, stderr: &str) {
        self.queue_ok(json!({
            "command": command,
            "args": [],
            "returncode": returncode,
            "stdout": stdout,
            "stderr": stderr,
        }));
    }

    /// Queues a successful command whose stdout is a JSON envelope.
    pub fn queue_command_tx(&self, command: &str, tx_hash: &str, submitted_at: &str) {
        let stdout = json!({ "tx_hash": tx_hash, "submitted_at": submitted_at }).to_string();
        self.queue_command(command, 0, &stdout, "");
    }

    pub fn queue_error(&self, error: Error) {
        self.push(FakeReply::Ready(Err(error)));
    }

    /// Queues a reply the test completes later through the returned sender.
    pub fn queue_deferred(&self) -> oneshot::Sender<Result<ApiResponse>> {
        let (sender, receiver) = oneshot::channel();
        self.push(FakeReply::Deferred(receiver));
        sender
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Paths of all recorded requests, in order.
    pub fn paths(&self) -> Vec<String> {
        self.lock().requests.iter().map(ApiRequest::path).collect()
    }

    /// `args` of every command request, in order.
    pub fn command_args(&self) -> Vec<(String, Vec<String>)> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.segments.first().map(String::as_str) == Some("commands"))
            .filter_map(|r| {
                let name = r.segments.get(1)?.clone();
                let args = r
                    .body
                    .as_ref()?
                    .get("args")?
                    .as_array()?
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                Some((name, args))
            })
            .collect()
    }

    fn push(&self, reply: FakeReply) {
        self.lock().replies.push_back(reply);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

impl Transport for FakeTransport {
    fn base_url(&self) -> &str {
        FAKE_BASE_URL
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = format!("{FAKE_BASE_URL}{}", request.path());
        let reply = {
            let mut state = self.lock();
            state.requests.push(request);
            state.replies.pop_front()
        };
        match reply {
            Some(FakeReply::Ready(result)) => {
                tokio::task::yield_now().await;
                result
            }
            Some(FakeReply::Deferred(receiver)) => {
                receiver.await.unwrap_or_else(|_| {
                    Err(Error::Transport {
                        url,
                        status: None,
                        detail: "deferred reply dropped".to_string(),
                    })
                })
            }
            None => Err(Error::Transport {
                url,
                status: None,
                detail: "no fake reply queued".to_string(),
            }),
        }
    }
}

pub fn ok_json(body: Value) -> Result<ApiResponse> {
    Ok(ApiResponse {
        status: 200,
        body: body.to_string().into_bytes(),
    })
}

/// A client wired to a [`FakeTransport`] and a [`ManualClock`].
pub struct TestContext {
    pub transport: FakeTransport,
    pub clock: ManualClock,
    pub client: SupraClient<FakeTransport, ManualClock>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_fallback(FallbackConfig::default())
    }

    pub fn with_fallback(fallback: FallbackConfig) -> Self {
        let transport = FakeTransport::new();
        let clock = ManualClock::default();
        let client = SupraClient::new(transport.clone(), clock.clone(), STATUS_CACHE_TTL)
            .with_fallback(fallback);
        Self {
            transport,
            clock,
            client,
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Clock the test moves by hand.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn at(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(
            DateTime::parse_from_rfc3339("2024-04-12T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        )
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
