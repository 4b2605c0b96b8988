//! Collaborator doubles shared by the handler tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::StreamExt;
use rpc_bridge_core::{Code, Error, MessageCodec, StreamError};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

use crate::Bridge;
use crate::connection::{Connection, ConnectionProvider};
use crate::method::{BidiStreamMethod, ServerStreamMethod, UnaryMethod};
use crate::sink::StreamEvent;
use crate::stream::{ChannelSender, Streaming, request_channel};

const WAIT: Duration = Duration::from_secs(5);

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub(crate) fn bridge() -> Bridge {
    Bridge::builder()
        .worker_threads(2)
        .thread_name("rpc-bridge-test")
        .shutdown_timeout(Duration::from_secs(1))
        .build()
        .unwrap()
}

/// Wait for a unary delivery from a host thread.
pub(crate) fn recv_callback(
    bridge: &Bridge,
    rx: oneshot::Receiver<Result<Bytes, Error>>,
) -> Result<Bytes, Error> {
    bridge
        .executor()
        .block_on(async move { tokio::time::timeout(WAIT, rx).await })
        .expect("callback timed out")
        .expect("sink dropped without delivery")
}

/// Collect stream deliveries up to and including the terminal event.
pub(crate) fn collect_stream(
    bridge: &Bridge,
    mut rx: mpsc::UnboundedReceiver<StreamEvent>,
) -> Vec<StreamEvent> {
    bridge
        .executor()
        .block_on(async move {
            tokio::time::timeout(WAIT, async move {
                let mut events = Vec::new();
                while let Some(event) = rx.recv().await {
                    let terminal = event.is_terminal();
                    events.push(event);
                    if terminal {
                        break;
                    }
                }
                events
            })
            .await
        })
        .expect("stream did not terminate")
}

fn wait_for(done: impl Fn() -> bool, message: &str) {
    let deadline = Instant::now() + WAIT;
    while !done() {
        assert!(Instant::now() < deadline, "{message}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

// ============================================================================
// Connection provider
// ============================================================================

#[derive(Debug)]
pub(crate) struct FakeClient;

/// Provider counting acquisitions and releases.
#[derive(Debug, Default)]
pub(crate) struct CountingProvider {
    acquired: AtomicUsize,
    released: Arc<AtomicUsize>,
    fail: bool,
}

impl CountingProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A provider whose every acquisition fails.
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub(crate) fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub(crate) fn wait_acquired(&self, count: usize) {
        wait_for(|| self.acquired() >= count, "connection was never acquired");
    }

    pub(crate) fn wait_released(&self, count: usize) {
        wait_for(|| self.released() >= count, "connection was never released");
    }
}

impl ConnectionProvider for CountingProvider {
    type Client = FakeClient;

    async fn acquire(&self) -> Result<Connection<FakeClient>, Error> {
        if self.fail {
            return Err(Error::Connect("connection refused".into()));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        let released = self.released.clone();
        Ok(Connection::new(FakeClient, move || {
            released.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Pass-through codec that rejects empty payloads in both directions.
#[derive(Debug)]
pub(crate) struct NonEmptyCodec;

impl MessageCodec for NonEmptyCodec {
    type Request = Bytes;
    type Response = Bytes;

    fn decode(&self, bytes: &[u8]) -> Result<Bytes, Error> {
        if bytes.is_empty() {
            return Err(Error::Decode("empty request".into()));
        }
        Ok(Bytes::copy_from_slice(bytes))
    }

    fn encode(&self, response: &Bytes) -> Result<Bytes, Error> {
        if response.is_empty() {
            return Err(Error::Encode("empty response".into()));
        }
        Ok(response.clone())
    }
}

// ============================================================================
// Method strategies
// ============================================================================

#[derive(Debug)]
pub(crate) enum FakeUnary {
    /// Respond with the request.
    Echo,
    /// Respond with an empty message.
    Empty,
    /// Reject with the given code.
    Fail(Code),
    /// Never respond.
    Hang,
}

impl UnaryMethod for FakeUnary {
    type Client = FakeClient;
    type Request = Bytes;
    type Response = Bytes;

    fn name(&self) -> &str {
        "/test.Fake/Unary"
    }

    async fn invoke(&self, _client: &mut FakeClient, request: Bytes) -> Result<Bytes, Error> {
        match self {
            FakeUnary::Echo => Ok(request),
            FakeUnary::Empty => Ok(Bytes::new()),
            FakeUnary::Fail(code) => Err(Error::invoke(*code, "rejected")),
            FakeUnary::Hang => futures::future::pending().await,
        }
    }
}

/// Replays a fixed script of responses.
#[derive(Debug)]
pub(crate) struct FakeServerStream {
    script: Vec<Result<Bytes, Error>>,
}

impl FakeServerStream {
    pub(crate) fn items(items: &[&'static str]) -> Self {
        Self {
            script: items.iter().map(|s| Ok(Bytes::from_static(s.as_bytes()))).collect(),
        }
    }

    pub(crate) fn failing_after(items: &[&'static str], error: Error) -> Self {
        let mut stream = Self::items(items);
        stream.script.push(Err(error));
        stream
    }
}

impl ServerStreamMethod for FakeServerStream {
    type Client = FakeClient;
    type Request = Bytes;
    type Response = Bytes;
    type Receiver = Streaming<futures::stream::Iter<std::vec::IntoIter<Result<Bytes, Error>>>>;

    fn name(&self) -> &str {
        "/test.Fake/ServerStream"
    }

    async fn open(&self, _client: &mut FakeClient, _request: Bytes) -> Result<Self::Receiver, Error> {
        Ok(Streaming::new(futures::stream::iter(self.script.clone())))
    }
}

#[derive(Debug)]
pub(crate) enum FakeBidi {
    /// Echo each request; a `boom` request fails the response stream.
    Echo,
    /// Refuse to open.
    Reject,
    /// Never read requests; fail the response stream after a short delay.
    Stall,
}

type FakeResponses = Streaming<ReceiverStream<Result<Bytes, Error>>>;

impl BidiStreamMethod for FakeBidi {
    type Client = FakeClient;
    type Request = Bytes;
    type Response = Bytes;
    type Receiver = FakeResponses;
    type Sender = ChannelSender<Bytes>;

    fn name(&self) -> &str {
        "/test.Fake/Bidi"
    }

    async fn open(
        &self,
        _client: &mut FakeClient,
    ) -> Result<(FakeResponses, ChannelSender<Bytes>), Error> {
        let (tx, rx) = mpsc::channel(16);

        let sender = match self {
            FakeBidi::Reject => {
                return Err(Error::invoke(Code::Unimplemented, "no such method"));
            }
            FakeBidi::Echo => {
                let (sender, mut requests) = request_channel::<Bytes>(4);
                tokio::spawn(async move {
                    while let Some(request) = requests.next().await {
                        if request.as_ref() == b"boom" {
                            let failure = StreamError::Status {
                                code: Code::Internal,
                                message: "boom".into(),
                            };
                            let _ = tx.send(Err(failure.into())).await;
                            return;
                        }
                        if tx.send(Ok(request)).await.is_err() {
                            return;
                        }
                    }
                });
                sender
            }
            FakeBidi::Stall => {
                let (sender, requests) = request_channel::<Bytes>(1);
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    let failure = StreamError::Status {
                        code: Code::Unavailable,
                        message: "stalled".into(),
                    };
                    let _ = tx.send(Err(failure.into())).await;
                    // Keep the request side open until the session is gone.
                    tx.closed().await;
                    drop(requests);
                });
                sender
            }
        };

        Ok((Streaming::new(ReceiverStream::new(rx)), sender))
    }
}
