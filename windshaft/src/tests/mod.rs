use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::error::WindshaftError;
use crate::model::CartoLayer;
use crate::platform::{HttpRequest, HttpResponse, HttpTransport};
use crate::view::{LayerGroupView, TileUrls};
use crate::{LayerGroup, LayerGroupBuilder};

type Reply = Result<HttpResponse, WindshaftError>;

enum MockReply {
    Ready(Reply),
    Gated(oneshot::Receiver<Reply>),
}

/// Transport answering with preconfigured replies in order and recording every request.
#[derive(Default)]
pub struct MockTransport {
    requests: Mutex<Vec<HttpRequest>>,
    replies: Mutex<VecDeque<MockReply>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, reply: Reply) {
        self.replies.lock().push_back(MockReply::Ready(reply));
    }

    pub fn reply_json(&self, status: u16, body: Value) {
        self.reply(Ok(HttpResponse::new(status, body.to_string())));
    }

    /// Queues a reply that is delivered only when sent through the returned channel.
    pub fn reply_gated(&self) -> oneshot::Sender<Reply> {
        let (sender, receiver) = oneshot::channel();
        self.replies.lock().push_back(MockReply::Gated(receiver));
        sender
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, WindshaftError> {
        self.requests.lock().push(request);
        let reply = self.replies.lock().pop_front();

        match reply {
            Some(MockReply::Ready(reply)) => reply,
            Some(MockReply::Gated(receiver)) => receiver
                .await
                .unwrap_or_else(|_| Err(WindshaftError::Transport("reply gate closed".into()))),
            None => Err(WindshaftError::Transport("no reply configured".into())),
        }
    }
}

/// View recording every repaint.
#[derive(Default)]
pub struct RecordingView {
    repaints: Mutex<Vec<TileUrls>>,
    removed: AtomicBool,
}

impl RecordingView {
    pub fn repaint_count(&self) -> usize {
        self.repaints.lock().len()
    }

    pub fn last_urls(&self) -> Option<TileUrls> {
        self.repaints.lock().last().cloned()
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Relaxed)
    }
}

impl LayerGroupView for RecordingView {
    fn repaint(&self, urls: &TileUrls) {
        self.repaints.lock().push(urls.clone());
    }

    fn remove(&self) {
        self.removed.store(true, Ordering::Relaxed);
    }
}

/// Body of a successful instantiation with metadata for `layers` mapnik layers.
pub fn success_body(layergroupid: &str, layers: usize) -> Value {
    let layers: Vec<Value> = (0..layers)
        .map(|_| json!({"type": "mapnik", "meta": {"stats": [], "cartocss": "#layer {}"}}))
        .collect();

    json!({
        "layergroupid": layergroupid,
        "last_updated": "2024-01-01T00:00:00.000Z",
        "metadata": {"layers": layers}
    })
}

pub fn layer_group(transport: Arc<MockTransport>, layers: Vec<CartoLayer>) -> LayerGroup {
    layers
        .into_iter()
        .fold(
            LayerGroupBuilder::new()
                .with_url_template("https://{user}.example.com")
                .with_user_name("acme")
                .with_api_key("secret")
                .with_transport(transport),
            |builder, layer| builder.with_layer(layer),
        )
        .build()
        .expect("valid layer group configuration")
}
