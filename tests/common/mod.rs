//! In-memory transport that replays canned responses and records requests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream;
use novelflow_ai::http::{
    DynHttpTransport, HttpBodyStream, HttpError, HttpRequest, HttpResponse, HttpStreamResponse,
    HttpTransport,
};
use serde_json::Value;

pub enum Reply {
    Json {
        status: u16,
        headers: HashMap<String, String>,
        body: String,
    },
    Sse {
        status: u16,
        chunks: Vec<String>,
    },
    Fail(String),
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self::Json {
            status: 200,
            headers: HashMap::new(),
            body: body.to_string(),
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self::Json {
            status,
            headers: HashMap::new(),
            body: body.to_string(),
        }
    }

    pub fn sse(chunks: &[&str]) -> Self {
        Self::Sse {
            status: 200,
            chunks: chunks.iter().map(|chunk| chunk.to_string()).collect(),
        }
    }
}

#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// JSON body of the `index`-th recorded request.
    pub fn body(&self, index: usize) -> Value {
        let requests = self.requests.lock().unwrap();
        serde_json::from_slice(&requests[index].body).expect("request body is JSON")
    }

    fn next_reply(&self, request: HttpRequest) -> Reply {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("no canned reply left")
    }
}

pub fn dyn_transport(mock: &Arc<MockTransport>) -> DynHttpTransport {
    mock.clone()
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        match self.next_reply(request) {
            Reply::Json {
                status,
                headers,
                body,
            } => Ok(HttpResponse {
                status,
                headers,
                body: body.into_bytes(),
            }),
            Reply::Sse { .. } => panic!("streaming reply queued for a buffered request"),
            Reply::Fail(message) => Err(HttpError::Transport(message)),
        }
    }

    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, HttpError> {
        match self.next_reply(request) {
            Reply::Sse { status, chunks } => {
                let body: HttpBodyStream = Box::pin(stream::iter(
                    chunks.into_iter().map(|chunk| Ok(chunk.into_bytes())),
                ));
                Ok(HttpStreamResponse {
                    status,
                    headers: HashMap::new(),
                    body,
                })
            }
            Reply::Json {
                status,
                headers,
                body,
            } => {
                let body: HttpBodyStream =
                    Box::pin(stream::iter(vec![Ok(body.into_bytes())]));
                Ok(HttpStreamResponse {
                    status,
                    headers,
                    body,
                })
            }
            Reply::Fail(message) => Err(HttpError::Transport(message)),
        }
    }
}
