//! Recording HTTP client shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::http::{BoxError, HttpClient, HttpRequest, HttpResponse};

pub(crate) struct MockHttpClient {
    responses: Mutex<VecDeque<Result<HttpResponse, String>>>,
    recorded: Mutex<Vec<HttpRequest>>,
}

impl MockHttpClient {
    pub(crate) fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push(&self, status: u16, body: Vec<u8>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(HttpResponse { status, body }));
    }

    pub(crate) fn push_json(&self, status: u16, body: serde_json::Value) {
        self.push(status, serde_json::to_vec(&body).unwrap());
    }

    pub(crate) fn push_error(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub(crate) fn take_requests(&self) -> Vec<HttpRequest> {
        std::mem::take(&mut self.recorded.lock().unwrap())
    }

    pub(crate) fn request_count(&self) -> usize {
        self.recorded.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, BoxError> {
        self.recorded.lock().unwrap().push(request);
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("no mock response queued");
        next.map_err(BoxError::from)
    }
}
