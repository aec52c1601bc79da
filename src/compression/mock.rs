use super::codec::{EncodeRequest, ImageCodec};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scriptable codec: output is the first half of the input, specific inputs
/// can be made to fail or to stall.
#[derive(Clone)]
pub struct MockCodec {
    call_count: Arc<Mutex<usize>>,
    requests: Arc<Mutex<Vec<EncodeRequest>>>,
    failing_inputs: Arc<Mutex<HashSet<Vec<u8>>>>,
    delays: Arc<Mutex<HashMap<Vec<u8>, Duration>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockCodec {
    pub fn new() -> Self {
        Self {
            call_count: Arc::new(Mutex::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            failing_inputs: Arc::new(Mutex::new(HashSet::new())),
            delays: Arc::new(Mutex::new(HashMap::new())),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn with_failing_input(self, input: Vec<u8>) -> Self {
        self.failing_inputs.lock().unwrap().insert(input);
        self
    }

    pub fn with_delay_for(self, input: Vec<u8>, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(input, delay);
        self
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub fn get_requests(&self) -> Vec<EncodeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCodec for MockCodec {
    fn transcode(&self, input: &[u8], request: &EncodeRequest) -> Result<Vec<u8>> {
        *self.call_count.lock().unwrap() += 1;
        self.requests.lock().unwrap().push(*request);

        let delay = self.delays.lock().unwrap().get(input).copied();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        if *self.should_fail.lock().unwrap() || self.failing_inputs.lock().unwrap().contains(input)
        {
            return Err(Error::Image(image::ImageError::IoError(
                std::io::Error::other("Mock codec failure"),
            )));
        }

        Ok(input[..input.len() / 2].to_vec())
    }
}
