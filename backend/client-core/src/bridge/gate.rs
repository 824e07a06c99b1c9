use crate::modules::SOCKET_PATH_ARG;
use crate::protocol::JobDescriptor;

use serde_json::Value;

/// A job ready to be launched, with its socket endpoint filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchRequest {
    pub socket_path: String,
    pub job: JobDescriptor,
}

/// Fires once both the bridge endpoint and the microphone are ready.
///
/// Holds at most one pending job. Whichever input arrives second triggers the
/// launch, and a fired gate stays quiet until it is armed again.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaunchGate {
    pending: Option<JobDescriptor>,
    endpoint: Option<String>,
    microphone_ready: bool,
}

impl LaunchGate {
    pub fn arm(&mut self, job: JobDescriptor) {
        self.pending = Some(job);
        self.endpoint = None;
        self.microphone_ready = false;
    }

    pub fn offer_endpoint(&mut self, endpoint: impl Into<String>) -> Option<LaunchRequest> {
        self.endpoint = Some(endpoint.into());
        self.try_fire()
    }

    pub fn offer_microphone(&mut self) -> Option<LaunchRequest> {
        self.microphone_ready = true;
        self.try_fire()
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn microphone_ready(&self) -> bool {
        self.microphone_ready
    }

    /// Any pending job or half-satisfied input.
    pub fn has_state(&self) -> bool {
        self.pending.is_some() || self.endpoint.is_some() || self.microphone_ready
    }

    pub fn clear(&mut self) {
        self.pending = None;
        self.endpoint = None;
        self.microphone_ready = false;
    }

    fn try_fire(&mut self) -> Option<LaunchRequest> {
        if !self.microphone_ready {
            return None;
        }
        let socket_path = self.endpoint.clone()?;
        let mut job = self.pending.take()?;

        job.args.insert(
            SOCKET_PATH_ARG.to_string(),
            Value::String(socket_path.clone()),
        );
        Some(LaunchRequest { socket_path, job })
    }
}
