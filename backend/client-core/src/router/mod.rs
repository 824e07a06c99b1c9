//! Inbound dispatch and outbound framing for the control channel.

use crate::error::protocol::ProtocolError;
use crate::protocol::{
    Command, Envelope, ExecutionStarted, ExecutionStopped, FileReply, InboundEvent, OutputLine,
    PlaylistCreated, PlaylistFailed, Rejection,
};

use log::debug;

/// Receiver of decoded control-channel events.
///
/// File replies arrive already tagged with their category; implementors branch
/// on [`FileReply::category`] rather than re-reading paths.
pub trait EventHandler {
    fn execution_started(&mut self, event: ExecutionStarted);
    fn execution_stopped(&mut self, event: ExecutionStopped);
    fn execution_error(&mut self, rejection: Rejection);
    fn output_line(&mut self, line: OutputLine);
    fn file_reply(&mut self, reply: FileReply);
    fn playlist_created(&mut self, event: PlaylistCreated);
    fn playlist_failed(&mut self, event: PlaylistFailed);
}

/// Direction of a mirrored envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sending,
    Received,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::Sending => "SENDING",
            Direction::Received => "RECEIVED",
        }
    }
}

/// A decoded inbound frame, with its mirror text when debug mode is on.
#[derive(Debug, Clone, PartialEq)]
pub struct Routed {
    pub envelope: Envelope,
    pub event: Option<InboundEvent>,
    pub mirror: Option<String>,
}

/// A framed outbound command.
#[derive(Debug, Clone, PartialEq)]
pub struct Framed {
    pub envelope: Envelope,
    pub text: String,
    pub mirror: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Router {
    debug: bool,
}

impl Router {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Parse a text frame. Unknown types decode to `event: None`.
    pub fn decode(&self, text: &str) -> Result<Routed, ProtocolError> {
        let envelope = Envelope::parse(text)?;
        let event = InboundEvent::from_envelope(&envelope)?;

        if event.is_none() {
            debug!("Ignoring unhandled message type: {}", envelope.event_type);
        }

        let mirror = self.mirror(Direction::Received, &envelope);
        Ok(Routed {
            envelope,
            event,
            mirror,
        })
    }

    /// Attach a fresh correlation id and serialize.
    pub fn frame(&self, command: Command) -> Result<Framed, ProtocolError> {
        let envelope = command.into_envelope()?;
        let text = envelope.to_json()?;
        let mirror = self.mirror(Direction::Sending, &envelope);
        Ok(Framed {
            envelope,
            text,
            mirror,
        })
    }

    /// Forward one event to the matching handler method.
    pub fn dispatch<H: EventHandler + ?Sized>(event: InboundEvent, handler: &mut H) {
        match event {
            InboundEvent::ExecutionStarted(started) => handler.execution_started(started),
            InboundEvent::ExecutionStopped(stopped) => handler.execution_stopped(stopped),
            InboundEvent::ExecutionError(rejection) => handler.execution_error(rejection),
            InboundEvent::OutputLine(line) => handler.output_line(line),
            InboundEvent::File(reply) => handler.file_reply(reply),
            InboundEvent::PlaylistCreated(created) => handler.playlist_created(created),
            InboundEvent::PlaylistFailed(failed) => handler.playlist_failed(failed),
        }
    }

    fn mirror(&self, direction: Direction, envelope: &Envelope) -> Option<String> {
        debug!("{}: {}", direction.label(), envelope.event_type);
        self.debug
            .then(|| format!("{}: {}", direction.label(), envelope.to_pretty_json()))
    }
}
