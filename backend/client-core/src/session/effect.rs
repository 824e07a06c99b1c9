use crate::bridge::BridgePhase;
use crate::listing::ListedFile;
use crate::protocol::FileCategory;

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    System,
    Output,
    Send,
    Receive,
}

impl LogKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LogKind::System => "system",
            LogKind::Output => "output",
            LogKind::Send => "send",
            LogKind::Receive => "receive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub kind: LogKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Live,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Idle,
    Executing,
}

/// An observable consequence of a state transition.
///
/// State machines return effects instead of touching any surface directly; the
/// session forwards them to an [`crate::session::EffectSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Status bar text.
    Status(String),
    Connection(ConnectionState),
    /// Dismissible connection notice.
    Notice(String),
    ClearNotice,
    Mode(ExecutionMode),
    ScrollToTop,
    /// Recompute the output height once this delay has passed.
    ScheduleLayout(Duration),
    OutputHeight(u32),
    /// Drop any explicit output height.
    ResetOutputHeight,
    Log(LogEntry),
    /// Inline user-visible error.
    Error(String),
    Loading(Option<String>),
    ReloadListing {
        category: FileCategory,
        select: Option<String>,
    },
    ListingLoaded {
        category: FileCategory,
        files: Vec<ListedFile>,
    },
    /// Intro/outro sound effects on offer.
    SfxLoaded {
        files: Vec<ListedFile>,
    },
    SelectionChanged {
        category: FileCategory,
        path: Option<String>,
    },
    EditorOpened {
        category: FileCategory,
        name: String,
    },
    EditorClosed(FileCategory),
    PlaylistError {
        message: String,
        display_for: Duration,
    },
    PlaylistChanged {
        entries: usize,
    },
    Bridge(BridgePhase),
}

impl Effect {
    pub fn system(text: impl Into<String>) -> Self {
        Effect::Log(LogEntry {
            kind: LogKind::System,
            text: text.into(),
        })
    }

    pub fn output(text: impl Into<String>) -> Self {
        Effect::Log(LogEntry {
            kind: LogKind::Output,
            text: text.into(),
        })
    }

    pub fn log(kind: LogKind, text: impl Into<String>) -> Self {
        Effect::Log(LogEntry {
            kind,
            text: text.into(),
        })
    }
}
