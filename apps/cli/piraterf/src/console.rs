//! Terminal rendering of session effects.

use client_core::listing::ListedFile;
use client_core::session::{Effect, EffectSink, LogKind};

use std::io::{Write, stdout};

use log::warn;

/// Prints effects as lines and remembers them until cleared.
pub struct ConsoleSink {
    out: Box<dyn Write + Send>,
    history: Vec<Effect>,
}

impl ConsoleSink {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out,
            history: Vec::new(),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(stdout()))
    }

    /// Effects since the last [`ConsoleSink::clear_history`].
    pub fn history(&self) -> &[Effect] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

impl EffectSink for ConsoleSink {
    fn apply(&mut self, effect: Effect) {
        if let Some(text) = render(&effect)
            && let Err(e) = writeln!(self.out, "{text}")
        {
            warn!("Failed to write to the console: {e}");
        }
        self.history.push(effect);
    }
}

/// The line (or lines) printed for an effect, if any.
pub fn render(effect: &Effect) -> Option<String> {
    match effect {
        Effect::Status(text) => Some(format!("status: {text}")),
        Effect::Notice(text) => Some(format!("! {text}")),
        Effect::Error(text) => Some(format!("error: {text}")),
        Effect::Loading(Some(text)) => Some(text.clone()),
        Effect::Log(entry) => Some(match entry.kind {
            LogKind::System => format!("* {}", entry.text),
            LogKind::Output => entry.text.clone(),
            LogKind::Send => format!(">> {}", entry.text),
            LogKind::Receive => format!("<< {}", entry.text),
        }),
        Effect::ListingLoaded { category, files } => Some(listing(&category.to_string(), files)),
        Effect::SfxLoaded { files } => Some(listing("sfx", files)),
        Effect::SelectionChanged {
            category,
            path: Some(path),
        } => Some(format!("selected {category}: {path}")),
        Effect::PlaylistError { message, .. } => Some(format!("playlist error: {message}")),
        Effect::Bridge(phase) => Some(format!("bridge: {phase:?}")),
        _ => None,
    }
}

fn listing(label: &str, files: &[ListedFile]) -> String {
    let mut lines = vec![format!("{label}: {} file(s)", files.len())];
    for file in files {
        let size = file
            .size
            .map(|size| format!("{size} B"))
            .unwrap_or_default();
        let modified = file.mod_time.as_deref().unwrap_or("");
        lines.push(format!("  {}  {size}  {modified}", file.server_path));
    }
    lines.join("\n")
}
