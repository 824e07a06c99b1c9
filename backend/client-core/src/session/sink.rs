use crate::session::effect::Effect;

/// Where a session's effects end up: a terminal, a UI, a test recorder.
pub trait EffectSink {
    fn apply(&mut self, effect: Effect);
}

impl EffectSink for Vec<Effect> {
    fn apply(&mut self, effect: Effect) {
        self.push(effect);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EffectSink for NullSink {
    fn apply(&mut self, _effect: Effect) {}
}
