/// Margin between stacked elements.
pub const LAYOUT_MARGINS: u32 = 20;
/// Keeps the header visible.
pub const LAYOUT_EXTRA_BUFFER: u32 = 10;
pub const DEFAULT_MIN_OUTPUT_HEIGHT: u32 = 150;

/// Heights of everything stacked around the output log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutMetrics {
    pub viewport_height: u32,
    pub header_height: u32,
    pub status_height: u32,
    pub control_height: u32,
    pub container_padding: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLayout {
    pub min_height: u32,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self {
            min_height: DEFAULT_MIN_OUTPUT_HEIGHT,
        }
    }
}

impl OutputLayout {
    pub fn new(min_height: u32) -> Self {
        Self { min_height }
    }

    /// Viewport minus everything above and around the log, floored at the minimum.
    pub fn compute(&self, metrics: &LayoutMetrics) -> u32 {
        let used = [
            metrics.status_height,
            metrics.control_height,
            metrics.container_padding,
            LAYOUT_MARGINS,
            LAYOUT_EXTRA_BUFFER,
        ]
        .into_iter()
        .fold(metrics.header_height, u32::saturating_add);

        metrics
            .viewport_height
            .saturating_sub(used)
            .max(self.min_height)
    }
}
