//! Per-channel rolling sample storage backing the live plot.
//!
//! Append-only for the duration of a capture session: the consumer task is
//! the only writer, and a renderer reading concurrently takes a length
//! snapshot and only touches indices below it. History is unbounded, so the
//! render path strides through the visible span to bound the point count
//! independently of how long the capture has been running.

/// Maximum number of points handed to the renderer per pass.
const MAX_RENDER_POINTS: usize = 100;

/// Derived plot-axis ranges for one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisLimits {
    pub time_min: f64,
    pub time_max: f64,
    pub value_min: f64,
    pub value_max: f64,
}

/// Append-only sample sequence with running extent tracking.
#[derive(Debug)]
pub struct RollingBuffer {
    values: Vec<f64>,
    /// Running (min, max); unset until a finite sample arrives.
    extent: Option<(f64, f64)>,
    /// Device sampling period in milliseconds, maps index to elapsed time.
    cycle_ms: u32,
}

impl RollingBuffer {
    pub fn new(cycle_ms: u32) -> Self {
        Self {
            values: Vec::new(),
            extent: None,
            cycle_ms,
        }
    }

    pub fn cycle_ms(&self) -> u32 {
        self.cycle_ms
    }

    /// Append one sample. NaN sentinels (bad frames) are stored so the time
    /// axis stays aligned, but never widen the value extent.
    pub fn append(&mut self, value: f64) {
        if value.is_finite() {
            self.extent = Some(match self.extent {
                Some((min, max)) => (min.min(value), max.max(value)),
                None => (value, value),
            });
        }
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// Elapsed time of sample `index`, in seconds.
    pub fn time_at(&self, index: usize) -> f64 {
        index as f64 * self.cycle_ms as f64 / 1000.0
    }

    /// Axis ranges covering everything captured so far, or `None` while the
    /// buffer is empty.
    pub fn axis_limits(&self) -> Option<AxisLimits> {
        if self.values.is_empty() {
            return None;
        }
        let (value_min, value_max) = self.extent.unwrap_or((0.0, 0.0));
        Some(AxisLimits {
            time_min: 0.0,
            time_max: self.time_at(self.values.len() - 1),
            value_min,
            value_max,
        })
    }

    /// Points for the visible time window `[visible_min_s, visible_max_s]`,
    /// widened by one sample on each side so edge lines are not clipped.
    /// When the span exceeds the point cap the iterator strides, emitting at
    /// most ~100 points regardless of history length.
    pub fn render_points(&self, visible_min_s: f64, visible_max_s: f64) -> RenderPoints<'_> {
        let cycle = self.cycle_ms as f64;
        let first = ((visible_min_s * 1000.0 / cycle) as i64 - 1).max(0) as usize;
        let end = (((visible_max_s * 1000.0 / cycle) as i64 + 2).max(0) as usize)
            .min(self.values.len());
        let span = end.saturating_sub(first);
        let step = if span > MAX_RENDER_POINTS {
            span / MAX_RENDER_POINTS
        } else {
            1
        };
        RenderPoints {
            buffer: self,
            index: first,
            end,
            step,
        }
    }

    /// Drop all samples and the extent. Called only when a new capture
    /// session begins.
    pub fn clear(&mut self) {
        self.values.clear();
        self.extent = None;
    }
}

/// Lazy, restartable (time, value) sequence over a visible window.
#[derive(Debug, Clone)]
pub struct RenderPoints<'a> {
    buffer: &'a RollingBuffer,
    index: usize,
    end: usize,
    step: usize,
}

impl Iterator for RenderPoints<'_> {
    type Item = (f64, f64);

    fn next(&mut self) -> Option<(f64, f64)> {
        if self.index >= self.end {
            return None;
        }
        let point = (
            self.buffer.time_at(self.index),
            self.buffer.values[self.index],
        );
        self.index += self.step;
        Some(point)
    }
}
