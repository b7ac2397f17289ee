use std::collections::VecDeque;

pub const DEFAULT_HISTORY: usize = 5;

/// Moving average over the most recent angle estimates.
///
/// This is a plain arithmetic mean, not a circular one: a window holding
/// both +170 and -170 averages to 0 rather than 180. Stereo angles never get
/// near the wrap point; surround sources directly behind the listener do.
#[derive(Clone, Debug)]
pub struct AngleSmoother {
    history: VecDeque<f32>,
    depth: usize,
}

impl AngleSmoother {
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            history: VecDeque::with_capacity(depth + 1),
            depth,
        }
    }

    /// Appends an estimate and returns the mean of the window.
    pub fn push(&mut self, angle: f32) -> f32 {
        self.history.push_back(angle);
        if self.history.len() > self.depth {
            self.history.pop_front();
        }
        self.mean()
    }

    pub fn mean(&self) -> f32 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().sum::<f32>() / self.history.len() as f32
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Default for AngleSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}
