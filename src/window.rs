//! Fixed-capacity rolling window of per-tick values.

pub const DEFAULT_WINDOW_SIZE: usize = 60;

/// A ring of optional samples with a running sum of the present ones.
///
/// A missing slot (`None`) is distinct from a present `0.0`: it contributes
/// nothing to the sum and counts towards [`RateWindow::is_empty`].
#[derive(Debug, Clone)]
pub struct RateWindow {
    items: Vec<Option<f64>>,
    /// Slot holding the newest value.
    cursor: usize,
    sum: f64,
    present: usize,
}

impl RateWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: vec![None; capacity],
            cursor: capacity - 1,
            sum: 0.0,
            present: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    /// Push a value, evicting the oldest one. O(1).
    ///
    /// A non-finite value is stored as missing.
    pub fn add(&mut self, value: Option<f64>) {
        let value = value.filter(|v| v.is_finite());
        self.cursor = (self.cursor + 1) % self.items.len();
        if let Some(old) = self.items[self.cursor].take() {
            self.sum -= old;
            self.present -= 1;
        }
        if let Some(new) = value {
            self.sum += new;
            self.present += 1;
        }
        self.items[self.cursor] = value;
        if self.present == 0 {
            // An empty window sums to exactly zero.
            self.sum = 0.0;
        }
    }

    /// All slots, oldest first. Always `capacity()` long.
    pub fn values(&self) -> Vec<Option<f64>> {
        let (newer, older) = self.items.split_at(self.cursor + 1);
        older.iter().chain(newer).copied().collect()
    }

    /// Sum of the present values; the ranking key.
    pub fn aggregate(&self) -> f64 {
        self.sum
    }

    pub fn latest(&self) -> Option<f64> {
        self.items[self.cursor]
    }

    pub fn is_empty(&self) -> bool {
        self.present == 0
    }
}

impl Default for RateWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}
