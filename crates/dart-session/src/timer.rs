/// A cancellable deferred action: due once `now` reaches the deadline.
///
/// Arming replaces any pending deadline, so at most one is ever armed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AutoStop {
    deadline: Option<f64>,
}

impl AutoStop {
    pub fn arm(&mut self, at: f64) {
        self.deadline = Some(at);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<f64> {
        self.deadline
    }

    pub fn is_due(&self, now: f64) -> bool {
        matches!(self.deadline, Some(d) if now >= d)
    }
}
