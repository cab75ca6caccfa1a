//! Coalescing timer state
//!
//! Both flush paths (persist and broadcast) use the same one-shot idiom:
//! the first trigger arms a timer, further triggers while it is pending are
//! no-ops, and the timer always runs to completion once armed.

/// State of one coalescing timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushState {
    /// No flush scheduled
    #[default]
    Idle,
    /// A flush timer is armed and will fire
    Pending,
    /// The flush is executing right now
    Firing,
}

impl FlushState {
    /// Arm the timer. Returns true when the caller must schedule the flush;
    /// a pending or firing timer absorbs the request.
    pub fn try_arm(&mut self) -> bool {
        match self {
            FlushState::Idle => {
                *self = FlushState::Pending;
                true
            }
            FlushState::Pending | FlushState::Firing => false,
        }
    }

    /// The armed timer has expired and the flush is starting.
    pub fn begin_fire(&mut self) {
        debug_assert_eq!(*self, FlushState::Pending);
        *self = FlushState::Firing;
    }

    /// The flush finished; the next trigger arms a fresh timer.
    pub fn finish(&mut self) {
        *self = FlushState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_first_arm_schedules() {
        let mut state = FlushState::Idle;
        assert!(state.try_arm());
        assert!(!state.try_arm());
        assert!(!state.try_arm());
        assert_eq!(state, FlushState::Pending);
    }

    #[test]
    fn firing_absorbs_arm_requests() {
        let mut state = FlushState::Idle;
        assert!(state.try_arm());
        state.begin_fire();
        assert!(!state.try_arm());
        state.finish();
        assert!(state.try_arm());
    }
}
