//! Multi-click counting shared by the backends.
//!
//! The Windows and X11 hooks report no click counts, so those backends feed
//! their raw button and motion occurrences through a [`ClickTracker`] and copy
//! the result into the native events they emit. Quartz counts clicks itself;
//! its backend still uses the tracker to spot drags.

/// Default multi-click interval when the OS does not provide one.
pub const DEFAULT_MULTI_CLICK_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct ClickTracker {
    interval_ms: u64,
    last_button: Option<u8>,
    last_press_ms: u64,
    count: u16,
    held: Option<u8>,
    dragged: bool,
}

/// What a button release amounts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Release {
    pub clicks: u16,
    /// Press and release form a click: no drag happened in between.
    pub clicked: bool,
}

impl ClickTracker {
    pub fn new(interval_ms: u64) -> Self {
        ClickTracker {
            interval_ms,
            last_button: None,
            last_press_ms: 0,
            count: 0,
            held: None,
            dragged: false,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Records a press and returns its click count.
    pub fn press(&mut self, button: u8, time_ms: u64) -> u16 {
        let repeat = self.last_button == Some(button)
            && self.count > 0
            && time_ms.saturating_sub(self.last_press_ms) <= self.interval_ms;
        self.count = if repeat { self.count.saturating_add(1) } else { 1 };
        self.last_button = Some(button);
        self.last_press_ms = time_ms;
        self.held = Some(button);
        self.dragged = false;
        self.count
    }

    /// Records pointer motion; motion while a button is held is a drag and
    /// ends the click sequence.
    pub fn motion(&mut self) {
        if self.held.is_some() {
            self.dragged = true;
            self.count = 0;
        }
    }

    pub fn release(&mut self, button: u8) -> Release {
        let clicked = self.held == Some(button) && !self.dragged;
        if self.held == Some(button) {
            self.held = None;
        }
        Release {
            clicks: self.count,
            clicked,
        }
    }
}

impl Default for ClickTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MULTI_CLICK_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presses_within_interval_count_up() {
        // Arrange
        let mut tracker = ClickTracker::new(400);

        // Act
        let first = tracker.press(1, 1_000);
        tracker.release(1);
        let second = tracker.press(1, 1_300);
        let release = tracker.release(1);

        // Assert
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(release, Release { clicks: 2, clicked: true });
    }

    #[test]
    fn test_slow_press_or_other_button_restarts_the_count() {
        let mut tracker = ClickTracker::new(400);
        tracker.press(1, 0);
        tracker.release(1);

        assert_eq!(tracker.press(1, 401), 1);
        tracker.release(1);
        assert_eq!(tracker.press(2, 450), 1);
    }

    #[test]
    fn test_drag_suppresses_the_click() {
        let mut tracker = ClickTracker::default();
        tracker.press(1, 0);

        tracker.motion();
        let release = tracker.release(1);

        assert!(!release.clicked);
        assert_eq!(tracker.press(1, 10), 1);
    }

    #[test]
    fn test_motion_without_held_button_keeps_the_sequence() {
        let mut tracker = ClickTracker::default();
        tracker.press(1, 0);
        tracker.release(1);

        tracker.motion();

        assert_eq!(tracker.press(1, 100), 2);
    }
}
