use std::collections::HashMap;
use std::hash::Hash;

/// Frame index the counter starts at. Zero is reserved for "released".
const FIRST_FRAME: u64 = 1;

/// Frame-stamped press tracking for one input device.
///
/// Each press records the frame index it arrived in; a release forgets it.
/// A code is held while it has a stamp, and "just pressed" when its stamp is
/// exactly one frame behind the counter.
///
/// Edge queries are only available on the [`EdgeFrame`] returned by
/// [`EdgeDetector::update`], so they cannot be evaluated between a press and
/// the update that belongs to the same poll cycle.
#[derive(Debug, Clone)]
pub struct EdgeDetector<C> {
    frame: u64,
    pressed_at: HashMap<C, u64>,
}

impl<C> EdgeDetector<C>
where
    C: Copy + Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            frame: FIRST_FRAME,
            pressed_at: HashMap::new(),
        }
    }

    /// Current frame counter.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Stamps `code` with the current frame.
    ///
    /// Repeated presses within one frame leave the same stamp.
    pub fn on_press(&mut self, code: C) {
        self.pressed_at.insert(code, self.frame);
    }

    pub fn on_release(&mut self, code: C) {
        self.pressed_at.remove(&code);
    }

    /// Releases every held code.
    pub fn release_all(&mut self) {
        self.pressed_at.clear();
    }

    /// Whether `code` is currently held. Unknown codes are not held.
    #[inline]
    pub fn is_held(&self, code: C) -> bool {
        self.pressed_at.contains_key(&code)
    }

    /// Codes currently held, in no particular order.
    pub fn held(&self) -> impl Iterator<Item = C> + '_ {
        self.pressed_at.keys().copied()
    }

    /// Closes the current poll cycle and returns the snapshot for it.
    ///
    /// Must run once per cycle, after every press/release of the cycle.
    pub fn update(&mut self) -> EdgeFrame<'_, C> {
        self.frame += 1;
        EdgeFrame { detector: self }
    }
}

impl<C> Default for EdgeDetector<C>
where
    C: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of an [`EdgeDetector`] for one frame.
#[derive(Debug)]
pub struct EdgeFrame<'a, C> {
    detector: &'a EdgeDetector<C>,
}

impl<C> Clone for EdgeFrame<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for EdgeFrame<'_, C> {}

impl<'a, C> EdgeFrame<'a, C>
where
    C: Copy + Eq + Hash,
{
    #[inline]
    pub fn frame(&self) -> u64 {
        self.detector.frame
    }

    #[inline]
    pub fn is_held(&self, code: C) -> bool {
        self.detector.is_held(code)
    }

    /// True when `code` was pressed during the cycle this frame closed.
    ///
    /// A press and release inside the same cycle is never reported.
    pub fn is_just_pressed(&self, code: C) -> bool {
        self.detector
            .pressed_at
            .get(&code)
            .is_some_and(|&stamp| stamp == self.detector.frame - 1)
    }

    pub fn held(self) -> impl Iterator<Item = C> + 'a {
        self.detector.held()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: u32 = 65;
    const B: u32 = 66;

    #[test]
    fn unseen_codes_are_released() {
        let mut d = EdgeDetector::<u32>::new();
        assert!(!d.is_held(A));
        let f = d.update();
        assert!(!f.is_held(A));
        assert!(!f.is_just_pressed(A));
    }

    #[test]
    fn press_is_held_before_update() {
        let mut d = EdgeDetector::<u32>::new();
        d.on_press(A);
        assert!(d.is_held(A));
    }

    #[test]
    fn just_pressed_lasts_one_update() {
        let mut d = EdgeDetector::<u32>::new();
        d.on_press(A);

        let f = d.update();
        assert!(f.is_just_pressed(A));
        assert!(f.is_held(A));

        let f = d.update();
        assert!(!f.is_just_pressed(A));
        assert!(f.is_held(A));
    }

    #[test]
    fn release_in_same_cycle_masks_press() {
        let mut d = EdgeDetector::<u32>::new();
        d.on_press(A);
        d.on_release(A);

        let f = d.update();
        assert!(!f.is_held(A));
        assert!(!f.is_just_pressed(A));
    }

    #[test]
    fn frame_counter_scenario() {
        let mut d = EdgeDetector::<u32>::new();
        assert_eq!(d.frame(), 1);

        d.on_press(A);
        let f = d.update();
        assert_eq!(f.frame(), 2);
        assert!(f.is_just_pressed(A));
        assert!(f.is_held(A));

        let f = d.update();
        assert_eq!(f.frame(), 3);
        assert!(!f.is_just_pressed(A));
        assert!(f.is_held(A));

        d.on_release(A);
        assert!(!d.is_held(A));
    }

    #[test]
    fn repeated_press_in_one_frame_is_idempotent() {
        let mut once = EdgeDetector::<u32>::new();
        once.on_press(A);

        let mut thrice = EdgeDetector::<u32>::new();
        thrice.on_press(A);
        thrice.on_press(A);
        thrice.on_press(A);

        assert_eq!(once.pressed_at, thrice.pressed_at);
        assert!(thrice.update().is_just_pressed(A));
    }

    #[test]
    fn press_in_later_cycle_restamps() {
        let mut d = EdgeDetector::<u32>::new();
        d.on_press(A);
        d.update();
        d.update();

        // A fresh press of a held code counts as a new edge.
        d.on_press(A);
        assert!(d.update().is_just_pressed(A));
    }

    #[test]
    fn codes_are_tracked_independently() {
        let mut d = EdgeDetector::<u32>::new();
        d.on_press(A);
        d.update();
        d.on_press(B);

        let f = d.update();
        assert!(!f.is_just_pressed(A));
        assert!(f.is_just_pressed(B));
        assert!(f.is_held(A) && f.is_held(B));
    }

    #[test]
    fn release_all_clears_every_code() {
        let mut d = EdgeDetector::<u32>::new();
        d.on_press(A);
        d.on_press(B);
        d.release_all();

        let f = d.update();
        assert_eq!(f.held().count(), 0);
        assert!(!f.is_just_pressed(A));
    }
}
