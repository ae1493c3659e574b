use super::PoolPos;

#[derive(Clone, Copy, Default)]
struct FrameState {
    pins: u32,
    referenced: bool,
    dirty: bool,
}

/// Picks the frame to reuse when a page has to be loaded.
///
/// Only frames nobody holds a pin on are candidates. The hand sweeps the frames and gives
/// every referenced frame one more turn before it is chosen. Clean frames are preferred so
/// that a page can usually be dropped without a write; a dirty frame is only chosen once no
/// clean candidate is left.
pub(in crate::buffer) struct ClockReplacer {
    hand: PoolPos,
    frames: Vec<FrameState>,
    candidates: usize,
}

impl ClockReplacer {
    pub fn new(pool_size: usize) -> Self {
        Self {
            hand: 0,
            frames: vec![FrameState::default(); pool_size],
            candidates: pool_size,
        }
    }

    pub fn pin(&mut self, pool_pos: PoolPos) {
        let frame = &mut self.frames[pool_pos];
        if frame.pins == 0 {
            self.candidates -= 1;
        }
        frame.pins += 1;
        frame.referenced = true;
    }

    pub fn unpin(&mut self, pool_pos: PoolPos) {
        let frame = &mut self.frames[pool_pos];
        frame.pins -= 1;
        if frame.pins == 0 {
            self.candidates += 1;
        }
    }

    pub fn is_pinned(&self, pool_pos: PoolPos) -> bool {
        self.frames[pool_pos].pins > 0
    }

    /// Records whether the page held by the frame has to be written before the frame is reused
    pub fn set_dirty(&mut self, pool_pos: PoolPos, dirty: bool) {
        self.frames[pool_pos].dirty = dirty;
    }

    /// Returns None if every frame is pinned
    pub fn find_victim(&mut self) -> Option<PoolPos> {
        if self.candidates == 0 {
            return None;
        }
        self.sweep(|frame| !frame.dirty)
            .or_else(|| self.sweep(|_| true))
    }

    /// Two turns of the hand: the first one may only clear reference bits
    fn sweep(&mut self, eligible: impl Fn(&FrameState) -> bool) -> Option<PoolPos> {
        let pool_size = self.frames.len();
        for _ in 0..2 * pool_size {
            let pool_pos = self.hand;
            self.hand = (self.hand + 1) % pool_size;

            let frame = &mut self.frames[pool_pos];
            if frame.pins > 0 || !eligible(frame) {
                continue;
            }
            if frame.referenced {
                frame.referenced = false;
            } else {
                return Some(pool_pos);
            }
        }
        None
    }
}
