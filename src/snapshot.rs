//! Fader-wide saved levels with optional automatic save/recall triggers.

/// A saved level per channel plus two effect identities that trigger a
/// save (when the first activates) and a recall (when the second completes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<const N: usize> {
    levels: [u16; N],
    save_uid: Option<u32>,
    recall_uid: Option<u32>,
    enabled: bool,
}

impl<const N: usize> Snapshot<N> {
    pub const fn new() -> Self {
        Self {
            levels: [0; N],
            save_uid: None,
            recall_uid: None,
            enabled: false,
        }
    }

    /// Stores `levels` and marks the snapshot as holding data.
    pub fn store(&mut self, levels: [u16; N]) {
        self.levels = levels;
        self.enabled = true;
    }

    /// Returns the stored levels and forgets the triggers.
    pub fn take(&mut self) -> [u16; N] {
        self.enabled = false;
        self.save_uid = None;
        self.recall_uid = None;
        self.levels
    }

    pub fn levels(&self) -> [u16; N] {
        self.levels
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Arms the triggers.
    pub fn arm(&mut self, save_uid: u32, recall_uid: u32) {
        self.save_uid = Some(save_uid);
        self.recall_uid = Some(recall_uid);
        self.enabled = true;
    }

    /// Whether activating effect `uid` should save the levels.
    pub fn should_save(&self, uid: u32) -> bool {
        self.enabled && self.save_uid == Some(uid)
    }

    /// Whether completing effect `uid` should recall the levels.
    pub fn should_recall(&self, uid: u32) -> bool {
        self.enabled && self.recall_uid == Some(uid)
    }
}

impl<const N: usize> Default for Snapshot<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storing_alone_arms_no_trigger() {
        let mut snap = Snapshot::<3>::new();
        snap.store([1, 2, 3]);
        assert!(snap.is_enabled());
        assert!(!snap.should_save(1));
        assert!(!snap.should_recall(1));
    }

    #[test]
    fn take_disarms_triggers() {
        let mut snap = Snapshot::<2>::new();
        snap.arm(4, 7);
        assert!(snap.should_save(4));
        assert!(snap.should_recall(7));
        assert!(!snap.should_recall(4));

        snap.store([9, 8]);
        assert_eq!(snap.take(), [9, 8]);
        assert!(!snap.is_enabled());
        assert!(!snap.should_recall(7));
    }
}
