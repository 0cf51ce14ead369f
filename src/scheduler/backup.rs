//! Snapshot of a suspended coroutine's stack footprint.
//!
//! The shared stack grows downward from a fixed base, so a footprint is fully described by its size.
//! Saving copies `[base - size, base)` out, restoring copies it back to the exact same addresses.

use std::collections::TryReserveError;
use std::mem::MaybeUninit;
use std::ptr;

/// Growable byte buffer owned by a single coroutine.
///
/// Stack bytes include padding that was never initialized, hence [MaybeUninit].
#[derive(Debug, Default)]
pub(super) struct Backup {
    bytes: Vec<MaybeUninit<u8>>,
}

impl Backup {
    /// Bytes of the latest saved footprint.
    pub(super) fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Allocated bytes, never shrinks.
    pub(super) fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    /// Grows the buffer to hold at least [size] bytes without touching the saved footprint.
    pub(super) fn reserve(&mut self, size: usize) -> Result<(), TryReserveError> {
        let additional = size.saturating_sub(self.bytes.len());
        self.bytes.try_reserve_exact(additional)
    }

    /// Replaces the saved footprint with the [size] bytes below [base].
    ///
    /// # Safety
    /// `[base - size, base)` must be readable and must not overlap this buffer.
    pub(super) unsafe fn save(&mut self, base: *const u8, size: usize) -> Result<(), TryReserveError> {
        self.bytes.clear();
        self.bytes.try_reserve_exact(size)?;

        let source = base.sub(size) as *const MaybeUninit<u8>;
        ptr::copy_nonoverlapping(source, self.bytes.as_mut_ptr(), size);
        self.bytes.set_len(size);

        Ok(())
    }

    /// Writes the saved footprint back so that it ends right below [base].
    ///
    /// # Safety
    /// `[base - size, base)` must be writable and must not overlap this buffer.
    pub(super) unsafe fn restore(&self, base: *mut u8) {
        let size = self.bytes.len();
        let destination = base.sub(size) as *mut MaybeUninit<u8>;
        ptr::copy_nonoverlapping(self.bytes.as_ptr(), destination, size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let backup = Backup::default();

        assert_eq!(backup.size(), 0);
        assert_eq!(backup.capacity(), 0);
    }

    #[test]
    fn restores_to_same_addresses() {
        let mut region = [0u8; 64];
        region[48..].copy_from_slice(&[7; 16]);
        let base = unsafe { region.as_mut_ptr().add(region.len()) };
        let mut backup = Backup::default();

        unsafe { backup.save(base, 16).unwrap() };
        region.fill(0);
        unsafe { backup.restore(base) };

        assert_eq!(backup.size(), 16);
        assert_eq!(&region[..48], &[0; 48]);
        assert_eq!(&region[48..], &[7; 16]);
    }

    #[test]
    fn capacity_never_shrinks() {
        let region = [1u8; 256];
        let base = unsafe { region.as_ptr().add(region.len()) };
        let mut backup = Backup::default();

        unsafe { backup.save(base, 200).unwrap() };
        let capacity = backup.capacity();
        unsafe { backup.save(base, 10).unwrap() };

        assert_eq!(backup.size(), 10);
        assert_eq!(backup.capacity(), capacity);
        assert!(capacity >= 200);
    }

    #[test]
    fn reserve_keeps_saved_footprint() {
        let region = [3u8; 32];
        let base = unsafe { region.as_ptr().add(region.len()) };
        let mut backup = Backup::default();
        unsafe { backup.save(base, 32).unwrap() };

        backup.reserve(4096).unwrap();

        assert_eq!(backup.size(), 32);
        assert!(backup.capacity() >= 4096);
    }

    #[test]
    fn reports_exhaustion() {
        let mut backup = Backup::default();

        assert!(backup.reserve(usize::MAX).is_err());
    }
}
