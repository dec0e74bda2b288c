//! Cuckoo-hash directory over CoW-managed buckets
//!
//! Maps 64-bit keys to `(payload, slot)` pairs. Each key has two
//! candidate buckets; a bucket is a node block holding its payload ref
//! and a fixed number of key slots. Insertion displaces incumbents
//! bucket-to-bucket up to a bounded number of kicks, then doubles the
//! bucket count and reinserts. Mutations cow exactly the chain from the
//! owning block through the bucket-ref array and node to the payload,
//! so sibling buckets stay shared with committed images.
//!
//! Key slots store `(key << 1) | 1`: the caller hands `insert` the key
//! pre-shifted by one, and the directory keeps the low bit as its
//! occupancy marker (an empty slot is zero). Lookups take the key
//! unshifted. The shift makes keys effectively 63-bit.

use log::debug;
use snapstore_api::Result;
use snapstore_memory::{Array, Memory, Ref};

use crate::payload::PayloadMgr;

/// Key slots per bucket.
pub const BUCKET_CAPACITY: usize = 8;

/// Bucket count of a fresh directory. Always a power of two.
const INITIAL_BUCKETS: usize = 8;

/// Header words occupied by a directory within its owning block.
pub const HEADER_WORDS: usize = 3;

const H_BUCKET_COUNT: usize = 0;
const H_COUNT: usize = 1;
const H_BUCKETS: usize = 2;

/// Bucket node block: one payload ref followed by the key slots.
const fn node_bytes() -> usize {
    (1 + BUCKET_CAPACITY) * 8
}

fn bucket_1(key: u64, mask: u64) -> usize {
    ((key.wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 32) & mask) as usize
}

fn bucket_2(key: u64, mask: u64) -> usize {
    (((key ^ 0xFF51_AFD7_ED55_8CCD).wrapping_mul(0xC2B2_AE3D_27D4_EB4F) >> 32) & mask) as usize
}

/// Number of distinct candidate buckets for a pair of hashes.
fn probe_count(b1: usize, b2: usize) -> usize {
    if b1 == b2 { 1 } else { 2 }
}

/// One live row as seen by the directory iterator.
#[derive(Debug, Clone, Copy)]
pub struct Entry {
    /// The user key (unshifted).
    pub key: u64,
    /// The bucket's payload ref.
    pub payload: Ref,
    /// The row's slot within the payload.
    pub index: usize,
}

/// A directory view over the header words embedded in an owning block.
///
/// The directory holds no state of its own; `block` and `base` name
/// where its header lives. Mutating operations require the owning block
/// to be writable.
#[derive(Debug, Clone, Copy)]
pub struct Cuckoo {
    block: Ref,
    base: usize,
}

impl Cuckoo {
    /// Views the directory header at word `base` of `block`.
    pub const fn at(block: Ref, base: usize) -> Self {
        Self { block, base }
    }

    /// Constructs an empty directory. Buckets are materialized lazily;
    /// a fresh directory is the header plus a null-filled bucket array.
    pub fn init(&self, mem: &mut Memory) -> Result<()> {
        let buckets = Array::<u64>::alloc(mem, INITIAL_BUCKETS)?;
        self.set_hdr(mem, H_BUCKET_COUNT, INITIAL_BUCKETS as u64);
        self.set_hdr(mem, H_COUNT, 0);
        self.set_hdr(mem, H_BUCKETS, buckets.to_ref().raw());
        Ok(())
    }

    /// Number of live keys.
    pub fn len(&self, mem: &Memory) -> u64 {
        self.hdr(mem, H_COUNT)
    }

    /// True when no key is present.
    pub fn is_empty(&self, mem: &Memory) -> bool {
        self.len(mem) == 0
    }

    /// Looks a key up without touching anything.
    ///
    /// The returned payload mirrors the directory's writability: it is
    /// writable iff the bucket's path has already been cowed.
    pub fn find(&self, mem: &Memory, key: u64) -> Option<(Ref, usize)> {
        let (bucket, slot) = self.locate(mem, key)?;
        let node = Ref::new(self.buckets(mem).get(mem, bucket));
        Some((Ref::new(mem.word(node, 0)), slot))
    }

    /// Like [`Cuckoo::find`], but cows every node on the path to the
    /// hit bucket and the bucket's payload; the returned payload is
    /// guaranteed writable.
    pub fn find_and_cow_path(
        &self,
        mem: &mut Memory,
        pm: &mut dyn PayloadMgr,
        key: u64,
    ) -> Result<Option<(Ref, usize)>> {
        match self.locate(mem, key) {
            None => Ok(None),
            Some((bucket, slot)) => {
                let (_node, payload) = self.ensure_path(mem, pm, bucket)?;
                Ok(Some((payload, slot)))
            }
        }
    }

    /// Places the row currently in `pm`'s transient buffer under
    /// `key_shifted` (the user key shifted left by one). A key that is
    /// already present is overwritten in place.
    pub fn insert(
        &self,
        mem: &mut Memory,
        key_shifted: u64,
        pm: &mut dyn PayloadMgr,
    ) -> Result<()> {
        debug_assert_eq!(key_shifted & 1, 0);
        let key = key_shifted >> 1;
        if let Some((payload, slot)) = self.find_and_cow_path(mem, pm, key)? {
            pm.write_buffer(mem, payload, slot)?;
            return Ok(());
        }
        let mut stored = key_shifted | 1;
        while let Some(in_flight) = self.try_place(mem, pm, stored)? {
            stored = in_flight;
            self.grow(mem, pm)?;
        }
        let count = self.len(mem) + 1;
        self.set_hdr(mem, H_COUNT, count);
        Ok(())
    }

    /// Recursively commits every mutable node and payload into the file
    /// region. The header must live in a writable block (the table
    /// block under construction).
    pub fn copied_to_file(&self, mem: &mut Memory, pm: &mut dyn PayloadMgr) -> Result<()> {
        let buckets = self.buckets(mem);
        if !mem.is_writable(buckets.to_ref()) {
            // An immutable bucket array cannot reference mutable
            // children; the whole directory is already committed.
            return Ok(());
        }
        for bucket in 0..self.bucket_count(mem) {
            let node = Ref::new(buckets.get(mem, bucket));
            if node.is_null() || !mem.is_writable(node) {
                continue;
            }
            let payload = Ref::new(mem.word(node, 0));
            if !payload.is_null() {
                let committed = pm.commit(mem, payload)?;
                mem.set_word(node, 0, committed.raw());
            }
            let to = mem.alloc_in_file(node_bytes())?;
            mem.copy_block(node, to, node_bytes());
            mem.free(node, node_bytes());
            buckets.set(mem, bucket, to.raw());
        }
        let committed = Array::<u64>::commit(mem, buckets)?;
        self.set_hdr(mem, H_BUCKETS, committed.to_ref().raw());
        Ok(())
    }

    /// Iterates the live rows in bucket-then-slot order.
    pub fn entries<'a>(&self, mem: &'a Memory) -> Entries<'a> {
        Entries {
            mem,
            buckets: self.buckets(mem),
            bucket_count: self.bucket_count(mem),
            bucket: 0,
            slot: 0,
        }
    }

    fn hdr(&self, mem: &Memory, word: usize) -> u64 {
        mem.word(self.block, self.base + word)
    }

    fn set_hdr(&self, mem: &mut Memory, word: usize, value: u64) {
        mem.set_word(self.block, self.base + word, value);
    }

    fn buckets(&self, mem: &Memory) -> Array<u64> {
        Array::from_ref(Ref::new(self.hdr(mem, H_BUCKETS)))
    }

    fn bucket_count(&self, mem: &Memory) -> usize {
        self.hdr(mem, H_BUCKET_COUNT) as usize
    }

    /// Displacements tolerated before the directory grows.
    fn kick_limit(&self, mem: &Memory) -> usize {
        8 * (self.bucket_count(mem).trailing_zeros() as usize).max(1)
    }

    /// Finds the (bucket, slot) holding `key`, probing both candidates.
    fn locate(&self, mem: &Memory, key: u64) -> Option<(usize, usize)> {
        let stored = (key << 1) | 1;
        let buckets = self.buckets(mem);
        let mask = (self.bucket_count(mem) - 1) as u64;
        let (b1, b2) = (bucket_1(key, mask), bucket_2(key, mask));
        for &bucket in [b1, b2].iter().take(probe_count(b1, b2)) {
            let node = Ref::new(buckets.get(mem, bucket));
            if node.is_null() {
                continue;
            }
            for slot in 0..BUCKET_CAPACITY {
                if mem.word(node, 1 + slot) == stored {
                    return Some((bucket, slot));
                }
            }
        }
        None
    }

    /// First empty slot of `bucket`, if any. A missing node counts as
    /// an entirely empty bucket.
    fn empty_slot(&self, mem: &Memory, bucket: usize) -> Option<usize> {
        let node = Ref::new(self.buckets(mem).get(mem, bucket));
        if node.is_null() {
            return Some(0);
        }
        (0..BUCKET_CAPACITY).find(|&slot| mem.word(node, 1 + slot) == 0)
    }

    /// Cows the chain bucket-array -> node -> payload for `bucket`,
    /// materializing node and payload if the bucket is still empty.
    /// Returns the writable node and payload.
    fn ensure_path(
        &self,
        mem: &mut Memory,
        pm: &mut dyn PayloadMgr,
        bucket: usize,
    ) -> Result<(Ref, Ref)> {
        let mut buckets = self.buckets(mem);
        if !mem.is_writable(buckets.to_ref()) {
            buckets = buckets.cow(mem)?;
            self.set_hdr(mem, H_BUCKETS, buckets.to_ref().raw());
        }
        let mut node = Ref::new(buckets.get(mem, bucket));
        if node.is_null() {
            node = mem.alloc(node_bytes())?;
            let payload = pm.alloc_payload(mem, BUCKET_CAPACITY)?;
            mem.set_word(node, 0, payload.raw());
            buckets.set(mem, bucket, node.raw());
            return Ok((node, payload));
        }
        if !mem.is_writable(node) {
            let clone = mem.alloc(node_bytes())?;
            mem.copy_block(node, clone, node_bytes());
            buckets.set(mem, bucket, clone.raw());
            node = clone;
        }
        let mut payload = Ref::new(mem.word(node, 0));
        debug_assert!(!payload.is_null());
        pm.cow(mem, &mut payload, BUCKET_CAPACITY, BUCKET_CAPACITY)?;
        mem.set_word(node, 0, payload.raw());
        Ok((node, payload))
    }

    /// One placement attempt for the row in `pm`'s buffer under the
    /// stored key. Returns `None` when placed, or `Some(stored)` when
    /// the kick bound was exceeded with that row left in the buffer.
    fn try_place(
        &self,
        mem: &mut Memory,
        pm: &mut dyn PayloadMgr,
        mut stored: u64,
    ) -> Result<Option<u64>> {
        let limit = self.kick_limit(mem);
        let mut forbidden: Option<usize> = None;
        let mut kicks = 0;
        loop {
            let key = stored >> 1;
            let mask = (self.bucket_count(mem) - 1) as u64;
            let (b1, b2) = (bucket_1(key, mask), bucket_2(key, mask));
            for &bucket in [b1, b2].iter().take(probe_count(b1, b2)) {
                if Some(bucket) == forbidden {
                    continue;
                }
                if let Some(slot) = self.empty_slot(mem, bucket) {
                    let (node, payload) = self.ensure_path(mem, pm, bucket)?;
                    mem.set_word(node, 1 + slot, stored);
                    pm.write_buffer(mem, payload, slot)?;
                    return Ok(None);
                }
            }
            if kicks >= limit {
                return Ok(Some(stored));
            }
            // Kick a row out of the candidate we did not just come
            // from, so a displacement chain cannot immediately undo
            // itself.
            let target = if Some(b1) == forbidden { b2 } else { b1 };
            let victim = kicks % BUCKET_CAPACITY;
            let (node, payload) = self.ensure_path(mem, pm, target)?;
            let displaced = mem.word(node, 1 + victim);
            debug_assert_eq!(displaced & 1, 1);
            mem.set_word(node, 1 + victim, stored);
            pm.swap_buffer(mem, payload, victim)?;
            stored = displaced;
            forbidden = Some(target);
            kicks += 1;
        }
    }

    /// Doubles the bucket count (repeatedly, if needed) and reinserts
    /// every row. The in-flight row in `pm`'s buffer is parked in a
    /// one-slot scratch payload across the rebuild.
    fn grow(&self, mem: &mut Memory, pm: &mut dyn PayloadMgr) -> Result<()> {
        let scratch = pm.alloc_payload(mem, 1)?;
        if let Err(e) = pm.write_buffer(mem, scratch, 0) {
            pm.free(mem, scratch, 1);
            return Err(e);
        }

        let old_buckets = self.buckets(mem);
        let old_count = self.bucket_count(mem);
        let mut new_count = old_count * 2;
        loop {
            match self.rebuild(mem, pm, old_buckets, old_count, new_count) {
                Ok(true) => break,
                Ok(false) => new_count *= 2,
                Err(e) => {
                    // The parked row goes back to the buffer only on
                    // success; here the scratch is released and the
                    // error surfaced with the old directory intact.
                    pm.free(mem, scratch, 1);
                    return Err(e);
                }
            }
        }
        debug!("directory grown from {} to {} buckets", old_count, new_count);

        pm.read_buffer(mem, scratch, 0);
        pm.free(mem, scratch, 1);
        Ok(())
    }

    /// Attempts one rebuild at `new_count` buckets. On success the new
    /// structure is installed and the old one freed; on overflow the
    /// partial new structure is torn down, the old one reinstalled, and
    /// `false` returned. On allocation failure the old structure is
    /// likewise reinstalled before the error surfaces, with the
    /// half-built replacement left to the slab. The old structure is
    /// only read, so every failed attempt leaves it fully intact.
    fn rebuild(
        &self,
        mem: &mut Memory,
        pm: &mut dyn PayloadMgr,
        old_buckets: Array<u64>,
        old_count: usize,
        new_count: usize,
    ) -> Result<bool> {
        let new_buckets = Array::<u64>::alloc(mem, new_count)?;
        self.set_hdr(mem, H_BUCKET_COUNT, new_count as u64);
        self.set_hdr(mem, H_BUCKETS, new_buckets.to_ref().raw());

        for bucket in 0..old_count {
            let node = Ref::new(old_buckets.get(mem, bucket));
            if node.is_null() {
                continue;
            }
            let payload = Ref::new(mem.word(node, 0));
            for slot in 0..BUCKET_CAPACITY {
                let stored = mem.word(node, 1 + slot);
                if stored == 0 {
                    continue;
                }
                pm.read_buffer(mem, payload, slot);
                match self.try_place(mem, pm, stored) {
                    Ok(None) => {}
                    Ok(Some(_)) => {
                        // The buffered row is a copy of one still in
                        // the old structure; dropping it loses nothing.
                        self.teardown(mem, pm);
                        self.set_hdr(mem, H_BUCKET_COUNT, old_count as u64);
                        self.set_hdr(mem, H_BUCKETS, old_buckets.to_ref().raw());
                        return Ok(false);
                    }
                    Err(e) => {
                        // Allocation failure mid-migration: repoint the
                        // header at the still-intact old structure
                        // before surfacing the error. The half-built
                        // replacement may have stopped partway through
                        // a block, so it is left to the slab instead of
                        // being torn down block by block.
                        self.set_hdr(mem, H_BUCKET_COUNT, old_count as u64);
                        self.set_hdr(mem, H_BUCKETS, old_buckets.to_ref().raw());
                        return Err(e);
                    }
                }
            }
        }

        for bucket in 0..old_count {
            let node = Ref::new(old_buckets.get(mem, bucket));
            if node.is_null() {
                continue;
            }
            let payload = Ref::new(mem.word(node, 0));
            pm.free(mem, payload, BUCKET_CAPACITY);
            if mem.is_writable(node) {
                mem.free(node, node_bytes());
            }
        }
        if mem.is_writable(old_buckets.to_ref()) {
            old_buckets.free(mem);
        }
        Ok(true)
    }

    /// Frees the currently installed bucket structure. Only called on a
    /// freshly built (fully mutable) structure.
    fn teardown(&self, mem: &mut Memory, pm: &mut dyn PayloadMgr) {
        let buckets = self.buckets(mem);
        for bucket in 0..self.bucket_count(mem) {
            let node = Ref::new(buckets.get(mem, bucket));
            if node.is_null() {
                continue;
            }
            let payload = Ref::new(mem.word(node, 0));
            pm.free(mem, payload, BUCKET_CAPACITY);
            mem.free(node, node_bytes());
        }
        buckets.free(mem);
    }
}

/// Iterator over a directory's live rows.
pub struct Entries<'a> {
    mem: &'a Memory,
    buckets: Array<u64>,
    bucket_count: usize,
    bucket: usize,
    slot: usize,
}

impl Iterator for Entries<'_> {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        while self.bucket < self.bucket_count {
            let node = Ref::new(self.buckets.get(self.mem, self.bucket));
            if node.is_null() {
                self.bucket += 1;
                self.slot = 0;
                continue;
            }
            while self.slot < BUCKET_CAPACITY {
                let stored = self.mem.word(node, 1 + self.slot);
                self.slot += 1;
                if stored != 0 {
                    return Some(Entry {
                        key: stored >> 1,
                        payload: Ref::new(self.mem.word(node, 0)),
                        index: self.slot - 1,
                    });
                }
            }
            self.bucket += 1;
            self.slot = 0;
        }
        None
    }
}
