//! Payload policy interface for the directory

use snapstore_api::Result;
use snapstore_memory::{Memory, Ref};

/// The policy object through which the cuckoo directory manages its
/// per-bucket payloads without knowing their layout.
///
/// The directory sees payload refs only; every read, write, clone and
/// commit of payload contents goes through this trait. Implementations
/// carry a transient one-row buffer that shuttles a row through a
/// displacement chain without allocating.
pub trait PayloadMgr {
    /// Zeroes the transient row buffer, seeding an empty row.
    fn init_buffer(&mut self);

    /// Loads row `index` of `payload` into the transient buffer.
    fn read_buffer(&mut self, mem: &Memory, payload: Ref, index: usize);

    /// Stores the transient buffer into row `index` of `payload`, which
    /// must be writable.
    fn write_buffer(&mut self, mem: &mut Memory, payload: Ref, index: usize) -> Result<()>;

    /// Exchanges the transient buffer with row `index` of `payload` in
    /// one pass: the new row goes in, the displaced row comes out. The
    /// payload must be writable.
    fn swap_buffer(&mut self, mem: &mut Memory, payload: Ref, index: usize) -> Result<()>;

    /// Allocates an empty payload with `capacity` row slots.
    fn alloc_payload(&mut self, mem: &mut Memory, capacity: usize) -> Result<Ref>;

    /// Makes `payload` writable, replacing it with a mutable clone when
    /// it is shared with a committed image. A no-op when the payload is
    /// already writable and the capacity is unchanged.
    fn cow(
        &mut self,
        mem: &mut Memory,
        payload: &mut Ref,
        old_capacity: usize,
        new_capacity: usize,
    ) -> Result<()>;

    /// Releases a payload and everything it owns. Immutable payloads
    /// are skipped; they belong to committed images.
    fn free(&mut self, mem: &mut Memory, payload: Ref, capacity: usize);

    /// Moves a mutable payload into the file region, returning the new
    /// ref; an immutable payload is returned unchanged.
    fn commit(&mut self, mem: &mut Memory, from: Ref) -> Result<Ref>;
}
