//! Pass framework.
//!
//! A pass is a named transformation over the builder's node list. Passes are
//! registered on the builder and executed in insertion order by
//! [`crate::Builder::run_passes`]; each run receives the builder plus a
//! [`Scratch`] whose buffers are cleared before every pass and whose
//! capacity is reused across passes.

use crate::builder::Builder;
use crate::error::Error;
use crate::node::NodeId;

/// A transformation over the builder's node list.
///
/// Passes may mutate the list freely through the builder's editing
/// operations. Returning an error halts [`crate::Builder::run_passes`] and
/// becomes the builder's sticky last error.
pub trait Pass {
    /// Name used for lookup and diagnostics.
    fn name(&self) -> &'static str;

    /// Process the code stored in `cb`.
    ///
    /// All transient allocations should go through `scratch`; it is reset
    /// before this call and its storage is recycled for the next pass.
    fn run(&mut self, cb: &mut Builder, scratch: &mut Scratch) -> Result<(), Error>;
}

/// Per-pass transient storage.
///
/// Equivalent of a scratch zone: buffers grow while a pass runs, are
/// cleared between passes, and keep their capacity for the whole builder
/// session.
#[derive(Debug, Default)]
pub struct Scratch {
    /// Node work list / stack.
    pub nodes: Vec<NodeId>,
    /// Raw byte scratch.
    pub bytes: Vec<u8>,
}

impl Scratch {
    /// Clear all buffers, keeping capacity.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.bytes.clear();
    }
}
