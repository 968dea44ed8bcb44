//! IR nodes.
//!
//! Every entry in the builder's list is a [`Node`]: a shared header
//! (links, flags, position, pass data, inline comment) plus a tagged
//! payload in [`NodeKind`]. Higher layers dispatch either on the
//! structural tag or on the capability flags `ACTS_AS_INST` /
//! `ACTS_AS_LABEL`, which let future node kinds that wrap an instruction
//! or a label flow through the serializer without being enumerated there.

use smallvec::SmallVec;

use crate::arena::{Id, Span};
use crate::operand::{Label, Operand, OperandKind};

/// Identifier of a node inside the builder's node arena.
pub type NodeId = Id<Node>;

/// Operand slots embedded in every instruction node.
pub const BASE_OP_CAPACITY: usize = 4;

/// Operand slots of the extended instruction form.
pub const EXT_OP_CAPACITY: usize = 6;

/// Largest data payload stored inline in a data node.
pub const INLINE_DATA_CAPACITY: usize = 24;

// =============================================================================
// Node Type & Flags
// =============================================================================

/// Structural tag of a node.
///
/// Values 16 and up are reserved for compiler-level nodes built on top of
/// this layer (functions, calls, returns).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeType {
    None = 0,
    Inst = 1,
    Data = 2,
    Align = 3,
    Label = 4,
    LabelData = 5,
    ConstPool = 6,
    Comment = 7,
    Sentinel = 8,
}

/// Node capability flags, independent of the structural tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeFlags(u8);

impl NodeFlags {
    /// No flags.
    pub const NONE: NodeFlags = NodeFlags(0);
    /// Node is code that can be executed.
    pub const IS_CODE: NodeFlags = NodeFlags(0x01);
    /// Node is data that cannot be executed.
    pub const IS_DATA: NodeFlags = NodeFlags(0x02);
    /// Node is informative only and is never encoded.
    pub const IS_INFORMATIVE: NodeFlags = NodeFlags(0x04);
    /// Node can be safely removed if unreachable.
    pub const IS_REMOVABLE: NodeFlags = NodeFlags(0x08);
    /// Node does nothing when executed (label, align, nop).
    pub const HAS_NO_EFFECT: NodeFlags = NodeFlags(0x10);
    /// Node is an instruction or acts as one.
    pub const ACTS_AS_INST: NodeFlags = NodeFlags(0x40);
    /// Node is a label or acts as one.
    pub const ACTS_AS_LABEL: NodeFlags = NodeFlags(0x80);

    /// Raw bits.
    #[inline(always)]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Union of two flag sets.
    #[inline(always)]
    pub const fn union(self, other: NodeFlags) -> NodeFlags {
        NodeFlags(self.0 | other.0)
    }

    /// Check if all bits of `other` are set.
    #[inline(always)]
    pub const fn contains(self, other: NodeFlags) -> bool {
        (self.0 & other.0) == other.0
    }
}

/// Alignment directive mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlignMode {
    /// Align code, fill with nops.
    Code = 0,
    /// Align data, fill with zeros.
    Data = 1,
    /// Align and explicitly zero the gap.
    Zero = 2,
}

// =============================================================================
// Instruction Options
// =============================================================================

/// Per-instruction option bits.
///
/// `OP4`/`OP5`/`OP_EXTRA` mark the presence of side-band operands supplied
/// through the emitter state. `STRICT_VALIDATION` is consumed by `emit` and
/// never stored on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstOptions(u32);

impl InstOptions {
    /// No options.
    pub const NONE: InstOptions = InstOptions(0);
    /// Validate the instruction before emitting it.
    pub const STRICT_VALIDATION: InstOptions = InstOptions(0x0000_0001);
    /// A 5th operand (index 4) is supplied side-band.
    pub const OP4: InstOptions = InstOptions(0x0000_0002);
    /// A 6th operand (index 5) is supplied side-band.
    pub const OP5: InstOptions = InstOptions(0x0000_0004);
    /// An extra operand (REP register, AVX-512 op-mask) is supplied side-band.
    pub const OP_EXTRA: InstOptions = InstOptions(0x0000_0008);
    /// LOCK prefix.
    pub const LOCK: InstOptions = InstOptions(0x0000_0010);
    /// REP/REPE prefix.
    pub const REP: InstOptions = InstOptions(0x0000_0020);
    /// REPNE prefix.
    pub const REPNE: InstOptions = InstOptions(0x0000_0040);

    /// Option bits stripped before the options are stored on a node.
    pub const INTERNAL: InstOptions = Self::STRICT_VALIDATION;

    /// Raw bits.
    #[inline(always)]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Union of two option sets.
    #[inline(always)]
    pub const fn union(self, other: InstOptions) -> InstOptions {
        InstOptions(self.0 | other.0)
    }

    /// Remove the bits of `other`.
    #[inline(always)]
    pub const fn without(self, other: InstOptions) -> InstOptions {
        InstOptions(self.0 & !other.0)
    }

    /// Check if any bit of `other` is set.
    #[inline(always)]
    pub const fn intersects(self, other: InstOptions) -> bool {
        (self.0 & other.0) != 0
    }
}

// =============================================================================
// Instruction Payload
// =============================================================================

/// Instruction payload of a node.
///
/// The operand array has a fixed capacity chosen at allocation time: the
/// base form keeps [`BASE_OP_CAPACITY`] operands inline in the node, the
/// extended form spills to hold up to [`EXT_OP_CAPACITY`]. Capacity never
/// changes afterwards; the operand count may grow up to it. Slots past the
/// count always hold [`Operand::None`].
#[derive(Debug, Clone)]
pub struct InstData {
    inst_id: u32,
    options: InstOptions,
    op_extra: Operand,
    op_count: u8,
    ops: SmallVec<[Operand; BASE_OP_CAPACITY]>,
}

impl InstData {
    /// Capacity for a given operand count: base if it fits, extended otherwise.
    #[inline]
    pub const fn capacity_of_op_count(op_count: usize) -> usize {
        if op_count <= BASE_OP_CAPACITY {
            BASE_OP_CAPACITY
        } else {
            EXT_OP_CAPACITY
        }
    }

    /// Create an instruction payload with all `capacity` slots reset.
    pub fn new(inst_id: u32, options: InstOptions, capacity: usize) -> Self {
        debug_assert!(capacity >= BASE_OP_CAPACITY && capacity <= EXT_OP_CAPACITY);
        InstData {
            inst_id,
            options,
            op_extra: Operand::None,
            op_count: 0,
            ops: SmallVec::from_elem(Operand::None, capacity),
        }
    }

    /// Get the instruction id.
    #[inline]
    pub fn inst_id(&self) -> u32 {
        self.inst_id
    }

    /// Replace the instruction id.
    #[inline]
    pub fn set_inst_id(&mut self, inst_id: u32) {
        self.inst_id = inst_id;
    }

    /// Get the instruction options.
    #[inline]
    pub fn options(&self) -> InstOptions {
        self.options
    }

    /// Replace the instruction options.
    #[inline]
    pub fn set_options(&mut self, options: InstOptions) {
        self.options = options;
    }

    /// Get the extra operand (REP register or op-mask selector).
    #[inline]
    pub fn op_extra(&self) -> Operand {
        self.op_extra
    }

    /// Set the extra operand.
    #[inline]
    pub fn set_op_extra(&mut self, op: Operand) {
        self.op_extra = op;
    }

    /// Number of used operand slots.
    #[inline]
    pub fn op_count(&self) -> usize {
        self.op_count as usize
    }

    /// Set the number of used operand slots, up to the capacity.
    #[inline]
    pub fn set_op_count(&mut self, op_count: usize) {
        debug_assert!(op_count <= self.op_capacity());
        self.op_count = op_count as u8;
    }

    /// Total operand slots of this node, fixed at allocation time.
    #[inline]
    pub fn op_capacity(&self) -> usize {
        self.ops.len()
    }

    /// Get operand `index`.
    #[inline]
    pub fn op(&self, index: usize) -> Operand {
        self.ops[index]
    }

    /// Set operand `index`.
    #[inline]
    pub fn set_op(&mut self, index: usize, op: Operand) {
        self.ops[index] = op;
    }

    /// Reset operand `index` to the none state.
    #[inline]
    pub fn reset_op(&mut self, index: usize) {
        self.ops[index] = Operand::None;
    }

    /// Used operand slots as a slice.
    #[inline]
    pub fn ops(&self) -> &[Operand] {
        &self.ops[..self.op_count as usize]
    }

    /// Check if any used operand has the given kind.
    pub fn has_op_kind(&self, kind: OperandKind) -> bool {
        self.ops().iter().any(|op| op.kind() == kind)
    }

    /// Check if the instruction references memory.
    #[inline]
    pub fn has_mem_op(&self) -> bool {
        self.has_op_kind(OperandKind::Mem)
    }
}

// =============================================================================
// Other Payloads
// =============================================================================

/// Payload of a data node: raw bytes placed verbatim in the stream.
///
/// Small payloads are embedded in the node; larger ones live in the
/// builder's data arena.
#[derive(Debug, Clone)]
pub enum DataBody {
    /// Bytes embedded directly in the node.
    Inline {
        len: u8,
        bytes: [u8; INLINE_DATA_CAPACITY],
    },
    /// Bytes stored in the data arena.
    Arena(Span),
}

/// Payload of a label node.
#[derive(Debug, Clone)]
pub struct LabelBody {
    /// Label id assigned by the code container.
    pub label: Label,
    /// Back-reference to a register-allocator block, if any.
    pub block: Option<u32>,
}

/// Payload of a const-pool node: a label plus the owned pool.
#[derive(Debug, Clone)]
pub struct ConstPoolBody {
    /// Label bound to the pool's position.
    pub label: Label,
    /// The constant pool itself.
    pub pool: crate::constpool::ConstPool,
}

/// Tagged node payload.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Machine instruction.
    Inst(InstData),
    /// Raw data bytes.
    Data(DataBody),
    /// Alignment directive.
    Align { mode: AlignMode, alignment: u32 },
    /// Label definition.
    Label(LabelBody),
    /// Address of a label embedded as data.
    LabelData { label: Label },
    /// Constant pool bound to a label.
    ConstPool(ConstPoolBody),
    /// Standalone comment; the text lives in the node header.
    Comment,
    /// Pure position marker, ignored by every pass.
    Sentinel,
}

// =============================================================================
// Node
// =============================================================================

/// A single entry of the builder's node list.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) prev: NodeId,
    pub(crate) next: NodeId,
    flags: NodeFlags,
    position: u32,
    pass_data: u32,
    comment: Option<Span>,
    kind: NodeKind,
}

/// Sentinel for "no pass data attached".
pub const PASS_DATA_NONE: u32 = u32::MAX;

impl Node {
    /// Create an unlinked node with the default flags of its kind.
    pub fn new(kind: NodeKind, extra_flags: NodeFlags) -> Self {
        let flags = match kind {
            NodeKind::Inst(_) => NodeFlags::IS_CODE
                .union(NodeFlags::IS_REMOVABLE)
                .union(NodeFlags::ACTS_AS_INST),
            NodeKind::Data(_) => NodeFlags::IS_DATA,
            NodeKind::Align { .. } => NodeFlags::IS_CODE.union(NodeFlags::HAS_NO_EFFECT),
            NodeKind::Label(_) => NodeFlags::HAS_NO_EFFECT.union(NodeFlags::ACTS_AS_LABEL),
            NodeKind::LabelData { .. } => NodeFlags::IS_DATA,
            NodeKind::ConstPool(_) => NodeFlags::IS_DATA.union(NodeFlags::ACTS_AS_LABEL),
            NodeKind::Comment => NodeFlags::IS_INFORMATIVE
                .union(NodeFlags::HAS_NO_EFFECT)
                .union(NodeFlags::IS_REMOVABLE),
            NodeKind::Sentinel => NodeFlags::IS_INFORMATIVE.union(NodeFlags::HAS_NO_EFFECT),
        };
        Node {
            prev: NodeId::INVALID,
            next: NodeId::INVALID,
            flags: flags.union(extra_flags),
            position: 0,
            pass_data: PASS_DATA_NONE,
            comment: None,
            kind,
        }
    }

    /// Previous node in the list.
    #[inline]
    pub fn prev(&self) -> Option<NodeId> {
        self.prev.ok()
    }

    /// Next node in the list.
    #[inline]
    pub fn next(&self) -> Option<NodeId> {
        self.next.ok()
    }

    /// Check if the node is currently linked into a list.
    #[inline]
    pub(crate) fn is_linked(&self) -> bool {
        self.prev.is_valid() || self.next.is_valid()
    }

    /// Structural tag of the node.
    pub fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Inst(_) => NodeType::Inst,
            NodeKind::Data(_) => NodeType::Data,
            NodeKind::Align { .. } => NodeType::Align,
            NodeKind::Label(_) => NodeType::Label,
            NodeKind::LabelData { .. } => NodeType::LabelData,
            NodeKind::ConstPool(_) => NodeType::ConstPool,
            NodeKind::Comment => NodeType::Comment,
            NodeKind::Sentinel => NodeType::Sentinel,
        }
    }

    /// Node payload.
    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Node payload, mutable.
    #[inline]
    pub fn kind_mut(&mut self) -> &mut NodeKind {
        &mut self.kind
    }

    /// Node flags.
    #[inline]
    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    /// Check if the node has all of `flags` set.
    #[inline]
    pub fn has_flags(&self, flags: NodeFlags) -> bool {
        self.flags.contains(flags)
    }

    /// Node is executable code.
    #[inline]
    pub fn is_code(&self) -> bool {
        self.has_flags(NodeFlags::IS_CODE)
    }

    /// Node is non-executable data.
    #[inline]
    pub fn is_data(&self) -> bool {
        self.has_flags(NodeFlags::IS_DATA)
    }

    /// Node is informative only.
    #[inline]
    pub fn is_informative(&self) -> bool {
        self.has_flags(NodeFlags::IS_INFORMATIVE)
    }

    /// Node can be removed when unreachable.
    #[inline]
    pub fn is_removable(&self) -> bool {
        self.has_flags(NodeFlags::IS_REMOVABLE)
    }

    /// Node does nothing when executed.
    #[inline]
    pub fn has_no_effect(&self) -> bool {
        self.has_flags(NodeFlags::HAS_NO_EFFECT)
    }

    /// Node is an instruction or acts as one.
    #[inline]
    pub fn acts_as_inst(&self) -> bool {
        self.has_flags(NodeFlags::ACTS_AS_INST)
    }

    /// Node is a label or acts as one.
    #[inline]
    pub fn acts_as_label(&self) -> bool {
        self.has_flags(NodeFlags::ACTS_AS_LABEL)
    }

    /// Node position; 0 means unset.
    #[inline]
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Set the node position.
    #[inline]
    pub fn set_position(&mut self, position: u32) {
        self.position = position;
    }

    /// Per-pass scratch value, if attached.
    #[inline]
    pub fn pass_data(&self) -> Option<u32> {
        if self.pass_data == PASS_DATA_NONE {
            None
        } else {
            Some(self.pass_data)
        }
    }

    /// Attach a per-pass scratch value.
    #[inline]
    pub fn set_pass_data(&mut self, data: u32) {
        self.pass_data = data;
    }

    /// Detach the per-pass scratch value.
    #[inline]
    pub fn reset_pass_data(&mut self) {
        self.pass_data = PASS_DATA_NONE;
    }

    /// Inline comment attached to the node, as a data-arena span.
    #[inline]
    pub fn inline_comment(&self) -> Option<Span> {
        self.comment
    }

    /// Attach an inline comment span.
    #[inline]
    pub fn set_inline_comment(&mut self, span: Option<Span>) {
        self.comment = span;
    }

    /// Instruction payload, if this node carries one.
    #[inline]
    pub fn as_inst(&self) -> Option<&InstData> {
        match &self.kind {
            NodeKind::Inst(inst) => Some(inst),
            _ => None,
        }
    }

    /// Instruction payload, mutable.
    #[inline]
    pub fn as_inst_mut(&mut self) -> Option<&mut InstData> {
        match &mut self.kind {
            NodeKind::Inst(inst) => Some(inst),
            _ => None,
        }
    }

    /// Label payload, if this node carries one.
    #[inline]
    pub fn as_label(&self) -> Option<&LabelBody> {
        match &self.kind {
            NodeKind::Label(label) => Some(label),
            _ => None,
        }
    }

    /// Label id this node binds, for plain labels and const pools alike.
    pub fn label_id(&self) -> Option<Label> {
        match &self.kind {
            NodeKind::Label(body) => Some(body.label),
            NodeKind::ConstPool(body) => Some(body.label),
            _ => None,
        }
    }

    /// Set the bound label id, for plain labels and const pools alike.
    pub(crate) fn set_label_id(&mut self, label: Label) {
        match &mut self.kind {
            NodeKind::Label(body) => body.label = label,
            NodeKind::ConstPool(body) => body.label = label,
            _ => {}
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
