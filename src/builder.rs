//! The machine-code builder.
//!
//! [`Builder`] records emitted instructions and directives as nodes in a
//! doubly linked list instead of encoding them right away. The list can be
//! walked, edited through a cursor, and rewritten by passes before
//! [`Builder::serialize`] replays it into a downstream [`CodeEmitter`].
//!
//! # Storage
//!
//! - Nodes live in a typed arena and are addressed by [`NodeId`]
//! - Duplicated strings and large data blobs live in a data arena
//! - Passes get a scratch buffer that is cleared between runs
//!
//! All three reset together when the builder resets; nothing is freed
//! individually.
//!
//! # Errors
//!
//! Every fallible operation returns a `Result`, and the first emission
//! error is additionally recorded as the sticky *last error*: once set,
//! every subsequent emission short-circuits with it until
//! [`Builder::clear_last_error`] or [`Builder::reset`].

use std::fmt;

use crate::arena::{Arena, DataArena, Span};
use crate::code::{CodeContainer, LabelKind};
use crate::constpool::ConstPool;
use crate::emitter::{CodeEmitter, Validator};
use crate::error::Error;
use crate::node::{
    AlignMode, ConstPoolBody, DataBody, InstData, InstOptions, LabelBody, Node, NodeFlags, NodeId,
    NodeKind, INLINE_DATA_CAPACITY,
};
use crate::operand::{Label, Operand};
use crate::pass::{Pass, Scratch};

// =============================================================================
// Emit State
// =============================================================================

/// One-shot side-band state consumed by the next `emit`.
#[derive(Debug, Default)]
struct EmitState {
    options: InstOptions,
    inline_comment: Option<Span>,
    op_extra: Operand,
    op4: Operand,
    op5: Operand,
}

impl EmitState {
    /// Clear the state that applies to a single instruction.
    fn reset_one_shot(&mut self) {
        self.options = InstOptions::NONE;
        self.inline_comment = None;
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Records emission calls as an editable node list.
#[derive(Default)]
pub struct Builder {
    nodes: Arena<Node>,
    data: DataArena,
    scratch: Scratch,
    code: CodeContainer,

    first: NodeId,
    last: NodeId,
    cursor: NodeId,

    /// Dense label index -> label node. `INVALID` marks an id allocated in
    /// the container whose node has not been materialized yet.
    labels: Vec<NodeId>,

    passes: Vec<Box<dyn Pass>>,
    validator: Option<Box<dyn Validator>>,

    state: EmitState,
    node_flags: NodeFlags,
    last_error: Option<Error>,
}

impl Builder {
    /// Create an empty builder with a fresh code container.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The owning code container.
    #[inline]
    pub fn code(&self) -> &CodeContainer {
        &self.code
    }

    /// The owning code container, mutable.
    ///
    /// Label ids allocated directly on the container are materialized as
    /// nodes lazily, on the first [`Builder::label_node`] or
    /// [`Builder::bind`] that references them.
    #[inline]
    pub fn code_mut(&mut self) -> &mut CodeContainer {
        &mut self.code
    }

    /// Data arena holding duplicated strings and large data payloads.
    #[inline]
    pub fn data_arena(&self) -> &DataArena {
        &self.data
    }

    /// Get a node by id.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Get a node by id, mutable.
    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    /// First node of the list.
    #[inline]
    pub fn first_node(&self) -> Option<NodeId> {
        self.first.ok()
    }

    /// Last node of the list.
    #[inline]
    pub fn last_node(&self) -> Option<NodeId> {
        self.last.ok()
    }

    /// Current insertion point; `None` means insert at the front.
    #[inline]
    pub fn cursor(&self) -> Option<NodeId> {
        self.cursor.ok()
    }

    /// Move the insertion point and return the previous one.
    pub fn set_cursor(&mut self, node: Option<NodeId>) -> Option<NodeId> {
        let old = self.cursor.ok();
        self.cursor = node.unwrap_or(NodeId::INVALID);
        old
    }

    /// Iterate over the node list in order.
    pub fn iter(&self) -> NodeIter<'_> {
        NodeIter {
            builder: self,
            node: self.first.ok(),
        }
    }

    /// Flags or-ed into every newly created node.
    #[inline]
    pub fn node_flags(&self) -> NodeFlags {
        self.node_flags
    }

    /// Set the flags or-ed into every newly created node.
    #[inline]
    pub fn set_node_flags(&mut self, flags: NodeFlags) {
        self.node_flags = flags;
    }

    /// Label table: dense label index -> label node, `INVALID` if the id
    /// has no materialized node yet.
    #[inline]
    pub fn label_nodes(&self) -> &[NodeId] {
        &self.labels
    }

    /// Install a strict validator consulted under
    /// [`InstOptions::STRICT_VALIDATION`].
    pub fn set_validator(&mut self, validator: Box<dyn Validator>) {
        self.validator = Some(validator);
    }

    // =========================================================================
    // Error State
    // =========================================================================

    /// The sticky last error, if any.
    #[inline]
    pub fn last_error(&self) -> Option<Error> {
        self.last_error
    }

    /// Clear the sticky last error.
    pub fn clear_last_error(&mut self) {
        self.last_error = None;
    }

    fn set_last_error(&mut self, err: Error) -> Error {
        if self.last_error.is_none() {
            self.last_error = Some(err);
        }
        err
    }

    /// Release everything: nodes, data, labels, passes, emit state, and the
    /// code container. Arena capacity is retained.
    pub fn reset(&mut self) {
        self.nodes.reset();
        self.data.reset();
        self.scratch.reset();
        self.code.reset();
        self.labels.clear();
        self.passes.clear();
        self.first = NodeId::INVALID;
        self.last = NodeId::INVALID;
        self.cursor = NodeId::INVALID;
        self.state = EmitState::default();
        self.node_flags = NodeFlags::NONE;
        self.last_error = None;
    }

    // =========================================================================
    // Node Factory
    // =========================================================================

    fn alloc_node(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.alloc(Node::new(kind, self.node_flags))
    }

    /// Create an unlinked instruction node.
    pub fn new_inst_node(&mut self, inst_id: u32, ops: &[Operand]) -> NodeId {
        let capacity = InstData::capacity_of_op_count(ops.len());
        let mut inst = InstData::new(inst_id, InstOptions::NONE, capacity);
        for (i, op) in ops.iter().enumerate() {
            inst.set_op(i, *op);
        }
        inst.set_op_count(ops.len());
        self.alloc_node(NodeKind::Inst(inst))
    }

    /// Create an unlinked alignment node.
    pub fn new_align_node(&mut self, mode: AlignMode, alignment: u32) -> NodeId {
        self.alloc_node(NodeKind::Align { mode, alignment })
    }

    /// Create an unlinked data node, spilling large payloads to the data
    /// arena.
    pub fn new_data_node(&mut self, data: &[u8]) -> NodeId {
        let body = if data.len() <= INLINE_DATA_CAPACITY {
            let mut bytes = [0u8; INLINE_DATA_CAPACITY];
            bytes[..data.len()].copy_from_slice(data);
            DataBody::Inline {
                len: data.len() as u8,
                bytes,
            }
        } else {
            DataBody::Arena(self.data.alloc(data))
        };
        self.alloc_node(NodeKind::Data(body))
    }

    /// Create an unlinked comment node; the text is duplicated into the
    /// data arena.
    pub fn new_comment_node(&mut self, text: &str) -> NodeId {
        let span = self.data.dup_str(text);
        let node = self.alloc_node(NodeKind::Comment);
        self.nodes[node].set_inline_comment(Some(span));
        node
    }

    /// Create an unlinked sentinel node.
    pub fn new_sentinel_node(&mut self) -> NodeId {
        self.alloc_node(NodeKind::Sentinel)
    }

    /// Create an unlinked const-pool node registered as a label.
    pub fn new_const_pool(&mut self) -> Result<NodeId, Error> {
        if let Some(err) = self.last_error {
            return Err(err);
        }
        let node = self.alloc_node(NodeKind::ConstPool(ConstPoolBody {
            label: Label::INVALID,
            pool: ConstPool::new(),
        }));
        self.register_label_node(node);
        Ok(node)
    }

    /// Bytes of a data node, resolving an arena spill.
    pub fn data_of(&self, id: NodeId) -> Option<&[u8]> {
        match self.nodes[id].kind() {
            NodeKind::Data(DataBody::Inline { len, bytes }) => Some(&bytes[..*len as usize]),
            NodeKind::Data(DataBody::Arena(span)) => Some(self.data.bytes(*span)),
            _ => None,
        }
    }

    /// Inline comment text of a node.
    pub fn comment_of(&self, id: NodeId) -> Option<&str> {
        self.nodes[id].inline_comment().map(|span| self.data.str(span))
    }

    // =========================================================================
    // Labels
    // =========================================================================

    /// Register `node` under a freshly allocated container id.
    fn register_label_node(&mut self, node: NodeId) -> Label {
        let label = self.code.new_label_id();
        // The id was just allocated, so it lands at the end of the table.
        debug_assert_eq!(
            self.code.unpack_id(label.id()),
            Some(self.labels.len() as u32)
        );
        self.labels.push(node);
        self.nodes[node].set_label_id(label);
        label
    }

    /// Allocate a fresh label and its (unbound) node.
    ///
    /// Returns [`Label::INVALID`] if the builder is in an error state.
    pub fn new_label(&mut self) -> Label {
        if self.last_error.is_some() {
            return Label::INVALID;
        }
        let node = self.alloc_node(NodeKind::Label(LabelBody {
            label: Label::INVALID,
            block: None,
        }));
        self.register_label_node(node)
    }

    /// Allocate a fresh named label and its (unbound) node.
    ///
    /// The container-assigned id wins; name clashes become the sticky last
    /// error and return [`Label::INVALID`].
    pub fn new_named_label(
        &mut self,
        name: &str,
        kind: LabelKind,
        parent: Option<Label>,
    ) -> Label {
        if self.last_error.is_some() {
            return Label::INVALID;
        }
        let label = match self.code.new_named_label_id(name, kind, parent) {
            Ok(label) => label,
            Err(err) => {
                self.set_last_error(err);
                return Label::INVALID;
            }
        };
        let node = self.alloc_node(NodeKind::Label(LabelBody {
            label,
            block: None,
        }));
        debug_assert_eq!(
            self.code.unpack_id(label.id()),
            Some(self.labels.len() as u32)
        );
        self.labels.push(node);
        label
    }

    /// Resolve the node registered for `label`, materializing it if the id
    /// was allocated directly on the container.
    pub fn label_node(&mut self, label: Label) -> Result<NodeId, Error> {
        if let Some(err) = self.last_error {
            return Err(err);
        }
        let index = self
            .code
            .unpack_id(label.id())
            .ok_or(Error::InvalidLabel)? as usize;

        if index >= self.labels.len() {
            self.labels.resize(index + 1, NodeId::INVALID);
        }
        let mut node = self.labels[index];
        if !node.is_valid() {
            node = self.alloc_node(NodeKind::Label(LabelBody {
                label,
                block: None,
            }));
            self.labels[index] = node;
        }
        Ok(node)
    }

    /// Bind `label` at the cursor.
    ///
    /// Binding an unknown id is [`Error::InvalidLabel`]; binding the same
    /// label twice is [`Error::InvalidState`]. Both become sticky.
    pub fn bind(&mut self, label: Label) -> Result<(), Error> {
        if let Some(err) = self.last_error {
            return Err(err);
        }
        let node = match self.label_node(label) {
            Ok(node) => node,
            Err(err) => return Err(self.set_last_error(err)),
        };
        if self.nodes[node].is_linked() || self.first == node {
            return Err(self.set_last_error(Error::InvalidState));
        }
        self.add_node(node);
        Ok(())
    }

    // =========================================================================
    // Directives
    // =========================================================================

    /// Append an alignment directive at the cursor.
    pub fn align(&mut self, mode: AlignMode, alignment: u32) -> Result<(), Error> {
        if let Some(err) = self.last_error {
            return Err(err);
        }
        let node = self.new_align_node(mode, alignment);
        self.add_node(node);
        Ok(())
    }

    /// Append raw data bytes at the cursor.
    pub fn embed(&mut self, data: &[u8]) -> Result<(), Error> {
        if let Some(err) = self.last_error {
            return Err(err);
        }
        let node = self.new_data_node(data);
        self.add_node(node);
        Ok(())
    }

    /// Append the address of `label` as data at the cursor.
    pub fn embed_label(&mut self, label: Label) -> Result<(), Error> {
        if let Some(err) = self.last_error {
            return Err(err);
        }
        let node = self.alloc_node(NodeKind::LabelData { label });
        self.add_node(node);
        Ok(())
    }

    /// Append a constant pool at the cursor: align to the pool's
    /// requirement, bind `label`, then embed the pool bytes.
    pub fn embed_const_pool(&mut self, label: Label, pool: &ConstPool) -> Result<(), Error> {
        if let Some(err) = self.last_error {
            return Err(err);
        }
        if !self.code.is_label_valid(label) {
            return Err(self.set_last_error(Error::InvalidLabel));
        }
        self.align(AlignMode::Data, pool.alignment())?;
        self.bind(label)?;
        let node = self.new_data_node(pool.bytes());
        self.add_node(node);
        Ok(())
    }

    /// Append a standalone comment at the cursor.
    pub fn comment(&mut self, text: &str) -> Result<(), Error> {
        if let Some(err) = self.last_error {
            return Err(err);
        }
        let node = self.new_comment_node(text);
        self.add_node(node);
        Ok(())
    }

    // =========================================================================
    // Emit
    // =========================================================================

    /// One-shot options for the next emitted instruction.
    #[inline]
    pub fn options(&self) -> InstOptions {
        self.state.options
    }

    /// Replace the one-shot options.
    #[inline]
    pub fn set_options(&mut self, options: InstOptions) {
        self.state.options = options;
    }

    /// Add to the one-shot options.
    #[inline]
    pub fn add_options(&mut self, options: InstOptions) {
        self.state.options = self.state.options.union(options);
    }

    /// Attach an inline comment to the next emitted instruction. The text
    /// is duplicated into the data arena.
    pub fn set_inline_comment(&mut self, text: &str) {
        self.state.inline_comment = Some(self.data.dup_str(text));
    }

    /// Drop any pending inline comment.
    pub fn reset_inline_comment(&mut self) {
        self.state.inline_comment = None;
    }

    /// Supply the extra operand (REP register, op-mask) side-band.
    pub fn set_op_extra(&mut self, op: Operand) {
        self.state.op_extra = op;
        self.add_options(InstOptions::OP_EXTRA);
    }

    /// Supply the 5th operand (index 4) side-band.
    pub fn set_op4(&mut self, op: Operand) {
        self.state.op4 = op;
        self.add_options(InstOptions::OP4);
    }

    /// Supply the 6th operand (index 5) side-band.
    pub fn set_op5(&mut self, op: Operand) {
        self.state.op5 = op;
        self.add_options(InstOptions::OP5);
    }

    /// Record one instruction at the cursor.
    ///
    /// The positional operand count is the index of the last non-none
    /// operand plus one; the two side-band operand flags raise it to 5 or
    /// 6. The node's operand capacity is chosen from that count before
    /// allocation and never changes afterwards.
    pub fn emit(
        &mut self,
        inst_id: u32,
        o0: Operand,
        o1: Operand,
        o2: Operand,
        o3: Operand,
    ) -> Result<(), Error> {
        if let Some(err) = self.last_error {
            return Err(err);
        }

        let options = self.state.options;
        let mut op_count = if !o3.is_none() {
            4
        } else if !o2.is_none() {
            3
        } else if !o1.is_none() {
            2
        } else if !o0.is_none() {
            1
        } else {
            0
        };
        if options.intersects(InstOptions::OP4) {
            op_count = 5;
        }
        if options.intersects(InstOptions::OP5) {
            op_count = 6;
        }

        if options.intersects(InstOptions::STRICT_VALIDATION) {
            if let Some(validator) = &self.validator {
                if let Err(err) = validator.validate(inst_id, &[o0, o1, o2, o3]) {
                    self.state.reset_one_shot();
                    return Err(self.set_last_error(err));
                }
            }
        }

        let inline_comment = self.state.inline_comment;
        let op_extra = self.state.op_extra;
        let op4 = self.state.op4;
        let op5 = self.state.op5;
        self.state.reset_one_shot();

        let capacity = InstData::capacity_of_op_count(op_count);
        let mut inst = InstData::new(inst_id, options.without(InstOptions::INTERNAL), capacity);
        inst.set_op(0, o0);
        inst.set_op(1, o1);
        inst.set_op(2, o2);
        inst.set_op(3, o3);
        if options.intersects(InstOptions::OP4) {
            inst.set_op(4, op4);
        }
        if options.intersects(InstOptions::OP5) {
            inst.set_op(5, op5);
        }
        if options.intersects(InstOptions::OP_EXTRA) {
            inst.set_op_extra(op_extra);
        }
        inst.set_op_count(op_count);

        let node = self.alloc_node(NodeKind::Inst(inst));
        self.nodes[node].set_inline_comment(inline_comment);
        self.add_node(node);
        Ok(())
    }

    /// Convenience front end over [`Builder::emit`] taking up to four
    /// operands as a slice.
    pub fn emit_ops(&mut self, inst_id: u32, ops: &[Operand]) -> Result<(), Error> {
        debug_assert!(ops.len() <= 4);
        let op = |i: usize| ops.get(i).copied().unwrap_or(Operand::None);
        self.emit(inst_id, op(0), op(1), op(2), op(3))
    }

    // =========================================================================
    // Node Management
    // =========================================================================

    /// Insert `node` at the cursor and advance the cursor to it.
    ///
    /// With no cursor the node is prepended (or becomes the whole list);
    /// otherwise it goes immediately after the cursor. Successive inserts
    /// therefore keep emission order.
    pub fn add_node(&mut self, node: NodeId) -> NodeId {
        debug_assert!(!self.nodes[node].is_linked());

        if !self.cursor.is_valid() {
            if !self.first.is_valid() {
                self.first = node;
                self.last = node;
            } else {
                self.nodes[node].next = self.first;
                self.nodes[self.first].prev = node;
                self.first = node;
            }
        } else {
            let prev = self.cursor;
            let next = self.nodes[prev].next;

            self.nodes[node].prev = prev;
            self.nodes[node].next = next;

            self.nodes[prev].next = node;
            if next.is_valid() {
                self.nodes[next].prev = node;
            } else {
                self.last = node;
            }
        }

        self.cursor = node;
        node
    }

    /// Insert `node` immediately after `reference`.
    pub fn add_after(&mut self, node: NodeId, reference: NodeId) -> NodeId {
        debug_assert!(!self.nodes[node].is_linked());

        let prev = reference;
        let next = self.nodes[reference].next;

        self.nodes[node].prev = prev;
        self.nodes[node].next = next;

        self.nodes[prev].next = node;
        if next.is_valid() {
            self.nodes[next].prev = node;
        } else {
            self.last = node;
        }
        node
    }

    /// Insert `node` immediately before `reference`.
    pub fn add_before(&mut self, node: NodeId, reference: NodeId) -> NodeId {
        debug_assert!(!self.nodes[node].is_linked());

        let prev = self.nodes[reference].prev;
        let next = reference;

        self.nodes[node].prev = prev;
        self.nodes[node].next = next;

        self.nodes[next].prev = node;
        if prev.is_valid() {
            self.nodes[prev].next = node;
        } else {
            self.first = node;
        }
        node
    }

    /// Unlink `node` from the list.
    ///
    /// If `node` is the cursor, the cursor moves to its previous neighbor.
    pub fn remove_node(&mut self, node: NodeId) -> NodeId {
        let prev = self.nodes[node].prev;
        let next = self.nodes[node].next;

        if self.first == node {
            self.first = next;
        } else if prev.is_valid() {
            self.nodes[prev].next = next;
        }

        if self.last == node {
            self.last = prev;
        } else if next.is_valid() {
            self.nodes[next].prev = prev;
        }

        self.nodes[node].prev = NodeId::INVALID;
        self.nodes[node].next = NodeId::INVALID;

        if self.cursor == node {
            self.cursor = prev;
        }
        node
    }

    /// Unlink the inclusive range `first..=last`, which must be a valid
    /// segment of the list.
    pub fn remove_range(&mut self, first: NodeId, last: NodeId) {
        if first == last {
            self.remove_node(first);
            return;
        }

        let prev = self.nodes[first].prev;
        let next = self.nodes[last].next;

        if self.first == first {
            self.first = next;
        } else if prev.is_valid() {
            self.nodes[prev].next = next;
        }

        if self.last == last {
            self.last = prev;
        } else if next.is_valid() {
            self.nodes[next].prev = prev;
        }

        let mut node = first;
        loop {
            let following = self.nodes[node].next;

            self.nodes[node].prev = NodeId::INVALID;
            self.nodes[node].next = NodeId::INVALID;

            if self.cursor == node {
                self.cursor = prev;
            }
            if node == last {
                break;
            }
            node = following;
        }
    }

    /// Assign 1-based positions in list order. Positions are unique and
    /// monotone until the next structural edit.
    pub fn assign_positions(&mut self) {
        let mut position = 1;
        let mut node = self.first.ok();
        while let Some(id) = node {
            self.nodes[id].set_position(position);
            position += 1;
            node = self.nodes[id].next();
        }
    }

    // =========================================================================
    // Passes
    // =========================================================================

    /// Register a pass. The name must be unique within this builder.
    pub fn add_pass(&mut self, pass: Box<dyn Pass>) -> Result<(), Error> {
        if self.passes.iter().any(|p| p.name() == pass.name()) {
            return Err(Error::InvalidState);
        }
        self.passes.push(pass);
        Ok(())
    }

    /// Remove a pass by name.
    pub fn delete_pass(&mut self, name: &str) -> Result<(), Error> {
        match self.passes.iter().position(|p| p.name() == name) {
            Some(index) => {
                self.passes.remove(index);
                Ok(())
            }
            None => Err(Error::InvalidArgument),
        }
    }

    /// Look up a pass by name.
    pub fn pass_by_name(&self, name: &str) -> Option<&dyn Pass> {
        self.passes
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }

    /// Number of registered passes.
    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Run all passes in registration order.
    ///
    /// The scratch buffer is cleared before every pass. The first error
    /// stops the run and becomes the sticky last error.
    pub fn run_passes(&mut self) -> Result<(), Error> {
        if let Some(err) = self.last_error {
            return Err(err);
        }

        let mut passes = std::mem::take(&mut self.passes);
        let mut scratch = std::mem::take(&mut self.scratch);

        let mut result = Ok(());
        for pass in passes.iter_mut() {
            scratch.reset();
            if let Err(err) = pass.run(self, &mut scratch) {
                result = Err(self.set_last_error(err));
                break;
            }
        }
        scratch.reset();

        // A pass may have registered further passes while running.
        let added = std::mem::take(&mut self.passes);
        passes.extend(added);
        self.passes = passes;
        self.scratch = scratch;
        result
    }

    // =========================================================================
    // Serialize
    // =========================================================================

    /// Replay the node list into `dst`, head to tail.
    ///
    /// Nodes that act as instructions or labels are forwarded through the
    /// corresponding emitter calls even if their structural tag is not the
    /// plain one; purely informative nodes without such a capability are
    /// skipped. The first downstream error halts serialization and is
    /// returned (it is not recorded on this builder).
    pub fn serialize(&self, dst: &mut dyn CodeEmitter) -> Result<(), Error> {
        let mut node_id = self.first.ok();
        while let Some(id) = node_id {
            let node = &self.nodes[id];

            match node.inline_comment() {
                Some(span) => dst.set_inline_comment(self.data.str(span)),
                None => dst.reset_inline_comment(),
            }

            match node.kind() {
                NodeKind::Inst(_) => self.serialize_inst(dst, id)?,
                NodeKind::Data(_) => dst.embed(self.data_of(id).unwrap_or(&[]))?,
                NodeKind::Align { mode, alignment } => dst.align(*mode, *alignment)?,
                NodeKind::Label(body) => dst.bind(body.label)?,
                NodeKind::LabelData { label } => dst.embed_label(*label)?,
                NodeKind::ConstPool(body) => dst.embed_const_pool(body.label, &body.pool)?,
                NodeKind::Comment => dst.comment(self.comment_of(id).unwrap_or(""))?,
                NodeKind::Sentinel => {
                    // Future node kinds route through their capability flags.
                    if node.acts_as_inst() {
                        self.serialize_inst(dst, id)?;
                    } else if node.acts_as_label() {
                        if let Some(label) = node.label_id() {
                            dst.bind(label)?;
                        }
                    }
                }
            }

            node_id = node.next();
        }
        Ok(())
    }

    fn serialize_inst(&self, dst: &mut dyn CodeEmitter, id: NodeId) -> Result<(), Error> {
        let Some(inst) = self.nodes[id].as_inst() else {
            return Ok(());
        };

        let options = inst.options();
        dst.set_options(options);
        if options.intersects(InstOptions::OP_EXTRA) {
            dst.set_op_extra(inst.op_extra());
        }

        let op_count = inst.op_count();
        if op_count > 4 {
            dst.set_op4(inst.op(4));
            if op_count == 6 {
                dst.set_op5(inst.op(5));
            }
        }

        dst.emit(inst.inst_id(), inst.op(0), inst.op(1), inst.op(2), inst.op(3))
    }

    /// Format every node into `out`, one line per node.
    pub fn dump(&self, out: &mut String) -> fmt::Result {
        let mut node = self.first.ok();
        while let Some(id) = node {
            crate::dump::format_node(out, self, id)?;
            out.push('\n');
            node = self.nodes[id].next();
        }
        Ok(())
    }
}

// =============================================================================
// CodeEmitter for Builder
// =============================================================================

impl CodeEmitter for Builder {
    fn emit(
        &mut self,
        inst_id: u32,
        o0: Operand,
        o1: Operand,
        o2: Operand,
        o3: Operand,
    ) -> Result<(), Error> {
        Builder::emit(self, inst_id, o0, o1, o2, o3)
    }

    fn bind(&mut self, label: Label) -> Result<(), Error> {
        Builder::bind(self, label)
    }

    fn align(&mut self, mode: AlignMode, alignment: u32) -> Result<(), Error> {
        Builder::align(self, mode, alignment)
    }

    fn embed(&mut self, data: &[u8]) -> Result<(), Error> {
        Builder::embed(self, data)
    }

    fn embed_label(&mut self, label: Label) -> Result<(), Error> {
        Builder::embed_label(self, label)
    }

    fn embed_const_pool(&mut self, label: Label, pool: &ConstPool) -> Result<(), Error> {
        Builder::embed_const_pool(self, label, pool)
    }

    fn comment(&mut self, text: &str) -> Result<(), Error> {
        Builder::comment(self, text)
    }

    fn set_options(&mut self, options: InstOptions) {
        Builder::set_options(self, options)
    }

    fn set_inline_comment(&mut self, text: &str) {
        Builder::set_inline_comment(self, text)
    }

    fn reset_inline_comment(&mut self) {
        Builder::reset_inline_comment(self)
    }

    fn set_op_extra(&mut self, op: Operand) {
        Builder::set_op_extra(self, op)
    }

    fn set_op4(&mut self, op: Operand) {
        Builder::set_op4(self, op)
    }

    fn set_op5(&mut self, op: Operand) {
        Builder::set_op5(self, op)
    }
}

// =============================================================================
// Node Iterator
// =============================================================================

/// Forward iterator over the builder's node list.
pub struct NodeIter<'a> {
    builder: &'a Builder,
    node: Option<NodeId>,
}

impl Iterator for NodeIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.node?;
        self.node = self.builder.node(id).next();
        Some(id)
    }
}

// =============================================================================
// Tests
// =============================================================================
