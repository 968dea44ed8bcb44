//! Downstream emitter interface.
//!
//! [`CodeEmitter`] mirrors the builder's own emission surface, so a node
//! list can be replayed into anything that understands the same calls — an
//! assembler producing bytes, another builder, or the [`RecordingEmitter`]
//! used in tests. Side-band state (options, extra/5th/6th operands, inline
//! comment) is one-shot: it applies to the next `emit` only.

use crate::constpool::ConstPool;
use crate::error::Error;
use crate::node::{AlignMode, InstOptions};
use crate::operand::{Label, Operand};

// =============================================================================
// CodeEmitter
// =============================================================================

/// Target of [`crate::Builder::serialize`] and of front ends that emit
/// instructions directly.
pub trait CodeEmitter {
    /// Emit one instruction with up to four positional operands.
    fn emit(
        &mut self,
        inst_id: u32,
        o0: Operand,
        o1: Operand,
        o2: Operand,
        o3: Operand,
    ) -> Result<(), Error>;

    /// Bind `label` at the current position.
    fn bind(&mut self, label: Label) -> Result<(), Error>;

    /// Align the current position.
    fn align(&mut self, mode: AlignMode, alignment: u32) -> Result<(), Error>;

    /// Embed raw data bytes.
    fn embed(&mut self, data: &[u8]) -> Result<(), Error>;

    /// Embed the address of `label` as data.
    fn embed_label(&mut self, label: Label) -> Result<(), Error>;

    /// Embed a constant pool, binding `label` to its start.
    fn embed_const_pool(&mut self, label: Label, pool: &ConstPool) -> Result<(), Error>;

    /// Emit a standalone comment. Emitters that produce bytes may ignore it.
    fn comment(&mut self, text: &str) -> Result<(), Error>;

    /// Set options for the next emitted instruction.
    fn set_options(&mut self, options: InstOptions);

    /// Attach an inline comment to the next emitted instruction.
    fn set_inline_comment(&mut self, text: &str);

    /// Drop any pending inline comment.
    fn reset_inline_comment(&mut self);

    /// Supply the extra operand (REP register, op-mask) side-band.
    fn set_op_extra(&mut self, op: Operand);

    /// Supply the 5th operand (index 4) side-band.
    fn set_op4(&mut self, op: Operand);

    /// Supply the 6th operand (index 5) side-band.
    fn set_op5(&mut self, op: Operand);
}

// =============================================================================
// Validator
// =============================================================================

/// Optional strict-validation hook.
///
/// Consulted by the builder when [`InstOptions::STRICT_VALIDATION`] is
/// active; a veto clears the one-shot emit state and becomes the builder's
/// sticky last error.
pub trait Validator {
    /// Check one instruction before it is recorded.
    fn validate(&self, inst_id: u32, ops: &[Operand]) -> Result<(), Error>;
}

// =============================================================================
// RecordingEmitter
// =============================================================================

/// One replayed emitter call.
#[derive(Debug, Clone, PartialEq)]
pub enum EmitEvent {
    Inst {
        inst_id: u32,
        options: InstOptions,
        ops: Vec<Operand>,
        op_extra: Operand,
        inline_comment: Option<String>,
    },
    Bind(Label),
    Align(AlignMode, u32),
    Embed(Vec<u8>),
    EmbedLabel(Label),
    EmbedConstPool(Label, Vec<u8>),
    Comment(String),
}

/// A [`CodeEmitter`] that records its call trace.
///
/// Useful for tests and for diffing two emission paths: serializing a
/// builder into a `RecordingEmitter` must produce the same trace as
/// emitting the original sequence directly.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    /// Recorded calls, in order.
    pub events: Vec<EmitEvent>,
    options: InstOptions,
    inline_comment: Option<String>,
    op_extra: Operand,
    op4: Operand,
    op5: Operand,
}

impl RecordingEmitter {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CodeEmitter for RecordingEmitter {
    fn emit(
        &mut self,
        inst_id: u32,
        o0: Operand,
        o1: Operand,
        o2: Operand,
        o3: Operand,
    ) -> Result<(), Error> {
        let options = self.options;
        let mut ops = vec![o0, o1, o2, o3];
        if options.intersects(InstOptions::OP4) {
            ops.push(self.op4);
        }
        if options.intersects(InstOptions::OP5) {
            ops.push(self.op5);
        }
        while ops.last().is_some_and(|op| op.is_none()) {
            ops.pop();
        }

        let op_extra = if options.intersects(InstOptions::OP_EXTRA) {
            self.op_extra
        } else {
            Operand::None
        };

        self.events.push(EmitEvent::Inst {
            inst_id,
            options: options.without(InstOptions::INTERNAL),
            ops,
            op_extra,
            inline_comment: self.inline_comment.take(),
        });
        self.options = InstOptions::NONE;
        Ok(())
    }

    fn bind(&mut self, label: Label) -> Result<(), Error> {
        self.events.push(EmitEvent::Bind(label));
        Ok(())
    }

    fn align(&mut self, mode: AlignMode, alignment: u32) -> Result<(), Error> {
        self.events.push(EmitEvent::Align(mode, alignment));
        Ok(())
    }

    fn embed(&mut self, data: &[u8]) -> Result<(), Error> {
        self.events.push(EmitEvent::Embed(data.to_vec()));
        Ok(())
    }

    fn embed_label(&mut self, label: Label) -> Result<(), Error> {
        self.events.push(EmitEvent::EmbedLabel(label));
        Ok(())
    }

    fn embed_const_pool(&mut self, label: Label, pool: &ConstPool) -> Result<(), Error> {
        self.events
            .push(EmitEvent::EmbedConstPool(label, pool.bytes().to_vec()));
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<(), Error> {
        self.events.push(EmitEvent::Comment(text.to_string()));
        Ok(())
    }

    fn set_options(&mut self, options: InstOptions) {
        self.options = options;
    }

    fn set_inline_comment(&mut self, text: &str) {
        self.inline_comment = Some(text.to_string());
    }

    fn reset_inline_comment(&mut self) {
        self.inline_comment = None;
    }

    fn set_op_extra(&mut self, op: Operand) {
        self.op_extra = op;
        self.options = self.options.union(InstOptions::OP_EXTRA);
    }

    fn set_op4(&mut self, op: Operand) {
        self.op4 = op;
        self.options = self.options.union(InstOptions::OP4);
    }

    fn set_op5(&mut self, op: Operand) {
        self.op5 = op;
        self.options = self.options.union(InstOptions::OP5);
    }
}
