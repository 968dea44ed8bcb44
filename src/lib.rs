//! Machine-code builder IR for x86/x64.
//!
//! Instead of encoding instructions as they are emitted, the [`Builder`]
//! records them as nodes in a doubly linked list that can be inspected,
//! edited, and transformed by passes before it is serialized into a
//! downstream [`CodeEmitter`] (usually an assembler).
//!
//! - Heterogeneous node list (instructions, labels, data, align, comments)
//! - Cursor-driven insertion and editing
//! - Pass framework with per-pass scratch storage
//! - SSE to AVX lifter as the representative transformation pass
#![deny(unsafe_op_in_unsafe_fn)]
pub mod arena;
pub mod builder;
pub mod code;
pub mod constpool;
pub mod dump;
pub mod emitter;
pub mod error;
pub mod node;
pub mod operand;
pub mod pass;
pub mod x86;

pub use builder::Builder;
pub use code::{CodeContainer, LabelKind};
pub use constpool::ConstPool;
pub use emitter::{CodeEmitter, Validator};
pub use error::Error;
pub use node::{AlignMode, InstOptions, Node, NodeFlags, NodeId, NodeType};
pub use operand::{Label, Mem, Operand, Reg, RegType, Scale};
pub use pass::{Pass, Scratch};
