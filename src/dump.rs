//! Text formatting of the node list.
//!
//! This is the builder's logging surface: [`format_node`] renders one node
//! the way it would appear in an assembly listing, and
//! [`crate::Builder::dump`] applies it to the whole list.

use std::fmt::{self, Write};

use crate::builder::Builder;
use crate::node::{AlignMode, InstOptions, NodeId, NodeKind};
use crate::operand::Label;
use crate::x86;

fn write_label(out: &mut String, b: &Builder, label: Label) -> fmt::Result {
    if let Some(name) = b.code().label_name(label) {
        return write!(out, "{}", name);
    }
    match b.code().unpack_id(label.id()) {
        Some(index) => write!(out, "L{}", index),
        None => write!(out, "L<invalid>"),
    }
}

/// Format a single node into `out`, without a trailing newline.
pub fn format_node(out: &mut String, b: &Builder, id: NodeId) -> fmt::Result {
    let node = b.node(id);
    match node.kind() {
        NodeKind::Inst(inst) => {
            out.push_str("  ");
            if inst.options().intersects(InstOptions::LOCK) {
                out.push_str("lock ");
            }
            if inst.options().intersects(InstOptions::REP) {
                out.push_str("rep ");
            }
            if inst.options().intersects(InstOptions::REPNE) {
                out.push_str("repne ");
            }
            out.push_str(x86::inst::name(inst.inst_id()));
            for (i, op) in inst.ops().iter().enumerate() {
                if i == 0 {
                    write!(out, " {}", op)?;
                } else {
                    write!(out, ", {}", op)?;
                }
            }
            if let Some(text) = b.comment_of(id) {
                write!(out, " ; {}", text)?;
            }
        }
        NodeKind::Data(_) => {
            let data = b.data_of(id).unwrap_or(&[]);
            write!(out, "  .embed")?;
            for byte in data.iter().take(8) {
                write!(out, " {:02x}", byte)?;
            }
            if data.len() > 8 {
                write!(out, " .. ({} bytes)", data.len())?;
            }
        }
        NodeKind::Align { mode, alignment } => {
            let mode = match mode {
                AlignMode::Code => "code",
                AlignMode::Data => "data",
                AlignMode::Zero => "zero",
            };
            write!(out, "  .align {} {}", mode, alignment)?;
        }
        NodeKind::Label(body) => {
            write_label(out, b, body.label)?;
            out.push(':');
        }
        NodeKind::LabelData { label } => {
            write!(out, "  .embed_label ")?;
            write_label(out, b, *label)?;
        }
        NodeKind::ConstPool(body) => {
            write_label(out, b, body.label)?;
            write!(out, ": .constpool ({} bytes)", body.pool.size())?;
        }
        NodeKind::Comment => {
            write!(out, "; {}", b.comment_of(id).unwrap_or(""))?;
        }
        NodeKind::Sentinel => {
            write!(out, "  .sentinel")?;
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
