//! SSE to AVX lifter.
//!
//! Rewrites every legacy SSE instruction operating on XMM registers into
//! its VEX-encoded three-operand AVX equivalent. The pass is all or
//! nothing: if a single candidate cannot be translated — an SSE4A
//! instruction without an AVX form, or an MMX/XMM bridge — the whole pass
//! returns success with the node list untouched, because a stream mixing
//! legacy and VEX encodings is worse than either alone.
//!
//! Phase one walks the list and collects every translatable instruction
//! while checking the veto conditions; phase two patches the collected
//! nodes. Patching is node-local, so the phase-two order (a stack pop) has
//! no effect on the result.

use crate::builder::Builder;
use crate::error::Error;
use crate::operand::{Operand, Reg, RegType};
use crate::pass::{Pass, Scratch};

use super::inst::{self, AvxConvMode};

/// Register-class bitmask over an instruction's operands.
#[inline]
fn probe_reg_types(ops: &[Operand]) -> u32 {
    ops.iter()
        .filter_map(Operand::as_reg)
        .fold(0, |mask, reg| mask | reg.ty.mask())
}

/// The SSE to AVX translation pass.
#[derive(Debug, Default)]
pub struct SseToAvxPass {
    translated: bool,
}

impl SseToAvxPass {
    /// Create the pass.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a completed run translated the stream.
    #[inline]
    pub fn translated(&self) -> bool {
        self.translated
    }
}

impl Pass for SseToAvxPass {
    fn name(&self) -> &'static str {
        "sse-to-avx"
    }

    fn run(&mut self, cb: &mut Builder, scratch: &mut Scratch) -> Result<(), Error> {
        // Phase 1 - probe. Collect every convertible instruction; bail out
        // (successfully, leaving the stream alone) on the first candidate
        // that has no AVX counterpart.
        let mut node = cb.first_node();
        while let Some(id) = node {
            // Advance up front so an undefined instruction id cannot stall
            // the walk.
            node = cb.node(id).next();

            let Some(inst) = cb.node(id).as_inst() else {
                continue;
            };
            let Some(info) = inst::lookup(inst.inst_id()) else {
                continue;
            };
            if !info.sse_family {
                continue;
            }

            let op_count = inst.op_count();
            let reg_types = probe_reg_types(inst.ops());

            // Scalar-integer SSE encodings that never touch XMM stay as-is.
            if reg_types & RegType::Xmm.mask() == 0 {
                continue;
            }

            // An MMX register next to XMM is an MMX<->XMM bridge; AVX has
            // no counterpart for those.
            if reg_types & RegType::Mm.mask() != 0 {
                return Ok(());
            }

            match info.sse.avx_conv_mode {
                AvxConvMode::None => return Ok(()),
                AvxConvMode::Move => {}
                AvxConvMode::MoveIfMem | AvxConvMode::Extend => {
                    if !(1..=3).contains(&op_count) {
                        return Ok(());
                    }
                }
                AvxConvMode::Blend => {
                    if !(2..=3).contains(&op_count) {
                        return Ok(());
                    }
                }
            }

            scratch.nodes.push(id);
        }

        // Phase 2 - patch. Every node on the work list is known to be
        // translatable; reshape its operands and advance its id by the
        // database delta.
        while let Some(id) = scratch.nodes.pop() {
            let Some(inst) = cb.node_mut(id).as_inst_mut() else {
                continue;
            };
            let Some(info) = inst::lookup(inst.inst_id()) else {
                continue;
            };

            let mut op_count = inst.op_count();
            let mut extend = false;
            match info.sse.avx_conv_mode {
                AvxConvMode::None | AvxConvMode::Move => {}
                AvxConvMode::MoveIfMem => {
                    extend = !inst.has_mem_op();
                }
                AvxConvMode::Blend => {
                    // [xmmA, xmmB/m128, <xmm0>] -> [xmmA, xmmA, xmmB/m128, xmm0].
                    if op_count == 2 {
                        inst.set_op(op_count, Operand::Reg(Reg::xmm(0)));
                        op_count += 1;
                    }
                    extend = true;
                }
                AvxConvMode::Extend => {
                    extend = true;
                }
            }

            if extend {
                // Shift right by one; the destination stays in slot 0 and
                // is duplicated into slot 1 as the first AVX source.
                for i in (1..=op_count).rev() {
                    let op = inst.op(i - 1);
                    inst.set_op(i, op);
                }
                inst.set_op_count(op_count + 1);
            }

            let new_id = (inst.inst_id() as i32 + info.sse.avx_conv_delta) as u32;
            inst.set_inst_id(new_id);
        }

        self.translated = true;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::Mem;
    use crate::x86::inst::{
        ADDPS, BLENDVPS, MOVAPS, MOVQ, MOVSS, VADDPS, VBLENDVPS, VMOVAPS, VMOVSS,
    };

    fn xmm(id: u8) -> Operand {
        Reg::xmm(id).into()
    }

    fn run_pass(cb: &mut Builder) -> SseToAvxPass {
        let mut pass = SseToAvxPass::new();
        let mut scratch = Scratch::default();
        pass.run(cb, &mut scratch).unwrap();
        pass
    }

    fn inst_view(cb: &Builder, id: crate::node::NodeId) -> (u32, Vec<Operand>) {
        let inst = cb.node(id).as_inst().unwrap();
        (inst.inst_id(), inst.ops().to_vec())
    }

    #[test]
    fn test_probe_reg_types() {
        let mask = probe_reg_types(&[xmm(1), Reg::mm(0).into(), Operand::Imm(3)]);
        assert_ne!(mask & RegType::Xmm.mask(), 0);
        assert_ne!(mask & RegType::Mm.mask(), 0);
        assert_eq!(mask & RegType::Gp64.mask(), 0);
    }

    #[test]
    fn test_move_mode_keeps_arity() {
        let mut cb = Builder::new();
        cb.emit_ops(MOVAPS, &[xmm(1), xmm(2)]).unwrap();

        let pass = run_pass(&mut cb);
        assert!(pass.translated());

        let id = cb.first_node().unwrap();
        assert_eq!(inst_view(&cb, id), (VMOVAPS, vec![xmm(1), xmm(2)]));
    }

    #[test]
    fn test_extend_duplicates_destination() {
        let mut cb = Builder::new();
        cb.emit_ops(ADDPS, &[xmm(1), xmm(2)]).unwrap();

        run_pass(&mut cb);

        let id = cb.first_node().unwrap();
        assert_eq!(inst_view(&cb, id), (VADDPS, vec![xmm(1), xmm(1), xmm(2)]));
    }

    #[test]
    fn test_move_if_mem_with_memory() {
        let mut cb = Builder::new();
        let mem: Operand = Mem::base_disp(Reg::gp64(0), 16).into();
        cb.emit_ops(MOVSS, &[xmm(1), mem]).unwrap();

        run_pass(&mut cb);

        let id = cb.first_node().unwrap();
        assert_eq!(inst_view(&cb, id), (VMOVSS, vec![xmm(1), mem]));
    }

    #[test]
    fn test_move_if_mem_register_register_extends() {
        let mut cb = Builder::new();
        cb.emit_ops(MOVSS, &[xmm(1), xmm(2)]).unwrap();

        run_pass(&mut cb);

        let id = cb.first_node().unwrap();
        assert_eq!(inst_view(&cb, id), (VMOVSS, vec![xmm(1), xmm(1), xmm(2)]));
    }

    #[test]
    fn test_blend_inserts_implicit_xmm0() {
        let mut cb = Builder::new();
        cb.emit_ops(BLENDVPS, &[xmm(1), xmm(2)]).unwrap();

        run_pass(&mut cb);

        let id = cb.first_node().unwrap();
        assert_eq!(
            inst_view(&cb, id),
            (VBLENDVPS, vec![xmm(1), xmm(1), xmm(2), xmm(0)])
        );
    }

    #[test]
    fn test_mmx_bridge_aborts_whole_pass() {
        let mut cb = Builder::new();
        cb.emit_ops(ADDPS, &[xmm(1), xmm(2)]).unwrap();
        cb.emit_ops(MOVQ, &[Reg::mm(0).into(), xmm(1)]).unwrap();

        let pass = run_pass(&mut cb);
        assert!(!pass.translated());

        // Both instructions keep their SSE shape.
        let nodes: Vec<_> = cb.iter().collect();
        assert_eq!(inst_view(&cb, nodes[0]), (ADDPS, vec![xmm(1), xmm(2)]));
        assert_eq!(
            inst_view(&cb, nodes[1]),
            (MOVQ, vec![Reg::mm(0).into(), xmm(1)])
        );
    }

    #[test]
    fn test_undefined_id_does_not_stall() {
        let mut cb = Builder::new();
        cb.emit_ops(0xFFFF, &[xmm(1)]).unwrap();
        cb.emit_ops(ADDPS, &[xmm(1), xmm(2)]).unwrap();

        run_pass(&mut cb);

        let nodes: Vec<_> = cb.iter().collect();
        // Unknown id untouched, defined candidate still converted.
        assert_eq!(inst_view(&cb, nodes[0]).0, 0xFFFF);
        assert_eq!(inst_view(&cb, nodes[1]).0, VADDPS);
    }
}
