//! End-to-end scenarios: emission, serialization, and the SSE to AVX lifter
//! driven through the pass framework.

use prism_asm::emitter::{EmitEvent, RecordingEmitter};
use prism_asm::x86::inst::{
    ADDPS, BLENDVPS, CVTSI2SS, INSERTQ, MOVAPS, MOVQ, MOVSS, PADDD, RET, VADDPS, VBLENDVPS,
    VMOVAPS, VMOVSS, VPADDD,
};
use prism_asm::x86::SseToAvxPass;
use prism_asm::{
    AlignMode, Builder, CodeEmitter, ConstPool, InstOptions, Mem, NodeId, Operand, Reg,
};

fn xmm(id: u8) -> Operand {
    Reg::xmm(id).into()
}

fn run_lifter(cb: &mut Builder) {
    cb.add_pass(Box::new(SseToAvxPass::new())).unwrap();
    cb.run_passes().unwrap();
}

fn inst_ids(cb: &Builder) -> Vec<u32> {
    cb.iter()
        .filter_map(|id| cb.node(id).as_inst().map(|inst| inst.inst_id()))
        .collect()
}

fn ops_of(cb: &Builder, node: NodeId) -> Vec<Operand> {
    cb.node(node).as_inst().unwrap().ops().to_vec()
}

// =============================================================================
// Lifter Scenarios
// =============================================================================

#[test]
fn s1_move_mode_unchanged_arity() {
    let mut cb = Builder::new();
    cb.emit_ops(MOVAPS, &[xmm(1), xmm(2)]).unwrap();

    run_lifter(&mut cb);

    let node = cb.first_node().unwrap();
    assert_eq!(inst_ids(&cb), vec![VMOVAPS]);
    assert_eq!(ops_of(&cb, node), vec![xmm(1), xmm(2)]);
}

#[test]
fn s2_extend_mode() {
    let mut cb = Builder::new();
    cb.emit_ops(ADDPS, &[xmm(1), xmm(2)]).unwrap();

    run_lifter(&mut cb);

    let node = cb.first_node().unwrap();
    assert_eq!(inst_ids(&cb), vec![VADDPS]);
    assert_eq!(ops_of(&cb, node), vec![xmm(1), xmm(1), xmm(2)]);
}

#[test]
fn s3_move_if_mem_with_memory() {
    let mut cb = Builder::new();
    let mem: Operand = Mem::base_disp(Reg::gp64(0), 32).into();
    cb.emit_ops(MOVSS, &[xmm(1), mem]).unwrap();

    run_lifter(&mut cb);

    let node = cb.first_node().unwrap();
    assert_eq!(inst_ids(&cb), vec![VMOVSS]);
    assert_eq!(ops_of(&cb, node), vec![xmm(1), mem]);
}

#[test]
fn s4_move_if_mem_register_register_extends() {
    let mut cb = Builder::new();
    cb.emit_ops(MOVSS, &[xmm(1), xmm(2)]).unwrap();

    run_lifter(&mut cb);

    let node = cb.first_node().unwrap();
    assert_eq!(inst_ids(&cb), vec![VMOVSS]);
    assert_eq!(ops_of(&cb, node), vec![xmm(1), xmm(1), xmm(2)]);
}

#[test]
fn s5_blend_two_operands_inserts_implicit_xmm0() {
    let mut cb = Builder::new();
    cb.emit_ops(BLENDVPS, &[xmm(1), xmm(2)]).unwrap();

    run_lifter(&mut cb);

    let node = cb.first_node().unwrap();
    assert_eq!(inst_ids(&cb), vec![VBLENDVPS]);
    assert_eq!(ops_of(&cb, node), vec![xmm(1), xmm(1), xmm(2), xmm(0)]);
}

#[test]
fn s6_infeasible_mmx_bridge_leaves_list_unchanged() {
    let mut cb = Builder::new();
    cb.emit_ops(ADDPS, &[xmm(1), xmm(2)]).unwrap();
    cb.emit_ops(MOVQ, &[Reg::mm(0).into(), xmm(1)]).unwrap();

    run_lifter(&mut cb);

    // The pass reports success but nothing was converted.
    assert_eq!(cb.last_error(), None);
    assert_eq!(inst_ids(&cb), vec![ADDPS, MOVQ]);

    let first = cb.first_node().unwrap();
    assert_eq!(ops_of(&cb, first), vec![xmm(1), xmm(2)]);
}

#[test]
fn sse4a_candidate_aborts_everything() {
    let mut cb = Builder::new();
    cb.emit_ops(ADDPS, &[xmm(1), xmm(2)]).unwrap();
    cb.emit_ops(INSERTQ, &[xmm(3), xmm(4)]).unwrap();
    cb.emit_ops(MOVAPS, &[xmm(5), xmm(6)]).unwrap();

    run_lifter(&mut cb);

    assert_eq!(inst_ids(&cb), vec![ADDPS, INSERTQ, MOVAPS]);
}

#[test]
fn lifter_is_idempotent_on_avx_only_stream() {
    let mut cb = Builder::new();
    cb.emit_ops(VADDPS, &[xmm(1), xmm(1), xmm(2)]).unwrap();
    cb.emit_ops(VMOVAPS, &[xmm(3), xmm(4)]).unwrap();

    run_lifter(&mut cb);

    let nodes: Vec<_> = cb.iter().collect();
    assert_eq!(inst_ids(&cb), vec![VADDPS, VMOVAPS]);
    assert_eq!(ops_of(&cb, nodes[0]), vec![xmm(1), xmm(1), xmm(2)]);
}

#[test]
fn scalar_sse_without_xmm_is_skipped() {
    // cvtsi2ss with only GP operands would be malformed anyway; what
    // matters is that a SSE-family id with no XMM register in sight is
    // left alone rather than converted.
    let mut cb = Builder::new();
    cb.emit_ops(CVTSI2SS, &[Reg::gp64(0).into(), Reg::gp64(1).into()])
        .unwrap();

    run_lifter(&mut cb);
    assert_eq!(inst_ids(&cb), vec![CVTSI2SS]);
}

#[test]
fn lifter_converts_whole_stream_in_place() {
    let mut cb = Builder::new();
    let loop_top = cb.new_label();

    cb.bind(loop_top).unwrap();
    cb.emit_ops(MOVSS, &[xmm(0), Mem::base(Reg::gp64(6)).into()])
        .unwrap();
    cb.emit_ops(ADDPS, &[xmm(0), xmm(1)]).unwrap();
    cb.emit_ops(PADDD, &[xmm(2), xmm(3)]).unwrap();
    cb.emit_ops(RET, &[]).unwrap();

    run_lifter(&mut cb);

    // Non-SSE instructions keep their ids; every SSE id advanced by its
    // own delta.
    assert_eq!(inst_ids(&cb), vec![VMOVSS, VADDPS, VPADDD, RET]);
}

// =============================================================================
// Serializer Round-Trip
// =============================================================================

/// Replay a mixed sequence through the builder and compare the trace with
/// emitting the same sequence directly into the recorder.
#[test]
fn serializer_round_trip_matches_direct_emission() {
    let mut cb = Builder::new();
    let target = cb.new_label();
    let table = cb.new_label();

    cb.align(AlignMode::Code, 16).unwrap();
    cb.bind(target).unwrap();
    cb.set_inline_comment("hot loop");
    cb.emit_ops(ADDPS, &[xmm(0), xmm(1)]).unwrap();
    cb.add_options(InstOptions::LOCK);
    cb.emit_ops(PADDD, &[xmm(2), xmm(3)]).unwrap();
    cb.comment("spill area follows").unwrap();
    cb.embed(&[1, 2, 3, 4]).unwrap();
    cb.embed_label(table).unwrap();
    cb.emit_ops(RET, &[]).unwrap();

    let mut serialized = RecordingEmitter::new();
    cb.serialize(&mut serialized).unwrap();

    let mut direct = RecordingEmitter::new();
    direct.align(AlignMode::Code, 16).unwrap();
    direct.bind(target).unwrap();
    direct.set_inline_comment("hot loop");
    direct
        .emit(ADDPS, xmm(0), xmm(1), Operand::None, Operand::None)
        .unwrap();
    direct.set_options(InstOptions::LOCK);
    direct
        .emit(PADDD, xmm(2), xmm(3), Operand::None, Operand::None)
        .unwrap();
    direct.comment("spill area follows").unwrap();
    direct.embed(&[1, 2, 3, 4]).unwrap();
    direct.embed_label(table).unwrap();
    direct
        .emit(RET, Operand::None, Operand::None, Operand::None, Operand::None)
        .unwrap();

    assert_eq!(serialized.events, direct.events);
}

#[test]
fn serializer_forwards_side_band_operands() {
    let mut cb = Builder::new();
    cb.set_op4(xmm(4));
    cb.set_op5(xmm(5));
    cb.emit(ADDPS, xmm(0), xmm(1), xmm(2), xmm(3)).unwrap();

    let mut dst = RecordingEmitter::new();
    cb.serialize(&mut dst).unwrap();

    match &dst.events[0] {
        EmitEvent::Inst { inst_id, ops, .. } => {
            assert_eq!(*inst_id, ADDPS);
            assert_eq!(ops.len(), 6);
            assert_eq!(ops[4], xmm(4));
            assert_eq!(ops[5], xmm(5));
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn serializer_emits_const_pool_node() {
    let mut cb = Builder::new();
    let pool_node = cb.new_const_pool().unwrap();

    {
        let node = cb.node_mut(pool_node);
        if let prism_asm::node::NodeKind::ConstPool(body) = node.kind_mut() {
            body.pool.add(&42u64.to_le_bytes()).unwrap();
        }
    }
    cb.add_node(pool_node);

    let label = cb.node(pool_node).label_id().unwrap();
    let mut dst = RecordingEmitter::new();
    cb.serialize(&mut dst).unwrap();

    assert_eq!(
        dst.events,
        vec![EmitEvent::EmbedConstPool(label, 42u64.to_le_bytes().to_vec())]
    );
}

#[test]
fn embed_const_pool_expands_to_align_bind_data() {
    let mut cb = Builder::new();
    let label = cb.new_label();

    let mut pool = ConstPool::new();
    pool.add(&[0x11; 16]).unwrap();
    cb.embed_const_pool(label, &pool).unwrap();

    let mut dst = RecordingEmitter::new();
    cb.serialize(&mut dst).unwrap();

    assert_eq!(
        dst.events,
        vec![
            EmitEvent::Align(AlignMode::Data, 16),
            EmitEvent::Bind(label),
            EmitEvent::Embed(vec![0x11; 16]),
        ]
    );
}

#[test]
fn round_trip_after_lifter_yields_avx_trace() {
    let mut cb = Builder::new();
    cb.emit_ops(BLENDVPS, &[xmm(1), xmm(2)]).unwrap();
    run_lifter(&mut cb);

    let mut dst = RecordingEmitter::new();
    cb.serialize(&mut dst).unwrap();

    match &dst.events[0] {
        EmitEvent::Inst { inst_id, ops, .. } => {
            assert_eq!(*inst_id, VBLENDVPS);
            assert_eq!(ops, &vec![xmm(1), xmm(1), xmm(2), xmm(0)]);
        }
        other => panic!("unexpected event {:?}", other),
    }
}
