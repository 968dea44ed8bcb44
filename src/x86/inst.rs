//! x86 instruction database.
//!
//! A process-wide, read-only table mapping instruction ids to their
//! metadata. Ids are dense: `INST_TABLE[id]` is the record for `id`, which
//! keeps the SSE to AVX translation a single signed offset
//! ([`SseData::avx_conv_delta`]) away.
//!
//! The table covers the subset of the ISA this crate's passes reason
//! about: legacy SSE instructions grouped by their AVX conversion mode,
//! their VEX-encoded counterparts, and a handful of general-purpose
//! instructions. Extending it means appending ids and keeping the
//! index == id property, which `test_table_ids_match_indices` pins.

// =============================================================================
// Instruction Ids
// =============================================================================

/// Invalid instruction id.
pub const NONE: u32 = 0;

pub const ADD: u32 = 1;
pub const JMP: u32 = 2;
pub const LEA: u32 = 3;
pub const MOV: u32 = 4;
pub const NOP: u32 = 5;
pub const RET: u32 = 6;

pub const ADDPD: u32 = 7;
pub const ADDPS: u32 = 8;
pub const ADDSD: u32 = 9;
pub const ADDSS: u32 = 10;
pub const ANDNPS: u32 = 11;
pub const ANDPS: u32 = 12;
pub const BLENDPS: u32 = 13;
pub const BLENDVPD: u32 = 14;
pub const BLENDVPS: u32 = 15;
pub const CMPPS: u32 = 16;
pub const CMPSS: u32 = 17;
pub const CVTSI2SS: u32 = 18;
pub const DIVPS: u32 = 19;
pub const DIVSS: u32 = 20;
pub const EXTRQ: u32 = 21;
pub const INSERTQ: u32 = 22;
pub const MAXPS: u32 = 23;
pub const MINPS: u32 = 24;
pub const MOVAPD: u32 = 25;
pub const MOVAPS: u32 = 26;
pub const MOVD: u32 = 27;
pub const MOVHLPS: u32 = 28;
pub const MOVLHPS: u32 = 29;
pub const MOVMSKPS: u32 = 30;
pub const MOVQ: u32 = 31;
pub const MOVSD: u32 = 32;
pub const MOVSS: u32 = 33;
pub const MOVUPD: u32 = 34;
pub const MOVUPS: u32 = 35;
pub const MULPD: u32 = 36;
pub const MULPS: u32 = 37;
pub const MULSS: u32 = 38;
pub const ORPS: u32 = 39;
pub const PADDB: u32 = 40;
pub const PADDD: u32 = 41;
pub const PAND: u32 = 42;
pub const PBLENDVB: u32 = 43;
pub const POR: u32 = 44;
pub const PSHUFB: u32 = 45;
pub const PXOR: u32 = 46;
pub const SHUFPS: u32 = 47;
pub const SQRTPS: u32 = 48;
pub const SQRTSS: u32 = 49;
pub const SUBPS: u32 = 50;
pub const SUBSS: u32 = 51;
pub const UCOMISS: u32 = 52;
pub const XORPS: u32 = 53;

pub const VADDPD: u32 = 54;
pub const VADDPS: u32 = 55;
pub const VADDSD: u32 = 56;
pub const VADDSS: u32 = 57;
pub const VANDNPS: u32 = 58;
pub const VANDPS: u32 = 59;
pub const VBLENDPS: u32 = 60;
pub const VBLENDVPD: u32 = 61;
pub const VBLENDVPS: u32 = 62;
pub const VCMPPS: u32 = 63;
pub const VCMPSS: u32 = 64;
pub const VCVTSI2SS: u32 = 65;
pub const VDIVPS: u32 = 66;
pub const VDIVSS: u32 = 67;
pub const VMAXPS: u32 = 68;
pub const VMINPS: u32 = 69;
pub const VMOVAPD: u32 = 70;
pub const VMOVAPS: u32 = 71;
pub const VMOVD: u32 = 72;
pub const VMOVHLPS: u32 = 73;
pub const VMOVLHPS: u32 = 74;
pub const VMOVMSKPS: u32 = 75;
pub const VMOVQ: u32 = 76;
pub const VMOVSD: u32 = 77;
pub const VMOVSS: u32 = 78;
pub const VMOVUPD: u32 = 79;
pub const VMOVUPS: u32 = 80;
pub const VMULPD: u32 = 81;
pub const VMULPS: u32 = 82;
pub const VMULSS: u32 = 83;
pub const VORPS: u32 = 84;
pub const VPADDB: u32 = 85;
pub const VPADDD: u32 = 86;
pub const VPAND: u32 = 87;
pub const VPBLENDVB: u32 = 88;
pub const VPOR: u32 = 89;
pub const VPSHUFB: u32 = 90;
pub const VPXOR: u32 = 91;
pub const VSHUFPS: u32 = 92;
pub const VSQRTPS: u32 = 93;
pub const VSQRTSS: u32 = 94;
pub const VSUBPS: u32 = 95;
pub const VSUBSS: u32 = 96;
pub const VUCOMISS: u32 = 97;
pub const VXORPS: u32 = 98;

/// Number of defined ids, including [`NONE`].
pub const COUNT: u32 = 99;

// =============================================================================
// Metadata
// =============================================================================

/// How a legacy SSE encoding maps to its AVX counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvxConvMode {
    /// No AVX equivalent exists (SSE4A).
    None,
    /// Move-style: the AVX form has the same arity, only the id changes.
    Move,
    /// Move-style when one operand is memory, otherwise extend.
    MoveIfMem,
    /// Destructive two-operand form becomes a non-destructive
    /// three-operand form.
    Extend,
    /// As `Extend`, and the AVX form also takes the implicit XMM0 mask as
    /// an explicit last operand.
    Blend,
}

/// SSE-specific metadata of an instruction.
#[derive(Debug, Clone, Copy)]
pub struct SseData {
    /// Translation strategy.
    pub avx_conv_mode: AvxConvMode,
    /// Signed offset from the SSE id to the AVX id.
    pub avx_conv_delta: i32,
}

impl SseData {
    const NONE: SseData = SseData {
        avx_conv_mode: AvxConvMode::None,
        avx_conv_delta: 0,
    };
}

/// One instruction record.
#[derive(Debug, Clone, Copy)]
pub struct InstInfo {
    /// The instruction's own id; `INST_TABLE[id].id == id`.
    pub id: u32,
    /// Mnemonic.
    pub name: &'static str,
    /// True for legacy SSE-family encodings.
    pub sse_family: bool,
    /// SSE translation data; meaningless unless `sse_family` is set.
    pub sse: SseData,
}

const fn gp(id: u32, name: &'static str) -> InstInfo {
    InstInfo {
        id,
        name,
        sse_family: false,
        sse: SseData::NONE,
    }
}

const fn sse(id: u32, name: &'static str, mode: AvxConvMode, avx_id: u32) -> InstInfo {
    InstInfo {
        id,
        name,
        sse_family: true,
        sse: SseData {
            avx_conv_mode: mode,
            avx_conv_delta: avx_id as i32 - id as i32,
        },
    }
}

const fn sse4a(id: u32, name: &'static str) -> InstInfo {
    InstInfo {
        id,
        name,
        sse_family: true,
        sse: SseData::NONE,
    }
}

const fn avx(id: u32, name: &'static str) -> InstInfo {
    InstInfo {
        id,
        name,
        sse_family: false,
        sse: SseData::NONE,
    }
}

/// The instruction table, indexed by id.
pub static INST_TABLE: [InstInfo; COUNT as usize] = [
    gp(NONE, "<none>"),
    gp(ADD, "add"),
    gp(JMP, "jmp"),
    gp(LEA, "lea"),
    gp(MOV, "mov"),
    gp(NOP, "nop"),
    gp(RET, "ret"),
    sse(ADDPD, "addpd", AvxConvMode::Extend, VADDPD),
    sse(ADDPS, "addps", AvxConvMode::Extend, VADDPS),
    sse(ADDSD, "addsd", AvxConvMode::Extend, VADDSD),
    sse(ADDSS, "addss", AvxConvMode::Extend, VADDSS),
    sse(ANDNPS, "andnps", AvxConvMode::Extend, VANDNPS),
    sse(ANDPS, "andps", AvxConvMode::Extend, VANDPS),
    sse(BLENDPS, "blendps", AvxConvMode::Extend, VBLENDPS),
    sse(BLENDVPD, "blendvpd", AvxConvMode::Blend, VBLENDVPD),
    sse(BLENDVPS, "blendvps", AvxConvMode::Blend, VBLENDVPS),
    sse(CMPPS, "cmpps", AvxConvMode::Extend, VCMPPS),
    sse(CMPSS, "cmpss", AvxConvMode::Extend, VCMPSS),
    sse(CVTSI2SS, "cvtsi2ss", AvxConvMode::Extend, VCVTSI2SS),
    sse(DIVPS, "divps", AvxConvMode::Extend, VDIVPS),
    sse(DIVSS, "divss", AvxConvMode::Extend, VDIVSS),
    sse4a(EXTRQ, "extrq"),
    sse4a(INSERTQ, "insertq"),
    sse(MAXPS, "maxps", AvxConvMode::Extend, VMAXPS),
    sse(MINPS, "minps", AvxConvMode::Extend, VMINPS),
    sse(MOVAPD, "movapd", AvxConvMode::Move, VMOVAPD),
    sse(MOVAPS, "movaps", AvxConvMode::Move, VMOVAPS),
    sse(MOVD, "movd", AvxConvMode::MoveIfMem, VMOVD),
    sse(MOVHLPS, "movhlps", AvxConvMode::Extend, VMOVHLPS),
    sse(MOVLHPS, "movlhps", AvxConvMode::Extend, VMOVLHPS),
    sse(MOVMSKPS, "movmskps", AvxConvMode::Move, VMOVMSKPS),
    sse(MOVQ, "movq", AvxConvMode::MoveIfMem, VMOVQ),
    sse(MOVSD, "movsd", AvxConvMode::MoveIfMem, VMOVSD),
    sse(MOVSS, "movss", AvxConvMode::MoveIfMem, VMOVSS),
    sse(MOVUPD, "movupd", AvxConvMode::Move, VMOVUPD),
    sse(MOVUPS, "movups", AvxConvMode::Move, VMOVUPS),
    sse(MULPD, "mulpd", AvxConvMode::Extend, VMULPD),
    sse(MULPS, "mulps", AvxConvMode::Extend, VMULPS),
    sse(MULSS, "mulss", AvxConvMode::Extend, VMULSS),
    sse(ORPS, "orps", AvxConvMode::Extend, VORPS),
    sse(PADDB, "paddb", AvxConvMode::Extend, VPADDB),
    sse(PADDD, "paddd", AvxConvMode::Extend, VPADDD),
    sse(PAND, "pand", AvxConvMode::Extend, VPAND),
    sse(PBLENDVB, "pblendvb", AvxConvMode::Blend, VPBLENDVB),
    sse(POR, "por", AvxConvMode::Extend, VPOR),
    sse(PSHUFB, "pshufb", AvxConvMode::Extend, VPSHUFB),
    sse(PXOR, "pxor", AvxConvMode::Extend, VPXOR),
    sse(SHUFPS, "shufps", AvxConvMode::Extend, VSHUFPS),
    sse(SQRTPS, "sqrtps", AvxConvMode::Move, VSQRTPS),
    sse(SQRTSS, "sqrtss", AvxConvMode::Extend, VSQRTSS),
    sse(SUBPS, "subps", AvxConvMode::Extend, VSUBPS),
    sse(SUBSS, "subss", AvxConvMode::Extend, VSUBSS),
    sse(UCOMISS, "ucomiss", AvxConvMode::Move, VUCOMISS),
    sse(XORPS, "xorps", AvxConvMode::Extend, VXORPS),
    avx(VADDPD, "vaddpd"),
    avx(VADDPS, "vaddps"),
    avx(VADDSD, "vaddsd"),
    avx(VADDSS, "vaddss"),
    avx(VANDNPS, "vandnps"),
    avx(VANDPS, "vandps"),
    avx(VBLENDPS, "vblendps"),
    avx(VBLENDVPD, "vblendvpd"),
    avx(VBLENDVPS, "vblendvps"),
    avx(VCMPPS, "vcmpps"),
    avx(VCMPSS, "vcmpss"),
    avx(VCVTSI2SS, "vcvtsi2ss"),
    avx(VDIVPS, "vdivps"),
    avx(VDIVSS, "vdivss"),
    avx(VMAXPS, "vmaxps"),
    avx(VMINPS, "vminps"),
    avx(VMOVAPD, "vmovapd"),
    avx(VMOVAPS, "vmovaps"),
    avx(VMOVD, "vmovd"),
    avx(VMOVHLPS, "vmovhlps"),
    avx(VMOVLHPS, "vmovlhps"),
    avx(VMOVMSKPS, "vmovmskps"),
    avx(VMOVQ, "vmovq"),
    avx(VMOVSD, "vmovsd"),
    avx(VMOVSS, "vmovss"),
    avx(VMOVUPD, "vmovupd"),
    avx(VMOVUPS, "vmovups"),
    avx(VMULPD, "vmulpd"),
    avx(VMULPS, "vmulps"),
    avx(VMULSS, "vmulss"),
    avx(VORPS, "vorps"),
    avx(VPADDB, "vpaddb"),
    avx(VPADDD, "vpaddd"),
    avx(VPAND, "vpand"),
    avx(VPBLENDVB, "vpblendvb"),
    avx(VPOR, "vpor"),
    avx(VPSHUFB, "vpshufb"),
    avx(VPXOR, "vpxor"),
    avx(VSHUFPS, "vshufps"),
    avx(VSQRTPS, "vsqrtps"),
    avx(VSQRTSS, "vsqrtss"),
    avx(VSUBPS, "vsubps"),
    avx(VSUBSS, "vsubss"),
    avx(VUCOMISS, "vucomiss"),
    avx(VXORPS, "vxorps"),
];

// =============================================================================
// Queries
// =============================================================================

/// Check if `id` names a defined instruction.
#[inline]
pub fn is_defined(id: u32) -> bool {
    id != NONE && (id as usize) < INST_TABLE.len()
}

/// Look up the record of a defined instruction.
#[inline]
pub fn lookup(id: u32) -> Option<&'static InstInfo> {
    if is_defined(id) {
        Some(&INST_TABLE[id as usize])
    } else {
        None
    }
}

/// Mnemonic of `id`, or a placeholder for undefined ids.
#[inline]
pub fn name(id: u32) -> &'static str {
    match lookup(id) {
        Some(info) => info.name,
        None => "<unknown>",
    }
}

// =============================================================================
// Tests
// =============================================================================
