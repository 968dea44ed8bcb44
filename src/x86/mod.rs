//! x86/x64 specifics: the instruction database and architecture passes.

pub mod inst;
pub mod sse_to_avx;

pub use sse_to_avx::SseToAvxPass;
