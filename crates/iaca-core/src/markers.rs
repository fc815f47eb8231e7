//! IACA region markers.
//!
//! IACA analyzes the code between a start and an end marker. Each marker is
//! `movl $<id>, %ebx` followed by the bytes `64 67 90`, emitted as volatile
//! inline assembly that clobbers `ebx` and memory so the optimizer neither
//! drops nor moves it.

use inkwell::builder::{Builder, BuilderError};
use inkwell::context::Context;
use inkwell::values::CallSiteValue;

pub const START_MARKER_ASM: &str = "movl $$111, %ebx\n\t.byte 0x64, 0x67, 0x90";
pub const END_MARKER_ASM: &str = "movl $$222, %ebx\n\t.byte 0x64, 0x67, 0x90";
pub const MARKER_CONSTRAINTS: &str = "~{ebx},~{memory}";

/// Start marker as an IR instruction, for textual method bodies.
pub const START_MARKER_IR: &str =
    r#"  call void asm sideeffect "movl $$111, %ebx\0A\09.byte 0x64, 0x67, 0x90", "~{ebx},~{memory}"()"#;
/// End marker as an IR instruction, for textual method bodies.
pub const END_MARKER_IR: &str =
    r#"  call void asm sideeffect "movl $$222, %ebx\0A\09.byte 0x64, 0x67, 0x90", "~{ebx},~{memory}"()"#;

/// Machine code of the start marker.
pub const START_MARKER_BYTES: [u8; 8] = [0xbb, 0x6f, 0x00, 0x00, 0x00, 0x64, 0x67, 0x90];
/// Machine code of the end marker.
pub const END_MARKER_BYTES: [u8; 8] = [0xbb, 0xde, 0x00, 0x00, 0x00, 0x64, 0x67, 0x90];

fn build_marker<'ctx>(
    context: &'ctx Context,
    builder: &Builder<'ctx>,
    assembly: &str,
) -> Result<CallSiteValue<'ctx>, BuilderError> {
    let fn_type = context.void_type().fn_type(&[], false);
    let asm = context.create_inline_asm(
        fn_type,
        assembly.to_string(),
        MARKER_CONSTRAINTS.to_string(),
        true,
        false,
        None,
        false,
    );
    builder.build_indirect_call(fn_type, asm, &[], "")
}

/// Insert the start marker at the builder's position.
pub fn build_start_marker<'ctx>(
    context: &'ctx Context,
    builder: &Builder<'ctx>,
) -> Result<CallSiteValue<'ctx>, BuilderError> {
    build_marker(context, builder, START_MARKER_ASM)
}

/// Insert the end marker at the builder's position.
pub fn build_end_marker<'ctx>(
    context: &'ctx Context,
    builder: &Builder<'ctx>,
) -> Result<CallSiteValue<'ctx>, BuilderError> {
    build_marker(context, builder, END_MARKER_ASM)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Offsets of the start and end markers in a code image, if both are present
/// and in order.
pub fn marker_span(bytes: &[u8]) -> Option<(usize, usize)> {
    let start = find(bytes, &START_MARKER_BYTES)?;
    let after = start + START_MARKER_BYTES.len();
    let end = after + find(&bytes[after..], &END_MARKER_BYTES)?;
    Some((start, end))
}
