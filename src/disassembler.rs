/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Single-pass disassembler for 8-byte-aligned BPF bytecode.
//!
//! Decoding never fails: a malformed instruction becomes an in-stream
//! `unknown/unsupported ...` marker line and the walk continues at the next
//! slot. Every decoded instruction is audited: any field (offset, registers,
//! immediate) that carries a value the opcode does not consume produces a
//! warning line, which is the main encoding-correctness signal for
//! fuzz-generated inputs.

use crate::opcodes::*;
use std::fmt::Write;

// Audited instruction field: decode marks the fields it consumed, leftovers
// with non-zero values are reported.
struct Field {
    name: &'static str,
    value: u64,
    used: bool,
}

impl Field {
    fn new(name: &'static str, value: u64) -> Field {
        Field {
            name,
            value,
            used: false,
        }
    }
}

const OFF: usize = 0;
const DST: usize = 1;
const SRC: usize = 2;
const IMM: usize = 3;

fn reg(index: u8) -> String {
    format!("%r{}", index)
}

fn imm(value: u64) -> String {
    format!("{:#x}", value)
}

// Branch offsets and memory displacements print as signed decimals with an
// explicit sign.
fn off(value: u16) -> String {
    if value <= 32767 {
        format!("+{}", value)
    } else {
        format!("-{}", 65536 - value as u32)
    }
}

fn mem(base: u8, offset: u16) -> String {
    if offset != 0 {
        format!("[{}{}]", reg(base), off(offset))
    } else {
        format!("[{}]", reg(base))
    }
}

/// Decodes one instruction at `offset` (which must have at least 8 bytes of
/// data behind it) and returns the rendered line together with the number of
/// bytes consumed: 16 for a well-formed `lddw`, 8 for everything else.
pub fn disassemble_one(data: &[u8], offset: usize, verbose: bool) -> (String, usize) {
    let code = data[offset];
    let regs = data[offset + 1];
    let off_value = u16::from_le_bytes([data[offset + 2], data[offset + 3]]);
    let imm_value = u32::from_le_bytes([
        data[offset + 4],
        data[offset + 5],
        data[offset + 6],
        data[offset + 7],
    ]);

    let dst_reg = regs & 0x0f;
    let src_reg = regs >> 4;
    let cls = code & 7;

    let mut increment = 8;

    let mut fields = [
        Field::new("offset", off_value as u64),
        Field::new("destination register", dst_reg as u64),
        Field::new("source register", src_reg as u64),
        Field::new("immediate", imm_value as u64),
    ];

    let mut disassembled = match cls {
        BPF_CLS_ALU32 | BPF_CLS_ALU64 => {
            let source = (code >> 3) & 1;
            let sub_opcode = (code >> 4) & 0xf;
            let suffix = if cls == BPF_CLS_ALU32 { "32" } else { "" };

            if sub_opcode == ALU_SUB_END {
                // Width-parameterized byte reorderings: the ALU32 encodings
                // are host-to-little/big conversions picked by the source
                // bit, the ALU64 encoding is the unconditional swap.
                let mnemonic = if cls == BPF_CLS_ALU64 {
                    "bswap"
                } else if source == 1 {
                    "be"
                } else {
                    "le"
                };
                fields[IMM].used = true;
                fields[DST].used = true;
                format!("{}{} {}", mnemonic, imm_value, reg(dst_reg))
            } else if let Some(name) = alu_op_name(sub_opcode) {
                if sub_opcode == ALU_SUB_NEG {
                    fields[DST].used = true;
                    format!("{}{} {}", name, suffix, reg(dst_reg))
                } else if source == 0 {
                    fields[DST].used = true;
                    fields[IMM].used = true;
                    format!("{}{} {}, {}", name, suffix, reg(dst_reg), imm(imm_value as u64))
                } else {
                    fields[DST].used = true;
                    fields[SRC].used = true;
                    format!("{}{} {}, {}", name, suffix, reg(dst_reg), reg(src_reg))
                }
            } else {
                format!("unknown/unsupported instruction code={:x}", code)
            }
        }
        BPF_CLS_JMP | BPF_CLS_JMP32 => {
            let source = (code >> 3) & 1;
            let sub_opcode = (code >> 4) & 0xf;
            let suffix = if cls == BPF_CLS_JMP32 { "32" } else { "" };

            match sub_opcode {
                JMP_SUB_EXIT => "exit".to_string(),
                JMP_SUB_CALL => {
                    fields[IMM].used = true;
                    if src_reg == CALL_SRC_LOCAL {
                        // the source nibble selects the intra-program form
                        fields[SRC].used = true;
                        format!("call local {}", imm(imm_value as u64))
                    } else {
                        format!("call {}", imm(imm_value as u64))
                    }
                }
                JMP_SUB_JA => {
                    fields[OFF].used = true;
                    format!("ja {}", off(off_value))
                }
                _ => {
                    if let Some(name) = jmp_op_name(sub_opcode) {
                        if source == 0 {
                            fields[DST].used = true;
                            fields[IMM].used = true;
                            fields[OFF].used = true;
                            format!(
                                "{}{} {}, {}, {}",
                                name,
                                suffix,
                                reg(dst_reg),
                                imm(imm_value as u64),
                                off(off_value)
                            )
                        } else {
                            fields[DST].used = true;
                            fields[SRC].used = true;
                            fields[OFF].used = true;
                            format!(
                                "{}{} {}, {}, {}",
                                name,
                                suffix,
                                reg(dst_reg),
                                reg(src_reg),
                                off(off_value)
                            )
                        }
                    } else {
                        format!("unknown/unsupported instruction code={:x}", code)
                    }
                }
            }
        }
        BPF_CLS_LD => {
            let size = (code >> 3) & 3;
            let mode = (code >> 5) & 7;

            // The only supported LD form is the two-slot 64-bit immediate
            // load, which consumes the following slot for the high half.
            if size == SIZE_DW && mode == 0 && src_reg == 0 && offset + 16 <= data.len() {
                increment += 8;
                let imm_high = u32::from_le_bytes([
                    data[offset + 12],
                    data[offset + 13],
                    data[offset + 14],
                    data[offset + 15],
                ]);
                let value = (imm_high as u64) << 32 | imm_value as u64;
                fields[DST].used = true;
                fields[IMM].used = true;
                format!("lddw {}, {}", reg(dst_reg), imm(value))
            } else {
                format!("unknown/unsupported special LOAD instruction code={:x}", code)
            }
        }
        BPF_CLS_LDX | BPF_CLS_ST | BPF_CLS_STX => {
            let size = (code >> 3) & 3;
            let mode = (code >> 5) & 7;
            let size_name = SIZE_SUFFIXES[size as usize];
            let class_name = CLASS_NAMES[cls as usize];

            if cls == BPF_CLS_LDX {
                fields[DST].used = true;
                fields[SRC].used = true;
                fields[OFF].used = true;
                // mode 4 is the sign-extending load family
                let sign_extend = if mode == MODE_MEMSX && size != SIZE_DW {
                    "s"
                } else {
                    ""
                };
                format!(
                    "{}{}{} {}, {}",
                    class_name,
                    sign_extend,
                    size_name,
                    reg(dst_reg),
                    mem(src_reg, off_value)
                )
            } else if cls == BPF_CLS_ST {
                fields[DST].used = true;
                fields[OFF].used = true;
                fields[IMM].used = true;
                format!(
                    "{}{} {}, {}",
                    class_name,
                    size_name,
                    mem(dst_reg, off_value),
                    imm(imm_value as u64)
                )
            } else {
                fields[DST].used = true;
                fields[SRC].used = true;
                fields[OFF].used = true;
                format!(
                    "{}{} {}, {}",
                    class_name,
                    size_name,
                    mem(dst_reg, off_value),
                    reg(src_reg)
                )
            }
        }
        _ => format!("unknown/unsupported instruction code={:x}", code),
    };

    let mut warnings = String::new();
    for field in &fields {
        if !field.used && field.value != 0 {
            if !warnings.is_empty() {
                warnings.push_str("; ");
            }
            let _ = write!(
                warnings,
                "The {} field of the instruction has a value but it is not used by the instruction",
                field.name
            );
        }
    }

    if !warnings.is_empty() {
        let _ = write!(disassembled, "\n\tWarnings: {}.", warnings);
        disassembled.push('\n');
    }

    if verbose {
        disassembled.push_str("\nDetails:\n");
        let _ = writeln!(disassembled, "\tClass: {:#x}", cls);
        let _ = writeln!(disassembled, "\tRegs: {:#x}", regs);
        let _ = writeln!(disassembled, "\tOffset: {:#x}", off_value);
        let _ = writeln!(disassembled, "\tImmediate: {:#x}", imm_value);
        disassembled.push_str("-----------------");
    }

    (disassembled, increment)
}

/// Renders one text line per instruction. Trailing bytes that do not fill a
/// whole 8-byte slot are ignored.
pub fn disassemble(data: &[u8], verbose: bool) -> String {
    let mut output = String::new();
    let mut offset = 0;

    while offset + 8 <= data.len() {
        let (line, increment) = disassemble_one(data, offset, verbose);
        if !line.is_empty() {
            output.push_str(&line);
            output.push('\n');
        }
        offset += increment;
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disassemble_alu_immediate() {
        let data = [0xb7, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00];
        assert_eq!(disassemble(&data, false), "mov %r0, 0x1\n");
    }

    #[test]
    fn test_disassemble_alu_register() {
        let data = [0x0f, 0x21, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(disassemble(&data, false), "add %r1, %r2\n");
    }

    #[test]
    fn test_disassemble_alu32() {
        let data = [0x04, 0x01, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00];
        assert_eq!(disassemble(&data, false), "add32 %r1, 0x5\n");
    }

    #[test]
    fn test_disassemble_neg() {
        let data = [0x87, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(disassemble(&data, false), "neg %r3\n");
    }

    #[test]
    fn test_disassemble_endian() {
        let le = [0xd4, 0x01, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00];
        assert_eq!(disassemble(&le, false), "le16 %r1\n");

        let be = [0xdc, 0x02, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00];
        assert_eq!(disassemble(&be, false), "be64 %r2\n");
    }

    #[test]
    fn test_disassemble_bswap() {
        // ALU64 endian sub-opcode is the unconditional byte swap
        let data = [0xd7, 0x00, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00];
        assert_eq!(disassemble(&data, false), "bswap32 %r0\n");
    }

    #[test]
    fn test_disassemble_memory_load() {
        let data = [0x61, 0x21, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(disassemble(&data, false), "ldxw %r1, [%r2+8]\n");
    }

    #[test]
    fn test_disassemble_memory_load_sign_extended() {
        let data = [0x91, 0xa3, 0xfc, 0xff, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(disassemble(&data, false), "ldxsb %r3, [%r10-4]\n");
    }

    #[test]
    fn test_disassemble_store_immediate() {
        let data = [0x6a, 0x01, 0x02, 0x00, 0x34, 0x12, 0x00, 0x00];
        assert_eq!(disassemble(&data, false), "sth [%r1+2], 0x1234\n");
    }

    #[test]
    fn test_disassemble_store_register_no_offset() {
        let data = [0x7b, 0x21, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(disassemble(&data, false), "stxdw [%r1], %r2\n");
    }

    #[test]
    fn test_disassemble_jump_offsets() {
        let forward = [0x05, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(disassemble(&forward, false), "ja +2\n");

        let backward = [0x55, 0x00, 0xfe, 0xff, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(disassemble(&backward, false), "jne %r0, 0x0, -2\n");
    }

    #[test]
    fn test_disassemble_jump32() {
        let data = [0x1e, 0x21, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(disassemble(&data, false), "jeq32 %r1, %r2, +1\n");
    }

    #[test]
    fn test_disassemble_call_and_exit() {
        let call = [0x85, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00];
        assert_eq!(disassemble(&call, false), "call 0x1\n");

        let exit = [0x95, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(disassemble(&exit, false), "exit\n");
    }

    #[test]
    fn test_disassemble_call_local_has_no_warning() {
        let data = [0x85, 0x10, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00];
        let output = disassemble(&data, false);
        assert_eq!(output, "call local 0x3\n");
        assert!(!output.contains("Warnings"));
    }

    #[test]
    fn test_disassemble_lddw_consumes_two_slots() {
        let data = [
            0x18, 0x00, 0x00, 0x00, 0x89, 0x67, 0x45, 0x23, //
            0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
        ];
        let (line, increment) = disassemble_one(&data, 0, false);
        assert_eq!(line, "lddw %r0, 0x123456789");
        assert_eq!(increment, 16);
        assert_eq!(disassemble(&data, false), "lddw %r0, 0x123456789\n");
    }

    #[test]
    fn test_disassemble_truncated_lddw() {
        // missing continuation slot decodes to a marker and advances 8
        let data = [0x18, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00];
        let (line, increment) = disassemble_one(&data, 0, false);
        assert!(line.starts_with("unknown/unsupported special LOAD instruction code=18"));
        assert_eq!(increment, 8);
    }

    #[test]
    fn test_disassemble_unknown_load_mode() {
        let data = [0x30, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let output = disassemble(&data, false);
        assert!(output.starts_with("unknown/unsupported special LOAD instruction code=30"));
    }

    #[test]
    fn test_disassemble_unknown_sub_opcode() {
        // JMP class with sub-opcode 14
        let data = [0xe5, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let output = disassemble(&data, false);
        assert!(output.starts_with("unknown/unsupported instruction code=e5"));
    }

    #[test]
    fn test_warning_on_unused_field() {
        // exit with a destination register set
        let data = [0x95, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let output = disassemble(&data, false);
        assert!(output.starts_with("exit\n"));
        assert!(output.contains(
            "Warnings: The destination register field of the instruction has a value \
             but it is not used by the instruction."
        ));
    }

    #[test]
    fn test_warning_lists_every_unused_field() {
        // ja consumes only the offset; dst, src and imm are all leftovers
        let data = [0x05, 0x21, 0x01, 0x00, 0x07, 0x00, 0x00, 0x00];
        let output = disassemble(&data, false);
        let warning_line = output.lines().nth(1).unwrap();
        assert!(warning_line.contains("destination register"));
        assert!(warning_line.contains("source register"));
        assert!(warning_line.contains("immediate"));
        assert!(!warning_line.contains("The offset field"));
        assert_eq!(warning_line.matches("; ").count(), 2);
    }

    #[test]
    fn test_no_warning_when_fields_consumed() {
        let data = [0x61, 0x21, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(!disassemble(&data, false).contains("Warnings"));
    }

    #[test]
    fn test_verbose_details() {
        let data = [0xb7, 0x01, 0x00, 0x00, 0x2a, 0x00, 0x00, 0x00];
        let output = disassemble(&data, true);
        assert!(output.contains("mov %r1, 0x2a"));
        assert!(output.contains("Details:"));
        assert!(output.contains("\tClass: 0x7"));
        assert!(output.contains("\tRegs: 0x1"));
        assert!(output.contains("\tOffset: 0x0"));
        assert!(output.contains("\tImmediate: 0x2a"));
        assert!(output.contains("-----------------"));
    }

    #[test]
    fn test_trailing_fragment_is_ignored() {
        let data = [0x95, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xb7, 0x00];
        assert_eq!(disassemble(&data, false), "exit\n");
    }
}
