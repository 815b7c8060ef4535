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

//! Fuzzer dictionary generator.
//!
//! Enumerates every encodable instruction with offset and immediate set to
//! zero and writes one line per instruction in the form
//! `<disassembly> ="\xHH\xHH..."`. Instructions whose disassembly would
//! carry a warning (a register field the opcode ignores, for instance) are
//! omitted, so the dictionary only contains cleanly-encoded seeds.

use crate::disassembler;
use crate::opcodes::BPF_CLS_LD;
use std::io::{self, Write};

const REGISTER_COUNT: u8 = 11;

fn emit_instruction<W: Write>(out: &mut W, opcode: u8) -> io::Result<()> {
    for src_reg in 0..REGISTER_COUNT {
        for dst_reg in 0..REGISTER_COUNT {
            let mut inst = vec![opcode, src_reg << 4 | dst_reg, 0, 0, 0, 0, 0, 0];

            // class-LD opcodes are two-slot candidates; give them the zero
            // continuation slot the disassembler expects
            if opcode & 7 == BPF_CLS_LD {
                inst.extend_from_slice(&[0u8; 8]);
            }

            let (line, _) = disassembler::disassemble_one(&inst, 0, false);
            if line.contains("Warnings") {
                continue;
            }

            write!(out, "{} =\"", line)?;
            for byte in &inst {
                write!(out, "\\x{:02x}", byte)?;
            }
            writeln!(out, "\"")?;
        }
    }

    Ok(())
}

/// Writes the full dictionary to `out`.
pub fn generate<W: Write>(out: &mut W) -> io::Result<()> {
    // load and store instructions: class, access size, addressing mode
    for class in 0..4u8 {
        for size in 0..4u8 {
            for mode in 0..8u8 {
                emit_instruction(out, class | size << 3 | mode << 5)?;
            }
        }
    }

    // ALU and jump instructions: class, source selector, sub-opcode
    for class in 4..8u8 {
        for source in 0..2u8 {
            for sub_opcode in 0..14u8 {
                emit_instruction(out, class | source << 3 | sub_opcode << 4)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generated() -> String {
        let mut buffer = Vec::new();
        generate(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_dictionary_contains_exit() {
        assert!(
            generated()
                .lines()
                .any(|line| line == "exit =\"\\x95\\x00\\x00\\x00\\x00\\x00\\x00\\x00\"")
        );
    }

    #[test]
    fn test_dictionary_lddw_has_sixteen_bytes() {
        let output = generated();
        let line = output
            .lines()
            .find(|line| line.starts_with("lddw %r0, "))
            .unwrap();
        assert_eq!(line.matches("\\x").count(), 16);
    }

    #[test]
    fn test_dictionary_has_no_warnings() {
        assert!(!generated().contains("Warnings"));
    }

    #[test]
    fn test_dictionary_omits_register_forms_with_stray_nibbles() {
        // `exit` uses neither register, so only the all-zero regs byte
        // survives for each of its four encodings (JMP/JMP32, either source
        // bit)
        let output = generated();
        let exit_lines: Vec<&str> = output
            .lines()
            .filter(|line| line.starts_with("exit ="))
            .collect();
        assert_eq!(exit_lines.len(), 4);
        for line in exit_lines {
            assert!(line.ends_with("\\x00\\x00\\x00\\x00\\x00\\x00\\x00\""));
        }
    }
}
