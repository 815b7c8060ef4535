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

//! The shared opcode table of the 64-bit BPF instruction set.
//!
//! Every opcode byte carries its instruction class in the low 3 bits. Load
//! and store classes put an access size in bits 3-4 and an addressing mode
//! in bits 5-7; ALU and jump classes put a source selector in bit 3 and a
//! sub-opcode in bits 4-7. The encoder resolves mnemonics through
//! [`lookup`]; the disassembler walks the same data backwards through the
//! `*_name` helpers.

// Instruction classes, low 3 bits of the opcode.
pub const BPF_CLS_LD: u8 = 0x00;
pub const BPF_CLS_LDX: u8 = 0x01;
pub const BPF_CLS_ST: u8 = 0x02;
pub const BPF_CLS_STX: u8 = 0x03;
pub const BPF_CLS_ALU32: u8 = 0x04;
pub const BPF_CLS_JMP: u8 = 0x05;
pub const BPF_CLS_JMP32: u8 = 0x06;
pub const BPF_CLS_ALU64: u8 = 0x07;

// Memory access widths, bits 3-4 of the load/store opcodes.
pub const SIZE_W: u8 = 0;
pub const SIZE_H: u8 = 1;
pub const SIZE_B: u8 = 2;
pub const SIZE_DW: u8 = 3;

// Memory addressing modes, bits 5-7 of the load/store opcodes.
pub const MODE_MEM: u8 = 3;
pub const MODE_MEMSX: u8 = 4;

// Base opcodes of the load/store families; the size is OR'd into bits 3-4.
pub const MEM_LOAD_BASE: u8 = 0x61;
pub const MEM_LOAD_SX_BASE: u8 = 0x81;
pub const MEM_STORE_IMM_BASE: u8 = 0x62;
pub const MEM_STORE_REG_BASE: u8 = 0x63;

// First slot of the two-slot 64-bit immediate load.
pub const LDDW_OPCODE: u8 = 0x18;

// ALU/JMP opcodes: bit 3 selects the source operand (0 = immediate,
// 1 = register), bits 4-7 carry the sub-opcode.
pub const SOURCE_BIT: u8 = 0x08;
pub const ALU_SUB_NEG: u8 = 8;
pub const ALU_SUB_END: u8 = 13;
pub const JMP_SUB_JA: u8 = 0;
pub const JMP_SUB_CALL: u8 = 8;
pub const JMP_SUB_EXIT: u8 = 9;

// Source-register nibble marking a call as intra-program.
pub const CALL_SRC_LOCAL: u8 = 1;

/// Operand shape of a mnemonic. The parser validates operand lists against
/// it, the encoder dispatches on it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OpShape {
    /// `ldx<size> %rd, [%rs+off]`
    MemLoad,
    /// `st<size> [%rd+off], imm`
    MemStoreImm,
    /// `stx<size> [%rd+off], %rs`
    MemStoreReg,
    /// `neg %rd`
    AluUnary,
    /// `add %rd, {%rs | imm}`
    AluBinary,
    /// `le16 %rd` and friends; the width travels in the immediate field.
    Endian(u32),
    /// `jeq %rd, {%rs | imm}, offset`
    JumpCond,
    /// `ja offset`
    Ja,
    /// `call imm` or `call local target`
    Call,
    /// `exit`
    Exit,
}

/// Flattened opcode-table entry for one mnemonic.
#[derive(Debug, Copy, Clone)]
pub struct OpSpec {
    /// Base opcode, before the source bit is applied for register forms.
    pub opcode: u8,
    pub shape: OpShape,
    /// Offset-field override; 1 for the signed division/modulo family.
    pub offset: u16,
}

const fn op(opcode: u8, shape: OpShape) -> OpSpec {
    OpSpec {
        opcode,
        shape,
        offset: 0,
    }
}

const fn mem(base: u8, size: u8, shape: OpShape) -> OpSpec {
    op(base | size << 3, shape)
}

const fn alu(cls: u8, sub: u8) -> OpSpec {
    op(cls | sub << 4, OpShape::AluBinary)
}

const fn signed_alu(cls: u8, sub: u8) -> OpSpec {
    OpSpec {
        opcode: cls | sub << 4,
        shape: OpShape::AluBinary,
        offset: 1,
    }
}

const fn jmp(sub: u8) -> OpSpec {
    op(BPF_CLS_JMP | sub << 4, OpShape::JumpCond)
}

const fn endian(opcode: u8, width: u32) -> OpSpec {
    op(opcode, OpShape::Endian(width))
}

/// One lookup for every assembler mnemonic except `lddw`, which has its own
/// two-slot encoding path.
pub fn lookup(mnemonic: &str) -> Option<OpSpec> {
    use OpShape::*;

    let spec = match mnemonic {
        // memory loads, zero-extending
        "ldxw" => mem(MEM_LOAD_BASE, SIZE_W, MemLoad),
        "ldxh" => mem(MEM_LOAD_BASE, SIZE_H, MemLoad),
        "ldxb" => mem(MEM_LOAD_BASE, SIZE_B, MemLoad),
        "ldxdw" => mem(MEM_LOAD_BASE, SIZE_DW, MemLoad),

        // memory loads, sign-extending (no doubleword form)
        "ldxsw" => mem(MEM_LOAD_SX_BASE, SIZE_W, MemLoad),
        "ldxsh" => mem(MEM_LOAD_SX_BASE, SIZE_H, MemLoad),
        "ldxsb" => mem(MEM_LOAD_SX_BASE, SIZE_B, MemLoad),

        // memory stores from an immediate
        "stw" => mem(MEM_STORE_IMM_BASE, SIZE_W, MemStoreImm),
        "sth" => mem(MEM_STORE_IMM_BASE, SIZE_H, MemStoreImm),
        "stb" => mem(MEM_STORE_IMM_BASE, SIZE_B, MemStoreImm),
        "stdw" => mem(MEM_STORE_IMM_BASE, SIZE_DW, MemStoreImm),

        // memory stores from a register
        "stxw" => mem(MEM_STORE_REG_BASE, SIZE_W, MemStoreReg),
        "stxh" => mem(MEM_STORE_REG_BASE, SIZE_H, MemStoreReg),
        "stxb" => mem(MEM_STORE_REG_BASE, SIZE_B, MemStoreReg),
        "stxdw" => mem(MEM_STORE_REG_BASE, SIZE_DW, MemStoreReg),

        // unary ALU
        "neg" => op(BPF_CLS_ALU64 | (ALU_SUB_NEG) << 4, AluUnary),
        "neg32" => op(BPF_CLS_ALU32 | (ALU_SUB_NEG) << 4, AluUnary),

        // binary ALU, 64-bit
        "add" => alu(BPF_CLS_ALU64, 0),
        "sub" => alu(BPF_CLS_ALU64, 1),
        "mul" => alu(BPF_CLS_ALU64, 2),
        "div" => alu(BPF_CLS_ALU64, 3),
        "or" => alu(BPF_CLS_ALU64, 4),
        "and" => alu(BPF_CLS_ALU64, 5),
        "lsh" => alu(BPF_CLS_ALU64, 6),
        "rsh" => alu(BPF_CLS_ALU64, 7),
        "mod" => alu(BPF_CLS_ALU64, 9),
        "xor" => alu(BPF_CLS_ALU64, 10),
        "mov" => alu(BPF_CLS_ALU64, 11),
        "arsh" => alu(BPF_CLS_ALU64, 12),

        // binary ALU, 32-bit
        "add32" => alu(BPF_CLS_ALU32, 0),
        "sub32" => alu(BPF_CLS_ALU32, 1),
        "mul32" => alu(BPF_CLS_ALU32, 2),
        "div32" => alu(BPF_CLS_ALU32, 3),
        "or32" => alu(BPF_CLS_ALU32, 4),
        "and32" => alu(BPF_CLS_ALU32, 5),
        "lsh32" => alu(BPF_CLS_ALU32, 6),
        "rsh32" => alu(BPF_CLS_ALU32, 7),
        "mod32" => alu(BPF_CLS_ALU32, 9),
        "xor32" => alu(BPF_CLS_ALU32, 10),
        "mov32" => alu(BPF_CLS_ALU32, 11),
        "arsh32" => alu(BPF_CLS_ALU32, 12),

        // signed division and modulo share the unsigned sub-opcodes but set
        // the offset field to 1
        "sdiv" => signed_alu(BPF_CLS_ALU64, 3),
        "smod" => signed_alu(BPF_CLS_ALU64, 9),
        "sdiv32" => signed_alu(BPF_CLS_ALU32, 3),
        "smod32" => signed_alu(BPF_CLS_ALU32, 9),

        // endianness conversions and byte swaps
        "le16" => endian(0xd4, 16),
        "le32" => endian(0xd4, 32),
        "le64" => endian(0xd4, 64),
        "be16" => endian(0xdc, 16),
        "be32" => endian(0xdc, 32),
        "be64" => endian(0xdc, 64),
        "bswap16" => endian(0xd7, 16),
        "bswap32" => endian(0xd7, 32),
        "bswap64" => endian(0xd7, 64),

        // conditional jumps
        "jeq" => jmp(1),
        "jgt" => jmp(2),
        "jge" => jmp(3),
        "jset" => jmp(4),
        "jne" => jmp(5),
        "jsgt" => jmp(6),
        "jsge" => jmp(7),
        "jlt" => jmp(10),
        "jle" => jmp(11),
        "jslt" => jmp(12),
        "jsle" => jmp(13),

        // unconditional control flow
        "ja" => op(BPF_CLS_JMP | (JMP_SUB_JA) << 4, Ja),
        "call" => op(BPF_CLS_JMP | (JMP_SUB_CALL) << 4, Call),
        "exit" => op(BPF_CLS_JMP | (JMP_SUB_EXIT) << 4, Exit),

        _ => return None,
    };

    Some(spec)
}

// --- reverse direction, used by the disassembler ---

pub const CLASS_NAMES: [&str; 8] = ["ld", "ldx", "st", "stx", "alu", "jmp", "jmp32", "alu64"];

pub const SIZE_SUFFIXES: [&str; 4] = ["w", "h", "b", "dw"];

pub fn alu_op_name(sub: u8) -> Option<&'static str> {
    let name = match sub {
        0 => "add",
        1 => "sub",
        2 => "mul",
        3 => "div",
        4 => "or",
        5 => "and",
        6 => "lsh",
        7 => "rsh",
        8 => "neg",
        9 => "mod",
        10 => "xor",
        11 => "mov",
        12 => "arsh",
        _ => return None,
    };
    Some(name)
}

pub fn jmp_op_name(sub: u8) -> Option<&'static str> {
    let name = match sub {
        0 => "ja",
        1 => "jeq",
        2 => "jgt",
        3 => "jge",
        4 => "jset",
        5 => "jne",
        6 => "jsgt",
        7 => "jsge",
        8 => "call",
        9 => "exit",
        10 => "jlt",
        11 => "jle",
        12 => "jslt",
        13 => "jsle",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_load_opcodes() {
        assert_eq!(lookup("ldxw").unwrap().opcode, 0x61);
        assert_eq!(lookup("ldxh").unwrap().opcode, 0x69);
        assert_eq!(lookup("ldxb").unwrap().opcode, 0x71);
        assert_eq!(lookup("ldxdw").unwrap().opcode, 0x79);
    }

    #[test]
    fn test_mem_load_sx_opcodes() {
        assert_eq!(lookup("ldxsw").unwrap().opcode, 0x81);
        assert_eq!(lookup("ldxsh").unwrap().opcode, 0x89);
        assert_eq!(lookup("ldxsb").unwrap().opcode, 0x91);
        assert!(lookup("ldxsdw").is_none());
    }

    #[test]
    fn test_mem_store_opcodes() {
        assert_eq!(lookup("stw").unwrap().opcode, 0x62);
        assert_eq!(lookup("stdw").unwrap().opcode, 0x7a);
        assert_eq!(lookup("stxb").unwrap().opcode, 0x73);
        assert_eq!(lookup("stxdw").unwrap().opcode, 0x7b);
    }

    #[test]
    fn test_alu_opcodes() {
        assert_eq!(lookup("add").unwrap().opcode, 0x07);
        assert_eq!(lookup("mov").unwrap().opcode, 0xb7);
        assert_eq!(lookup("arsh32").unwrap().opcode, 0xc4);
        assert_eq!(lookup("neg").unwrap().opcode, 0x87);
        assert_eq!(lookup("neg32").unwrap().opcode, 0x84);
    }

    #[test]
    fn test_signed_alu_offset_override() {
        let sdiv = lookup("sdiv").unwrap();
        assert_eq!(sdiv.opcode, lookup("div").unwrap().opcode);
        assert_eq!(sdiv.offset, 1);

        let smod32 = lookup("smod32").unwrap();
        assert_eq!(smod32.opcode, lookup("mod32").unwrap().opcode);
        assert_eq!(smod32.offset, 1);

        assert_eq!(lookup("div").unwrap().offset, 0);
    }

    #[test]
    fn test_endian_opcodes() {
        assert_eq!(lookup("le16").unwrap().opcode, 0xd4);
        assert_eq!(lookup("be64").unwrap().opcode, 0xdc);
        assert_eq!(lookup("bswap32").unwrap().opcode, 0xd7);
        assert_eq!(lookup("le32").unwrap().shape, OpShape::Endian(32));
    }

    #[test]
    fn test_jump_opcodes() {
        assert_eq!(lookup("jeq").unwrap().opcode, 0x15);
        assert_eq!(lookup("jne").unwrap().opcode, 0x55);
        assert_eq!(lookup("jsle").unwrap().opcode, 0xd5);
        assert_eq!(lookup("ja").unwrap().opcode, 0x05);
        assert_eq!(lookup("call").unwrap().opcode, 0x85);
        assert_eq!(lookup("exit").unwrap().opcode, 0x95);
    }

    #[test]
    fn test_unknown_mnemonic() {
        assert!(lookup("frobnicate").is_none());
        assert!(lookup("lddw").is_none());
    }

    #[test]
    fn test_reverse_names() {
        assert_eq!(alu_op_name(11), Some("mov"));
        assert_eq!(alu_op_name(14), None);
        assert_eq!(jmp_op_name(5), Some("jne"));
        assert_eq!(jmp_op_name(15), None);
        assert_eq!(CLASS_NAMES[BPF_CLS_LDX as usize], "ldx");
        assert_eq!(SIZE_SUFFIXES[SIZE_DW as usize], "dw");
    }
}
