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

use crate::ast::{Instruction, Operand};
use crate::errors::AssemblyError;
use crate::opcodes::{self, OpShape, OpSpec};

/// Helper function to determine how many 8-byte slots an instruction
/// occupies during Pass 1. `lddw` is the only two-slot instruction.
pub fn instruction_slots(instruction: &Instruction) -> usize {
    if instruction.mnemonic == "lddw" { 2 } else { 1 }
}

/// Packs one 8-byte instruction slot, little-endian. Wider offset and
/// immediate values truncate silently; range checks happen at parse time.
fn pack(opcode: u8, dst: u8, src: u8, offset: i64, imm: i64) -> [u8; 8] {
    let mut slot = [0u8; 8];
    slot[0] = opcode;
    slot[1] = dst & 0x0f | src << 4;
    slot[2..4].copy_from_slice(&(offset as u16).to_le_bytes());
    slot[4..8].copy_from_slice(&(imm as u32).to_le_bytes());
    slot
}

fn register_operand(op: &Operand) -> Result<u8, AssemblyError> {
    match op {
        Operand::Register(reg) => Ok(reg.number()),
        _ => Err(AssemblyError::StructuralErrorNoLine {
            reason: "Expected a register operand.".to_string(),
        }),
    }
}

fn immediate_operand(op: &Operand) -> Result<i64, AssemblyError> {
    match op {
        Operand::Immediate(value) => Ok(*value),
        _ => Err(AssemblyError::StructuralErrorNoLine {
            reason: "Expected an immediate operand.".to_string(),
        }),
    }
}

fn memory_operand(op: &Operand) -> Result<(u8, i16), AssemblyError> {
    match op {
        Operand::Memory { base, offset } => Ok((base.number(), *offset)),
        _ => Err(AssemblyError::StructuralErrorNoLine {
            reason: "Expected a memory reference operand.".to_string(),
        }),
    }
}

// Shared form of the register-or-immediate ALU and jump instructions: the
// register form sets the source bit and the source nibble, the immediate
// form carries the value in the immediate field.
fn encode_binop(spec: &OpSpec, dst: u8, src: &Operand, offset: i64) -> Result<[u8; 8], AssemblyError> {
    match src {
        Operand::Register(reg) => Ok(pack(
            spec.opcode | opcodes::SOURCE_BIT,
            dst,
            reg.number(),
            offset,
            0,
        )),
        Operand::Immediate(value) => Ok(pack(spec.opcode, dst, 0, offset, *value)),
        _ => Err(AssemblyError::StructuralErrorNoLine {
            reason: "Expected a register or immediate operand.".to_string(),
        }),
    }
}

/// Helper function to translate a single resolved instruction into bytes
/// during Pass 2. Emits 8 bytes, or 16 for `lddw`.
pub fn encode_instruction(instruction: &Instruction) -> Result<Vec<u8>, AssemblyError> {
    let mnemonic = instruction.mnemonic.as_str();
    let operands = instruction.operands.as_slice();

    // The 64-bit immediate load spans two slots: the low half in the first,
    // the high half in a continuation slot with opcode 0.
    if mnemonic == "lddw" {
        let dst = register_operand(&operands[0])?;
        let value = immediate_operand(&operands[1])?;
        let mut bytes = pack(opcodes::LDDW_OPCODE, dst, 0, 0, value).to_vec();
        bytes.extend_from_slice(&pack(0, 0, 0, 0, value >> 32));
        return Ok(bytes);
    }

    let spec = opcodes::lookup(mnemonic)
        .ok_or_else(|| AssemblyError::UnexpectedInstruction(mnemonic.to_string()))?;

    let slot = match spec.shape {
        OpShape::MemLoad => {
            let dst = register_operand(&operands[0])?;
            let (base, offset) = memory_operand(&operands[1])?;
            pack(spec.opcode, dst, base, offset as i64, 0)
        }
        OpShape::MemStoreImm => {
            let (base, offset) = memory_operand(&operands[0])?;
            let value = immediate_operand(&operands[1])?;
            pack(spec.opcode, base, 0, offset as i64, value)
        }
        OpShape::MemStoreReg => {
            let (base, offset) = memory_operand(&operands[0])?;
            let src = register_operand(&operands[1])?;
            pack(spec.opcode, base, src, offset as i64, 0)
        }
        OpShape::AluUnary => {
            let dst = register_operand(&operands[0])?;
            pack(spec.opcode, dst, 0, 0, 0)
        }
        OpShape::AluBinary => {
            let dst = register_operand(&operands[0])?;
            encode_binop(&spec, dst, &operands[1], spec.offset as i64)?
        }
        OpShape::Endian(width) => {
            let dst = register_operand(&operands[0])?;
            pack(spec.opcode, dst, 0, 0, width as i64)
        }
        OpShape::JumpCond => {
            let dst = register_operand(&operands[0])?;
            let offset = immediate_operand(&operands[2])?;
            encode_binop(&spec, dst, &operands[1], offset)?
        }
        OpShape::Ja => {
            let offset = immediate_operand(&operands[0])?;
            pack(spec.opcode, 0, 0, offset, 0)
        }
        OpShape::Call => match operands {
            [Operand::Local, target] => {
                let value = immediate_operand(target)?;
                pack(spec.opcode, 0, opcodes::CALL_SRC_LOCAL, 0, value)
            }
            _ => {
                let value = immediate_operand(&operands[0])?;
                pack(spec.opcode, 0, 0, 0, value)
            }
        },
        OpShape::Exit => pack(spec.opcode, 0, 0, 0, 0),
    };

    Ok(slot.to_vec())
}
