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

mod encoder;
mod symbol_table;

use crate::ast::{AssemblyLine, Instruction, Operand};
use crate::errors::AssemblyError;
use crate::opcodes::{self, OpShape};
use symbol_table::*;

/// Pass 1: Build the symbol table.
///
/// Walks the parsed lines with a slot counter, recording each label at the
/// slot of the instruction that follows it. `lddw` advances the counter by
/// two, everything else by one.
pub fn build_symbol_table(lines: &[AssemblyLine]) -> Result<SymbolTable, AssemblyError> {
    let mut symbol_table = SymbolTable::new();
    let mut slot: usize = 0;

    for line in lines {
        // If a label exists on this line, record the current slot index.
        if let Some(label) = &line.label {
            if symbol_table.contains_key(label) {
                return Err(AssemblyError::DuplicateLabel(label.clone()));
            }

            symbol_table.insert(label.clone(), slot);
        }

        if let Some(instruction) = &line.instruction {
            slot += encoder::instruction_slots(instruction);
        }
    }

    Ok(symbol_table)
}

// Turns a branch target into a PC-relative slot offset. Numeric targets pass
// through untouched for backward compatibility with offset syntax.
fn resolve_branch_target(
    target: &Operand,
    current_slot: usize,
    symbol_table: &SymbolTable,
) -> Result<Operand, AssemblyError> {
    match target {
        Operand::Label(name) => {
            let target_slot = get_symbol(symbol_table, name)?;
            Ok(Operand::Immediate(
                target_slot as i64 - current_slot as i64 - 1,
            ))
        }
        other => Ok(other.clone()),
    }
}

// Replaces label references in an instruction with slot offsets, or for
// `call local` with the absolute slot index of the target.
fn resolve_labels(
    instruction: &Instruction,
    current_slot: usize,
    symbol_table: &SymbolTable,
) -> Result<Instruction, AssemblyError> {
    let mut resolved = instruction.clone();

    match instruction.mnemonic.as_str() {
        "ja" => {
            if let [target] = resolved.operands.as_mut_slice() {
                *target = resolve_branch_target(target, current_slot, symbol_table)?;
            }
        }
        "call" => {
            if let [Operand::Local, Operand::Label(name)] = resolved.operands.as_slice() {
                let target_slot = get_symbol(symbol_table, name)?;
                resolved.operands[1] = Operand::Immediate(target_slot as i64);
            }
        }
        mnemonic => {
            let is_cond_jump = opcodes::lookup(mnemonic)
                .is_some_and(|spec| spec.shape == OpShape::JumpCond);
            if is_cond_jump {
                if let [_, _, target] = resolved.operands.as_mut_slice() {
                    *target = resolve_branch_target(target, current_slot, symbol_table)?;
                }
            }
        }
    }

    Ok(resolved)
}

/// Pass 2: Resolve label references and generate the bytecode.
pub fn generate_bytecode(
    lines: &[AssemblyLine],
    symbol_table: &SymbolTable,
) -> Result<Vec<u8>, AssemblyError> {
    let mut bytecode = Vec::new();
    let mut slot: usize = 0;

    for line in lines {
        if let Some(instruction) = &line.instruction {
            let resolved = resolve_labels(instruction, slot, symbol_table)?;
            let instruction_bytes = encoder::encode_instruction(&resolved)?;
            bytecode.extend(instruction_bytes);
            slot += encoder::instruction_slots(instruction);
        }
    }

    Ok(bytecode)
}
