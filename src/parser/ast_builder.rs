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

use super::Rule;
use crate::ast::{AssemblyLine, Instruction, Operand, Register};
use crate::errors::AssemblyError;
use crate::opcodes::{self, OpShape};
use pest::iterators::Pair;

pub fn build_statement(pair: Pair<Rule>) -> Result<AssemblyLine, AssemblyError> {
    let line_number = pair.as_span().start_pos().line_col().0;
    let mut assembly_line = AssemblyLine {
        line_number,
        ..AssemblyLine::default()
    };

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::label_def => {
                assembly_line.label =
                    Some(part.into_inner().next().unwrap().as_str().to_string());
            }
            Rule::call_local => {
                assembly_line.instruction = Some(build_call_local(part, line_number)?);
            }
            Rule::plain_inst => {
                assembly_line.instruction = Some(build_instruction(part, line_number)?);
            }
            _ => {}
        }
    }

    Ok(assembly_line)
}

fn build_call_local(pair: Pair<Rule>, line: usize) -> Result<Instruction, AssemblyError> {
    // inner pairs are the `local` keyword followed by the branch target
    let target = pair.into_inner().last().unwrap();
    let target = match target.as_rule() {
        Rule::number => Operand::Immediate(parse_number(target.as_str(), line)?),
        _ => Operand::Label(target.as_str().to_string()),
    };

    Ok(Instruction {
        mnemonic: "call".to_string(),
        operands: vec![Operand::Local, target],
    })
}

fn build_instruction(pair: Pair<Rule>, line: usize) -> Result<Instruction, AssemblyError> {
    let mut parts = pair.into_inner();
    let mnemonic = parts.next().unwrap().as_str().to_string();

    let mut operands = Vec::new();
    for operand in parts {
        operands.push(build_operand(operand, line)?);
    }

    let instruction = Instruction { mnemonic, operands };
    check_operand_shape(&instruction, line)?;

    Ok(instruction)
}

fn build_operand(pair: Pair<Rule>, line: usize) -> Result<Operand, AssemblyError> {
    match pair.as_rule() {
        Rule::register => Ok(Operand::Register(build_register(&pair, line)?)),
        Rule::memory_ref => build_memory_ref(pair, line),
        Rule::number => Ok(Operand::Immediate(parse_number(pair.as_str(), line)?)),
        Rule::ident => Ok(Operand::Label(pair.as_str().to_string())),
        rule => Err(AssemblyError::StructuralError {
            line,
            reason: format!("Unexpected operand rule: {:?}", rule),
        }),
    }
}

fn build_register(pair: &Pair<Rule>, line: usize) -> Result<Register, AssemblyError> {
    let text = pair.as_str();
    let index = text
        .trim_start_matches("%r")
        .parse::<u8>()
        .ok()
        .and_then(Register::new);

    index.ok_or_else(|| AssemblyError::StructuralError {
        line,
        reason: format!("Invalid register {}, registers are %r0-%r10.", text),
    })
}

fn build_memory_ref(pair: Pair<Rule>, line: usize) -> Result<Operand, AssemblyError> {
    let mut inner = pair.into_inner();
    let base = build_register(&inner.next().unwrap(), line)?;

    let offset = match inner.next() {
        Some(disp) => {
            let text = disp.as_str();
            let value = parse_number(text, line)?;
            i16::try_from(value).map_err(|_| AssemblyError::StructuralError {
                line,
                reason: format!(
                    "Memory offset {} out of range, must fit in a signed 16-bit value.",
                    text
                ),
            })?
        }
        None => 0,
    };

    Ok(Operand::Memory { base, offset })
}

// Immediates are decimal or 0x-prefixed hexadecimal with an optional sign.
// Hexadecimal values are read as raw 64-bit patterns so `lddw` can carry a
// full doubleword.
fn parse_number(text: &str, line: usize) -> Result<i64, AssemblyError> {
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let magnitude = match rest.strip_prefix("0x") {
        Some(digits) => u64::from_str_radix(digits, 16),
        None => rest.parse::<u64>(),
    }
    .map_err(|_| AssemblyError::StructuralError {
        line,
        reason: format!("Immediate value out of range: {}", text),
    })?;

    let value = magnitude as i64;
    Ok(if negative { value.wrapping_neg() } else { value })
}

// Validates operand lists against the opcode table's shapes. Unknown
// mnemonics flow through untouched so the encoder can report them.
fn check_operand_shape(instruction: &Instruction, line: usize) -> Result<(), AssemblyError> {
    use Operand::*;

    let operands = instruction.operands.as_slice();

    let ok = match instruction.mnemonic.as_str() {
        "lddw" => matches!(operands, [Register(_), Immediate(_)]),
        mnemonic => {
            let Some(spec) = opcodes::lookup(mnemonic) else {
                return Ok(());
            };
            match spec.shape {
                OpShape::MemLoad => matches!(operands, [Register(_), Memory { .. }]),
                OpShape::MemStoreImm => matches!(operands, [Memory { .. }, Immediate(_)]),
                OpShape::MemStoreReg => matches!(operands, [Memory { .. }, Register(_)]),
                OpShape::AluUnary | OpShape::Endian(_) => matches!(operands, [Register(_)]),
                OpShape::AluBinary => {
                    matches!(operands, [Register(_), Register(_) | Immediate(_)])
                }
                OpShape::JumpCond => matches!(
                    operands,
                    [
                        Register(_),
                        Register(_) | Immediate(_),
                        Immediate(_) | Label(_),
                    ]
                ),
                OpShape::Ja => matches!(operands, [Immediate(_) | Label(_)]),
                OpShape::Call => {
                    matches!(operands, [Immediate(_)])
                        || matches!(operands, [Local, Immediate(_) | Label(_)])
                }
                OpShape::Exit => operands.is_empty(),
            }
        }
    };

    if ok {
        Ok(())
    } else {
        Err(AssemblyError::StructuralError {
            line,
            reason: format!(
                "Malformed operands for '{}' instruction.",
                instruction.mnemonic
            ),
        })
    }
}
