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

/// One of the eleven BPF general-purpose registers, %r0-%r10.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Register(u8);

impl Register {
    pub const MAX_INDEX: u8 = 10;

    pub fn new(index: u8) -> Option<Register> {
        if index <= Register::MAX_INDEX {
            Some(Register(index))
        } else {
            None
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

// Represents all possible forms an argument to an instruction can take.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Register(Register),
    Immediate(i64),
    Memory { base: Register, offset: i16 }, // e.g., [%r1+8] or [%r2-4]
    Label(String),                          // e.g., my_label
    Local,                                  // the `local` marker of `call local my_label`
}

// A single instruction as parsed from the source text. The mnemonic stays a
// plain string so that unknown mnemonics flow through to the encoder, which
// owns the "unexpected instruction" error.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub mnemonic: String,
    pub operands: Vec<Operand>,
}

// --- Assembly Line Structure ---

// Represents a single line of code, which can have a label, an instruction, or both.
#[derive(Debug, Clone, Default)]
pub struct AssemblyLine {
    pub line_number: usize,
    pub label: Option<String>,
    pub instruction: Option<Instruction>,
}
