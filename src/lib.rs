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

pub mod assembler;
pub mod ast;
pub mod corpus;
pub mod dictionary;
pub mod disassembler;
pub mod errors;
pub mod opcodes;
pub mod parser;

use anyhow::{Context, Result};

extern crate pest;
extern crate pest_derive;

/// Assembles BPF assembly source text into bytecode.
///
/// Two passes over the parsed lines: the first indexes every label by
/// instruction slot, the second resolves label references and encodes. The
/// output length is always a multiple of 8, with `lddw` contributing two
/// slots. The first error aborts the assembly; no partial output is
/// returned.
pub fn assemble(source: &str) -> Result<Vec<u8>> {
    let parsed_lines = parser::parse_source(source).context("Failed during parsing stage")?;

    let symbol_table = assembler::build_symbol_table(&parsed_lines)
        .context("Failed during assembler pass 1")?;

    let bytecode = assembler::generate_bytecode(&parsed_lines, &symbol_table)
        .context("Failed during assembler pass 2")?;

    Ok(bytecode)
}

/// Disassembles BPF bytecode into one text line per instruction. Malformed
/// instructions render as marker lines instead of failing.
pub fn disassemble(data: &[u8], verbose: bool) -> String {
    disassembler::disassemble(data, verbose)
}
