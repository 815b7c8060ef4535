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

mod ast_builder;

use crate::ast::AssemblyLine;
use crate::errors::AssemblyError;
use pest::Parser;
use pest_derive::Parser;

// Derive the parser from our grammar file.
#[derive(Parser)]
#[grammar = "./grammar.pest"]
pub struct BpfAsmParser;

// Main parsing function that takes the entire source code string.
pub fn parse_source(source: &str) -> Result<Vec<AssemblyLine>, AssemblyError> {
    let pairs = BpfAsmParser::parse(Rule::program, source)?;
    let mut lines = Vec::new();

    for statement in pairs.flatten().filter(|p| p.as_rule() == Rule::statement) {
        let line = ast_builder::build_statement(statement)?;

        // Only keep lines that carry something.
        if line.label.is_some() || line.instruction.is_some() {
            lines.push(line);
        }
    }

    Ok(lines)
}

// ------------- unit tests -------------
