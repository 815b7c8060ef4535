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

use crate::errors::AssemblyError;
use std::collections::HashMap;

// The symbol table stores label names and their instruction slot indices.
// Slots are 0-based 8-byte positions; `lddw` occupies two consecutive slots
// and a label in front of it refers to the first.
pub type SymbolTable = HashMap<String, usize>;

pub fn get_symbol(symbol_table: &SymbolTable, label_name: &str) -> Result<usize, AssemblyError> {
    let target_slot = symbol_table
        .get(label_name)
        .ok_or_else(|| AssemblyError::UndefinedLabel(label_name.to_string()))?;

    Ok(*target_slot)
}
