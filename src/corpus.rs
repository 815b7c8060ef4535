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

//! Corpus files and the differential conformance runner.
//!
//! A corpus file is a 4-byte little-endian length header, that many bytes of
//! bytecode, and an optional memory image. The runner feeds each program to
//! two conformance plugins and compares their stdout byte for byte.

use anyhow::{Context, Result, bail};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

// Size limits for the two corpus file sections (1 MiB each).
pub const MAX_INSTRUCTIONS_SIZE: u32 = 1024 * 1024;
pub const MAX_MEMORY_SIZE: usize = 1024 * 1024;

// Per-subprocess execution time limit.
pub const PLUGIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct CorpusProgram {
    pub instructions: Vec<u8>,
    pub memory: Vec<u8>,
}

/// Splits a corpus file into its bytecode and memory sections, validating
/// the length header against both the size cap and the actual payload.
pub fn read_corpus_file(path: &Path) -> Result<CorpusProgram> {
    let data =
        fs::read(path).with_context(|| format!("Error reading file {}", path.display()))?;

    if data.len() < 4 {
        bail!("Invalid file format (header too short): {}", path.display());
    }

    let instructions_length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    if instructions_length == 0 || instructions_length > MAX_INSTRUCTIONS_SIZE {
        bail!("Invalid instructions length: {}", instructions_length);
    }

    let instructions_length = instructions_length as usize;
    if data.len() - 4 < instructions_length {
        bail!("Truncated instructions in file: {}", path.display());
    }

    let instructions = data[4..4 + instructions_length].to_vec();
    let memory: Vec<u8> = data[4 + instructions_length..]
        .iter()
        .copied()
        .take(MAX_MEMORY_SIZE)
        .collect();

    Ok(CorpusProgram {
        instructions,
        memory,
    })
}

/// A conformance plugin: an executable plus its extra arguments.
pub struct Plugin {
    pub path: PathBuf,
    pub options: Vec<String>,
}

impl Plugin {
    pub fn new(path: PathBuf, options: &str) -> Plugin {
        Plugin {
            path,
            options: options.split_whitespace().map(str::to_string).collect(),
        }
    }
}

// Runs one plugin: the memory image (hex) and any plugin options as
// arguments, the instruction hex on stdin. Returns the captured stdout.
fn run_plugin(plugin: &Plugin, memory_hex: &str, instructions_hex: &str) -> Result<Vec<u8>> {
    let mut child = Command::new(&plugin.path)
        .arg(memory_hex)
        .args(&plugin.options)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Error running plugin: {}", plugin.path.display()))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(instructions_hex.as_bytes())?;
    }

    let deadline = Instant::now() + PLUGIN_TIMEOUT;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            bail!("Plugin timed out: {}", plugin.path.display());
        }
        thread::sleep(Duration::from_millis(50));
    };

    let mut output = Vec::new();
    if let Some(mut stdout) = child.stdout.take() {
        stdout.read_to_end(&mut output)?;
    }

    if !status.success() {
        let mut stderr_text = String::new();
        if let Some(mut stderr) = child.stderr.take() {
            let _ = stderr.read_to_string(&mut stderr_text);
        }
        bail!("Plugin failed with error: {}", stderr_text.trim_end());
    }

    Ok(output)
}

/// Runs every corpus file through both plugins. Returns `Ok(false)` on the
/// first output mismatch; corpus files that fail to parse or plugins that
/// error on a single program are reported and skipped.
pub fn run_corpus(
    plugin_a: &Plugin,
    plugin_b: &Plugin,
    corpus_dir: &Path,
    debug: bool,
) -> Result<bool> {
    for plugin in [plugin_a, plugin_b] {
        if !plugin.path.is_file() {
            bail!("Plugin not found: {}", plugin.path.display());
        }
    }
    if !corpus_dir.is_dir() {
        bail!("Corpus directory not found: {}", corpus_dir.display());
    }

    let mut corpus_files: Vec<PathBuf> = fs::read_dir(corpus_dir)
        .with_context(|| format!("Corpus directory is not readable: {}", corpus_dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    corpus_files.sort();

    if corpus_files.is_empty() {
        bail!("No files found in corpus directory: {}", corpus_dir.display());
    }

    for path in &corpus_files {
        let name = path.display();

        let program = match read_corpus_file(path) {
            Ok(program) => program,
            Err(error) => {
                println!("{:#}", error);
                continue;
            }
        };

        let instructions_hex = hex::encode(&program.instructions);
        let memory_hex = hex::encode(&program.memory);

        if debug {
            println!("Program: {}", name);
            println!("Instructions: {}", instructions_hex);
            println!("Memory: {}", memory_hex);
        }

        let output_a = match run_plugin(plugin_a, &memory_hex, &instructions_hex) {
            Ok(output) => output,
            Err(error) => {
                println!("{:#}", error);
                continue;
            }
        };
        let output_b = match run_plugin(plugin_b, &memory_hex, &instructions_hex) {
            Ok(output) => output,
            Err(error) => {
                println!("{:#}", error);
                continue;
            }
        };

        if output_a != output_b {
            println!("Mismatch found in program: {}", name);
            println!("Instructions: {}", instructions_hex);
            println!("Memory: {}", memory_hex);
            println!(
                "Output A ({}): {}",
                plugin_a.path.display(),
                String::from_utf8_lossy(&output_a)
            );
            println!(
                "Output B ({}): {}",
                plugin_b.path.display(),
                String::from_utf8_lossy(&output_b)
            );
            return Ok(false);
        }

        println!("Program: {} passed.", name);
    }

    Ok(true)
}
