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

use anyhow::{Context, Result};
use bpfasm::corpus::{self, Plugin};
use bpfasm::{assemble, dictionary, disassemble};
use clap::Parser as clap_parser;
use clap::Subcommand;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process;

#[derive(clap_parser)]
#[clap(version = "0.1.0", author = "Connor Nolan")]
struct Opts {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble BPF assembly text into bytecode
    Asm {
        #[clap(short, long)]
        input: PathBuf,
        #[clap(short, long)]
        output: PathBuf,
    },
    /// Disassemble BPF bytecode into assembly text
    Disasm {
        #[clap(short, long)]
        input: PathBuf,
        /// Write to a file instead of stdout
        #[clap(short, long)]
        output: Option<PathBuf>,
        /// Append per-instruction field details
        #[clap(short, long)]
        verbose: bool,
    },
    /// Print a fuzzer dictionary of every cleanly-encodable instruction
    Dict,
    /// Run two conformance plugins against a corpus directory and compare
    /// their output
    RunCorpus {
        #[clap(long = "plugin_a")]
        plugin_a: PathBuf,
        #[clap(long = "options_a", default_value = "")]
        options_a: String,
        #[clap(long = "plugin_b")]
        plugin_b: PathBuf,
        #[clap(long = "options_b", default_value = "")]
        options_b: String,
        #[clap(long)]
        corpus: PathBuf,
        #[clap(long)]
        debug: bool,
    },
}

fn main() -> Result<()> {
    let opts: Opts = Opts::parse();

    match opts.command {
        Commands::Asm { input, output } => {
            let source = fs::read_to_string(&input)
                .with_context(|| format!("Failed to read input file: {}", input.display()))?;

            let bytecode = assemble(&source)?;

            fs::write(&output, bytecode)?;
            println!(
                "Successfully assembled {} to {}",
                input.display(),
                output.display()
            );
        }
        Commands::Disasm {
            input,
            output,
            verbose,
        } => {
            let data = fs::read(&input)
                .with_context(|| format!("Failed to read input file: {}", input.display()))?;

            let text = disassemble(&data, verbose);

            match output {
                Some(path) => fs::write(&path, text)?,
                None => print!("{}", text),
            }
        }
        Commands::Dict => {
            let stdout = io::stdout();
            dictionary::generate(&mut stdout.lock())?;
        }
        Commands::RunCorpus {
            plugin_a,
            options_a,
            plugin_b,
            options_b,
            corpus,
            debug,
        } => {
            let plugin_a = Plugin::new(plugin_a, &options_a);
            let plugin_b = Plugin::new(plugin_b, &options_b);

            let passed = corpus::run_corpus(&plugin_a, &plugin_b, &corpus, debug)?;
            if !passed {
                process::exit(1);
            }
        }
    }

    Ok(())
}
