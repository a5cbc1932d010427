// Copyright 2026 The Glacier Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! A stand-in for the bundled `trash`/`recycle-bin.exe`/block-clone helper
//! executables (spec.md §6), used by tests that exercise
//! [`glacier::io_context::helper`] discovery and invocation without a real
//! platform binary on `PATH`.
//!
//! Mirrors the shape of the teacher's fake external tool: a `clap`-parsed
//! binary whose behavior is selected by flags rather than by its name, so a
//! single executable can play the role of "helper succeeds", "helper exits
//! non-zero", and "helper writes to stderr" across different tests.

use std::io::Write as _;

use clap::Parser;

#[derive(Parser, Debug)]
struct Args {
    /// Path the helper is asked to act on (mirrors the one argument the real
    /// `trash` helper receives).
    target: Option<String>,

    /// Exit with this code instead of 0.
    #[arg(long, default_value_t = 0)]
    exit_code: i32,

    /// Write this text to stderr before exiting.
    #[arg(long, default_value = "")]
    stderr_message: String,

    /// Leave `target` on disk instead of removing it. By default this helper
    /// removes its target, standing in for a real trash/recycle-bin call.
    #[arg(long, default_value_t = false)]
    keep: bool,
}

fn main() {
    let args = Args::parse();

    if !args.stderr_message.is_empty() {
        let _ = writeln!(std::io::stderr(), "{}", args.stderr_message);
    }

    if !args.keep {
        if let Some(target) = &args.target {
            let _ = std::fs::remove_file(target);
        }
    }

    std::process::exit(args.exit_code);
}
