//! Build automation tasks for the connpool workspace.
//!
//! Run with `cargo xtask <command>`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

#[derive(Parser)]
#[command(name = "xtask", about = "Build automation for connpool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run fmt, clippy, tests and docs in sequence
    Ci,
    /// Check formatting
    Fmt,
    /// Run clippy on every target with all features
    Clippy,
    /// Run the test suite, including the `tokio` feature
    Test {
        /// Repeat the suite to shake out timing-dependent failures
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },
    /// Build the API docs
    Doc,
    /// Run the checkout benchmarks
    Bench,
    /// Run a fuzz target (requires cargo-fuzz and a nightly toolchain)
    Fuzz {
        /// Fuzz target name
        #[arg(default_value = "checkout_sequence")]
        target: String,
        /// Stop after this many seconds
        #[arg(long, default_value_t = 60)]
        seconds: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;
    sh.change_dir(workspace_root()?);

    match cli.command {
        Command::Ci => {
            fmt(&sh)?;
            clippy(&sh)?;
            test(&sh, 1)?;
            doc(&sh)?;
            println!("CI checks passed.");
        }
        Command::Fmt => fmt(&sh)?,
        Command::Clippy => clippy(&sh)?,
        Command::Test { repeat } => test(&sh, repeat)?,
        Command::Doc => doc(&sh)?,
        Command::Bench => {
            println!("==> bench");
            cmd!(sh, "cargo bench -p connpool").run()?;
        }
        Command::Fuzz { target, seconds } => fuzz(&sh, &target, seconds)?,
    }

    Ok(())
}

fn workspace_root() -> Result<PathBuf> {
    let output = std::process::Command::new("cargo")
        .args(["locate-project", "--workspace", "--message-format=plain"])
        .output()
        .context("failed to run cargo locate-project")?;

    let manifest = String::from_utf8(output.stdout).context("invalid UTF-8 in cargo output")?;

    Ok(PathBuf::from(manifest.trim())
        .parent()
        .context("failed to get workspace root")?
        .to_path_buf())
}

fn fmt(sh: &Shell) -> Result<()> {
    println!("==> fmt");
    cmd!(sh, "cargo fmt --all -- --check").run()?;
    Ok(())
}

fn clippy(sh: &Shell) -> Result<()> {
    println!("==> clippy");
    cmd!(sh, "cargo clippy --workspace --all-features --all-targets -- -D warnings").run()?;
    Ok(())
}

fn test(sh: &Shell, repeat: u32) -> Result<()> {
    for round in 1..=repeat.max(1) {
        println!("==> test (round {round}/{repeat})");
        cmd!(sh, "cargo test --workspace --all-features")
            .run()
            .with_context(|| format!("test round {round} failed"))?;
    }
    Ok(())
}

fn doc(sh: &Shell) -> Result<()> {
    println!("==> doc");
    cmd!(sh, "cargo doc --workspace --all-features --no-deps").run()?;
    Ok(())
}

fn fuzz(sh: &Shell, target: &str, seconds: u64) -> Result<()> {
    println!("==> fuzz {target} ({seconds}s)");
    let _dir = sh.push_dir("fuzz");
    let max_time = format!("-max_total_time={seconds}");
    cmd!(sh, "cargo +nightly fuzz run {target} -- {max_time}").run()?;
    Ok(())
}
