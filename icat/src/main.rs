//! icat - Print images in terminals supporting the Kitty graphics protocol
//!
//! `icat image.png` is equivalent to
//! `kitten icat --transfer-mode=stream --align=left image.png`.

use anyhow::{Context, Result};
use clap::Parser;
use icat_core::{transcode_named, Config};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

/// Print images in Kitty/Ghostty terminals
#[derive(Parser, Debug)]
#[command(name = "icat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Image files; reads standard input when omitted or "-"
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Path to the configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Args {
    /// Standard input is read only when it is not a terminal and no file
    /// (or a single "-") was named. Otherwise the files are printed, which
    /// for a bare `icat` on a terminal prints nothing.
    fn reads_stdin(&self, stdin_is_terminal: bool) -> bool {
        if stdin_is_terminal {
            return false;
        }
        match self.files.as_slice() {
            [] => true,
            [only] => only.as_os_str() == "-",
            _ => false,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let stdin = io::stdin();
    let result = if args.reads_stdin(stdin.is_terminal()) {
        print_stream(&mut out, &config, stdin.lock(), "")
    } else {
        args.files
            .iter()
            .try_for_each(|path| print_file(&mut out, &config, path))
    };

    // Whatever was transmitted before a failure still goes out
    out.flush().context("Failed to flush output")?;
    result
}

/// Transcode one file, enforcing the configured size limit
fn print_file<W: Write>(out: &mut W, config: &Config, path: &Path) -> Result<()> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let size = file
        .metadata()
        .with_context(|| format!("Failed to read metadata of {}", path.display()))?
        .len();
    if size > config.input.max_bytes {
        anyhow::bail!(
            "{}: file is {} bytes, over the {} byte limit",
            path.display(),
            size,
            config.input.max_bytes
        );
    }

    log::info!("transcoding {} ({} bytes)", path.display(), size);
    print_stream(out, config, BufReader::new(file), &path.display().to_string())
}

fn print_stream<W: Write, R: Read>(out: &mut W, config: &Config, r: R, name: &str) -> Result<()> {
    transcode_named(&mut *out, r, name)?;
    if config.output.trailing_newline {
        out.write_all(b"\n")?;
    }
    Ok(())
}
