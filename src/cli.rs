// ============================================================================
// GeoCanvas CLI — headless icon inspection via command-line arguments
// ============================================================================
//
// Usage examples:
//   geocanvas --inspect icon.svg
//   geocanvas -I "icons/*.svg" https://example.com/shape.png
//   geocanvas --list
//
// No window is opened in CLI mode. Everything runs synchronously on the
// current thread.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::color::ImageInfo;
use crate::io::{GithubDirectory, HttpFetcher, ImageFetcher, ImageSource, is_url, load_image_file};
use crate::settings::AppSettings;

/// GeoCanvas headless icon inspector.
#[derive(Parser, Debug)]
#[command(
    name = "geocanvas",
    about = "GeoCanvas headless icon inspector",
    long_about = "Print the size and dominant color of icon files or URLs without\n\
                  opening the window. SVG is rasterized at its intrinsic size.\n\n\
                  Example:\n  \
                  geocanvas --inspect icon.svg\n  \
                  geocanvas -I \"icons/*.svg\" https://example.com/shape.png"
)]
pub struct CliArgs {
    /// Files or http(s) URLs to inspect. Glob patterns accepted for files.
    #[arg(short = 'I', long, num_args = 1.., value_name = "FILE|URL")]
    pub inspect: Vec<String>,

    /// Print the download URLs of the configured icon listing.
    #[arg(long)]
    pub list: bool,

    /// Print per-input timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        Self::is_cli_args(std::env::args())
    }

    fn is_cli_args(args: impl IntoIterator<Item = String>) -> bool {
        args.into_iter().skip(1).any(|a| {
            a == "--inspect" || a.starts_with("--inspect=") || a.starts_with("-I") || a == "--list"
        })
    }
}

/// One thing to inspect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    File(PathBuf),
    Url(String),
}

impl std::fmt::Display for Input {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Input::File(p) => write!(f, "{}", p.display()),
            Input::Url(u) => f.write_str(u),
        }
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = everything succeeded, `1` = one or more inputs failed.
pub fn run(args: CliArgs) -> ExitCode {
    let settings = AppSettings::load_existing();
    let mut any_failure = false;

    if args.list {
        match GithubDirectory::from_settings(&settings).and_then(|src| src.list_available_images()) {
            Ok(urls) => {
                for url in urls {
                    println!("{}", url);
                }
            }
            Err(e) => {
                eprintln!("error: listing failed: {}", e);
                any_failure = true;
            }
        }
    }

    if args.inspect.is_empty() {
        return if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS };
    }

    let inputs = resolve_inputs(&args.inspect);
    if inputs.is_empty() {
        eprintln!("error: no inputs matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    // Only build an HTTP client when a URL was given
    let fetcher = if inputs.iter().any(|i| matches!(i, Input::Url(_))) {
        match HttpFetcher::from_settings(&settings) {
            Ok(f) => Some(f),
            Err(e) => {
                eprintln!("error: could not create HTTP client: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        None
    };

    for input in &inputs {
        let start = Instant::now();
        match inspect_one(input, fetcher.as_ref()) {
            Ok(info) => {
                println!("{}: {}", input, info);
                if args.verbose {
                    println!("  ({:.0}ms)", start.elapsed().as_secs_f64() * 1000.0);
                }
            }
            Err(e) => {
                eprintln!("{}: error: {}", input, e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn inspect_one(input: &Input, fetcher: Option<&HttpFetcher>) -> Result<ImageInfo, String> {
    let image = match input {
        Input::File(path) => load_image_file(path),
        Input::Url(url) => match fetcher {
            Some(fetcher) => fetcher.fetch(url),
            None => return Err("no HTTP client for URL input".to_string()),
        },
    }
    .map_err(|e| e.to_string())?;
    ImageInfo::from_image(&image).map_err(|e| e.to_string())
}

// ============================================================================
// Helpers
// ============================================================================

/// URLs pass through; literal paths are kept; anything else is expanded
/// as a glob pattern.  Duplicates are dropped.
fn resolve_inputs(patterns: &[String]) -> Vec<Input> {
    let mut result: Vec<Input> = Vec::new();

    for pattern in patterns {
        if is_url(pattern) {
            let input = Input::Url(pattern.clone());
            if !result.contains(&input) {
                result.push(input);
            }
            continue;
        }

        let as_path = Path::new(pattern);
        if as_path.exists() {
            let input = Input::File(as_path.to_path_buf());
            if !result.contains(&input) {
                result.push(input);
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    let input = Input::File(entry);
                    if !result.contains(&input) {
                        result.push(input);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}
