use clap::Parser;
use gen_core::{
    compile_with_options, generate_playback_data, lint, GenError, RenderOptions, Severity,
};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

fn main() {
    let result = main_result();
    std::process::exit(match result {
        Ok(()) => 0,
        Err(err) => {
            log::error!("{err}");
            1
        }
    });
}

#[derive(Parser, Debug)]
#[command(version, about = "Compile Gen music notation to MusicXML", long_about = None)]
pub struct CliArgs {
    /// Skip measure duration, repeat and ending checks.
    #[arg(long, default_value_t = false)]
    no_validate: bool,
    /// Staff clef: treble or bass.
    #[arg(long, default_value = "treble")]
    clef: String,
    /// Octaves to shift every note by.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    octave_shift: i8,
    /// Instrument group whose mod points apply: bb, eb or f.
    #[arg(long)]
    group: Option<String>,
    /// Written-pitch transposition: Bb, Eb, F, A or C.
    #[arg(long)]
    transpose: Option<String>,
    /// Write playback events as JSON instead of MusicXML.
    #[arg(long, default_value_t = false, conflicts_with = "lint")]
    playback: bool,
    /// Write diagnostics as JSON instead of MusicXML.
    #[arg(long, default_value_t = false)]
    lint: bool,
    /// Gen source file.
    input: PathBuf,
    /// Output file; stdout when omitted.
    output: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("cannot read {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot write {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Compile(#[from] GenError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0} error(s) found")]
    Lint(usize),
}

pub fn main_result() -> Result<(), CliError> {
    // setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("gen=info"))
        .init();

    let args = CliArgs::parse();
    let source = fs::read_to_string(&args.input).map_err(|source| CliError::Read {
        path: args.input.clone(),
        source,
    })?;
    let options = RenderOptions::from_tokens(
        &args.clef,
        args.octave_shift,
        args.group.as_deref(),
        args.transpose.as_deref(),
    );

    if args.lint {
        let diagnostics = lint(&source);
        emit(&args.output, &serde_json::to_string_pretty(&diagnostics)?)?;
        let errors = diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        return if errors == 0 {
            Ok(())
        } else {
            Err(CliError::Lint(errors))
        };
    }

    let output = if args.playback {
        let data = generate_playback_data(&source, &options)?;
        serde_json::to_string_pretty(&data)?
    } else {
        compile_with_options(&source, &options, !args.no_validate)?
    };
    emit(&args.output, &output)?;

    if let Some(path) = &args.output {
        log::info!("Compiled {:?} -> {:?}", args.input, path);
    }
    Ok(())
}

fn emit(path: &Option<PathBuf>, content: &str) -> Result<(), CliError> {
    match path {
        Some(path) => fs::write(path, content).map_err(|source| CliError::Write {
            path: path.clone(),
            source,
        }),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            stdout.write_all(b"\n")?;
            Ok(())
        }
    }
}
