use clap::{Parser, Subcommand};
use kodi_fav_gen::config::{Config, ConfigError};
use kodi_fav_gen::generate::{self, GenerateError};
use kodi_fav_gen::output;
use kodi_fav_gen::render::RenderError;
use kodi_fav_gen::source::SourceError;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Missing mandatory parameter (EINVAL).
const EXIT_MISSING_PARAMETER: i32 = 22;
/// Some declarations failed; the file was still written (EBADMSG).
const EXIT_INCOMPLETE: i32 = 74;
/// Rendered document did not parse (ECANCELED).
const EXIT_MALFORMED_OUTPUT: i32 = 125;

#[derive(Parser)]
#[command(name = "kodi-fav-gen")]
#[command(about = "Generate a Kodi favourites.xml from YAML declarations")]
#[command(long_about = "\
Generate a Kodi favourites.xml from YAML declarations

Each file in the input directory declares one favourite. File names are the
ids and their sort order is the menu order.

  favs/
  ├── 010-movies.yml          # name: Movies
  │                           # action: {type: activate_window, value: videodb://movies/}
  ├── 020-concerts.yml.tmpl   # action: PlayMedia({{ media }}/concerts/)
  └── 030-channel.yml         # action: {type: youtube_channel, value: UC..., _path: /videos/}
  thumbs/
  └── movies.png              # matched by `thumb: movies`

Parameters are KEY=VALUE tokens. They can also come from KODI_FAVGEN__<KEY>
environment variables or a --settings TOML file; tokens win. Keys prefixed
var_ are available to .yml.tmpl files without the prefix.

  path              input directory (required)
  thumbs_path       thumbnail directory        [<path>/../thumbs]
  output            favourites file            [~/.kodi/userdata/favourites.xml]
  tmpdir            scratch directory          [$TMPDIR/kodi-fav-gen.$USER]
  cache_path        thumbnail cache            [<tmpdir>/thumbs]

Set RUST_LOG=debug to trace every parsed file.")]
#[command(version)]
struct Cli {
    /// TOML file of KEY = VALUE settings, applied before command-line tokens
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write favourites.xml from the declarations in `path`
    Generate {
        /// KEY=VALUE parameters
        params: Vec<String>,
    },
    /// Print every resolved parameter as JSON
    Config {
        /// KEY=VALUE parameters
        params: Vec<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        if let GenerateError::Incomplete { report } = &e {
            output::print_generate_output(report);
            output::print_error_history(&report.errors);
        }
        eprintln!("Error: {e}");
        if let GenerateError::Incomplete { report } = &e {
            eprintln!("{}", report.errors.to_json());
        }
        std::process::exit(exit_code(&e));
    }
}

/// `RUST_LOG` when it parses, `warn` otherwise.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"))
}

fn run(cli: Cli) -> Result<(), GenerateError> {
    match cli.command {
        Command::Generate { params } => {
            let config = load_config(cli.settings.as_deref(), &params)?;
            let report = generate::generate(&config)?;
            output::print_generate_output(&report);
        }
        Command::Config { params } => {
            let config = load_config(cli.settings.as_deref(), &params)?;
            output::print_config(&config.export()?);
        }
    }
    Ok(())
}

/// Environment, then the settings file, then command-line tokens.
fn load_config(
    settings: Option<&std::path::Path>,
    params: &[String],
) -> Result<Config, ConfigError> {
    let mut config = Config::from_env();
    if let Some(path) = settings {
        config = config.with_settings_file(path)?;
    }
    Ok(config.with_args(params))
}

fn exit_code(error: &GenerateError) -> i32 {
    let io = match error {
        GenerateError::Config(ConfigError::MissingParameter(_))
        | GenerateError::Source(SourceError::Config(ConfigError::MissingParameter(_))) => {
            return EXIT_MISSING_PARAMETER;
        }
        GenerateError::Incomplete { .. } => return EXIT_INCOMPLETE,
        GenerateError::Render(RenderError::MalformedOutput { .. }) => return EXIT_MALFORMED_OUTPUT,
        GenerateError::Config(ConfigError::Io(e)) => e,
        GenerateError::Source(SourceError::Io(e)) => e,
        GenerateError::Write { source, .. } => source,
        _ => return 1,
    };
    io.raw_os_error().filter(|&code| code > 0 && code < 256).unwrap_or(1)
}
