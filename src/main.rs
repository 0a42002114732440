use clap::{CommandFactory, Parser, Subcommand, error::ErrorKind};
use gem_mapper::processes::map::{self, MapArgs};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a reference and search a set of reads against it.
    Map(MapArgs),
}

/// Aborts clap with a given error `message` due to a custom parsing error,
/// so a bad configuration is reported the same way `clap` reports a bad
/// flag rather than through a bare `eprintln!`.
fn abort_clap(kind: ErrorKind, message: impl std::fmt::Display) -> ! {
    Cli::command().error(kind, message).exit()
}

fn main() -> std::io::Result<()> {
    let args = Cli::parse();

    match args.command {
        Commands::Map(map_args) => {
            let config = map::config_from_args(&map_args);
            if let Err(err) = config.validate() {
                abort_clap(ErrorKind::ValueValidation, err);
            }
            map::run(&map_args)
        }
    }
}
