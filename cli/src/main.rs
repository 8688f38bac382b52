use clap::{ArgAction, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

use defc::{compile_files, creation_order_names, to_json, CompileOptions, DefinitionKind, DEFAULT_MAX_SIZE};
use defc_compiler::error::DefError;

#[derive(Parser)]
#[command(name = "defc")]
#[command(about = "Check definition files and dump their resolved layout", long_about = None)]
struct Cli {
    /// Directory definition and import paths are relative to
    #[arg(short, long, global = true, default_value = ".")]
    root: PathBuf,

    /// max_size recorded for tables that do not declare one (0 for unbounded)
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_SIZE)]
    default_max_size: u32,

    /// More output, repeat for more detail
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile definitions and report what was resolved
    Check {
        /// Definition files (.the, .btx, .thx, .tbx, .sqx)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the resolved layout of a definition and its imports as JSON
    Dump {
        /// Definition file
        input: PathBuf,

        /// Output `.json` file (if omitted, prints to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the order record tables have to be created in
    Order {
        /// Record definition (.sqx)
        input: PathBuf,
    },
}

/// Definition paths are relative to the root; accept paths that include it.
fn relative_to(root: &Path, file: &Path) -> PathBuf {
    file.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| file.to_path_buf())
}

fn main() -> Result<(), DefError> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let options = CompileOptions {
        root:             cli.root.clone(),
        default_max_size: cli.default_max_size,
    };

    match &cli.command {
        Commands::Check { files } => {
            let files: Vec<PathBuf> = files.iter().map(|f| relative_to(&cli.root, f)).collect();
            let compilation = compile_files(&options, &files)?;
            for def in compilation.root_definitions() {
                println!("{} {} ({} fields)", def.kind(), def.name, def.fields().len());
            }
            info!(
                definitions = compilation.registry().len(),
                "all definitions resolved"
            );
            Ok(())
        }

        Commands::Dump { input, output } => {
            let input = relative_to(&cli.root, input);
            let compilation = compile_files(&options, &[&input])?;
            let json = to_json(&compilation)?;
            if let Some(out_path) = output {
                fs::write(out_path, &json).map_err(|source| DefError::Io {
                    path: out_path.display().to_string(),
                    source,
                })?;
                println!("Layout of {} written to {}", input.display(), out_path.display());
            } else {
                println!("{}", json);
            }
            Ok(())
        }

        Commands::Order { input } => {
            let input = relative_to(&cli.root, input);
            let compilation = compile_files(&options, &[&input])?;
            let registry = compilation.registry();
            let root = registry.find_path(&input).ok_or_else(|| DefError::Io {
                path:   input.display().to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })?;
            if registry[root].kind() != DefinitionKind::Record {
                return Err(DefError::KindMismatch {
                    file:     input.display().to_string(),
                    line:     0,
                    path:     input.display().to_string(),
                    expected: DefinitionKind::Record,
                    actual:   registry[root].kind(),
                });
            }
            for name in creation_order_names(registry, root) {
                println!("{}", name);
            }
            Ok(())
        }
    }
}
