use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use kali::ast_printer::AstPrinter;
use kali::error::KaliError;
use kali::scanner::Scanner;
use kali::session::{self, Session, SessionOptions};

/// Exit status for a missing or unreadable input file.
const EXIT_IO: i32 = 74;

/// Exit status for a command line that names the wrong kind of file.
const EXIT_USAGE: i32 = 64;

#[derive(ClapParser, Debug)]
#[command(version, about = "Kali language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,

    /// Skip the static type checker
    #[arg(long, global = true)]
    unchecked: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print one JSON object per token
        #[arg(long)]
        json: bool,
    },

    /// Parses a file and prints its AST in prefix form
    Parse { filename: PathBuf },

    /// Resolves and type-checks a file without running it
    Check { filename: PathBuf },

    /// Runs a .kali program
    Run { filename: PathBuf },

    /// Starts an interactive prompt
    Repl,
}

/// Reads a source file as UTF-8 text.
fn read_source(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(filename).with_context(|| format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .with_context(|| format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    let source = String::from_utf8(buf)
        .map_err(KaliError::from)
        .with_context(|| format!("File {:?} is not valid UTF-8", filename))?;

    Ok(source)
}

fn read_source_or_exit(filename: &Path) -> String {
    match read_source(filename) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("{:#}", e);
            process::exit(EXIT_IO);
        }
    }
}

/// Prints every diagnostic and exits with the status of the first one's phase.
fn report_and_exit(errors: &[KaliError]) -> ! {
    for e in errors {
        debug!("Reporting: {:?}", e);
        eprintln!("{}", e);
    }

    let code = errors.first().map_or(1, |e| e.phase().exit_code());
    process::exit(code);
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record.module_path().unwrap_or("<unnamed>");
            let module = module.strip_prefix("kali::").unwrap_or(module);
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn tokenize(filename: &Path, json: bool) -> Result<()> {
    let source = read_source_or_exit(filename);
    let mut errors = Vec::new();

    for token in Scanner::new(&source) {
        match token {
            Ok(token) if json => println!("{}", serde_json::to_string(&token)?),
            Ok(token) => println!("{}", token),
            Err(e) => {
                eprintln!("{}", e);
                errors.push(e);
            }
        }
    }

    if let Some(e) = errors.first() {
        debug!("Tokenization failed with {} error(s)", errors.len());
        process::exit(e.phase().exit_code());
    }

    info!("Tokenization completed successfully");
    Ok(())
}

fn repl(options: SessionOptions) -> Result<()> {
    let mut session = Session::new(options);
    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }

        if let Err(errors) = session.run(&line) {
            for e in &errors {
                eprintln!("{}", e);
            }
        }
    }

    info!("REPL closed");
    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let options = SessionOptions {
        type_check: !args.unchecked,
    };

    match args.commands {
        Commands::Tokenize { filename, json } => tokenize(&filename, json)?,

        Commands::Parse { filename } => {
            let source = read_source_or_exit(&filename);

            match session::parse(&source) {
                Ok(statements) => println!("{}", AstPrinter::print_program(&statements)),
                Err(errors) => report_and_exit(&errors),
            }
        }

        Commands::Check { filename } => {
            let source = read_source_or_exit(&filename);

            if let Err(errors) = Session::new(options).check(&source) {
                report_and_exit(&errors);
            }

            info!("Check passed");
        }

        Commands::Run { filename } => {
            if filename.extension().and_then(|ext| ext.to_str()) != Some("kali") {
                eprintln!("Expected a .kali file, got {:?}", filename);
                process::exit(EXIT_USAGE);
            }

            let source = read_source_or_exit(&filename);
            info!("Provided input:\n {}", source);

            if let Err(errors) = Session::new(options).run(&source) {
                report_and_exit(&errors);
            }

            info!("Program executed successfully");
        }

        Commands::Repl => repl(options)?,
    }

    Ok(())
}
