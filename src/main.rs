
extern crate clap;
#[macro_use] extern crate log;
extern crate fern;
extern crate chrono;
extern crate term_grid;

pub mod assembler;

use clap::{Arg, ArgMatches, App};
use term_grid::{Grid, GridOptions, Direction, Filling, Cell};

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use assembler::ast::Statement;
use assembler::diagnostic::format_diagnostic;
use assembler::lexer::{self, DEFAULT_TAB_WIDTH};
use assembler::parser;

fn main() {
    let args = process_arguments();
    initialize_logging(args.occurrences_of("verbose"));

    debug!("Arguments:\n\tVerbosity: {}\n\tTokenize Only: {}\n\tTab Width: {}\n\tOutfile: {}\n\tInfile: {}",
        verbosity(args.occurrences_of("verbose")).to_string(),
        args.is_present("tokenize"),
        args.value_of("tab-width").unwrap_or("None"),
        args.value_of("output").unwrap_or("None"),
        args.value_of("INPUT").unwrap_or("None")
    );

    let tab_width = match args.value_of("tab-width").map(str::parse::<usize>) {
        None => DEFAULT_TAB_WIDTH,
        Some(Ok(width)) if width > 0 => width,
        Some(_) => {
            error!("fatal: tab width must be a positive number");
            std::process::exit(1);
        },
    };

    // The input is required by clap, `-` reads standard input.
    let ifile = args.value_of("INPUT").unwrap_or("-");
    let source = match read_source(ifile) {
        Err(err) => {
            error!("fatal: unable to read input `{}`: {}", ifile, err);
            std::process::exit(1);
        },
        Ok(source) => source,
    };

    if args.is_present("tokenize") {
        let mut grid = Grid::new(GridOptions {
            filling:     Filling::Spaces(1),
            direction:   Direction::LeftToRight,
        });

        for tok in lexer::tokenize(&source, tab_width) {
            grid.add(Cell::from(format!("{}:", tok.line)));
            grid.add(Cell::from(tok.kind.to_string()));
            grid.add(Cell::from(format!("{:?}", tok.literal)));
        }

        println!("{}", grid.fit_into_columns(3));
        return;
    }

    let (program, diagnostics) = parser::parse(&source, tab_width);

    if !diagnostics.is_empty() {
        for diag in diagnostics.iter() {
            error!("{}", format_diagnostic(diag, &source));
        }
        error!("Stopped assembly due to {} parsing error(s).", diagnostics.len());
        std::process::exit(1);
    }

    if args.is_present("print-debug") {
        let mut grid = Grid::new(GridOptions {
            filling:     Filling::Spaces(1),
            direction:   Direction::LeftToRight,
        });

        let mut idx = 0;
        for statement in program.statements.iter() {
            add_rows(&mut grid, statement, 0, &mut idx);
        }

        println!("{}", grid.fit_into_columns(4));
    }

    let rendered = format!("{}\n", program);
    match args.value_of("output") {
        Some(filename) => {
            let opath = Path::new(filename);
            let mut ofile = match File::create(&opath) {
                Err(err) => {
                    error!("fatal: unable to open output file `{}`: {}", opath.display(), err);
                    std::process::exit(1);
                },
                Ok(file) => file,
            };

            if let Err(err) = ofile.write_all(rendered.as_bytes()) {
                error!("fatal: unable to write to output file `{}`: {}", opath.display(), err);
                std::process::exit(1);
            }
        },
        None if !args.is_present("print-debug") => print!("{}", rendered),
        None => {},
    }
}

fn read_source(ifile: &str) -> io::Result<String> {
    if ifile == "-" {
        let mut source = String::new();
        io::stdin().read_to_string(&mut source)?;
        Ok(source)
    } else {
        fs::read_to_string(Path::new(ifile))
    }
}

/// Adds one row per statement to the debug listing, descending into blocks.
fn add_rows(grid: &mut Grid, statement: &Statement, depth: usize, idx: &mut usize) {
    let indent = "  ".repeat(depth);
    grid.add(Cell::from(format!("{:04}:", idx)));
    grid.add(Cell::from(statement.shape().to_string()));
    grid.add(Cell::from("=>".to_string()));
    *idx += 1;

    match statement {
        Statement::Block { label, body } => {
            grid.add(Cell::from(format!("{}{}:", indent, label)));
            for child in body {
                add_rows(grid, child, depth + 1, idx);
            }
        },
        _ => grid.add(Cell::from(format!("{}{}", indent, statement))),
    }
}

fn process_arguments() -> ArgMatches<'static> {
    App::new(option_env!("CARGO_PKG_NAME").unwrap_or("lc3asm"))
        .version(option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"))
        .author(option_env!("CARGO_PKG_AUTHORS").unwrap_or(""))
        .about(option_env!("CARGO_PKG_DESCRIPTION").unwrap_or(""))
        .arg(Arg::with_name("INPUT")
            .help("Sets the input file to use, `-` reads standard input")
            .required(true)
            .multiple(false)
            .index(1))
        .arg(Arg::with_name("verbose")
            .short("v")
            .multiple(true)
            .takes_value(false)
            .help("Sets the level of verbosity"))
        .arg(Arg::with_name("output")
            .short("o")
            .takes_value(true)
            .help("write the parsed program to an outfile"))
        .arg(Arg::with_name("tab-width")
            .short("t")
            .long("tab-width")
            .takes_value(true)
            .help("number of columns a tab counts for in indentation (default 4)"))
        .arg(Arg::with_name("tokenize")
            .short("e")
            .takes_value(false)
            .help("tokenize only, prints the token stream"))
        .arg(Arg::with_name("print-debug")
            .short("d")
            .alias("show")
            .alias("s")
            .takes_value(false)
            .help("prints every parsed statement with its shape to STDOUT"))
        .get_matches()
}

fn verbosity(occurrences: u64) -> log::LevelFilter {
    match occurrences {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

fn initialize_logging(occurrences: u64) {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(verbosity(occurrences))
        .chain(std::io::stderr())
        .apply().ok();
}
