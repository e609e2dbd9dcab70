use clap::Parser;
use color_print::cprintln;
use std::process::ExitCode;

use emu::{register_builtins, Dump, Image, Program, Recorder};

#[derive(Parser, Debug)]
#[clap(
    name = "Robot VM",
    version = "v0.1.0",
    about = "Step-debuggable VM for compiled robot programs"
)]
struct Args {
    /// Maximum number of steps
    #[arg(short = 't', long)]
    tmax: Option<u64>,

    #[arg(short, long)]
    dump_cfg: Option<String>,

    #[arg(short = 'a', long)]
    dump_all: bool,

    /// Write the execution trace to this YAML file
    #[arg(long)]
    trace: Option<String>,

    /// Highlight program output
    #[arg(short, long)]
    style: bool,

    #[arg(default_value = "main.img.yaml")]
    input_file: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    println!("+-----------------------------------------------+");
    println!("| {:<45} |", args.input_file);
    println!("+-----------------------------------------------+");

    let image = match Image::load(&args.input_file) {
        Ok(image) => image,
        Err(e) => {
            cprintln!("<r,s>Error</>: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let mut program = Program::from(image);
    register_builtins(&mut program, args.style);

    println!("[INIT]");
    match Dump::arg(args.dump_cfg, args.dump_all) {
        Ok(dump) => program.attach(Box::new(dump)),
        Err(e) => {
            cprintln!("<r,s>Error</>: {}", e);
            return ExitCode::FAILURE;
        }
    }
    let recorder = Recorder::new();
    let trace = recorder.log();
    if args.trace.is_some() {
        program.attach(Box::new(recorder));
    }

    println!("[RUN]");
    let tmax = args.tmax.unwrap_or(u64::MAX);
    let mut status = ExitCode::SUCCESS;
    while program.has_next_statement() && program.steps() < tmax {
        if let Err(e) = program.execute_next() {
            let at = program.function_at(program.pc()).unwrap_or("?");
            match e.is_internal() {
                true => cprintln!("<r,s>Internal error</> at {} ({}): {}", program.pc(), at, e),
                false => cprintln!("<r,s>Runtime error</> at {} ({}): {}", program.pc(), at, e),
            }
            status = ExitCode::FAILURE;
            break;
        }
    }
    println!();
    println!(" * Steps: {}", program.steps());

    if let Some(fname) = args.trace {
        let written = std::fs::File::create(&fname)
            .map_err(|e| e.to_string())
            .and_then(|file| {
                serde_yaml::to_writer(file, &*trace.borrow()).map_err(|e| e.to_string())
            });
        if let Err(e) = written {
            cprintln!("<r,s>Error</>: failed to write trace {}: {}", fname, e);
            status = ExitCode::FAILURE;
        }
    }

    println!("=================================================");
    status
}
