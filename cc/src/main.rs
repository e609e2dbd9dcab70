use clap::Parser;
use color_print::cprintln;
use std::fs::File;
use std::io::BufReader;
use std::process::ExitCode;

use cc::{ast::Root, util::display, Compiler, Error, ExternDecl};

#[derive(Debug, clap::Parser)]
#[clap(author, version, about)]
struct Args {
    /// AST file (YAML)
    #[clap(default_value = "main.ast.yaml")]
    input: String,

    /// Output image file
    #[clap(short, long, default_value = "main.img.yaml")]
    output: String,

    /// Host function declarations (YAML list of {name, params, ret, variadic})
    #[clap(short, long)]
    externs: Option<String>,

    /// Print the instruction listing
    #[clap(short, long)]
    dump: bool,

    /// Print function frame layouts
    #[clap(short, long)]
    symbols: bool,
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, String> {
    let file = File::open(path).map_err(|e| format!("Failed to open file: {}: {}", path, e))?;
    serde_yaml::from_reader(BufReader::new(file)).map_err(|e| format!("Invalid file {}: {}", path, e))
}

fn main() -> ExitCode {
    let args = Args::parse();

    let root = match std::fs::read_to_string(&args.input)
        .map_err(|e| format!("Failed to open file: {}: {}", args.input, e))
        .and_then(|text| Root::from_yaml(&text).map_err(|e| format!("Invalid file {}: {}", args.input, e)))
    {
        Ok(root) => root,
        Err(e) => {
            cprintln!("<r,s>Error</>: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut compiler = Compiler::new().with_builtins();
    if let Some(path) = &args.externs {
        match read_yaml::<Vec<ExternDecl>>(path) {
            Ok(decls) => compiler = decls.into_iter().fold(compiler, Compiler::declare),
            Err(e) => {
                cprintln!("<r,s>Error</>: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    let image = match compiler.compile_image(&root) {
        Ok(image) => image,
        Err(Error::Compiler(e)) => {
            cprintln!("<r,s>{}:{}</> {}", args.input, e.location, e.message());
            return ExitCode::FAILURE;
        }
        Err(Error::Internal(e)) => {
            cprintln!("<r,s>Internal compiler error</>: {}", e);
            return ExitCode::from(2);
        }
    };

    if args.dump {
        display::listing(&image);
    }
    if args.symbols {
        display::symbols(&image.symbols);
    }

    if let Err(e) = image.save(&args.output) {
        cprintln!("<r,s>Error</>: {}", e);
        return ExitCode::FAILURE;
    }
    println!(" * {} instructions -> {}", image.instructions.len(), args.output);
    ExitCode::SUCCESS
}
