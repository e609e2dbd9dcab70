use arch::Value;
use color_print::cprint;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use crate::model::Program;

/// Host-side `print` / `println`.
///
/// Output goes to stdout, optionally styled, and is also appended to a
/// shared transcript that the host can read back.
#[derive(Default)]
pub struct Console {
    style: bool,
    quiet: bool,
    transcript: Rc<RefCell<String>>,
}

impl Console {
    pub fn new(style: bool) -> Self {
        Console {
            style,
            ..Default::default()
        }
    }

    /// Record output without writing to stdout.
    pub fn quiet() -> Self {
        Console {
            quiet: true,
            ..Default::default()
        }
    }

    pub fn transcript(&self) -> Rc<RefCell<String>> {
        Rc::clone(&self.transcript)
    }

    pub fn install(self, program: &mut Program) {
        let Console {
            style,
            quiet,
            transcript,
        } = self;
        let out = Rc::clone(&transcript);
        program.register_external_function("print", move |args| {
            emit(&out, style, quiet, &join(args));
            Value::Int(0)
        });
        let out = transcript;
        program.register_external_function("println", move |args| {
            emit(&out, style, quiet, &(join(args) + "\n"));
            Value::Int(0)
        });
    }
}

/// Registers `print` and `println` writing to stdout.
pub fn register_builtins(program: &mut Program, style: bool) {
    Console::new(style).install(program);
}

fn join(args: &[Value]) -> String {
    args.iter().map(Value::to_string).collect::<Vec<_>>().join(" ")
}

fn emit(transcript: &RefCell<String>, style: bool, quiet: bool, text: &str) {
    transcript.borrow_mut().push_str(text);
    if quiet {
        return;
    }
    if style {
        cprint!("<r,s>{}</>", text);
    } else {
        print!("{}", text);
    }
    let _ = std::io::stdout().flush();
}
