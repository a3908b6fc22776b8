pub mod ast;
pub mod codegen;
pub mod error;
pub mod ir;
pub mod lexer;
pub mod lower;
pub mod parser;
pub mod span;
pub mod symtab;
pub mod typecheck;

use error::CompileError;
use log::debug;

/// Everything one compilation produces. Each artifact is independently
/// inspectable: the token list, the tree, the instruction list (and its
/// one-line-per-instruction rendering) and the assembly text.
#[derive(Debug)]
pub struct Compilation {
    pub tokens: Vec<lexer::Token>,
    pub program: ast::Program,
    pub instructions: Vec<ir::Instruction>,
    pub assembly: String,
}

impl Compilation {
    pub fn render_ir(&self) -> String {
        ir::render(&self.instructions)
    }
}

/// Run the full pipeline over one source string. Each stage consumes the
/// previous stage's output; the first failing stage aborts the run.
pub fn compile(src: &str) -> Result<Compilation, CompileError> {
    let tokens = lexer::tokenize(src)?;
    let program = parser::parse(&tokens)?;
    let mut symbols = symtab::SymbolTable::new();
    typecheck::analyze(&program, &mut symbols)?;
    let instructions = lower::lower(&program)?;
    let assembly = codegen::emit(&instructions, &symbols);
    debug!(
        "compiled program '{}': {} instructions",
        program.name,
        instructions.len()
    );
    Ok(Compilation {
        tokens,
        program,
        instructions,
        assembly,
    })
}
