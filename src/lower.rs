use crate::ast::{BinOp, Expr, Program, Stmt, Value};
use crate::error::CompileError;
use crate::ir::{Const, Instruction, OpCode, Operand};
use log::debug;

/// Lower a validated tree into three-address instructions, in source order,
/// terminated by HALT. Counters live on the builder, so every call starts
/// from T0/L0 and concurrent compilations never share state.
pub fn lower(program: &Program) -> Result<Vec<Instruction>, CompileError> {
    let mut builder = IrBuilder::new();
    for stmt in &program.statements {
        builder.lower_stmt(stmt)?;
    }
    builder.emit(Instruction::new(OpCode::Halt, None, None, None));
    debug!("lowered to {} instructions", builder.instrs.len());
    Ok(builder.instrs)
}

struct IrBuilder {
    instrs: Vec<Instruction>,
    temp_counter: usize,
    label_counter: usize,
}

impl IrBuilder {
    fn new() -> Self {
        IrBuilder {
            instrs: Vec::new(),
            temp_counter: 0,
            label_counter: 0,
        }
    }

    fn new_temp(&mut self) -> Operand {
        let t = self.temp_counter;
        self.temp_counter += 1;
        Operand::Temp(t)
    }

    /// Labels are numbered in first-seen order. The accepted grammar has no
    /// control statements yet, so only future lowering paths reach this.
    fn new_label(&mut self) -> String {
        let l = format!("L{}", self.label_counter);
        self.label_counter += 1;
        l
    }

    fn emit(&mut self, instr: Instruction) {
        self.instrs.push(instr);
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            // Declarations only size the data section; they emit nothing.
            Stmt::VarDecl { .. } => Ok(()),
            Stmt::Assign { name, value, .. } => {
                let operand = self.lower_expr(value)?;
                self.emit(Instruction::new(
                    OpCode::Assign,
                    Some(Operand::Var(name.clone())),
                    Some(operand),
                    None,
                ));
                Ok(())
            }
            Stmt::Read { name, .. } => {
                self.emit(Instruction::new(
                    OpCode::Read,
                    Some(Operand::Var(name.clone())),
                    None,
                    None,
                ));
                Ok(())
            }
            Stmt::Print { args, .. } => {
                for arg in args {
                    let operand = self.lower_expr(arg)?;
                    self.emit(Instruction::new(OpCode::Print, None, Some(operand), None));
                }
                Ok(())
            }
        }
    }

    /// Reduce an expression to a single operand, left operand before right,
    /// one instruction and one fresh temporary per binary node. No folding.
    fn lower_expr(&mut self, expr: &Expr) -> Result<Operand, CompileError> {
        match expr {
            Expr::Literal { value, .. } => Ok(Operand::Const(lower_value(value))),
            Expr::Ident { name, .. } => Ok(Operand::Var(name.clone())),
            Expr::Binary {
                op, left, right, ..
            } => {
                let lhs = self.lower_expr(left)?;
                let rhs = self.lower_expr(right)?;
                let opcode = binary_opcode(*op)?;
                let dest = self.new_temp();
                self.emit(Instruction::new(
                    opcode,
                    Some(dest.clone()),
                    Some(lhs),
                    Some(rhs),
                ));
                Ok(dest)
            }
        }
    }
}

fn lower_value(value: &Value) -> Const {
    match value {
        Value::Int(v) => Const::Int(*v),
        Value::Real(v) => Const::Real(*v),
        Value::Str(s) => Const::Str(s.clone()),
        // Truth values and characters live in integer slots.
        Value::Bool(b) => Const::Int(*b as i64),
        Value::Char(c) => Const::Int(*c as i64),
    }
}

/// Both `/` and `\` land on DIV; integer semantics follow the operand types.
/// The remaining operators survive type checking but have no encoding in the
/// instruction set, which makes reaching one here an internal fault.
fn binary_opcode(op: BinOp) -> Result<OpCode, CompileError> {
    match op {
        BinOp::Add => Ok(OpCode::Add),
        BinOp::Sub => Ok(OpCode::Sub),
        BinOp::Mul => Ok(OpCode::Mul),
        BinOp::Div | BinOp::IntDiv => Ok(OpCode::Div),
        other => Err(CompileError::codegen(format!(
            "operator '{}' has no three-address encoding",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::render;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn lower_src(src: &str) -> Vec<Instruction> {
        lower(&parse(&tokenize(src).unwrap()).unwrap()).unwrap()
    }

    #[test]
    fn precedence_orders_the_instructions() {
        let instrs =
            lower_src("برنامج p ; { متغير ص : صحيح ; ص = 2 + 3 * 4 ; } .");
        assert_eq!(
            render(&instrs),
            "MUL T0, 3, 4\nADD T1, 2, T0\nASSIGN ص, T1\nHALT\n"
        );
    }

    #[test]
    fn statements_lower_in_source_order() {
        let instrs = lower_src(
            "برنامج p ; { متغير س : صحيح ; اقرأ ( س ) ; اطبع ( س ) ; } .",
        );
        let ops: Vec<OpCode> = instrs.iter().map(|i| i.op).collect();
        assert_eq!(ops, vec![OpCode::Read, OpCode::Print, OpCode::Halt]);
    }

    #[test]
    fn print_emits_one_instruction_per_argument() {
        let instrs = lower_src(
            "برنامج p ; { متغير س : صحيح ; اطبع ( س , \"نص\" , 5 ) ; } .",
        );
        let prints = instrs.iter().filter(|i| i.op == OpCode::Print).count();
        assert_eq!(prints, 3);
        assert_eq!(
            instrs[1].arg1,
            Some(Operand::Const(Const::Str("نص".into())))
        );
    }

    #[test]
    fn counters_reset_between_compilations() {
        let src = "برنامج p ; { متغير ص : صحيح ; ص = 1 + 2 + 3 ; } .";
        assert_eq!(lower_src(src), lower_src(src));
        // Temps within one run never repeat.
        let instrs = lower_src(src);
        assert_eq!(instrs[0].result, Some(Operand::Temp(0)));
        assert_eq!(instrs[1].result, Some(Operand::Temp(1)));
    }

    #[test]
    fn boolean_literals_lower_to_integers() {
        let instrs =
            lower_src("برنامج p ; { متغير م : منطقي ; م = صح ; } .");
        assert_eq!(instrs[0].arg1, Some(Operand::Const(Const::Int(1))));
    }

    #[test]
    fn modulo_has_no_encoding() {
        let program = parse(
            &tokenize("برنامج p ; { متغير س : صحيح ; س = 5 % 2 ; } .").unwrap(),
        )
        .unwrap();
        let err = lower(&program).unwrap_err();
        assert!(err.message.contains("'%'"));
    }

    #[test]
    fn labels_number_in_first_seen_order() {
        let mut builder = IrBuilder::new();
        assert_eq!(builder.new_label(), "L0");
        assert_eq!(builder.new_label(), "L1");
    }
}
