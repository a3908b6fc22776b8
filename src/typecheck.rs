use crate::ast::{BinOp, Expr, Program, Stmt, Type, Value};
use crate::error::CompileError;
use crate::span::Span;
use crate::symtab::SymbolTable;
use log::debug;

/// Validate the tree against the symbol table, filling it from the
/// declarations encountered on the way. The table may arrive preloaded.
/// Fail-fast: the first violation aborts the walk.
pub fn analyze(program: &Program, symbols: &mut SymbolTable) -> Result<(), CompileError> {
    let mut checker = SemanticAnalyzer { symbols };
    for stmt in &program.statements {
        checker.analyze_stmt(stmt)?;
    }
    debug!(
        "semantic analysis passed, {} symbols declared",
        symbols.len()
    );
    Ok(())
}

struct SemanticAnalyzer<'a> {
    symbols: &'a mut SymbolTable,
}

impl<'a> SemanticAnalyzer<'a> {
    fn analyze_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::VarDecl { name, ty, span } => {
                if !self.symbols.declare(name, *ty) {
                    return Err(CompileError::semantic(
                        format!("duplicate declaration of '{}'", name),
                        *span,
                    ));
                }
                Ok(())
            }
            Stmt::Assign { name, value, span } => {
                let target = self.resolve(name, *span)?;
                let inferred = self.infer_expr(value)?;
                if !assignable(inferred, target) {
                    return Err(CompileError::semantic(
                        format!(
                            "type mismatch: cannot assign {} to '{}' of type {}",
                            inferred, name, target
                        ),
                        *span,
                    ));
                }
                Ok(())
            }
            Stmt::Read { name, span } => {
                let target = self.resolve(name, *span)?;
                if !target.is_scalar() {
                    return Err(CompileError::semantic(
                        format!(
                            "read target '{}' must have a scalar type, not {}",
                            name, target
                        ),
                        *span,
                    ));
                }
                Ok(())
            }
            Stmt::Print { args, .. } => {
                for arg in args {
                    self.infer_expr(arg)?;
                }
                Ok(())
            }
        }
    }

    fn resolve(&self, name: &str, span: Span) -> Result<Type, CompileError> {
        self.symbols.lookup(name).ok_or_else(|| {
            CompileError::semantic(format!("undeclared identifier '{}'", name), span)
        })
    }

    fn infer_expr(&self, expr: &Expr) -> Result<Type, CompileError> {
        match expr {
            Expr::Literal { value, .. } => Ok(match value {
                Value::Int(_) => Type::Integer,
                Value::Real(_) => Type::Real,
                Value::Bool(_) => Type::Boolean,
                Value::Char(_) => Type::Char,
                Value::Str(_) => Type::String,
            }),
            Expr::Ident { name, span } => self.resolve(name, *span),
            Expr::Binary {
                op,
                left,
                right,
                span,
            } => {
                let lt = self.infer_expr(left)?;
                let rt = self.infer_expr(right)?;
                self.infer_binary(*op, lt, rt, *span)
            }
        }
    }

    /// Operator applicability is strict: combinations outside this table are
    /// rejected rather than given an improvised meaning.
    fn infer_binary(
        &self,
        op: BinOp,
        left: Type,
        right: Type,
        span: Span,
    ) -> Result<Type, CompileError> {
        if op.is_arithmetic() {
            if left.is_numeric() && right.is_numeric() {
                return Ok(wider(left, right));
            }
        } else if op.is_equality() {
            // Numerics compare across width; other scalars only to themselves.
            if (left.is_numeric() && right.is_numeric()) || (left == right && left.is_scalar()) {
                return Ok(Type::Boolean);
            }
        } else if op.is_relational() {
            if left.is_numeric() && right.is_numeric() {
                return Ok(Type::Boolean);
            }
        } else if op.is_logical() && left == Type::Boolean && right == Type::Boolean {
            return Ok(Type::Boolean);
        }
        Err(CompileError::semantic(
            format!("operator '{}' cannot combine {} and {}", op, left, right),
            span,
        ))
    }
}

fn wider(a: Type, b: Type) -> Type {
    if a == Type::Real || b == Type::Real {
        Type::Real
    } else {
        Type::Integer
    }
}

/// The one coercion the language permits is Integer into a Real target.
fn assignable(source: Type, target: Type) -> bool {
    source == target || (source == Type::Integer && target == Type::Real)
}
