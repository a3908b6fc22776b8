//! End-to-end pipeline tests over the public API.

use arabc::ast::Type;
use arabc::error::ErrorKind;
use arabc::ir::OpCode;
use arabc::{compile, lexer};

#[test]
fn read_program_compiles_end_to_end() {
    let src = "برنامج P ; { متغير x : صحيح ; اقرأ ( x ) ; } .";
    let result = compile(src).unwrap();

    let ops: Vec<OpCode> = result.instructions.iter().map(|i| i.op).collect();
    assert_eq!(ops, vec![OpCode::Read, OpCode::Halt]);
    assert_eq!(result.render_ir(), "READ x\nHALT\n");

    assert!(result.assembly.contains("var_0 dd 0"));
    assert!(result.assembly.contains("call read_int"));
}

#[test]
fn precedence_shows_in_the_ir() {
    let src = "برنامج P ; { متغير y : صحيح ; y = 2 + 3 * 4 ; } .";
    let result = compile(src).unwrap();
    assert_eq!(
        result.render_ir(),
        "MUL T0, 3, 4\nADD T1, 2, T0\nASSIGN y, T1\nHALT\n"
    );
}

#[test]
fn two_compilations_are_identical() {
    let src = "برنامج P ; {\n    متغير x : صحيح ;\n    متغير y : حقيقي ;\n    اقرأ ( x ) ;\n    y = x * 2 + 1 ;\n    اطبع ( y , \"النتيجة\" ) ;\n} .";
    let first = compile(src).unwrap();
    let second = compile(src).unwrap();
    assert_eq!(first.tokens, second.tokens);
    assert_eq!(first.instructions, second.instructions);
    assert_eq!(first.assembly, second.assembly);
}

#[test]
fn integer_coerces_into_real_but_not_back() {
    assert!(compile("برنامج P ; { متغير y : حقيقي ; y = 5 ; } .").is_ok());

    let err = compile("برنامج P ; { متغير x : صحيح ; x = 5.5 ; } .").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Semantic);
    assert!(err.message.contains("type mismatch"));
}

#[test]
fn undeclared_identifier_stops_the_pipeline() {
    let err = compile("برنامج P ; { y = 1 ; } .").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Semantic);
    assert!(err.message.contains("undeclared identifier 'y'"));
    let span = err.span.unwrap();
    assert_eq!((span.line, span.column), (1, 14));
}

#[test]
fn lex_errors_carry_their_position() {
    let err = compile("برنامج P ; { متغير x : صحيح ; x = 1 ؟ 2 ; } .").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Lex);
    assert!(err.message.contains("unrecognized character"));
    assert!(err.span.is_some());
}

#[test]
fn parse_errors_name_expected_and_found() {
    let err = compile("برنامج P ; { متغير x صحيح ; } .").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Parse);
    assert!(err.message.contains("expected Colon"));
}

#[test]
fn longest_match_tokenizes_neq_as_one_token() {
    let tokens = lexer::tokenize("x =! y").unwrap();
    let kinds: Vec<_> = tokens.iter().map(|t| &t.kind).collect();
    assert!(matches!(kinds[1], lexer::TokenKind::NotEq));
    assert_eq!(tokens.len(), 4); // x, =!, y, eof
}

#[test]
fn statement_order_is_preserved_in_the_ir() {
    let src = "برنامج P ; {\n    متغير a : صحيح ;\n    متغير b : صحيح ;\n    a = 1 ;\n    b = a + 2 ;\n    اطبع ( b ) ;\n} .";
    let result = compile(src).unwrap();
    let ops: Vec<OpCode> = result.instructions.iter().map(|i| i.op).collect();
    assert_eq!(
        ops,
        vec![
            OpCode::Assign,
            OpCode::Add,
            OpCode::Assign,
            OpCode::Print,
            OpCode::Halt,
        ]
    );
}

#[test]
fn declared_types_survive_into_the_symbol_table_output() {
    let src = "برنامج P ; { متغير ن : خيط ; ن = \"مرحبا\" ; اطبع ( ن ) ; } .";
    let result = compile(src).unwrap();
    // The emitter knows ن is a string and prints it through print_str.
    assert!(result.assembly.contains("call print_str"));
    assert!(!result.assembly.contains("call print_int"));

    let program = result.program;
    match &program.statements[0] {
        arabc::ast::Stmt::VarDecl { ty, .. } => assert_eq!(*ty, Type::String),
        other => panic!("expected declaration, got {:?}", other),
    }
}

#[test]
fn print_arguments_keep_their_order() {
    let src = "برنامج P ; { متغير x : صحيح ; اطبع ( \"اول\" , x , \"ثاني\" ) ; } .";
    let result = compile(src).unwrap();
    assert_eq!(
        result.render_ir(),
        "PRINT \"اول\"\nPRINT x\nPRINT \"ثاني\"\nHALT\n"
    );
}

#[test]
fn halt_is_always_last() {
    let result = compile("برنامج P ; { } .").unwrap();
    assert_eq!(result.render_ir(), "HALT\n");
}
