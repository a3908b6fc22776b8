use crate::ast::Type;
use crate::ir::{Const, Instruction, OpCode, Operand};
use crate::symtab::SymbolTable;
use log::debug;
use std::collections::HashMap;
use std::fmt::Write;

/// Map the instruction list to 32-bit x86 assembly text (NASM syntax,
/// Linux system calls). Emission is one-to-one and deterministic: the same
/// instruction list always produces byte-identical output.
pub fn emit(instructions: &[Instruction], symbols: &SymbolTable) -> String {
    let mut emitter = Emitter::new(symbols);
    emitter.assign_storage(instructions);
    emitter.render(instructions)
}

/// Assembler labels must be ASCII, and source names are Arabic, so every
/// distinct variable, temporary and string literal gets an opaque
/// sequentially-numbered label on first reference. The mapping is cached for
/// the rest of the run.
struct Emitter<'a> {
    symbols: &'a SymbolTable,
    var_slots: HashMap<String, usize>,
    var_order: Vec<String>,
    temp_slots: HashMap<usize, usize>,
    string_labels: HashMap<String, usize>,
    string_order: Vec<String>,
}

impl<'a> Emitter<'a> {
    fn new(symbols: &'a SymbolTable) -> Self {
        Emitter {
            symbols,
            var_slots: HashMap::new(),
            var_order: Vec::new(),
            temp_slots: HashMap::new(),
            string_labels: HashMap::new(),
            string_order: Vec::new(),
        }
    }

    fn var_slot(&mut self, name: &str) -> usize {
        if let Some(&slot) = self.var_slots.get(name) {
            return slot;
        }
        let slot = self.var_order.len();
        self.var_slots.insert(name.to_string(), slot);
        self.var_order.push(name.to_string());
        slot
    }

    fn temp_slot(&mut self, n: usize) -> usize {
        let next = self.temp_slots.len();
        *self.temp_slots.entry(n).or_insert(next)
    }

    fn string_label(&mut self, s: &str) -> usize {
        if let Some(&label) = self.string_labels.get(s) {
            return label;
        }
        let label = self.string_order.len();
        self.string_labels.insert(s.to_string(), label);
        self.string_order.push(s.to_string());
        label
    }

    /// First pass: walk every operand in instruction order so slots and
    /// string labels come out in first-use order, then give the remaining
    /// declared-but-unreferenced variables slots in declaration order.
    fn assign_storage(&mut self, instructions: &[Instruction]) {
        for instr in instructions {
            for (is_result, operand) in [
                (true, &instr.result),
                (false, &instr.arg1),
                (false, &instr.arg2),
            ] {
                let Some(operand) = operand else { continue };
                match operand {
                    Operand::Var(name) => {
                        // Jump targets travel as the result operand of
                        // LABEL/GOTO/IF_GOTO but are not storage.
                        if !(is_result && is_jump_target(instr.op)) {
                            self.var_slot(name);
                        }
                    }
                    Operand::Temp(n) => {
                        self.temp_slot(*n);
                    }
                    Operand::Const(Const::Str(s)) => {
                        self.string_label(s);
                    }
                    Operand::Const(_) => {}
                }
            }
        }
        let declared: Vec<String> = self
            .symbols
            .iter()
            .map(|(name, _)| name.to_string())
            .collect();
        for name in declared {
            self.var_slot(&name);
        }
        debug!(
            "storage: {} variables, {} temps, {} strings",
            self.var_order.len(),
            self.temp_slots.len(),
            self.string_order.len()
        );
    }

    /// `dword [var_N]` / `dword [tmp_N]` for the operand's slot. Constants
    /// never reach this.
    fn slot(&self, operand: &Operand) -> String {
        match operand {
            Operand::Var(name) => format!("dword [var_{}]", self.var_slots[name]),
            Operand::Temp(n) => format!("dword [tmp_{}]", self.temp_slots[n]),
            Operand::Const(_) => unreachable!("constants have no storage slot"),
        }
    }

    /// Right-hand side of an arithmetic instruction: an immediate or a slot.
    fn rhs(&self, operand: &Operand) -> String {
        match operand {
            Operand::Const(c) => immediate(c, &self.string_labels),
            other => self.slot(other),
        }
    }

    fn load_acc(&self, out: &mut String, operand: &Operand) {
        match operand {
            Operand::Const(c) => {
                let _ = writeln!(out, "    mov eax, {}", immediate(c, &self.string_labels));
            }
            other => {
                let _ = writeln!(out, "    mov eax, {}", self.slot(other));
            }
        }
    }

    fn render(&self, instructions: &[Instruction]) -> String {
        let mut out = String::new();
        out.push_str("global _start\n\n");
        self.render_data_section(&mut out);
        self.render_text_section(&mut out, instructions);
        out.push_str(RUNTIME);
        out
    }

    fn render_data_section(&self, out: &mut String) {
        out.push_str("section .data\n");
        for (slot, name) in self.var_order.iter().enumerate() {
            let _ = writeln!(out, "    var_{} dd 0                ; {}", slot, name);
        }
        for slot in 0..self.temp_slots.len() {
            let _ = writeln!(out, "    tmp_{} dd 0", slot);
        }
        for (label, s) in self.string_order.iter().enumerate() {
            let _ = writeln!(out, "    str_{} db {}", label, encode_string(s));
        }
        out.push_str("    read_buf times 16 db 0\n");
        out.push_str("    out_buf times 16 db 0\n");
        out.push_str("    newline db 10\n\n");
    }

    fn render_text_section(&self, out: &mut String, instructions: &[Instruction]) {
        out.push_str("section .text\n\n");
        out.push_str("_start:\n");
        out.push_str("    push ebp\n");
        out.push_str("    mov ebp, esp\n");
        out.push_str("    sub esp, 1024\n\n");

        for instr in instructions {
            let _ = writeln!(out, "    ; {}", instr);
            self.render_instruction(out, instr);
            out.push('\n');
        }

        out.push_str("program_exit:\n");
        out.push_str("    mov eax, 1\n");
        out.push_str("    xor ebx, ebx\n");
        out.push_str("    int 0x80\n\n");
    }

    fn render_instruction(&self, out: &mut String, instr: &Instruction) {
        match instr.op {
            OpCode::Assign => {
                let dest = self.slot(instr.result.as_ref().unwrap());
                match instr.arg1.as_ref().unwrap() {
                    Operand::Const(c) => {
                        let _ = writeln!(
                            out,
                            "    mov {}, {}",
                            dest,
                            immediate(c, &self.string_labels)
                        );
                    }
                    src => {
                        let _ = writeln!(out, "    mov eax, {}", self.slot(src));
                        let _ = writeln!(out, "    mov {}, eax", dest);
                    }
                }
            }
            OpCode::Add | OpCode::Sub | OpCode::Mul => {
                let mnemonic = match instr.op {
                    OpCode::Add => "add",
                    OpCode::Sub => "sub",
                    _ => "imul",
                };
                self.load_acc(out, instr.arg1.as_ref().unwrap());
                let _ = writeln!(
                    out,
                    "    {} eax, {}",
                    mnemonic,
                    self.rhs(instr.arg2.as_ref().unwrap())
                );
                let _ = writeln!(out, "    mov {}, eax", self.slot(instr.result.as_ref().unwrap()));
            }
            OpCode::Div => {
                self.load_acc(out, instr.arg1.as_ref().unwrap());
                // idiv takes no immediate operand; constants go through ecx.
                match instr.arg2.as_ref().unwrap() {
                    Operand::Const(c) => {
                        let _ = writeln!(
                            out,
                            "    mov ecx, {}",
                            immediate(c, &self.string_labels)
                        );
                        out.push_str("    cdq\n");
                        out.push_str("    idiv ecx\n");
                    }
                    divisor => {
                        out.push_str("    cdq\n");
                        let _ = writeln!(out, "    idiv {}", self.slot(divisor));
                    }
                }
                let _ = writeln!(out, "    mov {}, eax", self.slot(instr.result.as_ref().unwrap()));
            }
            OpCode::Read => {
                out.push_str("    call read_int\n");
                let _ = writeln!(out, "    mov {}, eax", self.slot(instr.result.as_ref().unwrap()));
            }
            OpCode::Print => self.render_print(out, instr.arg1.as_ref().unwrap()),
            OpCode::Label => {
                let _ = writeln!(out, "{}:", label_name(instr.result.as_ref().unwrap()));
            }
            OpCode::Goto => {
                let _ = writeln!(out, "    jmp {}", label_name(instr.result.as_ref().unwrap()));
            }
            OpCode::IfGoto => {
                self.load_acc(out, instr.arg1.as_ref().unwrap());
                out.push_str("    cmp eax, 0\n");
                let _ = writeln!(out, "    jne {}", label_name(instr.result.as_ref().unwrap()));
            }
            OpCode::Halt => {
                out.push_str("    jmp program_exit\n");
            }
        }
    }

    /// Strings print through their address; everything else converts through
    /// the integer path. Each argument ends its own output line.
    fn render_print(&self, out: &mut String, arg: &Operand) {
        match arg {
            Operand::Const(Const::Str(s)) => {
                let _ = writeln!(out, "    mov esi, str_{}", self.string_labels[s]);
                out.push_str("    call print_str\n");
            }
            Operand::Var(name) if self.symbols.lookup(name) == Some(Type::String) => {
                let _ = writeln!(out, "    mov esi, {}", self.slot(arg));
                out.push_str("    call print_str\n");
            }
            other => {
                self.load_acc(out, other);
                out.push_str("    call print_int\n");
            }
        }
        out.push_str("    call print_nl\n");
    }
}

fn is_jump_target(op: OpCode) -> bool {
    matches!(op, OpCode::Label | OpCode::Goto | OpCode::IfGoto)
}

fn label_name(operand: &Operand) -> String {
    match operand {
        Operand::Var(name) => name.clone(),
        other => other.to_string(),
    }
}

/// Constants as immediates: reals truncate into the 32-bit data model and
/// string constants stand for their data-section address.
fn immediate(c: &Const, string_labels: &HashMap<String, usize>) -> String {
    match c {
        Const::Int(v) => format!("{}", *v as i32),
        Const::Real(v) => format!("{}", *v as i32),
        Const::Str(s) => format!("str_{}", string_labels[s]),
    }
}

/// NASM `db` item list for a string constant, NUL-terminated. Quotes and
/// control characters cannot sit inside a quoted segment and are emitted as
/// byte values instead.
fn encode_string(s: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut segment = String::new();
    for c in s.chars() {
        if c == '"' || c.is_control() {
            if !segment.is_empty() {
                parts.push(format!("\"{}\"", segment));
                segment.clear();
            }
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                parts.push(byte.to_string());
            }
        } else {
            segment.push(c);
        }
    }
    if !segment.is_empty() {
        parts.push(format!("\"{}\"", segment));
    }
    parts.push("0".to_string());
    parts.join(", ")
}

/// Fixed runtime: integer read, integer and string write. The generated
/// program is freestanding; there is no libc to call into.
const RUNTIME: &str = "\
; --- runtime ---

; Read a line from stdin and parse a decimal integer (optional leading '-').
; Result in eax.
read_int:
    push ebx
    push ecx
    push edx
    push esi
    push edi
    mov eax, 3                  ; sys_read
    xor ebx, ebx                ; fd 0
    mov ecx, read_buf
    mov edx, 15
    int 0x80
    mov esi, read_buf
    xor eax, eax
    xor edi, edi                ; sign flag
    cmp byte [esi], '-'
    jne .digits
    mov edi, 1
    inc esi
.digits:
    movzx ebx, byte [esi]
    cmp ebx, '0'
    jb .done
    cmp ebx, '9'
    ja .done
    imul eax, 10
    sub ebx, '0'
    add eax, ebx
    inc esi
    jmp .digits
.done:
    test edi, edi
    jz .ret
    neg eax
.ret:
    pop edi
    pop esi
    pop edx
    pop ecx
    pop ebx
    ret

; Write the integer in eax as decimal, collecting digits by repeated
; division by 10 and reversing via back-to-front buffer fill.
print_int:
    push ebx
    push ecx
    push edx
    push edi
    mov ebx, eax                ; keep the sign
    mov edi, out_buf + 15
    cmp eax, 0
    jge .convert
    neg eax
.convert:
    mov ecx, 10
.next_digit:
    xor edx, edx
    div ecx
    add edx, '0'
    dec edi
    mov [edi], dl
    test eax, eax
    jnz .next_digit
    test ebx, ebx
    jge .write
    dec edi
    mov byte [edi], '-'
.write:
    mov ecx, edi
    mov edx, out_buf + 15
    sub edx, edi                ; length
    mov eax, 4                  ; sys_write
    mov ebx, 1                  ; fd 1
    int 0x80
    pop edi
    pop edx
    pop ecx
    pop ebx
    ret

; Write the NUL-terminated string at esi.
print_str:
    push eax
    push ebx
    push ecx
    push edx
    mov ecx, esi
    xor edx, edx
.len:
    cmp byte [ecx + edx], 0
    je .write
    inc edx
    jmp .len
.write:
    mov eax, 4
    mov ebx, 1
    int 0x80
    pop edx
    pop ecx
    pop ebx
    pop eax
    ret

print_nl:
    push eax
    push ebx
    push ecx
    push edx
    mov eax, 4
    mov ebx, 1
    mov ecx, newline
    mov edx, 1
    int 0x80
    pop edx
    pop ecx
    pop ebx
    pop eax
    ret
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::lower::lower;
    use crate::parser::parse;
    use crate::typecheck::analyze;

    fn compile_asm(src: &str) -> String {
        let program = parse(&tokenize(src).unwrap()).unwrap();
        let mut symbols = SymbolTable::new();
        analyze(&program, &mut symbols).unwrap();
        let instrs = lower(&program).unwrap();
        emit(&instrs, &symbols)
    }

    #[test]
    fn emission_is_byte_deterministic() {
        let src = "برنامج p ; { متغير س : صحيح ; اقرأ ( س ) ; اطبع ( س , \"س\" ) ; } .";
        assert_eq!(compile_asm(src), compile_asm(src));
    }

    #[test]
    fn read_scenario_produces_slot_and_call() {
        let asm = compile_asm("برنامج p ; { متغير س : صحيح ; اقرأ ( س ) ; } .");
        assert!(asm.contains("var_0 dd 0"));
        assert!(asm.contains("call read_int\n    mov dword [var_0], eax"));
        assert!(asm.contains("jmp program_exit"));
    }

    #[test]
    fn each_variable_gets_exactly_one_slot() {
        let asm = compile_asm(
            "برنامج p ; { متغير س : صحيح ; متغير ص : صحيح ; ص = س + س ; } .",
        );
        assert_eq!(asm.matches("var_0 dd 0").count(), 1);
        assert_eq!(asm.matches("var_1 dd 0").count(), 1);
        assert!(!asm.contains("var_2"));
    }

    #[test]
    fn string_labels_assigned_in_first_use_order() {
        let asm = compile_asm(
            "برنامج p ; { اطبع ( \"اول\" ) ; اطبع ( \"ثاني\" , \"اول\" ) ; } .",
        );
        assert!(asm.contains("str_0 db \"اول\", 0"));
        assert!(asm.contains("str_1 db \"ثاني\", 0"));
        assert!(!asm.contains("str_2"));
    }

    #[test]
    fn unreferenced_declarations_still_get_slots() {
        let asm = compile_asm(
            "برنامج p ; { متغير س : صحيح ; متغير ص : حقيقي ; اقرأ ( ص ) ; } .",
        );
        // ص is referenced first, س follows in declaration order.
        assert!(asm.contains("var_0 dd 0                ; ص"));
        assert!(asm.contains("var_1 dd 0                ; س"));
    }

    #[test]
    fn string_typed_variables_print_through_print_str() {
        let asm = compile_asm(
            "برنامج p ; { متغير ن : خيط ; ن = \"مرحبا\" ; اطبع ( ن ) ; } .",
        );
        assert!(asm.contains("mov dword [var_0], str_0"));
        assert!(asm.contains("mov esi, dword [var_0]\n    call print_str"));
    }

    #[test]
    fn division_discards_the_remainder_via_idiv() {
        let asm = compile_asm(
            "برنامج p ; { متغير س : صحيح ; س = 7 / 2 ; } .",
        );
        assert!(asm.contains("mov ecx, 2\n    cdq\n    idiv ecx"));
    }

    #[test]
    fn control_characters_encode_as_bytes() {
        assert_eq!(encode_string("أ\nب"), "\"أ\", 10, \"ب\", 0");
        assert_eq!(encode_string("قل \"نعم\""), "\"قل \", 34, \"نعم\", 34, 0");
    }
}
