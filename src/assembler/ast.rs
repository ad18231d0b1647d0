//! This AST describes a parsed LC-3 assembly file.
//!
//! Statements are kept in source order. Labels are plain names, nothing
//! here resolves them to addresses.
//!
//! Supported statements:
//!
//! ```nasm
//! ADD R1, R2, R3      ; three registers
//! AND R1, R2, #-4     ; two registers and an immediate
//! NOT R1, R2
//! LD  R1, LABEL       ; also LDI, LEA, ST, STI
//! LDR R1, R2, #6      ; also STR
//! JMP R7              ; also JSRR
//! JSR LABEL
//! BRnz LABEL          ; BR with any of the n, z and p flags
//! RET                 ; also RTI
//!
//! .ORIG x3000
//! .FILL x1F
//! .BLKW #4
//! .STRINGZ "Hello"
//! .END
//!
//! TRAP x25
//! HALT                ; also GETC, OUT, PUTS, IN, PUTSP
//!
//! LOOP ADD R1, R1, #-1    ; a label in front of a statement
//! BODY:                   ; a label introducing an indented block
//!     ADD R2, R2, R1
//!     BRp LOOP
//! ```
//!
//! Every node renders back to canonical source through `Display`.

use std::convert::TryFrom;
use std::fmt;

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (idx, statement) in self.statements.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", statement)?;
        }
        Ok(())
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Statement {
    ThreeRegister {
        opcode: Opcode,
        destination: Register,
        sources: [Register; 2],
    },
    TwoRegisterImmediate {
        opcode: Opcode,
        destination: Register,
        source: Register,
        immediate: i64,
    },
    TwoRegister {
        opcode: Opcode,
        destination: Register,
        source: Register,
    },
    RegisterLabel {
        opcode: Opcode,
        register: Register,
        label: Label,
    },
    TwoRegisterOffset {
        opcode: Opcode,
        left: Register,
        right: Register,
        offset: i64,
    },
    SingleRegister {
        opcode: Opcode,
        register: Register,
    },
    SingleLabel {
        opcode: Opcode,
        label: Label,
    },
    Branch {
        condition: Condition,
        label: Label,
    },
    NoArg {
        opcode: Opcode,
    },
    IntegerDirective {
        directive: Directive,
        value: u64,
    },
    HexDirective {
        directive: Directive,
        value: i64,
    },
    NoArgDirective {
        directive: Directive,
    },
    StringDirective {
        directive: Directive,
        value: String,
    },
    HexTrap {
        trap: Trap,
        vector: i64,
    },
    NoArgTrap {
        trap: Trap,
    },
    Labeled {
        label: Label,
        statement: Box<Statement>,
    },
    Block {
        label: Label,
        body: Vec<Statement>,
    },
}

impl Statement {
    /// Name of the statement's shape, used by the debug listing.
    pub fn shape(&self) -> &'static str {
        use Statement::*;
        match self {
            ThreeRegister { .. } => "three-register",
            TwoRegisterImmediate { .. } => "two-register-immediate",
            TwoRegister { .. } => "two-register",
            RegisterLabel { .. } => "register-label",
            TwoRegisterOffset { .. } => "two-register-offset",
            SingleRegister { .. } => "single-register",
            SingleLabel { .. } => "single-label",
            Branch { .. } => "branch",
            NoArg { .. } => "no-arg",
            IntegerDirective { .. } => "integer-directive",
            HexDirective { .. } => "hex-directive",
            NoArgDirective { .. } => "no-arg-directive",
            StringDirective { .. } => "string-directive",
            HexTrap { .. } => "hex-trap",
            NoArgTrap { .. } => "no-arg-trap",
            Labeled { .. } => "labeled",
            Block { .. } => "block",
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter, depth: usize) -> fmt::Result {
        use Statement::*;
        match self {
            ThreeRegister { opcode, destination, sources } => {
                write!(f, "{} {},{},{}", opcode, destination, sources[0], sources[1])
            }
            TwoRegisterImmediate { opcode, destination, source, immediate } => {
                write!(f, "{} {},{},#{}", opcode, destination, source, immediate)
            }
            TwoRegister { opcode, destination, source } => {
                write!(f, "{} {},{}", opcode, destination, source)
            }
            RegisterLabel { opcode, register, label } => {
                write!(f, "{} {},{}", opcode, register, label)
            }
            TwoRegisterOffset { opcode, left, right, offset } => {
                write!(f, "{} {},{},#{}", opcode, left, right, offset)
            }
            SingleRegister { opcode, register } => write!(f, "{} {}", opcode, register),
            SingleLabel { opcode, label } => write!(f, "{} {}", opcode, label),
            Branch { condition, label } => write!(f, "{}{} {}", Opcode::BR, condition, label),
            NoArg { opcode } => write!(f, "{}", opcode),
            IntegerDirective { directive, value } => write!(f, ".{} #{}", directive, value),
            HexDirective { directive, value } => write!(f, ".{} x{:X}", directive, value),
            NoArgDirective { directive } => write!(f, ".{}", directive),
            StringDirective { directive, value } => {
                write!(f, ".{} \"{}\"", directive, escape(value))
            }
            HexTrap { trap, vector } => write!(f, "{} x{:02X}", trap, vector),
            NoArgTrap { trap } => write!(f, "{}", trap),
            Labeled { label, statement } => {
                write!(f, "{} ", label)?;
                statement.write_indented(f, depth)
            }
            Block { label, body } => {
                write!(f, "{}:", label)?;
                for statement in body {
                    write!(f, "\n{}", "\t".repeat(depth + 1))?;
                    statement.write_indented(f, depth + 1)?;
                }
                Ok(())
            }
        }
    }
}

/// Escapes a string the way `.STRINGZ` operands are written.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            _ => out.push(c),
        }
    }
    out
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Opcode {
    ADD,
    AND,
    NOT,
    LD,
    LDI,
    LDR,
    LEA,
    ST,
    STI,
    STR,
    BR,
    JMP,
    JSR,
    JSRR,
    RET,
    RTI,
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl TryFrom<&str> for Opcode {
    type Error = String;

    /// Every spelling of the branch mnemonic (`BR`, `BRnz`, ...) maps to
    /// `BR`; its flags are read with [`Condition::from_mnemonic`].
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        use Opcode::*;
        match value {
            "ADD" => Ok(ADD),
            "AND" => Ok(AND),
            "NOT" => Ok(NOT),
            "LD" => Ok(LD),
            "LDI" => Ok(LDI),
            "LDR" => Ok(LDR),
            "LEA" => Ok(LEA),
            "ST" => Ok(ST),
            "STI" => Ok(STI),
            "STR" => Ok(STR),
            "JMP" => Ok(JMP),
            "JSR" => Ok(JSR),
            "JSRR" => Ok(JSRR),
            "RET" => Ok(RET),
            "RTI" => Ok(RTI),
            _ if Condition::from_mnemonic(value).is_some() => Ok(BR),
            _ => Err(format!("unknown opcode `{}`", value)),
        }
    }
}

/// The condition codes a branch tests.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Condition {
    pub n: bool,
    pub z: bool,
    pub p: bool,
}

impl Condition {
    pub const ALWAYS: Condition = Condition { n: true, z: true, p: true };

    /// Reads the flags from a branch mnemonic. A bare `BR` branches
    /// unconditionally; otherwise each of `n`, `z` and `p` in the suffix
    /// sets its flag. Returns `None` if this is not a branch mnemonic.
    pub fn from_mnemonic(mnemonic: &str) -> Option<Condition> {
        let suffix = mnemonic.strip_prefix("BR")?;
        if suffix.is_empty() {
            return Some(Condition::ALWAYS);
        }

        let mut condition = Condition { n: false, z: false, p: false };
        for c in suffix.chars() {
            match c {
                'n' => condition.n = true,
                'z' => condition.z = true,
                'p' => condition.p = true,
                _ => return None,
            }
        }
        Some(condition)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.n {
            write!(f, "n")?;
        }
        if self.z {
            write!(f, "z")?;
        }
        if self.p {
            write!(f, "p")?;
        }
        Ok(())
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Directive {
    ORIG,
    FILL,
    BLKW,
    STRINGZ,
    END,
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl TryFrom<&str> for Directive {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        use Directive::*;
        match value {
            "ORIG" => Ok(ORIG),
            "FILL" => Ok(FILL),
            "BLKW" => Ok(BLKW),
            "STRINGZ" => Ok(STRINGZ),
            "END" => Ok(END),
            _ => Err(format!("unknown directive `.{}`", value)),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Trap {
    TRAP,
    GETC,
    OUT,
    PUTS,
    IN,
    PUTSP,
    HALT,
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl TryFrom<&str> for Trap {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        use Trap::*;
        match value {
            "TRAP" => Ok(TRAP),
            "GETC" => Ok(GETC),
            "OUT" => Ok(OUT),
            "PUTS" => Ok(PUTS),
            "IN" => Ok(IN),
            "PUTSP" => Ok(PUTSP),
            "HALT" => Ok(HALT),
            _ => Err(format!("unknown trap `{}`", value)),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Register {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "R{}", self.id())
    }
}

impl TryFrom<u8> for Register {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use Register::*;
        // Register ID must be between 0 and 7.
        match value {
            0 => Ok(R0),
            1 => Ok(R1),
            2 => Ok(R2),
            3 => Ok(R3),
            4 => Ok(R4),
            5 => Ok(R5),
            6 => Ok(R6),
            7 => Ok(R7),
            _ => Err(format!("register R{} does not exist, registers range from R0 to R7", value)),
        }
    }
}

impl Register {
    /// The numeric id of the register.
    pub fn id(&self) -> u8 {
        *self as u8
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Label(String);

impl Label {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Label(name.into())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_program() {
        let program = Program {
            statements: vec![Statement::ThreeRegister {
                opcode: Opcode::ADD,
                destination: Register::R3,
                sources: [Register::R2, Register::R6],
            }],
        };
        assert_eq!(program.to_string(), "ADD R3,R2,R6");
    }

    #[test]
    fn test_render_statements() {
        let label = Label::new("LOOP");
        let cases = vec![
            (
                Statement::TwoRegisterImmediate {
                    opcode: Opcode::AND,
                    destination: Register::R1,
                    source: Register::R2,
                    immediate: -4,
                },
                "AND R1,R2,#-4",
            ),
            (
                Statement::TwoRegister {
                    opcode: Opcode::NOT,
                    destination: Register::R0,
                    source: Register::R7,
                },
                "NOT R0,R7",
            ),
            (
                Statement::RegisterLabel {
                    opcode: Opcode::LEA,
                    register: Register::R4,
                    label: label.clone(),
                },
                "LEA R4,LOOP",
            ),
            (
                Statement::TwoRegisterOffset {
                    opcode: Opcode::STR,
                    left: Register::R1,
                    right: Register::R6,
                    offset: -2,
                },
                "STR R1,R6,#-2",
            ),
            (Statement::SingleRegister { opcode: Opcode::JMP, register: Register::R7 }, "JMP R7"),
            (Statement::SingleLabel { opcode: Opcode::JSR, label: label.clone() }, "JSR LOOP"),
            (
                Statement::Branch {
                    condition: Condition { n: true, z: false, p: true },
                    label: label.clone(),
                },
                "BRnp LOOP",
            ),
            (
                Statement::Branch { condition: Condition::ALWAYS, label: label.clone() },
                "BRnzp LOOP",
            ),
            (Statement::NoArg { opcode: Opcode::RTI }, "RTI"),
            (Statement::IntegerDirective { directive: Directive::BLKW, value: 4 }, ".BLKW #4"),
            (Statement::HexDirective { directive: Directive::ORIG, value: 0x3000 }, ".ORIG x3000"),
            (Statement::NoArgDirective { directive: Directive::END }, ".END"),
            (
                Statement::StringDirective {
                    directive: Directive::STRINGZ,
                    value: "a \"b\"\n".to_string(),
                },
                ".STRINGZ \"a \\\"b\\\"\\n\"",
            ),
            (Statement::HexTrap { trap: Trap::TRAP, vector: 0x25 }, "TRAP x25"),
            (Statement::NoArgTrap { trap: Trap::PUTSP }, "PUTSP"),
        ];

        for (statement, text) in cases {
            assert_eq!(statement.to_string(), text);
        }
    }

    #[test]
    fn test_render_blocks() {
        let block = Statement::Block {
            label: Label::new("OUTER"),
            body: vec![
                Statement::NoArgTrap { trap: Trap::GETC },
                Statement::Block {
                    label: Label::new("INNER"),
                    body: vec![Statement::NoArg { opcode: Opcode::RET }],
                },
                Statement::Labeled {
                    label: Label::new("DONE"),
                    statement: Box::new(Statement::NoArgTrap { trap: Trap::HALT }),
                },
            ],
        };
        assert_eq!(block.to_string(), "OUTER:\n\tGETC\n\tINNER:\n\t\tRET\n\tDONE HALT");
    }

    #[test]
    fn test_register() {
        for i in 0..=7u8 {
            let reg = Register::try_from(i);
            assert!(reg.is_ok());
            assert_eq!(reg.ok().unwrap().id(), i);
        }
        for i in 8..=u8::MAX {
            assert!(Register::try_from(i).is_err());
        }
        assert_eq!(Register::R5.to_string(), "R5");
    }

    #[test]
    fn test_condition() {
        assert_eq!(Condition::from_mnemonic("BR"), Some(Condition::ALWAYS));
        assert_eq!(Condition::from_mnemonic("BRzpn"), Some(Condition::ALWAYS));
        let n_only = Condition { n: true, z: false, p: false };
        let z_only = Condition { n: false, z: true, p: false };
        assert_eq!(Condition::from_mnemonic("BRnn"), Some(n_only));
        assert_eq!(Condition::from_mnemonic("BRz"), Some(z_only));
        assert_eq!(Condition::from_mnemonic("BRq"), None);
        assert_eq!(Condition::from_mnemonic("JSR"), None);
    }

    #[test]
    fn test_mnemonics() {
        assert_eq!(Opcode::try_from("LDR"), Ok(Opcode::LDR));
        assert_eq!(Opcode::try_from("BRnz"), Ok(Opcode::BR));
        assert!(Opcode::try_from("add").is_err());
        assert_eq!(Directive::try_from("STRINGZ"), Ok(Directive::STRINGZ));
        assert_eq!(Directive::try_from("BEGIN"), Err("unknown directive `.BEGIN`".to_string()));
        assert_eq!(Trap::try_from("PUTS"), Ok(Trap::PUTS));
        assert!(Trap::try_from("PUT").is_err());
    }
}
