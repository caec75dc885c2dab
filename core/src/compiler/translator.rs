//! Translator implementation.

use core::fmt;

use hashbrown::{HashMap, HashSet};
use tracing::debug;

use crate::{
    compiler::TranslateError,
    parser::{
        BinaryOp, Block, BoolOp, ComparisonOp, Expr, ExprKind, Function, Literal, Pos, Program,
        Stmt, StmtKind, UnaryOp,
    },
    vm::{Code, FunctionInfo, Instruction, LocalVar, Value},
};

/// Translate a checked program in one call.
pub fn translate(program: &Program) -> Result<Code, TranslateError> {
    Translator::translate(program)
}

/// Key of a patch site: a label inside the current program or the entry of
/// a function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PatchKey {
    Label(usize),
    Function(String),
}

impl fmt::Display for PatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchKey::Label(id) => write!(f, "L{}", id),
            PatchKey::Function(name) => write!(f, "fn {}", name),
        }
    }
}

/// One lexical scope of the function being translated.
struct Scope<'p> {
    /// Variable name -> slot.
    names: HashMap<&'p str, u16>,
    /// First free slot when the scope was opened; restored when it closes.
    first_slot: u16,
    /// Locals declared in this scope (indices into `Translator::locals`),
    /// whose live range ends when the scope closes.
    declared: Vec<usize>,
}

/// Translates a checked syntax tree into a [`Code`] value.
///
/// Tracks the operand stack depth to check that statements leave the stack
/// as they found it.
pub struct Translator<'p> {
    /// Emitted instructions
    instructions: Vec<Instruction>,

    /// Source position of each emitted instruction
    source_map: Vec<Option<Pos>>,

    /// Finished functions
    functions: Vec<FunctionInfo>,

    /// Declared function names and their arities
    arities: HashMap<&'p str, usize>,

    /// Pending patch sites: (instruction offset, key)
    patches: Vec<(usize, PatchKey)>,

    /// Resolved labels and function entries
    targets: HashMap<PatchKey, usize>,

    /// Next label id
    next_label: usize,

    // === Per-function state ===
    /// Name of the function being translated
    function: &'p str,

    /// Scope stack for lexical scoping
    ///
    /// Each scope maps variable names to their slot. A `let` always allocates
    /// a new slot, so a shadowing binding never overwrites the shadowed one.
    scopes: Vec<Scope<'p>>,

    /// Local variable table of the function being translated
    locals: Vec<LocalVar>,

    /// Next free slot
    next_slot: u16,

    /// Maximum simultaneous slot count (the `ENTER` operand)
    max_slots: u16,

    /// Source position attached to emitted instructions
    pos: Option<Pos>,

    /// Current operand stack depth during translation
    stack_depth: usize,
}

impl<'p> Translator<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self {
            instructions: Vec::new(),
            source_map: Vec::new(),
            functions: Vec::new(),
            arities: program
                .functions
                .iter()
                .map(|f| (f.name.as_str(), f.params.len()))
                .collect(),
            patches: Vec::new(),
            targets: HashMap::new(),
            next_label: 0,
            function: "",
            scopes: Vec::new(),
            locals: Vec::new(),
            next_slot: 0,
            max_slots: 0,
            pos: None,
            stack_depth: 0,
        }
    }

    /// Convenience method to translate a program in one call.
    pub fn translate(program: &'p Program) -> Result<Code, TranslateError> {
        let main = program.function("main").ok_or(TranslateError::MissingMain)?;
        let mut translator = Self::new(program);

        translator.translate_function(main)?;
        for function in program.functions.iter().filter(|f| f.name != "main") {
            translator.translate_function(function)?;
        }
        translator.finalize()
    }

    /// Resolve every patch site and return the code.
    pub fn finalize(mut self) -> Result<Code, TranslateError> {
        for (offset, key) in core::mem::take(&mut self.patches) {
            let target = *self
                .targets
                .get(&key)
                .ok_or_else(|| TranslateError::UnresolvedPatch {
                    offset,
                    key: key.to_string(),
                })?;
            self.instructions[offset].set_target(target);
        }

        let entry = self
            .targets
            .get(&PatchKey::Function("main".to_string()))
            .copied()
            .ok_or(TranslateError::MissingMain)?;

        let code = Code {
            instructions: self.instructions,
            entry,
            source_map: self.source_map,
            functions: self.functions,
        };
        code.validate()?;
        Ok(code)
    }

    // === Stack Management ===

    fn push_stack(&mut self) {
        self.stack_depth += 1;
    }

    fn pop_stack_n(&mut self, n: usize) {
        debug_assert!(
            self.stack_depth >= n,
            "Stack underflow: trying to pop {} but depth is {}",
            n,
            self.stack_depth
        );
        self.stack_depth = self.stack_depth.saturating_sub(n);
    }

    // === Instruction Emission ===

    /// Emit an instruction at the current source position.
    fn emit(&mut self, instruction: Instruction) -> usize {
        self.emit_at(instruction, self.pos)
    }

    fn emit_at(&mut self, instruction: Instruction, pos: Option<Pos>) -> usize {
        match &instruction {
            Instruction::Push(_) | Instruction::Load(_) => self.push_stack(),
            Instruction::Pop
            | Instruction::Store(_)
            | Instruction::Alloc
            | Instruction::JumpIfFalse(_)
            | Instruction::Print
            | Instruction::Trap
            | Instruction::Return => self.pop_stack_n(1),
            Instruction::Add
            | Instruction::Sub
            | Instruction::Mul
            | Instruction::Div
            | Instruction::Mod
            | Instruction::And
            | Instruction::Or
            | Instruction::Eq
            | Instruction::Ne
            | Instruction::Lt
            | Instruction::Le
            | Instruction::Gt
            | Instruction::Ge => self.pop_stack_n(1),
            Instruction::Call { argc, .. } => {
                self.pop_stack_n(*argc as usize);
                self.push_stack();
            }
            Instruction::Array(n) => {
                self.pop_stack_n(*n as usize);
                self.push_stack();
            }
            Instruction::StoreIndexed(_) => self.pop_stack_n(2),
            Instruction::LoadIndexed(_)
            | Instruction::Neg
            | Instruction::Not
            | Instruction::Jump(_)
            | Instruction::Enter(_)
            | Instruction::Halt => {}
        }
        let offset = self.instructions.len();
        self.instructions.push(instruction);
        self.source_map.push(pos);
        offset
    }

    // === Jump Patching Infrastructure ===

    fn new_label(&mut self) -> PatchKey {
        self.next_label += 1;
        PatchKey::Label(self.next_label - 1)
    }

    /// Get the current instruction index (for use as a jump target).
    fn label(&self) -> usize {
        self.instructions.len()
    }

    /// Place `key` at the current instruction index.
    fn place(&mut self, key: PatchKey) {
        let offset = self.label();
        self.targets.insert(key, offset);
    }

    /// Emit a jump or call whose target is resolved later by `finalize`.
    fn jump_placeholder(&mut self, instruction: Instruction, key: PatchKey) -> usize {
        let offset = self.emit(instruction);
        self.patches.push((offset, key));
        offset
    }

    /// Emit a forward `JUMP` carrying the position of the previous
    /// instruction, so skipping an `else` branch is not a line of its own.
    fn jump_over(&mut self, key: PatchKey) {
        let pos = self.source_map.last().copied().flatten();
        let offset = self.emit_at(Instruction::Jump(0), pos);
        self.patches.push((offset, key));
    }

    // === Local Variable Management ===

    fn lookup_local(&self, name: &str) -> Result<u16, TranslateError> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.names.get(name).copied())
            .ok_or_else(|| TranslateError::UnboundName {
                name: name.to_string(),
                function: self.function.to_string(),
            })
    }

    /// Allocate a new slot for `name` in the innermost scope. The name is
    /// live from `live_from` until the scope closes.
    fn allocate_local(&mut self, name: &'p str, live_from: usize) -> Result<u16, TranslateError> {
        let slot = self.next_slot;
        self.next_slot = slot.checked_add(1).ok_or_else(|| TranslateError::TooManySlots {
            function: self.function.to_string(),
        })?;
        self.max_slots = self.max_slots.max(self.next_slot);

        self.locals.push(LocalVar {
            name: name.to_string(),
            slot,
            live: live_from..live_from,
        });
        let index = self.locals.len() - 1;
        if let Some(scope) = self.scopes.last_mut() {
            scope.names.insert(name, slot);
            scope.declared.push(index);
        }
        Ok(slot)
    }

    fn push_scope(&mut self) {
        self.scopes.push(Scope {
            names: HashMap::new(),
            first_slot: self.next_slot,
            declared: Vec::new(),
        });
    }

    /// Close the innermost scope: its locals stop being live here and their
    /// slots become free for reuse.
    fn pop_scope(&mut self) {
        let end = self.label();
        if let Some(scope) = self.scopes.pop() {
            for index in scope.declared {
                self.locals[index].live.end = end;
            }
            self.next_slot = scope.first_slot;
        }
    }

    // === Functions ===

    fn translate_function(&mut self, function: &'p Function) -> Result<(), TranslateError> {
        let entry = self.label();
        self.place(PatchKey::Function(function.name.clone()));
        self.function = &function.name;
        self.locals.clear();
        self.next_slot = 0;
        self.max_slots = 0;
        self.stack_depth = 0;
        self.pos = Some(function.loc.pos);

        // Patched with the slot count once the body is translated.
        self.emit(Instruction::Enter(0));

        self.push_scope();
        let mut seen = HashSet::new();
        for param in &function.params {
            if !seen.insert(param.name.as_str()) {
                return Err(TranslateError::DuplicateParameter {
                    name: param.name.clone(),
                    function: function.name.clone(),
                });
            }
            self.allocate_local(&param.name, entry)?;
        }

        // The body shares the parameters' scope, so locals stay live up to
        // the closing brace.
        for stmt in &function.body.stmts {
            self.translate_stmt(stmt)?;
        }

        // Implicit `return ();` at the closing brace.
        self.pos = Some(function.body.end.pos);
        self.emit(Instruction::Push(Value::Unit));
        self.emit(Instruction::Return);
        self.pop_scope();

        let end = self.label();
        self.instructions[entry] = Instruction::Enter(self.max_slots);
        let arity = u16::try_from(function.params.len()).map_err(|_| {
            TranslateError::TooManySlots {
                function: function.name.clone(),
            }
        })?;

        debug!(
            function = %function.name,
            entry,
            end,
            slots = self.max_slots,
            "Translated function"
        );
        self.functions.push(FunctionInfo {
            name: function.name.clone(),
            entry,
            end,
            arity,
            slots: self.max_slots,
            locals: core::mem::take(&mut self.locals),
        });
        Ok(())
    }

    fn translate_block(&mut self, block: &'p Block) -> Result<(), TranslateError> {
        self.push_scope();
        for stmt in &block.stmts {
            self.translate_stmt(stmt)?;
        }
        self.pop_scope();
        Ok(())
    }

    // === Statements ===

    fn translate_stmt(&mut self, stmt: &'p Stmt) -> Result<(), TranslateError> {
        self.pos = Some(stmt.loc.pos);

        match &stmt.kind {
            StmtKind::Let { name, value } => {
                // The initializer is translated before the name is bound.
                self.translate_expr(value)?;
                let store = self.emit(Instruction::Store(0));
                let slot = self.allocate_local(name, store + 1)?;
                self.instructions[store] = Instruction::Store(slot);
            }
            StmtKind::Assign { name, value } => {
                self.translate_expr(value)?;
                let slot = self.lookup_local(name)?;
                self.emit(Instruction::Store(slot));
            }
            StmtKind::AssignIndex { name, index, value } => {
                self.translate_expr(index)?;
                self.translate_expr(value)?;
                let slot = self.lookup_local(name)?;
                self.emit(Instruction::StoreIndexed(slot));
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                let else_label = self.new_label();
                self.translate_expr(cond)?;
                self.jump_placeholder(Instruction::JumpIfFalse(0), else_label.clone());
                self.translate_block(then_block)?;

                match else_block {
                    Some(else_block) => {
                        let end_label = self.new_label();
                        self.jump_over(end_label.clone());
                        self.place(else_label);
                        self.translate_block(else_block)?;
                        self.place(end_label);
                    }
                    None => self.place(else_label),
                }
            }
            StmtKind::While { cond, body } => {
                let end_label = self.new_label();
                let cond_offset = self.label();
                self.translate_expr(cond)?;
                self.jump_placeholder(Instruction::JumpIfFalse(0), end_label.clone());
                self.translate_block(body)?;
                // The back edge belongs to the `while` line.
                self.pos = Some(stmt.loc.pos);
                self.emit(Instruction::Jump(cond_offset));
                self.place(end_label);
            }
            StmtKind::Return(value) => {
                match value {
                    Some(value) => self.translate_expr(value)?,
                    None => {
                        self.emit(Instruction::Push(Value::Unit));
                    }
                }
                self.emit(Instruction::Return);
            }
            StmtKind::Print(value) => {
                self.translate_expr(value)?;
                self.emit(Instruction::Print);
            }
            StmtKind::Error(value) => {
                match value {
                    Some(value) => self.translate_expr(value)?,
                    None => {
                        self.emit(Instruction::Push(Value::str("error")));
                    }
                }
                self.emit(Instruction::Trap);
            }
            StmtKind::Exit => {
                self.emit(Instruction::Halt);
            }
            StmtKind::Expr(value) => {
                self.translate_expr(value)?;
                self.emit(Instruction::Pop);
            }
        }

        debug_assert_eq!(
            self.stack_depth, 0,
            "statement at {} left values on the stack",
            stmt.loc.pos
        );
        Ok(())
    }

    // === Expressions ===

    /// Translate an expression. Leaves exactly one value on the stack.
    fn translate_expr(&mut self, expr: &'p Expr) -> Result<(), TranslateError> {
        match &expr.kind {
            ExprKind::Literal(literal) => {
                let value = match literal {
                    Literal::Int(i) => Value::Int(*i),
                    Literal::Bool(b) => Value::Bool(*b),
                    Literal::Str(s) => Value::str(s.as_str()),
                };
                self.emit(Instruction::Push(value));
            }
            ExprKind::Ident(name) => {
                let slot = self.lookup_local(name)?;
                self.emit(Instruction::Load(slot));
            }
            ExprKind::Index { name, index } => {
                self.translate_expr(index)?;
                let slot = self.lookup_local(name)?;
                self.emit(Instruction::LoadIndexed(slot));
            }
            ExprKind::Array(items) => {
                let count = u16::try_from(items.len()).map_err(|_| {
                    TranslateError::TooManyElements {
                        function: self.function.to_string(),
                    }
                })?;
                for item in items {
                    self.translate_expr(item)?;
                }
                self.emit(Instruction::Array(count));
            }
            ExprKind::ArrayRepeat { fill, size } => {
                self.translate_expr(fill)?;
                self.translate_expr(size)?;
                self.emit(Instruction::Alloc);
            }
            ExprKind::Call { name, args } => {
                let expected = self.arities.get(name.as_str()).copied().ok_or_else(|| {
                    TranslateError::UnknownFunction { name: name.clone() }
                })?;
                if expected != args.len() {
                    return Err(TranslateError::ArityMismatch {
                        name: name.clone(),
                        expected,
                        found: args.len(),
                    });
                }
                let argc = u16::try_from(args.len())
                    .map_err(|_| TranslateError::TooManyArguments { name: name.clone() })?;
                for arg in args {
                    self.translate_expr(arg)?;
                }
                self.jump_placeholder(
                    Instruction::Call { target: 0, argc },
                    PatchKey::Function(name.clone()),
                );
            }
            ExprKind::Unary { op, expr } => {
                self.translate_expr(expr)?;
                self.emit(match op {
                    UnaryOp::Neg => Instruction::Neg,
                    UnaryOp::Not => Instruction::Not,
                });
            }
            ExprKind::Binary { op, left, right } => {
                self.translate_expr(left)?;
                self.translate_expr(right)?;
                self.emit(match op {
                    BinaryOp::Add => Instruction::Add,
                    BinaryOp::Sub => Instruction::Sub,
                    BinaryOp::Mul => Instruction::Mul,
                    BinaryOp::Div => Instruction::Div,
                    BinaryOp::Mod => Instruction::Mod,
                });
            }
            ExprKind::Comparison { op, left, right } => {
                self.translate_expr(left)?;
                self.translate_expr(right)?;
                self.emit(match op {
                    ComparisonOp::Eq => Instruction::Eq,
                    ComparisonOp::Neq => Instruction::Ne,
                    ComparisonOp::Lt => Instruction::Lt,
                    ComparisonOp::Le => Instruction::Le,
                    ComparisonOp::Gt => Instruction::Gt,
                    ComparisonOp::Ge => Instruction::Ge,
                });
            }
            ExprKind::Boolean { op, left, right } => {
                // Both operands are evaluated.
                self.translate_expr(left)?;
                self.translate_expr(right)?;
                self.emit(match op {
                    BoolOp::And => Instruction::And,
                    BoolOp::Or => Instruction::Or,
                });
            }
        }
        Ok(())
    }
}
