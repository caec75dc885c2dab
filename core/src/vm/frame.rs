use crate::vm::Value;

/// Activation record for one function call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Offset to resume at in the caller. `None` for the root frame.
    pub return_address: Option<usize>,
    /// Local slots. Arguments occupy `0..argc`; `ENTER` grows the table.
    pub slots: Vec<Value>,
    /// Height of the operand stack when the frame was entered.
    pub base: usize,
    /// Entry offset of the called function.
    pub entry: usize,
    /// Index of the calling frame in the frame stack.
    pub parent: Option<usize>,
}

impl Frame {
    pub fn root(entry: usize) -> Self {
        Self {
            return_address: None,
            slots: Vec::new(),
            base: 0,
            entry,
            parent: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.return_address.is_none()
    }
}
