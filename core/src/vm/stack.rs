/// A stack with an optional size limit.
///
/// The VM keeps two of these: the operand stack (unbounded) and the frame
/// stack (bounded by `ExecutionOptions::max_depth`). Pushing onto a full
/// stack hands the value back instead of panicking, so the caller can turn
/// it into a fault.
///
/// # Examples
///
/// ```ignore
/// use sofl_core::vm::Stack;
///
/// let mut stack = Stack::with_limit(2);
/// assert!(stack.push(42).is_ok());
/// assert!(stack.push(17).is_ok());
/// assert_eq!(stack.push(3), Err(3));
/// assert_eq!(stack.pop(), Some(17));
/// assert_eq!(stack.peek(), Some(&42));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Stack<T> {
    items: Vec<T>,
    limit: usize,
}

impl<T> Stack<T> {
    /// Creates a stack without a size limit.
    pub fn new() -> Self {
        Self::with_limit(usize::MAX)
    }

    /// Creates a stack holding at most `limit` elements.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            // Pre-allocate a reasonable amount to avoid frequent reallocations
            items: Vec::with_capacity(limit.min(256)),
            limit,
        }
    }

    /// Pushes a value, or returns it back if the stack is full.
    #[inline]
    pub fn push(&mut self, value: T) -> Result<(), T> {
        if self.items.len() >= self.limit {
            return Err(value);
        }
        self.items.push(value);
        Ok(())
    }

    /// Removes and returns the top value, or `None` if the stack is empty.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    #[inline]
    pub fn peek(&self) -> Option<&T> {
        self.items.last()
    }

    #[inline]
    pub fn peek_mut(&mut self) -> Option<&mut T> {
        self.items.last_mut()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.limit
    }

    /// Maximum number of elements.
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Shortens the stack to `len` elements. No-op if it is already shorter.
    #[inline]
    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    /// Removes the top `n` elements and returns them bottom to top.
    ///
    /// Returns `None`, leaving the stack untouched, if fewer than `n`
    /// elements are present.
    pub fn pop_n(&mut self, n: usize) -> Option<Vec<T>> {
        let len = self.items.len();
        if n > len {
            return None;
        }
        Some(self.items.split_off(len - n))
    }

    /// Element at `index`, counting from the bottom.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Iterates from bottom to top.
    #[inline]
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T> Default for Stack<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop() {
        let mut stack = Stack::new();
        assert!(stack.is_empty());
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.peek(), Some(&2));
        assert_eq!(stack.pop(), Some(2));
        assert_eq!(stack.pop(), Some(1));
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn test_limit() {
        let mut stack = Stack::with_limit(2);
        assert_eq!(stack.push('a'), Ok(()));
        assert_eq!(stack.push('b'), Ok(()));
        assert!(stack.is_full());
        assert_eq!(stack.push('c'), Err('c'));
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.limit(), 2);
    }

    #[test]
    fn test_pop_n() {
        let mut stack = Stack::new();
        for i in 0..5 {
            stack.push(i).unwrap();
        }
        assert_eq!(stack.pop_n(2), Some(vec![3, 4]));
        assert_eq!(stack.pop_n(4), None);
        assert_eq!(stack.as_slice(), &[0, 1, 2]);
        assert_eq!(stack.pop_n(0), Some(vec![]));
    }

    #[test]
    fn test_truncate_and_peek_mut() {
        let mut stack = Stack::new();
        for i in 0..4 {
            stack.push(i).unwrap();
        }
        stack.truncate(2);
        assert_eq!(stack.iter().copied().collect::<Vec<_>>(), vec![0, 1]);
        if let Some(top) = stack.peek_mut() {
            *top = 10;
        }
        assert_eq!(stack.get(1), Some(&10));
        stack.truncate(5);
        assert_eq!(stack.len(), 2);
    }
}
