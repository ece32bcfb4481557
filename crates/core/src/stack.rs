use std::ops::{Deref, DerefMut};

use mlua::prelude::*;

use crate::dump;

/// Explicit evaluation stack shared by the decoder and the call protocol.
/// Popping or truncating drops the `mlua::Value` handle, which releases
/// the Lua reference it held.
#[derive(Default)]
pub struct ValueStack {
    slots: Vec<LuaValue>,
}

impl ValueStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Net +1.
    pub fn push(&mut self, value: LuaValue) {
        self.slots.push(value);
    }

    /// Push a fresh empty table. Net +1 on success, 0 on failure.
    pub fn push_table(&mut self, lua: &Lua) -> LuaResult<()> {
        let table = lua.create_table()?;
        self.slots.push(LuaValue::Table(table));
        Ok(())
    }

    /// Net -1 (or 0 on an empty stack).
    pub fn pop(&mut self) -> Option<LuaValue> {
        self.slots.pop()
    }

    pub fn top(&self) -> Option<&LuaValue> {
        self.slots.last()
    }

    /// Handle to the table on top. Net 0.
    pub fn top_table(&self) -> LuaResult<LuaTable> {
        match self.slots.last() {
            Some(LuaValue::Table(t)) => Ok(t.clone()),
            Some(other) => Err(LuaError::runtime(format!(
                "expected table on top of stack, found {}",
                other.type_name()
            ))),
            None => Err(LuaError::runtime("expected table on top of stack, found empty stack")),
        }
    }

    /// Pop the top value and bind it under `name` in the table beneath.
    /// Net -1 whether or not the bind succeeds.
    pub fn set_field(&mut self, name: &str) -> LuaResult<()> {
        let value = self.pop().unwrap_or(LuaValue::Nil);
        self.top_table()?.raw_set(name, value)
    }

    /// Pop the top value and store it at `index` in the table beneath.
    /// Net -1 whether or not the store succeeds.
    pub fn set_index(&mut self, index: usize) -> LuaResult<()> {
        let value = self.pop().unwrap_or(LuaValue::Nil);
        self.top_table()?.raw_set(index, value)
    }

    pub fn truncate(&mut self, depth: usize) {
        self.slots.truncate(depth);
    }

    /// Open a scope that restores the current depth when dropped.
    pub fn guard(&mut self) -> StackGuard<'_> {
        let base = self.depth();
        StackGuard { stack: self, base, keep: 0 }
    }

    /// One line per slot, bottom first, tables rendered to `max_depth`.
    pub fn describe(&self, max_depth: usize) -> String {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{}: {}", i + 1, dump::render(v, max_depth)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Scoped stack frame. Dropping it truncates the stack back to the depth
/// it was opened at, plus whatever was committed.
pub struct StackGuard<'a> {
    stack: &'a mut ValueStack,
    base: usize,
    keep: usize,
}

impl StackGuard<'_> {
    /// Leave exactly `net` values above the base once the guard drops.
    pub fn commit(mut self, net: usize) {
        self.keep = net;
    }
}

impl Deref for StackGuard<'_> {
    type Target = ValueStack;

    fn deref(&self) -> &ValueStack {
        &*self.stack
    }
}

impl DerefMut for StackGuard<'_> {
    fn deref_mut(&mut self) -> &mut ValueStack {
        &mut *self.stack
    }
}

impl Drop for StackGuard<'_> {
    fn drop(&mut self) {
        let floor = self.base + self.keep;
        if self.stack.depth() > floor {
            self.stack.truncate(floor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_field_binds_into_table_below() {
        let lua = Lua::new();
        let mut stack = ValueStack::new();
        stack.push_table(&lua).unwrap();
        stack.push(LuaValue::Integer(7));
        stack.set_field("seven").unwrap();
        assert_eq!(stack.depth(), 1);
        let t = stack.top_table().unwrap();
        assert_eq!(t.get::<i64>("seven").unwrap(), 7);
    }

    #[test]
    fn test_set_field_without_table_still_pops() {
        let mut stack = ValueStack::new();
        stack.push(LuaValue::Integer(1));
        stack.push(LuaValue::Integer(2));
        assert!(stack.set_field("x").is_err());
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_guard_restores_depth_on_early_exit() {
        let lua = Lua::new();
        let mut stack = ValueStack::new();
        stack.push(LuaValue::Boolean(true));

        let attempt = |stack: &mut ValueStack| -> LuaResult<()> {
            let mut frame = stack.guard();
            frame.push_table(&lua)?;
            frame.push(LuaValue::Integer(1));
            frame.push(LuaValue::Integer(2));
            frame.set_field("a")?;
            frame.set_field("b")?;
            frame.commit(0);
            Ok(())
        };
        assert!(attempt(&mut stack).is_err());
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_guard_commit_keeps_results() {
        let lua = Lua::new();
        let mut stack = ValueStack::new();
        stack.push(LuaValue::Integer(5));
        {
            let mut frame = stack.guard();
            frame.push_table(&lua).unwrap();
            frame.push(LuaValue::Nil);
            frame.pop();
            frame.commit(1);
        }
        assert_eq!(stack.depth(), 2);
        assert!(stack.top_table().is_ok());
        stack.pop();
        assert_eq!(stack.pop(), Some(LuaValue::Integer(5)));
    }
}
