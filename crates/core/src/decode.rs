use mlua::prelude::*;

use crate::host::{HostValue, NULL};
use crate::schema::{self, Field, Kind};
use crate::stack::ValueStack;
use crate::types::DecodeReport;

/// Upper bound on entries decoded for one list. The host's largest list is
/// the ball prediction at 360 slices.
pub const MAX_LIST_ITEMS: usize = 1024;

/// Host snapshot -> Lua table conversion.
///
/// Primitives read one host attribute and bind it into the table on top of
/// the stack (net 0). `root` pushes a fully populated table (net +1). On
/// failure every method leaves the stack at its entry depth.
pub struct Decoder<'a> {
    lua: &'a Lua,
    stack: &'a mut ValueStack,
    report: DecodeReport,
}

impl<'a> Decoder<'a> {
    pub fn new(lua: &'a Lua, stack: &'a mut ValueStack) -> Self {
        Self { lua, stack, report: DecodeReport::default() }
    }

    pub fn into_report(self) -> DecodeReport {
        self.report
    }

    /// Run `body`; on error cut the stack back to where it started.
    fn scoped(&mut self, body: impl FnOnce(&mut Self) -> LuaResult<()>) -> LuaResult<()> {
        let base = self.stack.depth();
        let result = body(self);
        if result.is_err() {
            self.stack.truncate(base);
        }
        result
    }

    fn bind(&mut self, name: &str, value: LuaValue) -> LuaResult<()> {
        self.stack.push(value);
        self.stack.set_field(name)
    }

    /// Attribute read that records a missing value.
    fn attr<'h>(&mut self, host: &'h HostValue, name: &'static str) -> &'h HostValue {
        match host.attr(name) {
            Some(v) => v,
            None => {
                self.report.flag(name);
                &NULL
            }
        }
    }

    pub fn int(&mut self, host: &HostValue, name: &'static str) -> LuaResult<()> {
        let value = match self.attr(host, name).as_int() {
            Some(v) => v,
            None => {
                self.report.flag(name);
                0
            }
        };
        self.bind(name, LuaValue::Integer(value))
    }

    pub fn float(&mut self, host: &HostValue, name: &'static str) -> LuaResult<()> {
        let value = match self.attr(host, name).as_float() {
            Some(v) => v,
            None => {
                self.report.flag(name);
                0.0
            }
        };
        self.bind(name, LuaValue::Number(value))
    }

    pub fn boolean(&mut self, host: &HostValue, name: &'static str) -> LuaResult<()> {
        let value = self.attr(host, name).is_true();
        self.bind(name, LuaValue::Boolean(value))
    }

    /// Non-string host values leave the field nil.
    pub fn string(&mut self, host: &HostValue, name: &'static str) -> LuaResult<()> {
        let value = match self.attr(host, name).as_str() {
            Some(s) => LuaValue::String(self.lua.create_string(s)?),
            None => {
                self.report.flag(name);
                LuaValue::Nil
            }
        };
        self.bind(name, value)
    }

    pub fn vector(&mut self, host: &HostValue, name: &'static str) -> LuaResult<()> {
        self.triple(host, name, schema::VECTOR_AXES)
    }

    pub fn rotation(&mut self, host: &HostValue, name: &'static str) -> LuaResult<()> {
        self.triple(host, name, schema::ROTATION_AXES)
    }

    fn triple(&mut self, host: &HostValue, name: &'static str, axes: [&'static str; 3]) -> LuaResult<()> {
        self.scoped(|d| {
            let inner = d.attr(host, name);
            d.stack.push_table(d.lua)?;
            for axis in axes {
                d.float(inner, axis)?;
            }
            d.stack.set_field(name)
        })
    }

    /// Sub-table built from `fields`, bound under `name`.
    pub fn record(&mut self, host: &HostValue, name: &'static str, fields: &'static [Field]) -> LuaResult<()> {
        self.scoped(|d| {
            let inner = d.attr(host, name);
            d.stack.push_table(d.lua)?;
            d.fields(inner, fields)?;
            d.stack.set_field(name)
        })
    }

    /// `count` items looked up by position, stored 1-based under `name`.
    /// Always binds a table, empty when the count is zero. Counts above
    /// `MAX_LIST_ITEMS` are clamped and reported.
    pub fn list(
        &mut self,
        host: &HostValue,
        name: &'static str,
        count: &'static str,
        item: &'static [Field],
    ) -> LuaResult<()> {
        self.scoped(|d| {
            let declared = d.attr(host, count).as_int().unwrap_or(0).max(0) as u64;
            let n = if declared > MAX_LIST_ITEMS as u64 {
                d.report.flag(count);
                MAX_LIST_ITEMS
            } else {
                declared as usize
            };
            let items = d.attr(host, name);
            d.stack.push_table(d.lua)?;
            for i in 0..n {
                let entry = match items.item(i) {
                    Some(v) => v,
                    None => {
                        d.report.flag(name);
                        &NULL
                    }
                };
                d.stack.push_table(d.lua)?;
                d.fields(entry, item)?;
                d.stack.set_index(i + 1)?;
            }
            d.stack.set_field(name)
        })
    }

    /// Decode every field of `fields` into the table on top. Net 0.
    pub fn fields(&mut self, host: &HostValue, fields: &'static [Field]) -> LuaResult<()> {
        for field in fields {
            let name = field.name;
            match field.kind {
                Kind::Int => self.int(host, name)?,
                Kind::Float => self.float(host, name)?,
                Kind::Bool => self.boolean(host, name)?,
                Kind::Str => self.string(host, name)?,
                Kind::Vector => self.vector(host, name)?,
                Kind::Rotation => self.rotation(host, name)?,
                Kind::Record(inner) => self.record(host, name, inner)?,
                Kind::Inline(inner) => {
                    let nested = self.attr(host, name);
                    self.fields(nested, inner)?
                }
                Kind::List { count, item } => self.list(host, name, count, item)?,
            }
        }
        Ok(())
    }

    /// Push a new table holding all of `fields`. Net +1 on success.
    pub fn root(&mut self, host: &HostValue, fields: &'static [Field]) -> LuaResult<()> {
        self.scoped(|d| {
            d.stack.push_table(d.lua)?;
            d.fields(host, fields)
        })
    }
}

/// Decode a whole tick snapshot onto the stack (net +1).
pub fn packet(lua: &Lua, stack: &mut ValueStack, snapshot: &HostValue) -> LuaResult<DecodeReport> {
    let mut decoder = Decoder::new(lua, stack);
    decoder.root(snapshot, schema::PACKET)?;
    Ok(decoder.into_report())
}

/// Decode a ball prediction onto the stack (net +1).
pub fn ball_prediction(lua: &Lua, stack: &mut ValueStack, prediction: &HostValue) -> LuaResult<DecodeReport> {
    let mut decoder = Decoder::new(lua, stack);
    decoder.root(prediction, schema::BALL_PREDICTION)?;
    Ok(decoder.into_report())
}
