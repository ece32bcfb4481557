use anyhow::{anyhow, Result};
use mlua::prelude::*;

use crate::decode;
use crate::dump;
use crate::encode;
use crate::host::HostValue;
use crate::stack::ValueStack;
use crate::types::{ControllerOutput, DecodeReport};

pub const TICK_METHOD: &str = "tick";
pub const PACKET_CTOR: &str = "GameTickPacket";

const WRAP_SHIM_KEY: &str = "rlbot_lua.wrap";
const WRAP_SHIM: &str = "local ctor, raw = ...\nreturn ctor(raw)";

/// Helper to convert mlua::Error -> anyhow::Error
pub(crate) fn lua_err(e: LuaError) -> anyhow::Error {
    anyhow!("{}", e)
}

/// Result of a successful tick.
#[derive(Debug, Clone)]
pub struct Tick {
    pub output: ControllerOutput,
    pub report: DecodeReport,
}

/// Replace the table on top of the stack with `ctor(table)` when the global
/// `ctor` is defined; leave it raw otherwise. Net 0.
pub(crate) fn wrap_top(lua: &Lua, stack: &mut ValueStack, ctor: &str) -> LuaResult<()> {
    let constructor: LuaValue = lua.globals().get(ctor)?;
    if constructor.is_nil() {
        return Ok(());
    }

    // Class tables are callable through __call, so go through Lua rather
    // than requiring a plain function.
    let shim = match lua.named_registry_value::<Option<LuaFunction>>(WRAP_SHIM_KEY)? {
        Some(f) => f,
        None => {
            let f = lua.load(WRAP_SHIM).set_name("=wrap").into_function()?;
            lua.set_named_registry_value(WRAP_SHIM_KEY, f.clone())?;
            f
        }
    };

    let raw = stack.pop().unwrap_or(LuaValue::Nil);
    let wrapped: LuaValue = shim.call((constructor, raw))?;
    stack.push(wrapped);
    Ok(())
}

/// Run one tick against the receiver on top of `stack`.
///
/// On success and on failure the stack is left exactly as it was found.
pub fn invoke_tick(lua: &Lua, stack: &mut ValueStack, snapshot: &HostValue) -> Result<Tick> {
    let mut frame = stack.guard();
    let receiver = frame.top_table().map_err(lua_err)?;

    // [.., bot] -> [.., bot, tick, bot, packet]
    let method: LuaValue = receiver.get(TICK_METHOD).map_err(lua_err)?;
    frame.push(method);
    frame.push(LuaValue::Table(receiver));
    let report = decode::packet(lua, &mut frame, snapshot).map_err(lua_err)?;
    wrap_top(lua, &mut frame, PACKET_CTOR).map_err(lua_err)?;

    let packet = frame.pop().unwrap_or(LuaValue::Nil);
    let this = frame.pop().unwrap_or(LuaValue::Nil);
    let method = frame.pop().unwrap_or(LuaValue::Nil);
    let func = match method {
        LuaValue::Function(f) => f,
        other => {
            return Err(anyhow!(
                "attempt to call a {} value (method '{}')",
                other.type_name(),
                TICK_METHOD
            ))
        }
    };

    let result: LuaValue = func.call((this, packet)).map_err(lua_err)?;
    frame.push(result);

    let output = match frame.top() {
        Some(LuaValue::Table(t)) => encode::controller(lua, t).map_err(lua_err)?,
        Some(other) => {
            return Err(anyhow!(
                "{} returned {}, expected a controller table",
                TICK_METHOD,
                dump::render(other, dump::DEFAULT_DEPTH)
            ))
        }
        None => return Err(anyhow!("{} left no result", TICK_METHOD)),
    };
    frame.pop();
    frame.commit(0);

    Ok(Tick { output, report })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receiver(lua: &Lua, body: &str) -> ValueStack {
        let bot: LuaTable = lua.load(body).eval().unwrap();
        let mut stack = ValueStack::new();
        stack.push(LuaValue::Table(bot));
        stack
    }

    fn snapshot(num_cars: i64) -> HostValue {
        let cars: Vec<HostValue> = (0..num_cars)
            .map(|i| HostValue::object().with("name", format!("car{}", i)).with("team", i % 2))
            .collect();
        HostValue::object().with("num_cars", num_cars).with("game_cars", cars)
    }

    #[test]
    fn test_tick_sees_receiver_and_packet() {
        let lua = Lua::new();
        let mut stack = receiver(
            &lua,
            "local bot = { gain = 0.5 }
             function bot:tick(packet)
                 return { steer = self.gain, throttle = packet.num_cars, boost = #packet.game_cars == 2 }
             end
             return bot",
        );
        let tick = invoke_tick(&lua, &mut stack, &snapshot(2)).unwrap();
        assert_eq!(tick.output.steer, 0.5);
        assert_eq!(tick.output.throttle, 2.0);
        assert!(tick.output.boost);
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_fault_restores_baseline() {
        let lua = Lua::new();
        let mut stack = receiver(
            &lua,
            "local bot = {}
             function bot:tick(packet) error('wheel fell off') end
             return bot",
        );
        let err = invoke_tick(&lua, &mut stack, &snapshot(1)).unwrap_err();
        assert!(err.to_string().contains("wheel fell off"), "{}", err);
        assert_eq!(stack.depth(), 1);
        assert!(stack.top_table().is_ok());
    }

    #[test]
    fn test_missing_tick_is_a_fault() {
        let lua = Lua::new();
        let mut stack = receiver(&lua, "return {}");
        let err = invoke_tick(&lua, &mut stack, &snapshot(0)).unwrap_err();
        assert!(err.to_string().contains("nil"), "{}", err);
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_non_table_result_is_rejected() {
        let lua = Lua::new();
        let mut stack = receiver(&lua, "return { tick = function(self, p) return 42 end }");
        let err = invoke_tick(&lua, &mut stack, &snapshot(0)).unwrap_err();
        assert!(err.to_string().contains("42"), "{}", err);
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_packet_is_wrapped_by_global_constructor() {
        let lua = Lua::new();
        lua.load(
            "GameTickPacket = setmetatable({}, { __call = function(cls, raw)
                 raw.wrapped = true
                 return raw
             end })",
        )
        .exec()
        .unwrap();
        let mut stack = receiver(
            &lua,
            "return { tick = function(self, p) return { jump = p.wrapped } end }",
        );
        let tick = invoke_tick(&lua, &mut stack, &snapshot(0)).unwrap();
        assert!(tick.output.jump);
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_repeated_ticks_do_not_grow_stack() {
        let lua = Lua::new();
        let mut stack = receiver(
            &lua,
            "return { tick = function(self, p) return { throttle = p.num_cars } end }",
        );
        let first = invoke_tick(&lua, &mut stack, &snapshot(1)).unwrap();
        let second = invoke_tick(&lua, &mut stack, &snapshot(3)).unwrap();
        assert_eq!(first.output.throttle, 1.0);
        assert_eq!(second.output.throttle, 3.0);
        assert_eq!(stack.depth(), 1);
    }
}
