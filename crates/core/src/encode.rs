use mlua::prelude::*;

use crate::types::{ControllerOutput, CONTROLLER_BOOLS, CONTROLLER_FLOATS};

/// Read the nine controller fields off a tick result.
/// Non-numeric or missing floats read as 0.0; booleans use Lua truthiness.
pub fn controller(lua: &Lua, result: &LuaTable) -> LuaResult<ControllerOutput> {
    let mut floats = [0.0f64; 5];
    for (slot, name) in floats.iter_mut().zip(CONTROLLER_FLOATS) {
        let value: LuaValue = result.get(name)?;
        *slot = lua.coerce_number(value)?.unwrap_or(0.0);
    }

    let mut bools = [false; 4];
    for (slot, name) in bools.iter_mut().zip(CONTROLLER_BOOLS) {
        let value: LuaValue = result.get(name)?;
        *slot = !matches!(value, LuaValue::Nil | LuaValue::Boolean(false));
    }

    let [steer, throttle, pitch, yaw, roll] = floats;
    let [jump, boost, handbrake, use_item] = bools;
    Ok(ControllerOutput { steer, throttle, pitch, yaw, roll, jump, boost, handbrake, use_item })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ControllerTuple;

    #[test]
    fn test_literal_result_encodes_exactly() {
        let lua = Lua::new();
        let t: LuaTable = lua
            .load(
                "return { steer = 0.5, throttle = 1.0, pitch = -0.25, yaw = 0.0, roll = 0.1,
                          jump = true, boost = false, handbrake = true, use_item = false }",
            )
            .eval()
            .unwrap();
        let out: ControllerTuple = controller(&lua, &t).unwrap().into();
        assert_eq!(out, (0.5, 1.0, -0.25, 0.0, 0.1, true, false, true, false));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let lua = Lua::new();
        let t: LuaTable = lua.load("return { throttle = 1, jump = 0 }").eval().unwrap();
        let out = controller(&lua, &t).unwrap();
        assert_eq!(out.throttle, 1.0);
        assert_eq!(out.steer, 0.0);
        // 0 is truthy in Lua
        assert!(out.jump);
        assert!(!out.boost);
    }

    #[test]
    fn test_numeric_strings_coerce() {
        let lua = Lua::new();
        let t: LuaTable = lua.load("return { steer = '-1', yaw = 'left' }").eval().unwrap();
        let out = controller(&lua, &t).unwrap();
        assert_eq!(out.steer, -1.0);
        assert_eq!(out.yaw, 0.0);
    }

    #[test]
    fn test_class_instances_resolve_through_metatables() {
        let lua = Lua::new();
        let t: LuaTable = lua
            .load(
                "local Defaults = { throttle = 0.75, boost = true }
                 return setmetatable({ steer = -1 }, { __index = Defaults })",
            )
            .eval()
            .unwrap();
        let out = controller(&lua, &t).unwrap();
        assert_eq!(out.steer, -1.0);
        assert_eq!(out.throttle, 0.75);
        assert!(out.boost);
    }
}
