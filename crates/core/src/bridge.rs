use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use mlua::prelude::*;

use crate::call::wrap_top;
use crate::decode;
use crate::host::BotHandle;
use crate::logger;
use crate::stack::ValueStack;

pub const AGENT_FIELD: &str = "__agent";
pub const PREDICTION_METHOD: &str = "get_ball_prediction";
pub const PREDICTION_CTOR: &str = "BallPrediction";

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

struct AgentToken(u64);

impl LuaUserData for AgentToken {}

struct AgentLink {
    token: u64,
    handle: Rc<dyn BotHandle>,
    tag: String,
    warned_defaults: Cell<bool>,
}

/// Attach the capability and the prediction method to `bot`.
///
/// Scripts can pass `__agent` around but never look inside;
/// `get_ball_prediction` resolves it against the link in app data.
pub(crate) fn install(lua: &Lua, bot: &LuaTable, handle: Rc<dyn BotHandle>, tag: &str) -> LuaResult<()> {
    let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
    lua.set_app_data(AgentLink { token, handle, tag: tag.to_string(), warned_defaults: Cell::new(false) });

    bot.raw_set(AGENT_FIELD, lua.create_userdata(AgentToken(token))?)?;
    bot.raw_set(PREDICTION_METHOD, lua.create_function(get_ball_prediction)?)?;
    Ok(())
}

fn resolve(lua: &Lua, this: &LuaTable) -> LuaResult<(Rc<dyn BotHandle>, String)> {
    let capability: LuaAnyUserData = this
        .get(AGENT_FIELD)
        .map_err(|_| LuaError::runtime("receiver carries no agent reference"))?;
    let token = capability.borrow::<AgentToken>()?.0;

    let link = lua
        .app_data_ref::<AgentLink>()
        .ok_or_else(|| LuaError::runtime("runtime has no agent attached"))?;
    if link.token != token {
        return Err(LuaError::runtime("agent reference belongs to another runtime"));
    }
    Ok((Rc::clone(&link.handle), link.tag.clone()))
}

/// True the first time it is asked for this runtime, false after.
fn first_defaults_warning(lua: &Lua) -> bool {
    lua.app_data_ref::<AgentLink>()
        .map(|link| !link.warned_defaults.replace(true))
        .unwrap_or(false)
}

/// `bot:get_ball_prediction()` -> BallPrediction
fn get_ball_prediction(lua: &Lua, this: LuaTable) -> LuaResult<LuaValue> {
    let (handle, tag) = resolve(lua, &this)?;
    let prediction = handle
        .ball_prediction()
        .map_err(|e| LuaError::runtime(format!("ball prediction query failed: {}", e)))?;

    let mut stack = ValueStack::new();
    let report = decode::ball_prediction(lua, &mut stack, &prediction)?;
    if !report.is_clean() && first_defaults_warning(lua) {
        logger::warn_p(&tag, &format!("ball prediction defaulted: {}", report.defaulted.join(", ")));
    }
    wrap_top(lua, &mut stack, PREDICTION_CTOR)?;
    Ok(stack.pop().unwrap_or(LuaValue::Nil))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostValue;
    use anyhow::{anyhow, Result};

    struct Forecast {
        slices: usize,
        calls: Cell<usize>,
    }

    impl BotHandle for Forecast {
        fn ball_prediction(&self) -> Result<HostValue> {
            self.calls.set(self.calls.get() + 1);
            let slices: Vec<HostValue> = (0..self.slices)
                .map(|i| {
                    let v = |k: f64| HostValue::object().with("x", k).with("y", 0.0).with("z", 0.0);
                    let rot = HostValue::object().with("pitch", 0.0).with("yaw", i as f64).with("roll", 0.0);
                    let physics = HostValue::object()
                        .with("location", v(i as f64 * 10.0))
                        .with("velocity", v(1.0))
                        .with("angular_velocity", v(0.0))
                        .with("rotation", rot);
                    HostValue::object().with("physics", physics).with("game_seconds", i as f64 / 60.0)
                })
                .collect();
            Ok(HostValue::object().with("num_slices", self.slices as i64).with("slices", slices))
        }
    }

    struct Offline;

    impl BotHandle for Offline {
        fn ball_prediction(&self) -> Result<HostValue> {
            Err(anyhow!("no prediction service"))
        }
    }

    fn setup(handle: Rc<dyn BotHandle>) -> Lua {
        let lua = Lua::new();
        let bot = lua.create_table().unwrap();
        install(&lua, &bot, handle, "agent-test").unwrap();
        lua.globals().set("bot", bot).unwrap();
        lua
    }

    #[test]
    fn test_empty_forecast() {
        let lua = setup(Rc::new(Forecast { slices: 0, calls: Cell::new(0) }));
        let pred: LuaTable = lua.load("return bot:get_ball_prediction()").eval().unwrap();
        assert_eq!(pred.get::<i64>("num_slices").unwrap(), 0);
        let slices: LuaTable = pred.get("slices").unwrap();
        assert_eq!(slices.raw_len(), 0);
    }

    #[test]
    fn test_forecast_slices_in_host_order() {
        let handle = Rc::new(Forecast { slices: 3, calls: Cell::new(0) });
        let lua = setup(handle.clone());
        let pred: LuaTable = lua.load("return bot:get_ball_prediction()").eval().unwrap();
        assert_eq!(handle.calls.get(), 1);
        assert_eq!(pred.get::<i64>("num_slices").unwrap(), 3);

        let slices: LuaTable = pred.get("slices").unwrap();
        assert_eq!(slices.raw_len(), 3);
        for i in 1..=3i64 {
            let slice: LuaTable = slices.get(i).unwrap();
            let loc: LuaTable = slice.get("location").unwrap();
            assert_eq!(loc.get::<f64>("x").unwrap(), (i - 1) as f64 * 10.0);
            let vel: LuaTable = slice.get("velocity").unwrap();
            assert_eq!(vel.get::<f64>("x").unwrap(), 1.0);
            let _: LuaTable = slice.get("angular_velocity").unwrap();
            let rot: LuaTable = slice.get("rotation").unwrap();
            assert_eq!(rot.get::<f64>("yaw").unwrap(), (i - 1) as f64);
            assert_eq!(slice.get::<f64>("game_seconds").unwrap(), (i - 1) as f64 / 60.0);
        }
    }

    #[test]
    fn test_forecast_wrapped_by_constructor() {
        let lua = setup(Rc::new(Forecast { slices: 1, calls: Cell::new(0) }));
        lua.load("function BallPrediction(raw) return { inner = raw, kind = 'prediction' } end")
            .exec()
            .unwrap();
        let kind: String = lua.load("return bot:get_ball_prediction().kind").eval().unwrap();
        assert_eq!(kind, "prediction");
    }

    #[test]
    fn test_capability_is_opaque() {
        let lua = setup(Rc::new(Forecast { slices: 0, calls: Cell::new(0) }));
        let kind: String = lua.load("return type(bot.__agent)").eval().unwrap();
        assert_eq!(kind, "userdata");
        // a copied capability still resolves within the same runtime
        let n: i64 = lua
            .load("local twin = { __agent = bot.__agent } return bot.get_ball_prediction(twin).num_slices")
            .eval()
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_receiver_without_capability_fails() {
        let lua = setup(Rc::new(Forecast { slices: 0, calls: Cell::new(0) }));
        let err = lua
            .load("local other = {} return bot.get_ball_prediction(other)")
            .eval::<LuaValue>()
            .unwrap_err();
        assert!(err.to_string().contains("no agent reference"), "{}", err);
    }

    #[test]
    fn test_defaults_warning_fires_once_per_runtime() {
        let lua = setup(Rc::new(Forecast { slices: 0, calls: Cell::new(0) }));
        assert!(first_defaults_warning(&lua));
        assert!(!first_defaults_warning(&lua));
        assert!(!first_defaults_warning(&lua));

        let other = setup(Rc::new(Forecast { slices: 0, calls: Cell::new(0) }));
        assert!(first_defaults_warning(&other));
    }

    #[test]
    fn test_host_failure_surfaces_as_script_error() {
        let lua = setup(Rc::new(Offline));
        let msg: String = lua
            .load("local ok, err = pcall(bot.get_ball_prediction, bot) return tostring(err)")
            .eval()
            .unwrap();
        assert!(msg.contains("no prediction service"), "{}", msg);
    }
}
