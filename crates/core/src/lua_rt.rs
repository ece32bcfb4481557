use std::fmt;
use std::rc::Rc;

use anyhow::{anyhow, bail, Context, Result};
use mlua::prelude::*;

use crate::bridge;
use crate::call::{self, lua_err};
use crate::dump;
use crate::host::{BotHandle, HostValue};
use crate::logger;
use crate::resources::{Resource, ScriptSet};
use crate::stack::ValueStack;
use crate::types::{CallState, ControllerOutput};

pub const INIT_METHOD: &str = "bot_init";

/// Globals the prelude must return, in return order.
const PRELUDE_EXPORTS: [&str; 3] = ["class", "super", "dump"];

/// Stack depth between calls: just the bot instance.
const BASELINE: usize = 1;

struct Runtime {
    lua: Lua,
    stack: ValueStack,
}

/// One bot slot, owning its own Lua VM.
pub struct LuaAgent {
    runtime: Option<Runtime>,
    index: i32,
    tag: String,
    state: CallState,
    last_error: Option<String>,
    warned_defaults: bool,
}

impl LuaAgent {
    /// Create the VM, load prelude, structs and bot in that order, attach
    /// the host bridge and call `bot_init(index + 1)`.
    /// Any failure aborts construction; no half-built agent is returned.
    pub fn new(handle: Rc<dyn BotHandle>, index: i32, scripts: &ScriptSet) -> Result<Self> {
        let tag = format!("agent-{}", index);
        logger::register_prefix(&tag);

        let lua = Lua::new();
        register_globals(&lua, &tag).map_err(lua_err)?;

        load_prelude(&lua, &scripts.prelude)?;
        run(&lua, &scripts.structs)?;
        let bot = load_bot(&lua, &scripts.bot)?;

        bridge::install(&lua, &bot, handle, &tag).map_err(lua_err)?;

        let init = match bot.get::<LuaValue>(INIT_METHOD).map_err(lua_err)? {
            LuaValue::Function(f) => f,
            other => bail!(
                "{} bot instance has no {} method (found {})",
                scripts.bot.name,
                INIT_METHOD,
                other.type_name()
            ),
        };
        init.call::<()>((bot.clone(), index + 1))
            .map_err(lua_err)
            .with_context(|| format!("{} failed", INIT_METHOD))?;

        let mut stack = ValueStack::new();
        stack.push(LuaValue::Table(bot));
        logger::info_p(&tag, &format!("loaded {}", scripts.bot.name));

        Ok(Self {
            runtime: Some(Runtime { lua, stack }),
            index,
            tag,
            state: CallState::Idle,
            last_error: None,
            warned_defaults: false,
        })
    }

    /// Decode `snapshot`, call `bot:tick(packet)` and encode its result.
    ///
    /// A script fault comes back as an error carrying the script's message;
    /// the agent stays usable for the next tick.
    pub fn tick(&mut self, snapshot: &HostValue) -> Result<ControllerOutput> {
        let Some(rt) = self.runtime.as_mut() else {
            bail!("agent {} is shut down", self.index);
        };

        match call::invoke_tick(&rt.lua, &mut rt.stack, snapshot) {
            Ok(tick) => {
                if !tick.report.is_clean() && !self.warned_defaults {
                    logger::warn_p(
                        &self.tag,
                        &format!("snapshot fields defaulted: {}", tick.report.defaulted.join(", ")),
                    );
                    self.warned_defaults = true;
                }
                self.last_error = None;
                Ok(tick.output)
            }
            Err(e) => {
                let msg = e.to_string();
                logger::error_p(&self.tag, &format!("tick error: {}", msg));
                self.last_error = Some(msg);

                let intact = rt.stack.depth() == BASELINE && rt.stack.top_table().is_ok();
                if !intact {
                    logger::error_p(&self.tag, "bot instance lost after fault, shutting down");
                    self.shutdown();
                }
                Err(e)
            }
        }
    }

    /// Release the VM. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(rt) = self.runtime.take() {
            drop(rt);
            logger::info_p(&self.tag, "runtime released");
        }
        self.state = CallState::ShutDown;
    }

    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.runtime.is_some()
    }

    /// Message of the most recent failed tick, cleared by a successful one.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Current depth of the bridge stack; `None` once shut down.
    pub fn stack_depth(&self) -> Option<usize> {
        self.runtime.as_ref().map(|rt| rt.stack.depth())
    }

    /// Read a field off the bot instance, mostly for inspection in tests
    /// and the replay harness.
    pub fn bot_field<T: FromLua>(&self, name: &str) -> Result<T> {
        let rt = self.runtime.as_ref().ok_or_else(|| anyhow!("agent {} is shut down", self.index))?;
        rt.stack.top_table().and_then(|bot| bot.get::<T>(name)).map_err(lua_err)
    }
}

impl Drop for LuaAgent {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for LuaAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stack = self
            .runtime
            .as_ref()
            .map(|rt| rt.stack.describe(1))
            .unwrap_or_default();
        f.debug_struct("LuaAgent")
            .field("index", &self.index)
            .field("state", &self.state)
            .field("last_error", &self.last_error)
            .field("stack", &stack)
            .finish()
    }
}

fn run(lua: &Lua, resource: &Resource) -> Result<()> {
    lua.load(&resource.code)
        .set_name(&resource.name)
        .exec()
        .map_err(lua_err)
        .with_context(|| format!("cannot load required file: {}", resource.name))
}

fn load_prelude(lua: &Lua, prelude: &Resource) -> Result<()> {
    let exports: (LuaValue, LuaValue, LuaValue) = lua
        .load(&prelude.code)
        .set_name(&prelude.name)
        .eval()
        .map_err(lua_err)
        .with_context(|| format!("cannot load required file: {}", prelude.name))?;

    let globals = lua.globals();
    let (class, sup, dump) = exports;
    for (name, value) in PRELUDE_EXPORTS.into_iter().zip([class, sup, dump]) {
        if value.is_nil() {
            bail!("{} must return {}", prelude.name, PRELUDE_EXPORTS.join(", "));
        }
        globals.set(name, value).map_err(lua_err)?;
    }
    Ok(())
}

fn load_bot(lua: &Lua, bot: &Resource) -> Result<LuaTable> {
    let values: LuaMultiValue = lua
        .load(&bot.code)
        .set_name(&bot.name)
        .eval()
        .map_err(lua_err)
        .with_context(|| format!("cannot load required file: {}", bot.name))?;

    if values.len() != 1 {
        bail!("{} must return exactly one bot instance, got {} values", bot.name, values.len());
    }
    match values.into_iter().next() {
        Some(LuaValue::Table(t)) => Ok(t),
        Some(other) => bail!("{} returned a {}, expected a bot instance", bot.name, other.type_name()),
        None => bail!("{} returned nothing", bot.name),
    }
}

/// Register the `bridge.*` global table into a Lua state.
fn register_globals(lua: &Lua, tag: &str) -> LuaResult<()> {
    let bridge_table = lua.create_table()?;

    // bridge.log(msg), prefixed with the agent tag
    let tag = tag.to_string();
    let log_fn = lua.create_function(move |_, msg: String| {
        logger::info_p(&tag, &msg);
        Ok(())
    })?;
    bridge_table.set("log", log_fn)?;

    // bridge.dump(value, depth?) -> string
    let dump_fn = lua.create_function(|_, (value, depth): (LuaValue, Option<usize>)| {
        Ok(dump::render(&value, depth.unwrap_or(dump::DEFAULT_DEPTH)))
    })?;
    bridge_table.set("dump", dump_fn)?;

    lua.globals().set("bridge", bridge_table)?;
    Ok(())
}
