use std::path::Path;

use anyhow::{Context, Result};

use crate::settings::Settings;

/// A named chunk of Lua source.
#[derive(Debug, Clone)]
pub struct Resource {
    pub name: String,
    pub code: String,
}

impl Resource {
    pub fn inline(name: &str, code: &str) -> Self {
        Self { name: name.to_string(), code: code.to_string() }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let code = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        Ok(Self { name: path.to_string_lossy().to_string(), code })
    }

    /// Reference class helpers shipped with the crate.
    pub fn builtin_prelude() -> Self {
        Self::inline("classes.lua", include_str!("../../../scripts/classes.lua"))
    }

    /// Reference struct wrappers shipped with the crate.
    pub fn builtin_structs() -> Self {
        Self::inline("structs.lua", include_str!("../../../scripts/structs.lua"))
    }

    pub fn builtin_bot() -> Self {
        Self::inline("bot.lua", include_str!("../../../scripts/bot.lua"))
    }
}

/// The three resources an agent loads, in load order.
#[derive(Debug, Clone)]
pub struct ScriptSet {
    pub prelude: Resource,
    pub structs: Resource,
    pub bot: Resource,
}

impl ScriptSet {
    pub fn new(prelude: Resource, structs: Resource, bot: Resource) -> Self {
        Self { prelude, structs, bot }
    }

    /// Built-in prelude and structs around a custom bot.
    pub fn with_bot(bot: Resource) -> Self {
        Self::new(Resource::builtin_prelude(), Resource::builtin_structs(), bot)
    }

    pub fn builtin() -> Self {
        Self::with_bot(Resource::builtin_bot())
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let dir = &settings.script_dir;
        Ok(Self {
            prelude: Resource::read(&dir.join(&settings.prelude))?,
            structs: Resource::read(&dir.join(&settings.structs))?,
            bot: Resource::read(&dir.join(&settings.bot))?,
        })
    }
}
