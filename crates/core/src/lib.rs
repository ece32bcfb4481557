pub mod bridge;
pub mod call;
pub mod decode;
pub mod dump;
pub mod encode;
pub mod host;
pub mod logger;
pub mod lua_rt;
pub mod replay;
pub mod resources;
pub mod schema;
pub mod settings;
pub mod stack;
pub mod synthetic;
pub mod types;
