use std::collections::HashSet;

use anyhow::{bail, Result};

/// How a single host attribute maps into Lua. Decoding is driven entirely
/// by the tables below; adding a packet field is a one-line change.
#[derive(Debug, Clone, Copy)]
pub enum Kind {
    Int,
    Float,
    Bool,
    Str,
    /// `{x, y, z}` floats.
    Vector,
    /// `{pitch, yaw, roll}` floats.
    Rotation,
    /// Nested sub-table with its own schema.
    Record(&'static [Field]),
    /// Reads the named host attribute but binds its fields onto the
    /// current table instead of a sub-table.
    Inline(&'static [Field]),
    /// 1-based sequence of records, `count` names the host attribute
    /// holding the number of valid items.
    List { count: &'static str, item: &'static [Field] },
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: Kind,
}

const fn f(name: &'static str, kind: Kind) -> Field {
    Field { name, kind }
}

pub const VECTOR_AXES: [&str; 3] = ["x", "y", "z"];
pub const ROTATION_AXES: [&str; 3] = ["pitch", "yaw", "roll"];

pub const PHYSICS: &[Field] = &[
    f("location", Kind::Vector),
    f("velocity", Kind::Vector),
    f("angular_velocity", Kind::Vector),
    f("rotation", Kind::Rotation),
];

pub const HITBOX: &[Field] = &[
    f("length", Kind::Float),
    f("width", Kind::Float),
    f("height", Kind::Float),
];

pub const CAR: &[Field] = &[
    f("physics", Kind::Record(PHYSICS)),
    f("is_demolished", Kind::Bool),
    f("has_wheel_contact", Kind::Bool),
    f("is_super_sonic", Kind::Bool),
    f("is_bot", Kind::Bool),
    f("jumped", Kind::Bool),
    f("double_jumped", Kind::Bool),
    f("name", Kind::Str),
    f("team", Kind::Int),
    f("boost", Kind::Float),
    f("hitbox", Kind::Record(HITBOX)),
];

pub const BOOST: &[Field] = &[
    f("is_active", Kind::Bool),
    f("timer", Kind::Float),
];

pub const TOUCH: &[Field] = &[
    f("player_name", Kind::Str),
    f("time_seconds", Kind::Float),
    f("team", Kind::Int),
    f("player_index", Kind::Int),
    f("hit_location", Kind::Vector),
    f("hit_normal", Kind::Vector),
];

pub const DROP_SHOT: &[Field] = &[
    f("damage_index", Kind::Int),
    f("absorbed_force", Kind::Float),
    f("force_accum_recent", Kind::Float),
];

pub const BOX: &[Field] = &[
    f("length", Kind::Float),
    f("width", Kind::Float),
    f("height", Kind::Float),
];

pub const SPHERE: &[Field] = &[f("diameter", Kind::Float)];

pub const CYLINDER: &[Field] = &[
    f("diameter", Kind::Float),
    f("height", Kind::Float),
];

pub const COLLISION: &[Field] = &[
    f("type", Kind::Int),
    f("box", Kind::Record(BOX)),
    f("sphere", Kind::Record(SPHERE)),
    f("cylinder", Kind::Record(CYLINDER)),
];

pub const BALL: &[Field] = &[
    f("physics", Kind::Record(PHYSICS)),
    f("latest_touch", Kind::Record(TOUCH)),
    f("drop_shot_info", Kind::Record(DROP_SHOT)),
    f("collision_shape", Kind::Record(COLLISION)),
];

pub const GAME_INFO: &[Field] = &[
    f("seconds_elapsed", Kind::Float),
    f("game_time_remaining", Kind::Float),
    f("world_gravity_z", Kind::Float),
    f("game_speed", Kind::Float),
    f("is_overtime", Kind::Bool),
    f("is_unlimited_time", Kind::Bool),
    f("is_round_active", Kind::Bool),
    f("is_kickoff_pause", Kind::Bool),
    f("is_match_ended", Kind::Bool),
];

pub const TEAM: &[Field] = &[
    f("team_index", Kind::Int),
    f("score", Kind::Int),
];

pub const PACKET: &[Field] = &[
    f("num_cars", Kind::Int),
    f("game_cars", Kind::List { count: "num_cars", item: CAR }),
    f("num_boost", Kind::Int),
    f("game_boosts", Kind::List { count: "num_boost", item: BOOST }),
    f("game_ball", Kind::Record(BALL)),
    f("game_info", Kind::Record(GAME_INFO)),
    f("num_teams", Kind::Int),
    f("teams", Kind::List { count: "num_teams", item: TEAM }),
];

pub const SLICE: &[Field] = &[
    f("physics", Kind::Inline(PHYSICS)),
    f("game_seconds", Kind::Float),
];

pub const BALL_PREDICTION: &[Field] = &[
    f("num_slices", Kind::Int),
    f("slices", Kind::List { count: "num_slices", item: SLICE }),
];

/// Check a schema is well formed: names are unique per table (inlined
/// fields included) and every list count names an int sibling.
pub fn validate(fields: &'static [Field]) -> Result<()> {
    let mut names = HashSet::new();
    collect_names(fields, &mut names)?;

    for field in fields {
        match field.kind {
            Kind::Record(inner) | Kind::Inline(inner) => validate(inner)?,
            Kind::List { count, item } => {
                let declared = fields
                    .iter()
                    .any(|s| s.name == count && matches!(s.kind, Kind::Int));
                if !declared {
                    bail!("list '{}' counts by undeclared '{}'", field.name, count);
                }
                validate(item)?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Names bound onto the table itself, flattening inlined records.
fn collect_names(fields: &'static [Field], names: &mut HashSet<&'static str>) -> Result<()> {
    for field in fields {
        if let Kind::Inline(inner) = field.kind {
            collect_names(inner, names)?;
        } else if !names.insert(field.name) {
            bail!("duplicate field '{}'", field.name);
        }
    }
    Ok(())
}

/// Names of a schema's table, in binding order.
pub fn field_names(fields: &'static [Field]) -> Vec<&'static str> {
    let mut out = Vec::new();
    for field in fields {
        match field.kind {
            Kind::Inline(inner) => out.extend(field_names(inner)),
            _ => out.push(field.name),
        }
    }
    out
}
