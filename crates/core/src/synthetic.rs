use rand::Rng;

use crate::host::HostValue;
use crate::schema::{self, Field, Kind};

/// Sizes of the generated collections, keyed by their count attribute.
#[derive(Debug, Clone, Copy)]
pub struct Counts {
    pub cars: usize,
    pub boosts: usize,
    pub teams: usize,
    pub slices: usize,
}

impl Default for Counts {
    fn default() -> Self {
        Self { cars: 2, boosts: 6, teams: 2, slices: 0 }
    }
}

impl Counts {
    fn for_count(&self, count: &str) -> usize {
        match count {
            "num_cars" => self.cars,
            "num_boost" => self.boosts,
            "num_teams" => self.teams,
            "num_slices" => self.slices,
            _ => 0,
        }
    }
}

const FIELD_EXTENT: f64 = 4096.0;

/// One value per field of `fields`, list counts taken from `counts`.
pub fn generate<R: Rng>(rng: &mut R, fields: &'static [Field], counts: &Counts) -> HostValue {
    let mut out = HostValue::object();
    for field in fields {
        let value = match field.kind {
            Kind::Int => HostValue::Int(rng.gen_range(0..4)),
            Kind::Float => HostValue::Float(rng.gen_range(0.0..100.0)),
            Kind::Bool => HostValue::Bool(rng.gen_bool(0.5)),
            Kind::Str => HostValue::Str(format!("{}-{}", field.name, rng.gen_range(0..1000))),
            Kind::Vector => triple(rng, schema::VECTOR_AXES, FIELD_EXTENT),
            Kind::Rotation => triple(rng, schema::ROTATION_AXES, std::f64::consts::PI),
            Kind::Record(inner) | Kind::Inline(inner) => generate(rng, inner, counts),
            Kind::List { .. } => HostValue::List(Vec::new()),
        };
        out = out.with(field.name, value);
    }

    // Second pass so a count always agrees with its list, whatever order
    // the schema declares them in.
    for field in fields {
        if let Kind::List { count, item } = field.kind {
            let n = counts.for_count(count);
            let items: Vec<HostValue> = (0..n).map(|_| generate(rng, item, counts)).collect();
            out = out.with(count, n as i64).with(field.name, items);
        }
    }
    out
}

fn triple<R: Rng>(rng: &mut R, axes: [&str; 3], extent: f64) -> HostValue {
    axes.into_iter().fold(HostValue::object(), |v, axis| {
        v.with(axis, rng.gen_range(-extent..extent))
    })
}

pub fn packet<R: Rng>(rng: &mut R, counts: &Counts) -> HostValue {
    generate(rng, schema::PACKET, counts)
}

/// Forecast with monotonically increasing slice times starting at `start`.
pub fn ball_prediction<R: Rng>(rng: &mut R, slices: usize, start: f64) -> HostValue {
    let counts = Counts { slices, ..Counts::default() };
    let mut items = Vec::with_capacity(slices);
    for i in 0..slices {
        let slice = generate(rng, schema::SLICE, &counts).with("game_seconds", start + i as f64 / 60.0);
        items.push(slice);
    }
    HostValue::object().with("num_slices", slices as i64).with("slices", items)
}
