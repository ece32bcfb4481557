use serde::{Deserialize, Serialize};

/// Field names read off a tick result, in encoding order.
pub const CONTROLLER_FLOATS: [&str; 5] = ["steer", "throttle", "pitch", "yaw", "roll"];
pub const CONTROLLER_BOOLS: [&str; 4] = ["jump", "boost", "handbrake", "use_item"];

/// Fixed 9-field result of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerOutput {
    pub steer: f64,
    pub throttle: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
    pub jump: bool,
    pub boost: bool,
    pub handbrake: bool,
    pub use_item: bool,
}

/// Host-native tuple form, in the order the host expects.
pub type ControllerTuple = (f64, f64, f64, f64, f64, bool, bool, bool, bool);

impl From<ControllerOutput> for ControllerTuple {
    fn from(c: ControllerOutput) -> Self {
        (c.steer, c.throttle, c.pitch, c.yaw, c.roll, c.jump, c.boost, c.handbrake, c.use_item)
    }
}

/// Whether an agent can still be ticked. A tick borrows the agent
/// mutably, so no second call can start while one is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    ShutDown,
}

/// Fields that fell back to a default during one decode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeReport {
    pub defaulted: Vec<&'static str>,
}

impl DecodeReport {
    pub fn is_clean(&self) -> bool {
        self.defaulted.is_empty()
    }

    pub(crate) fn flag(&mut self, name: &'static str) {
        if !self.defaulted.contains(&name) {
            self.defaulted.push(name);
        }
    }
}
