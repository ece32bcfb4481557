use std::cell::{Cell, RefCell};
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::host::{BotHandle, HostValue};
use crate::logger;
use crate::lua_rt::LuaAgent;
use crate::types::ControllerOutput;

/// A recorded tick: the packet plus, optionally, the forecast the host
/// would have answered with during that tick.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub packet: HostValue,
    pub prediction: Option<HostValue>,
}

impl Frame {
    /// Recordings either store the bare packet, or an object with `packet`
    /// and `ball_prediction` members.
    fn from_record(record: HostValue) -> Self {
        match (record.attr("packet"), record.attr("ball_prediction")) {
            (Some(packet), prediction) => Frame { packet: packet.clone(), prediction: prediction.cloned() },
            (None, _) => Frame { packet: record, prediction: None },
        }
    }
}

/// Read frames from a JSON array or a JSON-lines file.
pub fn load_frames(path: &Path) -> Result<Vec<Frame>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read snapshots {}", path.display()))?;
    parse_frames(&text).with_context(|| format!("bad snapshots in {}", path.display()))
}

pub fn parse_frames(text: &str) -> Result<Vec<Frame>> {
    if text.trim_start().starts_with('[') {
        let records: Vec<HostValue> = serde_json::from_str(text)?;
        return Ok(records.into_iter().map(Frame::from_record).collect());
    }

    let mut frames = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: HostValue = serde_json::from_str(line)
            .map_err(|e| anyhow!("line {}: {}", n + 1, e))?;
        frames.push(Frame::from_record(record));
    }
    Ok(frames)
}

/// Host handle that answers prediction queries with whatever the current
/// frame recorded. An empty forecast is returned when nothing was recorded.
#[derive(Default)]
pub struct ReplayHandle {
    current: RefCell<Option<HostValue>>,
    queries: Cell<usize>,
}

impl ReplayHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_prediction(&self, prediction: Option<HostValue>) {
        *self.current.borrow_mut() = prediction;
    }

    /// Number of forecast queries answered so far.
    pub fn queries(&self) -> usize {
        self.queries.get()
    }
}

impl BotHandle for ReplayHandle {
    fn ball_prediction(&self) -> Result<HostValue> {
        self.queries.set(self.queries.get() + 1);
        let empty = || HostValue::object().with("num_slices", 0).with("slices", Vec::<HostValue>::new());
        Ok(self.current.borrow().clone().unwrap_or_else(empty))
    }
}

#[derive(Debug, Default)]
pub struct ReplaySummary {
    pub ticks: usize,
    pub faults: usize,
    /// One entry per frame; `None` where the tick faulted.
    pub outputs: Vec<Option<ControllerOutput>>,
}

/// Tick `agent` once per frame. Faults are logged and counted; the run
/// only stops early if the agent shuts itself down.
pub fn run(agent: &mut LuaAgent, handle: &ReplayHandle, frames: &[Frame]) -> ReplaySummary {
    let mut summary = ReplaySummary::default();

    for (n, frame) in frames.iter().enumerate() {
        if !agent.is_alive() {
            logger::warn(&format!("agent {} shut down, stopping at frame {}", agent.index(), n));
            break;
        }

        handle.set_prediction(frame.prediction.clone());
        summary.ticks += 1;
        match agent.tick(&frame.packet) {
            Ok(out) => summary.outputs.push(Some(out)),
            Err(e) => {
                logger::error(&format!("tick error frame {}: {}", n, e));
                summary.faults += 1;
                summary.outputs.push(None);
            }
        }
    }

    logger::info(&format!(
        "replayed {} frame(s), {} fault(s)",
        summary.ticks, summary.faults
    ));
    summary
}
