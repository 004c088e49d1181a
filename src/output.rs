use std::io::{self, Write};

use crate::identity::SourceId;
use crate::math::SVec3;

/// One source as a sink sees it, flattened to wire precision
#[derive(Debug, Clone, PartialEq)]
pub struct SinkEntry {
    pub id: SourceId,
    pub position: SVec3,
    pub orientation: SVec3, // yaw, pitch, roll
    pub aperture: f32,
}

/// Every source's pose after one tick, in ascending id order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SinkFrame {
    pub tick: u64,
    pub time: f64, // s
    pub entries: Vec<SinkEntry>,
}

/// Whatever transmits positions once a tick has been composed
pub trait PositionSink {
    fn publish(&mut self, frame: &SinkFrame) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Csv,
}

impl Default for OutputFormat { fn default() -> Self { Self::Pretty } }

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PRETTY" => Ok(OutputFormat::Pretty),
            "CSV" => Ok(OutputFormat::Csv),
            other => Err(format!("unknown output format \"{}\"", other.to_ascii_lowercase())),
        }
    }
}

/// Writes frames as text, every `every` ticks
#[derive(Debug)]
pub struct ConsoleSink<W: Write> {
    out: W,
    format: OutputFormat,
    every: u64,
    wrote_header: bool,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout(format: OutputFormat, every: u64) -> Self {
        ConsoleSink::new(io::stdout(), format, every)
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W, format: OutputFormat, every: u64) -> Self {
        ConsoleSink { out, format, every: every.max(1), wrote_header: false }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_pretty(&mut self, frame: &SinkFrame) -> io::Result<()> {
        let indent_str = "  ";
        writeln!(self.out, "------------------------------------------")?;
        writeln!(self.out, "Tick: {}  Time: {:.3}s", frame.tick, frame.time)?;
        for entry in frame.entries.iter() {
            let (p, o) = (entry.position, entry.orientation);
            writeln!(self.out, "{}{}", indent_str, entry.id)?;
            writeln!(self.out, "{}POS={:+09.04}, {:+09.04}, {:+09.04}", indent_str.repeat(3), p.x, p.y, p.z)?;
            writeln!(self.out, "{}ORI={:+07.04}, {:+07.04}, {:+07.04}", indent_str.repeat(3), o.x, o.y, o.z)?;
        }
        writeln!(self.out)
    }

    fn write_csv(&mut self, frame: &SinkFrame) -> io::Result<()> {
        if !self.wrote_header {
            writeln!(self.out, "tick,time,source,x,y,z,yaw,pitch,roll,aperture")?;
            self.wrote_header = true;
        }
        for entry in frame.entries.iter() {
            let (p, o) = (entry.position, entry.orientation);
            let raw: usize = entry.id.into();
            writeln!(
                self.out,
                "{},{:.6},{},{},{},{},{},{},{},{}",
                frame.tick, frame.time, raw, p.x, p.y, p.z, o.x, o.y, o.z, entry.aperture
            )?;
        }
        Ok(())
    }
}

impl<W: Write> PositionSink for ConsoleSink<W> {
    fn publish(&mut self, frame: &SinkFrame) -> io::Result<()> {
        if frame.tick % self.every > 0 {
            return Ok(())
        }
        match self.format {
            OutputFormat::Pretty => self.write_pretty(frame)?,
            OutputFormat::Csv => self.write_csv(frame)?,
        }
        self.out.flush()
    }
}
