use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use log::{Level, LevelFilter, Log, Metadata, Record};

const CAPACITY: usize = 500;

#[derive(Debug, Clone)]
pub struct LogLine {
    pub level: Level,
    pub message: String,
}

/// Shared tail of recent log lines for the TUI log panel.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    lines: Arc<Mutex<VecDeque<LogLine>>>,
}

impl LogBuffer {
    pub fn push(&self, level: Level, message: String) {
        let Ok(mut lines) = self.lines.lock() else {
            return;
        };
        if lines.len() >= CAPACITY {
            lines.pop_front();
        }
        lines.push_back(LogLine { level, message });
    }

    /// The newest `count` lines, oldest first.
    pub fn tail(&self, count: usize) -> Vec<LogLine> {
        match self.lines.lock() {
            Ok(lines) => lines.iter().skip(lines.len().saturating_sub(count)).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Routes the `log` facade into this buffer instead of stderr.
    pub fn install(&self, level: LevelFilter) -> Result<(), log::SetLoggerError> {
        log::set_boxed_logger(Box::new(BufferLogger {
            buffer: self.clone(),
            level,
        }))?;
        log::set_max_level(level);
        Ok(())
    }
}

struct BufferLogger {
    buffer: LogBuffer,
    level: LevelFilter,
}

impl Log for BufferLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.buffer.push(record.level(), record.args().to_string());
        }
    }

    fn flush(&self) {}
}
