//! # Kernel Console Logger
//!
//! Routes the `log` facade to the kernel console, one line per record:
//! `[LEVEL] target: message`.

use core::fmt::{self, Write};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Byte sink behind the logger (the `kprintf` console).
pub trait Console: Sync {
    fn write_str(&self, s: &str);
}

struct ConsoleSink<'a, C: ?Sized>(&'a C);

impl<C: Console + ?Sized> Write for ConsoleSink<'_, C> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_str(s);
        Ok(())
    }
}

pub struct KernelLogger<C> {
    console: C,
    max_level: LevelFilter,
}

impl<C> KernelLogger<C> {
    #[must_use]
    pub const fn new(console: C, max_level: LevelFilter) -> Self {
        Self { console, max_level }
    }

    #[must_use]
    pub const fn console(&self) -> &C {
        &self.console
    }
}

impl<C: Console + Send + 'static> KernelLogger<C> {
    /// Install as the global logger. Call this once during early init.
    ///
    /// # Errors
    /// If a logger is already installed.
    pub fn init(&'static self) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(self.max_level);
        Ok(())
    }
}

impl<C: Console + Send> Log for KernelLogger<C> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut sink = ConsoleSink(&self.console);
        let _ = writeln!(
            sink,
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}
