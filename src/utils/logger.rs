/*
 * Structured logging system for kernel messages.
 *
 * Routes the `log` facade through whatever `Hal::debug_write` sink the
 * board configured, so kernel code logs with `log::info!`/`log::warn!`
 * the same way regardless of target, and host-side tests see kernel
 * diagnostics on stderr via `hal::mock::MockHal`.
 */

use log::{Level, LevelFilter, Metadata, Record};
use spin::Once;

use crate::hal::Hal;

static SINK: Once<&'static dyn Hal> = Once::new();

/// Logger implementation backed by whatever `Hal` the board installed.
struct KernelLogger;

impl log::Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(hal) = SINK.get() {
            let mut buf: heapless::String<160> = heapless::String::new();
            let _ = core::fmt::write(
                &mut buf,
                format_args!("[{}] {}\n", record.level(), record.args()),
            );
            hal.debug_write(&buf);
        }
    }

    fn flush(&self) {}
}

static LOGGER: KernelLogger = KernelLogger;

/// Installs `hal` as the logging sink and registers the `log` facade.
/// Safe to call more than once; later calls only refresh the sink,
/// since `log::set_logger` itself may only succeed the first time.
pub fn init(hal: &'static dyn Hal) {
    SINK.call_once(|| hal);
    let _ = log::set_logger(&LOGGER).map(|()| log::set_max_level(LevelFilter::Info));
}
