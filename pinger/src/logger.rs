use log::{Level, LevelFilter, Log, Metadata, Record};

/// Routes the `log` facade to the Workers console.
struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        match record.level() {
            Level::Error => worker::console_error!("[{}] {}", record.target(), record.args()),
            Level::Warn => worker::console_warn!("[{}] {}", record.target(), record.args()),
            Level::Info => worker::console_log!("[{}] {}", record.target(), record.args()),
            Level::Debug | Level::Trace => {
                worker::console_debug!("[{}] {}", record.target(), record.args())
            }
        }
    }

    fn flush(&self) {}
}

/// Installs the console logger once per isolate; later calls are no-ops.
pub fn init() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }
}
