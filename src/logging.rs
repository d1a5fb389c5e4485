use std::io::Write;

use env_logger::Builder;

/// Install the logger. `level` uses `env_logger` filter syntax
/// (`info`, `beacon_relay::radio=debug`, ...); `RUST_LOG` wins when set.
///
/// Returns false if a logger was already installed.
pub fn init(level: &str) -> bool {
    let mut builder = Builder::new();
    builder.parse_filters(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} {:<5} [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });
    builder.try_init().is_ok()
}
