use fern::colors::{Color, ColoredLevelConfig};
use log::Level;

/// Initialize the global logger: one line per record on stdout with a local
/// timestamp, colored level, and target module.
pub fn init_logging(level: Level) -> anyhow::Result<()> {
	let colors = ColoredLevelConfig::new()
		.error(Color::Red)
		.warn(Color::Yellow)
		.info(Color::Green)
		.debug(Color::Blue)
		.trace(Color::BrightBlack);

	fern::Dispatch::new()
		.format(move |out, message, record| {
			out.finish(format_args!(
				"{} {:<5} [{}] {}",
				chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
				colors.color(record.level()),
				record.target(),
				message
			))
		})
		.level(level.to_level_filter())
		// sqlx logs every statement at info
		.level_for("sqlx", log::LevelFilter::Warn)
		.chain(std::io::stdout())
		.apply()
		.map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

	Ok(())
}

#[cfg(feature = "unit-tests")]
mod tests {
	#[test]
	fn logging_initialization() {
		// Only one logger per process; a second call reports an error instead of panicking
		let _ = super::init_logging(log::Level::Debug);
		assert!(super::init_logging(log::Level::Debug).is_err());
	}
}
