use clap::{Arg, ArgAction, ArgMatches, Command};
use std::error::Error;
use std::path::PathBuf;
use std::str::FromStr;

use syncmirror::logging::{self, error, info};
use syncmirror::{Config, MirrorError, Scheduler, SymlinkMode};

fn cli() -> Command {
	Command::new("SyncMirror")
		.version(env!("CARGO_PKG_VERSION"))
		.about("One-way periodic directory mirroring")
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("FILE")
				.help("Config file (.toml, .json or .json5)"),
		)
		.arg(Arg::new("source").short('s').long("source").value_name("DIR").help("Source directory"))
		.arg(
			Arg::new("replica")
				.short('r')
				.long("replica")
				.value_name("DIR")
				.help("Replica directory"),
		)
		.arg(
			Arg::new("interval")
				.short('i')
				.long("interval")
				.value_name("SECS")
				.value_parser(clap::value_parser!(u64))
				.help("Seconds to wait between runs"),
		)
		.arg(Arg::new("log-file").long("log-file").value_name("FILE").help("Append log lines here"))
		.arg(Arg::new("log-level").long("log-level").value_name("LEVEL").help("Default log level"))
		.arg(
			Arg::new("exclude")
				.short('x')
				.long("exclude")
				.value_name("GLOB")
				.action(ArgAction::Append)
				.help("Exclude matching paths (relative to the roots)"),
		)
		.arg(
			Arg::new("symlinks")
				.long("symlinks")
				.value_name("MODE")
				.help("Symlink handling: skip, preserve, follow"),
		)
		.arg(
			Arg::new("index")
				.long("index")
				.value_name("FILE")
				.help("Persist fingerprints here to skip re-hashing unchanged files"),
		)
		.arg(
			Arg::new("dry-run")
				.short('n')
				.long("dry-run")
				.action(ArgAction::SetTrue)
				.help("Log changes without applying them"),
		)
		.arg(
			Arg::new("once")
				.long("once")
				.action(ArgAction::SetTrue)
				.help("Run a single reconciliation and exit"),
		)
}

/// Defaults, then config file, then environment, then CLI flags
fn build_config(matches: &ArgMatches) -> Result<Config, MirrorError> {
	let mut config = match matches.get_one::<String>("config") {
		Some(path) => Config::from_file(&PathBuf::from(path))?,
		None => Config::default(),
	};
	config.apply_env()?;

	if let Some(source) = matches.get_one::<String>("source") {
		config.source = PathBuf::from(source);
	}
	if let Some(replica) = matches.get_one::<String>("replica") {
		config.replica = PathBuf::from(replica);
	}
	if let Some(interval) = matches.get_one::<u64>("interval") {
		config.interval_secs = *interval;
	}
	if let Some(log_file) = matches.get_one::<String>("log-file") {
		config.log_file = if log_file.is_empty() { None } else { Some(PathBuf::from(log_file)) };
	}
	if let Some(level) = matches.get_one::<String>("log-level") {
		config.log_level = level.clone();
	}
	if let Some(patterns) = matches.get_many::<String>("exclude") {
		config.exclude_patterns.extend(patterns.cloned());
	}
	if let Some(mode) = matches.get_one::<String>("symlinks") {
		config.symlink_mode = SymlinkMode::from_str(mode).map_err(MirrorError::config)?;
	}
	if let Some(index) = matches.get_one::<String>("index") {
		config.index_path = Some(PathBuf::from(index));
	}
	if matches.get_flag("dry-run") {
		config.dry_run = true;
	}

	config.validate()?;
	Ok(config)
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			error!("Cannot listen for Ctrl-C: {}", e);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(e) => {
				error!("Cannot listen for SIGTERM: {}", e);
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let matches = cli().get_matches();
	let once = matches.get_flag("once");

	let config = build_config(&matches)?;
	logging::init_logging(config.log_file.as_deref(), &config.log_level)?;

	let scheduler = Scheduler::new(&config)?;
	if once {
		let report = scheduler.run_once().await.map_err(|e| {
			error!("Error during synchronization: {}", e);
			e
		})?;
		if !report.is_clean() {
			return Err(format!("{} entries failed", report.errors.len()).into());
		}
		return Ok(());
	}

	info!(
		"Mirroring {} to {} every {}s",
		config.source.display(),
		config.replica.display(),
		config.interval_secs
	);
	let runs = scheduler.run_until(shutdown_signal()).await;
	info!("Stopped after {} runs", runs);
	Ok(())
}


// vim: ts=4
