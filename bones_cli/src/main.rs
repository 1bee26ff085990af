use std::path::Path;
use std::path::PathBuf;
use std::process;

use bones_cli::BonesCli;
use bones_cli::Commands;
use clap::Parser;
use bones_core::AnyEmptyResult;
use bones_core::ArtifactStatus;
use bones_core::CheckReport;
use bones_core::check_artifacts;
use bones_core::generate_all;
use bones_core::generate_section;
use bones_core::load_config;
use bones_core::sections::SectionRegistry;
use bones_core::templates::load_env;
use owo_colors::OwoColorize;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = BonesCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_writer(std::io::stderr)
		.init();

	let result = match &args.command {
		Commands::Generate {
			section,
			output_dir,
		} => run_generate(&args, section.as_deref(), output_dir.as_path()),
		Commands::Check { root_dir } => run_check(&args, root_dir.as_path()),
	};

	if let Err(e) = result {
		// Render through miette for rich diagnostics with help text and
		// error codes.
		match e.downcast::<bones_core::BonesError>() {
			Ok(bones_err) => {
				let report: miette::Report = (*bones_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(1);
	}
}

fn run_generate(args: &BonesCli, section: Option<&str>, output_dir: &Path) -> AnyEmptyResult {
	let config = load_config(args.conf_file.as_deref())?;
	let registry = SectionRegistry::builtin();
	let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
	let env = load_env(&root);

	let summary = match section {
		Some(section) => generate_section(&env, &registry, &config, section, output_dir)?,
		None => generate_all(&env, &registry, &config, output_dir)?,
	};

	for skipped in &summary.skipped {
		println!("No config entry detected for {skipped}, skipping");
	}

	if !summary.written.is_empty() {
		println!("Generated {} file(s).", summary.written.len());
		if args.verbose {
			for path in &summary.written {
				println!("  {}", path.display());
			}
		}
	}

	Ok(())
}

fn run_check(args: &BonesCli, root_dir: &Path) -> AnyEmptyResult {
	let config = load_config(args.conf_file.as_deref())?;
	let registry = SectionRegistry::builtin();
	let env = load_env(root_dir);

	let report = check_artifacts(root_dir, &env, &registry, &config)?;

	println!("{}", "*".repeat(50));
	println!("Checking content of generated files:");
	println!("root dir: {}\n", root_dir.display());

	print_report(&report, args.verbose);

	println!("{}", "*".repeat(50));

	if !report.is_ok() {
		process::exit(1);
	}

	Ok(())
}

fn print_report(report: &CheckReport, verbose: bool) {
	for artifact in &report.artifacts {
		println!("{}:", artifact.file);
		match &artifact.status {
			ArtifactStatus::UpToDate => {
				println!("{}", colored!("  Up to date", green));
			}
			ArtifactStatus::Skipped => {
				println!("  Not configured, skipping");
			}
			ArtifactStatus::NotFound => {
				println!("{}", colored!("  File not found", red));
			}
			ArtifactStatus::NotGenerated => {
				println!("  This file was not generated with bones");
			}
			ArtifactStatus::MissingConfig => {
				println!(
					"{}",
					colored!(
						"  This file claims to be generated, but there is no\n  corresponding \
						 configuration in .nengobones.yml.\n  Please remove this text or \
						 configure it in .nengobones.yml.",
						red
					)
				);
			}
			ArtifactStatus::Drifted { diff } => {
				println!(
					"{}",
					colored!(
						"  Content does not match the current configuration;\n  please update by \
						 running `bones generate` from the root directory.",
						red
					)
				);
				if verbose {
					println!("\n  Full diff");
					println!("  =========");
					for line in diff.lines() {
						println!("  {line}");
					}
				}
			}
			_ => {}
		}
	}

	if let Some(notice) = &report.notice {
		println!("\nChecking for license text in python files:");
		for path in &notice.missing_files {
			println!("{}", colored!(format!("Missing: {}", path.display()), red));
		}
		if notice.missing == 0 {
			println!("{}", colored!("  Up to date", green));
		}
		println!(
			"checked {} file(s), {} missing notice",
			notice.checked, notice.missing
		);
	}
}
