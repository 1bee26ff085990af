use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Keep generated project files synchronized with a declarative config.",
	long_about = "bones keeps a project's generated boilerplate — CI scripts, packaging \
	              metadata, license and contributing text, tool configuration — synchronized \
	              with a single declarative config file (.nengobones.yml).\n\nQuick start:\n  \
	              bones generate  Render all configured files\n  bones check     Verify nothing \
	              has drifted from the config"
)]
pub struct BonesCli {
	#[command(subcommand)]
	pub command: Commands,

	/// Filepath for the config file (default: .nengobones.yml in the
	/// current directory).
	#[arg(long, global = true)]
	pub conf_file: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Generate project files from the config.
	///
	/// With no section argument, renders every section that has a config
	/// entry. With a section argument (e.g. `setup_py` or `ci-scripts`),
	/// renders only that section; a known section without a config entry is
	/// skipped with a notice.
	///
	/// Template overrides are read from a `.templates` directory in the
	/// current directory. An override may reference the bundled template it
	/// replaces through the `templates/` prefix, which is useful in
	/// `include` and `extends` tags.
	Generate {
		/// Section to generate. Renders all configured sections when
		/// omitted.
		section: Option<String>,

		/// Output directory for generated files.
		#[arg(long, default_value = ".")]
		output_dir: PathBuf,
	},
	/// Validate generated project files against the config.
	///
	/// Re-renders the expected content of every known artifact and compares
	/// it with what is on disk. Files missing the generated marker are
	/// passed through; a file carrying the marker without a matching config
	/// section is an error. Exits with a non-zero status code if any
	/// artifact fails.
	///
	/// This does not check the ci scripts, because those are generated
	/// on the fly during CI (so any ci files found locally are likely
	/// build artifacts).
	Check {
		/// Directory containing the files to be checked.
		#[arg(long, default_value = ".")]
		root_dir: PathBuf,
	},
}
