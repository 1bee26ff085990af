use std::path::Path;

use assert_cmd::Command;

pub fn bones_cmd() -> Command {
	let mut cmd = Command::cargo_bin("bones").unwrap();
	cmd.env("NO_COLOR", "1");
	cmd
}

pub const SAMPLE_CONFIG: &str = "project_name: Dummy
pkg_name: dummy
repo_name: dummyorg/dummy
license: mit
version_py:
  release: true
license_rst: {}
contributors_rst: {}
";

/// Write the sample config into `dir` and return its path.
pub fn write_config(dir: &Path) -> std::path::PathBuf {
	let path = dir.join(".nengobones.yml");
	std::fs::write(&path, SAMPLE_CONFIG).unwrap();
	path
}
