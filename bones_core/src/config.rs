use std::path::Path;
use std::path::PathBuf;

use chrono::Datelike;
use serde_yaml_ng::Mapping;
use serde_yaml_ng::Value;

use crate::BonesError;
use crate::BonesResult;

/// Name of the config file, looked up in the current working directory.
pub const CONFIG_FILE_NAME: &str = ".nengobones.yml";

/// Dotted paths that must be present in every config file. A dotted path
/// whose top-level section is absent entirely is skipped (the section was
/// not requested); single-segment keys are always required.
pub const MANDATORY_KEYS: [&str; 4] = ["project_name", "pkg_name", "repo_name", "travis_yml.jobs"];

/// Recognized values for the top-level `license` field.
pub const LICENSES: [&str; 5] = ["abr-free", "abr-nonfree", "apache", "mit", "proprietary"];

/// Organizations with a project website; everything else falls back to the
/// repository URL.
const ORG_DOMAINS: [(&str, &str); 2] = [
	("abr", "appliedbrainresearch.com"),
	("nengo", "nengo.ai"),
];

/// Per-entry options in `ci_scripts` that must be lists.
const CI_LIST_OPTS: [&str; 4] = [
	"pip_install",
	"pre_commands",
	"post_commands",
	"codespell_ignore_words",
];

/// Options under `setup_cfg.pytest` that must be lists.
const PYTEST_LIST_OPTS: [&str; 6] = [
	"addopts",
	"allclose_tolerances",
	"filterwarnings",
	"nengo_neurons",
	"norecursedirs",
	"plt_filename_drop",
];

fn yaml_str(text: &str) -> Value {
	Value::String(text.to_string())
}

/// Look up a key in a YAML mapping by name.
pub(crate) fn get<'a>(map: &'a Mapping, name: &str) -> Option<&'a Value> {
	map.get(&yaml_str(name))
}

/// Look up a string-valued key in a YAML mapping by name.
pub(crate) fn get_str<'a>(map: &'a Mapping, name: &str) -> Option<&'a str> {
	get(map, name).and_then(Value::as_str)
}

/// Whether a key is present in a YAML mapping.
pub(crate) fn contains(map: &Mapping, name: &str) -> bool {
	map.contains_key(&yaml_str(name))
}

/// Whether the config requests a section. A section key mapped to an empty
/// body counts as requested.
pub fn has_section(config: &Mapping, section: &str) -> bool {
	contains(config, section)
}

fn set_default(map: &mut Mapping, name: &str, value: Value) {
	if !contains(map, name) {
		map.insert(yaml_str(name), value);
	}
}

/// Borrow a section subtree mutably, materializing an empty mapping for a
/// section that was requested with a null body (`section_name:`).
fn section_mut<'a>(config: &'a mut Mapping, name: &str) -> Option<&'a mut Mapping> {
	let value = config.get_mut(&yaml_str(name))?;
	if value.is_null() {
		*value = Value::Mapping(Mapping::new());
	}
	value.as_mapping_mut()
}

fn section<'a>(config: &'a Mapping, name: &str) -> Option<&'a Mapping> {
	get(config, name).and_then(Value::as_mapping)
}

/// Render a YAML value for an error message. Scalars come out verbatim;
/// collections fall back to their YAML rendering.
fn display_value(value: &Value) -> String {
	match value {
		Value::Null => "null".to_string(),
		Value::Bool(b) => b.to_string(),
		Value::Number(n) => n.to_string(),
		Value::String(s) => s.clone(),
		other => serde_yaml_ng::to_string(other)
			.map_or_else(|_| "<value>".to_string(), |s| s.trim_end().to_string()),
	}
}

/// Verify that a config value, if present, is a list.
///
/// This catches the common mistake of writing `option: value` (a scalar)
/// where `option:` followed by `- value` entries was intended.
fn check_list(cfg: &Mapping, name: &str) -> BonesResult<()> {
	match get(cfg, name) {
		Some(value) if !value.is_sequence() => {
			Err(BonesError::WrongType {
				key: name.to_string(),
				value: display_value(value),
			})
		}
		_ => Ok(()),
	}
}

/// Find the default config file path (`<cwd>/.nengobones.yml`).
#[must_use]
pub fn find_config() -> PathBuf {
	std::env::current_dir()
		.unwrap_or_else(|_| PathBuf::from("."))
		.join(CONFIG_FILE_NAME)
}

/// Load config values from a file, then validate and fill in defaults.
///
/// When `conf_file` is `None` the default location returned by
/// [`find_config`] is used. The returned mapping preserves the key order of
/// the document, which is significant for list-valued fields and for the
/// rendered output of several sections.
pub fn load_config(conf_file: Option<&Path>) -> BonesResult<Mapping> {
	let path = conf_file.map_or_else(find_config, Path::to_path_buf);

	if !path.exists() {
		return Err(BonesError::ConfigNotFound {
			path: path.display().to_string(),
		});
	}

	tracing::debug!(path = %path.display(), "loading config");
	let content = std::fs::read_to_string(&path)?;
	let doc: Value =
		serde_yaml_ng::from_str(&content).map_err(|e| BonesError::ConfigParse(e.to_string()))?;
	let Value::Mapping(mut config) = doc else {
		return Err(BonesError::ConfigParse(
			"top level of the config file must be a mapping".to_string(),
		));
	};

	validate(&config)?;
	fill_defaults(&mut config);

	Ok(config)
}

/// Validate a loaded config mapping.
///
/// Validation runs to completion before anything is rendered or written, so
/// a failure here never leaves partially generated output behind.
pub fn validate(config: &Mapping) -> BonesResult<()> {
	validate_mandatory(config)?;
	validate_license(config)?;
	validate_ci_scripts(config)?;
	validate_travis_config(config)?;
	validate_format_sections(config)?;
	validate_setup_cfg_config(config)?;
	validate_setup_py_config(config)?;

	Ok(())
}

fn validate_mandatory(config: &Mapping) -> BonesResult<()> {
	'entries: for entry in MANDATORY_KEYS {
		let mut node: Option<&Value> = None;

		for (i, part) in entry.split('.').enumerate() {
			let map = match node {
				None => Some(config),
				Some(value) => value.as_mapping(),
			};

			let Some(found) = map.and_then(|m| get(m, part)) else {
				if entry.contains('.') && i == 0 {
					// The section was never requested; nothing to enforce.
					continue 'entries;
				}
				return Err(BonesError::MissingMandatoryKey {
					key: entry.to_string(),
				});
			};

			node = Some(found);
		}
	}

	Ok(())
}

fn validate_license(config: &Mapping) -> BonesResult<()> {
	let Some(value) = get(config, "license") else {
		return Ok(());
	};

	let kind = value.as_str().unwrap_or_default();
	if !LICENSES.contains(&kind) {
		return Err(BonesError::InvalidLicense {
			value: display_value(value),
			allowed: LICENSES.join(", "),
		});
	}

	Ok(())
}

fn validate_ci_scripts(config: &Mapping) -> BonesResult<()> {
	let Some(scripts) = get(config, "ci_scripts") else {
		return Ok(());
	};

	let Some(entries) = scripts.as_sequence() else {
		return Err(BonesError::WrongType {
			key: "ci_scripts".to_string(),
			value: display_value(scripts),
		});
	};

	for entry in entries {
		let cfg = entry.as_mapping();
		if cfg.is_none_or(|c| !contains(c, "template")) {
			return Err(BonesError::MissingCiTemplate {
				entry: display_value(entry),
			});
		}

		if let Some(cfg) = cfg {
			for opt in CI_LIST_OPTS {
				check_list(cfg, opt)?;
			}
		}
	}

	Ok(())
}

fn validate_travis_config(config: &Mapping) -> BonesResult<()> {
	if let Some(cfg) = section(config, "travis_yml") {
		check_list(cfg, "jobs")?;
		check_list(cfg, "deploy_dists")?;
	}

	Ok(())
}

/// Validates the paired formatting sections.
///
/// `pyproject_toml` and `pre_commit_config_yaml` configure the same
/// formatter from two places, so either both sections exist or neither
/// does, and their `exclude` lists must agree exactly.
fn validate_format_sections(config: &Mapping) -> BonesResult<()> {
	let has_pyproject = has_section(config, "pyproject_toml");
	let has_precommit = has_section(config, "pre_commit_config_yaml");

	if !has_pyproject && !has_precommit {
		return Ok(());
	}
	if !(has_pyproject && has_precommit) {
		return Err(BonesError::UnpairedSections(
			"pyproject_toml".to_string(),
			"pre_commit_config_yaml".to_string(),
		));
	}

	let empty = Mapping::new();
	let pyproject = section(config, "pyproject_toml").unwrap_or(&empty);
	let precommit = section(config, "pre_commit_config_yaml").unwrap_or(&empty);
	check_list(pyproject, "exclude")?;
	check_list(precommit, "exclude")?;

	let default = Value::Sequence(Vec::new());
	let left = get(pyproject, "exclude").unwrap_or(&default);
	let right = get(precommit, "exclude").unwrap_or(&default);
	if left != right {
		return Err(BonesError::CrossSectionMismatch {
			left: "pyproject_toml".to_string(),
			right: "pre_commit_config_yaml".to_string(),
			field: "exclude".to_string(),
		});
	}

	Ok(())
}

fn validate_setup_cfg_config(config: &Mapping) -> BonesResult<()> {
	if let Some(pytest) = section(config, "setup_cfg").and_then(|cfg| section(cfg, "pytest")) {
		for opt in PYTEST_LIST_OPTS {
			check_list(pytest, opt)?;
		}
	}

	Ok(())
}

fn validate_setup_py_config(config: &Mapping) -> BonesResult<()> {
	let Some(cfg) = section(config, "setup_py") else {
		return Ok(());
	};

	check_list(cfg, "classifiers")?;

	if let Some(classifiers) = get(cfg, "classifiers").and_then(Value::as_sequence) {
		for classifier in classifiers {
			if let Some(text) = classifier.as_str() {
				if text.starts_with("License ::") {
					return Err(BonesError::ManualClassifier {
						value: text.to_string(),
					});
				}
			}
		}
	}

	Ok(())
}

/// Fill in default values in a validated config (in place).
///
/// Defaulting is set-if-absent: a value the user supplied is never
/// overwritten, and applying this function a second time is a no-op.
pub fn fill_defaults(config: &mut Mapping) {
	let year = i64::from(chrono::Local::now().year());

	set_default(config, "author", yaml_str("Applied Brain Research"));
	set_default(config, "author_email", yaml_str("info@appliedbrainresearch.com"));
	set_default(config, "copyright_start", Value::Number(year.into()));
	set_default(config, "copyright_end", Value::Number(year.into()));
	set_default(config, "license", yaml_str("proprietary"));
	set_default(config, "main_branch", yaml_str("master"));
	set_default(config, "min_python", yaml_str("3.8"));

	let license = get_str(config, "license").unwrap_or("proprietary").to_string();
	let min_python = get_str(config, "min_python").unwrap_or("3.8").to_string();
	let project_name = get_str(config, "project_name").unwrap_or_default().to_string();
	let pkg_name = get_str(config, "pkg_name").unwrap_or_default().to_string();
	let repo_name = get_str(config, "repo_name").unwrap_or_default().to_string();

	if let Some(cfg) = section_mut(config, "travis_yml") {
		set_default(cfg, "python", yaml_str(&min_python));
		set_default(cfg, "global_vars", Value::Mapping(Mapping::new()));
		set_default(cfg, "pypi_user", Value::Null);
		set_default(cfg, "deploy_dists", Value::Sequence(vec![yaml_str("sdist")]));
		set_default(cfg, "bones_install", yaml_str("nengo-bones"));

		if let Some(jobs) = cfg.get_mut(&yaml_str("jobs")).and_then(Value::as_sequence_mut) {
			for job in jobs {
				if let Some(job) = job.as_mapping_mut() {
					let is_docs = get_str(job, "script").is_some_and(|s| s.starts_with("docs"));
					if is_docs {
						set_default(job, "apt_install", Value::Sequence(vec![yaml_str("pandoc")]));
					}
				}
			}
		}
	}

	if let Some(cfg) = section_mut(config, "codecov_yml") {
		set_default(cfg, "skip_appveyor", Value::Bool(true));
		set_default(cfg, "abs_target", yaml_str("auto"));
		set_default(cfg, "diff_target", yaml_str("100%"));
	}

	if let Some(cfg) = section_mut(config, "license_rst") {
		set_default(cfg, "add_to_files", Value::Bool(false));
		set_default(cfg, "text", yaml_str(&license_text(&license, &project_name)));
	}

	if let Some(cfg) = section_mut(config, "setup_py") {
		set_default(cfg, "url", yaml_str(&project_url(&repo_name, &pkg_name)));
		set_default(cfg, "python_requires", yaml_str(&format!(">={min_python}")));
		set_default(cfg, "include_package_data", Value::Bool(false));
		set_default(cfg, "license", yaml_str(license_string(&license)));

		set_default(cfg, "classifiers", Value::Sequence(Vec::new()));
		if let Some(classifiers) = cfg.get_mut(&yaml_str("classifiers")).and_then(Value::as_sequence_mut)
		{
			let derived = yaml_str(license_classifier(&license));
			if !classifiers.contains(&derived) {
				classifiers.push(derived);
			}
			classifiers.sort_by(|a, b| {
				a.as_str().unwrap_or_default().cmp(b.as_str().unwrap_or_default())
			});
		}
	}

	if let Some(cfg) = section_mut(config, "setup_cfg") {
		for tool in ["pytest", "pylint", "flake8", "coverage"] {
			set_default(cfg, tool, Value::Mapping(Mapping::new()));
		}
		if let Some(pytest) = section_mut(cfg, "pytest") {
			set_default(pytest, "xfail_strict", Value::Bool(false));
		}
	}

	if let Some(cfg) = section_mut(config, "docs_conf_py") {
		set_default(cfg, "nengo_logo", yaml_str("general-full-light.svg"));
		set_default(cfg, "nengo_logo_color", yaml_str("#a8acaf"));
	}

	if let Some(cfg) = section_mut(config, "contributors_rst") {
		set_default(cfg, "nengo_list", Value::Bool(license.starts_with("abr")));
	}

	if let Some(cfg) = section_mut(config, "version_py") {
		set_default(cfg, "major", Value::Number(0.into()));
		set_default(cfg, "minor", Value::Number(1.into()));
		set_default(cfg, "patch", Value::Number(0.into()));
		set_default(cfg, "release", Value::Bool(false));
	}

	for name in ["pyproject_toml", "pre_commit_config_yaml"] {
		if let Some(cfg) = section_mut(config, name) {
			set_default(cfg, "exclude", Value::Sequence(Vec::new()));
		}
	}
}

/// The human-readable license string for a license kind.
#[must_use]
pub fn license_string(kind: &str) -> &'static str {
	match kind {
		"abr-free" => "Free for non-commercial use",
		"apache" => "Apache 2.0 license",
		"mit" => "MIT license",
		_ => "Proprietary license",
	}
}

/// The single trove classifier derived from a license kind. Manual
/// `License ::` classifiers are rejected during validation so that this
/// stays the only source of truth.
#[must_use]
pub fn license_classifier(kind: &str) -> &'static str {
	match kind {
		"abr-free" => "License :: Free for non-commercial use",
		"apache" => "License :: OSI Approved :: Apache Software License",
		"mit" => "License :: OSI Approved :: MIT License",
		_ => "License :: Other/Proprietary License",
	}
}

/// The full license text block for a license kind.
#[must_use]
pub fn license_text(kind: &str, project_name: &str) -> String {
	match kind {
		"abr-free" | "abr-nonfree" => {
			let cost = if kind == "abr-free" {
				"at no cost"
			} else {
				"at a reduced cost"
			};
			format!(
				"{project_name} is made available under a proprietary license, which permits \
				 using, copying, sharing, and making derivative works from {project_name} and \
				 its source code for any non-commercial purpose {cost}.\n\nIf you would like to \
				 use {project_name} commercially, licenses can be purchased from Applied Brain \
				 Research. Please contact info@appliedbrainresearch.com for more information."
			)
		}
		"mit" => {
			format!(
				"Permission is hereby granted, free of charge, to any person obtaining a copy of \
				 {project_name} and associated documentation files (the \"Software\"), to deal in \
				 the Software without restriction, including without limitation the rights to \
				 use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of \
				 the Software, and to permit persons to whom the Software is furnished to do so, \
				 subject to the following conditions:\n\nThe above copyright notice and this \
				 permission notice shall be included in all copies or substantial portions of \
				 the Software.\n\nTHE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY \
				 KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF \
				 MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO \
				 EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES \
				 OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, \
				 ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER \
				 DEALINGS IN THE SOFTWARE."
			)
		}
		"apache" => {
			format!(
				"Licensed under the Apache License, Version 2.0 (the \"License\"); you may not \
				 use {project_name} except in compliance with the License. You may obtain a copy \
				 of the License at\n\n    http://www.apache.org/licenses/LICENSE-2.0\n\nUnless \
				 required by applicable law or agreed to in writing, software distributed under \
				 the License is distributed on an \"AS IS\" BASIS, WITHOUT WARRANTIES OR \
				 CONDITIONS OF ANY KIND, either express or implied. See the License for the \
				 specific language governing permissions and limitations under the License."
			)
		}
		_ => {
			format!(
				"{project_name} is proprietary software, made available under a commercial \
				 license. All rights reserved.\n\nPlease contact the copyright holder for \
				 licensing information."
			)
		}
	}
}

/// The default project URL, from the organization part of `repo_name`.
/// Known organizations map to their project domain; anything else falls
/// back to the repository itself.
#[must_use]
pub fn project_url(repo_name: &str, pkg_name: &str) -> String {
	let org = repo_name.split('/').next().unwrap_or_default();
	ORG_DOMAINS
		.iter()
		.find(|(name, _)| *name == org)
		.map_or_else(
			|| format!("https://github.com/{repo_name}"),
			|(_, domain)| format!("https://www.{domain}/{}", pkg_name.replace('_', "-")),
		)
}
