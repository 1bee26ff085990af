use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;

use minijinja::Environment;
use minijinja::UndefinedBehavior;
use serde_yaml_ng::Mapping;
use serde_yaml_ng::Value;

use crate::BonesError;
use crate::BonesResult;
use crate::config;
use crate::notice;
use crate::sections::ALL_ARTIFACTS;
use crate::sections::SectionRegistry;
use crate::sections::resolve_output_name;
use crate::sections::section_for;

/// Marker phrase proving a file was produced by this tool. Placed near the
/// top of every rendered template and scanned for by the drift detector.
pub const GENERATED_MARKER: &str = "Automatically generated by nengo-bones";

/// Per-line annotation excluding a line from drift comparison, so sanctioned
/// manual edits survive `check`.
pub const IGNORE_MARKER: &str = "# bones: ignore";

/// Directory (relative to the project root) searched for template overrides
/// before falling back to the bundled set.
pub const OVERRIDE_DIR: &str = ".templates";

/// Stable alias prefix under which the bundled tier is always reachable,
/// letting an override `{% extends %}` or `{% include %}` the template it
/// replaces instead of starting from scratch.
pub const BUNDLED_ALIAS: &str = "templates/";

/// External tools piped over rendered Python output, in order.
const PY_FORMATTERS: [(&str, &[&str]); 3] = [
	("docformatter", &["-"]),
	("isort", &["-"]),
	("black", &["--quiet", "-"]),
];

/// The bundled template tier, embedded at compile time.
const BUNDLED_TEMPLATES: [(&str, &str); 16] = [
	(
		".codecov.yml.template",
		include_str!("../templates/.codecov.yml.template"),
	),
	(
		".pre-commit-config.yaml.template",
		include_str!("../templates/.pre-commit-config.yaml.template"),
	),
	(
		".travis.yml.template",
		include_str!("../templates/.travis.yml.template"),
	),
	(
		"CONTRIBUTING.rst.template",
		include_str!("../templates/CONTRIBUTING.rst.template"),
	),
	(
		"CONTRIBUTORS.rst.template",
		include_str!("../templates/CONTRIBUTORS.rst.template"),
	),
	(
		"LICENSE.rst.template",
		include_str!("../templates/LICENSE.rst.template"),
	),
	(
		"MANIFEST.in.template",
		include_str!("../templates/MANIFEST.in.template"),
	),
	(
		"docs/conf.py.template",
		include_str!("../templates/docs_conf.py.template"),
	),
	(
		"pkg/version.py.template",
		include_str!("../templates/version.py.template"),
	),
	(
		"pyproject.toml.template",
		include_str!("../templates/pyproject.toml.template"),
	),
	(
		"setup.cfg.template",
		include_str!("../templates/setup.cfg.template"),
	),
	(
		"setup.py.template",
		include_str!("../templates/setup.py.template"),
	),
	(
		"base_script.sh.template",
		include_str!("../templates/base_script.sh.template"),
	),
	(
		"static.sh.template",
		include_str!("../templates/static.sh.template"),
	),
	(
		"test.sh.template",
		include_str!("../templates/test.sh.template"),
	),
	(
		"docs.sh.template",
		include_str!("../templates/docs.sh.template"),
	),
];

fn bundled(name: &str) -> Option<&'static str> {
	BUNDLED_TEMPLATES
		.iter()
		.find(|(template, _)| *template == name)
		.map(|(_, content)| *content)
}

/// Create the template environment rooted at a project directory.
///
/// Template names resolve through two tiers: `<root>/.templates/<name>`
/// first, then the bundled set. Names under the [`BUNDLED_ALIAS`] prefix
/// skip the override tier entirely, which is what makes
/// `{% extends "templates/setup.py.template" %}` from an override safe.
#[must_use]
pub fn load_env(root: &Path) -> Environment<'static> {
	let mut env = Environment::new();
	env.set_trim_blocks(true);
	env.set_lstrip_blocks(true);
	env.set_keep_trailing_newline(true);
	env.set_undefined_behavior(UndefinedBehavior::Chainable);
	env.add_filter("rstrip", |value: String, chars: String| -> String {
		value.trim_end_matches(|c| chars.contains(c)).to_string()
	});

	let override_dir = root.join(OVERRIDE_DIR);
	env.set_loader(move |name| {
		if let Some(aliased) = name.strip_prefix(BUNDLED_ALIAS) {
			return Ok(bundled(aliased).map(str::to_string));
		}

		let candidate = override_dir.join(name);
		match std::fs::read_to_string(&candidate) {
			Ok(content) => {
				tracing::debug!(template = name, "using override template");
				return Ok(Some(content));
			}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
			Err(e) => {
				return Err(minijinja::Error::new(
					minijinja::ErrorKind::InvalidOperation,
					format!("failed to read template override {}: {e}", candidate.display()),
				));
			}
		}

		Ok(bundled(name).map(str::to_string))
	});

	env
}

fn get_template<'env, 'source>(
	env: &'env Environment<'source>,
	name: &str,
) -> BonesResult<minijinja::Template<'env, 'source>> {
	env.get_template(name).map_err(|e| {
		if matches!(e.kind(), minijinja::ErrorKind::TemplateNotFound) {
			BonesError::TemplateNotFound(name.to_string())
		} else {
			BonesError::TemplateRender(e.to_string())
		}
	})
}

/// A templated file known to bones.
///
/// The only necessary input is the output filename; the config section key
/// and the template name are both derived from it.
#[derive(Debug, Clone)]
pub struct BonesTemplate {
	/// Filename for the rendered output file, relative to the output
	/// directory. May contain the reserved `pkg` segment.
	pub output_file: String,
	/// Config section holding this template's options.
	pub section: String,
	/// Name of the input template resolved through the environment.
	pub template_file: String,
}

impl BonesTemplate {
	#[must_use]
	pub fn new(output_file: &str) -> Self {
		Self {
			output_file: output_file.to_string(),
			section: section_for(output_file),
			template_file: format!("{output_file}.template"),
		}
	}

	/// Render this template to a string using the given render data.
	///
	/// Python outputs are piped through the external formatting toolchain
	/// and, when `license_rst.add_to_files` is set, prefixed with the
	/// comment-per-line license notice.
	pub fn render(&self, env: &Environment<'_>, data: &Mapping) -> BonesResult<String> {
		let template = get_template(env, &self.template_file)?;
		let ctx = minijinja::Value::from_serialize(data);
		let mut rendered = template
			.render(ctx)
			.map_err(|e| BonesError::TemplateRender(e.to_string()))?;

		if self.output_file.ends_with(".py") {
			rendered = format_python(&rendered)?;
			if let Some(header) = license_notice_header(data) {
				rendered = format!("{header}\n{rendered}");
			}
		}

		Ok(rendered)
	}

	/// Render this template to a file under `output_dir`.
	///
	/// The reserved `pkg` path segment is resolved to the configured package
	/// name, parent directories are created as needed, and shell scripts are
	/// marked executable.
	pub fn render_to_file(
		&self,
		env: &Environment<'_>,
		data: &Mapping,
		output_dir: &Path,
		output_name: Option<&str>,
	) -> BonesResult<PathBuf> {
		let pkg_name = config::get_str(data, "pkg_name").unwrap_or_default();
		let name = output_name.map_or_else(
			|| resolve_output_name(&self.output_file, pkg_name),
			str::to_string,
		);
		let path = output_dir.join(&name);

		let rendered = self.render(env, data)?;

		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(&path, rendered)?;

		if name.ends_with(".sh") {
			mark_executable(&path)?;
		}

		tracing::debug!(file = %path.display(), "rendered");
		Ok(path)
	}
}

/// The comment-per-line license notice to prepend, if configured.
fn license_notice_header(data: &Mapping) -> Option<String> {
	let cfg = config::get(data, "license_rst").and_then(Value::as_mapping)?;
	let enabled = config::get(cfg, "add_to_files").and_then(Value::as_bool)?;
	if !enabled {
		return None;
	}

	config::get_str(cfg, "text").map(notice::notice_header)
}

/// Pipe rendered Python text through the external formatting toolchain.
/// Tools that are not installed are skipped with a warning; a tool that
/// runs and fails aborts with its diagnostic output intact.
fn format_python(text: &str) -> BonesResult<String> {
	let mut current = text.to_string();
	for (tool, args) in PY_FORMATTERS {
		if let Some(formatted) = pipe_through(tool, args, &current)? {
			current = formatted;
		}
	}

	Ok(current)
}

fn pipe_through(tool: &str, args: &[&str], input: &str) -> BonesResult<Option<String>> {
	let spawned = Command::new(tool)
		.args(args)
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.spawn();

	let mut child = match spawned {
		Ok(child) => child,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
			tracing::warn!("`{tool}` not installed, rendered output may not be formatted correctly");
			return Ok(None);
		}
		Err(e) => return Err(e.into()),
	};

	if let Some(mut stdin) = child.stdin.take() {
		stdin.write_all(input.as_bytes())?;
	}

	let output = child.wait_with_output()?;
	// docformatter signals rewritten output with status 3.
	let ok = output.status.success() || (tool == "docformatter" && output.status.code() == Some(3));
	if !ok {
		return Err(BonesError::ExternalTool {
			tool: tool.to_string(),
			output: String::from_utf8_lossy(&output.stderr).to_string(),
		});
	}

	Ok(Some(String::from_utf8_lossy(&output.stdout).to_string()))
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> BonesResult<()> {
	use std::os::unix::fs::PermissionsExt;

	let mut perms = std::fs::metadata(path)?.permissions();
	perms.set_mode(perms.mode() | 0o111);
	std::fs::set_permissions(path, perms)?;

	Ok(())
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> BonesResult<()> {
	Ok(())
}

/// Result of a `generate` run.
#[derive(Debug, Default)]
pub struct GenerateSummary {
	/// Files written, in render order.
	pub written: Vec<PathBuf>,
	/// Sections that were requested but have no config entry.
	pub skipped: Vec<String>,
}

/// Render every configured section into `output_dir`.
pub fn generate_all(
	env: &Environment<'_>,
	registry: &SectionRegistry,
	config: &Mapping,
	output_dir: &Path,
) -> BonesResult<GenerateSummary> {
	let mut summary = GenerateSummary::default();

	for artifact in ALL_ARTIFACTS {
		let section = section_for(artifact);
		if !config::has_section(config, &section) {
			summary.skipped.push(section);
			continue;
		}

		let data = registry.get_render_data(&section, config)?;
		let template = BonesTemplate::new(artifact);
		summary
			.written
			.push(template.render_to_file(env, &data, output_dir, None)?);
	}

	if config::has_section(config, "ci_scripts") {
		summary
			.written
			.extend(render_ci_scripts(env, config, output_dir)?);
	} else {
		summary.skipped.push("ci_scripts".to_string());
	}

	Ok(summary)
}

/// Render a single section into `output_dir`. Hyphens in the section name
/// are accepted as an alias for underscores. A known section with no config
/// entry is reported through [`GenerateSummary::skipped`]; an unknown
/// section is an error.
pub fn generate_section(
	env: &Environment<'_>,
	registry: &SectionRegistry,
	config: &Mapping,
	section: &str,
	output_dir: &Path,
) -> BonesResult<GenerateSummary> {
	let section = section.replace('-', "_");
	let mut summary = GenerateSummary::default();

	if section == "ci_scripts" {
		if config::has_section(config, &section) {
			summary.written = render_ci_scripts(env, config, output_dir)?;
		} else {
			summary.skipped.push(section);
		}
		return Ok(summary);
	}

	let Some(artifact) = ALL_ARTIFACTS.iter().find(|a| section_for(a) == section) else {
		return Err(BonesError::UnknownSection(section));
	};

	if config::has_section(config, &section) {
		let data = registry.get_render_data(&section, config)?;
		let template = BonesTemplate::new(artifact);
		summary
			.written
			.push(template.render_to_file(env, &data, output_dir, None)?);
	} else {
		summary.skipped.push(section);
	}

	Ok(summary)
}

/// Render one shell script per `ci_scripts` entry. Each entry names the
/// template to use and may override the output name; the remaining keys are
/// passed straight into the template.
fn render_ci_scripts(
	env: &Environment<'_>,
	config: &Mapping,
	output_dir: &Path,
) -> BonesResult<Vec<PathBuf>> {
	let Some(entries) = config::get(config, "ci_scripts").and_then(Value::as_sequence) else {
		return Ok(Vec::new());
	};

	let mut written = Vec::new();
	for entry in entries {
		let Some(params) = entry.as_mapping() else {
			continue;
		};
		let Some(template_name) = config::get_str(params, "template") else {
			continue;
		};
		let output_name = config::get_str(params, "output_name").unwrap_or(template_name);

		let mut data = Mapping::new();
		for field in ["pkg_name", "repo_name", "main_branch", "min_python"] {
			if let Some(value) = config::get(config, field) {
				data.insert(Value::String(field.to_string()), value.clone());
			}
		}
		data.insert(
			Value::String("bones_version".to_string()),
			Value::String(env!("CARGO_PKG_VERSION").to_string()),
		);
		for (k, v) in params {
			if k.as_str() != Some("template") && k.as_str() != Some("output_name") {
				data.insert(k.clone(), v.clone());
			}
		}

		let template = get_template(env, &format!("{template_name}.sh.template"))?;
		let ctx = minijinja::Value::from_serialize(&data);
		let rendered = template
			.render(ctx)
			.map_err(|e| BonesError::TemplateRender(e.to_string()))?;

		std::fs::create_dir_all(output_dir)?;
		let path = output_dir.join(format!("{output_name}.sh"));
		std::fs::write(&path, rendered)?;
		mark_executable(&path)?;

		tracing::debug!(file = %path.display(), "rendered ci script");
		written.push(path);
	}

	Ok(written)
}
