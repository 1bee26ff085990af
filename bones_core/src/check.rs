use std::path::Path;

use minijinja::Environment;
use serde_yaml_ng::Mapping;
use serde_yaml_ng::Value;
use similar::TextDiff;

use crate::BonesResult;
use crate::config;
use crate::notice;
use crate::notice::NoticeReport;
use crate::sections::ALL_ARTIFACTS;
use crate::sections::SectionRegistry;
use crate::sections::resolve_output_name;
use crate::sections::section_for;
use crate::templates::BonesTemplate;
use crate::templates::GENERATED_MARKER;
use crate::templates::IGNORE_MARKER;

/// How many lines from the top of a file are scanned for the generated
/// marker.
pub const MARKER_SCAN_LINES: usize = 50;

/// Outcome of checking one artifact.
#[derive(Debug)]
#[non_exhaustive]
pub enum ArtifactStatus {
	/// On-disk content matches the freshly rendered content.
	UpToDate,
	/// The section is not configured and no file exists; nothing expected.
	Skipped,
	/// The section is configured but the file is missing.
	NotFound,
	/// The file exists but carries no generated marker; treated as
	/// hand-authored and passed through.
	NotGenerated,
	/// The file claims to be generated but its section is not configured.
	MissingConfig,
	/// On-disk content differs from the freshly rendered content.
	Drifted {
		/// Unified diff between current and expected content, with ignored
		/// lines already stripped from both sides.
		diff: String,
	},
}

impl ArtifactStatus {
	/// Whether this outcome counts as passing.
	#[must_use]
	pub fn passed(&self) -> bool {
		matches!(self, Self::UpToDate | Self::Skipped | Self::NotGenerated)
	}
}

/// Per-artifact result of a drift check.
#[derive(Debug)]
pub struct ArtifactReport {
	/// On-disk filename, with the reserved `pkg` segment resolved.
	pub file: String,
	/// The artifact's config section key.
	pub section: String,
	pub status: ArtifactStatus,
}

/// Aggregate result of a drift check. Every known artifact is checked;
/// failures are accumulated rather than short-circuiting so one run reports
/// the complete picture.
#[derive(Debug)]
pub struct CheckReport {
	pub artifacts: Vec<ArtifactReport>,
	/// License notice scan results, when `license_rst.add_to_files` is set.
	pub notice: Option<NoticeReport>,
}

impl CheckReport {
	/// Whether every artifact passed and no license notices are missing.
	#[must_use]
	pub fn is_ok(&self) -> bool {
		self.artifacts.iter().all(|a| a.status.passed())
			&& self.notice.as_ref().is_none_or(|n| n.missing == 0)
	}
}

/// Re-render every known artifact from the current config and diff it
/// against what is committed under `root`. Read-only: nothing is written.
pub fn check_artifacts(
	root: &Path,
	env: &Environment<'_>,
	registry: &SectionRegistry,
	config: &Mapping,
) -> BonesResult<CheckReport> {
	let pkg_name = config::get_str(config, "pkg_name").unwrap_or_default().to_string();

	let mut artifacts = Vec::with_capacity(ALL_ARTIFACTS.len());
	for artifact in ALL_ARTIFACTS {
		let file = resolve_output_name(artifact, &pkg_name);
		let section = section_for(artifact);
		let status = check_artifact(root, artifact, &file, &section, env, registry, config)?;
		artifacts.push(ArtifactReport {
			file,
			section,
			status,
		});
	}

	let notice = notice_scan(root, config)?;

	Ok(CheckReport { artifacts, notice })
}

fn check_artifact(
	root: &Path,
	artifact: &str,
	file: &str,
	section: &str,
	env: &Environment<'_>,
	registry: &SectionRegistry,
	config: &Mapping,
) -> BonesResult<ArtifactStatus> {
	let path = root.join(file);
	let configured = config::has_section(config, section);

	if !path.exists() {
		return Ok(if configured {
			ArtifactStatus::NotFound
		} else {
			ArtifactStatus::Skipped
		});
	}

	let current = std::fs::read_to_string(&path)?;
	let has_marker = current
		.lines()
		.take(MARKER_SCAN_LINES)
		.any(|line| line.contains(GENERATED_MARKER));

	if !has_marker {
		return Ok(ArtifactStatus::NotGenerated);
	}
	if !configured {
		return Ok(ArtifactStatus::MissingConfig);
	}

	let data = registry.get_render_data(section, config)?;
	let expected = BonesTemplate::new(artifact).render(env, &data)?;

	let current_kept = strip_ignored(&current);
	let expected_kept = strip_ignored(&expected);

	if current_kept == expected_kept {
		return Ok(ArtifactStatus::UpToDate);
	}

	let text_diff = TextDiff::from_lines(&current_kept, &expected_kept);
	let diff = text_diff
		.unified_diff()
		.header(&format!("current {file}"), &format!("new {file}"))
		.to_string();

	Ok(ArtifactStatus::Drifted { diff })
}

/// Drop lines carrying the ignore annotation and normalize the trailing
/// newline, so both sides of the comparison are filtered identically.
fn strip_ignored(text: &str) -> String {
	text
		.lines()
		.filter(|line| !line.contains(IGNORE_MARKER))
		.map(|line| format!("{line}\n"))
		.collect()
}

fn notice_scan(root: &Path, config: &Mapping) -> BonesResult<Option<NoticeReport>> {
	let Some(cfg) = config::get(config, "license_rst").and_then(Value::as_mapping) else {
		return Ok(None);
	};
	if !config::get(cfg, "add_to_files").and_then(Value::as_bool).unwrap_or(false) {
		return Ok(None);
	}
	let Some(text) = config::get_str(cfg, "text") else {
		return Ok(None);
	};

	notice::check_notice(root, text, false).map(Some)
}
