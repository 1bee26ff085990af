use std::collections::BTreeMap;

use serde_yaml_ng::Mapping;
use serde_yaml_ng::Value;

use crate::BonesResult;
use crate::config;

/// Output paths of every artifact with a 1:1 config section. The reserved
/// `pkg` segment stands for the configured package name and is substituted
/// only when resolving the on-disk path.
///
/// `ci_scripts` is not listed here: it renders one script per config entry
/// and those scripts are generated on the fly during CI rather than
/// committed.
pub const ALL_ARTIFACTS: [&str; 12] = [
	".codecov.yml",
	".pre-commit-config.yaml",
	".travis.yml",
	"CONTRIBUTING.rst",
	"CONTRIBUTORS.rst",
	"LICENSE.rst",
	"MANIFEST.in",
	"docs/conf.py",
	"pkg/version.py",
	"pyproject.toml",
	"setup.cfg",
	"setup.py",
];

/// The reserved path segment replaced by the configured package name.
pub const PKG_SEGMENT: &str = "pkg";

/// Keys in a travis job entry that are promoted into the job's `env` map.
const JOB_ENV_KEYS: [&str; 3] = ["script", "test_args", "python"];

/// Flattened `setup_py` keys pulled out into the tagged `extras` collection,
/// together with the output shape the template should emit for them.
const SETUP_EXTRA_SHAPES: [(&str, &str); 3] = [
	("classifiers", "list"),
	("entry_points", "mapping"),
	("package_data", "mapping"),
];

/// Canonicalize an artifact's output path into its config section key.
///
/// The reserved `pkg/` segment is dropped, a leading `.` is stripped, the
/// path/extension/hyphen separators become underscores, and the result is
/// lowercased: `.pre-commit-config.yaml` -> `pre_commit_config_yaml`,
/// `pkg/version.py` -> `version_py`.
#[must_use]
pub fn section_for(output_file: &str) -> String {
	let stripped = output_file.strip_prefix("pkg/").unwrap_or(output_file);
	stripped
		.trim_start_matches('.')
		.replace(['.', '/', '-'], "_")
		.to_ascii_lowercase()
}

/// Substitute the reserved `pkg` segment with the actual package name.
#[must_use]
pub fn resolve_output_name(output_file: &str, pkg_name: &str) -> String {
	output_file
		.split('/')
		.map(|segment| if segment == PKG_SEGMENT { pkg_name } else { segment })
		.collect::<Vec<_>>()
		.join("/")
}

/// Section keys of everything `generate` knows how to render.
#[must_use]
pub fn known_sections() -> Vec<String> {
	let mut sections: Vec<String> = ALL_ARTIFACTS.iter().map(|a| section_for(a)).collect();
	sections.push("ci_scripts".to_string());
	sections
}

/// A pure render-data transform. Adapters receive the freshly merged
/// namespace for one section and may promote, extract, or inject keys; they
/// never see (or mutate) the loaded config document itself.
pub type Adapter = fn(&mut Mapping) -> BonesResult<()>;

/// Immutable map from section name to its ordered render-data adapters.
///
/// Built once at startup and passed by reference. Registering adapters for
/// a new section never requires touching the adapters of existing sections.
#[derive(Debug)]
pub struct SectionRegistry {
	adapters: BTreeMap<&'static str, Vec<Adapter>>,
}

impl Default for SectionRegistry {
	fn default() -> Self {
		Self::builtin()
	}
}

impl SectionRegistry {
	/// The registry with all built-in section adapters.
	#[must_use]
	pub fn builtin() -> Self {
		let mut adapters: BTreeMap<&'static str, Vec<Adapter>> = BTreeMap::new();
		adapters.insert("travis_yml", vec![promote_job_env]);
		adapters.insert("setup_py", vec![extract_setup_extras]);
		adapters.insert("manifest_in", vec![alias_manifest_custom]);
		adapters.insert("version_py", vec![stamp_generation_time]);

		Self { adapters }
	}

	/// An empty registry, for callers that want full control over
	/// registration.
	#[must_use]
	pub fn empty() -> Self {
		Self {
			adapters: BTreeMap::new(),
		}
	}

	/// Append an adapter to a section's list, builder style.
	#[must_use]
	pub fn with_adapter(mut self, section: &'static str, adapter: Adapter) -> Self {
		self.adapters.entry(section).or_default().push(adapter);
		self
	}

	/// Construct the namespace used to render one section's template.
	///
	/// The namespace is a fresh mapping: top-level config fields, then the
	/// section's own fields (shadowing same-named top-level keys), then the
	/// tool version, then whatever the section's adapters derive. The loaded
	/// config is deep copied, so calling this repeatedly for the same
	/// document always produces the same result.
	pub fn get_render_data(&self, section: &str, config: &Mapping) -> BonesResult<Mapping> {
		let mut data = config.clone();

		if let Some(section_cfg) = config::get(config, section).and_then(Value::as_mapping) {
			for (k, v) in section_cfg {
				data.insert(k.clone(), v.clone());
			}
		}

		data.insert(
			Value::String("bones_version".to_string()),
			Value::String(env!("CARGO_PKG_VERSION").to_string()),
		);

		for adapter in self.adapters.get(section).into_iter().flatten() {
			adapter(&mut data)?;
		}

		tracing::debug!(section, keys = data.len(), "built render data");
		Ok(data)
	}
}

/// Promote the ad hoc job keys (`script`, `test_args`, `python`) into each
/// job's nested `env` map, so templates only ever emit environment
/// variables from one place.
fn promote_job_env(data: &mut Mapping) -> BonesResult<()> {
	let jobs_key = Value::String("jobs".to_string());
	let Some(jobs) = data.get_mut(&jobs_key).and_then(Value::as_sequence_mut) else {
		return Ok(());
	};

	for job in jobs {
		let Some(job) = job.as_mapping_mut() else {
			continue;
		};

		let mut promoted = Vec::new();
		for var in JOB_ENV_KEYS {
			let var_key = Value::String(var.to_string());
			if let Some(value) = job.remove(&var_key) {
				promoted.push((var_key, value));
			}
		}

		let env_key = Value::String("env".to_string());
		if !job.contains_key(&env_key) {
			job.insert(env_key.clone(), Value::Mapping(Mapping::new()));
		}
		if let Some(env) = job.get_mut(&env_key).and_then(Value::as_mapping_mut) {
			for (k, v) in promoted {
				env.insert(k, v);
			}
		}
	}

	Ok(())
}

/// Pull `classifiers`/`entry_points`/`package_data` out of the flattened
/// namespace into an `extras` collection that records each value's shape,
/// so the template can emit a Python list or dict as appropriate. Order
/// follows the section config, not the shape table.
fn extract_setup_extras(data: &mut Mapping) -> BonesResult<()> {
	let names: Vec<String> = data
		.keys()
		.filter_map(Value::as_str)
		.filter(|name| SETUP_EXTRA_SHAPES.iter().any(|(extra, _)| extra == name))
		.map(str::to_string)
		.collect();

	let mut extras = Mapping::new();
	for name in names {
		let shape = SETUP_EXTRA_SHAPES
			.iter()
			.find(|(extra, _)| *extra == name)
			.map_or("list", |(_, shape)| *shape);
		let name_key = Value::String(name.clone());
		if let Some(value) = data.remove(&name_key) {
			let mut tagged = Mapping::new();
			tagged.insert(
				Value::String("shape".to_string()),
				Value::String(shape.to_string()),
			);
			tagged.insert(Value::String("value".to_string()), value);
			extras.insert(name_key, Value::Mapping(tagged));
		}
	}

	data.insert(Value::String("extras".to_string()), Value::Mapping(extras));
	Ok(())
}

/// Expose the raw `manifest_in` subtree as `custom` for the template. A
/// section requested with a null body becomes an empty mapping so the
/// template can iterate it unconditionally.
fn alias_manifest_custom(data: &mut Mapping) -> BonesResult<()> {
	let section_key = Value::String("manifest_in".to_string());
	let custom = data
		.get(&section_key)
		.and_then(Value::as_mapping)
		.cloned()
		.unwrap_or_default();
	data.insert(Value::String("custom".to_string()), Value::Mapping(custom));

	Ok(())
}

/// Inject a timezone-qualified timestamp for the version stamp artifact.
/// The template keeps this on an ignored line so it never causes drift.
fn stamp_generation_time(data: &mut Mapping) -> BonesResult<()> {
	let now = chrono::Local::now();
	data.insert(
		Value::String("generation_time".to_string()),
		Value::String(now.format("%Y-%m-%d %H:%M:%S %z").to_string()),
	);

	Ok(())
}
