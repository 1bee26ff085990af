use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum BonesError {
	#[error(transparent)]
	#[diagnostic(code(bones::io_error))]
	Io(#[from] std::io::Error),

	#[error("could not find config file: {path}")]
	#[diagnostic(
		code(bones::config_not_found),
		help("perhaps you are not in the project's root directory?")
	)]
	ConfigNotFound { path: String },

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(bones::config_parse),
		help("check that .nengobones.yml is valid YAML")
	)]
	ConfigParse(String),

	#[error("config file must define {key}")]
	#[diagnostic(code(bones::missing_mandatory_key))]
	MissingMandatoryKey { key: String },

	#[error("{key} should be a list, found '{value}'; did you forget to add '-' before each entry?")]
	#[diagnostic(code(bones::wrong_type))]
	WrongType { key: String, value: String },

	#[error("unknown license `{value}`; must be one of {allowed}")]
	#[diagnostic(code(bones::invalid_license))]
	InvalidLicense { value: String, allowed: String },

	#[error("config file must define both `{0}` and `{1}` or neither")]
	#[diagnostic(code(bones::unpaired_sections))]
	UnpairedSections(String, String),

	#[error("`{left}` and `{right}` must have the same `{field}` list")]
	#[diagnostic(code(bones::cross_section_mismatch))]
	CrossSectionMismatch {
		left: String,
		right: String,
		field: String,
	},

	#[error(
		"license classifiers are derived from the `license` option; remove manual entry \
		 '{value}' from setup_py.classifiers"
	)]
	#[diagnostic(code(bones::manual_classifier))]
	ManualClassifier { value: String },

	#[error("ci_scripts entry must define 'template' (for entry {entry})")]
	#[diagnostic(code(bones::missing_ci_template))]
	MissingCiTemplate { entry: String },

	#[error("template not found: `{0}`")]
	#[diagnostic(
		code(bones::template_not_found),
		help("bundled templates can be referenced as `templates/<name>` from overrides")
	)]
	TemplateNotFound(String),

	#[error("template rendering failed: {0}")]
	#[diagnostic(code(bones::template_render))]
	TemplateRender(String),

	#[error("`{tool}` failed:\n{output}")]
	#[diagnostic(code(bones::external_tool))]
	ExternalTool { tool: String, output: String },

	#[error("unknown section: `{0}`")]
	#[diagnostic(
		code(bones::unknown_section),
		help(
			"known sections: ci_scripts, codecov_yml, contributing_rst, contributors_rst, \
			 docs_conf_py, license_rst, manifest_in, pre_commit_config_yaml, pyproject_toml, \
			 setup_cfg, setup_py, travis_yml, version_py"
		)
	)]
	UnknownSection(String),
}

pub type BonesResult<T> = Result<T, BonesError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
