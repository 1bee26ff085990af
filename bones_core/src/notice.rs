use std::path::Path;
use std::path::PathBuf;

use ignore::WalkBuilder;

use crate::BonesResult;

/// Result of scanning source files for the license notice.
#[derive(Debug, Default)]
pub struct NoticeReport {
	/// Number of files scanned.
	pub checked: usize,
	/// Number of files missing the notice.
	pub missing: usize,
	/// Number of files the notice was inserted into (only with `fix`).
	pub fixed: usize,
	/// Files that were missing the notice, in walk order.
	pub missing_files: Vec<PathBuf>,
}

/// Convert the license text into a comment-per-line header block.
#[must_use]
pub fn notice_header(text: &str) -> String {
	let mut header = String::with_capacity(text.len() + 64);
	for line in text.lines() {
		if line.trim().is_empty() {
			header.push_str("#\n");
		} else {
			header.push_str("# ");
			header.push_str(line);
			header.push('\n');
		}
	}

	header
}

/// Insert the notice header into file content, unless it is already there.
///
/// Shebang and encoding lines stay at the top; the header goes immediately
/// after them, separated from the rest of the file by a blank line.
#[must_use]
pub fn add_notice(header: &str, content: &str) -> String {
	let mut prefix_len = 0;
	for line in content.lines() {
		if line.starts_with("#!") || (line.starts_with('#') && line.contains("coding")) {
			prefix_len += line.len() + 1;
		} else {
			break;
		}
	}
	let (prefix, rest) = content.split_at(prefix_len.min(content.len()));

	if rest.starts_with(header) {
		return content.to_string();
	}

	let mut result = String::with_capacity(content.len() + header.len() + 1);
	result.push_str(prefix);
	result.push_str(header);
	if !rest.is_empty() && !rest.starts_with('\n') {
		result.push('\n');
	}
	result.push_str(rest);

	result
}

/// Check (and optionally insert) the license notice in all `.py` files
/// under `root`. Respects `.gitignore` rules during the walk.
pub fn check_notice(root: &Path, text: &str, fix: bool) -> BonesResult<NoticeReport> {
	let header = notice_header(text);
	let mut report = NoticeReport::default();

	for result in WalkBuilder::new(root).build() {
		let entry = match result {
			Ok(entry) => entry,
			Err(e) => {
				tracing::warn!("skipping unreadable path during notice scan: {e}");
				continue;
			}
		};

		if !entry.file_type().is_some_and(|ft| ft.is_file()) {
			continue;
		}
		if entry.path().extension().and_then(|ext| ext.to_str()) != Some("py") {
			continue;
		}

		report.checked += 1;
		let current = std::fs::read_to_string(entry.path())?;
		let modified = add_notice(&header, &current);

		if modified == current {
			continue;
		}

		report.missing += 1;
		report.missing_files.push(entry.path().to_path_buf());
		if fix {
			std::fs::write(entry.path(), modified)?;
			report.fixed += 1;
		}
	}

	Ok(report)
}
