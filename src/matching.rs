use regex::{Regex, RegexBuilder};

use crate::model::{Application, MatchType};

pub fn compile_regex(pattern: &str) -> Result<Regex, regex::Error> {
	RegexBuilder::new(pattern).case_insensitive(true).build()
}

enum Rule {
	Exact(String),
	Contains(String),
	StartsWith(String),
	Regex(Regex),
}

impl Rule {
	fn matches(&self, folded: &str) -> bool {
		match self {
			Rule::Exact(p) => folded == p,
			Rule::Contains(p) => folded.contains(p.as_str()),
			Rule::StartsWith(p) => folded.starts_with(p.as_str()),
			Rule::Regex(re) => re.is_match(folded),
		}
	}
}

struct CompiledPattern {
	priority: i32,
	application_id: i64,
	pattern_id: i64,
	rule: Rule,
}

/// Classifies free-text application names against the registry's patterns.
pub struct ApplicationMatcher {
	applications: Vec<Application>,
	patterns: Vec<CompiledPattern>,
}

impl ApplicationMatcher {
	/// Compile the active patterns of active applications. Patterns whose
	/// regex does not compile are skipped.
	pub fn new(applications: Vec<Application>) -> Self {
		let mut patterns = Vec::new();
		for app in applications.iter().filter(|a| a.is_active) {
			for p in app.patterns.iter().filter(|p| p.is_active) {
				let folded = p.pattern.trim().to_lowercase();
				let rule = match p.match_type {
					MatchType::Exact => Rule::Exact(folded),
					MatchType::Contains => Rule::Contains(folded),
					MatchType::StartsWith => Rule::StartsWith(folded),
					MatchType::Regex => match compile_regex(p.pattern.trim()) {
						Ok(re) => Rule::Regex(re),
						Err(e) => {
							log::warn!(
								"skipping pattern {} of application '{}': {}",
								p.id,
								app.code,
								e
							);
							continue;
						}
					},
				};
				patterns.push(CompiledPattern {
					priority: p.priority,
					application_id: app.id,
					pattern_id: p.id,
					rule,
				});
			}
		}
		patterns.sort_by_key(|p| (p.priority, p.application_id, p.pattern_id));

		Self {
			applications,
			patterns,
		}
	}

	/// First application whose pattern matches `name`, in priority order.
	pub fn classify(&self, name: &str) -> Option<&Application> {
		let folded = name.trim().to_lowercase();
		if folded.is_empty() {
			return None;
		}
		let hit = self.patterns.iter().find(|p| p.rule.matches(&folded))?;
		self.applications
			.iter()
			.find(|a| a.id == hit.application_id)
	}
}
