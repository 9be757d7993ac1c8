//! URI templates compiled into anchored matchers.

// ----------

use std::{
	cmp::Ordering,
	fmt::{self, Display},
	hash::{Hash, Hasher},
	iter::Peekable,
	str::Chars,
};

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;

use crate::ImplError;

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------

const DEFAULT_VARIABLE_REGEX: &str = "[^/]+?";
const REMAINDER_REGEX: &str = "(/.*)?";

// Characters of the literal parts of a template that must be percent-encoded to
// match the raw request path. The '%' itself is left intact so already encoded
// octets are not encoded twice.
const LITERAL_SET: &AsciiSet = &CONTROLS
	.add(b' ')
	.add(b'"')
	.add(b'#')
	.add(b'<')
	.add(b'>')
	.add(b'?')
	.add(b'`')
	.add(b'^')
	.add(b'|')
	.add(b'\\')
	.add(b'[')
	.add(b']');

// --------------------------------------------------
// UriPattern

/// A compiled URI template.
///
/// A template consists of literal characters and variables. A variable is either
/// `{name}`, matching a single path segment, or `{name:regex}`, matching whatever
/// the regex matches, including path separators.
///
/// The compiled matcher is anchored at the beginning of the path and always ends with
/// an optional remainder group. Thus, a pattern either consumes the whole path or
/// leaves a remainder that starts with a `/`.
///
/// ```
/// use restive::pattern::UriPattern;
///
/// let pattern = UriPattern::compile("/books/{id}").unwrap();
///
/// let uri_match = pattern.match_path("/books/42/chapters").unwrap();
/// assert_eq!(uri_match.values(), ["42"]);
/// assert_eq!(uri_match.remainder(), Some("/chapters"));
/// assert!(!uri_match.is_terminal());
/// ```
///
/// Patterns are ordered by their specificity. A pattern with more literal characters
/// comes first. Among the patterns with the same number of literal characters, the one
/// with fewer variables comes first.
#[derive(Debug, Clone)]
pub struct UriPattern {
	template: Box<str>,
	regex_string: Box<str>,
	regex: Regex,
	names: Box<[Box<str>]>,
	group_indices: Box<[usize]>,
	remainder_index: usize,
	literal_chars: usize,
}

impl UriPattern {
	pub fn compile(template: &str) -> Result<Self, UriTemplateError> {
		let normalized_template = normalize_template(template);
		let ParsedTemplate {
			regex_string,
			named_regex_string,
			names,
			literal_chars,
		} = parse_template(&normalized_template)?;

		let regex = Regex::new(&format!("^{}$", named_regex_string))?;

		let mut group_indices = vec![0; names.len()];
		let mut remainder_index = 0;
		for (index, some_name) in regex.capture_names().enumerate() {
			let Some(name) = some_name else {
				continue;
			};

			if name == REMAINDER_GROUP_NAME {
				remainder_index = index;
			} else if let Some(position) = name
				.strip_prefix(VARIABLE_GROUP_PREFIX)
				.and_then(|position| position.parse::<usize>().ok())
			{
				group_indices[position] = index;
			}
		}

		Ok(Self {
			template: template.into(),
			regex_string: regex_string.into(),
			regex,
			names: names.into(),
			group_indices: group_indices.into(),
			remainder_index,
			literal_chars,
		})
	}

	/// Returns the template the pattern was compiled from.
	#[inline(always)]
	pub fn template(&self) -> &str {
		&self.template
	}

	/// Returns the regular expression of the pattern, without anchors.
	#[inline(always)]
	pub fn regex(&self) -> &str {
		&self.regex_string
	}

	/// Returns the variable names in the order of their appearance.
	#[inline(always)]
	pub fn names(&self) -> &[Box<str>] {
		&self.names
	}

	#[inline(always)]
	pub fn literal_chars(&self) -> usize {
		self.literal_chars
	}

	#[inline(always)]
	pub fn group_count(&self) -> usize {
		self.names.len()
	}

	/// Matches the raw (percent-encoded) path.
	///
	/// Returns `None` when the path doesn't start with the pattern.
	pub fn match_path(&self, path: &str) -> Option<UriMatch> {
		let captures = self.regex.captures(path)?;

		let values = self
			.group_indices
			.iter()
			.map(|index| {
				captures
					.get(*index)
					.map_or_else(String::new, |value| value.as_str().to_owned())
			})
			.collect();

		let some_remainder = captures
			.get(self.remainder_index)
			.map(|remainder| remainder.as_str())
			.filter(|remainder| !remainder.is_empty())
			.map(ToOwned::to_owned);

		Some(UriMatch {
			values,
			some_remainder,
		})
	}

	/// Compares only the specificity of the patterns: the number of literal characters,
	/// then the number of variables. Unlike [`Ord`], structurally different patterns
	/// may be equal.
	pub fn compare_specificity(&self, other: &Self) -> Ordering {
		other
			.literal_chars
			.cmp(&self.literal_chars)
			.then_with(|| self.names.len().cmp(&other.names.len()))
	}

	/// Checks whether the pattern consumes the whole `path`.
	#[inline]
	pub fn is_full_match(&self, path: &str) -> bool {
		self
			.match_path(path)
			.is_some_and(|uri_match| uri_match.is_terminal())
	}
}

impl PartialEq for UriPattern {
	#[inline]
	fn eq(&self, other: &Self) -> bool {
		self.regex_string == other.regex_string
	}
}

impl Eq for UriPattern {}

impl Hash for UriPattern {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.regex_string.hash(state)
	}
}

impl PartialOrd for UriPattern {
	#[inline]
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for UriPattern {
	fn cmp(&self, other: &Self) -> Ordering {
		self
			.compare_specificity(other)
			.then_with(|| self.regex_string.cmp(&other.regex_string))
	}
}

impl Display for UriPattern {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.template)
	}
}

// --------------------------------------------------
// UriMatch

/// The result of a successful [`UriPattern::match_path()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriMatch {
	values: Vec<String>,
	some_remainder: Option<String>,
}

impl UriMatch {
	/// Returns the raw values of the pattern's variables.
	#[inline(always)]
	pub fn values(&self) -> &[String] {
		&self.values
	}

	/// Returns the part of the path that the pattern didn't consume.
	#[inline(always)]
	pub fn remainder(&self) -> Option<&str> {
		self.some_remainder.as_deref()
	}

	/// Returns the length of the consumed part of the matched path.
	#[inline]
	pub(crate) fn consumed_len(&self, path: &str) -> usize {
		path.len() - self.some_remainder.as_ref().map_or(0, String::len)
	}

	/// Checks whether the path was consumed fully. A remainder of a single `/` counts
	/// as fully consumed.
	#[inline]
	pub fn is_terminal(&self) -> bool {
		is_terminal(self.remainder())
	}

	#[inline(always)]
	pub(crate) fn into_parts(self) -> (Vec<String>, Option<String>) {
		(self.values, self.some_remainder)
	}
}

#[inline]
pub(crate) fn is_terminal(some_remainder: Option<&str>) -> bool {
	matches!(some_remainder, None | Some("/"))
}

// --------------------------------------------------
// UriTemplateError

/// An error returned when a URI template cannot be compiled.
#[derive(Debug, ImplError)]
pub enum UriTemplateError {
	#[error("template '{0}' has an unclosed variable")]
	UnclosedVariable(Box<str>),
	#[error("template '{0}' has an unexpected '}}'")]
	UnexpectedClosingBrace(Box<str>),
	#[error("template '{0}' has a variable with an empty name")]
	EmptyVariableName(Box<str>),
	#[error("invalid variable name '{0}'")]
	InvalidVariableName(Box<str>),
	#[error("duplicate variable name '{0}'")]
	DuplicateVariableName(Box<str>),
	#[error(transparent)]
	InvalidRegex(#[from] regex::Error),
}

// --------------------------------------------------------------------------------

const VARIABLE_GROUP_PREFIX: &str = "__uri_variable_";
const REMAINDER_GROUP_NAME: &str = "__uri_remainder";

// Adds the leading '/' and removes the trailing one. The root template "/"
// becomes empty.
fn normalize_template(template: &str) -> String {
	let template = template.trim();
	let mut normalized = String::with_capacity(template.len() + 1);

	if !template.starts_with('/') {
		normalized.push('/');
	}

	normalized.push_str(template);

	if normalized.ends_with('/') {
		normalized.pop();
	}

	normalized
}

struct ParsedTemplate {
	regex_string: String,
	named_regex_string: String,
	names: Vec<Box<str>>,
	literal_chars: usize,
}

fn parse_template(template: &str) -> Result<ParsedTemplate, UriTemplateError> {
	let mut regex_string = String::with_capacity(template.len() + REMAINDER_REGEX.len());
	let mut named_regex_string = String::with_capacity(regex_string.capacity() * 2);
	let mut names = Vec::<Box<str>>::new();
	let mut literal_chars = 0;

	let mut chars = template.chars().peekable();
	let mut literal = String::new();

	while let Some(ch) = chars.next() {
		match ch {
			'{' => {
				push_literal(&mut literal, &mut regex_string, &mut named_regex_string);

				let variable = split_off_variable(&mut chars)
					.ok_or_else(|| UriTemplateError::UnclosedVariable(template.into()))?;

				let (name, some_regex) = match variable.split_once(':') {
					Some((name, regex)) => (name, Some(regex.trim())),
					None => (variable.as_str(), None),
				};

				let name = name.trim();
				if name.is_empty() {
					return Err(UriTemplateError::EmptyVariableName(template.into()));
				}

				if !name
					.chars()
					.all(|ch| ch.is_alphanumeric() || matches!(ch, '-' | '_' | '.'))
				{
					return Err(UriTemplateError::InvalidVariableName(name.into()));
				}

				if names.iter().any(|existing_name| existing_name.as_ref() == name) {
					return Err(UriTemplateError::DuplicateVariableName(name.into()));
				}

				let regex = some_regex
					.filter(|regex| !regex.is_empty())
					.unwrap_or(DEFAULT_VARIABLE_REGEX);

				regex_string.push('(');
				regex_string.push_str(regex);
				regex_string.push(')');

				named_regex_string.push_str(&format!(
					"(?P<{}{}>{})",
					VARIABLE_GROUP_PREFIX,
					names.len(),
					regex
				));

				names.push(name.into());
			}
			'}' => return Err(UriTemplateError::UnexpectedClosingBrace(template.into())),
			_ => {
				literal_chars += 1;
				literal.push(ch);
			}
		}
	}

	push_literal(&mut literal, &mut regex_string, &mut named_regex_string);

	regex_string.push_str(REMAINDER_REGEX);
	named_regex_string.push_str(&format!("(?P<{}>/.*)?", REMAINDER_GROUP_NAME));

	Ok(ParsedTemplate {
		regex_string,
		named_regex_string,
		names,
		literal_chars,
	})
}

fn push_literal(literal: &mut String, regex_string: &mut String, named_regex_string: &mut String) {
	if literal.is_empty() {
		return;
	}

	let encoded_literal = utf8_percent_encode(literal, LITERAL_SET).to_string();
	let escaped_literal = regex::escape(&encoded_literal);

	regex_string.push_str(&escaped_literal);
	named_regex_string.push_str(&escaped_literal);

	literal.clear();
}

// Returns the contents of the variable up to its closing brace. Braces of the
// quantifiers in a variable's regex are balanced.
fn split_off_variable(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
	let mut variable = String::new();
	let mut depth = 1; // We are already inside the opened '{' brace.
	let mut unescaped = true;

	for ch in chars.by_ref() {
		match ch {
			'{' if unescaped => depth += 1,
			'}' if unescaped => {
				depth -= 1;
				if depth == 0 {
					return Some(variable);
				}
			}
			'\\' if unescaped => {
				variable.push(ch);
				unescaped = false;

				continue;
			}
			_ => {}
		}

		variable.push(ch);
		unescaped = true;
	}

	None
}

// --------------------------------------------------------------------------------
// --------------------------------------------------------------------------------
