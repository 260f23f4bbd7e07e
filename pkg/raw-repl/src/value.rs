//! The dynamic value sum type shipped across the wire as interpreter source.
//!
//! spec.md §9 calls this "dynamic value marshalling": in a statically typed
//! host we can't hand the device an arbitrary object, so every argument and
//! every return value is restricted to the subset of values whose `repr()`
//! round-trips under the device's own `eval()` — numbers, strings, booleans,
//! `None`, and tuples/lists/dicts of the same. [`Literal::encode`] produces
//! that `repr()`-shaped source text; [`Literal::parse`] goes the other way,
//! turning a line the device printed back into a [`Literal`].
//!
//! Anything we can't make sense of (an object repr like `<Foo object at
//! 0x1234>`) collapses to [`Literal::None`], mirroring the `<…>` → `None`
//! rule from the source shell.

use crate::errors::ReftError;
use std::fmt::Write as _;

/// A value that can cross the wire both ways: encoded into call-site source
/// sent to the device, and decoded back out of whatever the device printed.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
	Int(i64),
	Float(f64),
	Str(String),
	Bool(bool),
	None,
	Tuple(Vec<Literal>),
	List(Vec<Literal>),
	/// Keys are always strings: that's the only key type the filesystem
	/// helpers ever hand back (e.g. `stat()` dicts).
	Dict(Vec<(String, Literal)>),
}

impl Literal {
	#[must_use]
	pub fn str(value: impl Into<String>) -> Self {
		Self::Str(value.into())
	}

	/// Render this value as interpreter source text, suitable for splicing
	/// straight into a call expression.
	#[must_use]
	pub fn encode(&self) -> String {
		let mut out = String::new();
		self.encode_into(&mut out);
		out
	}

	fn encode_into(&self, out: &mut String) {
		match self {
			Self::Int(i) => {
				let _ = write!(out, "{i}");
			}
			Self::Float(f) => {
				if f.fract() == 0.0 && f.is_finite() {
					let _ = write!(out, "{f:.1}");
				} else {
					let _ = write!(out, "{f}");
				}
			}
			Self::Str(s) => encode_str(s, out),
			Self::Bool(b) => out.push_str(if *b { "True" } else { "False" }),
			Self::None => out.push_str("None"),
			Self::Tuple(items) => {
				out.push('(');
				for (idx, item) in items.iter().enumerate() {
					if idx > 0 {
						out.push_str(", ");
					}
					item.encode_into(out);
				}
				if items.len() == 1 {
					out.push(',');
				}
				out.push(')');
			}
			Self::List(items) => {
				out.push('[');
				for (idx, item) in items.iter().enumerate() {
					if idx > 0 {
						out.push_str(", ");
					}
					item.encode_into(out);
				}
				out.push(']');
			}
			Self::Dict(entries) => {
				out.push('{');
				for (idx, (key, value)) in entries.iter().enumerate() {
					if idx > 0 {
						out.push_str(", ");
					}
					encode_str(key, out);
					out.push_str(": ");
					value.encode_into(out);
				}
				out.push('}');
			}
		}
	}

	/// Parse a single value out of whatever the device printed, the way
	/// `invoke_and_eval` must after reading back a helper's stdout.
	///
	/// Unrecognisable reprs (the `<…>` family: open file handles, bound
	/// methods, and so on) collapse to [`Literal::None`] rather than
	/// erroring, matching the source shell's behaviour.
	pub fn parse(text: &str) -> Result<Self, ReftError> {
		let trimmed = text.trim();
		if trimmed.starts_with('<') {
			return Ok(Self::None);
		}
		let mut chars = trimmed.chars().peekable();
		let value = parse_value(&mut chars)?;
		skip_ws(&mut chars);
		if chars.peek().is_some() {
			return Err(ReftError::ValueMarshalling(format!(
				"trailing data after value: {trimmed:?}"
			)));
		}
		Ok(value)
	}
}

fn encode_str(s: &str, out: &mut String) {
	out.push('\'');
	for ch in s.chars() {
		match ch {
			'\\' => out.push_str("\\\\"),
			'\'' => out.push_str("\\'"),
			'\n' => out.push_str("\\n"),
			'\r' => out.push_str("\\r"),
			'\t' => out.push_str("\\t"),
			other => out.push(other),
		}
	}
	out.push('\'');
}

type Chars<'a> = std::iter::Peekable<std::str::Chars<'a>>;

fn skip_ws(chars: &mut Chars<'_>) {
	while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
		chars.next();
	}
}

fn parse_value(chars: &mut Chars<'_>) -> Result<Literal, ReftError> {
	skip_ws(chars);
	match chars.peek().copied() {
		Some('\'') | Some('"') => parse_string(chars).map(Literal::Str),
		Some('[') => parse_sequence(chars, '[', ']').map(Literal::List),
		Some('(') => parse_tuple(chars),
		Some('{') => parse_dict(chars),
		Some(c) if c == '-' || c.is_ascii_digit() => parse_number(chars),
		Some(_) => parse_keyword(chars),
		Option::None => Err(ReftError::ValueMarshalling("empty value".to_owned())),
	}
}

fn parse_keyword(chars: &mut Chars<'_>) -> Result<Literal, ReftError> {
	let mut word = String::new();
	while matches!(chars.peek(), Some(c) if c.is_alphanumeric() || *c == '_') {
		word.push(chars.next().expect("peeked"));
	}
	match word.as_str() {
		"True" => Ok(Literal::Bool(true)),
		"False" => Ok(Literal::Bool(false)),
		"None" => Ok(Literal::None),
		other => Err(ReftError::ValueMarshalling(format!(
			"unrecognised literal keyword: {other:?}"
		))),
	}
}

fn parse_number(chars: &mut Chars<'_>) -> Result<Literal, ReftError> {
	let mut text = String::new();
	if matches!(chars.peek(), Some('-')) {
		text.push(chars.next().expect("peeked"));
	}
	let mut is_float = false;
	while let Some(&c) = chars.peek() {
		if c.is_ascii_digit() {
			text.push(c);
			chars.next();
		} else if (c == '.' || c == 'e' || c == 'E' || c == '+' || c == '-') && !text.is_empty() {
			is_float = true;
			text.push(c);
			chars.next();
		} else {
			break;
		}
	}
	if is_float {
		text.parse::<f64>()
			.map(Literal::Float)
			.map_err(|e| ReftError::ValueMarshalling(format!("bad float {text:?}: {e}")))
	} else {
		text.parse::<i64>()
			.map(Literal::Int)
			.map_err(|e| ReftError::ValueMarshalling(format!("bad int {text:?}: {e}")))
	}
}

fn parse_string(chars: &mut Chars<'_>) -> Result<String, ReftError> {
	let quote = chars.next().expect("caller checked quote present");
	let mut out = String::new();
	loop {
		match chars.next() {
			Some('\\') => match chars.next() {
				Some('n') => out.push('\n'),
				Some('r') => out.push('\r'),
				Some('t') => out.push('\t'),
				Some('\\') => out.push('\\'),
				Some(q) if q == quote => out.push(q),
				Some(other) => out.push(other),
				Option::None => {
					return Err(ReftError::ValueMarshalling(
						"unterminated escape in string literal".to_owned(),
					))
				}
			},
			Some(c) if c == quote => break,
			Some(c) => out.push(c),
			Option::None => {
				return Err(ReftError::ValueMarshalling(
					"unterminated string literal".to_owned(),
				))
			}
		}
	}
	Ok(out)
}

fn parse_sequence(chars: &mut Chars<'_>, open: char, close: char) -> Result<Vec<Literal>, ReftError> {
	let opened = chars.next();
	if opened != Some(open) {
		return Err(ReftError::ValueMarshalling(format!(
			"expected `{open}`, got {opened:?}"
		)));
	}
	let mut items = Vec::new();
	skip_ws(chars);
	if chars.peek() == Some(&close) {
		chars.next();
		return Ok(items);
	}
	loop {
		items.push(parse_value(chars)?);
		skip_ws(chars);
		match chars.next() {
			Some(',') => {
				skip_ws(chars);
				if chars.peek() == Some(&close) {
					chars.next();
					break;
				}
			}
			Some(c) if c == close => break,
			other => {
				return Err(ReftError::ValueMarshalling(format!(
					"expected `,` or `{close}`, got {other:?}"
				)))
			}
		}
	}
	Ok(items)
}

fn parse_tuple(chars: &mut Chars<'_>) -> Result<Literal, ReftError> {
	parse_sequence(chars, '(', ')').map(Literal::Tuple)
}

fn parse_dict(chars: &mut Chars<'_>) -> Result<Literal, ReftError> {
	let opened = chars.next();
	if opened != Some('{') {
		return Err(ReftError::ValueMarshalling(format!(
			"expected `{{`, got {opened:?}"
		)));
	}
	let mut entries = Vec::new();
	skip_ws(chars);
	if chars.peek() == Some(&'}') {
		chars.next();
		return Ok(Literal::Dict(entries));
	}
	loop {
		skip_ws(chars);
		let key = parse_string(chars)?;
		skip_ws(chars);
		match chars.next() {
			Some(':') => {}
			other => {
				return Err(ReftError::ValueMarshalling(format!(
					"expected `:` after dict key, got {other:?}"
				)))
			}
		}
		let value = parse_value(chars)?;
		entries.push((key, value));
		skip_ws(chars);
		match chars.next() {
			Some(',') => {
				skip_ws(chars);
				if chars.peek() == Some(&'}') {
					chars.next();
					break;
				}
			}
			Some('}') => break,
			other => {
				return Err(ReftError::ValueMarshalling(format!(
					"expected `,` or `}}`, got {other:?}"
				)))
			}
		}
	}
	Ok(Literal::Dict(entries))
}

#[cfg(test)]
mod unit_tests {
	use super::*;

	#[test]
	pub fn round_trips_scalars() {
		for (literal, expected_source) in [
			(Literal::Int(42), "42"),
			(Literal::Int(-7), "-7"),
			(Literal::Bool(true), "True"),
			(Literal::Bool(false), "False"),
			(Literal::None, "None"),
		] {
			assert_eq!(literal.encode(), expected_source);
			assert_eq!(Literal::parse(expected_source).unwrap(), literal);
		}
	}

	#[test]
	pub fn round_trips_float() {
		assert_eq!(Literal::Float(1.0).encode(), "1.0");
		assert_eq!(Literal::parse("1.0").unwrap(), Literal::Float(1.0));
		assert_eq!(Literal::parse("3.25").unwrap(), Literal::Float(3.25));
	}

	#[test]
	pub fn round_trips_strings_with_escapes() {
		let literal = Literal::str("hi\nthere\\'world'");
		let encoded = literal.encode();
		assert_eq!(Literal::parse(&encoded).unwrap(), literal);
	}

	#[test]
	pub fn round_trips_collections() {
		let literal = Literal::List(vec![Literal::Int(1), Literal::str("flash"), Literal::Bool(true)]);
		let encoded = literal.encode();
		assert_eq!(encoded, "[1, 'flash', True]");
		assert_eq!(Literal::parse(&encoded).unwrap(), literal);

		let single_tuple = Literal::Tuple(vec![Literal::Int(5)]);
		assert_eq!(single_tuple.encode(), "(5,)");
		assert_eq!(Literal::parse("(5,)").unwrap(), single_tuple);
	}

	#[test]
	pub fn round_trips_dict() {
		let literal = Literal::Dict(vec![
			("mode".to_owned(), Literal::Int(0o755)),
			("name".to_owned(), Literal::str("boot.py")),
		]);
		let encoded = literal.encode();
		assert_eq!(Literal::parse(&encoded).unwrap(), literal);
	}

	#[test]
	pub fn unprintable_repr_collapses_to_none() {
		assert_eq!(
			Literal::parse("<module 'os' from '/lib/os.py'>").unwrap(),
			Literal::None
		);
	}

	#[test]
	pub fn trailing_garbage_is_rejected() {
		assert!(Literal::parse("42 garbage").is_err());
	}
}
