//! Text normalisation for registry fields.
//!
//! The access-control feed hands us free text typed at a badge terminal.
//! Registry columns only ever hold letters separated by single spaces, or the
//! [`NOT_AVAILABLE`] sentinel when nothing usable is left.

/// Placeholder stored for a missing or unusable text field.
pub const NOT_AVAILABLE: &str = "N/A";

/// Reduce `text` to letters separated by single spaces.
///
/// Digits are deleted outright, so `J0hn` becomes `Jhn`. Any other character
/// that is neither a letter nor whitespace (punctuation, symbols, control
/// characters) ends the current word. Runs of separators collapse to one space
/// and the result is trimmed. Returns [`NOT_AVAILABLE`] if nothing is left,
/// or if `text` already is the sentinel.
pub fn clean_text(text: &str) -> String {
  if text.trim() == NOT_AVAILABLE {
    return NOT_AVAILABLE.to_owned();
  }

  let spaced: String = text
    .chars()
    .filter(|c| !c.is_numeric())
    .map(|c| if c.is_alphabetic() { c } else { ' ' })
    .collect();

  let cleaned = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
  if cleaned.is_empty() {
    NOT_AVAILABLE.to_owned()
  } else {
    cleaned
  }
}

/// Split a full name into `(first_name, last_name)`.
///
/// The last whitespace-separated token is the last name and everything before
/// it is the first name. Multi-word surnames are therefore split wrongly
/// ("Jean de la Fontaine" gives last name "Fontaine"); downstream consumers
/// rely on exactly this split.
pub fn split_full_name(full_name: &str) -> (String, String) {
  let tokens: Vec<&str> = full_name.split_whitespace().collect();

  match tokens.as_slice() {
    [] | [NOT_AVAILABLE] => (NOT_AVAILABLE.to_owned(), NOT_AVAILABLE.to_owned()),
    [only] => (clean_text(only), NOT_AVAILABLE.to_owned()),
    [first @ .., last] => (clean_text(&first.join(" ")), clean_text(last)),
  }
}

/// Normalise an optional raw group name into a department or company.
pub fn clean_affiliation(raw_group: Option<&str>) -> String {
  clean_text(raw_group.unwrap_or_default())
}
