//! The page-URL hash used in cache keys.
//!
//! This function is a wire-level agreement with the browser-side snippet:
//! both ends derive the same cache-key component from a URL, so the algorithm
//! must stay bit-identical to the JavaScript counterpart — `hash*31 +
//! charCodeAt` over UTF-16 code units, wrapped to signed 32 bits, absolute
//! value, base-36 lowercase. Collisions are tolerated; uniqueness comes from
//! the compound record key, not from the hash alone.

/// Character budget applied to reference content before hashing it for
/// `source_content_hash`.
pub const CONTENT_HASH_CHARS: usize = 5000;

/// Hash a page URL (or any string) to its base-36 cache-key component.
pub fn page_url_hash(input: &str) -> String {
  let mut hash: i32 = 0;
  for unit in input.encode_utf16() {
    hash = hash.wrapping_mul(31).wrapping_add(i32::from(unit));
  }
  to_base36(u64::from(hash.unsigned_abs()))
}

/// Hash the first [`CONTENT_HASH_CHARS`] characters of reference content.
/// Same algorithm as [`page_url_hash`], applied to content instead of a URL.
pub fn content_hash(content: &str) -> String {
  let excerpt = match content.char_indices().nth(CONTENT_HASH_CHARS) {
    Some((idx, _)) => &content[..idx],
    None => content,
  };
  page_url_hash(excerpt)
}

fn to_base36(mut value: u64) -> String {
  const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
  if value == 0 {
    return "0".to_owned();
  }
  let mut out = Vec::new();
  while value > 0 {
    out.push(DIGITS[(value % 36) as usize]);
    value /= 36;
  }
  out.reverse();
  String::from_utf8(out).expect("base-36 digits are ASCII")
}

#[cfg(test)]
mod tests {
  use super::*;

  // Reference vector shared with the JavaScript client. Any change here is
  // a wire break, not a refactor.
  #[test]
  fn matches_client_reference_vector() {
    assert_eq!(page_url_hash(""), "0");
    assert_eq!(page_url_hash("/"), "1b");
    assert_eq!(page_url_hash("a"), "2p");
    assert_eq!(page_url_hash("/pricing"), "4dikp");
    assert_eq!(page_url_hash("hello world"), "to5x38");
  }

  #[test]
  fn deterministic_across_calls() {
    let url = "https://example.com/docs/getting-started?ref=nav";
    assert_eq!(page_url_hash(url), page_url_hash(url));
  }

  #[test]
  fn long_input_wraps_like_signed_32_bit() {
    // Exercises the wrap-to-i32 and absolute-value steps.
    let long = "x".repeat(100);
    assert_eq!(page_url_hash(&long), "rsmuww");
  }

  #[test]
  fn content_hash_ignores_tail_beyond_budget() {
    let head = "b".repeat(CONTENT_HASH_CHARS);
    let padded = format!("{head}{}", "tail that must not matter");
    assert_eq!(content_hash(&head), content_hash(&padded));
  }

  #[test]
  fn content_hash_of_short_content_covers_it_all() {
    assert_ne!(content_hash("alpha"), content_hash("alphb"));
  }
}
