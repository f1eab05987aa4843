// Identity resolution for Evolution gateway records.
//
// The gateway exposes the same human contact under several inconsistent
// identifiers: a phone JID, an opaque LID, a group id, or an alternate
// remote JID field. Everything here collapses a record's candidates into
// one canonical phone-based key, or rejects the record.

use once_cell::sync::Lazy;
use regex::Regex;

use super::jid;

static NON_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D").expect("valid regex"));

/// Accepted digit-count range for a phone number (BR plus basic
/// international formats).
pub const MIN_PHONE_DIGITS: usize = 10;
pub const MAX_PHONE_DIGITS: usize = 15;

/// Drop any `@...` suffix, then every non-digit character.
pub fn strip_digits(id: &str) -> String {
    let local = id.split('@').next().unwrap_or(id);
    NON_DIGIT.replace_all(local, "").into_owned()
}

fn is_valid_phone(digits: &str) -> bool {
    (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len())
}

/// Resolve a record's identifier candidates to a canonical JID.
///
/// Candidates are tried in the order given, in two passes. The first
/// pass returns any candidate already carrying the standard user suffix,
/// verbatim and without re-validation. The second pass recovers what it
/// can: group ids pass through untouched, LIDs are never a resolution
/// target, and anything else must clean down to a plausible phone
/// number. Returns None when no candidate qualifies; callers drop the
/// record in that case.
pub fn resolve_phone_jid(candidates: &[Option<&str>]) -> Option<String> {
    for id in candidates.iter().flatten() {
        if id.ends_with(jid::USER_SUFFIX) {
            return Some((*id).to_string());
        }
    }

    for id in candidates.iter().flatten() {
        if id.ends_with(jid::GROUP_SUFFIX) {
            return Some((*id).to_string());
        }
        if id.contains(jid::LID_SUFFIX) {
            continue;
        }
        let digits = strip_digits(id);
        if is_valid_phone(&digits) {
            return Some(format!("{}{}", digits, jid::USER_SUFFIX));
        }
    }

    None
}

/// Canonicalize a remote JID before addressing a gateway request at it.
///
/// Individual chats must always be addressed by their phone JID, whatever
/// shape the caller holds (LID, bare number, formatted number). Groups
/// and newsletters are used as-is.
pub fn canonicalize_remote_jid(id: &str) -> String {
    if id.contains(jid::GROUP_SUFFIX) || id.contains(jid::NEWSLETTER_SUFFIX) {
        return id.to_string();
    }

    let digits = NON_DIGIT.replace_all(id, "");
    if digits.len() >= MIN_PHONE_DIGITS {
        format!("{}{}", digits, jid::USER_SUFFIX)
    } else {
        id.to_string()
    }
}
