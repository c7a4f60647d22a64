//! Canonicalization of booking drafts before submission.
//!
//! Normalization is pure (references are passed in) and idempotent:
//! applying it twice yields the same draft as applying it once.

use crate::records::{BookingDraft, User};

/// Upper-case the user name and, when it matches a known member
/// case-insensitively, carry that member's stored password into the draft.
/// The autofill is a deliberate UX shortcut of the original client, not a
/// security boundary.
pub fn normalize_booking(mut draft: BookingDraft, users: &[User]) -> BookingDraft {
    draft.user = draft.user.to_uppercase();
    if let Some(known) = users
        .iter()
        .find(|user| user.user.eq_ignore_ascii_case(&draft.user))
        && known.password != draft.password
    {
        draft.password = known.password.clone();
    }
    draft
}
