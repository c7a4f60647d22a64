//! Pure validation of user-entered drafts.
//!
//! Each validator returns an ordered list of human-readable messages, one
//! per offending field; an empty list means the draft may be submitted.
//! An empty string and an absent value are the same thing here: drafts
//! default-construct to empty strings.

use crate::records::{BookingDraft, TeamDraft, UserDraft};

fn field_error(field: &str) -> String {
    format!("Try Again, You didn't enter a valid {field} field")
}

fn require(value: &str, field: &str, errors: &mut Vec<String>) {
    if value.is_empty() {
        errors.push(field_error(field));
    }
}

fn require_integer(value: &str, field: &str, errors: &mut Vec<String>) {
    if value.trim().parse::<i64>().is_err() {
        errors.push(field_error(field));
    }
}

pub fn validate_booking(draft: &BookingDraft) -> Vec<String> {
    let mut errors = Vec::new();
    require(&draft.password, "Password", &mut errors);
    require(&draft.user, "User", &mut errors);
    require(&draft.boat, "Boat", &mut errors);
    require(&draft.date, "Date", &mut errors);
    require(&draft.time, "Time", &mut errors);
    require_integer(&draft.duration, "Duration", &mut errors);
    // Repeat is optional but must be a known code when present.
    let repeat = draft.repeat.trim();
    if !repeat.is_empty()
        && !repeat
            .parse::<i64>()
            .is_ok_and(|code| (0..=4).contains(&code))
    {
        errors.push(field_error("Repeat"));
    }
    errors
}

pub fn validate_team(draft: &TeamDraft, on_create: bool) -> Vec<String> {
    let mut errors = Vec::new();
    require(&draft.password, "Password", &mut errors);
    require(&draft.team, "Team", &mut errors);
    require(&draft.title, "Title", &mut errors);
    if on_create {
        require(&draft.prefix, "Prefix", &mut errors);
    }
    errors
}

pub fn validate_user(draft: &UserDraft) -> Vec<String> {
    let mut errors = Vec::new();
    require(&draft.password, "Password", &mut errors);
    require(&draft.user, "User", &mut errors);
    require(&draft.name, "Name", &mut errors);
    errors
}
