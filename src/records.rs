use serde::{Deserialize, Serialize};

/// Recurrence of a booking. The wire format is the server's integer code;
/// `None` is omitted from payloads entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum Repeat {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Repeat {
    pub fn is_none(&self) -> bool {
        matches!(self, Repeat::None)
    }
}

impl From<Repeat> for i64 {
    fn from(repeat: Repeat) -> i64 {
        match repeat {
            Repeat::None => 0,
            Repeat::Daily => 1,
            Repeat::Weekly => 2,
            Repeat::Monthly => 3,
            Repeat::Yearly => 4,
        }
    }
}

impl TryFrom<i64> for Repeat {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Repeat::None),
            1 => Ok(Repeat::Daily),
            2 => Ok(Repeat::Weekly),
            3 => Ok(Repeat::Monthly),
            4 => Ok(Repeat::Yearly),
            other => Err(format!("unknown repeat code {other}")),
        }
    }
}

/// One entry of a booking's server-side activity log.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingLog {
    pub date: i64,
    pub state: String,
    pub log: String,
}

/// A reservation of one boat for one time slot.
///
/// `state`, `message`, `logs`, `next` and the `book*`/`*id`/`retry` fields
/// are server-owned: the client round-trips them on update and never edits
/// them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Booking {
    pub id: i64,
    pub team: String,
    pub boat: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub fallback: String,
    pub date: String,
    pub time: String,
    pub duration: i64,
    pub user: String,
    pub password: String,
    pub comment: String,
    #[serde(skip_serializing_if = "Repeat::is_none")]
    pub repeat: Repeat,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookingid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boatid: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<i64>,
    pub usercomment: bool,
    #[serde(rename = "whatsapp", skip_serializing_if = "String::is_empty")]
    pub whatsapp_to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookstart: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookdur: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<BookingLog>,
}

/// A tenant: one group of rowers sharing credentials and settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Team {
    pub id: i64,
    pub team: String,
    pub admin: bool,
    pub password: String,
    pub title: String,
    pub addtime: bool,
    pub whatsapp: bool,
    pub whatsappid: String,
    pub whatsappto: String,
    pub qrcode: String,
    pub prefix: String,
    pub planner: bool,
}

/// A member known to the fleet backend, kept mainly so the client can
/// autofill credentials on new bookings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: i64,
    pub team: String,
    pub user: String,
    pub password: String,
    pub name: String,
    pub lastused: i64,
}

/// A previously used notification recipient.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyTarget {
    pub team: String,
    pub to: String,
    pub lastused: i64,
}

/// Server-side configuration, fetched on mount and after every
/// login/logout. Never mutated locally.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub version: String,
    pub name: String,
    pub team: String,
    pub interval: i64,
    pub prefix: String,
    pub clubid: String,
    pub admin: bool,
    #[serde(rename = "myfleetVersion")]
    pub myfleet_version: String,
    pub timezone: String,
    pub title: String,
    pub whatsapp: bool,
    pub whatsappid: String,
    pub whatsappto: String,
    #[serde(rename = "authRequired")]
    pub auth_required: bool,
    pub planner: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginRequest {
    pub team: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct LoginReply {
    pub team: String,
    pub password: String,
    pub status: Option<String>,
}

/// A user-entered booking candidate. Every field is the raw text of the
/// edit buffer; validation and normalization happen before it is coerced
/// into a [`Booking`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BookingDraft {
    pub id: Option<i64>,
    pub boat: String,
    pub fallback: String,
    pub date: String,
    pub time: String,
    pub duration: String,
    pub user: String,
    pub password: String,
    pub comment: String,
    pub whatsapp_to: String,
    pub repeat: String,
}

impl BookingDraft {
    pub fn from_record(record: &Booking) -> Self {
        Self {
            id: Some(record.id),
            boat: record.boat.clone(),
            fallback: record.fallback.clone(),
            date: record.date.clone(),
            time: record.time.clone(),
            duration: record.duration.to_string(),
            user: record.user.clone(),
            password: record.password.clone(),
            comment: record.comment.clone(),
            whatsapp_to: record.whatsapp_to.clone(),
            repeat: match record.repeat {
                Repeat::None => String::new(),
                other => i64::from(other).to_string(),
            },
        }
    }

    /// Coerce into a wire record for creation. The draft must have passed
    /// validation; non-numeric text degrades to the field default here.
    /// The server recomputes `usercomment` on create exactly like this.
    pub fn to_record(&self) -> Booking {
        Booking {
            id: self.id.unwrap_or(0),
            boat: self.boat.clone(),
            fallback: self.fallback.clone(),
            date: self.date.clone(),
            time: self.time.clone(),
            duration: self.duration.trim().parse().unwrap_or(0),
            user: self.user.clone(),
            password: self.password.clone(),
            comment: self.comment.clone(),
            whatsapp_to: self.whatsapp_to.clone(),
            repeat: parse_repeat(&self.repeat).unwrap_or_default(),
            usercomment: !self.comment.trim().is_empty(),
            ..Booking::default()
        }
    }

    /// Coerce into a wire record for an update of `previous`, carrying the
    /// server-owned fields over unchanged and computing the sticky
    /// `usercomment` flag: once a user has ever touched the comment, or the
    /// comment text actually changed, the flag stays true.
    pub fn to_update_record(&self, previous: &Booking) -> Booking {
        let mut record = self.to_record();
        record.id = previous.id;
        record.team = previous.team.clone();
        record.usercomment = previous.usercomment || previous.comment != record.comment;
        record.state = previous.state.clone();
        record.message = previous.message.clone();
        record.bookingid = previous.bookingid.clone();
        record.boatid = previous.boatid.clone();
        record.next = previous.next;
        record.retry = previous.retry;
        record.bookstart = previous.bookstart;
        record.bookdur = previous.bookdur;
        record.logs = previous.logs.clone();
        record
    }
}

/// A user-entered team candidate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TeamDraft {
    pub id: Option<i64>,
    pub team: String,
    pub password: String,
    pub title: String,
    pub prefix: String,
    pub whatsapp_to: String,
    pub admin: bool,
    pub addtime: bool,
    pub whatsapp: bool,
    pub planner: bool,
}

impl TeamDraft {
    pub fn from_record(record: &Team) -> Self {
        Self {
            id: Some(record.id),
            team: record.team.clone(),
            password: record.password.clone(),
            title: record.title.clone(),
            prefix: record.prefix.clone(),
            whatsapp_to: record.whatsappto.clone(),
            admin: record.admin,
            addtime: record.addtime,
            whatsapp: record.whatsapp,
            planner: record.planner,
        }
    }

    pub fn to_record(&self) -> Team {
        Team {
            id: self.id.unwrap_or(0),
            team: self.team.clone(),
            admin: self.admin,
            password: self.password.clone(),
            title: self.title.clone(),
            addtime: self.addtime,
            whatsapp: self.whatsapp,
            whatsappto: self.whatsapp_to.clone(),
            prefix: self.prefix.clone(),
            planner: self.planner,
            ..Team::default()
        }
    }

    /// Pairing state (`whatsappid`, `qrcode`) is server-owned and carried
    /// over from the record being edited.
    pub fn to_update_record(&self, previous: &Team) -> Team {
        let mut record = self.to_record();
        record.id = previous.id;
        record.whatsappid = previous.whatsappid.clone();
        record.qrcode = previous.qrcode.clone();
        record
    }
}

/// A user-entered member candidate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserDraft {
    pub id: Option<i64>,
    pub team: String,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl UserDraft {
    pub fn from_record(record: &User) -> Self {
        Self {
            id: Some(record.id),
            team: record.team.clone(),
            name: record.name.clone(),
            user: record.user.clone(),
            password: record.password.clone(),
        }
    }

    pub fn to_record(&self) -> User {
        User {
            id: self.id.unwrap_or(0),
            team: self.team.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            name: self.name.clone(),
            lastused: 0,
        }
    }
}

fn parse_repeat(raw: &str) -> Option<Repeat> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(Repeat::None);
    }
    trimmed
        .parse::<i64>()
        .ok()
        .and_then(|code| Repeat::try_from(code).ok())
}
