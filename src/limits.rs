/// Longest accepted free-text field on a booking (name, phone, event, ...).
pub const MAX_FIELD_LEN: usize = 200;

/// Longest accepted hall name.
pub const MAX_HALL_NAME_LEN: usize = 64;

/// Most halls a deployment may configure.
pub const MAX_HALLS: usize = 64;

/// Largest journal frame payload accepted on write or replay. A booking is a
/// few hundred bytes; anything near this is a corrupt length header.
pub const MAX_JOURNAL_RECORD_LEN: usize = 64 * 1024;
