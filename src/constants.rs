use bytes_utils::Str;

pub(crate) const LF: u8 = b'\n';
pub(crate) const CR: u8 = b'\r';

pub(crate) const BOM_CHAR: char = '\u{FEFF}';

const REPLACEMENT_LEN: usize = char::REPLACEMENT_CHARACTER.len_utf8();
pub(crate) const REPLACEMENT: &[u8; REPLACEMENT_LEN] = &{
    let mut buf = [0u8; REPLACEMENT_LEN];
    char::REPLACEMENT_CHARACTER.encode_utf8(&mut buf);
    buf
};

pub(crate) const EVENT_PREFIX: &str = "event: ";
pub(crate) const DATA_PREFIX: &str = "data: ";

pub(crate) const MESSAGE_STR: Str = Str::from_static("message");
pub(crate) const DONE_EVENT: &str = "done";
pub(crate) const ERROR_EVENT: &str = "error";
pub(crate) const FILE_CHANGES_EVENT: &str = "file_changes";

pub(crate) const DEFAULT_OPERATION: &str = "modify";

/// Forwarded to `on_error` when an `error` frame carries no message
pub const GENERIC_ERROR_MESSAGE: &str = "stream error";
/// Forwarded to `on_error` when the source is exhausted before `done` or `error`
pub const UNEXPECTED_END_MESSAGE: &str = "stream ended unexpectedly";
