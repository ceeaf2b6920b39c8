//! Classification of asynchronous X protocol errors.
//!
//! Requests are fired without waiting for replies, so the server may report an
//! error long after the window it refers to has gone away. Those races are
//! expected and ignored; anything else indicates a bug and is fatal.

// Core protocol error codes
pub const BAD_WINDOW: u8 = 3;
pub const BAD_MATCH: u8 = 8;
pub const BAD_DRAWABLE: u8 = 9;
pub const BAD_ACCESS: u8 = 10;

// Core protocol request opcodes
pub const X_CONFIGURE_WINDOW: u8 = 12;
pub const X_GRAB_BUTTON: u8 = 28;
pub const X_GRAB_KEY: u8 = 33;
pub const X_SET_INPUT_FOCUS: u8 = 42;
pub const X_COPY_AREA: u8 = 62;
pub const X_POLY_SEGMENT: u8 = 66;
pub const X_POLY_FILL_RECTANGLE: u8 = 70;
pub const X_POLY_TEXT8: u8 = 74;
pub const X_IMAGE_TEXT8: u8 = 76;

/// What to do with a protocol error reported by the server
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorClass {
    /// The target disappeared between request and reply
    Ignored,
    /// Unrecognised protocol violation
    Fatal,
}

/// A protocol error as reported by the server
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ProtocolError {
    pub request_code: u8,
    pub error_code: u8,
    pub resource_id: u32,
}

impl ProtocolError {
    pub fn class(&self) -> ErrorClass {
        classify(self.request_code, self.error_code)
    }
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fatal error: request code={}, error code={}, resource={:#x}",
            self.request_code, self.error_code, self.resource_id
        )
    }
}

impl std::error::Error for ProtocolError {}

pub fn classify(request_code: u8, error_code: u8) -> ErrorClass {
    let benign = match (request_code, error_code) {
        (_, BAD_WINDOW) => true,
        (X_SET_INPUT_FOCUS, BAD_MATCH) => true,
        (X_CONFIGURE_WINDOW, BAD_MATCH) => true,
        (X_POLY_TEXT8, BAD_DRAWABLE) => true,
        (X_IMAGE_TEXT8, BAD_DRAWABLE) => true,
        (X_POLY_FILL_RECTANGLE, BAD_DRAWABLE) => true,
        (X_POLY_SEGMENT, BAD_DRAWABLE) => true,
        (X_COPY_AREA, BAD_DRAWABLE) => true,
        (X_GRAB_BUTTON, BAD_ACCESS) => true,
        (X_GRAB_KEY, BAD_ACCESS) => true,
        _ => false,
    };

    if benign {
        ErrorClass::Ignored
    } else {
        ErrorClass::Fatal
    }
}
