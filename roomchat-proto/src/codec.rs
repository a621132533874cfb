//! Serialization and deserialization for the `RoomChat` wire protocol.
//!
//! Envelopes travel as JSON text frames. Decoding is lenient about extra
//! fields (newer peers may add them) but strict about the `type` tag and
//! the required `room` field.

use crate::envelope::Envelope;

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The envelope is missing a required field and cannot be sent.
    #[error("encoding error: {0}")]
    Encoding(String),
    /// The payload is not a well-formed envelope.
    #[error("decoding error: {0}")]
    Decoding(String),
}

/// Encodes an [`Envelope`] into its JSON wire representation.
///
/// Output is deterministic: the `type` tag comes first, followed by the
/// envelope's fields in declaration order.
///
/// # Errors
///
/// Returns `CodecError::Encoding` if the envelope has an empty `room`.
pub fn encode(envelope: &Envelope) -> Result<String, CodecError> {
    if envelope.room().is_empty() {
        return Err(CodecError::Encoding(format!(
            "{} envelope is missing its room",
            envelope.kind()
        )));
    }
    serde_json::to_string(envelope).map_err(|e| CodecError::Encoding(e.to_string()))
}

/// Decodes an [`Envelope`] from a JSON text frame.
///
/// # Errors
///
/// Returns `CodecError::Decoding` if the text is not valid JSON, the `type`
/// tag is missing or unrecognized, or the `room` field is absent or empty.
pub fn decode(text: &str) -> Result<Envelope, CodecError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| CodecError::Decoding(e.to_string()))?;
    if envelope.room().is_empty() {
        return Err(CodecError::Decoding(format!(
            "{} envelope has an empty room",
            envelope.kind()
        )));
    }
    Ok(envelope)
}
