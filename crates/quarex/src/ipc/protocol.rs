//! Wire protocol between the parent process and quarex workers.
//!
//! Uses length-prefixed rkyv messages over stdin/stdout.
//! Format: 4-byte length (u32 LE) + rkyv-encoded message.
//!
//! Only plain data crosses the process boundary: strings, ordered
//! sequences of strings, and error descriptors. Live engine objects
//! (match state, compiled patterns) are never transmitted.

use std::io::{Read, Write};

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::{Error, Result};

/// Wire schema version, carried in every request. A worker that receives
/// a version it does not understand reports a failure instead of guessing
/// at the field layout.
pub const WIRE_VERSION: u32 = 1;

/// One match request, parent to worker. Immutable once constructed; at
/// most one is in flight per worker.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Wire schema version, see [`WIRE_VERSION`].
    pub version: u32,
    /// Regex pattern, compiled by the worker.
    pub pattern: String,
    /// Which match operation to run.
    pub operation: Operation,
    /// Text the pattern is matched against.
    pub subject: String,
    /// How long the worker may wait for the *next* request before
    /// self-terminating. Renewed with every request.
    pub idle_budget_ms: u64,
}

/// The closed set of supported match operations.
///
/// A fixed enumeration rather than an operation name: the subject is
/// attacker-influenced and must never select arbitrary behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum Operation {
    /// Does the pattern match anywhere in the subject?
    IsMatch,
    /// Byte offset of the start of the first match, if any.
    Find,
    /// Capture groups of the first match. Group 0 is the whole match;
    /// groups that did not participate are `None`.
    Captures,
}

/// Normalized match result.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum MatchOutcome {
    /// Result of [`Operation::IsMatch`].
    Bool(bool),
    /// Result of [`Operation::Find`]; `None` when the pattern did not match.
    Position(Option<u64>),
    /// Result of [`Operation::Captures`]; `None` when the pattern did not
    /// match.
    Groups(Option<Vec<Option<String>>>),
}

/// Coarse classification of an application failure, enough for the caller
/// to reconstruct an equivalent error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum FailureKind {
    /// The pattern did not compile.
    Syntax,
    /// The engine failed (or panicked) while executing the operation.
    Engine,
    /// The worker did not understand the request.
    Unsupported,
}

/// An application failure as it crosses the process boundary.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: FailureKind,
    pub message: String,
}

/// One response, worker to parent.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum ExecutionResponse {
    /// The operation completed; here is its normalized result.
    Success(MatchOutcome),
    /// The operation itself failed. The worker stays alive.
    Failure(ErrorDescriptor),
}

/// Write a message to a writer using length-prefixed rkyv encoding.
pub fn write_message<W: Write>(
    writer: &mut W,
    message: &impl for<'a> Serialize<
        rkyv::rancor::Strategy<
            rkyv::ser::Serializer<
                rkyv::util::AlignedVec,
                rkyv::ser::allocator::ArenaHandle<'a>,
                rkyv::ser::sharing::Share,
            >,
            rkyv::rancor::Error,
        >,
    >,
) -> Result<()> {
    let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(message)
        .map_err(|e| Error::Serialization(format!("failed to encode IPC message: {}", e)))?;

    let len = bytes.len() as u32;
    writer
        .write_all(&len.to_le_bytes())
        .map_err(|e| Error::transport("failed to write IPC message length", e))?;
    writer
        .write_all(&bytes)
        .map_err(|e| Error::transport("failed to write IPC message body", e))?;
    writer
        .flush()
        .map_err(|e| Error::transport("failed to flush IPC stream", e))?;

    Ok(())
}

/// Read a message from a reader using length-prefixed rkyv encoding.
///
/// # Safety
///
/// Uses unchecked deserialization for performance. Only safe when reading
/// from trusted sources (our own worker processes and their parent).
pub fn read_message<R: Read, T>(reader: &mut R) -> Result<T>
where
    T: Archive,
    T::Archived: Deserialize<T, rkyv::rancor::Strategy<rkyv::de::Pool, rkyv::rancor::Error>>,
{
    let mut len_bytes = [0u8; 4];
    reader
        .read_exact(&mut len_bytes)
        .map_err(|e| Error::transport("failed to read IPC message length", e))?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    // Sanity check: reject absurdly large messages (100MB)
    if len > 100 * 1024 * 1024 {
        return Err(Error::Ipc(format!("IPC message too large: {} bytes", len)));
    }

    let mut bytes = vec![0u8; len];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| Error::transport("failed to read IPC message body", e))?;

    // SAFETY: both ends of the channel are our own processes speaking this
    // protocol. Using unchecked deserialization avoids CheckBytes trait
    // complexity.
    let message = unsafe { rkyv::from_bytes_unchecked::<T, rkyv::rancor::Error>(&bytes) }
        .map_err(|e| Error::Serialization(format!("failed to decode IPC message: {}", e)))?;

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_request_roundtrip() {
        let req = ExecutionRequest {
            version: WIRE_VERSION,
            pattern: r"(\d+)-(\d+)?".to_string(),
            operation: Operation::Captures,
            subject: "ünïcode 12-34 subject".to_string(),
            idle_budget_ms: 10_000,
        };

        let mut buf = Vec::new();
        write_message(&mut buf, &req).unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded: ExecutionRequest = read_message(&mut cursor).unwrap();

        assert_eq!(decoded.version, WIRE_VERSION);
        assert_eq!(decoded.pattern, r"(\d+)-(\d+)?");
        assert_eq!(decoded.operation, Operation::Captures);
        assert_eq!(decoded.subject, "ünïcode 12-34 subject");
        assert_eq!(decoded.idle_budget_ms, 10_000);
    }

    #[test]
    fn test_success_response_roundtrip() {
        let resp = ExecutionResponse::Success(MatchOutcome::Groups(Some(vec![
            Some("12-34".to_string()),
            Some("12".to_string()),
            None,
        ])));

        let mut buf = Vec::new();
        write_message(&mut buf, &resp).unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded: ExecutionResponse = read_message(&mut cursor).unwrap();

        assert_eq!(decoded, resp);
    }

    #[test]
    fn test_failure_response_roundtrip() {
        let resp = ExecutionResponse::Failure(ErrorDescriptor {
            kind: FailureKind::Syntax,
            message: "unclosed group".to_string(),
        });

        let mut buf = Vec::new();
        write_message(&mut buf, &resp).unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded: ExecutionResponse = read_message(&mut cursor).unwrap();

        assert_eq!(decoded, resp);
    }

    #[test]
    fn test_large_subject_roundtrip() {
        let req = ExecutionRequest {
            version: WIRE_VERSION,
            pattern: "a".to_string(),
            operation: Operation::IsMatch,
            subject: "x".repeat(1 << 20),
            idle_budget_ms: 1,
        };

        let mut buf = Vec::new();
        write_message(&mut buf, &req).unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded: ExecutionRequest = read_message(&mut cursor).unwrap();
        assert_eq!(decoded.subject.len(), 1 << 20);
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(u32::MAX).to_le_bytes());
        buf.extend_from_slice(&[0u8; 16]);

        let mut cursor = Cursor::new(buf);
        let err = read_message::<_, ExecutionResponse>(&mut cursor).unwrap_err();
        assert!(matches!(err, crate::error::Error::Ipc(_)));
    }

    #[test]
    fn test_truncated_frame_is_transport_death() {
        // A frame cut short mid-body reads as end-of-stream, the same
        // signature a killed worker leaves behind.
        let resp = ExecutionResponse::Success(MatchOutcome::Bool(true));
        let mut buf = Vec::new();
        write_message(&mut buf, &resp).unwrap();
        buf.truncate(buf.len() - 1);

        let mut cursor = Cursor::new(buf);
        let err = read_message::<_, ExecutionResponse>(&mut cursor).unwrap_err();
        assert!(err.is_worker_death());
    }
}
