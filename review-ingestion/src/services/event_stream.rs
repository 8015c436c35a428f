//! Reader for the completion API's event-stream responses.
//!
//! The API emits `id:`/`event:`/`data:` lines for every token and finishes
//! with an `event:result` line followed by a `data:` line carrying the full
//! message. Only that final payload is of interest: everything before the
//! marker is skipped and the stream is dropped as soon as the payload line
//! has been read.

use futures::stream::{Stream, StreamExt};

use crate::error::AnalysisError;

const RESULT_MARKER: &str = "event:result";
const DATA_PREFIX: &str = "data:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    AwaitingMarker,
    AwaitingData,
}

/// Returns the text after `data:` on the first data line following the
/// `event:result` marker.
pub async fn read_result_payload<S, B, E>(stream: S) -> Result<String, AnalysisError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    futures::pin_mut!(stream);

    let mut state = ScanState::AwaitingMarker;
    let mut pending: Vec<u8> = Vec::new();

    loop {
        while let Some(line) = take_line(&mut pending)? {
            if let Some(payload) = advance(&mut state, &line) {
                return Ok(payload);
            }
        }

        match stream.next().await {
            Some(Ok(chunk)) => pending.extend_from_slice(chunk.as_ref()),
            Some(Err(e)) => return Err(AnalysisError::Network(e.to_string())),
            None => break,
        }
    }

    // Final line without a trailing newline.
    if !pending.is_empty() {
        let line = std::str::from_utf8(&pending)?.trim_end_matches('\r').to_string();
        if let Some(payload) = advance(&mut state, &line) {
            return Ok(payload);
        }
    }

    Err(match state {
        ScanState::AwaitingMarker => AnalysisError::MissingResultEvent,
        ScanState::AwaitingData => AnalysisError::MissingResultData,
    })
}

fn take_line(pending: &mut Vec<u8>) -> Result<Option<String>, AnalysisError> {
    let Some(pos) = pending.iter().position(|b| *b == b'\n') else {
        return Ok(None);
    };
    let raw: Vec<u8> = pending.drain(..=pos).collect();
    let line = std::str::from_utf8(&raw[..pos])?;
    Ok(Some(line.trim_end_matches('\r').to_string()))
}

fn advance(state: &mut ScanState, line: &str) -> Option<String> {
    if line.is_empty() {
        return None;
    }
    match state {
        ScanState::AwaitingMarker => {
            if line.starts_with(RESULT_MARKER) {
                *state = ScanState::AwaitingData;
            }
            None
        }
        ScanState::AwaitingData => line
            .strip_prefix(DATA_PREFIX)
            .map(|payload| payload.to_string()),
    }
}
