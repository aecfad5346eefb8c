//! JSON frame encoding and decoding
//!
//! A frame is a JSON array of envelopes. Only single-envelope frames are
//! produced, and only the first envelope of an inbound frame is read.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::envelope::Envelope;
use crate::error::{Error, Result};

/// Encode an envelope as a one-element JSON array
pub fn encode(envelope: &Envelope) -> Result<String> {
    serde_json::to_string(&[envelope]).map_err(Error::encode)
}

/// Decode the first envelope of an inbound frame
pub fn decode(frame: &str) -> Result<Envelope> {
    let list: Vec<Value> = serde_json::from_str(frame).map_err(Error::decode)?;
    let first = list.into_iter().next().ok_or(Error::EmptyEnvelope)?;
    serde_json::from_value(first).map_err(Error::decode)
}

/// Parse the nested JSON document carried in a payload's `content` string
pub fn decode_content<T: DeserializeOwned>(content: &str) -> Result<T> {
    serde_json::from_str(content).map_err(Error::decode)
}

/// Serialize a record into the nested `content` string form
pub fn encode_content<T: Serialize>(content: &T) -> Result<String> {
    serde_json::to_string(content).map_err(Error::encode)
}
