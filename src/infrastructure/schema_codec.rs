// Text-safe encoding of introspected schemas (base64 over JSON bytes)
use crate::application::repositories::StoredSchema;
use crate::domain::schema::{IntrospectedSchema, TableSchema};
use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

pub fn encode(schema: &IntrospectedSchema) -> Result<StoredSchema> {
    Ok(StoredSchema {
        tables: Some(encode_blob(&schema.tables).context("Failed to encode tables")?),
        measures: Some(encode_blob(&schema.measures).context("Failed to encode measures")?),
        dimensions: Some(encode_blob(&schema.dimensions).context("Failed to encode dimensions")?),
    })
}

/// Decode all three blobs, or nothing.
///
/// A missing blob, a blob that fails to decode, or mappings that disagree on
/// the table set all yield `None` so the caller re-introspects.
pub fn decode(stored: &StoredSchema) -> Option<IntrospectedSchema> {
    let (Some(tables), Some(measures), Some(dimensions)) =
        (&stored.tables, &stored.measures, &stored.dimensions)
    else {
        return None;
    };

    match decode_all(tables, measures, dimensions) {
        Ok((tables, measures, dimensions)) => {
            let schema = IntrospectedSchema::from_parts(tables, measures, dimensions);
            if schema.is_none() {
                tracing::warn!("Stored schema mappings disagree on the table set");
            }
            schema
        }
        Err(e) => {
            tracing::warn!("Discarding unreadable stored schema: {:#}", e);
            None
        }
    }
}

type Mappings = (
    BTreeMap<String, TableSchema>,
    BTreeMap<String, Vec<String>>,
    BTreeMap<String, Vec<String>>,
);

fn decode_all(tables: &str, measures: &str, dimensions: &str) -> Result<Mappings> {
    Ok((
        decode_blob(tables).context("tables")?,
        decode_blob(measures).context("measures")?,
        decode_blob(dimensions).context("dimensions")?,
    ))
}

fn encode_blob<T: Serialize>(value: &T) -> Result<String> {
    let bytes = serde_json::to_vec(value)?;
    Ok(STANDARD.encode(bytes))
}

fn decode_blob<T: DeserializeOwned>(blob: &str) -> Result<T> {
    let bytes = STANDARD.decode(blob.trim()).context("blob is not valid base64")?;
    serde_json::from_slice(&bytes).context("blob is not a valid schema mapping")
}
