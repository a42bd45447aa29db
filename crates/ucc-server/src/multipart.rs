//! Multipart field extraction shared by the `preprocess`/`compare` handlers.

use axum::extract::Multipart;

use ucc_core::error::{Result, UccError};

#[derive(Default)]
pub struct SingleUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub options_raw: Option<String>,
}

#[derive(Default)]
pub struct PairUpload {
    pub file_name_a: String,
    pub bytes_a: Vec<u8>,
    pub file_name_b: String,
    pub bytes_b: Vec<u8>,
    pub options_raw: Option<String>,
}

async fn read_field(field: axum::extract::multipart::Field<'_>) -> Result<(String, Vec<u8>)> {
    let file_name = field.file_name().unwrap_or("upload.pdf").to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|e| UccError::InvalidInput(format!("could not read multipart field body: {e}")))?
        .to_vec();
    Ok((file_name, bytes))
}

/// Collects the `file` + optional `options` fields for single-document
/// endpoints (`/ucc/preprocess`).
pub async fn collect_single(mut multipart: Multipart) -> Result<SingleUpload> {
    let mut upload = SingleUpload::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UccError::InvalidInput(format!("malformed multipart body: {e}")))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                let (name, bytes) = read_field(field).await?;
                upload.file_name = name;
                upload.bytes = bytes;
            }
            "options" => {
                upload.options_raw = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| UccError::InvalidInput(format!("invalid options field: {e}")))?,
                );
            }
            _ => {}
        }
    }
    if upload.bytes.is_empty() {
        return Err(UccError::InvalidInput("missing required field `file`".into()));
    }
    Ok(upload)
}

/// Collects the `file_a` + `file_b` + optional `options` fields for pair
/// endpoints (`/ucc/compare`, `/jobs/compare`).
pub async fn collect_pair(mut multipart: Multipart) -> Result<PairUpload> {
    let mut upload = PairUpload::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UccError::InvalidInput(format!("malformed multipart body: {e}")))?
    {
        match field.name().unwrap_or("") {
            "file_a" => {
                let (name, bytes) = read_field(field).await?;
                upload.file_name_a = name;
                upload.bytes_a = bytes;
            }
            "file_b" => {
                let (name, bytes) = read_field(field).await?;
                upload.file_name_b = name;
                upload.bytes_b = bytes;
            }
            "options" => {
                upload.options_raw = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| UccError::InvalidInput(format!("invalid options field: {e}")))?,
                );
            }
            _ => {}
        }
    }
    if upload.bytes_a.is_empty() || upload.bytes_b.is_empty() {
        return Err(UccError::InvalidInput(
            "both `file_a` and `file_b` are required".into(),
        ));
    }
    Ok(upload)
}
