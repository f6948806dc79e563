use crate::AppState;
use crate::api::error::AppError;
use crate::services::converter::ConversionResult;
use crate::services::staging::{StagedFile, StagingError};
use crate::utils::validation::validate_upload_filename;
use axum::{
    extract::{Multipart, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::IntoResponse,
};
use futures::TryStreamExt;
use tokio_util::io::StreamReader;

#[utoipa::path(
    post,
    path = "/convert-doc/",
    request_body(content = Multipart, description = "A single legacy Word (.doc) file in the `file` field"),
    responses(
        (status = 200, description = "Extracted plain text", body = String, content_type = "text/plain"),
        (status = 400, description = "Missing file or unsupported extension"),
        (status = 413, description = "Upload exceeds the size limit"),
        (status = 500, description = "Converter missing, staging failure or converter error")
    ),
    tag = "convert"
)]
pub async fn convert_doc(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let extension = state.config.required_extension.as_str();
    let mut staged: Option<StagedFile> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(&e))? {
        if field.name() != Some("file") {
            // unrelated form fields are skipped; next_field drains them
            continue;
        }
        if staged.is_some() {
            return Err(AppError::InvalidInput(
                "Only one file may be uploaded per request".to_string(),
            ));
        }

        let original_filename = field.file_name().unwrap_or_default().to_string();
        validate_upload_filename(&original_filename, extension)
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;

        let reader = StreamReader::new(field.map_err(std::io::Error::other));
        staged = Some(
            state
                .staging
                .stage(&original_filename, extension, reader)
                .await
                .map_err(staging_error)?,
        );
    }

    let Some(staged) = staged else {
        return Err(AppError::InvalidInput("No file provided".to_string()));
    };

    tracing::info!(
        "📄 Converting '{}' ({} bytes)",
        staged.original_filename(),
        staged.size()
    );

    // `staged` lives until the end of this function, so the directory is
    // removed after the converter is done with it, on every exit path.
    let executable = state.converter.locate()?;
    tracing::debug!("Using converter at {}", executable.display());

    match state.converter.invoke(staged.path()).await? {
        ConversionResult::Success { text } => {
            tracing::info!(
                "✅ Converted '{}' ({} chars)",
                staged.original_filename(),
                text.len()
            );
            Ok((
                [(header::CONTENT_TYPE, mime::TEXT_PLAIN_UTF_8.to_string())],
                text,
            ))
        }
        ConversionResult::Failure { exit_code, stderr } => Err(AppError::ConversionFailed {
            program: state.converter.program().to_string(),
            exit_code,
            stderr,
        }),
    }
}

fn multipart_error(e: &MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::InvalidInput(e.body_text())
    }
}

/// Body errors surface while the upload is being copied; report them as
/// client errors rather than staging failures.
fn staging_error(e: StagingError) -> AppError {
    if let StagingError::Write(io) = &e {
        if let Some(body_err) = io
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<MultipartError>())
        {
            return multipart_error(body_err);
        }
    }
    e.into()
}
