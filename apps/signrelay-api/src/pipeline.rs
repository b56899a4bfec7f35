//! Sign-and-deliver pipeline
//!
//! Resolve the source document, convert it, stamp page one, overwrite the
//! artifact, then mail it. Each stage only runs if the previous one
//! succeeded. Nothing is rolled back: a mail failure leaves the signed
//! artifact on disk.

use signrelay_mail::{Attachment, OutgoingMail};
use signrelay_pdf::{stamp_first_page, Attestation, EmbeddedFont, SignatureImage, StampError};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::models::{DocumentState, SignRequest};
use crate::state::{AppState, SigningSettings};

/// A sign request whose required fields are present
#[derive(Debug, Clone)]
pub struct SigningRequest {
    pub signer_name: String,
    pub signature_image: String,
}

impl TryFrom<SignRequest> for SigningRequest {
    type Error = ApiError;

    fn try_from(req: SignRequest) -> Result<Self, Self::Error> {
        let signer_name = req
            .signer_name
            .filter(|name| !name.trim().is_empty())
            .ok_or(ApiError::MissingSignerName)?;
        let signature_image = req
            .signature_image
            .filter(|image| !image.trim().is_empty())
            .ok_or(ApiError::MissingSignature)?;

        Ok(Self {
            signer_name,
            signature_image,
        })
    }
}

/// Run the pipeline for `file_id`, returning the success message
#[instrument(skip(state, request), fields(signer = %request.signer_name))]
pub async fn sign_and_deliver(
    state: &AppState,
    file_id: &str,
    request: SigningRequest,
) -> Result<String, ApiError> {
    // 1. Resolve the uploaded source
    let record = state
        .store
        .resolve(file_id)
        .await?
        .ok_or_else(|| ApiError::DocumentNotFound(file_id.to_string()))?;

    // 2. Convert to PDF; nothing downstream runs if this fails
    let artifact_path = state.store.artifact_path(file_id);
    state
        .converter
        .convert(&record.source_path, &artifact_path)
        .await
        .map_err(|e| ApiError::ConversionFailed(e.to_string()))?;
    state
        .store
        .transition(file_id, DocumentState::Converted)
        .await?;

    // 3. Stamp the first page
    let converted = tokio::fs::read(&artifact_path)
        .await
        .map_err(|e| ApiError::Signing(format!("reading converted document: {}", e)))?;
    let stamped = compose(&state.signing, converted, &request).await?;

    // 4. Overwrite the artifact
    state
        .store
        .write_artifact(file_id, &stamped)
        .await
        .map_err(|e| ApiError::Signing(e.to_string()))?;
    state.store.transition(file_id, DocumentState::Signed).await?;

    // 5. Deliver
    let name = &request.signer_name;
    let mail = OutgoingMail::new(
        format!("Document signed by: {}", name),
        format!("The document was signed by {}. See attached file.", name),
    )
    .with_attachment(Attachment::pdf(format!("{}.pdf", file_id), stamped));

    let receipt = state
        .mailer
        .send(mail)
        .await
        .map_err(|e| ApiError::Signing(e.to_string()))?;

    info!(file_id, response = %receipt.response, "Signed document delivered");
    Ok(format!("Document signed and sent successfully by {}", name))
}

/// Load the font, decode the signature and stamp off the async runtime
async fn compose(
    settings: &SigningSettings,
    pdf: Vec<u8>,
    request: &SigningRequest,
) -> Result<Vec<u8>, ApiError> {
    let font_path = settings.font_path.clone();
    let layout = settings.layout.clone();
    let attestation = Attestation::new(&request.signer_name, settings.today());
    let payload = request.signature_image.clone();

    let stamped = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, StampError> {
        let font_bytes = std::fs::read(&font_path).map_err(|e| {
            StampError::FontError(format!("{}: {}", font_path.display(), e))
        })?;
        let font_name = font_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let font = EmbeddedFont::from_bytes(&font_name, font_bytes)?;
        let image = SignatureImage::from_data_url(&payload)?;

        stamp_first_page(&pdf, &font, &image, &attestation, &layout)
    })
    .await
    .map_err(|e| ApiError::Signing(format!("stamping task failed: {}", e)))?;

    stamped.map_err(|e| ApiError::Signing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: Option<&str>, image: Option<&str>) -> SignRequest {
        SignRequest {
            signer_name: name.map(str::to_string),
            signature_image: image.map(str::to_string),
        }
    }

    #[test]
    fn test_complete_request_is_accepted() {
        let req = SigningRequest::try_from(request(Some("Ada"), Some("data:..."))).unwrap();
        assert_eq!(req.signer_name, "Ada");
        assert_eq!(req.signature_image, "data:...");
    }

    #[test]
    fn test_blank_name_is_missing() {
        let err = SigningRequest::try_from(request(Some("   "), Some("data:..."))).unwrap_err();
        assert!(matches!(err, ApiError::MissingSignerName));
    }

    #[test]
    fn test_name_is_checked_before_image() {
        let err = SigningRequest::try_from(request(None, None)).unwrap_err();
        assert!(matches!(err, ApiError::MissingSignerName));
    }

    #[test]
    fn test_missing_image() {
        let err = SigningRequest::try_from(request(Some("Ada"), Some(""))).unwrap_err();
        assert!(matches!(err, ApiError::MissingSignature));
    }
}
