use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use booking_cell::models::BookingStatus;
use shared_database::store::{find_one_as, find_page_as, insert_as};
use shared_database::{Query, RecordStore};
use shared_models::page::{Page, PageRequest, SortDirection};
use shared_utils::AppState;

use crate::models::{
    NewStisResult, ResultStatus, ReturnResultRequest, StisBooking, StisError, StisResult,
    STIS_RESULTS,
};

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Decodes the attachment and checks that it is a PDF document.
pub fn decode_pdf(encoded: &str) -> Result<Vec<u8>, StisError> {
    // Data URLs are accepted as well as bare base64.
    let payload = encoded
        .trim()
        .split_once("base64,")
        .map(|(_, data)| data)
        .unwrap_or(encoded.trim());

    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| StisError::InvalidPdf(format!("not valid base64 ({})", e)))?;

    if !bytes.starts_with(PDF_MAGIC) {
        return Err(StisError::InvalidPdf("file is not a PDF document".to_string()));
    }
    Ok(bytes)
}

pub fn accepts_result(status: BookingStatus) -> bool {
    matches!(status, BookingStatus::PendingTestResult | BookingStatus::Completed)
}

pub struct StisResultService<'a> {
    state: &'a AppState,
}

impl<'a> StisResultService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    fn store(&self) -> &dyn RecordStore {
        self.state.store.as_ref()
    }

    pub async fn return_result(
        &self,
        booking: &StisBooking,
        request: ReturnResultRequest,
    ) -> Result<StisResult, StisError> {
        if !accepts_result(booking.status) {
            return Err(StisError::ResultNotExpected(booking.status));
        }
        if request.result_text.trim().is_empty() {
            return Err(StisError::Validation("Result text is required".to_string()));
        }

        let pdf = request
            .pdf_base64
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(decode_pdf)
            .transpose()?;

        let _guard = self
            .state
            .locks
            .lock(format!("stis-result:{}", booking.id))
            .await;

        if self.find_for_booking(booking.id).await?.is_some() {
            return Err(StisError::Duplicate(
                "A result has already been returned for this booking".to_string(),
            ));
        }

        let pdf_url = match pdf {
            Some(bytes) => {
                let path = format!("results/{}/{}.pdf", booking.id, Uuid::new_v4());
                let url = self
                    .state
                    .files
                    .upload(&path, bytes, PDF_CONTENT_TYPE)
                    .await
                    .map_err(|e| {
                        error!("Uploading result PDF for booking {} failed: {:#}", booking.id, e);
                        StisError::Upload(format!("{:#}", e))
                    })?;
                Some(url)
            }
            None => None,
        };

        let now = Utc::now();
        let result: StisResult = insert_as(
            self.store(),
            STIS_RESULTS,
            &NewStisResult {
                booking_id: booking.id,
                result_text: request.result_text.trim().to_string(),
                result_status: request.result_status,
                pdf_url,
                created_at: now,
                updated_at: now,
            },
        )
        .await?;

        info!(
            "Result {} ({}) returned for STIS booking {}",
            result.id, result.result_status, booking.id
        );
        Ok(result)
    }

    pub async fn find_for_booking(&self, booking_id: i64) -> Result<Option<StisResult>, StisError> {
        Ok(find_one_as(
            self.store(),
            &Query::table(STIS_RESULTS).eq("booking_id", booking_id),
        )
        .await?)
    }

    pub async fn list(
        &self,
        result_status: Option<ResultStatus>,
        direction: SortDirection,
        page: PageRequest,
    ) -> Result<Page<StisResult>, StisError> {
        let query = Query::table(STIS_RESULTS)
            .eq_opt("result_status", result_status)
            .order_by("created_at", direction)
            .order_by("id", direction);

        Ok(find_page_as(self.store(), &query, page).await?)
    }
}
