//! # Bulk Sync
//!
//! Uploads the queue of a till that was offline. Each submission is its own
//! `create`: one bad entry is reported and skipped, the rest still land.
//!
//! ```text
//! [ #1 ok ] [ #2 product gone ] [ #3 ok, short ] ──► success 2, failed 1
//!                                                   orders   [#1, #3]
//!                                                   warnings [#3's]
//!                                                   errors   ["#2: ..."]
//! ```
//!
//! Submissions run one after another in queue order. Keys make a re-upload
//! of the same queue replay instead of double-selling.

use serde::{Deserialize, Serialize};
use tally_core::{OrderRequest, StockWarning};
use tracing::{info, warn};
use ts_rs::TS;

use crate::response::OrderResponse;
use crate::service::OrderService;

/// Aggregate outcome of a bulk upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BulkSyncResponse {
    pub success_count: u32,
    pub failed_count: u32,
    /// Warnings of every successful submission, in queue order.
    pub warnings: Vec<StockWarning>,
    /// One message per failed submission.
    pub errors: Vec<String>,
    /// Created or replayed orders, in queue order.
    pub orders: Vec<OrderResponse>,
}

impl OrderService {
    /// Creates every queued order, isolating failures per submission.
    ///
    /// Never fails as a whole; failures are counted and described in the
    /// response.
    pub async fn bulk_sync(
        &self,
        requests: &[OrderRequest],
        user_id: Option<&str>,
    ) -> BulkSyncResponse {
        let mut response = BulkSyncResponse::default();

        for (index, request) in requests.iter().enumerate() {
            match self.create(request, user_id).await {
                Ok(outcome) => {
                    response.success_count += 1;
                    response.warnings.extend(outcome.warnings);
                    response.orders.push(outcome.order);
                }
                Err(e) => {
                    warn!(
                        position = index + 1,
                        idempotency_key = request.idempotency_key().unwrap_or("-"),
                        code = %e.code(),
                        error = %e,
                        "Bulk submission failed"
                    );
                    response.failed_count += 1;
                    response.errors.push(format!("#{}: {}", index + 1, e));
                }
            }
        }

        info!(
            submitted = requests.len(),
            succeeded = response.success_count,
            failed = response.failed_count,
            warnings = response.warnings.len(),
            "Bulk sync finished"
        );
        response
    }
}
