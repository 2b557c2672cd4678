//! `{ "data": ... }` envelope shared by every API handler.

use serde::Serialize;

/// Standard success envelope.
///
/// ```ignore
/// Ok(Json(DataResponse { data: category }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
