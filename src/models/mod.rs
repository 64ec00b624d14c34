pub mod message;
pub mod room;
pub mod user;

use serde::Serialize;

/// Standard envelope for REST responses.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}
