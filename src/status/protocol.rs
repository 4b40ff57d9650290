use serde::{Deserialize, Serialize};

pub const ENDPOINT_QUERIES: &str = "/queries/:table";
pub const ENDPOINT_QUERY_IDS: &str = "/queries/:table/ids";
pub const ENDPOINT_QUERY: &str = "/queries/:table/:uuid";
pub const ENDPOINT_QUERY_CANCEL: &str = "/queries/:table/:uuid/cancel";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancelResponse {
    pub table: String,
    pub uuid: String,
    pub cancelled: usize,
}
