//! The ordered, partial-failure batch executor.
//!
//! A [`Batch`] is a non-empty ordered list of [`Request`]s. Execution is
//! strictly sequential: request `i+1` observes all effects of request `i`.
//! Each request produces its own `Result`; a failing request does not abort
//! the batch, it just occupies its slot in the result list.

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::distance::SimilarityAlgorithm;
use crate::error::Error;
use crate::index::{NonLinearIndexConfig, NonLinearKind};
use crate::limits::ClientInfo;
use crate::metadata::StoreValue;
use crate::predicate::Condition;
use crate::store::{StoreInfo, UpsertCount};
use crate::vector::Vector;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub address: String,
    pub version: Version,
    pub server_type: String,
    pub allocator_limit_bytes: u64,
    pub allocator_remaining_bytes: u64,
}

/// One typed request in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    Ping,
    InfoServer,
    ListClients,
    ListStores,
    CreateStore {
        name: String,
        dimension: usize,
        predicate_fields: Vec<String>,
        non_linear_kinds: Vec<NonLinearIndexConfig>,
        error_if_exists: bool,
    },
    DropStore {
        name: String,
        error_if_not_exists: bool,
    },
    Set {
        name: String,
        entries: Vec<(Vector, StoreValue)>,
    },
    GetKey {
        name: String,
        vectors: Vec<Vector>,
    },
    GetPred {
        name: String,
        condition: Condition,
    },
    GetSimN {
        name: String,
        probe: Vector,
        n: usize,
        algorithm: SimilarityAlgorithm,
        condition: Option<Condition>,
        /// Overrides the HNSW index's configured `ef_search` for this query;
        /// ignored by every other algorithm.
        ef: Option<usize>,
    },
    DelKey {
        name: String,
        vectors: Vec<Vector>,
    },
    DelPred {
        name: String,
        condition: Condition,
    },
    CreatePredIndex {
        name: String,
        fields: Vec<String>,
    },
    DropPredIndex {
        name: String,
        fields: Vec<String>,
        error_if_not_exists: bool,
    },
    CreateNonLinearIndex {
        name: String,
        configs: Vec<NonLinearIndexConfig>,
    },
    DropNonLinearIndex {
        name: String,
        kinds: Vec<NonLinearKind>,
        error_if_not_exists: bool,
    },
}

/// One typed response, paired positionally with its `Request`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Pong,
    InfoServer(ServerInfo),
    ListClients(Vec<ClientInfo>),
    ListStores(Vec<StoreInfo>),
    Unit,
    DeletedCount(usize),
    CreatedCount(usize),
    Upsert(UpsertCount),
    Entries(Vec<(Vector, StoreValue)>),
    Scored(Vec<(Vector, StoreValue, f32)>),
}

/// A non-empty ordered list of requests plus an optional trace id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub requests: Vec<Request>,
    pub trace_id: Option<String>,
}

/// The per-request result list, same length and order as the input batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<Result<Response, String>>,
    pub trace_id: Option<String>,
}

/// Executes one request against `catalog`. Never panics on a bad store
/// name or predicate; all expected failures surface as `Err`.
fn execute_one(
    catalog: &Catalog,
    server_info: impl Fn() -> ServerInfo,
    clients: impl Fn() -> Vec<ClientInfo>,
    request: Request,
) -> Result<Response, Error> {
    match request {
        Request::Ping => Ok(Response::Pong),
        Request::InfoServer => Ok(Response::InfoServer(server_info())),
        Request::ListClients => Ok(Response::ListClients(clients())),
        Request::ListStores => Ok(Response::ListStores(catalog.list_stores())),
        Request::CreateStore {
            name,
            dimension,
            predicate_fields,
            non_linear_kinds,
            error_if_exists,
        } => {
            catalog.create_store(&name, dimension, &predicate_fields, &non_linear_kinds, error_if_exists)?;
            Ok(Response::Unit)
        }
        Request::DropStore { name, error_if_not_exists } => {
            let count = catalog.drop_store(&name, error_if_not_exists)?;
            Ok(Response::DeletedCount(count))
        }
        Request::Set { name, entries } => {
            let count = catalog.with_store_write(&name, |store| store.set(entries))?;
            Ok(Response::Upsert(count))
        }
        Request::GetKey { name, vectors } => {
            let found = catalog.with_store_read(&name, |store| Ok(store.get_key(&vectors)))?;
            Ok(Response::Entries(found))
        }
        Request::GetPred { name, condition } => {
            let found = catalog.with_store_read(&name, |store| Ok(store.get_pred(&condition)))?;
            Ok(Response::Entries(found))
        }
        Request::GetSimN {
            name,
            probe,
            n,
            algorithm,
            condition,
            ef,
        } => {
            let found = catalog.with_store_read(&name, |store| {
                store.get_sim_n(&probe, n, algorithm, condition.as_ref(), ef)
            })?;
            Ok(Response::Scored(found))
        }
        Request::DelKey { name, vectors } => {
            let count = catalog.with_store_write(&name, |store| store.del_key(&vectors))?;
            Ok(Response::DeletedCount(count))
        }
        Request::DelPred { name, condition } => {
            let count = catalog.with_store_write(&name, |store| store.del_pred(&condition))?;
            Ok(Response::DeletedCount(count))
        }
        Request::CreatePredIndex { name, fields } => {
            let count = catalog.with_store_write(&name, |store| Ok(store.create_pred_index(&fields)))?;
            Ok(Response::CreatedCount(count))
        }
        Request::DropPredIndex {
            name,
            fields,
            error_if_not_exists,
        } => {
            let count =
                catalog.with_store_write(&name, |store| store.drop_pred_index(&fields, error_if_not_exists))?;
            Ok(Response::DeletedCount(count))
        }
        Request::CreateNonLinearIndex { name, configs } => {
            let count = catalog.with_store_write(&name, |store| {
                let mut created = 0;
                for config in configs {
                    created += store.create_non_linear_index(config)?;
                }
                Ok(created)
            })?;
            Ok(Response::CreatedCount(count))
        }
        Request::DropNonLinearIndex {
            name,
            kinds,
            error_if_not_exists,
        } => {
            let count = catalog.with_store_write(&name, |store| {
                let mut dropped = 0;
                for kind in kinds {
                    dropped += store.drop_non_linear_index(kind, error_if_not_exists)?;
                }
                Ok(dropped)
            })?;
            Ok(Response::DeletedCount(count))
        }
    }
}

/// Runs every request in `batch` sequentially, collecting an equally
/// ordered, equally sized list of per-request results.
pub fn execute_batch(
    catalog: &Catalog,
    server_info: impl Fn() -> ServerInfo,
    clients: impl Fn() -> Vec<ClientInfo>,
    batch: Batch,
) -> BatchResponse {
    let results = batch
        .requests
        .into_iter()
        .map(|request| execute_one(catalog, &server_info, &clients, request).map_err(|e| e.to_string()))
        .collect();
    BatchResponse {
        results,
        trace_id: batch.trace_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::BoundedAllocator;
    use std::sync::Arc;

    fn catalog() -> Catalog {
        Catalog::new(Arc::new(BoundedAllocator::new(1024 * 1024)))
    }

    fn info() -> ServerInfo {
        ServerInfo {
            address: "test".into(),
            version: Version { major: 1, minor: 0, patch: 0 },
            server_type: "lumendb".into(),
            allocator_limit_bytes: 0,
            allocator_remaining_bytes: 0,
        }
    }

    #[test]
    fn test_batch_order_create_set_get() {
        let cat = catalog();
        let v = Vector::new(vec![1.0, 0.0, 0.0]).unwrap();
        let batch = Batch {
            requests: vec![
                Request::CreateStore {
                    name: "s".into(),
                    dimension: 3,
                    predicate_fields: vec![],
                    non_linear_kinds: vec![],
                    error_if_exists: false,
                },
                Request::Set {
                    name: "s".into(),
                    entries: vec![(v.clone(), StoreValue::new())],
                },
                Request::GetKey {
                    name: "s".into(),
                    vectors: vec![v],
                },
            ],
            trace_id: None,
        };
        let response = execute_batch(&cat, info, Vec::new, batch);
        assert_eq!(response.results.len(), 3);
        assert!(response.results[0].is_ok());
        match &response.results[1] {
            Ok(Response::Upsert(count)) => assert_eq!(count.inserted, 1),
            other => panic!("unexpected: {other:?}"),
        }
        match &response.results[2] {
            Ok(Response::Entries(entries)) => assert_eq!(entries.len(), 1),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_batch_reversed_order_fails_per_request_but_continues() {
        let cat = catalog();
        let v = Vector::new(vec![1.0, 0.0, 0.0]).unwrap();
        let batch = Batch {
            requests: vec![
                Request::GetKey {
                    name: "s".into(),
                    vectors: vec![v.clone()],
                },
                Request::Set {
                    name: "s".into(),
                    entries: vec![(v, StoreValue::new())],
                },
                Request::CreateStore {
                    name: "s".into(),
                    dimension: 3,
                    predicate_fields: vec![],
                    non_linear_kinds: vec![],
                    error_if_exists: false,
                },
            ],
            trace_id: None,
        };
        let response = execute_batch(&cat, info, Vec::new, batch);
        assert_eq!(response.results.len(), 3);
        assert!(response.results[0].is_err());
        assert!(response.results[1].is_err());
        assert!(response.results[2].is_ok());
    }

    #[test]
    fn test_create_store_already_exists_does_not_abort_batch() {
        let cat = catalog();
        let batch = Batch {
            requests: vec![
                Request::CreateStore {
                    name: "s".into(),
                    dimension: 2,
                    predicate_fields: vec![],
                    non_linear_kinds: vec![],
                    error_if_exists: true,
                },
                Request::CreateStore {
                    name: "s".into(),
                    dimension: 2,
                    predicate_fields: vec![],
                    non_linear_kinds: vec![],
                    error_if_exists: true,
                },
                Request::Ping,
            ],
            trace_id: None,
        };
        let response = execute_batch(&cat, info, Vec::new, batch);
        assert!(response.results[0].is_ok());
        assert!(response.results[1].is_err());
        assert!(response.results[2].is_ok());
    }
}
