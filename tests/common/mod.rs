//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use apivault::lock::{LockConfig, LockManager};
use apivault::storage::LocalBackend;
use apivault::tree::SpecTree;
use apivault::{ApiId, ApiVault, VersionTag};
use serde_json::json;
use tempfile::TempDir;

pub fn create_temp_data_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

/// Lock timing tight enough for tests, patient enough for contention
pub fn fast_lock_config() -> LockConfig {
    LockConfig {
        stale_after: Duration::from_secs(30),
        max_attempts: 200,
        base_backoff: Duration::from_millis(2),
        max_backoff: Duration::from_millis(20),
    }
}

pub fn open_vault(dir: &TempDir) -> ApiVault {
    let backend = Arc::new(LocalBackend::new(dir.path()));
    let locks = LockManager::new(dir.path(), fast_lock_config());
    ApiVault::new(backend, locks)
}

pub fn api(id: &str) -> ApiId {
    ApiId::new(id).unwrap()
}

pub fn tag(v: &str) -> VersionTag {
    VersionTag::new(v).unwrap()
}

/// Billing API with a single `GET /invoices`
pub fn billing_v1() -> SpecTree {
    json!({
        "openapi": "3.0.3",
        "info": {"title": "Billing", "version": "1.0.0"},
        "paths": {
            "/invoices": {
                "get": {
                    "operationId": "listInvoices",
                    "summary": "List invoices",
                    "responses": {
                        "200": {
                            "description": "ok",
                            "content": {"application/json": {"schema": {
                                "type": "array",
                                "items": {"$ref": "#/components/schemas/Invoice"}
                            }}}
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Invoice": {
                    "type": "object",
                    "required": ["id"],
                    "properties": {
                        "id": {"type": "string"},
                        "amount": {"type": "number"},
                        "status": {"type": "string", "enum": ["draft", "sent", "paid"]}
                    }
                }
            }
        }
    })
}
