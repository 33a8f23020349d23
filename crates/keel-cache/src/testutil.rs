//! Shared helpers for keel-cache tests.

use std::sync::Arc;
use std::time::Duration;

use keel_core::{well_known, AnyResource, Node, ResourceWithTtl};
use tokio::sync::mpsc;

use crate::types::{Request, Response};

fn any(name: &str, body: &[u8]) -> AnyResource {
    AnyResource::new(
        well_known::CLUSTER,
        name,
        prost_types::Any {
            type_url: well_known::CLUSTER.to_string(),
            value: body.to_vec(),
        },
    )
}

pub(crate) fn res(name: &str, body: &[u8]) -> ResourceWithTtl {
    ResourceWithTtl::new(Arc::new(any(name, body)))
}

pub(crate) fn ttl_res(name: &str, body: &[u8], ttl: Duration) -> ResourceWithTtl {
    ResourceWithTtl::with_ttl(Arc::new(any(name, body)), ttl)
}

pub(crate) fn request(node: &str, version: &str, names: &[&str]) -> Request {
    Request {
        node: Node::new(node),
        type_url: well_known::CLUSTER.into(),
        version_info: version.to_string(),
        resource_names: names.iter().map(|s| s.to_string()).collect(),
    }
}

pub(crate) fn sink(capacity: usize) -> (mpsc::Sender<Response>, mpsc::Receiver<Response>) {
    mpsc::channel(capacity)
}
