//! CapacityScaler — adds nodes to the disaster cluster.
//!
//! Nodes are added one call at a time, all from the same template. The
//! first failed call aborts the grow; nodes already added are kept.

use async_trait::async_trait;
use tracing::{error, info, warn};

use takeover_core::config::DEFAULT_INCREASE_NUM;
use takeover_core::{Infrastructure, NodeList, VMTemplate};

use crate::client::EcloudClient;
use crate::error::{EcloudResult, GrowError};

/// Node listing and creation for a cluster.
#[async_trait]
pub trait NodeBackend: Send + Sync {
    async fn nodes(
        &self,
        cluster: &str,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> EcloudResult<NodeList>;

    async fn add_node(&self, cluster: &str, infrastructure: &Infrastructure) -> EcloudResult<()>;
}

#[async_trait]
impl NodeBackend for EcloudClient {
    async fn nodes(
        &self,
        cluster: &str,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> EcloudResult<NodeList> {
        EcloudClient::nodes(self, cluster, page, page_size).await
    }

    async fn add_node(&self, cluster: &str, infrastructure: &Infrastructure) -> EcloudResult<()> {
        EcloudClient::add_node(self, cluster, infrastructure).await
    }
}

/// Outcome of a completed grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowReport {
    /// Node count before the grow.
    pub before: u32,
    /// Node count the grow aimed for.
    pub target: u32,
    pub added: u32,
}

/// A grow trigger, as seen by the failover loop.
#[async_trait]
pub trait Grow: Send + Sync {
    async fn grow(&self) -> Result<GrowReport, GrowError>;
}

pub struct CapacityScaler<B> {
    backend: B,
    template: VMTemplate,
    increase_num: u32,
}

impl<B: NodeBackend> CapacityScaler<B> {
    /// `increase_num` below the minimum of 2 is raised to 2.
    pub fn new(backend: B, template: VMTemplate, increase_num: u32) -> Self {
        let increase_num = if increase_num < DEFAULT_INCREASE_NUM {
            warn!(
                configured = increase_num,
                using = DEFAULT_INCREASE_NUM,
                "increase_num below minimum"
            );
            DEFAULT_INCREASE_NUM
        } else {
            increase_num
        };
        Self {
            backend,
            template,
            increase_num,
        }
    }

    pub fn increase_num(&self) -> u32 {
        self.increase_num
    }

    pub fn cluster_id(&self) -> &str {
        &self.template.cluster_id
    }

    /// Current nodes of the template's cluster.
    pub async fn nodes(&self, page: Option<u32>, page_size: Option<u32>) -> EcloudResult<NodeList> {
        self.backend
            .nodes(&self.template.cluster_id, page, page_size)
            .await
    }

    /// Add a single node from the template.
    pub async fn add_node(&self) -> EcloudResult<()> {
        self.backend
            .add_node(&self.template.cluster_id, &self.template.infrastructure)
            .await
    }

    /// Add `increase_num` nodes, one after another.
    pub async fn grow(&self) -> Result<GrowReport, GrowError> {
        let cluster = self.cluster_id();
        let list = self.nodes(None, None).await.map_err(|e| {
            error!(cluster, error = %e, "failed to list nodes before grow");
            GrowError::Nodes(e)
        })?;

        let before = list.total;
        let target = before + self.increase_num;
        info!(
            cluster,
            current = before,
            adding = self.increase_num,
            "growing disaster cluster"
        );

        for i in 0..self.increase_num {
            if let Err(e) = self.add_node().await {
                let remaining = self.increase_num - i;
                error!(
                    cluster,
                    added = i,
                    remaining,
                    error = %e,
                    "add node failed, aborting grow"
                );
                return Err(GrowError::Partial {
                    added: i,
                    remaining,
                    source: e,
                });
            }
        }

        info!(cluster, from = before, to = target, "disaster cluster grown");
        Ok(GrowReport {
            before,
            target,
            added: self.increase_num,
        })
    }
}

#[async_trait]
impl<B: NodeBackend> Grow for CapacityScaler<B> {
    async fn grow(&self) -> Result<GrowReport, GrowError> {
        CapacityScaler::grow(self).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use takeover_core::{ServerVmType, Volume, VolumeType, Volumes};

    use super::*;
    use crate::error::EcloudError;

    struct FakeBackend {
        total: u32,
        /// 1-based index of the add call that fails.
        fail_on: Option<usize>,
        fail_list: bool,
        adds: Mutex<Vec<(String, Infrastructure)>>,
    }

    impl FakeBackend {
        fn new(total: u32) -> Self {
            Self {
                total,
                fail_on: None,
                fail_list: false,
                adds: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl NodeBackend for FakeBackend {
        async fn nodes(
            &self,
            _cluster: &str,
            _page: Option<u32>,
            _page_size: Option<u32>,
        ) -> EcloudResult<NodeList> {
            if self.fail_list {
                return Err(EcloudError::Status(502));
            }
            Ok(NodeList {
                total: self.total,
                nodes: Vec::new(),
            })
        }

        async fn add_node(&self, cluster: &str, infrastructure: &Infrastructure) -> EcloudResult<()> {
            let mut adds = self.adds.lock().unwrap();
            adds.push((cluster.to_string(), infrastructure.clone()));
            if self.fail_on == Some(adds.len()) {
                return Err(EcloudError::Api {
                    request_id: "req-2".to_string(),
                    code: "QUOTA".to_string(),
                    message: "quota exceeded".to_string(),
                });
            }
            Ok(())
        }
    }

    fn template() -> VMTemplate {
        VMTemplate {
            cluster_id: "c-1".to_string(),
            infrastructure: Infrastructure {
                flavor: None,
                server_type: Some("VM".to_string()),
                server_vm_type: ServerVmType::Common,
                image_id: None,
                cpu: 4,
                disk: 40,
                ram: 8,
                password: None,
                keypair: Some("ops".to_string()),
                volumes: Volumes {
                    system_disk: Volume {
                        size: 50,
                        volume_type: VolumeType::HighPerformance,
                    },
                    data_disk: Volume {
                        size: 100,
                        volume_type: VolumeType::HighPerformance,
                    },
                },
                specs_name: "s2.xlarge.2".to_string(),
                max_bandwidth: None,
            },
        }
    }

    #[test]
    fn increase_below_two_is_raised() {
        assert_eq!(CapacityScaler::new(FakeBackend::new(0), template(), 0).increase_num(), 2);
        assert_eq!(CapacityScaler::new(FakeBackend::new(0), template(), 1).increase_num(), 2);
        assert_eq!(CapacityScaler::new(FakeBackend::new(0), template(), 5).increase_num(), 5);
    }

    #[tokio::test]
    async fn grow_adds_identical_nodes() {
        let scaler = CapacityScaler::new(FakeBackend::new(5), template(), 3);

        let report = scaler.grow().await.unwrap();
        assert_eq!(
            report,
            GrowReport {
                before: 5,
                target: 8,
                added: 3
            }
        );

        let adds = scaler.backend.adds.lock().unwrap();
        assert_eq!(adds.len(), 3);
        for (cluster, infra) in adds.iter() {
            assert_eq!(cluster, "c-1");
            assert_eq!(infra, &template().infrastructure);
        }
    }

    #[tokio::test]
    async fn second_failure_reports_partial_progress() {
        let mut backend = FakeBackend::new(5);
        backend.fail_on = Some(2);
        let scaler = CapacityScaler::new(backend, template(), 3);

        let err = scaler.grow().await.unwrap_err();
        match err {
            GrowError::Partial {
                added,
                remaining,
                source,
            } => {
                assert_eq!(added, 1);
                assert_eq!(remaining, 2);
                assert!(matches!(source, EcloudError::Api { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        // Aborted: no third call.
        assert_eq!(scaler.backend.adds.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn first_failure_adds_nothing() {
        let mut backend = FakeBackend::new(1);
        backend.fail_on = Some(1);
        let scaler = CapacityScaler::new(backend, template(), 2);

        let err = scaler.grow().await.unwrap_err();
        assert!(matches!(
            err,
            GrowError::Partial {
                added: 0,
                remaining: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn list_failure_adds_nothing() {
        let mut backend = FakeBackend::new(5);
        backend.fail_list = true;
        let scaler = CapacityScaler::new(backend, template(), 2);

        let err = scaler.grow().await.unwrap_err();
        assert!(matches!(err, GrowError::Nodes(EcloudError::Status(502))));
        assert!(scaler.backend.adds.lock().unwrap().is_empty());
    }
}
