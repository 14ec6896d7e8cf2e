// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Smart Folder Evaluator
//!
//! Pages through the node store with the folder's filters, drops what the
//! caller cannot read, then computes the declared aggregations over the rest.

use std::sync::Arc;
use tracing::debug;

use crate::application::node_service::ReadGate;
use crate::domain::error::{ServiceError, ServiceResult};
use crate::domain::node::{Node, NodeId};
use crate::domain::principal::Principal;
use crate::domain::repository::NodeRepository;
use crate::domain::smart_folder::{aggregate, Evaluation, FilterSet};

pub struct SmartFolderEvaluator {
    repository: Arc<dyn NodeRepository>,
    page_size: u32,
}

impl SmartFolderEvaluator {
    pub fn new(repository: Arc<dyn NodeRepository>, page_size: u32) -> Self {
        Self {
            repository,
            page_size: page_size.max(1),
        }
    }

    pub async fn evaluate(&self, principal: &Principal, uuid: NodeId) -> ServiceResult<Evaluation> {
        let node = self.repository.get(uuid).await?;
        self.evaluate_node(principal, &node).await
    }

    /// Only nodes `principal` may read are listed and aggregated.
    pub async fn evaluate_node(&self, principal: &Principal, node: &Node) -> ServiceResult<Evaluation> {
        let spec = node
            .smart_folder
            .as_ref()
            .filter(|_| node.is_smart_folder())
            .ok_or_else(|| ServiceError::bad_request(format!("{} is not a smart folder", node.uuid)))?;

        FilterSet::compile(&spec.filters)?;

        let mut gate = ReadGate::default();
        let mut nodes = Vec::new();
        let mut page_token = 1;
        loop {
            let page = self
                .repository
                .query(&spec.filters, self.page_size, page_token)
                .await?;
            for candidate in page.nodes {
                if candidate.uuid != node.uuid
                    && gate.admits(self.repository.as_ref(), principal, &candidate).await
                {
                    nodes.push(candidate);
                }
            }
            if page_token >= page.page_count {
                break;
            }
            page_token += 1;
        }

        let aggregations = aggregate(&spec.aggregations, &nodes)?;
        debug!(
            smart_folder = %node.uuid,
            principal = %principal.email,
            matched = nodes.len(),
            aggregations = aggregations.len(),
            "Evaluated smart folder"
        );

        Ok(Evaluation { nodes, aggregations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::{NodeVariant, SMART_FOLDER_MIMETYPE};
    use crate::domain::permission::PermissionSet;
    use crate::domain::smart_folder::{Aggregation, FilterOperator, NodeFilter, SmartFolderSpec};
    use crate::domain::config::SecurityConfig;
    use crate::infrastructure::repositories::InMemoryNodeRepository;
    use bytes::Bytes;
    use chrono::Utc;
    use serde_json::json;

    fn node(title: &str, variant: NodeVariant, mimetype: &str) -> Node {
        let now = Utc::now();
        Node {
            uuid: NodeId::new(),
            title: title.to_string(),
            parent: NodeId::ROOT,
            owner: "alice@example.com".to_string(),
            group: "eng".to_string(),
            permissions: PermissionSet::default(),
            mimetype: mimetype.to_string(),
            variant,
            size: 0,
            aspects: vec![],
            properties: Default::default(),
            smart_folder: None,
            created_at: now,
            modified_at: now,
        }
    }

    async fn seeded(amounts: &[i64]) -> Arc<InMemoryNodeRepository> {
        let repo = Arc::new(InMemoryNodeRepository::new(&SecurityConfig::default()));
        for (i, amount) in amounts.iter().enumerate() {
            let mut invoice = node(&format!("invoice-{i}"), NodeVariant::File, "application/pdf");
            invoice.properties.insert("amount".to_string(), json!(amount));
            repo.create_file(invoice, Bytes::new()).await.unwrap();
        }
        repo.create_file(node("notes", NodeVariant::File, "text/plain"), Bytes::new())
            .await
            .unwrap();
        repo
    }

    fn admin() -> Principal {
        Principal::admin("admin@example.com")
    }

    fn smart_folder(aggregations: Vec<Aggregation>) -> Node {
        let mut folder = node("Invoices", NodeVariant::SmartFolder, SMART_FOLDER_MIMETYPE);
        folder.smart_folder = Some(SmartFolderSpec {
            filters: vec![NodeFilter::new("mimetype", FilterOperator::Eq, "application/pdf")],
            aggregations,
        });
        folder
    }

    #[tokio::test]
    async fn test_evaluate_pages_through_store() {
        let repo = seeded(&[10, 20, 30, 40, 50]).await;
        let evaluator = SmartFolderEvaluator::new(repo.clone(), 2);
        let folder = smart_folder(vec![
            Aggregation::new("total", "amount", "sum"),
            Aggregation::new("invoices", "uuid", "count"),
        ]);
        let folder = repo.create_metanode(folder).await.unwrap();

        let evaluation = evaluator.evaluate(&admin(), folder.uuid).await.unwrap();
        assert_eq!(evaluation.nodes.len(), 5);
        assert_eq!(evaluation.aggregations["total"], json!(150.0));
        assert_eq!(evaluation.aggregations["invoices"], json!(5));
    }

    #[tokio::test]
    async fn test_unknown_field_is_all_or_nothing() {
        let repo = seeded(&[10]).await;
        let evaluator = SmartFolderEvaluator::new(repo.clone(), 10);
        let folder = smart_folder(vec![
            Aggregation::new("total", "amount", "sum"),
            Aggregation::new("bogus", "does_not_exist", "sum"),
        ]);
        let folder = repo.create_metanode(folder).await.unwrap();

        let result = evaluator.evaluate(&admin(), folder.uuid).await;
        assert!(matches!(result, Err(ServiceError::AggregationFormula(_))));
    }

    #[tokio::test]
    async fn test_missing_and_wrong_variant() {
        let repo = seeded(&[]).await;
        let evaluator = SmartFolderEvaluator::new(repo.clone(), 10);
        assert!(evaluator.evaluate(&admin(), NodeId::new()).await.unwrap_err().is_not_found());
        assert!(evaluator.evaluate(&admin(), NodeId::ROOT).await.unwrap_err().is_bad_request());
    }

    #[tokio::test]
    async fn test_unreadable_nodes_are_left_out() {
        let repo = seeded(&[10, 20]).await;
        let mut locked = node("Locked", NodeVariant::Folder, crate::domain::node::FOLDER_MIMETYPE);
        locked.owner = "admin@example.com".to_string();
        locked.group = "finance".to_string();
        let locked = repo.create_folder(locked).await.unwrap();
        let mut salary = node("salary", NodeVariant::File, "application/pdf");
        salary.parent = locked.uuid;
        salary.properties.insert("amount".to_string(), json!(99999));
        repo.create_file(salary, Bytes::new()).await.unwrap();

        let evaluator = SmartFolderEvaluator::new(repo.clone(), 10);
        let folder = smart_folder(vec![Aggregation::new("total", "amount", "sum")]);
        let folder = repo.create_metanode(folder).await.unwrap();

        let alice = Principal::new("alice@example.com", ["eng"]);
        let evaluation = evaluator.evaluate(&alice, folder.uuid).await.unwrap();
        let titles: Vec<&str> = evaluation.nodes.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["invoice-0", "invoice-1"]);
        assert_eq!(evaluation.aggregations["total"], json!(30.0));

        let evaluation = evaluator.evaluate(&admin(), folder.uuid).await.unwrap();
        assert_eq!(evaluation.aggregations["total"], json!(100029.0));
    }

    #[tokio::test]
    async fn test_invalid_pattern_is_bad_request() {
        let repo = seeded(&[10]).await;
        let evaluator = SmartFolderEvaluator::new(repo.clone(), 10);
        let mut folder = smart_folder(vec![]);
        if let Some(spec) = folder.smart_folder.as_mut() {
            spec.filters = vec![NodeFilter::new("title", FilterOperator::Match, "invoice-(")];
        }
        let folder = repo.create_metanode(folder).await.unwrap();
        assert!(evaluator.evaluate(&admin(), folder.uuid).await.unwrap_err().is_bad_request());
    }
}
