//! Which cached reads each mutation makes obsolete.

use std::fmt;

use tracing::debug;

use super::{image_predictions, predictions, profile, system, transactions};
use crate::cache::{QueryCache, QueryKey};

/// A state-changing backend call, with the identifiers its edges need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    CreateTransaction,
    UpdateTransaction { id: i64 },
    MarkFraud { id: i64 },
    DeleteTransaction { id: i64 },
    ReloadFraudModel,
    PredictExisting { id: i64 },
    PredictAllPending,
    ReloadImageModel,
    UpdateProfile,
}

impl Mutation {
    /// Key prefixes marked stale once the mutation succeeds.
    pub fn invalidates(&self) -> Vec<QueryKey> {
        match self {
            Mutation::CreateTransaction => vec![
                transactions::keys::lists(),
                transactions::keys::my_all(),
                transactions::keys::stats(),
            ],
            Mutation::UpdateTransaction { .. } => {
                vec![transactions::keys::lists(), transactions::keys::my_all()]
            }
            Mutation::MarkFraud { .. } => vec![
                transactions::keys::fraud_all(),
                transactions::keys::lists(),
                transactions::keys::my_all(),
                transactions::keys::stats(),
            ],
            Mutation::DeleteTransaction { .. } => vec![
                transactions::keys::lists(),
                transactions::keys::my_all(),
                transactions::keys::stats(),
            ],
            Mutation::ReloadFraudModel => {
                vec![predictions::keys::status(), system::keys::model_status()]
            }
            // Predictions are written onto stored transactions.
            Mutation::PredictExisting { .. } | Mutation::PredictAllPending => {
                vec![transactions::keys::all()]
            }
            Mutation::ReloadImageModel => {
                vec![image_predictions::keys::status(), system::keys::model_status()]
            }
            Mutation::UpdateProfile => vec![profile::keys::detail()],
        }
    }

    /// Keys dropped outright because the resource no longer exists.
    pub fn removes(&self) -> Vec<QueryKey> {
        match self {
            Mutation::DeleteTransaction { id } => vec![transactions::keys::detail(*id)],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::CreateTransaction => write!(f, "create-transaction"),
            Mutation::UpdateTransaction { id } => write!(f, "update-transaction({})", id),
            Mutation::MarkFraud { id } => write!(f, "mark-fraud({})", id),
            Mutation::DeleteTransaction { id } => write!(f, "delete-transaction({})", id),
            Mutation::ReloadFraudModel => write!(f, "reload-fraud-model"),
            Mutation::PredictExisting { id } => write!(f, "predict-existing({})", id),
            Mutation::PredictAllPending => write!(f, "predict-all-pending"),
            Mutation::ReloadImageModel => write!(f, "reload-image-model"),
            Mutation::UpdateProfile => write!(f, "update-profile"),
        }
    }
}

impl QueryCache {
    /// Run the invalidation edges of a successful mutation.
    ///
    /// Returns how many cache entries were touched.
    pub fn apply_mutation(&self, mutation: &Mutation) -> usize {
        let removed: usize = mutation.removes().iter().map(|key| self.remove(key)).sum();
        let invalidated = self.invalidate_many(&mutation.invalidates());
        debug!(mutation = %mutation, removed, invalidated, "Applied mutation edges");
        removed + invalidated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StalePolicy;
    use crate::models::PaginationParams;

    const ALL: [Mutation; 9] = [
        Mutation::CreateTransaction,
        Mutation::UpdateTransaction { id: 1 },
        Mutation::MarkFraud { id: 1 },
        Mutation::DeleteTransaction { id: 1 },
        Mutation::ReloadFraudModel,
        Mutation::PredictExisting { id: 1 },
        Mutation::PredictAllPending,
        Mutation::ReloadImageModel,
        Mutation::UpdateProfile,
    ];

    #[test]
    fn test_every_mutation_declares_an_edge() {
        for mutation in ALL {
            assert!(
                !mutation.invalidates().is_empty(),
                "{} declares no invalidation edge",
                mutation
            );
        }
    }

    #[tokio::test]
    async fn test_create_marks_lists_and_stats_stale() {
        let cache = QueryCache::new();
        let page = transactions::keys::list(Some(PaginationParams::new(1, 10)));
        let my_stats = transactions::keys::my_stats();
        let stats = transactions::keys::stats();
        let profile = profile::keys::detail();
        for key in [&page, &my_stats, &stats, &profile] {
            cache
                .query(key.clone(), StalePolicy::PROFILE, || async { Ok(1u32) })
                .await
                .unwrap();
            assert!(!cache.is_stale(key));
        }

        cache.apply_mutation(&Mutation::CreateTransaction);

        assert!(cache.is_stale(&page));
        assert!(cache.is_stale(&my_stats));
        assert!(cache.is_stale(&stats));
        assert!(!cache.is_stale(&profile));
    }

    #[test]
    fn test_delete_drops_detail() {
        let cache = QueryCache::new();
        let detail = transactions::keys::detail(7);
        let other = transactions::keys::detail(8);
        cache.set_query_data(&detail, &"seven").unwrap();
        cache.set_query_data(&other, &"eight").unwrap();

        cache.apply_mutation(&Mutation::DeleteTransaction { id: 7 });

        assert!(cache.peek::<String>(&detail).is_none());
        assert!(cache.peek::<String>(&other).is_some());
    }

    #[test]
    fn test_model_reloads_touch_system_status() {
        assert!(Mutation::ReloadFraudModel
            .invalidates()
            .contains(&system::keys::model_status()));
        assert!(Mutation::ReloadImageModel
            .invalidates()
            .contains(&system::keys::model_status()));
    }
}
