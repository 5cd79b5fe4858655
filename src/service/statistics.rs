use chrono::{DateTime, Utc};

use super::{CrmService, ServiceResult};
use crate::models::{recent_since, Statistics};

impl CrmService {
    pub async fn statistics(&self) -> ServiceResult<Statistics> {
        self.statistics_at(Utc::now()).await
    }

    /// Rollup with the recent window ending at `now`; the counting itself is
    /// left to the store
    pub async fn statistics_at(&self, now: DateTime<Utc>) -> ServiceResult<Statistics> {
        let counts = self.store.statistics(recent_since(now)).await?;
        Ok(counts.into())
    }
}
