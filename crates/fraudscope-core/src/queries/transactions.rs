//! Transaction reads and mutations.
//!
//! Lists, stats and searches go through the query cache; every mutation
//! applies its invalidation edges once the backend confirms it.

use tracing::{debug, info};

use super::edges::Mutation;
use crate::api::{ApiClient, ApiError, ApiRequest, ApiResult};
use crate::cache::{QueryCache, QuerySnapshot, StalePolicy};
use crate::models::{
    AccountTransactionsResponse, CreateTransactionRequest, DeleteResponse, MarkFraudRequest,
    PaginationParams, SearchParams, SearchResponse, TransactionResponse,
    TransactionStatsResponse, TransactionsPage, UpdateTransactionRequest,
};

/// Cache keys for the `transactions` domain.
pub mod keys {
    use crate::cache::QueryKey;
    use crate::models::{PaginationParams, SearchParams};

    pub fn all() -> QueryKey {
        QueryKey::root("transactions")
    }

    pub fn lists() -> QueryKey {
        all().child("list")
    }

    pub fn list(params: Option<PaginationParams>) -> QueryKey {
        lists().param(&params)
    }

    /// Prefix covering "my transactions" pages and "my stats".
    pub fn my_all() -> QueryKey {
        all().child("my")
    }

    pub fn my(params: Option<PaginationParams>) -> QueryKey {
        my_all().param(&params)
    }

    pub fn my_stats() -> QueryKey {
        my_all().child("stats")
    }

    pub fn fraud_all() -> QueryKey {
        all().child("fraud")
    }

    pub fn fraud(params: Option<PaginationParams>) -> QueryKey {
        fraud_all().param(&params)
    }

    pub fn by_account(account_no: i64, params: Option<PaginationParams>) -> QueryKey {
        all().child("account").param(&account_no).param(&params)
    }

    pub fn detail(id: i64) -> QueryKey {
        all().child("detail").param(&id)
    }

    pub fn stats() -> QueryKey {
        all().child("stats")
    }

    pub fn search(params: &SearchParams) -> QueryKey {
        all().child("search").param(params)
    }
}

/// Transaction queries bound to a client and cache.
#[derive(Clone)]
pub struct Transactions {
    api: ApiClient,
    cache: QueryCache,
}

impl Transactions {
    pub fn new(api: ApiClient, cache: QueryCache) -> Self {
        Self { api, cache }
    }

    fn paged(path: &str, params: Option<PaginationParams>) -> ApiResult<ApiRequest> {
        ApiRequest::get(path).query(&params)
    }

    /// `GET /transactions`
    pub async fn list(&self, params: Option<PaginationParams>) -> ApiResult<TransactionsPage> {
        let request = Self::paged("/transactions", params)?;
        self.cache
            .query(keys::list(params), StalePolicy::TRANSACTION_LIST, || {
                self.api.send_json(request)
            })
            .await
    }

    /// Cached page right away, refreshed in the background when stale.
    pub fn list_background(
        &self,
        params: Option<PaginationParams>,
    ) -> ApiResult<QuerySnapshot<TransactionsPage>> {
        let request = Self::paged("/transactions", params)?;
        let api = self.api.clone();
        Ok(self.cache.query_background(
            keys::list(params),
            StalePolicy::TRANSACTION_LIST,
            move || async move { api.send_json::<TransactionsPage>(request).await },
        ))
    }

    /// `GET /transactions/my`
    pub async fn my(&self, params: Option<PaginationParams>) -> ApiResult<TransactionsPage> {
        let request = Self::paged("/transactions/my", params)?;
        self.cache
            .query(keys::my(params), StalePolicy::TRANSACTION_LIST, || {
                self.api.send_json(request)
            })
            .await
    }

    /// `GET /transactions/my/stats`
    pub async fn my_stats(&self) -> ApiResult<TransactionStatsResponse> {
        self.cache
            .query(keys::my_stats(), StalePolicy::TRANSACTION_STATS, || {
                self.api.send_json(ApiRequest::get("/transactions/my/stats"))
            })
            .await
    }

    /// `GET /transactions/{id}`
    pub async fn detail(&self, id: i64) -> ApiResult<TransactionResponse> {
        if id <= 0 {
            return Err(ApiError::InvalidRequest(format!("Invalid transaction id {}", id)));
        }
        self.cache
            .query(keys::detail(id), StalePolicy::TRANSACTION_DETAIL, || {
                self.api.send_json(ApiRequest::get(format!("/transactions/{}", id)))
            })
            .await
    }

    /// `GET /transactions/fraud`
    pub async fn fraud(&self, params: Option<PaginationParams>) -> ApiResult<TransactionsPage> {
        let request = Self::paged("/transactions/fraud", params)?;
        self.cache
            .query(keys::fraud(params), StalePolicy::TRANSACTION_LIST, || {
                self.api.send_json(request)
            })
            .await
    }

    /// `GET /transactions/account/{account_no}`
    pub async fn by_account(
        &self,
        account_no: i64,
        params: Option<PaginationParams>,
    ) -> ApiResult<AccountTransactionsResponse> {
        if account_no == 0 {
            return Err(ApiError::InvalidRequest("Account number is required".to_string()));
        }
        let request = Self::paged(&format!("/transactions/account/{}", account_no), params)?;
        self.cache
            .query(
                keys::by_account(account_no, params),
                StalePolicy::DEFAULT,
                || self.api.send_json(request),
            )
            .await
    }

    /// `GET /transactions/stats`
    pub async fn stats(&self) -> ApiResult<TransactionStatsResponse> {
        self.cache
            .query(keys::stats(), StalePolicy::TRANSACTION_STATS, || {
                self.api.send_json(ApiRequest::get("/transactions/stats"))
            })
            .await
    }

    /// `GET /transactions/search`. At least one amount bound is required.
    pub async fn search(&self, params: SearchParams) -> ApiResult<SearchResponse> {
        if !params.has_bounds() {
            return Err(ApiError::InvalidRequest(
                "Search needs a minimum or maximum amount".to_string(),
            ));
        }
        let request = ApiRequest::get("/transactions/search").query(&params)?;
        self.cache
            .query(keys::search(&params), StalePolicy::DEFAULT, || {
                self.api.send_json(request)
            })
            .await
    }

    /// `POST /transactions`
    pub async fn create(&self, data: &CreateTransactionRequest) -> ApiResult<TransactionResponse> {
        data.validate().map_err(ApiError::InvalidRequest)?;
        let request = ApiRequest::post("/transactions").json(data)?;
        let response: TransactionResponse = self.api.send_json(request).await?;
        info!(id = response.data.id, "Transaction created");
        self.cache.apply_mutation(&Mutation::CreateTransaction);
        Ok(response)
    }

    /// `PUT /transactions/{id}`; the response replaces the cached detail.
    pub async fn update(
        &self,
        id: i64,
        data: &UpdateTransactionRequest,
    ) -> ApiResult<TransactionResponse> {
        let request = ApiRequest::put(format!("/transactions/{}", id)).json(data)?;
        let response: TransactionResponse = self.api.send_json(request).await?;
        self.cache.set_query_data(&keys::detail(id), &response)?;
        self.cache.apply_mutation(&Mutation::UpdateTransaction { id });
        debug!(id, "Transaction updated");
        Ok(response)
    }

    /// `POST /transactions/{id}/mark-fraud`
    pub async fn mark_fraud(&self, id: i64, is_fraud: bool) -> ApiResult<TransactionResponse> {
        let request = ApiRequest::post(format!("/transactions/{}/mark-fraud", id))
            .json(&MarkFraudRequest { is_fraud })?;
        let response: TransactionResponse = self.api.send_json(request).await?;
        self.cache.set_query_data(&keys::detail(id), &response)?;
        self.cache.apply_mutation(&Mutation::MarkFraud { id });
        info!(id, is_fraud, "Transaction fraud flag updated");
        Ok(response)
    }

    /// `DELETE /transactions/{id}`
    pub async fn delete(&self, id: i64) -> ApiResult<DeleteResponse> {
        let response: DeleteResponse = self
            .api
            .send_json(ApiRequest::delete(format!("/transactions/{}", id)))
            .await?;
        self.cache.apply_mutation(&Mutation::DeleteTransaction { id });
        info!(id, "Transaction deleted");
        Ok(response)
    }
}
