use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::ErpConfig;
use crate::error::{Error, Result};

/// Column-oriented rows as returned by the ERP.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TabularRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl TabularRows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One JSON object per row, keyed by column name. Short rows are padded
    /// with nulls and surplus cells are dropped.
    pub fn into_records(self) -> Vec<Map<String, Value>> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| {
                let mut cells = row.into_iter();
                columns
                    .iter()
                    .map(|column| (column.clone(), cells.next().unwrap_or(Value::Null)))
                    .collect()
            })
            .collect()
    }
}

/// A boxed, `Send`-able future returned by [`DatasetSource::pull_dataset`].
pub type PullFuture<'a> = Pin<Box<dyn Future<Output = Result<TabularRows>> + Send + 'a>>;

/// Where pipeline runs pull their data from.
pub trait DatasetSource: Send + Sync {
    fn pull_dataset<'a>(&'a self, name: &'a str) -> PullFuture<'a>;
}

/// Pulls datasets over HTTP from `GET {base_url}/datasets/{name}`.
pub struct HttpErpSource {
    client: reqwest::Client,
    base_url: Option<String>,
    api_key: Option<String>,
}

impl HttpErpSource {
    pub fn from_config(config: &ErpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build ERP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config
                .base_url
                .as_deref()
                .map(|url| url.trim_end_matches('/').to_string()),
            api_key: config.api_key.clone(),
        })
    }

    async fn fetch(&self, name: &str) -> Result<TabularRows> {
        let base_url = self
            .base_url
            .as_deref()
            .ok_or_else(|| Error::Upstream("ERP source not configured".to_string()))?;

        let url = format!("{base_url}/datasets/{}", urlencoding::encode(name));
        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("ERP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream(format!("ERP returned {status} for {name}")));
        }

        response
            .json::<TabularRows>()
            .await
            .map_err(|e| Error::Upstream(format!("ERP response could not be decoded: {e}")))
    }
}

impl DatasetSource for HttpErpSource {
    fn pull_dataset<'a>(&'a self, name: &'a str) -> PullFuture<'a> {
        Box::pin(self.fetch(name))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_into_records() {
        let rows = TabularRows {
            columns: vec!["region".to_string(), "total".to_string()],
            rows: vec![vec![json!("north"), json!(10)], vec![json!("south")]],
        };

        let records = rows.into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["region"], json!("north"));
        assert_eq!(records[0]["total"], json!(10));
        assert_eq!(records[1]["total"], Value::Null);

        let keys: Vec<_> = records[0].keys().cloned().collect();
        assert_eq!(keys, vec!["region", "total"]);
    }

    #[test]
    fn test_surplus_cells_dropped() {
        let rows = TabularRows {
            columns: vec!["a".to_string()],
            rows: vec![vec![json!(1), json!(2)]],
        };
        let records = rows.into_records();
        assert_eq!(records[0].len(), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_source_fails_upstream() {
        let source = HttpErpSource::from_config(&ErpConfig::default()).unwrap();
        let err = source.pull_dataset("Sales").await.unwrap_err();
        assert!(matches!(err, Error::Upstream(msg) if msg.contains("not configured")));
    }
}
