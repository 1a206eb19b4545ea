use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{MinefleetError, Result};

/// Remote snapshot of a registered wallet.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub balance: f64,
    pub referral_bonus: f64,
}

/// Response to a registration check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationStatus {
    pub is_registered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<UserData>,
}

/// Server-confirmed balance after an update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceUpdate {
    pub success: bool,
    pub balance: f64,
}

/// Whether a report is a periodic update or the terminal one sent on stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Periodic,
    Final,
}

impl UpdateKind {
    fn wire_tag(self) -> &'static str {
        match self {
            UpdateKind::Periodic => "mining_update",
            UpdateKind::Final => "final_update",
        }
    }
}

#[derive(Debug, Serialize)]
struct EarningsBody {
    session: f64,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct UpdateBody<'a> {
    wallet: &'a str,
    earnings: EarningsBody,
}

/// The accounting service every agent reports to.
#[async_trait]
pub trait AccountingService: Send + Sync {
    /// Ask whether the wallet is known to the service, with its remote
    /// balance snapshot when it is.
    async fn check_registration(&self, wallet: &str) -> Result<RegistrationStatus>;

    /// Submit the session-delta earned since the last report. The returned
    /// balance is authoritative.
    async fn update_balance(
        &self,
        wallet: &str,
        session_delta: f64,
        kind: UpdateKind,
    ) -> Result<BalanceUpdate>;
}

/// HTTP implementation of the accounting contract.
pub struct HttpAccountingService {
    client: Client,
    base_url: String,
    verbose: bool,
}

impl HttpAccountingService {
    pub fn new(client: Client, base_url: impl Into<String>, verbose: bool) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            verbose,
        }
    }
}

#[async_trait]
impl AccountingService for HttpAccountingService {
    async fn check_registration(&self, wallet: &str) -> Result<RegistrationStatus> {
        let url = format!("{}/check-registration", self.base_url);
        if self.verbose {
            debug!("GET {url} wallet={wallet}");
        }

        let response = self
            .client
            .get(&url)
            .query(&[("wallet", wallet)])
            .send()
            .await
            .map_err(|e| MinefleetError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MinefleetError::Remote(format!(
                "check-registration returned {status}"
            )));
        }

        let parsed: RegistrationStatus = response
            .json()
            .await
            .map_err(|e| MinefleetError::Transport(format!("invalid response body: {e}")))?;
        if self.verbose {
            debug!("check-registration: registered={}", parsed.is_registered);
        }
        Ok(parsed)
    }

    async fn update_balance(
        &self,
        wallet: &str,
        session_delta: f64,
        kind: UpdateKind,
    ) -> Result<BalanceUpdate> {
        let url = format!("{}/update-balance", self.base_url);
        let body = UpdateBody {
            wallet,
            earnings: EarningsBody {
                session: session_delta,
                kind: kind.wire_tag(),
            },
        };
        if self.verbose {
            debug!("POST {url} session={session_delta:.10} type={}", body.earnings.kind);
        }

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| MinefleetError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MinefleetError::Remote(format!(
                "update-balance returned {status}"
            )));
        }

        let parsed: BalanceUpdate = response
            .json()
            .await
            .map_err(|e| MinefleetError::Transport(format!("invalid response body: {e}")))?;
        if !parsed.success {
            return Err(MinefleetError::Remote(
                "update-balance reported failure".into(),
            ));
        }
        Ok(parsed)
    }
}
