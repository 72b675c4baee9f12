use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{Span, debug, field, instrument, trace, warn};

use crate::cache::RegistrationCache;
use crate::config::ProvisioningConfig;
use crate::device::DeviceIdentity;
use crate::key::derive_device_key;
use crate::secret::{SecretError, SecretProvider};
use crate::timer::{Timer, TokioTimer};
use crate::token::SasToken;
use crate::util::crypto::{InvalidKeyError, uri_encode};
use crate::util::http::{Client, ClientError, Headers, InvalidUriError, StatusCode, Uri};
use crate::util::interrupt::Interrupt;
use crate::util::types::{DeviceId, SharedKey};

/// Error code the service reports for devices that are disabled or not
/// associated with the enrollment group.
const DEVICE_BLOCKED_ERROR_CODE: u64 = 400209;

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error(
        "unable to register device {device_id}: minimum registration timeout not yet exceeded, please try again in {retry_after} seconds"
    )]
    RateLimited { device_id: DeviceId, retry_after: u64 },

    #[error("unable to derive key for device {device_id}: {source}")]
    InvalidKey {
        device_id: DeviceId,
        source: InvalidKeyError,
    },

    #[error("unable to read group key for device {device_id}: {source}")]
    Secret {
        device_id: DeviceId,
        source: SecretError,
    },

    #[error("unable to register device {device_id}: unknown server response {response}")]
    UnknownResponse { device_id: DeviceId, response: String },

    #[error("unable to register device {device_id}: the device may be unassociated or blocked")]
    Forbidden { device_id: DeviceId },

    #[error("unable to register device {device_id}: {reason}")]
    RegistrationFailed {
        device_id: DeviceId,
        reason: String,
        status: Option<StatusCode>,
    },

    #[error("registration of device {device_id} was cancelled")]
    Cancelled { device_id: DeviceId },
}

impl ProvisioningError {
    /// Status code hint for callers mapping this error onto their own
    /// protocol.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProvisioningError::RateLimited { .. } | ProvisioningError::Forbidden { .. } => {
                Some(StatusCode::FORBIDDEN.as_u16())
            }
            ProvisioningError::RegistrationFailed { status, .. } => status.map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Internal errors of a single registration exchange.
#[derive(Debug, Error)]
enum TryRegisterError {
    #[error("unknown server response {0}")]
    UnknownResponse(Value),

    #[error("the device may be unassociated or blocked")]
    Forbidden,

    #[error("registration was not successful after maximum number of attempts")]
    MaxAttempts,

    #[error(transparent)]
    Http(#[from] ClientError),

    #[error("invalid provisioning endpoint: {0}")]
    Endpoint(#[from] InvalidUriError),

    #[error("cancelled")]
    Cancelled,
}

impl TryRegisterError {
    fn into_provisioning_error(self, device_id: &DeviceId) -> ProvisioningError {
        let device_id = device_id.clone();
        match self {
            TryRegisterError::UnknownResponse(response) => ProvisioningError::UnknownResponse {
                device_id,
                response: response.to_string(),
            },
            TryRegisterError::Forbidden => ProvisioningError::Forbidden { device_id },
            TryRegisterError::Cancelled => ProvisioningError::Cancelled { device_id },
            TryRegisterError::Http(err) => ProvisioningError::RegistrationFailed {
                device_id,
                status: err.status(),
                reason: err.to_string(),
            },
            err @ (TryRegisterError::MaxAttempts | TryRegisterError::Endpoint(_)) => {
                ProvisioningError::RegistrationFailed {
                    device_id,
                    reason: err.to_string(),
                    status: None,
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistrationStatus {
    Submitted,
    Assigning,
    Assigned,
    Failed,
}

/// Progress of one registration exchange with the provisioning service.
///
/// ```text
/// Submitted --> Assigning --> Assigned
///     |             |
///     +-------------+-------> Failed
/// ```
#[derive(Clone, Debug)]
pub struct RegistrationAttempt {
    pub device_id: DeviceId,
    pub started_at: Instant,
    pub operation_id: Option<String>,
    pub status: RegistrationStatus,
    pub assigned_endpoint: Option<String>,
    pub polls: usize,
}

impl RegistrationAttempt {
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            started_at: Instant::now(),
            operation_id: None,
            status: RegistrationStatus::Submitted,
            assigned_endpoint: None,
            polls: 0,
        }
    }

    /// Handle the reply to the registration request, returning the id of
    /// the operation to poll.
    fn on_submitted(&mut self, response: Value) -> Result<&str, TryRegisterError> {
        match OperationResponse::decode(&response) {
            Some(OperationResponse {
                status: OperationStatus::Assigning,
                operation_id: Some(operation_id),
                ..
            }) if !operation_id.is_empty() => {
                self.status = RegistrationStatus::Assigning;
                Ok(self.operation_id.insert(operation_id).as_str())
            }
            _ => self.fail(TryRegisterError::UnknownResponse(response)),
        }
    }

    /// Handle the reply to an operation status query. Returns the assigned
    /// endpoint once the service has assigned one, `None` while assignment
    /// is still in progress.
    fn on_status(&mut self, response: Value) -> Result<Option<String>, TryRegisterError> {
        self.polls += 1;
        let Some(decoded) = OperationResponse::decode(&response) else {
            return self.fail(TryRegisterError::UnknownResponse(response));
        };
        let state = decoded.registration_state.unwrap_or_default();

        match decoded.status {
            OperationStatus::Assigning => Ok(None),
            OperationStatus::Assigned => match state.assigned_hub {
                Some(hub) if !hub.is_empty() => {
                    self.status = RegistrationStatus::Assigned;
                    Ok(Some(self.assigned_endpoint.insert(hub).clone()))
                }
                _ => self.fail(TryRegisterError::UnknownResponse(response)),
            },
            OperationStatus::Failed if state.error_code == Some(DEVICE_BLOCKED_ERROR_CODE) => {
                self.fail(TryRegisterError::Forbidden)
            }
            _ => self.fail(TryRegisterError::UnknownResponse(response)),
        }
    }

    fn fail<T>(&mut self, err: TryRegisterError) -> Result<T, TryRegisterError> {
        self.status = RegistrationStatus::Failed;
        Err(err)
    }
}

/*
    request {
        registrationId
        data? {
            iotcGateway {
                iotcGatewayId
                iotcIsGateway
            }
        }
    }
*/
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    registration_id: &'a DeviceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<RegisterData<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterData<'a> {
    iotc_gateway: GatewayMembership<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GatewayMembership<'a> {
    iotc_gateway_id: &'a str,
    iotc_is_gateway: bool,
}

impl<'a> From<&'a DeviceIdentity> for RegisterRequest<'a> {
    fn from(device: &'a DeviceIdentity) -> Self {
        Self {
            registration_id: &device.device_id,
            data: device.gateway_id.as_deref().map(|gateway_id| RegisterData {
                iotc_gateway: GatewayMembership {
                    iotc_gateway_id: gateway_id,
                    iotc_is_gateway: false,
                },
            }),
        }
    }
}

/*
    response {
        operationId
        status
        registrationState? {
            assignedHub?
            errorCode?
            errorMessage?
        }
    }
*/
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    status: OperationStatus,
    operation_id: Option<String>,
    registration_state: Option<RegistrationState>,
}

impl OperationResponse {
    fn decode(value: &Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum OperationStatus {
    Assigning,
    Assigned,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationState {
    assigned_hub: Option<String>,
    error_code: Option<u64>,
}

/// Client side of the provisioning service registration protocol.
pub struct Provisioner {
    config: ProvisioningConfig,
    client: Client,
    cache: Arc<RegistrationCache>,
    secrets: Arc<dyn SecretProvider>,
    timer: Arc<dyn Timer>,
}

impl Provisioner {
    pub fn new(
        config: ProvisioningConfig,
        cache: Arc<RegistrationCache>,
        secrets: Arc<dyn SecretProvider>,
    ) -> Self {
        Self {
            client: Client::new(Some(config.request.timeout)),
            config,
            cache,
            secrets,
            timer: Arc::new(TokioTimer),
        }
    }

    /// Use `timer` for the waits between status queries.
    pub fn with_timer(self, timer: Arc<dyn Timer>) -> Self {
        Self { timer, ..self }
    }

    pub fn config(&self) -> &ProvisioningConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<RegistrationCache> {
        &self.cache
    }

    /// Return the key of `device_id`, deriving it from the group key on
    /// first use.
    pub async fn device_key(&self, device_id: &DeviceId) -> Result<SharedKey, ProvisioningError> {
        if let Some(key) = self.cache.device_key(device_id) {
            return Ok(key);
        }

        let group_key = self
            .secrets
            .group_key()
            .await
            .map_err(|source| ProvisioningError::Secret {
                device_id: device_id.clone(),
                source,
            })?;
        let key = derive_device_key(&group_key, device_id).map_err(|source| {
            ProvisioningError::InvalidKey {
                device_id: device_id.clone(),
                source,
            }
        })?;

        trace!(device_id = %device_id, "derived device key");
        self.cache.set_device_key(device_id, key.clone());
        Ok(key)
    }

    /// Register `device` with the provisioning service and return the
    /// endpoint of the hub it was assigned to.
    ///
    /// Only one attempt per device is allowed within the configured
    /// minimum interval, failed attempts included. The exchange can be
    /// aborted at any suspension point through `interrupt`.
    #[instrument(
        skip_all,
        fields(
            device_id = %device.device_id,
            result = field::Empty,
            polls = field::Empty,
            cancelled = field::Empty
        ),
        err
    )]
    pub async fn register(
        &self,
        device: &DeviceIdentity,
        interrupt: Option<Interrupt>,
    ) -> Result<String, ProvisioningError> {
        let device_id = &device.device_id;

        self.cache
            .begin_attempt(device_id, self.config.request.min_register_interval)
            .map_err(|remaining| ProvisioningError::RateLimited {
                device_id: device_id.clone(),
                retry_after: remaining.as_secs(),
            })?;

        let key = self.device_key(device_id).await?;
        let token = SasToken::generate(
            &self.config.id_scope,
            device_id,
            &key,
            self.config.request.sas_ttl,
        )
        .map_err(|source| ProvisioningError::InvalidKey {
            device_id: device_id.clone(),
            source,
        })?;

        let interrupt = interrupt.unwrap_or_default();
        let mut attempt = RegistrationAttempt::new(device_id.clone());
        let result = self
            .try_register(device, &token, &mut attempt, &interrupt)
            .await;

        Span::current().record("polls", attempt.polls);
        match result {
            Ok(endpoint) => {
                Span::current().record("result", field::display(&endpoint));
                debug!(
                    elapsed = ?attempt.started_at.elapsed(),
                    "device assigned to {endpoint}"
                );
                Ok(endpoint)
            }
            Err(err) => {
                if matches!(err, TryRegisterError::Cancelled) {
                    Span::current().record("cancelled", true);
                }
                Err(err.into_provisioning_error(device_id))
            }
        }
    }

    async fn try_register(
        &self,
        device: &DeviceIdentity,
        token: &SasToken,
        attempt: &mut RegistrationAttempt,
        interrupt: &Interrupt,
    ) -> Result<String, TryRegisterError> {
        let headers = Headers::from([("Authorization".to_owned(), token.to_string())]);
        let request = RegisterRequest::from(device);

        let uri = self.registration_uri(&device.device_id, "register")?;
        debug!("initiating device registration");
        let response: Value =
            interruptible(interrupt, self.client.put(&uri, Some(&headers), &request)).await??;
        let operation_id = attempt.on_submitted(response)?;

        let uri = self.registration_uri(
            &device.device_id,
            &format!("operations/{}", uri_encode(operation_id)),
        )?;
        for delay in &self.config.request.poll_schedule {
            trace!("querying device registration status");
            let response: Value =
                interruptible(interrupt, self.client.get(&uri, Some(&headers))).await??;
            if let Some(endpoint) = attempt.on_status(response)? {
                return Ok(endpoint);
            }

            if !delay.is_zero() {
                trace!("registration in progress, retrying in {delay:?}");
                interruptible(interrupt, self.timer.sleep(*delay)).await?;
            }
        }

        warn!(polls = attempt.polls, "device was not assigned in time");
        attempt.fail(TryRegisterError::MaxAttempts)
    }

    fn registration_uri(
        &self,
        device_id: &DeviceId,
        action: &str,
    ) -> Result<Uri, InvalidUriError> {
        let path = format!(
            "/{}/registrations/{}/{action}",
            uri_encode(&self.config.id_scope),
            uri_encode(device_id),
        );
        let query = format!("api-version={}", uri_encode(&self.config.api_version));
        Uri::from_parts(self.config.endpoint.clone(), &path, Some(&query))
    }
}

/// Run `fut` to completion unless `interrupt` fires first.
async fn interruptible<F: Future>(
    interrupt: &Interrupt,
    fut: F,
) -> Result<F::Output, TryRegisterError> {
    tokio::select! {
        biased;
        _ = interrupt.wait() => Err(TryRegisterError::Cancelled),
        output = fut => Ok(output),
    }
}
