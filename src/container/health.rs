use crate::config::settings::{HealthSettings, InstanceSettings};
use crate::utils::error_handling::{ControllerError, ControllerResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

/// Instance health status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Readiness endpoint answered with success
    Healthy,
    /// Readiness endpoint never answered with success
    Unhealthy,
    /// No instance to probe
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Bounded retry policy for readiness probing
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Hard ceiling on attempts
    pub max_attempts: u32,
    /// Delay after the first failure
    pub interval: Duration,
    /// Growth factor applied to the delay after each failure
    pub backoff_multiplier: f64,
    /// Cap on the grown delay
    pub max_interval: Duration,
    /// Upper bound of random delay added to each sleep
    pub jitter: Duration,
    /// Overall bound on the whole probe
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_secs(2),
            backoff_multiplier: 1.0,
            max_interval: Duration::from_secs(10),
            jitter: Duration::ZERO,
            deadline: None,
        }
    }
}

impl RetryPolicy {
    /// Fixed interval, no backoff or jitter
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            max_interval: interval,
            ..Default::default()
        }
    }

    /// A single attempt, used for status queries
    pub fn single() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    pub fn from_settings(settings: &HealthSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            interval: Duration::from_millis(settings.interval_ms),
            backoff_multiplier: settings.backoff_multiplier,
            max_interval: Duration::from_millis(settings.max_interval_ms),
            jitter: Duration::from_millis(settings.jitter_ms),
            deadline: settings.deadline_secs.map(Duration::from_secs),
        }
    }

    fn next_delay(&self, current: Duration) -> Duration {
        let multiplier = self.backoff_multiplier.max(1.0);
        let grown = current.as_secs_f64() * multiplier;
        let cap = self.max_interval.max(self.interval).as_secs_f64();
        Duration::from_secs_f64(grown.min(cap))
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter.is_zero() {
            return delay;
        }
        let extra = rand::thread_rng().gen_range(0.0..self.jitter.as_secs_f64());
        delay + Duration::from_secs_f64(extra)
    }
}

/// A single readiness request against the instance
#[async_trait]
pub trait ReadinessCheck: Send + Sync {
    async fn check(&self) -> Result<(), String>;

    /// Human-readable target of the check
    fn describe(&self) -> String;
}

/// HTTP GET against the readiness endpoint; any 2xx counts as ready
pub struct HttpReadiness {
    url: String,
    client: reqwest::Client,
}

impl HttpReadiness {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> ControllerResult<Self> {
        // The endpoint is always local; never route it through a proxy
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ControllerError::config(&format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn from_settings(instance: &InstanceSettings, health: &HealthSettings) -> ControllerResult<Self> {
        Self::new(
            instance.readiness_url(&health.readiness_path),
            Duration::from_millis(health.request_timeout_ms),
        )
    }
}

#[async_trait]
impl ReadinessCheck for HttpReadiness {
    async fn check(&self) -> Result<(), String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| format!("Failed to reach {}: {}", self.url, e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("{} returned status {}", self.url, response.status()))
        }
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Outcome of a probe run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    pub status: HealthStatus,
    pub attempts: u32,
    pub elapsed_ms: u64,
    pub last_error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl ProbeReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Polls a readiness check under a retry policy
#[derive(Debug, Clone)]
pub struct HealthProber {
    policy: RetryPolicy,
}

impl HealthProber {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Probe until the check succeeds or the attempt budget (or deadline) runs out.
    ///
    /// Returns `Healthy` on the first success without further waiting. There is no
    /// sleep after the final failed attempt.
    pub async fn probe(&self, check: &dyn ReadinessCheck) -> ProbeReport {
        let max_attempts = self.policy.max_attempts.max(1);
        let started = Instant::now();
        // A deadline too far out to represent is no deadline at all
        let deadline = self.policy.deadline.and_then(|d| started.checked_add(d));
        let mut delay = self.policy.interval;
        let mut attempts = 0;
        let mut last_error = None;

        debug!("Probing {} (up to {} attempts)", check.describe(), max_attempts);

        while attempts < max_attempts {
            attempts += 1;

            let result = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match timeout(remaining, check.check()).await {
                        Ok(result) => result,
                        Err(_) => Err("deadline reached during readiness request".to_string()),
                    }
                }
                None => check.check().await,
            };

            match result {
                Ok(()) => {
                    info!("{} is ready after {} attempt(s)", check.describe(), attempts);
                    return self.report(HealthStatus::Healthy, attempts, started, None);
                }
                Err(e) => {
                    debug!("Readiness attempt {}/{} failed: {}", attempts, max_attempts, e);
                    last_error = Some(e);
                }
            }

            if attempts == max_attempts {
                break;
            }

            let pause = self.policy.jittered(delay);
            if let Some(deadline) = deadline {
                if Instant::now() + pause >= deadline {
                    warn!("Probe deadline reached after {} attempt(s)", attempts);
                    break;
                }
            }
            sleep(pause).await;
            delay = self.policy.next_delay(delay);
        }

        warn!(
            "{} not ready after {} attempt(s): {}",
            check.describe(),
            attempts,
            last_error.as_deref().unwrap_or("no response")
        );
        self.report(HealthStatus::Unhealthy, attempts, started, last_error)
    }

    fn report(
        &self,
        status: HealthStatus,
        attempts: u32,
        started: Instant,
        last_error: Option<String>,
    ) -> ProbeReport {
        ProbeReport {
            status,
            attempts,
            elapsed_ms: started.elapsed().as_millis() as u64,
            last_error,
            checked_at: Utc::now(),
        }
    }
}

impl Default for HealthProber {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
