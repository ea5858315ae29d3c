use crate::container::health::{HealthStatus, ProbeReport};
use crate::container::manager::StartedInstance;
use crate::container::runtime::LifecycleState;
use crate::drift::detector::{DriftStatus, Remediation};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Operator-issued verbs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start { model: Option<String> },
    Stop,
    Restart { model: Option<String> },
    Status,
    Check,
    Models,
    Logs { tail: Option<u32> },
}

/// Result of a command, printed to stdout
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Report {
    Started {
        instance: StartedInstance,
        health: Option<ProbeReport>,
    },
    Restarted {
        instance: StartedInstance,
        health: Option<ProbeReport>,
    },
    Stopped {
        instance: String,
        removed: bool,
    },
    Status(StatusReport),
    Checked {
        remediation: Remediation,
        health: Option<ProbeReport>,
    },
    Models {
        models: Vec<ModelLine>,
    },
    Logs {
        instance: String,
        output: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub instance: String,
    pub state: LifecycleState,
    pub started_at: Option<DateTime<Utc>>,
    pub model: Option<String>,
    /// Why the running model could not be determined
    pub unknown_reason: Option<String>,
    pub desired: Option<String>,
    pub drift: Option<DriftStatus>,
    pub health: HealthStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelLine {
    pub name: String,
    pub artifact: Option<String>,
    pub error: Option<String>,
}

fn write_health(f: &mut fmt::Formatter<'_>, health: &Option<ProbeReport>) -> fmt::Result {
    match health {
        Some(report) => writeln!(
            f,
            "health: {} after {} attempt(s) in {}ms",
            report.status, report.attempts, report.elapsed_ms
        ),
        None => writeln!(f, "health: not checked"),
    }
}

fn write_started(f: &mut fmt::Formatter<'_>, verb: &str, instance: &StartedInstance) -> fmt::Result {
    writeln!(
        f,
        "{} {} with model {} ({}), container {}",
        verb, instance.instance, instance.model, instance.artifact, instance.container_id
    )
}

impl fmt::Display for DriftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftStatus::Consistent { model } => write!(f, "consistent ({})", model),
            DriftStatus::Drifted { desired, observed } => {
                write!(f, "drifted (desired {}, running {})", desired, observed)
            }
            DriftStatus::NoInstanceRunning => write!(f, "no instance running"),
            DriftStatus::NoConfiguration => write!(f, "no default model configured"),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Started { instance, health } => {
                write_started(f, "Started", instance)?;
                write_health(f, health)
            }
            Report::Restarted { instance, health } => {
                write_started(f, "Restarted", instance)?;
                write_health(f, health)
            }
            Report::Stopped { instance, removed } => {
                if *removed {
                    writeln!(f, "Stopped and removed {}", instance)
                } else {
                    writeln!(f, "{} is not running", instance)
                }
            }
            Report::Status(status) => {
                writeln!(f, "instance: {}", status.instance)?;
                match status.started_at {
                    Some(started) if status.state == LifecycleState::Running => {
                        writeln!(f, "state:    {} (since {})", status.state, started.to_rfc3339())?
                    }
                    _ => writeln!(f, "state:    {}", status.state)?,
                }
                match (&status.model, &status.unknown_reason) {
                    (Some(model), _) => writeln!(f, "model:    {}", model)?,
                    (None, Some(reason)) => writeln!(f, "model:    unknown ({})", reason)?,
                    (None, None) => writeln!(f, "model:    -")?,
                }
                writeln!(f, "desired:  {}", status.desired.as_deref().unwrap_or("-"))?;
                match &status.drift {
                    Some(drift) => writeln!(f, "drift:    {}", drift)?,
                    None => writeln!(f, "drift:    undetermined")?,
                }
                writeln!(f, "health:   {}", status.health)
            }
            Report::Checked { remediation, health } => {
                match remediation {
                    Remediation::None { status } => writeln!(f, "No action needed: {}", status)?,
                    Remediation::Started { instance } => write_started(f, "Started", instance)?,
                    Remediation::Restarted { previous, instance } => {
                        writeln!(f, "Replaced drifted model {}", previous)?;
                        write_started(f, "Restarted", instance)?;
                    }
                }
                if remediation.acted() {
                    write_health(f, health)?;
                }
                Ok(())
            }
            Report::Models { models } => {
                if models.is_empty() {
                    return writeln!(f, "No models found");
                }
                for line in models {
                    match (&line.artifact, &line.error) {
                        (Some(artifact), _) => writeln!(f, "{:<24} {}", line.name, artifact)?,
                        (None, Some(error)) => writeln!(f, "{:<24} ! {}", line.name, error)?,
                        (None, None) => writeln!(f, "{}", line.name)?,
                    }
                }
                Ok(())
            }
            Report::Logs { output, .. } => write!(f, "{}", output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> StartedInstance {
        StartedInstance {
            instance: "inferctl-server".to_string(),
            container_id: "abc".to_string(),
            model: "alpha".to_string(),
            artifact: "alpha.gguf".to_string(),
        }
    }

    #[test]
    fn test_stopped_display() {
        let report = Report::Stopped {
            instance: "inferctl-server".to_string(),
            removed: false,
        };
        assert_eq!(report.to_string(), "inferctl-server is not running\n");
    }

    #[test]
    fn test_started_display_without_health() {
        let report = Report::Started {
            instance: started(),
            health: None,
        };
        assert_eq!(
            report.to_string(),
            "Started inferctl-server with model alpha (alpha.gguf), container abc\nhealth: not checked\n"
        );
    }

    #[test]
    fn test_report_json_shape() {
        let report = Report::Checked {
            remediation: Remediation::None {
                status: DriftStatus::Consistent {
                    model: "alpha".to_string(),
                },
            },
            health: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["command"], "checked");
        assert_eq!(json["remediation"]["action"], "none");
        assert_eq!(json["remediation"]["status"]["status"], "consistent");
        assert_eq!(json["remediation"]["status"]["model"], "alpha");
    }
}
