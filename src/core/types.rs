//! Descriptor schema types — stacks, resources, policy, state locks, plan,
//! and provenance events.
//!
//! Config types derive Serialize/Deserialize for YAML roundtripping and
//! JsonSchema for `lanzar schema`. Resources are a closed set of tagged
//! variants with statically known attributes.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Top-level lanzar.yaml
// ============================================================================

/// Root configuration — the desired state of one stack.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StackConfig {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Stack name
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Global parameters, referenced as `{{params.key}}` in string attributes
    #[serde(default)]
    pub params: IndexMap<String, String>,

    /// Resource declarations (order-preserving — declaration order breaks
    /// application-order ties)
    pub resources: IndexMap<String, Resource>,

    /// Execution policy
    #[serde(default)]
    pub policy: Policy,
}

// ============================================================================
// Resources
// ============================================================================

/// A single declared resource. One variant per resource kind.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Resource {
    Role(RoleSpec),
    Function(FunctionSpec),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Role(_) => ResourceKind::Role,
            Self::Function(_) => ResourceKind::Function,
        }
    }

    pub fn depends_on(&self) -> &[String] {
        match self {
            Self::Role(r) => &r.depends_on,
            Self::Function(f) => &f.depends_on,
        }
    }

    /// All resource ids this resource references: explicit `depends_on`
    /// entries plus the implicit role reference of a function. Duplicates
    /// removed, first occurrence wins.
    pub fn references(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = self.depends_on().iter().map(String::as_str).collect();
        if let Self::Function(f) = self {
            refs.push(f.role.as_str());
        }
        let mut seen = Vec::with_capacity(refs.len());
        for r in refs {
            if !seen.contains(&r) {
                seen.push(r);
            }
        }
        seen
    }

    pub fn presence(&self) -> Presence {
        match self {
            Self::Role(r) => r.state,
            Self::Function(f) => f.state,
        }
    }
}

/// Resource kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Role,
    Function,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role => write!(f, "role"),
            Self::Function => write!(f, "function"),
        }
    }
}

/// Whether the resource should exist on the control plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    #[default]
    Present,
    /// Marked for destroy on the next apply.
    Absent,
}

/// An identity role: who may assume it, what it may do.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RoleSpec {
    /// Control-plane name (defaults to the resource id)
    #[serde(default)]
    pub name: Option<String>,

    /// Service principal allowed to assume the role
    pub trust: String,

    /// Least-privilege permission statements
    #[serde(default)]
    pub statements: Vec<PolicyStatement>,

    /// Pre-existing managed policy identifiers to attach
    #[serde(default)]
    pub managed: Vec<String>,

    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub state: Presence,
}

impl RoleSpec {
    /// Statements the role is materialized with. A role that declares
    /// neither statements nor managed policies gets only a minimal
    /// log-writing grant, never a blanket one.
    pub fn effective_statements(&self) -> Vec<PolicyStatement> {
        if self.statements.is_empty() && self.managed.is_empty() {
            return vec![PolicyStatement {
                effect: Effect::Allow,
                actions: vec![
                    "logs:CreateLogGroup".to_string(),
                    "logs:CreateLogStream".to_string(),
                    "logs:PutLogEvents".to_string(),
                ],
                resources: vec!["*".to_string()],
            }];
        }
        self.statements.clone()
    }
}

/// One permission statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PolicyStatement {
    #[serde(default)]
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

/// A function deployment.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FunctionSpec {
    /// Control-plane name (defaults to the resource id)
    #[serde(default)]
    pub name: Option<String>,

    /// Reference to a declared role resource. The role is shared, not
    /// owned — it outlives any single function.
    pub role: String,

    /// Packaging spec: archive or image
    pub package: PackageSpec,

    /// Entry point (required for archive packaging)
    #[serde(default)]
    pub handler: Option<String>,

    /// Runtime identifier (required for archive packaging)
    #[serde(default)]
    pub runtime: Option<String>,

    /// Execution timeout in seconds — a property of the deployed function,
    /// not of the provisioning run
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Memory in MB
    #[serde(default = "default_memory")]
    pub memory: u32,

    /// Environment variables
    #[serde(default)]
    pub environment: IndexMap<String, String>,

    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub state: Presence,
}

fn default_timeout() -> u64 {
    3
}

fn default_memory() -> u32 {
    128
}

/// How a function's code is packaged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PackageSpec {
    /// A zip archive on disk
    Archive { path: String },
    /// A container image built from a context directory
    Image {
        context: String,
        #[serde(default)]
        cmd: Vec<String>,
    },
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Archive { .. } => write!(f, "archive"),
            Self::Image { .. } => write!(f, "image"),
        }
    }
}

// ============================================================================
// Policy
// ============================================================================

/// Execution policy for apply runs.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Policy {
    /// Failure handling
    #[serde(default)]
    pub failure: FailurePolicy,

    /// Append provenance events on every apply
    #[serde(default = "default_true")]
    pub provenance: bool,

    /// Persist the state lock after apply
    #[serde(default = "default_true")]
    pub lock_file: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            failure: FailurePolicy::default(),
            provenance: true,
            lock_file: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Failure handling strategy. Either way, nothing is rolled back —
/// idempotent re-run is the recovery mechanism.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    StopOnFirst,
    ContinueIndependent,
}

// ============================================================================
// State / Lock file
// ============================================================================

/// Per-stack convergence lock file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateLock {
    /// Schema version
    pub schema: String,

    /// Stack name
    pub stack: String,

    /// When the lock was generated
    pub generated_at: String,

    /// Generator version
    pub generator: String,

    /// Per-resource state
    pub resources: IndexMap<String, ResourceLock>,
}

/// Per-resource lock entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLock {
    /// Resource kind
    #[serde(rename = "type")]
    pub resource_kind: ResourceKind,

    /// Convergence status
    pub status: ResourceStatus,

    /// When the resource was last applied
    #[serde(default)]
    pub applied_at: Option<String>,

    /// Duration of last apply in seconds
    #[serde(default)]
    pub duration_seconds: Option<f64>,

    /// BLAKE3 hash of the resource's desired state
    pub hash: String,

    /// Control-plane identifier, if materialized
    #[serde(default)]
    pub handle: Option<String>,

    /// Resource-specific details
    #[serde(default)]
    pub details: IndexMap<String, String>,
}

/// Resource convergence status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Converged,
    Failed,
    Drifted,
    Unknown,
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Converged => write!(f, "CONVERGED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Drifted => write!(f, "DRIFTED"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ============================================================================
// Plan
// ============================================================================

/// Action to take on a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    Create,
    Update,
    Destroy,
    NoOp,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Update => write!(f, "UPDATE"),
            Self::Destroy => write!(f, "DESTROY"),
            Self::NoOp => write!(f, "NO-OP"),
        }
    }
}

/// A single planned change.
#[derive(Debug, Clone)]
pub struct PlannedChange {
    /// Resource id
    pub resource_id: String,

    /// Resource kind
    pub resource_kind: ResourceKind,

    /// Action to take
    pub action: PlanAction,

    /// Human-readable description
    pub description: String,
}

/// Full execution plan.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Stack name
    pub name: String,

    /// Planned changes in application order
    pub changes: Vec<PlannedChange>,

    /// Topological application order (resource ids)
    pub execution_order: Vec<String>,

    /// Summary counts
    pub to_create: u32,
    pub to_update: u32,
    pub to_destroy: u32,
    pub unchanged: u32,
}

// ============================================================================
// Provenance events
// ============================================================================

/// Provenance event for the JSONL event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvenanceEvent {
    ApplyStarted {
        stack: String,
        run_id: String,
        lanzar_version: String,
    },
    ResourceStarted {
        stack: String,
        resource: String,
        action: String,
    },
    ResourceConverged {
        stack: String,
        resource: String,
        duration_seconds: f64,
        hash: String,
    },
    ResourceDestroyed {
        stack: String,
        resource: String,
    },
    ResourceFailed {
        stack: String,
        resource: String,
        error: String,
    },
    ApplyCompleted {
        stack: String,
        run_id: String,
        resources_converged: u32,
        resources_unchanged: u32,
        resources_failed: u32,
        total_seconds: f64,
    },
    DriftDetected {
        stack: String,
        resource: String,
        expected_hash: String,
        actual_hash: String,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: ProvenanceEvent,
}

// ============================================================================
// Apply result
// ============================================================================

/// Result of one apply run.
#[derive(Debug, Clone)]
pub struct ApplyResult {
    pub stack: String,
    pub resources_converged: u32,
    pub resources_unchanged: u32,
    pub resources_failed: u32,
    pub total_duration: std::time::Duration,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_types_config_parse() {
        let yaml = r#"
version: "1.0"
name: data-pipeline
params:
  region: eu-west-1
resources:
  exec-role:
    type: role
    trust: lambda.amazonaws.com
  fetch-zip:
    type: function
    role: exec-role
    package:
      kind: archive
      path: dist/fetch.zip
    handler: fetch.handler
    runtime: python3.12
    timeout: 10
policy:
  failure: stop_on_first
  provenance: true
  lock_file: true
"#;
        let config: StackConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.name, "data-pipeline");
        assert_eq!(config.resources.len(), 2);
        assert_eq!(config.resources["exec-role"].kind(), ResourceKind::Role);
        assert_eq!(
            config.resources["fetch-zip"].kind(),
            ResourceKind::Function
        );
    }

    #[test]
    fn test_types_function_defaults() {
        let yaml = r#"
type: function
role: exec-role
package:
  kind: image
  context: app
  cmd: [app.handler]
"#;
        let r: Resource = serde_yaml_ng::from_str(yaml).unwrap();
        let Resource::Function(f) = r else {
            panic!("expected function")
        };
        assert_eq!(f.timeout, 3);
        assert_eq!(f.memory, 128);
        assert!(f.environment.is_empty());
        assert_eq!(f.state, Presence::Present);
    }

    #[test]
    fn test_types_package_tagged_parse() {
        let archive: PackageSpec =
            serde_yaml_ng::from_str("kind: archive\npath: dist/a.zip\n").unwrap();
        assert_eq!(
            archive,
            PackageSpec::Archive {
                path: "dist/a.zip".to_string()
            }
        );
        let image: PackageSpec =
            serde_yaml_ng::from_str("kind: image\ncontext: app\ncmd: [app.handler]\n").unwrap();
        assert_eq!(image.to_string(), "image");
        assert_eq!(archive.to_string(), "archive");
    }

    #[test]
    fn test_types_references_include_role() {
        let yaml = r#"
type: function
role: exec-role
depends_on: [staging-bucket]
package:
  kind: archive
  path: dist/a.zip
handler: a.handler
runtime: python3.12
"#;
        let r: Resource = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(r.references(), vec!["staging-bucket", "exec-role"]);
    }

    #[test]
    fn test_types_references_dedupe() {
        let yaml = r#"
type: function
role: exec-role
depends_on: [exec-role]
package:
  kind: archive
  path: dist/a.zip
"#;
        let r: Resource = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(r.references(), vec!["exec-role"]);
    }

    #[test]
    fn test_types_role_least_privilege_default() {
        let role = RoleSpec {
            name: None,
            trust: "lambda.amazonaws.com".to_string(),
            statements: vec![],
            managed: vec![],
            depends_on: vec![],
            state: Presence::Present,
        };
        let statements = role.effective_statements();
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].effect, Effect::Allow);
        assert!(statements[0].actions.iter().all(|a| a.starts_with("logs:")));
    }

    #[test]
    fn test_types_role_explicit_statements_kept() {
        let role = RoleSpec {
            name: None,
            trust: "lambda.amazonaws.com".to_string(),
            statements: vec![PolicyStatement {
                effect: Effect::Allow,
                actions: vec!["s3:GetObject".to_string()],
                resources: vec!["arn:aws:s3:::data/*".to_string()],
            }],
            managed: vec![],
            depends_on: vec![],
            state: Presence::Present,
        };
        let statements = role.effective_statements();
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].actions, vec!["s3:GetObject"]);
    }

    #[test]
    fn test_types_role_managed_only_no_injected_statements() {
        let role = RoleSpec {
            name: None,
            trust: "lambda.amazonaws.com".to_string(),
            statements: vec![],
            managed: vec!["service-role/BasicExecution".to_string()],
            depends_on: vec![],
            state: Presence::Present,
        };
        assert!(role.effective_statements().is_empty());
    }

    #[test]
    fn test_types_policy_defaults() {
        let p = Policy::default();
        assert_eq!(p.failure, FailurePolicy::StopOnFirst);
        assert!(p.provenance);
        assert!(p.lock_file);
    }

    #[test]
    fn test_types_display() {
        assert_eq!(ResourceKind::Role.to_string(), "role");
        assert_eq!(ResourceKind::Function.to_string(), "function");
        assert_eq!(ResourceStatus::Converged.to_string(), "CONVERGED");
        assert_eq!(ResourceStatus::Drifted.to_string(), "DRIFTED");
        assert_eq!(PlanAction::Create.to_string(), "CREATE");
        assert_eq!(PlanAction::NoOp.to_string(), "NO-OP");
    }

    #[test]
    fn test_types_state_lock_roundtrip() {
        let lock = StateLock {
            schema: "1.0".to_string(),
            stack: "data-pipeline".to_string(),
            generated_at: "2026-06-01T10:00:00Z".to_string(),
            generator: "lanzar 0.3.1".to_string(),
            resources: IndexMap::from([(
                "exec-role".to_string(),
                ResourceLock {
                    resource_kind: ResourceKind::Role,
                    status: ResourceStatus::Converged,
                    applied_at: Some("2026-06-01T10:00:01Z".to_string()),
                    duration_seconds: Some(0.8),
                    hash: "blake3:abc123".to_string(),
                    handle: Some("local:role/exec-role".to_string()),
                    details: IndexMap::new(),
                },
            )]),
        };
        let yaml = serde_yaml_ng::to_string(&lock).unwrap();
        let lock2: StateLock = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(lock2.stack, "data-pipeline");
        assert_eq!(
            lock2.resources["exec-role"].status,
            ResourceStatus::Converged
        );
        assert_eq!(
            lock2.resources["exec-role"].handle.as_deref(),
            Some("local:role/exec-role")
        );
    }

    #[test]
    fn test_types_provenance_event_serde() {
        let event = ProvenanceEvent::ApplyStarted {
            stack: "data-pipeline".to_string(),
            run_id: "r-abc".to_string(),
            lanzar_version: "0.3.1".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"apply_started\""));
        assert!(json.contains("\"run_id\":\"r-abc\""));
    }

    #[test]
    fn test_types_presence_absent_parse() {
        let yaml = r#"
type: role
trust: lambda.amazonaws.com
state: absent
"#;
        let r: Resource = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(r.presence(), Presence::Absent);
    }
}
