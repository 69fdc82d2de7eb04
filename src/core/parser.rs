//! YAML parsing and descriptor validation.
//!
//! Validation runs before any control-plane call and reports every finding:
//! - version must be "1.0", stack name well-formed
//! - role and depends_on references must resolve to declared resources
//! - required attributes per resource kind and packaging kind
//! - timeout/memory bounds, identifier patterns

use super::types::*;
use crate::error::{LanzarError, Result, ValidationError};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Resource ids: lowercase, digits, `-` and `_`, max 63 chars.
fn id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_-]{0,62}$").unwrap())
}

/// Control-plane names for roles and functions, max 64 chars.
fn name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap())
}

pub const TIMEOUT_RANGE: std::ops::RangeInclusive<u64> = 1..=900;
pub const MEMORY_RANGE: std::ops::RangeInclusive<u32> = 128..=10240;

/// Parse a lanzar.yaml file from disk.
pub fn parse_config_file(path: &Path) -> Result<StackConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| LanzarError::io(format!("cannot read {}", path.display()), e))?;
    parse_config(&content)
}

/// Parse a lanzar.yaml from a string.
pub fn parse_config(yaml: &str) -> Result<StackConfig> {
    Ok(serde_yaml_ng::from_str(yaml)?)
}

/// Parse and validate in one step. Returns the descriptor only if every
/// finding list is empty.
pub fn assemble_config(yaml: &str) -> Result<StackConfig> {
    let config = parse_config(yaml)?;
    let errors = validate_config(&config);
    if errors.is_empty() {
        Ok(config)
    } else {
        Err(LanzarError::Validation(errors))
    }
}

/// Validate a parsed config. Returns a list of findings (empty = valid).
pub fn validate_config(config: &StackConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(ValidationError::stack(format!(
            "version must be \"1.0\", got \"{}\"",
            config.version
        )));
    }

    if config.name.is_empty() {
        errors.push(ValidationError::stack("name must not be empty"));
    } else if !id_pattern().is_match(&config.name) {
        errors.push(ValidationError::stack(format!(
            "stack name '{}' is not a valid identifier",
            config.name
        )));
    }

    for (id, resource) in &config.resources {
        if !id_pattern().is_match(id) {
            errors.push(ValidationError::resource(
                id,
                "id must be lowercase alphanumeric with '-' or '_', max 63 chars",
            ));
        }

        for dep in resource.depends_on() {
            if !config.resources.contains_key(dep) {
                errors.push(ValidationError::resource(
                    id,
                    format!("depends on unknown resource '{}'", dep),
                ));
            }
            if dep == id {
                errors.push(ValidationError::resource(id, "depends on itself"));
            }
        }

        match resource {
            Resource::Role(role) => validate_role(id, role, &mut errors),
            Resource::Function(function) => {
                validate_function(id, function, config, &mut errors);
            }
        }
    }

    errors
}

fn validate_role(id: &str, role: &RoleSpec, errors: &mut Vec<ValidationError>) {
    if role.trust.is_empty() {
        errors.push(ValidationError::resource(id, "role has no trust principal"));
    }

    if let Some(ref name) = role.name {
        if !name_pattern().is_match(name) {
            errors.push(ValidationError::resource(
                id,
                format!("role name '{}' is not a valid control-plane name", name),
            ));
        }
    }

    for (i, statement) in role.statements.iter().enumerate() {
        if statement.actions.is_empty() {
            errors.push(ValidationError::resource(
                id,
                format!("statement {} has no actions", i),
            ));
        }
        if statement.resources.is_empty() {
            errors.push(ValidationError::resource(
                id,
                format!("statement {} has no resources", i),
            ));
        }
    }
}

fn validate_function(
    id: &str,
    function: &FunctionSpec,
    config: &StackConfig,
    errors: &mut Vec<ValidationError>,
) {
    match config.resources.get(&function.role) {
        None => {
            errors.push(ValidationError::resource(
                id,
                format!("references undeclared role '{}'", function.role),
            ));
        }
        Some(target) if target.kind() != ResourceKind::Role => {
            errors.push(ValidationError::resource(
                id,
                format!(
                    "role reference '{}' points at a {} resource",
                    function.role,
                    target.kind()
                ),
            ));
        }
        Some(_) => {}
    }

    if let Some(ref name) = function.name {
        if !name_pattern().is_match(name) {
            errors.push(ValidationError::resource(
                id,
                format!("function name '{}' is not a valid control-plane name", name),
            ));
        }
    }

    match &function.package {
        PackageSpec::Archive { path } => {
            if path.is_empty() {
                errors.push(ValidationError::resource(id, "archive package has no path"));
            }
            if function.handler.is_none() {
                errors.push(ValidationError::resource(
                    id,
                    "archive-packaged function has no handler",
                ));
            }
            if function.runtime.is_none() {
                errors.push(ValidationError::resource(
                    id,
                    "archive-packaged function has no runtime",
                ));
            }
        }
        PackageSpec::Image { context, cmd } => {
            if context.is_empty() {
                errors.push(ValidationError::resource(
                    id,
                    "image package has no build context",
                ));
            }
            if cmd.is_empty() {
                errors.push(ValidationError::resource(
                    id,
                    "image package has no entry command",
                ));
            }
        }
    }

    if !TIMEOUT_RANGE.contains(&function.timeout) {
        errors.push(ValidationError::resource(
            id,
            format!(
                "timeout {}s outside {}..={}s",
                function.timeout,
                TIMEOUT_RANGE.start(),
                TIMEOUT_RANGE.end()
            ),
        ));
    }

    if !MEMORY_RANGE.contains(&function.memory) {
        errors.push(ValidationError::resource(
            id,
            format!(
                "memory {}MB outside {}..={}MB",
                function.memory,
                MEMORY_RANGE.start(),
                MEMORY_RANGE.end()
            ),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
version: "1.0"
name: data-pipeline
resources:
  exec-role:
    type: role
    trust: lambda.amazonaws.com
    statements:
      - actions: [s3:GetObject]
        resources: ["arn:aws:s3:::data/*"]
  fetch-zip:
    type: function
    role: exec-role
    package:
      kind: archive
      path: dist/fetch.zip
    handler: fetch.handler
    runtime: python3.12
    timeout: 10
  fetch-image:
    type: function
    role: exec-role
    package:
      kind: image
      context: app
      cmd: [fetch.handler]
    timeout: 10
"#;

    #[test]
    fn test_parser_valid() {
        let config = parse_config(VALID).unwrap();
        let errors = validate_config(&config);
        assert!(
            errors.is_empty(),
            "unexpected errors: {:?}",
            errors.iter().map(|e| e.to_string()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_parser_assemble_valid() {
        let config = assemble_config(VALID).unwrap();
        assert_eq!(config.resources.len(), 3);
    }

    #[test]
    fn test_parser_bad_version() {
        let yaml = r#"
version: "2.0"
name: test
resources: {}
"#;
        let config = parse_config(yaml).unwrap();
        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| e.message.contains("version")));
    }

    #[test]
    fn test_parser_undeclared_role_reference() {
        let yaml = r#"
version: "1.0"
name: test
resources:
  orphan:
    type: function
    role: ghost-role
    package:
      kind: archive
      path: dist/a.zip
    handler: a.handler
    runtime: python3.12
"#;
        let config = parse_config(yaml).unwrap();
        let errors = validate_config(&config);
        assert!(errors
            .iter()
            .any(|e| e.message.contains("undeclared role 'ghost-role'")));

        // Assembly aborts with a typed validation error
        let err = assemble_config(yaml).unwrap_err();
        assert!(matches!(err, LanzarError::Validation(_)));
    }

    #[test]
    fn test_parser_role_reference_to_non_role() {
        let yaml = r#"
version: "1.0"
name: test
resources:
  other-fn:
    type: function
    role: exec-role
    package:
      kind: image
      context: app
      cmd: [a.handler]
  exec-role:
    type: role
    trust: lambda.amazonaws.com
  bad-fn:
    type: function
    role: other-fn
    package:
      kind: image
      context: app
      cmd: [b.handler]
"#;
        let config = parse_config(yaml).unwrap();
        let errors = validate_config(&config);
        assert!(errors
            .iter()
            .any(|e| e.message.contains("points at a function resource")));
    }

    #[test]
    fn test_parser_unknown_dependency() {
        let yaml = r#"
version: "1.0"
name: test
resources:
  exec-role:
    type: role
    trust: lambda.amazonaws.com
    depends_on: [ghost]
"#;
        let config = parse_config(yaml).unwrap();
        let errors = validate_config(&config);
        assert!(errors
            .iter()
            .any(|e| e.message.contains("unknown resource 'ghost'")));
    }

    #[test]
    fn test_parser_self_dependency() {
        let yaml = r#"
version: "1.0"
name: test
resources:
  exec-role:
    type: role
    trust: lambda.amazonaws.com
    depends_on: [exec-role]
"#;
        let config = parse_config(yaml).unwrap();
        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| e.message.contains("depends on itself")));
    }

    #[test]
    fn test_parser_archive_requires_handler_and_runtime() {
        let yaml = r#"
version: "1.0"
name: test
resources:
  exec-role:
    type: role
    trust: lambda.amazonaws.com
  bare:
    type: function
    role: exec-role
    package:
      kind: archive
      path: dist/a.zip
"#;
        let config = parse_config(yaml).unwrap();
        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| e.message.contains("no handler")));
        assert!(errors.iter().any(|e| e.message.contains("no runtime")));
    }

    #[test]
    fn test_parser_image_requires_cmd() {
        let yaml = r#"
version: "1.0"
name: test
resources:
  exec-role:
    type: role
    trust: lambda.amazonaws.com
  img:
    type: function
    role: exec-role
    package:
      kind: image
      context: app
"#;
        let config = parse_config(yaml).unwrap();
        let errors = validate_config(&config);
        assert!(errors
            .iter()
            .any(|e| e.message.contains("no entry command")));
    }

    #[test]
    fn test_parser_role_requires_trust() {
        let yaml = r#"
version: "1.0"
name: test
resources:
  exec-role:
    type: role
    trust: ""
"#;
        let config = parse_config(yaml).unwrap();
        let errors = validate_config(&config);
        assert!(errors
            .iter()
            .any(|e| e.message.contains("no trust principal")));
    }

    #[test]
    fn test_parser_timeout_bounds() {
        let yaml = r#"
version: "1.0"
name: test
resources:
  exec-role:
    type: role
    trust: lambda.amazonaws.com
  slow:
    type: function
    role: exec-role
    package:
      kind: image
      context: app
      cmd: [a.handler]
    timeout: 901
"#;
        let config = parse_config(yaml).unwrap();
        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| e.message.contains("timeout 901s")));
    }

    #[test]
    fn test_parser_memory_bounds() {
        let yaml = r#"
version: "1.0"
name: test
resources:
  exec-role:
    type: role
    trust: lambda.amazonaws.com
  tiny:
    type: function
    role: exec-role
    package:
      kind: image
      context: app
      cmd: [a.handler]
    memory: 64
"#;
        let config = parse_config(yaml).unwrap();
        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| e.message.contains("memory 64MB")));
    }

    #[test]
    fn test_parser_bad_resource_id() {
        let yaml = r#"
version: "1.0"
name: test
resources:
  BadName:
    type: role
    trust: lambda.amazonaws.com
"#;
        let config = parse_config(yaml).unwrap();
        let errors = validate_config(&config);
        assert!(errors
            .iter()
            .any(|e| e.message.contains("lowercase alphanumeric")));
    }

    #[test]
    fn test_parser_bad_cloud_name() {
        let yaml = r#"
version: "1.0"
name: test
resources:
  exec-role:
    type: role
    trust: lambda.amazonaws.com
    name: "spaces are bad"
"#;
        let config = parse_config(yaml).unwrap();
        let errors = validate_config(&config);
        assert!(errors
            .iter()
            .any(|e| e.message.contains("not a valid control-plane name")));
    }

    #[test]
    fn test_parser_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lanzar.yaml");
        std::fs::write(
            &path,
            r#"
version: "1.0"
name: file-test
resources: {}
"#,
        )
        .unwrap();
        let config = parse_config_file(&path).unwrap();
        assert_eq!(config.name, "file-test");
    }

    #[test]
    fn test_parser_parse_invalid_yaml() {
        let result = parse_config("not: [valid: yaml: {{");
        assert!(result.is_err());
    }
}
