//! Core domain layer for Stencil.
//!
//! This module contains the pure logic of blueprint resolution and secure
//! rendering. Filesystem access is handled via ports defined in the
//! application layer.
//!
//! ## Hexagonal Architecture Compliance
//!
//! - **No async**: Domain logic is synchronous
//! - **No I/O**: No filesystem, network, or external calls
//! - **Immutable inputs**: manifests and contexts are never mutated during a run
//! - **Errors are data**: every failure is a value, collected and returned
//!
//! ## Pipeline pieces
//!
//! | Module | Role |
//! |--------|------|
//! | [`entities::context`] | merges variable layers into a [`VariableContext`] |
//! | [`condition`] | parses and evaluates inclusion conditions |
//! | [`resolver`] | selects files, dependencies and hooks for one context |
//! | [`security`] | static template and path checks |
//! | [`template`] | the template engine |
//! | [`limits`] | file, directory and byte ceilings |

pub mod condition;
pub mod entities;
pub mod error;
pub mod limits;
pub mod resolver;
pub mod security;
pub mod template;
pub mod value_objects;

mod validation;

pub use condition::{Condition, Operand};
pub use entities::{
    common::RelativePath,
    context::{ContextBuilder, ContextEntry, ContextLayers, ValueOrigin, VariableContext},
    manifest::{
        Blueprint, BlueprintId, BlueprintManifest, DependencySpec, FileEntry, HookSpec,
        VariableSpec,
    },
    resolved::{PlannedFile, Resolution, ResolvedFile, ResolvedFileSet, ResolvedHook},
};
pub use error::{DomainError, ErrorCategory as DomainErrorCategory};
pub use limits::{MIB, ResourceLimiter, ResourceLimits, ResourceUsage, check_usage};
pub use resolver::{CompiledManifest, ManifestResolver};
pub use security::{SecurityPolicy, SecurityValidator, ValidationViolation, ViolationKind};
pub use template::{DEFAULT_MAX_STEPS, RenderBudget, RenderError, Template};
pub use validation::DomainValidator;
pub use value_objects::{InputValue, ValueMap, VariableType, VariableValue};

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // End-to-end domain flow
    // ========================================================================

    fn blueprint() -> Blueprint {
        let manifest = BlueprintManifest::new("go-service", "1.0.0")
            .with_variable(VariableSpec::string("ProjectName").required())
            .with_variable(VariableSpec::enumeration("AuthType", ["", "jwt", "oauth"]).with_default(""))
            .with_file(FileEntry::new("main.go.tmpl", "main.go"))
            .with_file(FileEntry::new("auth.go.tmpl", "internal/auth/auth.go").when(r#"ne .AuthType """#))
            .with_dependency(DependencySpec::new("github.com/golang-jwt/jwt/v5", "v5.2.1").when(r#"eq .AuthType "jwt""#));
        Blueprint::new(manifest)
            .with_source("main.go.tmpl", "package main // {{.ProjectName}}\n")
            .with_source("auth.go.tmpl", "package auth // {{.AuthType | upper}}\n")
    }

    fn build(bp: &Blueprint, auth: &str) -> VariableContext {
        ContextBuilder::new(&bp.manifest.variables)
            .layers(
                ContextLayers::default()
                    .with_override("ProjectName", "orders")
                    .with_override("AuthType", auth),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn blueprint_validates_resolves_and_renders() {
        let bp = blueprint();
        DomainValidator::validate_blueprint(&bp).unwrap();

        let ctx = build(&bp, "jwt");
        let compiled = CompiledManifest::compile(&bp.manifest).unwrap();
        let resolution = ManifestResolver::new().resolve(&compiled, &ctx).unwrap();
        assert_eq!(resolution.files.len(), 2);
        assert_eq!(resolution.dependencies.len(), 1);

        let validator = SecurityValidator::default();
        for file in &resolution.files {
            let source = bp.source(&file.source).unwrap();
            assert!(validator.validate_template(&file.source, source).is_empty());
            assert!(validator.validate_path(&file.raw_destination).is_empty());
        }

        let auth = Template::parse("auth.go.tmpl", bp.source("auth.go.tmpl").unwrap()).unwrap();
        assert_eq!(auth.render(&ctx).unwrap(), "package auth // JWT\n");
    }

    #[test]
    fn empty_auth_type_drops_the_file_and_dependency() {
        let bp = blueprint();
        let ctx = build(&bp, "");
        let resolution = resolver::resolve(&bp.manifest, &ctx).unwrap();
        assert_eq!(resolution.files.len(), 1);
        assert!(resolution.dependencies.is_empty());
    }

    #[test]
    fn missing_required_variable_stops_context_build() {
        let bp = blueprint();
        let errors = ContextBuilder::new(&bp.manifest.variables).build().unwrap_err();
        assert_eq!(
            errors,
            vec![DomainError::MissingRequiredVariable {
                name: "ProjectName".into()
            }]
        );
    }
}
