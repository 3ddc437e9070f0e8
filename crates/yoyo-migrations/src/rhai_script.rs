//! A [`CodeScriptProvider`] backed by [`rhai`], standing in for spec §9's
//! "embedded scripting engine with a `connection` host object" strategy.
//!
//! Simplification: rather than marshal a live async [`DatabaseBackend`]
//! handle into Rhai's synchronous engine, a `.rhai` migration declares its
//! steps data-first — top-level `depends`, `transactional`, and `steps`
//! (an array of `#{ apply, rollback, ignore_errors }` maps) — which this
//! provider evaluates once at load time into ordinary SQL [`Step`]s. This
//! keeps the callable/opaque-script seam real (the `CodeScriptProvider`
//! trait) without building a connection FFI layer the spec only asks for
//! as an extension point.

use std::path::Path;

use rhai::{Engine, Scope};

use yoyo_core::YoyoError;

use crate::loader::{CodeScriptProvider, CodeScriptResult};
use crate::migration::{IgnoreErrors, Payload, Step};

pub struct RhaiScriptProvider {
    engine: Engine,
}

impl Default for RhaiScriptProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RhaiScriptProvider {
    pub fn new() -> Self {
        Self {
            engine: Engine::new(),
        }
    }
}

impl CodeScriptProvider for RhaiScriptProvider {
    fn handles_extension(&self, extension: &str) -> bool {
        extension.eq_ignore_ascii_case("rhai")
    }

    fn load(&self, path: &Path) -> Result<CodeScriptResult, YoyoError> {
        let malformed = |reason: String| YoyoError::MalformedMigration {
            path: path.display().to_string(),
            reason,
        };

        let mut scope = Scope::new();
        self.engine
            .run_file_with_scope(&mut scope, path.to_path_buf())
            .map_err(|e| malformed(e.to_string()))?;

        let transactional = scope.get_value::<bool>("transactional").unwrap_or(true);

        let depends_on = scope
            .get_value::<rhai::Array>("depends")
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| v.into_string().ok())
            .collect();

        let steps_array: rhai::Array = scope
            .get_value("steps")
            .ok_or_else(|| malformed("script must define a top-level `steps` array".to_string()))?;

        let mut steps = Vec::with_capacity(steps_array.len());
        for item in steps_array {
            let map: rhai::Map = item
                .try_cast()
                .ok_or_else(|| malformed("each entry in `steps` must be a map".to_string()))?;

            let apply = map
                .get("apply")
                .and_then(|v| v.clone().into_string().ok())
                .ok_or_else(|| malformed("step map must have a string `apply` key".to_string()))?;

            let rollback = map.get("rollback").and_then(|v| v.clone().into_string().ok());

            let ignore_errors = match map.get("ignore_errors").and_then(|v| v.clone().into_string().ok()).as_deref() {
                Some("apply") => IgnoreErrors::Apply,
                Some("rollback") => IgnoreErrors::Rollback,
                Some("all") => IgnoreErrors::All,
                _ => IgnoreErrors::None,
            };

            steps.push(Step {
                apply: Payload::Sql(apply),
                rollback: rollback.map(Payload::Sql),
                ignore_errors,
            });
        }

        Ok(CodeScriptResult {
            steps,
            depends_on,
            transactional,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_basic_rhai_migration() {
        let mut file = tempfile::Builder::new().suffix(".rhai").tempfile().unwrap();
        writeln!(
            file,
            r#"
            let depends = ["0001"];
            let transactional = false;
            let steps = [
                #{{ apply: "ALTER TABLE t ADD c INT", rollback: "ALTER TABLE t DROP COLUMN c" }},
            ];
            "#
        )
        .unwrap();

        let provider = RhaiScriptProvider::new();
        let result = provider.load(file.path()).unwrap();
        assert!(!result.transactional);
        assert!(result.depends_on.contains("0001"));
        assert_eq!(result.steps.len(), 1);
        match &result.steps[0].apply {
            Payload::Sql(sql) => assert!(sql.contains("ADD c INT")),
            _ => panic!("expected sql payload"),
        }
    }

    #[test]
    fn test_handles_extension_case_insensitive() {
        let provider = RhaiScriptProvider::new();
        assert!(provider.handles_extension("rhai"));
        assert!(provider.handles_extension("RHAI"));
        assert!(!provider.handles_extension("sql"));
    }

    #[test]
    fn test_missing_steps_array_is_malformed() {
        let mut file = tempfile::Builder::new().suffix(".rhai").tempfile().unwrap();
        writeln!(file, "let depends = [];").unwrap();

        let provider = RhaiScriptProvider::new();
        let result = provider.load(file.path());
        assert!(matches!(result, Err(YoyoError::MalformedMigration { .. })));
    }
}
