//! Template rendering on top of [`minijinja`].
//!
//! The engine holds the named template library (registered once from the
//! source tree's templates directory) and the function table. Every render
//! receives the full merged template data as its context.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use minijinja::value::Rest;
use minijinja::{AutoEscape, Environment, Error, ErrorKind, UndefinedBehavior, Value};

/// Function table handed to the engine, keyed by the name templates call.
pub type TemplateFuncs = BTreeMap<String, Value>;

/// Parse `missingkey=...` style options into the undefined-value behaviour.
///
/// # Errors
///
/// Returns an error for an option that is not recognised.
pub fn parse_options(options: &[String]) -> Result<UndefinedBehavior> {
    let mut behavior = UndefinedBehavior::Strict;
    for option in options {
        behavior = match option.as_str() {
            "missingkey=error" => UndefinedBehavior::Strict,
            "missingkey=zero" => UndefinedBehavior::Chainable,
            "missingkey=default" | "missingkey=invalid" => UndefinedBehavior::Lenient,
            other => bail!("{other}: unknown template option"),
        };
    }
    Ok(behavior)
}

/// Template engine with a named template library.
#[derive(Debug)]
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Create an engine with the given undefined-value behaviour and functions.
    #[must_use]
    pub fn new(undefined: UndefinedBehavior, funcs: TemplateFuncs) -> Self {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_undefined_behavior(undefined);
        for (name, func) in funcs {
            env.add_global(name, func);
        }
        Self { env }
    }

    /// Register a named template usable with `{% include "name" %}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the template does not parse.
    pub fn add_template(&mut self, name: &str, source: &str) -> Result<()> {
        self.env
            .add_template_owned(name.to_string(), source.to_string())
            .with_context(|| format!("{name}: failed to parse template"))
    }

    /// Render `source` under `name` with `data` as context.
    ///
    /// # Errors
    ///
    /// Returns an error if the template fails to parse or execute.
    pub fn render(&self, name: &str, source: &[u8], data: &serde_json::Value) -> Result<Vec<u8>> {
        let source = std::str::from_utf8(source)
            .with_context(|| format!("{name}: template is not valid UTF-8"))?;
        let rendered = self
            .env
            .render_named_str(name, source, Value::from_serialize(data))
            .map_err(|err| anyhow::anyhow!("{name}: {err:#}"))?;
        Ok(rendered.into_bytes())
    }
}

/// Build the standard function table.
///
/// `include` reads files relative to `source_dir`.
#[must_use]
pub fn default_funcs(source_dir: &Path) -> TemplateFuncs {
    let mut funcs = TemplateFuncs::new();
    funcs.insert(
        "env".to_string(),
        Value::from_function(|name: String| std::env::var(name).unwrap_or_default()),
    );
    funcs.insert(
        "lookPath".to_string(),
        Value::from_function(|file: String| {
            which::which(file)
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default()
        }),
    );
    funcs.insert(
        "output".to_string(),
        Value::from_function(|program: String, args: Rest<String>| {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            crate::exec::run(&program, &args)
                .map(|result| result.stdout)
                .map_err(|err| Error::new(ErrorKind::InvalidOperation, format!("{err:#}")))
        }),
    );
    funcs.insert(
        "joinPath".to_string(),
        Value::from_function(|parts: Rest<String>| {
            parts
                .iter()
                .fold(PathBuf::new(), |acc, part| acc.join(part))
                .to_string_lossy()
                .into_owned()
        }),
    );
    let root = source_dir.to_path_buf();
    funcs.insert(
        "include".to_string(),
        Value::from_function(move |rel: String| {
            std::fs::read_to_string(root.join(&rel)).map_err(|err| {
                Error::new(ErrorKind::InvalidOperation, format!("{rel}: {err}"))
            })
        }),
    );
    funcs
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> TemplateEngine {
        TemplateEngine::new(UndefinedBehavior::Strict, TemplateFuncs::new())
    }

    fn render(engine: &TemplateEngine, source: &str, data: &serde_json::Value) -> String {
        String::from_utf8(engine.render("t", source.as_bytes(), data).unwrap()).unwrap()
    }

    #[test]
    fn renders_data_and_keeps_trailing_newline() {
        let out = render(&engine(), "hello {{ name }}\n", &json!({"name": "world"}));
        assert_eq!(out, "hello world\n");
    }

    #[test]
    fn missing_key_is_an_error_by_default() {
        let err = engine()
            .render("dot_bashrc.tmpl", b"{{ nope }}", &json!({}))
            .unwrap_err();
        assert!(
            err.to_string().starts_with("dot_bashrc.tmpl:"),
            "got: {err}"
        );
    }

    #[test]
    fn lenient_missing_key_renders_empty() {
        let engine = TemplateEngine::new(
            parse_options(&["missingkey=default".to_string()]).unwrap(),
            TemplateFuncs::new(),
        );
        assert_eq!(render(&engine, "[{{ nope }}]", &json!({})), "[]");
    }

    #[test]
    fn parse_options_rejects_unknown() {
        assert!(parse_options(&["bogus".to_string()]).is_err());
        assert!(matches!(
            parse_options(&[]).unwrap(),
            UndefinedBehavior::Strict
        ));
    }

    #[test]
    fn library_templates_are_includable() {
        let mut engine = engine();
        engine.add_template("header", "# {{ who }}").unwrap();
        let out = render(&engine, "{% include \"header\" %}!", &json!({"who": "me"}));
        assert_eq!(out, "# me!");
    }

    #[test]
    fn markup_named_templates_are_not_escaped() {
        let mut engine = engine();
        engine.add_template("page.html", "{{ v }}").unwrap();
        engine.add_template("feed.xml", "{{ v }}").unwrap();
        let out = render(
            &engine,
            "{% include \"page.html\" %}|{% include \"feed.xml\" %}|{{ v }}",
            &json!({"v": "<a & b>"}),
        );
        assert_eq!(out, "<a & b>|<a & b>|<a & b>");
        let out = String::from_utf8(
            engine
                .render("index.html", b"{{ v }}", &json!({"v": "\"q\""}))
                .unwrap(),
        )
        .unwrap();
        assert_eq!(out, "\"q\"");
    }

    #[test]
    fn default_funcs_join_path_and_include() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("snippet"), "included").unwrap();
        let engine = TemplateEngine::new(UndefinedBehavior::Strict, default_funcs(dir.path()));
        assert_eq!(
            render(&engine, "{{ joinPath(\"a\", \"b\") }}", &json!({})),
            Path::new("a").join("b").to_string_lossy()
        );
        assert_eq!(
            render(&engine, "{{ include(\"snippet\") }}", &json!({})),
            "included"
        );
    }

    #[test]
    #[cfg(unix)]
    fn default_funcs_output_runs_command() {
        let engine = TemplateEngine::new(UndefinedBehavior::Strict, default_funcs(Path::new(".")));
        assert_eq!(
            render(&engine, "{{ output(\"echo\", \"hi\") | trim }}", &json!({})),
            "hi"
        );
    }
}
