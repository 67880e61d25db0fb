//! Server-rendered pages.
//!
//! Built-in templates are compiled into the binary. When `TEMPLATE_DIR` is
//! set, every `*.html` file in it is loaded afterwards and replaces the
//! built-in template of the same name.

use std::{path::Path, sync::Arc};

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tera::{Context, Tera};

use crate::config::Config;

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("layout.html",               include_str!("../templates/layout.html")),
    ("admin-layout.html",         include_str!("../templates/admin-layout.html")),
    ("home.html",                 include_str!("../templates/home.html")),
    ("login.html",                include_str!("../templates/login.html")),
    ("account-pending.html",      include_str!("../templates/account-pending.html")),
    ("sign-up.html",              include_str!("../templates/sign-up.html")),
    ("unexpected-error.html",     include_str!("../templates/unexpected-error.html")),
    ("member-profile.html",       include_str!("../templates/member-profile.html")),
    ("member-edit-avatar.html",   include_str!("../templates/member-edit-avatar.html")),
    ("admin-login.html",          include_str!("../templates/admin-login.html")),
    ("admin-dashboard.html",      include_str!("../templates/admin-dashboard.html")),
    ("admin-members-manage.html", include_str!("../templates/admin-members-manage.html")),
    ("admin-members-edit.html",   include_str!("../templates/admin-members-edit.html")),
    ("admin-roles-manage.html",   include_str!("../templates/admin-roles-manage.html")),
    ("admin-roles-create.html",   include_str!("../templates/admin-roles-create.html")),
    ("admin-roles-edit.html",     include_str!("../templates/admin-roles-edit.html")),
];

#[derive(Clone)]
pub struct Templates {
    tera:     Arc<Tera>,
    app_name: String,
}

impl Templates {
    pub fn load(config: &Config) -> anyhow::Result<Self> {
        let mut templates = Self::builtin(&config.app_name)?;
        if let Some(dir) = &config.template_dir {
            let loaded = templates.load_overrides(Path::new(dir))?;
            tracing::info!(dir = %dir, count = loaded, "Loaded application templates");
        }
        Ok(templates)
    }

    pub fn builtin(app_name: &str) -> anyhow::Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(BUILTIN_TEMPLATES.iter().copied())?;
        Ok(Self { tera: Arc::new(tera), app_name: app_name.to_string() })
    }

    fn load_overrides(&mut self, dir: &Path) -> anyhow::Result<usize> {
        let mut overrides = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            overrides.push((name.to_string(), std::fs::read_to_string(&path)?));
        }

        let count = overrides.len();
        let mut tera = (*self.tera).clone();
        tera.add_raw_templates(overrides)?;
        self.tera = Arc::new(tera);
        Ok(count)
    }

    /// Fresh context carrying the values every page shares.
    pub fn context(&self) -> Context {
        let mut ctx = Context::new();
        ctx.insert("app_name", &self.app_name);
        ctx
    }

    pub fn render_to_string(&self, name: &str, ctx: &Context) -> tera::Result<String> {
        self.tera.render(name, ctx)
    }

    /// Renders `name` as an HTML response. A render failure is logged and
    /// becomes a bare 500.
    pub fn render(&self, name: &str, ctx: &Context) -> Response {
        self.render_with_status(StatusCode::OK, name, ctx)
    }

    pub fn render_with_status(&self, status: StatusCode, name: &str, ctx: &Context) -> Response {
        match self.render_to_string(name, ctx) {
            Ok(body) => (status, Html(body)).into_response(),
            Err(err) => {
                tracing::error!(template = name, error = ?err, "Template render failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_template_renders_with_an_empty_context() {
        let templates = Templates::builtin("Frame").unwrap();
        let ctx = templates.context();
        for (name, _) in BUILTIN_TEMPLATES {
            if name.ends_with("layout.html") {
                continue;
            }
            let html = templates
                .render_to_string(name, &ctx)
                .unwrap_or_else(|e| panic!("{name}: {e:?}"));
            assert!(html.contains("Frame"), "{name} does not show the app name");
        }
    }

    #[test]
    fn overrides_replace_builtins_by_name() {
        let dir = std::env::temp_dir().join(format!("frame-templates-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("home.html"), "custom home for {{ app_name }}").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let mut templates = Templates::builtin("Frame").unwrap();
        assert_eq!(templates.load_overrides(&dir).unwrap(), 1);

        let html = templates.render_to_string("home.html", &templates.context()).unwrap();
        assert_eq!(html, "custom home for Frame");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn user_values_are_escaped() {
        let templates = Templates::builtin("Frame").unwrap();
        let mut ctx = templates.context();
        ctx.insert("error_message", "<script>alert(1)</script>");
        let html = templates.render_to_string("login.html", &ctx).unwrap();
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
