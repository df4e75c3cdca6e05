/// Server-rendered HTML pages
///
/// Templates are compiled into the binary and loaded into one minijinja
/// environment at startup. Files ending in `.html` are auto-escaped.

use axum::response::Html;
use minijinja::Environment;
use serde::Serialize;
use tasktrack_shared::models::task::TaskStatus;

use crate::error::ApiResult;

const TEMPLATES: &[(&str, &str)] = &[
    ("layout.html", include_str!("../templates/layout.html")),
    ("home.html", include_str!("../templates/home.html")),
    ("auth/login.html", include_str!("../templates/auth/login.html")),
    ("auth/signup.html", include_str!("../templates/auth/signup.html")),
    ("task/_fields.html", include_str!("../templates/task/_fields.html")),
    ("task/index.html", include_str!("../templates/task/index.html")),
    ("task/create.html", include_str!("../templates/task/create.html")),
    ("task/edit.html", include_str!("../templates/task/edit.html")),
    ("task/delete.html", include_str!("../templates/task/delete.html")),
    ("task/progress.html", include_str!("../templates/task/progress.html")),
    ("role/_permissions.html", include_str!("../templates/role/_permissions.html")),
    ("role/index.html", include_str!("../templates/role/index.html")),
    ("role/create.html", include_str!("../templates/role/create.html")),
    ("role/edit.html", include_str!("../templates/role/edit.html")),
    ("role/delete.html", include_str!("../templates/role/delete.html")),
];

/// `{{ task.status|status_label }}`; unknown values pass through
fn status_label(value: String) -> String {
    value
        .parse::<TaskStatus>()
        .map(|s| s.label().to_string())
        .unwrap_or(value)
}

/// Loaded template set
#[derive(Debug)]
pub struct Views {
    env: Environment<'static>,
}

impl Views {
    /// Parses every template
    ///
    /// # Errors
    ///
    /// Returns the first syntax error found.
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_filter("status_label", status_label);
        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }

        Ok(Self { env })
    }

    /// Renders `name` with `context`
    pub fn render<S: Serialize>(&self, name: &str, context: S) -> ApiResult<Html<String>> {
        let template = self.env.get_template(name)?;
        Ok(Html(template.render(context)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    #[test]
    fn test_all_templates_parse() {
        let views = Views::new().unwrap();
        for (name, _) in TEMPLATES {
            assert!(views.env.get_template(name).is_ok(), "{} missing", name);
        }
    }

    #[test]
    fn test_status_label_filter() {
        assert_eq!(status_label("IN_PROGRESS".to_string()), "In Progress");
        assert_eq!(status_label("weird".to_string()), "weird");
    }

    #[test]
    fn test_login_page_escapes_values() {
        let views = Views::new().unwrap();
        let Html(body) = views
            .render(
                "auth/login.html",
                context! { email => "<script>", error => "Invalid email or password" },
            )
            .unwrap();

        assert!(body.contains("&lt;script&gt;"));
        assert!(body.contains("Invalid email or password"));
    }

    #[test]
    fn test_home_page_counts() {
        let views = Views::new().unwrap();
        let Html(body) = views
            .render(
                "home.html",
                context! {
                    user => context! { name => "New User" },
                    completed => 3,
                    remaining => 2,
                },
            )
            .unwrap();

        assert!(body.contains("Hi, New User!"));
        assert!(body.contains("You have completed 3 task"));
        assert!(body.contains("You still have 2 tasks left"));
    }

    #[test]
    fn test_role_form_checks_selected_permissions() {
        let views = Views::new().unwrap();
        let Html(body) = views
            .render(
                "role/edit.html",
                context! {
                    user => context! { id => 1, name => "Admin" },
                    role => context! { id => 4, name => "Editor" },
                    permissions => vec![
                        context! { id => 1, name => "view-any-tasks" },
                        context! { id => 2, name => "edit-any-tasks" },
                    ],
                    selected => vec![2],
                },
            )
            .unwrap();

        assert!(body.contains(r#"value="1">"#));
        assert!(body.contains(r#"value="2" checked>"#));
        assert!(body.contains("/role/4/update?_method=PUT"));
    }

    #[test]
    fn test_progress_page_offers_other_statuses() {
        let views = Views::new().unwrap();
        let Html(body) = views
            .render(
                "task/progress.html",
                context! {
                    user => context! { id => 1, name => "A" },
                    columns => vec![context! {
                        status => "NOT_STARTED",
                        label => "Not Started",
                        tasks => vec![context! { id => 9, name => "T", due_date => "2025-01-31" }],
                    }],
                    statuses => vec![
                        context! { value => "NOT_STARTED", label => "Not Started" },
                        context! { value => "COMPLETED", label => "Completed" },
                    ],
                },
            )
            .unwrap();

        assert!(body.contains("/task/move/9?status=COMPLETED&amp;_method=PATCH"));
        assert!(!body.contains("/task/move/9?status=NOT_STARTED"));
    }

    #[test]
    fn test_home_page_singular() {
        let views = Views::new().unwrap();
        let Html(body) = views
            .render(
                "home.html",
                context! {
                    user => context! { name => "Solo" },
                    completed => 1,
                    remaining => 1,
                },
            )
            .unwrap();

        assert!(body.contains("You have completed 1 task."));
        assert!(body.contains("You still have 1 task left"));
    }
}
