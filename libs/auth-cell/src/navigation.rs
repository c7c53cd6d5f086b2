use serde::{Deserialize, Serialize};

use shared_models::auth::User;

/// The three client-side views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    SignUp,
    SignIn,
    Dashboard,
}

impl View {
    pub fn path(&self) -> &'static str {
        match self {
            View::SignUp => "/",
            View::SignIn => "/signin",
            View::Dashboard => "/dashboard",
        }
    }

    pub fn from_path(path: &str) -> Option<View> {
        match path.trim_end_matches('/') {
            "" => Some(View::SignUp),
            "/signin" => Some(View::SignIn),
            "/dashboard" => Some(View::Dashboard),
            _ => None,
        }
    }

    pub fn requires_identity(&self) -> bool {
        matches!(self, View::Dashboard)
    }

    /// Protected views fall back to sign-in when nobody is signed in.
    pub fn resolve(self, identity: Option<&User>) -> View {
        if self.requires_identity() && identity.is_none() {
            View::SignIn
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_round_trip() {
        for view in [View::SignUp, View::SignIn, View::Dashboard] {
            assert_eq!(View::from_path(view.path()), Some(view));
        }
        assert_eq!(View::from_path("/dashboard/"), Some(View::Dashboard));
        assert_eq!(View::from_path("/admin"), None);
    }

    #[test]
    fn test_dashboard_is_gated() {
        assert_eq!(View::Dashboard.resolve(None), View::SignIn);
        assert_eq!(View::SignUp.resolve(None), View::SignUp);

        let user = User {
            id: "u1".into(),
            email: None,
            display_name: None,
            role: None,
            metadata: None,
            created_at: None,
        };
        assert_eq!(View::Dashboard.resolve(Some(&user)), View::Dashboard);
    }
}
