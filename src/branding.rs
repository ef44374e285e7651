pub const APP_DISPLAY_NAME: &str = "Desk Grid";

/// Qualifier/organization/application triple for `directories::ProjectDirs`.
pub const PROJECT_QUALIFIER: &str = "com";
pub const PROJECT_ORGANIZATION: &str = "desk_grid";
pub const PROJECT_APPLICATION: &str = "desk_grid";
